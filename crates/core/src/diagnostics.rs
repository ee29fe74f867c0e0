//! Diagnostic and completion value types plus the validation context.
//!
//! Diagnostics carry absolute byte offsets into the owning document;
//! converting offsets to line/column positions is the host's job.
//! The [`ValidationContext`] threads the problem cap and the running
//! problem counter through every pass explicitly -- there is no
//! process-global state.

/// Diagnostic severity. Only two levels are ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A location and message attached to a diagnostic as a suggestion,
/// typically a "Possible valid values: ..." list anchored at the token
/// whose completion candidates were used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedInfo {
    pub start: usize,
    pub end: usize,
    pub message: String,
}

/// A single finding, anchored to an offset range of the document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub start: usize,
    pub end: usize,
    pub message: String,
    pub related: Option<RelatedInfo>,
}

/// Kind hint for a completion candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    Keyword,
    Value,
    Operator,
}

/// A suggested next token, attached to the token it completes after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
}

impl CompletionItem {
    pub fn keyword(label: impl Into<String>) -> Self {
        CompletionItem {
            label: label.into(),
            kind: CompletionKind::Keyword,
        }
    }

    pub fn operator(label: impl Into<String>) -> Self {
        CompletionItem {
            label: label.into(),
            kind: CompletionKind::Operator,
        }
    }
}

/// Validation settings supplied by the host editor or CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationConfig {
    /// Cap on the total number of diagnostics across all documents
    /// validated through one context.
    pub max_number_of_problems: usize,
    /// When true, `RETRIEVE` and `LIST` do not require a TO file target.
    pub is_rest: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        ValidationConfig {
            max_number_of_problems: 1000,
            is_rest: false,
        }
    }
}

/// Mutable validation state threaded through tokenize/parse/diagnose.
///
/// One context serves a whole document manager; the counter spans every
/// open document and is released (clamped at zero) when statements or
/// documents are discarded.
#[derive(Debug, Clone)]
pub struct ValidationContext {
    pub config: ValidationConfig,
    pub number_of_problems: usize,
}

impl ValidationContext {
    pub fn new(config: ValidationConfig) -> Self {
        ValidationContext {
            config,
            number_of_problems: 0,
        }
    }

    /// True once the configured cap is reached; further diagnostics
    /// are silently dropped.
    pub fn at_capacity(&self) -> bool {
        self.number_of_problems >= self.config.max_number_of_problems
    }

    /// Account for one newly recorded diagnostic.
    pub fn count_one(&mut self) {
        self.number_of_problems += 1;
    }

    /// Give back the counter share of `n` discarded diagnostics.
    pub fn release(&mut self, n: usize) {
        self.number_of_problems = self.number_of_problems.saturating_sub(n);
    }
}

impl Default for ValidationContext {
    fn default() -> Self {
        ValidationContext::new(ValidationConfig::default())
    }
}

// ── Canonical diagnostic messages ────────────────────────────────────

pub const UPPERCASE_MSG: &str =
    "Keyword should be uppercased\nLowercased keyword might cause the scl action to fail when submitted";
pub const CHOICE_MSG: &str = "Possible valid values: ";
pub const INVALID_WORD_MSG: &str = "Invalid word";
pub const INVALID_ACTION_MSG: &str = "Invalid action specified";
pub const INCOMPLETE_MSG: &str = "Incomplete SCL";
pub const NO_EOS_MSG: &str = "No end-of-statement operator specified";
pub const SPACE_BEFORE_EOS_MSG: &str = "Expecting a space before end-of-statement operator";
pub const NO_CLOSING_PAREN_MSG: &str = "No \")\" found to enclose the value";
pub const DATE_TIME_MSG: &str =
    "Expecting a value in DDMMMYY HH:MM format, for example 01JAN93 00:01";
pub const FROM_INCOMPLETE_MSG: &str = "FROM clause incomplete in the current SCL";
pub const TO_INCOMPLETE_MSG: &str = "TO clause incomplete in the current SCL";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_cap_and_release() {
        let mut ctx = ValidationContext::new(ValidationConfig {
            max_number_of_problems: 2,
            is_rest: false,
        });
        assert!(!ctx.at_capacity());
        ctx.count_one();
        ctx.count_one();
        assert!(ctx.at_capacity());
        ctx.release(1);
        assert!(!ctx.at_capacity());
        ctx.release(10);
        assert_eq!(ctx.number_of_problems, 0);
    }
}
