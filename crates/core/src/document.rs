//! Statement and document model.
//!
//! A document's text is split into statements at each end-of-statement
//! token (with a trailing incomplete statement kept at end of input).
//! Each statement is dispatched to the grammar tree matching its
//! leading keyword and walked; afterwards the FROM/TO completeness of
//! element actions is checked against the statement's own memo and the
//! document-wide memo accumulated from `SET` statements, which
//! establish ambient defaults for everything after them.
//!
//! Edits go through [`Document::update`]: the minimal affected
//! statement range is re-tokenized and re-walked with every untouched
//! offset shifted, except that any edit involving `SET` together with
//! `FROM`/`TO` forces a full reparse, since `SET` changes state all
//! later statements depend on.

use crate::diagnostics::{
    CompletionItem, Diagnostic, RelatedInfo, Severity, ValidationContext, CHOICE_MSG,
    INVALID_ACTION_MSG,
};
use crate::grammar::Grammars;
use crate::keywords::match_keyword;
use crate::lexer::{Token, Tokenizer};
use crate::parser;

/// Every statement action, in the order offered as completion.
pub const ACTIONS: [&str; 19] = [
    "SET", "ADD", "UPDATE", "DELETE", "GENERATE", "MOVE", "RETRIEVE", "SIGNIN", "TRANSFER",
    "APPROVE", "DENY", "BACKIN", "BACKOUT", "CAST", "DEFINE", "EXECUTE", "RESET", "COMMIT",
    "LIST",
];

/// Completion items for starting a fresh statement.
pub fn action_completion() -> Vec<CompletionItem> {
    ACTIONS.iter().map(|a| CompletionItem::keyword(*a)).collect()
}

// ── FROM/TO memo ─────────────────────────────────────────────────────

/// Which location parts of a FROM or TO clause have been seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationState {
    pub environment: bool,
    pub system: bool,
    pub subsystem: bool,
    pub type_: bool,
    pub stage: bool,
}

impl LocationState {
    /// Environment, stage, system, subsystem and type all present.
    pub fn full(&self) -> bool {
        self.environment && self.stage && self.system && self.subsystem && self.type_
    }
}

/// Memo for one clause: a file target and/or a location.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClauseState {
    pub has_file: bool,
    pub location: LocationState,
}

impl ClauseState {
    /// Record a keyword matched directly under the clause head.
    pub fn record(&mut self, phrase: &str) {
        let head = phrase
            .split_whitespace()
            .next()
            .unwrap_or("")
            .to_ascii_uppercase();
        match head.as_str() {
            "FILE" | "DDNAME" | "DSNAME" | "PATH" | "USSFILE" => self.has_file = true,
            "ENVIRONMENT" => self.location.environment = true,
            "SYSTEM" => self.location.system = true,
            "SUBSYSTEM" => self.location.subsystem = true,
            "TYPE" => self.location.type_ = true,
            "STAGE" => self.location.stage = true,
            _ => {}
        }
    }

    fn merged(&self, other: &ClauseState) -> ClauseState {
        ClauseState {
            has_file: self.has_file || other.has_file,
            location: LocationState {
                environment: self.location.environment || other.location.environment,
                system: self.location.system || other.location.system,
                subsystem: self.location.subsystem || other.location.subsystem,
                type_: self.location.type_ || other.location.type_,
                stage: self.location.stage || other.location.stage,
            },
        }
    }
}

/// FROM and TO memo, kept per statement and (for `SET`) per document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FromToState {
    pub from: ClauseState,
    pub to: ClauseState,
}

impl FromToState {
    fn merge(&mut self, other: &FromToState) {
        self.from = self.from.merged(&other.from);
        self.to = self.to.merged(&other.to);
    }
}

// ── Statements ───────────────────────────────────────────────────────

/// One SCL statement: its tokens, extent, findings and FROM/TO memo.
#[derive(Debug, Clone)]
pub struct Statement {
    pub start: usize,
    pub end: usize,
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
    pub from_to: FromToState,
}

impl Statement {
    fn from_tokens(mut tokens: Vec<Token>, offset: usize) -> Self {
        for token in &mut tokens {
            token.start += offset;
        }
        let start = tokens.first().map(|t| t.start).unwrap_or(offset);
        let end = tokens.last().map(|t| t.end()).unwrap_or(offset);
        Statement {
            start,
            end,
            tokens,
            diagnostics: Vec::new(),
            from_to: FromToState::default(),
        }
    }

    fn is_complete(&self) -> bool {
        self.tokens
            .last()
            .map(|t| t.is_eo_statement)
            .unwrap_or(false)
    }

    fn has_error(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Split a region of text into statements, shifting every offset by
/// the region's position in the whole document.
fn parse_statements(text: &str, offset: usize) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut tokenizer = Tokenizer::new(text);
    let mut current: Vec<Token> = Vec::new();
    loop {
        let token = tokenizer.read_next();
        if token.is_end_of_input() {
            if !current.is_empty() {
                statements.push(Statement::from_tokens(std::mem::take(&mut current), offset));
            }
            break;
        }
        let eos = token.is_eo_statement;
        current.push(token);
        if eos {
            statements.push(Statement::from_tokens(std::mem::take(&mut current), offset));
        }
    }
    statements
}

// ── Document ─────────────────────────────────────────────────────────

/// An open SCL document: full text, parsed statements, and the memo
/// accumulated from `SET FROM`/`SET TO` statements.
#[derive(Debug, Clone)]
pub struct Document {
    pub text: String,
    pub statements: Vec<Statement>,
    pub set_memo: FromToState,
}

impl Document {
    /// Parse and validate a newly opened document.
    pub fn open(
        text: impl Into<String>,
        grammars: &Grammars,
        ctx: &mut ValidationContext,
    ) -> Self {
        let mut document = Document {
            text: text.into(),
            statements: Vec::new(),
            set_memo: FromToState::default(),
        };
        document.reparse_all(grammars, ctx);
        document
    }

    /// Replace the whole text and revalidate from scratch. This is the
    /// correctness baseline every incremental path must agree with.
    pub fn full_update(
        &mut self,
        text: impl Into<String>,
        grammars: &Grammars,
        ctx: &mut ValidationContext,
    ) {
        ctx.release(self.diagnostic_count());
        self.text = text.into();
        self.reparse_all(grammars, ctx);
    }

    fn reparse_all(&mut self, grammars: &Grammars, ctx: &mut ValidationContext) {
        self.set_memo = FromToState::default();
        let mut statements = parse_statements(&self.text, 0);
        for statement in &mut statements {
            walk_statement(statement, grammars, &mut self.set_memo, ctx);
        }
        self.statements = statements;
    }

    /// Apply the edit replacing `self.text[start..end]` with
    /// `new_text`, reparsing only the affected statements. Whenever
    /// `SET` and `FROM`/`TO` are involved on either side of the edit,
    /// the whole document is reparsed instead.
    pub fn update(
        &mut self,
        start: usize,
        end: usize,
        new_text: &str,
        grammars: &Grammars,
        ctx: &mut ValidationContext,
    ) {
        if mentions_set_from_to(new_text) || mentions_set_from_to(&self.text) {
            let full = splice_text(&self.text, start, end, new_text);
            self.full_update(full, grammars, ctx);
            return;
        }

        let shift = new_text.len() as isize - (end - start) as isize;
        let mut range_start = start;
        let mut range_end = end;

        let mut i = self.statements.len();
        while i > 0 {
            i -= 1;
            if self.statements[i].start > range_end {
                shift_statement(&mut self.statements[i], shift);
                continue;
            }
            if self.statements[i].end < range_start && self.statements[i].is_complete() {
                continue;
            }
            // Overlapping, or an adjacent incomplete statement that the
            // edit may complete: absorb it into the reparse range.
            range_start = range_start.min(self.statements[i].start);
            range_end = range_end.max(self.statements[i].end);
            ctx.release(self.statements[i].diagnostics.len());
            self.statements.remove(i);
        }

        let mut reparse_text = String::new();
        reparse_text.push_str(&self.text[range_start..start]);
        reparse_text.push_str(new_text);
        reparse_text.push_str(&self.text[end..range_end]);

        let mut new_statements = parse_statements(&reparse_text, range_start);
        for statement in &mut new_statements {
            walk_statement(statement, grammars, &mut self.set_memo, ctx);
        }
        let insert_at = self
            .statements
            .partition_point(|s| s.start < range_start);
        self.statements.splice(insert_at..insert_at, new_statements);

        self.text = splice_text(&self.text, start, end, new_text);
    }

    /// Total diagnostics currently attached to this document.
    pub fn diagnostic_count(&self) -> usize {
        self.statements.iter().map(|s| s.diagnostics.len()).sum()
    }

    /// All diagnostics in statement order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.statements.iter().flat_map(|s| s.diagnostics.iter())
    }

    /// Completion candidates for an editing position: the candidates
    /// recorded on the token whose trailing gap contains `offset`,
    /// the statement-action list right after an end-of-statement
    /// operator, or the action list in virgin territory.
    pub fn completion_at(&self, offset: usize) -> Vec<CompletionItem> {
        for statement in &self.statements {
            if offset < statement.start || offset > statement.end {
                continue;
            }
            for (i, token) in statement.tokens.iter().enumerate() {
                let gap_start = token.end();
                let gap_end = statement
                    .tokens
                    .get(i + 1)
                    .map(|t| t.start)
                    .unwrap_or(statement.end);
                if offset >= gap_start && offset <= gap_end {
                    if token.is_eo_statement {
                        return action_completion();
                    }
                    return token.completion_items.clone().unwrap_or_default();
                }
            }
        }

        // Past the last statement: continue it, or start a new one.
        if let Some(statement) = self.statements.last() {
            if let Some(token) = statement.tokens.last() {
                if !token.is_eo_statement {
                    if let Some(items) = &token.completion_items {
                        return items.clone();
                    }
                }
            }
        }
        action_completion()
    }
}

/// Dispatch one statement to its grammar tree, walk it, and apply the
/// FROM/TO semantics. `SET` statements feed the document memo instead
/// of being checked themselves.
fn walk_statement(
    statement: &mut Statement,
    grammars: &Grammars,
    set_memo: &mut FromToState,
    ctx: &mut ValidationContext,
) {
    let first = match statement.tokens.first() {
        Some(t) => t.value.clone(),
        None => return,
    };
    match grammars.dispatch(&first) {
        None => {
            statement.tokens[0].completion_items = Some(action_completion());
            let (start, end) = (statement.tokens[0].start, statement.tokens[0].end());
            let related = RelatedInfo {
                start,
                end,
                message: format!("{}{}", CHOICE_MSG, ACTIONS.join(", ")),
            };
            push_statement_diagnostic(
                statement,
                ctx,
                start,
                end,
                Severity::Error,
                INVALID_ACTION_MSG.to_string(),
                Some(related),
            );
        }
        Some(tree) => {
            let outcome = parser::walk(tree, &mut statement.tokens, ctx);
            statement.diagnostics = outcome.diagnostics;
            statement.from_to = outcome.from_to;
            if match_keyword(&first, "SET") {
                set_memo.merge(&statement.from_to);
            } else {
                check_from_to(statement, set_memo, ctx);
            }
        }
    }
}

/// FROM/TO completeness rules per action category. Reported only when
/// the statement has no Error yet, so a more specific finding is never
/// masked by the generic clause message.
fn check_from_to(statement: &mut Statement, set_memo: &FromToState, ctx: &mut ValidationContext) {
    if statement.tokens.len() < 2 {
        return;
    }
    let action = statement.tokens[0].value.to_ascii_uppercase();
    let object = statement.tokens[1].value.to_ascii_uppercase();
    if object.starts_with("PAC") {
        return; // package actions carry no element location
    }

    let from = statement.from_to.from.merged(&set_memo.from);
    let to = statement.from_to.to.merged(&set_memo.to);
    let is_rest = ctx.config.is_rest;

    let mut miss_from = false;
    let mut miss_to = false;
    if action.starts_with("ADD") || action.starts_with("UPD") {
        miss_from = !from.has_file;
        miss_to = !(to.location.environment
            && to.location.system
            && to.location.subsystem
            && to.location.type_);
    } else if action.starts_with("DEL")
        || action.starts_with("GEN")
        || action.starts_with("MOV")
        || action.starts_with("SIG")
    {
        miss_from = !from.location.full();
    } else if action.starts_with("RET") {
        miss_from = !from.location.full();
        miss_to = !to.has_file && !is_rest;
    } else if action.starts_with("TRA") {
        miss_from = !from.location.full();
        miss_to = !to.location.full();
    } else if action.starts_with("LIS") {
        miss_to = !to.has_file && !is_rest;
        if object.starts_with("STA") {
            miss_from = !from.location.environment;
        } else if object.starts_with("SYS") {
            miss_from = !(from.location.environment && from.location.stage);
        } else if object.starts_with("SUB") || object.starts_with("TYP") {
            miss_from = !(from.location.environment
                && from.location.stage
                && from.location.system);
        } else if object.starts_with("ELE") {
            miss_from = !from.location.full();
        }
    } else {
        return;
    }

    if !(miss_from || miss_to) || statement.has_error() {
        return;
    }
    let (start, end) = (statement.start, statement.end);
    if miss_from {
        push_statement_diagnostic(
            statement,
            ctx,
            start,
            end,
            Severity::Error,
            crate::diagnostics::FROM_INCOMPLETE_MSG.to_string(),
            None,
        );
    }
    if miss_to {
        push_statement_diagnostic(
            statement,
            ctx,
            start,
            end,
            Severity::Error,
            crate::diagnostics::TO_INCOMPLETE_MSG.to_string(),
            None,
        );
    }
}

fn push_statement_diagnostic(
    statement: &mut Statement,
    ctx: &mut ValidationContext,
    start: usize,
    end: usize,
    severity: Severity,
    message: String,
    related: Option<RelatedInfo>,
) {
    if ctx.at_capacity() {
        return;
    }
    ctx.count_one();
    statement.diagnostics.push(Diagnostic {
        severity,
        start,
        end,
        message,
        related,
    });
}

fn shift_statement(statement: &mut Statement, shift: isize) {
    let apply = |v: usize| (v as isize + shift) as usize;
    statement.start = apply(statement.start);
    statement.end = apply(statement.end);
    for token in &mut statement.tokens {
        token.start = apply(token.start);
    }
    for diagnostic in &mut statement.diagnostics {
        diagnostic.start = apply(diagnostic.start);
        diagnostic.end = apply(diagnostic.end);
        if let Some(related) = &mut diagnostic.related {
            related.start = apply(related.start);
            related.end = apply(related.end);
        }
    }
}

fn splice_text(text: &str, start: usize, end: usize, new_text: &str) -> String {
    let mut out = String::with_capacity(text.len() - (end - start) + new_text.len());
    out.push_str(&text[..start]);
    out.push_str(new_text);
    out.push_str(&text[end..]);
    out
}

/// True when the text mentions `SET` together with `FROM` (or its
/// abbreviation `FRO`) or `TO` as whole words, in any casing.
fn mentions_set_from_to(text: &str) -> bool {
    let upper = text.to_ascii_uppercase();
    contains_word(&upper, "SET")
        && (contains_word(&upper, "FROM")
            || contains_word(&upper, "FRO")
            || contains_word(&upper, "TO"))
}

fn contains_word(haystack: &str, needle: &str) -> bool {
    let bytes = haystack.as_bytes();
    let mut from = 0;
    while let Some(pos) = haystack[from..].find(needle) {
        let at = from + pos;
        let before_ok = at == 0 || !is_word_byte(bytes[at - 1]);
        let after = at + needle.len();
        let after_ok = after >= bytes.len() || !is_word_byte(bytes[after]);
        if before_ok && after_ok {
            return true;
        }
        from = at + 1;
    }
    false
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}
