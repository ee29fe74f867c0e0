//! Grammar-tree walker.
//!
//! Matches one statement's token stream against a grammar tree. The
//! cursor starts at token 1 -- token 0 is the action keyword already
//! matched by dispatch. Children are tried in declaration order,
//! keywords before values before date-times; when a node's children
//! all fail and the node does not demand a successor, the walker climbs
//! parent links to the nearest ancestor with more than one
//! keyword-bearing child and retries keyword matches there. Climbing
//! stops at `no_backtrack` fences. Backtracking happens at the tree
//! level only; the token cursor never rewinds.
//!
//! Side effects of successful matches (casing warnings, completion
//! candidates, FROM/TO memo entries, formatting hints) are applied
//! inline -- no event channel.

use crate::diagnostics::{
    CompletionItem, Diagnostic, RelatedInfo, Severity, ValidationContext, CHOICE_MSG,
    DATE_TIME_MSG, INCOMPLETE_MSG, INVALID_WORD_MSG, NO_CLOSING_PAREN_MSG, NO_EOS_MSG,
    SPACE_BEFORE_EOS_MSG, UPPERCASE_MSG,
};
use crate::document::FromToState;
use crate::grammar::{GrammarTree, NodeId, NodeKind};
use crate::keywords::keyphrase_match;
use crate::lexer::Token;

/// Result of walking one statement.
pub struct WalkOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub from_to: FromToState,
}

/// Walk `tokens` against `tree`, annotating tokens with completion
/// candidates and formatting hints as matches succeed.
pub fn walk(tree: &GrammarTree, tokens: &mut [Token], ctx: &mut ValidationContext) -> WalkOutcome {
    let stmt_start = tokens.first().map(|t| t.start).unwrap_or(0);
    let stmt_end = tokens.last().map(|t| t.end()).unwrap_or(0);
    let mut walker = Walker {
        tree,
        tokens,
        ctx,
        index: 1,
        diagnostics: Vec::new(),
        from_to: FromToState::default(),
        base_indent: 0,
        stopped_with_error: false,
        stmt_start,
        stmt_end,
    };
    walker.run();
    WalkOutcome {
        diagnostics: walker.diagnostics,
        from_to: walker.from_to,
    }
}

enum TryResult {
    Matched,
    Error,
}

struct Walker<'a> {
    tree: &'a GrammarTree,
    tokens: &'a mut [Token],
    ctx: &'a mut ValidationContext,
    index: usize,
    diagnostics: Vec<Diagnostic>,
    from_to: FromToState,
    base_indent: usize,
    stopped_with_error: bool,
    stmt_start: usize,
    stmt_end: usize,
}

impl<'a> Walker<'a> {
    fn run(&mut self) {
        let tree = self.tree;
        // The action keyword was matched by dispatch; apply its side
        // effects before descending.
        let root_phrase = tree
            .root()
            .first_synonym()
            .unwrap_or_default()
            .to_string();
        self.post_keyword_match(0, 1, &root_phrase, GrammarTree::ROOT);
        self.match_next(GrammarTree::ROOT, false);

        if !self.stopped_with_error && self.index + 1 < self.tokens.len() {
            // The walk gave up before the end of the statement.
            self.invalid_word_at(self.index);
        }
        self.check_end_of_statement();
    }

    fn match_next(&mut self, node_id: NodeId, in_ancestor: bool) {
        let tree = self.tree;

        if self.index >= self.tokens.len() {
            if tree.node(node_id).require_next {
                self.incomplete_at_last();
            }
            return;
        }

        // Keyword children first, in declaration order.
        for &child_id in &tree.node(node_id).children {
            if let NodeKind::Keyword { synonyms } = &tree.node(child_id).kind {
                for phrase in synonyms {
                    if let Some(count) = keyphrase_match(self.tokens, self.index, phrase) {
                        self.post_keyword_match(self.index, count, phrase, child_id);
                        self.index += count;
                        self.match_next(child_id, false);
                        return;
                    }
                }
            }
        }

        // Value, date-time and end-of-statement children are never
        // retried from an ancestor search.
        if !in_ancestor {
            for &child_id in &tree.node(node_id).children {
                match &tree.node(child_id).kind {
                    NodeKind::Value {
                        max_len,
                        special_list,
                        long_form,
                    } => {
                        match self.try_value(child_id, *max_len, *special_list, *long_form) {
                            TryResult::Matched => {
                                self.match_next(child_id, false);
                            }
                            TryResult::Error => {
                                self.stopped_with_error = true;
                            }
                        }
                        return;
                    }
                    NodeKind::DateTime => {
                        match self.try_date_time(child_id) {
                            TryResult::Matched => {
                                self.match_next(child_id, false);
                            }
                            TryResult::Error => {
                                self.stopped_with_error = true;
                            }
                        }
                        return;
                    }
                    NodeKind::EndOfStatement => {
                        if self.tokens[self.index].is_eo_statement {
                            self.index += 1;
                            self.match_next(child_id, false);
                            return;
                        }
                    }
                    NodeKind::Keyword { .. } => {}
                }
            }
        }

        // Nothing matched here.
        if !in_ancestor && tree.node(node_id).require_next {
            self.invalid_word_at(self.index);
            self.stopped_with_error = true;
            return;
        }

        // Climb to the nearest ancestor with an ambiguous keyword
        // branch and retry there.
        let mut ancestor = tree.node(node_id).parent;
        while let Some(a) = ancestor {
            if tree.keyword_child_weight(a) > 1 {
                self.match_next(a, true);
                return;
            }
            if tree.node(a).no_backtrack {
                break;
            }
            ancestor = tree.node(a).parent;
        }
    }

    // ── Value matching ───────────────────────────────────────────────

    fn try_value(
        &mut self,
        node_id: NodeId,
        max_len: usize,
        special_list: bool,
        long_form: bool,
    ) -> TryResult {
        let len = self.tokens.len();
        let value = self.tokens[self.index].value.clone();
        let next_is_comma = self.index + 1 < len && self.tokens[self.index + 1].value == ",";

        if long_form && (value.ends_with(',') || next_is_comma) {
            // A value spanning comma/quote-joined tokens.
            let start_quote = value.chars().next();
            let mut plus = 0usize;
            let mut final_value = String::new();
            loop {
                if self.index + plus >= len {
                    // Ran off the statement; the end-of-statement check
                    // reports the malformed ending.
                    return TryResult::Error;
                }
                let t = self.tokens[self.index + plus].value.clone();
                let continues = t.ends_with(',')
                    || start_quote.map(|q| t.ends_with(q)).unwrap_or(false);
                if !continues {
                    break; // next keyword reached
                }
                final_value.push_str(strip_value(&t));
                plus += 1;
            }
            if final_value.is_empty() || final_value.len() > max_len {
                let start = self.tokens[self.index].start;
                let end = self.tokens[self.index + plus].end();
                self.push_diagnostic(
                    start,
                    end,
                    Severity::Error,
                    format!(
                        "Expecting a value no longer than {}. Current value has length {}",
                        max_len,
                        final_value.len()
                    ),
                    None,
                );
            }
            self.index += plus;
            self.post_value_match(self.index.saturating_sub(1), node_id);
            return TryResult::Matched;
        }

        if special_list && (value.starts_with('(') || value.ends_with(',') || next_is_comma) {
            // A parenthesized comma list, consumed to the closing ")".
            let mut plus = 0usize;
            loop {
                if self.index + plus >= len {
                    let last = len - 1;
                    let (start, end) = (self.tokens[last].start, self.tokens[last].end());
                    self.push_diagnostic(
                        start,
                        end,
                        Severity::Error,
                        NO_CLOSING_PAREN_MSG.to_string(),
                        None,
                    );
                    return TryResult::Error;
                }
                let t = self.tokens[self.index + plus].value.clone();
                let stripped_len = strip_value(&t).len();
                if t.len() > 1 && (stripped_len == 0 || stripped_len > max_len) {
                    let (start, end) = (
                        self.tokens[self.index + plus].start,
                        self.tokens[self.index + plus].end(),
                    );
                    self.push_diagnostic(
                        start,
                        end,
                        Severity::Error,
                        format!(
                            "Expecting a value no longer than {}. Current value has length {}",
                            max_len, stripped_len
                        ),
                        None,
                    );
                }
                if t.ends_with(')') {
                    break;
                }
                self.tokens[self.index + plus].completion_items = Some(vec![
                    CompletionItem::operator(","),
                    CompletionItem::operator(")"),
                ]);
                plus += 1;
            }
            self.index += plus + 1;
            self.post_value_match(self.index - 1, node_id);
            return TryResult::Matched;
        }

        // A plain single-token value.
        if self.tokens[self.index].is_eo_statement {
            let (start, end) = (self.tokens[self.index].start, self.tokens[self.index].end());
            self.push_diagnostic(
                start,
                end,
                Severity::Error,
                format!(
                    "Expecting a value no longer than {} instead of an end-of-statement operator \".\"",
                    max_len
                ),
                None,
            );
            return TryResult::Error;
        }
        let stripped_len = strip_value(&value).len();
        if stripped_len == 0 || stripped_len > max_len {
            let (start, end) = (self.tokens[self.index].start, self.tokens[self.index].end());
            self.push_diagnostic(
                start,
                end,
                Severity::Error,
                format!(
                    "Expecting a value of length between 1 to {}. Current value has length {}",
                    max_len, stripped_len
                ),
                None,
            );
        }
        self.index += 1;
        self.post_value_match(self.index - 1, node_id);
        TryResult::Matched
    }

    fn try_date_time(&mut self, node_id: NodeId) -> TryResult {
        if self.tokens.len() <= self.index + 1 {
            return TryResult::Error;
        }
        let date_str = format!(
            "{} {}",
            self.tokens[self.index].value,
            self.tokens[self.index + 1].value
        );
        if is_date_time(&date_str) {
            self.index += 2;
            self.post_value_match(self.index - 1, node_id);
            return TryResult::Matched;
        }
        let (start, end) = (self.tokens[self.index].start, self.tokens[self.index].end());
        self.push_diagnostic(start, end, Severity::Error, DATE_TIME_MSG.to_string(), None);
        TryResult::Error
    }

    // ── Match side effects ───────────────────────────────────────────

    fn post_keyword_match(&mut self, start: usize, count: usize, phrase: &str, node_id: NodeId) {
        let tree = self.tree;

        for i in start..start + count {
            let value = self.tokens[i].value.clone();
            if value != value.to_uppercase() {
                let (s, e) = (self.tokens[i].start, self.tokens[i].end());
                self.push_diagnostic(s, e, Severity::Warning, UPPERCASE_MSG.to_string(), None);
            }
        }

        self.set_completion_for_keyword(start + count - 1, node_id);

        // Keywords matched directly under a FROM/TO head feed the memo.
        if let Some(parent) = tree.node(node_id).parent {
            if tree.node(parent).is_from {
                self.from_to.from.record(phrase);
            } else if tree.node(parent).is_to {
                self.from_to.to.record(phrase);
            }
        }

        // Formatting: clause heads start a fresh line and set the
        // indentation baseline for the values that follow.
        let node = tree.node(node_id);
        let first_synonym = node.first_synonym().unwrap_or_default();
        let clause_break = node.is_from
            || node.is_to
            || first_synonym == "OPTion"
            || first_synonym.starts_with("WHEre")
            || first_synonym == "THRough";
        if clause_break && start > 0 {
            let pad = 10usize.saturating_sub(self.tokens[start].value.len());
            self.tokens[start - 1].right_distance = Some(format!("\n{}", " ".repeat(pad)));
            self.base_indent = 11;
        } else if phrase.contains(' ') {
            self.tokens[start + count - 1].right_distance =
                Some(format!("\n{}", " ".repeat(self.base_indent)));
        }
    }

    fn post_value_match(&mut self, last_index: usize, node_id: NodeId) {
        self.set_completion_for_value(last_index, node_id);
        self.tokens[last_index].right_distance =
            Some(format!("\n{}", " ".repeat(self.base_indent)));
    }

    // ── Completion candidates ────────────────────────────────────────

    /// Candidates from a node's own children. The second value is true
    /// when the children settle the question: a lone required child
    /// either is the only sensible suggestion or (for values) leaves
    /// nothing to suggest.
    fn completion_from_children(&self, node_id: NodeId) -> (Vec<CompletionItem>, bool) {
        let tree = self.tree;
        let node = tree.node(node_id);
        let mut out = Vec::new();
        if node.children.is_empty() {
            return (out, false);
        }
        if node.children.len() == 1 && tree.node(node.children[0]).required {
            if let NodeKind::Keyword { synonyms } = &tree.node(node.children[0]).kind {
                for s in synonyms {
                    out.push(CompletionItem::keyword(s.to_ascii_uppercase()));
                }
                return (out, true);
            }
            return (Vec::new(), true);
        }
        for &child in &node.children {
            if let NodeKind::Keyword { synonyms } = &tree.node(child).kind {
                for s in synonyms {
                    out.push(CompletionItem::keyword(s.to_ascii_uppercase()));
                }
            }
        }
        (out, false)
    }

    /// Candidates collected from sibling alternatives up the ancestor
    /// chain, stopping at `no_backtrack` fences.
    fn completion_from_ancestors(&self, node_id: NodeId) -> Vec<CompletionItem> {
        let tree = self.tree;
        let mut out = Vec::new();
        let mut node = node_id;
        while let Some(parent) = tree.node(node).parent {
            for &child in &tree.node(parent).children {
                if child == node {
                    if let NodeKind::Keyword { synonyms } = &tree.node(child).kind {
                        if synonyms.len() < 2 {
                            continue; // the path already taken
                        }
                    }
                }
                if let NodeKind::Keyword { synonyms } = &tree.node(child).kind {
                    for s in synonyms {
                        out.push(CompletionItem::keyword(s.to_ascii_uppercase()));
                    }
                }
            }
            if tree.node(node).no_backtrack {
                break;
            }
            node = parent;
        }
        out
    }

    fn set_completion_for_keyword(&mut self, last_index: usize, node_id: NodeId) {
        let (mut items, done) = self.completion_from_children(node_id);
        if !done {
            // A leaf option keyword re-offers the whole OPTION set.
            let parent_is_option = self
                .tree
                .node(node_id)
                .parent
                .and_then(|p| self.tree.node(p).first_synonym())
                .map(|s| s.eq_ignore_ascii_case("OPTION"))
                .unwrap_or(false);
            if parent_is_option {
                items.extend(self.completion_from_ancestors(node_id));
            }
        }
        self.tokens[last_index].completion_items = Some(items);
    }

    fn set_completion_for_value(&mut self, last_index: usize, node_id: NodeId) {
        let (mut items, done) = self.completion_from_children(node_id);
        if !done {
            items.extend(self.completion_from_ancestors(node_id));
        }
        self.tokens[last_index].completion_items = Some(items);
    }

    // ── Diagnostics ──────────────────────────────────────────────────

    fn push_diagnostic(
        &mut self,
        start: usize,
        end: usize,
        severity: Severity,
        message: String,
        related: Option<RelatedInfo>,
    ) {
        if self.ctx.at_capacity() {
            return;
        }
        if start < self.stmt_start || end > self.stmt_end {
            return; // not inside this statement
        }
        self.ctx.count_one();
        self.diagnostics.push(Diagnostic {
            severity,
            start,
            end,
            message,
            related,
        });
    }

    fn invalid_word_at(&mut self, index: usize) {
        let related = if index >= 1 {
            related_from(&self.tokens[index - 1])
        } else {
            None
        };
        let (start, end) = (self.tokens[index].start, self.tokens[index].end());
        self.push_diagnostic(
            start,
            end,
            Severity::Error,
            INVALID_WORD_MSG.to_string(),
            related,
        );
    }

    fn incomplete_at_last(&mut self) {
        let last = self.tokens.len() - 1;
        let related = related_from(&self.tokens[last]);
        let (start, end) = (self.tokens[last].start, self.tokens[last].end());
        self.push_diagnostic(
            start,
            end,
            Severity::Error,
            INCOMPLETE_MSG.to_string(),
            related,
        );
    }

    fn check_end_of_statement(&mut self) {
        let Some(last) = self.tokens.last() else {
            return;
        };
        let (start, end, is_eos) = (last.start, last.end(), last.is_eo_statement);
        if !is_eos {
            self.push_diagnostic(start, end, Severity::Error, NO_EOS_MSG.to_string(), None);
            return;
        }
        if self.tokens.len() >= 2 {
            let second_last_end = self.tokens[self.tokens.len() - 2].end();
            if start == second_last_end {
                self.push_diagnostic(
                    start,
                    end,
                    Severity::Error,
                    SPACE_BEFORE_EOS_MSG.to_string(),
                    None,
                );
            }
        }
    }
}

/// Suggestion list built from the completion candidates recorded on
/// the token just before an error position.
fn related_from(token: &Token) -> Option<RelatedInfo> {
    let items = token.completion_items.as_ref()?;
    if items.is_empty() {
        return None;
    }
    let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
    Some(RelatedInfo {
        start: token.start,
        end: token.end(),
        message: format!("{}{}", CHOICE_MSG, labels.join(", ")),
    })
}

/// Strip grouping characters from a raw value token: a leading `(`,
/// a trailing `)` or `,`, then one matching pair of surrounding quotes.
fn strip_value(raw: &str) -> &str {
    let mut s = raw;
    if let Some(rest) = s.strip_prefix('(') {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix(')') {
        s = rest;
    } else if let Some(rest) = s.strip_suffix(',') {
        s = rest;
    }
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"'))
            || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s = &s[1..s.len() - 1];
    }
    s
}

/// `DDMMMYY HH:MM`: day 1-31 (one or two digits), any three-letter
/// month abbreviation, two-digit year, hour 0-23 (one or two digits),
/// two-digit minute.
fn is_date_time(s: &str) -> bool {
    let b = s.as_bytes();
    let mut i = 0;

    if i >= b.len() || !b[i].is_ascii_digit() {
        return false;
    }
    let day0 = b[i];
    i += 1;
    if i < b.len() && b[i].is_ascii_digit() {
        if day0 > b'3' || (day0 == b'3' && b[i] > b'1') {
            return false;
        }
        i += 1;
    }

    for _ in 0..3 {
        if i >= b.len() || !b[i].is_ascii_alphabetic() {
            return false;
        }
        i += 1;
    }
    for _ in 0..2 {
        if i >= b.len() || !b[i].is_ascii_digit() {
            return false;
        }
        i += 1;
    }

    let ws_start = i;
    while i < b.len() && b[i].is_ascii_whitespace() {
        i += 1;
    }
    if i == ws_start {
        return false;
    }

    if i >= b.len() || !b[i].is_ascii_digit() {
        return false;
    }
    let hour0 = b[i];
    i += 1;
    if i < b.len() && b[i].is_ascii_digit() {
        if hour0 > b'2' || (hour0 == b'2' && b[i] > b'3') {
            return false;
        }
        i += 1;
    }

    if i >= b.len() || b[i] != b':' {
        return false;
    }
    i += 1;
    i + 2 == b.len() && b[i].is_ascii_digit() && b[i] <= b'5' && b[i + 1].is_ascii_digit()
}
