//! Quote-aware streaming tokenizer for SCL text.
//!
//! A token is a maximal run of non-whitespace characters, except that a
//! run with unbalanced quotes absorbs the following whitespace and
//! non-whitespace runs until the quotes balance or input ends. A run of
//! length 1 that is `.` is the end-of-statement operator; a longer run
//! ending in `.` is split into the run and a pending `.` token, so `.`
//! terminates a statement even when glued to a value. Tokenization
//! never fails -- an unterminated quote simply absorbs the rest of the
//! input into one final token.

use crate::diagnostics::CompletionItem;

/// One positioned piece of SCL, plus the annotations the parser
/// attaches while walking the grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Raw text of the piece, quotes included.
    pub value: String,
    /// Byte offset of the first character in the owning document.
    pub start: usize,
    /// True when this token is the end-of-statement operator `.`.
    pub is_eo_statement: bool,
    /// Completion candidates valid after this token, set by the parser.
    pub completion_items: Option<Vec<CompletionItem>>,
    /// Formatting hint: literal text to insert after this token.
    pub right_distance: Option<String>,
}

impl Token {
    fn new(value: &str, start: usize, is_eo_statement: bool) -> Self {
        Token {
            value: value.to_string(),
            start,
            is_eo_statement,
            completion_items: None,
            right_distance: None,
        }
    }

    /// Byte offset one past the last character.
    pub fn end(&self) -> usize {
        self.start + self.value.len()
    }

    /// True for the empty token returned at end of input.
    pub fn is_end_of_input(&self) -> bool {
        self.value.is_empty()
    }

    /// True for the single-character operators `,` `=` `(` `)`.
    pub fn is_operator(&self) -> bool {
        self.value.len() == 1 && matches!(self.value.as_bytes()[0], b',' | b'=' | b'(' | b')')
    }
}

/// Streaming tokenizer with one token of lookahead.
pub struct Tokenizer<'a> {
    content: &'a str,
    /// Position of the next unread character.
    next_start: usize,
    /// Filled by `peek_next`, consumed by `read_next`.
    peeked: Option<Token>,
    /// Position of a `.` split off the end of the previous run.
    pending_dot: Option<usize>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(content: &'a str) -> Self {
        Tokenizer {
            content,
            next_start: 0,
            peeked: None,
            pending_dot: None,
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek_next(&mut self) -> &Token {
        if self.peeked.is_none() {
            let token = self.check_next();
            self.peeked = Some(token);
        }
        self.peeked.as_ref().expect("peeked token present")
    }

    /// Consume and return the next token. At end of input this keeps
    /// returning the empty token.
    pub fn read_next(&mut self) -> Token {
        match self.peeked.take() {
            Some(token) => token,
            None => self.check_next(),
        }
    }

    fn check_next(&mut self) -> Token {
        if let Some(pos) = self.pending_dot.take() {
            return Token::new(".", pos, true);
        }

        let bytes = self.content.as_bytes();
        let mut i = self.next_start;
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            return Token::new("", i, false);
        }

        let piece_end = self.scan_piece(i);
        let piece = &self.content[i..piece_end];
        self.next_start = piece_end;

        if piece == "." {
            return Token::new(".", i, true);
        }
        if piece.len() > 1 && piece.ends_with('.') {
            self.pending_dot = Some(i + piece.len() - 1);
            return Token::new(&piece[..piece.len() - 1], i, false);
        }
        Token::new(piece, i, false)
    }

    /// Extend a non-whitespace run across whitespace while its quotes
    /// stay unbalanced.
    fn scan_piece(&self, start: usize) -> usize {
        let bytes = self.content.as_bytes();
        let mut j = start;
        loop {
            while j < bytes.len() && !bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if quotes_balanced(&self.content[start..j]) || j >= bytes.len() {
                return j;
            }
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
        }
    }
}

/// True when the quotes in `s` are balanced and properly nested:
/// single quotes enclosed by double quotes or vice versa, each kind
/// individually balanced.
fn quotes_balanced(s: &str) -> bool {
    if !s.contains('\'') && !s.contains('"') {
        return true;
    }

    let mut first_single: Option<usize> = None;
    let mut first_double: Option<usize> = None;
    let mut last_single: Option<usize> = None;
    let mut last_double: Option<usize> = None;
    let mut singles = 0usize;
    let mut doubles = 0usize;

    for (i, b) in s.bytes().enumerate() {
        match b {
            b'\'' => {
                first_single.get_or_insert(i);
                last_single = Some(i);
                singles += 1;
            }
            b'"' => {
                first_double.get_or_insert(i);
                last_double = Some(i);
                doubles += 1;
            }
            _ => {}
        }
    }

    let first_quote_single = match (first_single, first_double) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(fs), Some(fd)) => fd > fs,
    };
    let last_quote_single = match (last_single, last_double) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(ls), Some(ld)) => ld < ls,
    };

    if singles % 2 == 0 && doubles % 2 == 0 {
        // Both balanced, but reject interleavings like '"'" where the
        // outermost quote kind differs at the two ends.
        return first_quote_single == last_quote_single;
    }
    if singles % 2 != 0 && doubles > 0 && doubles % 2 == 0 && !first_quote_single {
        return true; // balanced double quotes enclose the odd single
    }
    if doubles % 2 != 0 && singles > 0 && singles % 2 == 0 && first_quote_single {
        return true; // balanced single quotes enclose the odd double
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tokens(input: &str) -> Vec<Token> {
        let mut tz = Tokenizer::new(input);
        let mut out = Vec::new();
        loop {
            let t = tz.read_next();
            if t.is_end_of_input() {
                break;
            }
            out.push(t);
        }
        out
    }

    fn values(input: &str) -> Vec<String> {
        all_tokens(input).into_iter().map(|t| t.value).collect()
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(values("SET ACTION ADD ."), vec!["SET", "ACTION", "ADD", "."]);
    }

    #[test]
    fn offsets_are_absolute() {
        let tokens = all_tokens("  SET  ACTION");
        assert_eq!(tokens[0].start, 2);
        assert_eq!(tokens[1].start, 7);
        assert_eq!(tokens[1].end(), 13);
    }

    #[test]
    fn quoted_value_with_spaces_is_one_token() {
        assert_eq!(
            values("COMMENT 'a b c' ."),
            vec!["COMMENT", "'a b c'", "."]
        );
    }

    #[test]
    fn nested_quotes_stay_together() {
        assert_eq!(values(r#"CCID "it's fine" ."#), vec!["CCID", r#""it's fine""#, "."]);
    }

    #[test]
    fn unbalanced_quote_absorbs_rest_of_input() {
        let tokens = all_tokens("ADD 'oops the quote never closes");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].value, "'oops the quote never closes");
    }

    #[test]
    fn trailing_dot_is_split_off() {
        let tokens = all_tokens("SET ACTION RES.");
        assert_eq!(
            tokens.iter().map(|t| t.value.as_str()).collect::<Vec<_>>(),
            vec!["SET", "ACTION", "RES", "."]
        );
        let res = &tokens[2];
        let dot = &tokens[3];
        assert!(!res.is_eo_statement);
        assert!(dot.is_eo_statement);
        // The dot sits exactly where it was in the source, glued to RES.
        assert_eq!(dot.start, res.end());
    }

    #[test]
    fn lone_dot_is_end_of_statement() {
        let tokens = all_tokens(" . ");
        assert_eq!(tokens.len(), 1);
        assert!(tokens[0].is_eo_statement);
        assert_eq!(tokens[0].start, 1);
    }

    #[test]
    fn single_char_operators_are_recognized() {
        let tokens = all_tokens("GROUP = name ( a , b )");
        assert!(tokens[1].is_operator());
        assert!(tokens[3].is_operator());
        assert!(tokens[5].is_operator());
        assert!(!tokens[0].is_operator());
        assert!(!tokens[2].is_operator());
    }

    #[test]
    fn peek_does_not_consume() {
        let mut tz = Tokenizer::new("SET ACTION");
        assert_eq!(tz.peek_next().value, "SET");
        assert_eq!(tz.peek_next().value, "SET");
        assert_eq!(tz.read_next().value, "SET");
        assert_eq!(tz.read_next().value, "ACTION");
        assert!(tz.read_next().is_end_of_input());
        assert!(tz.read_next().is_end_of_input());
    }

    #[test]
    fn reconstruction_round_trip() {
        // Concatenating token values with the original whitespace in
        // between reproduces the input exactly.
        let input = "  ADD ELEMENT 'PM OVE'\n  FROM DSNAME 'A.B'  . ";
        let tokens = all_tokens(input);
        let mut rebuilt = String::new();
        let mut pos = 0;
        for t in &tokens {
            rebuilt.push_str(&input[pos..t.start]);
            rebuilt.push_str(&t.value);
            pos = t.end();
        }
        rebuilt.push_str(&input[pos..]);
        assert_eq!(rebuilt, input);
    }

    #[test]
    fn quote_balance_rules() {
        assert!(quotes_balanced("abc"));
        assert!(quotes_balanced("'a b'"));
        assert!(quotes_balanced("\"a 'b' c\""));
        assert!(quotes_balanced("'a \"b\" c'"));
        assert!(!quotes_balanced("'ab"));
        assert!(!quotes_balanced("\"a'b\"'"));
        // Odd single quote enclosed by balanced double quotes.
        assert!(quotes_balanced("\"it's\""));
        // Odd double quote enclosed by balanced single quotes.
        assert!(quotes_balanced("'say \"hi'"));
    }
}
