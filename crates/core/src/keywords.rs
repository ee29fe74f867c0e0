//! Canonical keyword matching.
//!
//! A canonical keyword encodes its own abbreviation rule: the leading
//! run of uppercase letters is mandatory, the trailing lowercase run is
//! optional and may be right-truncated at any point. `APPRove` accepts
//! `APP`, `APPR`, ... `APPROVE` (case-insensitively) and rejects `APPX`.
//! Operators (`=`) and all-lowercase filler words (`if`, `present`)
//! match by case-insensitive equality or suffix truncation of the whole
//! word.

use crate::lexer::Token;

/// Match one input token against one canonical keyword word.
pub fn match_keyword(input: &str, canonical: &str) -> bool {
    let input = input.trim();
    if input.is_empty() {
        return false;
    }
    if input.eq_ignore_ascii_case(canonical) {
        return true;
    }

    let (mandatory, optional) = split_canonical(canonical);
    let key = input.to_ascii_uppercase();
    if !key.starts_with(mandatory) {
        return false;
    }
    let remainder = &key[mandatory.len()..];
    optional.to_ascii_uppercase().starts_with(remainder)
}

/// Split a canonical word into its mandatory uppercase prefix and the
/// optional remainder.
fn split_canonical(canonical: &str) -> (&str, &str) {
    let split = canonical
        .find(|c: char| !c.is_ascii_uppercase())
        .unwrap_or(canonical.len());
    (&canonical[..split], &canonical[split..])
}

/// Match a canonical keyphrase (one or more space-separated words)
/// against consecutive tokens starting at `index`.
///
/// Returns the number of tokens consumed. Words written in lowercase
/// are optional: the phrase still matches when they are absent at the
/// end of input or replaced by unrelated text. Words containing an
/// uppercase mandatory part, and the literal operators `.` and `=`,
/// must match. A phrase that matches zero tokens is treated as no
/// match.
pub fn keyphrase_match(tokens: &[Token], index: usize, phrase: &str) -> Option<usize> {
    let words: Vec<&str> = phrase.split_whitespace().collect();
    let mut matched = 0;
    for (i, word) in words.iter().enumerate() {
        let compulsory = *word == "." || *word == "=" || has_mandatory_part(word);
        match tokens.get(index + i) {
            None => {
                if compulsory {
                    return None;
                }
                break;
            }
            Some(token) => {
                if !match_keyword(&token.value, word) {
                    if compulsory {
                        return None;
                    }
                    break;
                }
            }
        }
        matched = i + 1;
    }
    if matched == 0 {
        None
    } else {
        Some(matched)
    }
}

fn has_mandatory_part(word: &str) -> bool {
    word.chars().any(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Tokenizer;

    fn tokens(input: &str) -> Vec<Token> {
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

    #[test]
    fn mandatory_prefix_and_optional_suffix() {
        assert!(match_keyword("input", "INPut"));
        assert!(match_keyword("inp", "INPut"));
        assert!(!match_keyword("in", "INPut"));
        assert!(!match_keyword("inputa", "INPut"));
    }

    #[test]
    fn suffix_must_truncate_from_the_right() {
        assert!(match_keyword("APPR", "APPRove"));
        assert!(match_keyword("approve", "APPRove"));
        assert!(!match_keyword("APPX", "APPRove"));
        assert!(!match_keyword("APPROVER", "APPRove"));
    }

    #[test]
    fn operators_match_exactly() {
        assert!(match_keyword("=", "="));
        assert!(!match_keyword("==", "="));
        assert!(!match_keyword("", "="));
    }

    #[test]
    fn lowercase_words_match_by_truncation() {
        assert!(match_keyword("if", "if"));
        assert!(match_keyword("I", "if"));
        assert!(!match_keyword("of", "if"));
    }

    #[test]
    fn multi_word_phrase_consumes_consecutive_tokens() {
        let toks = tokens("OVERRIDE SIGNOUT CCID");
        assert_eq!(keyphrase_match(&toks, 0, "OVErride SIGNOut"), Some(2));
        assert_eq!(keyphrase_match(&toks, 0, "OVErride"), Some(1));
        assert_eq!(keyphrase_match(&toks, 1, "OVErride SIGNOut"), None);
    }

    #[test]
    fn optional_trailing_words_may_be_absent() {
        let toks = tokens("UPDATE iF");
        assert_eq!(keyphrase_match(&toks, 0, "UPDate if present"), Some(2));
        let toks = tokens("UPDATE");
        assert_eq!(keyphrase_match(&toks, 0, "UPDate if present"), Some(1));
        let toks = tokens("UPDATE NONSENSE");
        assert_eq!(keyphrase_match(&toks, 0, "UPDate if present"), Some(1));
    }

    #[test]
    fn compulsory_mid_phrase_word_must_match() {
        let toks = tokens("NEW X");
        assert_eq!(keyphrase_match(&toks, 0, "NEW VERsion"), None);
        let toks = tokens("NEW VER");
        assert_eq!(keyphrase_match(&toks, 0, "NEW VERsion"), Some(2));
    }
}
