//! Core diagnostics to `lsp_types::Diagnostic` conversion.
//!
//! Offsets become line/character ranges via [`LineIndex`]; the
//! related-information suggestion list is only attached when the
//! client declared the capability.

use lsp_types::{
    Diagnostic, DiagnosticRelatedInformation, DiagnosticSeverity, Location, Range, Uri,
};
use scl_core::{Document, Severity};

use crate::line_index::LineIndex;

/// Convert every diagnostic of `document` for publishing.
pub fn to_lsp_diagnostics(
    document: &Document,
    uri: &Uri,
    related_supported: bool,
) -> Vec<Diagnostic> {
    let index = LineIndex::new(&document.text);
    let text = &document.text;
    document
        .diagnostics()
        .map(|d| {
            let severity = match d.severity {
                Severity::Error => DiagnosticSeverity::ERROR,
                Severity::Warning => DiagnosticSeverity::WARNING,
            };
            let related_information = if related_supported {
                d.related.as_ref().map(|r| {
                    vec![DiagnosticRelatedInformation {
                        location: Location {
                            uri: uri.clone(),
                            range: Range::new(
                                index.position(text, r.start),
                                index.position(text, r.end),
                            ),
                        },
                        message: r.message.clone(),
                    }]
                })
            } else {
                None
            };
            Diagnostic {
                range: Range::new(index.position(text, d.start), index.position(text, d.end)),
                severity: Some(severity),
                source: Some("scl".to_string()),
                message: d.message.clone(),
                related_information,
                ..Default::default()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scl_core::{Grammars, ValidationContext};
    use std::str::FromStr;

    #[test]
    fn converts_offsets_and_gates_related_information() {
        let grammars = Grammars::load().expect("grammars load");
        let mut ctx = ValidationContext::default();
        let document = Document::open(" SET ACTION INVALID . ", &grammars, &mut ctx);
        let uri = Uri::from_str("file:///a.scl").expect("uri");

        let with_related = to_lsp_diagnostics(&document, &uri, true);
        assert_eq!(with_related.len(), 1);
        assert_eq!(with_related[0].severity, Some(DiagnosticSeverity::ERROR));
        assert_eq!(with_related[0].range.start, lsp_types::Position::new(0, 12));
        assert_eq!(with_related[0].range.end, lsp_types::Position::new(0, 19));
        assert!(with_related[0].related_information.is_some());

        let without_related = to_lsp_diagnostics(&document, &uri, false);
        assert!(without_related[0].related_information.is_none());
    }
}
