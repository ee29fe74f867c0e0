//! Open-document state for the server.
//!
//! Tracks the core [`Document`] for every file the editor has open,
//! together with the one [`ValidationContext`] whose problem counter
//! spans all of them. Counter bookkeeping on open/change/close keeps
//! the cap meaningful as documents come and go.

use std::collections::HashMap;

use lsp_types::TextDocumentContentChangeEvent;
use scl_core::{Document, Grammars, ValidationConfig, ValidationContext};

use crate::line_index::LineIndex;

/// All documents currently open in the editor.
pub struct DocumentState {
    documents: HashMap<String, DocumentEntry>,
    pub ctx: ValidationContext,
}

/// One open document.
pub struct DocumentEntry {
    /// Editor-reported version number.
    pub version: i32,
    /// Parsed and validated document.
    pub document: Document,
}

impl DocumentState {
    pub fn new(config: ValidationConfig) -> Self {
        DocumentState {
            documents: HashMap::new(),
            ctx: ValidationContext::new(config),
        }
    }

    /// Track a newly opened document, or revalidate it from scratch if
    /// the editor re-opens a URI we already know.
    pub fn open(&mut self, uri: &str, version: i32, text: String, grammars: &Grammars) {
        match self.documents.get_mut(uri) {
            Some(entry) => {
                entry.version = version;
                entry.document.full_update(text, grammars, &mut self.ctx);
            }
            None => {
                let document = Document::open(text, grammars, &mut self.ctx);
                self.documents
                    .insert(uri.to_owned(), DocumentEntry { version, document });
            }
        }
    }

    /// Apply incremental (or full) content changes to an open
    /// document. Unknown URIs are ignored.
    pub fn apply_changes(
        &mut self,
        uri: &str,
        version: i32,
        changes: Vec<TextDocumentContentChangeEvent>,
        grammars: &Grammars,
    ) {
        let Some(entry) = self.documents.get_mut(uri) else {
            return;
        };
        entry.version = version;
        for change in changes {
            match change.range {
                Some(range) => {
                    let index = LineIndex::new(&entry.document.text);
                    let start = index.offset(&entry.document.text, range.start);
                    let end = index.offset(&entry.document.text, range.end);
                    entry
                        .document
                        .update(start, end, &change.text, grammars, &mut self.ctx);
                }
                None => {
                    entry
                        .document
                        .full_update(change.text, grammars, &mut self.ctx);
                }
            }
        }
    }

    /// Drop a closed document and give back its diagnostics share.
    pub fn close(&mut self, uri: &str) {
        if let Some(entry) = self.documents.remove(uri) {
            self.ctx.release(entry.document.diagnostic_count());
        }
    }

    pub fn get(&self, uri: &str) -> Option<&DocumentEntry> {
        self.documents.get(uri)
    }

    pub fn uris(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    /// Swap in a new configuration and revalidate everything under it.
    pub fn reconfigure(&mut self, config: ValidationConfig, grammars: &Grammars) {
        self.ctx.config = config;
        let uris = self.uris();
        for uri in uris {
            if let Some(entry) = self.documents.get_mut(&uri) {
                let text = entry.document.text.clone();
                entry.document.full_update(text, grammars, &mut self.ctx);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{Position, Range};

    fn grammars() -> Grammars {
        Grammars::load().expect("grammars load")
    }

    #[test]
    fn open_change_close_keeps_the_counter_balanced() {
        let grammars = grammars();
        let mut state = DocumentState::new(ValidationConfig::default());

        state.open("file:///a.scl", 1, "NOPE .".to_string(), &grammars);
        assert_eq!(state.ctx.number_of_problems, 1);

        // Replace the broken statement with a valid one.
        let change = TextDocumentContentChangeEvent {
            range: Some(Range::new(Position::new(0, 0), Position::new(0, 4))),
            range_length: None,
            text: "SET ACTION ADD".to_string(),
        };
        state.apply_changes("file:///a.scl", 2, vec![change], &grammars);
        assert_eq!(state.ctx.number_of_problems, 0);
        let entry = state.get("file:///a.scl").expect("open");
        assert_eq!(entry.document.text, "SET ACTION ADD .");
        assert_eq!(entry.version, 2);

        state.close("file:///a.scl");
        assert_eq!(state.ctx.number_of_problems, 0);
        assert!(state.get("file:///a.scl").is_none());
    }

    #[test]
    fn reopening_a_uri_revalidates_it() {
        let grammars = grammars();
        let mut state = DocumentState::new(ValidationConfig::default());
        state.open("file:///a.scl", 1, "NOPE .".to_string(), &grammars);
        state.open("file:///a.scl", 2, "SET ACTION ADD .".to_string(), &grammars);
        assert_eq!(state.ctx.number_of_problems, 0);
    }
}
