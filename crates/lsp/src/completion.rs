//! Core completion candidates to `lsp_types::CompletionItem`.

use lsp_types::{CompletionItem, CompletionItemKind};
use scl_core::CompletionKind;

/// Convert the engine's candidates into editor completion items. The
/// inserted text carries a trailing space so the user can keep typing
/// the next token immediately.
pub fn to_completion_items(items: Vec<scl_core::CompletionItem>) -> Vec<CompletionItem> {
    items
        .into_iter()
        .map(|item| {
            let (kind, detail) = match item.kind {
                CompletionKind::Keyword => (CompletionItemKind::KEYWORD, "SCL keyword"),
                CompletionKind::Value => (CompletionItemKind::VALUE, "SCL value"),
                CompletionKind::Operator => (CompletionItemKind::OPERATOR, "SCL operator"),
            };
            CompletionItem {
                label: item.label.clone(),
                kind: Some(kind),
                detail: Some(detail.to_string()),
                insert_text: Some(format!("{} ", item.label)),
                ..Default::default()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_and_appends_insert_space() {
        let items = to_completion_items(vec![
            scl_core::CompletionItem::keyword("ELEMENT"),
            scl_core::CompletionItem::operator(")"),
        ]);
        assert_eq!(items[0].kind, Some(CompletionItemKind::KEYWORD));
        assert_eq!(items[0].insert_text.as_deref(), Some("ELEMENT "));
        assert_eq!(items[1].kind, Some(CompletionItemKind::OPERATOR));
    }
}
