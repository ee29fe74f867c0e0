//! LSP server main loop with request/notification dispatch.
//!
//! Uses `lsp-server` (synchronous, crossbeam-based) for the transport.
//! No async runtime needed -- every event is fully processed before
//! the next one is accepted, matching the engine's synchronous model.

use lsp_server::{Connection, Message, Notification, Response};
use lsp_types::notification::{
    DidChangeConfiguration, DidChangeTextDocument, DidCloseTextDocument, DidOpenTextDocument,
    Notification as _, PublishDiagnostics,
};
use lsp_types::request::Completion;
use lsp_types::{
    CompletionOptions, CompletionResponse, PublishDiagnosticsParams, ServerCapabilities,
    TextDocumentSyncCapability, TextDocumentSyncKind, TextDocumentSyncOptions, Uri,
};
use serde::Deserialize;

use scl_core::{Grammars, ValidationConfig};

use crate::completion;
use crate::diagnostics;
use crate::document::DocumentState;
use crate::line_index::LineIndex;

/// Run the LSP server over stdio until shutdown.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Grammar trees are the server's one startup prerequisite; a
    // broken descriptor aborts before the handshake.
    let grammars = Grammars::load()?;

    let (connection, io_threads) = Connection::stdio();

    // ── Initialize handshake ──────────────────────────────────────────
    let server_capabilities = build_capabilities();
    let init_json = serde_json::to_value(&server_capabilities)?;
    let init_params: lsp_types::InitializeParams =
        serde_json::from_value(connection.initialize(init_json)?)?;

    let related_supported = init_params
        .capabilities
        .text_document
        .as_ref()
        .and_then(|t| t.publish_diagnostics.as_ref())
        .and_then(|p| p.related_information)
        .unwrap_or(false);
    let config = parse_config(init_params.initialization_options.as_ref());

    // ── Main loop ─────────────────────────────────────────────────────
    let mut doc_state = DocumentState::new(config);

    for msg in &connection.receiver {
        match msg {
            Message::Request(req) => {
                if connection.handle_shutdown(&req)? {
                    break;
                }
                handle_request(&connection, &doc_state, req)?;
            }
            Message::Notification(not) => {
                handle_notification(
                    &connection,
                    &mut doc_state,
                    &grammars,
                    related_supported,
                    not,
                )?;
            }
            Message::Response(_) => {
                // Ignore responses (we don't send requests to the client)
            }
        }
    }

    io_threads.join()?;
    Ok(())
}

fn build_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::INCREMENTAL),
                ..Default::default()
            },
        )),
        completion_provider: Some(CompletionOptions {
            trigger_characters: Some(vec![" ".into()]),
            resolve_provider: Some(false),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn handle_request(
    connection: &Connection,
    doc_state: &DocumentState,
    req: lsp_server::Request,
) -> Result<(), Box<dyn std::error::Error>> {
    use lsp_types::request::Request as _;

    if req.method == Completion::METHOD {
        let params: lsp_types::CompletionParams = serde_json::from_value(req.params)?;
        let uri_str = params
            .text_document_position
            .text_document
            .uri
            .as_str()
            .to_string();
        let position = params.text_document_position.position;
        let items = match doc_state.get(&uri_str) {
            Some(entry) => {
                let index = LineIndex::new(&entry.document.text);
                let offset = index.offset(&entry.document.text, position);
                completion::to_completion_items(entry.document.completion_at(offset))
            }
            None => Vec::new(),
        };
        let result = CompletionResponse::Array(items);
        let resp = Response::new_ok(req.id, serde_json::to_value(result)?);
        connection.sender.send(Message::Response(resp))?;
    } else {
        let resp = Response::new_err(
            req.id,
            lsp_server::ErrorCode::MethodNotFound as i32,
            format!("method not found: {}", req.method),
        );
        connection.sender.send(Message::Response(resp))?;
    }
    Ok(())
}

fn handle_notification(
    connection: &Connection,
    doc_state: &mut DocumentState,
    grammars: &Grammars,
    related_supported: bool,
    not: Notification,
) -> Result<(), Box<dyn std::error::Error>> {
    match not.method.as_str() {
        m if m == DidOpenTextDocument::METHOD => {
            let params: lsp_types::DidOpenTextDocumentParams = serde_json::from_value(not.params)?;
            let uri = params.text_document.uri;
            doc_state.open(
                uri.as_str(),
                params.text_document.version,
                params.text_document.text,
                grammars,
            );
            publish_for(connection, doc_state, &uri, related_supported)?;
        }
        m if m == DidChangeTextDocument::METHOD => {
            let params: lsp_types::DidChangeTextDocumentParams =
                serde_json::from_value(not.params)?;
            let uri = params.text_document.uri;
            doc_state.apply_changes(
                uri.as_str(),
                params.text_document.version,
                params.content_changes,
                grammars,
            );
            publish_for(connection, doc_state, &uri, related_supported)?;
        }
        m if m == DidCloseTextDocument::METHOD => {
            let params: lsp_types::DidCloseTextDocumentParams = serde_json::from_value(not.params)?;
            let uri = params.text_document.uri;
            doc_state.close(uri.as_str());
            publish_diagnostics(connection, uri, Vec::new())?;
        }
        m if m == DidChangeConfiguration::METHOD => {
            let params: lsp_types::DidChangeConfigurationParams =
                serde_json::from_value(not.params)?;
            let config = parse_config(Some(&params.settings));
            doc_state.reconfigure(config, grammars);
            for uri_str in doc_state.uris() {
                if let Ok(uri) = uri_str.parse::<Uri>() {
                    publish_for(connection, doc_state, &uri, related_supported)?;
                }
            }
        }
        _ => {
            // Unknown notification -- ignore
        }
    }
    Ok(())
}

/// Send the current diagnostics of one open document to the client.
fn publish_for(
    connection: &Connection,
    doc_state: &DocumentState,
    uri: &Uri,
    related_supported: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let diags = match doc_state.get(uri.as_str()) {
        Some(entry) => diagnostics::to_lsp_diagnostics(&entry.document, uri, related_supported),
        None => Vec::new(),
    };
    publish_diagnostics(connection, uri.clone(), diags)
}

/// Send `textDocument/publishDiagnostics` notification to the client.
fn publish_diagnostics(
    connection: &Connection,
    uri: Uri,
    diagnostics: Vec<lsp_types::Diagnostic>,
) -> Result<(), Box<dyn std::error::Error>> {
    let params = PublishDiagnosticsParams {
        uri,
        diagnostics,
        version: None,
    };
    let not = Notification::new(PublishDiagnostics::METHOD.to_string(), params);
    connection.sender.send(Message::Notification(not))?;
    Ok(())
}

/// Editor-supplied settings, either at the top level or under an
/// `scl` section: `{ "maxNumberOfProblems": 500, "isREST": true }`.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "maxNumberOfProblems")]
    max_number_of_problems: Option<usize>,
    #[serde(rename = "isREST")]
    is_rest: Option<bool>,
}

fn parse_config(value: Option<&serde_json::Value>) -> ValidationConfig {
    let mut config = ValidationConfig::default();
    let Some(value) = value else {
        return config;
    };
    let scoped = value.get("scl").unwrap_or(value);
    if let Ok(raw) = serde_json::from_value::<RawConfig>(scoped.clone()) {
        if let Some(max) = raw.max_number_of_problems {
            config.max_number_of_problems = max;
        }
        if let Some(is_rest) = raw.is_rest {
            config.is_rest = is_rest;
        }
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_settings_at_top_level_and_under_scl_section() {
        let flat = json!({ "maxNumberOfProblems": 5, "isREST": true });
        let config = parse_config(Some(&flat));
        assert_eq!(config.max_number_of_problems, 5);
        assert!(config.is_rest);

        let scoped = json!({ "scl": { "maxNumberOfProblems": 7 } });
        let config = parse_config(Some(&scoped));
        assert_eq!(config.max_number_of_problems, 7);
        assert!(!config.is_rest);

        let config = parse_config(None);
        assert_eq!(config.max_number_of_problems, 1000);
    }
}
