//! SCL Language Server Protocol implementation for IDE integration.
//!
//! Provides live diagnostics and completion for SCL documents over
//! stdio, with incremental text synchronization feeding the core
//! document model. Connects to editors via the `scl lsp` CLI
//! subcommand.

pub mod completion;
pub mod diagnostics;
pub mod document;
pub mod line_index;
pub mod server;

/// Run the LSP server over stdio. This is the public entry point
/// called by `scl lsp`.
pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    server::run()
}
