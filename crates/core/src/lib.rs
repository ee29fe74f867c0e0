//! scl-core: validation engine for the SCL configuration language.
//!
//! Turns raw editor text into per-statement diagnostics, per-token
//! completion candidates and formatting hints by walking each
//! statement against a declarative, data-loaded grammar tree.
//!
//! # Public API
//!
//! Key types are re-exported at the crate root:
//!
//! - [`Grammars::load()`] -- load the built-in grammar trees once at
//!   startup (fatal on a broken descriptor)
//! - [`Document`] -- open, update and query one document
//! - [`ValidationConfig`] / [`ValidationContext`] -- the problem cap
//!   and counter threaded through every pass
//! - [`Diagnostic`], [`CompletionItem`], [`Token`] -- the produced
//!   values
//!
//! The pipeline: text → [`lexer::Tokenizer`] → statement splitting in
//! [`document`] → grammar walk in [`parser`] over [`grammar`] trees.

pub mod diagnostics;
pub mod document;
pub mod grammar;
pub mod keywords;
pub mod lexer;
pub mod parser;

pub use diagnostics::{
    CompletionItem, CompletionKind, Diagnostic, RelatedInfo, Severity, ValidationConfig,
    ValidationContext,
};
pub use document::{action_completion, Document, FromToState, Statement, ACTIONS};
pub use grammar::{GrammarError, Grammars};
pub use lexer::{Token, Tokenizer};
