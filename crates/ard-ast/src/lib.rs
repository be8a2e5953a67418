// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Syntax tree and source locations for the Ard language.
//!
//! This crate is shared by the parser (which builds the tree), the checker
//! (which types it) and the CLI (which renders diagnostics through the
//! [`SourceMap`]).

pub mod ast;
pub mod span;

pub use ast::*;
pub use span::{SourceFile, SourceMap, Span};
