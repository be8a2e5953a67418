// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Hand-written recursive descent parser for Ard.
//!
//! ## Architecture
//!
//! - `stream`: TokenStream wrapper with lookahead and line tracking
//! - `error`: ParseError
//! - `decl`: statements and declarations (keyword-dispatched)
//! - `expr`: expressions using precedence climbing
//! - `types`: type annotations
//!
//! ```
//! let program = ard_parser::parse_program("let x = 1 + 2", 0).unwrap();
//! assert_eq!(program.statements.len(), 1);
//! ```

mod decl;
mod error;
mod expr;
mod stream;
mod types;

pub use error::{ParseError, ParseErrorKind};
use stream::TokenStream;

use ard_ast::{Program, Span};
use tracing::debug;

/// Parse Ard source text into a [`Program`].
///
/// Lexing errors are reported before any parsing happens. Parse errors are
/// collected across statements, so one call reports as many as it can.
pub fn parse_program(source: &str, file_id: u16) -> Result<Program, Vec<ParseError>> {
    let tokens = ard_lexer::tokenize(source).map_err(|errors| {
        errors
            .into_iter()
            .map(|err| {
                ParseError::invalid_syntax(
                    format!("invalid token `{}`", err.text),
                    Span::new(file_id, err.range.start as u32, err.range.end as u32),
                )
            })
            .collect::<Vec<_>>()
    })?;
    let mut stream = TokenStream::new(&tokens, source, file_id);
    let program = decl::parse_program(&mut stream)?;
    debug!(
        file_id,
        imports = program.imports.len(),
        statements = program.statements.len(),
        "parsed program"
    );
    Ok(program)
}
