//! Parse error types.

use ard_ast::Span;
use ard_lexer::Token;
use thiserror::Error;

/// Parse error with source location.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
    pub message: String,
}

/// Category of parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A different token was expected here.
    UnexpectedToken,
    /// Input ended in the middle of a construct.
    UnexpectedEof,
    /// Tokens are present but violate the grammar (including lexing failures).
    InvalidSyntax,
}

impl ParseError {
    pub fn expected_token(expected: Token, found: Option<Token>, span: Span) -> Self {
        match found {
            Some(token) => Self {
                kind: ParseErrorKind::UnexpectedToken,
                span,
                message: format!("expected `{expected}`, found `{token}`"),
            },
            None => Self {
                kind: ParseErrorKind::UnexpectedEof,
                span,
                message: format!("expected `{expected}`, found end of input"),
            },
        }
    }

    pub fn unexpected_token(found: Option<&Token>, context: &str, span: Span) -> Self {
        match found {
            Some(token) => Self {
                kind: ParseErrorKind::UnexpectedToken,
                span,
                message: format!("unexpected `{token}` {context}"),
            },
            None => Self {
                kind: ParseErrorKind::UnexpectedEof,
                span,
                message: format!("unexpected end of input {context}"),
            },
        }
    }

    pub fn invalid_syntax(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::InvalidSyntax,
            span,
            message: message.into(),
        }
    }
}
