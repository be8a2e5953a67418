//! Token stream wrapper for the hand-written parser.

use crate::ParseError;
use ard_ast::Span;
use ard_lexer::Token;
use std::ops::Range;

/// Token stream with lookahead, backtracking and span tracking.
///
/// Ard has no statement terminator, so the stream also remembers which
/// tokens start a new line. The parser consults this where a token could
/// either continue the previous expression or begin a new statement.
pub struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    line_start: Vec<bool>,
    pos: usize,
    file_id: u16,
    source_len: usize,
    /// Cleared while parsing `if`/`while`/`for`/`match` heads, where `Name {`
    /// opens a block rather than a struct literal.
    pub(crate) struct_literals: bool,
}

impl<'src> TokenStream<'src> {
    pub fn new(tokens: &'src [(Token, Range<usize>)], source: &str, file_id: u16) -> Self {
        let mut line_start = Vec::with_capacity(tokens.len());
        let mut prev_end = 0;
        for (_, range) in tokens {
            let gap = source.get(prev_end..range.start).unwrap_or("");
            line_start.push(prev_end == 0 || gap.contains('\n'));
            prev_end = range.end;
        }
        Self {
            tokens,
            line_start,
            pos: 0,
            file_id,
            source_len: source.len(),
            struct_literals: true,
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(tok, _)| tok)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|(tok, _)| tok)
    }

    /// Advance to the next token and return the current one.
    pub fn advance(&mut self) -> Option<&Token> {
        let token = self.tokens.get(self.pos).map(|(tok, _)| tok);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token has the same kind as `expected`.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Consume the current token if it matches.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Expect a specific token and advance past it.
    pub fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let span = self.current_span();
            self.advance();
            Ok(span)
        } else {
            Err(ParseError::expected_token(
                expected,
                self.peek().cloned(),
                self.current_span(),
            ))
        }
    }

    /// Expect an identifier and return its name with span.
    pub fn expect_ident(&mut self, context: &str) -> Result<ard_ast::Ident, ParseError> {
        let span = self.current_span();
        match self.peek() {
            Some(Token::Ident(name)) => {
                let ident = ard_ast::Ident::new(name.as_ref(), span);
                self.advance();
                Ok(ident)
            }
            other => Err(ParseError::unexpected_token(other, context, span)),
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// True if the current token is the first on its source line.
    pub fn at_line_start(&self) -> bool {
        self.line_start.get(self.pos).copied().unwrap_or(true)
    }

    pub fn current_pos(&self) -> usize {
        self.pos
    }

    /// Rewind to a position saved with `current_pos`.
    pub fn reset(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len());
    }

    /// Span from the token at `start` to the last consumed token.
    pub fn span_from(&self, start: usize) -> Span {
        let start_byte = self
            .tokens
            .get(start)
            .map(|(_, range)| range.start)
            .unwrap_or(self.source_len);
        let end_byte = if self.pos > start {
            self.tokens
                .get(self.pos - 1)
                .map(|(_, range)| range.end)
                .unwrap_or(start_byte)
        } else {
            start_byte
        };
        Span::new(self.file_id, start_byte as u32, end_byte as u32)
    }

    /// Span of the current token, or an empty span at end of input.
    pub fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some((_, range)) => Span::new(self.file_id, range.start as u32, range.end as u32),
            None => {
                let end = self
                    .tokens
                    .last()
                    .map(|(_, range)| range.end)
                    .unwrap_or(self.source_len);
                Span::new(self.file_id, end as u32, end as u32)
            }
        }
    }

    /// Skip ahead to the next line that starts with a statement keyword.
    pub fn synchronize(&mut self) {
        self.advance();
        while !self.at_end() {
            if self.at_line_start()
                && matches!(
                    self.peek(),
                    Some(Token::Use)
                        | Some(Token::Let)
                        | Some(Token::Mut)
                        | Some(Token::Fn)
                        | Some(Token::Extern)
                        | Some(Token::Struct)
                        | Some(Token::Impl)
                        | Some(Token::Type)
                        | Some(Token::While)
                        | Some(Token::For)
                )
            {
                break;
            }
            self.advance();
        }
    }

    pub fn file_id(&self) -> u16 {
        self.file_id
    }
}
