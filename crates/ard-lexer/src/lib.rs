// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for Ard source code.
//!
//! Tokenization is generated by `logos`. Whitespace and `//` comments are
//! skipped. Numeric literals keep their source text so the checker can decide
//! between `Int` and `Float` and report malformed numbers itself.
//!
//! ```
//! # use ard_lexer::Token;
//! # use logos::Logos;
//! let tokens: Vec<_> = Token::lexer("let x = 1").filter_map(Result::ok).collect();
//! assert_eq!(tokens.len(), 4);
//! ```

use logos::Logos;
use std::fmt;
use std::ops::Range;
use std::rc::Rc;

/// Ard token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"//[^\n]*")]
pub enum Token {
    // === Keywords ===
    #[token("use")]
    Use,
    #[token("as")]
    As,
    #[token("let")]
    Let,
    #[token("mut")]
    Mut,
    #[token("fn")]
    Fn,
    #[token("extern")]
    Extern,
    #[token("struct")]
    Struct,
    #[token("impl")]
    Impl,
    #[token("type")]
    Type,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("break")]
    Break,
    #[token("match")]
    Match,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("and")]
    And,
    #[token("or")]
    Or,
    #[token("not")]
    Not,

    // === Operators ===
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("=")]
    Eq,
    #[token("=>")]
    FatArrow,
    #[token(":")]
    Colon,
    #[token("::")]
    ColonColon,
    #[token(".")]
    Dot,
    #[token("..")]
    DotDot,
    #[token(",")]
    Comma,
    #[token("|")]
    Pipe,
    #[token("?")]
    Question,
    #[token("!")]
    Bang,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // === Literals ===
    /// Numeric literal, kept as written (`42`, `3.14`).
    #[regex(r"[0-9]+", |lex| Rc::from(lex.slice()))]
    #[regex(r"[0-9]+\.[0-9]+", |lex| Rc::from(lex.slice()))]
    Number(Rc<str>),

    /// String literal with escapes resolved.
    #[regex(r#""([^"\\]|\\.)*""#, |lex| {
        let s = lex.slice();
        unescape_string(&s[1..s.len() - 1]).map(|s| Rc::from(s.as_str()))
    })]
    Str(Rc<str>),

    /// Generic type parameter `$T`, stored without the `$`.
    #[regex(r"\$[A-Za-z_][A-Za-z0-9_]*", |lex| Rc::from(&lex.slice()[1..]))]
    Generic(Rc<str>),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| Rc::from(lex.slice()))]
    Ident(Rc<str>),
}

/// Unescape the content of a string literal.
fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => result.push('\n'),
                'r' => result.push('\r'),
                't' => result.push('\t'),
                '\\' => result.push('\\'),
                '"' => result.push('"'),
                '0' => result.push('\0'),
                _ => return None,
            }
        } else {
            result.push(c);
        }
    }
    Some(result)
}

impl Token {
    /// Source text of a fixed token; `None` for tokens carrying data.
    pub fn fixed_text(&self) -> Option<&'static str> {
        let text = match self {
            Token::Use => "use",
            Token::As => "as",
            Token::Let => "let",
            Token::Mut => "mut",
            Token::Fn => "fn",
            Token::Extern => "extern",
            Token::Struct => "struct",
            Token::Impl => "impl",
            Token::Type => "type",
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::For => "for",
            Token::In => "in",
            Token::Break => "break",
            Token::Match => "match",
            Token::True => "true",
            Token::False => "false",
            Token::And => "and",
            Token::Or => "or",
            Token::Not => "not",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::EqEq => "==",
            Token::BangEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::Eq => "=",
            Token::FatArrow => "=>",
            Token::Colon => ":",
            Token::ColonColon => "::",
            Token::Dot => ".",
            Token::DotDot => "..",
            Token::Comma => ",",
            Token::Pipe => "|",
            Token::Question => "?",
            Token::Bang => "!",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Number(_) | Token::Str(_) | Token::Generic(_) | Token::Ident(_) => return None,
        };
        Some(text)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(text) => write!(f, "{text}"),
            Token::Str(s) => write!(f, "\"{s}\""),
            Token::Generic(name) => write!(f, "${name}"),
            Token::Ident(name) => write!(f, "{name}"),
            fixed => write!(f, "{}", fixed.fixed_text().unwrap_or("?")),
        }
    }
}

/// A lexing failure at a byte range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub range: Range<usize>,
    pub text: String,
}

/// Tokenize `source`, pairing each token with its byte range.
///
/// All invalid tokens are collected; any failure makes the whole call fail.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, Vec<LexError>> {
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut lexer = Token::lexer(source);
    while let Some(result) = lexer.next() {
        match result {
            Ok(token) => tokens.push((token, lexer.span())),
            Err(()) => errors.push(LexError {
                range: lexer.span(),
                text: lexer.slice().to_string(),
            }),
        }
    }
    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        Token::lexer(source).filter_map(|result| result.ok()).collect()
    }

    fn ident(s: &str) -> Token {
        Token::Ident(Rc::from(s))
    }

    fn number(s: &str) -> Token {
        Token::Number(Rc::from(s))
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            lex("let mut fn letter"),
            vec![Token::Let, Token::Mut, Token::Fn, ident("letter")]
        );
    }

    #[test]
    fn test_numbers_keep_source_text() {
        assert_eq!(lex("42 3.14"), vec![number("42"), number("3.14")]);
    }

    #[test]
    fn test_range_is_not_a_float() {
        assert_eq!(
            lex("0..10"),
            vec![number("0"), Token::DotDot, number("10")]
        );
    }

    #[test]
    fn test_strings_unescape() {
        assert_eq!(lex(r#""a\nb""#), vec![Token::Str(Rc::from("a\nb"))]);
    }

    #[test]
    fn test_generic_parameter() {
        assert_eq!(
            lex("[$A]"),
            vec![Token::LBracket, Token::Generic(Rc::from("A")), Token::RBracket]
        );
    }

    #[test]
    fn test_module_path_operators() {
        assert_eq!(
            lex("io::print x => y"),
            vec![
                ident("io"),
                Token::ColonColon,
                ident("print"),
                ident("x"),
                Token::FatArrow,
                ident("y"),
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(lex("let // comment\nx"), vec![Token::Let, ident("x")]);
    }

    #[test]
    fn test_tokenize_reports_invalid_characters() {
        let errors = tokenize("let @ x").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].text, "@");
        assert_eq!(errors[0].range, 4..5);
    }

    #[test]
    fn test_display_round_trips_fixed_tokens() {
        assert_eq!(Token::ColonColon.to_string(), "::");
        assert_eq!(Token::Match.to_string(), "match");
        assert_eq!(Token::Generic(Rc::from("T")).to_string(), "$T");
    }
}
