//! Type annotation parser.

use crate::{ParseError, TokenStream};
use ard_ast::{TypeExpr, TypeExprKind};
use ard_lexer::Token;

/// Parse a type, including `?` and `!E` suffixes.
pub(crate) fn parse_type(stream: &mut TokenStream) -> Result<TypeExpr, ParseError> {
    let start = stream.current_pos();
    let mut ty = parse_base_type(stream)?;
    loop {
        if stream.eat(&Token::Question) {
            ty = TypeExpr {
                kind: TypeExprKind::Maybe(Box::new(ty)),
                span: stream.span_from(start),
            };
        } else if stream.eat(&Token::Bang) {
            let err = parse_base_type(stream)?;
            ty = TypeExpr {
                kind: TypeExprKind::Result(Box::new(ty), Box::new(err)),
                span: stream.span_from(start),
            };
        } else {
            return Ok(ty);
        }
    }
}

/// True if the current token can begin a type.
pub(crate) fn starts_type(stream: &TokenStream) -> bool {
    matches!(
        stream.peek(),
        Some(Token::Ident(_)) | Some(Token::Generic(_)) | Some(Token::LBracket) | Some(Token::Fn)
    )
}

fn parse_base_type(stream: &mut TokenStream) -> Result<TypeExpr, ParseError> {
    let start = stream.current_pos();
    let span = stream.current_span();
    let kind = match stream.peek().cloned() {
        Some(Token::Ident(name)) => {
            stream.advance();
            TypeExprKind::Named(name.to_string())
        }
        Some(Token::Generic(name)) => {
            stream.advance();
            TypeExprKind::Generic(name.to_string())
        }
        Some(Token::LBracket) => {
            stream.advance();
            let first = parse_type(stream)?;
            let kind = if stream.eat(&Token::Colon) {
                let value = parse_type(stream)?;
                TypeExprKind::Map(Box::new(first), Box::new(value))
            } else {
                TypeExprKind::List(Box::new(first))
            };
            stream.expect(Token::RBracket)?;
            kind
        }
        Some(Token::Fn) => {
            stream.advance();
            stream.expect(Token::LParen)?;
            let mut params = Vec::new();
            while !stream.check(&Token::RParen) {
                params.push(parse_type(stream)?);
                if !stream.eat(&Token::Comma) {
                    break;
                }
            }
            stream.expect(Token::RParen)?;
            let ret = if starts_type(stream) && !stream.at_line_start() {
                Some(Box::new(parse_type(stream)?))
            } else {
                None
            };
            TypeExprKind::Function { params, ret }
        }
        other => return Err(ParseError::unexpected_token(other.as_ref(), "in type", span)),
    };
    Ok(TypeExpr {
        kind,
        span: stream.span_from(start),
    })
}

/// Parse `<T, U>` explicit type arguments. The caller has checked for `<`.
pub(crate) fn parse_type_args(stream: &mut TokenStream) -> Result<Vec<TypeExpr>, ParseError> {
    stream.expect(Token::Lt)?;
    let mut args = vec![parse_type(stream)?];
    while stream.eat(&Token::Comma) {
        args.push(parse_type(stream)?);
    }
    stream.expect(Token::Gt)?;
    Ok(args)
}
