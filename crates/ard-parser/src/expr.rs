//! Expression parser: precedence climbing plus atoms and postfix forms.

use crate::decl::{parse_block, parse_params};
use crate::types::{parse_type, parse_type_args};
use crate::{ParseError, TokenStream};
use ard_ast::{BinaryOp, Block, Expr, ExprKind, Ident, MatchArm, Pattern, Stmt, StmtKind, UnaryOp};
use ard_lexer::Token;

/// Binary operator precedence; higher binds tighter. All are left-associative.
fn binary_op_info(token: &Token) -> Option<(u8, BinaryOp)> {
    match token {
        Token::Or => Some((10, BinaryOp::Or)),
        Token::And => Some((20, BinaryOp::And)),
        Token::EqEq => Some((30, BinaryOp::Eq)),
        Token::BangEq => Some((30, BinaryOp::Ne)),
        Token::Lt => Some((30, BinaryOp::Lt)),
        Token::LtEq => Some((30, BinaryOp::Le)),
        Token::Gt => Some((30, BinaryOp::Gt)),
        Token::GtEq => Some((30, BinaryOp::Ge)),
        Token::Plus => Some((40, BinaryOp::Add)),
        Token::Minus => Some((40, BinaryOp::Sub)),
        Token::Star => Some((50, BinaryOp::Mul)),
        Token::Slash => Some((50, BinaryOp::Div)),
        Token::Percent => Some((50, BinaryOp::Mod)),
        _ => None,
    }
}

pub(crate) fn parse_expr(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    parse_binary(stream, 0)
}

/// Parse an expression in a statement head, where `Name {` opens the body.
pub(crate) fn parse_head_expr(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let saved = stream.struct_literals;
    stream.struct_literals = false;
    let result = parse_expr(stream);
    stream.struct_literals = saved;
    result
}

fn parse_binary(stream: &mut TokenStream, min_prec: u8) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let mut lhs = parse_unary(stream)?;

    while let Some((prec, op)) = stream.peek().and_then(binary_op_info) {
        if prec < min_prec {
            break;
        }
        // `-` at the start of a line begins a new statement.
        if op == BinaryOp::Sub && stream.at_line_start() {
            break;
        }
        stream.advance();
        let rhs = parse_binary(stream, prec + 1)?;
        lhs = Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            stream.span_from(start),
        );
    }
    Ok(lhs)
}

fn parse_unary(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let op = match stream.peek() {
        Some(Token::Minus) => UnaryOp::Neg,
        Some(Token::Not) => UnaryOp::Not,
        _ => return parse_postfix(stream),
    };
    stream.advance();
    let operand = parse_unary(stream)?;
    Ok(Expr::new(
        ExprKind::Unary {
            op,
            operand: Box::new(operand),
        },
        stream.span_from(start),
    ))
}

/// Field access and method calls.
fn parse_postfix(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let mut expr = parse_atom(stream)?;

    while stream.check(&Token::Dot) {
        stream.advance();
        let name = stream.expect_ident("after `.`")?;
        if stream.check(&Token::LParen) && !stream.at_line_start() {
            let args = parse_args(stream)?;
            expr = Expr::new(
                ExprKind::MethodCall {
                    receiver: Box::new(expr),
                    method: name,
                    args,
                },
                stream.span_from(start),
            );
        } else {
            expr = Expr::new(
                ExprKind::Field {
                    target: Box::new(expr),
                    field: name,
                },
                stream.span_from(start),
            );
        }
    }
    Ok(expr)
}

fn parse_atom(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let span = stream.current_span();
    match stream.peek().cloned() {
        Some(Token::Number(text)) => {
            stream.advance();
            Ok(Expr::new(ExprKind::Number(text.to_string()), span))
        }
        Some(Token::Str(text)) => {
            stream.advance();
            Ok(Expr::new(ExprKind::Str(text.to_string()), span))
        }
        Some(Token::True) => {
            stream.advance();
            Ok(Expr::new(ExprKind::Bool(true), span))
        }
        Some(Token::False) => {
            stream.advance();
            Ok(Expr::new(ExprKind::Bool(false), span))
        }
        Some(Token::Ident(_)) => parse_name(stream),
        Some(Token::LParen) => {
            stream.advance();
            let saved = stream.struct_literals;
            stream.struct_literals = true;
            let inner = parse_expr(stream);
            stream.struct_literals = saved;
            let mut inner = inner?;
            stream.expect(Token::RParen)?;
            inner.span = stream.span_from(start);
            Ok(inner)
        }
        Some(Token::LBracket) => parse_collection(stream),
        Some(Token::If) => parse_if(stream),
        Some(Token::Match) => parse_match(stream),
        Some(Token::Fn) => {
            stream.advance();
            let params = parse_params(stream)?;
            let ret = if stream.check(&Token::LBrace) {
                None
            } else {
                Some(parse_type(stream)?)
            };
            let body = parse_block(stream)?;
            Ok(Expr::new(
                ExprKind::Closure { params, ret, body },
                stream.span_from(start),
            ))
        }
        other => Err(ParseError::unexpected_token(
            other.as_ref(),
            "in expression",
            span,
        )),
    }
}

/// Identifier-led forms: variables, calls, module calls and struct literals.
fn parse_name(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    let name = stream.expect_ident("in expression")?;

    if stream.check(&Token::ColonColon) {
        stream.advance();
        let function = stream.expect_ident("after `::`")?;
        let type_args = try_type_args(stream);
        let args = parse_args(stream)?;
        return Ok(Expr::new(
            ExprKind::ModuleCall {
                module: name,
                name: function,
                type_args,
                args,
            },
            stream.span_from(start),
        ));
    }

    let type_args = try_type_args(stream);
    if !type_args.is_empty() || (stream.check(&Token::LParen) && !stream.at_line_start()) {
        let args = parse_args(stream)?;
        return Ok(Expr::new(
            ExprKind::Call {
                callee: name,
                type_args,
                args,
            },
            stream.span_from(start),
        ));
    }

    if stream.struct_literals && is_struct_literal_start(stream, &name) {
        return parse_struct_literal(stream, name, start);
    }

    Ok(Expr::new(ExprKind::Ident(name.name), name.span))
}

/// Speculatively parse `<T, ..>` followed by `(`; rewinds if that fails.
fn try_type_args(stream: &mut TokenStream) -> Vec<ard_ast::TypeExpr> {
    if !stream.check(&Token::Lt) {
        return Vec::new();
    }
    let saved = stream.current_pos();
    match parse_type_args(stream) {
        Ok(args) if stream.check(&Token::LParen) => args,
        _ => {
            stream.reset(saved);
            Vec::new()
        }
    }
}

fn is_struct_literal_start(stream: &TokenStream, name: &Ident) -> bool {
    let capitalized = name.name.chars().next().is_some_and(char::is_uppercase);
    capitalized
        && stream.check(&Token::LBrace)
        && match stream.peek_nth(1) {
            Some(Token::RBrace) => true,
            Some(Token::Ident(_)) => matches!(stream.peek_nth(2), Some(Token::Colon)),
            _ => false,
        }
}

fn parse_struct_literal(
    stream: &mut TokenStream,
    name: Ident,
    start: usize,
) -> Result<Expr, ParseError> {
    stream.expect(Token::LBrace)?;
    let mut fields = Vec::new();
    while !stream.check(&Token::RBrace) {
        let field = stream.expect_ident("in struct literal")?;
        stream.expect(Token::Colon)?;
        let value = parse_expr(stream)?;
        fields.push((field, value));
        if !stream.eat(&Token::Comma) {
            break;
        }
    }
    stream.expect(Token::RBrace)?;
    Ok(Expr::new(
        ExprKind::StructLit { name, fields },
        stream.span_from(start),
    ))
}

pub(crate) fn parse_args(stream: &mut TokenStream) -> Result<Vec<Expr>, ParseError> {
    stream.expect(Token::LParen)?;
    let saved = stream.struct_literals;
    stream.struct_literals = true;
    let mut args = Vec::new();
    let result = loop {
        if stream.check(&Token::RParen) {
            break Ok(());
        }
        match parse_expr(stream) {
            Ok(arg) => args.push(arg),
            Err(err) => break Err(err),
        }
        if !stream.eat(&Token::Comma) {
            break Ok(());
        }
    };
    stream.struct_literals = saved;
    result?;
    stream.expect(Token::RParen)?;
    Ok(args)
}

/// `[a, b]`, `[]`, `[k: v]` or `[:]`
fn parse_collection(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::LBracket)?;

    if stream.eat(&Token::Colon) {
        stream.expect(Token::RBracket)?;
        return Ok(Expr::new(ExprKind::Map(Vec::new()), stream.span_from(start)));
    }
    if stream.eat(&Token::RBracket) {
        return Ok(Expr::new(ExprKind::List(Vec::new()), stream.span_from(start)));
    }

    let first = parse_expr(stream)?;
    if stream.eat(&Token::Colon) {
        let mut entries = vec![(first, parse_expr(stream)?)];
        while stream.eat(&Token::Comma) {
            if stream.check(&Token::RBracket) {
                break;
            }
            let key = parse_expr(stream)?;
            stream.expect(Token::Colon)?;
            entries.push((key, parse_expr(stream)?));
        }
        stream.expect(Token::RBracket)?;
        return Ok(Expr::new(ExprKind::Map(entries), stream.span_from(start)));
    }

    let mut items = vec![first];
    while stream.eat(&Token::Comma) {
        if stream.check(&Token::RBracket) {
            break;
        }
        items.push(parse_expr(stream)?);
    }
    stream.expect(Token::RBracket)?;
    Ok(Expr::new(ExprKind::List(items), stream.span_from(start)))
}

fn parse_if(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::If)?;
    let mut branches = vec![(parse_head_expr(stream)?, parse_block(stream)?)];
    let mut else_block = None;
    while stream.eat(&Token::Else) {
        if stream.eat(&Token::If) {
            branches.push((parse_head_expr(stream)?, parse_block(stream)?));
        } else {
            else_block = Some(parse_block(stream)?);
            break;
        }
    }
    Ok(Expr::new(
        ExprKind::If {
            branches,
            else_block,
        },
        stream.span_from(start),
    ))
}

fn parse_match(stream: &mut TokenStream) -> Result<Expr, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Match)?;
    let subject = parse_head_expr(stream)?;
    stream.expect(Token::LBrace)?;
    let mut arms = Vec::new();
    while !stream.check(&Token::RBrace) && !stream.at_end() {
        let arm_start = stream.current_pos();
        let pattern = parse_pattern(stream)?;
        stream.expect(Token::FatArrow)?;
        let body = if stream.check(&Token::LBrace) {
            parse_block(stream)?
        } else {
            let expr_start = stream.current_pos();
            let expr = parse_expr(stream)?;
            let span = stream.span_from(expr_start);
            Block {
                stmts: vec![Stmt::new(StmtKind::Expr(expr), span)],
                span,
            }
        };
        stream.eat(&Token::Comma);
        arms.push(MatchArm {
            pattern,
            body,
            span: stream.span_from(arm_start),
        });
    }
    stream.expect(Token::RBrace)?;
    Ok(Expr::new(
        ExprKind::Match {
            subject: Box::new(subject),
            arms,
        },
        stream.span_from(start),
    ))
}

fn parse_pattern(stream: &mut TokenStream) -> Result<Pattern, ParseError> {
    let span = stream.current_span();
    match stream.peek().cloned() {
        Some(Token::True) => {
            stream.advance();
            Ok(Pattern::Bool(true))
        }
        Some(Token::False) => {
            stream.advance();
            Ok(Pattern::Bool(false))
        }
        Some(Token::Str(text)) => {
            stream.advance();
            Ok(Pattern::Str(text.to_string()))
        }
        Some(Token::Minus) | Some(Token::Number(_)) => {
            let negative = stream.eat(&Token::Minus);
            let number_span = stream.current_span();
            let text = match stream.advance() {
                Some(Token::Number(text)) => text.clone(),
                other => {
                    return Err(ParseError::unexpected_token(
                        other,
                        "in integer pattern",
                        number_span,
                    ));
                }
            };
            let value: i64 = text.parse().map_err(|_| {
                ParseError::invalid_syntax(
                    format!("`{text}` is not a valid integer pattern"),
                    number_span,
                )
            })?;
            Ok(Pattern::Int(if negative { -value } else { value }))
        }
        Some(Token::Ident(name)) => {
            stream.advance();
            let ident = Ident::new(name.as_ref(), span);
            if name.as_ref() == "_" {
                return Ok(Pattern::Wildcard);
            }
            let wraps = matches!(name.as_ref(), "ok" | "err") && stream.check(&Token::LParen);
            if !wraps {
                return Ok(Pattern::Name(ident));
            }
            stream.expect(Token::LParen)?;
            let binding = stream.expect_ident("in pattern binding")?;
            stream.expect(Token::RParen)?;
            Ok(if name.as_ref() == "ok" {
                Pattern::Ok(binding)
            } else {
                Pattern::Err(binding)
            })
        }
        other => Err(ParseError::unexpected_token(other.as_ref(), "in pattern", span)),
    }
}
