//! Statement and declaration parsers (keyword-dispatched).

use crate::expr::{parse_expr, parse_head_expr};
use crate::types::parse_type;
use crate::{ParseError, TokenStream};
use ard_ast::{
    Block, ExternDecl, FunctionDecl, ImplBlock, Import, Param, Program, Stmt, StmtKind,
    StructDecl, UnionDecl,
};
use ard_lexer::Token;

/// Parse a whole file, recovering at statement boundaries.
pub(crate) fn parse_program(stream: &mut TokenStream) -> Result<Program, Vec<ParseError>> {
    let mut program = Program::default();
    let mut errors = Vec::new();

    while !stream.at_end() {
        let result = if stream.check(&Token::Use) {
            parse_import(stream).map(|import| program.imports.push(import))
        } else {
            parse_stmt(stream).map(|stmt| program.statements.push(stmt))
        };
        if let Err(err) = result {
            errors.push(err);
            stream.synchronize();
        }
    }

    if errors.is_empty() {
        Ok(program)
    } else {
        Err(errors)
    }
}

/// `use a/b/c [as name]`
fn parse_import(stream: &mut TokenStream) -> Result<Import, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Use)?;
    let mut segments = vec![stream.expect_ident("in import path")?.name];
    while stream.eat(&Token::Slash) {
        segments.push(stream.expect_ident("in import path")?.name);
    }
    let name = if stream.eat(&Token::As) {
        stream.expect_ident("after `as`")?.name
    } else {
        segments.last().cloned().unwrap_or_default()
    };
    Ok(Import {
        path: segments.join("/"),
        name,
        span: stream.span_from(start),
    })
}

pub(crate) fn parse_stmt(stream: &mut TokenStream) -> Result<Stmt, ParseError> {
    let start = stream.current_pos();
    let kind = match stream.peek() {
        Some(Token::Let) | Some(Token::Mut) => {
            let mutable = matches!(stream.advance(), Some(Token::Mut));
            let name = stream.expect_ident("in variable declaration")?;
            let ty = if stream.eat(&Token::Colon) {
                Some(parse_type(stream)?)
            } else {
                None
            };
            stream.expect(Token::Eq)?;
            let value = parse_expr(stream)?;
            StmtKind::Let {
                name,
                mutable,
                ty,
                value,
            }
        }
        Some(Token::Fn) if matches!(stream.peek_nth(1), Some(Token::Ident(_))) => {
            StmtKind::Function(parse_function(stream)?)
        }
        Some(Token::Extern) => StmtKind::Extern(parse_extern(stream)?),
        Some(Token::Struct) => StmtKind::Struct(parse_struct(stream)?),
        Some(Token::Impl) => StmtKind::Impl(parse_impl(stream)?),
        Some(Token::Type) => StmtKind::Union(parse_union(stream)?),
        Some(Token::While) => {
            stream.advance();
            let cond = parse_head_expr(stream)?;
            let body = parse_block(stream)?;
            StmtKind::While { cond, body }
        }
        Some(Token::For) => {
            stream.advance();
            let var = stream.expect_ident("as loop variable")?;
            stream.expect(Token::In)?;
            let first = parse_head_expr(stream)?;
            if stream.eat(&Token::DotDot) {
                let end = parse_head_expr(stream)?;
                let body = parse_block(stream)?;
                StmtKind::ForRange {
                    var,
                    start: first,
                    end,
                    body,
                }
            } else {
                let body = parse_block(stream)?;
                StmtKind::ForIn {
                    var,
                    iter: first,
                    body,
                }
            }
        }
        Some(Token::Break) => {
            stream.advance();
            StmtKind::Break
        }
        _ => {
            let expr = parse_expr(stream)?;
            if stream.eat(&Token::Eq) {
                let value = parse_expr(stream)?;
                StmtKind::Assign {
                    target: expr,
                    value,
                }
            } else {
                StmtKind::Expr(expr)
            }
        }
    };
    Ok(Stmt::new(kind, stream.span_from(start)))
}

pub(crate) fn parse_block(stream: &mut TokenStream) -> Result<Block, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::LBrace)?;
    let saved = stream.struct_literals;
    stream.struct_literals = true;
    let mut stmts = Vec::new();
    let result = loop {
        if stream.check(&Token::RBrace) || stream.at_end() {
            break Ok(());
        }
        match parse_stmt(stream) {
            Ok(stmt) => stmts.push(stmt),
            Err(err) => break Err(err),
        }
    };
    stream.struct_literals = saved;
    result?;
    stream.expect(Token::RBrace)?;
    Ok(Block {
        stmts,
        span: stream.span_from(start),
    })
}

/// `(a: Int, mut b: [Int])`
pub(crate) fn parse_params(stream: &mut TokenStream) -> Result<Vec<Param>, ParseError> {
    stream.expect(Token::LParen)?;
    let mut params = Vec::new();
    while !stream.check(&Token::RParen) {
        let mutable = stream.eat(&Token::Mut);
        let name = stream.expect_ident("as parameter name")?;
        stream.expect(Token::Colon)?;
        let ty = parse_type(stream)?;
        params.push(Param { name, ty, mutable });
        if !stream.eat(&Token::Comma) {
            break;
        }
    }
    stream.expect(Token::RParen)?;
    Ok(params)
}

fn parse_function(stream: &mut TokenStream) -> Result<FunctionDecl, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Fn)?;
    let name = stream.expect_ident("as function name")?;
    let params = parse_params(stream)?;
    let ret = if stream.check(&Token::LBrace) {
        None
    } else {
        Some(parse_type(stream)?)
    };
    let body = parse_block(stream)?;
    Ok(FunctionDecl {
        name,
        params,
        ret,
        body,
        span: stream.span_from(start),
    })
}

/// `extern fn name(params) Ret = "binding"`
fn parse_extern(stream: &mut TokenStream) -> Result<ExternDecl, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Extern)?;
    stream.expect(Token::Fn)?;
    let name = stream.expect_ident("as extern function name")?;
    let params = parse_params(stream)?;
    let ret = if stream.check(&Token::Eq) {
        None
    } else {
        Some(parse_type(stream)?)
    };
    stream.expect(Token::Eq)?;
    let span = stream.current_span();
    let binding = match stream.advance() {
        Some(Token::Str(binding)) => binding.to_string(),
        other => {
            return Err(ParseError::unexpected_token(
                other,
                "as extern binding name",
                span,
            ));
        }
    };
    Ok(ExternDecl {
        name,
        params,
        ret,
        binding,
        span: stream.span_from(start),
    })
}

fn parse_struct(stream: &mut TokenStream) -> Result<StructDecl, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Struct)?;
    let name = stream.expect_ident("as struct name")?;
    stream.expect(Token::LBrace)?;
    let mut fields = Vec::new();
    while !stream.check(&Token::RBrace) {
        let field = stream.expect_ident("as field name")?;
        stream.expect(Token::Colon)?;
        fields.push((field, parse_type(stream)?));
        if !stream.eat(&Token::Comma) {
            // Fields may also be separated by newlines alone.
            if !stream.at_line_start() {
                break;
            }
        }
    }
    stream.expect(Token::RBrace)?;
    Ok(StructDecl {
        name,
        fields,
        span: stream.span_from(start),
    })
}

/// `impl Target { fn .. }` or `impl Trait for Target { fn .. }`
fn parse_impl(stream: &mut TokenStream) -> Result<ImplBlock, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Impl)?;
    let first = stream.expect_ident("after `impl`")?;
    let (trait_name, target) = if stream.eat(&Token::For) {
        (Some(first), stream.expect_ident("as impl target")?)
    } else {
        (None, first)
    };
    stream.expect(Token::LBrace)?;
    let mut methods = Vec::new();
    while !stream.check(&Token::RBrace) && !stream.at_end() {
        methods.push(parse_function(stream)?);
    }
    stream.expect(Token::RBrace)?;
    Ok(ImplBlock {
        trait_name,
        target,
        methods,
        span: stream.span_from(start),
    })
}

/// `type Name = A | B | C`
fn parse_union(stream: &mut TokenStream) -> Result<UnionDecl, ParseError> {
    let start = stream.current_pos();
    stream.expect(Token::Type)?;
    let name = stream.expect_ident("as union name")?;
    stream.expect(Token::Eq)?;
    let mut variants = vec![stream.expect_ident("as union member")?];
    while stream.eat(&Token::Pipe) {
        variants.push(stream.expect_ident("as union member")?);
    }
    Ok(UnionDecl {
        name,
        variants,
        span: stream.span_from(start),
    })
}
