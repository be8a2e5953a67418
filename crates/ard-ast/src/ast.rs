//! Untyped syntax tree produced by the parser.
//!
//! Every node carries a [`Span`] so the checker can attach diagnostics to
//! source locations. Numeric literals keep their raw text: deciding between
//! `Int` and `Float` (and reporting malformed numbers) is the checker's job.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// A parsed source file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    pub imports: Vec<Import>,
    pub statements: Vec<Stmt>,
}

/// `use path [as alias]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Import {
    /// Full path, e.g. `ard/io` or `my_app/utils`
    pub path: String,
    /// Name the module is bound to (alias, or the last path segment)
    pub name: String,
    pub span: Span,
}

impl Import {
    /// True for `ard/...` paths.
    pub fn is_std(&self) -> bool {
        self.path.starts_with("ard/")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }
}

/// Written type annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypeExprKind {
    /// `Int`, `Str`, or a user struct/union name
    Named(String),
    /// `[T]`
    List(Box<TypeExpr>),
    /// `[K:V]`
    Map(Box<TypeExpr>, Box<TypeExpr>),
    /// `T?`
    Maybe(Box<TypeExpr>),
    /// `T!E`
    Result(Box<TypeExpr>, Box<TypeExpr>),
    /// `fn(A, B) R`; a missing return type means `Void`
    Function {
        params: Vec<TypeExpr>,
        ret: Option<Box<TypeExpr>>,
    },
    /// `$T`
    Generic(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Declarations produce no value and never run as top-level code.
    pub fn is_declaration(&self) -> bool {
        matches!(
            self.kind,
            StmtKind::Function(_)
                | StmtKind::Extern(_)
                | StmtKind::Struct(_)
                | StmtKind::Impl(_)
                | StmtKind::Union(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    /// `let name: T = value` or `mut name = value`
    Let {
        name: Ident,
        mutable: bool,
        ty: Option<TypeExpr>,
        value: Expr,
    },
    /// `target = value`, where target is a name or a field access
    Assign { target: Expr, value: Expr },
    While { cond: Expr, body: Block },
    /// `for var in start..end`
    ForRange {
        var: Ident,
        start: Expr,
        end: Expr,
        body: Block,
    },
    /// `for var in list`
    ForIn { var: Ident, iter: Expr, body: Block },
    Break,
    Function(FunctionDecl),
    Extern(ExternDecl),
    Struct(StructDecl),
    Impl(ImplBlock),
    Union(UnionDecl),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeExpr,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

/// `extern fn name(params) Ret = "binding"`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub binding: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: Ident,
    pub fields: Vec<(Ident, TypeExpr)>,
    pub span: Span,
}

/// `impl Target { ... }` or `impl Trait for Target { ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplBlock {
    pub trait_name: Option<Ident>,
    pub target: Ident,
    pub methods: Vec<FunctionDecl>,
    pub span: Span,
}

/// `type Name = A | B`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionDecl {
    pub name: Ident,
    pub variants: Vec<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Lt
                | BinaryOp::Le
                | BinaryOp::Gt
                | BinaryOp::Ge
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Raw numeric text, e.g. `42` or `3.14`
    Number(String),
    Str(String),
    Bool(bool),
    Ident(String),
    /// `[a, b, c]`
    List(Vec<Expr>),
    /// `[k: v, ...]`, `[:]` when empty
    Map(Vec<(Expr, Expr)>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `name<T, U>(args)`
    Call {
        callee: Ident,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
    },
    /// `module::name<T>(args)`
    ModuleCall {
        module: Ident,
        name: Ident,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
    },
    /// `receiver.method(args)`
    MethodCall {
        receiver: Box<Expr>,
        method: Ident,
        args: Vec<Expr>,
    },
    /// `target.field`
    Field { target: Box<Expr>, field: Ident },
    /// `Point { x: 1, y: 2 }`
    StructLit {
        name: Ident,
        fields: Vec<(Ident, Expr)>,
    },
    /// `if a {..} else if b {..} else {..}`
    If {
        branches: Vec<(Expr, Block)>,
        else_block: Option<Block>,
    },
    Match {
        subject: Box<Expr>,
        arms: Vec<MatchArm>,
    },
    /// Anonymous function `fn(x: Int) Int { .. }`
    Closure {
        params: Vec<Param>,
        ret: Option<TypeExpr>,
        body: Block,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// `_`
    Wildcard,
    Bool(bool),
    /// Integer literal, possibly negative
    Int(i64),
    Str(String),
    /// A union member type name, or a binding for the `some` case of a maybe
    Name(Ident),
    /// `ok(v)`
    Ok(Ident),
    /// `err(e)`
    Err(Ident),
}
