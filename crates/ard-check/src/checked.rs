//! The checked program handed to the bytecode emitter.
//!
//! Names are resolved, local variables are numbered per function, closures
//! are lifted into their own functions and every expression carries its
//! resolved type. A `TExpr` whose type is `Void` leaves nothing on the stack;
//! any other expression leaves exactly one value.

use crate::types::{StructDef, Type};
use ard_ast::{BinaryOp, Span, UnaryOp};
use indexmap::IndexMap;

/// Local variable slot within one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub u32);

#[derive(Debug, Clone, Default)]
pub struct CheckedProgram {
    /// Every function to emit: user functions, methods (`Type.method`),
    /// imported module functions (`path::name`), lifted closures and the entry.
    pub functions: Vec<CheckedFunction>,
    /// Name of the entry function in `functions`.
    pub entry: String,
    pub structs: IndexMap<String, StructDef>,
}

impl CheckedProgram {
    pub fn function(&self, name: &str) -> Option<&CheckedFunction> {
        self.functions.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct CheckedFunction {
    pub name: String,
    /// Parameter locals, in order. `self` comes first for methods.
    pub params: Vec<LocalId>,
    /// Closure capture locals, in the order values are packed.
    pub captures: Vec<LocalId>,
    /// Locals allocated by the checker (params and captures included).
    pub local_count: u32,
    pub returns_value: bool,
    pub body: TBlock,
    pub span: Span,
}

/// A block; when `ty` is not `Void` its last statement is the value.
#[derive(Debug, Clone)]
pub struct TBlock {
    pub stmts: Vec<TStmt>,
    pub ty: Type,
}

impl TBlock {
    pub fn produces_value(&self) -> bool {
        !self.ty.is_void()
    }
}

#[derive(Debug, Clone)]
pub enum TStmt {
    Let {
        local: LocalId,
        value: TExpr,
    },
    Assign {
        local: LocalId,
        value: TExpr,
    },
    /// `local.field = value` on a mutable struct variable
    SetField {
        local: LocalId,
        index: u32,
        value: TExpr,
    },
    While {
        cond: TExpr,
        body: TBlock,
    },
    ForRange {
        var: LocalId,
        start: TExpr,
        end: TExpr,
        body: TBlock,
    },
    ForIn {
        var: LocalId,
        iter: TExpr,
        body: TBlock,
    },
    Break,
    Expr(TExpr),
}

#[derive(Debug, Clone)]
pub struct TExpr {
    pub kind: TExprKind,
    pub ty: Type,
    pub span: Span,
}

impl TExpr {
    pub fn new(kind: TExprKind, ty: Type, span: Span) -> Self {
        Self { kind, ty, span }
    }

    pub fn produces_value(&self) -> bool {
        !self.ty.is_void()
    }
}

/// Built-in methods on lists, maps, strings, maybes, results and fibers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    /// `list.size()`, `text.size()`, `map.size()`
    Size,
    /// `list.at(i)`
    At,
    /// `x.to_str()` for primitives
    ToStr,
    /// `fiber.wait()`
    Wait,
    /// `map.get(k)` returning `V?`
    MapGet,
    /// `map.has(k)`
    MapHas,
    IsSome,
    IsNone,
    /// `maybe.or(default)`
    Or,
    IsOk,
    IsErr,
}

#[derive(Debug, Clone)]
pub enum TExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    /// Placeholder for an expression that failed to check. Never emitted.
    Invalid,
    Local(LocalId),
    List(Vec<TExpr>),
    Map(Vec<(TExpr, TExpr)>),
    Unary {
        op: UnaryOp,
        operand: Box<TExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<TExpr>,
        rhs: Box<TExpr>,
    },
    /// Direct call of a named function in the program.
    Call {
        function: String,
        args: Vec<TExpr>,
    },
    /// Call of a host-registered foreign function.
    CallExtern {
        binding: String,
        args: Vec<TExpr>,
    },
    /// Call of a function-typed value.
    CallValue {
        callee: Box<TExpr>,
        args: Vec<TExpr>,
    },
    /// A named function used as a value.
    FunctionRef(String),
    /// Closure value: the lifted function plus the outer locals it copies.
    Closure {
        function: String,
        captures: Vec<LocalId>,
    },
    /// Call into a std module handler.
    ModuleCall {
        module: String,
        function: String,
        args: Vec<TExpr>,
        /// Handler errors become `err` results instead of faults
        fallible: bool,
    },
    MakeSome(Box<TExpr>),
    MakeNone,
    MakeOk(Box<TExpr>),
    MakeErr(Box<TExpr>),
    /// `async::start(f)`
    StartFiber(Box<TExpr>),
    Builtin {
        method: Builtin,
        receiver: Box<TExpr>,
        args: Vec<TExpr>,
    },
    /// `local.push(value)` on a mutable list variable
    Push {
        local: LocalId,
        value: Box<TExpr>,
    },
    /// `local.set(key, value)` on a mutable map variable
    MapSet {
        local: LocalId,
        key: Box<TExpr>,
        value: Box<TExpr>,
    },
    Field {
        target: Box<TExpr>,
        index: u32,
    },
    /// Field values in declaration order.
    StructLit {
        name: String,
        fields: Vec<TExpr>,
    },
    If {
        branches: Vec<(TExpr, TBlock)>,
        else_block: Option<TBlock>,
    },
    Match {
        subject: Box<TExpr>,
        arms: Vec<TArm>,
    },
}

#[derive(Debug, Clone)]
pub struct TArm {
    pub pattern: TPattern,
    /// Local receiving the matched value (`it`, `v`, `ok(v)` ...)
    pub binding: Option<LocalId>,
    pub body: TBlock,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TPattern {
    Wildcard,
    Bool(bool),
    Int(i64),
    Str(String),
    /// Union member by runtime type tag
    Type(String),
    Some,
    None,
    Ok,
    Err,
}
