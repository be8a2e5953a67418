//! Opcode definitions for the Ard stack machine.
//!
//! Opcodes are data: their operand shape and stack effect live in the
//! metadata table in [`registry`](super::registry), and the VM dispatches
//! through a handler table indexed by [`OpcodeKind`]. Nothing here relies on
//! enum discriminant order except those two tables, which are sized by
//! [`OPCODE_COUNT`](super::registry::OPCODE_COUNT).
//!
//! # Opcode Categories
//!
//! - **Stack** - constants, locals, pop
//! - **Arithmetic** - numeric and comparison operators
//! - **Control** - jumps, calls, return
//! - **Constructors** - lists, maps, structs, maybes, results, closures
//! - **Builtins** - methods on lists, maps, strings, maybes and results
//! - **Host** - module handlers, foreign functions, fibers

use serde::{Deserialize, Serialize};
use std::fmt;

use super::operand::Operand;
use super::registry::metadata_for;

/// Bytecode instruction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
pub enum OpcodeKind {
    // === Stack Operations ===
    /// Pushes the constant at pool index operand[0].
    Const,
    /// Loads the local slot operand[0] and pushes a copy.
    Load,
    /// Pops the top value into local slot operand[0].
    Store,
    /// Discards the top value.
    Pop,

    // === Arithmetic & Comparison ===
    /// `a + b` on Int, Float, or string concatenation on Str.
    Add,
    Sub,
    Mul,
    /// Division; an Int divisor of zero is a runtime fault.
    Div,
    /// Remainder; an Int divisor of zero is a runtime fault.
    Mod,
    Neg,
    Not,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,

    // === Control Flow ===
    /// Continues at the absolute instruction index operand[0].
    Jump,
    /// Pops a Bool and jumps to operand[0] when it is false.
    JumpIfFalse,
    /// Calls the function at table index operand[0].
    ///
    /// Pops the callee's arity in arguments, pushes its result if it returns one.
    Call,
    /// Calls a function value.
    ///
    /// Operands: [Count(args), Flag(returns)]. Pops the arguments, then the callee.
    CallValue,
    /// Leaves the current function. Pops the result when the function returns one.
    Return,

    // === Constructors ===
    /// Pops operand[0] values and pushes a list of them.
    MakeList,
    /// Pops operand[0] key/value pairs and pushes a map.
    MakeMap,
    /// Operands: [Const(struct name), Count(fields)]. Pops the fields in declaration order.
    MakeStruct,
    /// Operands: [Function, Count(captures)]. Pops the captured values.
    MakeClosure,
    MakeSome,
    MakeNone,
    MakeOk,
    MakeErr,

    // === Aggregates ===
    /// Pops a struct, pushes field operand[0].
    GetField,
    /// Pops a value and a struct, pushes the struct with field operand[0] replaced.
    SetField,
    /// Pops a value and a list, pushes the list with the value appended.
    ListPush,
    /// Pops an index and a list, pushes the element. Out of range is a runtime fault.
    ListAt,
    /// Pops a value, a key and a map, pushes the updated map.
    MapSet,
    /// Pops a key and a map, pushes `Some(value)` or `None`.
    MapGet,
    /// Pops a key and a map, pushes whether the key is present.
    MapHas,
    /// Pops a list, map or string and pushes its size as Int.
    Size,
    /// Pops a primitive and pushes its string form.
    ToStr,

    // === Maybe / Result ===
    IsSome,
    IsNone,
    IsOk,
    IsErr,
    /// Pops a default and a maybe, pushes the present value or the default.
    MaybeOr,
    /// Pops a maybe or result and pushes the value inside it.
    ///
    /// `Some(v)` and `Ok(v)` give `v`, `Err(e)` gives `e`, `None` is a runtime fault.
    Unwrap,
    /// Pops a value and pushes whether its runtime type tag equals the string
    /// constant operand[0].
    IsType,

    // === Host Calls ===
    /// Calls a std module handler.
    ///
    /// Operands: [Const(module), Const(function), Count(args), Flag(returns), Flag(fallible)].
    ModuleCall,
    /// Calls a registered foreign function.
    ///
    /// Operands: [Const(binding), Count(args), Flag(returns)].
    CallExtern,
    /// Pops a function value taking no arguments and pushes a fiber running it.
    StartFiber,
    /// Pops a fiber and blocks until it completes. Operand: [Flag(returns)].
    Wait,
}

impl OpcodeKind {
    /// Returns the static metadata for this opcode kind.
    pub fn metadata(self) -> &'static OpcodeMetadata {
        metadata_for(self)
    }

    /// Whether execution never continues to the next instruction.
    pub fn is_terminator(self) -> bool {
        matches!(self, OpcodeKind::Jump | OpcodeKind::Return)
    }
}

/// Kind of value an operand slot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandKind {
    /// Index into the constant pool.
    Const,
    /// Local slot of the running function.
    Local,
    /// Absolute instruction index.
    Target,
    /// Index into the function table.
    Function,
    Count,
    Flag,
}

/// How an instruction changes the operand stack depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackEffect {
    Fixed { pops: u32, pushes: u32 },
    /// Pops `operand[operand] * per` values, pushes one.
    Counted { operand: usize, per: u32 },
    /// Pops `operand[count]` values plus `extra`, pushes one when
    /// `operand[returns]` is set.
    CountedCall {
        count: usize,
        extra: u32,
        returns: usize,
    },
    /// Pops `pops` values, pushes one when `operand[returns]` is set.
    Flagged { pops: u32, returns: usize },
    /// Depends on the called function's arity and return.
    Call,
    /// Pops the running function's result, if any.
    Return,
}

/// Static metadata describing an opcode.
#[derive(Debug, Clone)]
pub struct OpcodeMetadata {
    /// Expected operand kinds, in order.
    pub operands: &'static [OperandKind],
    pub effect: StackEffect,
}

impl OpcodeMetadata {
    pub fn operand_count(&self) -> usize {
        self.operands.len()
    }
}

/// A single bytecode instruction with its operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub kind: OpcodeKind,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(kind: OpcodeKind, operands: Vec<Operand>) -> Self {
        Self { kind, operands }
    }

    /// Instruction without operands.
    pub fn simple(kind: OpcodeKind) -> Self {
        Self::new(kind, Vec::new())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        for operand in &self.operands {
            write!(f, " {operand}")?;
        }
        Ok(())
    }
}
