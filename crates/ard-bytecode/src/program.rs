//! Bytecode program structures.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::opcode::Instruction;

/// Constant pool entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Constant {
    /// Identity used for deduplication. Floats compare by bit pattern so that
    /// `0.0` and `-0.0` stay distinct and `NaN` is equal to itself.
    pub fn same_as(&self, other: &Constant) -> bool {
        match (self, other) {
            (Constant::Float(a), Constant::Float(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::Str(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(value) => write!(f, "{value}"),
            Constant::Float(value) => write!(f, "{value:?}"),
            Constant::Str(value) => write!(f, "{value:?}"),
            Constant::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// Function table entry. The body is `code[entry..end]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub entry: u32,
    pub end: u32,
    pub arity: u32,
    /// Size of the frame's local array; parameters occupy the first `arity` slots.
    pub locals: u32,
    pub returns_value: bool,
}

impl Function {
    pub fn body(&self) -> std::ops::Range<usize> {
        self.entry as usize..self.end as usize
    }
}

/// A complete bytecode program: constant pool, function table and one flat
/// instruction stream with absolute jump targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub constants: Vec<Constant>,
    pub functions: Vec<Function>,
    pub code: Vec<Instruction>,
    /// Function table index of the entry function.
    pub entry: u32,
}

impl Program {
    pub fn function(&self, index: usize) -> Option<&Function> {
        self.functions.get(index)
    }

    pub fn function_index(&self, name: &str) -> Option<usize> {
        self.functions.iter().position(|function| function.name == name)
    }

    pub fn constant(&self, index: usize) -> Option<&Constant> {
        self.constants.get(index)
    }

    pub fn entry_function(&self) -> Option<&Function> {
        self.function(self.entry as usize)
    }

    /// Human-readable listing, one function at a time.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        for function in &self.functions {
            out.push_str(&format!(
                "fn {} (arity {}, locals {}{}):\n",
                function.name,
                function.arity,
                function.locals,
                if function.returns_value { ", returns" } else { "" }
            ));
            for index in function.body() {
                if let Some(instruction) = self.code.get(index) {
                    out.push_str(&format!("  {index:>4}  {instruction}\n"));
                }
            }
        }
        out
    }
}

/// A program that passed [`verify`](crate::verify::verify). Only verified
/// programs can be handed to the VM.
#[derive(Debug, Clone)]
pub struct VerifiedProgram {
    program: Program,
}

impl VerifiedProgram {
    pub(crate) fn new(program: Program) -> Self {
        Self { program }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn into_inner(self) -> Program {
        self.program
    }
}

impl std::ops::Deref for VerifiedProgram {
    type Target = Program;

    fn deref(&self) -> &Program {
        &self.program
    }
}
