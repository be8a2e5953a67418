//! Structural verification of bytecode programs.
//!
//! Every program goes through here before the VM sees it, whether it was
//! just emitted or decoded from bytes. Each check is fatal on its own:
//!
//! - operands match the opcode's metadata in count and kind
//! - constants, locals, functions and jump targets are in range
//! - function bodies lie inside the stream, do not overlap and have unique names
//! - the entry function exists and takes no arguments
//! - the constant pool has no duplicate entries
//! - every reachable instruction has one consistent stack depth, depth never
//!   goes negative, every `Return` sees exactly the function's result and
//!   control never falls off the end of a body

use std::collections::HashSet;

use tracing::debug;

use crate::opcode::{Instruction, OpcodeKind, OperandKind, StackEffect};
use crate::operand::{Operand, OperandError, operand_count, operand_flag, operand_function};
use crate::program::{Constant, Function, Program, VerifiedProgram};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("instruction {at}: {opcode:?} expects {expected} operand(s), found {found}")]
    OperandCount {
        at: usize,
        opcode: OpcodeKind,
        expected: usize,
        found: usize,
    },

    #[error("instruction {at}: operand {index} of {opcode:?} must be {expected:?}, found {found:?}")]
    OperandKind {
        at: usize,
        opcode: OpcodeKind,
        index: usize,
        expected: OperandKind,
        found: OperandKind,
    },

    #[error("instruction {at}: jump target {target} is outside the instruction stream")]
    JumpOutOfRange { at: usize, target: i32 },

    #[error("instruction {at}: jump target {target} leaves function `{function}`")]
    JumpOutsideFunction {
        at: usize,
        target: usize,
        function: String,
    },

    #[error("instruction {at}: function index {index} does not exist")]
    UnknownFunction { at: usize, index: usize },

    #[error("entry function index {index} does not exist")]
    UnknownEntry { index: usize },

    #[error("entry function `{name}` takes {arity} argument(s)")]
    EntryTakesArguments { name: String, arity: u32 },

    #[error("instruction {at}: constant {index} does not exist")]
    ConstantOutOfRange { at: usize, index: usize },

    #[error("instruction {at}: constant {index} must be a string")]
    ConstantNotString { at: usize, index: usize },

    #[error("constant {index} duplicates constant {first}")]
    DuplicateConstant { index: usize, first: usize },

    #[error("instruction {at}: local {slot} is outside the {locals} locals of `{function}`")]
    LocalOutOfRange {
        at: usize,
        slot: u32,
        locals: u32,
        function: String,
    },

    #[error("function `{function}` has arity {arity} but only {locals} locals")]
    ArityExceedsLocals {
        function: String,
        arity: u32,
        locals: u32,
    },

    #[error("function `{function}` spans {entry}..{end}, outside the {len} instructions")]
    FunctionOutOfRange {
        function: String,
        entry: u32,
        end: u32,
        len: usize,
    },

    #[error("functions `{first}` and `{second}` overlap")]
    OverlappingFunctions { first: String, second: String },

    #[error("function `{name}` is defined twice")]
    DuplicateFunction { name: String },

    #[error("instruction {at} in `{function}`: stack underflow")]
    StackUnderflow { at: usize, function: String },

    #[error("instruction {at} in `{function}`: reached with stack depth {found} and {expected}")]
    InconsistentDepth {
        at: usize,
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("instruction {at} in `{function}`: returns with stack depth {found}, expected {expected}")]
    ReturnDepth {
        at: usize,
        function: String,
        expected: usize,
        found: usize,
    },

    #[error("control falls off the end of `{function}`")]
    FallsOffEnd { function: String },

    #[error("instruction {at}: {source}")]
    Operand { at: usize, source: OperandError },
}

/// Verify `program`, handing it back as a [`VerifiedProgram`].
pub fn verify(program: Program) -> Result<VerifiedProgram, VerifyError> {
    verify_program(&program)?;
    Ok(VerifiedProgram::new(program))
}

/// Run every check on `program` without taking ownership.
pub fn verify_program(program: &Program) -> Result<(), VerifyError> {
    check_constants(&program.constants)?;
    check_function_table(program)?;
    check_entry(program)?;
    for (at, instruction) in program.code.iter().enumerate() {
        check_operands(program, at, instruction)?;
    }
    for function in &program.functions {
        check_body(program, function)?;
        check_stack(program, function)?;
    }
    debug!(
        functions = program.functions.len(),
        instructions = program.code.len(),
        "verified program"
    );
    Ok(())
}

fn check_constants(constants: &[Constant]) -> Result<(), VerifyError> {
    for (index, constant) in constants.iter().enumerate() {
        if let Some(first) = constants[..index].iter().position(|c| c.same_as(constant)) {
            return Err(VerifyError::DuplicateConstant { index, first });
        }
    }
    Ok(())
}

fn check_function_table(program: &Program) -> Result<(), VerifyError> {
    let mut names = HashSet::new();
    for function in &program.functions {
        if !names.insert(function.name.as_str()) {
            return Err(VerifyError::DuplicateFunction {
                name: function.name.clone(),
            });
        }
        if function.entry > function.end || function.end as usize > program.code.len() {
            return Err(VerifyError::FunctionOutOfRange {
                function: function.name.clone(),
                entry: function.entry,
                end: function.end,
                len: program.code.len(),
            });
        }
        if function.arity > function.locals {
            return Err(VerifyError::ArityExceedsLocals {
                function: function.name.clone(),
                arity: function.arity,
                locals: function.locals,
            });
        }
    }

    let mut ordered: Vec<&Function> = program.functions.iter().collect();
    ordered.sort_by_key(|function| (function.entry, function.end));
    for pair in ordered.windows(2) {
        if pair[0].end > pair[1].entry {
            return Err(VerifyError::OverlappingFunctions {
                first: pair[0].name.clone(),
                second: pair[1].name.clone(),
            });
        }
    }
    Ok(())
}

fn check_entry(program: &Program) -> Result<(), VerifyError> {
    let index = program.entry as usize;
    let entry = program
        .function(index)
        .ok_or(VerifyError::UnknownEntry { index })?;
    if entry.arity != 0 {
        return Err(VerifyError::EntryTakesArguments {
            name: entry.name.clone(),
            arity: entry.arity,
        });
    }
    Ok(())
}

/// Operand shape and program-wide ranges of one instruction.
fn check_operands(program: &Program, at: usize, instruction: &Instruction) -> Result<(), VerifyError> {
    let metadata = instruction.kind.metadata();
    if instruction.operands.len() != metadata.operand_count() {
        return Err(VerifyError::OperandCount {
            at,
            opcode: instruction.kind,
            expected: metadata.operand_count(),
            found: instruction.operands.len(),
        });
    }
    for (index, (operand, expected)) in instruction.operands.iter().zip(metadata.operands).enumerate() {
        if operand.kind() != *expected {
            return Err(VerifyError::OperandKind {
                at,
                opcode: instruction.kind,
                index,
                expected: *expected,
                found: operand.kind(),
            });
        }
        match operand {
            Operand::Const(index) => {
                let index = *index as usize;
                let constant = program
                    .constant(index)
                    .ok_or(VerifyError::ConstantOutOfRange { at, index })?;
                // Constants other than `Const`'s own name things.
                if instruction.kind != OpcodeKind::Const && constant.as_str().is_none() {
                    return Err(VerifyError::ConstantNotString { at, index });
                }
            }
            Operand::Target(target) => {
                let in_range = usize::try_from(*target).is_ok_and(|t| t < program.code.len());
                if !in_range {
                    return Err(VerifyError::JumpOutOfRange {
                        at,
                        target: *target,
                    });
                }
            }
            Operand::Function(index) => {
                let index = *index as usize;
                if program.function(index).is_none() {
                    return Err(VerifyError::UnknownFunction { at, index });
                }
            }
            Operand::Local(_) | Operand::Count(_) | Operand::Flag(_) => {}
        }
    }
    Ok(())
}

/// Checks that need the owning function: local slots and jump targets.
fn check_body(program: &Program, function: &Function) -> Result<(), VerifyError> {
    for at in function.body() {
        let instruction = &program.code[at];
        for operand in &instruction.operands {
            match operand {
                Operand::Local(slot) if slot.id() >= function.locals => {
                    return Err(VerifyError::LocalOutOfRange {
                        at,
                        slot: slot.id(),
                        locals: function.locals,
                        function: function.name.clone(),
                    });
                }
                Operand::Target(target) => {
                    let target = *target as usize;
                    if !function.body().contains(&target) {
                        return Err(VerifyError::JumpOutsideFunction {
                            at,
                            target,
                            function: function.name.clone(),
                        });
                    }
                }
                _ => {}
            }
        }
    }
    Ok(())
}

/// Values popped and pushed by one instruction.
fn stack_effect(program: &Program, at: usize, instruction: &Instruction) -> Result<(usize, usize), VerifyError> {
    let operands = &instruction.operands;
    let wrap = |source| VerifyError::Operand { at, source };
    let effect = match instruction.kind.metadata().effect {
        StackEffect::Fixed { pops, pushes } => (pops as usize, pushes as usize),
        StackEffect::Counted { operand, per } => {
            (operand_count(operands, operand).map_err(wrap)? * per as usize, 1)
        }
        StackEffect::CountedCall {
            count,
            extra,
            returns,
        } => (
            operand_count(operands, count).map_err(wrap)? + extra as usize,
            operand_flag(operands, returns).map_err(wrap)? as usize,
        ),
        StackEffect::Flagged { pops, returns } => {
            (pops as usize, operand_flag(operands, returns).map_err(wrap)? as usize)
        }
        StackEffect::Call => {
            let index = operand_function(operands, 0).map_err(wrap)?;
            let callee = program
                .function(index)
                .ok_or(VerifyError::UnknownFunction { at, index })?;
            (callee.arity as usize, callee.returns_value as usize)
        }
        // Checked against the function's result by the caller.
        StackEffect::Return => (0, 0),
    };
    Ok(effect)
}

/// Worklist dataflow over the function's control-flow graph.
fn check_stack(program: &Program, function: &Function) -> Result<(), VerifyError> {
    let body = function.body();
    let mut depths: Vec<Option<usize>> = vec![None; body.len()];
    let mut worklist = vec![(body.start, 0usize)];

    while let Some((at, depth)) = worklist.pop() {
        if !body.contains(&at) {
            return Err(VerifyError::FallsOffEnd {
                function: function.name.clone(),
            });
        }
        match depths[at - body.start] {
            Some(expected) if expected == depth => continue,
            Some(expected) => {
                return Err(VerifyError::InconsistentDepth {
                    at,
                    function: function.name.clone(),
                    expected,
                    found: depth,
                });
            }
            None => depths[at - body.start] = Some(depth),
        }

        let instruction = &program.code[at];
        if instruction.kind == OpcodeKind::Return {
            let expected = function.returns_value as usize;
            if depth != expected {
                return Err(VerifyError::ReturnDepth {
                    at,
                    function: function.name.clone(),
                    expected,
                    found: depth,
                });
            }
            continue;
        }

        let (pops, pushes) = stack_effect(program, at, instruction)?;
        let after = depth
            .checked_sub(pops)
            .ok_or_else(|| VerifyError::StackUnderflow {
                at,
                function: function.name.clone(),
            })?
            + pushes;

        if let Some(Operand::Target(target)) = instruction.operands.first()
            && matches!(instruction.kind, OpcodeKind::Jump | OpcodeKind::JumpIfFalse)
        {
            worklist.push((*target as usize, after));
        }
        if !instruction.kind.is_terminator() {
            worklist.push((at + 1, after));
        }
    }
    Ok(())
}
