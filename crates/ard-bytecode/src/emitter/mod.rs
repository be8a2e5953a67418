//! Bytecode emitter: checked program to [`Program`].
//!
//! # Emission Strategy
//!
//! 1. Number every checked function; the table index is the call operand
//! 2. Walk each body depth-first, pushing arguments left to right
//! 3. Lower `if`, `match` and loops to jumps, backpatching absolute targets
//! 4. End every function with an explicit `Return`
//!
//! Locals are renumbered per function so that parameters come first and
//! closure captures directly after them, which is the layout the VM builds
//! a frame in. Loop counters and `match` subjects get hidden slots after the
//! checker's locals.
//!
//! Lists, maps and structs have value semantics: `xs.push(v)` is emitted as
//! load, update, store back.

use std::collections::HashMap;

use ard_check::CheckedProgram;
use ard_check::checked::{
    Builtin, CheckedFunction, LocalId, TArm, TBlock, TExpr, TExprKind, TPattern, TStmt,
};
use ard_ast::{BinaryOp, UnaryOp};
use indexmap::IndexSet;
use tracing::{debug, info};

use crate::opcode::{Instruction, OpcodeKind};
use crate::operand::{Operand, Slot};
use crate::program::{Constant, Function, Program};

/// Literal elements built in one `MakeList`/`MakeMap`; the rest are appended
/// one at a time so a literal never needs more operand stack than this.
pub const LITERAL_CHUNK: usize = 256;

/// Emission failure. Always a checker/emitter contract violation, never a
/// problem in the user's program.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitError {
    #[error("Unknown function `{name}`")]
    UnknownFunction { name: String },

    #[error("Unknown local {local} in `{function}`")]
    UnknownLocal { function: String, local: u32 },

    /// The checked program contains nodes the emitter cannot lower.
    #[error("Invalid checked program in `{function}`: {message}")]
    InvalidIR { function: String, message: String },
}

/// Emit a checked program. The program must have been checked without errors.
pub fn emit(program: &CheckedProgram) -> Result<Program, EmitError> {
    Emitter::new(program).emit()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Int(i64),
    Float(u64),
    Str(String),
    Bool(bool),
}

impl From<ConstKey> for Constant {
    fn from(key: ConstKey) -> Self {
        match key {
            ConstKey::Int(value) => Constant::Int(value),
            ConstKey::Float(bits) => Constant::Float(f64::from_bits(bits)),
            ConstKey::Str(value) => Constant::Str(value),
            ConstKey::Bool(value) => Constant::Bool(value),
        }
    }
}

/// Program-wide emission state.
struct Emitter<'p> {
    checked: &'p CheckedProgram,
    indices: HashMap<&'p str, u32>,
    constants: IndexSet<ConstKey>,
    code: Vec<Instruction>,
    functions: Vec<Function>,
}

impl<'p> Emitter<'p> {
    fn new(checked: &'p CheckedProgram) -> Self {
        let indices = checked
            .functions
            .iter()
            .enumerate()
            .map(|(index, function)| (function.name.as_str(), index as u32))
            .collect();
        Self {
            checked,
            indices,
            constants: IndexSet::new(),
            code: Vec::new(),
            functions: Vec::with_capacity(checked.functions.len()),
        }
    }

    fn emit(mut self) -> Result<Program, EmitError> {
        let checked = self.checked;
        let entry = self.function_index(&checked.entry)?;
        for function in &checked.functions {
            let entry = self.code.len() as u32;
            let locals = FunctionEmitter::new(&mut self, function)?.emit_body()?;
            let end = self.code.len() as u32;
            debug!(
                function = %function.name,
                instructions = end - entry,
                locals,
                "emitted function"
            );
            self.functions.push(Function {
                name: function.name.clone(),
                entry,
                end,
                arity: function.params.len() as u32,
                locals,
                returns_value: function.returns_value,
            });
        }

        let program = Program {
            constants: self.constants.into_iter().map(Constant::from).collect(),
            functions: self.functions,
            code: self.code,
            entry,
        };
        info!(
            functions = program.functions.len(),
            instructions = program.code.len(),
            constants = program.constants.len(),
            "emitted program"
        );
        Ok(program)
    }

    fn function_index(&self, name: &str) -> Result<u32, EmitError> {
        self.indices
            .get(name)
            .copied()
            .ok_or_else(|| EmitError::UnknownFunction {
                name: name.to_string(),
            })
    }

    fn constant(&mut self, key: ConstKey) -> Operand {
        let (index, _) = self.constants.insert_full(key);
        Operand::Const(index as u32)
    }
}

/// Jump instructions whose target is the end of the innermost loop.
#[derive(Default)]
struct LoopFrame {
    breaks: Vec<usize>,
}

/// Emission state for one function body.
struct FunctionEmitter<'e, 'p> {
    program: &'e mut Emitter<'p>,
    function: &'p CheckedFunction,
    slots: Vec<Option<u32>>,
    next_slot: u32,
    loops: Vec<LoopFrame>,
}

impl<'e, 'p> FunctionEmitter<'e, 'p> {
    fn new(program: &'e mut Emitter<'p>, function: &'p CheckedFunction) -> Result<Self, EmitError> {
        let mut emitter = Self {
            program,
            function,
            slots: vec![None; function.local_count as usize],
            next_slot: 0,
            loops: Vec::new(),
        };
        for local in function.params.iter().chain(&function.captures) {
            emitter.assign(*local)?;
        }
        for local in 0..function.local_count {
            if emitter.slots[local as usize].is_none() {
                emitter.assign(LocalId(local))?;
            }
        }
        Ok(emitter)
    }

    fn assign(&mut self, local: LocalId) -> Result<(), EmitError> {
        let slot = self
            .slots
            .get_mut(local.0 as usize)
            .ok_or_else(|| EmitError::UnknownLocal {
                function: self.function.name.clone(),
                local: local.0,
            })?;
        if slot.is_none() {
            *slot = Some(self.next_slot);
            self.next_slot += 1;
        }
        Ok(())
    }

    /// Emit the body and trailing `Return`. Returns the frame size.
    fn emit_body(mut self) -> Result<u32, EmitError> {
        let function = self.function;
        if function.returns_value && !function.body.produces_value() {
            return Err(self.invalid("function returns a value but its body yields none"));
        }
        self.emit_block(&function.body, function.returns_value)?;
        self.push(OpcodeKind::Return, vec![]);
        Ok(self.next_slot)
    }

    // === Helpers ===

    fn invalid(&self, message: impl Into<String>) -> EmitError {
        EmitError::InvalidIR {
            function: self.function.name.clone(),
            message: message.into(),
        }
    }

    fn slot(&self, local: LocalId) -> Result<Operand, EmitError> {
        self.slots
            .get(local.0 as usize)
            .copied()
            .flatten()
            .map(|slot| Operand::Local(Slot::new(slot)))
            .ok_or_else(|| EmitError::UnknownLocal {
                function: self.function.name.clone(),
                local: local.0,
            })
    }

    /// A slot no checked local uses.
    fn hidden_slot(&mut self) -> Operand {
        let slot = self.next_slot;
        self.next_slot += 1;
        Operand::Local(Slot::new(slot))
    }

    fn push(&mut self, kind: OpcodeKind, operands: Vec<Operand>) -> usize {
        self.program.code.push(Instruction::new(kind, operands));
        self.program.code.len() - 1
    }

    fn here(&self) -> usize {
        self.program.code.len()
    }

    /// Emit a jump with a placeholder target; see [`Self::patch`].
    fn jump(&mut self, kind: OpcodeKind) -> usize {
        self.push(kind, vec![Operand::Target(-1)])
    }

    fn jump_to(&mut self, kind: OpcodeKind, target: usize) -> Result<(), EmitError> {
        let target = self.target(target)?;
        self.push(kind, vec![target]);
        Ok(())
    }

    /// Point the jump at `at` to the current end of the stream.
    fn patch(&mut self, at: usize) -> Result<(), EmitError> {
        let target = self.target(self.here())?;
        if let Some(instruction) = self.program.code.get_mut(at) {
            instruction.operands = vec![target];
        }
        Ok(())
    }

    fn target(&self, index: usize) -> Result<Operand, EmitError> {
        i32::try_from(index)
            .map(Operand::Target)
            .map_err(|_| self.invalid("instruction stream exceeds the jump range"))
    }

    fn load(&mut self, local: LocalId) -> Result<(), EmitError> {
        let slot = self.slot(local)?;
        self.push(OpcodeKind::Load, vec![slot]);
        Ok(())
    }

    fn store(&mut self, local: LocalId) -> Result<(), EmitError> {
        let slot = self.slot(local)?;
        self.push(OpcodeKind::Store, vec![slot]);
        Ok(())
    }

    fn constant(&mut self, key: ConstKey) {
        let operand = self.program.constant(key);
        self.push(OpcodeKind::Const, vec![operand]);
    }

    fn int(&mut self, value: i64) {
        self.constant(ConstKey::Int(value));
    }

    fn str_constant(&mut self, value: &str) -> Operand {
        self.program.constant(ConstKey::Str(value.to_string()))
    }

    // === Statements ===

    /// Emit a block. With `keep` the block's value stays on the stack;
    /// otherwise every value is discarded.
    fn emit_block(&mut self, block: &TBlock, keep: bool) -> Result<(), EmitError> {
        if keep && !block.produces_value() {
            return Err(self.invalid("expected a block that yields a value"));
        }
        let count = block.stmts.len();
        for (index, stmt) in block.stmts.iter().enumerate() {
            let last = index + 1 == count;
            match stmt {
                TStmt::Expr(expr) if last && keep => self.emit_expr(expr)?,
                _ if last && keep => {
                    return Err(self.invalid("block value is not an expression"));
                }
                _ => self.emit_stmt(stmt)?,
            }
        }
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &TStmt) -> Result<(), EmitError> {
        match stmt {
            TStmt::Let { local, value } | TStmt::Assign { local, value } => {
                self.emit_expr(value)?;
                self.store(*local)
            }
            TStmt::SetField {
                local,
                index,
                value,
            } => {
                self.load(*local)?;
                self.emit_expr(value)?;
                self.push(OpcodeKind::SetField, vec![Operand::Count(*index)]);
                self.store(*local)
            }
            TStmt::While { cond, body } => {
                let start = self.here();
                self.emit_expr(cond)?;
                let exit = self.jump(OpcodeKind::JumpIfFalse);
                self.emit_loop_body(body, start, exit)
            }
            TStmt::ForRange {
                var,
                start,
                end,
                body,
            } => {
                let counter = self.hidden_slot();
                let limit = self.hidden_slot();
                self.emit_expr(start)?;
                self.push(OpcodeKind::Store, vec![counter]);
                self.emit_expr(end)?;
                self.push(OpcodeKind::Store, vec![limit]);

                let head = self.here();
                self.push(OpcodeKind::Load, vec![counter]);
                self.push(OpcodeKind::Load, vec![limit]);
                self.push(OpcodeKind::Lt, vec![]);
                let exit = self.jump(OpcodeKind::JumpIfFalse);
                self.push(OpcodeKind::Load, vec![counter]);
                self.store(*var)?;
                self.emit_counted_body(body, counter, head, exit)
            }
            TStmt::ForIn { var, iter, body } => {
                let list = self.hidden_slot();
                let counter = self.hidden_slot();
                self.emit_expr(iter)?;
                self.push(OpcodeKind::Store, vec![list]);
                self.int(0);
                self.push(OpcodeKind::Store, vec![counter]);

                let head = self.here();
                self.push(OpcodeKind::Load, vec![counter]);
                self.push(OpcodeKind::Load, vec![list]);
                self.push(OpcodeKind::Size, vec![]);
                self.push(OpcodeKind::Lt, vec![]);
                let exit = self.jump(OpcodeKind::JumpIfFalse);
                self.push(OpcodeKind::Load, vec![list]);
                self.push(OpcodeKind::Load, vec![counter]);
                self.push(OpcodeKind::ListAt, vec![]);
                self.store(*var)?;
                self.emit_counted_body(body, counter, head, exit)
            }
            TStmt::Break => {
                let at = self.jump(OpcodeKind::Jump);
                match self.loops.last_mut() {
                    Some(frame) => {
                        frame.breaks.push(at);
                        Ok(())
                    }
                    None => Err(self.invalid("`break` outside of a loop")),
                }
            }
            TStmt::Expr(expr) => {
                self.emit_expr(expr)?;
                if expr.produces_value() {
                    self.push(OpcodeKind::Pop, vec![]);
                }
                Ok(())
            }
        }
    }

    /// Body of a `while`: jumps back to `head`, `exit` and every `break`
    /// land after it.
    fn emit_loop_body(&mut self, body: &TBlock, head: usize, exit: usize) -> Result<(), EmitError> {
        self.loops.push(LoopFrame::default());
        self.emit_block(body, false)?;
        self.jump_to(OpcodeKind::Jump, head)?;
        self.finish_loop(exit)
    }

    /// Body of a `for`: increments `counter` before jumping back.
    fn emit_counted_body(
        &mut self,
        body: &TBlock,
        counter: Operand,
        head: usize,
        exit: usize,
    ) -> Result<(), EmitError> {
        self.loops.push(LoopFrame::default());
        self.emit_block(body, false)?;
        self.push(OpcodeKind::Load, vec![counter]);
        self.int(1);
        self.push(OpcodeKind::Add, vec![]);
        self.push(OpcodeKind::Store, vec![counter]);
        self.jump_to(OpcodeKind::Jump, head)?;
        self.finish_loop(exit)
    }

    fn finish_loop(&mut self, exit: usize) -> Result<(), EmitError> {
        let frame = self.loops.pop().unwrap_or_default();
        self.patch(exit)?;
        for at in frame.breaks {
            self.patch(at)?;
        }
        Ok(())
    }

    // === Expressions ===

    fn emit_exprs(&mut self, exprs: &[TExpr]) -> Result<u32, EmitError> {
        for expr in exprs {
            self.emit_expr(expr)?;
        }
        Ok(exprs.len() as u32)
    }

    fn emit_expr(&mut self, expr: &TExpr) -> Result<(), EmitError> {
        match &expr.kind {
            TExprKind::Int(value) => self.int(*value),
            TExprKind::Float(value) => self.constant(ConstKey::Float(value.to_bits())),
            TExprKind::Str(value) => self.constant(ConstKey::Str(value.clone())),
            TExprKind::Bool(value) => self.constant(ConstKey::Bool(*value)),
            TExprKind::Invalid => {
                return Err(self.invalid("expression that failed to check"));
            }
            TExprKind::Local(local) => self.load(*local)?,
            TExprKind::List(items) => {
                let (head, rest) = items.split_at(items.len().min(LITERAL_CHUNK));
                let count = self.emit_exprs(head)?;
                self.push(OpcodeKind::MakeList, vec![Operand::Count(count)]);
                for item in rest {
                    self.emit_expr(item)?;
                    self.push(OpcodeKind::ListPush, vec![]);
                }
            }
            TExprKind::Map(entries) => {
                let (head, rest) = entries.split_at(entries.len().min(LITERAL_CHUNK));
                for (key, value) in head {
                    self.emit_expr(key)?;
                    self.emit_expr(value)?;
                }
                self.push(OpcodeKind::MakeMap, vec![Operand::Count(head.len() as u32)]);
                for (key, value) in rest {
                    self.emit_expr(key)?;
                    self.emit_expr(value)?;
                    self.push(OpcodeKind::MapSet, vec![]);
                }
            }
            TExprKind::Unary { op, operand } => {
                self.emit_expr(operand)?;
                let kind = match op {
                    UnaryOp::Neg => OpcodeKind::Neg,
                    UnaryOp::Not => OpcodeKind::Not,
                };
                self.push(kind, vec![]);
            }
            TExprKind::Binary { op, lhs, rhs } => self.emit_binary(*op, lhs, rhs)?,
            TExprKind::Call { function, args } => {
                self.emit_exprs(args)?;
                let index = self.program.function_index(function)?;
                self.push(OpcodeKind::Call, vec![Operand::Function(index)]);
            }
            TExprKind::CallExtern { binding, args } => {
                let count = self.emit_exprs(args)?;
                let binding = self.str_constant(binding);
                self.push(
                    OpcodeKind::CallExtern,
                    vec![binding, Operand::Count(count), Operand::Flag(expr.produces_value())],
                );
            }
            TExprKind::CallValue { callee, args } => {
                self.emit_expr(callee)?;
                let count = self.emit_exprs(args)?;
                self.push(
                    OpcodeKind::CallValue,
                    vec![Operand::Count(count), Operand::Flag(expr.produces_value())],
                );
            }
            TExprKind::FunctionRef(name) => {
                let index = self.program.function_index(name)?;
                self.push(
                    OpcodeKind::MakeClosure,
                    vec![Operand::Function(index), Operand::Count(0)],
                );
            }
            TExprKind::Closure { function, captures } => {
                for local in captures {
                    self.load(*local)?;
                }
                let index = self.program.function_index(function)?;
                self.push(
                    OpcodeKind::MakeClosure,
                    vec![Operand::Function(index), Operand::Count(captures.len() as u32)],
                );
            }
            TExprKind::ModuleCall {
                module,
                function,
                args,
                fallible,
            } => {
                let count = self.emit_exprs(args)?;
                let module = self.str_constant(module);
                let function = self.str_constant(function);
                self.push(
                    OpcodeKind::ModuleCall,
                    vec![
                        module,
                        function,
                        Operand::Count(count),
                        Operand::Flag(expr.produces_value()),
                        Operand::Flag(*fallible),
                    ],
                );
            }
            TExprKind::MakeSome(value) => self.emit_wrapped(OpcodeKind::MakeSome, value)?,
            TExprKind::MakeNone => {
                self.push(OpcodeKind::MakeNone, vec![]);
            }
            TExprKind::MakeOk(value) => self.emit_wrapped(OpcodeKind::MakeOk, value)?,
            TExprKind::MakeErr(value) => self.emit_wrapped(OpcodeKind::MakeErr, value)?,
            TExprKind::StartFiber(body) => self.emit_wrapped(OpcodeKind::StartFiber, body)?,
            TExprKind::Builtin {
                method,
                receiver,
                args,
            } => {
                self.emit_expr(receiver)?;
                self.emit_exprs(args)?;
                let (kind, operands) = match method {
                    Builtin::Size => (OpcodeKind::Size, vec![]),
                    Builtin::At => (OpcodeKind::ListAt, vec![]),
                    Builtin::ToStr => (OpcodeKind::ToStr, vec![]),
                    Builtin::Wait => (OpcodeKind::Wait, vec![Operand::Flag(expr.produces_value())]),
                    Builtin::MapGet => (OpcodeKind::MapGet, vec![]),
                    Builtin::MapHas => (OpcodeKind::MapHas, vec![]),
                    Builtin::IsSome => (OpcodeKind::IsSome, vec![]),
                    Builtin::IsNone => (OpcodeKind::IsNone, vec![]),
                    Builtin::Or => (OpcodeKind::MaybeOr, vec![]),
                    Builtin::IsOk => (OpcodeKind::IsOk, vec![]),
                    Builtin::IsErr => (OpcodeKind::IsErr, vec![]),
                };
                self.push(kind, operands);
            }
            TExprKind::Push { local, value } => {
                self.load(*local)?;
                self.emit_expr(value)?;
                self.push(OpcodeKind::ListPush, vec![]);
                self.store(*local)?;
            }
            TExprKind::MapSet { local, key, value } => {
                self.load(*local)?;
                self.emit_expr(key)?;
                self.emit_expr(value)?;
                self.push(OpcodeKind::MapSet, vec![]);
                self.store(*local)?;
            }
            TExprKind::Field { target, index } => {
                self.emit_expr(target)?;
                self.push(OpcodeKind::GetField, vec![Operand::Count(*index)]);
            }
            TExprKind::StructLit { name, fields } => {
                let count = self.emit_exprs(fields)?;
                let name = self.str_constant(name);
                self.push(OpcodeKind::MakeStruct, vec![name, Operand::Count(count)]);
            }
            TExprKind::If {
                branches,
                else_block,
            } => self.emit_if(branches, else_block.as_ref(), expr.produces_value())?,
            TExprKind::Match { subject, arms } => {
                self.emit_match(subject, arms, expr.produces_value())?
            }
        }
        Ok(())
    }

    fn emit_wrapped(&mut self, kind: OpcodeKind, value: &TExpr) -> Result<(), EmitError> {
        self.emit_expr(value)?;
        self.push(kind, vec![]);
        Ok(())
    }

    fn emit_binary(&mut self, op: BinaryOp, lhs: &TExpr, rhs: &TExpr) -> Result<(), EmitError> {
        let kind = match op {
            BinaryOp::And | BinaryOp::Or => return self.emit_logical(op, lhs, rhs),
            BinaryOp::Add => OpcodeKind::Add,
            BinaryOp::Sub => OpcodeKind::Sub,
            BinaryOp::Mul => OpcodeKind::Mul,
            BinaryOp::Div => OpcodeKind::Div,
            BinaryOp::Mod => OpcodeKind::Mod,
            BinaryOp::Eq => OpcodeKind::Eq,
            BinaryOp::Ne => OpcodeKind::NotEq,
            BinaryOp::Lt => OpcodeKind::Lt,
            BinaryOp::Le => OpcodeKind::LtEq,
            BinaryOp::Gt => OpcodeKind::Gt,
            BinaryOp::Ge => OpcodeKind::GtEq,
        };
        self.emit_expr(lhs)?;
        self.emit_expr(rhs)?;
        self.push(kind, vec![]);
        Ok(())
    }

    /// Short-circuit `and`/`or`.
    fn emit_logical(&mut self, op: BinaryOp, lhs: &TExpr, rhs: &TExpr) -> Result<(), EmitError> {
        self.emit_expr(lhs)?;
        if op == BinaryOp::Or {
            self.push(OpcodeKind::Not, vec![]);
        }
        let short = self.jump(OpcodeKind::JumpIfFalse);
        self.emit_expr(rhs)?;
        let end = self.jump(OpcodeKind::Jump);
        self.patch(short)?;
        self.constant(ConstKey::Bool(op == BinaryOp::Or));
        self.patch(end)
    }

    fn emit_if(
        &mut self,
        branches: &[(TExpr, TBlock)],
        else_block: Option<&TBlock>,
        keep: bool,
    ) -> Result<(), EmitError> {
        if keep && else_block.is_none() {
            return Err(self.invalid("`if` without `else` cannot yield a value"));
        }
        let mut ends = Vec::with_capacity(branches.len());
        for (cond, block) in branches {
            self.emit_expr(cond)?;
            let next = self.jump(OpcodeKind::JumpIfFalse);
            self.emit_block(block, keep)?;
            ends.push(self.jump(OpcodeKind::Jump));
            self.patch(next)?;
        }
        if let Some(block) = else_block {
            self.emit_block(block, keep)?;
        }
        for at in ends {
            self.patch(at)?;
        }
        Ok(())
    }

    /// Arms are tested in order; the last arm and a wildcard arm match
    /// unconditionally since the checker has proven the match exhaustive.
    fn emit_match(&mut self, subject: &TExpr, arms: &[TArm], keep: bool) -> Result<(), EmitError> {
        let value = self.hidden_slot();
        self.emit_expr(subject)?;
        self.push(OpcodeKind::Store, vec![value]);

        let mut ends = Vec::with_capacity(arms.len());
        for (index, arm) in arms.iter().enumerate() {
            let last = index + 1 == arms.len();
            let next = if last || arm.pattern == TPattern::Wildcard {
                None
            } else {
                self.emit_pattern_test(&arm.pattern, value)?;
                Some(self.jump(OpcodeKind::JumpIfFalse))
            };

            if let Some(binding) = arm.binding {
                self.push(OpcodeKind::Load, vec![value]);
                if matches!(arm.pattern, TPattern::Some | TPattern::Ok | TPattern::Err) {
                    self.push(OpcodeKind::Unwrap, vec![]);
                }
                self.store(binding)?;
            }
            self.emit_block(&arm.body, keep)?;

            match next {
                Some(next) => {
                    ends.push(self.jump(OpcodeKind::Jump));
                    self.patch(next)?;
                }
                None => break,
            }
        }
        for at in ends {
            self.patch(at)?;
        }
        Ok(())
    }

    /// Push whether the subject in `value` matches `pattern`.
    fn emit_pattern_test(&mut self, pattern: &TPattern, value: Operand) -> Result<(), EmitError> {
        self.push(OpcodeKind::Load, vec![value]);
        let (kind, operands) = match pattern {
            TPattern::Wildcard => return Err(self.invalid("a wildcard arm has no test")),
            TPattern::Bool(expected) => {
                self.constant(ConstKey::Bool(*expected));
                (OpcodeKind::Eq, vec![])
            }
            TPattern::Int(expected) => {
                self.int(*expected);
                (OpcodeKind::Eq, vec![])
            }
            TPattern::Str(expected) => {
                self.constant(ConstKey::Str(expected.clone()));
                (OpcodeKind::Eq, vec![])
            }
            TPattern::Type(tag) => (OpcodeKind::IsType, vec![self.str_constant(tag)]),
            TPattern::Some => (OpcodeKind::IsSome, vec![]),
            TPattern::None => (OpcodeKind::IsNone, vec![]),
            TPattern::Ok => (OpcodeKind::IsOk, vec![]),
            TPattern::Err => (OpcodeKind::IsErr, vec![]),
        };
        self.push(kind, operands);
        Ok(())
    }
}

#[cfg(test)]
mod tests;
