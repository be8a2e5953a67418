//! Bytecode executor.
//!
//! # Execution Model
//!
//! - One operand stack shared by every frame of a machine; each frame
//!   remembers the stack height it started at.
//! - A frame owns a fixed local array sized from the function table.
//! - The loop fetches `code[pc]`, advances `pc`, and dispatches to the handler
//!   table. Handlers move `pc` for jumps and push or pop frames for calls.
//! - A fiber runs on its own thread with a fresh [`Machine`] that shares the
//!   program and host registry, never the caller's stack or locals.
//!
//! Faults are never recovered inside the machine: the first [`RuntimeError`]
//! unwinds the whole run.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use ard_bytecode::{Function, Instruction, VerifiedProgram, operand::operand_const};
use tracing::{debug, error, info};

use crate::config::VmConfig;
use crate::error::RuntimeError;
use crate::fiber::Fiber;
use crate::handlers::handler_for;
use crate::host::Host;
use crate::value::{Closure, Value};

struct Frame {
    function: usize,
    pc: usize,
    /// Operand stack height when the frame was entered.
    base: usize,
    locals: Vec<Value>,
}

/// A verified program bound to a host registry.
pub struct Vm {
    program: Arc<VerifiedProgram>,
    host: Arc<Host>,
    config: VmConfig,
}

impl Vm {
    pub fn new(program: VerifiedProgram, host: Host) -> Self {
        Self::with_shared_host(program, Arc::new(host))
    }

    pub fn with_shared_host(program: VerifiedProgram, host: Arc<Host>) -> Self {
        Self {
            program: Arc::new(program),
            host,
            config: VmConfig::default(),
        }
    }

    pub fn with_config(mut self, config: VmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn program(&self) -> &VerifiedProgram {
        &self.program
    }

    /// Run the entry function to completion.
    pub fn run(&self) -> Result<Value, RuntimeError> {
        let entry = self.program.entry as usize;
        let name = self
            .program
            .function(entry)
            .map(|function| function.name.as_str())
            .unwrap_or_default();
        info!(entry = name, "Running program");
        let result = self.machine().call(entry, Vec::new());
        match &result {
            Ok(value) => debug!(result = %value, "Program finished"),
            Err(err) => error!(error = %err, "Program faulted"),
        }
        result
    }

    /// Run any function by name with explicit arguments.
    pub fn run_function(&self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let index = self
            .program
            .function_index(name)
            .ok_or_else(|| RuntimeError::UnknownFunction { name: name.to_string() })?;
        let arity = self.program.functions[index].arity as usize;
        if args.len() != arity {
            return Err(RuntimeError::ArgumentCount {
                name: name.to_string(),
                expected: arity,
                found: args.len(),
            });
        }
        self.machine().call(index, args)
    }

    fn machine(&self) -> Machine {
        Machine::new(Arc::clone(&self.program), Arc::clone(&self.host), self.config)
    }
}

/// Interpreter state for one thread of execution.
pub(crate) struct Machine {
    program: Arc<VerifiedProgram>,
    host: Arc<Host>,
    config: VmConfig,
    stack: Vec<Value>,
    frames: Vec<Frame>,
}

impl Machine {
    fn new(program: Arc<VerifiedProgram>, host: Arc<Host>, config: VmConfig) -> Self {
        Self {
            program,
            host,
            config,
            stack: Vec::with_capacity(256),
            frames: Vec::with_capacity(16),
        }
    }

    pub(crate) fn host(&self) -> &Host {
        &self.host
    }

    fn function(&self, index: usize) -> Result<&Function, RuntimeError> {
        self.program.function(index).ok_or_else(|| RuntimeError::UnknownFunction {
            name: format!("#{index}"),
        })
    }

    /// Call `function` with `args` and run until it returns.
    fn call(&mut self, function: usize, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let floor = self.frames.len();
        let base = self.stack.len();
        self.enter(function, args)?;
        self.execute(floor)?;
        Ok(if self.stack.len() > base {
            self.pop()?
        } else {
            Value::Void
        })
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let mut locals = args;
        locals.extend(closure.captures.iter().cloned());
        self.call(closure.function as usize, locals)
    }

    fn execute(&mut self, floor: usize) -> Result<(), RuntimeError> {
        let program = Arc::clone(&self.program);
        while self.frames.len() > floor {
            let frame = self.frames.last_mut().ok_or(RuntimeError::StackUnderflow)?;
            let pc = frame.pc;
            let instruction = program
                .code
                .get(pc)
                .ok_or(RuntimeError::ProgramCounter { pc })?;
            frame.pc += 1;
            let handler = handler_for(instruction.kind).ok_or_else(|| RuntimeError::UnsupportedOpcode {
                opcode: format!("{:?}", instruction.kind),
            })?;
            handler(instruction, self)?;
        }
        Ok(())
    }

    /// Push a frame for `function`. `locals` holds the arguments (followed by
    /// captures for closures); the rest of the frame starts as void.
    pub(crate) fn enter(&mut self, function: usize, mut locals: Vec<Value>) -> Result<(), RuntimeError> {
        if self.frames.len() >= self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.config.max_call_depth,
            });
        }
        let callee = self.function(function)?;
        let (entry, size) = (callee.entry as usize, callee.locals as usize);
        locals.resize(size.max(locals.len()), Value::Void);
        self.frames.push(Frame {
            function,
            pc: entry,
            base: self.stack.len(),
            locals,
        });
        Ok(())
    }

    /// Pop the current frame, leaving its result (if any) for the caller.
    pub(crate) fn leave(&mut self) -> Result<(), RuntimeError> {
        let frame = self.frames.last().ok_or(RuntimeError::StackUnderflow)?;
        let (function, base) = (frame.function, frame.base);
        let result = if self.function(function)?.returns_value {
            Some(self.pop()?)
        } else {
            None
        };
        self.frames.pop();
        self.stack.truncate(base);
        if let Some(value) = result {
            self.stack.push(value);
        }
        Ok(())
    }

    /// Call a function by table index, taking its arguments off the stack.
    pub(crate) fn call_indexed(&mut self, function: usize) -> Result<(), RuntimeError> {
        let arity = self.function(function)?.arity as usize;
        let args = self.pop_n(arity)?;
        self.enter(function, args)
    }

    /// Call a closure value with arguments already popped.
    pub(crate) fn call_value(&mut self, closure: &Closure, args: Vec<Value>) -> Result<(), RuntimeError> {
        let callee = self.function(closure.function as usize)?;
        if callee.arity as usize != args.len() {
            return Err(RuntimeError::ArgumentCount {
                name: callee.name.clone(),
                expected: callee.arity as usize,
                found: args.len(),
            });
        }
        let mut locals = args;
        locals.extend(closure.captures.iter().cloned());
        self.enter(closure.function as usize, locals)
    }

    /// Run `closure` on a new thread and return its completion handle.
    pub(crate) fn spawn_fiber(&self, closure: Arc<Closure>) -> Result<Arc<Fiber>, RuntimeError> {
        let fiber = Arc::new(Fiber::new());
        let completion = Arc::clone(&fiber);
        let mut machine = Machine::new(Arc::clone(&self.program), Arc::clone(&self.host), self.config);

        thread::Builder::new()
            .name("ard-fiber".into())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    machine.call_closure(&closure, Vec::new())
                }));
                let outcome = match outcome {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(err.to_string()),
                    Err(payload) => Err(panic_message(payload.as_ref())),
                };
                if let Err(message) = &outcome {
                    error!(%message, "Fiber failed");
                }
                completion.complete(outcome);
            })
            .map_err(|e| RuntimeError::Host {
                context: "async::start".into(),
                message: e.to_string(),
            })?;
        debug!("Fiber started");
        Ok(fiber)
    }

    pub(crate) fn jump(&mut self, target: usize) -> Result<(), RuntimeError> {
        let frame = self.frames.last_mut().ok_or(RuntimeError::StackUnderflow)?;
        frame.pc = target;
        Ok(())
    }

    pub(crate) fn local(&self, slot: usize) -> Result<Value, RuntimeError> {
        self.frames
            .last()
            .and_then(|frame| frame.locals.get(slot))
            .cloned()
            .ok_or_else(|| RuntimeError::InvalidOperand(slot_error(slot)))
    }

    pub(crate) fn set_local(&mut self, slot: usize, value: Value) -> Result<(), RuntimeError> {
        let target = self
            .frames
            .last_mut()
            .and_then(|frame| frame.locals.get_mut(slot))
            .ok_or_else(|| RuntimeError::InvalidOperand(slot_error(slot)))?;
        *target = value;
        Ok(())
    }

    /// Constant operand `index` of `instruction` as a value.
    pub(crate) fn constant(&self, instruction: &Instruction, index: usize) -> Result<Value, RuntimeError> {
        let at = operand_const(&instruction.operands, index)?;
        self.program
            .constant(at)
            .map(Value::from)
            .ok_or(RuntimeError::InvalidConstant { index: at })
    }

    /// String constant operand `index` of `instruction`.
    pub(crate) fn name(&self, instruction: &Instruction, index: usize) -> Result<String, RuntimeError> {
        let at = operand_const(&instruction.operands, index)?;
        self.program
            .constant(at)
            .and_then(|constant| constant.as_str())
            .map(str::to_string)
            .ok_or(RuntimeError::InvalidConstant { index: at })
    }

    pub(crate) fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        let base = self.frames.last().map_or(0, |frame| frame.base);
        if self.stack.len().saturating_sub(base) >= self.config.max_stack_depth {
            return Err(RuntimeError::StackOverflow {
                limit: self.config.max_stack_depth,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    pub(crate) fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.stack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    /// Pop `count` values, returned in push order.
    pub(crate) fn pop_n(&mut self, count: usize) -> Result<Vec<Value>, RuntimeError> {
        let at = self
            .stack
            .len()
            .checked_sub(count)
            .ok_or(RuntimeError::StackUnderflow)?;
        Ok(self.stack.split_off(at))
    }
}

fn slot_error(slot: usize) -> ard_bytecode::OperandError {
    ard_bytecode::OperandError {
        message: format!("local slot {slot} out of range"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "fiber panicked".to_string()
}

#[cfg(test)]
mod tests;
