//! Runtime faults.

use ard_bytecode::OperandError;

/// A fault that aborts execution of the current fiber.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// Operand stack of one frame exceeded its configured budget.
    #[error("Stack overflow: frame exceeded {limit} values")]
    StackOverflow {
        /// Configured per-frame limit.
        limit: usize,
    },

    /// Too many nested calls.
    #[error("Call depth exceeded: more than {limit} nested calls")]
    CallDepthExceeded {
        /// Configured frame limit.
        limit: usize,
    },

    /// Attempted to pop from an empty operand stack.
    #[error("Stack underflow: tried to pop from empty stack")]
    StackUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow in {operation}")]
    IntegerOverflow { operation: &'static str },

    /// List index outside `0..size`.
    #[error("Index {index} out of range for list of size {size}")]
    IndexOutOfRange { index: i64, size: usize },

    /// A value had the wrong shape for the instruction consuming it.
    #[error("Type mismatch in {operation}: expected {expected}, found {found}")]
    TypeMismatch {
        operation: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unwrapped an absent value")]
    UnwrapNone,

    #[error("Unknown module `{module}`")]
    UnknownModule { module: String },

    #[error("Module `{module}` has no function `{function}`")]
    UnknownModuleFunction { module: String, function: String },

    #[error("No foreign function registered as `{name}`")]
    UnknownForeign { name: String },

    /// A host function failed outside a fallible call.
    #[error("{context} failed: {message}")]
    Host { context: String, message: String },

    #[error("Unknown function `{name}`")]
    UnknownFunction { name: String },

    #[error("Function `{name}` expects {expected} argument(s), found {found}")]
    ArgumentCount {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("Constant {index} out of range")]
    InvalidConstant { index: usize },

    #[error("Program counter {pc} is outside the code stream")]
    ProgramCounter { pc: usize },

    #[error("No handler for opcode {opcode}")]
    UnsupportedOpcode { opcode: String },

    /// The awaited fiber faulted or panicked.
    #[error("Fiber failed: {message}")]
    FiberFailed { message: String },

    #[error(transparent)]
    InvalidOperand(#[from] OperandError),
}

impl RuntimeError {
    pub(crate) fn mismatch(operation: &'static str, expected: &'static str, found: &crate::Value) -> Self {
        RuntimeError::TypeMismatch {
            operation,
            expected,
            found: found.type_name(),
        }
    }
}
