// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Bytecode for the Ard virtual machine.
//!
//! # Architecture
//!
//! - [`opcode`] / [`operand`] - instruction encoding
//! - [`registry`] - opcode metadata tables (operand shapes, stack effects)
//! - [`program`] - constant pool, function table, instruction stream
//! - [`emitter`] - checked program to bytecode
//! - [`verify`] - structural checks every program passes before it runs
//! - [`codec`] - binary serialization
//! - [`embed`] - payload footer for self-contained executables
//!
//! ```
//! use ard_bytecode::{emit, verify};
//!
//! let ast = ard_parser::parse_program("let x = 40 + 2\nx", 0).unwrap();
//! let checked = ard_check::check(&ast, &mut ard_check::NoModules);
//! let program = verify(emit(&checked.program).unwrap()).unwrap();
//! assert_eq!(program.entry_function().unwrap().name, "main");
//! ```

pub mod codec;
pub mod embed;
pub mod emitter;
pub mod opcode;
pub mod operand;
pub mod program;
pub mod registry;
pub mod verify;

pub use codec::{DecodeError, EncodeError, decode, encode};
pub use emitter::{EmitError, emit};
pub use opcode::{Instruction, OpcodeKind, OpcodeMetadata, OperandKind, StackEffect};
pub use operand::{Operand, OperandError, Slot};
pub use program::{Constant, Function, Program, VerifiedProgram};
pub use verify::{VerifyError, verify, verify_program};
