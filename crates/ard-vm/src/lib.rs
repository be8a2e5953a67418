//! Stack-based virtual machine for Ard bytecode.
//!
//! The VM only accepts a [`VerifiedProgram`](ard_bytecode::VerifiedProgram):
//! every operand, jump and local slot has been checked before the first
//! instruction runs, so the executor treats a malformed instruction as a fault
//! rather than something to recover from.
//!
//! ```
//! use ard_vm::{Host, OutputSink, Value, Vm};
//!
//! let ast = ard_parser::parse_program("use ard/io\nio::print(\"hi\")\n1 + 2", 0).unwrap();
//! let checked = ard_check::check(&ast, &mut ard_check::NoModules);
//! let program = ard_bytecode::emit(&checked.program).unwrap();
//! let verified = ard_bytecode::verify(program).unwrap();
//!
//! let output = OutputSink::buffer();
//! let vm = Vm::new(verified, Host::with_defaults(output.clone()));
//! assert_eq!(vm.run().unwrap(), Value::Int(3));
//! assert_eq!(output.contents(), "hi\n");
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod executor;
pub mod fiber;
mod handlers;
pub mod host;
pub mod value;

pub use config::VmConfig;
pub use error::RuntimeError;
pub use executor::Vm;
pub use fiber::Fiber;
pub use host::{ForeignFn, Host, HostContext, HostError, ModuleHandler, OutputSink};
pub use value::{Closure, MapKey, StructValue, Value};
