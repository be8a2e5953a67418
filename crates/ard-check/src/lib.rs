// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Type checker for Ard.
//!
//! ## Architecture
//!
//! - `types`: `Type` and the `TypeTable` holding type-variable bindings
//! - `scope`: arena of lexical scopes with isolation and generic contexts
//! - `checker`: walks the AST, produces a [`CheckedProgram`] and diagnostics
//! - `checked`: the typed program handed to the bytecode emitter
//! - `std_lib`: signatures of the `ard/...` packages
//! - `resolver`: loading of non-std modules
//!
//! ```
//! use ard_check::{check, resolver::NoModules};
//!
//! let program = ard_parser::parse_program("let x: Int = \"hi\"", 0).unwrap();
//! let output = check(&program, &mut NoModules);
//! assert_eq!(output.diagnostics.len(), 1);
//! assert!(output.has_errors());
//! ```

pub mod checked;
mod checker;
pub mod diagnostics;
pub mod resolver;
pub mod scope;
pub mod std_lib;
pub mod types;

pub use checked::{CheckedFunction, CheckedProgram};
pub use checker::{CheckOutput, check};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use resolver::{FsModuleResolver, ModuleResolver, NoModules, ResolveError};
