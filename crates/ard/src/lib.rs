//! Ard toolchain driver.
//!
//! The `ard` binary is a thin clap front end over these modules:
//!
//! - [`pipeline`] - read, parse, check, emit, verify, run and build
//! - [`embedded`] - detect and run a program appended to the executable
//! - [`format`] - the whitespace formatter behind `ard format`
//! - [`logging`] - tracing subscriber setup

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod embedded;
pub mod format;
pub mod logging;
pub mod pipeline;

pub use pipeline::{Checked, PipelineError};

/// Toolchain version reported by `ard version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
