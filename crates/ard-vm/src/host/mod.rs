//! The host boundary: module handlers and foreign functions.
//!
//! Programs reach the outside world only through this registry. `io::print`
//! becomes a [`ModuleHandler`] call on the `io` handler; an `extern fn` binding
//! becomes a lookup in the foreign function table. Both tables sit behind
//! `RwLock`s: registration happens before a program runs, lookups happen from
//! any fiber thread.

mod foreign;
mod modules;

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::value::Value;

pub use foreign::{env_get, time_now};
pub use modules::{AsyncModule, FloatModule, FsModule, IntModule, IoModule};

/// Failure reported by a host function.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    /// The handler has no function of that name.
    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("expected {expected} argument(s), found {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("expected {expected} argument, found {found}")]
    ArgumentType {
        expected: &'static str,
        found: &'static str,
    },

    /// The operation itself failed; fallible calls hand this to the program
    /// as `err(message)`.
    #[error("{0}")]
    Failed(String),
}

/// Destination of program output.
#[derive(Debug, Clone, Default)]
pub enum OutputSink {
    #[default]
    Stdout,
    /// Shared in-memory buffer.
    Buffer(Arc<Mutex<Vec<u8>>>),
}

impl OutputSink {
    pub fn buffer() -> Self {
        OutputSink::Buffer(Arc::default())
    }

    pub fn write_line(&self, text: &str) -> std::io::Result<()> {
        match self {
            OutputSink::Stdout => {
                let mut out = std::io::stdout().lock();
                writeln!(out, "{text}")?;
                out.flush()
            }
            OutputSink::Buffer(buffer) => {
                let mut buffer = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                writeln!(buffer, "{text}")
            }
        }
    }

    /// Everything written so far. Always empty for stdout.
    pub fn contents(&self) -> String {
        match self {
            OutputSink::Stdout => String::new(),
            OutputSink::Buffer(buffer) => {
                let buffer = buffer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                String::from_utf8_lossy(&buffer).into_owned()
            }
        }
    }
}

/// What a host function may see of the running VM.
pub struct HostContext<'a> {
    output: &'a OutputSink,
}

impl<'a> HostContext<'a> {
    pub fn output(&self) -> &'a OutputSink {
        self.output
    }

    pub fn print(&self, text: &str) -> Result<(), HostError> {
        self.output
            .write_line(text)
            .map_err(|e| HostError::Failed(e.to_string()))
    }
}

/// A std or embedder-provided module, dispatched by function name.
pub trait ModuleHandler: Send + Sync {
    /// Module name as it appears in calls, e.g. `io`.
    fn name(&self) -> &str;

    fn call(&self, function: &str, args: Vec<Value>, ctx: &HostContext<'_>) -> Result<Value, HostError>;
}

/// A function bound by `extern fn ... = "name"`.
pub type ForeignFn = Arc<dyn Fn(&HostContext<'_>, Vec<Value>) -> Result<Value, HostError> + Send + Sync>;

/// Registry of module handlers and foreign functions, shared by all fibers.
pub struct Host {
    modules: RwLock<HashMap<String, Arc<dyn ModuleHandler>>>,
    foreign: RwLock<HashMap<String, ForeignFn>>,
    output: OutputSink,
}

impl Host {
    /// An empty registry.
    pub fn new(output: OutputSink) -> Self {
        Self {
            modules: RwLock::default(),
            foreign: RwLock::default(),
            output,
        }
    }

    /// The std module handlers plus the default foreign functions.
    pub fn with_defaults(output: OutputSink) -> Self {
        let host = Self::new(output);
        host.register_module(IoModule);
        host.register_module(FsModule);
        host.register_module(FloatModule);
        host.register_module(IntModule);
        host.register_module(AsyncModule);
        host.register_foreign("time_now", time_now);
        host.register_foreign("env_get", env_get);
        host
    }

    pub fn output(&self) -> &OutputSink {
        &self.output
    }

    /// Register a module handler, replacing any handler of the same name.
    pub fn register_module(&self, handler: impl ModuleHandler + 'static) {
        let name = handler.name().to_string();
        debug!(module = %name, "Registered module handler");
        self.modules
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name, Arc::new(handler));
    }

    pub fn register_foreign<F>(&self, name: &str, function: F)
    where
        F: Fn(&HostContext<'_>, Vec<Value>) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        debug!(name, "Registered foreign function");
        self.foreign
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), Arc::new(function));
    }

    pub fn has_foreign(&self, name: &str) -> bool {
        self.foreign
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(name)
    }

    fn context(&self) -> HostContext<'_> {
        HostContext { output: &self.output }
    }

    /// Call `module::function`. `None` when no handler is registered for
    /// `module`.
    pub fn call_module(
        &self,
        module: &str,
        function: &str,
        args: Vec<Value>,
    ) -> Option<Result<Value, HostError>> {
        // Clone the handler out so the lock is not held across the call.
        let handler = self
            .modules
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(module)
            .cloned()?;
        Some(handler.call(function, args, &self.context()))
    }

    /// Call a foreign function. `None` when `name` is not registered.
    pub fn call_foreign(&self, name: &str, args: Vec<Value>) -> Option<Result<Value, HostError>> {
        let function = self
            .foreign
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()?;
        Some(function(&self.context(), args))
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::with_defaults(OutputSink::Stdout)
    }
}

/// Unpack exactly `N` arguments.
pub fn expect_args<const N: usize>(args: Vec<Value>) -> Result<[Value; N], HostError> {
    let found = args.len();
    args.try_into()
        .map_err(|_| HostError::ArgumentCount { expected: N, found })
}

pub fn str_arg(value: Value) -> Result<String, HostError> {
    match value {
        Value::Str(text) => Ok(text),
        other => Err(HostError::ArgumentType {
            expected: "Str",
            found: other.type_name(),
        }),
    }
}

pub fn int_arg(value: Value) -> Result<i64, HostError> {
    match value {
        Value::Int(number) => Ok(number),
        other => Err(HostError::ArgumentType {
            expected: "Int",
            found: other.type_name(),
        }),
    }
}

pub fn float_arg(value: Value) -> Result<f64, HostError> {
    match value {
        Value::Float(number) => Ok(number),
        other => Err(HostError::ArgumentType {
            expected: "Float",
            found: other.type_name(),
        }),
    }
}
