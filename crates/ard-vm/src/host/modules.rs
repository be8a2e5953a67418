//! Std module handlers.

use std::io::BufRead;
use std::time::Duration;

use super::{HostContext, HostError, ModuleHandler, expect_args, float_arg, int_arg, str_arg};
use crate::value::Value;

/// `ard/io`: print, read_line.
pub struct IoModule;

impl ModuleHandler for IoModule {
    fn name(&self) -> &str {
        "io"
    }

    fn call(&self, function: &str, args: Vec<Value>, ctx: &HostContext<'_>) -> Result<Value, HostError> {
        match function {
            "print" => {
                let [text] = expect_args::<1>(args)?;
                ctx.print(&str_arg(text)?)?;
                Ok(Value::Void)
            }
            "read_line" => {
                let [] = expect_args::<0>(args)?;
                let mut line = String::new();
                let read = std::io::stdin()
                    .lock()
                    .read_line(&mut line)
                    .map_err(|e| HostError::Failed(e.to_string()))?;
                if read == 0 {
                    return Err(HostError::Failed("end of input".into()));
                }
                let trimmed = line.trim_end_matches(['\n', '\r']).len();
                line.truncate(trimmed);
                Ok(Value::Str(line))
            }
            other => Err(HostError::UnknownFunction(other.to_string())),
        }
    }
}

/// `ard/fs`: read, write, exists, delete.
pub struct FsModule;

fn io_failure(err: std::io::Error) -> HostError {
    HostError::Failed(err.to_string())
}

impl ModuleHandler for FsModule {
    fn name(&self) -> &str {
        "fs"
    }

    fn call(&self, function: &str, args: Vec<Value>, _ctx: &HostContext<'_>) -> Result<Value, HostError> {
        match function {
            "read" => {
                let [path] = expect_args::<1>(args)?;
                let content = std::fs::read_to_string(str_arg(path)?).map_err(io_failure)?;
                Ok(Value::Str(content))
            }
            "write" => {
                let [path, content] = expect_args::<2>(args)?;
                std::fs::write(str_arg(path)?, str_arg(content)?).map_err(io_failure)?;
                Ok(Value::Void)
            }
            "exists" => {
                let [path] = expect_args::<1>(args)?;
                let exists = std::path::Path::new(&str_arg(path)?).exists();
                Ok(Value::Bool(exists))
            }
            "delete" => {
                let [path] = expect_args::<1>(args)?;
                std::fs::remove_file(str_arg(path)?).map_err(io_failure)?;
                Ok(Value::Void)
            }
            other => Err(HostError::UnknownFunction(other.to_string())),
        }
    }
}

/// `ard/float`: from_int, from_str, to_int, floor.
pub struct FloatModule;

impl ModuleHandler for FloatModule {
    fn name(&self) -> &str {
        "float"
    }

    fn call(&self, function: &str, args: Vec<Value>, _ctx: &HostContext<'_>) -> Result<Value, HostError> {
        let [arg] = expect_args::<1>(args)?;
        match function {
            "from_int" => Ok(Value::Float(int_arg(arg)? as f64)),
            "from_str" => Ok(match str_arg(arg)?.trim().parse::<f64>() {
                Ok(number) => Value::some(Value::Float(number)),
                Err(_) => Value::none(),
            }),
            // Truncates toward zero, saturating at the Int range.
            "to_int" => Ok(Value::Int(float_arg(arg)? as i64)),
            "floor" => Ok(Value::Float(float_arg(arg)?.floor())),
            other => Err(HostError::UnknownFunction(other.to_string())),
        }
    }
}

/// `ard/int`: from_str, to_float.
pub struct IntModule;

impl ModuleHandler for IntModule {
    fn name(&self) -> &str {
        "int"
    }

    fn call(&self, function: &str, args: Vec<Value>, _ctx: &HostContext<'_>) -> Result<Value, HostError> {
        let [arg] = expect_args::<1>(args)?;
        match function {
            "from_str" => Ok(match str_arg(arg)?.trim().parse::<i64>() {
                Ok(number) => Value::some(Value::Int(number)),
                Err(_) => Value::none(),
            }),
            "to_float" => Ok(Value::Float(int_arg(arg)? as f64)),
            other => Err(HostError::UnknownFunction(other.to_string())),
        }
    }
}

/// `ard/async`: sleep. `start` is an opcode, not a host call.
pub struct AsyncModule;

impl ModuleHandler for AsyncModule {
    fn name(&self) -> &str {
        "async"
    }

    fn call(&self, function: &str, args: Vec<Value>, _ctx: &HostContext<'_>) -> Result<Value, HostError> {
        match function {
            "sleep" => {
                let [millis] = expect_args::<1>(args)?;
                let millis = u64::try_from(int_arg(millis)?).unwrap_or(0);
                std::thread::sleep(Duration::from_millis(millis));
                Ok(Value::Void)
            }
            other => Err(HostError::UnknownFunction(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OutputSink;

    fn call(handler: &dyn ModuleHandler, function: &str, args: Vec<Value>) -> Result<Value, HostError> {
        let output = OutputSink::buffer();
        handler.call(function, args, &HostContext { output: &output })
    }

    #[test]
    fn test_io_print_writes_a_line() {
        let output = OutputSink::buffer();
        let ctx = HostContext { output: &output };
        IoModule
            .call("print", vec![Value::Str("hello".into())], &ctx)
            .unwrap();
        assert_eq!(output.contents(), "hello\n");
    }

    #[test]
    fn test_fs_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = Value::Str(dir.path().join("note.txt").display().to_string());

        call(&FsModule, "write", vec![path.clone(), Value::Str("data".into())]).unwrap();
        assert_eq!(call(&FsModule, "exists", vec![path.clone()]).unwrap(), Value::Bool(true));
        assert_eq!(
            call(&FsModule, "read", vec![path.clone()]).unwrap(),
            Value::Str("data".into())
        );
        call(&FsModule, "delete", vec![path.clone()]).unwrap();
        assert_eq!(call(&FsModule, "exists", vec![path.clone()]).unwrap(), Value::Bool(false));
        assert!(matches!(
            call(&FsModule, "read", vec![path]),
            Err(HostError::Failed(_))
        ));
    }

    #[test]
    fn test_number_conversions() {
        assert_eq!(
            call(&FloatModule, "from_str", vec![Value::Str("2.5".into())]).unwrap(),
            Value::some(Value::Float(2.5))
        );
        assert_eq!(
            call(&IntModule, "from_str", vec![Value::Str("x".into())]).unwrap(),
            Value::none()
        );
        assert_eq!(
            call(&FloatModule, "to_int", vec![Value::Float(-2.7)]).unwrap(),
            Value::Int(-2)
        );
        assert_eq!(
            call(&FloatModule, "floor", vec![Value::Float(-2.5)]).unwrap(),
            Value::Float(-3.0)
        );
    }

    #[test]
    fn test_unknown_function_and_bad_arguments() {
        assert_eq!(
            call(&IntModule, "sqrt", vec![Value::Int(4)]).unwrap_err(),
            HostError::UnknownFunction("sqrt".into())
        );
        assert!(matches!(
            call(&FloatModule, "floor", vec![Value::Int(4)]),
            Err(HostError::ArgumentType { expected: "Float", .. })
        ));
    }
}
