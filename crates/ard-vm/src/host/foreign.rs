//! Default foreign functions.

use std::time::{SystemTime, UNIX_EPOCH};

use super::{HostContext, HostError, expect_args, str_arg};
use crate::value::Value;

/// `time_now`: milliseconds since the Unix epoch.
pub fn time_now(_ctx: &HostContext<'_>, args: Vec<Value>) -> Result<Value, HostError> {
    let [] = expect_args::<0>(args)?;
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| HostError::Failed(e.to_string()))?;
    Ok(Value::Int(i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)))
}

/// `env_get`: the environment variable, if set to valid UTF-8.
pub fn env_get(_ctx: &HostContext<'_>, args: Vec<Value>) -> Result<Value, HostError> {
    let [key] = expect_args::<1>(args)?;
    Ok(match std::env::var(str_arg(key)?) {
        Ok(value) => Value::some(Value::Str(value)),
        Err(_) => Value::none(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::OutputSink;

    #[test]
    fn test_time_now_is_after_2020() {
        let output = OutputSink::buffer();
        let ctx = HostContext { output: &output };
        let Value::Int(millis) = time_now(&ctx, vec![]).unwrap() else {
            panic!("time_now returned a non-Int");
        };
        assert!(millis > 1_577_836_800_000);
    }

    #[test]
    fn test_env_get_missing_is_none() {
        let output = OutputSink::buffer();
        let ctx = HostContext { output: &output };
        let missing = env_get(&ctx, vec![Value::Str("ARD_SURELY_UNSET_VARIABLE".into())]).unwrap();
        assert_eq!(missing, Value::none());
    }
}
