//! Loader for programs embedded in the running executable.

use std::path::PathBuf;

use ard_bytecode::embed;
use ard_vm::{Host, Value};
use tracing::{debug, info};

use crate::pipeline::{PipelineError, run_payload};

/// Path of the running executable, if the platform can tell.
pub fn current_executable() -> Option<PathBuf> {
    match std::env::current_exe() {
        Ok(path) => Some(path),
        Err(err) => {
            debug!(error = %err, "Cannot locate own executable");
            None
        }
    }
}

/// The payload embedded in this executable, if any.
pub fn embedded_payload() -> Option<Vec<u8>> {
    embed::read_embedded(&current_executable()?)
}

/// Verify and run the payload embedded in this executable. `Ok(None)` when
/// there is none.
pub fn run_embedded(host: Host) -> Result<Option<Value>, PipelineError> {
    let Some(payload) = embedded_payload() else {
        return Ok(None);
    };
    info!(bytes = payload.len(), "Running embedded program");
    run_payload(&payload, host).map(Some)
}
