//! Source-to-execution pipeline shared by the subcommands.
//!
//! ```text
//! read -> parse -> check -> emit -> verify -> run
//!                                        \-> encode -> embed
//! ```
//!
//! Every stage failure becomes a [`PipelineError`]. Checker diagnostics are
//! rendered against the [`SourceMap`] before they leave this module so the
//! caller only has to print them.

use std::path::{Path, PathBuf};

use ard_ast::SourceMap;
use ard_bytecode::{DecodeError, EmitError, EncodeError, VerifiedProgram, VerifyError};
use ard_check::{CheckedProgram, Diagnostic, FsModuleResolver};
use ard_vm::{Host, RuntimeError, Value, Vm};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Syntax or type errors, one rendered line per problem.
    #[error("{}", rendered.join("\n"))]
    Diagnostics { rendered: Vec<String> },

    #[error("Emission failed: {0}")]
    Emit(#[from] EmitError),

    #[error("Verification failed: {0}")]
    Verify(#[from] VerifyError),

    #[error("Encoding failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("Decoding failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("Refusing to overwrite the source file {}", path.display())]
    OutputIsSource { path: PathBuf },
}

/// Result of checking one source file.
pub struct Checked {
    pub sources: SourceMap,
    pub program: CheckedProgram,
    pub diagnostics: Vec<Diagnostic>,
}

impl Checked {
    pub fn has_errors(&self) -> bool {
        ard_check::diagnostics::has_errors(&self.diagnostics)
    }

    /// Diagnostics as `path:line:col: kind: message` lines.
    pub fn rendered(&self) -> Vec<String> {
        self.diagnostics
            .iter()
            .map(|diagnostic| diagnostic.render(&self.sources))
            .collect()
    }
}

fn read_source(path: &Path) -> Result<String, PipelineError> {
    std::fs::read_to_string(path).map_err(|source| PipelineError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse and check `path`. Modules it imports resolve relative to its
/// directory. Diagnostics are returned, not raised, so `check` can print
/// warnings of a program that passes.
pub fn check_file(path: &Path) -> Result<Checked, PipelineError> {
    let source = read_source(path)?;
    let mut sources = SourceMap::new();
    let file_id = sources.add_file(path.to_path_buf(), source.clone());

    let ast = match ard_parser::parse_program(&source, file_id) {
        Ok(ast) => ast,
        Err(errors) => {
            let rendered = errors
                .iter()
                .map(|err| format!("{}: error: {err}", sources.location(&err.span)))
                .collect();
            return Err(PipelineError::Diagnostics { rendered });
        }
    };
    debug!(path = %path.display(), statements = ast.statements.len(), "Parsed");

    let root = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let output = {
        let mut resolver = FsModuleResolver::new(root, &mut sources);
        ard_check::check(&ast, &mut resolver)
    };
    debug!(
        path = %path.display(),
        diagnostics = output.diagnostics.len(),
        "Checked"
    );
    Ok(Checked {
        sources,
        program: output.program,
        diagnostics: output.diagnostics,
    })
}

/// Check, emit and verify `path`.
pub fn compile_file(path: &Path) -> Result<VerifiedProgram, PipelineError> {
    let checked = check_file(path)?;
    if checked.has_errors() {
        return Err(PipelineError::Diagnostics {
            rendered: checked.rendered(),
        });
    }
    for warning in checked.rendered() {
        warn!("{warning}");
    }
    let program = ard_bytecode::emit(&checked.program)?;
    let verified = ard_bytecode::verify(program)?;
    info!(
        path = %path.display(),
        functions = verified.functions.len(),
        instructions = verified.code.len(),
        "Compiled"
    );
    Ok(verified)
}

pub fn run_program(program: VerifiedProgram, host: Host) -> Result<Value, PipelineError> {
    Ok(Vm::new(program, host).run()?)
}

pub fn run_file(path: &Path, host: Host) -> Result<Value, PipelineError> {
    run_program(compile_file(path)?, host)
}

/// Decode, verify and run a serialized program.
pub fn run_payload(bytes: &[u8], host: Host) -> Result<Value, PipelineError> {
    let program = ard_bytecode::decode(bytes)?;
    let verified = ard_bytecode::verify(program)?;
    run_program(verified, host)
}

/// Output path of `build` when none is given: the input without extension,
/// or with an `.out` extension when the input has none.
pub fn default_output(path: &Path) -> PathBuf {
    match path.extension() {
        Some(_) => path.with_extension(""),
        None => path.with_extension("out"),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Compile `path` and write `host_executable` plus the embedded program to
/// `out`. Returns the written path.
pub fn build_file(
    path: &Path,
    out: Option<PathBuf>,
    host_executable: &Path,
) -> Result<PathBuf, PipelineError> {
    let out = out.unwrap_or_else(|| default_output(path));
    if same_file(path, &out) {
        return Err(PipelineError::OutputIsSource { path: out });
    }
    let verified = compile_file(path)?;
    let payload = ard_bytecode::encode(&verified)?;
    let host = std::fs::read(host_executable).map_err(|source| PipelineError::Read {
        path: host_executable.to_path_buf(),
        source,
    })?;
    // A host that already carries a program contributes only its own bytes.
    let host = match ard_bytecode::embed::extract_payload(&host) {
        Some(existing) => {
            let end = host.len() - existing.len() - ard_bytecode::embed::FOOTER_LEN;
            host[..end].to_vec()
        }
        None => host,
    };

    ard_bytecode::embed::write_executable(&out, &host, &payload).map_err(|source| {
        PipelineError::Write {
            path: out.clone(),
            source,
        }
    })?;
    info!(out = %out.display(), payload = payload.len(), "Built executable");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ard_vm::OutputSink;

    fn write(dir: &Path, name: &str, source: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, source).unwrap();
        path
    }

    #[test]
    fn test_run_file_with_module_import() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "util.ard", "fn double(x: Int) Int { x * 2 }");
        let main = write(dir.path(), "main.ard", "use app/util\nutil::double(21)");
        let value = run_file(&main, Host::with_defaults(OutputSink::buffer())).unwrap();
        assert_eq!(value, Value::Int(42));
    }

    #[test]
    fn test_check_reports_rendered_locations() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "bad.ard", "let x: Int = \"hi\"");
        let checked = check_file(&path).unwrap();
        assert!(checked.has_errors());
        let rendered = checked.rendered();
        assert_eq!(rendered.len(), 1);
        assert!(rendered[0].contains("bad.ard:1:"), "{}", rendered[0]);
        assert!(rendered[0].contains(": error: "), "{}", rendered[0]);
    }

    #[test]
    fn test_parse_errors_are_diagnostics() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "broken.ard", "let = 1");
        assert!(matches!(
            compile_file(&path),
            Err(PipelineError::Diagnostics { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            check_file(Path::new("/definitely/not/here.ard")),
            Err(PipelineError::Read { .. })
        ));
    }

    #[test]
    fn test_payload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "main.ard", "let x = 6\nx * 7");
        let payload = ard_bytecode::encode(&compile_file(&path).unwrap()).unwrap();
        let value = run_payload(&payload, Host::with_defaults(OutputSink::buffer())).unwrap();
        assert_eq!(value, Value::Int(42));
        assert!(matches!(
            run_payload(b"garbage", Host::default()),
            Err(PipelineError::Decode(_))
        ));
    }

    #[test]
    fn test_build_replaces_an_existing_payload() {
        let dir = tempfile::tempdir().unwrap();
        let host = dir.path().join("host");
        ard_bytecode::embed::write_executable(&host, b"host-bytes", b"old program").unwrap();
        let path = write(dir.path(), "app.ard", "1");

        let out = build_file(&path, None, &host).unwrap();
        assert_eq!(out, dir.path().join("app"));
        let built = std::fs::read(&out).unwrap();
        assert!(built.starts_with(b"host-bytes"));
        let payload = ard_bytecode::embed::extract_payload(&built).unwrap();
        assert_eq!(
            run_payload(payload, Host::with_defaults(OutputSink::buffer())).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_default_output_never_names_the_source() {
        assert_eq!(default_output(Path::new("dir/app.ard")), PathBuf::from("dir/app"));
        assert_eq!(default_output(Path::new("dir/app")), PathBuf::from("dir/app.out"));
    }

    #[test]
    fn test_build_keeps_an_extensionless_source() {
        let dir = tempfile::tempdir().unwrap();
        let host = dir.path().join("host");
        std::fs::write(&host, b"host-bytes").unwrap();
        let path = write(dir.path(), "app", "2");

        let out = build_file(&path, None, &host).unwrap();
        assert_eq!(out, dir.path().join("app.out"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "2");
    }

    #[test]
    fn test_build_refuses_to_overwrite_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let host = dir.path().join("host");
        std::fs::write(&host, b"host-bytes").unwrap();
        let path = write(dir.path(), "app.ard", "3");

        let err = build_file(&path, Some(dir.path().join("./app.ard")), &host).unwrap_err();
        assert!(matches!(err, PipelineError::OutputIsSource { .. }), "{err}");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3");
    }
}
