use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn ard(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ard"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to spawn ard")
}

fn write(dir: &Path, name: &str, source: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, source).unwrap();
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn version_prints_package_version() {
    let output = ard(&["version"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        format!("ard {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn check_accepts_a_valid_program() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "ok.ard", "fn add(a: Int, b: Int) Int { a + b }\nadd(1, 2)\n");
    let output = ard(&["check", path.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
}

#[test]
fn check_reports_type_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "bad.ard", "let x: Int = \"hi\"\n");
    let output = ard(&["check", path.to_str().unwrap()]);
    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("bad.ard:1:"), "{err}");
    assert!(err.contains("error"), "{err}");
}

#[test]
fn run_writes_program_output() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "hello.ard",
        "use ard/io\nmut i = 0\nwhile i < 3 {\n  io::print(\"line \" + i.to_str())\n  i = i + 1\n}\n",
    );
    let output = ard(&["run", path.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output), "line 0\nline 1\nline 2\n");
}

#[test]
fn run_reports_runtime_faults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "fault.ard",
        "fn div(a: Int, b: Int) Int { a / b }\ndiv(1, 0)\n",
    );
    let output = ard(&["run", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Division by zero"), "{}", stderr(&output));
}

#[test]
fn run_missing_file_fails() {
    let output = ard(&["run", "/definitely/not/here.ard"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("here.ard"));
}

#[test]
fn built_executable_runs_its_program() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "greet.ard", "use ard/io\nio::print(\"hello from ard\")\n");
    let out = dir.path().join("greet-bin");

    let output = ard(&["build", path.to_str().unwrap(), "--out", out.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(stdout(&output).trim(), out.display().to_string());

    // Arguments are ignored: the embedded program runs instead.
    let run = Command::new(&out).arg("version").output().unwrap();
    assert!(run.status.success(), "{}", stderr(&run));
    assert_eq!(stdout(&run), "hello from ard\n");
}

#[test]
fn build_defaults_to_path_without_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "tool.ard", "1 + 1\n");
    let output = ard(&["build", path.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(dir.path().join("tool").exists());
}

#[test]
fn build_never_overwrites_an_extensionless_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "script", "1 + 1\n");
    let output = ard(&["build", path.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "1 + 1\n");
    assert!(dir.path().join("script.out").exists());
}

#[test]
fn build_refuses_programs_with_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "bad.ard", "let x: Int = true\n");
    let output = ard(&["build", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(!dir.path().join("bad").exists());
}

#[test]
fn format_check_and_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "messy.ard", "fn a() Int {\n1   \n}\n\n\n");

    let output = ard(&["format", "--check", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("Would reformat"));

    let output = ard(&["format", path.to_str().unwrap()]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "fn a() Int {\n  1\n}\n"
    );

    let output = ard(&["format", "--check", path.to_str().unwrap()]);
    assert!(output.status.success());
}

#[test]
fn run_embedded_without_payload_fails() {
    let output = ard(&["run-embedded"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("No embedded program"));
}

#[test]
fn unknown_command_fails() {
    let output = ard(&["frobnicate"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Unknown command"));
}
