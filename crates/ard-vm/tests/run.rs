//! End-to-end runs: source through checker, emitter and verifier into the VM.

use std::time::{Duration, Instant};

use ard_bytecode::VerifiedProgram;
use ard_vm::{Host, HostContext, HostError, OutputSink, RuntimeError, Value, Vm};

fn compile(source: &str) -> VerifiedProgram {
    let ast = ard_parser::parse_program(source, 0).unwrap();
    let output = ard_check::check(&ast, &mut ard_check::NoModules);
    assert!(!output.has_errors(), "{:?}", output.diagnostics);
    ard_bytecode::verify(ard_bytecode::emit(&output.program).unwrap()).unwrap()
}

fn run_with(source: &str, host: Host) -> Result<Value, RuntimeError> {
    Vm::new(compile(source), host).run()
}

#[test]
fn test_generic_map_with_explicit_type_arguments() {
    let source = r#"
use ard/float

fn map(list: [$A], f: fn($A) $B) [$B] {
  mut out = []
  for item in list {
    out.push(f(item))
  }
  out
}

map<Int, Float>([1, 2, 3], fn(x: Int) Float { float::from_int(x * 2) })
"#;
    let result = run_with(source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(
        result,
        Value::List(vec![Value::Float(2.0), Value::Float(4.0), Value::Float(6.0)])
    );
    assert_eq!(result.to_string(), "[2.0, 4.0, 6.0]");
}

#[test]
fn test_fiber_wait_blocks_until_the_body_finishes() {
    let source = r#"
use ard/async
let fiber = async::start(fn() Int {
  async::sleep(10)
  42
})
fiber.wait()
"#;
    let started = Instant::now();
    let result = run_with(source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result, Value::Int(42));
    assert!(started.elapsed() >= Duration::from_millis(10));
}

#[test]
fn test_fibers_run_alongside_the_caller() {
    let source = r#"
use ard/async
let a = async::start(fn() Int {
  async::sleep(30)
  1
})
let b = async::start(fn() Int {
  async::sleep(30)
  2
})
a.wait() + b.wait()
"#;
    let started = Instant::now();
    let result = run_with(source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result, Value::Int(3));
    // Both bodies sleep concurrently.
    assert!(started.elapsed() < Duration::from_millis(55));
}

#[test]
fn test_division_by_zero_is_fatal() {
    let source = "fn div(a: Int, b: Int) Int { a / b }\ndiv(1, 0)";
    let err = run_with(source, Host::with_defaults(OutputSink::buffer())).unwrap_err();
    assert_eq!(err, RuntimeError::DivisionByZero);
}

#[test]
fn test_io_print_goes_to_the_sink() {
    let output = OutputSink::buffer();
    let source = r#"
use ard/io
for i in 1..4 {
  io::print("line " + i.to_str())
}
"#;
    run_with(source, Host::with_defaults(output.clone())).unwrap();
    assert_eq!(output.contents(), "line 1\nline 2\nline 3\n");
}

#[test]
fn test_fs_errors_become_values() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.txt");
    let source = format!(
        r#"
use ard/fs
match fs::read("{}") {{
  ok(text) => "read " + text
  err(e) => "error"
}}
"#,
        missing.display()
    );
    let result = run_with(&source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result, Value::Str("error".into()));

    let present = dir.path().join("present.txt");
    std::fs::write(&present, "hello").unwrap();
    let source = source.replace("missing.txt", "present.txt");
    let result = run_with(&source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result, Value::Str("read hello".into()));
}

#[test]
fn test_unregistered_foreign_function_is_fatal() {
    let source = "extern fn now() Int = \"time_now\"\nnow()";
    let err = run_with(source, Host::new(OutputSink::buffer())).unwrap_err();
    assert_eq!(err, RuntimeError::UnknownForeign { name: "time_now".into() });
}

#[test]
fn test_embedder_foreign_function() {
    let host = Host::with_defaults(OutputSink::buffer());
    host.register_foreign("triple", |_ctx: &HostContext<'_>, args: Vec<Value>| match args.as_slice() {
        [Value::Int(n)] => Ok(Value::Int(n * 3)),
        _ => Err(HostError::Failed("triple takes one Int".into())),
    });
    let source = "extern fn triple(n: Int) Int = \"triple\"\ntriple(14)";
    assert_eq!(run_with(source, host).unwrap(), Value::Int(42));
}

#[test]
fn test_missing_module_handler_is_fatal() {
    let source = "use ard/io\nio::print(\"hi\")";
    let err = run_with(source, Host::new(OutputSink::buffer())).unwrap_err();
    assert_eq!(err, RuntimeError::UnknownModule { module: "io".into() });
}

#[test]
fn test_union_match_dispatches_on_runtime_type() {
    let source = r#"
struct Circle { radius: Int }
struct Square { side: Int }
type Shape = Circle | Square

fn measure(shape: Shape) Int {
  match shape {
    Circle => it.radius
    Square => it.side * 10
  }
}

measure(Circle { radius: 2 }) + measure(Square { side: 3 })
"#;
    let result = run_with(source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result, Value::Int(32));
}

#[test]
fn test_generic_identity_into_union_binding() {
    let source = r#"
struct Circle { radius: Int }
struct Square { side: Int }
type Shape = Circle | Square

fn id(x: $T) $T { x }

let s: Shape = id(Circle { radius: 7 })
match s {
  Circle => it.radius
  Square => it.side
}
"#;
    let result = run_with(source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result, Value::Int(7));
}

#[test]
fn test_wait_on_a_failed_fiber_is_fatal() {
    let source = r#"
use ard/async
let f = async::start(fn() Int {
  let zero = 0
  1 / zero
})
f.wait()
"#;
    match run_with(source, Host::with_defaults(OutputSink::buffer())).unwrap_err() {
        RuntimeError::FiberFailed { message } => {
            assert!(message.contains("Division by zero"), "{message}")
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_unwaited_fiber_failure_stays_in_its_fiber() {
    let source = r#"
use ard/async
let f = async::start(fn() Int {
  let zero = 0
  1 / zero
})
async::sleep(10)
5
"#;
    let result = run_with(source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result, Value::Int(5));
}

#[test]
fn test_map_set_overwrites_in_place() {
    let source = r#"
mut m = ["a": 1, "b": 2]
m.set("c", 3)
m.set("a", 10)
m
"#;
    let result = run_with(source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result.to_string(), "[a: 10, b: 2, c: 3]");
}

#[test]
fn test_map_lookups_by_key() {
    let source = r#"
mut m: [Int:Str] = [:]
mut i = 0
while i < 500 {
  m.set(i, i.to_str())
  i = i + 1
}
if m.has(499) and not m.has(500) {
  m.get(250).or("missing")
} else {
  "wrong"
}
"#;
    let result = run_with(source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result, Value::Str("250".into()));
}

#[test]
fn test_list_literal_larger_than_the_frame_budget() {
    let items: Vec<String> = (0..1100).map(|i| i.to_string()).collect();
    let source = format!("let xs = [{}]\nxs.size() * 10000 + xs.at(1099)", items.join(", "));
    let result = run_with(&source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result, Value::Int(1100 * 10000 + 1099));
}

#[test]
fn test_map_literal_larger_than_the_frame_budget() {
    let entries: Vec<String> = (0..700).map(|i| format!("{i}: {}", i * 2)).collect();
    let source = format!(
        "let m = [{}]\nm.size() * 10000 + m.get(699).or(0)",
        entries.join(", ")
    );
    let result = run_with(&source, Host::with_defaults(OutputSink::buffer())).unwrap();
    assert_eq!(result, Value::Int(700 * 10000 + 1398));
}
