use super::*;
use crate::host::OutputSink;

fn compile(source: &str) -> VerifiedProgram {
    let ast = ard_parser::parse_program(source, 0).unwrap();
    let output = ard_check::check(&ast, &mut ard_check::NoModules);
    assert!(!output.has_errors(), "{:?}", output.diagnostics);
    ard_bytecode::verify(ard_bytecode::emit(&output.program).unwrap()).unwrap()
}

fn run(source: &str) -> Result<Value, RuntimeError> {
    Vm::new(compile(source), Host::with_defaults(OutputSink::buffer())).run()
}

#[test]
fn test_arithmetic_and_locals() {
    assert_eq!(run("let x = 40 + 2\nx").unwrap(), Value::Int(42));
    assert_eq!(run("7 % 3 * -2").unwrap(), Value::Int(-2));
    assert_eq!(run("1.5 + 2.0").unwrap(), Value::Float(3.5));
    assert_eq!(run("\"ab\" + \"cd\"").unwrap(), Value::Str("abcd".into()));
}

#[test]
fn test_loops_and_break() {
    let source = "mut total = 0\nfor i in 0..5 { total = total + i }\nfor n in [10, 20] { total = total + n }\ntotal";
    assert_eq!(run(source).unwrap(), Value::Int(40));

    let source = "mut i = 0\nwhile true {\n  if i == 3 { break }\n  i = i + 1\n}\ni";
    assert_eq!(run(source).unwrap(), Value::Int(3));
}

#[test]
fn test_short_circuit_skips_the_right_side() {
    // The right-hand side would divide by zero if evaluated.
    assert_eq!(run("false and 1 / 0 == 1").unwrap(), Value::Bool(false));
    assert_eq!(run("true or 1 / 0 == 1").unwrap(), Value::Bool(true));
}

#[test]
fn test_recursion() {
    let source = "fn fib(n: Int) Int { if n < 2 { n } else { fib(n - 1) + fib(n - 2) } }\nfib(15)";
    assert_eq!(run(source).unwrap(), Value::Int(610));
}

#[test]
fn test_lists_have_value_semantics() {
    let source = "mut a = [1, 2]\nmut b = a\nb.push(3)\na.size() * 10 + b.size()";
    assert_eq!(run(source).unwrap(), Value::Int(23));
}

#[test]
fn test_structs_and_methods() {
    let source = r#"
struct Point { x: Int, y: Int }
impl Point {
  fn sum() Int { self.x + self.y }
}
mut p = Point { x: 1, y: 2 }
p.x = 5
p.sum()
"#;
    assert_eq!(run(source).unwrap(), Value::Int(7));
}

#[test]
fn test_maps() {
    let source = "mut m = [\"a\": 1]\nm.set(\"b\", 2)\nm.set(\"a\", 3)\nm.get(\"a\").or(0) * 10 + m.get(\"z\").or(0)";
    assert_eq!(run(source).unwrap(), Value::Int(30));
    assert_eq!(run("let m = [\"a\": 1]\nm.has(\"a\")").unwrap(), Value::Bool(true));
}

#[test]
fn test_match_on_maybe_result_and_literals() {
    let source = r#"
use ard/int
let n = match int::from_str("12") {
  v => v
  _ => 0
}
let word = match n {
  12 => "twelve"
  _ => "other"
}
word
"#;
    assert_eq!(run(source).unwrap(), Value::Str("twelve".into()));

    let source = r#"
use ard/fs
match fs::read("/definitely/not/here.txt") {
  ok(text) => text
  err(e) => "failed"
}
"#;
    assert_eq!(run(source).unwrap(), Value::Str("failed".into()));
}

#[test]
fn test_closures_see_captured_values() {
    let source = "let k = 3\nlet add = fn(x: Int) Int { x + k }\nadd(2)";
    assert_eq!(run(source).unwrap(), Value::Int(5));
}

#[test]
fn test_to_str_formats_floats() {
    assert_eq!(run("let f = 2.0\nf.to_str()").unwrap(), Value::Str("2.0".into()));
    assert_eq!(run("let x = 12\nx.to_str().size()").unwrap(), Value::Int(2));
}

#[test]
fn test_faults_abort_the_run() {
    assert_eq!(run("let z = 0\n10 / z").unwrap_err(), RuntimeError::DivisionByZero);
    assert_eq!(run("let z = 0\n10 % z").unwrap_err(), RuntimeError::DivisionByZero);
    assert_eq!(
        run("let l = [1, 2]\nl.at(5)").unwrap_err(),
        RuntimeError::IndexOutOfRange { index: 5, size: 2 }
    );
}

#[test]
fn test_call_depth_is_bounded() {
    let program = compile("fn down(n: Int) Int { down(n + 1) }\ndown(0)");
    let vm = Vm::new(program, Host::with_defaults(OutputSink::buffer())).with_config(VmConfig {
        max_call_depth: 64,
        ..VmConfig::default()
    });
    assert_eq!(vm.run().unwrap_err(), RuntimeError::CallDepthExceeded { limit: 64 });
}

#[test]
fn test_stack_budget_is_enforced() {
    let program = compile("[1, 2, 3, 4, 5].size()");
    let vm = Vm::new(program, Host::with_defaults(OutputSink::buffer())).with_config(VmConfig {
        max_stack_depth: 3,
        ..VmConfig::default()
    });
    assert_eq!(vm.run().unwrap_err(), RuntimeError::StackOverflow { limit: 3 });
}

#[test]
fn test_run_function_by_name() {
    let program = compile("fn add(a: Int, b: Int) Int { a + b }\nadd(1, 1)");
    let vm = Vm::new(program, Host::with_defaults(OutputSink::buffer()));
    assert_eq!(
        vm.run_function("add", vec![Value::Int(20), Value::Int(22)]).unwrap(),
        Value::Int(42)
    );
    assert!(matches!(
        vm.run_function("add", vec![]),
        Err(RuntimeError::ArgumentCount { expected: 2, found: 0, .. })
    ));
    assert!(matches!(
        vm.run_function("nope", vec![]),
        Err(RuntimeError::UnknownFunction { .. })
    ));
}

#[test]
fn test_void_entry_yields_void() {
    assert_eq!(run("let x = 1").unwrap(), Value::Void);
}

#[test]
fn test_fiber_failure_surfaces_on_wait() {
    let source = "use ard/async\nlet f = async::start(fn() Int { let z = 0\n 1 / z })\nf.wait()";
    match run(source).unwrap_err() {
        RuntimeError::FiberFailed { message } => assert!(message.contains("Division by zero")),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_panic_message_extraction() {
    let payload: Box<dyn Any + Send> = Box::new("boom");
    assert_eq!(panic_message(payload.as_ref()), "boom");
    let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
    assert_eq!(panic_message(payload.as_ref()), "bang");
    let payload: Box<dyn Any + Send> = Box::new(7);
    assert_eq!(panic_message(payload.as_ref()), "fiber panicked");
}
