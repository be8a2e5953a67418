use super::*;
use crate::checked::{TExprKind, TStmt};
use crate::diagnostics::DiagnosticKind;
use crate::resolver::{FsModuleResolver, NoModules};
use ard_ast::SourceMap;

fn check_source(source: &str) -> CheckOutput {
    let program = ard_parser::parse_program(source, 0).unwrap();
    check(&program, &mut NoModules)
}

fn messages(output: &CheckOutput, kind: DiagnosticKind) -> Vec<String> {
    output
        .diagnostics
        .iter()
        .filter(|d| d.kind == kind)
        .map(|d| d.message.clone())
        .collect()
}

fn errors(output: &CheckOutput) -> Vec<String> {
    messages(output, DiagnosticKind::Error)
}

fn warnings(output: &CheckOutput) -> Vec<String> {
    messages(output, DiagnosticKind::Warn)
}

/// Type of the value the entry function returns.
fn entry_type(output: &CheckOutput) -> Type {
    let entry = output.program.function(&output.program.entry).unwrap();
    entry.body.ty.clone()
}

#[test]
fn test_annotation_mismatch_is_one_error() {
    let output = check_source(r#"let x: Int = "hi""#);
    assert_eq!(errors(&output).len(), 1, "{:?}", output.diagnostics);
    assert!(warnings(&output).is_empty());
    assert!(errors(&output)[0].contains("expected `Int`, found `Str`"));
}

#[test]
fn test_duplicate_import_warns_and_still_checks() {
    let output = check_source("use ard/io\nuse ard/io\nio::print(\"hi\")");
    assert_eq!(warnings(&output).len(), 1);
    assert!(errors(&output).is_empty(), "{:?}", output.diagnostics);
    assert!(!output.has_errors());
}

#[test]
fn test_unknown_std_package() {
    let output = check_source("use ard/nope");
    let errors = errors(&output);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Unknown package"));
}

#[test]
fn test_unknown_function_of_known_package() {
    let output = check_source("use ard/io\nio::shout(\"hi\")");
    assert!(errors(&output)[0].contains("has no function `shout`"));
}

const MAP: &str = r#"
fn map(list: [$A], f: fn($A) $B) [$B] {
  mut out = []
  for item in list {
    out.push(f(item))
  }
  out
}
"#;

#[test]
fn test_generic_arguments_are_inferred() {
    let source = format!("{MAP}\nmap([1, 2, 3], fn(x: Int) Str {{ x.to_str() }})");
    let output = check_source(&source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(entry_type(&output), Type::list(Type::Str));
}

#[test]
fn test_explicit_type_arguments() {
    let source = format!(
        "use ard/float\n{MAP}\nmap<Int, Float>([1, 2, 3], fn(x: Int) Float {{ float::from_int(x * 2) }})"
    );
    let output = check_source(&source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(entry_type(&output), Type::list(Type::Float));
}

#[test]
fn test_type_argument_count_mismatch() {
    let source = format!("{MAP}\nmap<Int>([1], fn(x: Int) Int {{ x }})");
    let output = check_source(&source);
    assert!(
        errors(&output)
            .iter()
            .any(|e| e.contains("expects 2 type argument(s), found 1"))
    );
}

#[test]
fn test_conflicting_generic_binding_names_both_types() {
    let output = check_source("fn pair(a: $T, b: $T) $T { a }\npair(1, \"x\")");
    let errors = errors(&output);
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert!(errors[0].contains("Int"));
    assert!(errors[0].contains("Str"));
}

#[test]
fn test_uninferable_return_needs_type_arguments() {
    let output = check_source("use ard/maybe\nlet x = maybe::none()");
    assert!(errors(&output)[0].contains("cannot infer `$T`"));

    let output = check_source("use ard/maybe\nlet x: Int? = maybe::none()\nx");
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(entry_type(&output), Type::maybe(Type::Int));
}

#[test]
fn test_result_constructors_take_the_expected_type() {
    let source = r#"
use ard/result
fn parse(ok: Bool) Int!Str {
  if ok { result::ok(1) } else { result::err("bad") }
}
"#;
    let output = check_source(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
}

#[test]
fn test_assignment_to_immutable() {
    let output = check_source("let x = 1\nx = 2");
    assert!(errors(&output)[0].contains("immutable"));

    let output = check_source("mut x = 1\nx = 2");
    assert!(output.diagnostics.is_empty());
}

#[test]
fn test_push_needs_mutable_list() {
    let output = check_source("let xs = [1]\nxs.push(2)");
    assert!(errors(&output)[0].contains("immutable"));

    let output = check_source("mut xs = [1]\nxs.push(2)\nxs.size()");
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(entry_type(&output), Type::Int);
}

#[test]
fn test_empty_list_is_typed_by_first_push() {
    let output = check_source("mut xs = []\nxs.push(\"a\")\nxs");
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(entry_type(&output), Type::list(Type::Str));
}

#[test]
fn test_closures_copy_immutables_and_cannot_see_mutables() {
    let output = check_source("mut count = 0\nlet f = fn() Int { count }");
    assert!(errors(&output)[0].contains("undefined name `count`"));

    let output = check_source("let n = 1\nlet f = fn() Int { n + 1 }\nf()");
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let closure = output
        .program
        .functions
        .iter()
        .find(|f| f.name.contains("$closure"))
        .unwrap();
    assert_eq!(closure.captures.len(), 1);
}

#[test]
fn test_nested_closures_thread_captures() {
    let output = check_source("let n = 2\nlet f = fn() Int {\n  let g = fn() Int { n }\n  g()\n}\nf()");
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let captures: Vec<usize> = output
        .program
        .functions
        .iter()
        .filter(|f| f.name.contains("$closure"))
        .map(|f| f.captures.len())
        .collect();
    assert_eq!(captures, vec![1, 1]);
}

#[test]
fn test_function_bodies_cannot_see_top_level_variables() {
    let output = check_source("let limit = 3\nfn f() Int { limit }");
    assert!(errors(&output)[0].contains("undefined name `limit`"));
}

#[test]
fn test_match_on_bool_must_be_exhaustive() {
    let output = check_source("let flag = true\nmatch flag {\n  true => 1\n}");
    assert!(errors(&output)[0].contains("not exhaustive"));

    let output = check_source("let flag = true\nmatch flag {\n  true => 1\n  false => 0\n}");
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(entry_type(&output), Type::Int);
}

#[test]
fn test_match_arm_after_wildcard_is_unreachable() {
    let output = check_source("let n = 3\nmatch n {\n  _ => 0\n  1 => 1\n}");
    assert_eq!(warnings(&output).len(), 1);
    assert!(errors(&output).is_empty());
}

#[test]
fn test_union_match_binds_it() {
    let source = r#"
struct Circle { radius: Int }
struct Square { side: Int }
type Shape = Circle | Square

fn area(shape: Shape) Int {
  match shape {
    Circle => it.radius * it.radius
    Square => it.side * it.side
  }
}

area(Circle { radius: 2 })
"#;
    let output = check_source(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(entry_type(&output), Type::Int);
}

#[test]
fn test_generic_call_accepts_union_member_for_union_expectation() {
    let source = r#"
struct Circle { radius: Int }
struct Square { side: Int }
type Shape = Circle | Square

fn id(x: $T) $T { x }

let s: Shape = id(Circle { radius: 1 })
match s {
  Circle => it.radius
  Square => it.side
}
"#;
    let output = check_source(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(entry_type(&output), Type::Int);
}

#[test]
fn test_generic_call_still_rejects_non_member_for_union_expectation() {
    let source = r#"
struct Circle { radius: Int }
struct Square { side: Int }
type Shape = Circle | Square

fn id(x: $T) $T { x }

let s: Shape = id(5)
"#;
    let output = check_source(source);
    assert!(!errors(&output).is_empty(), "{:?}", output.diagnostics);
}

#[test]
fn test_maybe_and_result_matches() {
    let source = r#"
use ard/int
let parsed = int::from_str("12")
let n = match parsed {
  v => v
  _ => 0
}
use_result(n)

fn use_result(n: Int) Int { n }
"#;
    let output = check_source(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);

    let source = r#"
use ard/fs
match fs::read("x.txt") {
  ok(text) => text.size()
  err(e) => 0
}
"#;
    let output = check_source(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
}

#[test]
fn test_break_outside_loop_and_unreachable_code() {
    let output = check_source("break");
    assert!(errors(&output)[0].contains("outside of a loop"));

    let output = check_source("while true {\n  break\n  let x = 1\n}");
    assert!(errors(&output).is_empty());
    assert_eq!(warnings(&output), vec!["unreachable statement".to_string()]);
}

#[test]
fn test_ambiguous_entry() {
    let output = check_source("fn main() { }\nlet x = 1");
    assert!(errors(&output)[0].contains("ambiguous entry point"));
}

#[test]
fn test_user_main_is_the_entry() {
    let output = check_source("fn main() Int { 42 }");
    assert!(output.diagnostics.is_empty());
    assert_eq!(output.program.entry, "main");
    let main = output.program.function("main").unwrap();
    assert!(main.returns_value);
    assert_eq!(output.program.functions.len(), 1);
}

#[test]
fn test_bad_literal_does_not_cascade() {
    let output = check_source("let x = 99999999999999999999\nlet y = x + 1");
    assert_eq!(errors(&output).len(), 1, "{:?}", output.diagnostics);
    assert!(errors(&output)[0].contains("out of range"));
}

#[test]
fn test_void_value_cannot_be_bound() {
    let output = check_source("use ard/io\nlet x = io::print(\"a\")");
    assert!(errors(&output)[0].contains("Void"));
}

#[test]
fn test_struct_fields_and_methods() {
    let source = r#"
struct Point { x: Int, y: Int }
impl Point {
  fn sum() Int { self.x + self.y }
}
mut p = Point { x: 1, y: 2 }
p.x = 5
p.sum()
"#;
    let output = check_source(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let method = output.program.function("Point.sum").unwrap();
    assert_eq!(method.params.len(), 1);
    let entry = output.program.function("main").unwrap();
    assert!(matches!(entry.body.stmts[1], TStmt::SetField { index: 0, .. }));
}

#[test]
fn test_struct_literal_field_errors() {
    let output = check_source("struct Point { x: Int, y: Int }\nPoint { x: 1 }");
    assert!(errors(&output)[0].contains("missing field(s) `y`"));

    let output = check_source("struct Point { x: Int }\nPoint { x: 1, z: 2 }");
    assert!(errors(&output)[0].contains("no field `z`"));
}

#[test]
fn test_to_string_trait_requires_to_str() {
    let output = check_source("struct A { n: Int }\nimpl ToString for A {\n  fn show() Str { \"a\" }\n}");
    assert!(errors(&output)[0].contains("ToString"));
}

#[test]
fn test_map_methods() {
    let output = check_source("let m: [Str:Int] = [\"a\": 1]\nm.get(\"a\")");
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(entry_type(&output), Type::maybe(Type::Int));
}

#[test]
fn test_async_start_types_the_fiber() {
    let source = "use ard/async\nlet fiber = async::start(fn() Int { 42 })\nfiber.wait()";
    let output = check_source(source);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert_eq!(entry_type(&output), Type::Int);
    let entry = output.program.function("main").unwrap();
    let TStmt::Let { value, .. } = &entry.body.stmts[0] else {
        panic!("expected let");
    };
    assert!(matches!(value.kind, TExprKind::StartFiber(_)));
}

#[test]
fn test_extern_calls_lower_to_bindings() {
    let output = check_source("extern fn now() Int = \"time_now\"\nnow()");
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    let entry = output.program.function("main").unwrap();
    let TStmt::Expr(expr) = &entry.body.stmts[0] else {
        panic!("expected expression");
    };
    assert!(matches!(&expr.kind, TExprKind::CallExtern { binding, .. } if binding == "time_now"));
}

#[test]
fn test_external_module_functions_are_callable() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("lib")).unwrap();
    std::fs::write(
        dir.path().join("lib/math.ard"),
        "fn double(x: Int) Int { x * 2 }",
    )
    .unwrap();

    let program = ard_parser::parse_program("use app/lib/math\nmath::double(4)", 0).unwrap();
    let mut sources = SourceMap::new();
    let mut resolver = FsModuleResolver::new(dir.path(), &mut sources);
    let output = check(&program, &mut resolver);
    assert!(output.diagnostics.is_empty(), "{:?}", output.diagnostics);
    assert!(output.program.function("app/lib/math::double").is_some());
    assert_eq!(entry_type(&output), Type::Int);
}

#[test]
fn test_missing_module_is_an_error() {
    let output = check_source("use app/missing");
    assert_eq!(errors(&output).len(), 1);
}

#[test]
fn test_module_top_level_statements_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("side.ard"), "let x = 1").unwrap();

    let program = ard_parser::parse_program("use app/side", 0).unwrap();
    let mut sources = SourceMap::new();
    let mut resolver = FsModuleResolver::new(dir.path(), &mut sources);
    let output = check(&program, &mut resolver);
    assert!(errors(&output)[0].contains("only contain declarations"));
}
