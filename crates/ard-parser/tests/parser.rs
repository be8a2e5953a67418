use ard_ast::*;
use ard_parser::{ParseErrorKind, parse_program};

fn parse(source: &str) -> Program {
    parse_program(source, 0).unwrap_or_else(|errors| panic!("parse failed: {errors:?}"))
}

fn single_expr(source: &str) -> ExprKind {
    let program = parse(source);
    match program.statements.into_iter().next().map(|stmt| stmt.kind) {
        Some(StmtKind::Expr(expr)) => expr.kind,
        other => panic!("expected expression statement, got {other:?}"),
    }
}

#[test]
fn test_imports_with_and_without_alias() {
    let program = parse("use ard/io\nuse ard/float as f\nuse my_app/utils");
    let names: Vec<_> = program
        .imports
        .iter()
        .map(|import| (import.path.as_str(), import.name.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![("ard/io", "io"), ("ard/float", "f"), ("my_app/utils", "utils")]
    );
    assert!(program.imports[0].is_std());
    assert!(!program.imports[2].is_std());
}

#[test]
fn test_let_with_annotation_keeps_raw_number() {
    let program = parse("let x: Int = 42");
    match &program.statements[0].kind {
        StmtKind::Let {
            name,
            mutable,
            ty,
            value,
        } => {
            assert_eq!(name.name, "x");
            assert!(!mutable);
            assert_eq!(ty.as_ref().map(|t| &t.kind), Some(&TypeExprKind::Named("Int".into())));
            assert_eq!(value.kind, ExprKind::Number("42".into()));
        }
        other => panic!("unexpected statement {other:?}"),
    }
}

#[test]
fn test_operator_precedence() {
    match single_expr("1 + 2 * 3") {
        ExprKind::Binary { op, rhs, .. } => {
            assert_eq!(op, BinaryOp::Add);
            assert!(matches!(rhs.kind, ExprKind::Binary { op: BinaryOp::Mul, .. }));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_generic_function_declaration() {
    let program = parse("fn map(list: [$A], f: fn($A) $B) [$B] { [] }");
    let StmtKind::Function(decl) = &program.statements[0].kind else {
        panic!("expected function");
    };
    assert_eq!(decl.params.len(), 2);
    let TypeExprKind::Function { params, ret } = &decl.params[1].ty.kind else {
        panic!("expected function type");
    };
    assert_eq!(params[0].kind, TypeExprKind::Generic("A".into()));
    assert_eq!(
        ret.as_ref().map(|r| &r.kind),
        Some(&TypeExprKind::Generic("B".into()))
    );
    assert!(matches!(
        decl.ret.as_ref().map(|t| &t.kind),
        Some(TypeExprKind::List(_))
    ));
}

#[test]
fn test_explicit_type_arguments_on_call() {
    match single_expr("map<Int, Float>(xs, f)") {
        ExprKind::Call {
            callee,
            type_args,
            args,
        } => {
            assert_eq!(callee.name, "map");
            assert_eq!(type_args.len(), 2);
            assert_eq!(args.len(), 2);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_less_than_is_not_type_arguments() {
    assert!(matches!(
        single_expr("a < b"),
        ExprKind::Binary { op: BinaryOp::Lt, .. }
    ));
}

#[test]
fn test_module_call_and_method_chain() {
    match single_expr("io::print(xs.at(0).to_str())") {
        ExprKind::ModuleCall { module, name, args, .. } => {
            assert_eq!(module.name, "io");
            assert_eq!(name.name, "print");
            assert!(matches!(args[0].kind, ExprKind::MethodCall { .. }));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_struct_literal_not_confused_with_if_body() {
    let program = parse("struct P { x: Int }\nif ok { P { x: 1 } } else { P { x: 2 } }");
    assert_eq!(program.statements.len(), 2);
    let StmtKind::Expr(expr) = &program.statements[1].kind else {
        panic!("expected if expression");
    };
    let ExprKind::If { branches, else_block } = &expr.kind else {
        panic!("expected if");
    };
    assert!(matches!(branches[0].0.kind, ExprKind::Ident(_)));
    assert!(else_block.is_some());
}

#[test]
fn test_match_patterns() {
    let source = "match x { ok(v) => v, err(e) => 0 }\nmatch n { 1 => \"one\", -2 => \"neg\", _ => \"many\" }";
    let program = parse(source);
    let StmtKind::Expr(first) = &program.statements[0].kind else {
        panic!()
    };
    let ExprKind::Match { arms, .. } = &first.kind else {
        panic!()
    };
    assert!(matches!(arms[0].pattern, Pattern::Ok(_)));
    assert!(matches!(arms[1].pattern, Pattern::Err(_)));

    let StmtKind::Expr(second) = &program.statements[1].kind else {
        panic!()
    };
    let ExprKind::Match { arms, .. } = &second.kind else {
        panic!()
    };
    assert_eq!(arms[0].pattern, Pattern::Int(1));
    assert_eq!(arms[1].pattern, Pattern::Int(-2));
    assert_eq!(arms[2].pattern, Pattern::Wildcard);
}

#[test]
fn test_loops_and_assignment() {
    let program = parse("mut t = 0\nfor i in 0..10 { t = t + i }\nfor x in [1, 2] { break }");
    assert!(matches!(program.statements[1].kind, StmtKind::ForRange { .. }));
    let StmtKind::ForRange { body, .. } = &program.statements[1].kind else {
        panic!()
    };
    assert!(matches!(body.stmts[0].kind, StmtKind::Assign { .. }));
    assert!(matches!(program.statements[2].kind, StmtKind::ForIn { .. }));
}

#[test]
fn test_newline_separates_statements() {
    let program = parse("let a = 1\n-1");
    assert_eq!(program.statements.len(), 2);
}

#[test]
fn test_declarations() {
    let source = r#"
extern fn now() Int = "time_now"
struct Point {
  x: Int
  y: Int
}
impl Point { fn sum() Int { self.x + self.y } }
impl ToString for Point { fn to_str() Str { "p" } }
type Shape = Circle | Square
"#;
    let program = parse(source);
    assert_eq!(program.statements.len(), 5);
    assert!(program.statements.iter().all(Stmt::is_declaration));
    let StmtKind::Extern(ext) = &program.statements[0].kind else {
        panic!()
    };
    assert_eq!(ext.binding, "time_now");
    let StmtKind::Struct(decl) = &program.statements[1].kind else {
        panic!()
    };
    assert_eq!(decl.fields.len(), 2);
    let StmtKind::Impl(with_trait) = &program.statements[3].kind else {
        panic!()
    };
    assert_eq!(with_trait.trait_name.as_ref().map(|t| t.name.as_str()), Some("ToString"));
    assert_eq!(with_trait.target.name, "Point");
}

#[test]
fn test_maybe_and_result_types() {
    let program = parse("fn f(a: Int?, b: Int!Str) [Str:Int] { [:] }");
    let StmtKind::Function(decl) = &program.statements[0].kind else {
        panic!()
    };
    assert!(matches!(decl.params[0].ty.kind, TypeExprKind::Maybe(_)));
    assert!(matches!(decl.params[1].ty.kind, TypeExprKind::Result(_, _)));
    assert!(matches!(
        decl.ret.as_ref().map(|t| &t.kind),
        Some(TypeExprKind::Map(_, _))
    ));
}

#[test]
fn test_errors_are_collected_across_statements() {
    let errors = parse_program("let = 1\nlet y = 2\nlet = 3", 0).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.kind == ParseErrorKind::UnexpectedToken));
}

#[test]
fn test_invalid_token_is_reported() {
    let errors = parse_program("let x = @", 0).unwrap_err();
    assert_eq!(errors[0].kind, ParseErrorKind::InvalidSyntax);
    assert_eq!(errors[0].span, Span::new(0, 8, 9));
}

#[test]
fn test_unexpected_eof() {
    let errors = parse_program("fn f() {", 0).unwrap_err();
    assert_eq!(errors[0].kind, ParseErrorKind::UnexpectedEof);
}
