use super::*;
use ard_ast::Span;
use ard_check::checked::TExpr;
use ard_check::types::Type;

fn checked(source: &str) -> CheckedProgram {
    let program = ard_parser::parse_program(source, 0).unwrap();
    let output = ard_check::check(&program, &mut ard_check::NoModules);
    assert!(!output.has_errors(), "{:?}", output.diagnostics);
    output.program
}

fn instructions<'a>(program: &'a Program, name: &str) -> &'a [Instruction] {
    let index = program.function_index(name).unwrap();
    &program.code[program.functions[index].body()]
}

fn main_with(body: Vec<TStmt>, ty: Type) -> CheckedProgram {
    CheckedProgram {
        functions: vec![CheckedFunction {
            name: "main".into(),
            params: vec![],
            captures: vec![],
            local_count: 0,
            returns_value: !ty.is_void(),
            body: TBlock { stmts: body, ty },
            span: Span::default(),
        }],
        entry: "main".into(),
        structs: Default::default(),
    }
}

#[test]
fn test_constants_are_deduplicated() {
    let program = emit(&checked("let a = 1.5\nlet b = 1.5\nlet c = 1\nlet d = 1")).unwrap();
    assert_eq!(
        program.constants,
        vec![Constant::Float(1.5), Constant::Int(1)]
    );
}

#[test]
fn test_entry_and_function_table() {
    let program = emit(&checked("fn add(a: Int, b: Int) Int { a + b }\nadd(1, 2)")).unwrap();
    let add = &program.functions[program.function_index("add").unwrap()];
    assert_eq!(add.arity, 2);
    assert_eq!(add.locals, 2);
    assert!(add.returns_value);
    assert_eq!(program.entry_function().unwrap().name, "main");

    let code = instructions(&program, "add");
    assert_eq!(code.last().unwrap().kind, OpcodeKind::Return);
    assert_eq!(code[2].kind, OpcodeKind::Add);
}

#[test]
fn test_closure_captures_follow_parameters() {
    let program = emit(&checked(
        "let base = 10\nlet add = fn(x: Int) Int { let y = x + base\n y }\nadd(1)",
    ))
    .unwrap();
    let closure = &program.functions[program.function_index("main$closure1").unwrap()];
    assert_eq!(closure.arity, 1);
    assert_eq!(closure.locals, 3);

    // `x` is slot 0, the captured `base` slot 1, `y` slot 2
    let code = instructions(&program, "main$closure1");
    assert_eq!(code[0], Instruction::new(OpcodeKind::Load, vec![Operand::Local(Slot(0))]));
    assert_eq!(code[1], Instruction::new(OpcodeKind::Load, vec![Operand::Local(Slot(1))]));
    assert_eq!(code[3], Instruction::new(OpcodeKind::Store, vec![Operand::Local(Slot(2))]));

    let main = instructions(&program, "main");
    assert!(main.iter().any(|i| i.kind == OpcodeKind::MakeClosure
        && i.operands.get(1) == Some(&Operand::Count(1))));
}

#[test]
fn test_jump_targets_are_patched() {
    let program = emit(&checked(
        "mut i = 0\nwhile i < 3 { if i == 1 { break }\n i = i + 1 }\ni",
    ))
    .unwrap();
    let main = &program.functions[program.entry as usize];
    for instruction in &program.code[main.body()] {
        if let Some(Operand::Target(target)) = instruction.operands.first() {
            assert!(*target >= 0, "unpatched jump in {}", program.disassemble());
            assert!(main.body().contains(&(*target as usize)));
        }
    }
}

#[test]
fn test_push_stores_back() {
    let program = emit(&checked("mut xs = [1]\nxs.push(2)\nxs")).unwrap();
    let kinds: Vec<OpcodeKind> = instructions(&program, "main").iter().map(|i| i.kind).collect();
    let push = kinds.iter().position(|k| *k == OpcodeKind::ListPush).unwrap();
    assert_eq!(kinds[push - 2], OpcodeKind::Load);
    assert_eq!(kinds[push + 1], OpcodeKind::Store);
}

#[test]
fn test_match_on_maybe_unwraps_binding() {
    let program = emit(&checked(
        "use ard/maybe\nlet m = maybe::some(3)\nmatch m { v => v, _ => 0 }",
    ))
    .unwrap();
    let kinds: Vec<OpcodeKind> = instructions(&program, "main").iter().map(|i| i.kind).collect();
    assert!(kinds.contains(&OpcodeKind::IsSome));
    assert!(kinds.contains(&OpcodeKind::Unwrap));
}

#[test]
fn test_unknown_function_is_an_error() {
    let call = TExpr::new(
        TExprKind::Call {
            function: "nope".into(),
            args: vec![],
        },
        Type::Int,
        Span::default(),
    );
    let err = emit(&main_with(vec![TStmt::Expr(call)], Type::Int)).unwrap_err();
    assert_eq!(err, EmitError::UnknownFunction { name: "nope".into() });
}

#[test]
fn test_invalid_expression_is_an_error() {
    let invalid = TExpr::new(TExprKind::Invalid, Type::Int, Span::default());
    let err = emit(&main_with(vec![TStmt::Expr(invalid)], Type::Void)).unwrap_err();
    assert!(matches!(err, EmitError::InvalidIR { .. }));
}

#[test]
fn test_missing_entry_is_an_error() {
    let mut program = main_with(vec![], Type::Void);
    program.entry = "start".into();
    assert!(matches!(
        emit(&program),
        Err(EmitError::UnknownFunction { .. })
    ));
}

#[test]
fn test_long_list_literal_is_built_in_chunks() {
    let items: Vec<String> = (0..1100).map(|i| i.to_string()).collect();
    let program = emit(&checked(&format!("[{}]", items.join(", ")))).unwrap();
    let main = instructions(&program, "main");
    let makes: Vec<&Instruction> = main.iter().filter(|i| i.kind == OpcodeKind::MakeList).collect();
    assert_eq!(makes.len(), 1);
    assert_eq!(makes[0].operands, vec![Operand::Count(LITERAL_CHUNK as u32)]);
    let pushes = main.iter().filter(|i| i.kind == OpcodeKind::ListPush).count();
    assert_eq!(pushes, 1100 - LITERAL_CHUNK);
}

#[test]
fn test_long_map_literal_appends_with_map_set() {
    let entries: Vec<String> = (0..300).map(|i| format!("{i}: true")).collect();
    let program = emit(&checked(&format!("[{}]", entries.join(", ")))).unwrap();
    let main = instructions(&program, "main");
    assert!(main.iter().any(|i| i.kind == OpcodeKind::MakeMap
        && i.operands == vec![Operand::Count(LITERAL_CHUNK as u32)]));
    let sets = main.iter().filter(|i| i.kind == OpcodeKind::MapSet).count();
    assert_eq!(sets, 300 - LITERAL_CHUNK);
}

#[test]
fn test_short_list_literal_is_a_single_make_list() {
    let program = emit(&checked("[1, 2, 3]")).unwrap();
    let main = instructions(&program, "main");
    assert!(main.iter().any(|i| i.kind == OpcodeKind::MakeList
        && i.operands == vec![Operand::Count(3)]));
    assert!(!main.iter().any(|i| i.kind == OpcodeKind::ListPush));
}
