//! Emitted programs survive encode, embed and decode unchanged and still verify.

use ard_bytecode::{Program, decode, embed, emit, encode, verify, verify_program};

fn emitted(source: &str) -> Program {
    let ast = ard_parser::parse_program(source, 0).unwrap();
    let output = ard_check::check(&ast, &mut ard_check::NoModules);
    assert!(!output.has_errors(), "{:?}", output.diagnostics);
    emit(&output.program).unwrap()
}

const PROGRAM: &str = r#"
use ard/io

struct Counter { count: Int }

impl Counter {
    fn label() Str { "count: " + self.count.to_str() }
}

fn map(list: [$A], f: fn($A) $B) [$B] {
    mut out = []
    for item in list { out.push(f(item)) }
    out
}

mut c = Counter { count: 0 }
for n in map([1, 2, 3], fn(x: Int) Int { x * 2 }) {
    c.count = c.count + n
}
io::print(c.label())
"#;

#[test]
fn test_decoded_program_is_identical_and_verifies() {
    let program = emitted(PROGRAM);
    verify_program(&program).unwrap();

    let decoded = decode(&encode(&program).unwrap()).unwrap();
    assert_eq!(decoded, program);
    verify(decoded).unwrap();
}

#[test]
fn test_program_survives_embedding() {
    let program = emitted(PROGRAM);
    let payload = encode(&program).unwrap();
    let binary = embed::append_payload(b"pretend host executable", &payload);

    let recovered = embed::extract_payload(&binary).unwrap();
    let verified = verify(decode(recovered).unwrap()).unwrap();
    assert_eq!(verified.program(), &program);
}

#[test]
fn test_corrupted_payload_fails_verification_not_decoding() {
    let mut program = emitted("mut i = 0\nwhile i < 3 { i = i + 1 }\ni");
    let jump = program
        .code
        .iter_mut()
        .find(|i| i.kind == ard_bytecode::OpcodeKind::Jump)
        .unwrap();
    jump.operands[0] = ard_bytecode::Operand::Target(-1);

    let decoded = decode(&encode(&program).unwrap()).unwrap();
    assert!(matches!(
        verify(decoded),
        Err(ard_bytecode::VerifyError::JumpOutOfRange { target: -1, .. })
    ));
}
