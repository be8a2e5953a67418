//! Opcode metadata registry.
//!
//! The verifier reads operand shapes and stack effects from here; the VM
//! builds its handler table against the same [`OPCODE_COUNT`].

use std::sync::OnceLock;

use super::opcode::{OpcodeKind, OpcodeMetadata, OperandKind, StackEffect};

/// Metadata specification for an opcode.
#[derive(Debug, Clone)]
pub struct OpcodeSpec {
    pub kind: OpcodeKind,
    pub metadata: OpcodeMetadata,
}

/// Retrieves the global list of all opcode specifications.
pub fn opcode_specs() -> &'static [OpcodeSpec] {
    static SPECS: OnceLock<Vec<OpcodeSpec>> = OnceLock::new();
    SPECS.get_or_init(build_specs)
}

/// Total number of opcodes. Must match the number of [`OpcodeKind`] variants.
pub const OPCODE_COUNT: usize = 50;

/// Retrieves metadata for a specific opcode kind in O(1) time.
///
/// # Panics
///
/// Panics if the opcode kind has not been registered in the spec table.
pub fn metadata_for(kind: OpcodeKind) -> &'static OpcodeMetadata {
    static METADATA: OnceLock<[&'static OpcodeMetadata; OPCODE_COUNT]> = OnceLock::new();
    METADATA.get_or_init(|| {
        let mut table: [Option<&'static OpcodeMetadata>; OPCODE_COUNT] = [None; OPCODE_COUNT];
        for spec in opcode_specs() {
            table[spec.kind as usize] = Some(&spec.metadata);
        }
        std::array::from_fn(|index| {
            table[index]
                .unwrap_or_else(|| panic!("Missing opcode metadata for opcode index {}", index))
        })
    })[kind as usize]
}

/// Master list of opcode specifications.
fn build_specs() -> Vec<OpcodeSpec> {
    use OpcodeKind::*;
    use OperandKind as K;

    const NONE: &[OperandKind] = &[];
    const CONST: &[OperandKind] = &[K::Const];
    const LOCAL: &[OperandKind] = &[K::Local];
    const TARGET: &[OperandKind] = &[K::Target];
    const COUNT: &[OperandKind] = &[K::Count];
    const FLAG: &[OperandKind] = &[K::Flag];

    macro_rules! op {
        ($kind:ident, $operands:expr, $pops:expr => $pushes:expr) => {
            OpcodeSpec {
                kind: $kind,
                metadata: OpcodeMetadata {
                    operands: $operands,
                    effect: StackEffect::Fixed {
                        pops: $pops,
                        pushes: $pushes,
                    },
                },
            }
        };
        ($kind:ident, $operands:expr, $effect:expr) => {
            OpcodeSpec {
                kind: $kind,
                metadata: OpcodeMetadata {
                    operands: $operands,
                    effect: $effect,
                },
            }
        };
    }

    vec![
        op!(Const, CONST, 0 => 1),
        op!(Load, LOCAL, 0 => 1),
        op!(Store, LOCAL, 1 => 0),
        op!(Pop, NONE, 1 => 0),
        op!(Add, NONE, 2 => 1),
        op!(Sub, NONE, 2 => 1),
        op!(Mul, NONE, 2 => 1),
        op!(Div, NONE, 2 => 1),
        op!(Mod, NONE, 2 => 1),
        op!(Neg, NONE, 1 => 1),
        op!(Not, NONE, 1 => 1),
        op!(Eq, NONE, 2 => 1),
        op!(NotEq, NONE, 2 => 1),
        op!(Lt, NONE, 2 => 1),
        op!(LtEq, NONE, 2 => 1),
        op!(Gt, NONE, 2 => 1),
        op!(GtEq, NONE, 2 => 1),
        op!(Jump, TARGET, 0 => 0),
        op!(JumpIfFalse, TARGET, 1 => 0),
        op!(Call, &[K::Function], StackEffect::Call),
        op!(
            CallValue,
            &[K::Count, K::Flag],
            StackEffect::CountedCall {
                count: 0,
                extra: 1,
                returns: 1
            }
        ),
        op!(Return, NONE, StackEffect::Return),
        op!(MakeList, COUNT, StackEffect::Counted { operand: 0, per: 1 }),
        op!(MakeMap, COUNT, StackEffect::Counted { operand: 0, per: 2 }),
        op!(MakeStruct, &[K::Const, K::Count], StackEffect::Counted { operand: 1, per: 1 }),
        op!(MakeClosure, &[K::Function, K::Count], StackEffect::Counted { operand: 1, per: 1 }),
        op!(MakeSome, NONE, 1 => 1),
        op!(MakeNone, NONE, 0 => 1),
        op!(MakeOk, NONE, 1 => 1),
        op!(MakeErr, NONE, 1 => 1),
        op!(GetField, COUNT, 1 => 1),
        op!(SetField, COUNT, 2 => 1),
        op!(ListPush, NONE, 2 => 1),
        op!(ListAt, NONE, 2 => 1),
        op!(MapSet, NONE, 3 => 1),
        op!(MapGet, NONE, 2 => 1),
        op!(MapHas, NONE, 2 => 1),
        op!(Size, NONE, 1 => 1),
        op!(ToStr, NONE, 1 => 1),
        op!(IsSome, NONE, 1 => 1),
        op!(IsNone, NONE, 1 => 1),
        op!(IsOk, NONE, 1 => 1),
        op!(IsErr, NONE, 1 => 1),
        op!(MaybeOr, NONE, 2 => 1),
        op!(Unwrap, NONE, 1 => 1),
        op!(IsType, CONST, 1 => 1),
        op!(
            ModuleCall,
            &[K::Const, K::Const, K::Count, K::Flag, K::Flag],
            StackEffect::CountedCall {
                count: 2,
                extra: 0,
                returns: 3
            }
        ),
        op!(
            CallExtern,
            &[K::Const, K::Count, K::Flag],
            StackEffect::CountedCall {
                count: 1,
                extra: 0,
                returns: 2
            }
        ),
        op!(StartFiber, NONE, 1 => 1),
        op!(Wait, FLAG, StackEffect::Flagged { pops: 1, returns: 0 }),
    ]
}
