//! Operand encoding for bytecode instructions.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::opcode::OperandKind;

/// Local slot within a function frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Slot(pub u32);

impl Slot {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn id(self) -> u32 {
        self.0
    }
}

/// Operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// Constant pool index
    Const(u32),
    Local(Slot),
    /// Absolute instruction index. Signed so that corrupted programs decode
    /// and are rejected by the verifier instead of the decoder.
    Target(i32),
    /// Function table index
    Function(u32),
    Count(u32),
    Flag(bool),
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Const(_) => OperandKind::Const,
            Operand::Local(_) => OperandKind::Local,
            Operand::Target(_) => OperandKind::Target,
            Operand::Function(_) => OperandKind::Function,
            Operand::Count(_) => OperandKind::Count,
            Operand::Flag(_) => OperandKind::Flag,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(index) => write!(f, "#{index}"),
            Operand::Local(slot) => write!(f, "${}", slot.0),
            Operand::Target(target) => write!(f, "@{target}"),
            Operand::Function(index) => write!(f, "fn{index}"),
            Operand::Count(count) => write!(f, "{count}"),
            Operand::Flag(flag) => write!(f, "{flag}"),
        }
    }
}

/// An operand did not have the shape its opcode expects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid operand: {message}")]
pub struct OperandError {
    pub message: String,
}

/// Helper to expect a specific operand type.
fn expect_operand<T>(
    operands: &[Operand],
    index: usize,
    expected: &'static str,
    map: impl FnOnce(&Operand) -> Option<T>,
) -> Result<T, OperandError> {
    let operand = operands.get(index).ok_or_else(|| OperandError {
        message: format!("missing operand {index}, expected {expected}"),
    })?;
    map(operand).ok_or_else(|| OperandError {
        message: format!("expected {expected} operand, found {operand}"),
    })
}

/// Decode a constant pool index.
pub fn operand_const(operands: &[Operand], index: usize) -> Result<usize, OperandError> {
    expect_operand(operands, index, "Const", |op| match op {
        Operand::Const(value) => Some(*value as usize),
        _ => None,
    })
}

/// Decode a local slot.
pub fn operand_slot(operands: &[Operand], index: usize) -> Result<Slot, OperandError> {
    expect_operand(operands, index, "Local", |op| match op {
        Operand::Local(slot) => Some(*slot),
        _ => None,
    })
}

/// Decode a jump target. Negative targets are rejected here as well as by
/// the verifier.
pub fn operand_target(operands: &[Operand], index: usize) -> Result<usize, OperandError> {
    let target = expect_operand(operands, index, "Target", |op| match op {
        Operand::Target(value) => Some(*value),
        _ => None,
    })?;
    usize::try_from(target).map_err(|_| OperandError {
        message: format!("negative jump target {target}"),
    })
}

/// Decode a function table index.
pub fn operand_function(operands: &[Operand], index: usize) -> Result<usize, OperandError> {
    expect_operand(operands, index, "Function", |op| match op {
        Operand::Function(value) => Some(*value as usize),
        _ => None,
    })
}

/// Decode a count.
pub fn operand_count(operands: &[Operand], index: usize) -> Result<usize, OperandError> {
    expect_operand(operands, index, "Count", |op| match op {
        Operand::Count(value) => Some(*value as usize),
        _ => None,
    })
}

/// Decode a flag.
pub fn operand_flag(operands: &[Operand], index: usize) -> Result<bool, OperandError> {
    expect_operand(operands, index, "Flag", |op| match op {
        Operand::Flag(value) => Some(*value),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoders_check_kind_and_presence() {
        let operands = [Operand::Count(3), Operand::Flag(true)];
        assert_eq!(operand_count(&operands, 0).unwrap(), 3);
        assert!(operand_flag(&operands, 1).unwrap());
        assert!(operand_slot(&operands, 0).is_err());
        let missing = operand_count(&operands, 2).unwrap_err();
        assert!(missing.message.contains("missing operand 2"));
    }

    #[test]
    fn test_negative_target_is_rejected() {
        let err = operand_target(&[Operand::Target(-1)], 0).unwrap_err();
        assert!(err.message.contains("negative"));
    }
}
