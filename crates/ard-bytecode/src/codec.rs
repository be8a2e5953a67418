//! Binary encoding of bytecode programs.
//!
//! Layout: `b"ARDBC\0"`, the format version as little-endian `u16`, then the
//! bincode-encoded [`Program`]. Decoding checks the header only; the caller
//! must run the verifier on the result.

use tracing::debug;

use crate::program::Program;

pub const MAGIC: &[u8; 6] = b"ARDBC\0";
pub const FORMAT_VERSION: u16 = 1;

const HEADER_LEN: usize = MAGIC.len() + 2;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Bytecode is truncated: {len} bytes")]
    Truncated { len: usize },

    #[error("Not an Ard bytecode file")]
    BadMagic,

    #[error("Unsupported bytecode format version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

pub fn encode(program: &Program) -> Result<Vec<u8>, EncodeError> {
    let body = bincode::serialize(program).map_err(|e| EncodeError::Serialization(e.to_string()))?;
    let mut bytes = Vec::with_capacity(HEADER_LEN + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&body);
    debug!(bytes = bytes.len(), "Program encoded");
    Ok(bytes)
}

pub fn decode(bytes: &[u8]) -> Result<Program, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::Truncated { len: bytes.len() });
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let (version, body) = rest.split_at(2);
    let found = u16::from_le_bytes([version[0], version[1]]);
    if found != FORMAT_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found,
            expected: FORMAT_VERSION,
        });
    }
    let program: Program =
        bincode::deserialize(body).map_err(|e| DecodeError::Deserialization(e.to_string()))?;
    debug!(
        functions = program.functions.len(),
        instructions = program.code.len(),
        "Program decoded"
    );
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::{Instruction, OpcodeKind};
    use crate::operand::Operand;
    use crate::program::{Constant, Function};

    fn sample() -> Program {
        Program {
            constants: vec![Constant::Float(2.5), Constant::Str("hi".into())],
            functions: vec![Function {
                name: "main".into(),
                entry: 0,
                end: 2,
                arity: 0,
                locals: 0,
                returns_value: true,
            }],
            code: vec![
                Instruction::new(OpcodeKind::Const, vec![Operand::Const(0)]),
                Instruction::simple(OpcodeKind::Return),
            ],
            entry: 0,
        }
    }

    #[test]
    fn test_round_trip_preserves_program() {
        let bytes = encode(&sample()).unwrap();
        assert_eq!(&bytes[..6], MAGIC);
        assert_eq!(decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_header_is_checked() {
        assert!(matches!(decode(b"ARD"), Err(DecodeError::Truncated { len: 3 })));
        assert!(matches!(decode(b"NOTARD\x01\x00"), Err(DecodeError::BadMagic)));

        let mut bytes = encode(&sample()).unwrap();
        bytes[6] = 9;
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::UnsupportedVersion { found: 9, .. })
        ));
    }

    #[test]
    fn test_truncated_body_fails_to_decode() {
        let bytes = encode(&sample()).unwrap();
        assert!(matches!(
            decode(&bytes[..bytes.len() - 3]),
            Err(DecodeError::Deserialization(_))
        ));
    }
}
