//! Serialized form of programs.
//!
//! Programs travel between the corpus, the seed directory and crash storage
//! as [`EncodedProgram`]s. Decoding replays the instructions through the
//! validator, so a program read from disk is held to the same invariants as
//! one coming from the builder.

use crate::instruction::Instruction;
use crate::program::Program;
use crate::validation::validate_instructions;
use jsf_core::{Error, ProgramId, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedProgram {
    pub id: ProgramId,
    pub parent: Option<ProgramId>,
    pub code: Vec<Instruction>,
    #[serde(default)]
    pub comments: Vec<String>,
}

impl From<&Program> for EncodedProgram {
    fn from(program: &Program) -> Self {
        Self {
            id: program.id(),
            parent: program.parent(),
            code: program.code().to_vec(),
            comments: program.comments().to_vec(),
        }
    }
}

impl TryFrom<EncodedProgram> for Program {
    type Error = Error;

    fn try_from(encoded: EncodedProgram) -> Result<Self> {
        validate_instructions(&encoded.code)
            .map_err(|e| Error::decoding(encoded.id.to_string(), e))?;
        Ok(Program::from_parts(encoded.code, encoded.parent, encoded.comments).with_id(encoded.id))
    }
}

impl Program {
    /// Serialize to the binary storage format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(&EncodedProgram::from(self))
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize and validate. `identifier` names the source in errors,
    /// typically a file name.
    pub fn from_bytes(identifier: &str, bytes: &[u8]) -> Result<Self> {
        let encoded: EncodedProgram =
            bincode::deserialize(bytes).map_err(|e| Error::decoding(identifier, e))?;
        Program::try_from(encoded).map_err(|e| match e {
            Error::ProgramDecoding { reason, .. } => Error::decoding(identifier, reason),
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ProgramBuilder;
    use crate::generator::generate_program;
    use crate::instruction::Variable;
    use crate::operation::Operation;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_bytes_preserve_identity() {
        let mut b = ProgramBuilder::new();
        b.load_int(3).unwrap();
        b.add_comment("seed");
        let program = b.finalize();

        let decoded = Program::from_bytes("seed.bin", &program.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, program);
        assert_eq!(decoded.comments(), ["seed".to_string()]);
    }

    #[test]
    fn test_decoding_rejects_invalid_code() {
        let mut b = ProgramBuilder::new();
        b.load_int(3).unwrap();
        let mut encoded = EncodedProgram::from(&b.finalize());
        encoded.code.push(
            Instruction::new(Operation::Return, 1).with_inputs(vec![Variable(0)]),
        );
        let bytes = bincode::serialize(&encoded).unwrap();

        match Program::from_bytes("bad.bin", &bytes) {
            Err(Error::ProgramDecoding { identifier, .. }) => assert_eq!(identifier, "bad.bin"),
            other => panic!("expected a decoding error, got {:?}", other),
        }
    }

    #[test]
    fn test_decoding_rejects_garbage() {
        assert!(matches!(
            Program::from_bytes("junk", &[0xff, 0x01]),
            Err(Error::ProgramDecoding { .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32,
            ..ProptestConfig::default()
        })]

        #[test]
        fn prop_encoding_is_lossless(seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut b = ProgramBuilder::new();
            let program = generate_program(&mut b, &mut rng, 30, 3);
            let decoded = Program::from_bytes("p", &program.to_bytes().unwrap()).unwrap();
            // Compared as bytes since NaN literals are not equal to themselves.
            prop_assert_eq!(decoded.to_bytes().unwrap(), program.to_bytes().unwrap());
            prop_assert_eq!(decoded.id(), program.id());
        }
    }
}
