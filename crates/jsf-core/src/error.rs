//! Error types for the fuzzer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Block structure is broken: a closer without opener, a closer of the
    /// wrong kind, or blocks left open at the end of a program.
    #[error("Malformed program: {0}")]
    MalformedProgram(String),

    #[error("Operation {operation} is not valid in context {active} (requires {required}, forbids {incompatible})")]
    InvalidContext {
        operation: String,
        active: String,
        required: String,
        incompatible: String,
    },

    #[error("Variable v{variable} is not visible at instruction {position}")]
    UndefinedVariable { variable: u32, position: usize },

    #[error("Operation {operation} expects {expected} inputs, got {actual}")]
    InvalidArity {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("Failed to decode program {identifier}: {reason}")]
    ProgramDecoding { identifier: String, reason: String },

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl Error {
    /// Wrap any error raised while turning bytes into a program.
    pub fn decoding(identifier: impl Into<String>, reason: impl ToString) -> Self {
        Error::ProgramDecoding {
            identifier: identifier.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::UndefinedVariable {
            variable: 7,
            position: 3,
        };
        assert_eq!(err.to_string(), "Variable v7 is not visible at instruction 3");

        let err = Error::decoding("seed_1.prog", "truncated input");
        assert_eq!(
            err.to_string(),
            "Failed to decode program seed_1.prog: truncated input"
        );
    }
}
