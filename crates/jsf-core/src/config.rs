//! Configuration types for the fuzzer.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Corpus retention and scheduling parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Maximum number of retained programs
    pub max_size: usize,
    /// Lower bound of an entry's sampling weight, so no entry starves
    pub min_weight: f64,
    /// Score added to a parent whose child discovered new coverage
    pub ancestor_boost: f64,
    /// How strongly unproductive samples reduce an entry's weight
    pub staleness_penalty: f64,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            max_size: 4096,
            min_weight: 0.05,
            ancestor_boost: 1.0,
            staleness_penalty: 0.1,
        }
    }
}

/// Mutation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    pub operation_weight: u32,
    pub input_weight: u32,
    pub splice_weight: u32,
    pub combine_weight: u32,
    pub codegen_weight: u32,
    /// Mutator invocations tried per iteration before falling back to generation
    pub max_attempts: usize,
    /// Approximate number of instructions emitted by one code generation pass
    pub codegen_budget: usize,
    /// Mutators refuse to produce programs longer than this
    pub max_program_size: usize,
    /// Maximum number of top-level sibling instructions taken from a donor
    pub max_splice_length: usize,
    /// Nesting limit for recursively generated blocks
    pub max_generation_depth: usize,
    /// Size of freshly generated seed programs
    pub seed_program_size: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            operation_weight: 3,
            input_weight: 3,
            splice_weight: 2,
            combine_weight: 1,
            codegen_weight: 3,
            max_attempts: 10,
            codegen_budget: 5,
            max_program_size: 500,
            max_splice_length: 4,
            max_generation_depth: 3,
            seed_program_size: 20,
        }
    }
}

/// Target execution parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Target command line; the lifted program is written to its stdin
    pub target: Vec<String>,
    /// Per-execution timeout in milliseconds
    pub timeout_ms: u64,
    /// Output beyond this many bytes is discarded
    pub max_output_bytes: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            target: Vec::new(),
            timeout_ms: 250,
            max_output_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Top-level fuzzer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzerConfig {
    /// Number of independent fuzzing workers
    pub workers: usize,
    /// Base seed; worker `i` uses `seed + i`
    pub seed: u64,
    /// Iterations per worker, unbounded when `None`
    pub iterations: Option<u64>,
    /// Directory with serialized seed programs
    pub seed_dir: Option<PathBuf>,
    /// Directory where crashing programs are stored
    pub crash_dir: Option<PathBuf>,
    /// Log worker statistics every this many iterations
    pub stats_interval: u64,
    pub log_format: LogFormat,
    pub corpus: CorpusConfig,
    pub mutation: MutationConfig,
    pub execution: ExecutionConfig,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            seed: 0,
            iterations: None,
            seed_dir: None,
            crash_dir: None,
            stats_interval: 1000,
            log_format: LogFormat::Pretty,
            corpus: CorpusConfig::default(),
            mutation: MutationConfig::default(),
            execution: ExecutionConfig::default(),
        }
    }
}

impl FuzzerConfig {
    /// Load a configuration from a JSON file; missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: FuzzerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.corpus.max_size == 0 {
            return Err(Error::Config("corpus.max_size must be at least 1".to_string()));
        }
        if self.execution.timeout_ms == 0 {
            return Err(Error::Config("execution.timeout_ms must be positive".to_string()));
        }
        let m = &self.mutation;
        let total = m.operation_weight + m.input_weight + m.splice_weight + m.combine_weight + m.codegen_weight;
        if total == 0 {
            return Err(Error::Config("at least one mutator weight must be non-zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = FuzzerConfig::default();
        assert_eq!(config.workers, 1);
        assert_eq!(config.corpus.max_size, 4096);
        assert_eq!(config.execution.timeout_ms, 250);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "workers": 4, "corpus": { "max_size": 10 }, "log_format": "json" }"#;
        let config: FuzzerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.workers, 4);
        assert_eq!(config.corpus.max_size, 10);
        assert_eq!(config.corpus.ancestor_boost, 1.0);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.mutation.max_attempts, 10);
    }

    #[test]
    fn test_validation_rejects_zero_workers() {
        let config = FuzzerConfig {
            workers: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validation_rejects_zero_weights() {
        let mut config = FuzzerConfig::default();
        config.mutation = MutationConfig {
            operation_weight: 0,
            input_weight: 0,
            splice_weight: 0,
            combine_weight: 0,
            codegen_weight: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
