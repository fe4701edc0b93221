//! Execution of lifted programs against a target engine.
//!
//! The fuzzing loop only sees the [`Executor`] trait and its [`Outcome`];
//! [`Runtime`] pairs an executor with a lifter and the configured timeout.

pub mod executor;
pub mod outcome;
pub mod process;

pub use executor::{Executor, FnExecutor};
pub use outcome::{ExecutionStats, Outcome};
pub use process::ProcessExecutor;

use jsf_core::{ExecutionConfig, Result};
use jsf_ir::{Lifter, Program, TextLifter};
use std::sync::Arc;
use std::time::Duration;

/// Lifts and runs programs
#[derive(Clone)]
pub struct Runtime {
    executor: Arc<dyn Executor>,
    lifter: Arc<dyn Lifter>,
    timeout: Duration,
}

impl Runtime {
    pub fn new(executor: Arc<dyn Executor>, lifter: Arc<dyn Lifter>, timeout: Duration) -> Self {
        Self {
            executor,
            lifter,
            timeout,
        }
    }

    /// A process runtime for the configured target, lifting to IR text
    pub fn from_config(config: &ExecutionConfig) -> Result<Self> {
        Ok(Self::new(
            Arc::new(ProcessExecutor::new(config)?),
            Arc::new(TextLifter::new()),
            Duration::from_millis(config.timeout_ms),
        ))
    }

    pub fn lift(&self, program: &Program) -> String {
        self.lifter.lift(program)
    }

    pub fn run(&self, program: &Program) -> Result<Outcome> {
        let script = self.lifter.lift(program);
        self.executor.execute(&script, self.timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsf_core::CoverageSignature;
    use jsf_ir::{generate_program, ProgramBuilder};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_run_lifts_before_executing() {
        let executor = FnExecutor::new(|script, timeout| {
            assert_eq!(timeout, Duration::from_millis(50));
            Ok(Outcome::Succeeded {
                coverage: CoverageSignature::from_edges([script.lines().count() as u32]),
            })
        });
        let runtime = Runtime::new(
            Arc::new(executor),
            Arc::new(TextLifter::new().without_comments()),
            Duration::from_millis(50),
        );

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut b = ProgramBuilder::new();
        let program = generate_program(&mut b, &mut rng, 12, 2);
        let outcome = runtime.run(&program).unwrap();
        assert_eq!(
            outcome.coverage().map(|c| c.edges().to_vec()),
            Some(vec![program.len() as u32])
        );
    }

    #[test]
    fn test_from_config_requires_target() {
        assert!(Runtime::from_config(&ExecutionConfig::default()).is_err());
    }
}
