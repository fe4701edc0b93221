//! Results of running a lifted program.

use jsf_core::CoverageSignature;
use serde::{Deserialize, Serialize};

/// What happened when the target ran a program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Succeeded {
        coverage: CoverageSignature,
    },
    /// The target was terminated by `signal`. Coverage is absent when the
    /// crash prevented it from being collected.
    Crashed {
        signal: i32,
        coverage: Option<CoverageSignature>,
    },
    TimedOut,
}

impl Outcome {
    pub fn coverage(&self) -> Option<&CoverageSignature> {
        match self {
            Outcome::Succeeded { coverage } => Some(coverage),
            Outcome::Crashed { coverage, .. } => coverage.as_ref(),
            Outcome::TimedOut => None,
        }
    }

    pub fn is_crash(&self) -> bool {
        matches!(self, Outcome::Crashed { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Outcome::TimedOut)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Succeeded { .. } => "succeeded",
            Outcome::Crashed { .. } => "crashed",
            Outcome::TimedOut => "timed_out",
        }
    }
}

/// Running totals kept by an executor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub executions: u64,
    pub crashes: u64,
    pub timeouts: u64,
}

impl ExecutionStats {
    pub fn record(&mut self, outcome: &Outcome) {
        self.executions += 1;
        match outcome {
            Outcome::Crashed { .. } => self.crashes += 1,
            Outcome::TimedOut => self.timeouts += 1,
            Outcome::Succeeded { .. } => {}
        }
    }
}
