//! Global coverage bookkeeping shared by all workers.

use dashmap::DashSet;
use jsf_core::CoverageSignature;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Tracks every edge and crash seen by any worker.
///
/// Each edge is claimed by exactly one caller of [`evaluate`], so two
/// workers finding the same edge at once never both count it as new.
///
/// [`evaluate`]: CoverageEvaluator::evaluate
#[derive(Default)]
pub struct CoverageEvaluator {
    edges: DashSet<u32>,
    crashes: DashSet<u64>,
}

impl CoverageEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `coverage` and return how many of its edges were new
    pub fn evaluate(&self, coverage: &CoverageSignature) -> usize {
        coverage
            .edges()
            .iter()
            .filter(|edge| self.edges.insert(**edge))
            .count()
    }

    /// True the first time a crash with this signal and coverage is seen
    pub fn is_new_crash(&self, signal: i32, coverage: Option<&CoverageSignature>) -> bool {
        let mut hasher = DefaultHasher::new();
        signal.hash(&mut hasher);
        coverage.hash(&mut hasher);
        self.crashes.insert(hasher.finish())
    }

    pub fn total_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn unique_crashes(&self) -> usize {
        self.crashes.len()
    }
}
