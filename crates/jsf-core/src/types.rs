//! Core type definitions shared by every crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of a finalized program, used for lineage tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramId(pub Uuid);

impl ProgramId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProgramId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a fuzzing worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub usize);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Feedback token produced by executing a program.
///
/// The signature is a sorted, deduplicated set of edge identifiers. How the
/// edges are obtained is up to the executor; the engine only compares
/// signatures and counts edges it has not seen before.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CoverageSignature {
    edges: Vec<u32>,
}

impl CoverageSignature {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_edges(edges: impl IntoIterator<Item = u32>) -> Self {
        let mut edges: Vec<u32> = edges.into_iter().collect();
        edges.sort_unstable();
        edges.dedup();
        Self { edges }
    }

    pub fn edges(&self) -> &[u32] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn contains(&self, edge: u32) -> bool {
        self.edges.binary_search(&edge).is_ok()
    }

    /// True if every edge of `self` also occurs in `other`
    pub fn is_subset_of(&self, other: &CoverageSignature) -> bool {
        self.edges.iter().all(|e| other.contains(*e))
    }

    pub fn merge(&self, other: &CoverageSignature) -> CoverageSignature {
        Self::from_edges(self.edges.iter().chain(other.edges.iter()).copied())
    }
}
