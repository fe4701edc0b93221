//! Choosing mutators.

use jsf_core::{Error, Result};
use jsf_ir::{DonorPool, Mutator, Program, ProgramBuilder};
use rand::distributions::{Distribution, WeightedIndex};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::trace;

/// Per-mutator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MutatorStats {
    pub attempts: u64,
    /// Calls that returned no program
    pub no_opportunity: u64,
    /// Produced programs that found new coverage
    pub interesting: u64,
}

impl MutatorStats {
    pub fn produced(&self) -> u64 {
        self.attempts - self.no_opportunity
    }

    /// Fraction of produced programs that were interesting
    pub fn success_rate(&self) -> f64 {
        match self.produced() {
            0 => 0.0,
            n => self.interesting as f64 / n as f64,
        }
    }
}

/// Picks mutators by configured weight and keeps statistics per mutator
pub struct MutatorScheduler {
    mutators: Vec<Box<dyn Mutator>>,
    distribution: WeightedIndex<u32>,
    stats: Vec<MutatorStats>,
}

impl MutatorScheduler {
    pub fn new(weighted: Vec<(Box<dyn Mutator>, u32)>) -> Result<Self> {
        let weights: Vec<u32> = weighted.iter().map(|(_, w)| *w).collect();
        let distribution = WeightedIndex::new(&weights)
            .map_err(|e| Error::Config(format!("invalid mutator weights: {}", e)))?;
        let mutators: Vec<Box<dyn Mutator>> = weighted.into_iter().map(|(m, _)| m).collect();
        let stats = vec![MutatorStats::default(); mutators.len()];
        Ok(Self {
            mutators,
            distribution,
            stats,
        })
    }

    pub fn len(&self) -> usize {
        self.mutators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutators.is_empty()
    }

    pub fn name(&self, index: usize) -> &'static str {
        self.mutators[index].name()
    }

    /// Derive a child of `program`, trying up to `max_attempts` randomly
    /// chosen mutators. Returns the index of the successful mutator.
    pub fn mutate(
        &mut self,
        program: &Program,
        donors: &dyn DonorPool,
        b: &mut ProgramBuilder,
        rng: &mut ChaCha8Rng,
        max_attempts: usize,
    ) -> Option<(usize, Program)> {
        for _ in 0..max_attempts {
            let index = self.distribution.sample(rng);
            self.stats[index].attempts += 1;
            match self.mutators[index].mutate(program, donors, b, rng) {
                Some(child) => return Some((index, child)),
                None => {
                    self.stats[index].no_opportunity += 1;
                    trace!(mutator = self.mutators[index].name(), "no mutation opportunity");
                }
            }
        }
        None
    }

    /// Credit mutator `index` with a child that found new coverage
    pub fn record_interesting(&mut self, index: usize) {
        if let Some(stats) = self.stats.get_mut(index) {
            stats.interesting += 1;
        }
    }

    pub fn stats(&self) -> impl Iterator<Item = (&'static str, MutatorStats)> + '_ {
        self.mutators
            .iter()
            .zip(self.stats.iter())
            .map(|(m, s)| (m.name(), *s))
    }
}
