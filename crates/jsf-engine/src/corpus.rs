//! Bounded pool of retained programs.

use chrono::{DateTime, Utc};
use jsf_core::{CorpusConfig, CoverageSignature, ProgramId};
use jsf_ir::{DonorPool, Program};
use parking_lot::RwLock;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Boosts reach at most this many generations up a program's lineage.
const BOOST_GENERATIONS: usize = 3;

#[derive(Debug, Clone)]
pub struct CorpusEntry {
    pub program: Arc<Program>,
    pub coverage: CoverageSignature,
    pub score: f64,
    pub discovered_at: DateTime<Utc>,
    /// Samples since this entry last led to new coverage
    pub stale: u32,
    /// Discovery order; breaks eviction ties deterministically
    sequence: u64,
}

impl CorpusEntry {
    pub fn id(&self) -> ProgramId {
        self.program.id()
    }

    /// Sampling weight. Productive entries are favoured and every sample
    /// that leads nowhere makes an entry less likely to be picked again.
    fn weight(&self, config: &CorpusConfig) -> f64 {
        let decay = 1.0 + config.staleness_penalty * f64::from(self.stale);
        (self.score / decay).max(config.min_weight)
    }

    /// Ordering for eviction: lowest score first, then oldest first
    fn eviction_order(&self, other: &CorpusEntry) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then(self.sequence.cmp(&other.sequence))
    }
}

pub struct Corpus {
    entries: Vec<CorpusEntry>,
    index: HashMap<ProgramId, usize>,
    config: CorpusConfig,
    next_sequence: u64,
}

impl Corpus {
    pub fn new(config: CorpusConfig) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            config,
            next_sequence: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    pub fn get(&self, id: ProgramId) -> Option<&CorpusEntry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, id: ProgramId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CorpusEntry> {
        self.entries.iter()
    }

    /// Insert a program, evicting the weakest entries while the corpus is
    /// over its bound. Returns the ids of evicted entries, which may include
    /// the new program itself.
    ///
    /// Adding a program that is already present rescores it instead.
    pub fn add(
        &mut self,
        program: Arc<Program>,
        coverage: CoverageSignature,
        score: f64,
    ) -> Vec<ProgramId> {
        let id = program.id();
        if let Some(&i) = self.index.get(&id) {
            let entry = &mut self.entries[i];
            entry.score = entry.score.max(score);
            entry.coverage = entry.coverage.merge(&coverage);
            return Vec::new();
        }

        self.index.insert(id, self.entries.len());
        self.entries.push(CorpusEntry {
            program,
            coverage,
            score,
            discovered_at: Utc::now(),
            stale: 0,
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;

        let mut evicted = Vec::new();
        while self.entries.len() > self.config.max_size {
            match self.evict() {
                Some(id) => evicted.push(id),
                None => break,
            }
        }
        evicted
    }

    fn evict(&mut self) -> Option<ProgramId> {
        let (victim, _) = self
            .entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.eviction_order(b))?;
        let entry = self.entries.swap_remove(victim);
        self.index.remove(&entry.id());
        if let Some(moved) = self.entries.get(victim) {
            self.index.insert(moved.id(), victim);
        }
        debug!(program = %entry.id(), score = entry.score, "evicted corpus entry");
        Some(entry.id())
    }

    /// Weighted random choice of a mutation base, `None` when empty
    pub fn sample(&self, rng: &mut ChaCha8Rng) -> Option<Arc<Program>> {
        if self.entries.is_empty() {
            return None;
        }
        let weights: Vec<f64> = self.entries.iter().map(|e| e.weight(&self.config)).collect();
        let chosen = match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            // All weights zero (a zero `min_weight`): fall back to uniform.
            Err(_) => rng.gen_range(0..self.entries.len()),
        };
        Some(self.entries[chosen].program.clone())
    }

    /// Raise the score of `id` and, with halving amounts, of its ancestors
    /// that are still in the corpus.
    pub fn boost(&mut self, id: ProgramId, amount: f64) {
        let mut current = Some(id);
        let mut amount = amount;
        for _ in 0..BOOST_GENERATIONS {
            let Some(&i) = current.and_then(|id| self.index.get(&id)) else {
                break;
            };
            let entry = &mut self.entries[i];
            entry.score += amount;
            entry.stale = 0;
            trace!(program = %entry.id(), score = entry.score, "boosted corpus entry");
            current = entry.program.parent();
            amount /= 2.0;
        }
    }

    /// Note that a sample of `id` produced nothing new
    pub fn mark_unproductive(&mut self, id: ProgramId) {
        if let Some(&i) = self.index.get(&id) {
            self.entries[i].stale = self.entries[i].stale.saturating_add(1);
        }
    }
}

/// A corpus shared between workers.
///
/// Entries are published and rescored under the write lock, so a sampling
/// worker never observes a partially inserted entry.
#[derive(Clone)]
pub struct SharedCorpus {
    inner: Arc<RwLock<Corpus>>,
}

impl SharedCorpus {
    pub fn new(config: CorpusConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Corpus::new(config))),
        }
    }

    pub fn add(&self, program: Arc<Program>, coverage: CoverageSignature, score: f64) -> Vec<ProgramId> {
        self.inner.write().add(program, coverage, score)
    }

    pub fn sample(&self, rng: &mut ChaCha8Rng) -> Option<Arc<Program>> {
        self.inner.read().sample(rng)
    }

    pub fn boost(&self, id: ProgramId, amount: f64) {
        self.inner.write().boost(id, amount)
    }

    pub fn mark_unproductive(&self, id: ProgramId) {
        self.inner.write().mark_unproductive(id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn contains(&self, id: ProgramId) -> bool {
        self.inner.read().contains(id)
    }

    pub fn score_of(&self, id: ProgramId) -> Option<f64> {
        self.inner.read().get(id).map(|e| e.score)
    }

    /// Programs currently retained, highest score first
    pub fn snapshot(&self) -> Vec<Arc<Program>> {
        let corpus = self.inner.read();
        let mut entries: Vec<&CorpusEntry> = corpus.entries().collect();
        entries.sort_by(|a, b| b.eviction_order(a));
        entries.into_iter().map(|e| e.program.clone()).collect()
    }
}

impl DonorPool for SharedCorpus {
    fn random_donor(&self, rng: &mut ChaCha8Rng) -> Option<Arc<Program>> {
        self.sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsf_ir::{generate_program, ProgramBuilder};
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn program(b: &mut ProgramBuilder) -> Arc<Program> {
        b.load_int(1).unwrap();
        Arc::new(b.finalize())
    }

    fn config(max_size: usize) -> CorpusConfig {
        CorpusConfig {
            max_size,
            ..CorpusConfig::default()
        }
    }

    #[test]
    fn test_empty_corpus_has_nothing_to_sample() {
        let corpus = Corpus::new(config(4));
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(corpus.sample(&mut rng).is_none());
        assert!(SharedCorpus::new(config(4)).sample(&mut rng).is_none());
    }

    #[test]
    fn test_eviction_prefers_low_score_then_oldest() {
        let mut b = ProgramBuilder::new();
        let mut corpus = Corpus::new(config(2));
        let old = program(&mut b);
        let young = program(&mut b);
        let best = program(&mut b);

        corpus.add(old.clone(), CoverageSignature::empty(), 1.0);
        corpus.add(young.clone(), CoverageSignature::empty(), 1.0);
        let evicted = corpus.add(best.clone(), CoverageSignature::empty(), 5.0);

        assert_eq!(evicted, vec![old.id()]);
        assert!(corpus.contains(young.id()));
        assert!(corpus.contains(best.id()));

        // A weaker newcomer is evicted right away.
        let weak = program(&mut b);
        assert_eq!(corpus.add(weak.clone(), CoverageSignature::empty(), 0.5), vec![weak.id()]);
        assert_eq!(corpus.len(), 2);
    }

    #[test]
    fn test_index_survives_eviction() {
        let mut b = ProgramBuilder::new();
        let mut corpus = Corpus::new(config(3));
        let programs: Vec<Arc<Program>> = (0..6).map(|_| program(&mut b)).collect();
        for (i, p) in programs.iter().enumerate() {
            corpus.add(p.clone(), CoverageSignature::empty(), i as f64);
        }
        for p in &programs[3..] {
            assert_eq!(corpus.get(p.id()).map(|e| e.id()), Some(p.id()));
        }
    }

    #[test]
    fn test_boost_reaches_ancestors() {
        let mut b = ProgramBuilder::new();
        let mut corpus = Corpus::new(config(8));
        let parent = program(&mut b);
        b.set_parent(parent.id());
        let child = program(&mut b);

        corpus.add(parent.clone(), CoverageSignature::empty(), 1.0);
        corpus.add(child.clone(), CoverageSignature::empty(), 1.0);
        corpus.mark_unproductive(parent.id());
        corpus.boost(child.id(), 2.0);

        assert_eq!(corpus.get(child.id()).map(|e| e.score), Some(3.0));
        assert_eq!(corpus.get(parent.id()).map(|e| e.score), Some(2.0));
        assert_eq!(corpus.get(parent.id()).map(|e| e.stale), Some(0));
    }

    #[test]
    fn test_sampling_favours_productive_entries() {
        let mut b = ProgramBuilder::new();
        let mut corpus = Corpus::new(CorpusConfig {
            max_size: 8,
            min_weight: 0.01,
            ..CorpusConfig::default()
        });
        let strong = program(&mut b);
        let weak = program(&mut b);
        corpus.add(strong.clone(), CoverageSignature::empty(), 10.0);
        corpus.add(weak.clone(), CoverageSignature::empty(), 0.1);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let hits = (0..200)
            .filter(|_| corpus.sample(&mut rng).map(|p| p.id()) == Some(strong.id()))
            .count();
        assert!(hits > 150);
    }

    #[test]
    fn test_readding_rescores() {
        let mut b = ProgramBuilder::new();
        let mut corpus = Corpus::new(config(4));
        let p = program(&mut b);
        corpus.add(p.clone(), CoverageSignature::from_edges([1]), 1.0);
        corpus.add(p.clone(), CoverageSignature::from_edges([2]), 3.0);
        assert_eq!(corpus.len(), 1);
        let entry = corpus.get(p.id()).unwrap();
        assert_eq!(entry.score, 3.0);
        assert_eq!(entry.coverage.edges(), &[1, 2]);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 32,
            ..ProptestConfig::default()
        })]

        #[test]
        fn prop_corpus_is_bounded(
            max_size in 1usize..8,
            scores in prop::collection::vec(0.0f64..10.0, 0..40),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(max_size as u64);
            let mut b = ProgramBuilder::new();
            let mut corpus = Corpus::new(config(max_size));
            for score in scores {
                let p = Arc::new(generate_program(&mut b, &mut rng, 5, 1));
                corpus.add(p, CoverageSignature::empty(), score);
                prop_assert!(corpus.len() <= max_size);
                prop_assert_eq!(corpus.index.len(), corpus.len());
            }
        }
    }
}
