//! The per-worker fuzzing loop.

use crate::corpus::SharedCorpus;
use crate::evaluator::CoverageEvaluator;
use crate::scheduler::MutatorScheduler;
use crate::seeds;
use jsf_core::{Error, FuzzerConfig, ProgramId, Result, WorkerId};
use jsf_ir::{default_mutators, generate_program, Program, ProgramBuilder};
use jsf_runtime::{Outcome, Runtime};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, event, info, instrument, warn, Level};

/// A worker gives up after this many execution errors in a row.
const MAX_CONSECUTIVE_ERRORS: u32 = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub iterations: u64,
    pub executions: u64,
    pub crashes: u64,
    pub unique_crashes: u64,
    pub timeouts: u64,
    /// Programs that found new coverage and entered the corpus
    pub interesting: u64,
    /// Programs generated from scratch instead of mutated
    pub generated: u64,
    pub errors: u64,
}

impl WorkerStats {
    /// Add the counters of another worker
    pub fn merge(&mut self, other: &WorkerStats) {
        self.iterations += other.iterations;
        self.executions += other.executions;
        self.crashes += other.crashes;
        self.unique_crashes += other.unique_crashes;
        self.timeouts += other.timeouts;
        self.interesting += other.interesting;
        self.generated += other.generated;
        self.errors += other.errors;
    }
}

/// Where a candidate came from
struct Candidate {
    program: Program,
    base: Option<ProgramId>,
    mutator: Option<usize>,
}

/// One fuzzing worker with its own builder, mutators and random source.
///
/// Workers share only the corpus and the coverage evaluator.
pub struct Worker {
    id: WorkerId,
    config: FuzzerConfig,
    corpus: SharedCorpus,
    evaluator: Arc<CoverageEvaluator>,
    runtime: Runtime,
    scheduler: MutatorScheduler,
    builder: ProgramBuilder,
    rng: ChaCha8Rng,
    stats: WorkerStats,
    consecutive_errors: u32,
}

impl Worker {
    pub fn new(
        id: WorkerId,
        config: FuzzerConfig,
        corpus: SharedCorpus,
        evaluator: Arc<CoverageEvaluator>,
        runtime: Runtime,
    ) -> Result<Self> {
        let scheduler = MutatorScheduler::new(default_mutators(&config.mutation))?;
        let rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(id.0 as u64));
        Ok(Self {
            id,
            config,
            corpus,
            evaluator,
            runtime,
            scheduler,
            builder: ProgramBuilder::new(),
            rng,
            stats: WorkerStats::default(),
            consecutive_errors: 0,
        })
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    /// Execute seed programs and keep those that add coverage
    #[instrument(skip(self, seeds), fields(worker = %self.id, seeds = seeds.len()))]
    pub fn import(&mut self, seeds: Vec<Program>) -> Result<usize> {
        let before = self.stats.interesting;
        for program in seeds {
            self.evaluate(Candidate {
                program,
                base: None,
                mutator: None,
            })?;
        }
        let kept = (self.stats.interesting - before) as usize;
        info!(kept, corpus_size = self.corpus.len(), "imported seeds");
        Ok(kept)
    }

    /// Run until the configured iteration count is reached or `stop` is set
    #[instrument(skip(self, stop), fields(worker = %self.id))]
    pub fn run(&mut self, stop: &AtomicBool) -> Result<WorkerStats> {
        info!(iterations = ?self.config.iterations, "worker starting");
        while !stop.load(Ordering::Relaxed) {
            if let Some(limit) = self.config.iterations {
                if self.stats.iterations >= limit {
                    break;
                }
            }
            self.iteration()?;
            if self.config.stats_interval > 0 && self.stats.iterations % self.config.stats_interval == 0 {
                self.emit_stats();
            }
        }
        self.emit_stats();
        info!(iterations = self.stats.iterations, "worker finished");
        Ok(self.stats)
    }

    /// Produce, run and judge one candidate
    pub fn iteration(&mut self) -> Result<()> {
        self.stats.iterations += 1;
        let candidate = self.next_candidate();
        self.evaluate(candidate)
    }

    fn next_candidate(&mut self) -> Candidate {
        let mutation = &self.config.mutation;
        if let Some(base) = self.corpus.sample(&mut self.rng) {
            let mutated = self.scheduler.mutate(
                &base,
                &self.corpus,
                &mut self.builder,
                &mut self.rng,
                mutation.max_attempts,
            );
            match mutated {
                Some((index, program)) => {
                    return Candidate {
                        program,
                        base: Some(base.id()),
                        mutator: Some(index),
                    }
                }
                None => self.corpus.mark_unproductive(base.id()),
            }
        }

        self.stats.generated += 1;
        let program = generate_program(
            &mut self.builder,
            &mut self.rng,
            mutation.seed_program_size,
            mutation.max_generation_depth,
        );
        Candidate {
            program,
            base: None,
            mutator: None,
        }
    }

    fn evaluate(&mut self, candidate: Candidate) -> Result<()> {
        let outcome = match self.runtime.run(&candidate.program) {
            Ok(outcome) => {
                self.consecutive_errors = 0;
                outcome
            }
            Err(e) => {
                self.stats.errors += 1;
                self.consecutive_errors += 1;
                warn!(worker = %self.id, error = %e, "execution failed");
                if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(Error::Execution(format!(
                        "{} consecutive execution failures, last: {}",
                        self.consecutive_errors, e
                    )));
                }
                return Ok(());
            }
        };
        self.stats.executions += 1;

        match &outcome {
            Outcome::Crashed { signal, coverage } => {
                self.stats.crashes += 1;
                if self.evaluator.is_new_crash(*signal, coverage.as_ref()) {
                    self.stats.unique_crashes += 1;
                    self.report_crash(&candidate.program, *signal);
                }
            }
            Outcome::TimedOut => {
                self.stats.timeouts += 1;
                debug!(program = %candidate.program.id(), "execution timed out");
            }
            Outcome::Succeeded { .. } => {}
        }

        let new_edges = outcome
            .coverage()
            .map_or(0, |coverage| self.evaluator.evaluate(coverage));
        if new_edges == 0 {
            if let Some(base) = candidate.base {
                self.corpus.mark_unproductive(base);
            }
            return Ok(());
        }

        self.stats.interesting += 1;
        if let Some(index) = candidate.mutator {
            self.scheduler.record_interesting(index);
        }
        if let Some(base) = candidate.base {
            self.corpus.boost(base, self.config.corpus.ancestor_boost);
        }
        let id = candidate.program.id();
        let coverage = outcome.coverage().cloned().unwrap_or_default();
        let evicted = self
            .corpus
            .add(Arc::new(candidate.program), coverage, new_edges as f64);
        debug!(
            program = %id,
            new_edges,
            evicted = evicted.len(),
            outcome = outcome.label(),
            "added program to corpus"
        );
        event!(
            Level::DEBUG,
            counter_name = "corpus_additions",
            counter_value = 1,
            new_edges = new_edges,
            "Corpus addition"
        );
        Ok(())
    }

    fn report_crash(&self, program: &Program, signal: i32) {
        let lifted = self.runtime.lift(program);
        warn!(
            worker = %self.id,
            program = %program.id(),
            signal,
            instructions = program.len(),
            "target crashed"
        );
        event!(
            Level::INFO,
            counter_name = "unique_crashes",
            counter_value = 1,
            signal = signal,
            "Unique crash"
        );
        if let Some(dir) = &self.config.crash_dir {
            match seeds::store_crash(dir, program, signal, &lifted) {
                Ok(path) => info!(path = %path.display(), "stored crash"),
                Err(e) => warn!(error = %e, "failed to store crash"),
            }
        }
    }

    fn emit_stats(&self) {
        let s = &self.stats;
        info!(
            event = "worker_stats",
            worker = %self.id,
            iterations = s.iterations,
            executions = s.executions,
            crashes = s.crashes,
            unique_crashes = s.unique_crashes,
            timeouts = s.timeouts,
            interesting = s.interesting,
            generated = s.generated,
            errors = s.errors,
            corpus_size = self.corpus.len(),
            total_edges = self.evaluator.total_edges(),
            "Worker statistics"
        );
        for (name, m) in self.scheduler.stats() {
            info!(
                event = "mutator_stats",
                worker = %self.id,
                mutator = name,
                attempts = m.attempts,
                no_opportunity = m.no_opportunity,
                interesting = m.interesting,
                success_rate = format!("{:.3}", m.success_rate()),
                "Mutator statistics"
            );
        }
        event!(
            Level::INFO,
            gauge_name = "corpus_size",
            gauge_value = self.corpus.len(),
            "Corpus size gauge"
        );
        event!(
            Level::INFO,
            gauge_name = "total_edges",
            gauge_value = self.evaluator.total_edges(),
            "Total edges gauge"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsf_core::{CorpusConfig, CoverageSignature};
    use jsf_ir::TextLifter;
    use jsf_runtime::FnExecutor;
    use std::time::Duration;

    /// A target whose coverage is the set of distinct lines it was given
    fn line_coverage_runtime() -> Runtime {
        let executor = FnExecutor::new(|script, _| {
            let edges = script.lines().map(|line| {
                line.bytes().fold(0u32, |h, b| h.wrapping_mul(31).wrapping_add(u32::from(b)))
            });
            Ok(Outcome::Succeeded {
                coverage: CoverageSignature::from_edges(edges),
            })
        });
        Runtime::new(
            Arc::new(executor),
            Arc::new(TextLifter::new().without_comments()),
            Duration::from_millis(10),
        )
    }

    fn worker(config: FuzzerConfig, runtime: Runtime) -> Worker {
        let corpus = SharedCorpus::new(config.corpus.clone());
        Worker::new(WorkerId(0), config, corpus, Arc::new(CoverageEvaluator::new()), runtime).unwrap()
    }

    #[test]
    fn test_run_grows_corpus() {
        let config = FuzzerConfig {
            iterations: Some(50),
            stats_interval: 25,
            corpus: CorpusConfig {
                max_size: 16,
                ..CorpusConfig::default()
            },
            ..FuzzerConfig::default()
        };
        let mut worker = worker(config, line_coverage_runtime());
        let stats = worker.run(&AtomicBool::new(false)).unwrap();

        assert_eq!(stats.iterations, 50);
        assert_eq!(stats.executions, 50);
        assert!(stats.generated >= 1);
        assert!(stats.interesting >= 1);
        assert!(worker.corpus.len() <= 16);
        assert!(!worker.corpus.is_empty());
    }

    #[test]
    fn test_stop_flag_ends_run() {
        let mut worker = worker(FuzzerConfig::default(), line_coverage_runtime());
        let stats = worker.run(&AtomicBool::new(true)).unwrap();
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn test_crashes_are_deduplicated() {
        let executor = FnExecutor::new(|_, _| {
            Ok(Outcome::Crashed {
                signal: 11,
                coverage: None,
            })
        });
        let runtime = Runtime::new(
            Arc::new(executor),
            Arc::new(TextLifter::new()),
            Duration::from_millis(10),
        );
        let mut worker = worker(
            FuzzerConfig {
                iterations: Some(5),
                ..FuzzerConfig::default()
            },
            runtime,
        );
        let stats = worker.run(&AtomicBool::new(false)).unwrap();
        assert_eq!(stats.crashes, 5);
        assert_eq!(stats.unique_crashes, 1);
        assert!(worker.corpus.is_empty());
    }

    #[test]
    fn test_repeated_execution_errors_stop_worker() {
        let executor = FnExecutor::new(|_, _| Err(Error::Execution("target missing".to_string())));
        let runtime = Runtime::new(
            Arc::new(executor),
            Arc::new(TextLifter::new()),
            Duration::from_millis(10),
        );
        let mut worker = worker(FuzzerConfig::default(), runtime);
        assert!(matches!(
            worker.run(&AtomicBool::new(false)),
            Err(Error::Execution(_))
        ));
        assert_eq!(worker.stats().errors, u64::from(MAX_CONSECUTIVE_ERRORS));
    }

    #[test]
    fn test_import_keeps_covering_seeds() {
        let mut worker = worker(FuzzerConfig::default(), line_coverage_runtime());
        let mut b = ProgramBuilder::new();
        b.load_int(1).unwrap();
        let first = b.finalize();
        b.load_int(1).unwrap();
        let duplicate = b.finalize();

        assert_eq!(worker.import(vec![first, duplicate]).unwrap(), 1);
        assert_eq!(worker.corpus.len(), 1);
    }
}
