//! Fuzzing engine: corpus, coverage feedback, mutator scheduling and the
//! worker loop that ties them to an execution runtime.

pub mod corpus;
pub mod evaluator;
pub mod fuzzer;
pub mod scheduler;
pub mod seeds;

pub use corpus::{Corpus, CorpusEntry, SharedCorpus};
pub use evaluator::CoverageEvaluator;
pub use fuzzer::{Worker, WorkerStats};
pub use scheduler::{MutatorScheduler, MutatorStats};
pub use seeds::{load_seed_dir, read_program, store_crash, write_program};
