//! Command line entry point: loads a configuration, imports seeds and runs
//! fuzzing workers until the iteration limit or a shutdown signal.

mod telemetry;

use anyhow::{bail, Context, Result};
use jsf_core::{FuzzerConfig, WorkerId};
use jsf_engine::{load_seed_dir, CoverageEvaluator, SharedCorpus, Worker, WorkerStats};
use jsf_ir::Program;
use jsf_runtime::Runtime;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => FuzzerConfig::from_json_file(&path)
            .with_context(|| format!("failed to load configuration from {}", path))?,
        None => FuzzerConfig::default(),
    };
    config.validate()?;

    telemetry::init_telemetry(config.log_format)?;
    info!(
        workers = config.workers,
        seed = config.seed,
        target = ?config.execution.target,
        "Starting jsf-fuzzer"
    );
    if config.execution.target.is_empty() {
        bail!("no target command configured");
    }

    let seeds = match &config.seed_dir {
        Some(dir) => load_seed_dir(dir)?,
        None => Vec::new(),
    };
    if let Some(dir) = &config.crash_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create crash directory {}", dir.display()))?;
    }

    let corpus = SharedCorpus::new(config.corpus.clone());
    let evaluator = Arc::new(CoverageEvaluator::new());
    let runtime = Runtime::from_config(&config.execution)?;
    let stop = Arc::new(AtomicBool::new(false));

    let mut handles = Vec::with_capacity(config.workers);
    for (i, seeds) in distribute(seeds, config.workers).into_iter().enumerate() {
        let mut worker = Worker::new(
            WorkerId(i),
            config.clone(),
            corpus.clone(),
            evaluator.clone(),
            runtime.clone(),
        )?;
        let stop = stop.clone();
        handles.push(tokio::task::spawn_blocking(move || -> jsf_core::Result<WorkerStats> {
            worker.import(seeds)?;
            worker.run(&stop)
        }));
    }

    let workers = futures::future::join_all(handles);
    tokio::pin!(workers);
    let results = tokio::select! {
        results = &mut workers => results,
        _ = shutdown_signal() => {
            stop.store(true, Ordering::Relaxed);
            let timeout = tokio::time::sleep(Duration::from_secs(30));
            tokio::pin!(timeout);
            tokio::select! {
                results = &mut workers => results,
                _ = &mut timeout => {
                    warn!("Shutdown timeout reached");
                    return Ok(());
                }
            }
        }
    };

    let mut total = WorkerStats::default();
    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(Ok(stats)) => total.merge(&stats),
            Ok(Err(e)) => error!(worker = i, error = %e, "Worker failed"),
            Err(e) => error!(worker = i, error = %e, "Worker task panicked"),
        }
    }

    record_counter!("iterations", total.iterations);
    record_counter!("unique_crashes", evaluator.unique_crashes());
    record_gauge!("corpus_size", corpus.len());
    record_gauge!("total_edges", evaluator.total_edges());
    info!(summary = %serde_json::to_string(&total)?, "Fuzzing finished");
    Ok(())
}

/// Deal seeds round-robin so every worker imports a share
fn distribute(seeds: Vec<Program>, workers: usize) -> Vec<Vec<Program>> {
    let mut shares: Vec<Vec<Program>> = (0..workers.max(1)).map(|_| Vec::new()).collect();
    let n = shares.len();
    for (i, seed) in seeds.into_iter().enumerate() {
        shares[i % n].push(seed);
    }
    shares
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsf_ir::ProgramBuilder;

    #[test]
    fn test_distribute_round_robin() {
        let mut b = ProgramBuilder::new();
        let seeds: Vec<Program> = (0..5)
            .map(|i| {
                b.load_int(i).unwrap();
                b.finalize()
            })
            .collect();
        let shares = distribute(seeds, 2);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].len(), 3);
        assert_eq!(shares[1].len(), 2);
        assert_eq!(distribute(Vec::new(), 0).len(), 1);
    }
}
