//! Executing programs in a child process.

use crate::executor::Executor;
use crate::outcome::{ExecutionStats, Outcome};
use jsf_core::{CoverageSignature, Error, ExecutionConfig, Result};
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Runs the configured target once per program, writing the program to the
/// target's stdin.
///
/// Targets without coverage instrumentation still yield a signature: every
/// distinct line of output and the exit status become one edge each, so new
/// behaviour visible in the output counts as new coverage.
pub struct ProcessExecutor {
    command: Vec<String>,
    max_output_bytes: usize,
    stats: Mutex<ExecutionStats>,
}

impl ProcessExecutor {
    pub fn new(config: &ExecutionConfig) -> Result<Self> {
        if config.target.is_empty() {
            return Err(Error::Config("execution.target is empty".to_string()));
        }
        Ok(Self {
            command: config.target.clone(),
            max_output_bytes: config.max_output_bytes,
            stats: Mutex::new(ExecutionStats::default()),
        })
    }

    pub fn stats(&self) -> ExecutionStats {
        *self.stats.lock()
    }

    fn spawn(&self) -> Result<Child> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| Error::Config("execution.target is empty".to_string()))?;
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // The target leads its own process group so that everything it
        // starts can be killed together.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut command, 0);
        command
            .spawn()
            .map_err(|e| Error::Execution(format!("failed to spawn {}: {}", program, e)))
    }

    /// Wait for `child` until `deadline`, `None` on expiry
    fn wait(child: &mut Child, deadline: Instant) -> Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Collect both output streams, `None` if they are still open at `deadline`
    fn receive_output(
        output: &Receiver<Vec<u8>>,
        streams: usize,
        deadline: Instant,
    ) -> Option<Vec<u8>> {
        let mut collected = Vec::new();
        for _ in 0..streams {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match output.recv_timeout(remaining) {
                Ok(bytes) => collected.extend(bytes),
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Some(collected)
    }
}

impl Executor for ProcessExecutor {
    fn execute(&self, script: &str, timeout: Duration) -> Result<Outcome> {
        let deadline = Instant::now() + timeout;
        let mut child = self.spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            let script = script.to_owned();
            thread::spawn(move || {
                // The target may exit without reading its input.
                if let Err(e) = stdin.write_all(script.as_bytes()) {
                    if e.kind() != ErrorKind::BrokenPipe {
                        debug!(error = %e, "failed to write program to target");
                    }
                }
            });
        }
        let (sender, output) = mpsc::channel();
        let mut streams = 0;
        if let Some(stdout) = child.stdout.take() {
            drain(stdout, self.max_output_bytes, sender.clone());
            streams += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            drain(stderr, self.max_output_bytes, sender);
            streams += 1;
        }

        // Processes started by the target may keep the pipes open after the
        // target itself exits, so output collection shares the deadline.
        let finished = match Self::wait(&mut child, deadline)? {
            Some(status) => {
                Self::receive_output(&output, streams, deadline).map(|out| (status, out))
            }
            None => None,
        };
        // Nothing the target started may outlive the execution. Killing the
        // group also closes the pipes, which ends the I/O threads.
        kill_process_tree(&mut child);
        child.wait()?;

        let outcome = match finished {
            None => Outcome::TimedOut,
            Some((status, output)) => {
                let coverage = output_signature(&output, &status);
                match signal_of(&status) {
                    Some(signal) => Outcome::Crashed {
                        signal,
                        coverage: Some(coverage),
                    },
                    None => Outcome::Succeeded { coverage },
                }
            }
        };
        self.stats.lock().record(&outcome);
        Ok(outcome)
    }
}

#[cfg(unix)]
fn kill_process_tree(child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
        // The whole group has already exited.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => warn!(error = %e, pid = child.id(), "failed to kill target process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_tree(child: &mut Child) {
    if let Err(e) = child.kill() {
        if e.kind() != ErrorKind::InvalidInput {
            warn!(error = %e, "failed to kill target");
        }
    }
}

/// Read everything from `reader` on a separate thread, keeping at most
/// `limit` bytes, and send the result once the stream closes. Reading
/// continues past the limit so the child never blocks on a full pipe.
fn drain<R: Read + Send + 'static>(mut reader: R, limit: usize, done: Sender<Vec<u8>>) {
    thread::spawn(move || {
        let mut kept = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    let room = limit.saturating_sub(kept.len());
                    kept.extend_from_slice(&chunk[..n.min(room)]);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        // The executor stops listening once the deadline has passed.
        let _ = done.send(kept);
    });
}

fn output_signature(output: &[u8], status: &ExitStatus) -> CoverageSignature {
    let lines = output
        .split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(edge_of);
    let exit = edge_of(format!("exit:{:?}", status.code()).as_bytes());
    CoverageSignature::from_edges(lines.chain(std::iter::once(exit)))
}

fn edge_of(bytes: &[u8]) -> u32 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish() as u32
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn shell(script: &str) -> ProcessExecutor {
        ProcessExecutor::new(&ExecutionConfig {
            target: vec!["/bin/sh".to_string(), "-c".to_string(), script.to_string()],
            timeout_ms: 1000,
            max_output_bytes: 1024,
        })
        .unwrap()
    }

    #[test]
    fn test_rejects_empty_target() {
        assert!(matches!(
            ProcessExecutor::new(&ExecutionConfig::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_success_coverage_follows_output() {
        let executor = shell("cat");
        let a = executor.execute("one\ntwo\n", Duration::from_secs(5)).unwrap();
        let b = executor.execute("one\n", Duration::from_secs(5)).unwrap();
        let (a, b) = match (a, b) {
            (Outcome::Succeeded { coverage: a }, Outcome::Succeeded { coverage: b }) => (a, b),
            other => panic!("unexpected outcomes {:?}", other),
        };
        assert_eq!(a.len(), 3);
        assert!(b.is_subset_of(&a));
        assert_eq!(executor.stats().executions, 2);
    }

    #[test]
    fn test_signal_is_a_crash() {
        let executor = shell("kill -SEGV $$");
        match executor.execute("", Duration::from_secs(5)).unwrap() {
            Outcome::Crashed { signal, coverage } => {
                assert_eq!(signal, 11);
                assert!(coverage.is_some());
            }
            other => panic!("expected a crash, got {:?}", other),
        }
        assert_eq!(executor.stats().crashes, 1);
    }

    #[test]
    fn test_timeout_kills_target() {
        let executor = shell("exec sleep 10");
        let start = Instant::now();
        let outcome = executor.execute("", Duration::from_millis(100)).unwrap();
        assert_eq!(outcome, Outcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(executor.stats().timeouts, 1);
    }

    #[test]
    fn test_background_process_holding_output_times_out() {
        let executor = shell("sleep 3 & echo hi");
        let start = Instant::now();
        let outcome = executor.execute("", Duration::from_millis(100)).unwrap();
        assert_eq!(outcome, Outcome::TimedOut);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(executor.stats().timeouts, 1);
    }

    #[test]
    fn test_timeout_kills_processes_started_by_target() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("survived");
        let executor = shell(&format!("(sleep 1; touch {}) & exec sleep 10", marker.display()));

        let outcome = executor.execute("", Duration::from_millis(100)).unwrap();
        assert_eq!(outcome, Outcome::TimedOut);
        thread::sleep(Duration::from_millis(1500));
        assert!(!marker.exists());
    }

    #[test]
    fn test_quick_background_process_still_succeeds() {
        let executor = shell("(echo child) & wait; echo parent");
        match executor.execute("", Duration::from_secs(5)).unwrap() {
            Outcome::Succeeded { coverage } => assert_eq!(coverage.len(), 3),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_output_is_truncated() {
        let executor = ProcessExecutor::new(&ExecutionConfig {
            target: vec!["/bin/sh".into(), "-c".into(), "yes | head -c 100000".into()],
            timeout_ms: 1000,
            max_output_bytes: 8,
        })
        .unwrap();
        match executor.execute("", Duration::from_secs(5)).unwrap() {
            Outcome::Succeeded { coverage } => assert!(coverage.len() <= 2),
            other => panic!("unexpected outcome {:?}", other),
        }
    }
}
