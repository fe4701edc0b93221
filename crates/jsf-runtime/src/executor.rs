//! The execution capability.

use crate::outcome::Outcome;
use jsf_core::Result;
use std::sync::Arc;
use std::time::Duration;

/// Runs lifted program text against a target.
///
/// Implementations must return within roughly `timeout`, killing whatever
/// they started if it runs longer.
pub trait Executor: Send + Sync {
    fn execute(&self, script: &str, timeout: Duration) -> Result<Outcome>;
}

type ExecuteFn = dyn Fn(&str, Duration) -> Result<Outcome> + Send + Sync;

/// An executor backed by a closure, for in-process targets and tests
#[derive(Clone)]
pub struct FnExecutor {
    execute: Arc<ExecuteFn>,
}

impl FnExecutor {
    pub fn new(execute: impl Fn(&str, Duration) -> Result<Outcome> + Send + Sync + 'static) -> Self {
        Self {
            execute: Arc::new(execute),
        }
    }
}

impl Executor for FnExecutor {
    fn execute(&self, script: &str, timeout: Duration) -> Result<Outcome> {
        (self.execute)(script, timeout)
    }
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, script: &str, timeout: Duration) -> Result<Outcome> {
        (**self).execute(script, timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsf_core::CoverageSignature;

    #[test]
    fn test_fn_executor() {
        let executor = FnExecutor::new(|script, _| {
            Ok(Outcome::Succeeded {
                coverage: CoverageSignature::from_edges([script.len() as u32]),
            })
        });
        let outcome = executor.execute("abc", Duration::from_millis(10)).unwrap();
        assert_eq!(outcome.coverage().map(|c| c.edges().to_vec()), Some(vec![3]));

        let shared: Arc<dyn Executor> = Arc::new(executor);
        assert!(shared.execute("", Duration::from_millis(10)).is_ok());
    }
}
