//! Operation instrumentation.
//!
//! The coordinator invokes a [`CacheObserver`] at the start and end of
//! every public operation, with the outcome and duration. Observers are
//! handed in at construction and live exactly as long as the cache
//! instance; nothing here installs process-wide state.

use std::fmt;
use std::time::Duration;

use log::{error, info};

/// A public cache operation, for observer callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOp {
    EnsureCached,
    Materialize,
    Enumerate,
    Evict,
}

impl CacheOp {
    /// Stable uppercase name for audit lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheOp::EnsureCached => "ENSURE_CACHED",
            CacheOp::Materialize => "MATERIALIZE",
            CacheOp::Enumerate => "ENUMERATE",
            CacheOp::Evict => "EVICT",
        }
    }
}

impl fmt::Display for CacheOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an observed operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    Failure,
}

/// Callback interface invoked around every public cache operation.
///
/// Both hooks default to no-ops, so observers implement only what they
/// need.
pub trait CacheObserver: Send + Sync {
    /// Called before the operation runs. `subject` is the model
    /// identifier, or the source name for enumeration.
    fn operation_started(&self, op: CacheOp, subject: &str) {
        let _ = (op, subject);
    }

    /// Called after the operation finished, either way.
    fn operation_finished(
        &self,
        op: CacheOp,
        subject: &str,
        outcome: OperationOutcome,
        elapsed: Duration,
    ) {
        let _ = (op, subject, outcome, elapsed);
    }
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl CacheObserver for NoopObserver {}

/// Observer that writes one audit line per operation through the `log`
/// facade: `OPERATION - subject - SUCCESS|FAILED - 1.23s`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl CacheObserver for LogObserver {
    fn operation_finished(
        &self,
        op: CacheOp,
        subject: &str,
        outcome: OperationOutcome,
        elapsed: Duration,
    ) {
        match outcome {
            OperationOutcome::Success => {
                info!("{op} - {subject} - SUCCESS - {:.2}s", elapsed.as_secs_f64());
            }
            OperationOutcome::Failure => {
                error!("{op} - {subject} - FAILED - {:.2}s", elapsed.as_secs_f64());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_names() {
        assert_eq!(CacheOp::EnsureCached.as_str(), "ENSURE_CACHED");
        assert_eq!(CacheOp::Evict.to_string(), "EVICT");
    }

    #[test]
    fn test_noop_observer_is_callable() {
        let observer = NoopObserver;
        observer.operation_started(CacheOp::Materialize, "org/model");
        observer.operation_finished(
            CacheOp::Materialize,
            "org/model",
            OperationOutcome::Success,
            Duration::from_millis(5),
        );
    }
}
