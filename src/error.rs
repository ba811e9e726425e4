//! Error handling types for the workspace analysis bridge.
//!
//! This module provides the error taxonomy used throughout the crate.
//! Every failure is surfaced to the immediate caller; nothing is swallowed
//! at the bridge boundary.

use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// Comprehensive error type for bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Two extracted regions share a label; extraction aborts as a whole
    #[error("duplicate region label: {label}")]
    DuplicateRegionLabel { label: String },

    /// The worker process could not be spawned; no internal retry is attempted
    #[error("failed to spawn worker process: {message}")]
    WorkerSpawnFailed { message: String },

    /// The worker never emitted its readiness event within the deadline
    #[error("worker did not become ready within {waited:?}")]
    ReadinessTimeout { waited: Duration },

    /// A bounded wait elapsed before the awaited operation completed
    #[error("operation did not complete within {waited:?}")]
    WaitTimeout { waited: Duration },

    /// Operation attempted after the bridge or supervisor was disposed
    #[error("bridge has been disposed")]
    Disposed,

    /// IO error talking to the worker process
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Helper trait to recover a guard from a poisoned std mutex
pub trait LockResultExt<T> {
    /// Recover the inner guard from a PoisonError with logging.
    ///
    /// The context parameter identifies which operation triggered lock
    /// recovery, helping developers debug thread safety issues.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "sanbashi::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

/// Helper functions for common error patterns
impl BridgeError {
    /// Create a duplicate region label error
    pub fn duplicate_region_label(label: impl Into<String>) -> Self {
        BridgeError::DuplicateRegionLabel {
            label: label.into(),
        }
    }

    /// Create a worker spawn failure error
    pub fn worker_spawn_failed(message: impl Into<String>) -> Self {
        BridgeError::WorkerSpawnFailed {
            message: message.into(),
        }
    }

    /// Create a readiness timeout error
    pub fn readiness_timeout(waited: Duration) -> Self {
        BridgeError::ReadinessTimeout { waited }
    }

    /// Create a bounded wait timeout error
    pub fn wait_timeout(waited: Duration) -> Self {
        BridgeError::WaitTimeout { waited }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        BridgeError::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn error_messages_name_the_failure() {
        let err = BridgeError::duplicate_region_label("alpha");
        assert_eq!(err.to_string(), "duplicate region label: alpha");

        let err = BridgeError::readiness_timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));

        let err = BridgeError::Disposed;
        assert_eq!(err.to_string(), "bridge has been disposed");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: BridgeError = io.into();
        assert!(matches!(err, BridgeError::Io(_)));
    }

    #[test]
    fn recover_poison_returns_inner_value() {
        let lock = Mutex::new(7);
        let guard = lock.lock().recover_poison("test");
        assert_eq!(*guard, 7);
    }
}
