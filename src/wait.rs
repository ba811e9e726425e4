//! Bounded waits on arbitrary asynchronous operations.
//!
//! Every externally awaited operation in the bridge (readiness, a single
//! request/response exchange) goes through [`bound`] or [`bound_or`] so a
//! hung or slow worker can never stall a caller indefinitely.
//!
//! # The loser is not cancelled
//!
//! When the deadline wins the race, the operation is *detached*, not
//! cancelled: it keeps running on its own task and its eventual result is
//! discarded. Resource cleanup for an abandoned operation is the
//! operation's own responsibility. Do not "fix" this by aborting the task;
//! observable behavior under load depends on it.

use std::future::Future;
use std::task::Poll;
use std::time::Duration;

use crate::error::{BridgeError, BridgeResult};

/// Race `operation` against `deadline`.
///
/// If the operation completes first its output is returned as-is. If the
/// deadline expires first the call fails with [`BridgeError::WaitTimeout`]
/// and the operation is left running in the background.
///
/// An operation that is already complete at call time is returned
/// immediately without constructing a race at all.
pub async fn bound<F>(operation: F, deadline: Duration) -> BridgeResult<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let mut operation = Box::pin(operation);

    // Short-circuit: a single poll tells us whether the operation already
    // finished. The waker registered here goes stale, which is fine because
    // the spawned task below is polled afresh by the runtime.
    let first = std::future::poll_fn(|cx| Poll::Ready(operation.as_mut().poll(cx))).await;
    if let Poll::Ready(output) = first {
        return Ok(output);
    }

    let handle = tokio::spawn(operation);
    match tokio::time::timeout(deadline, handle).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(join_error)) => {
            if join_error.is_panic() {
                std::panic::resume_unwind(join_error.into_panic());
            }
            // The task is never aborted by this module, so a non-panic join
            // failure can only come from runtime shutdown.
            Err(BridgeError::internal("bounded operation task was cancelled"))
        }
        Err(_elapsed) => {
            log::debug!(
                target: "sanbashi::wait",
                "bounded wait elapsed after {:?}; operation left running",
                deadline
            );
            Err(BridgeError::wait_timeout(deadline))
        }
    }
}

/// Like [`bound`], but on timeout the value computed by `on_timeout` is
/// returned instead of an error.
pub async fn bound_or<F>(
    operation: F,
    deadline: Duration,
    on_timeout: impl FnOnce() -> F::Output,
) -> BridgeResult<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match bound(operation, deadline).await {
        Err(BridgeError::WaitTimeout { .. }) => Ok(on_timeout()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Instant;

    #[tokio::test]
    async fn completed_operation_short_circuits() {
        let started = Instant::now();
        let value = bound(async { 42 }, Duration::from_secs(30))
            .await
            .expect("ready operation should succeed");
        assert_eq!(value, 42);
        // No race is constructed, so even a generous bound adds no delay.
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn slow_operation_times_out() {
        let result = bound(
            tokio::time::sleep(Duration::from_secs(60)),
            Duration::from_millis(50),
        )
        .await;
        assert!(matches!(result, Err(BridgeError::WaitTimeout { .. })));
    }

    #[tokio::test]
    async fn losing_operation_keeps_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let result = bound(
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                flag.store(true, Ordering::SeqCst);
            },
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(BridgeError::WaitTimeout { .. })));
        assert!(!finished.load(Ordering::SeqCst));

        // The detached operation completes on its own schedule.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn recovery_value_replaces_timeout() {
        let value = bound_or(
            async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                1
            },
            Duration::from_millis(20),
            || -1,
        )
        .await
        .expect("recovery should produce a value");
        assert_eq!(value, -1);
    }

    #[tokio::test]
    async fn recovery_not_used_when_operation_wins() {
        let value = bound_or(async { 7 }, Duration::from_secs(30), || -1)
            .await
            .expect("operation should win");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn timeout_is_reported_within_a_bounded_margin() {
        let started = Instant::now();
        let _ = bound(
            tokio::time::sleep(Duration::from_secs(60)),
            Duration::from_millis(100),
        )
        .await;
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100));
        assert!(elapsed < Duration::from_secs(5), "timed out after {elapsed:?}");
    }
}
