//! Busy/idle status signals bracketing inbound request processing.
//!
//! Observers of the outbound status channel must see `busy` before any
//! processing of a request and `idle` after it completes, success or
//! failure, so no request ever appears stuck busy. The [`BusyGuard`] scope
//! makes the idle emission automatic on every exit path.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Correlation header of an inbound request, opaque to the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(pub String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Processing phase reported for a correlated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Busy,
    Idle,
}

/// One status signal on the outbound channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub header: CorrelationId,
    pub status: WorkerStatus,
}

/// Outbound channel endpoint handed to the transport layer.
pub type StatusReceiver = mpsc::UnboundedReceiver<StatusMessage>;

/// Factory for per-request status notifiers sharing one outbound channel.
#[derive(Clone)]
pub struct StatusSender {
    tx: mpsc::UnboundedSender<StatusMessage>,
}

impl StatusSender {
    /// Create the outbound channel and its sending half.
    pub fn channel() -> (Self, StatusReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Bind a notifier to one inbound request's correlation header.
    pub fn for_request(&self, header: CorrelationId) -> StatusNotifier {
        StatusNotifier {
            header,
            tx: self.tx.clone(),
        }
    }
}

/// Emits busy/idle signals addressed to one correlation header.
#[derive(Clone)]
pub struct StatusNotifier {
    header: CorrelationId,
    tx: mpsc::UnboundedSender<StatusMessage>,
}

impl StatusNotifier {
    /// Signal that processing of the request has begun.
    pub fn mark_busy(&self) {
        self.send(WorkerStatus::Busy);
    }

    /// Signal that processing of the request has finished.
    pub fn mark_idle(&self) {
        self.send(WorkerStatus::Idle);
    }

    /// Emit `busy` now and `idle` when the returned guard is dropped,
    /// whichever way the bracketed work exits.
    pub fn busy_scope(&self) -> BusyGuard {
        self.mark_busy();
        BusyGuard {
            notifier: self.clone(),
        }
    }

    fn send(&self, status: WorkerStatus) {
        let message = StatusMessage {
            header: self.header.clone(),
            status,
        };
        // A closed channel means the observer went away; the signal has no
        // recipient and is dropped.
        if self.tx.send(message).is_err() {
            log::debug!(
                target: "sanbashi::status",
                "status channel closed; {:?} for {:?} not delivered",
                status,
                self.header
            );
        }
    }
}

/// RAII scope that guarantees an idle signal follows the busy signal.
pub struct BusyGuard {
    notifier: StatusNotifier,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.notifier.mark_idle();
    }
}
