//! The workspace analysis bridge facade.
//!
//! [`AnalyzerBridge`] ties the pieces together: it owns the worker process
//! supervisor, the typed message bus over its output, the sequence
//! allocator for outbound requests, and the one-time readiness gate that
//! callers must pass before work is accepted.

pub mod bus;
pub mod sequence;
pub mod status;
pub mod supervisor;

mod replay;
mod teardown;

use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::{BridgeError, BridgeResult, LockResultExt};
use crate::wait;
use crate::workspace::{DirectiveScanner, LineDirectiveScanner, Workspace};

use bus::{MessageBus, PROJECT_ADDED_EVENT, WorkerMessage};
use sequence::SequenceAllocator;
use supervisor::{WorkerLaunch, WorkerSupervisor};

/// Default deadline for the readiness wait.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for a single request/response exchange.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a past readiness attempt failed. The gate does not self-heal; the
/// recorded failure is replayed to every later caller.
enum ReadinessFailure {
    TimedOut(Duration),
    StreamEnded,
}

/// A bridge instance around one worker process.
///
/// Multiple logical requests may be in flight concurrently; correlation is
/// by sequence number, not read order, so the worker may answer out of
/// submission order or interleave diagnostics freely.
pub struct AnalyzerBridge {
    supervisor: Arc<WorkerSupervisor>,
    bus: MessageBus,
    sequence: SequenceAllocator,
    scanner: Arc<dyn DirectiveScanner>,
    ready: AtomicBool,
    ready_gate: Mutex<()>,
    ready_failure: StdMutex<Option<ReadinessFailure>>,
}

impl AnalyzerBridge {
    pub fn new(launch: WorkerLaunch) -> Self {
        let supervisor = Arc::new(WorkerSupervisor::new(launch));
        let bus = MessageBus::new(supervisor.stdout_channel());
        Self {
            supervisor,
            bus,
            sequence: SequenceAllocator::new(),
            scanner: Arc::new(LineDirectiveScanner),
            ready: AtomicBool::new(false),
            ready_gate: Mutex::new(()),
            ready_failure: StdMutex::new(None),
        }
    }

    /// Replace the directive scanner used for viewport extraction.
    pub fn with_scanner(mut self, scanner: Arc<dyn DirectiveScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    /// Forward worker output to the log: stdout at debug level, stderr at
    /// error level. Must be called within a tokio runtime. The forwarding
    /// tasks end on their own when the bridge is disposed.
    pub fn with_output_logging(self) -> Self {
        let mut stdout = self.supervisor.subscribe_stdout();
        tokio::spawn(async move {
            while let Some(line) = stdout.recv().await {
                log::debug!(target: "sanbashi::worker", "{}", line);
            }
        });
        let mut stderr = self.supervisor.subscribe_stderr();
        tokio::spawn(async move {
            while let Some(line) = stderr.recv().await {
                log::error!(target: "sanbashi::worker", "{}", line);
            }
        });
        self
    }

    /// The typed view of the worker's output.
    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// The supervised worker process.
    pub fn supervisor(&self) -> &Arc<WorkerSupervisor> {
        &self.supervisor
    }

    /// Whether the readiness gate has been passed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Wait, at most once per bridge instance, for the worker's
    /// "project loaded" event.
    ///
    /// The fast path returns immediately once ready, with no re-check and
    /// no re-wait. Otherwise the first caller starts the worker and waits
    /// for the [`PROJECT_ADDED_EVENT`] under a bounded wait
    /// ([`DEFAULT_READY_TIMEOUT`] when no deadline is given); concurrent
    /// callers queue on the gate and observe the same outcome. A timeout is
    /// sticky: this bridge instance will never become ready, and a fresh
    /// instance is needed to retry.
    pub async fn workspace_ready(&self, deadline: Option<Duration>) -> BridgeResult<()> {
        if self.is_ready() {
            return Ok(());
        }

        let _gate = self.ready_gate.lock().await;
        if self.is_ready() {
            return Ok(());
        }
        if let Some(failure) = &*self.ready_failure.lock().recover_poison("readiness state") {
            return Err(self.readiness_failure_error(failure));
        }

        self.supervisor.ensure_started().await?;

        let deadline = deadline.unwrap_or(DEFAULT_READY_TIMEOUT);
        let mut events = self.bus.subscribe();
        let outcome = wait::bound(
            async move { events.first_event(PROJECT_ADDED_EVENT).await },
            deadline,
        )
        .await;

        match outcome {
            Ok(Some(_)) => {
                log::debug!(target: "sanbashi::bridge", "worker is ready");
                self.ready.store(true, Ordering::Release);
                Ok(())
            }
            Ok(None) => {
                let failure = ReadinessFailure::StreamEnded;
                let error = self.readiness_failure_error(&failure);
                self.record_ready_failure(failure);
                Err(error)
            }
            Err(BridgeError::WaitTimeout { waited }) => {
                log::warn!(
                    target: "sanbashi::bridge",
                    "worker not ready within {:?}",
                    waited
                );
                self.record_ready_failure(ReadinessFailure::TimedOut(waited));
                Err(BridgeError::readiness_timeout(waited))
            }
            Err(other) => Err(other),
        }
    }

    fn record_ready_failure(&self, failure: ReadinessFailure) {
        *self.ready_failure.lock().recover_poison("readiness state") = Some(failure);
    }

    fn readiness_failure_error(&self, failure: &ReadinessFailure) -> BridgeError {
        match failure {
            ReadinessFailure::TimedOut(waited) => BridgeError::readiness_timeout(*waited),
            ReadinessFailure::StreamEnded => {
                if self.supervisor.is_disposed() {
                    BridgeError::Disposed
                } else {
                    BridgeError::internal("worker output ended before the readiness event")
                }
            }
        }
    }

    /// Send one correlated request and await its response.
    ///
    /// Allocates a sequence number, writes a single request line to the
    /// worker's stdin, and awaits the response carrying the same sequence
    /// number on the bus, all bounded by `deadline`
    /// ([`DEFAULT_REQUEST_TIMEOUT`] when none is given). Because the
    /// subscription replays history, a response that races the subscription
    /// is still observed.
    pub async fn send_request(
        &self,
        command: &str,
        arguments: Value,
        deadline: Option<Duration>,
    ) -> BridgeResult<WorkerMessage> {
        self.workspace_ready(None).await?;

        let seq = self.sequence.next();
        let request = serde_json::json!({
            "type": "request",
            "seq": seq,
            "command": command,
            "arguments": arguments,
        });
        let line = serde_json::to_string(&request)
            .map_err(|error| BridgeError::internal(format!("request encoding failed: {error}")))?;

        let mut responses = self.bus.subscribe();
        self.supervisor.write_line(&line).await?;

        let deadline = deadline.unwrap_or(DEFAULT_REQUEST_TIMEOUT);
        let response = wait::bound(
            async move { responses.first_response(seq).await },
            deadline,
        )
        .await?;

        match response {
            Some(message) => Ok(message),
            None if self.supervisor.is_disposed() => Err(BridgeError::Disposed),
            None => Err(BridgeError::internal(
                "worker output ended before the response arrived",
            )),
        }
    }

    /// Submit a workspace for analysis.
    ///
    /// Viewport extraction runs first so a region label collision fails
    /// the request before anything reaches the worker.
    pub async fn submit_workspace(
        &self,
        workspace: &Workspace,
        command: &str,
        deadline: Option<Duration>,
    ) -> BridgeResult<WorkerMessage> {
        workspace.extract_viewports(self.scanner.as_ref())?;
        let arguments = serde_json::to_value(workspace)
            .map_err(|error| BridgeError::internal(format!("workspace encoding failed: {error}")))?;
        self.send_request(command, arguments, deadline).await
    }

    /// Tear down the bridge and its worker. Idempotent; any in-flight wait
    /// fails with [`BridgeError::Disposed`] rather than hanging.
    pub async fn dispose(&self) {
        self.supervisor.dispose().await;
    }
}
