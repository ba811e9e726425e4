//! Worker process lifecycle supervision.
//!
//! The supervisor owns the external analysis worker: it spawns it at most
//! once (single-flight), captures its stdout/stderr line streams into
//! replayed channels, exposes a write-only stdin sink, and tears everything
//! down on dispose. No other component may terminate the process.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{BridgeError, BridgeResult};

use super::replay::{ReplayChannel, ReplaySubscriber};
use super::teardown::Teardown;

/// How to invoke the external worker.
#[derive(Debug, Clone)]
pub struct WorkerLaunch {
    pub executable: PathBuf,
    pub working_dir: PathBuf,
    /// Optional plugin path, appended to the command line as `-pl <path>`.
    pub plugin_path: Option<PathBuf>,
}

impl WorkerLaunch {
    pub fn new(executable: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            working_dir: working_dir.into(),
            plugin_path: None,
        }
    }

    pub fn with_plugin_path(mut self, plugin_path: impl Into<PathBuf>) -> Self {
        self.plugin_path = Some(plugin_path.into());
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command.current_dir(&self.working_dir);
        if let Some(plugin_path) = &self.plugin_path {
            command.arg("-pl").arg(plugin_path);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Lifecycle state of the supervised process.
///
/// `NotStarted → Running → (Failed | Disposed)`; `Failed` and `Disposed`
/// are terminal, and `Disposed` is reachable from any state.
enum WorkerState {
    NotStarted,
    Running {
        stdin: Arc<Mutex<ChildStdin>>,
    },
    Failed {
        message: String,
    },
    Disposed,
}

/// Supervises the external worker's process lifecycle.
pub struct WorkerSupervisor {
    launch: WorkerLaunch,
    state: Mutex<WorkerState>,
    stdout: ReplayChannel<String>,
    stderr: ReplayChannel<String>,
    cancel: CancellationToken,
    teardown: Teardown,
}

impl WorkerSupervisor {
    pub fn new(launch: WorkerLaunch) -> Self {
        let stdout = ReplayChannel::new();
        let stderr = ReplayChannel::new();
        let cancel = CancellationToken::new();

        // Dispose order: stop the readers, end both output streams so
        // in-flight waits fail instead of hang, then kill the process
        // (registered at spawn time).
        let teardown = Teardown::new();
        {
            let cancel = cancel.clone();
            teardown.defer(move || cancel.cancel());
        }
        {
            let stdout = stdout.clone();
            teardown.defer(move || stdout.close());
        }
        {
            let stderr = stderr.clone();
            teardown.defer(move || stderr.close());
        }

        Self {
            launch,
            state: Mutex::new(WorkerState::NotStarted),
            stdout,
            stderr,
            cancel,
            teardown,
        }
    }

    /// Start the worker if it is not already running.
    ///
    /// The first caller spawns; concurrent callers queue on the state lock
    /// and observe the same single spawn. A spawn failure is sticky: no
    /// retry is attempted here, subsequent calls keep failing with
    /// [`BridgeError::WorkerSpawnFailed`]. Retry policy belongs to the
    /// caller, with a fresh supervisor.
    pub async fn ensure_started(&self) -> BridgeResult<()> {
        let mut state = self.state.lock().await;
        match &*state {
            WorkerState::Running { .. } => Ok(()),
            WorkerState::Disposed => Err(BridgeError::Disposed),
            WorkerState::Failed { message } => {
                Err(BridgeError::worker_spawn_failed(message.as_str()))
            }
            WorkerState::NotStarted => match self.spawn_worker() {
                Ok(stdin) => {
                    *state = WorkerState::Running { stdin };
                    Ok(())
                }
                Err(error) => {
                    let message = format!(
                        "{}: {}",
                        self.launch.executable.display(),
                        error
                    );
                    log::error!(
                        target: "sanbashi::supervisor",
                        "worker spawn failed: {}",
                        message
                    );
                    *state = WorkerState::Failed {
                        message: message.clone(),
                    };
                    Err(BridgeError::worker_spawn_failed(message))
                }
            },
        }
    }

    fn spawn_worker(&self) -> std::io::Result<Arc<Mutex<ChildStdin>>> {
        let mut child = self.launch.command().spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("worker stderr not captured"))?;

        log::debug!(
            target: "sanbashi::supervisor",
            "spawned worker {} in {}",
            self.launch.executable.display(),
            self.launch.working_dir.display()
        );

        spawn_line_reader(stdout, self.stdout.clone(), self.cancel.clone(), "stdout");
        spawn_line_reader(stderr, self.stderr.clone(), self.cancel.clone(), "stderr");

        self.teardown.defer(move || {
            // InvalidInput here means the process already exited.
            let _ = child.start_kill();
        });

        Ok(Arc::new(Mutex::new(stdin)))
    }

    /// Write one line to the worker's standard input.
    ///
    /// Valid only once the process has started; lines are written whole
    /// under the stdin lock so concurrent requests never interleave bytes.
    pub async fn write_line(&self, line: &str) -> BridgeResult<()> {
        let stdin = {
            let state = self.state.lock().await;
            match &*state {
                WorkerState::Running { stdin } => Arc::clone(stdin),
                WorkerState::Disposed => return Err(BridgeError::Disposed),
                WorkerState::Failed { message } => {
                    return Err(BridgeError::worker_spawn_failed(message.as_str()));
                }
                WorkerState::NotStarted => {
                    return Err(BridgeError::internal("worker has not been started"));
                }
            }
        };

        let mut stdin = stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Subscribe to the worker's stdout lines, with full replay.
    pub(crate) fn subscribe_stdout(&self) -> ReplaySubscriber<String> {
        self.stdout.subscribe()
    }

    /// Subscribe to the worker's stderr lines, with full replay.
    pub(crate) fn subscribe_stderr(&self) -> ReplaySubscriber<String> {
        self.stderr.subscribe()
    }

    pub(crate) fn stdout_channel(&self) -> ReplayChannel<String> {
        self.stdout.clone()
    }

    /// Tear the worker down: stop the reader tasks, end both output
    /// streams, and forcibly terminate the process if it has not exited.
    /// Idempotent and safe to call concurrently with in-flight waits,
    /// which then fail with [`BridgeError::Disposed`].
    pub async fn dispose(&self) {
        {
            let mut state = self.state.lock().await;
            if matches!(&*state, WorkerState::Disposed) {
                return;
            }
            *state = WorkerState::Disposed;
        }
        log::debug!(target: "sanbashi::supervisor", "disposing worker");
        self.teardown.run();
    }

    /// Whether the supervisor has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.teardown.has_run()
    }
}

/// Forward every line of `reader` to `channel` until EOF, read error, or
/// cancellation. The channel is closed when the task ends.
fn spawn_line_reader(
    reader: impl AsyncRead + Unpin + Send + 'static,
    channel: ReplayChannel<String>,
    cancel: CancellationToken,
    stream_name: &'static str,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!(
                        target: "sanbashi::supervisor",
                        "{} reader cancelled",
                        stream_name
                    );
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => channel.publish(line),
                    Ok(None) => {
                        log::debug!(
                            target: "sanbashi::supervisor",
                            "worker {} reached EOF",
                            stream_name
                        );
                        break;
                    }
                    Err(error) => {
                        log::warn!(
                            target: "sanbashi::supervisor",
                            "worker {} read error: {}",
                            stream_name,
                            error
                        );
                        break;
                    }
                }
            }
        }
        channel.close();
    });
}
