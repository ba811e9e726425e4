//! sanbashi — a workspace analysis bridge.
//!
//! Clients submit a multi-file, partially editable code workspace and get
//! compile/run/completion results back from a long-lived external worker
//! process. This crate is the bridge in between: it supervises the worker's
//! lifecycle, multiplexes its asynchronous output into correlated
//! request/response pairs, gates callers behind a one-time readiness
//! barrier, extracts directive-marked viewports from submitted source, and
//! bounds every external wait so a hung worker cannot stall a caller.
//!
//! Transport (HTTP routes, DTO schemas), the language front-end proper, and
//! the compiler behind the worker are external collaborators.

pub mod bridge;
pub mod error;
pub mod wait;
pub mod workspace;

pub use bridge::bus::{
    MessageBus, MessageKind, MessageSubscriber, PROJECT_ADDED_EVENT, WorkerMessage,
};
pub use bridge::sequence::SequenceAllocator;
pub use bridge::status::{
    CorrelationId, StatusMessage, StatusNotifier, StatusReceiver, StatusSender, WorkerStatus,
};
pub use bridge::supervisor::{WorkerLaunch, WorkerSupervisor};
pub use bridge::{AnalyzerBridge, DEFAULT_READY_TIMEOUT, DEFAULT_REQUEST_TIMEOUT};
pub use error::{BridgeError, BridgeResult};
pub use workspace::{
    Buffer, BufferId, DirectiveScanner, LineDirectiveScanner, Viewport, Workspace,
    extract_viewports,
};
