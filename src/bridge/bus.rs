//! Typed message bus over the worker's stdout lines.
//!
//! The worker emits structured, line-delimited JSON messages interleaved
//! with free-form diagnostic text. The bus classifies each line into a
//! typed [`WorkerMessage`] (event or response) and drops everything it
//! cannot decode; it never drops a well-formed message. Subscriptions
//! replay the full history, so attaching after a message was emitted still
//! observes it and correlation does not depend on read order.

use serde_json::Value;

use super::replay::{ReplayChannel, ReplaySubscriber};

/// Event kind the worker emits exactly once after successful startup.
pub const PROJECT_ADDED_EVENT: &str = "ProjectAdded";

/// Classification of a decoded worker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageKind {
    /// An unsolicited event; events carry no sequence number.
    Event { name: String },
    /// A response correlated to an outbound request by sequence number.
    Response { request_seq: u64, command: String },
}

/// One structured message observed on the worker's stdout.
#[derive(Debug, Clone)]
pub struct WorkerMessage {
    pub kind: MessageKind,
    /// The full decoded line; opaque payload to the bridge.
    pub payload: Value,
}

impl WorkerMessage {
    /// Decode one stdout line, or `None` if the line is not a structured
    /// message (free-form diagnostics are expected and dropped silently).
    pub fn decode(line: &str) -> Option<Self> {
        let payload: Value = serde_json::from_str(line).ok()?;
        let kind = match payload.get("type")?.as_str()? {
            "event" => MessageKind::Event {
                name: payload.get("event")?.as_str()?.to_string(),
            },
            "response" => MessageKind::Response {
                request_seq: payload.get("request_seq")?.as_u64()?,
                command: payload
                    .get("command")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
            _ => return None,
        };
        Some(Self { kind, payload })
    }

    /// Whether this is the event named `name`.
    pub fn is_event(&self, name: &str) -> bool {
        matches!(&self.kind, MessageKind::Event { name: event } if event == name)
    }

    /// Whether this is the response for sequence number `seq`.
    pub fn is_response_to(&self, seq: u64) -> bool {
        matches!(&self.kind, MessageKind::Response { request_seq, .. } if *request_seq == seq)
    }
}

/// Broadcast view of the worker's structured output.
///
/// Subscribers are independent: each sees every matching message in
/// emission order, and none consumes messages for another.
pub struct MessageBus {
    lines: ReplayChannel<String>,
}

impl MessageBus {
    pub(crate) fn new(lines: ReplayChannel<String>) -> Self {
        Self { lines }
    }

    /// Attach a subscriber that replays history before observing new
    /// messages.
    pub fn subscribe(&self) -> MessageSubscriber {
        MessageSubscriber {
            lines: self.lines.subscribe(),
        }
    }
}

/// A lazy sequence of decoded messages for one subscriber.
pub struct MessageSubscriber {
    lines: ReplaySubscriber<String>,
}

impl MessageSubscriber {
    /// Receive the next structured message, skipping undecodable lines.
    ///
    /// Returns `None` once the underlying stream ends (worker EOF or
    /// bridge disposal).
    pub async fn recv(&mut self) -> Option<WorkerMessage> {
        loop {
            let line = self.lines.recv().await?;
            match WorkerMessage::decode(&line) {
                Some(message) => return Some(message),
                None => {
                    log::debug!(
                        target: "sanbashi::bus",
                        "dropping unstructured worker output: {}",
                        line
                    );
                }
            }
        }
    }

    /// Receive the first message matching `predicate`.
    pub async fn first_matching(
        &mut self,
        predicate: impl Fn(&WorkerMessage) -> bool,
    ) -> Option<WorkerMessage> {
        while let Some(message) = self.recv().await {
            if predicate(&message) {
                return Some(message);
            }
        }
        None
    }

    /// Receive the first event named `name`.
    pub async fn first_event(&mut self, name: &str) -> Option<WorkerMessage> {
        self.first_matching(|message| message.is_event(name)).await
    }

    /// Receive the response correlated to sequence number `seq`.
    pub async fn first_response(&mut self, seq: u64) -> Option<WorkerMessage> {
        self.first_matching(|message| message.is_response_to(seq))
            .await
    }
}
