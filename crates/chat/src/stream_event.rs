//! Events delivered to chat subscribers.
//!
//! Every event carries the id of the stream it belongs to. One subscription
//! sees the events of every stream; consumers filter by the id they trust.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of one query's response stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamId(Uuid);

impl StreamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `{streamId, text, done, error?}`
///
/// `text` is always the full response so far. A terminal event has
/// `done == true`; a failed stream's terminal event also sets `error` and
/// carries a generic user-facing message instead of model output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub stream_id: StreamId,
    pub text: String,
    pub done: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl StreamEvent {
    pub fn partial(stream_id: StreamId, text: impl Into<String>) -> Self {
        Self {
            stream_id,
            text: text.into(),
            done: false,
            error: false,
        }
    }

    pub fn finished(stream_id: StreamId, text: impl Into<String>) -> Self {
        Self {
            stream_id,
            text: text.into(),
            done: true,
            error: false,
        }
    }

    pub fn failed(stream_id: StreamId, message: impl Into<String>) -> Self {
        Self {
            stream_id,
            text: message.into(),
            done: true,
            error: true,
        }
    }
}
