//! Consumer-side view of the one stream it currently trusts.

use crate::stream_event::{StreamEvent, StreamId};

/// Tracks the consumer's active stream id and the text shown for it.
///
/// Events for any other id are ignored, as are events arriving after the
/// active stream's terminal event. Accepted events replace the text.
#[derive(Debug, Default, Clone)]
pub struct ActiveStream {
    active: Option<StreamId>,
    text: String,
    done: bool,
    error: bool,
}

impl ActiveStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `id` from now on and forget what the previous stream showed.
    pub fn track(&mut self, id: StreamId) {
        self.active = Some(id);
        self.text.clear();
        self.done = false;
        self.error = false;
    }

    /// Returns whether the event was accepted.
    pub fn apply(&mut self, event: &StreamEvent) -> bool {
        if self.active != Some(event.stream_id) || self.done {
            return false;
        }
        self.text.clone_from(&event.text);
        self.done = event.done;
        self.error = event.error;
        true
    }

    pub fn active(&self) -> Option<StreamId> {
        self.active
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn is_error(&self) -> bool {
        self.error
    }
}
