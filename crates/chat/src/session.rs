//! Per-stream bookkeeping owned by the dispatcher.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::stream_event::StreamId;

/// `Created -> Streaming -> {Done | Errored}`. Terminal states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    Created,
    Streaming,
    Done,
    Errored,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Errored)
    }
}

/// Finished sessions kept for inspection.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

/// The current-id pointer plus the state of recent sessions.
///
/// Not synchronised itself; the dispatcher keeps it behind one lock so that
/// issuing an id and making it current is a single step.
#[derive(Debug)]
pub struct SessionRegistry {
    current: Option<StreamId>,
    states: HashMap<StreamId, StreamState>,
    order: VecDeque<StreamId>,
    last_answer: Option<String>,
    history_limit: usize,
}

impl SessionRegistry {
    pub fn new(history_limit: usize) -> Self {
        Self {
            current: None,
            states: HashMap::new(),
            order: VecDeque::new(),
            last_answer: None,
            history_limit: history_limit.max(1),
        }
    }

    /// Issue a fresh id and make it current, superseding the previous one.
    pub fn begin(&mut self) -> StreamId {
        let id = StreamId::new();
        self.current = Some(id);
        self.states.insert(id, StreamState::Created);
        self.order.push_back(id);
        self.prune();
        id
    }

    /// `Created -> Streaming`. False once the session has terminated.
    pub fn mark_streaming(&mut self, id: StreamId) -> bool {
        match self.states.get_mut(&id) {
            Some(state) if !state.is_terminal() => {
                *state = StreamState::Streaming;
                true
            }
            _ => false,
        }
    }

    /// Terminal transition. Returns `false` if the session already ended, in
    /// which case nothing changes and no terminal event may be emitted.
    ///
    /// A successful answer becomes `last_answer` only while its stream is
    /// still current.
    pub fn finish(&mut self, id: StreamId, outcome: Result<&str, ()>) -> bool {
        let Some(state) = self.states.get_mut(&id) else {
            return false;
        };
        if state.is_terminal() {
            return false;
        }

        match outcome {
            Ok(text) => {
                *state = StreamState::Done;
                if self.current == Some(id) {
                    self.last_answer = Some(text.to_string());
                }
            }
            Err(()) => *state = StreamState::Errored,
        }
        self.prune();
        true
    }

    pub fn current(&self) -> Option<StreamId> {
        self.current
    }

    pub fn is_current(&self, id: StreamId) -> bool {
        self.current == Some(id)
    }

    pub fn state(&self, id: StreamId) -> Option<StreamState> {
        self.states.get(&id).copied()
    }

    pub fn last_answer(&self) -> Option<&str> {
        self.last_answer.as_deref()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Drop the oldest finished sessions beyond the history limit. Live
    /// sessions are never pruned.
    fn prune(&mut self) {
        while self.states.len() > self.history_limit {
            let Some(pos) = self
                .order
                .iter()
                .position(|id| self.states.get(id).is_some_and(|s| s.is_terminal()))
            else {
                break;
            };
            if let Some(id) = self.order.remove(pos) {
                self.states.remove(&id);
            }
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
