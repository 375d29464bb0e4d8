//! Domain event system: decoupled communication between components.
//!
//! Events are published when something interesting happens in the memory
//! lifecycle or the chat dispatcher. Subscribers observe without coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// An observation was accepted into the memory store
    ObservationStored {
        importance: u8,
        entries: usize,
        timestamp: DateTime<Utc>,
    },

    /// An observation was rejected before insertion
    ObservationDropped {
        reason: String, // "empty", "duplicate"
        timestamp: DateTime<Utc>,
    },

    /// The store was collapsed by the consolidator
    MemoryConsolidated {
        before: usize,
        after: usize,
        fallback: bool,
        timestamp: DateTime<Utc>,
    },

    /// The store was explicitly cleared
    MemoryCleared { timestamp: DateTime<Utc> },

    /// A producer tick yielded no observation
    CaptureSkipped {
        source: String, // "screen", "audio"
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A chat query was accepted
    QuerySubmitted {
        stream_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A chat stream reached its terminal state
    StreamFinished {
        stream_id: String,
        errored: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
