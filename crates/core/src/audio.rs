//! Audio context slot: the single most recent transcript.
//!
//! Each completed audio segment overwrites the slot; nothing is merged.
//! Cloning the slot shares the same underlying value.

use std::sync::{Arc, RwLock};

/// Shared holder for the latest audio transcript.
#[derive(Debug, Clone, Default)]
pub struct AudioContextSlot {
    inner: Arc<RwLock<String>>,
}

impl AudioContextSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored transcript.
    pub fn set(&self, transcript: impl Into<String>) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = transcript.into();
    }

    /// Snapshot of the stored transcript (empty when nothing was heard yet).
    pub fn get(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear(&self) {
        self.set(String::new());
    }
}
