//! The memory store: a bounded, ordered log of recent activity.
//!
//! Mutations (`add_observation`, `clear`, `consolidate_now`) are serialized
//! through a FIFO write gate held across every collaborator call, so each
//! assessment or consolidation prompt corresponds to exactly the snapshot it
//! was built from. The new sequence is published in one swap at the end of a
//! mutation; readers only ever see complete, in-bounds states.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use glimpse_core::audio::AudioContextSlot;
use glimpse_core::event::{DomainEvent, EventBus};
use glimpse_core::generation::TextGenerator;
use glimpse_core::memory::MemoryEntry;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::consolidator::{ConsolidationPath, Consolidator};
use crate::importance::{ImportanceAssessor, DEFAULT_IMPORTANCE};
use crate::similarity::similarity;

/// Tunables for deduplication, capacity and context rendering.
#[derive(Debug, Clone)]
pub struct MemoryPolicy {
    pub max_entries: usize,
    pub recent_window: usize,
    pub similarity_threshold: f64,
    pub default_importance: u8,
    pub summary_importance: u8,
    pub render_limit: usize,
    pub render_min_importance: u8,
    pub render_recent: chrono::Duration,
    pub assess_timeout: std::time::Duration,
    pub consolidate_timeout: std::time::Duration,
}

impl Default for MemoryPolicy {
    fn default() -> Self {
        Self {
            max_entries: 50,
            recent_window: 5,
            similarity_threshold: 0.8,
            default_importance: DEFAULT_IMPORTANCE,
            summary_importance: crate::consolidator::SUMMARY_IMPORTANCE,
            render_limit: 10,
            render_min_importance: 6,
            render_recent: chrono::Duration::minutes(5),
            assess_timeout: std::time::Duration::from_secs(30),
            consolidate_timeout: std::time::Duration::from_secs(60),
        }
    }
}

/// What `add_observation` did with its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Nothing but whitespace
    Empty,
    /// Too similar to one of the most recent entries
    Duplicate,
    /// Appended; `consolidated` is set when the insert pushed the store over capacity
    Stored {
        importance: u8,
        consolidated: Option<ConsolidationPath>,
    },
}

pub struct MemoryStore {
    entries: RwLock<Arc<Vec<MemoryEntry>>>,
    write_gate: Mutex<()>,
    assessor: ImportanceAssessor,
    consolidator: Consolidator,
    policy: MemoryPolicy,
    audio_context: Option<AudioContextSlot>,
    event_bus: Option<Arc<EventBus>>,
}

impl MemoryStore {
    /// Create an empty store whose assessor and consolidator share `generator`.
    pub fn new(generator: Arc<dyn TextGenerator>, policy: MemoryPolicy) -> Self {
        let assessor = ImportanceAssessor::new(generator.clone())
            .with_timeout(policy.assess_timeout)
            .with_default(policy.default_importance);
        let consolidator = Consolidator::new(generator, policy.max_entries)
            .with_summary_importance(policy.summary_importance)
            .with_timeout(policy.consolidate_timeout);

        Self {
            entries: RwLock::new(Arc::new(Vec::new())),
            write_gate: Mutex::new(()),
            assessor,
            consolidator,
            policy,
            audio_context: None,
            event_bus: None,
        }
    }

    /// Read the latest audio transcript into consolidation prompts.
    pub fn with_audio_context(mut self, slot: AudioContextSlot) -> Self {
        self.audio_context = Some(slot);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn policy(&self) -> &MemoryPolicy {
        &self.policy
    }

    /// Offer an observation. Never fails: collaborator errors degrade to
    /// default importance or fallback consolidation.
    pub async fn add_observation(&self, content: &str) -> AddOutcome {
        let content = content.trim();
        if content.is_empty() {
            self.publish_dropped("empty");
            return AddOutcome::Empty;
        }

        let _gate = self.write_gate.lock().await;
        let current = self.snapshot().await;

        let recent_start = current.len().saturating_sub(self.policy.recent_window);
        if current[recent_start..]
            .iter()
            .any(|e| similarity(e.content(), content) > self.policy.similarity_threshold)
        {
            debug!("Dropping near-duplicate observation");
            self.publish_dropped("duplicate");
            return AddOutcome::Duplicate;
        }

        let importance = self.assessor.assess(content).await;

        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(MemoryEntry::new(content, importance as i64));

        let consolidated = if next.len() > self.policy.max_entries {
            let (entries, path) = self.run_consolidation(&next).await;
            next = entries;
            Some(path)
        } else {
            None
        };

        let len = next.len();
        *self.entries.write().await = Arc::new(next);
        debug!(importance, entries = len, "Stored observation");

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ObservationStored {
                importance,
                entries: len,
                timestamp: Utc::now(),
            });
        }

        AddOutcome::Stored {
            importance,
            consolidated,
        }
    }

    /// Consolidate immediately, regardless of capacity. `None` on an empty store.
    pub async fn consolidate_now(&self) -> Option<ConsolidationPath> {
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot().await;
        if current.is_empty() {
            return None;
        }

        let (entries, path) = self.run_consolidation(&current).await;
        *self.entries.write().await = Arc::new(entries);
        Some(path)
    }

    /// Drop every entry. Idempotent.
    pub async fn clear(&self) {
        let _gate = self.write_gate.lock().await;
        *self.entries.write().await = Arc::new(Vec::new());
        info!("Memory cleared");

        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::MemoryCleared {
                timestamp: Utc::now(),
            });
        }
    }

    /// Raw entries, oldest first.
    pub async fn entries(&self) -> Vec<MemoryEntry> {
        self.snapshot().await.as_ref().clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Context for a chat prompt, rendered against the current time.
    pub async fn render_context(&self) -> String {
        self.render_context_at(Utc::now()).await
    }

    /// Entries that are important enough or recent enough, newest
    /// `render_limit` of them, as `"[time] content"` lines oldest first.
    pub async fn render_context_at(&self, now: DateTime<Utc>) -> String {
        let entries = self.snapshot().await;
        let recent_cutoff = now - self.policy.render_recent;

        let selected: Vec<&MemoryEntry> = entries
            .iter()
            .filter(|e| {
                e.importance() >= self.policy.render_min_importance
                    || e.created_at() >= recent_cutoff
            })
            .collect();
        let skip = selected.len().saturating_sub(self.policy.render_limit);

        selected[skip..]
            .iter()
            .map(|e| e.render_line())
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn snapshot(&self) -> Arc<Vec<MemoryEntry>> {
        self.entries.read().await.clone()
    }

    async fn run_consolidation(
        &self,
        entries: &[MemoryEntry],
    ) -> (Vec<MemoryEntry>, ConsolidationPath) {
        let audio = self
            .audio_context
            .as_ref()
            .map(AudioContextSlot::get)
            .unwrap_or_default();
        let result = self.consolidator.consolidate(entries, &audio).await;

        // The summary path may legitimately keep more than the cap only if the
        // generator misbehaves; enforce the bound locally in that case.
        let (entries_after, path) = if result.entries.len() > self.policy.max_entries {
            (self.consolidator.fallback(&result.entries).entries, ConsolidationPath::Fallback)
        } else {
            (result.entries, result.path)
        };

        info!(
            before = entries.len(),
            after = entries_after.len(),
            fallback = path == ConsolidationPath::Fallback,
            "Memory consolidated"
        );
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::MemoryConsolidated {
                before: entries.len(),
                after: entries_after.len(),
                fallback: path == ConsolidationPath::Fallback,
                timestamp: Utc::now(),
            });
        }

        (entries_after, path)
    }

    fn publish_dropped(&self, reason: &str) {
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::ObservationDropped {
                reason: reason.into(),
                timestamp: Utc::now(),
            });
        }
    }
}
