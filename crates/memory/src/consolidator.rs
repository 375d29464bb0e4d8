//! Consolidation: collapsing an over-full store into fewer, higher-value entries.
//!
//! Primary path: the generator summarises a timestamped transcript of every
//! entry into a single entry rated [`SUMMARY_IMPORTANCE`]. Fallback path: keep
//! the top half of the entries by `(importance desc, created_at desc)`. Both
//! paths leave at most `max_entries` entries behind.

use std::sync::Arc;
use std::time::Duration;

use glimpse_core::generation::{ContextBundle, TextGenerator};
use glimpse_core::memory::{clamp_importance, MemoryEntry};
use tracing::{info, warn};

/// Importance of a summary entry produced by the generator.
pub const SUMMARY_IMPORTANCE: u8 = 8;

const CONSOLIDATE_INSTRUCTION: &str = "You maintain a compact memory of a user's computer \
session. Summarise the activity log into one concise paragraph that keeps names, files, \
errors, decisions and open tasks. Reply with the summary only.";

/// Which path produced a consolidation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsolidationPath {
    Summary,
    Fallback,
}

/// Result of one consolidation pass.
#[derive(Debug, Clone)]
pub struct Consolidation {
    pub entries: Vec<MemoryEntry>,
    pub path: ConsolidationPath,
}

/// Merges a bounded collection of entries into a smaller one.
pub struct Consolidator {
    generator: Arc<dyn TextGenerator>,
    max_entries: usize,
    summary_importance: u8,
    timeout: Duration,
}

impl Consolidator {
    pub fn new(generator: Arc<dyn TextGenerator>, max_entries: usize) -> Self {
        Self {
            generator,
            max_entries: max_entries.max(1),
            summary_importance: SUMMARY_IMPORTANCE,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_summary_importance(mut self, importance: u8) -> Self {
        self.summary_importance = clamp_importance(importance as i64);
        self
    }

    /// Bound the summary call. Expiry takes the fallback path.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How many entries the fallback path keeps: `⌈max_entries / 2⌉`.
    pub fn fallback_keep(&self) -> usize {
        self.max_entries.div_ceil(2)
    }

    /// Consolidate `entries` (oldest first). `audio_context` is the latest
    /// transcript, included in the summary prompt when non-empty.
    pub async fn consolidate(&self, entries: &[MemoryEntry], audio_context: &str) -> Consolidation {
        if entries.is_empty() {
            return Consolidation {
                entries: Vec::new(),
                path: ConsolidationPath::Summary,
            };
        }

        let mut bundle =
            ContextBundle::prompt(Self::transcript(entries)).with_system(CONSOLIDATE_INSTRUCTION);
        bundle.audio_context = audio_context.to_string();

        let reply = match tokio::time::timeout(self.timeout, self.generator.generate_text(bundle))
            .await
        {
            Ok(reply) => reply,
            Err(_) => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Consolidation timed out, truncating instead"
                );
                return self.fallback(entries);
            }
        };

        match reply {
            Ok(summary) if !summary.trim().is_empty() => {
                info!(merged = entries.len(), "Consolidated memory into summary");
                Consolidation {
                    entries: vec![MemoryEntry::new(
                        summary.trim(),
                        self.summary_importance as i64,
                    )],
                    path: ConsolidationPath::Summary,
                }
            }
            Ok(_) => {
                warn!("Consolidation returned an empty summary, truncating instead");
                self.fallback(entries)
            }
            Err(e) => {
                warn!(error = %e, "Consolidation failed, truncating instead");
                self.fallback(entries)
            }
        }
    }

    /// Deterministic local degradation: keep the most important, most recent
    /// `⌈max_entries / 2⌉` entries, returned oldest first.
    pub fn fallback(&self, entries: &[MemoryEntry]) -> Consolidation {
        let mut ranked: Vec<(usize, &MemoryEntry)> = entries.iter().enumerate().collect();
        // Insertion index breaks timestamp ties so equal entries keep the newest.
        ranked.sort_by(|(ia, a), (ib, b)| {
            b.importance()
                .cmp(&a.importance())
                .then_with(|| b.created_at().cmp(&a.created_at()))
                .then_with(|| ib.cmp(ia))
        });
        ranked.truncate(self.fallback_keep());
        ranked.sort_by_key(|(index, _)| *index);

        Consolidation {
            entries: ranked.into_iter().map(|(_, e)| e.clone()).collect(),
            path: ConsolidationPath::Fallback,
        }
    }

    fn transcript(entries: &[MemoryEntry]) -> String {
        let mut log = String::from("Activity log (oldest first):\n");
        for entry in entries {
            log.push_str(&format!(
                "[{}] (importance {}) {}\n",
                entry.created_at().format("%Y-%m-%d %H:%M:%S"),
                entry.importance(),
                entry.content()
            ));
        }
        log
    }
}
