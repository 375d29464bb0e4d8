//! Audio session: completed segment -> transcript -> audio context slot.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use glimpse_core::audio::AudioContextSlot;
use glimpse_core::error::CaptureError;
use glimpse_core::event::{DomainEvent, EventBus};
use glimpse_core::sensing::{AudioSource, Transcriber};
use glimpse_memory::MemoryStore;
use tracing::{debug, warn};

use crate::periodic::{PeriodicTask, Producer, TickOutcome};

/// Prefix for transcripts offered to memory, so they read apart from screen text.
pub const AUDIO_OBSERVATION_PREFIX: &str = "Audio: ";

struct AudioProducer {
    source: Arc<dyn AudioSource>,
    transcriber: Arc<dyn Transcriber>,
    slot: AudioContextSlot,
    memory: OnceLock<Arc<MemoryStore>>,
    event_bus: OnceLock<Arc<EventBus>>,
}

impl AudioProducer {
    fn skip(&self, reason: String) -> TickOutcome {
        if let Some(bus) = self.event_bus.get() {
            bus.publish(DomainEvent::CaptureSkipped {
                source: "audio".into(),
                reason: reason.clone(),
                timestamp: Utc::now(),
            });
        }
        TickOutcome::Skipped { reason }
    }
}

#[async_trait]
impl Producer for AudioProducer {
    fn source(&self) -> &'static str {
        "audio"
    }

    async fn tick(&self) -> TickOutcome {
        let segment = match self.source.next_segment().await {
            Ok(Some(segment)) if segment.is_valid() => segment,
            Ok(_) => return TickOutcome::skipped("no completed segment"),
            Err(CaptureError::NoSource) => {
                debug!(source = %self.source.name(), "No audio source");
                return self.skip(CaptureError::NoSource.to_string());
            }
            Err(e) => {
                warn!(source = %self.source.name(), error = %e, "Audio segment unavailable");
                return self.skip(e.to_string());
            }
        };

        let transcript = match self
            .transcriber
            .transcribe(&segment.data, &segment.mime_type)
            .await
        {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(transcriber = %self.transcriber.name(), error = %e, "Transcription failed");
                return self.skip(e.to_string());
            }
        };

        if transcript.is_empty() {
            return self.skip("silent segment".into());
        }

        // Overwrite, never merge
        self.slot.set(transcript.as_str());
        debug!(chars = transcript.len(), "Audio context updated");

        let memory = match self.memory.get() {
            Some(store) => Some(
                store
                    .add_observation(&format!("{AUDIO_OBSERVATION_PREFIX}{transcript}"))
                    .await,
            ),
            None => None,
        };

        TickOutcome::Observed {
            chars: transcript.chars().count(),
            memory,
        }
    }
}

/// Periodically transcribes the latest completed audio segment into the
/// shared [`AudioContextSlot`].
pub struct AudioSession {
    producer: Arc<AudioProducer>,
    task: PeriodicTask,
}

impl AudioSession {
    pub fn new(
        source: Arc<dyn AudioSource>,
        transcriber: Arc<dyn Transcriber>,
        slot: AudioContextSlot,
        interval: Duration,
    ) -> Self {
        Self {
            producer: Arc::new(AudioProducer {
                source,
                transcriber,
                slot,
                memory: OnceLock::new(),
                event_bus: OnceLock::new(),
            }),
            task: PeriodicTask::new(interval),
        }
    }

    /// Also offer each transcript to `memory` as an observation. Only the
    /// first store is kept.
    pub fn with_memory(self, memory: Arc<MemoryStore>) -> Self {
        if self.producer.memory.set(memory).is_err() {
            warn!("Audio session already feeds a memory store");
        }
        self
    }

    pub fn with_event_bus(self, bus: Arc<EventBus>) -> Self {
        if self.producer.event_bus.set(bus).is_err() {
            warn!("Audio session already has an event bus");
        }
        self
    }

    pub fn start(&self) -> bool {
        self.task.start(self.producer.clone())
    }

    pub fn stop(&self) -> bool {
        self.task.stop()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Process one segment immediately, outside the schedule.
    pub async fn tick(&self) -> TickOutcome {
        self.producer.tick().await
    }

    pub fn slot(&self) -> &AudioContextSlot {
        &self.producer.slot
    }
}
