//! Screen capture: frame -> OCR text -> memory observation.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use glimpse_core::error::CaptureError;
use glimpse_core::event::{DomainEvent, EventBus};
use glimpse_core::sensing::{FrameSource, TextExtractor};
use glimpse_memory::MemoryStore;
use tracing::{debug, warn};

use crate::periodic::{PeriodicTask, Producer, TickOutcome};

struct ScreenProducer {
    frames: Arc<dyn FrameSource>,
    extractor: Arc<dyn TextExtractor>,
    memory: Arc<MemoryStore>,
    latest_text: RwLock<Option<String>>,
    event_bus: OnceLock<Arc<EventBus>>,
}

impl ScreenProducer {
    fn skip(&self, reason: String) -> TickOutcome {
        if let Some(bus) = self.event_bus.get() {
            bus.publish(DomainEvent::CaptureSkipped {
                source: "screen".into(),
                reason: reason.clone(),
                timestamp: Utc::now(),
            });
        }
        TickOutcome::Skipped { reason }
    }
}

#[async_trait]
impl Producer for ScreenProducer {
    fn source(&self) -> &'static str {
        "screen"
    }

    async fn tick(&self) -> TickOutcome {
        let frame = match self.frames.capture_frame().await {
            Ok(Some(frame)) if frame.is_valid() => frame,
            Ok(_) => return self.skip("no frame".into()),
            Err(CaptureError::NoSource) => {
                debug!(source = %self.frames.name(), "Nothing to capture");
                return self.skip(CaptureError::NoSource.to_string());
            }
            Err(e) => {
                warn!(source = %self.frames.name(), error = %e, "Frame capture failed");
                return self.skip(e.to_string());
            }
        };

        let text = match self.extractor.extract_text(&frame).await {
            Ok(text) => text,
            Err(e) => {
                warn!(extractor = %self.extractor.name(), error = %e, "Text extraction failed");
                return self.skip(e.to_string());
            }
        };

        let text = text.trim();
        if text.is_empty() {
            return self.skip("no text on screen".into());
        }

        *self.latest_text.write().unwrap_or_else(|e| e.into_inner()) = Some(text.to_string());
        let outcome = self.memory.add_observation(text).await;

        TickOutcome::Observed {
            chars: text.chars().count(),
            memory: Some(outcome),
        }
    }
}

/// Periodically captures a frame, extracts its text and offers it to memory.
///
/// Also remembers the last non-empty screen text for queries that arrive
/// without live screen context.
pub struct CaptureScheduler {
    producer: Arc<ScreenProducer>,
    task: PeriodicTask,
}

impl CaptureScheduler {
    pub fn new(
        frames: Arc<dyn FrameSource>,
        extractor: Arc<dyn TextExtractor>,
        memory: Arc<MemoryStore>,
        interval: Duration,
    ) -> Self {
        Self {
            producer: Arc::new(ScreenProducer {
                frames,
                extractor,
                memory,
                latest_text: RwLock::new(None),
                event_bus: OnceLock::new(),
            }),
            task: PeriodicTask::new(interval),
        }
    }

    /// Publish skipped ticks on `bus`. Takes effect on a running schedule
    /// too. Only the first bus is kept.
    pub fn with_event_bus(self, bus: Arc<EventBus>) -> Self {
        if self.producer.event_bus.set(bus).is_err() {
            warn!("Capture scheduler already has an event bus");
        }
        self
    }

    /// Returns `false` if capture was already running.
    pub fn start(&self) -> bool {
        self.task.start(self.producer.clone())
    }

    /// Returns `false` if capture was not running.
    pub fn stop(&self) -> bool {
        self.task.stop()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Run one capture immediately, outside the schedule.
    pub async fn tick(&self) -> TickOutcome {
        self.producer.tick().await
    }

    /// The most recent non-empty screen text, if any.
    pub fn latest_screen_text(&self) -> Option<String> {
        self.producer
            .latest_text
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
