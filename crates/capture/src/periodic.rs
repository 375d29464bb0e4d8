//! Fixed-interval background loop shared by the screen and audio producers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use glimpse_memory::AddOutcome;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// What one producer tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Text was obtained. `memory` is what the store did with it, when the
    /// text was offered to the store at all.
    Observed {
        chars: usize,
        memory: Option<AddOutcome>,
    },
    /// Nothing usable this tick; the schedule carries on.
    Skipped { reason: String },
}

impl TickOutcome {
    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }
}

/// One unit of periodic work.
#[async_trait]
pub trait Producer: Send + Sync + 'static {
    /// Short name used in logs and events ("screen", "audio").
    fn source(&self) -> &'static str;

    /// Must not fail: problems are reported as `TickOutcome::Skipped`.
    async fn tick(&self) -> TickOutcome;
}

/// Owns the spawned loop for one producer.
pub(crate) struct PeriodicTask {
    period: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PeriodicTask {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            handle: Mutex::new(None),
        }
    }

    /// Spawn the loop. Returns `false` if it is already running.
    pub(crate) fn start(&self, producer: Arc<dyn Producer>) -> bool {
        let mut handle = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let period = self.period;
        info!(source = producer.source(), period_secs = period.as_secs(), "Starting producer");
        *handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let outcome = producer.tick().await;
                debug!(source = producer.source(), ?outcome, "Producer tick");
            }
        }));
        true
    }

    /// Abort the loop. Returns `false` if it was not running.
    pub(crate) fn stop(&self) -> bool {
        let handle = self.handle.lock().unwrap_or_else(|e| e.into_inner()).take();
        match handle {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl Producer for Counter {
        fn source(&self) -> &'static str {
            "counter"
        }

        async fn tick(&self) -> TickOutcome {
            self.0.fetch_add(1, Ordering::SeqCst);
            TickOutcome::skipped("counting")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_at_fixed_period_until_stopped() {
        let counter = Arc::new(Counter::default());
        let task = PeriodicTask::new(Duration::from_secs(5));

        assert!(task.start(counter.clone()));
        assert!(!task.start(counter.clone()));
        assert!(task.is_running());

        // First tick fires immediately, then one every 5s
        tokio::time::sleep(Duration::from_millis(12_500)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);

        assert!(task.stop());
        assert!(!task.stop());
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn can_restart_after_stop() {
        let counter = Arc::new(Counter::default());
        let task = PeriodicTask::new(Duration::from_secs(1));
        task.start(counter.clone());
        task.stop();
        assert!(!task.is_running());
        assert!(task.start(counter.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(counter.0.load(Ordering::SeqCst) >= 1);
    }
}
