//! Fan-out of stream events to subscribers.
//!
//! Each subscriber gets its own unbounded queue, so a slow reader never
//! loses events and never stalls a producing stream.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use crate::stream_event::StreamEvent;

#[derive(Default)]
pub(crate) struct SubscriberHub {
    next_id: AtomicU64,
    senders: Mutex<HashMap<u64, mpsc::UnboundedSender<StreamEvent>>>,
}

impl SubscriberHub {
    pub(crate) fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);

        Subscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    /// Deliver to every live subscriber, forgetting the ones that went away.
    pub(crate) fn broadcast(&self, event: &StreamEvent) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|id, tx| {
            let alive = tx.send(event.clone()).is_ok();
            if !alive {
                debug!(subscriber = id, "Dropping closed subscriber");
            }
            alive
        });
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.senders.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn remove(&self, id: u64) {
        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }
}

/// A handle receiving every stream event from one dispatcher.
///
/// Dropping the handle unsubscribes it.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    hub: Weak<SubscriberHub>,
}

impl Subscription {
    /// Next event, or `None` once the dispatcher is gone.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// Next already-queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<StreamEvent> {
        self.rx.try_recv().ok()
    }

    /// Detach from the dispatcher.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_event::StreamId;

    #[tokio::test]
    async fn every_subscriber_sees_every_event() {
        let hub = Arc::new(SubscriberHub::default());
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        let event = StreamEvent::partial(StreamId::new(), "hello");
        hub.broadcast(&event);

        assert_eq!(first.recv().await, Some(event.clone()));
        assert_eq!(second.recv().await, Some(event));
    }

    #[test]
    fn unsubscribe_detaches() {
        let hub = Arc::new(SubscriberHub::default());
        let sub = hub.subscribe();
        let _other = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        sub.unsubscribe();
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn recv_ends_when_hub_is_gone() {
        let hub = Arc::new(SubscriberHub::default());
        let mut sub = hub.subscribe();
        drop(hub);
        assert_eq!(sub.recv().await, None);
    }
}
