//! The streaming chat dispatcher.
//!
//! `submit` makes a fresh stream id current, assembles the context bundle
//! (live screen, live image, rendered memory, latest audio) and hands it to
//! the generator on a background task. That task forwards every cumulative
//! snapshot as a `done = false` event and closes the stream with exactly one
//! terminal event.
//!
//! Superseded streams are not aborted; they run to completion and their
//! events still reach subscribers tagged with their own id. Consumers drop
//! them by comparing ids (see [`ActiveStream`](crate::ActiveStream)), and the
//! dispatcher never lets them update `last_answer`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use glimpse_core::audio::AudioContextSlot;
use glimpse_core::error::{ChatError, GenerationError};
use glimpse_core::event::{DomainEvent, EventBus};
use glimpse_core::generation::{ContextBundle, TextGenerator};
use glimpse_core::sensing::MediaPayload;
use glimpse_memory::MemoryStore;
use tracing::{debug, info, warn};

use crate::hub::{SubscriberHub, Subscription};
use crate::session::{SessionRegistry, StreamState, DEFAULT_HISTORY_LIMIT};
use crate::stream_event::{StreamEvent, StreamId};

const DEFAULT_ERROR_MESSAGE: &str =
    "Sorry, something went wrong while generating a response. Please try again.";

/// A user query plus whatever live context came with it.
#[derive(Debug, Clone, Default)]
pub struct ChatQuery {
    pub message: String,
    pub screen_text: Option<String>,
    pub image: Option<MediaPayload>,
}

impl ChatQuery {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_screen_text(mut self, text: impl Into<String>) -> Self {
        self.screen_text = Some(text.into());
        self
    }

    pub fn with_image(mut self, image: MediaPayload) -> Self {
        self.image = Some(image);
        self
    }
}

pub struct ChatDispatcher {
    generator: Arc<dyn TextGenerator>,
    memory: Arc<MemoryStore>,
    audio_context: AudioContextSlot,
    system_prompt: Option<String>,
    error_message: String,
    deadline: Option<Duration>,
    sessions: Arc<Mutex<SessionRegistry>>,
    hub: Arc<SubscriberHub>,
    event_bus: Option<Arc<EventBus>>,
}

impl ChatDispatcher {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        memory: Arc<MemoryStore>,
        audio_context: AudioContextSlot,
    ) -> Self {
        Self {
            generator,
            memory,
            audio_context,
            system_prompt: None,
            error_message: DEFAULT_ERROR_MESSAGE.into(),
            deadline: None,
            sessions: Arc::new(Mutex::new(SessionRegistry::new(DEFAULT_HISTORY_LIMIT))),
            hub: Arc::new(SubscriberHub::default()),
            event_bus: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Text of the terminal event of a failed stream.
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    /// Bound each generation call; expiry ends the stream with an error event.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_history_limit(self, limit: usize) -> Self {
        *self.registry() = SessionRegistry::new(limit);
        self
    }

    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    /// Start answering `query`; returns the id its events will carry.
    ///
    /// The new id supersedes any earlier one as soon as this returns.
    pub async fn submit(&self, query: ChatQuery) -> Result<StreamId, ChatError> {
        let message = query.message.trim();
        if message.is_empty() {
            return Err(ChatError::EmptyQuery);
        }

        let stream_id = self.registry().begin();
        info!(stream_id = %stream_id, "Query submitted");
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::QuerySubmitted {
                stream_id: stream_id.to_string(),
                timestamp: Utc::now(),
            });
        }

        let image = query.image.filter(|image| {
            let valid = image.is_valid();
            if !valid {
                debug!(stream_id = %stream_id, "Dropping empty live image");
            }
            valid
        });

        let bundle = ContextBundle {
            system: self.system_prompt.clone(),
            prompt: message.to_string(),
            screen_text: query.screen_text,
            image,
            memory_context: self.memory.render_context().await,
            audio_context: self.audio_context.get(),
        };

        let task = StreamTask {
            stream_id,
            generator: self.generator.clone(),
            sessions: self.sessions.clone(),
            hub: self.hub.clone(),
            event_bus: self.event_bus.clone(),
            error_message: self.error_message.clone(),
            deadline: self.deadline,
        };
        tokio::spawn(task.run(bundle));

        Ok(stream_id)
    }

    /// Receive the events of every stream from now on.
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    /// The most recently issued stream id.
    pub fn current(&self) -> Option<StreamId> {
        self.registry().current()
    }

    pub fn state(&self, stream_id: StreamId) -> Option<StreamState> {
        self.registry().state(stream_id)
    }

    /// Final text of the latest stream that completed while still current.
    pub fn last_answer(&self) -> Option<String> {
        self.registry().last_answer().map(str::to_string)
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, SessionRegistry> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Everything one background stream needs, detached from the dispatcher.
struct StreamTask {
    stream_id: StreamId,
    generator: Arc<dyn TextGenerator>,
    sessions: Arc<Mutex<SessionRegistry>>,
    hub: Arc<SubscriberHub>,
    event_bus: Option<Arc<EventBus>>,
    error_message: String,
    deadline: Option<Duration>,
}

impl StreamTask {
    async fn run(self, bundle: ContextBundle) {
        let outcome = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.relay(bundle))
                .await
                .unwrap_or_else(|_| {
                    Err(GenerationError::Timeout(format!(
                        "no answer within {}s",
                        deadline.as_secs()
                    )))
                }),
            None => self.relay(bundle).await,
        };

        let errored = outcome.is_err();
        let event = match &outcome {
            Ok(text) => StreamEvent::finished(self.stream_id, text.as_str()),
            Err(e) => {
                warn!(stream_id = %self.stream_id, error = %e, "Chat stream failed");
                StreamEvent::failed(self.stream_id, self.error_message.as_str())
            }
        };

        let transitioned = self
            .registry()
            .finish(self.stream_id, outcome.as_deref().map_err(|_| ()));
        if !transitioned {
            return;
        }

        self.hub.broadcast(&event);
        debug!(stream_id = %self.stream_id, errored, "Stream finished");
        if let Some(bus) = &self.event_bus {
            bus.publish(DomainEvent::StreamFinished {
                stream_id: self.stream_id.to_string(),
                errored,
                timestamp: Utc::now(),
            });
        }
    }

    /// Forward snapshots until the generator finishes; returns the final text.
    async fn relay(&self, bundle: ContextBundle) -> Result<String, GenerationError> {
        let mut snapshots = self.generator.generate_text_stream(bundle).await?;
        let mut text = String::new();

        while let Some(snapshot) = snapshots.recv().await {
            let snapshot = snapshot?;
            if !self.registry().mark_streaming(self.stream_id) {
                break;
            }
            text = snapshot.text;
            self.hub
                .broadcast(&StreamEvent::partial(self.stream_id, text.as_str()));
        }

        Ok(text)
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, SessionRegistry> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::active::ActiveStream;
    use async_trait::async_trait;
    use glimpse_core::generation::{SnapshotReceiver, TextSnapshot};
    use glimpse_memory::MemoryPolicy;
    use tokio::sync::{mpsc, Notify};

    /// Streams the query back in growing prefixes of its scripted reply.
    ///
    /// Queries starting with "slow" wait for `release` first, queries
    /// starting with "fail" error mid-stream, "refuse" fails up front and
    /// "hang" never produces anything.
    #[derive(Default)]
    struct Scripted {
        release: Notify,
        seen: Mutex<Vec<ContextBundle>>,
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate_text(&self, _bundle: ContextBundle) -> Result<String, GenerationError> {
            Err(GenerationError::NotConfigured("memory side unused".into()))
        }

        async fn generate_text_stream(
            &self,
            bundle: ContextBundle,
        ) -> Result<SnapshotReceiver, GenerationError> {
            self.seen.lock().unwrap().push(bundle.clone());
            let prompt = bundle.prompt.clone();
            if prompt.starts_with("refuse") {
                return Err(GenerationError::AuthenticationFailed("bad key".into()));
            }
            if prompt.starts_with("slow") {
                self.release.notified().await;
            }

            let (tx, rx) = mpsc::channel(8);
            tokio::spawn(async move {
                if prompt.starts_with("hang") {
                    std::future::pending::<()>().await;
                }
                let words: Vec<&str> = prompt.split(' ').collect();
                for n in 1..=words.len() {
                    let _ = tx.send(Ok(TextSnapshot::new(words[..n].join(" ")))).await;
                }
                if prompt.starts_with("fail") {
                    let _ = tx
                        .send(Err(GenerationError::StreamInterrupted("reset".into())))
                        .await;
                }
            });
            Ok(rx)
        }
    }

    fn dispatcher() -> (Arc<Scripted>, Arc<MemoryStore>, ChatDispatcher) {
        let generator = Arc::new(Scripted::default());
        let memory = Arc::new(MemoryStore::new(generator.clone(), MemoryPolicy::default()));
        let dispatcher =
            ChatDispatcher::new(generator.clone(), memory.clone(), AudioContextSlot::new())
                .with_error_message("Something broke");
        (generator, memory, dispatcher)
    }

    async fn events_until_done(sub: &mut Subscription, id: StreamId) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = sub.recv().await {
            let done = event.stream_id == id && event.done;
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn cumulative_snapshots_then_single_done() {
        let (_, _, dispatcher) = dispatcher();
        let mut sub = dispatcher.subscribe();

        let id = dispatcher.submit(ChatQuery::new("one two three")).await.unwrap();
        let events = events_until_done(&mut sub, id).await;

        let texts: Vec<&str> = events.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "one two", "one two three", "one two three"]);
        assert_eq!(events.iter().filter(|e| e.done).count(), 1);
        assert!(events.last().unwrap().done);
        assert!(!events.last().unwrap().error);

        assert_eq!(dispatcher.state(id), Some(StreamState::Done));
        assert_eq!(dispatcher.last_answer().as_deref(), Some("one two three"));
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test]
    async fn mid_stream_failure_emits_one_error_event() {
        let (_, _, dispatcher) = dispatcher();
        let mut sub = dispatcher.subscribe();

        let id = dispatcher.submit(ChatQuery::new("fail soon")).await.unwrap();
        let events = events_until_done(&mut sub, id).await;

        let last = events.last().unwrap();
        assert!(last.done && last.error);
        assert_eq!(last.text, "Something broke");
        assert_eq!(events.iter().filter(|e| e.done).count(), 1);
        assert_eq!(dispatcher.state(id), Some(StreamState::Errored));
        assert_eq!(dispatcher.last_answer(), None);
    }

    #[tokio::test]
    async fn failure_before_first_snapshot_emits_error_event() {
        let (_, _, dispatcher) = dispatcher();
        let mut sub = dispatcher.subscribe();

        let id = dispatcher.submit(ChatQuery::new("refuse please")).await.unwrap();
        let events = events_until_done(&mut sub, id).await;
        assert_eq!(events, vec![StreamEvent::failed(id, "Something broke")]);
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let (_, _, dispatcher) = dispatcher();
        assert!(matches!(
            dispatcher.submit(ChatQuery::new("   ")).await,
            Err(ChatError::EmptyQuery)
        ));
        assert_eq!(dispatcher.current(), None);
    }

    #[tokio::test]
    async fn bundle_carries_live_and_remembered_context() {
        let (generator, memory, _) = dispatcher();
        let audio = AudioContextSlot::new();
        audio.set("we should ship friday");
        let dispatcher = ChatDispatcher::new(generator.clone(), memory.clone(), audio)
            .with_system_prompt("You are a companion.");

        memory.add_observation("reviewing the release checklist").await;

        let mut sub = dispatcher.subscribe();
        let query = ChatQuery::new("what next")
            .with_screen_text("CHANGELOG.md")
            .with_image(MediaPayload::new("image/png", vec![]));
        let id = dispatcher.submit(query).await.unwrap();
        events_until_done(&mut sub, id).await;

        let bundle = generator.seen.lock().unwrap()[0].clone();
        assert_eq!(bundle.prompt, "what next");
        assert_eq!(bundle.system.as_deref(), Some("You are a companion."));
        assert_eq!(bundle.screen_text.as_deref(), Some("CHANGELOG.md"));
        assert!(bundle.image.is_none());
        assert!(bundle.memory_context.contains("reviewing the release checklist"));
        assert_eq!(bundle.audio_context, "we should ship friday");
    }

    #[tokio::test]
    async fn superseded_stream_never_reaches_the_consumer() {
        let (generator, _, dispatcher) = dispatcher();
        let mut sub = dispatcher.subscribe();
        let mut view = ActiveStream::new();

        let a = dispatcher.submit(ChatQuery::new("slow answer A")).await.unwrap();
        view.track(a);
        let b = dispatcher.submit(ChatQuery::new("answer B")).await.unwrap();
        view.track(b);
        assert_eq!(dispatcher.current(), Some(b));

        for event in events_until_done(&mut sub, b).await {
            view.apply(&event);
        }
        assert!(view.is_done());

        // A only starts producing after B is finished
        generator.release.notify_one();
        let late = events_until_done(&mut sub, a).await;
        assert!(late.iter().all(|e| e.stream_id == a));
        for event in &late {
            assert!(!view.apply(event));
        }

        assert_eq!(view.text(), "answer B");
        assert_eq!(dispatcher.state(a), Some(StreamState::Done));
        assert_eq!(dispatcher.last_answer().as_deref(), Some("answer B"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_synthesises_error_event() {
        let (generator, memory, _) = dispatcher();
        let dispatcher = ChatDispatcher::new(generator, memory, AudioContextSlot::new())
            .with_deadline(Duration::from_secs(5));
        let mut sub = dispatcher.subscribe();

        let id = dispatcher.submit(ChatQuery::new("hang forever")).await.unwrap();
        let events = events_until_done(&mut sub, id).await;

        assert_eq!(events.len(), 1);
        assert!(events[0].error);
        assert_eq!(dispatcher.state(id), Some(StreamState::Errored));
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let (generator, memory, _) = dispatcher();
        let bus = Arc::new(EventBus::new(16));
        let mut rx = bus.subscribe();
        let dispatcher = ChatDispatcher::new(generator, memory, AudioContextSlot::new())
            .with_event_bus(bus.clone());
        let mut sub = dispatcher.subscribe();

        let id = dispatcher.submit(ChatQuery::new("hi")).await.unwrap();
        events_until_done(&mut sub, id).await;

        assert!(matches!(
            rx.recv().await.unwrap().as_ref(),
            DomainEvent::QuerySubmitted { .. }
        ));
        match rx.recv().await.unwrap().as_ref() {
            DomainEvent::StreamFinished { stream_id, errored, .. } => {
                assert_eq!(stream_id, &id.to_string());
                assert!(!errored);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
