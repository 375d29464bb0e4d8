//! The companion service object.
//!
//! One `Companion` owns one memory store, one audio context slot, one chat
//! dispatcher and the optional background producers. Nothing is global, so
//! independent instances can coexist (tests build several side by side).

use std::sync::Arc;
use std::time::Duration;

use glimpse_capture::{
    AudioSession, CaptureScheduler, FileFrameSource, PlainTextExtractor, SpoolAudioSource,
    TickOutcome,
};
use glimpse_chat::{ChatDispatcher, ChatQuery, StreamId, StreamState, Subscription};
use glimpse_config::{AppConfig, MemoryConfig};
use glimpse_core::audio::AudioContextSlot;
use glimpse_core::event::EventBus;
use glimpse_core::generation::TextGenerator;
use glimpse_core::memory::MemoryEntry;
use glimpse_core::sensing::{AudioSource, FrameSource, MediaPayload, TextExtractor, Transcriber};
use glimpse_memory::{AddOutcome, ConsolidationPath, MemoryPolicy, MemoryStore};
use tracing::{debug, info};

/// Memory policy from the `[memory]` config section.
pub fn memory_policy(config: &MemoryConfig) -> MemoryPolicy {
    MemoryPolicy {
        max_entries: config.max_entries,
        recent_window: config.recent_window,
        similarity_threshold: config.similarity_threshold,
        default_importance: config.default_importance,
        summary_importance: config.summary_importance,
        render_limit: config.render_limit,
        render_min_importance: config.render_min_importance,
        render_recent: chrono::Duration::seconds(
            config.render_recent_secs.min(u64::from(u32::MAX)) as i64,
        ),
        assess_timeout: Duration::from_secs(config.assess_timeout_secs),
        consolidate_timeout: Duration::from_secs(config.consolidate_timeout_secs),
    }
}

/// Assembles a [`Companion`] from config plus injected collaborators.
///
/// Collaborators left unset are built from the config: the generator from
/// `[provider]`, the frame source from `capture.frame_path`, the audio
/// source from `audio.spool_dir`.
pub struct CompanionBuilder {
    config: AppConfig,
    generator: Option<Arc<dyn TextGenerator>>,
    frames: Option<Arc<dyn FrameSource>>,
    extractor: Option<Arc<dyn TextExtractor>>,
    audio_source: Option<Arc<dyn AudioSource>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    event_bus: Option<Arc<EventBus>>,
}

impl CompanionBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            generator: None,
            frames: None,
            extractor: None,
            audio_source: None,
            transcriber: None,
            event_bus: None,
        }
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn frame_source(mut self, frames: Arc<dyn FrameSource>) -> Self {
        self.frames = Some(frames);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn audio_source(mut self, source: Arc<dyn AudioSource>) -> Self {
        self.audio_source = Some(source);
        self
    }

    pub fn transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn build(self) -> Companion {
        let config = self.config;
        let event_bus = self.event_bus.unwrap_or_default();
        let generator = self
            .generator
            .unwrap_or_else(|| glimpse_providers::build_generator(&config));
        let audio_slot = AudioContextSlot::new();

        let memory = Arc::new(
            MemoryStore::new(generator.clone(), memory_policy(&config.memory))
                .with_audio_context(audio_slot.clone())
                .with_event_bus(event_bus.clone()),
        );

        let mut dispatcher =
            ChatDispatcher::new(generator.clone(), memory.clone(), audio_slot.clone())
                .with_system_prompt(config.chat.system_prompt.as_str())
                .with_error_message(config.chat.error_message.as_str())
                .with_event_bus(event_bus.clone());
        if let Some(secs) = config.chat.deadline_secs {
            dispatcher = dispatcher.with_deadline(Duration::from_secs(secs));
        }

        let frames = self.frames.or_else(|| {
            config
                .capture
                .frame_path
                .as_deref()
                .map(|path| Arc::new(FileFrameSource::new(path)) as Arc<dyn FrameSource>)
        });
        let capture = frames.map(|frames| {
            let extractor = self
                .extractor
                .or_else(|| glimpse_providers::build_extractor(&config))
                .unwrap_or_else(|| Arc::new(PlainTextExtractor));
            CaptureScheduler::new(
                frames,
                extractor,
                memory.clone(),
                Duration::from_secs(config.capture.interval_secs),
            )
            .with_event_bus(event_bus.clone())
        });

        let audio_source = self.audio_source.or_else(|| {
            config
                .audio
                .spool_dir
                .as_deref()
                .map(|dir| Arc::new(SpoolAudioSource::new(dir)) as Arc<dyn AudioSource>)
        });
        let transcriber = self
            .transcriber
            .or_else(|| glimpse_providers::build_transcriber(&config));
        let audio = match (audio_source, transcriber) {
            (Some(source), Some(transcriber)) => {
                let mut session = AudioSession::new(
                    source,
                    transcriber,
                    audio_slot.clone(),
                    Duration::from_secs(config.audio.interval_secs),
                )
                .with_event_bus(event_bus.clone());
                if config.audio.feed_memory {
                    session = session.with_memory(memory.clone());
                }
                Some(session)
            }
            _ => None,
        };

        Companion {
            config,
            memory,
            audio_slot,
            dispatcher,
            capture,
            audio,
            event_bus,
        }
    }
}

pub struct Companion {
    config: AppConfig,
    memory: Arc<MemoryStore>,
    audio_slot: AudioContextSlot,
    dispatcher: ChatDispatcher,
    capture: Option<CaptureScheduler>,
    audio: Option<AudioSession>,
    event_bus: Arc<EventBus>,
}

impl Companion {
    pub fn builder(config: AppConfig) -> CompanionBuilder {
        CompanionBuilder::new(config)
    }

    /// Everything from config, no injected collaborators.
    pub fn from_config(config: AppConfig) -> Self {
        CompanionBuilder::new(config).build()
    }

    /// Start the producers enabled in config.
    pub fn start(&self) {
        if self.config.capture.enabled {
            self.start_capture();
        }
        if self.config.audio.enabled {
            if let Some(audio) = &self.audio {
                audio.start();
            } else {
                debug!("Audio enabled but no source or transcriber available");
            }
        }
        info!(
            capture = self.is_capturing(),
            audio = self.audio.as_ref().is_some_and(AudioSession::is_running),
            "Companion started"
        );
    }

    /// Stop every producer. In-flight chat streams run to completion.
    pub fn stop(&self) {
        self.stop_capture();
        if let Some(audio) = &self.audio {
            audio.stop();
        }
        info!("Companion stopped");
    }

    /// Returns `false` if there is nothing to capture from or capture is
    /// already running.
    pub fn start_capture(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureScheduler::start)
    }

    pub fn stop_capture(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureScheduler::stop)
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.as_ref().is_some_and(CaptureScheduler::is_running)
    }

    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }

    /// One immediate capture tick. `None` without a frame source.
    pub async fn capture_now(&self) -> Option<TickOutcome> {
        match &self.capture {
            Some(capture) => Some(capture.tick().await),
            None => None,
        }
    }

    /// One immediate audio tick. `None` without an audio session.
    pub async fn listen_now(&self) -> Option<TickOutcome> {
        match &self.audio {
            Some(audio) => Some(audio.tick().await),
            None => None,
        }
    }

    /// Ask a question. Without live screen text, the last captured screen
    /// text stands in when `chat.use_last_capture` is set.
    pub async fn submit_query(
        &self,
        message: &str,
        screen_text: Option<String>,
        image: Option<MediaPayload>,
    ) -> glimpse_core::Result<StreamId> {
        let screen_text = screen_text.or_else(|| {
            self.config
                .chat
                .use_last_capture
                .then(|| self.capture.as_ref()?.latest_screen_text())
                .flatten()
        });

        let mut query = ChatQuery::new(message);
        query.screen_text = screen_text;
        query.image = image;
        Ok(self.dispatcher.submit(query).await?)
    }

    /// Stream events of every query, filtered by the consumer.
    pub fn subscribe(&self) -> Subscription {
        self.dispatcher.subscribe()
    }

    pub fn current_stream(&self) -> Option<StreamId> {
        self.dispatcher.current()
    }

    pub fn stream_state(&self, id: StreamId) -> Option<StreamState> {
        self.dispatcher.state(id)
    }

    pub fn last_answer(&self) -> Option<String> {
        self.dispatcher.last_answer()
    }

    /// Offer an observation directly, bypassing the producers.
    pub async fn observe(&self, content: &str) -> AddOutcome {
        self.memory.add_observation(content).await
    }

    pub async fn memory_context(&self) -> String {
        self.memory.render_context().await
    }

    pub async fn clear_memory(&self) {
        self.memory.clear().await;
    }

    pub async fn raw_entries(&self) -> Vec<MemoryEntry> {
        self.memory.entries().await
    }

    pub async fn consolidate_now(&self) -> Option<ConsolidationPath> {
        self.memory.consolidate_now().await
    }

    pub fn audio_context(&self) -> String {
        self.audio_slot.get()
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}
