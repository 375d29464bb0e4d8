//! Generation collaborator: the abstraction over text-generation backends.
//!
//! A `TextGenerator` turns a [`ContextBundle`] into text, either in one shot
//! (`generate_text`) or as a stream of **cumulative** snapshots
//! (`generate_text_stream`). Every streamed [`TextSnapshot`] holds the whole
//! response so far; consumers replace what they show, they never append.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::GenerationError;
use crate::message::Message;
use crate::sensing::MediaPayload;

/// Everything a generation call needs: instruction, prompt, and the
/// context sections assembled around it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextBundle {
    /// System instruction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// The user query or task prompt
    pub prompt: String,

    /// Live screen text at the time of the query
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_text: Option<String>,

    /// Live image or video frame
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<MediaPayload>,

    /// Rendered memory context
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub memory_context: String,

    /// Most recent audio transcript
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub audio_context: String,
}

impl ContextBundle {
    /// A bare prompt with no surrounding context.
    pub fn prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Render the bundle as chat messages: an optional system message, then
    /// one user message holding the labelled context sections and the prompt.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = self.system.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(Message::system(system));
        }

        let mut body = String::new();
        if !self.memory_context.is_empty() {
            body.push_str("## Recent activity\n");
            body.push_str(&self.memory_context);
            body.push_str("\n\n");
        }
        if !self.audio_context.is_empty() {
            body.push_str("## Recent audio\n");
            body.push_str(&self.audio_context);
            body.push_str("\n\n");
        }
        if let Some(screen) = self.screen_text.as_deref().filter(|s| !s.trim().is_empty()) {
            body.push_str("## Current screen\n");
            body.push_str(screen);
            body.push_str("\n\n");
        }
        body.push_str(&self.prompt);

        let mut user = Message::user(body);
        if let Some(image) = self.image.as_ref().filter(|i| i.is_valid()) {
            user = user.with_image(image.clone());
        }
        messages.push(user);
        messages
    }
}

/// The full response generated so far. Never a delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSnapshot {
    pub text: String,
}

impl TextSnapshot {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Finite, non-restartable sequence of cumulative snapshots. The channel
/// closing marks normal completion; an `Err` item marks a failed stream.
pub type SnapshotReceiver = mpsc::Receiver<Result<TextSnapshot, GenerationError>>;

/// The core generation trait.
///
/// Implementations: OpenAI-compatible endpoints, a disabled stand-in when no
/// credentials are configured, scripted mocks in tests.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// A human-readable name for this backend.
    fn name(&self) -> &str;

    /// Single-shot generation (importance and consolidation prompts).
    async fn generate_text(&self, bundle: ContextBundle) -> Result<String, GenerationError>;

    /// Streaming generation yielding cumulative snapshots.
    ///
    /// Default implementation calls `generate_text()` and emits the result
    /// as a single snapshot.
    async fn generate_text_stream(
        &self,
        bundle: ContextBundle,
    ) -> Result<SnapshotReceiver, GenerationError> {
        let text = self.generate_text(bundle).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(Ok(TextSnapshot::new(text))).await;
        Ok(rx)
    }
}
