//! OpenAI-compatible generation backend.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, llama.cpp, Groq, Together AI,
//! and any endpoint exposing `/v1/chat/completions`.
//!
//! Supports:
//! - Single-shot completions (importance and consolidation prompts)
//! - Streaming SSE completions, re-emitted as cumulative snapshots
//! - Inline images as `data:` URLs for vision-capable models

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use glimpse_core::error::GenerationError;
use glimpse_core::generation::{ContextBundle, SnapshotReceiver, TextGenerator, TextSnapshot};
use glimpse_core::message::{Message, Role};
use glimpse_core::sensing::MediaPayload;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

/// An OpenAI-compatible text generator.
pub struct OpenAiCompatGenerator {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    client: reqwest::Client,
}

impl OpenAiCompatGenerator {
    /// Create a new OpenAI-compatible generator.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            client: http_client(Duration::from_secs(120)),
        }
    }

    /// Create an OpenAI generator (convenience constructor).
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key, model)
    }

    /// Create an OpenRouter generator (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key, model)
    }

    /// Create an Ollama generator (convenience constructor).
    pub fn ollama(base_url: Option<&str>, model: impl Into<String>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
            model,
        )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Per-request timeout for the underlying HTTP client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = http_client(timeout);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::System => "system".into(),
                },
                content: match &m.image {
                    Some(image) => serde_json::json!([
                        { "type": "text", "text": m.content },
                        { "type": "image_url", "image_url": { "url": data_url(image) } },
                    ]),
                    None => serde_json::Value::String(m.content.clone()),
                },
            })
            .collect()
    }

    fn request_body(&self, bundle: &ContextBundle, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&bundle.to_messages()),
            "temperature": self.temperature,
            "stream": stream,
        });
        if let Some(max_tokens) = self.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }

    async fn post(
        &self,
        body: &serde_json::Value,
        accept: &str,
    ) -> Result<reqwest::Response, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", accept)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Timeout(e.to_string())
                } else {
                    GenerationError::Network(e.to_string())
                }
            })?;

        check_status(response).await
    }
}

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// `data:<mime>;base64,<payload>` for inline images.
pub(crate) fn data_url(payload: &MediaPayload) -> String {
    format!(
        "data:{};base64,{}",
        payload.mime_type,
        base64::engine::general_purpose::STANDARD.encode(&payload.data)
    )
}

/// Map non-success HTTP statuses onto `GenerationError`.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, GenerationError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(5);
        return Err(GenerationError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(GenerationError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if !response.status().is_success() {
        let error_body = response.text().await.unwrap_or_default();
        warn!(status, body = %error_body, "Generator returned error");
        return Err(GenerationError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}

#[async_trait]
impl TextGenerator for OpenAiCompatGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_text(&self, bundle: ContextBundle) -> Result<String, GenerationError> {
        let body = self.request_body(&bundle, false);
        debug!(generator = %self.name, model = %self.model, "Sending completion request");

        let response = self.post(&body, "application/json").await?;
        let api_response: ApiResponse =
            response.json().await.map_err(|e| GenerationError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        api_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or(GenerationError::EmptyResponse)
    }

    async fn generate_text_stream(
        &self,
        bundle: ContextBundle,
    ) -> Result<SnapshotReceiver, GenerationError> {
        let body = self.request_body(&bundle, true);
        debug!(generator = %self.name, model = %self.model, "Sending streaming request");

        let response = self.post(&body, "text/event-stream").await?;
        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Spawn task to read the SSE byte stream and re-emit snapshots
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut accumulator = SnapshotAccumulator::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(GenerationError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                if !forward(&tx, accumulator.feed(&bytes)).await {
                    return;
                }
            }
            // Stream ended without [DONE]; closing the channel completes it.
            forward(&tx, accumulator.finish()).await;
        });

        Ok(rx)
    }
}

/// Send parsed items to the receiver. `false` once the stream is over.
async fn forward(
    tx: &tokio::sync::mpsc::Sender<Result<TextSnapshot, GenerationError>>,
    items: Vec<SseItem>,
) -> bool {
    for item in items {
        match item {
            SseItem::Snapshot(text) => {
                if tx.send(Ok(TextSnapshot::new(text))).await.is_err() {
                    return false; // receiver dropped
                }
            }
            SseItem::Done => return false,
            SseItem::Failed(e) => {
                let _ = tx.send(Err(e)).await;
                return false;
            }
        }
    }
    true
}

// --- SSE handling ---

/// What one SSE `data:` line contributed.
#[derive(Debug)]
enum SseItem {
    /// Full text so far
    Snapshot(String),
    Done,
    Failed(GenerationError),
}

/// Turns raw SSE bytes into cumulative snapshots.
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across network chunks decode correctly.
#[derive(Default)]
struct SnapshotAccumulator {
    buffer: Vec<u8>,
    text: String,
}

impl SnapshotAccumulator {
    /// Parse a last line that arrived without a trailing newline.
    fn finish(&mut self) -> Vec<SseItem> {
        if self.buffer.iter().all(u8::is_ascii_whitespace) {
            return Vec::new();
        }
        self.feed(b"\n")
    }

    fn feed(&mut self, bytes: &[u8]) -> Vec<SseItem> {
        self.buffer.extend_from_slice(bytes);
        let mut items = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(|c| c == '\r' || c == '\n');

            // Skip empty lines, SSE comments, and non-data fields
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();

            if data == "[DONE]" {
                items.push(SseItem::Done);
                return items;
            }

            match serde_json::from_str::<StreamResponse>(data) {
                Ok(chunk) => {
                    if let Some(error) = chunk.error {
                        items.push(SseItem::Failed(GenerationError::StreamInterrupted(
                            error.message,
                        )));
                        return items;
                    }
                    let delta: String = chunk
                        .choices
                        .iter()
                        .filter_map(|c| c.delta.content.as_deref())
                        .collect();
                    if !delta.is_empty() {
                        self.text.push_str(&delta);
                        items.push(SseItem::Snapshot(self.text.clone()));
                    }
                }
                Err(e) => {
                    trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
                }
            }
        }

        items
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<StreamError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshots(items: &[SseItem]) -> Vec<&str> {
        items
            .iter()
            .filter_map(|i| match i {
                SseItem::Snapshot(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn openrouter_constructor() {
        let generator = OpenAiCompatGenerator::openrouter("sk-test", "openai/gpt-4o-mini");
        assert_eq!(generator.name(), "openrouter");
        assert!(generator.base_url.contains("openrouter.ai"));
        assert_eq!(generator.model(), "openai/gpt-4o-mini");
    }

    #[test]
    fn ollama_constructor() {
        let generator = OpenAiCompatGenerator::ollama(None, "llama3.2");
        assert_eq!(generator.name(), "ollama");
        assert!(generator.base_url.contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let generator = OpenAiCompatGenerator::new("x", "http://host/v1/", "k", "m");
        assert_eq!(generator.base_url, "http://host/v1");
    }

    #[test]
    fn text_message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatGenerator::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].content, serde_json::json!("Hello"));
    }

    #[test]
    fn image_message_uses_content_parts() {
        let msg = Message::user("what is this?")
            .with_image(MediaPayload::new("image/png", vec![1, 2, 3]));
        let api_messages = OpenAiCompatGenerator::to_api_messages(&[msg]);
        let parts = api_messages[0].content.as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AQID");
    }

    #[test]
    fn request_body_fields() {
        let generator =
            OpenAiCompatGenerator::openai("sk", "gpt-4o-mini").with_max_tokens(256);
        let body = generator.request_body(&ContextBundle::prompt("hi"), true);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn accumulator_emits_cumulative_snapshots() {
        let mut acc = SnapshotAccumulator::default();
        let items = acc.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        );
        assert_eq!(snapshots(&items), vec!["Hel", "Hello"]);

        let items = acc.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\" world\"}}]}\n");
        assert_eq!(snapshots(&items), vec!["Hello world"]);
    }

    #[test]
    fn accumulator_handles_lines_split_across_chunks() {
        let mut acc = SnapshotAccumulator::default();
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n".as_bytes();
        // Split inside the two-byte 'é'
        let split = line.iter().position(|b| *b == 0xC3).unwrap() + 1;

        assert!(acc.feed(&line[..split]).is_empty());
        let items = acc.feed(&line[split..]);
        assert_eq!(snapshots(&items), vec!["café"]);
    }

    #[test]
    fn accumulator_stops_at_done() {
        let mut acc = SnapshotAccumulator::default();
        let items = acc.feed(
            b": keep-alive\n\
              data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\
              data: [DONE]\n",
        );
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], SseItem::Done));
    }

    #[test]
    fn accumulator_surfaces_stream_errors() {
        let mut acc = SnapshotAccumulator::default();
        let items = acc.feed(b"data: {\"error\":{\"message\":\"overloaded\"}}\n");
        match &items[0] {
            SseItem::Failed(GenerationError::StreamInterrupted(msg)) => {
                assert_eq!(msg, "overloaded")
            }
            other => panic!("unexpected item {other:?}"),
        }
    }

    #[test]
    fn accumulator_flushes_unterminated_last_line() {
        let mut acc = SnapshotAccumulator::default();
        let items = acc.feed(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\
              data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}",
        );
        assert_eq!(snapshots(&items), vec!["Hi"]);

        let items = acc.finish();
        assert_eq!(snapshots(&items), vec!["Hi there"]);
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn accumulator_finish_without_leftovers_is_empty() {
        let mut acc = SnapshotAccumulator::default();
        acc.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\r\n");
        assert!(acc.finish().is_empty());
    }

    #[test]
    fn accumulator_ignores_garbage() {
        let mut acc = SnapshotAccumulator::default();
        assert!(acc.feed(b"data: not json\nevent: ping\n").is_empty());
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{"choices":[{"message":{"role":"assistant","content":"7"}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("7"));
    }
}
