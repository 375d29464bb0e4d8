//! Speech-to-text over the OpenAI-compatible `/audio/transcriptions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use glimpse_core::error::{CaptureError, GenerationError};
use glimpse_core::sensing::Transcriber;
use serde::Deserialize;
use tracing::debug;

use crate::openai_compat::check_status;

/// Whisper-style transcription client.
pub struct OpenAiTranscriber {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiTranscriber {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        if let Ok(client) = reqwest::Client::builder().timeout(timeout).build() {
            self.client = client;
        }
        self
    }
}

/// `audio/webm;codecs=opus` -> `segment.webm`
fn file_name_for(mime_type: &str) -> String {
    let ext = mime_type
        .split(';')
        .next()
        .and_then(|essence| essence.split('/').nth(1))
        .map(str::trim)
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin");
    format!("segment.{ext}")
}

fn to_capture_error(e: GenerationError) -> CaptureError {
    CaptureError::Failed(e.to_string())
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    fn name(&self) -> &str {
        &self.model
    }

    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, CaptureError> {
        if audio.is_empty() {
            return Err(CaptureError::InvalidInput("empty audio segment".into()));
        }

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(file_name_for(mime_type))
            .mime_str(mime_type)
            .map_err(|e| CaptureError::InvalidInput(format!("bad MIME type {mime_type}: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        debug!(model = %self.model, bytes = audio.len(), "Sending transcription request");
        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| CaptureError::Failed(e.to_string()))?;

        let response = check_status(response).await.map_err(to_capture_error)?;
        let body: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| CaptureError::Failed(format!("Failed to parse transcription: {e}")))?;

        Ok(body.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_follows_mime_subtype() {
        assert_eq!(file_name_for("audio/webm"), "segment.webm");
        assert_eq!(file_name_for("audio/ogg; codecs=opus"), "segment.ogg");
        assert_eq!(file_name_for("garbage"), "segment.bin");
    }

    #[test]
    fn parse_transcription_response() {
        let parsed: TranscriptionResponse =
            serde_json::from_str(r#"{"text":" ship it on friday "}"#).unwrap();
        assert_eq!(parsed.text.trim(), "ship it on friday");
    }

    #[tokio::test]
    async fn empty_audio_is_rejected_locally() {
        let transcriber = OpenAiTranscriber::new("http://127.0.0.1:9", "k", "whisper-1");
        let err = transcriber.transcribe(&[], "audio/webm").await.unwrap_err();
        assert!(matches!(err, CaptureError::InvalidInput(_)));
    }
}
