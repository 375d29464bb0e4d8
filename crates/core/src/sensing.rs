//! Sensing collaborators: the boundary to raw capture, OCR and transcription.
//!
//! The core never touches devices or recognition models itself. Producers
//! pull observations through these traits and hand the resulting text to the
//! memory store or the audio context slot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// An opaque media blob (screen frame, audio segment, attached image).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPayload {
    /// MIME type, e.g. `image/png` or `audio/webm`
    pub mime_type: String,

    /// Raw bytes
    #[serde(skip)]
    pub data: Vec<u8>,
}

impl MediaPayload {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// A payload with no bytes or no MIME type carries nothing usable.
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty() && !self.mime_type.trim().is_empty()
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    pub fn is_text(&self) -> bool {
        self.mime_type.starts_with("text/")
    }
}

/// Acquires one screen frame per call (`captureFrame`).
#[async_trait]
pub trait FrameSource: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when there is currently nothing to capture.
    async fn capture_frame(&self) -> Result<Option<MediaPayload>, CaptureError>;
}

/// Extracts visible text from a frame (`extractText`).
#[async_trait]
pub trait TextExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract_text(&self, frame: &MediaPayload) -> Result<String, CaptureError>;
}

/// Yields completed audio segments (`audioBytes`, `mimeType`).
#[async_trait]
pub trait AudioSource: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when no new segment has completed since the last call.
    async fn next_segment(&self) -> Result<Option<MediaPayload>, CaptureError>;
}

/// Converts an audio segment to text (`transcribe`).
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, CaptureError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_invalid() {
        assert!(!MediaPayload::new("image/png", vec![]).is_valid());
        assert!(!MediaPayload::new("", vec![1, 2, 3]).is_valid());
        assert!(MediaPayload::new("image/png", vec![0x89, 0x50]).is_valid());
    }

    #[test]
    fn media_kind_detection() {
        assert!(MediaPayload::new("image/jpeg", vec![1]).is_image());
        assert!(MediaPayload::new("text/plain", vec![1]).is_text());
        assert!(!MediaPayload::new("audio/webm", vec![1]).is_image());
    }
}
