//! Screen text extraction through a vision-capable generator.

use std::sync::Arc;

use async_trait::async_trait;
use glimpse_core::error::CaptureError;
use glimpse_core::generation::{ContextBundle, TextGenerator};
use glimpse_core::sensing::{MediaPayload, TextExtractor};
use tracing::debug;

const EXTRACT_INSTRUCTION: &str = "Transcribe all legible text visible in this screenshot. \
Keep reading order, skip decorative UI chrome, and reply with the text only.";

/// OCR backed by a multimodal chat model.
///
/// `text/*` frames are already text and pass through decoded. Image frames
/// go to the generator with an extraction instruction.
pub struct VisionTextExtractor {
    generator: Arc<dyn TextGenerator>,
}

impl VisionTextExtractor {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl TextExtractor for VisionTextExtractor {
    fn name(&self) -> &str {
        "vision"
    }

    async fn extract_text(&self, frame: &MediaPayload) -> Result<String, CaptureError> {
        if !frame.is_valid() {
            return Err(CaptureError::InvalidInput("empty frame".into()));
        }

        if frame.is_text() {
            return Ok(String::from_utf8_lossy(&frame.data).trim().to_string());
        }

        if !frame.is_image() {
            return Err(CaptureError::InvalidInput(format!(
                "unsupported frame type {}",
                frame.mime_type
            )));
        }

        let bundle = ContextBundle {
            image: Some(frame.clone()),
            ..ContextBundle::prompt(EXTRACT_INSTRUCTION)
        };

        debug!(generator = %self.generator.name(), bytes = frame.data.len(), "Extracting screen text");
        match self.generator.generate_text(bundle).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) if e.is_unavailable() => Err(CaptureError::NotConfigured(e.to_string())),
            Err(e) => Err(CaptureError::Failed(e.to_string())),
        }
    }
}
