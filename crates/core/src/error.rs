//! Error types for the glimpse domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all glimpse operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Generation collaborator errors ---
    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    // --- Capture / transcription errors ---
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    // --- Chat dispatch errors ---
    #[error("Chat error: {0}")]
    Chat(#[from] ChatError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the external text-generation collaborator.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Generator not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Generator returned an empty response")]
    EmptyResponse,
}

impl GenerationError {
    /// Whether the collaborator is missing altogether rather than failing a call.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NotConfigured(_))
    }
}

/// Failures of the sensing collaborators (frame capture, OCR, audio, transcription).
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("No capturable source")]
    NoSource,

    #[error("Collaborator not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Capture failed: {0}")]
    Failed(String),
}

/// Rejections at the chat boundary.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("Query is empty")]
    EmptyQuery,
}
