//! Stand-in generator used when no credentials are configured.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use glimpse_core::error::GenerationError;
use glimpse_core::generation::{ContextBundle, TextGenerator};
use tracing::warn;

/// Fails every call with `NotConfigured`, so importance assessment and
/// consolidation drop to their local defaults.
#[derive(Default)]
pub struct DisabledGenerator {
    reason: String,
    warned: AtomicBool,
}

impl DisabledGenerator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            warned: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl TextGenerator for DisabledGenerator {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate_text(&self, _bundle: ContextBundle) -> Result<String, GenerationError> {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!(reason = %self.reason, "Generation is disabled, running without a model");
        }
        Err(GenerationError::NotConfigured(self.reason.clone()))
    }
}
