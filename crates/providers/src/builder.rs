//! Build the configured collaborators from `AppConfig`.
//!
//! Missing credentials never fail the build: the generator degrades to a
//! [`DisabledGenerator`] and the optional collaborators are simply absent.

use std::sync::Arc;
use std::time::Duration;

use glimpse_config::AppConfig;
use glimpse_core::generation::TextGenerator;
use glimpse_core::sensing::{TextExtractor, Transcriber};
use tracing::{info, warn};

use crate::disabled::DisabledGenerator;
use crate::ocr::VisionTextExtractor;
use crate::openai_compat::OpenAiCompatGenerator;
use crate::transcribe::OpenAiTranscriber;

/// Get the default base URL for well-known providers.
pub fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "openai" => Some("https://api.openai.com/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        "fireworks" => Some("https://api.fireworks.ai/inference/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        "llamacpp" | "llama.cpp" => Some("http://localhost:8080/v1"),
        _ => None,
    }
}

/// Local servers accept any bearer token.
pub fn is_local_provider(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Resolved endpoint and credentials, or the reason there are none.
fn endpoint(config: &AppConfig) -> Result<(String, String), String> {
    let name = config.provider.name.as_str();
    let base_url = match config.provider.api_url.as_deref() {
        Some(url) => url.to_string(),
        None => default_base_url(name)
            .ok_or_else(|| format!("unknown provider '{name}' and no provider.api_url set"))?
            .to_string(),
    };

    let api_key = if config.has_api_key() {
        config.api_key.clone().unwrap_or_default()
    } else if is_local_provider(name) {
        name.to_string()
    } else {
        return Err("no API key configured".into());
    };

    Ok((base_url, api_key))
}

fn generator_for(config: &AppConfig, model: &str) -> Arc<dyn TextGenerator> {
    match endpoint(config) {
        Ok((base_url, api_key)) => Arc::new(
            OpenAiCompatGenerator::new(&config.provider.name, base_url, api_key, model)
                .with_temperature(config.provider.temperature)
                .with_max_tokens(config.provider.max_tokens)
                .with_timeout(Duration::from_secs(config.provider.request_timeout_secs)),
        ),
        Err(reason) => Arc::new(DisabledGenerator::new(reason)),
    }
}

/// The chat/assessment/consolidation generator. Never fails.
pub fn build_generator(config: &AppConfig) -> Arc<dyn TextGenerator> {
    let generator = generator_for(config, &config.provider.model);
    info!(
        provider = %config.provider.name,
        model = %config.provider.model,
        backend = %generator.name(),
        "Generator ready"
    );
    generator
}

/// Screen OCR through the vision model, when an endpoint is available.
pub fn build_extractor(config: &AppConfig) -> Option<Arc<dyn TextExtractor>> {
    match endpoint(config) {
        Ok(_) => {
            let generator = generator_for(config, config.provider.vision_model());
            Some(Arc::new(VisionTextExtractor::new(generator)))
        }
        Err(reason) => {
            warn!(reason = %reason, "Screen text extraction unavailable");
            None
        }
    }
}

/// Audio transcription, when an endpoint is available.
pub fn build_transcriber(config: &AppConfig) -> Option<Arc<dyn Transcriber>> {
    match endpoint(config) {
        Ok((base_url, api_key)) => Some(Arc::new(
            OpenAiTranscriber::new(base_url, api_key, &config.provider.transcription_model)
                .with_timeout(Duration::from_secs(config.provider.request_timeout_secs)),
        )),
        Err(reason) => {
            warn!(reason = %reason, "Audio transcription unavailable");
            None
        }
    }
}
