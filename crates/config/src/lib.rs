//! Configuration loading, validation, and management for glimpse.
//!
//! Loads configuration from `~/.glimpse/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.glimpse/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the generation backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Generation / OCR / transcription backend
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Memory store policy
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Periodic screen capture
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Periodic audio transcription
    #[serde(default)]
    pub audio: AudioConfig,

    /// Chat dispatcher settings
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("memory", &self.memory)
            .field("capture", &self.capture)
            .field("audio", &self.audio)
            .field("chat", &self.chat)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,

    /// Endpoint override; well-known provider names resolve their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for screen text extraction (falls back to `model`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision_model: Option<String>,

    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_provider_name() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_transcription_model() -> String {
    "whisper-1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_request_timeout() -> u64 {
    120
}

impl ProviderConfig {
    /// The model to use for OCR requests.
    pub fn vision_model(&self) -> &str {
        self.vision_model.as_deref().unwrap_or(&self.model)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            api_url: None,
            model: default_model(),
            vision_model: None,
            transcription_model: default_transcription_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Capacity before consolidation fires
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// How many of the newest entries a new observation is compared against
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,

    /// Observations scoring strictly above this are duplicates
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Importance used when assessment fails
    #[serde(default = "default_importance")]
    pub default_importance: u8,

    /// Importance of a consolidated summary entry
    #[serde(default = "default_summary_importance")]
    pub summary_importance: u8,

    /// Max lines in the rendered context
    #[serde(default = "default_render_limit")]
    pub render_limit: usize,

    #[serde(default = "default_render_min_importance")]
    pub render_min_importance: u8,

    /// Entries younger than this are rendered regardless of importance
    #[serde(default = "default_render_recent_secs")]
    pub render_recent_secs: u64,

    #[serde(default = "default_assess_timeout")]
    pub assess_timeout_secs: u64,

    /// Bound on the summary call; on expiry the store truncates instead
    #[serde(default = "default_consolidate_timeout")]
    pub consolidate_timeout_secs: u64,
}

fn default_max_entries() -> usize {
    50
}
fn default_recent_window() -> usize {
    5
}
fn default_similarity_threshold() -> f64 {
    0.8
}
fn default_importance() -> u8 {
    5
}
fn default_summary_importance() -> u8 {
    8
}
fn default_render_limit() -> usize {
    10
}
fn default_render_min_importance() -> u8 {
    6
}
fn default_render_recent_secs() -> u64 {
    300
}
fn default_assess_timeout() -> u64 {
    30
}
fn default_consolidate_timeout() -> u64 {
    60
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            recent_window: default_recent_window(),
            similarity_threshold: default_similarity_threshold(),
            default_importance: default_importance(),
            summary_importance: default_summary_importance(),
            render_limit: default_render_limit(),
            render_min_importance: default_render_min_importance(),
            render_recent_secs: default_render_recent_secs(),
            assess_timeout_secs: default_assess_timeout(),
            consolidate_timeout_secs: default_consolidate_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_capture_interval")]
    pub interval_secs: u64,

    /// File re-read on every tick (a screenshot or pre-extracted text)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_path: Option<String>,
}

fn default_capture_interval() -> u64 {
    5
}
fn default_true() -> bool {
    true
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_capture_interval(),
            frame_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_audio_interval")]
    pub interval_secs: u64,

    /// Directory where a recorder drops finished segments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spool_dir: Option<String>,

    /// Also offer each transcript to the memory store
    #[serde(default)]
    pub feed_memory: bool,
}

fn default_audio_interval() -> u64 {
    10
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_audio_interval(),
            spool_dir: None,
            feed_memory: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Text of the terminal event emitted when a stream fails
    #[serde(default = "default_error_message")]
    pub error_message: String,

    /// Upper bound on a single generation stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,

    /// Use the last captured screen text when a query carries none
    #[serde(default = "default_true")]
    pub use_last_capture: bool,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant that can see the user's screen and hear their \
     surroundings. Use the recent activity, audio and screen context to give \
     concise, specific answers."
        .into()
}
fn default_error_message() -> String {
    "Sorry, something went wrong while generating a response. Please try again.".into()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            error_message: default_error_message(),
            deadline_secs: None,
            use_last_capture: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.glimpse/config.toml).
    ///
    /// Also checks environment variables:
    /// - `GLIMPSE_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    /// - `GLIMPSE_MODEL`, `GLIMPSE_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply environment overrides on top of file values. Unset and empty
    /// variables leave the file value in place.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("GLIMPSE_API_KEY")
            .or_else(|| var("OPENROUTER_API_KEY"))
            .or_else(|| var("OPENAI_API_KEY"))
        {
            self.api_key = Some(key);
        }

        if let Some(model) = var("GLIMPSE_MODEL") {
            self.provider.model = model;
        }

        if let Some(url) = var("GLIMPSE_API_URL") {
            self.provider.api_url = Some(url);
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Write the default configuration to `path` unless a file already exists.
    ///
    /// Returns `false` when the file was left untouched.
    pub fn write_default(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        let write_err = |e: std::io::Error| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, Self::default_toml()).map_err(write_err)?;
        Ok(true)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".glimpse")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| Err(ConfigError::ValidationError(msg.into()));

        if self.provider.temperature < 0.0 || self.provider.temperature > 2.0 {
            return fail("provider.temperature must be between 0.0 and 2.0");
        }
        if self.memory.max_entries == 0 {
            return fail("memory.max_entries must be at least 1");
        }
        if self.memory.recent_window == 0 {
            return fail("memory.recent_window must be at least 1");
        }
        if !(self.memory.similarity_threshold > 0.0 && self.memory.similarity_threshold <= 1.0) {
            return fail("memory.similarity_threshold must be in (0.0, 1.0]");
        }
        for (name, value) in [
            ("memory.default_importance", self.memory.default_importance),
            ("memory.summary_importance", self.memory.summary_importance),
            ("memory.render_min_importance", self.memory.render_min_importance),
        ] {
            if !(1..=10).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be between 1 and 10"
                )));
            }
        }
        if self.memory.render_limit == 0 {
            return fail("memory.render_limit must be at least 1");
        }
        if self.capture.interval_secs == 0 || self.audio.interval_secs == 0 {
            return fail("capture and audio intervals must be greater than zero");
        }
        if self.chat.deadline_secs == Some(0) {
            return fail("chat.deadline_secs must be greater than zero when set");
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Generate a default config TOML string (for the `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderConfig::default(),
            memory: MemoryConfig::default(),
            capture: CaptureConfig::default(),
            audio: AudioConfig::default(),
            chat: ChatConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.max_entries, 50);
        assert_eq!(config.memory.recent_window, 5);
        assert_eq!(config.capture.interval_secs, 5);
        assert_eq!(config.audio.interval_secs, 10);
        assert!(!config.audio.enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.memory.max_entries, config.memory.max_entries);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_memory_policy_rejected() {
        let mut config = AppConfig::default();
        config.memory.similarity_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.memory.summary_importance = 11;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.memory.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_interval_rejected() {
        let mut config = AppConfig::default();
        config.capture.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.provider.name, "openai");
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[memory]
max_entries = 20

[audio]
enabled = true
feed_memory = true

[chat]
deadline_secs = 45
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.memory.max_entries, 20);
        assert_eq!(config.memory.recent_window, 5);
        assert!(config.audio.enabled);
        assert!(config.audio.feed_memory);
        assert_eq!(config.chat.deadline_secs, Some(45));
        assert!(config.chat.use_last_capture);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[memory\nmax_entries = ").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        assert!(AppConfig::write_default(&path).unwrap());
        std::fs::write(&path, "api_key = \"kept\"").unwrap();
        assert!(!AppConfig::write_default(&path).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "api_key = \"kept\"");
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn vision_model_falls_back_to_model() {
        let mut provider = ProviderConfig::default();
        assert_eq!(provider.vision_model(), "gpt-4o-mini");
        provider.vision_model = Some("gpt-4o".into());
        assert_eq!(provider.vision_model(), "gpt-4o");
    }

    #[test]
    fn env_key_overrides_file_key() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(|name| match name {
            "OPENAI_API_KEY" => Some("from-env".into()),
            "GLIMPSE_MODEL" => Some("gpt-4o".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.provider.model, "gpt-4o");
    }

    #[test]
    fn env_key_priority_and_blank_values() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env(|name| match name {
            "GLIMPSE_API_KEY" => Some("glimpse".into()),
            "OPENROUTER_API_KEY" => Some("openrouter".into()),
            "GLIMPSE_API_URL" => Some("  ".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("glimpse"));
        assert!(config.provider.api_url.is_none());

        let mut untouched = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        untouched.apply_env(|_| None);
        assert_eq!(untouched.api_key.as_deref(), Some("from-file"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gpt-4o-mini"));
        assert!(toml_str.contains("max_entries = 50"));
        assert!(toml_str.contains("consolidate_timeout_secs = 60"));
    }
}
