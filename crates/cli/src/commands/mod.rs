pub mod ask;
pub mod chat;
pub mod onboard;
pub mod status;
pub mod stream;

use glimpse_config::AppConfig;

/// Fail early with setup instructions when no generator can be reached.
pub fn require_generator(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.has_api_key() || glimpse_providers::is_local_provider(&config.provider.name) {
        return Ok(());
    }

    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    GLIMPSE_API_KEY=...      (generic)");
    eprintln!("    OPENROUTER_API_KEY=...   (OpenRouter)");
    eprintln!("    OPENAI_API_KEY=...       (OpenAI direct)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_path().display());
    eprintln!();
    eprintln!("  Local servers (provider.name = \"ollama\", \"vllm\", \"llamacpp\") need no key.");
    eprintln!();
    Err("No API key found. See above for setup instructions.".into())
}
