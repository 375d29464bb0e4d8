//! `glimpse status`: Show the effective configuration.

use glimpse_config::AppConfig;

fn on_off(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let provider = &config.provider;

    let api_url = provider
        .api_url
        .clone()
        .or_else(|| glimpse_providers::default_base_url(&provider.name).map(str::to_string))
        .unwrap_or_else(|| "(unset)".into());

    println!("glimpse Status");
    println!("==============");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Provider:      {} ({api_url})", provider.name);
    println!("  API key:       {}", if config.has_api_key() { "set" } else { "missing" });
    println!("  Model:         {}", provider.model);
    println!("  Vision model:  {}", provider.vision_model());
    println!("  Transcription: {}", provider.transcription_model);
    println!(
        "  Memory:        max {} entries, dedup window {} @ {}",
        config.memory.max_entries, config.memory.recent_window, config.memory.similarity_threshold
    );
    println!(
        "  Capture:       {} every {}s ({})",
        on_off(config.capture.enabled),
        config.capture.interval_secs,
        config.capture.frame_path.as_deref().unwrap_or("no frame_path")
    );
    println!(
        "  Audio:         {} every {}s ({}){}",
        on_off(config.audio.enabled),
        config.audio.interval_secs,
        config.audio.spool_dir.as_deref().unwrap_or("no spool_dir"),
        if config.audio.feed_memory { ", feeds memory" } else { "" }
    );
    match config.chat.deadline_secs {
        Some(secs) => println!("  Chat deadline: {secs}s"),
        None => println!("  Chat deadline: none"),
    }

    if AppConfig::config_path().exists() {
        println!("\n  Config file found");
    } else {
        println!("\n  No config file — run `glimpse onboard` first");
    }

    Ok(())
}
