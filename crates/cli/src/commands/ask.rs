//! `glimpse ask`: One-shot question.

use glimpse_config::AppConfig;
use glimpse_runtime::Companion;

use super::stream::print_answer;

pub async fn run(message: String, screen: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    super::require_generator(&config)?;

    let companion = Companion::from_config(config);
    let mut sub = companion.subscribe();
    let id = companion.submit_query(&message, screen, None).await?;

    let view = print_answer(&mut sub, id, "").await?;
    if view.is_error() {
        return Err("The answer could not be generated".into());
    }
    Ok(())
}
