//! `glimpse onboard`: First-time setup.

use glimpse_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_path();

    println!("glimpse — First-Time Setup");
    println!("==========================\n");

    if AppConfig::write_default(&config_path)? {
        println!("  Created config at: {}", config_path.display());
        println!("\n  Next steps:");
        println!("   1. Add your API key to {} (or export GLIMPSE_API_KEY)", config_path.display());
        println!("   2. Point capture.frame_path at a screenshot or window-text file");
        println!("   3. Run: glimpse chat\n");
    } else {
        println!("  Config already exists at: {}", config_path.display());
        println!("  Edit it manually or delete it and re-run onboard.\n");
    }

    Ok(())
}
