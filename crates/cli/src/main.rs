//! glimpse CLI: the main entry point.
//!
//! Commands:
//! - `onboard`: Write the default config file
//! - `status`: Show the effective configuration
//! - `ask`: One-shot question, streamed to stdout
//! - `chat`: Run the companion with an interactive prompt

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "glimpse",
    about = "glimpse — a companion that remembers what you were doing",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration to ~/.glimpse/config.toml
    Onboard,

    /// Show the effective configuration
    Status,

    /// Ask a single question and stream the answer
    Ask {
        /// The question
        #[arg(short, long)]
        message: String,

        /// Live screen text to include as context
        #[arg(long)]
        screen: Option<String>,
    },

    /// Start capture and audio per config and chat interactively
    Chat,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Status => commands::status::run().await?,
        Commands::Ask { message, screen } => commands::ask::run(message, screen).await?,
        Commands::Chat => commands::chat::run().await?,
    }

    Ok(())
}
