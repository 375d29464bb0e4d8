//! `glimpse chat`: Interactive session with capture running in the background.

use glimpse_config::AppConfig;
use glimpse_runtime::Companion;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::stream::print_answer;

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Ask(String),
    Memory,
    Entries,
    Clear,
    Consolidate,
    Capture(bool),
    Help,
    Quit,
    Unknown(String),
    Blank,
}

impl Input {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Blank;
        }
        if !line.starts_with('/') {
            return Self::Ask(line.to_string());
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let arg = parts.next();
        match (command, arg) {
            ("/memory", None) => Self::Memory,
            ("/entries", None) => Self::Entries,
            ("/clear", None) => Self::Clear,
            ("/consolidate", None) => Self::Consolidate,
            ("/capture", Some("on")) => Self::Capture(true),
            ("/capture", Some("off")) => Self::Capture(false),
            ("/help", None) => Self::Help,
            ("/quit" | "/exit", None) => Self::Quit,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

fn print_help() {
    println!("  /memory          rendered memory context");
    println!("  /entries         raw memory entries with importance");
    println!("  /clear           forget everything");
    println!("  /consolidate     summarise memory now");
    println!("  /capture on|off  toggle screen capture");
    println!("  /quit            exit");
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    super::require_generator(&config)?;

    let companion = Companion::from_config(config);
    companion.start();

    println!("glimpse — interactive chat");
    println!(
        "   Capture: {} | Audio: {}",
        if companion.is_capturing() { "on" } else { "off" },
        if companion.has_audio() { "available" } else { "unavailable" }
    );
    println!("   Type /help for commands, /quit to exit.\n");

    let mut sub = companion.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You > ");
        std::io::Write::flush(&mut std::io::stdout())?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match Input::parse(&line) {
            Input::Blank => {}
            Input::Ask(message) => match companion.submit_query(&message, None, None).await {
                Ok(id) => {
                    print_answer(&mut sub, id, "glimpse > ").await?;
                    println!();
                }
                Err(e) => eprintln!("  [Error] {e}"),
            },
            Input::Memory => {
                let context = companion.memory_context().await;
                if context.is_empty() {
                    println!("  (memory is empty)");
                } else {
                    println!("{context}");
                }
            }
            Input::Entries => {
                let entries = companion.raw_entries().await;
                if entries.is_empty() {
                    println!("  (no entries)");
                }
                for entry in entries {
                    println!("  {} (importance {})", entry.render_line(), entry.importance());
                }
            }
            Input::Clear => {
                companion.clear_memory().await;
                println!("  Memory cleared");
            }
            Input::Consolidate => match companion.consolidate_now().await {
                Some(path) => println!("  Consolidated ({path:?})"),
                None => println!("  Nothing to consolidate"),
            },
            Input::Capture(true) => {
                if companion.start_capture() {
                    println!("  Capture started");
                } else if companion.is_capturing() {
                    println!("  Capture already running");
                } else {
                    println!("  No frame source configured (capture.frame_path)");
                }
            }
            Input::Capture(false) => {
                if companion.stop_capture() {
                    println!("  Capture stopped");
                } else {
                    println!("  Capture was not running");
                }
            }
            Input::Help => print_help(),
            Input::Quit => break,
            Input::Unknown(command) => {
                println!("  Unknown command: {command}");
                print_help();
            }
        }
    }

    companion.stop();
    println!("Goodbye!");
    Ok(())
}
