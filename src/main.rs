mod chat;
mod config;
mod error;
mod history;
mod i18n;
mod llm;
mod persona;
mod session;

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tracing_subscriber::EnvFilter;

use crate::chat::{UiOptions, chat_mode};
use crate::config::{Config, Overrides};
use crate::i18n::Language;
use crate::llm::openai::OpenAIClient;
use crate::session::ChatSession;

#[derive(Parser)]
#[command(name = "pizzachat", about = "Chat with a persona-driven assistant in the terminal")]
struct Cli {
    /// Persona preset to start the session with
    #[arg(short, long)]
    persona: Option<String>,

    /// Read the system prompt from a file instead of the preset text
    #[arg(long)]
    persona_file: Option<PathBuf>,

    /// Print the persona catalog and exit
    #[arg(long)]
    list_personas: bool,

    /// Model identifier, overrides config and OPENAI_MODEL
    #[arg(short, long)]
    model: Option<String>,

    /// Print replies at once instead of the typing animation
    #[arg(long)]
    no_animation: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_env("PIZZACHAT_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_ansi(false).with_writer(io::stderr).init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;

    let config = Config::load()?;

    if cli.list_personas {
        for name in config.catalog().names() {
            println!("{name}");
        }
        return Ok(());
    }

    let ui_lang = Language::detect(&config.preference.detect_lang());

    let persona_prompt = cli
        .persona_file
        .as_ref()
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read persona file: {}", path.display()))
        })
        .transpose()?;
    let overrides = Overrides {
        persona: cli.persona,
        persona_prompt,
        model: cli.model,
    };

    let session_config = config.session_config(&overrides)?;
    let credential = config.credential()?;
    let client = OpenAIClient::new(
        &credential,
        config.base_url(),
        config.timeout(),
        config.max_retries(),
    )?;

    let mut session = ChatSession::new(session_config, &credential, Box::new(client));
    let ui = UiOptions {
        animate: config.ui.animate && !cli.no_animation,
        typing_delay: Duration::from_millis(config.ui.typing_delay_ms),
    };

    enable_raw_mode().context("failed to enter raw mode")?;
    let res = chat_mode(&mut session, &ui, &ui_lang);
    disable_raw_mode().ok();
    res
}
