use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use murmur::session::ChatSession;
use murmur::settings::{ChatSettings, ReplyMode, SettingsStore};
use murmur::shell::Shell;
use murmur_llm::{FailureRoll, RandomRoll};
use tracing_subscriber::EnvFilter;

/// Terminal chat with simulated assistant replies.
#[derive(Debug, Parser)]
#[command(name = "murmur", version)]
struct Cli {
    /// Settings file; defaults to the user config directory.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Reply mode for this run. Not persisted.
    #[arg(long, value_enum)]
    mode: Option<ReplyMode>,

    /// Chance that a deferred reply fails, in [0, 1].
    #[arg(long)]
    failure_probability: Option<f64>,

    /// Seed for the failure roll, for reproducible runs.
    #[arg(long)]
    seed: Option<u64>,
}

/// Application entry point.
///
/// Logs go to stderr so stdout carries only the conversation.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let store = match cli.config {
        Some(path) => SettingsStore::new(path),
        None => SettingsStore::load(),
    };
    if cli.mode.is_some() || cli.failure_probability.is_some() {
        let current = store.settings();
        store.apply(ChatSettings {
            reply_mode: cli.mode.unwrap_or(current.reply_mode),
            failure_probability: cli
                .failure_probability
                .unwrap_or(current.failure_probability),
            ..(*current).clone()
        });
    }
    tracing::info!(
        config_path = ?store.config_path(),
        reply_mode = ?store.settings().reply_mode,
        "starting chat shell"
    );

    let roll: Box<dyn FailureRoll> = match cli.seed {
        Some(seed) => Box::new(RandomRoll::seeded(seed)),
        None => Box::new(RandomRoll::from_entropy()),
    };

    match Shell::new(ChatSession::new(store, roll)).run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "chat shell stopped");
            ExitCode::FAILURE
        }
    }
}
