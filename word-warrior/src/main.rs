//! Word Warrior terminal driver.
//!
//! Plays the card battler over a plain line protocol on stdin/stdout.
//!
//! ```bash
//! cargo run -p word-warrior -- --seed 7 --stats stats.json
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG`.

mod headless;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use word_warrior_core::{GameConfig, GameSession, MemoryStatsStore, StaticCatalog};

#[derive(Parser)]
#[command(name = "word-warrior")]
#[command(about = "Tag sentences, play cards, climb the tower", long_about = None)]
struct Args {
    /// JSON file with game configuration overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file for per-question stats; kept in memory when omitted
    #[arg(short, long, env = "WORD_WARRIOR_STATS")]
    stats: Option<PathBuf>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "word_warrior=info,word_warrior_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GameConfig::load_json(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => GameConfig::default(),
    };
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }

    let session = match &args.stats {
        Some(path) => {
            info!(path = %path.display(), "persisting question stats");
            GameSession::with_stats_file(config, path)
                .with_context(|| format!("opening stats file {}", path.display()))?
        }
        None => GameSession::try_new(
            config,
            Box::new(StaticCatalog::builtin()),
            Box::new(MemoryStatsStore::new()),
        )?,
    };

    headless::run_headless(session).await
}
