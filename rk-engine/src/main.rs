//! rolekeeper - tag engine replay tool
//!
//! Loads the bootstrap config and a JSON store snapshot, then replays
//! newline-delimited JSON commands from stdin (or `--input`) against the
//! engine. Engine events and command results go to stdout as JSON lines; logs
//! go to stderr or the configured log file.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use rk_common::config::{load_toml_config, resolve_config_path};
use rk_engine::store::{InMemoryTagStore, StoreSnapshot};
use rk_engine::{replay, Engine};
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for rolekeeper
#[derive(Parser, Debug)]
#[command(name = "rolekeeper")]
#[command(about = "Replay tag toggles and sweeps against a store snapshot")]
#[command(version)]
struct Args {
    /// Config file (falls back to ROLEKEEPER_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON store snapshot (declared tags and subjects)
    #[arg(short, long, env = "ROLEKEEPER_SNAPSHOT")]
    snapshot: PathBuf,

    /// Command file; stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Print the final store snapshot to stderr on exit
    #[arg(long)]
    dump: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref())?;
    let config = load_toml_config(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    init_tracing(&config.logging)?;
    info!("Starting rolekeeper {}", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());

    let snapshot = StoreSnapshot::load(&args.snapshot)
        .await
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;
    info!(
        declared = snapshot.declared.len(),
        subjects = snapshot.subjects.len(),
        "Loaded store snapshot"
    );

    let store = Arc::new(InMemoryTagStore::from_snapshot(snapshot));
    let engine = Engine::new(config, store.clone()).context("Failed to initialize engine")?;

    let mut stdout = std::io::stdout().lock();
    match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            replay::run(&engine, BufReader::new(file), &mut stdout).await?;
        }
        None => {
            replay::run(&engine, BufReader::new(tokio::io::stdin()), &mut stdout).await?;
        }
    }

    if args.dump {
        let snapshot = store.snapshot().await;
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    }

    info!(writes = store.write_count().await, "Replay complete");
    Ok(())
}

fn init_tracing(logging: &rk_common::config::LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let (stderr_layer, file_layer) = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}
