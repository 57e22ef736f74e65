mod commands;
mod config;
mod report;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use engine::ReplayMode;
use tracing::info;

use crate::config::{ConsoleConfig, LogFormat, LogOutput};

#[derive(Debug, Parser)]
#[command(name = "gcscope", version, about = "JVM garbage-collector log statistics and replay")]
struct Cli {
    /// Extra configuration file, layered over the default locations.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Parse GC logs and print statistics.
    Stats {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Treat the files as consecutive pieces of one run.
        #[arg(long)]
        concat: bool,
        #[arg(long)]
        json: bool,
        /// Write one `<channel>.dat` file per statistics channel.
        #[arg(long)]
        dump_dir: Option<PathBuf>,
    },
    /// Percent change of every channel from REFERENCE to CANDIDATE.
    Compare {
        reference: PathBuf,
        candidate: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Parse a log, then replay its activities into a fresh trace.
    Replay {
        file: PathBuf,
        #[arg(long, default_value = "fast")]
        mode: ReplayMode,
        /// Real-time speed in percent (100 = original pace).
        #[arg(long)]
        speed: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Phase 1: basic tracing so config loading can log
    let basic_tracing = init_tracing_basic();

    let config = ConsoleConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    // Phase 2: the global subscriber, shaped by the loaded config
    drop(basic_tracing);
    init_tracing_from_config(&config)?;
    info!(version = env!("CARGO_PKG_VERSION"), "gcscope starting");

    match cli.command {
        Command::Stats {
            files,
            concat,
            json,
            dump_dir,
        } => commands::stats(&config, files, concat, json, dump_dir).await,
        Command::Compare {
            reference,
            candidate,
            json,
        } => commands::compare(&config, reference, candidate, json).await,
        Command::Replay { file, mode, speed } => commands::replay(&config, file, mode, speed).await,
    }
}

/// Thread-local subscriber used until the configuration is known.
fn init_tracing_basic() -> tracing::subscriber::DefaultGuard {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("engine=info,gcscope=info"));

    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_default(subscriber)
}

/// Install the global subscriber. `RUST_LOG` wins over `logging.level`.
fn init_tracing_from_config(config: &ConsoleConfig) -> Result<()> {
    use std::sync::Arc;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match (&config.logging.format, &config.logging.output) {
        (LogFormat::Json, LogOutput::Stderr) => {
            let layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        (LogFormat::Json, LogOutput::File { path }) => {
            let file = open_log_file(path)?;
            let layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        (LogFormat::Pretty, LogOutput::Stderr) => {
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
        (LogFormat::Pretty, LogOutput::File { path }) => {
            let file = open_log_file(path)?;
            let layer = fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_ansi(false)
                .with_writer(Arc::new(file));
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    }
    Ok(())
}

fn open_log_file(path: &str) -> Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file '{}'", path))
}
