use clap::{Parser, Subcommand};
use config::{ConfigError, LodestoneConfig};
use demo::run_compaction_demo;
use lode_compaction::CaptureError;
use lode_core::TimeUnit;
use lode_purge::{CycleDelay, PurgeError};
use simulation::{run_simulation, SimulationParams};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod demo;
pub mod simulation;

#[derive(Parser, Debug)]
#[command(name = "lodestone", version, about = "Audit log storage control")]
struct Cli {
    /// JSON configuration file. Defaults are used when it does not exist.
    #[arg(long, global = true, default_value = "lodestone.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed an in-memory activity table and purge expired records
    Simulate {
        #[arg(long, default_value_t = 5000)]
        records: usize,

        #[arg(long, default_value_t = 3)]
        worlds: usize,

        /// Records older than this many days are purged
        #[arg(long, default_value_t = 30)]
        retention_days: i64,

        /// Seeded records are spread over this many days
        #[arg(long, default_value_t = 90)]
        history_days: i64,

        #[arg(long)]
        seed: Option<u64>,

        /// Override the configured delay between purge cycles
        #[arg(long)]
        cycle_delay_ms: Option<u64>,
    },

    /// Compact a handful of scripted entities and print the stored form
    Compact,
}

#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Purge(#[from] PurgeError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "lodestone failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = LodestoneConfig::load(&cli.config)?;

    match cli.command {
        Command::Simulate {
            records,
            worlds,
            retention_days,
            history_days,
            seed,
            cycle_delay_ms,
        } => {
            let mut purges = config.purges;
            if let Some(ms) = cycle_delay_ms {
                purges.cycle_delay = Some(CycleDelay::new(ms, TimeUnit::Milliseconds));
            }

            let params = SimulationParams {
                records,
                worlds,
                retention_days,
                history_days,
                seed,
            };
            let stats = run_simulation(params, purges).await?;
            stats.print();
        }
        Command::Compact => run_compaction_demo(config.cache)?,
    }

    println!("\n✓ Done");
    Ok(())
}
