//! Flightsure CLI
//!
//! Drives the flight-insurance ledger and a simulated oracle pool.
//!
//! # Usage
//!
//! ```bash
//! # Write a local configuration
//! flightsure init
//!
//! # Run the end-to-end simulation with that configuration
//! flightsure simulate
//!
//! # Force every oracle to report late-airline and print JSON
//! flightsure simulate --picker fixed --status 20 --json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod logging;

use commands::{InitCommand, SimulateCommand};
use config::{default_config_path, default_data_dir, FlightsureConfig};

/// Flightsure flight-insurance ledger
#[derive(Parser)]
#[command(name = "flightsure")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Flight insurance settled by oracle consensus", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory
    #[arg(short, long, global = true, env = "FLIGHTSURE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a configuration file
    Init(InitCommand),

    /// Run airlines, passengers and oracles against a fresh ledger
    Simulate(SimulateCommand),

    /// Show version information
    Version,
}

/// Configuration from `--config`, else the data dir, else the local preset
fn load_config(config: Option<PathBuf>, data_dir: Option<&PathBuf>) -> anyhow::Result<FlightsureConfig> {
    if let Some(path) = config {
        return Ok(FlightsureConfig::load(&path)?);
    }
    let data_dir = data_dir.cloned().unwrap_or_else(|| default_data_dir("local"));
    let path = default_config_path(&data_dir);
    if path.exists() {
        Ok(FlightsureConfig::load(&path)?)
    } else {
        Ok(FlightsureConfig::local())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init(cmd) => {
            logging::init(cli.log_level.as_deref().unwrap_or("info"), cli.json_logs)?;
            cmd.execute(cli.data_dir).await
        }
        Commands::Simulate(cmd) => {
            let config = load_config(cli.config, cli.data_dir.as_ref())?;
            let (level, json) = logging::resolve(&config.logging, cli.log_level.as_deref(), cli.json_logs);
            logging::init(&level, json)?;
            cmd.execute(config).await
        }
        Commands::Version => {
            println!("flightsure {}", env!("CARGO_PKG_VERSION"));
            let defaults = flightsure_ledger::LedgerConfig::default();
            println!(
                "Oracle quorum: {} of index space {}",
                defaults.oracle_quorum, defaults.index_space
            );
            Ok(())
        }
    }
}
