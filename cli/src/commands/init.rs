//! Init Command - write a configuration file

use std::fs;
use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::config::{default_config_path, default_data_dir, FlightsureConfig};

/// Write a configuration file
#[derive(Args)]
pub struct InitCommand {
    /// Profile to initialize (local, demo)
    #[arg(short, long, default_value = "local")]
    profile: String,

    /// Force overwrite existing configuration
    #[arg(short, long)]
    force: bool,
}

impl InitCommand {
    pub async fn execute(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let data_dir = data_dir.unwrap_or_else(|| default_data_dir(&self.profile));
        let config_path = default_config_path(&data_dir);

        info!("Initializing flightsure {} profile in {}", self.profile, data_dir.display());

        if config_path.exists() && !self.force {
            anyhow::bail!(
                "Already initialized at {}. Use --force to overwrite.",
                data_dir.display()
            );
        }

        fs::create_dir_all(&data_dir)?;
        let config = FlightsureConfig::for_profile(&self.profile);
        config.validate()?;
        config.save(&config_path)?;

        info!("Configuration saved to {}", config_path.display());

        println!();
        println!("Configuration: {}", config_path.display());
        println!();
        println!("To run the simulation:");
        println!("  flightsure simulate --data-dir {}", data_dir.display());

        Ok(())
    }
}
