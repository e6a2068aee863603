//! Flightsure Configuration
//!
//! Handles loading and saving ledger and simulation settings from TOML files.

use std::fs;
use std::path::{Path, PathBuf};

use flightsure_ledger::{Amount, FlightStatus, LedgerConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Full CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FlightsureConfig {
    /// Ledger parameters
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// End-to-end simulation settings
    #[serde(default)]
    pub simulation: SimulationSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl FlightsureConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Configuration for a named profile
    pub fn for_profile(profile: &str) -> Self {
        match profile {
            "demo" => Self::demo(),
            _ => Self::local(),
        }
    }

    /// Reproducible local setup with a fixed index seed
    pub fn local() -> Self {
        Self {
            ledger: LedgerConfig::default().with_index_seed([0x11; 32]),
            simulation: SimulationSettings {
                picker_seed: Some(7),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Larger run that exercises the voting path
    pub fn demo() -> Self {
        Self {
            simulation: SimulationSettings {
                airlines: vec![
                    "Udacity Air".into(),
                    "Rust Airways".into(),
                    "Ferris Jet".into(),
                    "Borrow Express".into(),
                    "Lifetime Airlines".into(),
                    "Crate Connect".into(),
                ],
                flights_per_airline: 3,
                passengers: 5,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ledger
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.simulation.validate()?;

        if self.simulation.oracle_stake < self.ledger.min_oracle_stake {
            return Err(ConfigError::Invalid(
                "simulation.oracle_stake is below ledger.min_oracle_stake".to_string(),
            ));
        }
        if self.simulation.airline_funding < self.ledger.min_airline_funding {
            return Err(ConfigError::Invalid(
                "simulation.airline_funding is below ledger.min_airline_funding".to_string(),
            ));
        }
        if let Some(max) = self.ledger.max_premium {
            if self.simulation.premium > max {
                return Err(ConfigError::Invalid(
                    "simulation.premium exceeds ledger.max_premium".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// How simulated oracles choose their reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PickerKind {
    /// Uniform over on-time, late-airline and unknown
    Random,
    /// Every oracle reports `fixed_status`
    Fixed,
}

/// End-to-end simulation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Airline names; the first is the seed airline
    pub airlines: Vec<String>,
    /// Stake paid by each airline
    pub airline_funding: Amount,
    /// Flights registered per airline
    pub flights_per_airline: usize,
    /// Passengers buying a policy on every flight
    pub passengers: usize,
    /// Premium paid per policy
    pub premium: Amount,
    /// Simulated oracle count
    pub oracle_count: usize,
    /// Stake paid by each oracle
    pub oracle_stake: Amount,
    /// Oracle report strategy
    pub picker: PickerKind,
    /// Status code used by the fixed picker
    pub fixed_status: u8,
    /// Seed for the random picker, random when absent
    pub picker_seed: Option<u64>,
    /// Seconds to wait for the oracle pool
    pub timeout_secs: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            airlines: vec![
                "Udacity Air".into(),
                "Rust Airways".into(),
                "Ferris Jet".into(),
            ],
            airline_funding: 10,
            flights_per_airline: 2,
            passengers: 3,
            premium: 1,
            oracle_count: 30,
            oracle_stake: 1,
            picker: PickerKind::Random,
            fixed_status: FlightStatus::LateAirline.code(),
            picker_seed: None,
            timeout_secs: 10,
        }
    }
}

impl SimulationSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.airlines.is_empty() {
            return Err(ConfigError::Invalid("At least one airline is required".to_string()));
        }
        if self.oracle_count == 0 {
            return Err(ConfigError::Invalid("oracle_count must be greater than 0".to_string()));
        }
        if self.premium == 0 {
            return Err(ConfigError::Invalid("premium must be greater than 0".to_string()));
        }
        FlightStatus::from_code(self.fixed_status)
            .map_err(|e| ConfigError::Invalid(format!("fixed_status: {}", e)))?;
        Ok(())
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level
    pub level: String,

    /// Output format (text, json)
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Get default data directory
pub fn default_data_dir(profile: &str) -> PathBuf {
    let base = directories::ProjectDirs::from("io", "flightsure", "flightsure")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".flightsure"));

    base.join(profile)
}

/// Get default config file path
pub fn default_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join("config.toml")
}
