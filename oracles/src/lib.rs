//! Oracle pool simulation for the flightsure ledger
//!
//! Stands in for the independent oracle operators: registers a pool of
//! oracle identities, watches the ledger for status requests and answers
//! each one from every oracle holding the request's index.

pub mod picker;
pub mod pool;

pub use picker::{FixedStatusPicker, RandomStatusPicker, StatusPicker};
pub use pool::{OraclePool, PoolStats};

use flightsure_ledger::{Amount, LedgerError};
use thiserror::Error;

/// Harness errors
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Ledger rejected the call: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Invalid pool configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Oracle pool configuration
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of oracle identities to register
    pub oracle_count: usize,
    /// Stake paid by each oracle
    pub stake: Amount,
    /// Label prefix used to derive oracle addresses
    pub label: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            oracle_count: 30,
            stake: 1,
            label: "oracle".into(),
        }
    }
}

impl PoolConfig {
    pub fn with_oracle_count(mut self, count: usize) -> Self {
        self.oracle_count = count;
        self
    }

    pub fn with_stake(mut self, stake: Amount) -> Self {
        self.stake = stake;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> HarnessResult<()> {
        if self.oracle_count == 0 {
            return Err(HarnessError::InvalidConfig("oracle_count must be at least 1".into()));
        }
        if self.label.is_empty() {
            return Err(HarnessError::InvalidConfig("label must not be empty".into()));
        }
        Ok(())
    }
}
