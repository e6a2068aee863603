//! Flight-Surety Ledger
//!
//! The governance and consensus core of the flight-insurance ledger:
//! - Access gate with a pause flag and a single administrator
//! - Airline admission with a fast path and a majority-vote path
//! - Flight registry keyed by a hash of (airline, flight, timestamp)
//! - Index-sharded oracle status consensus with quorum finalization
//! - Insurance escrow whose payouts are gated by finalized statuses
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                     FlightSurety                      │
//! │            (single re-entrant commit boundary)        │
//! ├───────────────────────────────────────────────────────┤
//! │  AccessGate ── consulted first by every mutation      │
//! │      │                                                │
//! │  AirlineRegistry ──gates──▶ FlightRegistry            │
//! │                                 │                     │
//! │  OracleConsensus ──finalize──▶ Flight status          │
//! │         │                                             │
//! │         └────────settle──────▶ InsuranceBook ──▶ Treasury
//! └───────────────────────────────────────────────────────┘
//!           │ events (after commit)
//!           ▼
//!       EventSink(s)
//! ```

pub mod airline;
pub mod errors;
pub mod events;
pub mod flight;
pub mod gate;
pub mod insurance;
pub mod oracle;
pub mod surety;
pub mod treasury;
pub mod types;

pub use airline::{approval_threshold, AdmissionState, Airline, AirlineRegistry, ApprovalOutcome};
pub use errors::LedgerError;
pub use events::{EventLog, EventSink, LedgerEvent, NoOpSink};
pub use flight::{Flight, FlightRegistry, FlightSummary};
pub use gate::AccessGate;
pub use insurance::{CreditAccount, InsuranceBook, InsurancePolicy, PolicyId, Settlement};
pub use oracle::{ConsensusRequest, Oracle, OracleConsensus, RequestKey, SubmissionOutcome, INDEXES_PER_ORACLE};
pub use surety::FlightSurety;
pub use treasury::{InMemoryTreasury, Treasury, TransferError};
pub use types::{Address, Amount, FlightKey, FlightStatus, Timestamp};

use serde::{Deserialize, Serialize};

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Approved-airline count below which admission needs no votes
    pub fast_track_limit: usize,
    /// Minimum stake an airline pays to participate
    pub min_airline_funding: Amount,
    /// Minimum stake to register an oracle
    pub min_oracle_stake: Amount,
    /// Matching reports that finalize a flight status
    pub oracle_quorum: usize,
    /// Size of the oracle index space
    pub index_space: u8,
    /// Payout on LateAirline, in basis points of the premium
    pub payout_multiplier_bps: u64,
    /// Optional cap on a single premium
    pub max_premium: Option<Amount>,
    /// Hex seed for oracle index assignment, random when absent
    pub index_seed: Option<String>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            fast_track_limit: 4,
            min_airline_funding: 10,
            min_oracle_stake: 1,
            oracle_quorum: 3,
            index_space: 10,
            payout_multiplier_bps: 15_000, // 1.5x
            max_premium: None,
            index_seed: None,
        }
    }
}

impl LedgerConfig {
    /// Set the oracle quorum
    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.oracle_quorum = quorum;
        self
    }

    /// Set the index space size
    pub fn with_index_space(mut self, index_space: u8) -> Self {
        self.index_space = index_space;
        self
    }

    /// Set the payout multiplier in basis points
    pub fn with_payout_multiplier_bps(mut self, bps: u64) -> Self {
        self.payout_multiplier_bps = bps;
        self
    }

    /// Cap single premiums
    pub fn with_max_premium(mut self, max: Amount) -> Self {
        self.max_premium = Some(max);
        self
    }

    /// Fix the index assignment seed
    pub fn with_index_seed(mut self, seed: [u8; 32]) -> Self {
        self.index_seed = Some(hex::encode(seed));
        self
    }

    /// Set the minimum airline stake
    pub fn with_min_airline_funding(mut self, amount: Amount) -> Self {
        self.min_airline_funding = amount;
        self
    }

    /// Set the minimum oracle stake
    pub fn with_min_oracle_stake(mut self, amount: Amount) -> Self {
        self.min_oracle_stake = amount;
        self
    }

    /// Decoded index seed, if configured
    pub fn seed_bytes(&self) -> LedgerResult<Option<[u8; 32]>> {
        let Some(seed) = &self.index_seed else {
            return Ok(None);
        };
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(seed.trim_start_matches("0x"), &mut bytes)
            .map_err(|e| LedgerError::InvalidConfig(format!("index_seed: {}", e)))?;
        Ok(Some(bytes))
    }

    /// Validate configuration
    pub fn validate(&self) -> LedgerResult<()> {
        if self.oracle_quorum == 0 {
            return Err(LedgerError::InvalidConfig("oracle_quorum must be at least 1".into()));
        }
        if (self.index_space as usize) < INDEXES_PER_ORACLE {
            return Err(LedgerError::InvalidConfig(format!(
                "index_space must hold at least {} indexes",
                INDEXES_PER_ORACLE
            )));
        }
        if self.payout_multiplier_bps == 0 {
            return Err(LedgerError::InvalidConfig("payout_multiplier_bps must be positive".into()));
        }
        if self.min_airline_funding == 0 {
            return Err(LedgerError::InvalidConfig("min_airline_funding must be positive".into()));
        }
        if self.max_premium == Some(0) {
            return Err(LedgerError::InvalidConfig("max_premium must be positive".into()));
        }
        self.seed_bytes()?;
        Ok(())
    }
}
