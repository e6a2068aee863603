//! Flightsure: decentralized flight insurance
//!
//! Root crate that re-exports the flightsure components for integration
//! testing and provides unified access to the protocol defaults.
//!
//! ## Overview
//!
//! Airlines register and fund themselves, passengers buy insurance on
//! specific flights, and a panel of independent oracles reaches quorum on
//! each flight's real-world status, which triggers payout:
//!
//! - **Airline governance**: fast-path admission, then majority voting
//! - **Index-sharded oracle consensus**: only oracles holding a request's
//!   index may answer it; matching reports finalize at quorum
//! - **Insurance escrow**: credits are granted only by finalized statuses
//!   and withdrawn debit-first
//!
//! ## Crate Organization
//!
//! - `flightsure-ledger`: the ledger core and its commit boundary
//! - `flightsure-oracles`: simulated oracle pool driven by ledger events

pub use flightsure_ledger as ledger;
pub use flightsure_oracles as oracles;

/// Flightsure protocol version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol defaults
pub mod config {
    use flightsure_ledger::{Amount, FlightStatus};

    /// Votes needed to approve a candidate with `approved` airlines admitted
    pub use flightsure_ledger::approval_threshold;

    /// Matching reports that finalize a flight status
    pub const ORACLE_QUORUM: usize = 3;

    /// Size of the oracle index space
    pub const INDEX_SPACE: u8 = 10;

    /// Approved airlines admitted without a vote
    pub const FAST_TRACK_LIMIT: usize = 4;

    /// Minimum airline stake
    pub const MIN_AIRLINE_FUNDING: Amount = 10;

    /// Payout on a compensable delay, in basis points of the premium
    pub const PAYOUT_MULTIPLIER_BPS: u64 = 15_000;

    /// The only status that credits passengers
    pub const COMPENSATED_STATUS: FlightStatus = FlightStatus::LateAirline;
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use flightsure_ledger::{
        Address, AdmissionState, Amount, ApprovalOutcome, EventLog, EventSink, FlightKey,
        FlightStatus, FlightSurety, InMemoryTreasury, LedgerConfig, LedgerError, LedgerEvent,
        LedgerResult, RequestKey, SubmissionOutcome, Timestamp, Treasury,
    };
    pub use flightsure_oracles::{FixedStatusPicker, OraclePool, PoolConfig, RandomStatusPicker, StatusPicker};
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightsure_ledger::LedgerConfig;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_defaults_match_ledger_config() {
        let defaults = LedgerConfig::default();
        assert_eq!(defaults.oracle_quorum, config::ORACLE_QUORUM);
        assert_eq!(defaults.index_space, config::INDEX_SPACE);
        assert_eq!(defaults.fast_track_limit, config::FAST_TRACK_LIMIT);
        assert_eq!(defaults.min_airline_funding, config::MIN_AIRLINE_FUNDING);
        assert_eq!(defaults.payout_multiplier_bps, config::PAYOUT_MULTIPLIER_BPS);
        assert!(config::COMPENSATED_STATUS.pays_out());
    }

    #[test]
    fn test_approval_threshold() {
        assert_eq!(config::approval_threshold(4), 3);
        assert_eq!(config::approval_threshold(5), 3);
        assert_eq!(config::approval_threshold(6), 4);
    }
}
