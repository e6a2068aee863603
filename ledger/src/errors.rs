//! Ledger error types

use thiserror::Error;

use crate::types::{Address, Amount, FlightKey};

/// Rejections produced by the ledger.
///
/// Every rejection is clean: an operation that returns an error has left
/// no state change and emitted no notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The access gate is paused
    #[error("Ledger is not operational")]
    NotOperational,

    /// Caller lacks the required role or identity
    #[error("Caller {0} is not authorized for this operation")]
    NotAuthorized(Address),

    /// Duplicate airline, flight or oracle registration
    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    /// Stake below the configured minimum
    #[error("Insufficient funding: provided {provided}, required {required}")]
    InsufficientFunding { provided: Amount, required: Amount },

    /// Airline has no record in the registry
    #[error("Airline not found: {0}")]
    AirlineNotFound(Address),

    /// Vote cast for an airline that is not an open candidacy
    #[error("Airline {0} is not an open candidate")]
    NotACandidate(Address),

    /// Flight key has no record in the registry
    #[error("Flight not found: {0}")]
    FlightNotFound(FlightKey),

    /// Flight status is already final, no more policies can be sold
    #[error("Flight {0} is no longer open for insurance")]
    FlightNotInsurable(FlightKey),

    /// Oracle index is not one of the caller's assigned indices
    #[error("Index {index} is not assigned to this oracle")]
    IndexMismatch { index: u8 },

    /// Caller is not a registered oracle
    #[error("Oracle not registered: {0}")]
    OracleNotRegistered(Address),

    /// No status request was opened for the submitted key
    #[error("No open status request for index {index} on flight {flight}")]
    RequestNotFound { index: u8, flight: FlightKey },

    /// Status code outside the known mapping
    #[error("Invalid status code: {0}")]
    InvalidStatusCode(u8),

    /// The flight's status request has already finalized
    #[error("Consensus already finalized for flight {0}")]
    ConsensusAlreadyFinalized(FlightKey),

    /// Zero premium or zero withdrawal
    #[error("Payment amount must be greater than zero")]
    InsufficientPayment,

    /// Premium above the configured cap
    #[error("Premium {provided} exceeds the maximum of {max}")]
    PremiumTooHigh { provided: Amount, max: Amount },

    /// Withdrawal larger than the outstanding credit balance
    #[error("Insufficient credits: requested {requested}, available {available}")]
    InsufficientCredits { requested: Amount, available: Amount },

    /// External value transfer failed, the debit was rolled back
    #[error("Withdrawal failed: {0}")]
    WithdrawalFailed(String),

    /// Rejected ledger configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
