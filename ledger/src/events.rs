//! Ledger notifications and subscriber interfaces
//!
//! Events are produced while an operation mutates state and are handed to
//! sinks only once that mutation is complete, still inside the ledger's
//! commit boundary. A sink never sees an event for an effect that was
//! rolled back.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::airline::AdmissionState;
use crate::insurance::{PolicyId, Settlement};
use crate::oracle::INDEXES_PER_ORACLE;
use crate::types::{Address, Amount, FlightKey, FlightStatus, Timestamp};

/// A notification emitted by an accepted operation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// Pause flag toggled
    OperatingStatusChanged { operational: bool },
    /// Operator rights granted or revoked
    CallerAuthorization { operator: Address, authorized: bool },
    /// Airline record created
    AirlineRegistered { airline: Address, name: String, state: AdmissionState },
    /// Vote cast for a candidacy
    AirlineVoted { airline: Address, voter: Address, votes: usize, required: usize },
    /// Candidacy reached the approval threshold
    AirlineApproved { airline: Address },
    /// Stake paid
    AirlineFunded { airline: Address, amount: Amount },
    /// Flight registered
    FlightRegistered { key: FlightKey, airline: Address, flight_number: String, timestamp: Timestamp },
    /// Policy sold
    InsurancePurchased { policy: PolicyId, passenger: Address, flight: FlightKey, premium: Amount },
    /// Oracle registered with its indices
    OracleRegistered { oracle: Address, indexes: [u8; INDEXES_PER_ORACLE] },
    /// Status request for the oracle pool
    OracleRequest { index: u8, airline: Address, flight_number: String, timestamp: Timestamp },
    /// Accepted oracle report
    OracleReport { airline: Address, flight_number: String, timestamp: Timestamp, status: FlightStatus },
    /// Flight status finalized by quorum
    FlightStatusInfo { airline: Address, flight_number: String, timestamp: Timestamp, status: FlightStatus },
    /// Policies on a finalized flight settled
    PoliciesSettled(Settlement),
    /// Credits paid out to a passenger
    CreditsWithdrawn { passenger: Address, amount: Amount },
}

impl LedgerEvent {
    /// Short event name for logs
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::OperatingStatusChanged { .. } => "OperatingStatusChanged",
            LedgerEvent::CallerAuthorization { .. } => "CallerAuthorization",
            LedgerEvent::AirlineRegistered { .. } => "AirlineRegistered",
            LedgerEvent::AirlineVoted { .. } => "AirlineVoted",
            LedgerEvent::AirlineApproved { .. } => "AirlineApproved",
            LedgerEvent::AirlineFunded { .. } => "AirlineFunded",
            LedgerEvent::FlightRegistered { .. } => "FlightRegistered",
            LedgerEvent::InsurancePurchased { .. } => "InsurancePurchased",
            LedgerEvent::OracleRegistered { .. } => "OracleRegistered",
            LedgerEvent::OracleRequest { .. } => "OracleRequest",
            LedgerEvent::OracleReport { .. } => "OracleReport",
            LedgerEvent::FlightStatusInfo { .. } => "FlightStatusInfo",
            LedgerEvent::PoliciesSettled(_) => "PoliciesSettled",
            LedgerEvent::CreditsWithdrawn { .. } => "CreditsWithdrawn",
        }
    }
}

/// Subscriber for ledger notifications
pub trait EventSink: Send + Sync {
    /// Called synchronously after the emitting operation's state change
    fn publish(&self, event: &LedgerEvent);
}

/// Sink that drops everything
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn publish(&self, _event: &LedgerEvent) {}
}

/// Sink that keeps every event in memory
#[derive(Default)]
pub struct EventLog {
    events: Mutex<Vec<LedgerEvent>>,
}

impl EventLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Events of a given name, in emission order
    pub fn named(&self, name: &str) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.name() == name)
            .cloned()
            .collect()
    }
}

impl EventSink for EventLog {
    fn publish(&self, event: &LedgerEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Forward events into an async channel. A closed receiver is ignored.
impl EventSink for mpsc::UnboundedSender<LedgerEvent> {
    fn publish(&self, event: &LedgerEvent) {
        let _ = self.send(event.clone());
    }
}
