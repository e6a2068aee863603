//! Flight registry

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::LedgerError;
use crate::insurance::PolicyId;
use crate::types::{Address, FlightKey, FlightStatus, Timestamp};
use crate::LedgerResult;

/// A registered flight
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Flight {
    /// Stable handle
    pub key: FlightKey,
    /// Operating airline
    pub airline: Address,
    /// Flight number, e.g. "AA100"
    pub flight_number: String,
    /// Scheduled departure
    pub timestamp: Timestamp,
    /// Unknown until oracle consensus finalizes it
    pub status: FlightStatus,
    /// Policies sold against this flight, in purchase order
    policies: Vec<PolicyId>,
}

impl Flight {
    pub fn policies(&self) -> &[PolicyId] {
        &self.policies
    }

    /// Still open for insurance and status requests
    pub fn is_open(&self) -> bool {
        !self.status.is_final()
    }
}

/// Projection of an insurable flight for listing views
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightSummary {
    pub key: FlightKey,
    pub airline: Address,
    pub airline_name: String,
    pub flight_number: String,
    pub timestamp: Timestamp,
}

/// Flights keyed by flight key
#[derive(Clone, Debug, Default)]
pub struct FlightRegistry {
    flights: HashMap<FlightKey, Flight>,
    order: Vec<FlightKey>,
}

impl FlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flight with status Unknown
    pub fn register(
        &mut self,
        airline: Address,
        flight_number: impl Into<String>,
        timestamp: Timestamp,
    ) -> LedgerResult<FlightKey> {
        let flight_number = flight_number.into();
        let key = FlightKey::compute(&airline, &flight_number, timestamp);
        if self.flights.contains_key(&key) {
            return Err(LedgerError::AlreadyRegistered(format!("flight {}", key)));
        }

        info!("Flight {} at {} registered by {} as {}", flight_number, timestamp, airline, key);
        self.flights.insert(key, Flight {
            key,
            airline,
            flight_number,
            timestamp,
            status: FlightStatus::Unknown,
            policies: Vec::new(),
        });
        self.order.push(key);
        Ok(key)
    }

    pub fn get(&self, key: &FlightKey) -> Option<&Flight> {
        self.flights.get(key)
    }

    pub fn require(&self, key: &FlightKey) -> LedgerResult<&Flight> {
        self.flights.get(key).ok_or(LedgerError::FlightNotFound(*key))
    }

    pub fn contains(&self, key: &FlightKey) -> bool {
        self.flights.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights.is_empty()
    }

    /// Flights still open for insurance, in registration order
    pub fn available(&self) -> Vec<&Flight> {
        self.order
            .iter()
            .filter_map(|k| self.flights.get(k))
            .filter(|f| f.is_open())
            .collect()
    }

    /// All flights in registration order
    pub fn all(&self) -> Vec<&Flight> {
        self.order.iter().filter_map(|k| self.flights.get(k)).collect()
    }

    pub(crate) fn attach_policy(&mut self, key: &FlightKey, policy: PolicyId) -> LedgerResult<()> {
        let flight = self.flights
            .get_mut(key)
            .ok_or(LedgerError::FlightNotFound(*key))?;
        if !flight.is_open() {
            return Err(LedgerError::FlightNotInsurable(*key));
        }
        flight.policies.push(policy);
        Ok(())
    }

    /// One-time transition from Unknown to a final status
    pub(crate) fn finalize(&mut self, key: &FlightKey, status: FlightStatus) -> LedgerResult<&Flight> {
        let flight = self.flights
            .get_mut(key)
            .ok_or(LedgerError::FlightNotFound(*key))?;
        if !flight.is_open() {
            return Err(LedgerError::ConsensusAlreadyFinalized(*key));
        }
        flight.status = status;
        info!("Flight {} finalized as {}", flight.flight_number, status);
        Ok(flight)
    }
}
