//! Oracle status consensus
//!
//! Oracles stake to register and receive three distinct indices from a
//! small index space. A status request for a flight is bound to a single
//! index derived from the flight key; only oracles holding that index may
//! answer it. Reports are tallied per status code as sets of reporters,
//! and the first code whose set reaches the quorum finalizes the request.

use std::collections::{BTreeSet, HashMap};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::LedgerError;
use crate::flight::Flight;
use crate::types::{Address, Amount, FlightKey, FlightStatus, Timestamp};
use crate::LedgerResult;

/// Indices assigned to every oracle
pub const INDEXES_PER_ORACLE: usize = 3;

/// Domain separation for index assignment
const INDEX_DOMAIN: &[u8] = b"FLIGHTSURE_ORACLE_INDEXES_V1";

/// A registered oracle
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub address: Address,
    /// Three distinct indices, fixed at registration
    pub indexes: [u8; INDEXES_PER_ORACLE],
    pub stake: Amount,
    /// Registration order, part of the index derivation
    pub registration: u64,
}

impl Oracle {
    pub fn holds(&self, index: u8) -> bool {
        self.indexes.contains(&index)
    }
}

/// Key of a status request: the index it is bound to and the flight
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    pub index: u8,
    pub flight: FlightKey,
}

/// Tally of one status request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConsensusRequest {
    pub key: RequestKey,
    pub airline: Address,
    pub flight_number: String,
    pub timestamp: Timestamp,
    /// Who opened the request
    pub requester: Address,
    /// Status code -> distinct reporters
    responses: HashMap<u8, BTreeSet<Address>>,
    /// Final status, set exactly once
    finalized: Option<FlightStatus>,
}

impl ConsensusRequest {
    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    pub fn finalized_status(&self) -> Option<FlightStatus> {
        self.finalized
    }

    /// Distinct reporters of a status
    pub fn reports_for(&self, status: FlightStatus) -> usize {
        self.responses.get(&status.code()).map(BTreeSet::len).unwrap_or(0)
    }

    pub fn reported_by(&self, oracle: &Address, status: FlightStatus) -> bool {
        self.responses
            .get(&status.code())
            .map(|set| set.contains(oracle))
            .unwrap_or(false)
    }

    /// Total reports across all status codes
    pub fn total_reports(&self) -> usize {
        self.responses.values().map(BTreeSet::len).sum()
    }
}

/// Result of an accepted oracle submission
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionOutcome {
    /// Report tallied, quorum not reached
    Recorded { status: FlightStatus, reports: usize, quorum: usize },
    /// This report reached the quorum and finalized the request
    Finalized { status: FlightStatus, reports: usize },
    /// Request had already finalized; the report has no effect
    AlreadyFinalized { status: FlightStatus },
}

/// Oracle registry and request tallies
#[derive(Clone, Debug)]
pub struct OracleConsensus {
    oracles: HashMap<Address, Oracle>,
    requests: HashMap<RequestKey, ConsensusRequest>,
    /// Open order of requests
    order: Vec<RequestKey>,
    quorum: usize,
    index_space: u8,
    min_stake: Amount,
    /// Secret seed making index assignment unpredictable yet auditable
    seed: [u8; 32],
    registrations: u64,
}

impl OracleConsensus {
    pub fn new(quorum: usize, index_space: u8, min_stake: Amount, seed: [u8; 32]) -> Self {
        Self {
            oracles: HashMap::new(),
            requests: HashMap::new(),
            order: Vec::new(),
            quorum,
            index_space,
            min_stake,
            seed,
            registrations: 0,
        }
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn index_space(&self) -> u8 {
        self.index_space
    }

    pub fn seed(&self) -> [u8; 32] {
        self.seed
    }

    /// Reproduce the index assignment of a registration
    pub fn derive_indexes(
        seed: &[u8; 32],
        oracle: &Address,
        registration: u64,
        index_space: u8,
    ) -> [u8; INDEXES_PER_ORACLE] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(INDEX_DOMAIN);
        hasher.update(seed);
        hasher.update(oracle.as_bytes());
        hasher.update(&registration.to_le_bytes());
        let mut rng = ChaCha20Rng::from_seed(*hasher.finalize().as_bytes());

        let mut indexes = [0u8; INDEXES_PER_ORACLE];
        let mut drawn = 0;
        while drawn < INDEXES_PER_ORACLE {
            let candidate = rng.gen_range(0..index_space);
            if !indexes[..drawn].contains(&candidate) {
                indexes[drawn] = candidate;
                drawn += 1;
            }
        }
        indexes
    }

    /// Index a flight's status request is bound to
    pub fn request_index(&self, flight: &FlightKey) -> u8 {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&flight.as_bytes()[..8]);
        (u64::from_le_bytes(prefix) % self.index_space as u64) as u8
    }

    /// Register the caller as an oracle
    pub fn register(&mut self, caller: Address, stake: Amount) -> LedgerResult<[u8; INDEXES_PER_ORACLE]> {
        if stake < self.min_stake {
            return Err(LedgerError::InsufficientFunding {
                provided: stake,
                required: self.min_stake,
            });
        }
        if self.oracles.contains_key(&caller) {
            return Err(LedgerError::AlreadyRegistered(format!("oracle {}", caller)));
        }

        let registration = self.registrations;
        let indexes = Self::derive_indexes(&self.seed, &caller, registration, self.index_space);
        self.registrations += 1;
        self.oracles.insert(caller, Oracle {
            address: caller,
            indexes,
            stake,
            registration,
        });

        info!("Oracle {} registered with indexes {:?}", caller, indexes);
        Ok(indexes)
    }

    pub fn get(&self, oracle: &Address) -> Option<&Oracle> {
        self.oracles.get(oracle)
    }

    pub fn is_registered(&self, oracle: &Address) -> bool {
        self.oracles.contains_key(oracle)
    }

    pub fn indexes_of(&self, oracle: &Address) -> LedgerResult<[u8; INDEXES_PER_ORACLE]> {
        self.oracles
            .get(oracle)
            .map(|o| o.indexes)
            .ok_or(LedgerError::OracleNotRegistered(*oracle))
    }

    pub fn oracle_count(&self) -> usize {
        self.oracles.len()
    }

    /// Open the request for `flight`, or reuse it while still open.
    /// Returns the key and whether it was newly opened.
    pub fn open_request(&mut self, requester: Address, flight: &Flight) -> LedgerResult<(RequestKey, bool)> {
        let key = RequestKey {
            index: self.request_index(&flight.key),
            flight: flight.key,
        };

        if let Some(existing) = self.requests.get(&key) {
            if existing.is_finalized() {
                return Err(LedgerError::ConsensusAlreadyFinalized(flight.key));
            }
            debug!("Reusing open request for {} on index {}", flight.key, key.index);
            return Ok((key, false));
        }

        self.requests.insert(key, ConsensusRequest {
            key,
            airline: flight.airline,
            flight_number: flight.flight_number.clone(),
            timestamp: flight.timestamp,
            requester,
            responses: HashMap::new(),
            finalized: None,
        });
        self.order.push(key);
        info!("Opened status request for {} on index {}", flight.flight_number, key.index);
        Ok((key, true))
    }

    pub fn request(&self, key: &RequestKey) -> Option<&ConsensusRequest> {
        self.requests.get(key)
    }

    /// Requests that have not reached quorum, in open order
    pub fn open_requests(&self) -> Vec<&ConsensusRequest> {
        self.order
            .iter()
            .filter_map(|k| self.requests.get(k))
            .filter(|r| !r.is_finalized())
            .collect()
    }

    /// Validate a submission without touching state
    pub fn check_submission(&self, caller: &Address, key: &RequestKey, code: u8) -> LedgerResult<FlightStatus> {
        let oracle = self.oracles
            .get(caller)
            .ok_or(LedgerError::OracleNotRegistered(*caller))?;
        if !oracle.holds(key.index) {
            return Err(LedgerError::IndexMismatch { index: key.index });
        }
        let status = FlightStatus::from_code(code)?;
        if !self.requests.contains_key(key) {
            return Err(LedgerError::RequestNotFound { index: key.index, flight: key.flight });
        }
        Ok(status)
    }

    /// Tally a report from `caller`
    pub fn submit(&mut self, caller: Address, key: &RequestKey, code: u8) -> LedgerResult<SubmissionOutcome> {
        let status = self.check_submission(&caller, key, code)?;
        let quorum = self.quorum;
        let request = self.requests
            .get_mut(key)
            .ok_or(LedgerError::RequestNotFound { index: key.index, flight: key.flight })?;

        if let Some(final_status) = request.finalized {
            debug!("Late report from {} on finalized {}", caller, key.flight);
            return Ok(SubmissionOutcome::AlreadyFinalized { status: final_status });
        }

        let reporters = request.responses.entry(code).or_default();
        reporters.insert(caller);
        let reports = reporters.len();

        // Unknown reports are tallied but never settle a flight
        if status.is_final() && reports >= quorum {
            request.finalized = Some(status);
            info!("Quorum of {} reached for {}: {}", reports, request.flight_number, status);
            Ok(SubmissionOutcome::Finalized { status, reports })
        } else {
            debug!("Report {} from {} on {} ({}/{})", status, caller, key.flight, reports, quorum);
            Ok(SubmissionOutcome::Recorded { status, reports, quorum })
        }
    }
}
