//! The public operation surface and its commit boundary
//!
//! All state lives in one `LedgerState` behind a re-entrant lock. Each
//! operation validates before it mutates, so a rejection leaves nothing
//! behind. Events produced by an accepted operation are appended to the
//! audit log and pushed to sinks before the lock is released.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::airline::{AdmissionState, Airline, AirlineRegistry, ApprovalOutcome};
use crate::errors::LedgerError;
use crate::events::{EventSink, LedgerEvent};
use crate::flight::{Flight, FlightRegistry, FlightSummary};
use crate::gate::AccessGate;
use crate::insurance::{InsuranceBook, InsurancePolicy, PolicyId};
use crate::oracle::{ConsensusRequest, OracleConsensus, RequestKey, SubmissionOutcome, INDEXES_PER_ORACLE};
use crate::treasury::{InMemoryTreasury, Treasury};
use crate::types::{Address, Amount, FlightKey, FlightStatus, Timestamp};
use crate::{LedgerConfig, LedgerResult};

/// Every table of the ledger
struct LedgerState {
    gate: AccessGate,
    airlines: AirlineRegistry,
    flights: FlightRegistry,
    oracles: OracleConsensus,
    insurance: InsuranceBook,
    /// Append-only history of emitted events
    log: Vec<LedgerEvent>,
}

/// The flight-insurance ledger
pub struct FlightSurety {
    config: LedgerConfig,
    state: ReentrantMutex<RefCell<LedgerState>>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
    treasury: Arc<dyn Treasury>,
}

impl FlightSurety {
    /// Create a ledger administered by `admin`, with `first_airline`
    /// admitted but not yet funded.
    pub fn new(
        config: LedgerConfig,
        admin: Address,
        first_airline: Address,
        first_airline_name: impl Into<String>,
    ) -> LedgerResult<Self> {
        config.validate()?;
        let seed = match config.seed_bytes()? {
            Some(seed) => seed,
            None => rand::random(),
        };

        let mut airlines = AirlineRegistry::new(config.fast_track_limit, config.min_airline_funding);
        airlines.seed(first_airline, first_airline_name)?;

        let state = LedgerState {
            gate: AccessGate::new(admin),
            airlines,
            flights: FlightRegistry::new(),
            oracles: OracleConsensus::new(
                config.oracle_quorum,
                config.index_space,
                config.min_oracle_stake,
                seed,
            ),
            insurance: InsuranceBook::new(config.payout_multiplier_bps, config.max_premium),
            log: Vec::new(),
        };

        info!("Ledger created: admin {}, first airline {}", admin, first_airline);
        Ok(Self {
            config,
            state: ReentrantMutex::new(RefCell::new(state)),
            sinks: RwLock::new(Vec::new()),
            treasury: Arc::new(InMemoryTreasury::new()),
        })
    }

    /// Set the value-transfer backend
    pub fn with_treasury(mut self, treasury: Arc<dyn Treasury>) -> Self {
        self.treasury = treasury;
        self
    }

    /// Add an event sink
    pub fn with_sink(self, sink: Arc<dyn EventSink>) -> Self {
        self.subscribe(sink);
        self
    }

    /// Add an event sink at runtime
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    /// Subscribe an async channel to all future events
    pub fn subscribe_channel(&self) -> mpsc::UnboundedReceiver<LedgerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribe(Arc::new(tx));
        rx
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Run a mutating operation under the commit boundary
    fn commit<T>(
        &self,
        op: impl FnOnce(&mut LedgerState, &mut Vec<LedgerEvent>) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let guard = self.state.lock();
        let mut events = Vec::new();
        let value = {
            let mut state = guard.borrow_mut();
            let value = op(&mut *state, &mut events).map_err(|e| {
                debug!("Operation rejected: {}", e);
                e
            })?;
            state.log.extend(events.iter().cloned());
            value
        };
        // Sinks may call back in; the state is no longer borrowed here
        self.dispatch(&events);
        Ok(value)
    }

    /// Run a read-only query under the commit boundary
    fn view<T>(&self, query: impl FnOnce(&LedgerState) -> T) -> T {
        let guard = self.state.lock();
        let state = guard.borrow();
        query(&state)
    }

    fn dispatch(&self, events: &[LedgerEvent]) {
        // Clone the list so a sink may subscribe others while being called
        let sinks: Vec<_> = self.sinks.read().clone();
        for event in events {
            for sink in &sinks {
                sink.publish(event);
            }
        }
    }

    // ------------------------------------------------------------------
    // Access gate
    // ------------------------------------------------------------------

    pub fn is_operational(&self) -> bool {
        self.view(|s| s.gate.is_operational())
    }

    /// Pause or resume the ledger. Administrator only.
    pub fn set_operating_status(&self, caller: Address, value: bool) -> LedgerResult<()> {
        self.commit(|state, events| {
            if state.gate.set_operating_status(&caller, value)? {
                info!("Operating status set to {} by {}", value, caller);
                events.push(LedgerEvent::OperatingStatusChanged { operational: value });
            }
            Ok(())
        })
    }

    /// Grant operator rights. Administrator only.
    pub fn authorize_caller(&self, caller: Address, operator: Address) -> LedgerResult<()> {
        self.commit(|state, events| {
            if state.gate.authorize_caller(&caller, operator)? {
                events.push(LedgerEvent::CallerAuthorization { operator, authorized: true });
            }
            Ok(())
        })
    }

    /// Revoke operator rights. Administrator only.
    pub fn deauthorize_caller(&self, caller: Address, operator: Address) -> LedgerResult<()> {
        self.commit(|state, events| {
            if state.gate.deauthorize_caller(&caller, &operator)? {
                events.push(LedgerEvent::CallerAuthorization { operator, authorized: false });
            }
            Ok(())
        })
    }

    pub fn is_authorized_caller(&self, operator: &Address) -> bool {
        self.view(|s| s.gate.is_authorized_caller(operator))
    }

    // ------------------------------------------------------------------
    // Airline governance
    // ------------------------------------------------------------------

    /// Register an airline, sponsored by `caller` or self-nominated
    pub fn register_airline(
        &self,
        caller: Address,
        airline: Address,
        name: impl Into<String>,
    ) -> LedgerResult<AdmissionState> {
        let name = name.into();
        self.commit(|state, events| {
            state.gate.require_operational()?;
            let admission = state.airlines.register(&caller, airline, name.clone())?;
            events.push(LedgerEvent::AirlineRegistered { airline, name, state: admission });
            Ok(admission)
        })
    }

    /// Vote for a candidate airline
    pub fn approve_airline(&self, caller: Address, airline: Address) -> LedgerResult<ApprovalOutcome> {
        self.commit(|state, events| {
            state.gate.require_operational()?;
            let outcome = state.airlines.approve(&caller, &airline)?;
            let (votes, required) = match outcome {
                ApprovalOutcome::ThresholdNotMet { votes, required } => (votes, required),
                ApprovalOutcome::Approved { votes, required } => (votes, required),
            };
            events.push(LedgerEvent::AirlineVoted { airline, voter: caller, votes, required });
            if outcome.is_approved() {
                events.push(LedgerEvent::AirlineApproved { airline });
            }
            Ok(outcome)
        })
    }

    /// Pay an airline's stake
    pub fn fund_airline(&self, caller: Address, airline: Address, amount: Amount) -> LedgerResult<()> {
        self.commit(|state, events| {
            state.gate.require_operational()?;
            let privileged = state.gate.is_privileged(&caller);
            state.airlines.fund(&caller, &airline, amount, privileged)?;
            events.push(LedgerEvent::AirlineFunded { airline, amount });
            Ok(())
        })
    }

    /// Approved and funded
    pub fn is_airline(&self, airline: &Address) -> bool {
        self.view(|s| s.airlines.is_airline(airline))
    }

    pub fn get_airline(&self, airline: &Address) -> Option<Airline> {
        self.view(|s| s.airlines.get(airline).cloned())
    }

    /// (address, name) of approved airlines in admission order
    pub fn get_approved_airlines(&self) -> Vec<(Address, String)> {
        self.view(|s| {
            s.airlines
                .approved()
                .into_iter()
                .map(|a| (a.address, a.name.clone()))
                .collect()
        })
    }

    /// Open candidacies
    pub fn get_candidate_airlines(&self) -> Vec<Airline> {
        self.view(|s| s.airlines.candidates().into_iter().cloned().collect())
    }

    // ------------------------------------------------------------------
    // Flight registry
    // ------------------------------------------------------------------

    /// Register a flight operated by the calling airline
    pub fn register_flight(
        &self,
        caller: Address,
        airline: Address,
        flight_number: impl Into<String>,
        timestamp: Timestamp,
    ) -> LedgerResult<FlightKey> {
        let flight_number = flight_number.into();
        self.commit(|state, events| {
            state.gate.require_operational()?;
            state.airlines.require_airline(&caller)?;
            if caller != airline {
                return Err(LedgerError::NotAuthorized(caller));
            }
            let key = state.flights.register(airline, flight_number.clone(), timestamp)?;
            events.push(LedgerEvent::FlightRegistered { key, airline, flight_number, timestamp });
            Ok(key)
        })
    }

    /// Flights still open for insurance
    pub fn get_flights_available_to_buy_insurance(&self) -> Vec<FlightSummary> {
        self.view(|s| {
            s.flights
                .available()
                .into_iter()
                .map(|f| FlightSummary {
                    key: f.key,
                    airline: f.airline,
                    airline_name: s.airlines
                        .get(&f.airline)
                        .map(|a| a.name.clone())
                        .unwrap_or_default(),
                    flight_number: f.flight_number.clone(),
                    timestamp: f.timestamp,
                })
                .collect()
        })
    }

    pub fn get_flight_status(&self, key: &FlightKey) -> LedgerResult<FlightStatus> {
        self.view(|s| s.flights.require(key).map(|f| f.status))
    }

    pub fn get_flight(&self, key: &FlightKey) -> Option<Flight> {
        self.view(|s| s.flights.get(key).cloned())
    }

    // ------------------------------------------------------------------
    // Oracle consensus
    // ------------------------------------------------------------------

    /// Register the caller as an oracle and assign its indices
    pub fn register_oracle(&self, caller: Address, stake: Amount) -> LedgerResult<[u8; INDEXES_PER_ORACLE]> {
        self.commit(|state, events| {
            state.gate.require_operational()?;
            let indexes = state.oracles.register(caller, stake)?;
            events.push(LedgerEvent::OracleRegistered { oracle: caller, indexes });
            Ok(indexes)
        })
    }

    pub fn get_my_indexes(&self, caller: &Address) -> LedgerResult<[u8; INDEXES_PER_ORACLE]> {
        self.view(|s| s.oracles.indexes_of(caller))
    }

    /// Ask the oracle pool for a flight's status
    pub fn fetch_flight_status(
        &self,
        caller: Address,
        airline: Address,
        flight_number: &str,
        timestamp: Timestamp,
    ) -> LedgerResult<RequestKey> {
        self.fetch_flight_status_by_key(caller, FlightKey::compute(&airline, flight_number, timestamp))
    }

    /// Ask the oracle pool for the status of a registered flight by key
    pub fn fetch_flight_status_by_key(&self, caller: Address, key: FlightKey) -> LedgerResult<RequestKey> {
        self.commit(|state, events| {
            state.gate.require_operational()?;
            let flight = state.flights.require(&key)?;
            if !flight.is_open() {
                return Err(LedgerError::ConsensusAlreadyFinalized(key));
            }
            let (request_key, _) = state.oracles.open_request(caller, flight)?;
            events.push(LedgerEvent::OracleRequest {
                index: request_key.index,
                airline: flight.airline,
                flight_number: flight.flight_number.clone(),
                timestamp: flight.timestamp,
            });
            Ok(request_key)
        })
    }

    /// Report a flight status from an oracle holding `index`
    pub fn submit_oracle_response(
        &self,
        caller: Address,
        index: u8,
        airline: Address,
        flight_number: &str,
        timestamp: Timestamp,
        status_code: u8,
    ) -> LedgerResult<SubmissionOutcome> {
        let key = RequestKey {
            index,
            flight: FlightKey::compute(&airline, flight_number, timestamp),
        };
        let flight_number = flight_number.to_string();

        self.commit(|state, events| {
            state.gate.require_operational()?;
            state.oracles.check_submission(&caller, &key, status_code)?;
            state.flights.require(&key.flight)?;

            let outcome = state.oracles.submit(caller, &key, status_code)?;
            let reported = match outcome {
                SubmissionOutcome::Recorded { status, .. } => status,
                SubmissionOutcome::Finalized { status, .. } => status,
                SubmissionOutcome::AlreadyFinalized { .. } => FlightStatus::from_code(status_code)?,
            };
            events.push(LedgerEvent::OracleReport {
                airline,
                flight_number: flight_number.clone(),
                timestamp,
                status: reported,
            });

            if let SubmissionOutcome::Finalized { status, .. } = outcome {
                let policies = state.flights.finalize(&key.flight, status)?.policies().to_vec();
                events.push(LedgerEvent::FlightStatusInfo {
                    airline,
                    flight_number,
                    timestamp,
                    status,
                });
                let settlement = state.insurance.settle(key.flight, status, &policies);
                events.push(LedgerEvent::PoliciesSettled(settlement));
            }
            Ok(outcome)
        })
    }

    pub fn get_consensus_request(
        &self,
        index: u8,
        airline: Address,
        flight_number: &str,
        timestamp: Timestamp,
    ) -> Option<ConsensusRequest> {
        let key = RequestKey {
            index,
            flight: FlightKey::compute(&airline, flight_number, timestamp),
        };
        self.view(|s| s.oracles.request(&key).cloned())
    }

    /// Requests still waiting for quorum
    pub fn open_requests(&self) -> Vec<ConsensusRequest> {
        self.view(|s| s.oracles.open_requests().into_iter().cloned().collect())
    }

    /// Seed behind oracle index assignment, for audits
    pub fn index_seed(&self) -> [u8; 32] {
        self.view(|s| s.oracles.seed())
    }

    // ------------------------------------------------------------------
    // Insurance ledger
    // ------------------------------------------------------------------

    /// Buy a policy on an insurable flight
    pub fn buy_insurance(&self, caller: Address, key: FlightKey, amount: Amount) -> LedgerResult<PolicyId> {
        self.commit(|state, events| {
            state.gate.require_operational()?;
            let flight = state.flights.require(&key)?;
            if !flight.is_open() {
                return Err(LedgerError::FlightNotInsurable(key));
            }
            state.insurance.check_premium(amount)?;

            let policy = state.insurance.open_policy(caller, key, amount)?;
            state.flights.attach_policy(&key, policy)?;
            events.push(LedgerEvent::InsurancePurchased {
                policy,
                passenger: caller,
                flight: key,
                premium: amount,
            });
            Ok(policy)
        })
    }

    /// Outstanding credits of a passenger
    pub fn check_credits(&self, caller: &Address) -> Amount {
        self.view(|s| s.insurance.credits(caller))
    }

    pub fn get_policies(&self, passenger: &Address) -> Vec<InsurancePolicy> {
        self.view(|s| s.insurance.policies_of(passenger).into_iter().cloned().collect())
    }

    /// Pay out `amount` of the caller's credits. Returns the remaining balance.
    ///
    /// The balance is debited before the treasury is called; a failed
    /// transfer restores it and the call fails with `WithdrawalFailed`.
    pub fn withdraw_credits(&self, caller: Address, amount: Amount) -> LedgerResult<Amount> {
        let guard = self.state.lock();
        {
            let mut state = guard.borrow_mut();
            state
                .gate
                .require_operational()
                .and_then(|_| state.insurance.debit(&caller, amount))
                .map_err(|e| {
                    debug!("Operation rejected: {}", e);
                    e
                })?;
        }

        if let Err(e) = self.treasury.transfer(&caller, amount) {
            warn!("Payout of {} to {} failed, restoring balance: {}", amount, caller, e);
            guard.borrow_mut().insurance.restore(&caller, amount);
            return Err(LedgerError::WithdrawalFailed(e.to_string()));
        }

        let event = LedgerEvent::CreditsWithdrawn { passenger: caller, amount };
        let remaining = {
            let mut state = guard.borrow_mut();
            state.log.push(event.clone());
            state.insurance.credits(&caller)
        };
        info!("Paid {} to {}, {} remaining", amount, caller, remaining);
        self.dispatch(std::slice::from_ref(&event));
        Ok(remaining)
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    /// Every event emitted so far, in order
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.view(|s| s.log.clone())
    }
}
