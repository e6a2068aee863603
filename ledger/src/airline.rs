//! Airline governance
//!
//! Admission is a two-state machine (Applied → Approved) with an
//! orthogonal funded flag:
//! - While fewer than `fast_track_limit` airlines are Approved, a
//!   participating airline admits a newcomer directly
//! - Past that, newcomers become candidates and need votes from strictly
//!   more than half of the Approved airlines, counted at each vote
//! - Only Approved and funded airlines participate (vote, admit, fly)

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::LedgerError;
use crate::types::{Address, Amount};
use crate::LedgerResult;

/// Distinct votes a candidate needs with `approved` airlines admitted:
/// strictly more than half
pub fn approval_threshold(approved: usize) -> usize {
    approved / 2 + 1
}

/// Admission state of an airline
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionState {
    /// Candidacy open, collecting votes
    Applied,
    /// Admitted to the consortium
    Approved,
}

/// An airline record. Never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Airline {
    /// Account identity
    pub address: Address,
    /// Display name
    pub name: String,
    /// Admission state
    pub state: AdmissionState,
    /// Whether the minimum stake has been paid
    pub funded: bool,
    /// Total stake paid in
    pub stake: Amount,
    /// Distinct approved airlines that voted for this candidacy
    voters: BTreeSet<Address>,
}

impl Airline {
    fn new(address: Address, name: String, state: AdmissionState) -> Self {
        Self {
            address,
            name,
            state,
            funded: false,
            stake: 0,
            voters: BTreeSet::new(),
        }
    }

    /// Approved and funded
    pub fn is_participant(&self) -> bool {
        self.state == AdmissionState::Approved && self.funded
    }

    /// Number of distinct voters
    pub fn votes(&self) -> usize {
        self.voters.len()
    }

    pub fn voted_by(&self, voter: &Address) -> bool {
        self.voters.contains(voter)
    }

    pub fn voters(&self) -> impl Iterator<Item = &Address> {
        self.voters.iter()
    }
}

/// Result of a vote on a candidacy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalOutcome {
    /// Vote recorded, candidate still below the threshold
    ThresholdNotMet { votes: usize, required: usize },
    /// This vote admitted the candidate
    Approved { votes: usize, required: usize },
}

impl ApprovalOutcome {
    pub fn is_approved(&self) -> bool {
        matches!(self, ApprovalOutcome::Approved { .. })
    }
}

/// Admission registry with efficient lookups
#[derive(Clone, Debug)]
pub struct AirlineRegistry {
    /// Airlines by address
    airlines: HashMap<Address, Airline>,
    /// Registration order
    order: Vec<Address>,
    /// Approved airlines, funded or not
    approved_count: usize,
    /// Approved count below which admission skips voting
    fast_track_limit: usize,
    /// Minimum stake per funding call
    min_funding: Amount,
}

impl AirlineRegistry {
    pub fn new(fast_track_limit: usize, min_funding: Amount) -> Self {
        Self {
            airlines: HashMap::new(),
            order: Vec::new(),
            approved_count: 0,
            fast_track_limit,
            min_funding,
        }
    }

    /// Admit the first airline without a sponsor. It still has to fund.
    pub fn seed(&mut self, address: Address, name: impl Into<String>) -> LedgerResult<()> {
        if self.airlines.contains_key(&address) {
            return Err(LedgerError::AlreadyRegistered(format!("airline {}", address)));
        }
        self.insert(Airline::new(address, name.into(), AdmissionState::Approved));
        info!("Seed airline {} admitted", address);
        Ok(())
    }

    fn insert(&mut self, airline: Airline) {
        if airline.state == AdmissionState::Approved {
            self.approved_count += 1;
        }
        self.order.push(airline.address);
        self.airlines.insert(airline.address, airline);
    }

    /// Approved and funded
    pub fn is_airline(&self, address: &Address) -> bool {
        self.airlines
            .get(address)
            .map(Airline::is_participant)
            .unwrap_or(false)
    }

    pub fn require_airline(&self, caller: &Address) -> LedgerResult<()> {
        if self.is_airline(caller) {
            Ok(())
        } else {
            Err(LedgerError::NotAuthorized(*caller))
        }
    }

    pub fn get(&self, address: &Address) -> Option<&Airline> {
        self.airlines.get(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.airlines.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.airlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.airlines.is_empty()
    }

    pub fn approved_count(&self) -> usize {
        self.approved_count
    }

    /// Distinct votes a candidate needs right now
    pub fn approval_threshold(&self) -> usize {
        approval_threshold(self.approved_count)
    }

    /// Approved airlines in registration order
    pub fn approved(&self) -> Vec<&Airline> {
        self.order
            .iter()
            .filter_map(|a| self.airlines.get(a))
            .filter(|a| a.state == AdmissionState::Approved)
            .collect()
    }

    /// Open candidacies in registration order
    pub fn candidates(&self) -> Vec<&Airline> {
        self.order
            .iter()
            .filter_map(|a| self.airlines.get(a))
            .filter(|a| a.state == AdmissionState::Applied)
            .collect()
    }

    /// Register `new_airline`, either sponsored by a participating airline
    /// or as a self-nominated candidate.
    pub fn register(
        &mut self,
        caller: &Address,
        new_airline: Address,
        name: impl Into<String>,
    ) -> LedgerResult<AdmissionState> {
        if self.airlines.contains_key(&new_airline) {
            return Err(LedgerError::AlreadyRegistered(format!("airline {}", new_airline)));
        }

        let state = if *caller == new_airline {
            AdmissionState::Applied
        } else {
            self.require_airline(caller)?;
            if self.approved_count < self.fast_track_limit {
                AdmissionState::Approved
            } else {
                AdmissionState::Applied
            }
        };

        let name = name.into();
        match state {
            AdmissionState::Approved => info!("Airline {} ({}) admitted by {}", name, new_airline, caller),
            AdmissionState::Applied => info!("Airline {} ({}) applied for admission", name, new_airline),
        }
        self.insert(Airline::new(new_airline, name, state));
        Ok(state)
    }

    /// Cast `caller`'s vote for `target`'s candidacy
    pub fn approve(&mut self, caller: &Address, target: &Address) -> LedgerResult<ApprovalOutcome> {
        self.require_airline(caller)?;
        let required = self.approval_threshold();

        let airline = self.airlines
            .get_mut(target)
            .ok_or(LedgerError::AirlineNotFound(*target))?;
        if airline.state != AdmissionState::Applied {
            return Err(LedgerError::NotACandidate(*target));
        }

        if !airline.voters.insert(*caller) {
            debug!("Repeated vote from {} for {} ignored", caller, target);
        }
        let votes = airline.voters.len();

        if votes >= required {
            airline.state = AdmissionState::Approved;
            self.approved_count += 1;
            info!("Airline {} approved with {}/{} votes", target, votes, required);
            Ok(ApprovalOutcome::Approved { votes, required })
        } else {
            debug!("Airline {} has {}/{} votes", target, votes, required);
            Ok(ApprovalOutcome::ThresholdNotMet { votes, required })
        }
    }

    /// Pay stake for `address`. `privileged` callers may fund any airline.
    /// Returns whether this call flipped the funded flag.
    pub fn fund(
        &mut self,
        caller: &Address,
        address: &Address,
        amount: Amount,
        privileged: bool,
    ) -> LedgerResult<bool> {
        if caller != address && !privileged {
            return Err(LedgerError::NotAuthorized(*caller));
        }
        if amount < self.min_funding {
            return Err(LedgerError::InsufficientFunding {
                provided: amount,
                required: self.min_funding,
            });
        }
        let airline = self.airlines
            .get_mut(address)
            .ok_or(LedgerError::AirlineNotFound(*address))?;

        airline.stake = airline.stake.saturating_add(amount);
        let newly_funded = !airline.funded;
        airline.funded = true;
        info!("Airline {} funded {} (total stake {})", address, amount, airline.stake);
        Ok(newly_funded)
    }
}
