//! Insurance escrow ledger
//!
//! Premiums are recorded per policy. When oracle consensus finalizes a
//! flight, every open policy on it is settled exactly once: a LateAirline
//! outcome credits `premium × multiplier` to the passenger, any other
//! outcome settles with zero credit. Passengers withdraw from the sum of
//! their credits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::LedgerError;
use crate::types::{Address, Amount, FlightKey, FlightStatus};
use crate::LedgerResult;

/// Basis-point denominator for the payout multiplier
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Sequential policy identifier
pub type PolicyId = u64;

/// An insurance policy sold against one flight
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub id: PolicyId,
    pub passenger: Address,
    pub flight: FlightKey,
    pub premium: Amount,
    /// Zero until settlement, fixed afterwards
    pub credited: Amount,
    pub settled: bool,
}

/// Per-passenger credit totals
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditAccount {
    /// Total ever credited by settlements
    pub credited: Amount,
    /// Total ever withdrawn
    pub withdrawn: Amount,
}

impl CreditAccount {
    /// Outstanding balance
    pub fn available(&self) -> Amount {
        self.credited - self.withdrawn
    }
}

/// Summary of one flight's settlement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub flight: FlightKey,
    pub status: FlightStatus,
    /// Policies settled by this run
    pub policies_settled: usize,
    /// Sum credited by this run
    pub total_credited: Amount,
}

/// Policies and credit balances
#[derive(Clone, Debug)]
pub struct InsuranceBook {
    policies: HashMap<PolicyId, InsurancePolicy>,
    by_passenger: HashMap<Address, Vec<PolicyId>>,
    accounts: HashMap<Address, CreditAccount>,
    next_id: PolicyId,
    payout_multiplier_bps: u64,
    max_premium: Option<Amount>,
}

impl InsuranceBook {
    pub fn new(payout_multiplier_bps: u64, max_premium: Option<Amount>) -> Self {
        Self {
            policies: HashMap::new(),
            by_passenger: HashMap::new(),
            accounts: HashMap::new(),
            next_id: 0,
            payout_multiplier_bps,
            max_premium,
        }
    }

    /// Credit owed for a premium on a LateAirline outcome
    pub fn payout_for(&self, premium: Amount) -> Amount {
        let credited = premium as u128 * self.payout_multiplier_bps as u128
            / BPS_DENOMINATOR as u128;
        Amount::try_from(credited).unwrap_or(Amount::MAX)
    }

    /// Validate a premium before any state is touched
    pub fn check_premium(&self, amount: Amount) -> LedgerResult<()> {
        if amount == 0 {
            return Err(LedgerError::InsufficientPayment);
        }
        if let Some(max) = self.max_premium {
            if amount > max {
                return Err(LedgerError::PremiumTooHigh { provided: amount, max });
            }
        }
        Ok(())
    }

    /// Record a new unsettled policy. The flight must already be checked open.
    pub(crate) fn open_policy(
        &mut self,
        passenger: Address,
        flight: FlightKey,
        premium: Amount,
    ) -> LedgerResult<PolicyId> {
        self.check_premium(premium)?;

        let id = self.next_id;
        self.next_id += 1;
        self.policies.insert(id, InsurancePolicy {
            id,
            passenger,
            flight,
            premium,
            credited: 0,
            settled: false,
        });
        self.by_passenger.entry(passenger).or_default().push(id);
        info!("Policy {} sold to {} on {} for {}", id, passenger, flight, premium);
        Ok(id)
    }

    /// Settle every listed policy that is still open
    pub(crate) fn settle(
        &mut self,
        flight: FlightKey,
        status: FlightStatus,
        policy_ids: &[PolicyId],
    ) -> Settlement {
        let mut settlement = Settlement {
            flight,
            status,
            policies_settled: 0,
            total_credited: 0,
        };

        for id in policy_ids {
            let payout = match self.policies.get(id) {
                Some(policy) if !policy.settled && status.pays_out() => self.payout_for(policy.premium),
                Some(policy) if !policy.settled => 0,
                _ => continue,
            };
            let Some(policy) = self.policies.get_mut(id) else { continue };

            policy.credited = payout;
            policy.settled = true;
            let account = self.accounts.entry(policy.passenger).or_default();
            account.credited = account.credited.saturating_add(payout);

            settlement.policies_settled += 1;
            settlement.total_credited = settlement.total_credited.saturating_add(payout);
        }

        info!(
            "Settled {} policies on {} as {}: {} credited",
            settlement.policies_settled, flight, status, settlement.total_credited
        );
        settlement
    }

    /// Outstanding credit for a passenger
    pub fn credits(&self, passenger: &Address) -> Amount {
        self.accounts
            .get(passenger)
            .map(CreditAccount::available)
            .unwrap_or(0)
    }

    pub fn account(&self, passenger: &Address) -> CreditAccount {
        self.accounts.get(passenger).copied().unwrap_or_default()
    }

    /// Debit before the external transfer happens
    pub(crate) fn debit(&mut self, passenger: &Address, amount: Amount) -> LedgerResult<()> {
        if amount == 0 {
            return Err(LedgerError::InsufficientPayment);
        }
        let available = self.credits(passenger);
        if amount > available {
            return Err(LedgerError::InsufficientCredits { requested: amount, available });
        }
        let account = self.accounts.entry(*passenger).or_default();
        account.withdrawn += amount;
        debug!("Debited {} from {}, {} left", amount, passenger, account.available());
        Ok(())
    }

    /// Roll back a debit whose transfer failed
    pub(crate) fn restore(&mut self, passenger: &Address, amount: Amount) {
        if let Some(account) = self.accounts.get_mut(passenger) {
            account.withdrawn = account.withdrawn.saturating_sub(amount);
        }
    }

    pub fn get(&self, id: PolicyId) -> Option<&InsurancePolicy> {
        self.policies.get(&id)
    }

    /// Policies held by a passenger, in purchase order
    pub fn policies_of(&self, passenger: &Address) -> Vec<&InsurancePolicy> {
        self.by_passenger
            .get(passenger)
            .map(|ids| ids.iter().filter_map(|id| self.policies.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
