//! External value transfer used by withdrawals

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::types::{Address, Amount};

/// Failure reported by the value-transfer backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("Transfer rejected: {0}")]
    Rejected(String),

    #[error("Reserve exhausted: requested {requested}, remaining {remaining}")]
    ReserveExhausted { requested: Amount, remaining: Amount },
}

/// Moves value out of the ledger to a passenger.
///
/// Called while the ledger's commit boundary is held, after the
/// passenger's balance has already been debited. Calling back into the
/// ledger from here is allowed.
pub trait Treasury: Send + Sync {
    fn transfer(&self, to: &Address, amount: Amount) -> Result<(), TransferError>;
}

/// Treasury that records payouts, optionally bounded by a reserve
#[derive(Default)]
pub struct InMemoryTreasury {
    paid: Mutex<HashMap<Address, Amount>>,
    reserve: Mutex<Option<Amount>>,
}

impl InMemoryTreasury {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit total payouts to `reserve`
    pub fn with_reserve(reserve: Amount) -> Self {
        Self {
            paid: Mutex::new(HashMap::new()),
            reserve: Mutex::new(Some(reserve)),
        }
    }

    /// Total paid to `to`
    pub fn paid_to(&self, to: &Address) -> Amount {
        self.paid.lock().get(to).copied().unwrap_or(0)
    }

    pub fn total_paid(&self) -> Amount {
        self.paid.lock().values().sum()
    }
}

impl Treasury for InMemoryTreasury {
    fn transfer(&self, to: &Address, amount: Amount) -> Result<(), TransferError> {
        let mut reserve = self.reserve.lock();
        if let Some(remaining) = reserve.as_mut() {
            if amount > *remaining {
                return Err(TransferError::ReserveExhausted { requested: amount, remaining: *remaining });
            }
            *remaining -= amount;
        }
        *self.paid.lock().entry(*to).or_insert(0) += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_treasury_records() {
        let treasury = InMemoryTreasury::new();
        let to = Address::from_label("passenger");
        treasury.transfer(&to, 5).unwrap();
        treasury.transfer(&to, 7).unwrap();
        assert_eq!(treasury.paid_to(&to), 12);
    }

    #[test]
    fn test_reserve_limits_payouts() {
        let treasury = InMemoryTreasury::with_reserve(10);
        let to = Address::from_label("passenger");
        treasury.transfer(&to, 6).unwrap();
        assert_eq!(
            treasury.transfer(&to, 6),
            Err(TransferError::ReserveExhausted { requested: 6, remaining: 4 })
        );
        assert_eq!(treasury.total_paid(), 6);
    }
}
