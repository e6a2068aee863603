//! Access gate: pause flag, administrator and authorized operators

use std::collections::HashSet;

use crate::errors::LedgerError;
use crate::types::Address;
use crate::LedgerResult;

/// Process-wide access control consulted by every mutating operation
#[derive(Clone, Debug)]
pub struct AccessGate {
    /// Administrator identity, fixed at construction
    admin: Address,
    /// Whether mutating operations are accepted
    operational: bool,
    /// Operators allowed to act on behalf of airlines
    authorized: HashSet<Address>,
}

impl AccessGate {
    /// Create an operational gate owned by `admin`
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            operational: true,
            authorized: HashSet::new(),
        }
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    /// Fail fast while paused
    pub fn require_operational(&self) -> LedgerResult<()> {
        if self.operational {
            Ok(())
        } else {
            Err(LedgerError::NotOperational)
        }
    }

    fn require_admin(&self, caller: &Address) -> LedgerResult<()> {
        if *caller == self.admin {
            Ok(())
        } else {
            Err(LedgerError::NotAuthorized(*caller))
        }
    }

    /// Toggle the pause flag. Returns whether the flag changed.
    pub fn set_operating_status(&mut self, caller: &Address, value: bool) -> LedgerResult<bool> {
        self.require_admin(caller)?;
        let changed = self.operational != value;
        self.operational = value;
        Ok(changed)
    }

    /// Grant operator rights. Returns false if already granted.
    pub fn authorize_caller(&mut self, caller: &Address, operator: Address) -> LedgerResult<bool> {
        self.require_admin(caller)?;
        self.require_operational()?;
        Ok(self.authorized.insert(operator))
    }

    /// Revoke operator rights. Returns false if not granted.
    pub fn deauthorize_caller(&mut self, caller: &Address, operator: &Address) -> LedgerResult<bool> {
        self.require_admin(caller)?;
        self.require_operational()?;
        Ok(self.authorized.remove(operator))
    }

    /// Administrator or an authorized operator
    pub fn is_privileged(&self, caller: &Address) -> bool {
        *caller == self.admin || self.authorized.contains(caller)
    }

    pub fn is_authorized_caller(&self, operator: &Address) -> bool {
        self.authorized.contains(operator)
    }
}
