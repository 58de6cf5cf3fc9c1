//! Accounts and the dirty-account overlay.
//!
//! The overlay buffers account writes made while executing a block and makes
//! them visible to later reads in the same execution. Finalising drains the
//! overlay into committed state; when empty-account pruning is active, dirty
//! accounts that ended up empty are deleted instead of written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{Address, Balance};

/// Account leaf of the world state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub nonce: u64,
    pub balance: Balance,
}

impl Account {
    /// An account with zero nonce and zero balance.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.balance == 0
    }
}

/// Result of looking up an address in the overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayResult {
    /// Address was written in the overlay with this account.
    Found(Account),
    /// Address was explicitly deleted in this overlay.
    Deleted,
    /// Address is not in the overlay; the caller must check committed state.
    NotInOverlay,
}

/// Write buffer of dirty accounts overlaying committed state.
///
/// Uses `BTreeMap` for deterministic iteration order.
#[derive(Debug, Clone, Default)]
pub struct StateOverlay {
    /// Some(account) for writes, None for deletions.
    writes: BTreeMap<Address, Option<Account>>,
}

impl StateOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a write, replacing any previous entry for the address.
    pub fn set(&mut self, address: Address, account: Account) {
        self.writes.insert(address, Some(account));
    }

    /// Mark an address as deleted.
    pub fn delete(&mut self, address: Address) {
        self.writes.insert(address, None);
    }

    pub fn get(&self, address: &Address) -> OverlayResult {
        match self.writes.get(address) {
            Some(Some(account)) => OverlayResult::Found(*account),
            Some(None) => OverlayResult::Deleted,
            None => OverlayResult::NotInOverlay,
        }
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.writes.contains_key(address)
    }

    /// Buffered writes, in address order.
    pub fn writes(&self) -> &BTreeMap<Address, Option<Account>> {
        &self.writes
    }

    /// Consume the overlay and return its writes.
    ///
    /// With `delete_empty`, written accounts that are empty come back as
    /// deletions.
    pub fn drain(self, delete_empty: bool) -> BTreeMap<Address, Option<Account>> {
        self.writes
            .into_iter()
            .map(|(address, account)| match account {
                Some(account) if delete_empty && account.is_empty() => (address, None),
                other => (address, other),
            })
            .collect()
    }

    /// Apply this overlay's writes onto a committed account map.
    pub fn apply_to(self, committed: &mut BTreeMap<Address, Account>, delete_empty: bool) {
        for (address, account) in self.drain(delete_empty) {
            match account {
                Some(account) => {
                    committed.insert(address, account);
                }
                None => {
                    committed.remove(&address);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.writes.clear();
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}
