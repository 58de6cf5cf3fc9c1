//! Account state seen by the processor.
//!
//! [`StateBackend`] is the capability the processor and executors mutate.
//! [`MemoryState`] implements it over a committed account map plus a dirty
//! overlay: reads see committed state with the overlay on top, `finalise`
//! folds the overlay in, and `intermediate_root` computes the root the state
//! would have after finalising without changing anything.

use std::collections::BTreeMap;

use serde::Serialize;
use strata_primitives::codec::encode_account;
use strata_primitives::types::hash_to_hex;
use strata_primitives::{
    Account, Address, Balance, Hash, Log, MerkleTree, OverlayResult, StateError, StateOverlay,
    ZERO_HASH,
};

/// Mutable account state for one block's execution.
pub trait StateBackend {
    fn balance(&self, address: &Address) -> Balance;

    fn add_balance(&mut self, address: &Address, amount: Balance) -> Result<(), StateError>;

    fn sub_balance(&mut self, address: &Address, amount: Balance) -> Result<(), StateError>;

    fn nonce(&self, address: &Address) -> u64;

    fn set_nonce(&mut self, address: &Address, nonce: u64);

    /// Set the transaction that subsequent logs are attributed to.
    fn prepare(&mut self, tx_hash: Hash, block_hash: Hash, tx_index: u32);

    /// Record a log for the prepared transaction. Fills the tx hash, tx
    /// index, block hash and block-wide log index.
    fn add_log(&mut self, log: Log);

    /// Logs recorded for `tx_hash`, in emission order.
    fn logs(&self, tx_hash: &Hash) -> Vec<Log>;

    /// Fold dirty accounts into committed state. With `delete_empty`, dirty
    /// accounts that are empty are removed.
    fn finalise(&mut self, delete_empty: bool);

    /// Root of the state as it would be after `finalise(delete_empty)`.
    fn intermediate_root(&self, delete_empty: bool) -> Hash;

    fn tx_index(&self) -> u32;

    fn block_hash(&self) -> Hash;
}

/// Root over an account map: sorted Merkle root of encoded accounts keyed
/// by address.
pub fn state_root(accounts: &BTreeMap<Address, Account>) -> Hash {
    if accounts.is_empty() {
        return ZERO_HASH;
    }
    let mut tree = MerkleTree::new();
    for (address, account) in accounts {
        tree.insert(address, encode_account(account));
    }
    tree.root()
}

/// In-memory [`StateBackend`].
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    committed: BTreeMap<Address, Account>,
    overlay: StateOverlay,
    logs: BTreeMap<Hash, Vec<Log>>,
    log_size: u32,
    tx_hash: Hash,
    block_hash: Hash,
    tx_index: u32,
}

#[derive(Serialize)]
struct Dump {
    root: String,
    accounts: BTreeMap<String, Account>,
}

impl MemoryState {
    pub fn new(committed: BTreeMap<Address, Account>) -> Self {
        Self {
            committed,
            ..Self::default()
        }
    }

    /// Current view of one account (overlay first, then committed).
    pub fn account(&self, address: &Address) -> Account {
        match self.overlay.get(address) {
            OverlayResult::Found(account) => account,
            OverlayResult::Deleted => Account::default(),
            OverlayResult::NotInOverlay => self.committed.get(address).copied().unwrap_or_default(),
        }
    }

    /// Returns true if the account exists in the current view.
    pub fn exists(&self, address: &Address) -> bool {
        match self.overlay.get(address) {
            OverlayResult::Found(_) => true,
            OverlayResult::Deleted => false,
            OverlayResult::NotInOverlay => self.committed.contains_key(address),
        }
    }

    /// Accounts as they would be after `finalise(delete_empty)`.
    pub fn accounts(&self, delete_empty: bool) -> BTreeMap<Address, Account> {
        let mut accounts = self.committed.clone();
        self.overlay.clone().apply_to(&mut accounts, delete_empty);
        accounts
    }

    /// JSON view of the finalised accounts and their root.
    pub fn dump(&self) -> Result<String, serde_json::Error> {
        let accounts = self.accounts(false);
        let dump = Dump {
            root: hash_to_hex(&state_root(&accounts)),
            accounts: accounts
                .iter()
                .map(|(address, account)| (hash_to_hex(address), *account))
                .collect(),
        };
        serde_json::to_string_pretty(&dump)
    }

    fn update(&mut self, address: &Address, f: impl FnOnce(&mut Account)) {
        let mut account = self.account(address);
        f(&mut account);
        self.overlay.set(*address, account);
    }
}

impl StateBackend for MemoryState {
    fn balance(&self, address: &Address) -> Balance {
        self.account(address).balance
    }

    fn add_balance(&mut self, address: &Address, amount: Balance) -> Result<(), StateError> {
        let have = self.balance(address);
        let balance = have
            .checked_add(amount)
            .ok_or(StateError::BalanceOverflow { have, amount })?;
        // Touch even for zero amounts so empty-account pruning sees it.
        self.update(address, |account| account.balance = balance);
        Ok(())
    }

    fn sub_balance(&mut self, address: &Address, amount: Balance) -> Result<(), StateError> {
        let have = self.balance(address);
        let balance = have
            .checked_sub(amount)
            .ok_or(StateError::InsufficientBalance { have, want: amount })?;
        self.update(address, |account| account.balance = balance);
        Ok(())
    }

    fn nonce(&self, address: &Address) -> u64 {
        self.account(address).nonce
    }

    fn set_nonce(&mut self, address: &Address, nonce: u64) {
        self.update(address, |account| account.nonce = nonce);
    }

    fn prepare(&mut self, tx_hash: Hash, block_hash: Hash, tx_index: u32) {
        self.tx_hash = tx_hash;
        self.block_hash = block_hash;
        self.tx_index = tx_index;
    }

    fn add_log(&mut self, mut log: Log) {
        log.tx_hash = self.tx_hash;
        log.tx_index = self.tx_index;
        log.block_hash = self.block_hash;
        log.index = self.log_size;
        self.logs.entry(self.tx_hash).or_default().push(log);
        self.log_size += 1;
    }

    fn logs(&self, tx_hash: &Hash) -> Vec<Log> {
        self.logs.get(tx_hash).cloned().unwrap_or_default()
    }

    fn finalise(&mut self, delete_empty: bool) {
        let overlay = std::mem::take(&mut self.overlay);
        overlay.apply_to(&mut self.committed, delete_empty);
    }

    fn intermediate_root(&self, delete_empty: bool) -> Hash {
        state_root(&self.accounts(delete_empty))
    }

    fn tx_index(&self) -> u32 {
        self.tx_index
    }

    fn block_hash(&self) -> Hash {
        self.block_hash
    }
}
