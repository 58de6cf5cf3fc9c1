//! Read access to the local chain, and an in-memory chain store.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use strata_primitives::{Account, Address, Block, BlockNumber, ChainConfig, Hash, Header};

use crate::state::{state_root, MemoryState};

/// Read-only view of stored headers, blocks and states.
///
/// Shared with header verification workers, so implementations synchronise
/// internally.
pub trait ChainReader: Send + Sync {
    fn config(&self) -> &ChainConfig;

    /// Head of the canonical chain.
    fn current_header(&self) -> Header;

    /// Header by hash, only if it sits at `number`.
    fn header(&self, hash: &Hash, number: BlockNumber) -> Option<Header>;

    fn header_by_hash(&self, hash: &Hash) -> Option<Header>;

    /// Canonical header at `number`.
    fn header_by_number(&self, number: BlockNumber) -> Option<Header>;

    fn has_block(&self, hash: &Hash, number: BlockNumber) -> bool;

    /// Block is stored and its post-state is still available.
    fn has_block_and_state(&self, hash: &Hash, number: BlockNumber) -> bool;
}

#[derive(Debug, Default)]
struct Store {
    blocks: HashMap<Hash, Block>,
    canonical: BTreeMap<BlockNumber, Hash>,
    states: HashMap<Hash, BTreeMap<Address, Account>>,
    head: Hash,
}

impl Store {
    fn header(&self, hash: &Hash) -> Option<&Header> {
        self.blocks.get(hash).map(|block| &block.header)
    }

    fn insert(&mut self, block: Block, accounts: BTreeMap<Address, Account>) {
        let hash = block.hash();
        let number = block.number();
        let extends_head = self.blocks.is_empty() || block.parent_hash() == self.head;
        self.states.insert(block.header.state_root, accounts);
        self.blocks.insert(hash, block);
        if extends_head {
            self.canonical.retain(|n, _| *n < number);
            self.canonical.insert(number, hash);
            self.head = hash;
        }
    }
}

/// [`ChainReader`] over headers, bodies, the canonical index and committed
/// account states keyed by state root.
#[derive(Debug)]
pub struct MemoryChain {
    config: ChainConfig,
    store: RwLock<Store>,
}

impl MemoryChain {
    /// Create a chain whose head is `genesis` with the given allocation.
    pub fn with_genesis(
        config: ChainConfig,
        genesis: Block,
        accounts: BTreeMap<Address, Account>,
    ) -> Self {
        let mut store = Store::default();
        store.insert(genesis, accounts);
        Self {
            config,
            store: RwLock::new(store),
        }
    }

    /// Store a block and the finalised state it produced. The block becomes
    /// the head if it extends the current head.
    pub fn write_block_with_state(&self, block: Block, state: &MemoryState) {
        let accounts = state.accounts(self.config.is_eip158(block.number()));
        self.store.write().insert(block, accounts);
    }

    /// Open a fresh state at `root`.
    pub fn state_at(&self, root: &Hash) -> Option<MemoryState> {
        self.store
            .read()
            .states
            .get(root)
            .cloned()
            .map(MemoryState::new)
    }

    /// Drop the state stored under `root`. Returns whether it was present.
    pub fn prune_state(&self, root: &Hash) -> bool {
        self.store.write().states.remove(root).is_some()
    }

    pub fn block_by_hash(&self, hash: &Hash) -> Option<Block> {
        self.store.read().blocks.get(hash).cloned()
    }

    pub fn current_block(&self) -> Option<Block> {
        let store = self.store.read();
        store.blocks.get(&store.head).cloned()
    }

    /// A state is stored under `root` and its accounts hash to it.
    pub fn has_state(&self, root: &Hash) -> bool {
        self.store
            .read()
            .states
            .get(root)
            .is_some_and(|accounts| &state_root(accounts) == root)
    }
}

impl ChainReader for MemoryChain {
    fn config(&self) -> &ChainConfig {
        &self.config
    }

    fn current_header(&self) -> Header {
        let store = self.store.read();
        store.header(&store.head).cloned().unwrap_or_default()
    }

    fn header(&self, hash: &Hash, number: BlockNumber) -> Option<Header> {
        self.store
            .read()
            .header(hash)
            .filter(|header| header.number == number)
            .cloned()
    }

    fn header_by_hash(&self, hash: &Hash) -> Option<Header> {
        self.store.read().header(hash).cloned()
    }

    fn header_by_number(&self, number: BlockNumber) -> Option<Header> {
        let store = self.store.read();
        let hash = store.canonical.get(&number)?;
        store.header(hash).cloned()
    }

    fn has_block(&self, hash: &Hash, number: BlockNumber) -> bool {
        self.header(hash, number).is_some()
    }

    fn has_block_and_state(&self, hash: &Hash, number: BlockNumber) -> bool {
        let store = self.store.read();
        match store.header(hash) {
            Some(header) if header.number == number => store.states.contains_key(&header.state_root),
            _ => false,
        }
    }
}
