//! Block, transaction, receipt and log types.
//!
//! Headers and transactions are identified by the SHA-256 of their canonical
//! encoding (see [`crate::codec`]). Values are immutable once built; the
//! processor only fills receipt and log back-references after execution.

use bytes::Bytes;
use ed25519_dalek::SigningKey;

use crate::bloom::Bloom;
use crate::codec;
use crate::crypto::{hash_sha256, sign_ed25519, verify_ed25519};
use crate::error::SignatureError;
use crate::merkle::derive_root;
use crate::types::{Address, Balance, BlockNumber, Hash, ZERO_HASH};

/// Block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Hash of the parent block's header.
    pub parent_hash: Hash,
    /// Hash of the uncle list; always the empty-list hash on this chain.
    pub uncle_hash: Hash,
    /// Beneficiary of transaction fees and block rewards.
    pub coinbase: Address,
    /// Account state root after executing this block.
    pub state_root: Hash,
    /// Ordered root of the transaction list.
    pub tx_root: Hash,
    /// Ordered root of the receipt list.
    pub receipt_root: Hash,
    /// Union of all receipt blooms.
    pub bloom: Bloom,
    /// 2 for in-turn proof-of-authority blocks, 1 otherwise.
    pub difficulty: u64,
    pub number: BlockNumber,
    pub gas_limit: u64,
    pub gas_used: u64,
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Vanity, checkpoint signer list and seal.
    pub extra_data: Bytes,
}

impl Header {
    /// Content hash of this header.
    pub fn hash(&self) -> Hash {
        hash_sha256(&codec::encode_header(self))
    }
}

impl Default for Header {
    fn default() -> Self {
        Self {
            parent_hash: ZERO_HASH,
            uncle_hash: empty_uncle_hash(),
            coinbase: [0u8; 32],
            state_root: ZERO_HASH,
            tx_root: ZERO_HASH,
            receipt_root: ZERO_HASH,
            bloom: Bloom::EMPTY,
            difficulty: 0,
            number: 0,
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra_data: Bytes::new(),
        }
    }
}

/// What a transaction does once its gas is bought.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPayload {
    /// Move `value` from the sender to `to`.
    Transfer { to: Address, value: Balance },
    /// Emit a log from the sender's address.
    Emit { topics: Vec<Hash>, data: Bytes },
}

/// A signed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    pub payload: TxPayload,
    /// Sender public key.
    pub from: Address,
    /// Ed25519 signature over [`Transaction::signing_hash`].
    pub signature: [u8; 64],
}

impl Transaction {
    /// Build and sign a transaction with `key`.
    pub fn sign(
        nonce: u64,
        gas_price: u64,
        gas_limit: u64,
        payload: TxPayload,
        key: &SigningKey,
    ) -> Self {
        let mut tx = Self {
            nonce,
            gas_price,
            gas_limit,
            payload,
            from: key.verifying_key().to_bytes(),
            signature: [0u8; 64],
        };
        tx.signature = sign_ed25519(&tx.signing_hash(), key);
        tx
    }

    /// Hash covered by the signature (every field except the signature).
    pub fn signing_hash(&self) -> Hash {
        hash_sha256(&codec::encode_unsigned_transaction(self))
    }

    /// Content hash of the signed transaction.
    pub fn hash(&self) -> Hash {
        hash_sha256(&codec::encode_transaction(self))
    }

    /// Recover the sender by verifying the signature against `from`.
    pub fn sender(&self) -> Result<Address, SignatureError> {
        verify_ed25519(&self.signing_hash(), &self.signature, &self.from)?;
        Ok(self.from)
    }

    /// Number of payload data bytes (charged by intrinsic gas).
    pub fn data_len(&self) -> usize {
        match &self.payload {
            TxPayload::Transfer { .. } => 0,
            TxPayload::Emit { topics, data } => topics.len() * 32 + data.len(),
        }
    }
}

/// A log emitted during transaction execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    // Consensus fields.
    pub address: Address,
    pub topics: Vec<Hash>,
    pub data: Bytes,

    // Derived fields, filled by the state backend for attribution.
    pub block_number: BlockNumber,
    pub tx_hash: Hash,
    pub tx_index: u32,
    pub block_hash: Hash,
    /// Position of the log within the block.
    pub index: u32,
}

impl Log {
    pub fn new(address: Address, topics: Vec<Hash>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
            block_number: 0,
            tx_hash: ZERO_HASH,
            tx_index: 0,
            block_hash: ZERO_HASH,
            index: 0,
        }
    }
}

/// Outcome of a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    // Consensus fields.
    /// Intermediate state root, only tracked before Byzantium.
    pub post_state: Option<Hash>,
    /// False when execution failed (gas was still charged).
    pub status: bool,
    pub cumulative_gas_used: u64,
    pub bloom: Bloom,
    pub logs: Vec<Log>,

    // Back-references, filled after execution.
    pub tx_hash: Hash,
    pub gas_used: u64,
    pub block_hash: Hash,
    pub block_number: BlockNumber,
    pub tx_index: u32,
}

impl Receipt {
    pub fn new(post_state: Option<Hash>, failed: bool, cumulative_gas_used: u64) -> Self {
        Self {
            post_state,
            status: !failed,
            cumulative_gas_used,
            bloom: Bloom::EMPTY,
            logs: Vec::new(),
            tx_hash: ZERO_HASH,
            gas_used: 0,
            block_hash: ZERO_HASH,
            block_number: 0,
            tx_index: 0,
        }
    }
}

/// Full block with ordered transactions and uncles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    pub uncles: Vec<Header>,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>, uncles: Vec<Header>) -> Self {
        Self {
            header,
            transactions,
            uncles,
        }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn number(&self) -> BlockNumber {
        self.header.number
    }

    pub fn parent_hash(&self) -> Hash {
        self.header.parent_hash
    }

    pub fn gas_limit(&self) -> u64 {
        self.header.gas_limit
    }

    pub fn gas_used(&self) -> u64 {
        self.header.gas_used
    }

    /// Returns the number of transactions in this block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Returns true if this block has no transactions.
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// Ordered root over the canonical transaction encodings.
pub fn tx_root(transactions: &[Transaction]) -> Hash {
    derive_root(transactions, codec::encode_transaction)
}

/// Ordered root over the consensus encodings of receipts.
pub fn receipt_root(receipts: &[Receipt]) -> Hash {
    derive_root(receipts, codec::encode_receipt)
}

/// Hash of an uncle list.
pub fn calc_uncle_hash(uncles: &[Header]) -> Hash {
    hash_sha256(&codec::encode_headers(uncles))
}

/// Hash of the empty uncle list, required in every header on this chain.
pub fn empty_uncle_hash() -> Hash {
    calc_uncle_hash(&[])
}
