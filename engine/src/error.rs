//! Error types for block import.
//!
//! Classification:
//! - [`ValidationError`]: body and post-state checks. `KnownBlock` is
//!   informational, `PrunedAncestor` is recoverable once the ancestor state
//!   is regenerated, everything else rejects the block.
//! - [`ConsensusError`]: a single header failed the consensus rules.
//! - [`ExecError`]: a single transaction could not be applied; always fatal
//!   to its block, wrapped in [`ProcessError`].
//! - [`ImportError`]: anything that stopped a chain insertion.

use strata_primitives::types::{hash_to_hex, Address, Balance, BlockNumber, Hash};
use strata_primitives::{Bloom, GasPoolError, SignatureError, StateError};
use thiserror::Error;

/// Body or post-state validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Block and its state are already stored.
    #[error("block already known")]
    KnownBlock,

    /// Parent block is missing.
    #[error("unknown ancestor")]
    UnknownAncestor,

    /// Parent block is present but its state was pruned.
    #[error("pruned ancestor")]
    PrunedAncestor,

    #[error("uncles not allowed")]
    UnclesNotAllowed,

    #[error("transaction root hash mismatch: have {}, want {}", hash_to_hex(.local), hash_to_hex(.remote))]
    TxRootMismatch { remote: Hash, local: Hash },

    #[error("invalid gas used (remote: {remote} local: {local})")]
    GasMismatch { remote: u64, local: u64 },

    #[error("invalid bloom (remote: {remote} local: {local})")]
    BloomMismatch { remote: Box<Bloom>, local: Box<Bloom> },

    #[error("invalid receipt root hash (remote: {} local: {})", hash_to_hex(.remote), hash_to_hex(.local))]
    ReceiptRootMismatch { remote: Hash, local: Hash },

    #[error("invalid merkle root (remote: {} local: {})", hash_to_hex(.remote), hash_to_hex(.local))]
    StateRootMismatch { remote: Hash, local: Hash },
}

impl ValidationError {
    /// Errors that do not mean the block is bad.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::KnownBlock | Self::PrunedAncestor)
    }
}

/// A header broke a consensus rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("unknown ancestor")]
    UnknownAncestor,

    #[error("block in the future: timestamp {timestamp}, now {now}")]
    FutureBlock { timestamp: u64, now: u64 },

    #[error("extra-data 32 byte vanity prefix missing")]
    MissingVanity,

    #[error("extra-data seal missing")]
    MissingSignature,

    #[error("non-checkpoint block contains extra signer list")]
    ExtraSigners,

    #[error("invalid signer list on checkpoint block")]
    InvalidCheckpointSigners,

    #[error("mismatching signer list on checkpoint block")]
    MismatchingCheckpointSigners,

    #[error("non empty uncle hash")]
    InvalidUncleHash,

    #[error("invalid difficulty {0}")]
    InvalidDifficulty(u64),

    #[error("wrong difficulty: have {have}, want {want}")]
    WrongDifficulty { have: u64, want: u64 },

    #[error("invalid timestamp: {timestamp} earlier than {min}")]
    InvalidTimestamp { timestamp: u64, min: u64 },

    #[error("invalid gas limit: have {have}, parent {parent}")]
    InvalidGasLimit { have: u64, parent: u64 },

    #[error("invalid gas used: have {used}, limit {limit}")]
    InvalidGasUsed { used: u64, limit: u64 },

    #[error("unauthorized signer {}", hash_to_hex(.0))]
    UnauthorizedSigner(Address),

    #[error("signer {} signed recently", hash_to_hex(.0))]
    RecentlySigned(Address),

    #[error("invalid seal: {0}")]
    InvalidSeal(#[from] SignatureError),

    #[error("block reward overflows coinbase balance")]
    RewardOverflow(#[source] StateError),

    /// Injected by the fake engine.
    #[error("fake failure at block {number}")]
    FakeFailure { number: BlockNumber },
}

/// A transaction could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("invalid transaction signature: {0}")]
    InvalidSignature(#[from] SignatureError),

    #[error("nonce too low: address {}, tx {tx}, state {state}", hash_to_hex(.address))]
    NonceTooLow { address: Address, tx: u64, state: u64 },

    #[error("nonce too high: address {}, tx {tx}, state {state}", hash_to_hex(.address))]
    NonceTooHigh { address: Address, tx: u64, state: u64 },

    #[error("nonce has max value: address {}", hash_to_hex(.address))]
    NonceMax { address: Address },

    #[error(transparent)]
    GasLimitReached(#[from] GasPoolError),

    #[error("insufficient funds for gas * price: have {have}, want {want}")]
    InsufficientFunds { have: Balance, want: Balance },

    #[error("intrinsic gas too low: have {have}, want {want}")]
    IntrinsicGas { have: u64, want: u64 },

    #[error("too many log topics: {0}")]
    TooManyTopics(usize),

    #[error("state update failed: {0}")]
    State(#[from] StateError),
}

/// Processing a block failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("could not apply tx {index} [{}]: {source}", hash_to_hex(.hash))]
    Transaction {
        index: usize,
        hash: Hash,
        #[source]
        source: ExecError,
    },
}

/// Chain insertion stopped.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("non contiguous insert: item {index} is #{number} [{}], item {prev_index} is #{prev_number} [{}]",
        hash_to_hex(.hash), hash_to_hex(.prev_hash))]
    NonContiguous {
        index: usize,
        number: BlockNumber,
        hash: Hash,
        prev_index: usize,
        prev_number: BlockNumber,
        prev_hash: Hash,
    },

    #[error("block #{number} failed consensus: {source}")]
    Consensus {
        number: BlockNumber,
        #[source]
        source: ConsensusError,
    },

    #[error("header verification ended before block #{0}")]
    VerificationAborted(BlockNumber),

    #[error("missing state for block [{}]", hash_to_hex(.0))]
    MissingState(Hash),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Genesis specification could not be loaded.
#[derive(Debug, Error)]
pub enum GenesisError {
    #[error("invalid genesis json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid allocation address {0}")]
    InvalidAddress(String),
}

/// Installing the tracing subscriber failed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
}
