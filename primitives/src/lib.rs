//! `strata-primitives`: foundational types for the Strata block import core.
//!
//! This crate provides the block, transaction and receipt types, canonical
//! encoding, hashing, ordered Merkle roots, log blooms, the block gas pool,
//! the account overlay and chain configuration shared by the engine.

pub mod types;
pub mod error;
pub mod crypto;
pub mod bloom;
pub mod block;
pub mod codec;
pub mod merkle;
pub mod state;
pub mod gas;
pub mod config;

// Re-export commonly used types at the crate root for convenience.
pub use types::{Address, Balance, BlockNumber, Hash, ZERO_ADDRESS, ZERO_HASH};
pub use error::{GasPoolError, SignatureError, StateError};
pub use bloom::{create_bloom, logs_bloom, Bloom};
pub use block::{
    calc_uncle_hash, empty_uncle_hash, receipt_root, tx_root, Block, Header, Log, Receipt,
    Transaction, TxPayload,
};
pub use gas::{intrinsic_gas, GasPool};
pub use merkle::{derive_root, MerkleTree};
pub use state::{Account, OverlayResult, StateOverlay};
pub use config::{ChainConfig, CliqueConfig, GasLimitConfig};
