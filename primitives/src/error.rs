//! Error types for the primitives layer.
//!
//! Each concern gets its own small enum so callers can match precisely;
//! the engine crate wraps these into its block-level errors.

use thiserror::Error;

/// The block gas pool could not cover a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GasPoolError {
    /// Requested more gas than the pool has left.
    #[error("gas limit reached: have {have}, want {want}")]
    GasLimitReached { have: u64, want: u64 },

    /// Returning gas would overflow the pool counter.
    #[error("gas pool overflow: have {have}, returning {amount}")]
    Overflow { have: u64, amount: u64 },
}

/// A transaction or header signature did not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The embedded public key is not a valid Ed25519 point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// The signature does not match the signed payload.
    #[error("invalid signature")]
    InvalidSignature,
}

/// Account state could not be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// Debit larger than the account balance.
    #[error("insufficient balance: have {have}, want {want}")]
    InsufficientBalance { have: u128, want: u128 },

    /// Credit would overflow the account balance.
    #[error("balance overflow: have {have}, adding {amount}")]
    BalanceOverflow { have: u128, amount: u128 },
}
