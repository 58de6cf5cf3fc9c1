//! Core type aliases and constants shared by every layer of the import core.

/// 32-byte hash used for block hashes, roots and transaction hashes.
pub type Hash = [u8; 32];

/// 32-byte account address. Accounts are identified by their Ed25519
/// verifying key, so an address is the public key bytes.
pub type Address = [u8; 32];

/// Block number (monotonically increasing, genesis is 0).
pub type BlockNumber = u64;

/// Account balances and transferred values.
pub type Balance = u128;

/// A zero-valued hash (32 zero bytes).
pub const ZERO_HASH: Hash = [0u8; 32];

/// A zero-valued address (32 zero bytes).
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Maximum number of topics a single log may carry.
pub const MAX_LOG_TOPICS: usize = 4;

/// Render a hash as a `0x`-prefixed lowercase hex string.
pub fn hash_to_hex(hash: &Hash) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Short form of a hash for log lines: first four bytes, hex encoded.
pub fn short_hex(hash: &Hash) -> String {
    format!("0x{}…", hex::encode(&hash[..4]))
}
