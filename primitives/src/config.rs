//! Chain configuration.
//!
//! Loaded from JSON. Every field has a default so a partial document (or
//! `{}`) yields a usable development chain. Signer addresses are written as
//! `0x`-prefixed hex strings.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::{Address, Balance, BlockNumber};

/// Default gas limit target (both floor and ceiling) for produced blocks.
pub const DEFAULT_TARGET_GAS_LIMIT: u64 = 4_712_388;

/// Chain-wide parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Block from which receipts carry a status instead of an intermediate root.
    pub byzantium_block: Option<BlockNumber>,
    /// Block from which empty accounts are deleted.
    pub eip158_block: Option<BlockNumber>,
    /// Credited to the coinbase of every canonical block.
    pub block_reward: Balance,
    pub clique: CliqueConfig,
    pub gas: GasLimitConfig,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1337,
            byzantium_block: Some(0),
            eip158_block: Some(0),
            block_reward: 0,
            clique: CliqueConfig::default(),
            gas: GasLimitConfig::default(),
        }
    }
}

impl ChainConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn is_byzantium(&self, number: BlockNumber) -> bool {
        is_forked(self.byzantium_block, number)
    }

    pub fn is_eip158(&self, number: BlockNumber) -> bool {
        is_forked(self.eip158_block, number)
    }
}

fn is_forked(fork: Option<BlockNumber>, number: BlockNumber) -> bool {
    matches!(fork, Some(at) if at <= number)
}

/// Proof-of-authority parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliqueConfig {
    /// Minimum seconds between consecutive blocks.
    pub period: u64,
    /// Blocks between checkpoints that restate the signer list.
    pub epoch: u64,
    /// Authorised signers, in turn order.
    #[serde(with = "hex_addresses")]
    pub signers: Vec<Address>,
}

impl Default for CliqueConfig {
    fn default() -> Self {
        Self {
            period: 0,
            epoch: 30_000,
            signers: Vec::new(),
        }
    }
}

/// Bounds the gas-limit policy steers towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasLimitConfig {
    pub floor: u64,
    pub ceil: u64,
}

impl Default for GasLimitConfig {
    fn default() -> Self {
        Self {
            floor: DEFAULT_TARGET_GAS_LIMIT,
            ceil: DEFAULT_TARGET_GAS_LIMIT,
        }
    }
}

mod hex_addresses {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(addresses: &[Address], s: S) -> Result<S::Ok, S::Error> {
        let encoded: Vec<String> = addresses
            .iter()
            .map(|a| format!("0x{}", hex::encode(a)))
            .collect();
        encoded.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Address>, D::Error> {
        let encoded = Vec::<String>::deserialize(d)?;
        encoded
            .iter()
            .map(|s| {
                let raw = s.strip_prefix("0x").unwrap_or(s);
                let mut address = [0u8; 32];
                hex::decode_to_slice(raw, &mut address)
                    .map_err(|e| D::Error::custom(format!("invalid signer {s}: {e}")))?;
                Ok(address)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = ChainConfig::from_json("{}").unwrap();
        assert_eq!(config, ChainConfig::default());
        assert_eq!(config.gas.floor, DEFAULT_TARGET_GAS_LIMIT);
        assert_eq!(config.clique.epoch, 30_000);
    }

    #[test]
    fn test_fork_predicates() {
        let config = ChainConfig {
            byzantium_block: Some(10),
            eip158_block: None,
            ..ChainConfig::default()
        };
        assert!(!config.is_byzantium(9));
        assert!(config.is_byzantium(10));
        assert!(config.is_byzantium(11));
        assert!(!config.is_eip158(0));
        assert!(!config.is_eip158(u64::MAX));
    }

    #[test]
    fn test_signers_as_hex() {
        let json = format!(
            r#"{{"clique": {{"period": 5, "signers": ["0x{}", "{}"]}}}}"#,
            "01".repeat(32),
            "02".repeat(32)
        );
        let config = ChainConfig::from_json(&json).unwrap();
        assert_eq!(config.clique.period, 5);
        assert_eq!(config.clique.signers, vec![[1u8; 32], [2u8; 32]]);

        let back = ChainConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_bad_signer_rejected() {
        let json = r#"{"clique": {"signers": ["0x1234"]}}"#;
        assert!(ChainConfig::from_json(json).is_err());
    }
}
