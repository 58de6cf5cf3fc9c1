//! Genesis block specification.

use std::collections::BTreeMap;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use strata_primitives::config::DEFAULT_TARGET_GAS_LIMIT;
use strata_primitives::{receipt_root, tx_root, Account, Address, Block, ChainConfig, Header};

use crate::chain::MemoryChain;
use crate::consensus::{EXTRA_SEAL, EXTRA_VANITY};
use crate::error::GenesisError;
use crate::state::state_root;

/// Genesis block and initial allocation, loadable from JSON.
///
/// Allocation keys are `0x`-prefixed hex addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Genesis {
    pub config: ChainConfig,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub difficulty: u64,
    /// Leading 32 bytes of the extra data.
    pub vanity: [u8; EXTRA_VANITY],
    pub alloc: BTreeMap<String, Account>,
}

impl Default for Genesis {
    fn default() -> Self {
        Self {
            config: ChainConfig::default(),
            timestamp: 0,
            gas_limit: DEFAULT_TARGET_GAS_LIMIT,
            difficulty: 1,
            vanity: [0u8; EXTRA_VANITY],
            alloc: BTreeMap::new(),
        }
    }
}

impl Genesis {
    pub fn from_json(json: &str) -> Result<Self, GenesisError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Fund `address` with `balance`.
    pub fn with_account(mut self, address: Address, balance: u128) -> Self {
        self.alloc.insert(
            format!("0x{}", hex::encode(address)),
            Account { nonce: 0, balance },
        );
        self
    }

    /// Parsed allocation.
    pub fn accounts(&self) -> Result<BTreeMap<Address, Account>, GenesisError> {
        self.alloc
            .iter()
            .map(|(key, account)| {
                let raw = key.strip_prefix("0x").unwrap_or(key);
                let mut address = [0u8; 32];
                hex::decode_to_slice(raw, &mut address)
                    .map_err(|_| GenesisError::InvalidAddress(key.clone()))?;
                Ok((address, *account))
            })
            .collect()
    }

    /// Block 0. Extra data holds the vanity, the configured signers and an
    /// empty seal.
    pub fn to_block(&self) -> Result<Block, GenesisError> {
        Ok(self.build_block(&self.accounts()?))
    }

    /// Block 0 committing to an already parsed allocation.
    pub fn build_block(&self, accounts: &BTreeMap<Address, Account>) -> Block {
        let mut extra = BytesMut::with_capacity(EXTRA_VANITY + EXTRA_SEAL);
        extra.extend_from_slice(&self.vanity);
        for signer in &self.config.clique.signers {
            extra.extend_from_slice(signer);
        }
        extra.extend_from_slice(&[0u8; EXTRA_SEAL]);

        let header = Header {
            state_root: state_root(accounts),
            tx_root: tx_root(&[]),
            receipt_root: receipt_root(&[]),
            difficulty: self.difficulty,
            number: 0,
            gas_limit: self.gas_limit,
            timestamp: self.timestamp,
            extra_data: extra.freeze(),
            ..Header::default()
        };
        Block::new(header, vec![], vec![])
    }

    /// Build a chain holding only this genesis block.
    pub fn commit(&self) -> Result<MemoryChain, GenesisError> {
        let accounts = self.accounts()?;
        let block = self.build_block(&accounts);
        Ok(MemoryChain::with_genesis(self.config.clone(), block, accounts))
    }
}
