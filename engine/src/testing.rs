//! Deterministic fixtures for tests: seeded keys, development chains and a
//! block generator that produces valid, sealed blocks.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use ed25519_dalek::SigningKey;
use strata_primitives::crypto::signing_key_from_seed;
use strata_primitives::{
    create_bloom, receipt_root, tx_root, Account, Address, Balance, Block, BlockNumber,
    ChainConfig, CliqueConfig, Header, Transaction, TxPayload, ZERO_ADDRESS,
};

use crate::chain::{ChainReader, MemoryChain};
use crate::consensus::{Engine, FakeEngine, DIFF_IN_TURN, DIFF_NO_TURN};
use crate::error::{ConsensusError, ImportError};
use crate::gas_limit::next_gas_limit;
use crate::genesis::Genesis;
use crate::import::BlockImporter;
use crate::processor::StateProcessor;
use crate::state::{MemoryState, StateBackend};
use crate::validator::BlockValidator;
use crate::verifier::HeaderVerifier;

/// Balance of every funded test user at genesis.
pub const GENESIS_BALANCE: Balance = 1_000_000_000_000_000_000;

/// Reward credited by the development Clique config.
pub const DEV_BLOCK_REWARD: Balance = 5_000_000;

/// Coinbase of blocks generated for the fake engine.
pub const FAKE_COINBASE: Address = [0xfa; 32];

/// Gas limit of transactions built by [`TestChain::transfer`].
pub const TRANSFER_GAS: u64 = 21_000;

/// Signer key `index`.
pub fn signer_key(index: u8) -> SigningKey {
    signing_key_from_seed(&[index.wrapping_add(1); 32])
}

/// User key `index`, disjoint from signer keys for indexes below 0x7f.
pub fn user_key(index: u8) -> SigningKey {
    signing_key_from_seed(&[0x80u8.wrapping_add(index); 32])
}

pub fn address_of(key: &SigningKey) -> Address {
    key.verifying_key().to_bytes()
}

/// Development chain config with `signers` as the Clique signer set.
pub fn dev_config(signers: &[SigningKey]) -> ChainConfig {
    ChainConfig {
        chain_id: 1337,
        byzantium_block: Some(0),
        eip158_block: Some(0),
        block_reward: DEV_BLOCK_REWARD,
        clique: CliqueConfig {
            period: 1,
            epoch: 30_000,
            signers: signers.iter().map(address_of).collect(),
        },
        ..ChainConfig::default()
    }
}

/// A chain with only an empty genesis block.
pub fn empty_chain() -> Arc<MemoryChain> {
    let genesis = Genesis {
        config: dev_config(&[]),
        ..Genesis::default()
    };
    let accounts = BTreeMap::new();
    let block = genesis.build_block(&accounts);
    Arc::new(MemoryChain::with_genesis(genesis.config, block, accounts))
}

/// A development chain with its engine and keys.
pub struct TestChain {
    pub chain: Arc<MemoryChain>,
    pub engine: Engine,
    pub signers: Vec<SigningKey>,
    pub users: Vec<SigningKey>,
}

impl TestChain {
    /// Clique chain with `signers` authorities and `users` funded users.
    pub fn clique(signers: usize, users: usize) -> Self {
        let keys: Vec<SigningKey> = (0..signers).map(|i| signer_key(i as u8)).collect();
        let config = dev_config(&keys);
        let engine = Engine::clique(crate::consensus::Clique::new(&config));
        Self::with_config(config, engine, &keys, users)
    }

    /// Chain driven by a fake engine with `users` funded users.
    pub fn fake(engine: FakeEngine, users: usize) -> Self {
        Self::with_config(dev_config(&[]), Engine::fake(engine), &[], users)
    }

    pub fn with_config(
        config: ChainConfig,
        engine: Engine,
        signers: &[SigningKey],
        users: usize,
    ) -> Self {
        let users: Vec<SigningKey> = (0..users).map(|i| user_key(i as u8)).collect();
        let mut accounts = BTreeMap::new();
        for user in &users {
            accounts.insert(
                address_of(user),
                Account {
                    nonce: 0,
                    balance: GENESIS_BALANCE,
                },
            );
        }
        let genesis = Genesis {
            config,
            ..Genesis::default()
        };
        let block = genesis.build_block(&accounts);
        Self {
            chain: Arc::new(MemoryChain::with_genesis(genesis.config, block, accounts)),
            engine,
            signers: signers.to_vec(),
            users,
        }
    }

    pub fn reader(&self) -> Arc<dyn ChainReader> {
        self.chain.clone()
    }

    pub fn processor(&self) -> StateProcessor {
        StateProcessor::new(self.reader(), self.engine.clone())
    }

    pub fn validator(&self) -> BlockValidator {
        BlockValidator::new(self.reader())
    }

    pub fn importer(&self) -> BlockImporter {
        BlockImporter::new(self.chain.clone(), self.engine.clone())
            .with_verifier(HeaderVerifier::new(4))
    }

    /// Signed value transfer from user `from`.
    pub fn transfer(&self, from: usize, nonce: u64, to: Address, value: Balance) -> Transaction {
        Transaction::sign(
            nonce,
            1,
            TRANSFER_GAS,
            TxPayload::Transfer { to, value },
            &self.users[from],
        )
    }

    /// Generate `n` empty blocks on top of the current head.
    pub fn generate_empty(&self, n: usize) -> Result<Vec<Block>, ImportError> {
        self.generate(n, |_, _| Vec::new())
    }

    /// Generate `n` blocks on top of the current head without importing them.
    ///
    /// `txs` receives each block's number and the state it will execute on.
    /// Clique blocks are sealed by the in-turn signer.
    pub fn generate<F>(&self, n: usize, mut txs: F) -> Result<Vec<Block>, ImportError>
    where
        F: FnMut(BlockNumber, &MemoryState) -> Vec<Transaction>,
    {
        let config = self.chain.config();
        let processor = self.processor();
        let mut parent = self.chain.current_header();
        let mut state = self
            .chain
            .state_at(&parent.state_root)
            .ok_or(ImportError::MissingState(parent.hash()))?;

        let mut blocks = Vec::with_capacity(n);
        for _ in 0..n {
            let number = parent.number + 1;
            let transactions = txs(number, &state);

            let (coinbase, extra_data, difficulty) = match &self.engine {
                Engine::Clique(clique) => {
                    let key = self.in_turn_key(number)?;
                    (address_of(key), clique.prepare_extra(number, [0u8; 32]), DIFF_IN_TURN)
                }
                Engine::Fake(_) => (FAKE_COINBASE, Bytes::new(), DIFF_NO_TURN),
            };
            let header = Header {
                parent_hash: parent.hash(),
                coinbase,
                tx_root: tx_root(&transactions),
                difficulty,
                number,
                gas_limit: next_gas_limit(&parent, &config.gas),
                timestamp: parent.timestamp + config.clique.period.max(1),
                extra_data,
                ..Header::default()
            };
            let mut block = Block::new(header, transactions, Vec::new());

            let eip158 = config.is_eip158(number);
            let out = processor.process(&block, &mut state)?;
            block.header.gas_used = out.gas_used;
            block.header.receipt_root = receipt_root(&out.receipts);
            block.header.bloom = create_bloom(&out.receipts);
            block.header.state_root = state.intermediate_root(eip158);
            state.finalise(eip158);

            if let Engine::Clique(clique) = &self.engine {
                let key = self.in_turn_key(number)?;
                block.header = clique
                    .seal(block.header, key)
                    .map_err(|source| ImportError::Consensus { number, source })?;
            }
            parent = block.header.clone();
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn in_turn_key(&self, number: BlockNumber) -> Result<&SigningKey, ImportError> {
        if self.signers.is_empty() {
            return Err(ImportError::Consensus {
                number,
                source: ConsensusError::UnauthorizedSigner(ZERO_ADDRESS),
            });
        }
        Ok(&self.signers[(number % self.signers.len() as u64) as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_deterministic_and_distinct() {
        assert_eq!(address_of(&signer_key(0)), address_of(&signer_key(0)));
        assert_ne!(address_of(&signer_key(0)), address_of(&user_key(0)));
    }

    #[test]
    fn test_generated_blocks_link_up() {
        let tc = TestChain::clique(2, 1);
        let blocks = tc
            .generate(3, |_, state| {
                let nonce = state.nonce(&address_of(&tc.users[0]));
                vec![tc.transfer(0, nonce, [9u8; 32], 1)]
            })
            .unwrap();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].parent_hash(), tc.chain.current_header().hash());
        for pair in blocks.windows(2) {
            assert_eq!(pair[1].parent_hash(), pair[0].hash());
            assert_eq!(pair[1].number(), pair[0].number() + 1);
        }
        assert_eq!(blocks[2].transactions[0].nonce, 2);
        assert_eq!(blocks[0].gas_used(), TRANSFER_GAS);
    }
}
