//! Proof-of-authority consensus.
//!
//! A fixed list of signers takes turns sealing blocks. The signer whose turn
//! it is (`signers[number % len]`) seals with difficulty 2; any other
//! authorised signer may seal with difficulty 1, but no signer may seal more
//! than once in any `len / 2 + 1` consecutive blocks.
//!
//! ```text
//! extra_data = vanity (32) || checkpoint signers (32 each) || signer key (32) || signature (64)
//! ```
//!
//! The signer list is only present on checkpoint blocks (`number % epoch == 0`).
//! The signature covers the header hash with the signature bytes stripped,
//! so the signer key is itself sealed.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Bytes, BytesMut};
use ed25519_dalek::SigningKey;
use strata_primitives::crypto::{sign_ed25519, verify_ed25519};
use strata_primitives::{
    empty_uncle_hash, Address, Balance, ChainConfig, CliqueConfig, Hash, Header, Receipt,
    Transaction,
};

use super::ConsensusEngine;
use crate::chain::ChainReader;
use crate::error::ConsensusError;
use crate::gas_limit::verify_gas_limit;
use crate::state::StateBackend;

/// Bytes of free-form vanity at the start of extra data.
pub const EXTRA_VANITY: usize = 32;

/// Bytes of seal at the end of extra data: signer key and signature.
pub const EXTRA_SEAL: usize = 32 + SIGNATURE_LEN;

const SIGNATURE_LEN: usize = 64;

/// Seconds a header timestamp may run ahead of the local clock.
pub const ALLOWED_FUTURE_BLOCK_TIME: u64 = 15;

/// Difficulty of a block sealed by the in-turn signer.
pub const DIFF_IN_TURN: u64 = 2;

/// Difficulty of a block sealed out of turn.
pub const DIFF_NO_TURN: u64 = 1;

/// Hash a header's seal signs: the header hash with the signature removed
/// from extra data.
pub fn seal_hash(header: &Header) -> Hash {
    let mut unsealed = header.clone();
    let keep = unsealed.extra_data.len().saturating_sub(SIGNATURE_LEN);
    unsealed.extra_data.truncate(keep);
    unsealed.hash()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Proof-of-authority engine.
#[derive(Debug, Clone)]
pub struct Clique {
    config: CliqueConfig,
    block_reward: Balance,
}

impl Clique {
    pub fn new(config: &ChainConfig) -> Self {
        Self {
            config: config.clique.clone(),
            block_reward: config.block_reward,
        }
    }

    pub fn config(&self) -> &CliqueConfig {
        &self.config
    }

    pub fn is_checkpoint(&self, number: u64) -> bool {
        self.config.epoch != 0 && number % self.config.epoch == 0
    }

    /// Signer whose turn it is at `number`.
    pub fn in_turn_signer(&self, number: u64) -> Option<Address> {
        if self.config.signers.is_empty() {
            return None;
        }
        let index = (number % self.config.signers.len() as u64) as usize;
        Some(self.config.signers[index])
    }

    /// Unsealed extra data for a block at `number`: vanity, plus the signer
    /// list on checkpoints.
    pub fn prepare_extra(&self, number: u64, vanity: [u8; EXTRA_VANITY]) -> Bytes {
        let mut extra = BytesMut::with_capacity(EXTRA_VANITY + EXTRA_SEAL);
        extra.extend_from_slice(&vanity);
        if self.is_checkpoint(number) {
            for signer in &self.config.signers {
                extra.extend_from_slice(signer);
            }
        }
        extra.freeze()
    }

    /// Seal `header` with `key`. Extra data must hold the vanity and, on
    /// checkpoints, the signer list.
    pub fn seal(&self, mut header: Header, key: &SigningKey) -> Result<Header, ConsensusError> {
        if header.extra_data.len() < EXTRA_VANITY {
            return Err(ConsensusError::MissingVanity);
        }
        let mut extra = BytesMut::from(header.extra_data.as_ref());
        extra.extend_from_slice(key.verifying_key().as_bytes());
        extra.extend_from_slice(&[0u8; SIGNATURE_LEN]);
        header.extra_data = extra.freeze();

        let signature = sign_ed25519(&seal_hash(&header), key);
        let mut extra = BytesMut::from(header.extra_data.as_ref());
        let start = extra.len() - SIGNATURE_LEN;
        extra[start..].copy_from_slice(&signature);
        header.extra_data = extra.freeze();
        Ok(header)
    }

    /// Find an ancestor among the batch `parents` first, then in `chain`.
    fn ancestor(
        chain: &dyn ChainReader,
        parents: &[Header],
        hash: &Hash,
        number: u64,
    ) -> Option<Header> {
        parents
            .iter()
            .rev()
            .find(|h| h.number == number && &h.hash() == hash)
            .cloned()
            .or_else(|| chain.header(hash, number))
    }

    /// Checks that need only the header itself.
    fn verify_standalone(&self, header: &Header) -> Result<(), ConsensusError> {
        let now = unix_now();
        if header.timestamp > now.saturating_add(ALLOWED_FUTURE_BLOCK_TIME) {
            return Err(ConsensusError::FutureBlock {
                timestamp: header.timestamp,
                now,
            });
        }

        let extra = header.extra_data.len();
        if extra < EXTRA_VANITY {
            return Err(ConsensusError::MissingVanity);
        }
        if extra < EXTRA_VANITY + EXTRA_SEAL {
            return Err(ConsensusError::MissingSignature);
        }
        let signers_bytes = extra - EXTRA_VANITY - EXTRA_SEAL;
        let checkpoint = self.is_checkpoint(header.number);
        if !checkpoint && signers_bytes != 0 {
            return Err(ConsensusError::ExtraSigners);
        }
        if checkpoint && signers_bytes % 32 != 0 {
            return Err(ConsensusError::InvalidCheckpointSigners);
        }

        if header.uncle_hash != empty_uncle_hash() {
            return Err(ConsensusError::InvalidUncleHash);
        }
        if header.number > 0
            && header.difficulty != DIFF_IN_TURN
            && header.difficulty != DIFF_NO_TURN
        {
            return Err(ConsensusError::InvalidDifficulty(header.difficulty));
        }
        Ok(())
    }

    /// Checks against the parent and the configured signer set.
    fn verify_cascading(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<(), ConsensusError> {
        let number = header.number;
        if number == 0 {
            return Ok(());
        }
        let parent = Self::ancestor(chain, parents, &header.parent_hash, number - 1)
            .ok_or(ConsensusError::UnknownAncestor)?;

        let min = parent.timestamp.saturating_add(self.config.period);
        if header.timestamp < min {
            return Err(ConsensusError::InvalidTimestamp {
                timestamp: header.timestamp,
                min,
            });
        }
        verify_gas_limit(&parent, header)?;

        if self.is_checkpoint(number) {
            let listed = &header.extra_data[EXTRA_VANITY..header.extra_data.len() - EXTRA_SEAL];
            let expected: Vec<u8> = self.config.signers.concat();
            if listed != expected.as_slice() {
                return Err(ConsensusError::MismatchingCheckpointSigners);
            }
        }
        self.verify_seal(chain, header, parents)
    }

    fn verify_seal(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<(), ConsensusError> {
        let signer = self.author(header)?;
        if !self.config.signers.contains(&signer) {
            return Err(ConsensusError::UnauthorizedSigner(signer));
        }

        let limit = self.config.signers.len() as u64 / 2;
        let mut hash = header.parent_hash;
        let mut number = header.number.saturating_sub(1);
        for _ in 0..limit {
            // Genesis carries no seal.
            if number == 0 {
                break;
            }
            let recent = Self::ancestor(chain, parents, &hash, number)
                .ok_or(ConsensusError::UnknownAncestor)?;
            if self.author(&recent)? == signer {
                return Err(ConsensusError::RecentlySigned(signer));
            }
            hash = recent.parent_hash;
            number -= 1;
        }

        let want = if self.in_turn_signer(header.number) == Some(signer) {
            DIFF_IN_TURN
        } else {
            DIFF_NO_TURN
        };
        if header.difficulty != want {
            return Err(ConsensusError::WrongDifficulty {
                have: header.difficulty,
                want,
            });
        }
        Ok(())
    }
}

impl ConsensusEngine for Clique {
    fn author(&self, header: &Header) -> Result<Address, ConsensusError> {
        let extra = &header.extra_data;
        if extra.len() < EXTRA_VANITY + EXTRA_SEAL {
            return Err(ConsensusError::MissingSignature);
        }
        let seal = &extra[extra.len() - EXTRA_SEAL..];
        let mut signer = [0u8; 32];
        signer.copy_from_slice(&seal[..32]);
        let mut signature = [0u8; SIGNATURE_LEN];
        signature.copy_from_slice(&seal[32..]);

        verify_ed25519(&seal_hash(header), &signature, &signer)?;
        Ok(signer)
    }

    fn verify_header(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<(), ConsensusError> {
        self.verify_standalone(header)?;
        self.verify_cascading(chain, header, parents)
    }

    fn finalize(
        &self,
        _chain: &dyn ChainReader,
        header: &Header,
        state: &mut dyn StateBackend,
        _txs: &[Transaction],
        _receipts: &[Receipt],
        is_uncle: bool,
    ) -> Result<(), ConsensusError> {
        if is_uncle {
            return Ok(());
        }
        state
            .add_balance(&header.coinbase, self.block_reward)
            .map_err(ConsensusError::RewardOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MemoryChain;
    use crate::state::MemoryState;
    use crate::testing::{self, TestChain};
    use std::sync::Arc;
    use strata_primitives::SignatureError;

    fn setup() -> (TestChain, Clique) {
        let tc = TestChain::clique(3, 1);
        let clique = match &tc.engine {
            crate::consensus::Engine::Clique(clique) => Clique::clone(clique),
            crate::consensus::Engine::Fake(_) => unreachable!(),
        };
        (tc, clique)
    }

    /// Unsealed child of `parent` at the next number.
    fn child(clique: &Clique, parent: &Header) -> Header {
        let number = parent.number + 1;
        Header {
            parent_hash: parent.hash(),
            number,
            gas_limit: parent.gas_limit,
            timestamp: parent.timestamp + clique.config().period,
            difficulty: DIFF_IN_TURN,
            extra_data: clique.prepare_extra(number, [0u8; 32]),
            ..Header::default()
        }
    }

    fn signer_index(clique: &Clique, number: u64) -> usize {
        (number % clique.config().signers.len() as u64) as usize
    }

    fn chain(tc: &TestChain) -> Arc<MemoryChain> {
        tc.chain.clone()
    }

    #[test]
    fn test_generated_chain_verifies() {
        let (tc, clique) = setup();
        let blocks = tc.generate_empty(6).unwrap();
        let headers: Vec<Header> = blocks.iter().map(|b| b.header.clone()).collect();
        for (i, header) in headers.iter().enumerate() {
            clique
                .verify_header(&*chain(&tc), header, &headers[..i])
                .unwrap();
        }
    }

    #[test]
    fn test_author_recovers_signer() {
        let (tc, clique) = setup();
        let parent = tc.chain.current_header();
        let key = &tc.signers[1];
        let sealed = clique.seal(child(&clique, &parent), key).unwrap();
        assert_eq!(
            clique.author(&sealed),
            Ok(key.verifying_key().to_bytes())
        );
    }

    #[test]
    fn test_tampered_header_breaks_seal() {
        let (tc, clique) = setup();
        let parent = tc.chain.current_header();
        let mut sealed = clique
            .seal(child(&clique, &parent), &tc.signers[1])
            .unwrap();
        sealed.gas_used = 1;
        assert_eq!(
            clique.author(&sealed),
            Err(ConsensusError::InvalidSeal(SignatureError::InvalidSignature))
        );
    }

    #[test]
    fn test_in_turn_and_out_of_turn_difficulty() {
        let (tc, clique) = setup();
        let parent = tc.chain.current_header();
        let in_turn = signer_index(&clique, 1);
        let other = (in_turn + 1) % 3;

        let good = clique.seal(child(&clique, &parent), &tc.signers[in_turn]).unwrap();
        assert!(clique.verify_header(&*chain(&tc), &good, &[]).is_ok());

        let wrong = clique.seal(child(&clique, &parent), &tc.signers[other]).unwrap();
        assert_eq!(
            clique.verify_header(&*chain(&tc), &wrong, &[]),
            Err(ConsensusError::WrongDifficulty { have: 2, want: 1 })
        );

        let mut out_of_turn = child(&clique, &parent);
        out_of_turn.difficulty = DIFF_NO_TURN;
        let out_of_turn = clique.seal(out_of_turn, &tc.signers[other]).unwrap();
        assert!(clique.verify_header(&*chain(&tc), &out_of_turn, &[]).is_ok());
    }

    #[test]
    fn test_unauthorized_signer() {
        let (tc, clique) = setup();
        let parent = tc.chain.current_header();
        let outsider = testing::user_key(0);
        let sealed = clique.seal(child(&clique, &parent), &outsider).unwrap();
        assert_eq!(
            clique.verify_header(&*chain(&tc), &sealed, &[]),
            Err(ConsensusError::UnauthorizedSigner(
                outsider.verifying_key().to_bytes()
            ))
        );
    }

    #[test]
    fn test_recently_signed() {
        let (tc, clique) = setup();
        let genesis = tc.chain.current_header();
        let first_signer = &tc.signers[signer_index(&clique, 1)];
        let first = clique.seal(child(&clique, &genesis), first_signer).unwrap();

        let mut second = child(&clique, &first);
        second.difficulty = DIFF_NO_TURN;
        let second = clique.seal(second, first_signer).unwrap();

        assert_eq!(
            clique.verify_header(&*chain(&tc), &second, &[first]),
            Err(ConsensusError::RecentlySigned(
                first_signer.verifying_key().to_bytes()
            ))
        );
    }

    #[test]
    fn test_missing_vanity_and_seal() {
        let (tc, clique) = setup();
        let parent = tc.chain.current_header();

        let mut header = child(&clique, &parent);
        header.extra_data = Bytes::from_static(&[0u8; 10]);
        assert_eq!(
            clique.verify_header(&*chain(&tc), &header, &[]),
            Err(ConsensusError::MissingVanity)
        );

        header.extra_data = Bytes::from(vec![0u8; EXTRA_VANITY + 10]);
        assert_eq!(
            clique.verify_header(&*chain(&tc), &header, &[]),
            Err(ConsensusError::MissingSignature)
        );
    }

    #[test]
    fn test_signers_outside_checkpoint() {
        let (tc, clique) = setup();
        let parent = tc.chain.current_header();
        let mut header = child(&clique, &parent);
        let mut extra = BytesMut::from(header.extra_data.as_ref());
        extra.extend_from_slice(&[9u8; 32]);
        header.extra_data = extra.freeze();
        let sealed = clique.seal(header, &tc.signers[1]).unwrap();
        assert_eq!(
            clique.verify_header(&*chain(&tc), &sealed, &[]),
            Err(ConsensusError::ExtraSigners)
        );
    }

    #[test]
    fn test_future_block() {
        let (tc, clique) = setup();
        let parent = tc.chain.current_header();
        let mut header = child(&clique, &parent);
        header.timestamp = unix_now() + 3600;
        let sealed = clique.seal(header, &tc.signers[1]).unwrap();
        assert!(matches!(
            clique.verify_header(&*chain(&tc), &sealed, &[]),
            Err(ConsensusError::FutureBlock { .. })
        ));
    }

    #[test]
    fn test_timestamp_before_period() {
        let (tc, clique) = setup();
        let parent = tc.chain.current_header();
        let mut header = child(&clique, &parent);
        header.timestamp = parent.timestamp;
        let sealed = clique.seal(header, &tc.signers[1]).unwrap();
        assert!(matches!(
            clique.verify_header(&*chain(&tc), &sealed, &[]),
            Err(ConsensusError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn test_unknown_ancestor() {
        let (tc, clique) = setup();
        let mut parent = tc.chain.current_header();
        parent.timestamp += 100;
        let sealed = clique.seal(child(&clique, &parent), &tc.signers[1]).unwrap();
        assert_eq!(
            clique.verify_header(&*chain(&tc), &sealed, &[]),
            Err(ConsensusError::UnknownAncestor)
        );
    }

    #[test]
    fn test_bad_gas_limit() {
        let (tc, clique) = setup();
        let parent = tc.chain.current_header();
        let mut header = child(&clique, &parent);
        header.gas_limit = parent.gas_limit * 2;
        let sealed = clique.seal(header, &tc.signers[1]).unwrap();
        assert!(matches!(
            clique.verify_header(&*chain(&tc), &sealed, &[]),
            Err(ConsensusError::InvalidGasLimit { .. })
        ));
    }

    #[test]
    fn test_non_empty_uncle_hash() {
        let (tc, clique) = setup();
        let parent = tc.chain.current_header();
        let mut header = child(&clique, &parent);
        header.uncle_hash = [1u8; 32];
        let sealed = clique.seal(header, &tc.signers[1]).unwrap();
        assert_eq!(
            clique.verify_header(&*chain(&tc), &sealed, &[]),
            Err(ConsensusError::InvalidUncleHash)
        );
    }

    #[test]
    fn test_finalize_credits_reward() {
        let (tc, clique) = setup();
        let header = Header {
            coinbase: [7u8; 32],
            number: 1,
            ..Header::default()
        };
        let mut state = MemoryState::default();
        clique
            .finalize(&*chain(&tc), &header, &mut state, &[], &[], false)
            .unwrap();
        assert_eq!(state.balance(&[7u8; 32]), tc.chain.config().block_reward);

        clique
            .finalize(&*chain(&tc), &header, &mut state, &[], &[], true)
            .unwrap();
        assert_eq!(state.balance(&[7u8; 32]), tc.chain.config().block_reward);
    }

    #[test]
    fn test_finalize_reward_overflow() {
        let (tc, clique) = setup();
        let header = Header {
            coinbase: [7u8; 32],
            ..Header::default()
        };
        let mut state = MemoryState::default();
        state.add_balance(&[7u8; 32], u128::MAX).unwrap();
        assert!(matches!(
            clique.finalize(&*chain(&tc), &header, &mut state, &[], &[], false),
            Err(ConsensusError::RewardOverflow(_))
        ));
    }

    #[test]
    fn test_checkpoint_extra_holds_signers() {
        let (_tc, clique) = setup();
        let extra = clique.prepare_extra(0, [0u8; 32]);
        assert_eq!(extra.len(), EXTRA_VANITY + 32 * clique.config().signers.len());
        assert_eq!(clique.prepare_extra(1, [0u8; 32]).len(), EXTRA_VANITY);
    }
}
