//! Consensus engines.
//!
//! [`ConsensusEngine`] is the capability the import pipeline needs from a
//! consensus rule: header checks, seal author recovery and block
//! finalisation. [`Engine`] is the closed set of engines this node runs.

mod clique;
mod faker;

use std::sync::Arc;

use strata_primitives::{Address, Header, Receipt, Transaction};

use crate::chain::ChainReader;
use crate::error::ConsensusError;
use crate::state::StateBackend;
use crate::verifier::{AbortHandle, HeaderVerifier, VerificationResults};

pub use clique::{
    seal_hash, Clique, ALLOWED_FUTURE_BLOCK_TIME, DIFF_IN_TURN, DIFF_NO_TURN, EXTRA_SEAL,
    EXTRA_VANITY,
};
pub use faker::{FakeEngine, FakeMode};

pub trait ConsensusEngine: Send + Sync {
    /// Address whose seal is on `header`.
    fn author(&self, header: &Header) -> Result<Address, ConsensusError>;

    /// Check `header` against the rules. `parents` are the headers submitted
    /// before it in the same batch, oldest first; ancestors not among them
    /// are read from `chain`.
    fn verify_header(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<(), ConsensusError>;

    /// Verify a batch of headers concurrently.
    ///
    /// Results arrive in submission order.
    fn verify_headers(
        &self,
        chain: Arc<dyn ChainReader>,
        headers: Vec<Header>,
    ) -> (AbortHandle, VerificationResults)
    where
        Self: Clone + Sized + 'static,
    {
        HeaderVerifier::default().verify(self.clone(), chain, headers)
    }

    /// Apply post-transaction consensus changes (rewards) to `state`.
    fn finalize(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        state: &mut dyn StateBackend,
        txs: &[Transaction],
        receipts: &[Receipt],
        is_uncle: bool,
    ) -> Result<(), ConsensusError>;
}

/// Engines this node can run.
#[derive(Debug, Clone)]
pub enum Engine {
    Clique(Arc<Clique>),
    Fake(FakeEngine),
}

impl Engine {
    pub fn clique(clique: Clique) -> Self {
        Self::Clique(Arc::new(clique))
    }

    pub fn fake(fake: FakeEngine) -> Self {
        Self::Fake(fake)
    }
}

impl ConsensusEngine for Engine {
    fn author(&self, header: &Header) -> Result<Address, ConsensusError> {
        match self {
            Self::Clique(clique) => clique.author(header),
            Self::Fake(fake) => fake.author(header),
        }
    }

    fn verify_header(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        parents: &[Header],
    ) -> Result<(), ConsensusError> {
        match self {
            Self::Clique(clique) => clique.verify_header(chain, header, parents),
            Self::Fake(fake) => fake.verify_header(chain, header, parents),
        }
    }

    fn finalize(
        &self,
        chain: &dyn ChainReader,
        header: &Header,
        state: &mut dyn StateBackend,
        txs: &[Transaction],
        receipts: &[Receipt],
        is_uncle: bool,
    ) -> Result<(), ConsensusError> {
        match self {
            Self::Clique(clique) => clique.finalize(chain, header, state, txs, receipts, is_uncle),
            Self::Fake(fake) => fake.finalize(chain, header, state, txs, receipts, is_uncle),
        }
    }
}
