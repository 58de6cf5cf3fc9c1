//! Shared helpers for the engine integration tests.
//!
//! Provides seeded chains, transaction builders and header batches used
//! across the integration test files.

#![allow(dead_code)]

use std::time::Duration;

use strata_engine::testing::{address_of, TestChain};
use strata_engine::{FakeEngine, MemoryState, StateBackend};
use strata_primitives::{Address, Block, BlockNumber, Header, Transaction};

/// Recipient used by transfer-heavy tests.
pub const SINK: Address = [0x5a; 32];

/// Clique chain with three signers and two funded users.
pub fn clique_chain() -> TestChain {
    TestChain::clique(3, 2)
}

/// Fake-engine chain whose header checks each sleep for `delay`.
pub fn delayed_chain(delay: Duration) -> TestChain {
    TestChain::fake(FakeEngine::delayed(delay), 1)
}

/// Transfer of `value` from user `from` to [`SINK`], with the nonce read
/// from `state`.
pub fn next_transfer(tc: &TestChain, state: &MemoryState, from: usize, value: u128) -> Transaction {
    let nonce = state.nonce(&address_of(&tc.users[from]));
    tc.transfer(from, nonce, SINK, value)
}

/// `n` blocks each carrying one transfer from every user.
pub fn busy_blocks(tc: &TestChain, n: usize) -> Vec<Block> {
    tc.generate(n, |_, state| {
        let mut txs = Vec::new();
        for from in 0..tc.users.len() {
            txs.push(next_transfer(tc, state, from, 1_000));
        }
        txs
    })
    .unwrap()
}

/// Bare headers numbered `1..=n`.
pub fn numbered_headers(n: BlockNumber) -> Vec<Header> {
    (1..=n)
        .map(|number| Header {
            number,
            ..Header::default()
        })
        .collect()
}
