//! End-to-end chain insertion through header verification, processing and
//! validation.

mod common;

use std::sync::Arc;

use strata_engine::testing::{address_of, TestChain, DEV_BLOCK_REWARD, GENESIS_BALANCE};
use strata_engine::consensus::EXTRA_SEAL;
use strata_engine::{
    ChainReader, ConsensusError, CountingObserver, Engine, FakeEngine, ImportError, ProcessError,
    StateBackend, ValidationError,
};
use strata_primitives::crypto::generate_keypair;
use strata_primitives::tx_root;

use common::*;

#[test]
fn test_import_clique_chain() {
    let tc = clique_chain();
    let blocks = busy_blocks(&tc, 6);
    let observer = Arc::new(CountingObserver::new());
    let importer = tc.importer().with_observer(observer.clone());

    assert_eq!(importer.insert_chain(&blocks).unwrap(), 6);
    assert_eq!(tc.chain.current_header(), blocks[5].header);
    assert_eq!(observer.imported(), 6);
    assert_eq!(observer.processed(), 6);
    assert_eq!(observer.rejected(), 0);

    let head = tc.chain.current_header();
    let state = tc.chain.state_at(&head.state_root).unwrap();
    assert_eq!(state.balance(&SINK), 6 * 2 * 1_000);
    let user = address_of(&tc.users[0]);
    assert_eq!(state.nonce(&user), 6);
    assert_eq!(state.balance(&user), GENESIS_BALANCE - 6 * (1_000 + 21_000));

    // Each signer sealed two of the six blocks and earned fees plus reward.
    let signer = address_of(&tc.signers[0]);
    assert_eq!(
        state.balance(&signer),
        2 * (DEV_BLOCK_REWARD + 2 * 21_000)
    );
}

#[test]
fn test_reimport_skips_known_blocks() {
    let tc = clique_chain();
    let blocks = busy_blocks(&tc, 3);
    let observer = Arc::new(CountingObserver::new());
    let importer = tc.importer().with_observer(observer.clone());

    assert_eq!(importer.insert_chain(&blocks).unwrap(), 3);
    assert_eq!(importer.insert_chain(&blocks).unwrap(), 0);
    assert_eq!(observer.known(), 3);
    assert_eq!(tc.chain.current_header(), blocks[2].header);
}

#[test]
fn test_import_in_two_batches() {
    let tc = clique_chain();
    let blocks = busy_blocks(&tc, 4);
    let importer = tc.importer();
    assert_eq!(importer.insert_chain(&blocks[..2]).unwrap(), 2);
    assert_eq!(importer.insert_chain(&blocks[2..]).unwrap(), 2);
    assert_eq!(tc.chain.current_header().number, 4);
}

#[test]
fn test_corrupted_tx_root_rejected_before_processing() {
    let tc = TestChain::fake(FakeEngine::valid(), 2);
    let mut blocks = busy_blocks(&tc, 2);
    blocks[1].header.tx_root = [0xee; 32];

    let observer = Arc::new(CountingObserver::new());
    let err = tc
        .importer()
        .with_observer(observer.clone())
        .insert_chain(&blocks)
        .unwrap_err();
    assert!(matches!(
        err,
        ImportError::Validation(ValidationError::TxRootMismatch { .. })
    ));
    // Only the first block reached the processor.
    assert_eq!(observer.processed(), 1);
    assert_eq!(observer.rejected(), 1);
    assert_eq!(tc.chain.current_header().number, 1);
}

#[test]
fn test_uncles_rejected() {
    let tc = TestChain::fake(FakeEngine::valid(), 1);
    let mut blocks = tc.generate_empty(1).unwrap();
    let uncle = blocks[0].header.clone();
    blocks[0].uncles.push(uncle);

    assert!(matches!(
        tc.importer().insert_chain(&blocks),
        Err(ImportError::Validation(ValidationError::UnclesNotAllowed))
    ));
}

#[test]
fn test_state_root_mismatch_rejected() {
    let tc = TestChain::fake(FakeEngine::valid(), 2);
    let mut blocks = busy_blocks(&tc, 1);
    blocks[0].header.state_root = [0x01; 32];

    assert!(matches!(
        tc.importer().insert_chain(&blocks),
        Err(ImportError::Validation(ValidationError::StateRootMismatch { .. }))
    ));
    assert_eq!(tc.chain.current_header().number, 0);
}

#[test]
fn test_invalid_transaction_rejects_block() {
    let tc = TestChain::fake(FakeEngine::valid(), 1);
    let mut blocks = tc.generate_empty(1).unwrap();
    // Nonce 5 on a fresh account.
    blocks[0].transactions = vec![tc.transfer(0, 5, SINK, 1)];
    blocks[0].header.tx_root = tx_root(&blocks[0].transactions);

    let err = tc.importer().insert_chain(&blocks).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Process(ProcessError::Transaction { index: 0, .. })
    ));
}

#[test]
fn test_pruned_parent_state() {
    let tc = TestChain::fake(FakeEngine::valid(), 1);
    let blocks = tc.generate_empty(1).unwrap();
    let genesis = tc.chain.current_header();
    tc.chain.prune_state(&genesis.state_root);

    assert!(matches!(
        tc.importer().insert_chain(&blocks),
        Err(ImportError::Validation(ValidationError::PrunedAncestor))
    ));
}

#[test]
fn test_finalize_failure_still_imports() {
    let tc = TestChain::fake(FakeEngine::valid().with_failing_finalize(), 1);
    let blocks = busy_blocks(&tc, 2);
    let observer = Arc::new(CountingObserver::new());

    let written = tc
        .importer()
        .with_observer(observer.clone())
        .insert_chain(&blocks)
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(observer.finalize_failed(), 2);
}

#[test]
fn test_state_dump_after_import() {
    let tc = clique_chain();
    let blocks = busy_blocks(&tc, 1);
    tc.importer().insert_chain(&blocks).unwrap();

    let head = tc.chain.current_header();
    let dump = tc.chain.state_at(&head.state_root).unwrap().dump().unwrap();
    let json: serde_json::Value = serde_json::from_str(&dump).unwrap();
    assert_eq!(
        json["root"].as_str().unwrap(),
        strata_primitives::types::hash_to_hex(&head.state_root)
    );
    assert!(json["accounts"].as_object().unwrap().len() >= 4);
}

#[test]
fn test_unauthorized_sealer_rejected() {
    let tc = clique_chain();
    let mut blocks = tc.generate_empty(1).unwrap();
    let Engine::Clique(clique) = &tc.engine else {
        unreachable!("clique chain");
    };

    let (_, outsider) = generate_keypair();
    let mut header = blocks[0].header.clone();
    let keep = header.extra_data.len() - EXTRA_SEAL;
    header.extra_data.truncate(keep);
    blocks[0].header = clique.seal(header, &outsider).unwrap();

    let err = tc.importer().insert_chain(&blocks).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Consensus {
            number: 1,
            source: ConsensusError::UnauthorizedSigner(_),
        }
    ));
    assert_eq!(tc.chain.current_header().number, 0);
}
