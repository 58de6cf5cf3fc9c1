//! State transition: applying a block's transactions to its parent state.

use std::sync::Arc;

use strata_primitives::types::short_hex;
use strata_primitives::{logs_bloom, Block, GasPool, Log, Receipt};
use tracing::{info, warn};

use crate::chain::ChainReader;
use crate::consensus::{ConsensusEngine, Engine};
use crate::error::ProcessError;
use crate::executor::{ApplyContext, TransactionExecutor, TransferExecutor};
use crate::observer::{ImportEvent, ImportObserver, NoopObserver};
use crate::state::StateBackend;

/// What processing a block produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// One receipt per transaction, in order.
    pub receipts: Vec<Receipt>,
    /// Every log of the block, in transaction then emission order.
    pub logs: Vec<Log>,
    pub gas_used: u64,
}

/// Runs blocks through a [`TransactionExecutor`] and the consensus engine's
/// finalisation.
pub struct StateProcessor<X = TransferExecutor> {
    chain: Arc<dyn ChainReader>,
    engine: Engine,
    executor: X,
    observer: Arc<dyn ImportObserver>,
}

impl StateProcessor<TransferExecutor> {
    pub fn new(chain: Arc<dyn ChainReader>, engine: Engine) -> Self {
        Self::with_executor(chain, engine, TransferExecutor)
    }
}

impl<X: TransactionExecutor> StateProcessor<X> {
    pub fn with_executor(chain: Arc<dyn ChainReader>, engine: Engine, executor: X) -> Self {
        Self {
            chain,
            engine,
            executor,
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ImportObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Apply every transaction of `block` to `state`, then finalize.
    ///
    /// Any transaction error invalidates the block; `state` is then left
    /// partially modified and should be discarded. A finalize failure is
    /// logged and reported to the observer but does not fail processing.
    pub fn process(
        &self,
        block: &Block,
        state: &mut dyn StateBackend,
    ) -> Result<ProcessOutput, ProcessError> {
        let header = &block.header;
        let config = self.chain.config();
        let block_hash = block.hash();
        let ctx = ApplyContext {
            config,
            header,
            block_hash,
        };
        let byzantium = config.is_byzantium(header.number);
        let eip158 = config.is_eip158(header.number);

        let mut pool = GasPool::new(header.gas_limit);
        let mut gas_used = 0u64;
        let mut receipts = Vec::with_capacity(block.transactions.len());
        let mut logs = Vec::new();

        for (index, tx) in block.transactions.iter().enumerate() {
            let tx_hash = tx.hash();
            state.prepare(tx_hash, block_hash, index as u32);

            let (returned, outcome) = self
                .executor
                .apply(&ctx, state, tx, pool)
                .map_err(|source| ProcessError::Transaction {
                    index,
                    hash: tx_hash,
                    source,
                })?;
            pool = returned;
            gas_used = gas_used.saturating_add(outcome.gas_used);

            let post_state = if byzantium {
                state.finalise(true);
                None
            } else {
                state.finalise(eip158);
                Some(state.intermediate_root(eip158))
            };

            let mut receipt = Receipt::new(post_state, outcome.failed, gas_used);
            receipt.tx_hash = tx_hash;
            receipt.gas_used = outcome.gas_used;
            receipt.logs = state.logs(&tx_hash);
            receipt.bloom = logs_bloom(&receipt.logs);
            receipt.block_hash = block_hash;
            receipt.block_number = header.number;
            receipt.tx_index = index as u32;

            logs.extend(receipt.logs.iter().cloned());
            receipts.push(receipt);
        }

        if let Err(err) =
            self.engine
                .finalize(&*self.chain, header, state, &block.transactions, &receipts, false)
        {
            warn!(number = header.number, hash = %short_hex(&block_hash), %err, "finalize failed");
            self.observer.record(&ImportEvent::FinalizeFailed {
                number: header.number,
                reason: err.to_string(),
            });
        }

        info!(
            number = header.number,
            hash = %short_hex(&block_hash),
            txs = block.transactions.len(),
            gas_used,
            "processed block"
        );
        self.observer.record(&ImportEvent::BlockProcessed {
            number: header.number,
            hash: block_hash,
            txs: block.transactions.len(),
            gas_used,
        });

        Ok(ProcessOutput {
            receipts,
            logs,
            gas_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::FakeEngine;
    use crate::error::ExecError;
    use crate::observer::CountingObserver;
    use crate::testing::{address_of, TestChain};
    use bytes::Bytes;
    use strata_primitives::{GasPoolError, Transaction, TxPayload};

    fn emit(tc: &TestChain, user: usize, nonce: u64) -> Transaction {
        Transaction::sign(
            nonce,
            1,
            50_000,
            TxPayload::Emit {
                topics: vec![[nonce as u8; 32]],
                data: Bytes::from_static(b"log"),
            },
            &tc.users[user],
        )
    }

    fn process(tc: &TestChain, block: &Block) -> Result<ProcessOutput, ProcessError> {
        let parent = tc.chain.current_header();
        let mut state = tc.chain.state_at(&parent.state_root).unwrap();
        tc.processor().process(block, &mut state)
    }

    #[test]
    fn test_receipts_and_logs_in_order() {
        let tc = TestChain::fake(FakeEngine::valid(), 2);
        let blocks = tc
            .generate(1, |_, _| {
                vec![
                    emit(&tc, 0, 0),
                    tc.transfer(1, 0, [9u8; 32], 10),
                    emit(&tc, 0, 1),
                ]
            })
            .unwrap();
        let block = &blocks[0];
        let out = process(&tc, block).unwrap();

        assert_eq!(out.receipts.len(), 3);
        assert_eq!(out.gas_used, block.header.gas_used);
        let mut cumulative = 0;
        for (i, receipt) in out.receipts.iter().enumerate() {
            cumulative += receipt.gas_used;
            assert_eq!(receipt.cumulative_gas_used, cumulative);
            assert_eq!(receipt.tx_index, i as u32);
            assert_eq!(receipt.tx_hash, block.transactions[i].hash());
            assert_eq!(receipt.block_hash, block.hash());
            assert!(receipt.status);
            assert!(receipt.post_state.is_none());
        }

        assert_eq!(out.logs.len(), 2);
        assert_eq!(out.logs[0].tx_index, 0);
        assert_eq!(out.logs[1].tx_index, 2);
        assert_eq!(out.logs[1].index, 1);
        assert!(out.receipts[1].logs.is_empty());
        assert!(out.receipts[0].bloom.contains_input(&[0u8; 32]));
    }

    #[test]
    fn test_pool_exhaustion_fails_block() {
        let tc = TestChain::fake(FakeEngine::valid(), 1);
        let mut block = tc.generate_empty(1).unwrap().remove(0);
        block.header.gas_limit = 30_000;
        block.transactions = vec![tc.transfer(0, 0, [9u8; 32], 1), tc.transfer(0, 1, [9u8; 32], 1)];

        let err = process(&tc, &block).unwrap_err();
        let ProcessError::Transaction { index, source, .. } = err;
        assert_eq!(index, 1);
        assert!(matches!(
            source,
            ExecError::GasLimitReached(GasPoolError::GasLimitReached { .. })
        ));
    }

    #[test]
    fn test_pre_byzantium_receipts_carry_root() {
        let mut config = crate::testing::dev_config(&[]);
        config.byzantium_block = None;
        let tc = TestChain::with_config(config, Engine::fake(FakeEngine::valid()), &[], 1);
        let block = tc
            .generate(1, |_, _| vec![tc.transfer(0, 0, [9u8; 32], 1)])
            .unwrap()
            .remove(0);

        let parent = tc.chain.current_header();
        let mut state = tc.chain.state_at(&parent.state_root).unwrap();
        let out = tc.processor().process(&block, &mut state).unwrap();
        assert_eq!(out.receipts[0].post_state, Some(state.intermediate_root(true)));
    }

    #[test]
    fn test_finalize_failure_is_not_returned() {
        let tc = TestChain::fake(FakeEngine::valid().with_failing_finalize(), 1);
        let block = tc
            .generate(1, |_, _| vec![tc.transfer(0, 0, [9u8; 32], 1)])
            .unwrap()
            .remove(0);

        let observer = Arc::new(CountingObserver::new());
        let processor = tc.processor().with_observer(observer.clone());
        let parent = tc.chain.current_header();
        let mut state = tc.chain.state_at(&parent.state_root).unwrap();

        let out = processor.process(&block, &mut state).unwrap();
        assert_eq!(out.receipts.len(), 1);
        assert_eq!(observer.finalize_failed(), 1);
        assert_eq!(observer.processed(), 1);
    }

    #[test]
    fn test_max_nonce_sender_fails_block() {
        let tc = TestChain::fake(FakeEngine::valid(), 1);
        let mut block = tc.generate_empty(1).unwrap().remove(0);
        block.transactions = vec![tc.transfer(0, u64::MAX, [9u8; 32], 1)];

        let parent = tc.chain.current_header();
        let mut state = tc.chain.state_at(&parent.state_root).unwrap();
        let user = address_of(&tc.users[0]);
        state.set_nonce(&user, u64::MAX);

        assert!(matches!(
            tc.processor().process(&block, &mut state),
            Err(ProcessError::Transaction {
                index: 0,
                source: ExecError::NonceMax { .. },
                ..
            })
        ));
        assert_eq!(state.nonce(&user), u64::MAX);
    }
}
