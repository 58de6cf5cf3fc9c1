//! Chain insertion.
//!
//! [`BlockImporter::insert_chain`] wires the pipeline together for a batch of
//! contiguous blocks:
//!
//! 1. Start concurrent header verification for the whole batch
//! 2. For each block in order, wait for its header result
//! 3. Validate the body (already known blocks are skipped)
//! 4. Process the block on its parent's state
//! 5. Validate the resulting state against the header
//! 6. Write the block and its state
//!
//! The first failure stops the batch; blocks before it stay written.

use std::sync::Arc;

use strata_primitives::types::short_hex;
use strata_primitives::{Block, Hash};
use tracing::{debug, info, warn};

use crate::chain::{ChainReader, MemoryChain};
use crate::consensus::Engine;
use crate::error::{ImportError, ValidationError};
use crate::observer::{ImportEvent, ImportObserver, NoopObserver};
use crate::processor::StateProcessor;
use crate::validator::BlockValidator;
use crate::verifier::{HeaderVerifier, VerificationResults};

pub struct BlockImporter {
    chain: Arc<MemoryChain>,
    engine: Engine,
    verifier: HeaderVerifier,
    processor: StateProcessor,
    validator: BlockValidator,
    observer: Arc<dyn ImportObserver>,
}

impl BlockImporter {
    pub fn new(chain: Arc<MemoryChain>, engine: Engine) -> Self {
        let reader: Arc<dyn ChainReader> = chain.clone();
        Self {
            processor: StateProcessor::new(reader.clone(), engine.clone()),
            validator: BlockValidator::new(reader),
            verifier: HeaderVerifier::default(),
            observer: Arc::new(NoopObserver),
            chain,
            engine,
        }
    }

    pub fn with_verifier(mut self, verifier: HeaderVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ImportObserver>) -> Self {
        self.processor = self.processor.with_observer(observer.clone());
        self.observer = observer;
        self
    }

    pub fn chain(&self) -> &Arc<MemoryChain> {
        &self.chain
    }

    /// Import `blocks`, which must be contiguous. Returns how many blocks
    /// were written; known blocks are skipped and not counted.
    pub fn insert_chain(&self, blocks: &[Block]) -> Result<usize, ImportError> {
        if blocks.is_empty() {
            return Ok(0);
        }
        check_contiguous(blocks)?;

        let headers = blocks.iter().map(|block| block.header.clone()).collect();
        let reader: Arc<dyn ChainReader> = self.chain.clone();
        let (abort, results) = self.verifier.verify(self.engine.clone(), reader, headers);

        let outcome = self.import_verified(blocks, &results);
        // Stops leftover checks after an early exit; a no-op otherwise.
        abort.abort();
        outcome
    }

    fn import_verified(
        &self,
        blocks: &[Block],
        results: &VerificationResults,
    ) -> Result<usize, ImportError> {
        let mut written = 0;
        for block in blocks {
            let number = block.number();
            let hash = block.hash();

            match results.recv() {
                Some(Ok(())) => {}
                Some(Err(source)) => {
                    self.reject(block, &hash, &source);
                    return Err(ImportError::Consensus { number, source });
                }
                None => return Err(ImportError::VerificationAborted(number)),
            }

            match self.validator.validate_body(block, true) {
                Ok(()) => {}
                Err(ValidationError::KnownBlock) => {
                    debug!(number, hash = %short_hex(&hash), "skipping known block");
                    self.observer
                        .record(&ImportEvent::KnownBlockSkipped { number, hash });
                    continue;
                }
                Err(err) => {
                    self.reject(block, &hash, &err);
                    return Err(err.into());
                }
            }

            let parent = self
                .chain
                .header(&block.parent_hash(), number.wrapping_sub(1))
                .ok_or(ValidationError::UnknownAncestor)?;
            let mut state = self
                .chain
                .state_at(&parent.state_root)
                .ok_or(ImportError::MissingState(parent.hash()))?;

            let output = match self.processor.process(block, &mut state) {
                Ok(output) => output,
                Err(err) => {
                    self.reject(block, &hash, &err);
                    return Err(err.into());
                }
            };
            if let Err(err) =
                self.validator
                    .validate_state(block, &parent, &state, &output.receipts, output.gas_used)
            {
                self.reject(block, &hash, &err);
                return Err(err.into());
            }

            self.chain.write_block_with_state(block.clone(), &state);
            written += 1;
            info!(
                number,
                hash = %short_hex(&hash),
                txs = block.transactions.len(),
                gas_used = output.gas_used,
                "imported block"
            );
            self.observer
                .record(&ImportEvent::BlockImported { number, hash });
        }
        Ok(written)
    }

    fn reject(&self, block: &Block, hash: &Hash, reason: &dyn std::fmt::Display) {
        warn!(number = block.number(), hash = %short_hex(hash), %reason, "rejected block");
        self.observer.record(&ImportEvent::BlockRejected {
            number: block.number(),
            hash: *hash,
            reason: reason.to_string(),
        });
    }
}

fn check_contiguous(blocks: &[Block]) -> Result<(), ImportError> {
    for (index, pair) in blocks.windows(2).enumerate() {
        let (prev, block) = (&pair[0], &pair[1]);
        let prev_hash = prev.hash();
        if block.number() != prev.number().wrapping_add(1) || block.parent_hash() != prev_hash {
            return Err(ImportError::NonContiguous {
                index: index + 1,
                number: block.number(),
                hash: block.hash(),
                prev_index: index,
                prev_number: prev.number(),
                prev_hash,
            });
        }
    }
    Ok(())
}
