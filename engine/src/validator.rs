//! Block body and post-state validation.
//!
//! Header rules belong to the consensus engine. The validator checks what
//! only the body and the executed state can show: that the block is new,
//! its parent state is available, the transaction root matches, and the
//! execution results match every commitment in the header.

use std::sync::Arc;

use strata_primitives::{create_bloom, receipt_root, tx_root, Block, Header, Receipt};

use crate::chain::ChainReader;
use crate::error::ValidationError;
use crate::state::StateBackend;

pub struct BlockValidator {
    chain: Arc<dyn ChainReader>,
}

impl BlockValidator {
    pub fn new(chain: Arc<dyn ChainReader>) -> Self {
        Self { chain }
    }

    /// Check the block body before processing.
    ///
    /// With `check_parent`, the parent block and its state must be present.
    pub fn validate_body(&self, block: &Block, check_parent: bool) -> Result<(), ValidationError> {
        let number = block.number();
        if self.chain.has_block_and_state(&block.hash(), number) {
            return Err(ValidationError::KnownBlock);
        }
        if check_parent {
            let parent = block.parent_hash();
            let parent_number = number.wrapping_sub(1);
            if !self.chain.has_block_and_state(&parent, parent_number) {
                if self.chain.has_block(&parent, parent_number) {
                    return Err(ValidationError::PrunedAncestor);
                }
                return Err(ValidationError::UnknownAncestor);
            }
        }
        if !block.uncles.is_empty() {
            return Err(ValidationError::UnclesNotAllowed);
        }
        let local = tx_root(&block.transactions);
        if local != block.header.tx_root {
            return Err(ValidationError::TxRootMismatch {
                remote: block.header.tx_root,
                local,
            });
        }
        Ok(())
    }

    /// Check the results of processing against the header.
    ///
    /// Reads `state` without changing it, so repeated calls agree.
    pub fn validate_state(
        &self,
        block: &Block,
        _parent: &Header,
        state: &dyn StateBackend,
        receipts: &[Receipt],
        gas_used: u64,
    ) -> Result<(), ValidationError> {
        let header = &block.header;
        if header.gas_used != gas_used {
            return Err(ValidationError::GasMismatch {
                remote: header.gas_used,
                local: gas_used,
            });
        }

        let bloom = create_bloom(receipts);
        if bloom != header.bloom {
            return Err(ValidationError::BloomMismatch {
                remote: Box::new(header.bloom),
                local: Box::new(bloom),
            });
        }

        let local = receipt_root(receipts);
        if local != header.receipt_root {
            return Err(ValidationError::ReceiptRootMismatch {
                remote: header.receipt_root,
                local,
            });
        }

        let eip158 = self.chain.config().is_eip158(header.number);
        let local = state.intermediate_root(eip158);
        if local != header.state_root {
            return Err(ValidationError::StateRootMismatch {
                remote: header.state_root,
                local,
            });
        }
        Ok(())
    }
}
