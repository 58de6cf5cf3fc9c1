//! Transaction application.
//!
//! The processor hands each transaction to a [`TransactionExecutor`] together
//! with the block gas pool. The pool is moved in and handed back, so it has a
//! single owner at every point of a block's execution.
//!
//! [`TransferExecutor`] applies the two native payloads:
//!
//! 1. Verify the signature and recover the sender
//! 2. Check the nonce against state
//! 3. Take the transaction's gas limit out of the block pool
//! 4. Buy that gas from the sender at the transaction's gas price
//! 5. Charge intrinsic gas and bump the nonce
//! 6. Run the payload
//! 7. Refund unused gas to the sender and the pool, pay fees to the coinbase
//!
//! Steps 1 to 5 failing is fatal to the block. A value transfer the sender
//! cannot cover only marks the receipt failed; the gas is still charged.

use strata_primitives::types::MAX_LOG_TOPICS;
use strata_primitives::{
    intrinsic_gas, Address, Balance, ChainConfig, GasPool, Hash, Header, Log, Transaction,
    TxPayload,
};
use tracing::trace;

use crate::error::ExecError;
use crate::state::StateBackend;

/// Block-level inputs to transaction application.
#[derive(Debug, Clone, Copy)]
pub struct ApplyContext<'a> {
    pub config: &'a ChainConfig,
    pub header: &'a Header,
    pub block_hash: Hash,
}

impl ApplyContext<'_> {
    /// Receives transaction fees.
    pub fn beneficiary(&self) -> Address {
        self.header.coinbase
    }
}

/// Result of one applied transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub gas_used: u64,
    /// Payload reverted; gas was still charged.
    pub failed: bool,
}

/// Applies a single transaction to state.
pub trait TransactionExecutor: Send + Sync {
    /// Apply `tx`, taking gas from `pool` and handing the pool back.
    ///
    /// An error means the block containing `tx` is invalid.
    fn apply(
        &self,
        ctx: &ApplyContext<'_>,
        state: &mut dyn StateBackend,
        tx: &Transaction,
        pool: GasPool,
    ) -> Result<(GasPool, ExecutionOutcome), ExecError>;
}

/// Executor for native value transfers and log emission.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferExecutor;

impl TransferExecutor {
    fn check_nonce(state: &dyn StateBackend, sender: &Address, tx: &Transaction) -> Result<(), ExecError> {
        let expected = state.nonce(sender);
        if tx.nonce < expected {
            return Err(ExecError::NonceTooLow {
                address: *sender,
                tx: tx.nonce,
                state: expected,
            });
        }
        if tx.nonce > expected {
            return Err(ExecError::NonceTooHigh {
                address: *sender,
                tx: tx.nonce,
                state: expected,
            });
        }
        Ok(())
    }

    fn buy_gas(state: &mut dyn StateBackend, sender: &Address, tx: &Transaction) -> Result<(), ExecError> {
        let cost = Balance::from(tx.gas_limit) * Balance::from(tx.gas_price);
        let have = state.balance(sender);
        if have < cost {
            return Err(ExecError::InsufficientFunds { have, want: cost });
        }
        state.sub_balance(sender, cost)?;
        Ok(())
    }

    /// Run the payload. Returns true if it failed.
    fn run_payload(
        ctx: &ApplyContext<'_>,
        state: &mut dyn StateBackend,
        sender: &Address,
        payload: &TxPayload,
    ) -> bool {
        match payload {
            TxPayload::Transfer { to, value } => {
                if state.balance(sender) < *value {
                    return true;
                }
                if state.sub_balance(sender, *value).is_err() {
                    return true;
                }
                if state.add_balance(to, *value).is_err() {
                    // Undo the debit; the same amount was just removed.
                    let _ = state.add_balance(sender, *value);
                    return true;
                }
                false
            }
            TxPayload::Emit { topics, data } => {
                let mut log = Log::new(*sender, topics.clone(), data.clone());
                log.block_number = ctx.header.number;
                state.add_log(log);
                false
            }
        }
    }
}

impl TransactionExecutor for TransferExecutor {
    fn apply(
        &self,
        ctx: &ApplyContext<'_>,
        state: &mut dyn StateBackend,
        tx: &Transaction,
        mut pool: GasPool,
    ) -> Result<(GasPool, ExecutionOutcome), ExecError> {
        let sender = tx.sender()?;
        if let TxPayload::Emit { topics, .. } = &tx.payload {
            if topics.len() > MAX_LOG_TOPICS {
                return Err(ExecError::TooManyTopics(topics.len()));
            }
        }
        Self::check_nonce(state, &sender, tx)?;
        let next_nonce = tx
            .nonce
            .checked_add(1)
            .ok_or(ExecError::NonceMax { address: sender })?;

        pool.sub_gas(tx.gas_limit)?;
        Self::buy_gas(state, &sender, tx)?;

        let intrinsic = intrinsic_gas(tx.data_len());
        if tx.gas_limit < intrinsic {
            return Err(ExecError::IntrinsicGas {
                have: tx.gas_limit,
                want: intrinsic,
            });
        }
        state.set_nonce(&sender, next_nonce);

        let failed = Self::run_payload(ctx, state, &sender, &tx.payload);
        let gas_used = intrinsic;

        let remaining = tx.gas_limit - gas_used;
        let price = Balance::from(tx.gas_price);
        state.add_balance(&sender, Balance::from(remaining) * price)?;
        pool.add_gas(remaining)?;
        state.add_balance(&ctx.beneficiary(), Balance::from(gas_used) * price)?;

        trace!(
            index = state.tx_index(),
            gas_used,
            failed,
            "applied transaction"
        );
        Ok((pool, ExecutionOutcome { gas_used, failed }))
    }
}
