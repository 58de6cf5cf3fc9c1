//! Engine with scripted outcomes for tests.

use std::thread;
use std::time::Duration;

use strata_primitives::{Address, BlockNumber, Header, Receipt, Transaction};

use super::ConsensusEngine;
use crate::chain::ChainReader;
use crate::error::ConsensusError;
use crate::state::StateBackend;

/// How [`FakeEngine`] answers header checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeMode {
    /// Every header is valid.
    Valid,
    /// The header at this number fails, every other one is valid.
    FailAt(BlockNumber),
    /// Every header is valid after sleeping this long.
    Delay(Duration),
    /// Header `n` sleeps `step * (last - n)` and then fails with its own
    /// number, so later headers finish first and every result is distinct.
    Countdown { step: Duration, last: BlockNumber },
}

/// Accepts headers without checking seals. Finalize applies no rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeEngine {
    mode: FakeMode,
    fail_finalize: bool,
}

impl FakeEngine {
    pub fn new(mode: FakeMode) -> Self {
        Self {
            mode,
            fail_finalize: false,
        }
    }

    pub fn valid() -> Self {
        Self::new(FakeMode::Valid)
    }

    pub fn fail_at(number: BlockNumber) -> Self {
        Self::new(FakeMode::FailAt(number))
    }

    pub fn delayed(delay: Duration) -> Self {
        Self::new(FakeMode::Delay(delay))
    }

    pub fn countdown(step: Duration, last: BlockNumber) -> Self {
        Self::new(FakeMode::Countdown { step, last })
    }

    /// Make every `finalize` call fail.
    pub fn with_failing_finalize(mut self) -> Self {
        self.fail_finalize = true;
        self
    }

    pub fn mode(&self) -> FakeMode {
        self.mode
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::valid()
    }
}

impl ConsensusEngine for FakeEngine {
    fn author(&self, header: &Header) -> Result<Address, ConsensusError> {
        Ok(header.coinbase)
    }

    fn verify_header(
        &self,
        _chain: &dyn ChainReader,
        header: &Header,
        _parents: &[Header],
    ) -> Result<(), ConsensusError> {
        match self.mode {
            FakeMode::Valid => Ok(()),
            FakeMode::FailAt(number) if header.number == number => {
                Err(ConsensusError::FakeFailure { number })
            }
            FakeMode::FailAt(_) => Ok(()),
            FakeMode::Delay(delay) => {
                thread::sleep(delay);
                Ok(())
            }
            FakeMode::Countdown { step, last } => {
                let remaining = last.saturating_sub(header.number);
                thread::sleep(step.saturating_mul(u32::try_from(remaining).unwrap_or(u32::MAX)));
                Err(ConsensusError::FakeFailure {
                    number: header.number,
                })
            }
        }
    }

    fn finalize(
        &self,
        _chain: &dyn ChainReader,
        header: &Header,
        _state: &mut dyn StateBackend,
        _txs: &[Transaction],
        _receipts: &[Receipt],
        _is_uncle: bool,
    ) -> Result<(), ConsensusError> {
        if self.fail_finalize {
            return Err(ConsensusError::FakeFailure {
                number: header.number,
            });
        }
        Ok(())
    }
}
