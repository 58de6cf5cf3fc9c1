//! Block gas pool and intrinsic transaction gas.
//!
//! The pool starts at the block's gas limit. Each transaction takes its full
//! gas limit out of the pool before execution and returns the unused part
//! afterwards, so the pool never goes negative and the sum of gas used by a
//! block's transactions cannot exceed the header's limit.

use crate::error::GasPoolError;

/// Gas charged to every transaction before its payload runs.
pub const TX_GAS: u64 = 21_000;

/// Gas charged per payload data byte.
pub const TX_DATA_GAS: u64 = 68;

/// Intrinsic gas for a transaction carrying `data_len` payload bytes.
pub fn intrinsic_gas(data_len: usize) -> u64 {
    TX_GAS.saturating_add((data_len as u64).saturating_mul(TX_DATA_GAS))
}

/// Gas still available for the remaining transactions of a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GasPool {
    gas: u64,
}

impl GasPool {
    /// Create a pool holding `limit` gas.
    pub fn new(limit: u64) -> Self {
        Self { gas: limit }
    }

    /// Gas left in the pool.
    pub fn gas(&self) -> u64 {
        self.gas
    }

    /// Take `amount` gas out of the pool.
    ///
    /// Checked before applying, so on error the pool is unchanged.
    pub fn sub_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        if amount > self.gas {
            return Err(GasPoolError::GasLimitReached {
                have: self.gas,
                want: amount,
            });
        }
        self.gas -= amount;
        Ok(())
    }

    /// Return `amount` gas to the pool.
    pub fn add_gas(&mut self, amount: u64) -> Result<(), GasPoolError> {
        self.gas = self
            .gas
            .checked_add(amount)
            .ok_or(GasPoolError::Overflow {
                have: self.gas,
                amount,
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_pool_basic() {
        let mut pool = GasPool::new(100_000);
        pool.sub_gas(21_000).unwrap();
        assert_eq!(pool.gas(), 79_000);
        pool.add_gas(1_000).unwrap();
        assert_eq!(pool.gas(), 80_000);
    }

    #[test]
    fn test_gas_pool_exact_drain() {
        let mut pool = GasPool::new(21_000);
        pool.sub_gas(21_000).unwrap();
        assert_eq!(pool.gas(), 0);
    }

    #[test]
    fn test_gas_pool_refuses_overdraw() {
        let mut pool = GasPool::new(30_000);
        let err = pool.sub_gas(30_001).unwrap_err();
        assert_eq!(
            err,
            GasPoolError::GasLimitReached {
                have: 30_000,
                want: 30_001
            }
        );
        // unchanged on error
        assert_eq!(pool.gas(), 30_000);
    }

    #[test]
    fn test_gas_pool_overflow() {
        let mut pool = GasPool::new(u64::MAX - 1);
        assert!(matches!(
            pool.add_gas(2),
            Err(GasPoolError::Overflow { .. })
        ));
        assert_eq!(pool.gas(), u64::MAX - 1);
    }

    #[test]
    fn test_intrinsic_gas() {
        assert_eq!(intrinsic_gas(0), TX_GAS);
        assert_eq!(intrinsic_gas(10), 21_000 + 680);
        // saturates instead of wrapping
        assert_eq!(intrinsic_gas(usize::MAX), u64::MAX);
    }
}
