//! Block gas limit policy.
//!
//! A producer picks the next block's limit with [`calc_gas_limit`]: the limit
//! decays by 1/1024 per block and grows by 1.5x the parent's usage over 1024,
//! so it rises when blocks are more than two thirds full and falls otherwise,
//! while being pulled towards the configured `[floor, ceil]` band. Importers
//! only check the bound in [`verify_gas_limit`].

use strata_primitives::{GasLimitConfig, Header};

use crate::error::ConsensusError;

/// Maximum per-block change of the gas limit is `parent / GAS_LIMIT_BOUND_DIVISOR`.
pub const GAS_LIMIT_BOUND_DIVISOR: u64 = 1024;

/// Minimum gas limit any block may have.
pub const MIN_GAS_LIMIT: u64 = 5000;

/// Largest gas limit a header may carry.
pub const MAX_GAS_LIMIT: u64 = (1 << 63) - 1;

/// Gas limit for the child of a block that used `parent_gas_used` out of
/// `parent_gas_limit`.
pub fn calc_gas_limit(parent_gas_used: u64, parent_gas_limit: u64, floor: u64, ceil: u64) -> u64 {
    let contrib =
        parent_gas_used.saturating_add(parent_gas_used / 2) / GAS_LIMIT_BOUND_DIVISOR;
    let decay = (parent_gas_limit / GAS_LIMIT_BOUND_DIVISOR).saturating_sub(1);

    let mut limit = parent_gas_limit
        .saturating_sub(decay)
        .saturating_add(contrib)
        .max(MIN_GAS_LIMIT);

    // Head towards the band as fast as the bound allows.
    if limit < floor {
        limit = parent_gas_limit.saturating_add(decay).min(floor);
    } else if limit > ceil {
        limit = parent_gas_limit.saturating_sub(decay).max(ceil);
    }
    limit
}

/// [`calc_gas_limit`] for the child of `parent`.
pub fn next_gas_limit(parent: &Header, config: &GasLimitConfig) -> u64 {
    calc_gas_limit(parent.gas_used, parent.gas_limit, config.floor, config.ceil)
}

/// Check the gas fields of `header` against its parent.
pub fn verify_gas_limit(parent: &Header, header: &Header) -> Result<(), ConsensusError> {
    if header.gas_limit > MAX_GAS_LIMIT {
        return Err(ConsensusError::InvalidGasLimit {
            have: header.gas_limit,
            parent: parent.gas_limit,
        });
    }
    if header.gas_used > header.gas_limit {
        return Err(ConsensusError::InvalidGasUsed {
            used: header.gas_used,
            limit: header.gas_limit,
        });
    }

    let diff = parent.gas_limit.abs_diff(header.gas_limit);
    let bound = parent.gas_limit / GAS_LIMIT_BOUND_DIVISOR;
    if diff >= bound || header.gas_limit < MIN_GAS_LIMIT {
        return Err(ConsensusError::InvalidGasLimit {
            have: header.gas_limit,
            parent: parent.gas_limit,
        });
    }
    Ok(())
}
