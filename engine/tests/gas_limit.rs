//! Properties of the gas limit policy.

use proptest::prelude::*;
use strata_engine::calc_gas_limit;
use strata_engine::gas_limit::{verify_gas_limit, GAS_LIMIT_BOUND_DIVISOR, MIN_GAS_LIMIT};
use strata_primitives::Header;

fn header(gas_limit: u64, gas_used: u64) -> Header {
    Header {
        gas_limit,
        gas_used,
        ..Header::default()
    }
}

#[test]
fn test_reference_vector() {
    assert_eq!(calc_gas_limit(6_000_000, 8_000_000, 5000, 10_000_000), 8_000_978);
}

proptest! {
    #[test]
    fn prop_next_limit_passes_header_bound(
        parent_limit in 2 * GAS_LIMIT_BOUND_DIVISOR * 1000..1u64 << 40,
        used_ratio in 0u64..=100,
        floor in MIN_GAS_LIMIT..1u64 << 40,
        span in 0u64..1u64 << 30,
    ) {
        let used = parent_limit / 100 * used_ratio;
        let next = calc_gas_limit(used, parent_limit, floor, floor + span);
        let parent = header(parent_limit, used);
        prop_assert!(verify_gas_limit(&parent, &header(next, 0)).is_ok(), "next {}", next);
    }

    #[test]
    fn prop_moves_towards_band(
        parent_limit in MIN_GAS_LIMIT..1u64 << 40,
        used_ratio in 0u64..=100,
        floor in MIN_GAS_LIMIT..1u64 << 40,
        span in 0u64..1u64 << 30,
    ) {
        let ceil = floor + span;
        let used = parent_limit / 100 * used_ratio;
        let next = calc_gas_limit(used, parent_limit, floor, ceil);
        if parent_limit < floor {
            prop_assert!(next >= parent_limit, "next {} parent {}", next, parent_limit);
        }
        if parent_limit > ceil {
            prop_assert!(next <= parent_limit, "next {} parent {}", next, parent_limit);
        }
        prop_assert!(next >= MIN_GAS_LIMIT);
    }
}
