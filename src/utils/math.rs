//! Fixed-point arithmetic helpers.
//!
//! All settlement math runs on `u128` with explicit overflow checks and
//! truncating division; nothing here ever rounds up.

use crate::error::{Error, Result};
use crate::utils::constants::{BPS_DIVISOR, COLLATERAL_SCALE};

// ═══════════════════════════════════════════════════════════════════════════════
// SAFE ARITHMETIC OPERATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(Error::Overflow {
        operation: format!("{} + {}", a, b),
    })
}

/// Safe multiplication then division, truncating.
/// Computes (a * b) / c
pub fn safe_mul_div(a: u128, b: u128, c: u128) -> Result<u128> {
    if c == 0 {
        return Err(Error::InvalidParameter {
            name: "divisor".into(),
            reason: "division by zero".into(),
        });
    }
    let product = a.checked_mul(b).ok_or(Error::Overflow {
        operation: format!("({} * {}) / {}", a, b, c),
    })?;
    Ok(product / c)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ISSUANCE CALCULATIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Issued amount (6 decimals) for an 18-decimal collateral amount at a
/// 6-decimal price: `collateral * price / 10^18`
pub fn issued_for_collateral(collateral: u128, price: u64) -> Result<u128> {
    safe_mul_div(collateral, price as u128, COLLATERAL_SCALE)
}

/// Collateral (18 decimals) paid out for an issued amount at a 6-decimal
/// price: `issued * 10^18 / price`
pub fn collateral_for_issued(issued: u128, price: u64) -> Result<u128> {
    if price == 0 {
        return Err(Error::OraclePriceInvalid("price is zero".into()));
    }
    safe_mul_div(issued, COLLATERAL_SCALE, price as u128)
}

// ═══════════════════════════════════════════════════════════════════════════════
// RATIOS
// ═══════════════════════════════════════════════════════════════════════════════

/// Absolute move from `reference` to `value` in basis points of `reference`
/// (truncated). Zero reference yields zero.
pub fn move_bps(reference: u64, value: u64) -> u64 {
    if reference == 0 {
        return 0;
    }
    let diff = reference.abs_diff(value) as u128;
    let bps = diff * BPS_DIVISOR as u128 / reference as u128;
    bps.min(u64::MAX as u128) as u64
}

/// Check if a value is within `max_bps` of a reference, compared exactly:
/// `|value - reference| * 10000 <= reference * max_bps`
pub fn within_bps(reference: u64, value: u64, max_bps: u64) -> bool {
    let diff = reference.abs_diff(value) as u128;
    diff * BPS_DIVISOR as u128 <= reference as u128 * max_bps as u128
}

/// Ratio `part / whole` in basis points, saturating at `u64::MAX`.
/// A zero `whole` yields `u64::MAX`.
pub fn ratio_bps(part: u128, whole: u128) -> u64 {
    if whole == 0 {
        return u64::MAX;
    }
    let ratio = part.saturating_mul(BPS_DIVISOR as u128) / whole;
    ratio.min(u64::MAX as u128) as u64
}

/// Apply a signed basis-point offset to a value, never going below 1
pub fn apply_signed_bps(value: u64, offset_bps: i64) -> u64 {
    let delta = (value as i128) * (offset_bps as i128) / BPS_DIVISOR as i128;
    let result = (value as i128 + delta).max(1);
    result.min(u64::MAX as i128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_issued_for_collateral_concrete() {
        // 1 collateral at $4500 issues 4500 tokens
        let issued = issued_for_collateral(COLLATERAL_SCALE, 4_500_000_000).unwrap();
        assert_eq!(issued, 4_500_000_000);
    }

    #[test]
    fn test_issued_truncates() {
        // 1 wei at $4500 rounds down to zero
        assert_eq!(issued_for_collateral(1, 4_500_000_000).unwrap(), 0);
    }

    #[test]
    fn test_collateral_for_issued_zero_price() {
        assert!(collateral_for_issued(1_000_000, 0).is_err());
    }

    #[test]
    fn test_overflow_detected() {
        assert!(matches!(
            safe_mul_div(u128::MAX, 2, 1),
            Err(Error::Overflow { .. })
        ));
    }

    #[test]
    fn test_within_bps() {
        // +2.2% within 5%
        assert!(within_bps(4_500_000_000, 4_600_000_000, 500));
        // +11.1% outside 5%
        assert!(!within_bps(4_500_000_000, 5_000_000_000, 500));
        // exactly 5% is allowed
        assert!(within_bps(1_000_000, 1_050_000, 500));
        assert!(within_bps(1_000_000, 950_000, 500));
        assert!(!within_bps(1_000_000, 949_999, 500));
    }

    #[test]
    fn test_move_bps() {
        assert_eq!(move_bps(1_000_000, 1_050_000), 500);
        assert_eq!(move_bps(1_000_000, 900_000), 1000);
        assert_eq!(move_bps(0, 5), 0);
    }

    #[test]
    fn test_ratio_bps() {
        assert_eq!(ratio_bps(10, 100), 1000);
        assert_eq!(ratio_bps(1, 0), u64::MAX);
    }

    #[test]
    fn test_apply_signed_bps() {
        assert_eq!(apply_signed_bps(1_000_000, 100), 1_010_000);
        assert_eq!(apply_signed_bps(1_000_000, -100), 990_000);
        assert_eq!(apply_signed_bps(1, -10_000), 1);
    }

    proptest! {
        #[test]
        fn prop_issued_matches_formula(collateral in 0u128..1_000_000 * COLLATERAL_SCALE, price in 1u64..100_000_000_000) {
            let issued = issued_for_collateral(collateral, price).unwrap();
            prop_assert_eq!(issued, collateral * price as u128 / COLLATERAL_SCALE);
        }

        #[test]
        fn prop_round_trip_within_one_unit(issued in 1u128..1_000_000_000_000_000, price in 1u64..100_000_000_000) {
            let collateral = collateral_for_issued(issued, price).unwrap();
            let back = issued_for_collateral(collateral, price).unwrap();
            prop_assert!(back <= issued);
            prop_assert!(issued - back <= 1);
        }
    }
}
