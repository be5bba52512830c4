//! Input validation utilities.
//!
//! Shared checks run before any state is touched.

use crate::error::{Error, Result};
use crate::utils::constants::*;
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u128, name: &str) -> Result<()> {
    if amount == 0 {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: "amount cannot be zero".into(),
        });
    }
    Ok(())
}

/// Validate that an amount meets a minimum
pub fn validate_minimum(amount: u128, minimum: u128, what: &'static str) -> Result<()> {
    if amount < minimum {
        return Err(Error::AmountTooSmall {
            what,
            amount,
            minimum,
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// RATIO VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate a basis-point ratio lies in (0, 10000]
pub fn validate_bps(bps: u64, name: &str) -> Result<()> {
    if bps == 0 || bps > BPS_DIVISOR {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: format!("{} bps outside (0, {}]", bps, BPS_DIVISOR),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTITY VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an address is not the zero address
pub fn validate_address(address: &Address, name: &str) -> Result<()> {
    if address.is_zero() {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: "zero address".into(),
        });
    }
    Ok(())
}

/// Validate an issuer display name
pub fn validate_issuer_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidParameter {
            name: "name".into(),
            reason: "issuer name cannot be empty".into(),
        });
    }
    if name.len() > MAX_ISSUER_NAME_LENGTH {
        return Err(Error::InvalidParameter {
            name: "name".into(),
            reason: format!(
                "issuer name is {} bytes, max {}",
                name.len(),
                MAX_ISSUER_NAME_LENGTH
            ),
        });
    }
    Ok(())
}
