//! Price oracle abstraction.
//!
//! The controller talks to exactly one [`PriceOracle`] at a time through a
//! trait object and never inspects which implementation is behind it:
//! - [`ConfigurableOracle`]: admin-settable price and health, with an optional
//!   deterministic fluctuation for test scenarios
//! - [`FeedBackedOracle`]: wraps an external pull-based price service with
//!   staleness and confidence-interval checks and fee-paying updates
//!
//! Prices are unsigned fixed point with 6 decimals (`1_000_000 = 1.0`).

pub mod configurable;
pub mod feed;

pub use configurable::*;
pub use feed::*;

use thiserror::Error;

use crate::utils::constants::PRICE_DECIMALS;
use crate::utils::crypto::Address;

/// Price with 6 decimals. Zero is never a valid quote.
pub type Price = u64;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors surfaced by oracle implementations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Health predicate is false (paused, feed unreachable, confidence too wide)
    #[error("oracle unhealthy: {0}")]
    Unhealthy(String),

    /// Raw quote is zero or negative
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// Quote older than the configured maximum age
    #[error("stale price: age {age}s, max {max_age}s")]
    Stale {
        /// Age in seconds
        age: u64,
        /// Maximum allowed age in seconds
        max_age: u64,
    },

    /// Caller lacks the required role on this oracle
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Payment does not cover the update fee
    #[error("insufficient fee: required {required}, provided {provided}")]
    InsufficientFee {
        /// Fee charged by the price service
        required: u128,
        /// Payment supplied by the caller
        provided: u128,
    },

    /// Update payment could not be collected from the caller
    #[error("update payment failed: {0}")]
    PaymentFailed(String),

    /// Caller re-entered the update path while its previous update was in flight
    #[error("reentrant price update")]
    ReentrantUpdate,

    /// Invalid admin parameter
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },
}

impl From<crate::error::Error> for OracleError {
    fn from(err: crate::error::Error) -> Self {
        match err {
            crate::error::Error::Unauthorized(reason) => OracleError::Unauthorized(reason),
            crate::error::Error::InvalidParameter { name, reason } => {
                OracleError::InvalidParameter { name, reason }
            }
            other => OracleError::Unhealthy(other.to_string()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Contract shared by every oracle implementation
pub trait PriceOracle: Send + Sync {
    /// Identity of this oracle instance
    fn oracle_id(&self) -> Address;

    /// Human-readable description for logs and events
    fn description(&self) -> String;

    /// Current quote scaled to 6 decimals
    fn price(&self) -> Result<Price, OracleError>;

    /// Aggregated health predicate; never fails
    fn is_healthy(&self) -> bool;

    /// Decimals of the quotes returned by [`PriceOracle::price`]
    fn decimals(&self) -> u32 {
        PRICE_DECIMALS
    }
}

impl std::fmt::Debug for dyn PriceOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceOracle")
            .field("id", &self.oracle_id())
            .field("description", &self.description())
            .finish()
    }
}
