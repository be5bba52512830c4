//! Error types for the issuance engine.
//!
//! Every failure surfaced by the controller, the oracles and the registry is
//! synchronous and leaves no partial state behind. Nothing is retried
//! internally; retry policy belongs to the caller.

use thiserror::Error;

use crate::oracle::OracleError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the issuance engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ═══════════════════════════════════════════════════════════════════
    // Access Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller lacks the capability required by the operation
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Operation suppressed by a pause flag
    #[error("Operation paused: {0}")]
    Paused(String),

    /// Caller re-entered mint/redeem while a previous call was still in flight
    #[error("Reentrant call rejected for {0}")]
    ReentrantCall(String),

    // ═══════════════════════════════════════════════════════════════════
    // Amount and Rate Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Caller acted again before its cooldown elapsed
    #[error("Cooldown active: next action allowed at {next_allowed}, now {now}")]
    CooldownActive {
        /// Earliest timestamp at which the caller may act again
        next_allowed: u64,
        /// Current timestamp
        now: u64,
    },

    /// Amount below the configured minimum
    #[error("Amount {amount} below minimum {minimum} ({what})")]
    AmountTooSmall {
        /// Which amount was checked
        what: &'static str,
        /// Provided (or computed) amount
        amount: u128,
        /// Required minimum
        minimum: u128,
    },

    /// Not enough collateral held to honour a payout
    #[error("Insufficient reserves: required {required}, available {available}")]
    InsufficientReserves {
        /// Collateral required
        required: u128,
        /// Collateral held
        available: u128,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Oracle Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Active oracle reports itself unhealthy
    #[error("Oracle unhealthy: {0}")]
    OracleUnhealthy(String),

    /// Oracle quote was zero or negative
    #[error("Oracle returned an invalid price: {0}")]
    OraclePriceInvalid(String),

    /// Oracle quote older than the allowed age
    #[error("Oracle price is stale: age {age}s, max allowed {max_age}s")]
    OracleStale {
        /// Age of the quote in seconds
        age: u64,
        /// Maximum allowed age in seconds
        max_age: u64,
    },

    /// Circuit breaker tripped
    #[error("Price move too large: {last_price} -> {price} ({move_bps} bps, max {max_bps} bps)")]
    PriceMoveTooLarge {
        /// Reference price
        last_price: u64,
        /// New quote
        price: u64,
        /// Observed move in basis points
        move_bps: u64,
        /// Allowed move in basis points
        max_bps: u64,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Registry Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Issuer would exceed its rolling daily allowance
    #[error("Issuer {issuer} daily limit exceeded: requested {requested}, remaining {remaining}")]
    IssuerDailyLimitExceeded {
        /// Issuer identity
        issuer: String,
        /// Amount requested
        requested: u128,
        /// Allowance left in the window
        remaining: u128,
    },

    /// System would exceed the global rolling daily allowance
    #[error("Global daily limit exceeded: requested {requested}, remaining {remaining}")]
    GlobalDailyLimitExceeded {
        /// Amount requested
        requested: u128,
        /// Allowance left in the window
        remaining: u128,
    },

    /// Issuer unknown or inactive
    #[error("Issuer not found: {0}")]
    IssuerNotFound(String),

    /// Issuer id already registered and active
    #[error("Issuer already exists: {0}")]
    IssuerAlreadyExists(String),

    // ═══════════════════════════════════════════════════════════════════
    // Oracle Migration Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Execute or cancel without a pending proposal
    #[error("No pending oracle proposal")]
    NoPendingOracle,

    /// Execute before the timelock eta
    #[error("Timelock not expired: eta {eta}, now {now}")]
    TimelockNotExpired {
        /// Earliest activation time
        eta: u64,
        /// Current timestamp
        now: u64,
    },

    /// Execute after the activation window closed
    #[error("Timelock expired at {expired_at}, now {now}; re-propose the oracle")]
    TimelockExpired {
        /// Last timestamp at which activation was allowed
        expired_at: u64,
        /// Current timestamp
        now: u64,
    },

    /// Candidate oracle is zero, self, unhealthy or non-conforming
    #[error("Invalid oracle candidate: {0}")]
    InvalidOracleCandidate(String),

    // ═══════════════════════════════════════════════════════════════════
    // Validation / Internal Errors
    // ═══════════════════════════════════════════════════════════════════

    /// Invalid input parameter
    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Overflow in calculation
    #[error("Arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that overflowed
        operation: String,
    },

    /// Ledger collaborator rejected a mint, burn or transfer
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Returns true if retrying later (without changing inputs) may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Paused(_)
                | Error::CooldownActive { .. }
                | Error::OracleUnhealthy(_)
                | Error::OracleStale { .. }
                | Error::IssuerDailyLimitExceeded { .. }
                | Error::GlobalDailyLimitExceeded { .. }
                | Error::TimelockNotExpired { .. }
        )
    }

    /// Returns the error code for external systems
    pub fn code(&self) -> u32 {
        match self {
            // Access errors: 1xxx
            Error::Unauthorized(_) => 1001,
            Error::Paused(_) => 1002,
            Error::ReentrantCall(_) => 1003,

            // Amount errors: 2xxx
            Error::CooldownActive { .. } => 2001,
            Error::AmountTooSmall { .. } => 2002,
            Error::InsufficientReserves { .. } => 2003,

            // Oracle errors: 3xxx
            Error::OracleUnhealthy(_) => 3001,
            Error::OraclePriceInvalid(_) => 3002,
            Error::OracleStale { .. } => 3003,
            Error::PriceMoveTooLarge { .. } => 3004,

            // Registry errors: 4xxx
            Error::IssuerDailyLimitExceeded { .. } => 4001,
            Error::GlobalDailyLimitExceeded { .. } => 4002,
            Error::IssuerNotFound(_) => 4003,
            Error::IssuerAlreadyExists(_) => 4004,

            // Migration errors: 5xxx
            Error::NoPendingOracle => 5001,
            Error::TimelockNotExpired { .. } => 5002,
            Error::TimelockExpired { .. } => 5003,
            Error::InvalidOracleCandidate(_) => 5004,

            // Internal errors: 9xxx
            Error::InvalidParameter { .. } => 9001,
            Error::Overflow { .. } => 9002,
            Error::Ledger(_) => 9003,
            Error::Config(_) => 9004,
        }
    }
}

impl From<OracleError> for Error {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::Unhealthy(reason) => Error::OracleUnhealthy(reason),
            OracleError::InvalidPrice(reason) => Error::OraclePriceInvalid(reason),
            OracleError::Stale { age, max_age } => Error::OracleStale { age, max_age },
            OracleError::Unauthorized(reason) => Error::Unauthorized(reason),
            OracleError::InsufficientFee { required, provided } => Error::InvalidParameter {
                name: "payment".into(),
                reason: format!("fee {} exceeds payment {}", required, provided),
            },
            OracleError::PaymentFailed(reason) => Error::Ledger(reason),
            OracleError::ReentrantUpdate => Error::ReentrantCall("oracle update".into()),
            OracleError::InvalidParameter { name, reason } => Error::InvalidParameter { name, reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_unique() {
        let codes = vec![
            Error::Unauthorized("".into()).code(),
            Error::Paused("".into()).code(),
            Error::CooldownActive { next_allowed: 0, now: 0 }.code(),
            Error::AmountTooSmall { what: "", amount: 0, minimum: 0 }.code(),
            Error::OracleUnhealthy("".into()).code(),
            Error::OracleStale { age: 0, max_age: 0 }.code(),
            Error::IssuerDailyLimitExceeded { issuer: "".into(), requested: 0, remaining: 0 }.code(),
            Error::GlobalDailyLimitExceeded { requested: 0, remaining: 0 }.code(),
            Error::NoPendingOracle.code(),
            Error::TimelockNotExpired { eta: 0, now: 0 }.code(),
            Error::TimelockExpired { expired_at: 0, now: 0 }.code(),
            Error::InvalidOracleCandidate("".into()).code(),
        ];

        let mut unique_codes = codes.clone();
        unique_codes.sort();
        unique_codes.dedup();

        assert_eq!(codes.len(), unique_codes.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_display() {
        let err = Error::InsufficientReserves {
            required: 1000,
            available: 500,
        };
        assert!(err.to_string().contains("1000"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_oracle_error_mapping() {
        let err: Error = OracleError::Stale { age: 7200, max_age: 3600 }.into();
        assert_eq!(err, Error::OracleStale { age: 7200, max_age: 3600 });

        let err: Error = OracleError::InvalidPrice("negative".into()).into();
        assert_eq!(err.code(), 3002);

        let err: Error = OracleError::Unhealthy("paused".into()).into();
        assert!(matches!(err, Error::OracleUnhealthy(_)));

        let err: Error = OracleError::PaymentFailed("insufficient balance".into()).into();
        assert!(matches!(err, Error::Ledger(_)));
    }

    #[test]
    fn test_is_recoverable() {
        assert!(Error::CooldownActive { next_allowed: 10, now: 5 }.is_recoverable());
        assert!(Error::TimelockNotExpired { eta: 10, now: 5 }.is_recoverable());
        assert!(!Error::InvalidOracleCandidate("zero".into()).is_recoverable());
        assert!(!Error::NoPendingOracle.is_recoverable());
    }
}
