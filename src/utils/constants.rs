//! Engine constants and default parameters.
//!
//! All protocol-wide constants are defined here for easy auditing and modification.

// ═══════════════════════════════════════════════════════════════════════════════
// FIXED-POINT SCALES
// ═══════════════════════════════════════════════════════════════════════════════

/// Decimals of the issued token and of oracle prices
pub const PRICE_DECIMALS: u32 = 6;

/// One whole issued token / one dollar of price (10^6)
pub const PRICE_SCALE: u128 = 1_000_000;

/// Decimals of the collateral asset
pub const COLLATERAL_DECIMALS: u32 = 18;

/// One whole unit of collateral (10^18)
pub const COLLATERAL_SCALE: u128 = 1_000_000_000_000_000_000;

/// Basis points divisor (10000 = 100%)
pub const BPS_DIVISOR: u64 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// TIME CONSTANTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Seconds in one hour
pub const HOUR_SECS: u64 = 3_600;

/// Seconds in one day; also the length of every rolling mint window
pub const DAY_SECS: u64 = 86_400;

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLER DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-caller cooldown between mint/redeem actions
pub const DEFAULT_COOLDOWN_SECS: u64 = DAY_SECS;

/// Minimum issued amount per mint (1 token)
pub const DEFAULT_MIN_MINT_AMOUNT: u128 = PRICE_SCALE;

/// Minimum issued amount per redeem (1 token)
pub const DEFAULT_MIN_REDEEM_AMOUNT: u128 = PRICE_SCALE;

/// Minimum collateral per mint (0.001 collateral)
pub const DEFAULT_MIN_COLLATERAL_AMOUNT: u128 = COLLATERAL_SCALE / 1_000;

/// Maximum price move between consecutive quotes - 5%
pub const DEFAULT_MAX_PRICE_MOVE_BPS: u64 = 500;

/// Delay between proposing and activating a new oracle - 2 days
pub const DEFAULT_ORACLE_TIMELOCK_DELAY: u64 = 2 * DAY_SECS;

/// Window after the timelock eta during which activation is allowed - 1 day
pub const DEFAULT_ORACLE_TIMELOCK_EXPIRY: u64 = DAY_SECS;

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Maximum age of a feed quote in seconds (1 hour)
pub const DEFAULT_MAX_PRICE_AGE: u64 = HOUR_SECS;

/// Maximum confidence interval relative to price - 10%
pub const DEFAULT_MAX_CONFIDENCE_BPS: u64 = 1_000;

/// Bucket width of the configurable oracle's pseudo-fluctuation
pub const DEFAULT_FLUCTUATION_WINDOW_SECS: u64 = 300;

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// System-wide rolling daily mint allowance (10 million tokens)
pub const DEFAULT_GLOBAL_DAILY_LIMIT: u128 = 10_000_000 * PRICE_SCALE;

/// Maximum issuer name length in bytes
pub const MAX_ISSUER_NAME_LENGTH: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// MISC
// ═══════════════════════════════════════════════════════════════════════════════

/// Length of an identity in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// Length of a hash in bytes (SHA256)
pub const HASH_LENGTH: usize = 32;

/// Events kept in memory by a component before the oldest are dropped
pub const MAX_BUFFERED_EVENTS: usize = 1_000;
