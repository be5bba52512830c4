//! Engine configuration and parameters.
//!
//! Parameters are grouped by the component that consumes them:
//! - Controller: cooldown, minimum amounts, circuit breaker, oracle timelock
//! - Oracle: staleness and confidence bounds, fluctuation window
//! - Registry: global daily limit
//!
//! Controller parameters can later be adjusted by an Admin through the
//! controller itself; the values here are the starting point.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::utils::constants::*;

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLER CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Issuance controller parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Minimum seconds between two actions of the same caller
    pub cooldown_secs: u64,

    /// Minimum issued amount per mint (6 decimals)
    pub min_mint_amount: u128,

    /// Minimum issued amount per redeem (6 decimals)
    pub min_redeem_amount: u128,

    /// Minimum collateral per mint (18 decimals)
    pub min_collateral_amount: u128,

    /// Maximum move between consecutive quotes, in basis points
    pub max_price_move_bps: u64,

    /// Delay between proposing and activating an oracle
    pub oracle_timelock_delay: u64,

    /// Window after the eta during which activation is allowed
    pub oracle_timelock_expiry: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
            min_mint_amount: DEFAULT_MIN_MINT_AMOUNT,
            min_redeem_amount: DEFAULT_MIN_REDEEM_AMOUNT,
            min_collateral_amount: DEFAULT_MIN_COLLATERAL_AMOUNT,
            max_price_move_bps: DEFAULT_MAX_PRICE_MOVE_BPS,
            oracle_timelock_delay: DEFAULT_ORACLE_TIMELOCK_DELAY,
            oracle_timelock_expiry: DEFAULT_ORACLE_TIMELOCK_EXPIRY,
        }
    }
}

impl ControllerConfig {
    /// Relaxed parameters for local simulations: no cooldown, tiny minimums
    pub fn permissive() -> Self {
        Self {
            cooldown_secs: 0,
            min_mint_amount: 1,
            min_redeem_amount: 1,
            min_collateral_amount: 1,
            ..Self::default()
        }
    }

    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_price_move_bps == 0 || self.max_price_move_bps > BPS_DIVISOR {
            return Err(ConfigError::Validation(format!(
                "max_price_move_bps {} outside (0, {}]",
                self.max_price_move_bps, BPS_DIVISOR
            )));
        }
        if self.oracle_timelock_delay == 0 {
            return Err(ConfigError::Validation(
                "oracle_timelock_delay must be greater than 0".into(),
            ));
        }
        if self.oracle_timelock_expiry == 0 {
            return Err(ConfigError::Validation(
                "oracle_timelock_expiry must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Price oracle parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Maximum age of a feed quote in seconds
    pub max_price_age: u64,

    /// Maximum confidence / price ratio in basis points
    pub max_confidence_bps: u64,

    /// Bucket width of the configurable oracle's pseudo-fluctuation
    pub fluctuation_window_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_price_age: DEFAULT_MAX_PRICE_AGE,
            max_confidence_bps: DEFAULT_MAX_CONFIDENCE_BPS,
            fluctuation_window_secs: DEFAULT_FLUCTUATION_WINDOW_SECS,
        }
    }
}

impl OracleConfig {
    /// Validate parameters are consistent
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_price_age == 0 {
            return Err(ConfigError::Validation("max_price_age must be greater than 0".into()));
        }
        if self.max_confidence_bps == 0 || self.max_confidence_bps > BPS_DIVISOR {
            return Err(ConfigError::Validation(format!(
                "max_confidence_bps {} outside (0, {}]",
                self.max_confidence_bps, BPS_DIVISOR
            )));
        }
        if self.fluctuation_window_secs == 0 {
            return Err(ConfigError::Validation(
                "fluctuation_window_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Issuer registry parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// System-wide rolling 24h mint allowance (6 decimals)
    pub global_daily_limit: u128,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            global_daily_limit: DEFAULT_GLOBAL_DAILY_LIMIT,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Controller parameters
    pub controller: ControllerConfig,
    /// Oracle parameters
    pub oracle: OracleConfig,
    /// Registry parameters
    pub registry: RegistryConfig,
}

impl EngineConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        std::fs::write(path, content)
            .map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Defaults overlaid with `ISSUANCE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from a key lookup (environment-style names)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Parse(format!("{}: cannot parse {:?}", key, value)))
        }

        if let Some(v) = lookup("ISSUANCE_COOLDOWN_SECS") {
            self.controller.cooldown_secs = parse("ISSUANCE_COOLDOWN_SECS", v)?;
        }
        if let Some(v) = lookup("ISSUANCE_MIN_MINT_AMOUNT") {
            self.controller.min_mint_amount = parse("ISSUANCE_MIN_MINT_AMOUNT", v)?;
        }
        if let Some(v) = lookup("ISSUANCE_MIN_REDEEM_AMOUNT") {
            self.controller.min_redeem_amount = parse("ISSUANCE_MIN_REDEEM_AMOUNT", v)?;
        }
        if let Some(v) = lookup("ISSUANCE_MIN_COLLATERAL_AMOUNT") {
            self.controller.min_collateral_amount = parse("ISSUANCE_MIN_COLLATERAL_AMOUNT", v)?;
        }
        if let Some(v) = lookup("ISSUANCE_MAX_PRICE_MOVE_BPS") {
            self.controller.max_price_move_bps = parse("ISSUANCE_MAX_PRICE_MOVE_BPS", v)?;
        }
        if let Some(v) = lookup("ISSUANCE_ORACLE_TIMELOCK_DELAY") {
            self.controller.oracle_timelock_delay = parse("ISSUANCE_ORACLE_TIMELOCK_DELAY", v)?;
        }
        if let Some(v) = lookup("ISSUANCE_ORACLE_TIMELOCK_EXPIRY") {
            self.controller.oracle_timelock_expiry = parse("ISSUANCE_ORACLE_TIMELOCK_EXPIRY", v)?;
        }
        if let Some(v) = lookup("ISSUANCE_MAX_PRICE_AGE") {
            self.oracle.max_price_age = parse("ISSUANCE_MAX_PRICE_AGE", v)?;
        }
        if let Some(v) = lookup("ISSUANCE_MAX_CONFIDENCE_BPS") {
            self.oracle.max_confidence_bps = parse("ISSUANCE_MAX_CONFIDENCE_BPS", v)?;
        }
        if let Some(v) = lookup("ISSUANCE_GLOBAL_DAILY_LIMIT") {
            self.registry.global_daily_limit = parse("ISSUANCE_GLOBAL_DAILY_LIMIT", v)?;
        }

        self.validate()
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()?;
        self.oracle.validate()?;
        if self.registry.global_daily_limit == 0 {
            return Err(ConfigError::Validation(
                "global_daily_limit must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ConfigError> for crate::error::Error {
    fn from(err: ConfigError) -> Self {
        crate::error::Error::Config(err.to_string())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.controller.max_price_move_bps, 500);
        assert_eq!(config.controller.oracle_timelock_delay, 2 * DAY_SECS);
        assert_eq!(config.oracle.max_price_age, 3600);
        assert_eq!(config.oracle.max_confidence_bps, 1000);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        config.controller.max_price_move_bps = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.oracle.max_confidence_bps = BPS_DIVISOR + 1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.registry.global_daily_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.json");

        let mut config = EngineConfig::default();
        config.controller.cooldown_secs = 60;
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "controller": { "cooldown_secs": 10 } }"#).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded.controller.cooldown_secs, 10);
        assert_eq!(loaded.controller.max_price_move_bps, DEFAULT_MAX_PRICE_MOVE_BPS);
        assert_eq!(loaded.oracle, OracleConfig::default());
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load(Path::new("/nonexistent/engine.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ISSUANCE_COOLDOWN_SECS", "120"),
            ("ISSUANCE_MAX_PRICE_MOVE_BPS", "250"),
            ("ISSUANCE_GLOBAL_DAILY_LIMIT", "5000000"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.controller.cooldown_secs, 120);
        assert_eq!(config.controller.max_price_move_bps, 250);
        assert_eq!(config.registry.global_daily_limit, 5_000_000);
    }

    #[test]
    fn test_override_parse_error() {
        let mut config = EngineConfig::default();
        let result = config.apply_overrides(|k| {
            (k == "ISSUANCE_MAX_PRICE_AGE").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_permissive_is_valid() {
        assert!(ControllerConfig::permissive().validate().is_ok());
    }
}
