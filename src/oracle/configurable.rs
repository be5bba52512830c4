//! Admin-settable oracle.
//!
//! Deterministic price source for tests, simulations and staging
//! deployments. An optional pseudo-fluctuation derives a bounded offset from
//! the elapsed-time bucket so that scenarios see moving but reproducible
//! prices.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::access::{AccessControl, Role};
use crate::oracle::{OracleError, Price, PriceOracle};
use crate::utils::constants::BPS_DIVISOR;
use crate::utils::crypto::{Address, Hash};
use crate::utils::math::apply_signed_bps;
use crate::utils::time::{Clock, Timestamp};

// ═══════════════════════════════════════════════════════════════════════════════
// FLUCTUATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Deterministic bounded fluctuation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fluctuation {
    /// Maximum offset in either direction, in basis points
    pub range_bps: u64,
    /// Bucket width in seconds
    pub window_secs: u64,
    /// Start of bucket 0
    pub started_at: Timestamp,
}

impl Fluctuation {
    /// Bucket index at `now`
    pub fn bucket(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.started_at) / self.window_secs.max(1)
    }

    /// Offset in `[-range_bps, +range_bps]` for the bucket containing `now`
    pub fn offset_bps(&self, now: Timestamp, salt: &Address) -> i64 {
        if self.range_bps == 0 {
            return 0;
        }
        let mut seed = Vec::with_capacity(28);
        seed.extend_from_slice(&self.bucket(now).to_be_bytes());
        seed.extend_from_slice(salt.as_bytes());
        let hash = Hash::sha256(&seed);

        let mut word = [0u8; 8];
        word.copy_from_slice(&hash.as_bytes()[..8]);
        let span = 2 * self.range_bps + 1;
        (u64::from_be_bytes(word) % span) as i64 - self.range_bps as i64
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIGURABLE ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct ConfigurableState {
    base_price: Price,
    healthy: bool,
    updated_at: Timestamp,
    fluctuation: Option<Fluctuation>,
}

/// Oracle whose price and health are set by an Admin
pub struct ConfigurableOracle {
    id: Address,
    roles: Arc<dyn AccessControl>,
    clock: Arc<dyn Clock>,
    state: RwLock<ConfigurableState>,
}

impl ConfigurableOracle {
    /// Create a healthy oracle quoting `initial_price`
    pub fn new(
        id: Address,
        initial_price: Price,
        roles: Arc<dyn AccessControl>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        Self {
            id,
            roles,
            clock,
            state: RwLock::new(ConfigurableState {
                base_price: initial_price,
                healthy: true,
                updated_at: now,
                fluctuation: None,
            }),
        }
    }

    /// Set the base price; returns the previous base price
    pub fn set_price(&self, caller: &Address, price: Price) -> Result<Price, OracleError> {
        self.roles.require_role(caller, Role::Admin)?;
        if price == 0 {
            return Err(OracleError::InvalidParameter {
                name: "price".into(),
                reason: "price must be greater than zero".into(),
            });
        }
        let mut state = self.write_state();
        let previous = state.base_price;
        state.base_price = price;
        state.updated_at = self.clock.now();
        tracing::info!(oracle = %self.id.short(), previous, price, "configurable price set");
        Ok(previous)
    }

    /// Set the health flag
    pub fn set_health(&self, caller: &Address, healthy: bool) -> Result<(), OracleError> {
        self.roles.require_role(caller, Role::Admin)?;
        self.write_state().healthy = healthy;
        tracing::info!(oracle = %self.id.short(), healthy, "configurable health set");
        Ok(())
    }

    /// Enable the pseudo-fluctuation starting now
    pub fn enable_fluctuation(
        &self,
        caller: &Address,
        range_bps: u64,
        window_secs: u64,
    ) -> Result<(), OracleError> {
        self.roles.require_role(caller, Role::Admin)?;
        if range_bps >= BPS_DIVISOR {
            return Err(OracleError::InvalidParameter {
                name: "range_bps".into(),
                reason: format!("{} must be below {}", range_bps, BPS_DIVISOR),
            });
        }
        if window_secs == 0 {
            return Err(OracleError::InvalidParameter {
                name: "window_secs".into(),
                reason: "window must be greater than zero".into(),
            });
        }
        self.write_state().fluctuation = Some(Fluctuation {
            range_bps,
            window_secs,
            started_at: self.clock.now(),
        });
        Ok(())
    }

    /// Disable the pseudo-fluctuation
    pub fn disable_fluctuation(&self, caller: &Address) -> Result<(), OracleError> {
        self.roles.require_role(caller, Role::Admin)?;
        self.write_state().fluctuation = None;
        Ok(())
    }

    /// Base price without fluctuation
    pub fn base_price(&self) -> Price {
        self.read_state().base_price
    }

    /// Timestamp of the last `set_price`
    pub fn updated_at(&self) -> Timestamp {
        self.read_state().updated_at
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ConfigurableState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ConfigurableState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl PriceOracle for ConfigurableOracle {
    fn oracle_id(&self) -> Address {
        self.id
    }

    fn description(&self) -> String {
        "configurable".to_string()
    }

    fn price(&self) -> Result<Price, OracleError> {
        let state = self.read_state().clone();
        if !state.healthy {
            return Err(OracleError::Unhealthy("marked unhealthy by admin".into()));
        }
        if state.base_price == 0 {
            return Err(OracleError::InvalidPrice("no price set".into()));
        }
        Ok(match state.fluctuation {
            Some(f) => apply_signed_bps(state.base_price, f.offset_bps(self.clock.now(), &self.id)),
            None => state.base_price,
        })
    }

    fn is_healthy(&self) -> bool {
        let state = self.read_state();
        state.healthy && state.base_price > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RoleRegistry;
    use crate::utils::time::ManualClock;

    fn setup(price: Price) -> (ConfigurableOracle, Address, ManualClock) {
        let admin = Address::from_label("admin");
        let clock = ManualClock::new(1_000_000);
        let oracle = ConfigurableOracle::new(
            Address::from_label("oracle"),
            price,
            Arc::new(RoleRegistry::with_admin(admin)),
            Arc::new(clock.clone()),
        );
        (oracle, admin, clock)
    }

    #[test]
    fn test_price_and_health() {
        let (oracle, admin, _) = setup(4_500_000_000);
        assert_eq!(oracle.price().unwrap(), 4_500_000_000);
        assert!(oracle.is_healthy());

        oracle.set_health(&admin, false).unwrap();
        assert!(!oracle.is_healthy());
        assert!(matches!(oracle.price(), Err(OracleError::Unhealthy(_))));
    }

    #[test]
    fn test_zero_initial_price_is_invalid() {
        let (oracle, _, _) = setup(0);
        assert!(!oracle.is_healthy());
        assert!(matches!(oracle.price(), Err(OracleError::InvalidPrice(_))));
    }

    #[test]
    fn test_set_price_requires_admin() {
        let (oracle, admin, _) = setup(1_000_000);
        let stranger = Address::from_label("stranger");
        assert!(matches!(
            oracle.set_price(&stranger, 2_000_000),
            Err(OracleError::Unauthorized(_))
        ));
        assert_eq!(oracle.set_price(&admin, 2_000_000).unwrap(), 1_000_000);
        assert!(oracle.set_price(&admin, 0).is_err());
        assert_eq!(oracle.price().unwrap(), 2_000_000);
    }

    #[test]
    fn test_fluctuation_bounded_and_bucketed() {
        let (oracle, admin, clock) = setup(1_000_000_000);
        oracle.enable_fluctuation(&admin, 200, 300).unwrap();

        let first = oracle.price().unwrap();
        clock.advance(299);
        // Same bucket, same price
        assert_eq!(oracle.price().unwrap(), first);

        for _ in 0..50 {
            clock.advance(300);
            let p = oracle.price().unwrap();
            assert!(p >= 980_000_000 && p <= 1_020_000_000, "price {} out of range", p);
        }

        oracle.disable_fluctuation(&admin).unwrap();
        assert_eq!(oracle.price().unwrap(), 1_000_000_000);
    }

    #[test]
    fn test_fluctuation_offset_deterministic() {
        let f = Fluctuation { range_bps: 100, window_secs: 300, started_at: 0 };
        let salt = Address::from_label("oracle");
        assert_eq!(f.offset_bps(10, &salt), f.offset_bps(250, &salt));
        assert_eq!(f.bucket(600), 2);
        for t in (0..30_000).step_by(300) {
            let o = f.offset_bps(t, &salt);
            assert!((-100..=100).contains(&o));
        }
    }
}
