//! Controller state pieces.
//!
//! Plain data held behind the controller's lock: pause flags, the reference
//! price used by the circuit breaker, per-caller cooldowns and the pending
//! oracle proposal.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::oracle::{Price, PriceOracle};
use crate::protocol::events::PauseTarget;
use crate::utils::crypto::Address;
use crate::utils::time::Timestamp;

// ═══════════════════════════════════════════════════════════════════════════════
// PAUSE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Independent pause flags. `global` suppresses everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseState {
    /// All operations suppressed
    pub global: bool,
    /// Mint suppressed
    pub mint: bool,
    /// Redeem suppressed
    pub redeem: bool,
}

impl PauseState {
    /// Whether the flag for `target` is raised
    pub fn is_set(&self, target: PauseTarget) -> bool {
        match target {
            PauseTarget::Global => self.global,
            PauseTarget::Mint => self.mint,
            PauseTarget::Redeem => self.redeem,
        }
    }

    /// Set the flag for `target`; returns true when it changed
    pub fn set(&mut self, target: PauseTarget, paused: bool) -> bool {
        let flag = match target {
            PauseTarget::Global => &mut self.global,
            PauseTarget::Mint => &mut self.mint,
            PauseTarget::Redeem => &mut self.redeem,
        };
        let changed = *flag != paused;
        *flag = paused;
        changed
    }

    /// Whether no flag is raised
    pub fn is_active(&self) -> bool {
        !(self.global || self.mint || self.redeem)
    }

    /// Fail with `Paused` if mint is suppressed
    pub fn check_mint(&self) -> Result<()> {
        if self.global {
            return Err(Error::Paused("global".into()));
        }
        if self.mint {
            return Err(Error::Paused("mint".into()));
        }
        Ok(())
    }

    /// Fail with `Paused` if redeem is suppressed
    pub fn check_redeem(&self) -> Result<()> {
        if self.global {
            return Err(Error::Paused("global".into()));
        }
        if self.redeem {
            return Err(Error::Paused("redeem".into()));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE HISTORY
// ═══════════════════════════════════════════════════════════════════════════════

/// Reference price for the circuit breaker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceHistory {
    /// Last committed price; 0 until the first quote
    pub last_price: Price,
    /// When `last_price` was committed
    pub last_update_time: Timestamp,
    /// Number of committed changes
    pub update_count: u64,
}

impl PriceHistory {
    /// Commit `price` if it differs from the last one. Returns the previous
    /// price when a change was recorded.
    pub fn record(&mut self, price: Price, now: Timestamp) -> Option<Price> {
        if price == self.last_price {
            return None;
        }
        Some(self.reset_to(price, now))
    }

    /// Commit `price` unconditionally; returns the previous price
    pub fn reset_to(&mut self, price: Price, now: Timestamp) -> Price {
        let previous = self.last_price;
        self.last_price = price;
        self.last_update_time = now;
        self.update_count += 1;
        previous
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RATE LIMITER
// ═══════════════════════════════════════════════════════════════════════════════

/// Per-caller cooldown shared by mint and redeem
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimiter {
    last_action: HashMap<Address, Timestamp>,
}

impl RateLimiter {
    /// Create an empty limiter
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with `CooldownActive` unless `caller` may act at `now`.
    /// Callers without a recorded action may always act.
    pub fn check(&self, caller: &Address, now: Timestamp, cooldown: u64) -> Result<()> {
        match self.last_action.get(caller) {
            Some(&last) => {
                let next_allowed = last.saturating_add(cooldown);
                if now < next_allowed {
                    return Err(Error::CooldownActive { next_allowed, now });
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Record an action by `caller` at `now`
    pub fn record(&mut self, caller: &Address, now: Timestamp) {
        self.last_action.insert(*caller, now);
    }

    /// Last recorded action of `caller`
    pub fn last_action_time(&self, caller: &Address) -> Option<Timestamp> {
        self.last_action.get(caller).copied()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PENDING ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Oracle replacement waiting for its timelock
#[derive(Debug, Clone)]
pub struct PendingOracle {
    /// Proposed oracle
    pub candidate: Arc<dyn PriceOracle>,
    /// Earliest activation time
    pub eta: Timestamp,
    /// When the proposal was made
    pub proposed_at: Timestamp,
}

impl PendingOracle {
    /// Identity of the candidate
    pub fn candidate_id(&self) -> Address {
        self.candidate.oracle_id()
    }

    /// Last timestamp at which activation is allowed
    pub fn expires_at(&self, expiry: u64) -> Timestamp {
        self.eta.saturating_add(expiry)
    }

    /// Whether activation is allowed at `now`
    pub fn is_executable(&self, now: Timestamp, expiry: u64) -> bool {
        now >= self.eta && now <= self.expires_at(expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_flags_independent() {
        let mut pause = PauseState::default();
        assert!(pause.is_active());

        assert!(pause.set(PauseTarget::Mint, true));
        assert!(!pause.set(PauseTarget::Mint, true));
        assert!(pause.check_mint().is_err());
        assert!(pause.check_redeem().is_ok());

        pause.set(PauseTarget::Mint, false);
        pause.set(PauseTarget::Global, true);
        assert!(pause.check_mint().is_err());
        assert!(pause.check_redeem().is_err());
        assert!(pause.is_set(PauseTarget::Global));
    }

    #[test]
    fn test_price_history_only_records_changes() {
        let mut history = PriceHistory::default();
        assert_eq!(history.record(100, 1), Some(0));
        assert_eq!(history.record(100, 2), None);
        assert_eq!(history.update_count, 1);
        assert_eq!(history.last_update_time, 1);

        assert_eq!(history.reset_to(100, 3), 100);
        assert_eq!(history.update_count, 2);
    }

    #[test]
    fn test_rate_limiter_cooldown_boundary() {
        let mut limiter = RateLimiter::new();
        let alice = Address::from_label("alice");
        assert!(limiter.check(&alice, 0, 100).is_ok());

        limiter.record(&alice, 1_000);
        assert_eq!(
            limiter.check(&alice, 1_099, 100),
            Err(Error::CooldownActive { next_allowed: 1_100, now: 1_099 })
        );
        assert!(limiter.check(&alice, 1_100, 100).is_ok());
        assert_eq!(limiter.last_action_time(&alice), Some(1_000));
    }
}
