//! Issuer registry.
//!
//! Tracks the issuers allowed to mint, each with a rolling 24h allowance,
//! plus a system-wide rolling 24h allowance. The controller calls
//! [`IssuerRegistry::record_mint`] on every mint before it touches the
//! ledger.
//!
//! Usage against the global allowance lives in its own rolling counter. Every
//! accounted mint lands in it and only a reverted mint or the window rolling
//! over takes it back out; removing an issuer never does. Lowering a limit below what was already minted in the current window is
//! not retroactive; the minted amount stands and further mints fail until the
//! window rolls over.

pub mod window;

pub use window::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::access::{AccessControl, Role};
use crate::core::config::RegistryConfig;
use crate::error::{Error, Result};
use crate::protocol::events::{
    EngineEvent, EventLog, IssuerEvent, LimitScope, LimitUpdatedEvent,
};
use crate::utils::crypto::Address;
use crate::utils::math::safe_add;
use crate::utils::time::{Clock, Timestamp};
use crate::utils::validation::{validate_address, validate_issuer_name, validate_non_zero};

// ═══════════════════════════════════════════════════════════════════════════════
// ISSUER RECORD
// ═══════════════════════════════════════════════════════════════════════════════

/// One registered issuer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerRecord {
    /// Issuer identity
    pub id: Address,
    /// Display name
    pub name: String,
    /// Whether the issuer may currently mint
    pub active: bool,
    /// Rolling 24h allowance (6 decimals)
    pub daily_limit: u128,
    /// Lifetime minted amount
    pub total_minted: u128,
    /// Registration time
    pub added_at: Timestamp,
    daily: RollingWindow,
}

impl IssuerRecord {
    fn new(id: Address, name: String, daily_limit: u128, now: Timestamp) -> Self {
        Self {
            id,
            name,
            active: true,
            daily_limit,
            total_minted: 0,
            added_at: now,
            daily: RollingWindow::new(now),
        }
    }

    /// Amount minted in the window in force at `now`
    pub fn daily_minted(&self, now: Timestamp) -> u128 {
        self.daily.effective_value(now)
    }

    /// Start of the stored window
    pub fn last_reset_time(&self) -> Timestamp {
        self.daily.window_start()
    }

    /// Allowance left at `now`; zero when inactive
    pub fn remaining(&self, now: Timestamp) -> u128 {
        if !self.active {
            return 0;
        }
        self.daily_limit.saturating_sub(self.daily_minted(now))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct RegistryState {
    issuers: HashMap<Address, IssuerRecord>,
    global_daily_limit: u128,
    global_daily: RollingWindow,
    global_total_minted: u128,
    events: EventLog,
}

impl RegistryState {
    fn global_daily_minted(&self, now: Timestamp) -> u128 {
        self.global_daily.effective_value(now)
    }

    fn global_remaining(&self, now: Timestamp) -> u128 {
        self.global_daily_limit
            .saturating_sub(self.global_daily_minted(now))
    }

    fn active_issuer_mut(&mut self, id: &Address) -> Result<&mut IssuerRecord> {
        match self.issuers.get_mut(id) {
            Some(record) if record.active => Ok(record),
            _ => Err(Error::IssuerNotFound(id.to_string())),
        }
    }
}

/// Multi-issuer daily-limit accounting
pub struct IssuerRegistry {
    roles: Arc<dyn AccessControl>,
    clock: Arc<dyn Clock>,
    state: RwLock<RegistryState>,
}

impl IssuerRegistry {
    /// Create an empty registry
    pub fn new(config: &RegistryConfig, roles: Arc<dyn AccessControl>, clock: Arc<dyn Clock>) -> Self {
        let opened = clock.now();
        Self {
            roles,
            clock,
            state: RwLock::new(RegistryState {
                issuers: HashMap::new(),
                global_daily_limit: config.global_daily_limit,
                global_daily: RollingWindow::new(opened),
                global_total_minted: 0,
                events: EventLog::new(),
            }),
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Issuer management
    // ───────────────────────────────────────────────────────────────────────────

    /// Register an issuer, or reactivate an inactive one keeping its history
    pub fn add_issuer(
        &self,
        caller: &Address,
        id: Address,
        name: &str,
        daily_limit: u128,
    ) -> Result<()> {
        self.roles.require_role(caller, Role::Admin)?;
        validate_address(&id, "id")?;
        validate_issuer_name(name)?;
        validate_non_zero(daily_limit, "daily_limit")?;

        let now = self.clock.now();
        let mut state = self.write_state();
        let record = match state.issuers.get_mut(&id) {
            Some(existing) if existing.active => {
                return Err(Error::IssuerAlreadyExists(id.to_string()));
            }
            Some(existing) => {
                existing.active = true;
                existing.name = name.to_string();
                existing.daily_limit = daily_limit;
                tracing::info!(issuer = %id.short(), name, daily_limit, "issuer reactivated");
                existing.clone()
            }
            None => {
                let record = IssuerRecord::new(id, name.to_string(), daily_limit, now);
                state.issuers.insert(id, record.clone());
                tracing::info!(issuer = %id.short(), name, daily_limit, "issuer added");
                record
            }
        };

        state.events.push(EngineEvent::IssuerAdded(IssuerEvent {
            issuer: id,
            name: record.name,
            daily_limit,
            timestamp: now,
        }));
        Ok(())
    }

    /// Deactivate an issuer; its history is kept
    pub fn remove_issuer(&self, caller: &Address, id: &Address) -> Result<()> {
        self.roles.require_role(caller, Role::Admin)?;

        let now = self.clock.now();
        let mut state = self.write_state();
        let record = state.active_issuer_mut(id)?;
        record.active = false;
        let event = IssuerEvent {
            issuer: *id,
            name: record.name.clone(),
            daily_limit: record.daily_limit,
            timestamp: now,
        };
        state.events.push(EngineEvent::IssuerRemoved(event));
        tracing::info!(issuer = %id.short(), "issuer removed");
        Ok(())
    }

    /// Change an issuer's daily limit
    pub fn set_daily_limit(&self, caller: &Address, id: &Address, daily_limit: u128) -> Result<()> {
        self.roles.require_role(caller, Role::Admin)?;
        validate_non_zero(daily_limit, "daily_limit")?;

        let now = self.clock.now();
        let mut state = self.write_state();
        let record = state.active_issuer_mut(id)?;
        let old_limit = std::mem::replace(&mut record.daily_limit, daily_limit);
        if daily_limit < record.daily_minted(now) {
            tracing::warn!(
                issuer = %id.short(),
                daily_limit,
                minted = record.daily_minted(now),
                "daily limit lowered below minted amount"
            );
        }

        state.events.push(EngineEvent::LimitUpdated(LimitUpdatedEvent {
            scope: LimitScope::Issuer(*id),
            old_limit,
            new_limit: daily_limit,
            timestamp: now,
        }));
        tracing::info!(issuer = %id.short(), old_limit, daily_limit, "issuer daily limit updated");
        Ok(())
    }

    /// Change the global daily limit
    pub fn set_global_daily_limit(&self, caller: &Address, limit: u128) -> Result<()> {
        self.roles.require_role(caller, Role::Admin)?;
        validate_non_zero(limit, "global_daily_limit")?;

        let now = self.clock.now();
        let mut state = self.write_state();
        let old_limit = std::mem::replace(&mut state.global_daily_limit, limit);
        state.events.push(EngineEvent::LimitUpdated(LimitUpdatedEvent {
            scope: LimitScope::Global,
            old_limit,
            new_limit: limit,
            timestamp: now,
        }));
        tracing::info!(old_limit, limit, "global daily limit updated");
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Accounting
    // ───────────────────────────────────────────────────────────────────────────

    /// Account `amount` against `id` and the global allowance.
    /// `caller` must hold the Controller role.
    pub fn record_mint(&self, caller: &Address, id: &Address, amount: u128) -> Result<()> {
        self.roles.require_role(caller, Role::Controller)?;
        validate_non_zero(amount, "amount")?;

        let now = self.clock.now();
        let mut state = self.write_state();
        if state.global_daily.roll(now) {
            tracing::debug!(now, "global daily window reset");
        }
        let global_remaining = state.global_remaining(now);

        let record = state.active_issuer_mut(id)?;
        if record.daily.roll(now) {
            tracing::debug!(issuer = %id.short(), now, "issuer daily window reset");
        }

        let remaining = record.remaining(now);
        if amount > remaining {
            return Err(Error::IssuerDailyLimitExceeded {
                issuer: id.to_string(),
                requested: amount,
                remaining,
            });
        }
        if amount > global_remaining {
            return Err(Error::GlobalDailyLimitExceeded {
                requested: amount,
                remaining: global_remaining,
            });
        }

        let total_minted = safe_add(record.total_minted, amount)?;
        record.daily.add(now, amount).ok_or_else(|| Error::Overflow {
            operation: "issuer daily minted".into(),
        })?;
        record.total_minted = total_minted;
        // Bounded by the global limit checked above
        state.global_daily.add(now, amount).ok_or_else(|| Error::Overflow {
            operation: "global daily minted".into(),
        })?;
        state.global_total_minted = state.global_total_minted.saturating_add(amount);
        Ok(())
    }

    /// Undo a [`record_mint`](Self::record_mint) whose mint did not go through.
    /// `caller` must hold the Controller role.
    pub fn revert_mint(&self, caller: &Address, id: &Address, amount: u128) -> Result<()> {
        self.roles.require_role(caller, Role::Controller)?;

        let now = self.clock.now();
        let mut state = self.write_state();
        let record = state
            .issuers
            .get_mut(id)
            .ok_or_else(|| Error::IssuerNotFound(id.to_string()))?;
        record.daily.sub(now, amount);
        record.total_minted = record.total_minted.saturating_sub(amount);
        state.global_daily.sub(now, amount);
        state.global_total_minted = state.global_total_minted.saturating_sub(amount);
        tracing::warn!(issuer = %id.short(), amount, "mint accounting reverted");
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Queries
    // ───────────────────────────────────────────────────────────────────────────

    /// Allowance left for `id` in the current window
    pub fn get_remaining_daily_limit(&self, id: &Address) -> Result<u128> {
        let now = self.clock.now();
        self.read_state()
            .issuers
            .get(id)
            .map(|r| r.remaining(now))
            .ok_or_else(|| Error::IssuerNotFound(id.to_string()))
    }

    /// Global allowance left in the current window
    pub fn get_remaining_global_limit(&self) -> u128 {
        self.read_state().global_remaining(self.clock.now())
    }

    /// Amount minted across all issuers in the current global window,
    /// including issuers removed since
    pub fn global_daily_minted(&self) -> u128 {
        self.read_state().global_daily_minted(self.clock.now())
    }

    /// Lifetime amount accounted across all issuers
    pub fn global_total_minted(&self) -> u128 {
        self.read_state().global_total_minted
    }

    /// Current global daily limit
    pub fn global_daily_limit(&self) -> u128 {
        self.read_state().global_daily_limit
    }

    /// Snapshot of an issuer record, active or not
    pub fn issuer(&self, id: &Address) -> Option<IssuerRecord> {
        self.read_state().issuers.get(id).cloned()
    }

    /// Active issuers ordered by id
    pub fn active_issuers(&self) -> Vec<IssuerRecord> {
        let state = self.read_state();
        let mut list: Vec<_> = state.issuers.values().filter(|r| r.active).cloned().collect();
        list.sort_by_key(|r| r.id);
        list
    }

    /// Buffered registry events
    pub fn events(&self) -> Vec<EngineEvent> {
        self.read_state().events.events()
    }

    /// Remove and return buffered registry events
    pub fn drain_events(&self) -> Vec<EngineEvent> {
        self.write_state().events.drain()
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for IssuerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("IssuerRegistry")
            .field("issuers", &state.issuers.len())
            .field("global_daily_limit", &state.global_daily_limit)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
