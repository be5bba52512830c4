//! Issuance controller.
//!
//! Mints the issued token against collateral and redeems it back at the
//! active oracle's price. Every mutating call runs its whole
//! check-then-act sequence under one lock, so a call either commits
//! completely or leaves no trace.
//!
//! Mint pulls the caller's collateral before any accounting; when the
//! registry or the ledger then rejects the mint, the collateral is handed
//! back and the registry accounting reverted.
//!
//! Lock order is controller, then registry, then ledger. The only step that
//! runs outside the lock is the collateral payout at the very end of
//! [`IssuanceController::redeem`], after all bookkeeping is final; a
//! per-caller reentrancy guard stays held across it.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::access::{AccessControl, Role};
use crate::core::config::ControllerConfig;
use crate::core::ledger::{CollateralTransfer, Ledger};
use crate::error::{Error, Result};
use crate::oracle::{Price, PriceOracle};
use crate::protocol::events::*;
use crate::protocol::state::{PauseState, PendingOracle, PriceHistory, RateLimiter};
use crate::registry::IssuerRegistry;
use crate::utils::crypto::Address;
use crate::utils::guard::ReentrancyGuard;
use crate::utils::math::{
    collateral_for_issued, issued_for_collateral, move_bps, safe_add, within_bps,
};
use crate::utils::time::{Clock, Timestamp};
use crate::utils::validation::{validate_address, validate_bps, validate_minimum, validate_non_zero};

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROLLER STATE
// ═══════════════════════════════════════════════════════════════════════════════

pub(super) struct ControllerState {
    pub(super) config: ControllerConfig,
    pub(super) oracle: Arc<dyn PriceOracle>,
    pub(super) pending: Option<PendingOracle>,
    pub(super) pause: PauseState,
    pub(super) history: PriceHistory,
    pub(super) rate_limiter: RateLimiter,
    pub(super) reserve: u128,
    pub(super) events: EventLog,
}

/// Registry wiring: which issuer this controller accounts against
struct RegistryLink {
    registry: Arc<IssuerRegistry>,
    issuer_id: Address,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ISSUANCE CONTROLLER
// ═══════════════════════════════════════════════════════════════════════════════

/// Oracle-priced mint/redeem engine
pub struct IssuanceController {
    pub(super) address: Address,
    pub(super) roles: Arc<dyn AccessControl>,
    pub(super) clock: Arc<dyn Clock>,
    ledger: Arc<dyn Ledger>,
    collateral: Arc<dyn CollateralTransfer>,
    registry: Option<RegistryLink>,
    guard: ReentrancyGuard<Address>,
    state: Mutex<ControllerState>,
}

impl IssuanceController {
    /// Create a controller.
    ///
    /// `address` is the controller's own identity: it must hold the
    /// Controller role on the ledger, and `collateral` must move collateral
    /// into and out of the account it holds.
    pub fn new(
        address: Address,
        config: ControllerConfig,
        oracle: Arc<dyn PriceOracle>,
        ledger: Arc<dyn Ledger>,
        collateral: Arc<dyn CollateralTransfer>,
        roles: Arc<dyn AccessControl>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        validate_address(&address, "address")?;
        config.validate()?;

        tracing::info!(
            controller = %address.short(),
            oracle = %oracle.description(),
            cooldown = config.cooldown_secs,
            max_price_move_bps = config.max_price_move_bps,
            "issuance controller created"
        );

        Ok(Self {
            address,
            roles,
            clock,
            ledger,
            collateral,
            registry: None,
            guard: ReentrancyGuard::new(),
            state: Mutex::new(ControllerState {
                config,
                oracle,
                pending: None,
                pause: PauseState::default(),
                history: PriceHistory::default(),
                rate_limiter: RateLimiter::new(),
                reserve: 0,
                events: EventLog::new(),
            }),
        })
    }

    /// Account every mint against `issuer_id` in `registry`. The controller's
    /// address must hold the Controller role on the registry.
    pub fn with_registry(mut self, registry: Arc<IssuerRegistry>, issuer_id: Address) -> Self {
        self.registry = Some(RegistryLink { registry, issuer_id });
        self
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Mint / Redeem
    // ───────────────────────────────────────────────────────────────────────────

    /// Mint issued tokens to `caller` for `collateral_in`, pulled from the
    /// caller's collateral balance. Returns the issued amount.
    pub fn mint(&self, caller: &Address, collateral_in: u128) -> Result<u128> {
        let _entry = self
            .guard
            .enter(*caller)
            .ok_or_else(|| Error::ReentrantCall(caller.to_string()))?;
        let mut state = self.lock_state();
        let now = self.clock.now();

        state.pause.check_mint()?;
        validate_minimum(collateral_in, state.config.min_collateral_amount, "collateral_in")?;
        state.rate_limiter.check(caller, now, state.config.cooldown_secs)?;

        let price = self.checked_price(&state)?;
        let issued = issued_for_collateral(collateral_in, price)?;
        validate_minimum(issued, state.config.min_mint_amount, "issued")?;
        let reserve_after = safe_add(state.reserve, collateral_in)?;

        self.collateral.receive(caller, collateral_in)?;
        if let Err(e) = self.issue(caller, issued) {
            self.return_collateral(caller, collateral_in);
            return Err(e);
        }

        // Commit
        state.rate_limiter.record(caller, now);
        state.reserve = reserve_after;
        Self::commit_price(&mut state, price, now);
        state.events.push(EngineEvent::Mint(MintEvent {
            caller: *caller,
            collateral_in,
            issued,
            price,
            reserve_after,
            timestamp: now,
        }));

        tracing::info!(
            caller = %caller.short(),
            collateral_in,
            issued,
            price,
            "mint committed"
        );
        Ok(issued)
    }

    /// Burn `issue_amount` from `caller` and pay the collateral out.
    /// Returns the collateral paid.
    pub fn redeem(&self, caller: &Address, issue_amount: u128) -> Result<u128> {
        let _entry = self
            .guard
            .enter(*caller)
            .ok_or_else(|| Error::ReentrantCall(caller.to_string()))?;

        let collateral_out = {
            let mut state = self.lock_state();
            let now = self.clock.now();

            state.pause.check_redeem()?;
            state.rate_limiter.check(caller, now, state.config.cooldown_secs)?;
            validate_minimum(issue_amount, state.config.min_redeem_amount, "issue_amount")?;

            let price = self.checked_price(&state)?;
            let collateral_out = collateral_for_issued(issue_amount, price)?;
            validate_minimum(collateral_out, 1, "collateral_out")?;
            if collateral_out > state.reserve {
                return Err(Error::InsufficientReserves {
                    required: collateral_out,
                    available: state.reserve,
                });
            }

            self.ledger.burn(&self.address, caller, issue_amount)?;

            // Commit
            state.rate_limiter.record(caller, now);
            state.reserve -= collateral_out;
            Self::commit_price(&mut state, price, now);
            let reserve_after = state.reserve;
            state.events.push(EngineEvent::Redeem(RedeemEvent {
                caller: *caller,
                burned: issue_amount,
                collateral_out,
                price,
                reserve_after,
                timestamp: now,
            }));

            tracing::info!(
                caller = %caller.short(),
                burned = issue_amount,
                collateral_out,
                price,
                "redeem committed"
            );
            collateral_out
        };

        // Reserve was checked and debited above; a failed payout means the
        // reserve no longer matches the collateral actually held.
        if let Err(e) = self.collateral.send(caller, collateral_out) {
            panic!(
                "collateral payout of {} to {} failed after reserve check: {}",
                collateral_out, caller, e
            );
        }
        Ok(collateral_out)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Admin
    // ───────────────────────────────────────────────────────────────────────────

    /// Set the per-caller cooldown in seconds
    pub fn set_cooldown(&self, caller: &Address, cooldown_secs: u64) -> Result<()> {
        self.roles.require_role(caller, Role::Admin)?;
        let mut state = self.lock_state();
        let old = std::mem::replace(&mut state.config.cooldown_secs, cooldown_secs);
        self.config_changed(&mut state, "cooldown_secs", old, cooldown_secs);
        Ok(())
    }

    /// Set the minimum mint, redeem and collateral amounts
    pub fn set_min_amounts(
        &self,
        caller: &Address,
        min_mint_amount: u128,
        min_redeem_amount: u128,
        min_collateral_amount: u128,
    ) -> Result<()> {
        self.roles.require_role(caller, Role::Admin)?;
        validate_non_zero(min_mint_amount, "min_mint_amount")?;
        validate_non_zero(min_redeem_amount, "min_redeem_amount")?;
        validate_non_zero(min_collateral_amount, "min_collateral_amount")?;

        let mut state = self.lock_state();
        let old = std::mem::replace(&mut state.config.min_mint_amount, min_mint_amount);
        self.config_changed(&mut state, "min_mint_amount", old, min_mint_amount);
        let old = std::mem::replace(&mut state.config.min_redeem_amount, min_redeem_amount);
        self.config_changed(&mut state, "min_redeem_amount", old, min_redeem_amount);
        let old = std::mem::replace(&mut state.config.min_collateral_amount, min_collateral_amount);
        self.config_changed(&mut state, "min_collateral_amount", old, min_collateral_amount);
        Ok(())
    }

    /// Set the circuit-breaker threshold in basis points
    pub fn set_max_price_move(&self, caller: &Address, max_price_move_bps: u64) -> Result<()> {
        self.roles.require_role(caller, Role::Admin)?;
        validate_bps(max_price_move_bps, "max_price_move_bps")?;
        let mut state = self.lock_state();
        let old = std::mem::replace(&mut state.config.max_price_move_bps, max_price_move_bps);
        self.config_changed(&mut state, "max_price_move_bps", old, max_price_move_bps);
        Ok(())
    }

    /// Raise a pause flag (Admin or Emergency)
    pub fn pause(&self, caller: &Address, target: PauseTarget) -> Result<()> {
        if !self.roles.has_role(caller, Role::Emergency) {
            self.roles.require_role(caller, Role::Admin)?;
        }
        let mut state = self.lock_state();
        if state.pause.set(target, true) {
            let timestamp = self.clock.now();
            state.events.push(EngineEvent::Paused(PauseEvent {
                target,
                by: *caller,
                timestamp,
            }));
            tracing::warn!(flag = %target, by = %caller.short(), "controller paused");
        }
        Ok(())
    }

    /// Clear a pause flag (Admin)
    pub fn resume(&self, caller: &Address, target: PauseTarget) -> Result<()> {
        self.roles.require_role(caller, Role::Admin)?;
        let mut state = self.lock_state();
        if state.pause.set(target, false) {
            let timestamp = self.clock.now();
            state.events.push(EngineEvent::Resumed(PauseEvent {
                target,
                by: *caller,
                timestamp,
            }));
            tracing::info!(flag = %target, by = %caller.short(), "controller resumed");
        }
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Emergency
    // ───────────────────────────────────────────────────────────────────────────

    /// Move collateral out of the reserve, bypassing redeem logic
    pub fn emergency_withdraw_collateral(&self, caller: &Address, to: &Address, amount: u128) -> Result<()> {
        self.roles.require_role(caller, Role::Emergency)?;
        validate_address(to, "to")?;
        validate_non_zero(amount, "amount")?;

        let mut state = self.lock_state();
        let balance_before = state.reserve;
        if amount > balance_before {
            return Err(Error::InsufficientReserves {
                required: amount,
                available: balance_before,
            });
        }
        self.collateral.send(to, amount)?;
        state.reserve -= amount;

        self.emergency_event(&mut state, EmergencyKind::WithdrawCollateral, caller, to, amount, balance_before);
        Ok(())
    }

    /// Move issued tokens held by the controller itself
    pub fn emergency_withdraw_token(&self, caller: &Address, to: &Address, amount: u128) -> Result<()> {
        self.roles.require_role(caller, Role::Emergency)?;
        validate_address(to, "to")?;
        validate_non_zero(amount, "amount")?;

        let mut state = self.lock_state();
        let balance_before = self.ledger.balance_of(&self.address);
        if amount > balance_before {
            return Err(Error::Ledger(format!(
                "controller holds {} tokens, {} requested",
                balance_before, amount
            )));
        }
        self.ledger.transfer(&self.address, to, amount)?;

        self.emergency_event(&mut state, EmergencyKind::WithdrawToken, caller, to, amount, balance_before);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Queries
    // ───────────────────────────────────────────────────────────────────────────

    /// Controller identity
    pub fn address(&self) -> Address {
        self.address
    }

    /// Current parameters
    pub fn config(&self) -> ControllerConfig {
        self.lock_state().config.clone()
    }

    /// Pause flags
    pub fn pause_state(&self) -> PauseState {
        self.lock_state().pause
    }

    /// Circuit-breaker reference price
    pub fn price_history(&self) -> PriceHistory {
        self.lock_state().history
    }

    /// Pending oracle proposal, if any
    pub fn pending_oracle(&self) -> Option<PendingOracle> {
        self.lock_state().pending.clone()
    }

    /// Collateral accounted as held by the controller
    pub fn reserve_balance(&self) -> u128 {
        self.lock_state().reserve
    }

    /// Last mint/redeem of `caller`
    pub fn last_action_time(&self, caller: &Address) -> Option<Timestamp> {
        self.lock_state().rate_limiter.last_action_time(caller)
    }

    /// Active oracle
    pub fn active_oracle(&self) -> Arc<dyn PriceOracle> {
        Arc::clone(&self.lock_state().oracle)
    }

    /// Identity of the active oracle
    pub fn active_oracle_id(&self) -> Address {
        self.lock_state().oracle.oracle_id()
    }

    /// Buffered events
    pub fn events(&self) -> Vec<EngineEvent> {
        self.lock_state().events.events()
    }

    /// Remove and return buffered events
    pub fn drain_events(&self) -> Vec<EngineEvent> {
        self.lock_state().events.drain()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Internals
    // ───────────────────────────────────────────────────────────────────────────

    pub(super) fn lock_state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registry accounting, then the ledger mint. A ledger rejection reverts
    /// the registry accounting.
    fn issue(&self, caller: &Address, issued: u128) -> Result<()> {
        if let Some(link) = &self.registry {
            link.registry.record_mint(&self.address, &link.issuer_id, issued)?;
        }
        if let Err(e) = self.ledger.mint(&self.address, caller, issued) {
            if let Some(link) = &self.registry {
                if let Err(revert) = link.registry.revert_mint(&self.address, &link.issuer_id, issued) {
                    tracing::error!(error = %revert, "failed to revert registry accounting");
                }
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Hand back collateral pulled by a mint that did not go through
    fn return_collateral(&self, caller: &Address, amount: u128) {
        if let Err(e) = self.collateral.send(caller, amount) {
            panic!(
                "returning {} collateral to {} failed right after receiving it: {}",
                amount, caller, e
            );
        }
        tracing::debug!(caller = %caller.short(), amount, "mint collateral returned");
    }

    /// Active oracle's quote, passed through the circuit breaker
    fn checked_price(&self, state: &ControllerState) -> Result<Price> {
        let price = state.oracle.price()?;
        let last_price = state.history.last_price;
        let max_bps = state.config.max_price_move_bps;
        if last_price > 0 && !within_bps(last_price, price, max_bps) {
            let moved = move_bps(last_price, price);
            tracing::warn!(last_price, price, move_bps = moved, max_bps, "circuit breaker tripped");
            return Err(Error::PriceMoveTooLarge {
                last_price,
                price,
                move_bps: moved,
                max_bps,
            });
        }
        Ok(price)
    }

    fn commit_price(state: &mut ControllerState, price: Price, now: Timestamp) {
        if let Some(previous_price) = state.history.record(price, now) {
            let update_count = state.history.update_count;
            state.events.push(EngineEvent::PriceUpdated(PriceUpdatedEvent {
                previous_price,
                price,
                update_count,
                timestamp: now,
            }));
        }
    }

    fn config_changed<T: std::fmt::Display + PartialEq>(
        &self,
        state: &mut ControllerState,
        parameter: &str,
        old: T,
        new: T,
    ) {
        if old == new {
            return;
        }
        tracing::info!(parameter, old = %old, new = %new, "controller parameter changed");
        state.events.push(EngineEvent::ConfigChanged(ConfigChangedEvent {
            parameter: parameter.to_string(),
            old_value: old.to_string(),
            new_value: new.to_string(),
            timestamp: self.clock.now(),
        }));
    }

    fn emergency_event(
        &self,
        state: &mut ControllerState,
        kind: EmergencyKind,
        by: &Address,
        to: &Address,
        amount: u128,
        balance_before: u128,
    ) {
        tracing::warn!(?kind, by = %by.short(), to = %to.short(), amount, "emergency withdrawal");
        state.events.push(EngineEvent::EmergencyAction(EmergencyActionEvent {
            kind,
            by: *by,
            to: *to,
            amount,
            balance_before,
            balance_after: balance_before - amount,
            timestamp: self.clock.now(),
        }));
    }
}

impl std::fmt::Debug for IssuanceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock_state();
        f.debug_struct("IssuanceController")
            .field("address", &self.address)
            .field("oracle", &state.oracle.oracle_id())
            .field("pause", &state.pause)
            .field("reserve", &state.reserve)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RoleRegistry;
    use crate::core::ledger::{CollateralBank, LedgerError, TokenLedger};
    use crate::oracle::ConfigurableOracle;
    use crate::utils::constants::COLLATERAL_SCALE;
    use crate::utils::time::ManualClock;
    use std::sync::{OnceLock, Weak};

    const PRICE: Price = 4_500_000_000;

    struct Fixture {
        controller: Arc<IssuanceController>,
        oracle: Arc<ConfigurableOracle>,
        ledger: Arc<TokenLedger>,
        bank: Arc<CollateralBank>,
        admin: Address,
    }

    fn setup_with_collateral(collateral: Option<Arc<dyn CollateralTransfer>>) -> Fixture {
        let admin = Address::from_label("admin");
        let address = Address::from_label("controller");
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let roles = Arc::new(RoleRegistry::with_admin(admin));
        roles.grant_role(&admin, Role::Controller, address).unwrap();

        let oracle = Arc::new(ConfigurableOracle::new(
            Address::from_label("oracle"),
            PRICE,
            roles.clone(),
            clock.clone(),
        ));
        let ledger = Arc::new(TokenLedger::new("USDX", roles.clone()));
        let bank = Arc::new(CollateralBank::new());
        let collateral = collateral.unwrap_or_else(|| Arc::new(bank.account(address)));

        let controller = IssuanceController::new(
            address,
            ControllerConfig::default(),
            oracle.clone(),
            ledger.clone(),
            collateral,
            roles,
            clock,
        )
        .unwrap();

        Fixture {
            controller: Arc::new(controller),
            oracle,
            ledger,
            bank,
            admin,
        }
    }

    fn setup() -> Fixture {
        setup_with_collateral(None)
    }

    #[test]
    fn test_mint_issues_at_price() {
        let f = setup();
        let alice = Address::from_label("alice");
        f.bank.credit(&alice, COLLATERAL_SCALE);

        let issued = f.controller.mint(&alice, COLLATERAL_SCALE).unwrap();
        assert_eq!(issued, 4_500_000_000);
        assert_eq!(f.ledger.balance_of(&alice), issued);
        assert_eq!(f.controller.reserve_balance(), COLLATERAL_SCALE);
        assert_eq!(f.controller.price_history().last_price, PRICE);

        assert_eq!(f.bank.balance_of(&alice), 0);
        assert_eq!(f.bank.balance_of(&f.controller.address()), COLLATERAL_SCALE);

        let types: Vec<_> = f.controller.events().iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["PriceUpdated", "Mint"]);
    }

    #[test]
    fn test_mint_without_deposit_rejected() {
        let f = setup();
        let alice = Address::from_label("alice");
        f.bank.credit(&alice, COLLATERAL_SCALE - 1);

        let result = f.controller.mint(&alice, COLLATERAL_SCALE);
        assert!(matches!(result, Err(Error::Ledger(_))));
        assert_eq!(f.ledger.total_supply(), 0);
        assert_eq!(f.controller.reserve_balance(), 0);
        assert_eq!(f.controller.last_action_time(&alice), None);
        assert!(f.controller.events().is_empty());
        assert_eq!(f.bank.balance_of(&alice), COLLATERAL_SCALE - 1);
        assert_eq!(f.bank.balance_of(&f.controller.address()), 0);
    }

    #[test]
    fn test_rejected_mint_leaves_no_trace() {
        let f = setup();
        let alice = Address::from_label("alice");

        let result = f.controller.mint(&alice, 1);
        assert!(matches!(result, Err(Error::AmountTooSmall { what: "collateral_in", .. })));
        assert_eq!(f.controller.last_action_time(&alice), None);
        assert_eq!(f.controller.reserve_balance(), 0);
        assert!(f.controller.events().is_empty());
    }

    #[test]
    fn test_mint_paused() {
        let f = setup();
        let alice = Address::from_label("alice");
        f.controller.pause(&f.admin, PauseTarget::Mint).unwrap();
        assert!(matches!(
            f.controller.mint(&alice, COLLATERAL_SCALE),
            Err(Error::Paused(_))
        ));
        assert!(matches!(
            f.controller.pause(&alice, PauseTarget::Global),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_unhealthy_oracle_maps_error() {
        let f = setup();
        f.oracle.set_health(&f.admin, false).unwrap();
        assert!(matches!(
            f.controller.mint(&Address::from_label("alice"), COLLATERAL_SCALE),
            Err(Error::OracleUnhealthy(_))
        ));
    }

    #[test]
    fn test_ledger_rejection_rolls_back() {
        let f = setup();
        let root = f.admin;
        // Controller loses its ledger capability
        let roles = RoleRegistry::with_admin(root);
        let ledger = Arc::new(TokenLedger::new("USDX", Arc::new(roles)));
        let controller = IssuanceController::new(
            Address::from_label("controller"),
            ControllerConfig::default(),
            f.oracle.clone(),
            ledger,
            Arc::new(f.bank.account(Address::from_label("controller"))),
            Arc::new(RoleRegistry::with_admin(root)),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();

        let alice = Address::from_label("alice");
        f.bank.credit(&alice, COLLATERAL_SCALE);
        assert!(matches!(controller.mint(&alice, COLLATERAL_SCALE), Err(Error::Ledger(_))));
        // Pulled collateral goes back to the caller
        assert_eq!(f.bank.balance_of(&alice), COLLATERAL_SCALE);
        assert_eq!(f.bank.balance_of(&Address::from_label("controller")), 0);
        assert_eq!(controller.reserve_balance(), 0);
        assert_eq!(controller.last_action_time(&alice), None);
        assert_eq!(controller.price_history().update_count, 0);
    }

    #[test]
    fn test_redeem_cooldown_checked_before_minimum() {
        let f = setup();
        let alice = Address::from_label("alice");
        f.bank.credit(&alice, COLLATERAL_SCALE);
        f.controller.mint(&alice, COLLATERAL_SCALE).unwrap();

        // Below the redeem minimum, but the cooldown is what rejects it
        assert!(matches!(
            f.controller.redeem(&alice, 1),
            Err(Error::CooldownActive { .. })
        ));
    }

    #[test]
    fn test_set_parameters_emit_config_changed() {
        let f = setup();
        f.controller.set_cooldown(&f.admin, 60).unwrap();
        f.controller.set_max_price_move(&f.admin, 1_000).unwrap();
        assert!(f.controller.set_max_price_move(&f.admin, 0).is_err());
        assert!(f.controller.set_min_amounts(&f.admin, 0, 1, 1).is_err());

        let config = f.controller.config();
        assert_eq!(config.cooldown_secs, 60);
        assert_eq!(config.max_price_move_bps, 1_000);
        assert_eq!(
            f.controller.events().iter().filter(|e| e.event_type() == "ConfigChanged").count(),
            2
        );
    }

    /// Payout that tries to re-enter the controller on behalf of the payee
    struct ReenteringPayout {
        controller: OnceLock<Weak<IssuanceController>>,
        bank: Arc<CollateralBank>,
        from: Address,
        observed: Mutex<Option<Error>>,
    }

    impl CollateralTransfer for ReenteringPayout {
        fn send(&self, to: &Address, amount: u128) -> std::result::Result<(), LedgerError> {
            if let Some(controller) = self.controller.get().and_then(Weak::upgrade) {
                if let Err(e) = controller.redeem(to, 1_000_000) {
                    *self.observed.lock().unwrap() = Some(e);
                }
            }
            self.bank.transfer(&self.from, to, amount)
        }

        fn receive(&self, from: &Address, amount: u128) -> std::result::Result<(), LedgerError> {
            self.bank.transfer(from, &self.from, amount)
        }
    }

    #[test]
    fn test_reentrant_redeem_rejected() {
        let bank = Arc::new(CollateralBank::new());
        let address = Address::from_label("controller");
        let payout = Arc::new(ReenteringPayout {
            controller: OnceLock::new(),
            bank: bank.clone(),
            from: address,
            observed: Mutex::new(None),
        });
        let transfer: Arc<dyn CollateralTransfer> = payout.clone();
        let mut f = setup_with_collateral(Some(transfer));
        f.bank = bank;
        f.controller.set_cooldown(&f.admin, 0).unwrap();
        payout.controller.set(Arc::downgrade(&f.controller)).unwrap();

        let alice = Address::from_label("alice");
        f.bank.credit(&alice, COLLATERAL_SCALE);
        f.controller.mint(&alice, COLLATERAL_SCALE).unwrap();
        f.controller.redeem(&alice, 2_250_000_000).unwrap();

        assert!(matches!(
            payout.observed.lock().unwrap().take(),
            Some(Error::ReentrantCall(_))
        ));
        assert_eq!(f.controller.reserve_balance(), COLLATERAL_SCALE / 2);
        assert_eq!(f.bank.balance_of(&alice), COLLATERAL_SCALE / 2);
    }
}
