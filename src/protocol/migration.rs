//! Timelocked oracle migration.
//!
//! Replacing the active oracle is a three-step workflow:
//! 1. `propose_oracle`: validate the candidate and start the timelock
//! 2. `execute_oracle`: after the delay and before the expiry window closes,
//!    re-validate and swap
//! 3. `cancel_oracle`: drop the proposal without activating it
//!
//! At most one proposal is pending; proposing again overwrites it and
//! restarts the timer. An expired proposal stays pending until it is
//! re-proposed or cancelled.

use std::sync::Arc;

use crate::access::Role;
use crate::error::{Error, Result};
use crate::oracle::{Price, PriceOracle};
use crate::protocol::controller::{ControllerState, IssuanceController};
use crate::protocol::events::{
    EngineEvent, OracleActivatedEvent, OracleCancelledEvent, OracleProposedEvent,
    PriceUpdatedEvent,
};
use crate::protocol::state::PendingOracle;
use crate::utils::constants::PRICE_DECIMALS;
use crate::utils::crypto::Address;
use crate::utils::time::Timestamp;

impl IssuanceController {
    /// Propose `candidate` as the next oracle. Returns the activation eta.
    pub fn propose_oracle(
        &self,
        caller: &Address,
        candidate: Arc<dyn PriceOracle>,
    ) -> Result<Timestamp> {
        self.roles.require_role(caller, Role::Admin)?;

        let mut state = self.lock_state();
        self.validate_candidate(&state, candidate.as_ref())?;

        let now = self.clock.now();
        let eta = now.saturating_add(state.config.oracle_timelock_delay);
        let candidate_id = candidate.oracle_id();
        let replaced = state
            .pending
            .replace(PendingOracle {
                candidate,
                eta,
                proposed_at: now,
            })
            .map(|p| p.candidate_id());

        let current = state.oracle.oracle_id();
        state.events.push(EngineEvent::OracleProposed(OracleProposedEvent {
            current,
            candidate: candidate_id,
            replaced,
            eta,
            timestamp: now,
        }));
        tracing::info!(
            candidate = %candidate_id.short(),
            eta,
            replaced = replaced.is_some(),
            "oracle proposed"
        );
        Ok(eta)
    }

    /// Activate the pending oracle. Returns its first price.
    pub fn execute_oracle(&self, caller: &Address) -> Result<Price> {
        self.roles.require_role(caller, Role::Admin)?;

        let mut state = self.lock_state();
        let now = self.clock.now();
        let expiry = state.config.oracle_timelock_expiry;
        let pending = state.pending.clone().ok_or(Error::NoPendingOracle)?;

        if now < pending.eta {
            return Err(Error::TimelockNotExpired { eta: pending.eta, now });
        }
        let expires_at = pending.expires_at(expiry);
        if now > expires_at {
            return Err(Error::TimelockExpired { expired_at: expires_at, now });
        }

        // Health can change during the delay
        let price = self.validate_candidate(&state, pending.candidate.as_ref())?;

        let previous = std::mem::replace(&mut state.oracle, Arc::clone(&pending.candidate));
        state.pending = None;
        let previous_price = state.history.reset_to(price, now);
        let update_count = state.history.update_count;
        let current = pending.candidate_id();

        state.events.push(EngineEvent::OracleActivated(OracleActivatedEvent {
            previous: previous.oracle_id(),
            current,
            price,
            timestamp: now,
        }));
        state.events.push(EngineEvent::PriceUpdated(PriceUpdatedEvent {
            previous_price,
            price,
            update_count,
            timestamp: now,
        }));
        tracing::info!(
            previous = %previous.oracle_id().short(),
            current = %current.short(),
            description = %pending.candidate.description(),
            price,
            "oracle activated"
        );
        Ok(price)
    }

    /// Drop the pending proposal
    pub fn cancel_oracle(&self, caller: &Address) -> Result<()> {
        self.roles.require_role(caller, Role::Admin)?;

        let mut state = self.lock_state();
        let pending = state.pending.take().ok_or(Error::NoPendingOracle)?;
        let timestamp = self.clock.now();
        state.events.push(EngineEvent::OracleCancelled(OracleCancelledEvent {
            candidate: pending.candidate_id(),
            eta: pending.eta,
            timestamp,
        }));
        tracing::info!(candidate = %pending.candidate_id().short(), "oracle proposal cancelled");
        Ok(())
    }

    /// Candidate must be non-zero, distinct from the active oracle and from
    /// the controller, healthy, quote in 6 decimals and return a price.
    fn validate_candidate(&self, state: &ControllerState, candidate: &dyn PriceOracle) -> Result<Price> {
        let id = candidate.oracle_id();
        let reject = |reason: String| {
            tracing::warn!(candidate = %id.short(), %reason, "oracle candidate rejected");
            Err(Error::InvalidOracleCandidate(reason))
        };

        if id.is_zero() {
            return reject("zero oracle id".into());
        }
        if id == state.oracle.oracle_id() {
            return reject("candidate is the active oracle".into());
        }
        if id == self.address {
            return reject("candidate is the controller itself".into());
        }
        if !candidate.is_healthy() {
            return reject(format!("{} is unhealthy", candidate.description()));
        }
        if candidate.decimals() != PRICE_DECIMALS {
            return reject(format!(
                "{} quotes {} decimals, expected {}",
                candidate.description(),
                candidate.decimals(),
                PRICE_DECIMALS
            ));
        }
        match candidate.price() {
            Ok(price) => Ok(price),
            Err(e) => reject(format!("{} price read failed: {}", candidate.description(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RoleRegistry;
    use crate::core::config::ControllerConfig;
    use crate::core::ledger::{CollateralBank, TokenLedger};
    use crate::oracle::ConfigurableOracle;
    use crate::utils::constants::DAY_SECS;
    use crate::utils::time::{Clock, ManualClock};

    struct Fixture {
        controller: IssuanceController,
        roles: Arc<RoleRegistry>,
        clock: ManualClock,
        admin: Address,
    }

    fn setup() -> Fixture {
        let admin = Address::from_label("admin");
        let address = Address::from_label("controller");
        let clock = ManualClock::new(1_700_000_000);
        let roles = Arc::new(RoleRegistry::with_admin(admin));
        let oracle = Arc::new(ConfigurableOracle::new(
            Address::from_label("oracle-a"),
            4_500_000_000,
            roles.clone(),
            Arc::new(clock.clone()),
        ));
        let bank = Arc::new(CollateralBank::new());
        let controller = IssuanceController::new(
            address,
            ControllerConfig::default(),
            oracle,
            Arc::new(TokenLedger::new("USDX", roles.clone())),
            Arc::new(bank.account(address)),
            roles.clone(),
            Arc::new(clock.clone()),
        )
        .unwrap();
        Fixture { controller, roles, clock, admin }
    }

    fn candidate(f: &Fixture, label: &str, price: Price) -> Arc<ConfigurableOracle> {
        Arc::new(ConfigurableOracle::new(
            Address::from_label(label),
            price,
            f.roles.clone(),
            Arc::new(f.clock.clone()),
        ))
    }

    #[test]
    fn test_propose_rejects_invalid_candidates() {
        let f = setup();
        let zero: Arc<dyn PriceOracle> = Arc::new(ConfigurableOracle::new(
            Address::ZERO,
            1_000_000,
            f.roles.clone(),
            Arc::new(f.clock.clone()),
        ));
        assert!(matches!(
            f.controller.propose_oracle(&f.admin, zero),
            Err(Error::InvalidOracleCandidate(_))
        ));

        let same = candidate(&f, "oracle-a", 1_000_000);
        assert!(f.controller.propose_oracle(&f.admin, same).is_err());

        let itself = candidate(&f, "controller", 1_000_000);
        assert!(f.controller.propose_oracle(&f.admin, itself).is_err());

        let sick = candidate(&f, "oracle-b", 1_000_000);
        sick.set_health(&f.admin, false).unwrap();
        assert!(f.controller.propose_oracle(&f.admin, sick).is_err());

        let stranger = Address::from_label("stranger");
        let good = candidate(&f, "oracle-b", 1_000_000);
        assert!(matches!(
            f.controller.propose_oracle(&stranger, good),
            Err(Error::Unauthorized(_))
        ));
        assert!(f.controller.pending_oracle().is_none());
    }

    #[test]
    fn test_timelock_window() {
        let f = setup();
        let t0 = f.clock.now();
        let eta = f
            .controller
            .propose_oracle(&f.admin, candidate(&f, "oracle-b", 4_550_000_000))
            .unwrap();
        assert_eq!(eta, t0 + 2 * DAY_SECS);

        f.clock.set(eta - 1);
        assert_eq!(
            f.controller.execute_oracle(&f.admin),
            Err(Error::TimelockNotExpired { eta, now: eta - 1 })
        );

        f.clock.set(eta);
        assert_eq!(f.controller.execute_oracle(&f.admin).unwrap(), 4_550_000_000);
        assert_eq!(f.controller.active_oracle_id(), Address::from_label("oracle-b"));
        assert_eq!(f.controller.price_history().last_price, 4_550_000_000);
        assert_eq!(f.controller.execute_oracle(&f.admin), Err(Error::NoPendingOracle));
    }

    #[test]
    fn test_expired_proposal_stays_pending() {
        let f = setup();
        let eta = f
            .controller
            .propose_oracle(&f.admin, candidate(&f, "oracle-b", 1_000_000))
            .unwrap();
        f.clock.set(eta + DAY_SECS + 1);
        assert_eq!(
            f.controller.execute_oracle(&f.admin),
            Err(Error::TimelockExpired { expired_at: eta + DAY_SECS, now: eta + DAY_SECS + 1 })
        );
        assert!(f.controller.pending_oracle().is_some());

        f.controller.cancel_oracle(&f.admin).unwrap();
        assert!(f.controller.pending_oracle().is_none());
        assert_eq!(f.controller.cancel_oracle(&f.admin), Err(Error::NoPendingOracle));
    }

    #[test]
    fn test_reproposal_resets_timer() {
        let f = setup();
        let first = f
            .controller
            .propose_oracle(&f.admin, candidate(&f, "oracle-b", 1_000_000))
            .unwrap();
        f.clock.advance(DAY_SECS);
        let second = f
            .controller
            .propose_oracle(&f.admin, candidate(&f, "oracle-c", 1_000_000))
            .unwrap();
        assert_eq!(second, first + DAY_SECS);

        let pending = f.controller.pending_oracle().unwrap();
        assert_eq!(pending.candidate_id(), Address::from_label("oracle-c"));
        assert_eq!(pending.eta, second);
    }

    #[test]
    fn test_execute_revalidates_health() {
        let f = setup();
        let b = candidate(&f, "oracle-b", 1_000_000);
        let eta = f.controller.propose_oracle(&f.admin, b.clone()).unwrap();
        b.set_health(&f.admin, false).unwrap();

        f.clock.set(eta);
        assert!(matches!(
            f.controller.execute_oracle(&f.admin),
            Err(Error::InvalidOracleCandidate(_))
        ));
        assert_eq!(f.controller.active_oracle_id(), Address::from_label("oracle-a"));
        assert!(f.controller.pending_oracle().is_some());
    }
}
