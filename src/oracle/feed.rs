//! Oracle backed by an external pull-based price service.
//!
//! The service publishes quotes as a signed mantissa with a decimal exponent,
//! a confidence interval and a publish time. Callers push signed update
//! payloads and the oracle reads the latest quote, applying staleness and
//! confidence checks before converting it to the engine's 6-decimal format.
//!
//! An update payment is pulled from the caller into the oracle's funds
//! account. Once the service accepts the update the fee goes to the
//! service's recipient and the excess back to the caller; a rejected update
//! returns the whole payment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

use crate::access::{AccessControl, Role};
use crate::core::config::OracleConfig;
use crate::core::ledger::CollateralTransfer;
use crate::oracle::{OracleError, Price, PriceOracle};
use crate::utils::constants::{BPS_DIVISOR, PRICE_DECIMALS};
use crate::utils::crypto::{Address, Hash};
use crate::utils::guard::ReentrancyGuard;
use crate::utils::math::ratio_bps;
use crate::utils::time::{Clock, Timestamp};

// ═══════════════════════════════════════════════════════════════════════════════
// FEED DATA
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw quote as published by the price service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPrice {
    /// Signed mantissa
    pub mantissa: i64,
    /// Decimal exponent (`value = mantissa * 10^exponent`)
    pub exponent: i32,
    /// Confidence interval, same exponent as the mantissa
    pub confidence: u64,
    /// Unix time the quote was published
    pub publish_time: Timestamp,
}

impl FeedPrice {
    /// Create a quote
    pub fn new(mantissa: i64, exponent: i32, confidence: u64, publish_time: Timestamp) -> Self {
        Self {
            mantissa,
            exponent,
            confidence,
            publish_time,
        }
    }

    /// Age of the quote at `now`; quotes from the future have age zero
    pub fn age(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.publish_time)
    }

    /// Confidence interval relative to the price, in basis points
    pub fn confidence_bps(&self) -> u64 {
        ratio_bps(self.confidence as u128, self.mantissa.unsigned_abs() as u128)
    }

    /// Whether `confidence / |mantissa| <= max_bps / 10000`, compared exactly
    pub fn confidence_within(&self, max_bps: u64) -> bool {
        (self.confidence as u128) * (BPS_DIVISOR as u128)
            <= (self.mantissa.unsigned_abs() as u128) * (max_bps as u128)
    }

    /// Convert to an unsigned 6-decimal price, truncating extra precision
    pub fn to_price(&self) -> Result<Price, OracleError> {
        if self.mantissa <= 0 {
            return Err(OracleError::InvalidPrice(format!(
                "non-positive mantissa {}",
                self.mantissa
            )));
        }
        let mantissa = self.mantissa as u128;
        let shift = self.exponent as i64 + PRICE_DECIMALS as i64;

        let scaled = if shift >= 0 {
            10u128
                .checked_pow(shift as u32)
                .and_then(|factor| mantissa.checked_mul(factor))
        } else {
            Some(
                10u128
                    .checked_pow((-shift) as u32)
                    .map(|divisor| mantissa / divisor)
                    .unwrap_or(0),
            )
        };

        match scaled {
            Some(0) => Err(OracleError::InvalidPrice(format!(
                "price {}e{} rounds to zero",
                self.mantissa, self.exponent
            ))),
            Some(value) if value <= Price::MAX as u128 => Ok(value as Price),
            _ => Err(OracleError::InvalidPrice(format!(
                "price {}e{} out of range",
                self.mantissa, self.exponent
            ))),
        }
    }
}

/// Signed update payload delivered by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdateData {
    /// Feed the update applies to
    pub feed_id: Hash,
    /// New quote
    pub price: FeedPrice,
}

/// Failures of the external price service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// Service unreachable or returned garbage
    #[error("price service unavailable: {0}")]
    Unavailable(String),

    /// Feed id unknown to the service
    #[error("unknown feed {0}")]
    UnknownFeed(String),

    /// Update payload rejected
    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    /// Fee paid below the service's fee
    #[error("insufficient fee: required {required}, paid {paid}")]
    InsufficientFee {
        /// Fee required
        required: u128,
        /// Fee paid
        paid: u128,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// PRICE FEED SOURCE
// ═══════════════════════════════════════════════════════════════════════════════

/// External price service
pub trait PriceFeedSource: Send + Sync {
    /// Latest stored quote for a feed, without freshness checks
    fn latest_price(&self, feed_id: &Hash) -> Result<FeedPrice, FeedError>;

    /// Fee required to apply `updates`
    fn update_fee(&self, updates: &[PriceUpdateData]) -> Result<u128, FeedError>;

    /// Apply `updates`, paying `fee`
    fn update_price_feeds(&self, updates: &[PriceUpdateData], fee: u128) -> Result<(), FeedError>;

    /// Account update fees are paid to
    fn fee_recipient(&self) -> Address;
}

/// In-memory price service with a flat per-update fee
#[derive(Debug)]
pub struct InMemoryFeedSource {
    prices: RwLock<HashMap<Hash, FeedPrice>>,
    fee_per_update: u128,
    recipient: Address,
    collected: Mutex<u128>,
}

impl InMemoryFeedSource {
    /// Create a service charging `fee_per_update` per payload
    pub fn new(fee_per_update: u128) -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            fee_per_update,
            recipient: Address::from_label("price-service"),
            collected: Mutex::new(0),
        }
    }

    /// Collect fees into `recipient`
    pub fn with_recipient(mut self, recipient: Address) -> Self {
        self.recipient = recipient;
        self
    }

    /// Publish a quote directly (no fee)
    pub fn publish(&self, feed_id: Hash, price: FeedPrice) {
        self.prices
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(feed_id, price);
    }

    /// Fees collected so far
    pub fn collected_fees(&self) -> u128 {
        *self.collected.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PriceFeedSource for InMemoryFeedSource {
    fn latest_price(&self, feed_id: &Hash) -> Result<FeedPrice, FeedError> {
        self.prices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(feed_id)
            .copied()
            .ok_or_else(|| FeedError::UnknownFeed(feed_id.to_hex()))
    }

    fn update_fee(&self, updates: &[PriceUpdateData]) -> Result<u128, FeedError> {
        Ok(self.fee_per_update * updates.len() as u128)
    }

    fn update_price_feeds(&self, updates: &[PriceUpdateData], fee: u128) -> Result<(), FeedError> {
        let required = self.update_fee(updates)?;
        if fee < required {
            return Err(FeedError::InsufficientFee { required, paid: fee });
        }
        let mut prices = self.prices.write().unwrap_or_else(|e| e.into_inner());
        for update in updates {
            if let Some(current) = prices.get(&update.feed_id) {
                // Older payloads are ignored rather than rejected
                if current.publish_time >= update.price.publish_time {
                    continue;
                }
            }
            prices.insert(update.feed_id, update.price);
        }
        *self.collected.lock().unwrap_or_else(|e| e.into_inner()) += fee;
        Ok(())
    }

    fn fee_recipient(&self) -> Address {
        self.recipient
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FEED-BACKED ORACLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Parameters adjustable by the oracle's Admin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedParams {
    /// Maximum quote age in seconds
    pub max_price_age: u64,
    /// Maximum confidence / price ratio in basis points
    pub max_confidence_bps: u64,
    /// Explicit pause flag
    pub paused: bool,
}

/// Outcome of a paid update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReceipt {
    /// Fee forwarded to the price service
    pub fee: u128,
    /// Excess payment returned to the caller
    pub refund: u128,
}

/// Oracle reading a single feed from an external price service
pub struct FeedBackedOracle {
    id: Address,
    feed_id: RwLock<Hash>,
    source: Arc<dyn PriceFeedSource>,
    funds: Arc<dyn CollateralTransfer>,
    roles: Arc<dyn AccessControl>,
    clock: Arc<dyn Clock>,
    params: RwLock<FeedParams>,
    update_guard: ReentrancyGuard<Address>,
    fees_paid: Mutex<u128>,
}

impl FeedBackedOracle {
    /// Create an oracle for `feed_id`. Update payments move through `funds`,
    /// which must hold the oracle's own account.
    pub fn new(
        id: Address,
        feed_id: Hash,
        source: Arc<dyn PriceFeedSource>,
        funds: Arc<dyn CollateralTransfer>,
        roles: Arc<dyn AccessControl>,
        clock: Arc<dyn Clock>,
        config: &OracleConfig,
    ) -> Self {
        Self {
            id,
            feed_id: RwLock::new(feed_id),
            source,
            funds,
            roles,
            clock,
            params: RwLock::new(FeedParams {
                max_price_age: config.max_price_age,
                max_confidence_bps: config.max_confidence_bps,
                paused: false,
            }),
            update_guard: ReentrancyGuard::new(),
            fees_paid: Mutex::new(0),
        }
    }

    /// Current parameters
    pub fn params(&self) -> FeedParams {
        *self.params.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Feed currently read
    pub fn feed_id(&self) -> Hash {
        *self.feed_id.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Cumulative fees forwarded to the price service
    pub fn total_fees_paid(&self) -> u128 {
        *self.fees_paid.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fee the service charges for `updates`
    pub fn update_fee(&self, updates: &[PriceUpdateData]) -> Result<u128, OracleError> {
        self.source
            .update_fee(updates)
            .map_err(|e| OracleError::Unhealthy(e.to_string()))
    }

    /// Push update payloads to the price service.
    ///
    /// `payment` is pulled from `caller` and must cover the fee. The excess
    /// is refunded only after the service accepted the update. One update per
    /// caller may be in flight at a time.
    pub fn update_price_feeds(
        &self,
        caller: &Address,
        updates: &[PriceUpdateData],
        payment: u128,
    ) -> Result<UpdateReceipt, OracleError> {
        let _token = self
            .update_guard
            .enter(*caller)
            .ok_or(OracleError::ReentrantUpdate)?;

        if updates.is_empty() {
            return Err(OracleError::InvalidParameter {
                name: "updates".into(),
                reason: "no update payloads".into(),
            });
        }

        let fee = self.update_fee(updates)?;
        if payment < fee {
            return Err(OracleError::InsufficientFee {
                required: fee,
                provided: payment,
            });
        }

        if payment > 0 {
            self.funds
                .receive(caller, payment)
                .map_err(|e| OracleError::PaymentFailed(e.to_string()))?;
        }

        if let Err(e) = self.source.update_price_feeds(updates, fee) {
            self.pay_out(caller, payment);
            return Err(match e {
                FeedError::InsufficientFee { required, paid } => OracleError::InsufficientFee {
                    required,
                    provided: paid,
                },
                FeedError::InvalidUpdate(reason) => OracleError::InvalidParameter {
                    name: "updates".into(),
                    reason,
                },
                other => OracleError::Unhealthy(other.to_string()),
            });
        }

        self.pay_out(&self.source.fee_recipient(), fee);
        *self.fees_paid.lock().unwrap_or_else(|e| e.into_inner()) += fee;

        let refund = payment - fee;
        self.pay_out(caller, refund);

        tracing::debug!(
            oracle = %self.id.short(),
            updates = updates.len(),
            fee,
            refund,
            "price feeds updated"
        );
        Ok(UpdateReceipt { fee, refund })
    }

    /// Change the maximum quote age
    pub fn set_max_price_age(&self, caller: &Address, max_age: u64) -> Result<(), OracleError> {
        self.roles.require_role(caller, Role::Admin)?;
        if max_age == 0 {
            return Err(OracleError::InvalidParameter {
                name: "max_price_age".into(),
                reason: "must be greater than zero".into(),
            });
        }
        self.write_params().max_price_age = max_age;
        Ok(())
    }

    /// Change the maximum confidence ratio
    pub fn set_max_confidence_ratio(&self, caller: &Address, bps: u64) -> Result<(), OracleError> {
        self.roles.require_role(caller, Role::Admin)?;
        if bps == 0 || bps > BPS_DIVISOR {
            return Err(OracleError::InvalidParameter {
                name: "max_confidence_bps".into(),
                reason: format!("{} outside (0, {}]", bps, BPS_DIVISOR),
            });
        }
        self.write_params().max_confidence_bps = bps;
        Ok(())
    }

    /// Point the oracle at another feed
    pub fn set_feed_id(&self, caller: &Address, feed_id: Hash) -> Result<(), OracleError> {
        self.roles.require_role(caller, Role::Admin)?;
        if feed_id.is_zero() {
            return Err(OracleError::InvalidParameter {
                name: "feed_id".into(),
                reason: "zero feed id".into(),
            });
        }
        *self.feed_id.write().unwrap_or_else(|e| e.into_inner()) = feed_id;
        tracing::info!(oracle = %self.id.short(), feed = %feed_id, "feed id changed");
        Ok(())
    }

    /// Mark the oracle unhealthy (Admin or Emergency)
    pub fn pause(&self, caller: &Address) -> Result<(), OracleError> {
        if !self.roles.has_role(caller, Role::Emergency) {
            self.roles.require_role(caller, Role::Admin)?;
        }
        self.write_params().paused = true;
        tracing::warn!(oracle = %self.id.short(), "feed oracle paused");
        Ok(())
    }

    /// Clear the pause flag (Admin)
    pub fn unpause(&self, caller: &Address) -> Result<(), OracleError> {
        self.roles.require_role(caller, Role::Admin)?;
        self.write_params().paused = false;
        tracing::info!(oracle = %self.id.short(), "feed oracle unpaused");
        Ok(())
    }

    /// Spend part of a payment this call already received
    fn pay_out(&self, to: &Address, amount: u128) {
        if amount == 0 {
            return;
        }
        if let Err(e) = self.funds.send(to, amount) {
            panic!(
                "paying {} from received update funds to {} failed: {}",
                amount, to, e
            );
        }
    }

    fn write_params(&self) -> std::sync::RwLockWriteGuard<'_, FeedParams> {
        self.params.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Read and validate the current quote
    fn read_quote(&self) -> Result<Price, OracleError> {
        let params = self.params();
        if params.paused {
            return Err(OracleError::Unhealthy("oracle paused".into()));
        }

        let quote = self
            .source
            .latest_price(&self.feed_id())
            .map_err(|e| OracleError::Unhealthy(e.to_string()))?;

        if quote.mantissa <= 0 {
            return Err(OracleError::InvalidPrice(format!(
                "non-positive mantissa {}",
                quote.mantissa
            )));
        }

        let age = quote.age(self.clock.now());
        if age > params.max_price_age {
            return Err(OracleError::Stale {
                age,
                max_age: params.max_price_age,
            });
        }

        if !quote.confidence_within(params.max_confidence_bps) {
            return Err(OracleError::Unhealthy(format!(
                "confidence {} bps exceeds {} bps",
                quote.confidence_bps(),
                params.max_confidence_bps
            )));
        }

        quote.to_price()
    }
}

impl PriceOracle for FeedBackedOracle {
    fn oracle_id(&self) -> Address {
        self.id
    }

    fn description(&self) -> String {
        format!("feed:{}", &self.feed_id().to_hex()[..16])
    }

    fn price(&self) -> Result<Price, OracleError> {
        self.read_quote()
    }

    fn is_healthy(&self) -> bool {
        match self.read_quote() {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(oracle = %self.id.short(), error = %e, "feed oracle unhealthy");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::RoleRegistry;
    use crate::core::ledger::{BankAccount, CollateralBank, LedgerError};
    use crate::utils::time::ManualClock;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{OnceLock, Weak};

    const NOW: u64 = 1_700_000_000;

    struct Fixture {
        oracle: Arc<FeedBackedOracle>,
        source: Arc<InMemoryFeedSource>,
        bank: Arc<CollateralBank>,
        clock: ManualClock,
        admin: Address,
        feed: Hash,
    }

    fn setup_with_funds(
        bank: Arc<CollateralBank>,
        funds: Option<Arc<dyn CollateralTransfer>>,
    ) -> Fixture {
        let admin = Address::from_label("admin");
        let id = Address::from_label("feed-oracle");
        let clock = ManualClock::new(NOW);
        let source = Arc::new(InMemoryFeedSource::new(10));
        let feed = Hash::sha256(b"ETH/USD");
        // $4500.12345678 with 8 decimals, +-$4.5 confidence
        source.publish(feed, FeedPrice::new(450_012_345_678, -8, 450_000_000, NOW));

        let funds = funds.unwrap_or_else(|| Arc::new(bank.account(id)));
        let oracle = Arc::new(FeedBackedOracle::new(
            id,
            feed,
            source.clone(),
            funds,
            Arc::new(RoleRegistry::with_admin(admin)),
            Arc::new(clock.clone()),
            &OracleConfig::default(),
        ));
        Fixture { oracle, source, bank, clock, admin, feed }
    }

    fn setup() -> Fixture {
        setup_with_funds(Arc::new(CollateralBank::new()), None)
    }

    fn next_update(feed: Hash) -> PriceUpdateData {
        PriceUpdateData {
            feed_id: feed,
            price: FeedPrice::new(460_000_000_000, -8, 0, NOW + 10),
        }
    }

    #[test]
    fn test_conversion_truncates_to_six_decimals() {
        let quote = FeedPrice::new(450_012_345_678, -8, 0, NOW);
        assert_eq!(quote.to_price().unwrap(), 4_500_123_456);

        let quote = FeedPrice::new(4_500, 0, 0, NOW);
        assert_eq!(quote.to_price().unwrap(), 4_500_000_000);

        let quote = FeedPrice::new(45, 2, 0, NOW);
        assert_eq!(quote.to_price().unwrap(), 4_500_000_000);

        let quote = FeedPrice::new(4_500_000_000, -6, 0, NOW);
        assert_eq!(quote.to_price().unwrap(), 4_500_000_000);
    }

    #[test]
    fn test_conversion_rejects_bad_values() {
        assert!(matches!(
            FeedPrice::new(0, -8, 0, NOW).to_price(),
            Err(OracleError::InvalidPrice(_))
        ));
        assert!(matches!(
            FeedPrice::new(-5, -8, 0, NOW).to_price(),
            Err(OracleError::InvalidPrice(_))
        ));
        // Rounds to zero
        assert!(FeedPrice::new(99, -9, 0, NOW).to_price().is_err());
        // Overflows u64
        assert!(FeedPrice::new(i64::MAX, 10, 0, NOW).to_price().is_err());
    }

    #[test]
    fn test_healthy_quote() {
        let f = setup();
        assert!(f.oracle.is_healthy());
        assert_eq!(f.oracle.price().unwrap(), 4_500_123_456);
    }

    #[test]
    fn test_stale_quote() {
        let f = setup();
        f.clock.advance(3_600);
        assert!(f.oracle.is_healthy());

        f.clock.advance(1);
        assert!(!f.oracle.is_healthy());
        assert_eq!(
            f.oracle.price(),
            Err(OracleError::Stale { age: 3_601, max_age: 3_600 })
        );
    }

    #[test]
    fn test_wide_confidence_is_unhealthy() {
        let f = setup();
        // 10% exactly is allowed
        f.source.publish(f.feed, FeedPrice::new(1_000_000, -6, 100_000, NOW));
        assert!(f.oracle.is_healthy());

        f.source.publish(f.feed, FeedPrice::new(1_000_000, -6, 100_001, NOW));
        assert!(!f.oracle.is_healthy());
        assert!(matches!(f.oracle.price(), Err(OracleError::Unhealthy(_))));
    }

    #[test]
    fn test_negative_mantissa_is_invalid() {
        let f = setup();
        f.source.publish(f.feed, FeedPrice::new(-1, -8, 0, NOW));
        assert!(matches!(f.oracle.price(), Err(OracleError::InvalidPrice(_))));
        assert!(!f.oracle.is_healthy());
    }

    #[test]
    fn test_unknown_feed_surfaces_as_unhealthy() {
        let f = setup();
        f.oracle.set_feed_id(&f.admin, Hash::sha256(b"BTC/USD")).unwrap();
        assert!(matches!(f.oracle.price(), Err(OracleError::Unhealthy(_))));
    }

    #[test]
    fn test_pause_and_unpause() {
        let f = setup();
        f.oracle.pause(&f.admin).unwrap();
        assert!(!f.oracle.is_healthy());
        f.oracle.unpause(&f.admin).unwrap();
        assert!(f.oracle.is_healthy());

        let stranger = Address::from_label("stranger");
        assert!(matches!(f.oracle.pause(&stranger), Err(OracleError::Unauthorized(_))));
    }

    #[test]
    fn test_update_requires_fee_and_refunds_excess() {
        let f = setup();
        let caller = Address::from_label("keeper");
        f.bank.credit(&caller, 100);
        let update = next_update(f.feed);

        let result = f.oracle.update_price_feeds(&caller, std::slice::from_ref(&update), 9);
        assert_eq!(
            result,
            Err(OracleError::InsufficientFee { required: 10, provided: 9 })
        );
        assert_eq!(f.bank.balance_of(&caller), 100);

        let receipt = f.oracle.update_price_feeds(&caller, &[update], 25).unwrap();
        assert_eq!(receipt, UpdateReceipt { fee: 10, refund: 15 });
        assert_eq!(f.bank.balance_of(&caller), 90);
        assert_eq!(f.bank.balance_of(&f.source.fee_recipient()), 10);
        assert_eq!(f.bank.balance_of(&f.oracle.oracle_id()), 0);
        assert_eq!(f.oracle.total_fees_paid(), 10);
        assert_eq!(f.source.collected_fees(), 10);

        f.clock.advance(10);
        assert_eq!(f.oracle.price().unwrap(), 4_600_000_000);
    }

    #[test]
    fn test_unfunded_update_rejected() {
        let f = setup();
        let caller = Address::from_label("keeper");
        f.bank.credit(&caller, 5);

        let result = f.oracle.update_price_feeds(&caller, &[next_update(f.feed)], 25);
        assert!(matches!(result, Err(OracleError::PaymentFailed(_))));
        assert_eq!(f.bank.balance_of(&caller), 5);
        assert_eq!(f.source.collected_fees(), 0);
        assert_eq!(f.oracle.total_fees_paid(), 0);

        f.clock.advance(10);
        assert_eq!(f.oracle.price().unwrap(), 4_500_123_456);
    }

    /// Price service that is down for updates
    struct OfflineSource;

    impl PriceFeedSource for OfflineSource {
        fn latest_price(&self, feed_id: &Hash) -> Result<FeedPrice, FeedError> {
            Err(FeedError::UnknownFeed(feed_id.to_hex()))
        }

        fn update_fee(&self, updates: &[PriceUpdateData]) -> Result<u128, FeedError> {
            Ok(10 * updates.len() as u128)
        }

        fn update_price_feeds(&self, _updates: &[PriceUpdateData], _fee: u128) -> Result<(), FeedError> {
            Err(FeedError::Unavailable("maintenance".into()))
        }

        fn fee_recipient(&self) -> Address {
            Address::from_label("price-service")
        }
    }

    #[test]
    fn test_rejected_update_returns_payment() {
        let bank = Arc::new(CollateralBank::new());
        let id = Address::from_label("feed-oracle");
        let oracle = FeedBackedOracle::new(
            id,
            Hash::sha256(b"ETH/USD"),
            Arc::new(OfflineSource),
            Arc::new(bank.account(id)),
            Arc::new(RoleRegistry::with_admin(Address::from_label("admin"))),
            Arc::new(ManualClock::new(NOW)),
            &OracleConfig::default(),
        );
        let caller = Address::from_label("keeper");
        bank.credit(&caller, 50);

        let update = next_update(Hash::sha256(b"ETH/USD"));
        let result = oracle.update_price_feeds(&caller, &[update], 30);
        assert!(matches!(result, Err(OracleError::Unhealthy(_))));
        assert_eq!(bank.balance_of(&caller), 50);
        assert_eq!(bank.balance_of(&id), 0);
        assert_eq!(oracle.total_fees_paid(), 0);
    }

    /// Funds account that starts more updates while the first payment is pulled
    struct ReenteringFunds {
        account: BankAccount,
        oracle: OnceLock<Weak<FeedBackedOracle>>,
        update: PriceUpdateData,
        nested_callers: Vec<Address>,
        nested_results: Mutex<Vec<Result<UpdateReceipt, OracleError>>>,
        fired: AtomicBool,
    }

    impl CollateralTransfer for ReenteringFunds {
        fn send(&self, to: &Address, amount: u128) -> Result<(), LedgerError> {
            self.account.send(to, amount)
        }

        fn receive(&self, from: &Address, amount: u128) -> Result<(), LedgerError> {
            self.account.receive(from, amount)?;
            if self.fired.swap(true, Ordering::SeqCst) {
                return Ok(());
            }
            if let Some(oracle) = self.oracle.get().and_then(Weak::upgrade) {
                for caller in &self.nested_callers {
                    let result =
                        oracle.update_price_feeds(caller, std::slice::from_ref(&self.update), 10);
                    self.nested_results.lock().unwrap().push(result);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_update_guard_is_per_caller() {
        let bank = Arc::new(CollateralBank::new());
        let first = Address::from_label("keeper-a");
        let second = Address::from_label("keeper-b");
        bank.credit(&first, 100);
        bank.credit(&second, 100);

        let funds = Arc::new(ReenteringFunds {
            account: bank.account(Address::from_label("feed-oracle")),
            oracle: OnceLock::new(),
            update: next_update(Hash::sha256(b"ETH/USD")),
            nested_callers: vec![second, first],
            nested_results: Mutex::new(Vec::new()),
            fired: AtomicBool::new(false),
        });
        let transfer: Arc<dyn CollateralTransfer> = funds.clone();
        let f = setup_with_funds(bank, Some(transfer));
        funds.oracle.set(Arc::downgrade(&f.oracle)).unwrap();

        let receipt = f
            .oracle
            .update_price_feeds(&first, &[next_update(f.feed)], 10)
            .unwrap();
        assert_eq!(receipt, UpdateReceipt { fee: 10, refund: 0 });

        let nested = funds.nested_results.lock().unwrap();
        // Another caller proceeds while the first update is in flight
        assert_eq!(nested[0], Ok(UpdateReceipt { fee: 10, refund: 0 }));
        assert_eq!(nested[1], Err(OracleError::ReentrantUpdate));
        assert_eq!(f.bank.balance_of(&first), 90);
        assert_eq!(f.bank.balance_of(&second), 90);
        assert_eq!(f.bank.balance_of(&f.source.fee_recipient()), 20);
    }

    #[test]
    fn test_empty_update_rejected() {
        let f = setup();
        let caller = Address::from_label("keeper");
        assert!(f.oracle.update_price_feeds(&caller, &[], 100).is_err());
    }

    #[test]
    fn test_admin_setters_validate() {
        let f = setup();
        assert!(f.oracle.set_max_price_age(&f.admin, 0).is_err());
        assert!(f.oracle.set_max_confidence_ratio(&f.admin, 0).is_err());
        assert!(f.oracle.set_feed_id(&f.admin, Hash::zero()).is_err());

        f.oracle.set_max_price_age(&f.admin, 60).unwrap();
        f.oracle.set_max_confidence_ratio(&f.admin, 50).unwrap();
        assert_eq!(f.oracle.params().max_price_age, 60);
        assert_eq!(f.oracle.params().max_confidence_bps, 50);
        // Confidence 450_000_000 / 450_012_345_678 is ~10 bps
        assert!(f.oracle.is_healthy());
    }
}
