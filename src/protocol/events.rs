//! Engine events for state change notifications.
//!
//! Events are emitted for every committed state change of the controller and
//! the registry, carrying before/after values and the timestamp of the
//! change. Rejected operations never emit.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::oracle::Price;
use crate::utils::constants::MAX_BUFFERED_EVENTS;
use crate::utils::crypto::{Address, Hash};
use crate::utils::time::Timestamp;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// All engine event types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineEvent {
    // Issuance Events
    /// Issued tokens minted against collateral
    Mint(MintEvent),
    /// Issued tokens burned for collateral
    Redeem(RedeemEvent),

    // Oracle Events
    /// Reference price moved
    PriceUpdated(PriceUpdatedEvent),
    /// Oracle replacement proposed
    OracleProposed(OracleProposedEvent),
    /// Oracle replacement executed
    OracleActivated(OracleActivatedEvent),
    /// Oracle replacement withdrawn
    OracleCancelled(OracleCancelledEvent),

    // Registry Events
    /// Issuer registered or reactivated
    IssuerAdded(IssuerEvent),
    /// Issuer deactivated
    IssuerRemoved(IssuerEvent),
    /// Daily limit changed
    LimitUpdated(LimitUpdatedEvent),

    // Control Events
    /// Pause flag raised
    Paused(PauseEvent),
    /// Pause flag cleared
    Resumed(PauseEvent),
    /// Emergency withdrawal executed
    EmergencyAction(EmergencyActionEvent),
    /// Controller parameter changed
    ConfigChanged(ConfigChangedEvent),
}

impl EngineEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Mint(_) => "Mint",
            Self::Redeem(_) => "Redeem",
            Self::PriceUpdated(_) => "PriceUpdated",
            Self::OracleProposed(_) => "OracleProposed",
            Self::OracleActivated(_) => "OracleActivated",
            Self::OracleCancelled(_) => "OracleCancelled",
            Self::IssuerAdded(_) => "IssuerAdded",
            Self::IssuerRemoved(_) => "IssuerRemoved",
            Self::LimitUpdated(_) => "LimitUpdated",
            Self::Paused(_) => "Paused",
            Self::Resumed(_) => "Resumed",
            Self::EmergencyAction(_) => "EmergencyAction",
            Self::ConfigChanged(_) => "ConfigChanged",
        }
    }

    /// Get the timestamp of the event
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Mint(e) => e.timestamp,
            Self::Redeem(e) => e.timestamp,
            Self::PriceUpdated(e) => e.timestamp,
            Self::OracleProposed(e) => e.timestamp,
            Self::OracleActivated(e) => e.timestamp,
            Self::OracleCancelled(e) => e.timestamp,
            Self::IssuerAdded(e) => e.timestamp,
            Self::IssuerRemoved(e) => e.timestamp,
            Self::LimitUpdated(e) => e.timestamp,
            Self::Paused(e) => e.timestamp,
            Self::Resumed(e) => e.timestamp,
            Self::EmergencyAction(e) => e.timestamp,
            Self::ConfigChanged(e) => e.timestamp,
        }
    }

    /// Compute event hash
    pub fn hash(&self) -> Hash {
        let data = bincode::serialize(self).unwrap_or_default();
        Hash::sha256(&data)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ISSUANCE EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted on a committed mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintEvent {
    /// Recipient of the issued tokens
    pub caller: Address,
    /// Collateral deposited (18 decimals)
    pub collateral_in: u128,
    /// Tokens issued (6 decimals)
    pub issued: u128,
    /// Price used
    pub price: Price,
    /// Reserve after the mint
    pub reserve_after: u128,
    /// Timestamp
    pub timestamp: Timestamp,
}

/// Event emitted on a committed redeem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemEvent {
    /// Holder burning tokens
    pub caller: Address,
    /// Tokens burned (6 decimals)
    pub burned: u128,
    /// Collateral paid out (18 decimals)
    pub collateral_out: u128,
    /// Price used
    pub price: Price,
    /// Reserve after the redeem
    pub reserve_after: u128,
    /// Timestamp
    pub timestamp: Timestamp,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ORACLE EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when the reference price changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUpdatedEvent {
    /// Previous reference price (0 before the first quote)
    pub previous_price: Price,
    /// New reference price
    pub price: Price,
    /// Number of recorded updates including this one
    pub update_count: u64,
    /// Timestamp
    pub timestamp: Timestamp,
}

/// Event emitted when an oracle replacement is proposed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleProposedEvent {
    /// Oracle currently active
    pub current: Address,
    /// Proposed replacement
    pub candidate: Address,
    /// Previously pending candidate this proposal replaced, if any
    pub replaced: Option<Address>,
    /// Earliest activation time
    pub eta: Timestamp,
    /// Timestamp
    pub timestamp: Timestamp,
}

/// Event emitted when a pending oracle becomes active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleActivatedEvent {
    /// Oracle replaced
    pub previous: Address,
    /// Oracle now active
    pub current: Address,
    /// First price read from the new oracle
    pub price: Price,
    /// Timestamp
    pub timestamp: Timestamp,
}

/// Event emitted when a pending proposal is withdrawn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleCancelledEvent {
    /// Candidate that was pending
    pub candidate: Address,
    /// Its activation time
    pub eta: Timestamp,
    /// Timestamp
    pub timestamp: Timestamp,
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Event emitted when an issuer is added, reactivated or removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerEvent {
    /// Issuer identity
    pub issuer: Address,
    /// Issuer name
    pub name: String,
    /// Daily limit in force
    pub daily_limit: u128,
    /// Timestamp
    pub timestamp: Timestamp,
}

/// Which limit a [`LimitUpdatedEvent`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitScope {
    /// One issuer's daily limit
    Issuer(Address),
    /// The global daily limit
    Global,
}

/// Event emitted when a daily limit changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitUpdatedEvent {
    /// Limit changed
    pub scope: LimitScope,
    /// Previous limit
    pub old_limit: u128,
    /// New limit
    pub new_limit: u128,
    /// Timestamp
    pub timestamp: Timestamp,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTROL EVENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Pause flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PauseTarget {
    /// Everything
    Global,
    /// Mint only
    Mint,
    /// Redeem only
    Redeem,
}

impl std::fmt::Display for PauseTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PauseTarget::Global => write!(f, "global"),
            PauseTarget::Mint => write!(f, "mint"),
            PauseTarget::Redeem => write!(f, "redeem"),
        }
    }
}

/// Event emitted when a pause flag is raised or cleared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseEvent {
    /// Flag changed
    pub target: PauseTarget,
    /// Admin who changed it
    pub by: Address,
    /// Timestamp
    pub timestamp: Timestamp,
}

/// Emergency withdrawal kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmergencyKind {
    /// Collateral taken out of the reserve
    WithdrawCollateral,
    /// Issued tokens held by the controller moved out
    WithdrawToken,
}

/// Event emitted on an emergency withdrawal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyActionEvent {
    /// What was withdrawn
    pub kind: EmergencyKind,
    /// Emergency operator
    pub by: Address,
    /// Recipient
    pub to: Address,
    /// Amount moved
    pub amount: u128,
    /// Balance before the withdrawal
    pub balance_before: u128,
    /// Balance after the withdrawal
    pub balance_after: u128,
    /// Timestamp
    pub timestamp: Timestamp,
}

/// Event emitted when a controller parameter changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigChangedEvent {
    /// Parameter that changed
    pub parameter: String,
    /// Old value (as string for flexibility)
    pub old_value: String,
    /// New value
    pub new_value: String,
    /// Timestamp
    pub timestamp: Timestamp,
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT LOG
// ═══════════════════════════════════════════════════════════════════════════════

/// Bounded buffer of emitted events; the oldest are dropped first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    events: VecDeque<EngineEvent>,
    capacity: usize,
    dropped: u64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    /// Create a new empty event log holding up to `MAX_BUFFERED_EVENTS`
    pub fn new() -> Self {
        Self::with_capacity(MAX_BUFFERED_EVENTS)
    }

    /// Create a log holding up to `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Add an event to the log
    pub fn push(&mut self, event: EngineEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    /// Get all buffered events, oldest first
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.iter().cloned().collect()
    }

    /// Remove and return all buffered events
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    /// Get events of a specific type
    pub fn filter_by_type(&self, event_type: &str) -> Vec<&EngineEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Most recent event
    pub fn last(&self) -> Option<&EngineEvent> {
        self.events.back()
    }

    /// Get the number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events evicted because the buffer was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Hash chain over the buffered events
    pub fn digest(&self) -> Hash {
        self.events.iter().fold(Hash::zero(), |acc, e| {
            let mut data = Vec::with_capacity(64);
            data.extend_from_slice(acc.as_bytes());
            data.extend_from_slice(e.hash().as_bytes());
            Hash::sha256(&data)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
