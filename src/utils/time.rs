//! Time sources.
//!
//! Every time-dependent rule in the engine (cooldowns, staleness, timelocks,
//! rolling windows) reads unix seconds through [`Clock`] so that tests and
//! simulations can warp time deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Unix timestamp in seconds
pub type Timestamp = u64;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Current unix timestamp in seconds
    fn now(&self) -> Timestamp;
}

/// Wall-clock time (UTC)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as Timestamp
    }
}

/// Manually driven clock. Clones share the same underlying time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock starting at `start`
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    /// Set the absolute time
    pub fn set(&self, timestamp: Timestamp) {
        self.now.store(timestamp, Ordering::SeqCst);
    }

    /// Move time forward
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
