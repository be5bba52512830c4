//! Rolling 24h accumulator.
//!
//! A window is a `(value, window_start)` pair. Reads go through
//! [`RollingWindow::effective_value`], which reports zero once the window has
//! elapsed, so a stale stored value is never observed. Writes roll the window
//! forward before adding.

use serde::{Deserialize, Serialize};

use crate::utils::constants::DAY_SECS;
use crate::utils::time::Timestamp;

/// Amount accumulated since `window_start`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingWindow {
    value: u128,
    window_start: Timestamp,
}

impl RollingWindow {
    /// Empty window opening at `now`
    pub fn new(now: Timestamp) -> Self {
        Self {
            value: 0,
            window_start: now,
        }
    }

    /// Whether the window opened at `window_start` has elapsed at `now`
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.window_start.saturating_add(DAY_SECS)
    }

    /// Value in force at `now`
    pub fn effective_value(&self, now: Timestamp) -> u128 {
        if self.is_expired(now) {
            0
        } else {
            self.value
        }
    }

    /// Start of the current window
    pub fn window_start(&self) -> Timestamp {
        self.window_start
    }

    /// Raw stored value, possibly stale
    pub fn stored_value(&self) -> u128 {
        self.value
    }

    /// Open a fresh window at `now` if the current one elapsed.
    /// Returns true when a reset happened.
    pub fn roll(&mut self, now: Timestamp) -> bool {
        if self.is_expired(now) {
            *self = Self::new(now);
            true
        } else {
            false
        }
    }

    /// Value at `now` plus `amount`, without mutating. `None` on overflow.
    pub fn projected(&self, now: Timestamp, amount: u128) -> Option<u128> {
        self.effective_value(now).checked_add(amount)
    }

    /// Roll then add `amount`; returns the new value
    pub fn add(&mut self, now: Timestamp, amount: u128) -> Option<u128> {
        self.roll(now);
        self.value = self.value.checked_add(amount)?;
        Some(self.value)
    }

    /// Remove `amount` from the current window (saturating). A window that
    /// already elapsed is left untouched.
    pub fn sub(&mut self, now: Timestamp, amount: u128) {
        if !self.is_expired(now) {
            self.value = self.value.saturating_sub(amount);
        }
    }
}
