//! Reentrancy guards.
//!
//! A guard marks a key as "in flight" for as long as the returned token is
//! alive; a second acquisition of the same key fails instead of blocking.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::Mutex;

/// Set of keys currently inside a guarded section
#[derive(Debug)]
pub struct ReentrancyGuard<K: Eq + Hash + Clone> {
    active: Mutex<HashSet<K>>,
}

impl<K: Eq + Hash + Clone> Default for ReentrancyGuard<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash + Clone> ReentrancyGuard<K> {
    /// Create an empty guard
    pub fn new() -> Self {
        Self {
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Enter the guarded section for `key`. Returns `None` if `key` is
    /// already inside.
    pub fn enter(&self, key: K) -> Option<GuardToken<'_, K>> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(key.clone()) {
            return None;
        }
        Some(GuardToken { guard: self, key })
    }

    /// Whether `key` is currently inside the guarded section
    pub fn is_entered(&self, key: &K) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(key)
    }
}

/// Releases its key when dropped
#[derive(Debug)]
pub struct GuardToken<'a, K: Eq + Hash + Clone> {
    guard: &'a ReentrancyGuard<K>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for GuardToken<'_, K> {
    fn drop(&mut self) {
        self.guard
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentry_rejected_until_drop() {
        let guard = ReentrancyGuard::new();
        let token = guard.enter(1u8).unwrap();
        assert!(guard.enter(1u8).is_none());
        assert!(guard.enter(2u8).is_some());
        assert!(guard.is_entered(&1));
        drop(token);
        assert!(!guard.is_entered(&1));
        assert!(guard.enter(1u8).is_some());
    }
}
