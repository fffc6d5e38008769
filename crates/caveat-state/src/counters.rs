//! # Counters, Id Sets and Group Selections
//!
//! Small keyed tables: per-delegation call counters, the set of consumed
//! one-time ids, and the group indices a try-all composition pinned between
//! its `before` and `after` hooks.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use caveat_core::StateKey;

use crate::error::AccountingError;

/// Redemption counts per key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallCounter {
    counts: BTreeMap<StateKey, u128>,
}

impl CallCounter {
    /// Record one more call, failing once `limit` calls have been recorded.
    /// Returns the new count.
    pub fn increment(&mut self, key: StateKey, limit: u128) -> Result<u128, AccountingError> {
        let current = self.count(&key);
        let next = current.checked_add(1).ok_or(AccountingError::Overflow)?;
        if next > limit {
            return Err(AccountingError::LimitExceeded);
        }
        self.counts.insert(key, next);
        tracing::debug!(key = %key, count = next, limit, "call counted");
        Ok(next)
    }

    /// Calls recorded so far.
    pub fn count(&self, key: &StateKey) -> u128 {
        self.counts.get(key).copied().unwrap_or(0)
    }
}

/// Consumed one-time ids. The key already commits to the id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsedIds {
    used: BTreeSet<StateKey>,
}

impl UsedIds {
    /// Mark `key` used, failing if it already was.
    pub fn consume(&mut self, key: StateKey) -> Result<(), AccountingError> {
        if !self.used.insert(key) {
            return Err(AccountingError::IdUsed);
        }
        Ok(())
    }

    /// Whether `key` has been consumed.
    pub fn is_used(&self, key: &StateKey) -> bool {
        self.used.contains(key)
    }
}

/// Group indices pinned by `before` hooks for their `after` hooks.
///
/// Each key holds a queue: identical compositions on one delegation pin in
/// `before` order and are taken in the same order by `after`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupSelections {
    pinned: BTreeMap<StateKey, VecDeque<usize>>,
}

impl GroupSelections {
    /// Queue `group` for `key`.
    pub fn pin(&mut self, key: StateKey, group: usize) {
        self.pinned.entry(key).or_default().push_back(group);
    }

    /// Remove and return the oldest pinned group for `key`.
    pub fn take(&mut self, key: StateKey) -> Result<usize, AccountingError> {
        let queue = self
            .pinned
            .get_mut(&key)
            .ok_or(AccountingError::MissingSelection)?;
        let group = queue.pop_front().ok_or(AccountingError::MissingSelection)?;
        if queue.is_empty() {
            self.pinned.remove(&key);
        }
        Ok(group)
    }

    /// Number of pinned selections across all keys.
    pub fn len(&self) -> usize {
        self.pinned.values().map(VecDeque::len).sum()
    }

    /// Whether nothing is pinned.
    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}
