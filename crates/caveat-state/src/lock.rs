//! # Lock-and-Snapshot Accounting
//!
//! A before-hook opens a snapshot for a composite key: it records the
//! measured quantity and holds a lock. The paired after-hook closes it and
//! compares the re-measured quantity against the cached value.
//!
//! ## Security Invariant
//!
//! A key can be open at most once. A second `open` before `close` fails with
//! `enforcer-is-locked`, so one balance change can never satisfy two
//! overlapping checks on the same key. `close` removes the entry: no snapshot
//! outlives its after-hook, and an after-hook without a before-hook fails
//! with `unpaired-after-hook` instead of reading a default value.

use std::collections::BTreeMap;

use caveat_core::StateKey;
use serde::{Deserialize, Serialize};

use crate::error::AccountingError;

/// Whether a guardrail bounds a decrease or requires an increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// The quantity may fall by at most `amount`.
    Decrease,
    /// The quantity must rise by at least `amount`.
    Increase,
}

impl Direction {
    /// Decode a terms flag byte: non-zero means decrease.
    pub fn from_flag(flag: u8) -> Self {
        if flag == 0 {
            Self::Increase
        } else {
            Self::Decrease
        }
    }

    /// The terms flag byte.
    pub fn flag(&self) -> u8 {
        match self {
            Self::Decrease => 1,
            Self::Increase => 0,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Decrease => "decrease",
            Self::Increase => "increase",
        })
    }
}

/// Compare a re-measured quantity against its snapshot.
///
/// - `Decrease`: requires `measured ≥ cached − amount` (floored at zero).
/// - `Increase`: requires `measured ≥ cached + amount`.
pub fn check_delta(
    direction: Direction,
    cached: u128,
    measured: u128,
    amount: u128,
) -> Result<(), AccountingError> {
    match direction {
        Direction::Decrease => {
            if measured < cached.saturating_sub(amount) {
                return Err(AccountingError::ExceededDecrease);
            }
        }
        Direction::Increase => {
            let required = cached.checked_add(amount).ok_or(AccountingError::Overflow)?;
            if measured < required {
                return Err(AccountingError::InsufficientIncrease);
            }
        }
    }
    Ok(())
}

/// Open snapshots, keyed by composite key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotLocks {
    open: BTreeMap<StateKey, u128>,
}

impl SnapshotLocks {
    /// Lock `key` and cache `measured`.
    pub fn open(&mut self, key: StateKey, measured: u128) -> Result<(), AccountingError> {
        if self.open.contains_key(&key) {
            return Err(AccountingError::Locked);
        }
        self.open.insert(key, measured);
        tracing::debug!(key = %key, measured, "snapshot locked");
        Ok(())
    }

    /// Release `key`, returning the cached snapshot.
    pub fn close(&mut self, key: StateKey) -> Result<u128, AccountingError> {
        let cached = self.open.remove(&key).ok_or(AccountingError::NotLocked)?;
        tracing::debug!(key = %key, cached, "snapshot released");
        Ok(cached)
    }

    /// Whether `key` is currently locked.
    pub fn is_locked(&self, key: &StateKey) -> bool {
        self.open.contains_key(key)
    }

    /// Number of open snapshots.
    pub fn len(&self) -> usize {
        self.open.len()
    }

    /// Whether no snapshot is open.
    pub fn is_empty(&self) -> bool {
        self.open.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> StateKey {
        StateKey([n; 32])
    }

    #[test]
    fn test_open_then_close() {
        let mut locks = SnapshotLocks::default();
        locks.open(key(1), 500).unwrap();
        assert!(locks.is_locked(&key(1)));
        assert_eq!(locks.close(key(1)).unwrap(), 500);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_double_open_is_locked() {
        let mut locks = SnapshotLocks::default();
        locks.open(key(1), 500).unwrap();
        assert_eq!(locks.open(key(1), 500), Err(AccountingError::Locked));
        // the first snapshot is untouched
        assert_eq!(locks.close(key(1)).unwrap(), 500);
    }

    #[test]
    fn test_distinct_keys_are_independent() {
        let mut locks = SnapshotLocks::default();
        locks.open(key(1), 1).unwrap();
        locks.open(key(2), 2).unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_close_without_open() {
        let mut locks = SnapshotLocks::default();
        assert_eq!(locks.close(key(9)), Err(AccountingError::NotLocked));
    }

    #[test]
    fn test_reopen_after_close() {
        let mut locks = SnapshotLocks::default();
        locks.open(key(1), 1).unwrap();
        locks.close(key(1)).unwrap();
        locks.open(key(1), 2).unwrap();
    }

    #[test]
    fn test_check_delta_decrease() {
        assert!(check_delta(Direction::Decrease, 100, 90, 10).is_ok());
        assert!(check_delta(Direction::Decrease, 100, 150, 10).is_ok());
        assert_eq!(
            check_delta(Direction::Decrease, 100, 89, 10),
            Err(AccountingError::ExceededDecrease)
        );
        // decrease larger than the snapshot floors at zero
        assert!(check_delta(Direction::Decrease, 5, 0, 10).is_ok());
    }

    #[test]
    fn test_check_delta_increase() {
        assert!(check_delta(Direction::Increase, 100, 110, 10).is_ok());
        assert_eq!(
            check_delta(Direction::Increase, 100, 109, 10),
            Err(AccountingError::InsufficientIncrease)
        );
        assert_eq!(
            check_delta(Direction::Increase, u128::MAX, u128::MAX, 1),
            Err(AccountingError::Overflow)
        );
    }

    #[test]
    fn test_direction_flag() {
        assert_eq!(Direction::from_flag(0), Direction::Increase);
        assert_eq!(Direction::from_flag(1), Direction::Decrease);
        assert_eq!(Direction::from_flag(Direction::Decrease.flag()), Direction::Decrease);
    }
}
