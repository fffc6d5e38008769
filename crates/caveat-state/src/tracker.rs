//! # Aggregating Balance Trackers
//!
//! Several delegations in one chain can each constrain the net change of the
//! same `(resource, recipient)` position. Their `beforeAll` hooks contribute
//! to one shared tracker; their `afterAll` hooks count down, and only the
//! last one validates.
//!
//! ## Contribution rules
//!
//! 1. The first contribution (no tracker exists for the key) snapshots the
//!    measured quantity and must come from the recipient itself
//!    (`invalid-delegator` otherwise).
//! 2. A contribution whose principal is the recipient adds its amount to the
//!    accumulator for its direction.
//! 3. Any other contribution is a re-delegation: it may only tighten, and it
//!    overwrites. A decrease bound may only shrink; an increase requirement
//!    may only grow.
//! 4. Every contribution increments `validation_remaining`.
//!
//! ## Security Invariant
//!
//! Validation fires exactly once per tracker, when the countdown reaches
//! zero, against the snapshot taken at the first contribution. The entry is
//! then removed, so a later redemption computing the same key starts from a
//! fresh snapshot.

use std::collections::BTreeMap;

use caveat_core::{Address, StateKey};
use serde::{Deserialize, Serialize};

use crate::error::AccountingError;
use crate::lock::{check_delta, Direction};

/// Shared accounting for one aggregated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceTracker {
    /// Quantity measured at the first contribution.
    pub balance_before: u128,
    /// Accumulated required increase.
    pub expected_increase: u128,
    /// Accumulated allowed decrease.
    pub expected_decrease: u128,
    /// Contributions whose `afterAll` has not run yet.
    pub validation_remaining: u32,
}

impl BalanceTracker {
    /// Net expected change: direction and magnitude of `|increase − decrease|`.
    pub fn net(&self) -> (Direction, u128) {
        if self.expected_increase >= self.expected_decrease {
            (
                Direction::Increase,
                self.expected_increase - self.expected_decrease,
            )
        } else {
            (
                Direction::Decrease,
                self.expected_decrease - self.expected_increase,
            )
        }
    }

    /// Compare a final measurement against the snapshot and the net delta.
    pub fn verify(&self, measured: u128) -> Result<(), AccountingError> {
        let (direction, amount) = self.net();
        check_delta(direction, self.balance_before, measured, amount)
    }
}

/// One `beforeAll` contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contribution {
    /// Principal of the contributing delegation.
    pub principal: Address,
    /// Recipient named in the contributing terms.
    pub recipient: Address,
    /// Which accumulator the amount applies to.
    pub direction: Direction,
    /// Requested amount.
    pub amount: u128,
}

/// Outcome of one `afterAll` countdown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Other contributions have not reported yet.
    Pending {
        /// Contributions still outstanding.
        remaining: u32,
    },
    /// This was the last contribution; the tracker was validated and removed.
    Settled,
}

/// Open trackers, keyed by composite key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerTable {
    trackers: BTreeMap<StateKey, BalanceTracker>,
}

impl TrackerTable {
    /// Whether a tracker is open for `key`.
    pub fn is_open(&self, key: &StateKey) -> bool {
        self.trackers.contains_key(key)
    }

    /// Read a tracker.
    pub fn get(&self, key: &StateKey) -> Option<&BalanceTracker> {
        self.trackers.get(key)
    }

    /// Apply a `beforeAll` contribution. `measured` is the current quantity;
    /// it becomes the snapshot only if this is the first contribution.
    pub fn contribute(
        &mut self,
        key: StateKey,
        contribution: Contribution,
        measured: u128,
    ) -> Result<&BalanceTracker, AccountingError> {
        let first = !self.trackers.contains_key(&key);
        let mut tracker = match self.trackers.get(&key) {
            Some(existing) => *existing,
            None => {
                if contribution.principal != contribution.recipient {
                    return Err(AccountingError::InvalidDelegator);
                }
                BalanceTracker {
                    balance_before: measured,
                    expected_increase: 0,
                    expected_decrease: 0,
                    validation_remaining: 0,
                }
            }
        };

        let amount = contribution.amount;
        if contribution.principal == contribution.recipient {
            let slot = match contribution.direction {
                Direction::Increase => &mut tracker.expected_increase,
                Direction::Decrease => &mut tracker.expected_decrease,
            };
            *slot = slot.checked_add(amount).ok_or(AccountingError::Overflow)?;
        } else {
            match contribution.direction {
                Direction::Decrease => {
                    if amount > tracker.expected_decrease {
                        return Err(AccountingError::DecreaseLoosened);
                    }
                    tracker.expected_decrease = amount;
                }
                Direction::Increase => {
                    if amount < tracker.expected_increase {
                        return Err(AccountingError::IncreaseLoosened);
                    }
                    tracker.expected_increase = amount;
                }
            }
        }
        tracker.validation_remaining = tracker
            .validation_remaining
            .checked_add(1)
            .ok_or(AccountingError::Overflow)?;

        tracing::debug!(
            key = %key,
            first,
            direction = %contribution.direction,
            amount,
            remaining = tracker.validation_remaining,
            "tracker contribution"
        );
        let entry = self.trackers.entry(key).or_insert(tracker);
        *entry = tracker;
        Ok(entry)
    }

    /// Count down one `afterAll`. On the last one, validate `measured`
    /// against the tracker and remove it.
    pub fn settle(&mut self, key: StateKey, measured: u128) -> Result<Settlement, AccountingError> {
        let mut tracker = *self
            .trackers
            .get(&key)
            .ok_or(AccountingError::MissingTracker)?;
        tracker.validation_remaining = tracker.validation_remaining.saturating_sub(1);
        if tracker.validation_remaining > 0 {
            self.trackers.insert(key, tracker);
            return Ok(Settlement::Pending {
                remaining: tracker.validation_remaining,
            });
        }
        tracker.verify(measured)?;
        self.trackers.remove(&key);
        tracing::debug!(key = %key, measured, "tracker settled");
        Ok(Settlement::Settled)
    }

    /// Number of open trackers.
    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    /// Whether no tracker is open.
    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn contributions() -> impl Strategy<Value = Vec<(bool, u128)>> {
        prop::collection::vec((any::<bool>(), 0u128..1_000), 1..6)
    }

    proptest! {
        /// With only root contributions, any ordering of beforeAll and
        /// afterAll calls validates exactly once against the net of all
        /// contributions and the first snapshot.
        #[test]
        fn order_independence(
            items in contributions(),
            seed in any::<u64>(),
            start in 10_000u128..20_000,
        ) {
            let principal = Address::from_low_u64(1);
            let key = StateKey([1u8; 32]);
            let mut order: Vec<usize> = (0..items.len()).collect();
            // deterministic shuffle
            let mut s = seed;
            for i in (1..order.len()).rev() {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
                order.swap(i, (s % (i as u64 + 1)) as usize);
            }

            let mut table = TrackerTable::default();
            for (n, idx) in order.iter().enumerate() {
                let (increase, amount) = items[*idx];
                let direction = if increase { Direction::Increase } else { Direction::Decrease };
                // only the first measurement may become the snapshot
                let measured = if n == 0 { start } else { start + 7 };
                table.contribute(key, Contribution { principal, recipient: principal, direction, amount }, measured).unwrap();
            }

            let inc: u128 = items.iter().filter(|(i, _)| *i).map(|(_, a)| a).sum();
            let dec: u128 = items.iter().filter(|(i, _)| !*i).map(|(_, a)| a).sum();
            let tracker = *table.get(&key).unwrap();
            prop_assert_eq!(tracker.balance_before, start);
            prop_assert_eq!(tracker.expected_increase, inc);
            prop_assert_eq!(tracker.expected_decrease, dec);

            let final_measure = (start + inc).saturating_sub(dec);
            let mut settled = 0;
            for _ in 0..items.len() {
                if table.settle(key, final_measure).unwrap() == Settlement::Settled {
                    settled += 1;
                }
            }
            prop_assert_eq!(settled, 1);
            prop_assert!(table.is_empty());
        }
    }
}
