//! # Periodic Allowances
//!
//! A quota that refills every `duration` seconds from `start`. Period
//! indices are 1-based: `floor((now − start) / duration) + 1`. The consumed
//! counter resets exactly when the computed index differs from the last
//! index touched.
//!
//! Terms are pinned at first use of a key. Later calls that pass different
//! terms for the same key are evaluated against the pinned ones.

use std::collections::BTreeMap;

use caveat_core::StateKey;
use serde::{Deserialize, Serialize};

use crate::error::AccountingError;

/// Parameters of a periodic allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTerms {
    /// Amount available per period.
    pub quota: u128,
    /// Period length in seconds.
    pub duration: u64,
    /// First second of period 1.
    pub start: u64,
}

impl PeriodTerms {
    /// Reject zero quota, zero duration and zero start.
    pub fn validate(&self) -> Result<(), AccountingError> {
        if self.quota == 0 {
            return Err(AccountingError::InvalidTerms("invalid-zero-period-amount"));
        }
        if self.duration == 0 {
            return Err(AccountingError::InvalidTerms("invalid-zero-period-duration"));
        }
        if self.start == 0 {
            return Err(AccountingError::InvalidTerms("invalid-zero-start-date"));
        }
        Ok(())
    }

    /// 1-based period index at `now`, or 0 before `start`.
    pub fn period_at(&self, now: u64) -> u64 {
        if now < self.start || self.duration == 0 {
            return 0;
        }
        (now - self.start) / self.duration + 1
    }
}

/// Stored state of one periodic allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodicAllowance {
    /// Pinned terms.
    pub terms: PeriodTerms,
    /// Index of the last period in which anything was consumed.
    pub last_period: u64,
    /// Amount consumed in `last_period`.
    pub consumed: u128,
}

/// Read-only view of an allowance at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodAvailability {
    /// Amount that can still be consumed in the current period.
    pub available: u128,
    /// Whether the current period has not been touched yet.
    pub is_new_period: bool,
    /// Current 1-based period index (0 before start).
    pub current_period: u64,
}

impl PeriodicAllowance {
    fn fresh(terms: PeriodTerms) -> Self {
        Self {
            terms,
            last_period: 0,
            consumed: 0,
        }
    }

    /// Availability at `now`.
    pub fn availability(&self, now: u64) -> PeriodAvailability {
        if now < self.terms.start {
            return PeriodAvailability {
                available: 0,
                is_new_period: false,
                current_period: 0,
            };
        }
        let current_period = self.terms.period_at(now);
        let is_new_period = current_period != self.last_period;
        let available = if is_new_period {
            self.terms.quota
        } else {
            self.terms.quota.saturating_sub(self.consumed)
        };
        PeriodAvailability {
            available,
            is_new_period,
            current_period,
        }
    }
}

/// Periodic allowances, keyed by composite key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeriodTable {
    allowances: BTreeMap<StateKey, PeriodicAllowance>,
}

impl PeriodTable {
    /// Consume `amount` at `now`. Pins `terms` if the key is new.
    ///
    /// Returns availability after the consumption.
    pub fn consume(
        &mut self,
        key: StateKey,
        terms: &PeriodTerms,
        now: u64,
        amount: u128,
    ) -> Result<PeriodAvailability, AccountingError> {
        let mut allowance = match self.allowances.get(&key) {
            Some(existing) => *existing,
            None => {
                terms.validate()?;
                PeriodicAllowance::fresh(*terms)
            }
        };
        if now < allowance.terms.start {
            return Err(AccountingError::NotStarted);
        }
        let view = allowance.availability(now);
        if amount > view.available {
            return Err(AccountingError::PeriodExceeded);
        }
        if view.is_new_period {
            allowance.last_period = view.current_period;
            allowance.consumed = 0;
        }
        allowance.consumed += amount;
        self.allowances.insert(key, allowance);

        let after = allowance.availability(now);
        tracing::debug!(
            key = %key,
            period = view.current_period,
            amount,
            available = after.available,
            "periodic allowance consumed"
        );
        Ok(after)
    }

    /// Availability at `now` without mutating anything. Unpinned keys are
    /// evaluated against `terms`.
    pub fn available(&self, key: &StateKey, terms: &PeriodTerms, now: u64) -> PeriodAvailability {
        match self.allowances.get(key) {
            Some(existing) => existing.availability(now),
            None => PeriodicAllowance::fresh(*terms).availability(now),
        }
    }

    /// Read a pinned allowance.
    pub fn get(&self, key: &StateKey) -> Option<&PeriodicAllowance> {
        self.allowances.get(key)
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Within one period, consumption succeeds while the running sum stays
        /// within quota, and fails as soon as it would exceed it.
        #[test]
        fn same_period_sum_bound(amounts in prop::collection::vec(0u128..60, 1..10)) {
            let terms = PeriodTerms { quota: 100, duration: 3600, start: 1_000 };
            let key = StateKey([9u8; 32]);
            let mut table = PeriodTable::default();
            let mut total = 0u128;
            for (i, amount) in amounts.iter().enumerate() {
                let result = table.consume(key, &terms, 1_000 + i as u64, *amount);
                if total + amount <= 100 {
                    prop_assert!(result.is_ok());
                    total += amount;
                } else {
                    prop_assert_eq!(result, Err(AccountingError::PeriodExceeded));
                }
            }
        }

        /// A later period always starts from a full quota.
        #[test]
        fn later_period_resets(first in 0u128..=100, later in 1u64..50) {
            let terms = PeriodTerms { quota: 100, duration: 60, start: 1_000 };
            let key = StateKey([9u8; 32]);
            let mut table = PeriodTable::default();
            table.consume(key, &terms, 1_000, first).unwrap();
            prop_assert!(table.consume(key, &terms, 1_000 + 60 * later, 100).is_ok());
        }
    }
}
