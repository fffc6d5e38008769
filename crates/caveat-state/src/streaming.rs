//! # Streaming Allowances
//!
//! A quota that unlocks over time up to a hard cap. Two accrual models are
//! provided as separate [`UnlockSchedule`] implementations; an allowance is
//! bound to one model for its whole life because the table type fixes it.
//!
//! - [`LinearStream`]: `unlocked(t) = min(cap, initial + rate × max(0, t − start))`.
//! - [`ChunkedStream`]: `chunk` units unlock every `chunk / rate` seconds.
//!   Like the linear initial tranche, the first chunk has no start gate and
//!   is spendable before `start`:
//!   `unlocked(t) = min(cap, chunk × (1 + max(0, t − start) / interval))`.
//!
//! `available(t) = unlocked(t) − spent`, floored at zero. `spent` only grows.

use std::collections::BTreeMap;
use std::fmt::Debug;

use caveat_core::StateKey;
use serde::{Deserialize, Serialize};

use crate::error::AccountingError;

/// An accrual curve.
pub trait UnlockSchedule: Debug + Clone + PartialEq + Eq {
    /// Check the parameters once, at first use.
    fn validate(&self) -> Result<(), AccountingError>;

    /// Total amount unlocked at `now`.
    fn unlocked(&self, now: u64) -> u128;
}

/// Continuous accrual with an optional initial tranche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearStream {
    /// Unlocked immediately.
    pub initial: u128,
    /// Hard cap on the total unlocked.
    pub cap: u128,
    /// Units unlocked per second after `start`.
    pub rate: u128,
    /// Accrual start.
    pub start: u64,
}

impl UnlockSchedule for LinearStream {
    fn validate(&self) -> Result<(), AccountingError> {
        if self.cap < self.initial {
            return Err(AccountingError::InvalidTerms("invalid-max-amount"));
        }
        if self.start == 0 {
            return Err(AccountingError::InvalidTerms("invalid-zero-start-time"));
        }
        Ok(())
    }

    fn unlocked(&self, now: u64) -> u128 {
        let elapsed = u128::from(now.saturating_sub(self.start));
        self.rate
            .saturating_mul(elapsed)
            .saturating_add(self.initial)
            .min(self.cap)
    }
}

/// Discrete accrual in fixed-size chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkedStream {
    /// Size of each unlocked chunk; the first is available before `start`.
    pub chunk: u128,
    /// Hard cap on the total unlocked.
    pub cap: u128,
    /// Average units per second; one chunk every `chunk / rate` seconds.
    pub rate: u128,
    /// Accrual start.
    pub start: u64,
}

impl ChunkedStream {
    /// Seconds between chunks, or `None` if shorter than one second.
    pub fn interval(&self) -> Option<u128> {
        if self.rate == 0 {
            return None;
        }
        let interval = self.chunk / self.rate;
        (interval >= 1).then_some(interval)
    }
}

impl UnlockSchedule for ChunkedStream {
    fn validate(&self) -> Result<(), AccountingError> {
        if self.chunk == 0 || self.cap < self.chunk {
            return Err(AccountingError::InvalidTerms("invalid-max-amount"));
        }
        if self.start == 0 {
            return Err(AccountingError::InvalidTerms("invalid-zero-start-time"));
        }
        if self.interval().is_none() {
            return Err(AccountingError::InvalidTerms("invalid-chunk-interval"));
        }
        Ok(())
    }

    fn unlocked(&self, now: u64) -> u128 {
        let Some(interval) = self.interval() else {
            return 0;
        };
        let elapsed = u128::from(now.saturating_sub(self.start));
        let chunks = elapsed / interval + 1;
        self.chunk.saturating_mul(chunks).min(self.cap)
    }
}

/// Stored state of one streaming allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream<S> {
    /// Pinned schedule.
    pub schedule: S,
    /// Total consumed so far.
    pub spent: u128,
}

impl<S: UnlockSchedule> Stream<S> {
    /// Amount consumable at `now`.
    pub fn available(&self, now: u64) -> u128 {
        self.schedule.unlocked(now).saturating_sub(self.spent)
    }
}

/// Streaming allowances of one accrual model, keyed by composite key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTable<S> {
    streams: BTreeMap<StateKey, Stream<S>>,
}

impl<S> Default for StreamTable<S> {
    fn default() -> Self {
        Self {
            streams: BTreeMap::new(),
        }
    }
}

impl<S: UnlockSchedule> StreamTable<S> {
    /// Consume `amount` at `now`, pinning `schedule` if the key is new.
    ///
    /// Returns the amount still available afterwards.
    pub fn consume(
        &mut self,
        key: StateKey,
        schedule: &S,
        now: u64,
        amount: u128,
    ) -> Result<u128, AccountingError> {
        let mut stream = match self.streams.get(&key) {
            Some(existing) => existing.clone(),
            None => {
                schedule.validate()?;
                Stream {
                    schedule: schedule.clone(),
                    spent: 0,
                }
            }
        };
        if amount > stream.available(now) {
            return Err(AccountingError::AllowanceExceeded);
        }
        stream.spent += amount;
        let remaining = stream.available(now);
        tracing::debug!(key = %key, amount, spent = stream.spent, remaining, "stream consumed");
        self.streams.insert(key, stream);
        Ok(remaining)
    }

    /// Amount consumable at `now`, without mutating anything.
    pub fn available(&self, key: &StateKey, schedule: &S, now: u64) -> u128 {
        match self.streams.get(key) {
            Some(existing) => existing.available(now),
            None => schedule.unlocked(now),
        }
    }

    /// Read a pinned stream.
    pub fn get(&self, key: &StateKey) -> Option<&Stream<S>> {
        self.streams.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> StateKey {
        StateKey([4u8; 32])
    }

    fn linear() -> LinearStream {
        LinearStream {
            initial: 10,
            cap: 100,
            rate: 2,
            start: 1_000,
        }
    }

    fn chunked() -> ChunkedStream {
        ChunkedStream {
            chunk: 20,
            cap: 100,
            rate: 2,
            start: 1_000,
        }
    }

    // ── Linear accrual ───────────────────────────────────────────────

    #[test]
    fn test_linear_unlock_curve() {
        let s = linear();
        assert_eq!(s.unlocked(1_000), 10);
        assert_eq!(s.unlocked(1_010), 30);
        assert_eq!(s.unlocked(1_045), 100);
        assert_eq!(s.unlocked(5_000), 100);
    }

    #[test]
    fn test_linear_before_start_has_initial_tranche() {
        assert_eq!(linear().unlocked(10), 10);
    }

    #[test]
    fn test_linear_consume() {
        let mut table = StreamTable::<LinearStream>::default();
        assert_eq!(table.consume(key(), &linear(), 1_000, 10).unwrap(), 0);
        assert_eq!(
            table.consume(key(), &linear(), 1_000, 1),
            Err(AccountingError::AllowanceExceeded)
        );
        assert_eq!(table.consume(key(), &linear(), 1_005, 10).unwrap(), 0);
        assert_eq!(table.get(&key()).unwrap().spent, 20);
    }

    #[test]
    fn test_linear_invalid_terms() {
        let mut table = StreamTable::<LinearStream>::default();
        let bad = LinearStream { cap: 5, ..linear() };
        assert_eq!(
            table.consume(key(), &bad, 1_000, 0),
            Err(AccountingError::InvalidTerms("invalid-max-amount"))
        );
    }

    // ── Chunked accrual ──────────────────────────────────────────────

    #[test]
    fn test_chunked_unlock_steps() {
        let s = chunked();
        assert_eq!(s.interval(), Some(10));
        assert_eq!(s.unlocked(1_000), 20);
        assert_eq!(s.unlocked(1_009), 20);
        assert_eq!(s.unlocked(1_010), 40);
        assert_eq!(s.unlocked(1_100), 100);
    }

    #[test]
    fn test_chunked_first_chunk_has_no_start_gate() {
        let s = chunked();
        assert_eq!(s.unlocked(s.start - 500), s.chunk);
        assert_eq!(s.unlocked(s.start - 1), s.chunk);
        assert_eq!(s.unlocked(s.start), s.chunk);
    }

    #[test]
    fn test_chunked_interval_must_be_at_least_one_second() {
        let s = ChunkedStream {
            chunk: 1,
            rate: 2,
            ..chunked()
        };
        assert_eq!(s.validate(), Err(AccountingError::InvalidTerms("invalid-chunk-interval")));
        let zero_rate = ChunkedStream { rate: 0, ..chunked() };
        assert!(zero_rate.validate().is_err());
    }

    #[test]
    fn test_chunked_consume() {
        let mut table = StreamTable::<ChunkedStream>::default();
        assert_eq!(table.consume(key(), &chunked(), 1_005, 15).unwrap(), 5);
        assert_eq!(
            table.consume(key(), &chunked(), 1_005, 6),
            Err(AccountingError::AllowanceExceeded)
        );
        assert_eq!(table.available(&key(), &chunked(), 1_010), 25);
    }

    #[test]
    fn test_available_for_unpinned_key() {
        let table = StreamTable::<LinearStream>::default();
        assert_eq!(table.available(&key(), &linear(), 1_010), 30);
    }
}
