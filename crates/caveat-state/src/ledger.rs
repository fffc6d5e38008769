//! # Ledger
//!
//! Owner of every accounting table. A redemption runs against one `&mut
//! Ledger`; the coordinator clones it before starting and restores the clone
//! if any hook fails, which gives the all-or-nothing semantics hooks rely on.

use crate::counters::{CallCounter, GroupSelections, UsedIds};
use crate::lock::SnapshotLocks;
use crate::periodic::PeriodTable;
use crate::streaming::{ChunkedStream, LinearStream, StreamTable};
use crate::tracker::TrackerTable;

/// All shared accounting state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    /// Lock-and-snapshot entries.
    pub locks: SnapshotLocks,
    /// Aggregating trackers.
    pub trackers: TrackerTable,
    /// Periodic allowances.
    pub periods: PeriodTable,
    /// Linear streaming allowances.
    pub linear_streams: StreamTable<LinearStream>,
    /// Chunked streaming allowances.
    pub chunked_streams: StreamTable<ChunkedStream>,
    /// Call counters.
    pub calls: CallCounter,
    /// Consumed one-time ids.
    pub ids: UsedIds,
    /// Pinned composition groups.
    pub selections: GroupSelections,
}

impl Ledger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transient entries still open: snapshots, trackers and pinned groups.
    ///
    /// Zero after every successful redemption.
    pub fn open_entries(&self) -> usize {
        self.locks.len() + self.trackers.len() + self.selections.len()
    }
}
