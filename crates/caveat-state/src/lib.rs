//! # caveat-state — Accounting Primitives
//!
//! Explicit key-value tables for all mutable policy state. Every table is
//! keyed by a [`caveat_core::StateKey`] derived by the calling policy, and
//! every operation is a pure function of the table, the key, and the values
//! passed in (the current time and measured quantities come from the caller).
//!
//! ## Tables
//!
//! - **Snapshot locks** (`lock.rs`): lock-and-snapshot pairing for per-action
//!   balance guardrails.
//!
//! - **Balance trackers** (`tracker.rs`): aggregated net-change requirements
//!   shared by the delegations of one chain, validated once all contributors
//!   report.
//!
//! - **Periodic allowances** (`periodic.rs`): quotas that reset every period.
//!
//! - **Streaming allowances** (`streaming.rs`): linear and chunked accrual up
//!   to a cap.
//!
//! - **Counters** (`counters.rs`): call counts, one-time ids, pinned group
//!   selections.
//!
//! ## Design
//!
//! Failed operations leave the table unchanged: each operation computes the
//! new entry on a copy and writes it back only on success. The [`Ledger`]
//! owns one instance of every table and is `Clone`, so a coordinator can
//! restore it wholesale when a redemption aborts.

pub mod counters;
pub mod error;
pub mod ledger;
pub mod lock;
pub mod periodic;
pub mod streaming;
pub mod tracker;

pub use counters::{CallCounter, GroupSelections, UsedIds};
pub use error::AccountingError;
pub use ledger::Ledger;
pub use lock::{check_delta, Direction, SnapshotLocks};
pub use periodic::{PeriodAvailability, PeriodTable, PeriodTerms, PeriodicAllowance};
pub use streaming::{ChunkedStream, LinearStream, Stream, StreamTable, UnlockSchedule};
pub use tracker::{BalanceTracker, Contribution, Settlement, TrackerTable};
