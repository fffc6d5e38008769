//! # caveat-enforcer — Policy Lifecycle Protocol
//!
//! Defines the contract between a redemption coordinator and the policies
//! attached to delegations.
//!
//! ## Architecture
//!
//! - **Traits** (`traits.rs`): the four-hook [`CaveatEnforcer`] trait, the
//!   [`HookCall`] argument bundle, and the [`Hook`] selector used to forward
//!   any hook generically.
//!
//! - **Runtime** (`runtime.rs`): per-invocation context. Carries the
//!   policy's own address and its caller (the first two components of every
//!   composite key), the shared ledger, and the host. Sub-policy dispatch and
//!   checkpoint/revert live here.
//!
//! - **Host** (`host.rs`): capabilities supplied by the environment (clock,
//!   balance oracle, enforcer lookup, nested redemption, journaling).
//!
//! - **Modes** (`modes.rs`): execution-mode gates.
//!
//! - **Mock** (`mock.rs`, feature `mock`): an in-memory host for unit tests.
//!
//! ## Crate Policy
//!
//! - Depends on `caveat-core` and `caveat-state` internally.
//! - No `unsafe`.

pub mod host;
#[cfg(feature = "mock")]
pub mod mock;
pub mod modes;
pub mod runtime;
pub mod traits;

pub use host::Host;
#[cfg(feature = "mock")]
pub use mock::MockHost;
pub use runtime::{dispatch, Checkpoint, Runtime};
pub use traits::{CaveatEnforcer, Hook, HookCall};
