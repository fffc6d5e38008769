//! # caveat-policies — Concrete Caveat Enforcers
//!
//! Every built-in policy a delegator can attach to a delegation. Each one
//! implements [`caveat_enforcer::CaveatEnforcer`], overriding only the hooks
//! it enforces, and keeps its accounting in the shared
//! [`caveat_state::Ledger`] under keys derived through its runtime.
//!
//! ## Architecture
//!
//! - **Call filters** (`call_filters.rs`): allowed targets, methods and
//!   calldata, exact calldata, value ceiling.
//!
//! - **Context filters** (`context_filters.rs`): time window, call limit,
//!   one-time id, redeemer allow-list, args equality.
//!
//! - **Balance change** (`balance_change.rs`): per-delegation
//!   lock-and-snapshot guardrails and chain-wide aggregating guardrails for
//!   native, ERC20, ERC721 and ERC1155 positions.
//!
//! - **Periodic** (`periodic.rs`) and **Streaming** (`streaming.rs`):
//!   time-based transfer allowances with read-only availability views.
//!
//! - **Logical OR** (`logical_or.rs`): trust-the-selector and try-all
//!   compositions over groups of sub-policies.
//!
//! - **Payment** (`payment.rs`): pay-to-redeem settlement through a nested
//!   redemption.
//!
//! - **Registry** (`registry.rs`): address-to-policy map built from a YAML
//!   deployment manifest.
//!
//! ## Crate Policy
//!
//! - Every error is `"<PolicyName>:<reason>"` with a category from
//!   [`caveat_core::ErrorKind`].
//! - Terms are validated before any state is touched.
//! - Policies hold no interior state; everything mutable lives in the ledger
//!   or the host.

pub mod balance_change;
pub mod call_filters;
pub mod context_filters;
pub mod logical_or;
pub mod payment;
pub mod periodic;
pub mod registry;
pub mod streaming;

mod transfer;

#[cfg(test)]
mod testing;

pub use balance_change::{
    AssetStandard, BalanceChangeEnforcer, BalanceChangeTerms, TotalBalanceChangeEnforcer,
};
pub use call_filters::{
    AllowedCalldataEnforcer, AllowedMethodsEnforcer, AllowedTargetsEnforcer, ExactCalldataEnforcer,
    ValueLteEnforcer,
};
pub use context_filters::{
    ArgsEqualityCheckEnforcer, IdEnforcer, LimitedCallsEnforcer, RedeemerEnforcer, TimestampEnforcer,
};
pub use logical_or::{
    encode_groups, encode_selection, AnyOfGroupsEnforcer, CaveatGroup, LogicalOrWrapperEnforcer,
    SelectedGroup,
};
pub use payment::{payment_binding, PaymentEnforcer, PaymentTerms};
pub use periodic::{PeriodTransferEnforcer, PeriodTransferTerms};
pub use registry::{DeploymentManifest, EnforcerKind, EnforcerRegistry, ManifestEntry, RegistryError};
pub use streaming::{ChunkedStreamingEnforcer, StreamingEnforcer};
