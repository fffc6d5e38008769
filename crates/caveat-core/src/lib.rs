//! # caveat-core — Foundational Types for Caveat Enforcement
//!
//! This crate defines the primitives every policy hook reads: addresses and
//! delegation hashes, execution modes and action payloads, packed terms,
//! token call data, delegation records, composite state keys, and the error
//! taxonomy. Every other crate in the workspace depends on `caveat-core`; it
//! depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for fixed-width identifiers.** `Address`,
//!    `DelegationHash` and `Word` are distinct types. No bare byte arrays
//!    cross a hook boundary.
//!
//! 2. **`CanonicalBytes` newtype.** All hashing (delegation identifiers,
//!    composite state keys) flows through `CanonicalBytes::new()`.
//!
//! 3. **Amounts are `u128`; identifiers are `Word`.** Amount words wider
//!    than 128 bits are rejected at decode time rather than truncated.
//!    Token ids and one-time ids keep all 32 bytes.
//!
//! 4. **`StateKey` is a pure function of its material.** Shared accounting
//!    state is addressed only through keys built by `StateKey::builder`.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `caveat-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod address;
pub mod calldata;
pub mod canonical;
pub mod delegation;
pub mod digest;
pub mod error;
pub mod execution;
pub mod holding;
pub mod terms;

// Re-export primary types for ergonomic imports.
pub use address::{Address, DelegationHash, Word, ANY_DELEGATE, ROOT_AUTHORITY};
pub use canonical::CanonicalBytes;
pub use delegation::{decode_permission_context, encode_permission_context, Caveat, Delegation};
pub use digest::{sha256_digest, KeyMaterial, StateKey};
pub use error::{CanonicalizationError, CodecError, EnforcerError, ErrorKind};
pub use execution::{CallType, ExecType, Execution, ExecutionMode};
pub use holding::Holding;
pub use terms::{PackedTerms, TermsWriter};
