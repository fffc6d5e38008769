//! # Streaming Allowances
//!
//! An allowance that unlocks over time up to a cap. Two accrual models are
//! separate policies because their curves are not interchangeable:
//!
//! - linear: `min(cap, initial + rate × max(0, now − start))`
//! - chunked: `min(cap, chunk × (1 + max(0, now − start) / (chunk / rate)))`,
//!   so the first chunk is spendable before `start`
//!
//! | Policy | Terms |
//! |---|---|
//! | `ERC20StreamingEnforcer` | `token(20) ‖ initial(32) ‖ cap(32) ‖ rate(32) ‖ start(32)` |
//! | `NativeTokenStreamingEnforcer` | `initial(32) ‖ cap(32) ‖ rate(32) ‖ start(32)` |
//! | `ERC20ChunkedStreamingEnforcer` | `token(20) ‖ chunk(32) ‖ cap(32) ‖ rate(32) ‖ start(32)` |
//! | `NativeTokenChunkedStreamingEnforcer` | `chunk(32) ‖ cap(32) ‖ rate(32) ‖ start(32)` |
//!
//! Keyed per (caller, delegation); the schedule is pinned at first use.

use caveat_core::{Address, DelegationHash, EnforcerError, PackedTerms, StateKey};
use caveat_enforcer::modes::only_single_default;
use caveat_enforcer::{CaveatEnforcer, HookCall, Runtime};
use caveat_state::{ChunkedStream, Ledger, LinearStream};

use crate::transfer::{erc20_transfer_amount, native_transfer_amount};

/// The four numeric fields shared by both layouts, after the optional token.
fn decode_fields(
    policy: &str,
    terms: &[u8],
    with_token: bool,
) -> Result<(Option<Address>, u128, u128, u128, u64), EnforcerError> {
    let expected = if with_token { 20 + 4 * 32 } else { 4 * 32 };
    let malformed = |e: caveat_core::CodecError| e.attribute(policy, "invalid-terms-length");
    let mut reader = PackedTerms::exact(terms, expected).map_err(malformed)?;
    let token = if with_token {
        Some(reader.address("token").map_err(malformed)?)
    } else {
        None
    };
    let first = reader.word("initial amount").map_err(malformed)?;
    let cap = reader.word("max amount").map_err(malformed)?;
    let rate = reader.word("amount per second").map_err(malformed)?;
    let start = reader.word_u64("start time").map_err(malformed)?;
    Ok((token, first, cap, rate, start))
}

fn streamed_amount(policy: &str, call: &HookCall<'_>, token: Option<Address>) -> Result<u128, EnforcerError> {
    match token {
        Some(token) => erc20_transfer_amount(policy, call, token),
        None => native_transfer_amount(policy, call),
    }
}

/// Linear streaming allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingEnforcer {
    erc20: bool,
}

impl StreamingEnforcer {
    /// Stream of the ERC20 token named in terms.
    pub fn erc20() -> Self {
        Self { erc20: true }
    }

    /// Stream of native value.
    pub fn native() -> Self {
        Self { erc20: false }
    }

    /// Decode `(token, schedule)`.
    pub fn decode_terms(&self, terms: &[u8]) -> Result<(Option<Address>, LinearStream), EnforcerError> {
        let (token, initial, cap, rate, start) = decode_fields(self.name(), terms, self.erc20)?;
        Ok((
            token,
            LinearStream {
                initial,
                cap,
                rate,
                start,
            },
        ))
    }

    /// Amount spendable under a delegation at `now`.
    pub fn available_amount(
        &self,
        ledger: &Ledger,
        this: Address,
        caller: Address,
        delegation_hash: DelegationHash,
        terms: &[u8],
        now: u64,
    ) -> Result<u128, EnforcerError> {
        let (_, schedule) = self.decode_terms(terms)?;
        let key = StateKey::builder(this, caller)
            .delegation(delegation_hash)
            .finish()?;
        Ok(ledger.linear_streams.available(&key, &schedule, now))
    }
}

impl CaveatEnforcer for StreamingEnforcer {
    fn name(&self) -> &'static str {
        if self.erc20 {
            "ERC20StreamingEnforcer"
        } else {
            "NativeTokenStreamingEnforcer"
        }
    }

    fn before_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        only_single_default(call.mode)?;
        let (token, schedule) = self.decode_terms(call.terms)?;
        let amount = streamed_amount(self.name(), call, token)?;
        let key = rt.key().delegation(call.delegation_hash).finish()?;
        let now = rt.now();
        let remaining = rt
            .ledger
            .linear_streams
            .consume(key, &schedule, now, amount)
            .map_err(|e| e.attribute(self.name()))?;
        tracing::debug!(policy = self.name(), delegation = %call.delegation_hash, amount, remaining, "streamed");
        Ok(())
    }
}

/// Chunked streaming allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedStreamingEnforcer {
    erc20: bool,
}

impl ChunkedStreamingEnforcer {
    /// Chunked stream of the ERC20 token named in terms.
    pub fn erc20() -> Self {
        Self { erc20: true }
    }

    /// Chunked stream of native value.
    pub fn native() -> Self {
        Self { erc20: false }
    }

    /// Decode `(token, schedule)`.
    pub fn decode_terms(&self, terms: &[u8]) -> Result<(Option<Address>, ChunkedStream), EnforcerError> {
        let (token, chunk, cap, rate, start) = decode_fields(self.name(), terms, self.erc20)?;
        Ok((
            token,
            ChunkedStream {
                chunk,
                cap,
                rate,
                start,
            },
        ))
    }

    /// Amount spendable under a delegation at `now`.
    pub fn available_amount(
        &self,
        ledger: &Ledger,
        this: Address,
        caller: Address,
        delegation_hash: DelegationHash,
        terms: &[u8],
        now: u64,
    ) -> Result<u128, EnforcerError> {
        let (_, schedule) = self.decode_terms(terms)?;
        let key = StateKey::builder(this, caller)
            .delegation(delegation_hash)
            .finish()?;
        Ok(ledger.chunked_streams.available(&key, &schedule, now))
    }
}

impl CaveatEnforcer for ChunkedStreamingEnforcer {
    fn name(&self) -> &'static str {
        if self.erc20 {
            "ERC20ChunkedStreamingEnforcer"
        } else {
            "NativeTokenChunkedStreamingEnforcer"
        }
    }

    fn before_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        only_single_default(call.mode)?;
        let (token, schedule) = self.decode_terms(call.terms)?;
        let amount = streamed_amount(self.name(), call, token)?;
        let key = rt.key().delegation(call.delegation_hash).finish()?;
        let now = rt.now();
        let remaining = rt
            .ledger
            .chunked_streams
            .consume(key, &schedule, now, amount)
            .map_err(|e| e.attribute(self.name()))?;
        tracing::debug!(policy = self.name(), delegation = %call.delegation_hash, amount, remaining, "chunk streamed");
        Ok(())
    }
}
