//! # Context Filters
//!
//! `before` checks over the redemption context rather than the action: the
//! time window, a per-delegation call budget, a one-time id, the redeemer,
//! and terms/args equality. None of them gate on the execution mode.

use caveat_core::terms::fixed_entries;
use caveat_core::{Address, EnforcerError, PackedTerms, Word};
use caveat_enforcer::{CaveatEnforcer, HookCall, Runtime};

/// Restricts redemption to a time window with strict bounds.
///
/// Terms: `after(16) ‖ before(16)`; zero means unbounded on that side.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampEnforcer;

impl TimestampEnforcer {
    /// Decode `(after, before)`.
    pub fn decode_terms(terms: &[u8]) -> Result<(u128, u128), EnforcerError> {
        let mut reader = PackedTerms::exact(terms, 32)
            .map_err(|e| e.attribute("TimestampEnforcer", "invalid-terms-length"))?;
        let after = reader
            .half_word("after")
            .map_err(|e| e.attribute("TimestampEnforcer", "invalid-terms-length"))?;
        let before = reader
            .half_word("before")
            .map_err(|e| e.attribute("TimestampEnforcer", "invalid-terms-length"))?;
        Ok((after, before))
    }
}

impl CaveatEnforcer for TimestampEnforcer {
    fn name(&self) -> &'static str {
        "TimestampEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        let (after, before) = Self::decode_terms(call.terms)?;
        let now = u128::from(rt.now());
        if after > 0 && now <= after {
            return Err(EnforcerError::violation(self.name(), "early-delegation"));
        }
        if before > 0 && now >= before {
            return Err(EnforcerError::violation(self.name(), "expired-delegation"));
        }
        Ok(())
    }
}

/// Limits how many times a delegation may be redeemed.
///
/// Terms: `limit(32)`. Counted per (caller, delegation).
#[derive(Debug, Clone, Copy, Default)]
pub struct LimitedCallsEnforcer;

impl LimitedCallsEnforcer {
    /// Decode the limit.
    pub fn decode_terms(terms: &[u8]) -> Result<u128, EnforcerError> {
        PackedTerms::exact(terms, 32)
            .and_then(|mut t| t.word("limit"))
            .map_err(|e| e.attribute("LimitedCallsEnforcer", "invalid-terms-length"))
    }
}

impl CaveatEnforcer for LimitedCallsEnforcer {
    fn name(&self) -> &'static str {
        "LimitedCallsEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        let limit = Self::decode_terms(call.terms)?;
        let key = rt.key().delegation(call.delegation_hash).finish()?;
        let count = rt
            .ledger
            .calls
            .increment(key, limit)
            .map_err(|e| e.attribute(self.name()))?;
        tracing::debug!(policy = self.name(), delegation = %call.delegation_hash, count, limit, "call counted");
        Ok(())
    }
}

/// One-time id: a delegator can redeem each id at most once across all of
/// their delegations.
///
/// Terms: `id(32)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdEnforcer;

impl IdEnforcer {
    /// Decode the id.
    pub fn decode_terms(terms: &[u8]) -> Result<Word, EnforcerError> {
        PackedTerms::exact(terms, 32)
            .and_then(|mut t| t.id_word("id"))
            .map_err(|e| e.attribute("IdEnforcer", "invalid-terms-length"))
    }

    /// Whether `id` was already used by `delegator` under `caller`.
    pub fn is_used(
        ledger: &caveat_state::Ledger,
        this: Address,
        caller: Address,
        delegator: Address,
        id: Word,
    ) -> Result<bool, EnforcerError> {
        let key = caveat_core::StateKey::builder(this, caller)
            .address(delegator)
            .id(id)
            .finish()?;
        Ok(ledger.ids.is_used(&key))
    }
}

impl CaveatEnforcer for IdEnforcer {
    fn name(&self) -> &'static str {
        "IdEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        let id = Self::decode_terms(call.terms)?;
        let key = rt.key().address(call.delegator).id(id).finish()?;
        rt.ledger
            .ids
            .consume(key)
            .map_err(|e| e.attribute(self.name()))?;
        tracing::debug!(policy = self.name(), delegator = %call.delegator, id = %id, "id consumed");
        Ok(())
    }
}

/// Restricts who may redeem.
///
/// Terms: `n × address(20)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedeemerEnforcer;

impl CaveatEnforcer for RedeemerEnforcer {
    fn name(&self) -> &'static str {
        "RedeemerEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, _rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        let mut entries = fixed_entries(call.terms, 20)
            .map_err(|e| e.attribute(self.name(), "invalid-terms-length"))?;
        if !entries.any(|entry| entry == call.redeemer.as_bytes()) {
            return Err(EnforcerError::violation(self.name(), "unauthorized-redeemer"));
        }
        Ok(())
    }
}

/// Requires the redeemer-supplied args to equal the terms.
///
/// Payment enforcers rewrite the args of this caveat to bind a payment
/// delegation to one specific redemption.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgsEqualityCheckEnforcer;

impl CaveatEnforcer for ArgsEqualityCheckEnforcer {
    fn name(&self) -> &'static str {
        "ArgsEqualityCheckEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, _rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        if call.terms != call.args {
            return Err(EnforcerError::violation(self.name(), "different-args-and-terms"));
        }
        Ok(())
    }
}
