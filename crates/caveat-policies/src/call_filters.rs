//! # Call Filters
//!
//! Stateless `before` checks over the single action being executed: its
//! target, its method selector, a slice of its call data, its full call
//! data, and its attached value. All require single/default mode.

use caveat_core::calldata::selector;
use caveat_core::terms::fixed_entries;
use caveat_core::{Address, EnforcerError, PackedTerms};
use caveat_enforcer::modes::only_single_default;
use caveat_enforcer::{CaveatEnforcer, HookCall, Runtime};

/// Restricts the action target to an allow-list.
///
/// Terms: `n × address(20)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowedTargetsEnforcer;

impl AllowedTargetsEnforcer {
    /// Decode the allow-list.
    pub fn decode_terms(terms: &[u8]) -> Result<Vec<Address>, EnforcerError> {
        fixed_entries(terms, 20)
            .map_err(|e| e.attribute("AllowedTargetsEnforcer", "invalid-terms-length"))?
            .map(|chunk| {
                Address::from_slice(chunk)
                    .map_err(|e| e.attribute("AllowedTargetsEnforcer", "invalid-terms-length"))
            })
            .collect()
    }
}

impl CaveatEnforcer for AllowedTargetsEnforcer {
    fn name(&self) -> &'static str {
        "AllowedTargetsEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, _rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        only_single_default(call.mode)?;
        let allowed = Self::decode_terms(call.terms)?;
        let exec = call.single_execution(self.name())?;
        if !allowed.contains(&exec.target) {
            return Err(EnforcerError::violation(self.name(), "target-address-not-allowed"));
        }
        Ok(())
    }
}

/// Restricts the action's method selector to an allow-list.
///
/// Terms: `n × selector(4)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowedMethodsEnforcer;

impl AllowedMethodsEnforcer {
    /// Decode the allow-list.
    pub fn decode_terms(terms: &[u8]) -> Result<Vec<[u8; 4]>, EnforcerError> {
        let entries = fixed_entries(terms, 4)
            .map_err(|e| e.attribute("AllowedMethodsEnforcer", "invalid-terms-length"))?;
        Ok(entries
            .map(|chunk| [chunk[0], chunk[1], chunk[2], chunk[3]])
            .collect())
    }
}

impl CaveatEnforcer for AllowedMethodsEnforcer {
    fn name(&self) -> &'static str {
        "AllowedMethodsEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, _rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        only_single_default(call.mode)?;
        let allowed = Self::decode_terms(call.terms)?;
        let exec = call.single_execution(self.name())?;
        let method = selector(exec.calldata)
            .ok_or_else(|| EnforcerError::malformed(self.name(), "invalid-execution-data-length"))?;
        if !allowed.contains(&method) {
            return Err(EnforcerError::violation(self.name(), "method-not-allowed"));
        }
        Ok(())
    }
}

/// Requires a slice of the call data to equal an expected value.
///
/// Terms: `start(32) ‖ expected`, expected non-empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowedCalldataEnforcer;

impl AllowedCalldataEnforcer {
    /// Decode `(start, expected)`.
    pub fn decode_terms(terms: &[u8]) -> Result<(usize, &[u8]), EnforcerError> {
        if terms.len() <= 32 {
            return Err(EnforcerError::malformed("AllowedCalldataEnforcer", "invalid-terms-size"));
        }
        let mut reader = PackedTerms::new(terms);
        let start = reader
            .word_u64("start")
            .map_err(|e| e.attribute("AllowedCalldataEnforcer", "invalid-terms-size"))?;
        let start = usize::try_from(start)
            .map_err(|_| EnforcerError::malformed("AllowedCalldataEnforcer", "invalid-terms-size"))?;
        Ok((start, reader.rest()))
    }
}

impl CaveatEnforcer for AllowedCalldataEnforcer {
    fn name(&self) -> &'static str {
        "AllowedCalldataEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, _rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        only_single_default(call.mode)?;
        let (start, expected) = Self::decode_terms(call.terms)?;
        let exec = call.single_execution(self.name())?;
        let actual = start
            .checked_add(expected.len())
            .and_then(|end| exec.calldata.get(start..end));
        if actual != Some(expected) {
            return Err(EnforcerError::violation(self.name(), "invalid-calldata"));
        }
        Ok(())
    }
}

/// Requires the call data to equal the terms exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactCalldataEnforcer;

impl CaveatEnforcer for ExactCalldataEnforcer {
    fn name(&self) -> &'static str {
        "ExactCalldataEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, _rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        only_single_default(call.mode)?;
        let exec = call.single_execution(self.name())?;
        if exec.calldata != call.terms {
            return Err(EnforcerError::violation(self.name(), "invalid-calldata"));
        }
        Ok(())
    }
}

/// Caps the native value attached to the action.
///
/// Terms: `max(32)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueLteEnforcer;

impl ValueLteEnforcer {
    /// Decode the cap.
    pub fn decode_terms(terms: &[u8]) -> Result<u128, EnforcerError> {
        PackedTerms::exact(terms, 32)
            .and_then(|mut t| t.word("max value"))
            .map_err(|e| e.attribute("ValueLteEnforcer", "invalid-terms-length"))
    }
}

impl CaveatEnforcer for ValueLteEnforcer {
    fn name(&self) -> &'static str {
        "ValueLteEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, _rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        only_single_default(call.mode)?;
        let max = Self::decode_terms(call.terms)?;
        let exec = call.single_execution(self.name())?;
        if exec.value > max {
            return Err(EnforcerError::violation(self.name(), "value-too-high"));
        }
        Ok(())
    }
}
