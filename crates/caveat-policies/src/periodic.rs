//! # Periodic Transfer Allowances
//!
//! A quota of an asset that refills every `duration` seconds from `start`.
//!
//! | Policy | Terms |
//! |---|---|
//! | `ERC20PeriodTransferEnforcer` | `token(20) ‖ quota(32) ‖ duration(32) ‖ start(32)` |
//! | `NativeTokenPeriodTransferEnforcer` | `quota(32) ‖ duration(32) ‖ start(32)` |
//!
//! The allowance is keyed per (caller, delegation) and its terms are pinned
//! at first use. Both accept single-action, default-mode redemptions only.

use caveat_core::{Address, DelegationHash, EnforcerError, PackedTerms, StateKey};
use caveat_enforcer::modes::only_single_default;
use caveat_enforcer::{CaveatEnforcer, HookCall, Runtime};
use caveat_state::{Ledger, PeriodAvailability, PeriodTerms};

use crate::transfer::{erc20_transfer_amount, native_transfer_amount};

/// Which asset the allowance meters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Metered {
    Erc20,
    Native,
}

/// Decoded periodic-allowance terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodTransferTerms {
    /// Token contract; absent for native value.
    pub token: Option<Address>,
    /// Quota, period length and start.
    pub period: PeriodTerms,
}

/// Periodic allowance over ERC20 `transfer` amounts or native value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodTransferEnforcer {
    metered: Metered,
}

impl PeriodTransferEnforcer {
    /// Allowance over ERC20 transfers of the token named in terms.
    pub fn erc20() -> Self {
        Self {
            metered: Metered::Erc20,
        }
    }

    /// Allowance over native value.
    pub fn native() -> Self {
        Self {
            metered: Metered::Native,
        }
    }

    fn terms_len(&self) -> usize {
        match self.metered {
            Metered::Erc20 => 116,
            Metered::Native => 96,
        }
    }

    /// Decode terms.
    pub fn decode_terms(&self, terms: &[u8]) -> Result<PeriodTransferTerms, EnforcerError> {
        let policy = self.name();
        let malformed = |e: caveat_core::CodecError| e.attribute(policy, "invalid-terms-length");
        let mut reader = PackedTerms::exact(terms, self.terms_len()).map_err(malformed)?;
        let token = match self.metered {
            Metered::Erc20 => Some(reader.address("token").map_err(malformed)?),
            Metered::Native => None,
        };
        let quota = reader.word("period amount").map_err(malformed)?;
        let duration = reader.word_u64("period duration").map_err(malformed)?;
        let start = reader.word_u64("start date").map_err(malformed)?;
        Ok(PeriodTransferTerms {
            token,
            period: PeriodTerms {
                quota,
                duration,
                start,
            },
        })
    }

    /// Availability for a delegation at `now` without consuming anything.
    ///
    /// `this` is the address the policy is deployed at and `caller` the
    /// coordinator that invokes it.
    pub fn available_amount(
        &self,
        ledger: &Ledger,
        this: Address,
        caller: Address,
        delegation_hash: DelegationHash,
        terms: &[u8],
        now: u64,
    ) -> Result<PeriodAvailability, EnforcerError> {
        let decoded = self.decode_terms(terms)?;
        let key = StateKey::builder(this, caller)
            .delegation(delegation_hash)
            .finish()?;
        Ok(ledger.periods.available(&key, &decoded.period, now))
    }
}

impl CaveatEnforcer for PeriodTransferEnforcer {
    fn name(&self) -> &'static str {
        match self.metered {
            Metered::Erc20 => "ERC20PeriodTransferEnforcer",
            Metered::Native => "NativeTokenPeriodTransferEnforcer",
        }
    }

    fn before_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        only_single_default(call.mode)?;
        let terms = self.decode_terms(call.terms)?;
        let amount = match terms.token {
            Some(token) => erc20_transfer_amount(self.name(), call, token)?,
            None => native_transfer_amount(self.name(), call)?,
        };
        let key = rt.key().delegation(call.delegation_hash).finish()?;
        let now = rt.now();
        let view = rt
            .ledger
            .periods
            .consume(key, &terms.period, now, amount)
            .map_err(|e| e.attribute(self.name()))?;
        tracing::debug!(
            policy = self.name(),
            delegation = %call.delegation_hash,
            period = view.current_period,
            amount,
            available = view.available,
            "transferred in period"
        );
        Ok(())
    }
}
