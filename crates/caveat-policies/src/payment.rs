//! # Payment Enforcement
//!
//! "Pay for the right to redeem." After every action of the primary
//! redemption has run, the policy redeems a secondary *allowance* chain
//! supplied in args that transfers `amount` to `recipient`, and checks the
//! recipient actually received it.
//!
//! | Policy | Terms |
//! |---|---|
//! | `NativeTokenPaymentEnforcer` | `recipient(20) ‖ amount(32)` |
//! | `ERC20PaymentEnforcer` | `token(20) ‖ recipient(20) ‖ amount(32)` |
//!
//! Args: permission context (leaf-first) of the allowance chain.
//!
//! ## Security Invariant
//!
//! Before redeeming, the args of every `ArgsEqualityCheckEnforcer` caveat on
//! the allowance leaf are overwritten with [`payment_binding`] of the primary
//! delegation and redeemer. An allowance whose equality terms name that
//! binding can therefore only pay for that one primary redemption. Only the
//! configured delegation manager may trigger the hook, so nobody can make
//! the enforcer spend an allowance outside a redemption.

use caveat_core::calldata::encode_erc20_transfer;
use caveat_core::{
    decode_permission_context, encode_permission_context, Address, DelegationHash, EnforcerError,
    Execution, ExecutionMode, Holding, PackedTerms,
};
use caveat_enforcer::{CaveatEnforcer, HookCall, Runtime};

/// Bytes an allowance's `ArgsEqualityCheckEnforcer` terms must hold to be
/// usable only as payment for `delegation_hash` redeemed by `redeemer`.
pub fn payment_binding(delegation_hash: DelegationHash, redeemer: Address) -> Vec<u8> {
    let mut out = Vec::with_capacity(32 + 20);
    out.extend_from_slice(delegation_hash.as_bytes());
    out.extend_from_slice(redeemer.as_bytes());
    out
}

/// Decoded payment terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentTerms {
    /// ERC20 token; absent for native value.
    pub token: Option<Address>,
    /// Who must be paid.
    pub recipient: Address,
    /// Minimum received.
    pub amount: u128,
}

impl PaymentTerms {
    fn holding(&self) -> Holding {
        match self.token {
            Some(token) => Holding::Erc20 {
                token,
                holder: self.recipient,
            },
            None => Holding::Native {
                holder: self.recipient,
            },
        }
    }

    fn execution(&self) -> Execution {
        match self.token {
            Some(token) => Execution::new(token, 0, encode_erc20_transfer(self.recipient, self.amount)),
            None => Execution::new(self.recipient, self.amount, Vec::new()),
        }
    }
}

/// Payment enforcer for native value or an ERC20 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentEnforcer {
    erc20: bool,
    delegation_manager: Address,
    args_equality_enforcer: Address,
}

impl PaymentEnforcer {
    /// Native-value payments.
    pub fn native(delegation_manager: Address, args_equality_enforcer: Address) -> Self {
        Self {
            erc20: false,
            delegation_manager,
            args_equality_enforcer,
        }
    }

    /// ERC20 payments.
    pub fn erc20(delegation_manager: Address, args_equality_enforcer: Address) -> Self {
        Self {
            erc20: true,
            delegation_manager,
            args_equality_enforcer,
        }
    }

    /// The only caller allowed to trigger payment.
    pub fn delegation_manager(&self) -> Address {
        self.delegation_manager
    }

    /// Decode terms.
    pub fn decode_terms(&self, terms: &[u8]) -> Result<PaymentTerms, EnforcerError> {
        let policy = self.name();
        let malformed = |e: caveat_core::CodecError| e.attribute(policy, "invalid-terms-length");
        let expected = if self.erc20 { 72 } else { 52 };
        let mut reader = PackedTerms::exact(terms, expected).map_err(malformed)?;
        let token = if self.erc20 {
            Some(reader.address("token").map_err(malformed)?)
        } else {
            None
        };
        let recipient = reader.address("recipient").map_err(malformed)?;
        let amount = reader.word("amount").map_err(malformed)?;
        Ok(PaymentTerms {
            token,
            recipient,
            amount,
        })
    }
}

impl CaveatEnforcer for PaymentEnforcer {
    fn name(&self) -> &'static str {
        if self.erc20 {
            "ERC20PaymentEnforcer"
        } else {
            "NativeTokenPaymentEnforcer"
        }
    }

    fn after_all_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        if rt.caller != self.delegation_manager {
            return Err(EnforcerError::violation(self.name(), "only-delegation-manager"));
        }
        let terms = self.decode_terms(call.terms)?;

        let mut allowance = decode_permission_context(call.args)
            .map_err(|e| e.attribute(self.name(), "invalid-allowance-delegations"))?;
        let leaf = allowance
            .first_mut()
            .ok_or_else(|| EnforcerError::malformed(self.name(), "invalid-allowance-delegations"))?;
        let binding = payment_binding(call.delegation_hash, call.redeemer);
        for caveat in leaf
            .caveats
            .iter_mut()
            .filter(|caveat| caveat.enforcer == self.args_equality_enforcer)
        {
            caveat.args = binding.clone();
        }
        let context = encode_permission_context(&allowance)?;

        let holding = terms.holding();
        let before = rt.balance_of(&holding)?;
        rt.redeem_delegations(
            &[context],
            &[ExecutionMode::SINGLE_DEFAULT],
            &[terms.execution().encode_single()],
        )?;
        let after = rt.balance_of(&holding)?;

        let required = before
            .checked_add(terms.amount)
            .ok_or_else(|| EnforcerError::malformed(self.name(), "amount-overflow"))?;
        if after < required {
            return Err(EnforcerError::violation(self.name(), "payment-not-received"));
        }
        tracing::info!(
            policy = self.name(),
            delegation = %call.delegation_hash,
            recipient = %terms.recipient,
            amount = terms.amount,
            "payment settled"
        );
        Ok(())
    }
}
