//! # Policy Trait
//!
//! Every policy implements [`CaveatEnforcer`]: four lifecycle hooks, each a
//! no-op by default. A coordinator redeeming a batch of delegations calls
//!
//! ```text
//! beforeAll (every caveat) → { before → action → after } per action → afterAll (every caveat)
//! ```
//!
//! and aborts the whole redemption on the first error. The `...All` hooks
//! observe the start and end of the whole redemption; the per-action hooks
//! observe one action's boundary.
//!
//! ## Security Invariant
//!
//! Hooks receive terms, args and call context by shared reference and may
//! only mutate state through the [`Runtime`] they are handed. The trait
//! requires `Send + Sync` so a registry can share one instance across
//! concurrent coordinators.

use std::fmt::Debug;

use caveat_core::execution::{decode_executions, decode_single, SingleExecution};
use caveat_core::{Address, DelegationHash, EnforcerError, Execution, ExecutionMode};

use crate::runtime::Runtime;

/// The arguments every hook receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookCall<'a> {
    /// Delegator-authored policy parameters.
    pub terms: &'a [u8],
    /// Redeemer-supplied runtime arguments.
    pub args: &'a [u8],
    /// Call shape and execution semantics.
    pub mode: ExecutionMode,
    /// Encoded action payload (single or batch, per `mode`).
    pub execution_calldata: &'a [u8],
    /// Identifier of the delegation carrying this caveat.
    pub delegation_hash: DelegationHash,
    /// Principal of that delegation.
    pub delegator: Address,
    /// Agent redeeming it.
    pub redeemer: Address,
}

impl<'a> HookCall<'a> {
    /// The same call context with different terms and args, for forwarding
    /// to a sub-policy.
    pub fn with_caveat<'b>(&self, terms: &'b [u8], args: &'b [u8]) -> HookCall<'b>
    where
        'a: 'b,
    {
        HookCall {
            terms,
            args,
            ..*self
        }
    }

    /// Decode the payload as a single execution, attributing failures to
    /// `policy`.
    pub fn single_execution(&self, policy: &str) -> Result<SingleExecution<'a>, EnforcerError> {
        decode_single(self.execution_calldata)
            .map_err(|e| e.attribute(policy, "invalid-execution-calldata"))
    }

    /// Decode the payload into owned executions of either shape.
    pub fn executions(&self, policy: &str) -> Result<Vec<Execution>, EnforcerError> {
        decode_executions(self.mode.call_type, self.execution_calldata)
            .map_err(|e| e.attribute(policy, "invalid-execution-calldata"))
    }
}

/// A pluggable policy.
pub trait CaveatEnforcer: Debug + Send + Sync {
    /// Name used as the prefix of every error this policy raises.
    fn name(&self) -> &'static str;

    /// Runs once per redemption before any action executes.
    fn before_all_hook(
        &self,
        _call: &HookCall<'_>,
        _rt: &mut Runtime<'_>,
    ) -> Result<(), EnforcerError> {
        Ok(())
    }

    /// Runs immediately before each action.
    fn before_hook(&self, _call: &HookCall<'_>, _rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        Ok(())
    }

    /// Runs immediately after each action.
    fn after_hook(&self, _call: &HookCall<'_>, _rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        Ok(())
    }

    /// Runs once per redemption after every action completed.
    fn after_all_hook(
        &self,
        _call: &HookCall<'_>,
        _rt: &mut Runtime<'_>,
    ) -> Result<(), EnforcerError> {
        Ok(())
    }
}

/// One of the four lifecycle points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// Before any action.
    BeforeAll,
    /// Before one action.
    Before,
    /// After one action.
    After,
    /// After every action.
    AfterAll,
}

impl Hook {
    /// All hooks in lifecycle order.
    pub const ALL: [Hook; 4] = [Hook::BeforeAll, Hook::Before, Hook::After, Hook::AfterAll];

    /// Dispatch this hook on `enforcer`.
    pub fn invoke(
        self,
        enforcer: &dyn CaveatEnforcer,
        call: &HookCall<'_>,
        rt: &mut Runtime<'_>,
    ) -> Result<(), EnforcerError> {
        match self {
            Self::BeforeAll => enforcer.before_all_hook(call, rt),
            Self::Before => enforcer.before_hook(call, rt),
            Self::After => enforcer.after_hook(call, rt),
            Self::AfterAll => enforcer.after_all_hook(call, rt),
        }
    }

    /// Whether this hook runs after actions execute.
    pub fn is_after(&self) -> bool {
        matches!(self, Self::After | Self::AfterAll)
    }
}

impl std::fmt::Display for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::BeforeAll => "beforeAllHook",
            Self::Before => "beforeHook",
            Self::After => "afterHook",
            Self::AfterAll => "afterAllHook",
        })
    }
}
