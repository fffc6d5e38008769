//! # Per-Call Runtime
//!
//! A [`Runtime`] is what a hook can touch: its own address (`this`), the
//! address that invoked it (`caller`), the shared [`Ledger`], and the
//! [`Host`].
//!
//! ## Security Invariant
//!
//! `this` and `caller` are fixed by whoever constructs the runtime and are
//! the first two components of every composite key a policy derives through
//! [`Runtime::key`]. A policy invoked directly by the coordinator sees
//! `caller = coordinator`; a policy invoked by a composition enforcer through
//! [`Runtime::call_enforcer`] sees `caller = composition enforcer`. State
//! created in one context is therefore invisible to the other.

use caveat_core::{Address, EnforcerError, ExecutionMode, Holding, KeyMaterial, StateKey};
use caveat_state::Ledger;

use crate::host::Host;
use crate::traits::{CaveatEnforcer, Hook, HookCall};

/// Name used for failures raised by dispatch itself.
pub const DISPATCH_ORIGIN: &str = "EnforcerDispatch";

/// Execution context of one hook invocation.
pub struct Runtime<'a> {
    /// Address of the executing policy.
    pub this: Address,
    /// Address that invoked it.
    pub caller: Address,
    /// Shared accounting state.
    pub ledger: &'a mut Ledger,
    /// Environment.
    pub host: &'a mut dyn Host,
}

/// Saved state for [`Runtime::revert`].
#[derive(Debug)]
pub struct Checkpoint {
    ledger: Ledger,
    host: usize,
}

impl std::fmt::Debug for Runtime<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("this", &self.this)
            .field("caller", &self.caller)
            .finish_non_exhaustive()
    }
}

impl<'a> Runtime<'a> {
    /// Build a runtime for the policy at `this` invoked by `caller`.
    pub fn new(
        this: Address,
        caller: Address,
        ledger: &'a mut Ledger,
        host: &'a mut dyn Host,
    ) -> Self {
        Self {
            this,
            caller,
            ledger,
            host,
        }
    }

    /// Current timestamp.
    pub fn now(&self) -> u64 {
        self.host.timestamp()
    }

    /// Query the balance oracle.
    pub fn balance_of(&self, holding: &Holding) -> Result<u128, EnforcerError> {
        self.host.balance_of(holding)
    }

    /// Key material scoped to this policy and its caller.
    pub fn key(&self) -> KeyMaterial {
        StateKey::builder(self.this, self.caller)
    }

    /// Invoke `hook` on the policy at `enforcer`, with `this` as its caller.
    pub fn call_enforcer(
        &mut self,
        enforcer: Address,
        hook: Hook,
        call: &HookCall<'_>,
    ) -> Result<(), EnforcerError> {
        let policy = resolve(&*self.host, enforcer)?;
        tracing::trace!(enforcer = %enforcer, caller = %self.this, hook = %hook, "dispatch");
        let mut sub = Runtime {
            this: enforcer,
            caller: self.this,
            ledger: &mut *self.ledger,
            host: &mut *self.host,
        };
        hook.invoke(policy.as_ref(), call, &mut sub)
    }

    /// Save ledger and host state.
    pub fn checkpoint(&mut self) -> Checkpoint {
        Checkpoint {
            ledger: self.ledger.clone(),
            host: self.host.checkpoint(),
        }
    }

    /// Restore the state saved by `checkpoint`.
    pub fn revert(&mut self, checkpoint: Checkpoint) {
        *self.ledger = checkpoint.ledger;
        self.host.revert(checkpoint.host);
    }

    /// Keep everything done since `checkpoint`.
    pub fn commit(&mut self, checkpoint: Checkpoint) {
        self.host.commit(checkpoint.host);
    }

    /// Redeem delegations through the host with `this` as the redeemer.
    pub fn redeem_delegations(
        &mut self,
        permission_contexts: &[Vec<u8>],
        modes: &[ExecutionMode],
        execution_calldatas: &[Vec<u8>],
    ) -> Result<(), EnforcerError> {
        self.host.redeem_delegations(
            self.ledger,
            self.this,
            permission_contexts,
            modes,
            execution_calldatas,
        )
    }
}

fn resolve(
    host: &dyn Host,
    address: Address,
) -> Result<std::sync::Arc<dyn CaveatEnforcer>, EnforcerError> {
    host.enforcer_at(&address)
        .ok_or_else(|| EnforcerError::external(DISPATCH_ORIGIN, format!("unknown-enforcer {address}")))
}

/// Run `hook` for the policy at `enforcer` as invoked by `caller`.
///
/// Entry point for coordinators.
pub fn dispatch(
    ledger: &mut Ledger,
    host: &mut dyn Host,
    caller: Address,
    enforcer: Address,
    hook: Hook,
    call: &HookCall<'_>,
) -> Result<(), EnforcerError> {
    let policy = resolve(&*host, enforcer)?;
    tracing::trace!(enforcer = %enforcer, caller = %caller, hook = %hook, "dispatch");
    let mut rt = Runtime::new(enforcer, caller, ledger, host);
    hook.invoke(policy.as_ref(), call, &mut rt)
}
