//! Shared fixtures for policy unit tests.

use caveat_core::{Address, DelegationHash, EnforcerError, ExecutionMode};
use caveat_enforcer::{CaveatEnforcer, Hook, HookCall, MockHost, Runtime};
use caveat_state::Ledger;

pub(crate) fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

pub(crate) const COORDINATOR: u64 = 0xdd;
pub(crate) const THIS: u64 = 0xee;
pub(crate) const DELEGATOR: u64 = 1;
pub(crate) const REDEEMER: u64 = 2;

pub(crate) fn delegation_hash() -> DelegationHash {
    DelegationHash([0x11; 32])
}

/// A single/default call from `DELEGATOR` redeemed by `REDEEMER`.
pub(crate) fn hook_call<'a>(terms: &'a [u8], args: &'a [u8], payload: &'a [u8]) -> HookCall<'a> {
    HookCall {
        terms,
        args,
        mode: ExecutionMode::SINGLE_DEFAULT,
        execution_calldata: payload,
        delegation_hash: delegation_hash(),
        delegator: addr(DELEGATOR),
        redeemer: addr(REDEEMER),
    }
}

/// Mock host plus ledger, running policies as `THIS` invoked by `COORDINATOR`.
pub(crate) struct Fixture {
    pub host: MockHost,
    pub ledger: Ledger,
    pub this: Address,
    pub caller: Address,
}

impl Fixture {
    pub(crate) fn at(now: u64) -> Self {
        Self {
            host: MockHost::at(now),
            ledger: Ledger::new(),
            this: addr(THIS),
            caller: addr(COORDINATOR),
        }
    }

    pub(crate) fn run(
        &mut self,
        policy: &dyn CaveatEnforcer,
        hook: Hook,
        call: &HookCall<'_>,
    ) -> Result<(), EnforcerError> {
        let mut rt = Runtime::new(self.this, self.caller, &mut self.ledger, &mut self.host);
        hook.invoke(policy, call, &mut rt)
    }
}
