//! # Chain
//!
//! The environment policies run in: clock, token world, deployed policies,
//! and the delegation coordinator that redeems permission contexts.
//!
//! ## Redemption
//!
//! For a batch of `(permission context, mode, payload)` triples redeemed by
//! `redeemer`:
//!
//! 1. Every chain is decoded and validated: the leaf delegate is the
//!    redeemer or [`ANY_DELEGATE`]; each delegation's authority is the hash
//!    of its parent (the root's is [`ROOT_AUTHORITY`]); each parent's
//!    delegate is its child's delegator.
//! 2. `beforeAll` for every caveat, batch by batch, root to leaf.
//! 3. Per batch: `before` root to leaf, the actions executed from the root
//!    delegator's account, then `after` leaf to root.
//! 4. `afterAll` for every caveat, batch by batch, leaf to root.
//!
//! An empty permission context executes directly from the redeemer's
//! account with no hooks. In try mode a failing action is logged and
//! skipped; in default mode it aborts the redemption.
//!
//! ## Security Invariant
//!
//! Policies are always dispatched with the chain's coordinator address as
//! caller, including during nested redemptions, so payment enforcers can
//! recognise it and accounting keys stay in the coordinator's context.

use std::sync::Arc;

use caveat_core::{
    decode_permission_context, Address, DelegationHash, Delegation, EnforcerError, ExecType,
    ExecutionMode, Holding, ANY_DELEGATE, ROOT_AUTHORITY,
};
use caveat_enforcer::{dispatch, CaveatEnforcer, Hook, HookCall, Host};
use caveat_policies::EnforcerRegistry;
use caveat_state::Ledger;

use crate::world::TokenWorld;

/// Origin of coordinator-raised failures.
pub const COORDINATOR_ORIGIN: &str = "DelegationManager";

/// One decoded, validated entry of a redemption batch.
struct Batch<'a> {
    chain: Vec<Delegation>,
    hashes: Vec<DelegationHash>,
    mode: ExecutionMode,
    payload: &'a [u8],
}

/// Clock, token world and deployed policies.
#[derive(Debug)]
pub struct Chain {
    /// Coordinator address; the caller every policy sees.
    pub delegation_manager: Address,
    /// Current block timestamp.
    pub now: u64,
    /// Balances and ownership.
    pub world: TokenWorld,
    registry: EnforcerRegistry,
    journal: Vec<TokenWorld>,
}

impl Chain {
    /// A chain at `now` with the policies in `registry`.
    pub fn new(delegation_manager: Address, registry: EnforcerRegistry, now: u64) -> Self {
        Self {
            delegation_manager,
            now,
            world: TokenWorld::new(),
            registry,
            journal: Vec::new(),
        }
    }

    /// Deployed policies.
    pub fn registry(&self) -> &EnforcerRegistry {
        &self.registry
    }

    /// Deploy another policy.
    pub fn deploy(
        &mut self,
        address: Address,
        enforcer: Arc<dyn CaveatEnforcer>,
    ) -> Result<(), caveat_policies::RegistryError> {
        self.registry.register(address, enforcer)
    }

    fn validate<'a>(
        redeemer: Address,
        context: &[u8],
        mode: ExecutionMode,
        payload: &'a [u8],
    ) -> Result<Batch<'a>, EnforcerError> {
        let chain = decode_permission_context(context)
            .map_err(|e| e.attribute(COORDINATOR_ORIGIN, "invalid-permission-context"))?;
        let mut hashes = Vec::with_capacity(chain.len());
        for delegation in &chain {
            hashes.push(delegation.hash()?);
        }
        if let Some(leaf) = chain.first() {
            if leaf.delegate != redeemer && leaf.delegate != ANY_DELEGATE {
                return Err(EnforcerError::violation(COORDINATOR_ORIGIN, "invalid-delegate"));
            }
        }
        for (index, delegation) in chain.iter().enumerate() {
            let expected = hashes.get(index + 1).copied().unwrap_or(ROOT_AUTHORITY);
            if delegation.authority != expected {
                return Err(EnforcerError::violation(COORDINATOR_ORIGIN, "invalid-authority"));
            }
            if let Some(parent) = chain.get(index + 1) {
                if parent.delegate != delegation.delegator {
                    return Err(EnforcerError::violation(COORDINATOR_ORIGIN, "invalid-delegate"));
                }
            }
        }
        Ok(Batch {
            chain,
            hashes,
            mode,
            payload,
        })
    }

    /// Run `hook` for every caveat of `batch`, visiting delegations in
    /// `order` (indices into the leaf-first chain).
    fn run_hooks(
        &mut self,
        ledger: &mut Ledger,
        redeemer: Address,
        batch: &Batch<'_>,
        hook: Hook,
        order: impl Iterator<Item = usize>,
    ) -> Result<(), EnforcerError> {
        for index in order {
            let delegation = &batch.chain[index];
            for caveat in &delegation.caveats {
                let call = HookCall {
                    terms: &caveat.terms,
                    args: &caveat.args,
                    mode: batch.mode,
                    execution_calldata: batch.payload,
                    delegation_hash: batch.hashes[index],
                    delegator: delegation.delegator,
                    redeemer,
                };
                let manager = self.delegation_manager;
                dispatch(ledger, self, manager, caveat.enforcer, hook, &call)?;
            }
        }
        Ok(())
    }

    fn execute(&mut self, account: Address, batch: &Batch<'_>) -> Result<(), EnforcerError> {
        let actions = caveat_core::execution::decode_executions(batch.mode.call_type, batch.payload)
            .map_err(|e| e.attribute(COORDINATOR_ORIGIN, "invalid-execution-calldata"))?;
        for action in &actions {
            match self.world.execute(account, action) {
                Ok(()) => {}
                Err(err) if batch.mode.exec_type == ExecType::Try => {
                    tracing::warn!(account = %account, target = %action.target, error = %err, "action failed in try mode");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    fn redeem(
        &mut self,
        ledger: &mut Ledger,
        redeemer: Address,
        permission_contexts: &[Vec<u8>],
        modes: &[ExecutionMode],
        execution_calldatas: &[Vec<u8>],
    ) -> Result<(), EnforcerError> {
        if permission_contexts.len() != modes.len() || modes.len() != execution_calldatas.len() {
            return Err(EnforcerError::malformed(COORDINATOR_ORIGIN, "batch-size-mismatch"));
        }
        let batches = permission_contexts
            .iter()
            .zip(modes)
            .zip(execution_calldatas)
            .map(|((context, mode), payload)| Self::validate(redeemer, context, *mode, payload))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(redeemer = %redeemer, batches = batches.len(), "redemption started");

        for batch in &batches {
            let len = batch.chain.len();
            self.run_hooks(ledger, redeemer, batch, Hook::BeforeAll, (0..len).rev())?;
        }
        for batch in &batches {
            let len = batch.chain.len();
            let Some(root) = batch.chain.last() else {
                self.execute(redeemer, batch)?;
                continue;
            };
            let account = root.delegator;
            self.run_hooks(ledger, redeemer, batch, Hook::Before, (0..len).rev())?;
            self.execute(account, batch)?;
            self.run_hooks(ledger, redeemer, batch, Hook::After, 0..len)?;
        }
        for batch in &batches {
            let len = batch.chain.len();
            self.run_hooks(ledger, redeemer, batch, Hook::AfterAll, 0..len)?;
        }

        tracing::debug!(redeemer = %redeemer, "redemption finished");
        Ok(())
    }
}

impl Host for Chain {
    fn timestamp(&self) -> u64 {
        self.now
    }

    fn balance_of(&self, holding: &Holding) -> Result<u128, EnforcerError> {
        Ok(self.world.balance_of(holding))
    }

    fn enforcer_at(&self, address: &Address) -> Option<Arc<dyn CaveatEnforcer>> {
        self.registry.get(address)
    }

    fn redeem_delegations(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        permission_contexts: &[Vec<u8>],
        modes: &[ExecutionMode],
        execution_calldatas: &[Vec<u8>],
    ) -> Result<(), EnforcerError> {
        self.redeem(ledger, caller, permission_contexts, modes, execution_calldatas)
    }

    fn checkpoint(&mut self) -> usize {
        self.journal.push(self.world.clone());
        self.journal.len() - 1
    }

    fn revert(&mut self, id: usize) {
        if id < self.journal.len() {
            self.journal.truncate(id + 1);
            if let Some(saved) = self.journal.pop() {
                self.world = saved;
            }
        }
    }

    fn commit(&mut self, id: usize) {
        self.journal.truncate(id);
    }
}
