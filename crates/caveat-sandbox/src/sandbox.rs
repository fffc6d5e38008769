//! # Sandbox
//!
//! A [`Chain`] plus the shared [`Ledger`], with all-or-nothing redemption:
//! if any hook or action fails, the world and every accounting table are
//! restored to their state before the call.

use caveat_core::{
    encode_permission_context, Address, Delegation, EnforcerError, Execution, ExecutionMode,
};
use caveat_enforcer::Host;
use caveat_policies::{DeploymentManifest, EnforcerRegistry, RegistryError};
use caveat_state::Ledger;
use thiserror::Error;

use crate::chain::Chain;
use crate::world::TokenWorld;

/// Errors setting up a sandbox.
#[derive(Error, Debug)]
pub enum SandboxError {
    /// The deployment manifest could not be loaded.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Coordinator, token world and ledger.
#[derive(Debug)]
pub struct Sandbox {
    chain: Chain,
    ledger: Ledger,
}

impl Sandbox {
    /// A sandbox whose coordinator is `delegation_manager`.
    pub fn new(delegation_manager: Address, registry: EnforcerRegistry, now: u64) -> Self {
        Self {
            chain: Chain::new(delegation_manager, registry, now),
            ledger: Ledger::new(),
        }
    }

    /// A sandbox configured from a YAML deployment manifest.
    pub fn from_manifest(yaml: &str, now: u64) -> Result<Self, SandboxError> {
        let manifest = DeploymentManifest::from_yaml(yaml)?;
        let registry = EnforcerRegistry::from_manifest(&manifest)?;
        Ok(Self::new(manifest.delegation_manager, registry, now))
    }

    /// The chain.
    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Mutable chain, for deploying policies and setting the clock.
    pub fn chain_mut(&mut self) -> &mut Chain {
        &mut self.chain
    }

    /// The token world.
    pub fn world(&self) -> &TokenWorld {
        &self.chain.world
    }

    /// Mutable token world, for minting.
    pub fn world_mut(&mut self) -> &mut TokenWorld {
        &mut self.chain.world
    }

    /// Accounting state.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Set the clock.
    pub fn set_time(&mut self, now: u64) {
        self.chain.now = now;
    }

    /// Advance the clock.
    pub fn advance(&mut self, seconds: u64) {
        self.chain.now = self.chain.now.saturating_add(seconds);
    }

    /// Redeem a batch atomically on behalf of `redeemer`.
    pub fn redeem(
        &mut self,
        redeemer: Address,
        permission_contexts: &[Vec<u8>],
        modes: &[ExecutionMode],
        execution_calldatas: &[Vec<u8>],
    ) -> Result<(), EnforcerError> {
        let ledger = self.ledger.clone();
        let checkpoint = self.chain.checkpoint();
        let result = self.chain.redeem_delegations(
            &mut self.ledger,
            redeemer,
            permission_contexts,
            modes,
            execution_calldatas,
        );
        match &result {
            Ok(()) => self.chain.commit(checkpoint),
            Err(err) => {
                self.chain.revert(checkpoint);
                self.ledger = ledger;
                tracing::warn!(redeemer = %redeemer, error = %err, "redemption rolled back");
            }
        }
        result
    }

    /// Redeem one leaf-first chain for one action in single/default mode.
    pub fn redeem_single(
        &mut self,
        redeemer: Address,
        chain: &[Delegation],
        action: &Execution,
    ) -> Result<(), EnforcerError> {
        let context = encode_permission_context(chain)?;
        self.redeem(
            redeemer,
            &[context],
            &[ExecutionMode::SINGLE_DEFAULT],
            &[action.encode_single()],
        )
    }

    /// Redeem one leaf-first chain for a batch of actions in `mode`.
    pub fn redeem_batch(
        &mut self,
        redeemer: Address,
        chain: &[Delegation],
        mode: ExecutionMode,
        actions: &[Execution],
    ) -> Result<(), EnforcerError> {
        let context = encode_permission_context(chain)?;
        let payload = caveat_core::execution::encode_batch(actions)?;
        self.redeem(redeemer, &[context], &[mode], &[payload])
    }
}
