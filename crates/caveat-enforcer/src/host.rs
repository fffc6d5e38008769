//! # Host Capabilities
//!
//! What a policy may ask of the environment it runs in: the clock, a
//! balance oracle, enforcer resolution by address, a nested redemption
//! entry point, and journaled checkpoints over host-side state.
//!
//! The accounting [`Ledger`] is not part of the host. It is passed
//! separately so a nested redemption can borrow both mutably at once.

use std::sync::Arc;

use caveat_core::{Address, EnforcerError, ExecutionMode, Holding};
use caveat_state::Ledger;

use crate::traits::CaveatEnforcer;

/// Environment of a redemption.
pub trait Host {
    /// Current block timestamp, in seconds.
    fn timestamp(&self) -> u64;

    /// Measured quantity of `holding`. Trusted and side-effect free.
    fn balance_of(&self, holding: &Holding) -> Result<u128, EnforcerError>;

    /// The policy deployed at `address`, if any.
    fn enforcer_at(&self, address: &Address) -> Option<Arc<dyn CaveatEnforcer>>;

    /// Redeem delegation chains on behalf of `caller`, atomically.
    ///
    /// The three slices are parallel: one permission context, one mode and
    /// one action payload per chain.
    fn redeem_delegations(
        &mut self,
        ledger: &mut Ledger,
        caller: Address,
        permission_contexts: &[Vec<u8>],
        modes: &[ExecutionMode],
        execution_calldatas: &[Vec<u8>],
    ) -> Result<(), EnforcerError>;

    /// Open a journal checkpoint over host-side state.
    fn checkpoint(&mut self) -> usize;

    /// Undo everything since checkpoint `id` and discard it.
    fn revert(&mut self, id: usize);

    /// Keep everything since checkpoint `id` and discard it.
    fn commit(&mut self, id: usize);
}
