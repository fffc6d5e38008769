//! # Mock Host
//!
//! A deterministic in-memory [`Host`] for unit-testing policies in
//! isolation: a settable clock, a balance map, a registry of enforcers, and
//! a nested-redemption stub that records each request and optionally credits
//! a balance to simulate a payment landing.
//!
//! It does not execute actions or evaluate nested chains. Whole-redemption
//! behaviour is exercised against the sandbox coordinator instead.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use caveat_core::{Address, EnforcerError, ExecutionMode, Holding};
use caveat_state::Ledger;

use crate::host::Host;
use crate::traits::CaveatEnforcer;

/// One nested redemption request seen by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRedemption {
    /// Redeemer of the nested call.
    pub caller: Address,
    /// Permission contexts, one per chain.
    pub permission_contexts: Vec<Vec<u8>>,
    /// Modes, one per chain.
    pub modes: Vec<ExecutionMode>,
    /// Action payloads, one per chain.
    pub execution_calldatas: Vec<Vec<u8>>,
}

/// In-memory host for unit tests.
#[derive(Debug, Default)]
pub struct MockHost {
    /// Current timestamp.
    pub now: u64,
    /// Balances by holding. Missing entries read as zero.
    pub balances: HashMap<Holding, u128>,
    /// Deployed enforcers.
    pub enforcers: BTreeMap<Address, Arc<dyn CaveatEnforcer>>,
    /// Every nested redemption requested so far.
    pub redemptions: Vec<RecordedRedemption>,
    /// Credited to the holding on each successful nested redemption.
    pub redeem_credit: Option<(Holding, u128)>,
    /// If set, nested redemptions fail with this error.
    pub redeem_failure: Option<EnforcerError>,
    journal: Vec<HashMap<Holding, u128>>,
}

impl MockHost {
    /// A host at time `now` with no balances or enforcers.
    pub fn at(now: u64) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    /// Set a balance.
    pub fn set_balance(&mut self, holding: Holding, amount: u128) {
        self.balances.insert(holding, amount);
    }

    /// Deploy `enforcer` at `address`.
    pub fn deploy(&mut self, address: Address, enforcer: Arc<dyn CaveatEnforcer>) {
        self.enforcers.insert(address, enforcer);
    }
}

impl Host for MockHost {
    fn timestamp(&self) -> u64 {
        self.now
    }

    fn balance_of(&self, holding: &Holding) -> Result<u128, EnforcerError> {
        Ok(self.balances.get(holding).copied().unwrap_or(0))
    }

    fn enforcer_at(&self, address: &Address) -> Option<Arc<dyn CaveatEnforcer>> {
        self.enforcers.get(address).cloned()
    }

    fn redeem_delegations(
        &mut self,
        _ledger: &mut Ledger,
        caller: Address,
        permission_contexts: &[Vec<u8>],
        modes: &[ExecutionMode],
        execution_calldatas: &[Vec<u8>],
    ) -> Result<(), EnforcerError> {
        self.redemptions.push(RecordedRedemption {
            caller,
            permission_contexts: permission_contexts.to_vec(),
            modes: modes.to_vec(),
            execution_calldatas: execution_calldatas.to_vec(),
        });
        if let Some(err) = &self.redeem_failure {
            return Err(err.clone());
        }
        if let Some((holding, amount)) = self.redeem_credit {
            let entry = self.balances.entry(holding).or_insert(0);
            *entry = entry.saturating_add(amount);
        }
        Ok(())
    }

    fn checkpoint(&mut self) -> usize {
        self.journal.push(self.balances.clone());
        self.journal.len() - 1
    }

    fn revert(&mut self, id: usize) {
        if id < self.journal.len() {
            self.journal.truncate(id + 1);
            if let Some(saved) = self.journal.pop() {
                self.balances = saved;
            }
        }
    }

    fn commit(&mut self, id: usize) {
        self.journal.truncate(id);
    }
}
