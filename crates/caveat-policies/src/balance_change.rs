//! # Balance-Change Guardrails
//!
//! Bound how much a recipient's position may fall, or require how much it
//! must rise, across a redemption. One terms layout per asset standard:
//!
//! | Standard | Terms |
//! |---|---|
//! | Native | `direction(1) ‖ recipient(20) ‖ amount(32)` |
//! | ERC20, ERC721 | `direction(1) ‖ token(20) ‖ recipient(20) ‖ amount(32)` |
//! | ERC1155 | `direction(1) ‖ token(20) ‖ recipient(20) ‖ id(32) ‖ amount(32)` |
//!
//! `direction` is non-zero for a decrease bound, zero for an increase
//! requirement.
//!
//! Two families share the layouts:
//!
//! - [`BalanceChangeEnforcer`]: per-delegation lock-and-snapshot in
//!   `before`/`after`. Key: `(token, recipient, [id], delegation)`.
//! - [`TotalBalanceChangeEnforcer`]: aggregates every delegation of the chain
//!   touching the same position in `beforeAll`/`afterAll`. Key:
//!   `(token, recipient, [id])`, so delegations of one chain share it.
//!
//! Both require default (must-succeed) execution.

use caveat_core::{Address, EnforcerError, Holding, PackedTerms, StateKey, Word};
use caveat_enforcer::modes::only_default_execution_mode;
use caveat_enforcer::{CaveatEnforcer, HookCall, Runtime};
use caveat_state::{check_delta, Contribution, Direction, Settlement};
use serde::{Deserialize, Serialize};

/// Asset standard a guardrail measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssetStandard {
    /// Native balance.
    Native,
    /// Fungible token balance.
    Erc20,
    /// NFT count.
    Erc721,
    /// Multi-token balance of one id.
    Erc1155,
}

impl AssetStandard {
    /// Exact terms length for this standard.
    pub fn terms_len(&self) -> usize {
        match self {
            Self::Native => 1 + 20 + 32,
            Self::Erc20 | Self::Erc721 => 1 + 20 + 20 + 32,
            Self::Erc1155 => 1 + 20 + 20 + 32 + 32,
        }
    }
}

/// Decoded guardrail terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChangeTerms {
    /// Decrease bound or increase requirement.
    pub direction: Direction,
    /// Token contract (absent for native).
    pub token: Option<Address>,
    /// Position owner.
    pub recipient: Address,
    /// ERC1155 token id.
    pub id: Option<Word>,
    /// Bound or requirement.
    pub amount: u128,
}

impl BalanceChangeTerms {
    /// Decode terms for `standard`, attributing failures to `policy`.
    pub fn decode(
        standard: AssetStandard,
        terms: &[u8],
        policy: &str,
    ) -> Result<Self, EnforcerError> {
        let malformed = |e: caveat_core::CodecError| e.attribute(policy, "invalid-terms-length");
        let mut reader = PackedTerms::exact(terms, standard.terms_len()).map_err(malformed)?;
        let direction = Direction::from_flag(reader.byte("direction").map_err(malformed)?);
        let token = match standard {
            AssetStandard::Native => None,
            _ => Some(reader.address("token").map_err(malformed)?),
        };
        let recipient = reader.address("recipient").map_err(malformed)?;
        let id = match standard {
            AssetStandard::Erc1155 => Some(reader.id_word("token id").map_err(malformed)?),
            _ => None,
        };
        let amount = reader.word("amount").map_err(malformed)?;
        Ok(Self {
            direction,
            token,
            recipient,
            id,
            amount,
        })
    }

    /// The measured position.
    pub fn holding(&self) -> Holding {
        let holder = self.recipient;
        match (self.token, self.id) {
            (None, _) => Holding::Native { holder },
            (Some(token), Some(id)) => Holding::Erc1155 { token, holder, id },
            (Some(token), None) => Holding::Erc20 { token, holder },
        }
    }

    fn holding_for(&self, standard: AssetStandard) -> Holding {
        match (standard, self.token) {
            (AssetStandard::Erc721, Some(token)) => Holding::Erc721 {
                token,
                holder: self.recipient,
            },
            _ => self.holding(),
        }
    }

    fn position_key(&self, rt: &Runtime<'_>) -> caveat_core::KeyMaterial {
        let mut material = rt.key();
        if let Some(token) = self.token {
            material = material.address(token);
        }
        material = material.address(self.recipient);
        if let Some(id) = self.id {
            material = material.id(id);
        }
        material
    }
}

/// Per-delegation lock-and-snapshot guardrail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChangeEnforcer {
    standard: AssetStandard,
}

impl BalanceChangeEnforcer {
    /// Guardrail for `standard`.
    pub fn new(standard: AssetStandard) -> Self {
        Self { standard }
    }

    /// The measured standard.
    pub fn standard(&self) -> AssetStandard {
        self.standard
    }

    fn key(&self, rt: &Runtime<'_>, call: &HookCall<'_>, terms: &BalanceChangeTerms) -> Result<StateKey, EnforcerError> {
        Ok(terms.position_key(rt).delegation(call.delegation_hash).finish()?)
    }
}

impl CaveatEnforcer for BalanceChangeEnforcer {
    fn name(&self) -> &'static str {
        match self.standard {
            AssetStandard::Native => "NativeTokenBalanceChangeEnforcer",
            AssetStandard::Erc20 => "ERC20BalanceChangeEnforcer",
            AssetStandard::Erc721 => "ERC721BalanceChangeEnforcer",
            AssetStandard::Erc1155 => "ERC1155BalanceChangeEnforcer",
        }
    }

    fn before_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        only_default_execution_mode(call.mode)?;
        let terms = BalanceChangeTerms::decode(self.standard, call.terms, self.name())?;
        let key = self.key(rt, call, &terms)?;
        let measured = rt.balance_of(&terms.holding_for(self.standard))?;
        rt.ledger
            .locks
            .open(key, measured)
            .map_err(|e| e.attribute(self.name()))
    }

    fn after_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        let terms = BalanceChangeTerms::decode(self.standard, call.terms, self.name())?;
        let key = self.key(rt, call, &terms)?;
        let cached = rt
            .ledger
            .locks
            .close(key)
            .map_err(|e| e.attribute(self.name()))?;
        let measured = rt.balance_of(&terms.holding_for(self.standard))?;
        check_delta(terms.direction, cached, measured, terms.amount)
            .map_err(|e| e.attribute(self.name()))?;
        tracing::debug!(
            policy = self.name(),
            recipient = %terms.recipient,
            direction = %terms.direction,
            cached,
            measured,
            amount = terms.amount,
            "balance change validated"
        );
        Ok(())
    }
}

/// Chain-wide aggregating guardrail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalBalanceChangeEnforcer {
    standard: AssetStandard,
}

impl TotalBalanceChangeEnforcer {
    /// Aggregating guardrail for `standard`.
    pub fn new(standard: AssetStandard) -> Self {
        Self { standard }
    }

    /// The measured standard.
    pub fn standard(&self) -> AssetStandard {
        self.standard
    }
}

impl CaveatEnforcer for TotalBalanceChangeEnforcer {
    fn name(&self) -> &'static str {
        match self.standard {
            AssetStandard::Native => "NativeTokenTotalBalanceChangeEnforcer",
            AssetStandard::Erc20 => "ERC20TotalBalanceChangeEnforcer",
            AssetStandard::Erc721 => "ERC721TotalBalanceChangeEnforcer",
            AssetStandard::Erc1155 => "ERC1155TotalBalanceChangeEnforcer",
        }
    }

    fn before_all_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        only_default_execution_mode(call.mode)?;
        let terms = BalanceChangeTerms::decode(self.standard, call.terms, self.name())?;
        let key = terms.position_key(rt).finish()?;
        let measured = rt.balance_of(&terms.holding_for(self.standard))?;
        let contribution = Contribution {
            principal: call.delegator,
            recipient: terms.recipient,
            direction: terms.direction,
            amount: terms.amount,
        };
        rt.ledger
            .trackers
            .contribute(key, contribution, measured)
            .map_err(|e| e.attribute(self.name()))?;
        Ok(())
    }

    fn after_all_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        let terms = BalanceChangeTerms::decode(self.standard, call.terms, self.name())?;
        let key = terms.position_key(rt).finish()?;
        let measured = rt.balance_of(&terms.holding_for(self.standard))?;
        let outcome = rt
            .ledger
            .trackers
            .settle(key, measured)
            .map_err(|e| e.attribute(self.name()))?;
        if outcome == Settlement::Settled {
            tracing::debug!(
                policy = self.name(),
                recipient = %terms.recipient,
                measured,
                "total balance change validated"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, hook_call, Fixture, DELEGATOR};
    use caveat_core::{DelegationHash, ErrorKind, ExecutionMode, TermsWriter};
    use caveat_enforcer::Hook;

    fn erc20_terms(direction: Direction, recipient: u64, amount: u128) -> Vec<u8> {
        TermsWriter::new()
            .byte(direction.flag())
            .address(addr(0x70))
            .address(addr(recipient))
            .word(amount)
            .build()
    }

    fn erc20_holding(holder: u64) -> Holding {
        Holding::Erc20 {
            token: addr(0x70),
            holder: addr(holder),
        }
    }

    // ── Lock-and-snapshot ────────────────────────────────────────────

    #[test]
    fn test_decrease_within_bound() {
        let policy = BalanceChangeEnforcer::new(AssetStandard::Erc20);
        let terms = erc20_terms(Direction::Decrease, DELEGATOR, 100);
        let call = hook_call(&terms, &[], &[]);
        let mut fx = Fixture::at(1);
        fx.host.set_balance(erc20_holding(DELEGATOR), 1_000);
        fx.run(&policy, Hook::Before, &call).unwrap();
        fx.host.set_balance(erc20_holding(DELEGATOR), 900);
        fx.run(&policy, Hook::After, &call).unwrap();
        assert_eq!(fx.ledger.open_entries(), 0);
    }

    #[test]
    fn test_decrease_beyond_bound() {
        let policy = BalanceChangeEnforcer::new(AssetStandard::Erc20);
        let terms = erc20_terms(Direction::Decrease, DELEGATOR, 100);
        let call = hook_call(&terms, &[], &[]);
        let mut fx = Fixture::at(1);
        fx.host.set_balance(erc20_holding(DELEGATOR), 1_000);
        fx.run(&policy, Hook::Before, &call).unwrap();
        fx.host.set_balance(erc20_holding(DELEGATOR), 899);
        let err = fx.run(&policy, Hook::After, &call).unwrap_err();
        assert_eq!(err.to_string(), "ERC20BalanceChangeEnforcer:exceeded-balance-decrease");
    }

    #[test]
    fn test_increase_requirement() {
        let policy = BalanceChangeEnforcer::new(AssetStandard::Native);
        let terms = TermsWriter::new()
            .byte(Direction::Increase.flag())
            .address(addr(5))
            .word(50)
            .build();
        let call = hook_call(&terms, &[], &[]);
        let holding = Holding::Native { holder: addr(5) };
        let mut fx = Fixture::at(1);
        fx.host.set_balance(holding, 10);
        fx.run(&policy, Hook::Before, &call).unwrap();
        fx.host.set_balance(holding, 59);
        let err = fx.run(&policy, Hook::After, &call).unwrap_err();
        assert_eq!(err.reason(), "insufficient-balance-increase");
    }

    #[test]
    fn test_second_before_is_locked() {
        let policy = BalanceChangeEnforcer::new(AssetStandard::Erc20);
        let terms = erc20_terms(Direction::Decrease, DELEGATOR, 100);
        let call = hook_call(&terms, &[], &[]);
        let mut fx = Fixture::at(1);
        fx.run(&policy, Hook::Before, &call).unwrap();
        let err = fx.run(&policy, Hook::Before, &call).unwrap_err();
        assert_eq!(err.to_string(), "ERC20BalanceChangeEnforcer:enforcer-is-locked");
        assert_eq!(err.kind(), ErrorKind::StateConsistency);
    }

    #[test]
    fn test_after_without_before() {
        let policy = BalanceChangeEnforcer::new(AssetStandard::Erc20);
        let terms = erc20_terms(Direction::Decrease, DELEGATOR, 100);
        let mut fx = Fixture::at(1);
        let err = fx
            .run(&policy, Hook::After, &hook_call(&terms, &[], &[]))
            .unwrap_err();
        assert_eq!(err.reason(), "unpaired-after-hook");
    }

    #[test]
    fn test_try_mode_rejected() {
        let policy = BalanceChangeEnforcer::new(AssetStandard::Erc20);
        let terms = erc20_terms(Direction::Decrease, DELEGATOR, 100);
        let mut call = hook_call(&terms, &[], &[]);
        call.mode = ExecutionMode::SINGLE_TRY;
        let mut fx = Fixture::at(1);
        let err = fx.run(&policy, Hook::Before, &call).unwrap_err();
        assert_eq!(err.to_string(), "CaveatEnforcer:invalid-execution-type");
    }

    #[test]
    fn test_erc1155_terms_layout() {
        let terms = TermsWriter::new()
            .byte(1)
            .address(addr(0x71))
            .address(addr(3))
            .id_word(Word::from(9))
            .word(4)
            .build();
        let decoded = BalanceChangeTerms::decode(AssetStandard::Erc1155, &terms, "P").unwrap();
        assert_eq!(decoded.id, Some(Word::from(9)));
        assert_eq!(decoded.amount, 4);
        assert_eq!(
            decoded.holding(),
            Holding::Erc1155 {
                token: addr(0x71),
                holder: addr(3),
                id: Word::from(9)
            }
        );
        assert!(BalanceChangeTerms::decode(AssetStandard::Erc20, &terms, "P").is_err());
    }

    #[test]
    fn test_erc1155_id_with_high_byte() {
        let mut id = [0u8; 32];
        id[0] = 0xab;
        let terms = TermsWriter::new()
            .byte(0)
            .address(addr(0x71))
            .address(addr(3))
            .id_word(Word(id))
            .word(4)
            .build();
        let decoded = BalanceChangeTerms::decode(AssetStandard::Erc1155, &terms, "P").unwrap();
        assert_eq!(decoded.id, Some(Word(id)));
        assert_eq!(decoded.amount, 4);
    }

    #[test]
    fn test_erc721_measures_nft_count() {
        let policy = BalanceChangeEnforcer::new(AssetStandard::Erc721);
        let terms = erc20_terms(Direction::Decrease, DELEGATOR, 1);
        let call = hook_call(&terms, &[], &[]);
        let nft = Holding::Erc721 {
            token: addr(0x70),
            holder: addr(DELEGATOR),
        };
        let mut fx = Fixture::at(1);
        fx.host.set_balance(nft, 3);
        fx.run(&policy, Hook::Before, &call).unwrap();
        fx.host.set_balance(nft, 1);
        assert!(fx.run(&policy, Hook::After, &call).is_err());
    }

    // ── Aggregating ──────────────────────────────────────────────────

    #[test]
    fn test_chain_aggregation_with_tightening() {
        let policy = TotalBalanceChangeEnforcer::new(AssetStandard::Erc20);
        let root_terms = erc20_terms(Direction::Decrease, DELEGATOR, 100);
        let leaf_terms = erc20_terms(Direction::Decrease, DELEGATOR, 60);
        let root_call = hook_call(&root_terms, &[], &[]);
        let mut leaf_call = hook_call(&leaf_terms, &[], &[]);
        leaf_call.delegator = addr(7);
        leaf_call.delegation_hash = DelegationHash([0x99; 32]);

        let mut fx = Fixture::at(1);
        fx.host.set_balance(erc20_holding(DELEGATOR), 1_000);
        fx.run(&policy, Hook::BeforeAll, &root_call).unwrap();
        fx.run(&policy, Hook::BeforeAll, &leaf_call).unwrap();

        fx.host.set_balance(erc20_holding(DELEGATOR), 930);
        fx.run(&policy, Hook::AfterAll, &leaf_call).unwrap();
        let err = fx.run(&policy, Hook::AfterAll, &root_call).unwrap_err();
        assert_eq!(err.reason(), "exceeded-balance-decrease");
    }

    #[test]
    fn test_loosening_redelegation_rejected() {
        let policy = TotalBalanceChangeEnforcer::new(AssetStandard::Erc20);
        let root_terms = erc20_terms(Direction::Decrease, DELEGATOR, 100);
        let leaf_terms = erc20_terms(Direction::Decrease, DELEGATOR, 150);
        let mut leaf_call = hook_call(&leaf_terms, &[], &[]);
        leaf_call.delegator = addr(7);

        let mut fx = Fixture::at(1);
        fx.run(&policy, Hook::BeforeAll, &hook_call(&root_terms, &[], &[]))
            .unwrap();
        let err = fx.run(&policy, Hook::BeforeAll, &leaf_call).unwrap_err();
        assert_eq!(err.to_string(), "ERC20TotalBalanceChangeEnforcer:decrease-must-not-loosen");
    }

    #[test]
    fn test_first_contributor_must_be_recipient() {
        let policy = TotalBalanceChangeEnforcer::new(AssetStandard::Erc20);
        let terms = erc20_terms(Direction::Decrease, 55, 100);
        let mut fx = Fixture::at(1);
        let err = fx
            .run(&policy, Hook::BeforeAll, &hook_call(&terms, &[], &[]))
            .unwrap_err();
        assert_eq!(err.reason(), "invalid-delegator");
    }

    #[test]
    fn test_after_all_without_tracker() {
        let policy = TotalBalanceChangeEnforcer::new(AssetStandard::Erc20);
        let terms = erc20_terms(Direction::Decrease, DELEGATOR, 100);
        let mut fx = Fixture::at(1);
        let err = fx
            .run(&policy, Hook::AfterAll, &hook_call(&terms, &[], &[]))
            .unwrap_err();
        assert_eq!(err.reason(), "missing-balance-tracker");
    }

    #[test]
    fn test_tracker_removed_after_settlement() {
        let policy = TotalBalanceChangeEnforcer::new(AssetStandard::Erc20);
        let terms = erc20_terms(Direction::Increase, DELEGATOR, 10);
        let call = hook_call(&terms, &[], &[]);
        let mut fx = Fixture::at(1);
        fx.host.set_balance(erc20_holding(DELEGATOR), 5);
        fx.run(&policy, Hook::BeforeAll, &call).unwrap();
        fx.host.set_balance(erc20_holding(DELEGATOR), 15);
        fx.run(&policy, Hook::AfterAll, &call).unwrap();
        assert_eq!(fx.ledger.open_entries(), 0);
    }
}
