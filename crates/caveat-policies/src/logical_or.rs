//! # Logical Composition (OR of AND-groups)
//!
//! Terms for both variants are the canonical JSON encoding of a list of
//! [`CaveatGroup`]s. A group is satisfied iff every member policy's hook
//! succeeds; an empty group is never satisfied.
//!
//! - [`LogicalOrWrapperEnforcer`] trusts the redeemer's choice. Args carry a
//!   [`SelectedGroup`]: the group index plus one argument per member. Only
//!   that group is evaluated, on every hook. Whoever controls args picks the
//!   restriction set, so every group must be independently sufficient.
//! - [`AnyOfGroupsEnforcer`] tries groups in order on `before` until one is
//!   fully satisfied. Args are empty or a 32-byte group index tried first.
//!   Members use the args embedded in their caveat entries. A failed
//!   group's state changes are rolled back; the winner is pinned and its
//!   `after` hooks replayed.
//!
//! ## Security Invariant
//!
//! Sub-policies are invoked through [`Runtime::call_enforcer`], so they see
//! the composition enforcer as their caller and their accounting keys never
//! collide with the same policies invoked directly by the coordinator.

use caveat_core::address::hex_bytes_list;
use caveat_core::canonical::decode_structured;
use caveat_core::{CanonicalBytes, CanonicalizationError, Caveat, EnforcerError, PackedTerms, StateKey};
use caveat_enforcer::{CaveatEnforcer, Hook, HookCall, Runtime};
use serde::{Deserialize, Serialize};

/// Policies that must all pass together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaveatGroup {
    /// Member policies with their terms (and, for try-all, their args).
    pub caveats: Vec<Caveat>,
}

impl CaveatGroup {
    /// A group of `caveats`.
    pub fn new(caveats: Vec<Caveat>) -> Self {
        Self { caveats }
    }
}

/// Redeemer selection for [`LogicalOrWrapperEnforcer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedGroup {
    /// Index into the terms' group list.
    pub group_index: u64,
    /// One argument per member of the selected group.
    #[serde(with = "hex_bytes_list")]
    pub caveat_args: Vec<Vec<u8>>,
}

/// Encode groups as composition terms.
pub fn encode_groups(groups: &[CaveatGroup]) -> Result<Vec<u8>, CanonicalizationError> {
    Ok(CanonicalBytes::new(&groups)?.into_bytes())
}

/// Encode a selection as composition args.
pub fn encode_selection(selection: &SelectedGroup) -> Result<Vec<u8>, CanonicalizationError> {
    Ok(CanonicalBytes::new(selection)?.into_bytes())
}

fn decode_groups(policy: &str, terms: &[u8]) -> Result<Vec<CaveatGroup>, EnforcerError> {
    decode_structured(terms, "caveat groups").map_err(|e| e.attribute(policy, "invalid-caveat-groups"))
}

/// Trust-the-selector composition.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalOrWrapperEnforcer;

impl LogicalOrWrapperEnforcer {
    fn forward(&self, hook: Hook, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        let groups = decode_groups(self.name(), call.terms)?;
        let selection: SelectedGroup = decode_structured(call.args, "selected group")
            .map_err(|e| e.attribute(self.name(), "invalid-selected-group"))?;
        let group = usize::try_from(selection.group_index)
            .ok()
            .and_then(|index| groups.get(index))
            .ok_or_else(|| EnforcerError::malformed(self.name(), "invalid-group-index"))?;
        if selection.caveat_args.len() != group.caveats.len() {
            return Err(EnforcerError::malformed(self.name(), "invalid-caveat-args-length"));
        }
        if group.caveats.is_empty() {
            return Err(EnforcerError::violation(self.name(), "empty-group"));
        }
        for (caveat, args) in group.caveats.iter().zip(&selection.caveat_args) {
            rt.call_enforcer(caveat.enforcer, hook, &call.with_caveat(&caveat.terms, args))?;
        }
        tracing::trace!(policy = self.name(), group = selection.group_index, hook = %hook, "group forwarded");
        Ok(())
    }
}

impl CaveatEnforcer for LogicalOrWrapperEnforcer {
    fn name(&self) -> &'static str {
        "LogicalOrWrapperEnforcer"
    }

    fn before_all_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        self.forward(Hook::BeforeAll, call, rt)
    }

    fn before_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        self.forward(Hook::Before, call, rt)
    }

    fn after_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        self.forward(Hook::After, call, rt)
    }

    fn after_all_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        self.forward(Hook::AfterAll, call, rt)
    }
}

/// Try-all-groups composition.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyOfGroupsEnforcer;

impl AnyOfGroupsEnforcer {
    fn hint(&self, args: &[u8], groups: usize) -> Result<Option<usize>, EnforcerError> {
        if args.is_empty() {
            return Ok(None);
        }
        let index = PackedTerms::exact(args, 32)
            .and_then(|mut a| a.word("group hint"))
            .map_err(|e| e.attribute(self.name(), "invalid-args-length"))?;
        match usize::try_from(index) {
            Ok(index) if index < groups => Ok(Some(index)),
            _ => Err(EnforcerError::malformed(self.name(), "invalid-group-index")),
        }
    }

    /// Key of the pinned-group queue: one per delegation and group set.
    fn selection_key(call: &HookCall<'_>, rt: &Runtime<'_>) -> Result<StateKey, EnforcerError> {
        Ok(rt
            .key()
            .delegation(call.delegation_hash)
            .bytes(call.terms)
            .finish()?)
    }

    /// Invoke `hook` on every member, returning the first failure.
    fn evaluate(
        hook: Hook,
        group: &CaveatGroup,
        call: &HookCall<'_>,
        rt: &mut Runtime<'_>,
    ) -> Result<(), EnforcerError> {
        let mut outcome = Ok(());
        for caveat in &group.caveats {
            let result = rt.call_enforcer(caveat.enforcer, hook, &call.with_caveat(&caveat.terms, &caveat.args));
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }
}

impl CaveatEnforcer for AnyOfGroupsEnforcer {
    fn name(&self) -> &'static str {
        "AnyOfGroupsEnforcer"
    }

    fn before_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        let groups = decode_groups(self.name(), call.terms)?;
        let hint = self.hint(call.args, groups.len())?;
        let order = hint
            .into_iter()
            .chain((0..groups.len()).filter(|index| Some(*index) != hint));

        for index in order {
            let group = &groups[index];
            if group.caveats.is_empty() {
                tracing::debug!(policy = self.name(), group = index, "empty group skipped");
                continue;
            }
            let checkpoint = rt.checkpoint();
            match Self::evaluate(Hook::Before, group, call, rt) {
                Ok(()) => {
                    rt.commit(checkpoint);
                    let key = Self::selection_key(call, rt)?;
                    rt.ledger.selections.pin(key, index);
                    tracing::debug!(policy = self.name(), group = index, "group satisfied");
                    return Ok(());
                }
                Err(err) => {
                    rt.revert(checkpoint);
                    tracing::debug!(policy = self.name(), group = index, error = %err, "group not satisfied");
                }
            }
        }
        Err(EnforcerError::violation(self.name(), "no-group-satisfied"))
    }

    fn after_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
        let groups = decode_groups(self.name(), call.terms)?;
        let key = Self::selection_key(call, rt)?;
        let index = rt
            .ledger
            .selections
            .take(key)
            .map_err(|e| e.attribute(self.name()))?;
        let group = groups
            .get(index)
            .ok_or_else(|| EnforcerError::state(self.name(), "invalid-group-index"))?;
        for caveat in &group.caveats {
            rt.call_enforcer(caveat.enforcer, Hook::After, &call.with_caveat(&caveat.terms, &caveat.args))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::balance_change::{AssetStandard, BalanceChangeEnforcer};
    use crate::context_filters::LimitedCallsEnforcer;
    use crate::testing::{addr, hook_call, Fixture, DELEGATOR, THIS};
    use caveat_core::{Address, ErrorKind, Holding, TermsWriter};

    /// Records `(tag, hook, caller)` per invocation; fails when terms are
    /// `[0]`.
    #[derive(Debug, Default)]
    struct Recorder {
        seen: Mutex<Vec<(u8, Hook, Address)>>,
    }

    impl Recorder {
        fn record(&self, call: &HookCall<'_>, hook: Hook, rt: &Runtime<'_>) -> Result<(), EnforcerError> {
            let tag = call.args.first().copied().unwrap_or_default();
            self.seen.lock().unwrap().push((tag, hook, rt.caller));
            if call.terms == [0] {
                return Err(EnforcerError::violation("Recorder", "rejected"));
            }
            Ok(())
        }

        fn tags(&self, hook: Hook) -> Vec<u8> {
            self.seen
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, h, _)| *h == hook)
                .map(|(tag, _, _)| *tag)
                .collect()
        }
    }

    impl CaveatEnforcer for Recorder {
        fn name(&self) -> &'static str {
            "Recorder"
        }

        fn before_all_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
            self.record(call, Hook::BeforeAll, rt)
        }

        fn before_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
            self.record(call, Hook::Before, rt)
        }

        fn after_hook(&self, call: &HookCall<'_>, rt: &mut Runtime<'_>) -> Result<(), EnforcerError> {
            self.record(call, Hook::After, rt)
        }
    }

    const RECORDER: u64 = 0x50;

    fn fixture_with_recorder() -> (Fixture, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut fx = Fixture::at(1);
        fx.host.deploy(addr(RECORDER), recorder.clone());
        (fx, recorder)
    }

    /// A recorder caveat tagged `tag` that passes iff `pass`.
    fn member(tag: u8, pass: bool) -> Caveat {
        Caveat::new(addr(RECORDER), vec![u8::from(pass)]).with_args(vec![tag])
    }

    // ── Trust-the-selector ───────────────────────────────────────────

    #[test]
    fn test_selected_group_only() {
        let (mut fx, recorder) = fixture_with_recorder();
        let terms = encode_groups(&[
            CaveatGroup::new(vec![member(1, true), member(2, true)]),
            CaveatGroup::new(vec![member(3, true)]),
        ])
        .unwrap();
        let args = encode_selection(&SelectedGroup {
            group_index: 0,
            caveat_args: vec![vec![10], vec![20]],
        })
        .unwrap();
        fx.run(&LogicalOrWrapperEnforcer, Hook::Before, &hook_call(&terms, &args, &[]))
            .unwrap();
        // the selector's args replace the embedded ones
        assert_eq!(recorder.tags(Hook::Before), vec![10, 20]);
        let seen = recorder.seen.lock().unwrap();
        assert!(seen.iter().all(|(_, _, caller)| *caller == addr(THIS)));
    }

    #[test]
    fn test_selected_group_member_failure() {
        let (mut fx, _recorder) = fixture_with_recorder();
        let terms = encode_groups(&[
            CaveatGroup::new(vec![member(1, true), member(2, false)]),
            CaveatGroup::new(vec![member(3, true)]),
        ])
        .unwrap();
        let args = encode_selection(&SelectedGroup {
            group_index: 0,
            caveat_args: vec![vec![1], vec![2]],
        })
        .unwrap();
        let err = fx
            .run(&LogicalOrWrapperEnforcer, Hook::Before, &hook_call(&terms, &args, &[]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Recorder:rejected");
    }

    #[test]
    fn test_selection_validation() {
        let (mut fx, _recorder) = fixture_with_recorder();
        let terms = encode_groups(&[CaveatGroup::new(vec![member(1, true)]), CaveatGroup::new(vec![])]).unwrap();

        let out_of_range = encode_selection(&SelectedGroup {
            group_index: 2,
            caveat_args: vec![],
        })
        .unwrap();
        let err = fx
            .run(&LogicalOrWrapperEnforcer, Hook::Before, &hook_call(&terms, &out_of_range, &[]))
            .unwrap_err();
        assert_eq!(err.reason(), "invalid-group-index");

        let miscounted = encode_selection(&SelectedGroup {
            group_index: 0,
            caveat_args: vec![],
        })
        .unwrap();
        let err = fx
            .run(&LogicalOrWrapperEnforcer, Hook::Before, &hook_call(&terms, &miscounted, &[]))
            .unwrap_err();
        assert_eq!(err.reason(), "invalid-caveat-args-length");

        let empty = encode_selection(&SelectedGroup {
            group_index: 1,
            caveat_args: vec![],
        })
        .unwrap();
        let err = fx
            .run(&LogicalOrWrapperEnforcer, Hook::Before, &hook_call(&terms, &empty, &[]))
            .unwrap_err();
        assert_eq!(err.to_string(), "LogicalOrWrapperEnforcer:empty-group");

        let err = fx
            .run(&LogicalOrWrapperEnforcer, Hook::Before, &hook_call(b"not json", &empty, &[]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_wrapper_forwards_every_hook() {
        let (mut fx, recorder) = fixture_with_recorder();
        let terms = encode_groups(&[CaveatGroup::new(vec![member(1, true)])]).unwrap();
        let args = encode_selection(&SelectedGroup {
            group_index: 0,
            caveat_args: vec![vec![7]],
        })
        .unwrap();
        let call = hook_call(&terms, &args, &[]);
        for hook in Hook::ALL {
            fx.run(&LogicalOrWrapperEnforcer, hook, &call).unwrap();
        }
        assert_eq!(recorder.tags(Hook::BeforeAll), vec![7]);
        assert_eq!(recorder.tags(Hook::After), vec![7]);
    }

    // ── Try-all ──────────────────────────────────────────────────────

    #[test]
    fn test_second_group_passes_after_first_fully_tried() {
        let (mut fx, recorder) = fixture_with_recorder();
        let terms = encode_groups(&[
            CaveatGroup::new(vec![member(1, false), member(2, true), member(3, false)]),
            CaveatGroup::new(vec![member(4, true), member(5, true)]),
        ])
        .unwrap();
        let call = hook_call(&terms, &[], &[]);
        fx.run(&AnyOfGroupsEnforcer, Hook::Before, &call).unwrap();
        assert_eq!(recorder.tags(Hook::Before), vec![1, 2, 3, 4, 5]);

        fx.run(&AnyOfGroupsEnforcer, Hook::After, &call).unwrap();
        assert_eq!(recorder.tags(Hook::After), vec![4, 5]);
        assert_eq!(fx.ledger.open_entries(), 0);
    }

    #[test]
    fn test_all_groups_fail() {
        let (mut fx, _recorder) = fixture_with_recorder();
        let terms = encode_groups(&[
            CaveatGroup::new(vec![member(1, false)]),
            CaveatGroup::new(vec![]),
        ])
        .unwrap();
        let err = fx
            .run(&AnyOfGroupsEnforcer, Hook::Before, &hook_call(&terms, &[], &[]))
            .unwrap_err();
        assert_eq!(err.to_string(), "AnyOfGroupsEnforcer:no-group-satisfied");
        assert_eq!(err.kind(), ErrorKind::Violation);
    }

    #[test]
    fn test_hint_tried_first() {
        let (mut fx, recorder) = fixture_with_recorder();
        let terms = encode_groups(&[
            CaveatGroup::new(vec![member(1, true)]),
            CaveatGroup::new(vec![member(2, true)]),
        ])
        .unwrap();
        let hint = TermsWriter::new().word(1).build();
        fx.run(&AnyOfGroupsEnforcer, Hook::Before, &hook_call(&terms, &hint, &[]))
            .unwrap();
        assert_eq!(recorder.tags(Hook::Before), vec![2]);

        let bad = TermsWriter::new().word(9).build();
        let err = fx
            .run(&AnyOfGroupsEnforcer, Hook::Before, &hook_call(&terms, &bad, &[]))
            .unwrap_err();
        assert_eq!(err.reason(), "invalid-group-index");
    }

    #[test]
    fn test_failed_group_state_rolled_back() {
        let mut fx = Fixture::at(1);
        let counter = addr(0x60);
        let guard = addr(0x61);
        fx.host.deploy(counter, Arc::new(LimitedCallsEnforcer));
        fx.host.deploy(guard, Arc::new(BalanceChangeEnforcer::new(AssetStandard::Native)));
        fx.host.set_balance(Holding::Native { holder: addr(DELEGATOR) }, 5);

        let limit_once = TermsWriter::new().word(1).build();
        // malformed guard terms: group 0 fails after the counter consumed
        let terms = encode_groups(&[
            CaveatGroup::new(vec![
                Caveat::new(counter, limit_once.clone()),
                Caveat::new(guard, vec![0xff]),
            ]),
            CaveatGroup::new(vec![Caveat::new(counter, limit_once)]),
        ])
        .unwrap();
        let call = hook_call(&terms, &[], &[]);
        // group 1 succeeds only if group 0's count was rolled back
        fx.run(&AnyOfGroupsEnforcer, Hook::Before, &call).unwrap();
        fx.run(&AnyOfGroupsEnforcer, Hook::After, &call).unwrap();
        assert_eq!(fx.ledger.open_entries(), 0);
    }

    #[test]
    fn test_two_compositions_on_one_delegation() {
        let (mut fx, recorder) = fixture_with_recorder();
        let first = encode_groups(&[
            CaveatGroup::new(vec![member(1, false)]),
            CaveatGroup::new(vec![member(2, true)]),
        ])
        .unwrap();
        let second = encode_groups(&[CaveatGroup::new(vec![member(3, true)])]).unwrap();
        let first_call = hook_call(&first, &[], &[]);
        let second_call = hook_call(&second, &[], &[]);

        // every before runs ahead of any after on one delegation
        fx.run(&AnyOfGroupsEnforcer, Hook::Before, &first_call).unwrap();
        fx.run(&AnyOfGroupsEnforcer, Hook::Before, &second_call).unwrap();
        fx.run(&AnyOfGroupsEnforcer, Hook::After, &first_call).unwrap();
        fx.run(&AnyOfGroupsEnforcer, Hook::After, &second_call).unwrap();
        assert_eq!(recorder.tags(Hook::After), vec![2, 3]);
        assert_eq!(fx.ledger.open_entries(), 0);
    }

    #[test]
    fn test_identical_compositions_pair_in_order() {
        let (mut fx, recorder) = fixture_with_recorder();
        let terms = encode_groups(&[
            CaveatGroup::new(vec![member(1, true)]),
            CaveatGroup::new(vec![member(2, true)]),
        ])
        .unwrap();
        let hinted = TermsWriter::new().word(1).build();
        let plain = hook_call(&terms, &[], &[]);
        let second = hook_call(&terms, &hinted, &[]);

        fx.run(&AnyOfGroupsEnforcer, Hook::Before, &plain).unwrap();
        fx.run(&AnyOfGroupsEnforcer, Hook::Before, &second).unwrap();
        assert_eq!(fx.ledger.selections.len(), 2);
        fx.run(&AnyOfGroupsEnforcer, Hook::After, &plain).unwrap();
        fx.run(&AnyOfGroupsEnforcer, Hook::After, &second).unwrap();
        assert_eq!(recorder.tags(Hook::After), vec![1, 2]);
        assert_eq!(fx.ledger.open_entries(), 0);
    }

    #[test]
    fn test_after_without_selection() {
        let (mut fx, _recorder) = fixture_with_recorder();
        let terms = encode_groups(&[CaveatGroup::new(vec![member(1, true)])]).unwrap();
        let err = fx
            .run(&AnyOfGroupsEnforcer, Hook::After, &hook_call(&terms, &[], &[]))
            .unwrap_err();
        assert_eq!(err.reason(), "missing-group-selection");
    }
}
