//! # Composition Integration Tests
//!
//! Logical OR over groups of real policies, and payment enforcement
//! through a nested allowance redemption.

mod common;

use caveat_core::{encode_permission_context, Caveat, Delegation, ErrorKind, TermsWriter};
use caveat_policies::{encode_groups, encode_selection, payment_binding, CaveatGroup, SelectedGroup};
use caveat_state::Direction;
use common::*;

fn only_target(target: u64) -> Caveat {
    caveat(ALLOWED_TARGETS, TermsWriter::new().address(addr(target)).build())
}

fn value_at_most(max: u128) -> Caveat {
    caveat(VALUE_LTE, TermsWriter::new().word(max).build())
}

fn token_guard(amount: u128) -> Caveat {
    caveat(
        ERC20_BALANCE_CHANGE,
        TermsWriter::new()
            .byte(Direction::Decrease.flag())
            .address(addr(TOKEN))
            .address(addr(ALICE))
            .word(amount)
            .build(),
    )
}

// ---------------------------------------------------------------------------
// Trust-the-selector
// ---------------------------------------------------------------------------

fn selector_caveat(groups: &[CaveatGroup], group_index: u64, members: usize) -> Caveat {
    let terms = encode_groups(groups).unwrap();
    let args = encode_selection(&SelectedGroup {
        group_index,
        caveat_args: vec![Vec::new(); members],
    })
    .unwrap();
    caveat(LOGICAL_OR, terms).with_args(args)
}

#[test]
fn selected_group_governs_the_action() {
    let mut sandbox = sandbox();
    let groups = [
        CaveatGroup::new(vec![only_target(TOKEN), value_at_most(0)]),
        CaveatGroup::new(vec![only_target(DAVE), value_at_most(10)]),
    ];

    let pays_dave = root(ALICE, BOB, vec![selector_caveat(&groups, 1, 2)]);
    sandbox
        .redeem_single(addr(BOB), &[pays_dave.clone()], &native_transfer(DAVE, 10))
        .unwrap();
    assert_eq!(balance(&sandbox, native_of(DAVE)), 10);

    let err = sandbox
        .redeem_single(addr(BOB), &[pays_dave], &native_transfer(DAVE, 11))
        .unwrap_err();
    assert_eq!(err.to_string(), "ValueLteEnforcer:value-too-high");

    let token_only = root(ALICE, BOB, vec![selector_caveat(&groups, 0, 2)]);
    let err = sandbox
        .redeem_single(addr(BOB), &[token_only], &native_transfer(DAVE, 1))
        .unwrap_err();
    assert_eq!(err.to_string(), "AllowedTargetsEnforcer:target-address-not-allowed");
}

#[test]
fn selected_group_pairs_lock_hooks() {
    let mut sandbox = sandbox();
    let groups = [CaveatGroup::new(vec![token_guard(20)])];
    let granted = root(ALICE, BOB, vec![selector_caveat(&groups, 0, 1)]);

    sandbox
        .redeem_single(addr(BOB), &[granted.clone()], &token_transfer(BOB, 20))
        .unwrap();
    assert_eq!(sandbox.ledger().open_entries(), 0);

    let err = sandbox
        .redeem_single(addr(BOB), &[granted], &token_transfer(BOB, 21))
        .unwrap_err();
    assert_eq!(err.to_string(), "ERC20BalanceChangeEnforcer:exceeded-balance-decrease");
    assert_eq!(balance(&sandbox, token_of(BOB)), 20);
}

#[test]
fn selector_rejects_bad_selection() {
    let mut sandbox = sandbox();
    let groups = [CaveatGroup::new(vec![only_target(DAVE)])];

    let out_of_range = root(ALICE, BOB, vec![selector_caveat(&groups, 3, 1)]);
    let err = sandbox
        .redeem_single(addr(BOB), &[out_of_range], &native_transfer(DAVE, 1))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
    assert_eq!(err.reason(), "invalid-group-index");

    let short_args = root(ALICE, BOB, vec![selector_caveat(&groups, 0, 0)]);
    let err = sandbox
        .redeem_single(addr(BOB), &[short_args], &native_transfer(DAVE, 1))
        .unwrap_err();
    assert_eq!(err.reason(), "invalid-caveat-args-length");
}

// ---------------------------------------------------------------------------
// Try-all
// ---------------------------------------------------------------------------

fn any_of(groups: &[CaveatGroup]) -> Caveat {
    caveat(ANY_OF_GROUPS, encode_groups(groups).unwrap())
}

#[test]
fn first_satisfied_group_wins_and_failed_groups_leave_no_state() {
    let mut sandbox = sandbox();
    // Both groups guard the same position; group 0 fails after opening its
    // lock, so group 1 can only open the same lock if group 0 was undone.
    let groups = [
        CaveatGroup::new(vec![token_guard(10), only_target(DAVE)]),
        CaveatGroup::new(vec![token_guard(100), value_at_most(0)]),
    ];
    let granted = root(ALICE, BOB, vec![any_of(&groups)]);

    sandbox
        .redeem_single(addr(BOB), &[granted.clone()], &token_transfer(BOB, 50))
        .unwrap();
    assert_eq!(balance(&sandbox, token_of(BOB)), 50);
    assert_eq!(sandbox.ledger().open_entries(), 0);

    // group 1's after hook enforces its own bound
    let err = sandbox
        .redeem_single(addr(BOB), &[granted], &token_transfer(BOB, 150))
        .unwrap_err();
    assert_eq!(err.to_string(), "ERC20BalanceChangeEnforcer:exceeded-balance-decrease");
    assert_eq!(balance(&sandbox, token_of(BOB)), 50);
    assert_eq!(sandbox.ledger().open_entries(), 0);
}

#[test]
fn no_satisfied_group_rejects() {
    let mut sandbox = sandbox();
    let groups = [
        CaveatGroup::new(vec![]),
        CaveatGroup::new(vec![only_target(DAVE)]),
    ];
    let granted = root(ALICE, BOB, vec![any_of(&groups)]);
    let err = sandbox
        .redeem_single(addr(BOB), &[granted], &token_transfer(BOB, 1))
        .unwrap_err();
    assert_eq!(err.to_string(), "AnyOfGroupsEnforcer:no-group-satisfied");
    assert_eq!(sandbox.ledger().open_entries(), 0);
}

#[test]
fn several_try_all_caveats_on_one_delegation() {
    let mut sandbox = sandbox();
    let to_dave = [CaveatGroup::new(vec![only_target(DAVE)])];
    let small = [CaveatGroup::new(vec![value_at_most(10)])];
    let granted = root(ALICE, BOB, vec![any_of(&to_dave), any_of(&small)]);

    sandbox
        .redeem_single(addr(BOB), &[granted.clone()], &native_transfer(DAVE, 5))
        .unwrap();
    assert_eq!(balance(&sandbox, native_of(DAVE)), 5);
    assert_eq!(sandbox.ledger().open_entries(), 0);

    let err = sandbox
        .redeem_single(addr(BOB), &[granted], &native_transfer(DAVE, 11))
        .unwrap_err();
    assert_eq!(err.to_string(), "AnyOfGroupsEnforcer:no-group-satisfied");
}

#[test]
fn identical_try_all_caveats_pair_their_hooks() {
    let mut sandbox = sandbox();
    let groups = [
        CaveatGroup::new(vec![only_target(TOKEN)]),
        CaveatGroup::new(vec![value_at_most(10)]),
    ];
    let granted = root(ALICE, BOB, vec![any_of(&groups), any_of(&groups)]);

    sandbox
        .redeem_single(addr(BOB), &[granted.clone()], &native_transfer(DAVE, 5))
        .unwrap();
    assert_eq!(balance(&sandbox, native_of(DAVE)), 5);
    assert_eq!(sandbox.ledger().open_entries(), 0);

    let err = sandbox
        .redeem_single(addr(BOB), &[granted], &native_transfer(DAVE, 11))
        .unwrap_err();
    assert_eq!(err.to_string(), "AnyOfGroupsEnforcer:no-group-satisfied");
    assert_eq!(sandbox.ledger().open_entries(), 0);
}

// ---------------------------------------------------------------------------
// Payment
// ---------------------------------------------------------------------------

/// Alice's delegation to Bob, payable by Bob with `price` native to Alice.
fn paid_grant(price: u128, salt: u64) -> Delegation {
    let terms = TermsWriter::new().address(addr(ALICE)).word(price).build();
    root(ALICE, BOB, vec![caveat(NATIVE_PAYMENT, terms)]).with_salt(salt)
}

/// Bob's allowance to the payment policy, bound to paying for `primary`.
fn allowance_for(primary: &Delegation) -> Vec<u8> {
    let binding = payment_binding(primary.hash().unwrap(), addr(BOB));
    let allowance = root(BOB, NATIVE_PAYMENT, vec![caveat(ARGS_EQUALITY, binding)]);
    encode_permission_context(&[allowance]).unwrap()
}

fn attach(mut primary: Delegation, args: Vec<u8>) -> Delegation {
    primary.caveats[0].args = args;
    primary
}

#[test]
fn payment_settles_after_the_action() {
    let mut sandbox = sandbox();
    let grant = paid_grant(50, 0);
    let args = allowance_for(&grant);
    let grant = attach(grant, args);

    sandbox
        .redeem_single(addr(BOB), &[grant], &token_transfer(BOB, 10))
        .unwrap();

    assert_eq!(balance(&sandbox, token_of(BOB)), 10);
    assert_eq!(balance(&sandbox, native_of(ALICE)), 1_050);
    assert_eq!(balance(&sandbox, native_of(BOB)), 50);
    assert_eq!(sandbox.ledger().open_entries(), 0);
}

#[test]
fn allowance_cannot_pay_for_another_delegation() {
    let mut sandbox = sandbox();
    let bound_to = paid_grant(50, 0);
    let other = attach(paid_grant(50, 1), allowance_for(&bound_to));

    let err = sandbox
        .redeem_single(addr(BOB), &[other], &token_transfer(BOB, 10))
        .unwrap_err();
    assert_eq!(err.to_string(), "ArgsEqualityCheckEnforcer:different-args-and-terms");
    assert_eq!(balance(&sandbox, token_of(BOB)), 0);
    assert_eq!(balance(&sandbox, native_of(ALICE)), 1_000);
    assert_eq!(balance(&sandbox, native_of(BOB)), 100);
}

#[test]
fn underfunded_payer_aborts_the_redemption() {
    let mut sandbox = sandbox();
    let grant = paid_grant(500, 0);
    let args = allowance_for(&grant);
    let grant = attach(grant, args);

    let err = sandbox
        .redeem_single(addr(BOB), &[grant], &token_transfer(BOB, 10))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::External);
    assert_eq!(balance(&sandbox, token_of(BOB)), 0);
    assert_eq!(balance(&sandbox, native_of(BOB)), 100);
}

#[test]
fn payment_without_allowance_is_malformed() {
    let mut sandbox = sandbox();
    let grant = paid_grant(50, 0);
    let err = sandbox
        .redeem_single(addr(BOB), &[grant], &token_transfer(BOB, 10))
        .unwrap_err();
    assert_eq!(err.to_string(), "NativeTokenPaymentEnforcer:invalid-allowance-delegations");
}
