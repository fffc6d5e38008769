//! Shared deployment and actors for the sandbox integration tests.

#![allow(dead_code)]

use caveat_core::calldata::encode_erc20_transfer;
use caveat_core::{Address, Caveat, Delegation, Execution, Holding};
use caveat_sandbox::{init_test_tracing, Sandbox};

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

pub const MANIFEST: &str = r#"
delegation_manager: "0x00000000000000000000000000000000000000dd"
enforcers:
  - { address: "0x0000000000000000000000000000000000000101", kind: allowed-targets }
  - { address: "0x0000000000000000000000000000000000000102", kind: allowed-methods }
  - { address: "0x0000000000000000000000000000000000000103", kind: value-lte }
  - { address: "0x0000000000000000000000000000000000000104", kind: timestamp }
  - { address: "0x0000000000000000000000000000000000000105", kind: limited-calls }
  - { address: "0x0000000000000000000000000000000000000106", kind: args-equality-check }
  - { address: "0x0000000000000000000000000000000000000107", kind: id }
  - { address: "0x0000000000000000000000000000000000000110", kind: native-token-balance-change }
  - { address: "0x0000000000000000000000000000000000000111", kind: erc20-balance-change }
  - { address: "0x0000000000000000000000000000000000000112", kind: erc721-balance-change }
  - { address: "0x0000000000000000000000000000000000000113", kind: erc20-total-balance-change }
  - { address: "0x0000000000000000000000000000000000000120", kind: erc20-period-transfer }
  - { address: "0x0000000000000000000000000000000000000121", kind: erc20-streaming }
  - { address: "0x0000000000000000000000000000000000000122", kind: native-token-chunked-streaming }
  - { address: "0x0000000000000000000000000000000000000130", kind: logical-or-wrapper }
  - { address: "0x0000000000000000000000000000000000000131", kind: any-of-groups }
  - address: "0x0000000000000000000000000000000000000140"
    kind: native-token-payment
    args_equality_enforcer: "0x0000000000000000000000000000000000000106"
"#;

pub fn addr(n: u64) -> Address {
    Address::from_low_u64(n)
}

pub const DELEGATION_MANAGER: u64 = 0xdd;
pub const ALLOWED_TARGETS: u64 = 0x101;
pub const ALLOWED_METHODS: u64 = 0x102;
pub const VALUE_LTE: u64 = 0x103;
pub const TIMESTAMP: u64 = 0x104;
pub const LIMITED_CALLS: u64 = 0x105;
pub const ARGS_EQUALITY: u64 = 0x106;
pub const ONE_TIME_ID: u64 = 0x107;
pub const NATIVE_BALANCE_CHANGE: u64 = 0x110;
pub const ERC20_BALANCE_CHANGE: u64 = 0x111;
pub const ERC721_BALANCE_CHANGE: u64 = 0x112;
pub const ERC20_TOTAL_BALANCE_CHANGE: u64 = 0x113;
pub const ERC20_PERIOD_TRANSFER: u64 = 0x120;
pub const ERC20_STREAMING: u64 = 0x121;
pub const NATIVE_CHUNKED_STREAMING: u64 = 0x122;
pub const LOGICAL_OR: u64 = 0x130;
pub const ANY_OF_GROUPS: u64 = 0x131;
pub const NATIVE_PAYMENT: u64 = 0x140;

// ---------------------------------------------------------------------------
// Actors and assets
// ---------------------------------------------------------------------------

pub const ALICE: u64 = 0xa1;
pub const BOB: u64 = 0xb0;
pub const CAROL: u64 = 0xc0;
pub const DAVE: u64 = 0xd0;
pub const TOKEN: u64 = 0x70;
pub const NFT: u64 = 0x71;

pub const GENESIS: u64 = 1_700_000_000;

/// A sandbox with every policy deployed, Alice holding 1 000 native and
/// 1 000 `TOKEN`, and Bob holding 100 native.
pub fn sandbox() -> Sandbox {
    init_test_tracing();
    let mut sandbox = Sandbox::from_manifest(MANIFEST, GENESIS).unwrap();
    let world = sandbox.world_mut();
    world.mint_native(addr(ALICE), 1_000);
    world.mint_native(addr(BOB), 100);
    world.mint_erc20(addr(TOKEN), addr(ALICE), 1_000);
    sandbox
}

pub fn native_of(holder: u64) -> Holding {
    Holding::Native { holder: addr(holder) }
}

pub fn token_of(holder: u64) -> Holding {
    Holding::Erc20 {
        token: addr(TOKEN),
        holder: addr(holder),
    }
}

pub fn balance(sandbox: &Sandbox, holding: Holding) -> u128 {
    sandbox.world().balance_of(&holding)
}

/// ERC20 transfer of `TOKEN` to `to`.
pub fn token_transfer(to: u64, amount: u128) -> Execution {
    Execution::new(addr(TOKEN), 0, encode_erc20_transfer(addr(to), amount))
}

/// Native value transfer to `to`.
pub fn native_transfer(to: u64, amount: u128) -> Execution {
    Execution::new(addr(to), amount, Vec::new())
}

pub fn caveat(enforcer: u64, terms: Vec<u8>) -> Caveat {
    Caveat::new(addr(enforcer), terms)
}

/// Root delegation from `delegator` to `delegate`.
pub fn root(delegator: u64, delegate: u64, caveats: Vec<Caveat>) -> Delegation {
    caveats
        .into_iter()
        .fold(Delegation::root(addr(delegator), addr(delegate)), Delegation::with_caveat)
}

/// Re-delegation of `parent` by its delegate to `delegate`.
pub fn child(parent: &Delegation, delegate: u64, caveats: Vec<Caveat>) -> Delegation {
    let start = Delegation::child_of(parent.hash().unwrap(), parent.delegate, addr(delegate));
    caveats.into_iter().fold(start, Delegation::with_caveat)
}
