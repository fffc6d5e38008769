//! # caveat-sandbox — Reference Delegation Coordinator
//!
//! Hosts caveat enforcers the way a delegation manager does, over an
//! in-memory token world, so policies can be exercised end to end.
//!
//! ## Architecture
//!
//! - **World** (`world.rs`): native, ERC20, ERC721 and ERC1155 positions and
//!   atomic execution of transfer actions.
//!
//! - **Chain** (`chain.rs`): implements [`caveat_enforcer::Host`]. Validates
//!   delegation chains, drives the four lifecycle hooks in order, executes
//!   actions, serves nested redemptions and journals the world for
//!   checkpoints.
//!
//! - **Sandbox** (`sandbox.rs`): chain plus ledger, with full rollback of
//!   both when a redemption fails.
//!
//! ## Crate Policy
//!
//! - Test and simulation infrastructure only; no signatures, no gas.
//! - `tracing-subscriber` is initialized only through [`init_test_tracing`].

pub mod chain;
pub mod sandbox;
pub mod world;

pub use chain::{Chain, COORDINATOR_ORIGIN};
pub use sandbox::{Sandbox, SandboxError};
pub use world::{TokenContract, TokenWorld, WorldError};

/// Install a test-friendly subscriber honouring `RUST_LOG` (default `warn`).
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
