//! # Token World
//!
//! In-memory ledger of native balances and token contracts that redeemed
//! actions execute against, and that balance oracles read.
//!
//! Supported actions:
//!
//! - native value transfer (any target, any calldata)
//! - ERC20 `transfer` on a deployed ERC20 contract
//! - ERC721 `transferFrom` on a deployed ERC721 contract (owner only)
//! - ERC1155 `safeTransferFrom` on a deployed ERC1155 contract (holder only)
//!
//! Calls to addresses that are not token contracts only move value. Each
//! action is atomic: on failure the world is unchanged.

use std::collections::BTreeMap;

use caveat_core::calldata::{
    decode_erc1155_safe_transfer_from, decode_erc20_transfer, decode_erc721_transfer_from, selector,
    ERC1155_SAFE_TRANSFER_FROM, ERC20_TRANSFER, ERC721_TRANSFER_FROM,
};
use caveat_core::{Address, CodecError, EnforcerError, Execution, Holding, Word};
use thiserror::Error;

/// Origin used when an action fails.
pub const WORLD_ORIGIN: &str = "TokenWorld";

/// Kind of a deployed token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenContract {
    /// Fungible token.
    Erc20,
    /// Non-fungible token.
    Erc721,
    /// Multi-token.
    Erc1155,
}

/// A failed action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    /// The sender cannot cover the debit.
    #[error("insufficient-balance {0}")]
    InsufficientBalance(Holding),

    /// The sender does not own the NFT.
    #[error("not-token-owner {token}#{id}")]
    NotOwner {
        /// Token contract.
        token: Address,
        /// Token id.
        id: Word,
    },

    /// The calldata names a function the contract does not expose.
    #[error("unsupported-call {0}")]
    UnsupportedCall(Address),

    /// The calldata could not be decoded.
    #[error("malformed-call {0}")]
    Malformed(#[from] CodecError),

    /// A credit would overflow.
    #[error("balance-overflow")]
    Overflow,
}

impl From<WorldError> for EnforcerError {
    fn from(err: WorldError) -> Self {
        EnforcerError::external(WORLD_ORIGIN, err.to_string())
    }
}

/// Balances and ownership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenWorld {
    native: BTreeMap<Address, u128>,
    erc20: BTreeMap<(Address, Address), u128>,
    erc721: BTreeMap<(Address, Word), Address>,
    erc1155: BTreeMap<(Address, Address, Word), u128>,
    contracts: BTreeMap<Address, TokenContract>,
}

impl TokenWorld {
    /// An empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token contract at `address`.
    pub fn deploy_token(&mut self, address: Address, kind: TokenContract) {
        self.contracts.insert(address, kind);
    }

    /// Kind of the contract at `address`, if it is a token.
    pub fn contract(&self, address: &Address) -> Option<TokenContract> {
        self.contracts.get(address).copied()
    }

    /// Credit native value.
    pub fn mint_native(&mut self, holder: Address, amount: u128) {
        let entry = self.native.entry(holder).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Credit ERC20 tokens.
    pub fn mint_erc20(&mut self, token: Address, holder: Address, amount: u128) {
        self.contracts.entry(token).or_insert(TokenContract::Erc20);
        let entry = self.erc20.entry((token, holder)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Assign an NFT.
    pub fn mint_erc721(&mut self, token: Address, id: Word, owner: Address) {
        self.contracts.entry(token).or_insert(TokenContract::Erc721);
        self.erc721.insert((token, id), owner);
    }

    /// Credit ERC1155 tokens of one id.
    pub fn mint_erc1155(
        &mut self,
        token: Address,
        holder: Address,
        id: Word,
        amount: u128,
    ) {
        self.contracts.entry(token).or_insert(TokenContract::Erc1155);
        let entry = self.erc1155.entry((token, holder, id)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Owner of an NFT.
    pub fn owner_of(&self, token: Address, id: Word) -> Option<Address> {
        self.erc721.get(&(token, id)).copied()
    }

    /// Measure a position. Unknown positions read zero.
    pub fn balance_of(&self, holding: &Holding) -> u128 {
        match *holding {
            Holding::Native { holder } => self.native.get(&holder).copied().unwrap_or(0),
            Holding::Erc20 { token, holder } => self.erc20.get(&(token, holder)).copied().unwrap_or(0),
            Holding::Erc721 { token, holder } => self
                .erc721
                .iter()
                .filter(|((t, _), owner)| *t == token && **owner == holder)
                .count() as u128,
            Holding::Erc1155 { token, holder, id } => {
                self.erc1155.get(&(token, holder, id)).copied().unwrap_or(0)
            }
        }
    }

    /// Execute `action` from `sender`'s account. Leaves the world unchanged
    /// on failure.
    pub fn execute(&mut self, sender: Address, action: &Execution) -> Result<(), WorldError> {
        let mut next = self.clone();
        next.apply(sender, action)?;
        *self = next;
        Ok(())
    }

    fn apply(&mut self, sender: Address, action: &Execution) -> Result<(), WorldError> {
        if action.value > 0 {
            debit(&mut self.native, sender, action.value, Holding::Native { holder: sender })?;
            credit(&mut self.native, action.target, action.value)?;
        }
        let Some(kind) = self.contract(&action.target) else {
            return Ok(());
        };
        if action.calldata.is_empty() {
            return Ok(());
        }
        let token = action.target;
        match (kind, selector(&action.calldata)) {
            (TokenContract::Erc20, Some(ERC20_TRANSFER)) => {
                let (to, amount) = decode_erc20_transfer(&action.calldata)?;
                let holding = Holding::Erc20 {
                    token,
                    holder: sender,
                };
                debit(&mut self.erc20, (token, sender), amount, holding)?;
                credit(&mut self.erc20, (token, to), amount)?;
            }
            (TokenContract::Erc721, Some(ERC721_TRANSFER_FROM)) => {
                let (from, to, id) = decode_erc721_transfer_from(&action.calldata)?;
                if from != sender || self.owner_of(token, id) != Some(sender) {
                    return Err(WorldError::NotOwner { token, id });
                }
                self.erc721.insert((token, id), to);
            }
            (TokenContract::Erc1155, Some(ERC1155_SAFE_TRANSFER_FROM)) => {
                let (from, to, id, amount) = decode_erc1155_safe_transfer_from(&action.calldata)?;
                let holding = Holding::Erc1155 {
                    token,
                    holder: sender,
                    id,
                };
                if from != sender {
                    return Err(WorldError::InsufficientBalance(holding));
                }
                debit(&mut self.erc1155, (token, sender, id), amount, holding)?;
                credit(&mut self.erc1155, (token, to, id), amount)?;
            }
            _ => return Err(WorldError::UnsupportedCall(token)),
        }
        tracing::trace!(sender = %sender, target = %token, "token call executed");
        Ok(())
    }
}

fn debit<K: Ord>(
    balances: &mut BTreeMap<K, u128>,
    key: K,
    amount: u128,
    holding: Holding,
) -> Result<(), WorldError> {
    let balance = balances.get(&key).copied().unwrap_or(0);
    let rest = balance
        .checked_sub(amount)
        .ok_or(WorldError::InsufficientBalance(holding))?;
    balances.insert(key, rest);
    Ok(())
}

fn credit<K: Ord>(balances: &mut BTreeMap<K, u128>, key: K, amount: u128) -> Result<(), WorldError> {
    let entry = balances.entry(key).or_insert(0);
    *entry = entry.checked_add(amount).ok_or(WorldError::Overflow)?;
    Ok(())
}
