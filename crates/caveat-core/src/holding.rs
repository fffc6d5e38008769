//! # Holdings
//!
//! What a balance oracle is asked to measure: a holder's position in the
//! native asset or in one token of a given standard.

use serde::{Deserialize, Serialize};

use crate::address::{Address, Word};

/// A measurable position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "standard", rename_all = "kebab-case")]
pub enum Holding {
    /// Native balance of `holder`.
    Native {
        /// Account measured.
        holder: Address,
    },
    /// ERC20 balance of `holder` in `token`.
    Erc20 {
        /// Token contract.
        token: Address,
        /// Account measured.
        holder: Address,
    },
    /// Number of `token` NFTs owned by `holder`.
    Erc721 {
        /// Token contract.
        token: Address,
        /// Account measured.
        holder: Address,
    },
    /// ERC1155 balance of `holder` for token `id`.
    Erc1155 {
        /// Token contract.
        token: Address,
        /// Account measured.
        holder: Address,
        /// Token id.
        id: Word,
    },
}

impl Holding {
    /// The account whose position is measured.
    pub fn holder(&self) -> Address {
        match self {
            Self::Native { holder }
            | Self::Erc20 { holder, .. }
            | Self::Erc721 { holder, .. }
            | Self::Erc1155 { holder, .. } => *holder,
        }
    }

    /// The token contract, if any.
    pub fn token(&self) -> Option<Address> {
        match self {
            Self::Native { .. } => None,
            Self::Erc20 { token, .. }
            | Self::Erc721 { token, .. }
            | Self::Erc1155 { token, .. } => Some(*token),
        }
    }
}

impl std::fmt::Display for Holding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native { holder } => write!(f, "native:{holder}"),
            Self::Erc20 { token, holder } => write!(f, "erc20:{token}:{holder}"),
            Self::Erc721 { token, holder } => write!(f, "erc721:{token}:{holder}"),
            Self::Erc1155 { token, holder, id } => write!(f, "erc1155:{token}:{id}:{holder}"),
        }
    }
}
