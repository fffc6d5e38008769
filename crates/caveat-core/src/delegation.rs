//! # Delegation Records
//!
//! A delegation grants `delegate` the right to act for `delegator`, subject
//! to its caveats. Chains link a leaf delegation back to a root through the
//! `authority` field: every non-root authority is the hash of the parent
//! delegation, and the root carries [`ROOT_AUTHORITY`].
//!
//! ## Security Invariant
//!
//! The delegation hash covers delegate, delegator, authority, salt and each
//! caveat's enforcer and terms, but never caveat `args`. Args are supplied by
//! the redeemer at redemption time and must not change the identity of the
//! delegation they are attached to.

use serde::{Deserialize, Serialize};

use crate::address::{hex_bytes, Address, DelegationHash, ROOT_AUTHORITY};
use crate::canonical::{decode_structured, CanonicalBytes};
use crate::digest::sha256_digest;
use crate::error::{CanonicalizationError, CodecError};

/// One policy attached to a delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caveat {
    /// Address at which the policy is deployed.
    pub enforcer: Address,
    /// Delegator-authored, immutable policy parameters.
    #[serde(with = "hex_bytes")]
    pub terms: Vec<u8>,
    /// Redeemer-supplied runtime arguments.
    #[serde(with = "hex_bytes", default)]
    pub args: Vec<u8>,
}

impl Caveat {
    /// A caveat with empty args.
    pub fn new(enforcer: Address, terms: Vec<u8>) -> Self {
        Self {
            enforcer,
            terms,
            args: Vec::new(),
        }
    }

    /// Attach redeemer args.
    pub fn with_args(mut self, args: Vec<u8>) -> Self {
        self.args = args;
        self
    }
}

/// A signed-off grant of authority (signatures are out of scope here).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegation {
    /// Who may redeem.
    pub delegate: Address,
    /// Who grants.
    pub delegator: Address,
    /// Hash of the parent delegation, or [`ROOT_AUTHORITY`].
    pub authority: DelegationHash,
    /// Attached policies, evaluated in order.
    pub caveats: Vec<Caveat>,
    /// Disambiguates otherwise identical delegations.
    pub salt: u64,
}

#[derive(Serialize)]
struct HashedCaveat<'a> {
    enforcer: Address,
    #[serde(with = "hex_bytes")]
    terms: &'a Vec<u8>,
}

#[derive(Serialize)]
struct HashedDelegation<'a> {
    delegate: Address,
    delegator: Address,
    authority: DelegationHash,
    caveats: Vec<HashedCaveat<'a>>,
    salt: u64,
}

impl Delegation {
    /// A root delegation with no caveats.
    pub fn root(delegator: Address, delegate: Address) -> Self {
        Self {
            delegate,
            delegator,
            authority: ROOT_AUTHORITY,
            caveats: Vec::new(),
            salt: 0,
        }
    }

    /// A child delegation re-delegating `parent`.
    pub fn child_of(parent: DelegationHash, delegator: Address, delegate: Address) -> Self {
        Self {
            delegate,
            delegator,
            authority: parent,
            caveats: Vec::new(),
            salt: 0,
        }
    }

    /// Append a caveat.
    pub fn with_caveat(mut self, caveat: Caveat) -> Self {
        self.caveats.push(caveat);
        self
    }

    /// Set the salt.
    pub fn with_salt(mut self, salt: u64) -> Self {
        self.salt = salt;
        self
    }

    /// Whether this delegation sits at the root of its chain.
    pub fn is_root(&self) -> bool {
        self.authority == ROOT_AUTHORITY
    }

    /// The delegation identifier. Caveat args are excluded.
    pub fn hash(&self) -> Result<DelegationHash, CanonicalizationError> {
        let view = HashedDelegation {
            delegate: self.delegate,
            delegator: self.delegator,
            authority: self.authority,
            caveats: self
                .caveats
                .iter()
                .map(|c| HashedCaveat {
                    enforcer: c.enforcer,
                    terms: &c.terms,
                })
                .collect(),
            salt: self.salt,
        };
        Ok(DelegationHash(sha256_digest(&CanonicalBytes::new(&view)?)))
    }
}

/// Encode a leaf-first delegation chain as a permission context.
pub fn encode_permission_context(
    chain: &[Delegation],
) -> Result<Vec<u8>, CanonicalizationError> {
    Ok(CanonicalBytes::new(&chain)?.into_bytes())
}

/// Decode a permission context into its leaf-first delegation chain.
pub fn decode_permission_context(bytes: &[u8]) -> Result<Vec<Delegation>, CodecError> {
    decode_structured(bytes, "permission context")
}
