//! # Digests and Composite State Keys
//!
//! SHA-256 over canonical bytes, and the composite key that addresses every
//! piece of shared accounting state.
//!
//! ## Security Invariant
//!
//! A `StateKey` can only be derived from a [`KeyMaterial`], and the material
//! is hashed through `CanonicalBytes`. Key derivation is a pure function of
//! (enforcer, caller context, resource parts): two hooks compute the same
//! key iff they name the same enforcer, the same invoking coordinator and
//! the same ordered resource parts. Nothing depends on map iteration order
//! or incidental storage layout.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::{Address, DelegationHash, Word};
use crate::canonical::CanonicalBytes;
use crate::error::CanonicalizationError;

/// Compute a SHA-256 digest from canonical bytes.
///
/// Accepts only `&CanonicalBytes`, not raw `&[u8]`, so every hash in the
/// stack is taken over a canonical encoding.
pub fn sha256_digest(data: &CanonicalBytes) -> [u8; 32] {
    let hash = Sha256::digest(data.as_bytes());
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    bytes
}

/// A composite key addressing one accounting entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateKey(pub [u8; 32]);

impl StateKey {
    /// Start building key material for an enforcer invoked by `caller`.
    pub fn builder(enforcer: Address, caller: Address) -> KeyMaterial {
        KeyMaterial {
            enforcer,
            caller,
            parts: Vec::new(),
        }
    }

    /// Render as lowercase hex (no prefix), for log fields.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Ordered material hashed into a [`StateKey`].
///
/// `enforcer` plays the role of per-contract storage; `caller` is the
/// invoking coordinator (or composing enforcer). Parts are tagged so that an
/// address and a word with the same hex digits cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyMaterial {
    enforcer: Address,
    caller: Address,
    parts: Vec<String>,
}

impl KeyMaterial {
    /// Append an address part (token, recipient, delegator …).
    pub fn address(mut self, address: Address) -> Self {
        self.parts.push(format!("address:{address}"));
        self
    }

    /// Append a delegation-hash part.
    pub fn delegation(mut self, hash: DelegationHash) -> Self {
        self.parts.push(format!("delegation:{hash}"));
        self
    }

    /// Append a numeric part (run index, period …).
    pub fn word(mut self, value: u128) -> Self {
        self.parts.push(format!("word:{value}"));
        self
    }

    /// Append a raw byte part (policy terms).
    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.parts.push(format!("bytes:0x{}", hex::encode(value)));
        self
    }

    /// Append an identifier part (token id, one-time id).
    pub fn id(mut self, value: Word) -> Self {
        self.parts.push(format!("id:{value}"));
        self
    }

    /// Hash the material into a key.
    pub fn finish(self) -> Result<StateKey, CanonicalizationError> {
        let canonical = CanonicalBytes::new(&self)?;
        Ok(StateKey(sha256_digest(&canonical)))
    }
}
