//! # Canonical JSON
//!
//! `CanonicalBytes` is how every hashed or structured byte string in the
//! workspace is made: delegation hashes, composite state keys, caveat
//! groups, group selections, permission contexts and batch payloads.
//!
//! Construction goes through serde_json and then RFC 8785 (JCS) via
//! `serde_jcs`, so keys are sorted and separators compact. Floats are
//! rejected anywhere in the tree; `u128` amounts travel as decimal strings
//! (see [`crate::address::amount_string`]). Equal values give equal bytes,
//! so two delegators authoring the same group produce the same terms and
//! two enforcers deriving a key from the same material get the same
//! `StateKey`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CanonicalizationError, CodecError};

/// Canonical JSON bytes. The field is private; `new` is the only way in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize `obj`.
    ///
    /// Fails with `FloatRejected` for any float in the value tree and with
    /// `SerializationFailed` when serde or JCS serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        if let Some(f) = find_float(&value) {
            return Err(CanonicalizationError::FloatRejected(f));
        }
        Ok(Self(serde_jcs::to_vec(&value)?))
    }

    /// Access the canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume into the owned byte vector (e.g. to use as a terms blob).
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

/// Decode a structured payload previously produced by [`CanonicalBytes::new`].
///
/// Decoding is lenient about key order and whitespace; only the shape is
/// checked. Callers that need byte-exact matching compare re-encoded bytes.
pub fn decode_structured<T: DeserializeOwned>(
    bytes: &[u8],
    field: &'static str,
) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|e| CodecError::Structured {
        field,
        reason: e.to_string(),
    })
}

/// First float found anywhere in `value`, depth first.
fn find_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) if !n.is_i64() && !n.is_u64() => n.as_f64(),
        Value::Array(items) => items.iter().find_map(find_float),
        Value::Object(map) => map.values().find_map(find_float),
        _ => None,
    }
}
