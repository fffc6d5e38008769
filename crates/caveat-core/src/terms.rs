//! # Packed Terms
//!
//! Most policies take fixed-width packed terms: 1-byte flags, 20-byte
//! addresses, 16-byte half words, 32-byte words, 4-byte selectors,
//! concatenated without padding. `PackedTerms` walks such a blob field by
//! field; `TermsWriter` produces one.
//!
//! Amount words are big-endian and decoded into `u128`. An amount word whose
//! upper 16 bytes are non-zero is rejected, never truncated. Identifier
//! words (token ids, one-time ids) are read whole as [`Word`].

use crate::address::{Address, DelegationHash, Word};
use crate::error::CodecError;

/// Decode a 32-byte big-endian word into `u128`.
pub fn read_word(bytes: &[u8], field: &'static str) -> Result<u128, CodecError> {
    if bytes.len() != 32 {
        return Err(CodecError::Length {
            field,
            expected: 32,
            actual: bytes.len(),
        });
    }
    if bytes[..16].iter().any(|b| *b != 0) {
        return Err(CodecError::AmountOverflow { field });
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&bytes[16..]);
    Ok(u128::from_be_bytes(low))
}

/// Append a `u128` as a 32-byte big-endian word.
pub fn write_word(out: &mut Vec<u8>, value: u128) {
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&value.to_be_bytes());
}

/// Cursor over a packed terms blob.
#[derive(Debug, Clone)]
pub struct PackedTerms<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> PackedTerms<'a> {
    /// Wrap a blob that must be exactly `expected` bytes long.
    pub fn exact(bytes: &'a [u8], expected: usize) -> Result<Self, CodecError> {
        if bytes.len() != expected {
            return Err(CodecError::Length {
                field: "terms",
                expected,
                actual: bytes.len(),
            });
        }
        Ok(Self { bytes, offset: 0 })
    }

    /// Wrap a blob without a length requirement.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], CodecError> {
        let end = self.offset + n;
        if end > self.bytes.len() {
            return Err(CodecError::Length {
                field,
                expected: n,
                actual: self.bytes.len().saturating_sub(self.offset),
            });
        }
        let slice = &self.bytes[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    /// Read one byte.
    pub fn byte(&mut self, field: &'static str) -> Result<u8, CodecError> {
        Ok(self.take(1, field)?[0])
    }

    /// Read a 20-byte address.
    pub fn address(&mut self, field: &'static str) -> Result<Address, CodecError> {
        Address::from_slice(self.take(20, field)?)
    }

    /// Read a 32-byte word as `u128`.
    pub fn word(&mut self, field: &'static str) -> Result<u128, CodecError> {
        read_word(self.take(32, field)?, field)
    }

    /// Read a 32-byte identifier word without narrowing.
    pub fn id_word(&mut self, field: &'static str) -> Result<Word, CodecError> {
        Word::from_slice(self.take(32, field)?)
    }

    /// Read a 32-byte word that must fit in `u64` (timestamps, durations).
    pub fn word_u64(&mut self, field: &'static str) -> Result<u64, CodecError> {
        let value = self.word(field)?;
        u64::try_from(value).map_err(|_| CodecError::AmountOverflow { field })
    }

    /// Read a 16-byte half word as `u128`.
    pub fn half_word(&mut self, field: &'static str) -> Result<u128, CodecError> {
        let bytes = self.take(16, field)?;
        let mut arr = [0u8; 16];
        arr.copy_from_slice(bytes);
        Ok(u128::from_be_bytes(arr))
    }

    /// Read a 32-byte delegation hash.
    pub fn hash(&mut self, field: &'static str) -> Result<DelegationHash, CodecError> {
        DelegationHash::from_slice(self.take(32, field)?)
    }

    /// Read a 4-byte selector.
    pub fn selector(&mut self, field: &'static str) -> Result<[u8; 4], CodecError> {
        let bytes = self.take(4, field)?;
        let mut arr = [0u8; 4];
        arr.copy_from_slice(bytes);
        Ok(arr)
    }

    /// Everything not yet consumed.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.offset..];
        self.offset = self.bytes.len();
        rest
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }
}

/// Split a blob into fixed-size entries (allow-lists of addresses/selectors).
///
/// Rejects an empty blob and any blob whose length is not a multiple of
/// `width`.
pub fn fixed_entries(bytes: &[u8], width: usize) -> Result<std::slice::Chunks<'_, u8>, CodecError> {
    if bytes.is_empty() || bytes.len() % width != 0 {
        return Err(CodecError::Length {
            field: "terms entries",
            expected: width,
            actual: bytes.len(),
        });
    }
    Ok(bytes.chunks(width))
}

/// Builder for packed terms.
#[derive(Debug, Clone, Default)]
pub struct TermsWriter {
    out: Vec<u8>,
}

impl TermsWriter {
    /// Start an empty blob.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one byte.
    pub fn byte(mut self, value: u8) -> Self {
        self.out.push(value);
        self
    }

    /// Append a boolean flag byte.
    pub fn flag(self, value: bool) -> Self {
        self.byte(u8::from(value))
    }

    /// Append a 20-byte address.
    pub fn address(mut self, address: Address) -> Self {
        self.out.extend_from_slice(address.as_bytes());
        self
    }

    /// Append a 32-byte word.
    pub fn word(mut self, value: u128) -> Self {
        write_word(&mut self.out, value);
        self
    }

    /// Append a 32-byte identifier word.
    pub fn id_word(mut self, word: Word) -> Self {
        self.out.extend_from_slice(word.as_bytes());
        self
    }

    /// Append a 16-byte half word.
    pub fn half_word(mut self, value: u128) -> Self {
        self.out.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Append a 32-byte hash.
    pub fn hash(mut self, hash: DelegationHash) -> Self {
        self.out.extend_from_slice(hash.as_bytes());
        self
    }

    /// Append raw bytes.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.out.extend_from_slice(bytes);
        self
    }

    /// Finish the blob.
    pub fn build(self) -> Vec<u8> {
        self.out
    }
}
