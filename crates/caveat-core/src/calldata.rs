//! # Token Call Data
//!
//! ABI layouts of the three token transfer calls policies inspect or
//! construct. Arguments are 32-byte words; addresses are left-padded.
//!
//! | Call | Selector | Length |
//! |---|---|---|
//! | ERC20 `transfer(address,uint256)` | `a9059cbb` | 68 |
//! | ERC721 `transferFrom(address,address,uint256)` | `23b872dd` | 100 |
//! | ERC1155 `safeTransferFrom(address,address,uint256,uint256,bytes)` | `f242432a` | ≥ 196 |

use crate::address::{Address, Word};
use crate::error::CodecError;
use crate::terms::{read_word, write_word};

/// ERC20 `transfer(address,uint256)`.
pub const ERC20_TRANSFER: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
/// ERC721 `transferFrom(address,address,uint256)`.
pub const ERC721_TRANSFER_FROM: [u8; 4] = [0x23, 0xb8, 0x72, 0xdd];
/// ERC1155 `safeTransferFrom(address,address,uint256,uint256,bytes)`.
pub const ERC1155_SAFE_TRANSFER_FROM: [u8; 4] = [0xf2, 0x42, 0x43, 0x2a];

/// Exact length of ERC20 `transfer` call data.
pub const ERC20_TRANSFER_LEN: usize = 4 + 32 * 2;
/// Exact length of ERC721 `transferFrom` call data.
pub const ERC721_TRANSFER_FROM_LEN: usize = 4 + 32 * 3;
/// Minimum length of ERC1155 `safeTransferFrom` call data.
pub const ERC1155_SAFE_TRANSFER_FROM_MIN_LEN: usize = 4 + 32 * 6;

/// The 4-byte selector of a call, if present.
pub fn selector(calldata: &[u8]) -> Option<[u8; 4]> {
    calldata.get(..4).map(|s| [s[0], s[1], s[2], s[3]])
}

fn address_word(out: &mut Vec<u8>, address: Address) {
    out.extend_from_slice(&[0u8; 12]);
    out.extend_from_slice(address.as_bytes());
}

fn read_address_word(word: &[u8], field: &'static str) -> Result<Address, CodecError> {
    if word[..12].iter().any(|b| *b != 0) {
        return Err(CodecError::DirtyAddress { field });
    }
    Address::from_slice(&word[12..32])
}

fn write_id(out: &mut Vec<u8>, id: Word) {
    out.extend_from_slice(id.as_bytes());
}

fn arg(calldata: &[u8], index: usize) -> &[u8] {
    &calldata[4 + 32 * index..4 + 32 * (index + 1)]
}

fn check_call(
    calldata: &[u8],
    selector_expected: [u8; 4],
    min_len: usize,
    field: &'static str,
) -> Result<(), CodecError> {
    if calldata.len() < min_len {
        return Err(CodecError::Length {
            field,
            expected: min_len,
            actual: calldata.len(),
        });
    }
    if selector(calldata) != Some(selector_expected) {
        return Err(CodecError::Structured {
            field,
            reason: "selector mismatch".into(),
        });
    }
    Ok(())
}

/// Encode ERC20 `transfer(to, amount)`.
pub fn encode_erc20_transfer(to: Address, amount: u128) -> Vec<u8> {
    let mut out = ERC20_TRANSFER.to_vec();
    address_word(&mut out, to);
    write_word(&mut out, amount);
    out
}

/// Decode ERC20 `transfer` call data into `(to, amount)`.
pub fn decode_erc20_transfer(calldata: &[u8]) -> Result<(Address, u128), CodecError> {
    check_call(calldata, ERC20_TRANSFER, ERC20_TRANSFER_LEN, "erc20 transfer")?;
    Ok((
        read_address_word(arg(calldata, 0), "erc20 transfer recipient")?,
        read_word(arg(calldata, 1), "erc20 transfer amount")?,
    ))
}

/// Encode ERC721 `transferFrom(from, to, token_id)`.
pub fn encode_erc721_transfer_from(from: Address, to: Address, token_id: Word) -> Vec<u8> {
    let mut out = ERC721_TRANSFER_FROM.to_vec();
    address_word(&mut out, from);
    address_word(&mut out, to);
    write_id(&mut out, token_id);
    out
}

/// Decode ERC721 `transferFrom` into `(from, to, token_id)`.
pub fn decode_erc721_transfer_from(
    calldata: &[u8],
) -> Result<(Address, Address, Word), CodecError> {
    check_call(
        calldata,
        ERC721_TRANSFER_FROM,
        ERC721_TRANSFER_FROM_LEN,
        "erc721 transferFrom",
    )?;
    Ok((
        read_address_word(arg(calldata, 0), "erc721 from")?,
        read_address_word(arg(calldata, 1), "erc721 to")?,
        Word::from_slice(arg(calldata, 2))?,
    ))
}

/// Encode ERC1155 `safeTransferFrom(from, to, id, amount, "")`.
pub fn encode_erc1155_safe_transfer_from(
    from: Address,
    to: Address,
    token_id: Word,
    amount: u128,
) -> Vec<u8> {
    let mut out = ERC1155_SAFE_TRANSFER_FROM.to_vec();
    address_word(&mut out, from);
    address_word(&mut out, to);
    write_id(&mut out, token_id);
    write_word(&mut out, amount);
    // offset of the empty `bytes` argument, then its zero length
    write_word(&mut out, 0xa0);
    write_word(&mut out, 0);
    out
}

/// Decode ERC1155 `safeTransferFrom` into `(from, to, id, amount)`.
pub fn decode_erc1155_safe_transfer_from(
    calldata: &[u8],
) -> Result<(Address, Address, Word, u128), CodecError> {
    check_call(
        calldata,
        ERC1155_SAFE_TRANSFER_FROM,
        ERC1155_SAFE_TRANSFER_FROM_MIN_LEN,
        "erc1155 safeTransferFrom",
    )?;
    Ok((
        read_address_word(arg(calldata, 0), "erc1155 from")?,
        read_address_word(arg(calldata, 1), "erc1155 to")?,
        Word::from_slice(arg(calldata, 2))?,
        read_word(arg(calldata, 3), "erc1155 amount")?,
    ))
}
