//! Minimal Solidity ABI support: the event topics the decoder recognizes, the view-function
//! selectors the chain reader calls, and 32-byte word encoding/decoding.
//!
//! Only the shapes this crate needs are supported: static `uint256`/`address` words and a
//! single dynamic `string` return value.

use crate::types::Hash32;

const fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => panic!("invalid hex digit in topic constant"),
    }
}

const fn topic(s: &str) -> Hash32 {
    let b = s.as_bytes();
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        out[i] = (hex_nibble(b[2 + 2 * i]) << 4) | hex_nibble(b[3 + 2 * i]);
        i += 1;
    }
    Hash32(out)
}

/// `Transfer(address,address,uint256)`, shared by fungible and ownership-style tokens.
pub const TRANSFER_TOPIC: Hash32 =
    topic("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// `DelegateChanged(address,address,address)`.
pub const DELEGATE_CHANGED_TOPIC: Hash32 =
    topic("0x3134e8a2e6d97e929a7e54011ea5485d7d196dd5f0ba4d4ef95803e8e3fc257f");

/// `DelegateVotesChanged(address,uint256,uint256)`. The ownership-standard variant names its
/// fields `previousBalance`/`newBalance` but has the same signature and topic.
pub const DELEGATE_VOTES_CHANGED_TOPIC: Hash32 =
    topic("0xdec2bacdd2f05b59de34da9b523dff8be42e5e38e818c82fdb0bae774387a724");

/// `CLOCK_MODE()` (ERC-6372).
pub const CLOCK_MODE_SELECTOR: [u8; 4] = [0x4b, 0xf5, 0xd7, 0xe9];
/// `clock()` (ERC-6372).
pub const CLOCK_SELECTOR: [u8; 4] = [0x91, 0xdd, 0xad, 0xf4];
/// `quorum(uint256)` (Governor).
pub const QUORUM_SELECTOR: [u8; 4] = [0xf8, 0xce, 0x56, 0x0a];
/// `decimals()` (ERC-20).
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// Errors raised while decoding ABI-encoded data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("data too short: needed {needed} bytes, got {actual}")]
    TooShort { needed: usize, actual: usize },
    #[error("uint256 value does not fit in 128 bits")]
    Overflow,
    #[error("string is not valid utf-8")]
    InvalidUtf8,
}

/// Encodes a call with the given selector and static `uint256` arguments.
#[must_use]
pub fn encode_call(selector: [u8; 4], args: &[u128]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + args.len() * 32);
    out.extend_from_slice(&selector);
    for arg in args {
        out.extend_from_slice(&encode_uint(*arg));
    }
    out
}

/// Encodes a `u128` as a big-endian 32-byte word.
#[must_use]
pub fn encode_uint(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Decodes a 32-byte big-endian word into a `u128`, rejecting values wider than 128 bits.
///
/// # Errors
///
/// Returns [`AbiError::TooShort`] if fewer than 32 bytes are given and [`AbiError::Overflow`]
/// if any of the high 16 bytes are set.
pub fn word_to_u128(word: &[u8]) -> Result<u128, AbiError> {
    if word.len() < 32 {
        return Err(AbiError::TooShort { needed: 32, actual: word.len() });
    }
    if word[..16].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow);
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..32]);
    Ok(u128::from_be_bytes(low))
}

/// Decodes the `index`-th static `uint256` word of `data`.
///
/// # Errors
///
/// See [`word_to_u128`].
pub fn decode_uint(data: &[u8], index: usize) -> Result<u128, AbiError> {
    let start = index * 32;
    let end = start + 32;
    if data.len() < end {
        return Err(AbiError::TooShort { needed: end, actual: data.len() });
    }
    word_to_u128(&data[start..end])
}

/// Decodes a return value consisting of a single dynamic `string`.
///
/// # Errors
///
/// Returns an [`AbiError`] if the offset/length words are out of range or the bytes are not
/// valid UTF-8.
pub fn decode_string(data: &[u8]) -> Result<String, AbiError> {
    let offset = usize::try_from(decode_uint(data, 0)?).map_err(|_| AbiError::Overflow)?;
    let len_end = offset.checked_add(32).ok_or(AbiError::Overflow)?;
    if data.len() < len_end {
        return Err(AbiError::TooShort { needed: len_end, actual: data.len() });
    }
    let len = usize::try_from(word_to_u128(&data[offset..len_end])?)
        .map_err(|_| AbiError::Overflow)?;
    let end = len_end.checked_add(len).ok_or(AbiError::Overflow)?;
    if data.len() < end {
        return Err(AbiError::TooShort { needed: end, actual: data.len() });
    }
    String::from_utf8(data[len_end..end].to_vec()).map_err(|_| AbiError::InvalidUtf8)
}
