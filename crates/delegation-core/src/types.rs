//! Core value types shared by the ledger, the event decoder, and the chain reader.
//!
//! # Type Categories
//!
//! ## Chain Primitives
//! - [`Address`]: 20-byte account address
//! - [`Hash32`]: 32-byte hash (transaction hashes, log topics)
//!
//! ## JSON-RPC Protocol Types
//! - [`JsonRpcRequest`], [`JsonRpcResponse`], [`JsonRpcError`]: the subset of JSON-RPC 2.0 the
//!   chain reader speaks to its endpoints
//!
//! All chain primitives parse from and display as lowercase `0x`-prefixed hex, and serialize
//! through serde as the same strings so raw `eth_getLogs` payloads deserialize directly.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{borrow::Cow, fmt, str::FromStr, sync::Arc};

/// JSON-RPC protocol version constant to avoid repeated allocations.
pub const JSONRPC_VERSION: &str = "2.0";

/// Pre-allocated `Cow` for the JSON-RPC version.
pub const JSONRPC_VERSION_COW: Cow<'static, str> = Cow::Borrowed(JSONRPC_VERSION);

/// Error type for hex value parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexParseError {
    #[error("missing 0x prefix")]
    MissingPrefix,
    #[error("invalid hex: {0}")]
    InvalidHex(String),
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("quantity out of range: {0}")]
    OutOfRange(String),
}

fn decode_fixed<const N: usize>(value: &str) -> Result<[u8; N], HexParseError> {
    let hex_str = value.strip_prefix("0x").ok_or(HexParseError::MissingPrefix)?;

    let bytes = hex::decode(hex_str).map_err(|e| HexParseError::InvalidHex(e.to_string()))?;

    if bytes.len() != N {
        return Err(HexParseError::InvalidLength { expected: N, actual: bytes.len() });
    }

    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// Parses a JSON-RPC hex quantity (`0x1a`) into a `u64`.
///
/// # Errors
///
/// Returns [`HexParseError`] if the prefix is missing, the digits are not hex, or the value
/// does not fit in 64 bits.
pub fn parse_quantity(value: &str) -> Result<u64, HexParseError> {
    let digits = value.strip_prefix("0x").ok_or(HexParseError::MissingPrefix)?;
    if digits.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(digits, 16).map_err(|e| {
        if digits.chars().all(|c| c.is_ascii_hexdigit()) {
            HexParseError::OutOfRange(value.to_string())
        } else {
            HexParseError::InvalidHex(e.to_string())
        }
    })
}

/// Formats a `u64` as a JSON-RPC hex quantity.
#[must_use]
pub fn format_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

/// 20-byte account address.
///
/// # Example
/// ```
/// use delegation_core::types::Address;
///
/// let addr: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
/// assert!(!addr.is_zero());
/// assert!(Address::ZERO.is_zero());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address, used by tokens as the mint/burn counterparty and by `DelegateChanged`
    /// as the "no previous delegate" marker.
    pub const ZERO: Address = Address([0u8; 20]);

    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Builds an address from a 32-byte ABI word (the address occupies the low 20 bytes).
    #[must_use]
    pub fn from_word(word: &[u8; 32]) -> Self {
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&word[12..]);
        Address(arr)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl TryFrom<&str> for Address {
    type Error = HexParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        decode_fixed::<20>(value).map(Address)
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl From<[u8; 20]> for Address {
    fn from(arr: [u8; 20]) -> Self {
        Address(arr)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// 32-byte hash (transaction hashes, log topics, ABI words).
///
/// # Example
/// ```
/// use delegation_core::types::Hash32;
///
/// let hash: Hash32 = "0xabcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234abcd1234"
///     .try_into()
///     .unwrap();
/// assert_eq!(hash.as_bytes()[0], 0xab);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl TryFrom<&str> for Hash32 {
    type Error = HexParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        decode_fixed::<32>(value).map(Hash32)
    }
}

impl FromStr for Hash32 {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(arr: [u8; 32]) -> Self {
        Hash32(arr)
    }
}

impl AsRef<[u8; 32]> for Hash32 {
    fn as_ref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

macro_rules! hex_string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = Cow::<'de, str>::deserialize(deserializer)?;
                <$ty>::from_str(&raw).map_err(de::Error::custom)
            }
        }
    };
}

hex_string_serde!(Address);
hex_string_serde!(Hash32);

/// JSON-RPC 2.0 request structure.
///
/// `id` is an `Arc` so it can be echoed cheaply into error responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Cow<'static, str>,
    pub method: String,
    pub params: Option<serde_json::Value>,
    pub id: Arc<serde_json::Value>,
}

impl JsonRpcRequest {
    #[must_use]
    pub fn new(
        method: impl Into<String>,
        params: Option<serde_json::Value>,
        id: serde_json::Value,
    ) -> Self {
        Self { jsonrpc: JSONRPC_VERSION_COW, method: method.into(), params, id: Arc::new(id) }
    }
}

/// JSON-RPC 2.0 response structure. Carries either `result` or `error`, never both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Cow<'static, str>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    pub id: Arc<serde_json::Value>,
}

/// JSON-RPC 2.0 error object.
///
/// - `-32700`: Parse error
/// - `-32600`..`-32602`: Invalid request / method not found / invalid params
/// - `-32603`: Internal error
/// - `-32000` to `-32099`: Server-defined errors (execution reverts land here)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}
