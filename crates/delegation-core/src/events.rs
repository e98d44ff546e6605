//! Event ingestion boundary.
//!
//! Raw logs arrive in `eth_getLogs` shape (plus the block timestamp the dispatcher attaches) and
//! are decoded exactly once into [`GovernanceEvent`], a tagged union over the three event kinds
//! the engine reconciles. Anything else is an [`DecodeError`], which is fatal to the batch: the
//! outer runtime is expected to halt and retry from its last durable checkpoint.

use crate::{
    abi::{self, AbiError, DELEGATE_CHANGED_TOPIC, DELEGATE_VOTES_CHANGED_TOPIC, TRANSFER_TOPIC},
    types::{parse_quantity, Address, Hash32},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Token semantics for the governance token being indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStandard {
    /// Fungible token: transfer power equals the transferred amount.
    #[default]
    Erc20,
    /// Ownership-style token: each transferred unit carries a power of exactly 1.
    Erc721,
}

impl TokenStandard {
    #[must_use]
    pub fn is_fungible(&self) -> bool {
        matches!(self, Self::Erc20)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Erc20 => "erc20",
            Self::Erc721 => "erc721",
        }
    }
}

impl fmt::Display for TokenStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenStandard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "erc20" => Ok(Self::Erc20),
            "erc721" => Ok(Self::Erc721),
            other => Err(format!("unknown token standard: {other}")),
        }
    }
}

/// Position and provenance of an event on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMeta {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: Hash32,
    pub log_index: u64,
}

impl EventMeta {
    /// Ordering key used for checkpointing: `(block_number, log_index)`.
    #[must_use]
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// Amount moved by a `Transfer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAmount {
    Fungible(u128),
    /// One ownership unit. The identifier is kept for observability only.
    Unit { token_id: Hash32 },
}

impl TransferAmount {
    /// Voting power carried by the transfer.
    #[must_use]
    pub fn power(&self) -> u128 {
        match self {
            Self::Fungible(value) => *value,
            Self::Unit { .. } => 1,
        }
    }
}

/// Decoded event payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Transfer { from: Address, to: Address, amount: TransferAmount },
    DelegateChanged { delegator: Address, from_delegate: Address, to_delegate: Address },
    DelegateVotesChanged { delegate: Address, previous_votes: u128, new_votes: u128 },
}

impl EventKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transfer { .. } => "Transfer",
            Self::DelegateChanged { .. } => "DelegateChanged",
            Self::DelegateVotesChanged { .. } => "DelegateVotesChanged",
        }
    }
}

/// A decoded governance-token event with its chain position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GovernanceEvent {
    pub meta: EventMeta,
    pub kind: EventKind,
}

/// Errors raised when a log cannot be decoded into a [`GovernanceEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("log has no topics")]
    MissingTopic,

    #[error("unrecognized event topic {0}")]
    UnknownTopic(Hash32),

    #[error("{event} log has unexpected shape: {topics} topics, {data_len} data bytes")]
    UnexpectedShape { event: &'static str, topics: usize, data_len: usize },

    #[error("invalid ABI data: {0}")]
    Abi(#[from] AbiError),

    #[error("invalid log field `{field}`: {message}")]
    InvalidField { field: &'static str, message: String },
}

/// A log as delivered by the dispatcher: the `eth_getLogs` object plus `blockTimestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    pub address: Address,
    pub topics: Vec<Hash32>,
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    #[serde(with = "quantity")]
    pub block_number: u64,
    #[serde(with = "quantity")]
    pub block_timestamp: u64,
    pub transaction_hash: Hash32,
    #[serde(with = "quantity")]
    pub log_index: u64,
}

impl RawLog {
    #[must_use]
    pub fn meta(&self) -> EventMeta {
        EventMeta {
            block_number: self.block_number,
            block_timestamp: self.block_timestamp,
            transaction_hash: self.transaction_hash,
            log_index: self.log_index,
        }
    }
}

/// Decodes raw logs for a token of a given standard.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDecoder {
    standard: TokenStandard,
}

impl EventDecoder {
    #[must_use]
    pub fn new(standard: TokenStandard) -> Self {
        Self { standard }
    }

    #[must_use]
    pub fn standard(&self) -> TokenStandard {
        self.standard
    }

    /// Decodes one log.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for unknown topics, a topic/data layout that does not match
    /// the event (or the configured token standard), or ABI words wider than 128 bits.
    pub fn decode(&self, log: &RawLog) -> Result<GovernanceEvent, DecodeError> {
        let topic0 = *log.topics.first().ok_or(DecodeError::MissingTopic)?;

        let kind = if topic0 == TRANSFER_TOPIC {
            self.decode_transfer(log)?
        } else if topic0 == DELEGATE_CHANGED_TOPIC {
            Self::expect_shape(log, "DelegateChanged", 4, 0)?;
            EventKind::DelegateChanged {
                delegator: Address::from_word(&log.topics[1].0),
                from_delegate: Address::from_word(&log.topics[2].0),
                to_delegate: Address::from_word(&log.topics[3].0),
            }
        } else if topic0 == DELEGATE_VOTES_CHANGED_TOPIC {
            Self::expect_shape(log, "DelegateVotesChanged", 2, 64)?;
            EventKind::DelegateVotesChanged {
                delegate: Address::from_word(&log.topics[1].0),
                previous_votes: abi::decode_uint(&log.data, 0)?,
                new_votes: abi::decode_uint(&log.data, 1)?,
            }
        } else {
            return Err(DecodeError::UnknownTopic(topic0));
        };

        Ok(GovernanceEvent { meta: log.meta(), kind })
    }

    fn decode_transfer(&self, log: &RawLog) -> Result<EventKind, DecodeError> {
        let amount = match self.standard {
            TokenStandard::Erc20 => {
                Self::expect_shape(log, "Transfer", 3, 32)?;
                TransferAmount::Fungible(abi::decode_uint(&log.data, 0)?)
            }
            TokenStandard::Erc721 => {
                Self::expect_shape(log, "Transfer", 4, 0)?;
                TransferAmount::Unit { token_id: log.topics[3] }
            }
        };

        Ok(EventKind::Transfer {
            from: Address::from_word(&log.topics[1].0),
            to: Address::from_word(&log.topics[2].0),
            amount,
        })
    }

    fn expect_shape(
        log: &RawLog,
        event: &'static str,
        topics: usize,
        data_len: usize,
    ) -> Result<(), DecodeError> {
        if log.topics.len() != topics || log.data.len() < data_len {
            return Err(DecodeError::UnexpectedShape {
                event,
                topics: log.topics.len(),
                data_len: log.data.len(),
            });
        }
        Ok(())
    }
}

mod quantity {
    use super::parse_quantity;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&crate::types::format_quantity(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_quantity(&raw).map_err(de::Error::custom)
    }
}

mod hex_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let digits = raw.strip_prefix("0x").ok_or_else(|| de::Error::custom("missing 0x prefix"))?;
        hex::decode(digits).map_err(de::Error::custom)
    }
}
