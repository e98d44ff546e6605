//! Test Helper Functions and Utilities
//!
//! Builders for raw governance-token logs, so ledger tests run through the same decode path
//! as a live dispatcher.

use delegation_core::{
    abi::{encode_uint, DELEGATE_CHANGED_TOPIC, DELEGATE_VOTES_CHANGED_TOPIC, TRANSFER_TOPIC},
    events::RawLog,
    types::{Address, Hash32},
};

/// Token contract address used by every fixture log.
pub const TOKEN: Address = Address([0xee; 20]);

/// A deterministic non-zero address.
#[must_use]
pub fn addr(n: u8) -> Address {
    let mut bytes = [0u8; 20];
    bytes[19] = n;
    Address(bytes)
}

/// Left-pads an address into an indexed topic.
#[must_use]
pub fn address_topic(address: Address) -> Hash32 {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    Hash32(word)
}

/// Builds an ordered stream of raw logs. Each `tx` call starts a new transaction in a new
/// block; logs within a transaction get consecutive log indices.
#[derive(Debug)]
pub struct EventSequence {
    logs: Vec<RawLog>,
    block: u64,
    tx: u64,
    log_index: u64,
}

impl EventSequence {
    #[must_use]
    pub fn new() -> Self {
        Self { logs: Vec::new(), block: 100, tx: 0, log_index: 0 }
    }

    /// Starts a new transaction in the next block.
    #[must_use]
    pub fn tx(mut self) -> Self {
        self.block += 1;
        self.tx += 1;
        self.log_index = 0;
        self
    }

    fn push(mut self, topics: Vec<Hash32>, data: Vec<u8>) -> Self {
        let mut hash = [0u8; 32];
        hash[24..].copy_from_slice(&self.tx.to_be_bytes());
        self.logs.push(RawLog {
            address: TOKEN,
            topics,
            data,
            block_number: self.block,
            block_timestamp: 1_700_000_000 + self.block * 12,
            transaction_hash: Hash32(hash),
            log_index: self.log_index,
        });
        self.log_index += 1;
        self
    }

    #[must_use]
    pub fn delegate_changed(self, delegator: Address, from: Address, to: Address) -> Self {
        self.push(
            vec![DELEGATE_CHANGED_TOPIC, address_topic(delegator), address_topic(from), address_topic(to)],
            Vec::new(),
        )
    }

    #[must_use]
    pub fn votes_changed(self, delegate: Address, previous: u128, new: u128) -> Self {
        let mut data = encode_uint(previous).to_vec();
        data.extend_from_slice(&encode_uint(new));
        self.push(vec![DELEGATE_VOTES_CHANGED_TOPIC, address_topic(delegate)], data)
    }

    /// Fungible transfer.
    #[must_use]
    pub fn transfer(self, from: Address, to: Address, amount: u128) -> Self {
        self.push(
            vec![TRANSFER_TOPIC, address_topic(from), address_topic(to)],
            encode_uint(amount).to_vec(),
        )
    }

    /// Ownership-style transfer of a single token id.
    #[must_use]
    pub fn transfer_token(self, from: Address, to: Address, token_id: u64) -> Self {
        let mut id = [0u8; 32];
        id[24..].copy_from_slice(&token_id.to_be_bytes());
        self.push(vec![TRANSFER_TOPIC, address_topic(from), address_topic(to), Hash32(id)], Vec::new())
    }

    #[must_use]
    pub fn build(self) -> Vec<RawLog> {
        self.logs
    }
}

impl Default for EventSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_positions() {
        let logs = EventSequence::new()
            .tx()
            .delegate_changed(addr(1), Address::ZERO, addr(1))
            .tx()
            .transfer(addr(2), addr(1), 5)
            .votes_changed(addr(1), 0, 5)
            .build();

        let positions: Vec<_> = logs.iter().map(|l| (l.block_number, l.log_index)).collect();
        assert_eq!(positions, vec![(101, 0), (102, 0), (102, 1)]);
        assert_eq!(logs[1].transaction_hash, logs[2].transaction_hash);
        assert_ne!(logs[0].transaction_hash, logs[1].transaction_hash);
    }

    #[test]
    fn test_address_topic_round_trips_through_decoder_layout() {
        let topic = address_topic(addr(9));
        assert_eq!(Address::from_word(&topic.0), addr(9));
    }
}
