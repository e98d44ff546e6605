use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::{ClockMode, QuorumInfo};
use crate::{events::TokenStandard, types::Address};

/// Cache key for quorum lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuorumKey {
    pub network: String,
    pub governor: Address,
    pub token: Address,
    pub standard: TokenStandard,
}

/// A quorum reading and when it was fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuorumEntry {
    pub info: QuorumInfo,
    pub fetched_at: DateTime<Utc>,
}

/// Process-local reader caches, shared by `Arc` between reader instances.
///
/// Block intervals and clock modes never expire. Quorum entries carry their fetch time; the
/// reader decides freshness and keeps expired entries around for stale serving.
#[derive(Debug, Default)]
pub struct ReaderCache {
    block_intervals: DashMap<String, f64>,
    clock_modes: DashMap<(String, Address), ClockMode>,
    quorums: DashMap<QuorumKey, QuorumEntry>,
}

impl ReaderCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw (unrounded) mean block interval in seconds.
    #[must_use]
    pub fn block_interval(&self, network: &str) -> Option<f64> {
        self.block_intervals.get(network).map(|v| *v)
    }

    pub fn set_block_interval(&self, network: &str, seconds: f64) {
        self.block_intervals.insert(network.to_string(), seconds);
    }

    #[must_use]
    pub fn clock_mode(&self, network: &str, governor: &Address) -> Option<ClockMode> {
        self.clock_modes.get(&(network.to_string(), *governor)).map(|v| *v)
    }

    pub fn set_clock_mode(&self, network: &str, governor: Address, mode: ClockMode) {
        self.clock_modes.insert((network.to_string(), governor), mode);
    }

    #[must_use]
    pub fn quorum(&self, key: &QuorumKey) -> Option<QuorumEntry> {
        self.quorums.get(key).map(|v| *v)
    }

    pub fn set_quorum(&self, key: QuorumKey, entry: QuorumEntry) {
        self.quorums.insert(key, entry);
    }
}
