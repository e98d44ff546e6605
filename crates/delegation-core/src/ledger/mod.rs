//! Delegation ledger entities and the storage seam.
//!
//! The engine never writes to a store directly. Each event is reconciled against a
//! [`LedgerView`], a read-your-writes overlay over a [`LedgerStore`], and the accumulated
//! [`WriteBatch`] is handed to [`LedgerStore::commit`] in one call. Stores must apply a batch
//! atomically so readers never observe an edge without its paired aggregate update.
//!
//! # Entities
//!
//! | Entity | Key | Lifecycle |
//! |--------|-----|-----------|
//! | [`DelegationTarget`] | owner | replaced on every delegate change |
//! | [`CorrelationRecord`] | transaction hash | opened by a delegate change, annotated by weight changes |
//! | [`DelegationEdge`] | `(from, to)` | created on first flow, deleted when power returns to 0 |
//! | [`ContributorAggregate`] | address | running total, never deleted |
//! | [`GlobalMetrics`] | singleton | running totals |
//! | [`Checkpoint`] | singleton | position of the last committed event |

pub mod memory;
pub mod sqlite;
pub mod view;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use view::LedgerView;

use crate::types::{Address, Hash32};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The delegate an owner currently designates. Exactly one row per owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationTarget {
    pub owner: Address,
    pub target: Address,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: Hash32,
}

/// A `(previous, new)` weight pair observed on a `DelegateVotesChanged` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteChange {
    pub previous: u128,
    pub new: u128,
}

/// Transaction-scoped context linking a delegate change to the weight changes it causes.
///
/// Contract: a `DelegateChanged` handler opens (or replaces) the record for its transaction;
/// each of the following 0–2 `DelegateVotesChanged` events in that transaction reads it,
/// annotates the side it matched, and writes it back. Records are never cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationRecord {
    pub transaction_hash: Hash32,
    pub delegator: Address,
    pub from_delegate: Address,
    pub to_delegate: Address,
    pub from_delegate_votes: Option<VoteChange>,
    pub to_delegate_votes: Option<VoteChange>,
    pub block_number: u64,
    pub block_timestamp: u64,
}

/// Identifier of a directed delegation edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId {
    pub from: Address,
    pub to: Address,
}

impl EdgeId {
    #[must_use]
    pub fn new(from: Address, to: Address) -> Self {
        Self { from, to }
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

/// Directed, weighted "from empowers to" relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationEdge {
    pub from: Address,
    pub to: Address,
    pub power: i128,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: Hash32,
}

impl DelegationEdge {
    #[must_use]
    pub fn id(&self) -> EdgeId {
        EdgeId::new(self.from, self.to)
    }
}

/// Running total of power flowing into an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorAggregate {
    pub address: Address,
    pub power: i128,
    pub block_number: u64,
    pub block_timestamp: u64,
    pub transaction_hash: Hash32,
}

/// Ledger-wide totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GlobalMetrics {
    pub power_sum: i128,
    pub member_count: u64,
}

/// Position of the last event whose writes were committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checkpoint {
    pub block_number: u64,
    pub log_index: u64,
}

impl Checkpoint {
    #[must_use]
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// Writes produced by reconciling one event. `None` values are deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub targets: HashMap<Address, DelegationTarget>,
    pub correlations: HashMap<Hash32, CorrelationRecord>,
    pub edges: HashMap<EdgeId, Option<DelegationEdge>>,
    pub contributors: HashMap<Address, ContributorAggregate>,
    pub metrics: Option<GlobalMetrics>,
    pub checkpoint: Option<Checkpoint>,
}

impl WriteBatch {
    /// Returns `true` if the batch carries no ledger writes (a checkpoint alone still counts as
    /// empty).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() &&
            self.correlations.is_empty() &&
            self.edges.is_empty() &&
            self.contributors.is_empty() &&
            self.metrics.is_none()
    }
}

/// Errors raised by ledger stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    #[error("value out of range for column {column}: {value}")]
    OutOfRange { column: &'static str, value: String },
}

/// Injected transactional row store backing the ledger.
///
/// Reads are point or index lookups; all writes go through [`commit`](Self::commit), which must
/// apply the whole batch atomically or not at all.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn delegation_target(&self, owner: &Address)
        -> Result<Option<DelegationTarget>, StoreError>;

    async fn correlation(&self, tx: &Hash32) -> Result<Option<CorrelationRecord>, StoreError>;

    async fn edge(&self, id: &EdgeId) -> Result<Option<DelegationEdge>, StoreError>;

    async fn edges_from(&self, from: &Address) -> Result<Vec<DelegationEdge>, StoreError>;

    async fn edges_to(&self, to: &Address) -> Result<Vec<DelegationEdge>, StoreError>;

    async fn contributor(&self, address: &Address)
        -> Result<Option<ContributorAggregate>, StoreError>;

    async fn global_metrics(&self) -> Result<GlobalMetrics, StoreError>;

    async fn checkpoint(&self) -> Result<Option<Checkpoint>, StoreError>;

    /// Atomically applies every write in `batch`.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
