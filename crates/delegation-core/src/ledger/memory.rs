use super::{
    Checkpoint, ContributorAggregate, CorrelationRecord, DelegationEdge, DelegationTarget, EdgeId,
    GlobalMetrics, LedgerStore, StoreError, WriteBatch,
};
use crate::types::{Address, Hash32};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct Tables {
    targets: HashMap<Address, DelegationTarget>,
    correlations: HashMap<Hash32, CorrelationRecord>,
    edges: BTreeMap<EdgeId, DelegationEdge>,
    contributors: HashMap<Address, ContributorAggregate>,
    metrics: GlobalMetrics,
    checkpoint: Option<Checkpoint>,
}

/// Process-local ledger store.
///
/// A batch is applied under a single write lock, so concurrent readers see either none or all
/// of it. Edges are kept ordered by `(from, to)` which makes `edges_from` a range scan.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every live edge, ordered by `(from, to)`.
    #[must_use]
    pub fn all_edges(&self) -> Vec<DelegationEdge> {
        self.tables.read().edges.values().cloned().collect()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn delegation_target(
        &self,
        owner: &Address,
    ) -> Result<Option<DelegationTarget>, StoreError> {
        Ok(self.tables.read().targets.get(owner).cloned())
    }

    async fn correlation(&self, tx: &Hash32) -> Result<Option<CorrelationRecord>, StoreError> {
        Ok(self.tables.read().correlations.get(tx).cloned())
    }

    async fn edge(&self, id: &EdgeId) -> Result<Option<DelegationEdge>, StoreError> {
        Ok(self.tables.read().edges.get(id).cloned())
    }

    async fn edges_from(&self, from: &Address) -> Result<Vec<DelegationEdge>, StoreError> {
        let lower = EdgeId::new(*from, Address([0x00; 20]));
        let upper = EdgeId::new(*from, Address([0xff; 20]));
        Ok(self.tables.read().edges.range(lower..=upper).map(|(_, e)| e.clone()).collect())
    }

    async fn edges_to(&self, to: &Address) -> Result<Vec<DelegationEdge>, StoreError> {
        Ok(self.tables.read().edges.values().filter(|e| e.to == *to).cloned().collect())
    }

    async fn contributor(
        &self,
        address: &Address,
    ) -> Result<Option<ContributorAggregate>, StoreError> {
        Ok(self.tables.read().contributors.get(address).cloned())
    }

    async fn global_metrics(&self) -> Result<GlobalMetrics, StoreError> {
        Ok(self.tables.read().metrics)
    }

    async fn checkpoint(&self) -> Result<Option<Checkpoint>, StoreError> {
        Ok(self.tables.read().checkpoint)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tables = self.tables.write();

        tables.targets.extend(batch.targets);
        tables.correlations.extend(batch.correlations);
        for (id, edge) in batch.edges {
            match edge {
                Some(edge) => {
                    tables.edges.insert(id, edge);
                }
                None => {
                    tables.edges.remove(&id);
                }
            }
        }
        tables.contributors.extend(batch.contributors);
        if let Some(metrics) = batch.metrics {
            tables.metrics = metrics;
        }
        if let Some(checkpoint) = batch.checkpoint {
            tables.checkpoint = Some(checkpoint);
        }

        Ok(())
    }
}
