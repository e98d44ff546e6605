use super::{
    Checkpoint, ContributorAggregate, CorrelationRecord, DelegationEdge, DelegationTarget, EdgeId,
    GlobalMetrics, LedgerStore, StoreError, WriteBatch,
};
use crate::types::{Address, Hash32};

/// Read-your-writes overlay over a [`LedgerStore`] for the duration of one event.
///
/// Reads consult pending writes first and fall through to the store. Nothing reaches the
/// store until the caller commits [`into_batch`](Self::into_batch); dropping the view discards
/// every pending write.
pub struct LedgerView<'a, S: LedgerStore + ?Sized> {
    store: &'a S,
    batch: WriteBatch,
}

impl<'a, S: LedgerStore + ?Sized> LedgerView<'a, S> {
    #[must_use]
    pub fn new(store: &'a S) -> Self {
        Self { store, batch: WriteBatch::default() }
    }

    pub async fn delegation_target(
        &self,
        owner: &Address,
    ) -> Result<Option<DelegationTarget>, StoreError> {
        if let Some(target) = self.batch.targets.get(owner) {
            return Ok(Some(target.clone()));
        }
        self.store.delegation_target(owner).await
    }

    /// Replaces the owner's delegation target row.
    pub fn put_delegation_target(&mut self, target: DelegationTarget) {
        self.batch.targets.insert(target.owner, target);
    }

    pub async fn correlation(&self, tx: &Hash32) -> Result<Option<CorrelationRecord>, StoreError> {
        if let Some(record) = self.batch.correlations.get(tx) {
            return Ok(Some(record.clone()));
        }
        self.store.correlation(tx).await
    }

    pub fn put_correlation(&mut self, record: CorrelationRecord) {
        self.batch.correlations.insert(record.transaction_hash, record);
    }

    pub async fn edge(&self, id: &EdgeId) -> Result<Option<DelegationEdge>, StoreError> {
        if let Some(pending) = self.batch.edges.get(id) {
            return Ok(pending.clone());
        }
        self.store.edge(id).await
    }

    pub fn put_edge(&mut self, edge: DelegationEdge) {
        self.batch.edges.insert(edge.id(), Some(edge));
    }

    pub fn delete_edge(&mut self, id: EdgeId) {
        self.batch.edges.insert(id, None);
    }

    pub async fn contributor(
        &self,
        address: &Address,
    ) -> Result<Option<ContributorAggregate>, StoreError> {
        if let Some(aggregate) = self.batch.contributors.get(address) {
            return Ok(Some(aggregate.clone()));
        }
        self.store.contributor(address).await
    }

    pub fn put_contributor(&mut self, aggregate: ContributorAggregate) {
        self.batch.contributors.insert(aggregate.address, aggregate);
    }

    pub async fn global_metrics(&self) -> Result<GlobalMetrics, StoreError> {
        match self.batch.metrics {
            Some(metrics) => Ok(metrics),
            None => self.store.global_metrics().await,
        }
    }

    pub fn put_global_metrics(&mut self, metrics: GlobalMetrics) {
        self.batch.metrics = Some(metrics);
    }

    pub fn set_checkpoint(&mut self, checkpoint: Checkpoint) {
        self.batch.checkpoint = Some(checkpoint);
    }

    #[must_use]
    pub fn into_batch(self) -> WriteBatch {
        self.batch
    }
}
