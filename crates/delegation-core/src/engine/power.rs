use super::EngineError;
use crate::{
    events::EventMeta,
    ledger::{ContributorAggregate, DelegationEdge, EdgeId, GlobalMetrics, LedgerStore, LedgerView},
};
use tracing::trace;

/// Converts an on-chain amount into a signed power delta.
pub(super) fn to_power(amount: u128, context: &'static str) -> Result<i128, EngineError> {
    i128::try_from(amount).map_err(|_| EngineError::Overflow { context })
}

/// Moves `delta` onto `edge` and propagates it to the receiving aggregate and global metrics.
///
/// The edge is created on first nonzero flow and deleted once its power returns to exactly
/// zero. The aggregate of `edge.to` is created on first touch, which is the only thing that
/// increments `member_count`. A zero delta writes nothing.
pub(super) async fn apply_delta<S: LedgerStore + ?Sized>(
    view: &mut LedgerView<'_, S>,
    edge: EdgeId,
    delta: i128,
    meta: &EventMeta,
) -> Result<(), EngineError> {
    if delta == 0 {
        return Ok(());
    }

    let current = view.edge(&edge).await?.map_or(0, |e| e.power);
    let power =
        current.checked_add(delta).ok_or(EngineError::Overflow { context: "edge power" })?;

    if power == 0 {
        trace!(edge = %edge, "pruning edge at zero power");
        view.delete_edge(edge);
    } else {
        view.put_edge(DelegationEdge {
            from: edge.from,
            to: edge.to,
            power,
            block_number: meta.block_number,
            block_timestamp: meta.block_timestamp,
            transaction_hash: meta.transaction_hash,
        });
    }

    let existing = view.contributor(&edge.to).await?;
    let created = existing.is_none();
    let aggregate_power = existing
        .map_or(0, |a| a.power)
        .checked_add(delta)
        .ok_or(EngineError::Overflow { context: "contributor power" })?;
    view.put_contributor(ContributorAggregate {
        address: edge.to,
        power: aggregate_power,
        block_number: meta.block_number,
        block_timestamp: meta.block_timestamp,
        transaction_hash: meta.transaction_hash,
    });

    let metrics = view.global_metrics().await?;
    let power_sum = metrics
        .power_sum
        .checked_add(delta)
        .ok_or(EngineError::Overflow { context: "global power sum" })?;
    let member_count = if created {
        metrics
            .member_count
            .checked_add(1)
            .ok_or(EngineError::Overflow { context: "member count" })?
    } else {
        metrics.member_count
    };
    view.put_global_metrics(GlobalMetrics { power_sum, member_count });

    trace!(edge = %edge, delta, power, "applied power delta");
    Ok(())
}
