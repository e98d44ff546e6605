//! `DelegateChanged` handling: the owner → delegate map and the correlation record.

use super::{EngineError, EventOutcome};
use crate::{
    events::EventMeta,
    ledger::{CorrelationRecord, DelegationEdge, DelegationTarget, EdgeId, LedgerStore, LedgerView},
    types::Address,
};
use tracing::{debug, warn};

/// Replaces `delegator`'s target, opens the correlation record for the transaction, and seeds
/// the zero-power self-edge on a first self-delegation.
///
/// # Errors
/// Returns `EngineError::Store` if a ledger read fails.
pub async fn on_delegate_changed<S: LedgerStore + ?Sized>(
    view: &mut LedgerView<'_, S>,
    meta: &EventMeta,
    delegator: Address,
    from_delegate: Address,
    to_delegate: Address,
) -> Result<EventOutcome, EngineError> {
    view.put_delegation_target(DelegationTarget {
        owner: delegator,
        target: to_delegate,
        block_number: meta.block_number,
        block_timestamp: meta.block_timestamp,
        transaction_hash: meta.transaction_hash,
    });

    if let Some(previous) = view.correlation(&meta.transaction_hash).await? {
        if previous.delegator != delegator {
            // Only the latest delegate change in a transaction is matched by weight changes.
            warn!(
                tx = %meta.transaction_hash,
                replaced_delegator = %previous.delegator,
                delegator = %delegator,
                "second delegator in one transaction replaces correlation record"
            );
        }
    }

    view.put_correlation(CorrelationRecord {
        transaction_hash: meta.transaction_hash,
        delegator,
        from_delegate,
        to_delegate,
        from_delegate_votes: None,
        to_delegate_votes: None,
        block_number: meta.block_number,
        block_timestamp: meta.block_timestamp,
    });

    if from_delegate.is_zero() && delegator == to_delegate {
        let id = EdgeId::new(delegator, delegator);
        if view.edge(&id).await?.is_none() {
            debug!(delegator = %delegator, "seeding self-delegation edge");
            view.put_edge(DelegationEdge {
                from: delegator,
                to: delegator,
                power: 0,
                block_number: meta.block_number,
                block_timestamp: meta.block_timestamp,
                transaction_hash: meta.transaction_hash,
            });
        }
    }

    debug!(
        tx = %meta.transaction_hash,
        delegator = %delegator,
        from = %from_delegate,
        to = %to_delegate,
        "delegate changed"
    );
    Ok(EventOutcome::Applied)
}
