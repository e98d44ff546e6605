//! `DelegateVotesChanged` reconciliation against the transaction's correlation record.

use super::{power, EngineError, EventOutcome, SkipReason};
use crate::{
    events::EventMeta,
    ledger::{CorrelationRecord, EdgeId, LedgerStore, LedgerView, VoteChange},
    types::Address,
};
use tracing::debug;

/// Which side of the delegate change a weight change belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// The delegate being left (`from_delegate`).
    Previous,
    /// The delegate being chosen (`to_delegate`).
    Next,
}

/// Selects the edge a weight change of `subject` lands on, or `None` if `subject` is on
/// neither side of `record`.
///
/// With `D` the delegator, `O` the previous and `N` the new delegate:
///
/// | subject | condition | edge |
/// |---------|-----------|------|
/// | `O` | `D ≠ O` and `D ≠ N` (switch to another) | `D → O` |
/// | `O` | `D == N` and `O ≠ 0` (returning to self) | `D → O` |
/// | `O` | otherwise | `O → D` |
/// | `N` | always | `D → N` |
///
/// `O` is checked first, so `O == N` resolves as the previous side.
#[must_use]
pub fn resolve_edge(record: &CorrelationRecord, subject: &Address) -> Option<(EdgeId, Side)> {
    let d = record.delegator;
    let o = record.from_delegate;
    let n = record.to_delegate;

    if *subject == o {
        let switch_to_other = d != o && d != n;
        let self_returning = d == n && !o.is_zero();
        let id = if switch_to_other || self_returning { EdgeId::new(d, o) } else { EdgeId::new(o, d) };
        return Some((id, Side::Previous));
    }

    if *subject == n {
        return Some((EdgeId::new(d, n), Side::Next));
    }

    None
}

/// Applies a weight change if it belongs to the transaction's delegate change.
///
/// # Errors
/// Returns `EngineError::Store` on read failure and `EngineError::Overflow` if the delta or an
/// accumulator leaves the 128-bit range.
pub async fn on_votes_changed<S: LedgerStore + ?Sized>(
    view: &mut LedgerView<'_, S>,
    meta: &EventMeta,
    subject: Address,
    previous_votes: u128,
    new_votes: u128,
) -> Result<EventOutcome, EngineError> {
    let Some(mut record) = view.correlation(&meta.transaction_hash).await? else {
        debug!(tx = %meta.transaction_hash, delegate = %subject, "weight change without delegate change");
        return Ok(EventOutcome::Skipped(SkipReason::NoCorrelation));
    };

    let Some((edge, side)) = resolve_edge(&record, &subject) else {
        debug!(
            tx = %meta.transaction_hash,
            delegate = %subject,
            delegator = %record.delegator,
            "weight change for unrelated delegate"
        );
        return Ok(EventOutcome::Skipped(SkipReason::SubjectMismatch));
    };

    let delta = power::to_power(new_votes, "vote weight")?
        .checked_sub(power::to_power(previous_votes, "vote weight")?)
        .ok_or(EngineError::Overflow { context: "vote delta" })?;

    power::apply_delta(view, edge, delta, meta).await?;

    let observed = VoteChange { previous: previous_votes, new: new_votes };
    match side {
        Side::Previous => record.from_delegate_votes = Some(observed),
        Side::Next => record.to_delegate_votes = Some(observed),
    }
    view.put_correlation(record);

    debug!(tx = %meta.transaction_hash, edge = %edge, delta, "reconciled weight change");
    Ok(EventOutcome::Applied)
}
