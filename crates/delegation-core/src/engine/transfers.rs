//! Balance-driven power movement on `Transfer`.

use super::{power, EngineError, EventOutcome, SkipReason};
use crate::{
    events::{EventMeta, TransferAmount},
    ledger::{EdgeId, LedgerStore, LedgerView},
    types::Address,
};
use tracing::trace;

/// Removes the transferred power from the sender's delegation edge and adds it to the
/// receiver's. Accounts without a delegation target are untouched.
///
/// # Errors
/// Returns `EngineError::Store` on read failure and `EngineError::Overflow` on accumulator
/// overflow.
pub async fn on_transfer<S: LedgerStore + ?Sized>(
    view: &mut LedgerView<'_, S>,
    meta: &EventMeta,
    from: Address,
    to: Address,
    amount: TransferAmount,
) -> Result<EventOutcome, EngineError> {
    let value = power::to_power(amount.power(), "transfer amount")?;
    let mut touched = false;

    if let Some(target) = view.delegation_target(&from).await? {
        let edge = EdgeId::new(from, target.target);
        trace!(edge = %edge, delta = -value, "transfer out");
        power::apply_delta(view, edge, -value, meta).await?;
        touched = true;
    }

    if let Some(target) = view.delegation_target(&to).await? {
        let edge = EdgeId::new(to, target.target);
        trace!(edge = %edge, delta = value, "transfer in");
        power::apply_delta(view, edge, value, meta).await?;
        touched = true;
    }

    if touched {
        Ok(EventOutcome::Applied)
    } else {
        Ok(EventOutcome::Skipped(SkipReason::Undelegated))
    }
}
