//! Delegation-power reconciliation.
//!
//! [`DelegationEngine`] consumes decoded governance events in strict `(block, log index)` order
//! and keeps the delegation ledger consistent:
//!
//! - `DelegateChanged` replaces the owner's target and opens the transaction's correlation
//!   record ([`targets`]).
//! - `DelegateVotesChanged` is matched against that record and moves the weight delta onto the
//!   edge it belongs to ([`votes`]).
//! - `Transfer` moves balance-driven power on the sender's and receiver's edges
//!   ([`transfers`]).
//!
//! Every event is reconciled against a [`LedgerView`] and committed as one [`WriteBatch`]
//! together with the new [`Checkpoint`], so a failure part-way through an event leaves the store
//! untouched.
//!
//! [`WriteBatch`]: crate::ledger::WriteBatch

mod power;
pub mod targets;
pub mod transfers;
pub mod votes;

use crate::{
    events::{DecodeError, EventDecoder, EventKind, GovernanceEvent, RawLog, TokenStandard},
    ledger::{Checkpoint, LedgerStore, LedgerView, StoreError},
};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, info};

/// Errors that abort the current event. The outer runtime retries from its last checkpoint.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("unrecognized event: {0}")]
    Decode(#[from] DecodeError),

    #[error("arithmetic overflow while updating {context}")]
    Overflow { context: &'static str },
}

/// Why an event produced no ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Weight change in a transaction without a delegate change (transfer-driven).
    NoCorrelation,
    /// Weight change for an account that is neither side of the transaction's delegate change.
    SubjectMismatch,
    /// Transfer between accounts that have no delegation target.
    Undelegated,
    /// Event position is at or before the committed checkpoint.
    AlreadyApplied,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::NoCorrelation => "no correlation record",
            Self::SubjectMismatch => "subject mismatch",
            Self::Undelegated => "undelegated",
            Self::AlreadyApplied => "already applied",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    Skipped(SkipReason),
}

impl EventOutcome {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Counts of a replayed event sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: u64,
    pub skipped: u64,
}

impl ReplaySummary {
    fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Applied => self.applied += 1,
            EventOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Single-writer reconciliation engine over one ledger store.
pub struct DelegationEngine<S: LedgerStore + ?Sized> {
    store: Arc<S>,
    decoder: EventDecoder,
}

impl<S: LedgerStore + ?Sized> DelegationEngine<S> {
    #[must_use]
    pub fn new(store: Arc<S>, standard: TokenStandard) -> Self {
        Self { store, decoder: EventDecoder::new(standard) }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub fn standard(&self) -> TokenStandard {
        self.decoder.standard()
    }

    /// Decodes a raw log and applies it.
    ///
    /// # Errors
    /// Returns `EngineError::Decode` if the log is not one of the three governance events, or
    /// any error from [`apply`](Self::apply).
    pub async fn apply_log(&self, log: &RawLog) -> Result<EventOutcome, EngineError> {
        let event = self.decoder.decode(log)?;
        self.apply(&event).await
    }

    /// Reconciles one event and commits its writes together with the new checkpoint.
    ///
    /// Skipped events still advance the checkpoint.
    ///
    /// # Errors
    /// Returns `EngineError::Store` if a read or the commit fails and `EngineError::Overflow` if
    /// an accumulator leaves the 128-bit range. Nothing is written in either case.
    pub async fn apply(&self, event: &GovernanceEvent) -> Result<EventOutcome, EngineError> {
        let meta = &event.meta;

        if let Some(checkpoint) = self.store.checkpoint().await? {
            if meta.position() <= checkpoint.position() {
                debug!(
                    event = event.kind.name(),
                    block = meta.block_number,
                    log_index = meta.log_index,
                    "skipping event at or before checkpoint"
                );
                return Ok(EventOutcome::Skipped(SkipReason::AlreadyApplied));
            }
        }

        let mut view = LedgerView::new(self.store.as_ref());

        let outcome = match &event.kind {
            EventKind::DelegateChanged { delegator, from_delegate, to_delegate } => {
                targets::on_delegate_changed(
                    &mut view,
                    meta,
                    *delegator,
                    *from_delegate,
                    *to_delegate,
                )
                .await?
            }
            EventKind::DelegateVotesChanged { delegate, previous_votes, new_votes } => {
                votes::on_votes_changed(&mut view, meta, *delegate, *previous_votes, *new_votes)
                    .await?
            }
            EventKind::Transfer { from, to, amount } => {
                transfers::on_transfer(&mut view, meta, *from, *to, *amount).await?
            }
        };

        view.set_checkpoint(Checkpoint {
            block_number: meta.block_number,
            log_index: meta.log_index,
        });
        self.store.commit(view.into_batch()).await?;

        Ok(outcome)
    }

    /// Applies events in order, stopping at the first error.
    ///
    /// # Errors
    /// Returns the first error from [`apply`](Self::apply); earlier events stay committed.
    pub async fn apply_all<'e, I>(&self, events: I) -> Result<ReplaySummary, EngineError>
    where
        I: IntoIterator<Item = &'e GovernanceEvent>,
    {
        let mut summary = ReplaySummary::default();
        for event in events {
            summary.record(self.apply(event).await?);
        }

        info!(applied = summary.applied, skipped = summary.skipped, "replay complete");
        Ok(summary)
    }
}
