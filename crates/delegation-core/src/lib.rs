//! # Delegation Core
//!
//! Delegation-power reconciliation for governance-token indexers, plus a resilient
//! multi-endpoint chain reader.
//!
//! - **[`events`]**: Decoding of raw `Transfer`, `DelegateChanged` and `DelegateVotesChanged`
//!   logs into [`events::GovernanceEvent`].
//!
//! - **[`engine`]**: The reconciliation engine. Infers which account empowers which delegate,
//!   and by how much, from transaction-scoped correlation of delegate and weight changes.
//!
//! - **[`ledger`]**: Ledger entities, the [`ledger::LedgerStore`] seam, and in-memory and
//!   `SQLite` stores.
//!
//! - **[`reader`]**: Block interval, clock mode and quorum queries with endpoint fallback,
//!   fan-out averaging and TTL caching.
//!
//! - **[`config`]**: Layered TOML and environment configuration.
//!
//! ## Event Flow
//!
//! ```text
//! RawLog ──► EventDecoder ──► DelegationEngine::apply
//!                                   │
//!             ┌─────────────────────┼─────────────────────┐
//!             ▼                     ▼                     ▼
//!      DelegateChanged     DelegateVotesChanged        Transfer
//!      (target map,        (correlate, resolve        (sender/receiver
//!       correlation)        edge, apply delta)         edges)
//!             │                     │                     │
//!             └──────────► LedgerView (overlay) ◄─────────┘
//!                                   │
//!                                   ▼
//!                     LedgerStore::commit(WriteBatch + Checkpoint)
//! ```

pub mod abi;
pub mod config;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod reader;
pub mod types;
