//! Multi-endpoint resilient chain reader.
//!
//! Supplies the governance indexer with block timing, governor clock mode and quorum data.
//! Each query resolves a prioritized endpoint list (caller-supplied, configured, built-in) and
//! either falls back through it sequentially or fans out across all of it:
//!
//! | Query | Strategy | Cache |
//! |-------|----------|-------|
//! | [`ChainReader::block_interval`] | fan-out, mean of successes | per network, no expiry |
//! | [`ChainReader::clock_mode`] | sequential fallback | per governor, no expiry |
//! | [`ChainReader::quorum`] | sequential fallback | TTL, stale entries served on failure |
//!
//! The caches live in an injected [`ReaderCache`] so several readers can share them.

pub mod cache;
pub mod chain_reader;
pub mod endpoint;
pub mod errors;
pub mod http_client;
pub mod networks;
pub mod strategy;

pub use cache::{QuorumEntry, QuorumKey, ReaderCache};
pub use chain_reader::{ChainReader, ClockMode, QuorumInfo, ReaderSettings};
pub use endpoint::RpcEndpoint;
pub use errors::{ReaderError, RpcErrorCategory};
pub use http_client::{HttpClient, HttpClientConfig};
pub use networks::{default_endpoints, NetworkEndpoints, NetworkRegistry};
