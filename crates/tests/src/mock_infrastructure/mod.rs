//! Mock Infrastructure for Testing the delegation indexer
//!
//! This module provides reusable mock types for testing chain reads and ledger replay
//! without requiring real network connections.
//!
//! ## Components
//!
//! - `RpcMockBuilder`: Wraps mockito to provide Ethereum-specific RPC mocking
//! - `EventSequence`: Builds ordered raw governance-token logs
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::RpcMockBuilder;
//!
//! let mut mock = RpcMockBuilder::new().await;
//! mock.mock_block_number(100).await;
//!
//! // Use mock.url() as an endpoint
//! ```

pub mod test_helpers;

pub use rpc_mock::{abi_string, block_json, RpcMockBuilder};
pub use test_helpers::*;
