//! Chain reader behavior against mocked JSON-RPC endpoints.

use crate::mock_infrastructure::{abi_string, addr, RpcMockBuilder};
use chrono::Utc;
use delegation_core::{
    abi::{encode_call, encode_uint, CLOCK_MODE_SELECTOR, CLOCK_SELECTOR, DECIMALS_SELECTOR, QUORUM_SELECTOR},
    events::TokenStandard,
    reader::{
        ChainReader, ClockMode, HttpClient, NetworkEndpoints, NetworkRegistry, QuorumEntry,
        QuorumInfo, QuorumKey, ReaderCache, ReaderError, ReaderSettings,
    },
};
use std::{collections::HashMap, sync::Arc, time::Duration};

const NETWORK: &str = "testnet";
const REFUSED: &str = "http://127.0.0.1:1";

fn settings() -> ReaderSettings {
    ReaderSettings { request_timeout: Duration::from_secs(2), ..ReaderSettings::default() }
}

fn reader_with(urls: Vec<String>, settings: ReaderSettings) -> ChainReader {
    let registry = NetworkRegistry::new(HashMap::from([(
        NETWORK.to_string(),
        NetworkEndpoints { endpoints: urls, replace_defaults: true },
    )]));
    ChainReader::new(
        Arc::new(HttpClient::new().unwrap()),
        registry,
        Arc::new(ReaderCache::new()),
        settings,
    )
}

fn reader(urls: Vec<String>) -> ChainReader {
    reader_with(urls, settings())
}

#[tokio::test]
async fn test_block_interval_averages_successful_endpoints() {
    let base = 1_700_000_000;

    let mut steady = RpcMockBuilder::new().await;
    steady.mock_block_number(100).await;
    for n in 91..=100 {
        steady.mock_block(n, base + 12 * (n - 91)).await;
    }

    // Blocks 91..=94 are unavailable; the remaining five gaps span 62 seconds.
    let mut patchy = RpcMockBuilder::new().await;
    patchy.mock_block_number(100).await;
    for n in 91..=94 {
        patchy.mock_missing_block(n).await;
    }
    for (n, offset) in (95..=100).zip([0, 12, 24, 36, 48, 62]) {
        patchy.mock_block(n, base + offset).await;
    }

    let reader = reader(vec![steady.url(), patchy.url(), REFUSED.to_string()]);

    let precise = reader.block_interval(NETWORK, &[], true).await.unwrap();
    assert!((precise - 12.2).abs() < 1e-9, "got {precise}");

    let rounded = reader.block_interval(NETWORK, &[], false).await.unwrap();
    assert!((rounded - 12.0).abs() < f64::EPSILON);

    let cached = reader.cache().block_interval(NETWORK).unwrap();
    assert!((cached - 12.2).abs() < 1e-9);
}

#[tokio::test]
async fn test_block_interval_with_caller_endpoint() {
    let mut node = RpcMockBuilder::new().await;
    node.mock_block_number(50).await;
    for n in 41..=50 {
        node.mock_block(n, 1_000 + 2 * n).await;
    }

    // No configured endpoints and no built-in defaults for this network.
    let reader = reader(Vec::new());
    let interval = reader.block_interval(NETWORK, &[node.url()], false).await.unwrap();
    assert!((interval - 2.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_block_interval_needs_two_usable_blocks() {
    let mut sparse = RpcMockBuilder::new().await;
    sparse.mock_block_number(100).await;
    sparse.mock_missing_block(98).await;
    sparse.mock_missing_block(99).await;
    sparse.mock_block(100, 1_700_000_000).await;

    let reader = reader_with(vec![sparse.url()], ReaderSettings { block_sample_size: 3, ..settings() });

    let err = reader.block_interval(NETWORK, &[], true).await.unwrap_err();
    match err {
        ReaderError::AllEndpointsFailed { attempted, last_error } => {
            assert_eq!(attempted, 1);
            assert!(matches!(*last_error, ReaderError::InsufficientBlocks { usable: 1, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(reader.cache().block_interval(NETWORK).is_none());
}

#[tokio::test]
async fn test_block_interval_without_endpoints() {
    let reader = reader(Vec::new());
    let err = reader.block_interval("unlisted", &[], true).await.unwrap_err();
    assert!(matches!(err, ReaderError::NoEndpoints { .. }));
}

#[tokio::test]
async fn test_clock_mode_revert_means_blocknumber_and_is_cached() {
    let governor = addr(0x60);
    let mut node = RpcMockBuilder::new().await;
    node.mock_call_revert(&CLOCK_MODE_SELECTOR, Some(1)).await;

    let reader = reader(vec![node.url()]);
    assert_eq!(reader.clock_mode(NETWORK, &governor).await.unwrap(), ClockMode::BlockNumber);
    assert_eq!(reader.clock_mode(NETWORK, &governor).await.unwrap(), ClockMode::BlockNumber);

    node.assert_expectations().await;
}

#[tokio::test]
async fn test_clock_mode_empty_result_means_blocknumber() {
    let mut node = RpcMockBuilder::new().await;
    node.mock_call(&CLOCK_MODE_SELECTOR, &[]).await;

    let reader = reader(vec![node.url()]);
    assert_eq!(reader.clock_mode(NETWORK, &addr(0x61)).await.unwrap(), ClockMode::BlockNumber);
}

#[tokio::test]
async fn test_clock_mode_falls_back_past_a_dead_endpoint() {
    let mut node = RpcMockBuilder::new().await;
    node.mock_call(&CLOCK_MODE_SELECTOR, &abi_string("mode=timestamp")).await;

    let reader = reader(vec![REFUSED.to_string(), node.url()]);
    assert_eq!(reader.clock_mode(NETWORK, &addr(0x62)).await.unwrap(), ClockMode::Timestamp);
}

#[tokio::test]
async fn test_clock_mode_revert_is_not_masked_by_a_later_dead_endpoint() {
    let governor = addr(0x63);
    let mut node = RpcMockBuilder::new().await;
    node.mock_call_revert(&CLOCK_MODE_SELECTOR, Some(1)).await;

    let reader = reader(vec![node.url(), REFUSED.to_string()]);
    assert_eq!(reader.clock_mode(NETWORK, &governor).await.unwrap(), ClockMode::BlockNumber);
    assert_eq!(reader.cache().clock_mode(NETWORK, &governor), Some(ClockMode::BlockNumber));

    node.assert_expectations().await;
}

#[tokio::test]
async fn test_quorum_refresh_in_timestamp_mode() {
    let (governor, token) = (addr(0x70), addr(0x71));
    let now = 1_700_000_000u128;
    let quorum = 4_000_000 * 10u128.pow(18);

    let mut node = RpcMockBuilder::new().await;
    node.mock_call(&CLOCK_MODE_SELECTOR, &abi_string("mode=timestamp")).await;
    node.mock_call(&CLOCK_SELECTOR, &encode_uint(now)).await;
    // The quorum is read 180 seconds behind the clock.
    node.mock_call_expect(&encode_call(QUORUM_SELECTOR, &[now - 180]), &encode_uint(quorum), 1)
        .await;
    node.mock_call(&DECIMALS_SELECTOR, &encode_uint(18)).await;

    let reader = reader(vec![node.url()]);
    let expected = QuorumInfo { clock_mode: ClockMode::Timestamp, quorum, decimals: 18 };

    let info = reader.quorum(NETWORK, &governor, &token, TokenStandard::Erc20).await.unwrap();
    assert_eq!(info, expected);

    // Served from cache within the TTL.
    let again = reader.quorum(NETWORK, &governor, &token, TokenStandard::Erc20).await.unwrap();
    assert_eq!(again, expected);

    node.assert_expectations().await;
}

#[tokio::test]
async fn test_quorum_for_ownership_token_in_blocknumber_mode() {
    let (governor, token) = (addr(0x72), addr(0x73));

    let mut node = RpcMockBuilder::new().await;
    node.mock_call_revert(&CLOCK_MODE_SELECTOR, None).await;
    node.mock_call_revert(&CLOCK_SELECTOR, None).await;
    node.mock_block_number(5_000).await;
    // 15 blocks behind the head.
    node.mock_call(&encode_call(QUORUM_SELECTOR, &[4_985]), &encode_uint(42)).await;

    let reader = reader(vec![node.url()]);
    let info = reader.quorum(NETWORK, &governor, &token, TokenStandard::Erc721).await.unwrap();

    assert_eq!(info, QuorumInfo { clock_mode: ClockMode::BlockNumber, quorum: 42, decimals: 0 });
}

#[tokio::test]
async fn test_quorum_serves_stale_entry_when_refresh_fails() {
    let (governor, token) = (addr(0x74), addr(0x75));
    let mut node = RpcMockBuilder::new().await;
    node.mock_server_error().await;

    let reader = reader(vec![node.url()]);
    let stale = QuorumInfo { clock_mode: ClockMode::Timestamp, quorum: 1_000, decimals: 18 };
    reader.cache().set_quorum(
        QuorumKey {
            network: NETWORK.to_string(),
            governor,
            token,
            standard: TokenStandard::Erc20,
        },
        QuorumEntry { info: stale, fetched_at: Utc::now() - chrono::Duration::minutes(31) },
    );

    let info = reader.quorum(NETWORK, &governor, &token, TokenStandard::Erc20).await.unwrap();
    assert_eq!(info, stale);
}

#[tokio::test]
async fn test_quorum_refresh_failure_without_cache_is_an_error() {
    let mut node = RpcMockBuilder::new().await;
    node.mock_server_error().await;

    let reader = reader(vec![node.url()]);
    let result = reader.quorum(NETWORK, &addr(0x76), &addr(0x77), TokenStandard::Erc20).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_fresh_quorum_entry_needs_no_endpoint() {
    let (governor, token) = (addr(0x78), addr(0x79));
    let reader = reader(Vec::new());
    let cached = QuorumInfo { clock_mode: ClockMode::BlockNumber, quorum: 77, decimals: 6 };
    reader.cache().set_quorum(
        QuorumKey {
            network: NETWORK.to_string(),
            governor,
            token,
            standard: TokenStandard::Erc20,
        },
        QuorumEntry { info: cached, fetched_at: Utc::now() },
    );

    let info = reader.quorum(NETWORK, &governor, &token, TokenStandard::Erc20).await.unwrap();
    assert_eq!(info, cached);
}
