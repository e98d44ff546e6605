//! The in-memory and `SQLite` stores must produce the same ledger for the same logs.

use crate::mock_infrastructure::{addr, EventSequence};
use delegation_core::{
    engine::{DelegationEngine, ReplaySummary},
    events::{EventDecoder, GovernanceEvent, RawLog, TokenStandard},
    ledger::{DelegationEdge, LedgerStore, MemoryStore, SqliteStore},
    types::Address,
};
use std::sync::Arc;

const WHALE: u128 = 1_250_000_000_000_000_000_000_000_000_000;

fn mixed_history() -> Vec<RawLog> {
    let (a, b, c, d) = (addr(0xa), addr(0xb), addr(0xc), addr(0xd));
    EventSequence::new()
        .tx()
        .delegate_changed(a, Address::ZERO, a)
        .tx()
        .transfer(Address::ZERO, a, WHALE)
        .votes_changed(a, 0, WHALE)
        .tx()
        .delegate_changed(d, Address::ZERO, d)
        .tx()
        .delegate_changed(a, a, c)
        .votes_changed(a, WHALE, 0)
        .votes_changed(c, 0, WHALE)
        .tx()
        .transfer(a, d, 40)
        .tx()
        .transfer(b, d, 7)
        .build()
}

async fn snapshot<S: LedgerStore>(store: &S, owners: &[Address]) -> Vec<DelegationEdge> {
    let mut edges = Vec::new();
    for owner in owners {
        edges.extend(store.edges_from(owner).await.unwrap());
    }
    edges.sort_by_key(DelegationEdge::id);
    edges
}

#[tokio::test]
async fn test_memory_and_sqlite_agree() {
    let logs = mixed_history();
    let owners: Vec<Address> = [0xa, 0xb, 0xc, 0xd].into_iter().map(addr).collect();

    let memory = Arc::new(MemoryStore::new());
    let sqlite = Arc::new(SqliteStore::in_memory().await.unwrap());
    let memory_engine = DelegationEngine::new(memory.clone(), TokenStandard::Erc20);
    let sqlite_engine = DelegationEngine::new(sqlite.clone(), TokenStandard::Erc20);

    for log in &logs {
        let expected = memory_engine.apply_log(log).await.unwrap();
        let actual = sqlite_engine.apply_log(log).await.unwrap();
        assert_eq!(actual, expected, "outcome diverged at log {}", log.log_index);
    }

    assert_eq!(snapshot(sqlite.as_ref(), &owners).await, snapshot(memory.as_ref(), &owners).await);
    assert_eq!(sqlite.global_metrics().await.unwrap(), memory.global_metrics().await.unwrap());
    assert_eq!(sqlite.checkpoint().await.unwrap(), memory.checkpoint().await.unwrap());

    for owner in &owners {
        assert_eq!(
            sqlite.contributor(owner).await.unwrap(),
            memory.contributor(owner).await.unwrap(),
            "contributor {owner} diverged"
        );
        assert_eq!(
            sqlite.delegation_target(owner).await.unwrap(),
            memory.delegation_target(owner).await.unwrap()
        );
    }

    let metrics = sqlite.global_metrics().await.unwrap();
    assert_eq!(metrics.power_sum, i128::try_from(WHALE + 7).unwrap());
    assert_eq!(metrics.member_count, 3);
}

#[tokio::test]
async fn test_sqlite_ledger_survives_engine_restart() {
    let logs = mixed_history();
    let store = Arc::new(SqliteStore::in_memory().await.unwrap());

    let first = DelegationEngine::new(store.clone(), TokenStandard::Erc20);
    for log in &logs[..4] {
        first.apply_log(log).await.unwrap();
    }
    drop(first);

    let decoder = EventDecoder::new(TokenStandard::Erc20);
    let events: Vec<GovernanceEvent> = logs.iter().map(|l| decoder.decode(l).unwrap()).collect();
    let second = DelegationEngine::new(store.clone(), TokenStandard::Erc20);
    let summary = second.apply_all(&events).await.unwrap();

    // The first four logs are behind the checkpoint.
    assert_eq!(summary, ReplaySummary { applied: 5, skipped: 4 });
    assert_eq!(
        store.edges_to(&addr(0xc)).await.unwrap().iter().map(|e| e.power).sum::<i128>(),
        i128::try_from(WHALE - 40).unwrap()
    );
}
