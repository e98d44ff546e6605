//! Ledger reconciliation scenarios, driven through raw logs.

use crate::mock_infrastructure::{addr, EventSequence};
use delegation_core::{
    engine::{DelegationEngine, EngineError, EventOutcome, SkipReason},
    events::{RawLog, TokenStandard},
    ledger::{EdgeId, LedgerStore, MemoryStore},
    types::{Address, Hash32},
};
use std::sync::Arc;

async fn replay<S: LedgerStore>(engine: &DelegationEngine<S>, logs: &[RawLog]) -> Vec<EventOutcome> {
    let mut outcomes = Vec::with_capacity(logs.len());
    for log in logs {
        outcomes.push(engine.apply_log(log).await.unwrap());
    }
    outcomes
}

async fn power<S: LedgerStore>(store: &S, from: Address, to: Address) -> Option<i128> {
    store.edge(&EdgeId::new(from, to)).await.unwrap().map(|e| e.power)
}

fn engine(standard: TokenStandard) -> (Arc<MemoryStore>, DelegationEngine<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = DelegationEngine::new(store.clone(), standard);
    (store, engine)
}

fn bootstrap(a: Address) -> EventSequence {
    EventSequence::new().tx().delegate_changed(a, Address::ZERO, a)
}

fn growth(a: Address, b: Address) -> EventSequence {
    bootstrap(a).tx().transfer(b, a, 30).votes_changed(a, 0, 30)
}

#[tokio::test]
async fn test_self_delegation_bootstrap() {
    let (store, engine) = engine(TokenStandard::Erc20);
    let a = addr(0xa);

    let outcomes = replay(&engine, &bootstrap(a).build()).await;
    assert_eq!(outcomes, vec![EventOutcome::Applied]);

    let target = store.delegation_target(&a).await.unwrap().unwrap();
    assert_eq!(target.target, a);
    assert_eq!(power(store.as_ref(), a, a).await, Some(0));

    // A zero-power seed edge does not create an aggregate.
    assert!(store.contributor(&a).await.unwrap().is_none());
    assert_eq!(store.global_metrics().await.unwrap().member_count, 0);
}

#[tokio::test]
async fn test_growth_under_self_delegation() {
    let (store, engine) = engine(TokenStandard::Erc20);
    let (a, b) = (addr(0xa), addr(0xb));

    let outcomes = replay(&engine, &growth(a, b).build()).await;
    assert_eq!(outcomes, vec![
        EventOutcome::Applied,
        EventOutcome::Applied,
        EventOutcome::Skipped(SkipReason::NoCorrelation),
    ]);

    assert_eq!(power(store.as_ref(), a, a).await, Some(30));
    assert_eq!(store.contributor(&a).await.unwrap().unwrap().power, 30);

    let metrics = store.global_metrics().await.unwrap();
    assert_eq!(metrics.power_sum, 30);
    assert_eq!(metrics.member_count, 1);
}

#[tokio::test]
async fn test_delegate_switch_moves_edge() {
    let (store, engine) = engine(TokenStandard::Erc20);
    let (a, b, c) = (addr(0xa), addr(0xb), addr(0xc));

    let logs = growth(a, b)
        .tx()
        .delegate_changed(a, a, c)
        .votes_changed(a, 30, 0)
        .votes_changed(c, 0, 30)
        .build();
    let outcomes = replay(&engine, &logs).await;
    assert!(outcomes[3..].iter().all(EventOutcome::is_applied));

    assert_eq!(store.delegation_target(&a).await.unwrap().unwrap().target, c);
    assert_eq!(power(store.as_ref(), a, a).await, None);
    assert_eq!(power(store.as_ref(), a, c).await, Some(30));

    assert_eq!(store.contributor(&a).await.unwrap().unwrap().power, 0);
    assert_eq!(store.contributor(&c).await.unwrap().unwrap().power, 30);

    let metrics = store.global_metrics().await.unwrap();
    assert_eq!(metrics.power_sum, 30);
    assert_eq!(metrics.member_count, 2);

    let record = store.correlation(&logs[3].transaction_hash).await.unwrap().unwrap();
    assert_eq!(record.from_delegate_votes.map(|v| (v.previous, v.new)), Some((30, 0)));
    assert_eq!(record.to_delegate_votes.map(|v| (v.previous, v.new)), Some((0, 30)));
}

#[tokio::test]
async fn test_transfer_between_delegated_holders() {
    let (store, engine) = engine(TokenStandard::Erc20);
    let (a, b, c, d) = (addr(0xa), addr(0xb), addr(0xc), addr(0xd));

    let logs = growth(a, b)
        .tx()
        .delegate_changed(a, a, c)
        .votes_changed(a, 30, 0)
        .votes_changed(c, 0, 30)
        .tx()
        .delegate_changed(d, Address::ZERO, d)
        .tx()
        .transfer(a, d, 10)
        .tx()
        .transfer(a, d, 20)
        .build();
    replay(&engine, &logs).await;

    assert_eq!(power(store.as_ref(), a, c).await, None);
    assert_eq!(power(store.as_ref(), d, d).await, Some(30));
    assert_eq!(store.contributor(&c).await.unwrap().unwrap().power, 0);
    assert_eq!(store.global_metrics().await.unwrap().power_sum, 30);
}

#[tokio::test]
async fn test_transfer_between_undelegated_accounts_is_skipped() {
    let (store, engine) = engine(TokenStandard::Erc20);

    let logs = EventSequence::new().tx().transfer(addr(1), addr(2), 500).build();
    let outcomes = replay(&engine, &logs).await;

    assert_eq!(outcomes, vec![EventOutcome::Skipped(SkipReason::Undelegated)]);
    assert_eq!(store.global_metrics().await.unwrap().power_sum, 0);
    // The checkpoint still moves past the skipped log.
    assert_eq!(store.checkpoint().await.unwrap().unwrap().block_number, logs[0].block_number);
}

#[tokio::test]
async fn test_weight_change_for_unrelated_delegate_is_skipped() {
    let (_store, engine) = engine(TokenStandard::Erc20);
    let (a, z) = (addr(0xa), addr(0x2f));

    let logs = bootstrap(a).votes_changed(z, 0, 9).build();
    let outcomes = replay(&engine, &logs).await;

    assert_eq!(outcomes[1], EventOutcome::Skipped(SkipReason::SubjectMismatch));
}

#[tokio::test]
async fn test_ownership_transfers_carry_unit_power() {
    let (store, engine) = engine(TokenStandard::Erc721);
    let a = addr(0xa);

    let logs = bootstrap(a)
        .tx()
        .transfer_token(Address::ZERO, a, 7)
        .tx()
        .transfer_token(Address::ZERO, a, 8)
        .tx()
        .transfer_token(Address::ZERO, a, 9)
        .tx()
        .transfer_token(a, addr(0xb), 7)
        .build();
    replay(&engine, &logs).await;

    assert_eq!(power(store.as_ref(), a, a).await, Some(2));
    assert_eq!(store.global_metrics().await.unwrap().power_sum, 2);
}

#[tokio::test]
async fn test_replaying_the_same_logs_is_a_no_op() {
    let (store, engine) = engine(TokenStandard::Erc20);
    let (a, b, c) = (addr(0xa), addr(0xb), addr(0xc));

    let logs = growth(a, b)
        .tx()
        .delegate_changed(a, a, c)
        .votes_changed(a, 30, 0)
        .votes_changed(c, 0, 30)
        .build();

    replay(&engine, &logs).await;
    let metrics = store.global_metrics().await.unwrap();
    let edges = store.all_edges();

    let second = replay(&engine, &logs).await;
    assert!(second.iter().all(|o| *o == EventOutcome::Skipped(SkipReason::AlreadyApplied)));
    assert_eq!(store.global_metrics().await.unwrap(), metrics);
    assert_eq!(store.all_edges(), edges);
}

#[tokio::test]
async fn test_undecodable_log_fails_without_advancing() {
    let (store, engine) = engine(TokenStandard::Erc20);
    let a = addr(0xa);

    let mut logs = bootstrap(a).tx().transfer(addr(0xb), a, 5).build();
    replay(&engine, &logs[..1]).await;

    logs[1].topics[0] = Hash32([0x42; 32]);
    let err = engine.apply_log(&logs[1]).await.unwrap_err();
    assert!(matches!(err, EngineError::Decode(_)));

    assert_eq!(store.checkpoint().await.unwrap().unwrap().block_number, logs[0].block_number);
    assert_eq!(power(store.as_ref(), a, a).await, Some(0));
}

#[tokio::test]
async fn test_fungible_decoder_rejects_ownership_transfer() {
    let (_store, engine) = engine(TokenStandard::Erc20);

    let logs = EventSequence::new().tx().transfer_token(addr(1), addr(2), 3).build();
    let err = engine.apply_log(&logs[0]).await.unwrap_err();
    assert!(matches!(err, EngineError::Decode(_)));
}

fn delegated_elsewhere(d: Address, o: Address) -> EventSequence {
    bootstrap(d)
        .tx()
        .transfer(addr(0xb), d, 40)
        .tx()
        .delegate_changed(d, d, o)
        .votes_changed(d, 40, 0)
        .votes_changed(o, 0, 40)
}

#[tokio::test]
async fn test_switch_between_third_parties_conserves_power() {
    let (store, engine) = engine(TokenStandard::Erc20);
    let (d, o, n) = (addr(0xd), addr(0x0e), addr(0x0f));

    let logs = delegated_elsewhere(d, o)
        .tx()
        .delegate_changed(d, o, n)
        .votes_changed(o, 40, 0)
        .votes_changed(n, 0, 40)
        .build();
    let outcomes = replay(&engine, &logs).await;
    assert!(outcomes[5..].iter().all(EventOutcome::is_applied));

    assert_eq!(store.delegation_target(&d).await.unwrap().unwrap().target, n);
    assert_eq!(power(store.as_ref(), d, o).await, None);
    assert_eq!(power(store.as_ref(), o, d).await, None);
    assert_eq!(power(store.as_ref(), d, n).await, Some(40));

    assert_eq!(store.contributor(&o).await.unwrap().unwrap().power, 0);
    assert_eq!(store.contributor(&n).await.unwrap().unwrap().power, 40);

    let metrics = store.global_metrics().await.unwrap();
    assert_eq!(metrics.power_sum, 40);
    assert_eq!(metrics.member_count, 3);
}

#[tokio::test]
async fn test_returning_to_self_conserves_power() {
    let (store, engine) = engine(TokenStandard::Erc20);
    let (d, o) = (addr(0xd), addr(0x0e));

    let logs = delegated_elsewhere(d, o)
        .tx()
        .delegate_changed(d, o, d)
        .votes_changed(o, 40, 0)
        .votes_changed(d, 0, 40)
        .build();
    let outcomes = replay(&engine, &logs).await;
    assert!(outcomes[5..].iter().all(EventOutcome::is_applied));

    assert_eq!(store.delegation_target(&d).await.unwrap().unwrap().target, d);
    assert_eq!(power(store.as_ref(), d, o).await, None);
    assert_eq!(power(store.as_ref(), o, d).await, None);
    assert_eq!(power(store.as_ref(), d, d).await, Some(40));

    assert_eq!(store.contributor(&o).await.unwrap().unwrap().power, 0);
    assert_eq!(store.contributor(&d).await.unwrap().unwrap().power, 40);

    let metrics = store.global_metrics().await.unwrap();
    assert_eq!(metrics.power_sum, 40);
    assert_eq!(metrics.member_count, 2);
}

#[tokio::test]
async fn test_redelegation_replaces_target_row() {
    let (store, engine) = engine(TokenStandard::Erc20);
    let (a, c) = (addr(0xa), addr(0xc));

    let logs = bootstrap(a).tx().delegate_changed(a, a, c).build();
    replay(&engine, &logs).await;

    let target = store.delegation_target(&a).await.unwrap().unwrap();
    assert_eq!(target.owner, a);
    assert_eq!(target.target, c);
    assert_eq!(target.block_number, logs[1].block_number);
    assert_eq!(target.transaction_hash, logs[1].transaction_hash);
    assert!(store.delegation_target(&c).await.unwrap().is_none());
}
