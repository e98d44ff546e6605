use anyhow::Context;
use delegation_core::{
    engine::DelegationEngine,
    events::{EventDecoder, RawLog, TokenStandard},
    ledger::{LedgerStore, SqliteStore},
};
use serde_json::json;
use std::sync::Arc;

/// Applies every log in `events_path` (JSON lines) to the ledger at `database_url` and prints
/// the resulting totals.
pub async fn handle_replay(
    events_path: &str,
    database_url: &str,
    standard: TokenStandard,
) -> anyhow::Result<()> {
    let contents = tokio::fs::read_to_string(events_path)
        .await
        .with_context(|| format!("failed to read {events_path}"))?;

    let decoder = EventDecoder::new(standard);
    let mut events = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let log: RawLog = serde_json::from_str(line)
            .with_context(|| format!("{events_path}:{}: invalid log", line_no + 1))?;
        let event = decoder
            .decode(&log)
            .with_context(|| format!("{events_path}:{}: undecodable log", line_no + 1))?;
        events.push(event);
    }

    let store = Arc::new(
        SqliteStore::connect(database_url)
            .await
            .with_context(|| format!("failed to open ledger at {database_url}"))?,
    );
    let engine = DelegationEngine::new(store.clone(), standard);
    let summary = engine.apply_all(&events).await.context("failed to apply logs")?;

    let metrics = store.global_metrics().await?;
    let checkpoint = store.checkpoint().await?;

    let report = json!({
        "applied": summary.applied,
        "skipped": summary.skipped,
        "power_sum": metrics.power_sum.to_string(),
        "member_count": metrics.member_count,
        "checkpoint": checkpoint.map(|c| json!({
            "block_number": c.block_number,
            "log_index": c.log_index,
        })),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
