use super::{
    Checkpoint, ContributorAggregate, CorrelationRecord, DelegationEdge, DelegationTarget, EdgeId,
    GlobalMetrics, LedgerStore, StoreError, VoteChange, WriteBatch,
};
use crate::types::{Address, Hash32};
use async_trait::async_trait;
use sqlx::{
    sqlite::{SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::str::FromStr;

/// Schema for the ledger tables. Addresses and hashes are stored as `0x` hex text; signed
/// and unsigned 128-bit quantities as decimal text.
const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS delegation_targets (
    owner TEXT PRIMARY KEY,
    target TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    block_timestamp INTEGER NOT NULL,
    transaction_hash TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS correlation_records (
    transaction_hash TEXT PRIMARY KEY,
    delegator TEXT NOT NULL,
    from_delegate TEXT NOT NULL,
    to_delegate TEXT NOT NULL,
    from_previous_votes TEXT,
    from_new_votes TEXT,
    to_previous_votes TEXT,
    to_new_votes TEXT,
    block_number INTEGER NOT NULL,
    block_timestamp INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS delegation_edges (
    from_address TEXT NOT NULL,
    to_address TEXT NOT NULL,
    power TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    block_timestamp INTEGER NOT NULL,
    transaction_hash TEXT NOT NULL,
    PRIMARY KEY (from_address, to_address)
);
CREATE INDEX IF NOT EXISTS idx_delegation_edges_to ON delegation_edges(to_address);
CREATE TABLE IF NOT EXISTS contributor_aggregates (
    address TEXT PRIMARY KEY,
    power TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    block_timestamp INTEGER NOT NULL,
    transaction_hash TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS global_metrics (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    power_sum TEXT NOT NULL,
    member_count INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS ledger_checkpoint (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    block_number INTEGER NOT NULL,
    log_index INTEGER NOT NULL
);
";

const EDGE_COLUMNS: &str =
    "from_address, to_address, power, block_number, block_timestamp, transaction_hash";

/// `SQLite` ledger store. Every [`WriteBatch`] is applied inside one database transaction.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Connects to `database_url` (e.g. `sqlite://ledger.db?mode=rwc`) and creates the schema.
    ///
    /// # Errors
    /// Returns `StoreError::Database` if the connection or schema creation fails.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new().max_connections(4).connect(database_url).await?;
        Self::with_pool(pool).await
    }

    /// Opens a private in-memory database. The pool is pinned to a single connection so the
    /// database lives as long as the store.
    ///
    /// # Errors
    /// Returns `StoreError::Database` if the connection or schema creation fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: Pool<Sqlite>) -> Result<Self, StoreError> {
        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    fn get_required<'r, T>(row: &'r SqliteRow, table: &'static str, column: &str) -> Result<T, StoreError>
    where
        T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
    {
        row.try_get::<T, _>(column)
            .map_err(|e| StoreError::Corrupt { table, message: format!("column '{column}': {e}") })
    }

    fn get_parsed<T>(row: &SqliteRow, table: &'static str, column: &str) -> Result<T, StoreError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw: String = Self::get_required(row, table, column)?;
        raw.parse::<T>()
            .map_err(|e| StoreError::Corrupt { table, message: format!("column '{column}': {e}") })
    }

    fn get_u64(row: &SqliteRow, table: &'static str, column: &str) -> Result<u64, StoreError> {
        let value: i64 = Self::get_required(row, table, column)?;
        u64::try_from(value).map_err(|e| StoreError::Corrupt {
            table,
            message: format!("column '{column}' value {value} out of u64 range: {e}"),
        })
    }

    fn get_vote_change(
        row: &SqliteRow,
        previous_column: &str,
        new_column: &str,
    ) -> Result<Option<VoteChange>, StoreError> {
        let table = "correlation_records";
        let previous: Option<String> = Self::get_required(row, table, previous_column)?;
        let new: Option<String> = Self::get_required(row, table, new_column)?;
        match (previous, new) {
            (Some(previous), Some(new)) => {
                let parse = |column: &str, raw: &str| {
                    raw.parse::<u128>().map_err(|e| StoreError::Corrupt {
                        table,
                        message: format!("column '{column}': {e}"),
                    })
                };
                Ok(Some(VoteChange {
                    previous: parse(previous_column, &previous)?,
                    new: parse(new_column, &new)?,
                }))
            }
            _ => Ok(None),
        }
    }

    fn row_to_target(row: &SqliteRow) -> Result<DelegationTarget, StoreError> {
        let table = "delegation_targets";
        Ok(DelegationTarget {
            owner: Self::get_parsed(row, table, "owner")?,
            target: Self::get_parsed(row, table, "target")?,
            block_number: Self::get_u64(row, table, "block_number")?,
            block_timestamp: Self::get_u64(row, table, "block_timestamp")?,
            transaction_hash: Self::get_parsed(row, table, "transaction_hash")?,
        })
    }

    fn row_to_correlation(row: &SqliteRow) -> Result<CorrelationRecord, StoreError> {
        let table = "correlation_records";
        Ok(CorrelationRecord {
            transaction_hash: Self::get_parsed(row, table, "transaction_hash")?,
            delegator: Self::get_parsed(row, table, "delegator")?,
            from_delegate: Self::get_parsed(row, table, "from_delegate")?,
            to_delegate: Self::get_parsed(row, table, "to_delegate")?,
            from_delegate_votes: Self::get_vote_change(
                row,
                "from_previous_votes",
                "from_new_votes",
            )?,
            to_delegate_votes: Self::get_vote_change(row, "to_previous_votes", "to_new_votes")?,
            block_number: Self::get_u64(row, table, "block_number")?,
            block_timestamp: Self::get_u64(row, table, "block_timestamp")?,
        })
    }

    fn row_to_edge(row: &SqliteRow) -> Result<DelegationEdge, StoreError> {
        let table = "delegation_edges";
        Ok(DelegationEdge {
            from: Self::get_parsed(row, table, "from_address")?,
            to: Self::get_parsed(row, table, "to_address")?,
            power: Self::get_parsed(row, table, "power")?,
            block_number: Self::get_u64(row, table, "block_number")?,
            block_timestamp: Self::get_u64(row, table, "block_timestamp")?,
            transaction_hash: Self::get_parsed(row, table, "transaction_hash")?,
        })
    }

    fn row_to_contributor(row: &SqliteRow) -> Result<ContributorAggregate, StoreError> {
        let table = "contributor_aggregates";
        Ok(ContributorAggregate {
            address: Self::get_parsed(row, table, "address")?,
            power: Self::get_parsed(row, table, "power")?,
            block_number: Self::get_u64(row, table, "block_number")?,
            block_timestamp: Self::get_u64(row, table, "block_timestamp")?,
            transaction_hash: Self::get_parsed(row, table, "transaction_hash")?,
        })
    }
}

fn to_i64(column: &'static str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::OutOfRange { column, value: value.to_string() })
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn delegation_target(
        &self,
        owner: &Address,
    ) -> Result<Option<DelegationTarget>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT owner, target, block_number, block_timestamp, transaction_hash
            FROM delegation_targets
            WHERE owner = ?
            ",
        )
        .bind(owner.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_target(&row)).transpose()
    }

    async fn correlation(&self, tx: &Hash32) -> Result<Option<CorrelationRecord>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT transaction_hash, delegator, from_delegate, to_delegate,
                   from_previous_votes, from_new_votes, to_previous_votes, to_new_votes,
                   block_number, block_timestamp
            FROM correlation_records
            WHERE transaction_hash = ?
            ",
        )
        .bind(tx.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_correlation(&row)).transpose()
    }

    async fn edge(&self, id: &EdgeId) -> Result<Option<DelegationEdge>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {EDGE_COLUMNS} FROM delegation_edges WHERE from_address = ? AND to_address = ?"
        ))
        .bind(id.from.to_string())
        .bind(id.to.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_edge(&row)).transpose()
    }

    async fn edges_from(&self, from: &Address) -> Result<Vec<DelegationEdge>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EDGE_COLUMNS} FROM delegation_edges WHERE from_address = ? ORDER BY to_address"
        ))
        .bind(from.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_edge).collect()
    }

    async fn edges_to(&self, to: &Address) -> Result<Vec<DelegationEdge>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EDGE_COLUMNS} FROM delegation_edges WHERE to_address = ? ORDER BY from_address"
        ))
        .bind(to.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_edge).collect()
    }

    async fn contributor(
        &self,
        address: &Address,
    ) -> Result<Option<ContributorAggregate>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT address, power, block_number, block_timestamp, transaction_hash
            FROM contributor_aggregates
            WHERE address = ?
            ",
        )
        .bind(address.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| Self::row_to_contributor(&row)).transpose()
    }

    async fn global_metrics(&self) -> Result<GlobalMetrics, StoreError> {
        let row = sqlx::query("SELECT power_sum, member_count FROM global_metrics WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(GlobalMetrics {
                power_sum: Self::get_parsed(&row, "global_metrics", "power_sum")?,
                member_count: Self::get_u64(&row, "global_metrics", "member_count")?,
            }),
            None => Ok(GlobalMetrics::default()),
        }
    }

    async fn checkpoint(&self) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query("SELECT block_number, log_index FROM ledger_checkpoint WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(Checkpoint {
                block_number: Self::get_u64(&row, "ledger_checkpoint", "block_number")?,
                log_index: Self::get_u64(&row, "ledger_checkpoint", "log_index")?,
            })
        })
        .transpose()
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        for target in batch.targets.values() {
            sqlx::query(
                r"
                INSERT OR REPLACE INTO delegation_targets
                    (owner, target, block_number, block_timestamp, transaction_hash)
                VALUES (?, ?, ?, ?, ?)
                ",
            )
            .bind(target.owner.to_string())
            .bind(target.target.to_string())
            .bind(to_i64("block_number", target.block_number)?)
            .bind(to_i64("block_timestamp", target.block_timestamp)?)
            .bind(target.transaction_hash.to_string())
            .execute(&mut *tx)
            .await?;
        }

        for record in batch.correlations.values() {
            sqlx::query(
                r"
                INSERT OR REPLACE INTO correlation_records
                    (transaction_hash, delegator, from_delegate, to_delegate,
                     from_previous_votes, from_new_votes, to_previous_votes, to_new_votes,
                     block_number, block_timestamp)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(record.transaction_hash.to_string())
            .bind(record.delegator.to_string())
            .bind(record.from_delegate.to_string())
            .bind(record.to_delegate.to_string())
            .bind(record.from_delegate_votes.map(|v| v.previous.to_string()))
            .bind(record.from_delegate_votes.map(|v| v.new.to_string()))
            .bind(record.to_delegate_votes.map(|v| v.previous.to_string()))
            .bind(record.to_delegate_votes.map(|v| v.new.to_string()))
            .bind(to_i64("block_number", record.block_number)?)
            .bind(to_i64("block_timestamp", record.block_timestamp)?)
            .execute(&mut *tx)
            .await?;
        }

        for (id, edge) in &batch.edges {
            match edge {
                Some(edge) => {
                    sqlx::query(&format!(
                        "INSERT OR REPLACE INTO delegation_edges ({EDGE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"
                    ))
                    .bind(edge.from.to_string())
                    .bind(edge.to.to_string())
                    .bind(edge.power.to_string())
                    .bind(to_i64("block_number", edge.block_number)?)
                    .bind(to_i64("block_timestamp", edge.block_timestamp)?)
                    .bind(edge.transaction_hash.to_string())
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query(
                        "DELETE FROM delegation_edges WHERE from_address = ? AND to_address = ?",
                    )
                    .bind(id.from.to_string())
                    .bind(id.to.to_string())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        for aggregate in batch.contributors.values() {
            sqlx::query(
                r"
                INSERT OR REPLACE INTO contributor_aggregates
                    (address, power, block_number, block_timestamp, transaction_hash)
                VALUES (?, ?, ?, ?, ?)
                ",
            )
            .bind(aggregate.address.to_string())
            .bind(aggregate.power.to_string())
            .bind(to_i64("block_number", aggregate.block_number)?)
            .bind(to_i64("block_timestamp", aggregate.block_timestamp)?)
            .bind(aggregate.transaction_hash.to_string())
            .execute(&mut *tx)
            .await?;
        }

        if let Some(metrics) = batch.metrics {
            sqlx::query(
                "INSERT OR REPLACE INTO global_metrics (id, power_sum, member_count) VALUES (1, ?, ?)",
            )
            .bind(metrics.power_sum.to_string())
            .bind(to_i64("member_count", metrics.member_count)?)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(checkpoint) = batch.checkpoint {
            sqlx::query(
                "INSERT OR REPLACE INTO ledger_checkpoint (id, block_number, log_index) VALUES (1, ?, ?)",
            )
            .bind(to_i64("block_number", checkpoint.block_number)?)
            .bind(to_i64("log_index", checkpoint.log_index)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
