//! SQLite Persistent Storage for Exchange Transactions
//!
//! Durable storage so pending exchanges and the derivation counter survive
//! service restarts. Uses connection pooling via r2d2 for concurrent access.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

use super::traits::{StorageError, StorageResult, TransactionStore};
use crate::types::transaction::{ExchangeTransaction, TransactionStatus};

/// SQLite-backed transaction store with connection pooling
pub struct SqliteTransactionStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteTransactionStore {
    /// Create a new store with the given database path
    ///
    /// Creates the database file and runs migrations if needed.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(10)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.run_migrations()?;

        Ok(store)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StorageError> {
        self.pool
            .get()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    fn run_migrations(&self) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS exchange_transactions (
                id TEXT PRIMARY KEY,
                ethereum_address TEXT NOT NULL,
                bitcoin_address TEXT NOT NULL UNIQUE,
                derivation_index INTEGER NOT NULL UNIQUE,
                amount_transferred TEXT NOT NULL DEFAULT '0',
                status TEXT NOT NULL DEFAULT 'new',
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_exchange_eth_address
                ON exchange_transactions(ethereum_address);
            CREATE INDEX IF NOT EXISTS idx_exchange_status
                ON exchange_transactions(status);
            "#,
        )
        .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<ExchangeTransaction> {
        let status: String = row.get("status")?;
        let amount: String = row.get("amount_transferred")?;
        let created_at: String = row.get("created_at")?;
        let updated_at: String = row.get("updated_at")?;

        Ok(ExchangeTransaction {
            id: row.get("id")?,
            ethereum_address: row.get("ethereum_address")?,
            bitcoin_address: row.get("bitcoin_address")?,
            derivation_index: row.get::<_, i64>("derivation_index")? as u32,
            amount_transferred: Decimal::from_str(&amount).map_err(|e| conversion_error(3, e))?,
            status: TransactionStatus::from_str(&status)
                .map_err(|e| conversion_error(5, StorageError::InvalidData(e)))?,
            error_message: row.get("error")?,
            created_at: parse_timestamp(&created_at).map_err(|e| conversion_error(7, e))?,
            updated_at: parse_timestamp(&updated_at).map_err(|e| conversion_error(8, e))?,
        })
    }

    fn create_sync(&self, tx: &ExchangeTransaction) -> Result<(), StorageError> {
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO exchange_transactions (
                id, ethereum_address, bitcoin_address, derivation_index,
                amount_transferred, status, error, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                tx.id,
                tx.ethereum_address.to_lowercase(),
                tx.bitcoin_address,
                tx.derivation_index as i64,
                tx.amount_transferred.to_string(),
                tx.status.to_string(),
                tx.error_message,
                format_timestamp(&tx.created_at),
                format_timestamp(&tx.updated_at),
            ],
        )
        .map_err(|e| {
            if let rusqlite::Error::SqliteFailure(ref err, _) = e {
                if err.extended_code == 1555 || err.extended_code == 2067 {
                    return StorageError::Duplicate(format!(
                        "{} (index {})",
                        tx.bitcoin_address, tx.derivation_index
                    ));
                }
            }
            StorageError::Database(e.to_string())
        })?;

        Ok(())
    }

    fn save_sync(&self, tx: &ExchangeTransaction) -> Result<(), StorageError> {
        let conn = self.conn()?;

        // Address, recipient and index are immutable after creation
        let rows_affected = conn
            .execute(
                r#"
            UPDATE exchange_transactions SET
                amount_transferred = ?2,
                status = ?3,
                error = ?4,
                updated_at = ?5
            WHERE id = ?1
            "#,
                params![
                    tx.id,
                    tx.amount_transferred.to_string(),
                    tx.status.to_string(),
                    tx.error_message,
                    format_timestamp(&tx.updated_at),
                ],
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        if rows_affected == 0 {
            return Err(StorageError::NotFound(tx.id.clone()));
        }

        Ok(())
    }

    fn find_by_id_sync(&self, id: &str) -> Result<Option<ExchangeTransaction>, StorageError> {
        let conn = self.conn()?;

        conn.query_row(
            "SELECT * FROM exchange_transactions WHERE id = ?1",
            params![id],
            |row| Self::row_to_record(row),
        )
        .optional()
        .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn find_latest_sync(
        &self,
        ethereum_address: &str,
    ) -> Result<Option<ExchangeTransaction>, StorageError> {
        let conn = self.conn()?;

        conn.query_row(
            r#"
            SELECT * FROM exchange_transactions
            WHERE ethereum_address = ?1
            ORDER BY derivation_index DESC
            LIMIT 1
            "#,
            params![ethereum_address.to_lowercase()],
            |row| Self::row_to_record(row),
        )
        .optional()
        .map_err(|e| StorageError::Database(e.to_string()))
    }

    fn find_all_by_status_sync(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<ExchangeTransaction>, StorageError> {
        let conn = self.conn()?;

        let mut stmt = conn
            .prepare(
                "SELECT * FROM exchange_transactions WHERE status = ?1 ORDER BY derivation_index ASC",
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let records = stmt
            .query_map(params![status.to_string()], |row| Self::row_to_record(row))
            .map_err(|e| StorageError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(records)
    }

    fn find_max_derivation_index_sync(&self) -> Result<u32, StorageError> {
        let conn = self.conn()?;

        let max: i64 = conn
            .query_row(
                "SELECT COALESCE(MAX(derivation_index), 0) FROM exchange_transactions",
                [],
                |row| row.get(0),
            )
            .map_err(|e| StorageError::Database(e.to_string()))?;

        u32::try_from(max).map_err(|_| StorageError::InvalidData(format!("derivation index {}", max)))
    }
}

fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|t| t.with_timezone(&Utc))
}

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

#[async_trait]
impl TransactionStore for SqliteTransactionStore {
    async fn find_latest_by_ethereum_address(
        &self,
        ethereum_address: &str,
    ) -> StorageResult<Option<ExchangeTransaction>> {
        self.find_latest_sync(ethereum_address)
    }

    async fn find_all_by_status(
        &self,
        status: TransactionStatus,
    ) -> StorageResult<Vec<ExchangeTransaction>> {
        self.find_all_by_status_sync(status)
    }

    async fn find_by_id(&self, id: &str) -> StorageResult<Option<ExchangeTransaction>> {
        self.find_by_id_sync(id)
    }

    async fn create(&self, tx: &ExchangeTransaction) -> StorageResult<()> {
        self.create_sync(tx)
    }

    async fn save(&self, tx: &ExchangeTransaction) -> StorageResult<()> {
        self.save_sync(tx)
    }

    async fn find_max_derivation_index(&self) -> StorageResult<u32> {
        self.find_max_derivation_index_sync()
    }
}
