//! Storage Trait Definitions
//!
//! Abstract persistence for exchange transactions.
//! Implementations can use SQLite (production) or in-memory (testing).

use async_trait::async_trait;
use thiserror::Error;

use crate::types::transaction::{ExchangeTransaction, TransactionStatus};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Exchange transaction storage interface
///
/// Implementations:
/// - `SqliteTransactionStore` - Production storage with SQLite
/// - `MemoryTransactionStore` - In-memory storage for testing
///
/// Both must tolerate concurrent readers and writers without outside locking.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Most recently created transaction for an Ethereum address (case-insensitive)
    async fn find_latest_by_ethereum_address(
        &self,
        ethereum_address: &str,
    ) -> StorageResult<Option<ExchangeTransaction>>;

    /// All transactions with the given status, oldest first
    async fn find_all_by_status(
        &self,
        status: TransactionStatus,
    ) -> StorageResult<Vec<ExchangeTransaction>>;

    /// Get a transaction by ID
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<ExchangeTransaction>>;

    /// Insert a new transaction; a reused ID, address or index is `Duplicate`
    async fn create(&self, tx: &ExchangeTransaction) -> StorageResult<()>;

    /// Overwrite the mutable fields of an existing transaction
    async fn save(&self, tx: &ExchangeTransaction) -> StorageResult<()>;

    /// Highest derivation index ever stored, or zero
    async fn find_max_derivation_index(&self) -> StorageResult<u32>;
}
