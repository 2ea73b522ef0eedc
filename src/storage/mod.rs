//! Storage Layer Module
//!
//! Persistence for exchange transactions.
//!
//! This module contains:
//! - Storage trait definition for abstraction
//! - SQLite implementation for production
//! - In-memory implementation for testing

pub mod memory;
pub mod sqlite;
pub mod traits;

// Re-exports for convenience
pub use memory::MemoryTransactionStore;
pub use sqlite::SqliteTransactionStore;
pub use traits::{StorageError, StorageResult, TransactionStore};
