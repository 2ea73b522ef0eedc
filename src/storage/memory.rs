//! In-Memory Storage Implementation
//!
//! Provides in-memory storage for testing and dry runs.
//! Data is lost when the service restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{StorageError, StorageResult, TransactionStore};
use crate::types::transaction::{ExchangeTransaction, TransactionStatus};

/// In-memory exchange transaction store
///
/// Uses Arc<RwLock<>> for concurrent access; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryTransactionStore {
    /// Records indexed by transaction ID
    records: Arc<RwLock<HashMap<String, ExchangeTransaction>>>,
}

impl MemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transactions
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl TransactionStore for MemoryTransactionStore {
    async fn find_latest_by_ethereum_address(
        &self,
        ethereum_address: &str,
    ) -> StorageResult<Option<ExchangeTransaction>> {
        let records = self.records.read().await;

        Ok(records
            .values()
            .filter(|r| r.ethereum_address.eq_ignore_ascii_case(ethereum_address))
            .max_by_key(|r| r.derivation_index)
            .cloned())
    }

    async fn find_all_by_status(
        &self,
        status: TransactionStatus,
    ) -> StorageResult<Vec<ExchangeTransaction>> {
        let records = self.records.read().await;

        let mut matching: Vec<ExchangeTransaction> = records
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.derivation_index);

        Ok(matching)
    }

    async fn find_by_id(&self, id: &str) -> StorageResult<Option<ExchangeTransaction>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn create(&self, tx: &ExchangeTransaction) -> StorageResult<()> {
        let mut records = self.records.write().await;

        let clash = records.contains_key(&tx.id)
            || records.values().any(|r| {
                r.derivation_index == tx.derivation_index || r.bitcoin_address == tx.bitcoin_address
            });
        if clash {
            return Err(StorageError::Duplicate(format!(
                "{} (index {})",
                tx.bitcoin_address, tx.derivation_index
            )));
        }

        records.insert(tx.id.clone(), tx.clone());
        Ok(())
    }

    async fn save(&self, tx: &ExchangeTransaction) -> StorageResult<()> {
        let mut records = self.records.write().await;

        let existing = records
            .get_mut(&tx.id)
            .ok_or_else(|| StorageError::NotFound(tx.id.clone()))?;

        existing.amount_transferred = tx.amount_transferred;
        existing.status = tx.status;
        existing.error_message = tx.error_message.clone();
        existing.updated_at = tx.updated_at;

        Ok(())
    }

    async fn find_max_derivation_index(&self) -> StorageResult<u32> {
        let records = self.records.read().await;
        Ok(records.values().map(|r| r.derivation_index).max().unwrap_or(0))
    }
}
