//! Exchange Orchestrator
//!
//! Owns every exchange from address issuance to mint:
//!
//! ```text
//! create_transaction_entry ──▶ New ──run_exchange──▶ Success
//!                                         │
//!                                         └────────▶ Error
//! ```
//!
//! Derivation indices come from a counter seeded with the store's maximum and
//! guarded by a mutex, so concurrent requests never share an index and indices
//! are never reused across restarts.

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bitcoin::{AddressDeriver, DerivationError};
use crate::ethereum::{format_address, parse_ethereum_address, GatewayError, TokenSale};
use crate::logging::log_exchange_event;
use crate::monitoring::{MonitorError, MonitoringService};
use crate::providers::{ProviderError, RateProvider};
use crate::storage::{StorageError, TransactionStore};
use crate::types::transaction::{ExchangeTransaction, TransactionStatus};
use crate::types::units::{apply_rate, eth_to_wei, UnitError};

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Rate(#[from] ProviderError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Units(#[from] UnitError),

    #[error("derivation index space exhausted")]
    IndexExhausted,

    #[error("invalid recipient address: {0}")]
    InvalidRecipient(String),
}

pub struct ExchangeOrchestrator {
    store: Arc<dyn TransactionStore>,
    deriver: AddressDeriver,
    /// Highest derivation index issued so far
    counter: Mutex<u32>,
    monitor: MonitoringService,
    rates: Arc<dyn RateProvider>,
    sale: Arc<dyn TokenSale>,
}

impl ExchangeOrchestrator {
    /// Build the orchestrator, seeding the index counter from the store.
    pub async fn new(
        store: Arc<dyn TransactionStore>,
        deriver: AddressDeriver,
        monitor: MonitoringService,
        rates: Arc<dyn RateProvider>,
        sale: Arc<dyn TokenSale>,
    ) -> Result<Self, ExchangeError> {
        let highest = store.find_max_derivation_index().await?;
        info!(highest_index = highest, network = %deriver.network(), "Exchange orchestrator ready");

        Ok(Self {
            store,
            deriver,
            counter: Mutex::new(highest),
            monitor,
            rates,
            sale,
        })
    }

    /// Return the recipient's pending exchange, or issue a fresh address.
    ///
    /// The flag is `true` only when a new transaction was created.
    pub async fn create_transaction_entry(
        &self,
        recipient: Address,
    ) -> Result<(ExchangeTransaction, bool), ExchangeError> {
        let ethereum_address = format_address(&recipient);

        if let Some(existing) = self
            .store
            .find_latest_by_ethereum_address(&ethereum_address)
            .await?
        {
            if existing.is_pending() {
                return Ok((existing, false));
            }
        }

        let index = self.allocate_index().await?;
        let bitcoin_address = self.deriver.derive(index)?;

        let tx = ExchangeTransaction::new(ethereum_address, bitcoin_address.to_string(), index);
        self.store.create(&tx).await?;

        log_exchange_event("address_issued", &tx, None);
        Ok((tx, true))
    }

    async fn allocate_index(&self) -> Result<u32, ExchangeError> {
        let mut counter = self.counter.lock().await;
        let next = counter.checked_add(1).ok_or(ExchangeError::IndexExhausted)?;
        *counter = next;
        Ok(next)
    }

    /// Most recent transaction for a recipient
    pub async fn latest_for(
        &self,
        recipient: Address,
    ) -> Result<Option<ExchangeTransaction>, ExchangeError> {
        Ok(self
            .store
            .find_latest_by_ethereum_address(&format_address(&recipient))
            .await?)
    }

    /// Drive one transaction to a terminal status and persist it.
    pub async fn run_exchange(&self, mut tx: ExchangeTransaction) -> ExchangeTransaction {
        if tx.status.is_terminal() {
            warn!(tx_id = %tx.id, status = %tx.status, "Transaction already finished, skipping");
            return tx;
        }

        match self.drive(&mut tx).await {
            Ok(tx_hash) => {
                tx.mark_success();
                info!(tx_id = %tx.id, tx_hash = %tx_hash, "Exchange complete");
                self.persist(&tx).await;
                log_exchange_event("tokens_minted", &tx, None);
            }
            Err(e) => {
                let message = e.to_string();
                tx.mark_failed(message.clone());
                self.persist(&tx).await;
                log_exchange_event("exchange_failed", &tx, Some(&message));
            }
        }

        tx
    }

    async fn drive(&self, tx: &mut ExchangeTransaction) -> Result<String, ExchangeError> {
        let recipient = parse_ethereum_address(&tx.ethereum_address)
            .ok_or_else(|| ExchangeError::InvalidRecipient(tx.ethereum_address.clone()))?;

        let spot = self.rates.get_rate().await?;
        let btc_eth =
            Decimal::try_from(spot).map_err(|_| ProviderError::InvalidRate(spot.to_string()))?;

        let amount = self.monitor.wait_for_transfer(&tx.bitcoin_address).await?;
        tx.set_amount(amount);
        self.store.save(tx).await?;
        log_exchange_event("payment_confirmed", tx, None);

        let received_eth = amount.checked_mul(btc_eth).ok_or(UnitError::Overflow)?;
        let received_wei = eth_to_wei(received_eth)?;

        let token_rate = self.sale.get_token_exchange_rate().await?;
        let tokens_left = self.sale.get_tokens_left().await?;

        let requested = apply_rate(received_wei, token_rate)?;
        let mint_amount = cap_to_supply(requested, tokens_left);
        if mint_amount < requested {
            warn!(
                tx_id = %tx.id,
                requested = %requested,
                tokens_left = %tokens_left,
                "Requested amount exceeds remaining supply, capping"
            );
        }

        info!(
            tx_id = %tx.id,
            btc_eth = %btc_eth,
            received_wei = %received_wei,
            token_rate = %token_rate,
            amount = %mint_amount,
            "Minting tokens"
        );

        Ok(self.sale.mint_tokens(recipient, mint_amount).await?)
    }

    async fn persist(&self, tx: &ExchangeTransaction) {
        if let Err(e) = self.store.save(tx).await {
            error!(tx_id = %tx.id, status = %tx.status, error = %e, "Failed to persist transaction");
        }
    }

    /// Run the exchange in its own task
    pub fn spawn_exchange(self: &Arc<Self>, tx: ExchangeTransaction) -> JoinHandle<ExchangeTransaction> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move { orchestrator.run_exchange(tx).await })
    }

    /// Restart every unfinished exchange, one task each.
    pub async fn resume_monitoring(
        self: &Arc<Self>,
    ) -> Result<Vec<JoinHandle<ExchangeTransaction>>, ExchangeError> {
        let pending = self.store.find_all_by_status(TransactionStatus::New).await?;
        info!(count = pending.len(), "Resuming pending exchanges");

        Ok(pending
            .into_iter()
            .map(|tx| {
                log_exchange_event("exchange_resumed", &tx, None);
                self.spawn_exchange(tx)
            })
            .collect())
    }
}

fn cap_to_supply(requested: U256, tokens_left: U256) -> U256 {
    requested.min(tokens_left)
}
