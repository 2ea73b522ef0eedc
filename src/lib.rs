//! btcmint - BTC → crowdsale token exchange
//!
//! A buyer asks for a Bitcoin address for their Ethereum address. The service
//! derives a fresh watch-only address, waits for a confirmed payment, prices it
//! in ETH and mints the equivalent crowdsale tokens to the buyer.
//!
//! ## Components
//!
//! 1. **Address derivation** - child addresses of one extended public key
//! 2. **Monitoring** - balance polling with provider fallback
//! 3. **Ethereum gateway** - crowdsale reads and signed mint transactions
//! 4. **Exchange orchestrator** - index allocation, lifecycle, resume on restart
//! 5. **API** - address issuance and status over HTTP

pub mod api;
pub mod bitcoin;
pub mod common;
pub mod config;
pub mod ethereum;
pub mod exchange;
pub mod logging;
pub mod monitoring;
pub mod providers;
pub mod storage;
pub mod types;

// Re-exports: core lifecycle
pub use exchange::{ExchangeError, ExchangeOrchestrator};
pub use types::{ExchangeTransaction, TransactionStatus};

// Re-exports: infrastructure
pub use common::{Result, ServiceError};
pub use config::{ConfigError, ExchangeConfig, Network};
pub use storage::{MemoryTransactionStore, SqliteTransactionStore, StorageError, TransactionStore};

// Re-exports: collaborators
pub use ethereum::{CrowdsaleGateway, RpcClient, TokenSale, Whitelist};
pub use monitoring::{MonitorError, MonitoringService};
pub use providers::{BalanceProvider, ProviderError, RateProvider};
