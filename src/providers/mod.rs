//! External Data Providers
//!
//! Balance lookups for derived addresses and the BTC → ETH spot rate.
//! Each capability is a trait so the monitoring and exchange layers can be
//! driven by any backend (or a mock in tests).
//!
//! - [`BlockcypherProvider`] - explorer API, ≥1 confirmation
//! - [`EsploraProvider`] - UTXO index, ≥6 confirmations
//! - [`HttpRateProvider`] - JSON rate oracle

pub mod blockcypher;
pub mod esplora;
pub mod rate;

use async_trait::async_trait;
use thiserror::Error;

pub use blockcypher::BlockcypherProvider;
pub use esplora::EsploraProvider;
pub use rate::HttpRateProvider;

/// Provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned HTTP {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("invalid exchange rate: {0}")]
    InvalidRate(String),
}

/// Confirmed balance lookup for a Bitcoin address
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Confirmed balance in satoshis
    async fn get_confirmed_balance(&self, address: &str) -> Result<u64, ProviderError>;
}

/// BTC → ETH spot rate
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// ETH received per 1 BTC
    async fn get_rate(&self) -> Result<f64, ProviderError>;
}

/// Local HTTP fixture server for provider tests
#[cfg(test)]
pub(crate) mod fixture {
    use axum::Router;
    use std::net::SocketAddr;

    /// Serve `router` on an ephemeral port and return its base URL
    pub async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        format!("http://{}", addr)
    }
}
