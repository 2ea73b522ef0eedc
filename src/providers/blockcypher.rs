//! BlockCypher Balance Provider
//!
//! Explorer-style lookup: the address balance endpoint with a minimum
//! confirmation filter, reporting `final_balance`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{BalanceProvider, ProviderError};

pub const BLOCKCYPHER_URL: &str = "https://api.blockcypher.com";

/// Confirmations BlockCypher must see before a payment counts
pub const DEFAULT_CONFIRMATIONS: u32 = 1;

#[derive(Debug, Clone)]
pub struct BlockcypherProvider {
    client: Client,
    base_url: String,
    chain: &'static str,
    token: Option<String>,
    confirmations: u32,
}

impl BlockcypherProvider {
    /// Create provider for the given network against the public API
    pub fn new(network: bitcoin::Network, token: Option<String>) -> Self {
        Self::with_base_url(BLOCKCYPHER_URL, network, token)
    }

    /// Create with custom URL
    pub fn with_base_url(base_url: &str, network: bitcoin::Network, token: Option<String>) -> Self {
        let chain = match network {
            bitcoin::Network::Bitcoin => "main",
            _ => "test3",
        };

        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            chain,
            token: token.filter(|t| !t.is_empty()),
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }

    pub fn with_confirmations(mut self, confirmations: u32) -> Self {
        self.confirmations = confirmations;
        self
    }
}

#[derive(Debug, Deserialize)]
struct AddressBalance {
    final_balance: i64,
}

#[async_trait]
impl BalanceProvider for BlockcypherProvider {
    async fn get_confirmed_balance(&self, address: &str) -> Result<u64, ProviderError> {
        let url = format!(
            "{}/v1/btc/{}/addrs/{}/balance",
            self.base_url, self.chain, address
        );

        let mut query = vec![("confirmations", self.confirmations.to_string())];
        if let Some(token) = &self.token {
            query.push(("token", token.clone()));
        }

        let resp = self.client.get(&url).query(&query).send().await?;

        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                provider: "blockcypher",
                status: resp.status().as_u16(),
            });
        }

        let balance: AddressBalance = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        // Pending spends can push final_balance negative
        Ok(balance.final_balance.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fixture;
    use axum::{
        extract::{Path, Query},
        http::StatusCode,
        routing::get,
        Json, Router,
    };
    use std::collections::HashMap;

    async fn balance_handler(
        Path((chain, address)): Path<(String, String)>,
        Query(query): Query<HashMap<String, String>>,
    ) -> Result<Json<serde_json::Value>, StatusCode> {
        if chain != "test3" || query.get("confirmations").map(String::as_str) != Some("1") {
            return Err(StatusCode::BAD_REQUEST);
        }
        match address.as_str() {
            "funded" => Ok(Json(serde_json::json!({
                "address": address,
                "balance": 15000,
                "final_balance": 15000
            }))),
            "empty" => Ok(Json(serde_json::json!({ "final_balance": 0 }))),
            _ => Err(StatusCode::TOO_MANY_REQUESTS),
        }
    }

    async fn provider() -> BlockcypherProvider {
        let router = Router::new().route("/v1/btc/:chain/addrs/:address/balance", get(balance_handler));
        let base = fixture::serve(router).await;
        BlockcypherProvider::with_base_url(&base, bitcoin::Network::Testnet, None)
    }

    #[tokio::test]
    async fn test_reads_final_balance() {
        let provider = provider().await;
        assert_eq!(provider.get_confirmed_balance("funded").await.unwrap(), 15_000);
        assert_eq!(provider.get_confirmed_balance("empty").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_http_error_surfaces() {
        let provider = provider().await;
        let err = provider.get_confirmed_balance("limited").await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 429, .. }));
    }
}
