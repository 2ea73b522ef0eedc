//! Esplora Balance Provider
//!
//! UTXO-index lookup: sums unspent outputs of an address that are buried
//! under enough blocks. Confirmations are computed against the chain tip.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{BalanceProvider, ProviderError};

/// Esplora API endpoints
pub const MAINNET_URL: &str = "https://blockstream.info/api";
pub const TESTNET_URL: &str = "https://blockstream.info/testnet/api";

/// Confirmations an output needs before it counts
pub const DEFAULT_CONFIRMATIONS: u32 = 6;

#[derive(Debug, Clone)]
pub struct EsploraProvider {
    client: Client,
    base_url: String,
    confirmations: u32,
}

impl EsploraProvider {
    /// Create with custom URL
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }

    pub fn with_confirmations(mut self, confirmations: u32) -> Self {
        self.confirmations = confirmations;
        self
    }

    async fn get_tip_height(&self) -> Result<u64, ProviderError> {
        let url = format!("{}/blocks/tip/height", self.base_url);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                provider: "esplora",
                status: resp.status().as_u16(),
            });
        }

        resp.text()
            .await?
            .trim()
            .parse()
            .map_err(|e| ProviderError::Parse(format!("invalid height: {}", e)))
    }
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    value: u64,
    status: EsploraUtxoStatus,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxoStatus {
    block_height: Option<u64>,
}

fn confirmations(tip_height: u64, block_height: Option<u64>) -> u64 {
    match block_height {
        Some(height) if height <= tip_height => tip_height - height + 1,
        Some(_) => 1,
        None => 0,
    }
}

#[async_trait]
impl BalanceProvider for EsploraProvider {
    async fn get_confirmed_balance(&self, address: &str) -> Result<u64, ProviderError> {
        let url = format!("{}/address/{}/utxo", self.base_url, address);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                provider: "esplora",
                status: resp.status().as_u16(),
            });
        }

        let utxos: Vec<EsploraUtxo> = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        if utxos.is_empty() {
            return Ok(0);
        }

        let tip_height = self.get_tip_height().await?;

        Ok(utxos
            .iter()
            .filter(|u| confirmations(tip_height, u.status.block_height) >= self.confirmations as u64)
            .map(|u| u.value)
            .sum())
    }
}
