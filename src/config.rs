//! Environment-based Configuration
//!
//! Everything is read from `BTCMINT_*` environment variables (a `.env` file
//! is loaded first by the binary). Secrets never have defaults.
//!
//! # Required
//! - `BTCMINT_BITCOIN_XPUB` - master extended public key for deposit addresses
//! - `BTCMINT_CROWDSALE_ADDRESS` - crowdsale contract
//! - `BTCMINT_OWNER_PRIVATE_KEY` - hex key of the contract owner
//! - `BTCMINT_ETH_RPC_URL`, or `BTCMINT_INFURA_TOKEN` to use Infura
//!
//! # Optional
//! - `BTCMINT_NETWORK` - "main" or "test" (default: "test")
//! - `BTCMINT_CHAIN_ID` - EIP-155 chain id (default: 1 / 11155111)
//! - `BTCMINT_OWNER_ADDRESS` - checked against the private key when set
//! - `BTCMINT_BLOCKCYPHER_TOKEN`, `BTCMINT_ESPLORA_URL`, `BTCMINT_RATE_URL`
//! - `BTCMINT_DB_PATH` (default: "data/exchange.db")
//! - `BTCMINT_API_PORT` (default: 4000)
//! - `BTCMINT_POLL_INTERVAL_SECS` (default: 180)
//! - `BTCMINT_MONITOR_TIMEOUT_SECS` (default: 86400)
//! - `BTCMINT_WHITELIST_ENABLED` - "1"/"true" to gate on `isWhitelisted`
//! - `BTCMINT_LOG_LEVEL` (default: "info"), `BTCMINT_LOG_JSON`

use alloy_primitives::Address;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::ethereum::{parse_ethereum_address, TransactionSigner, INFURA_MAINNET, INFURA_SEPOLIA};
use crate::monitoring::{DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use crate::providers::esplora;
use crate::providers::rate::DEFAULT_RATE_URL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("owner address {configured} does not match private key address {derived}")]
    OwnerMismatch { configured: Address, derived: Address },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Main,
    Test,
}

impl FromStr for Network {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Test),
            _ => Err(ConfigError::InvalidValue(
                "BTCMINT_NETWORK".to_string(),
                format!("unknown network: {}", s),
            )),
        }
    }
}

impl Network {
    pub fn bitcoin_network(&self) -> bitcoin::Network {
        match self {
            Network::Main => bitcoin::Network::Bitcoin,
            Network::Test => bitcoin::Network::Testnet,
        }
    }

    pub fn default_chain_id(&self) -> u64 {
        match self {
            Network::Main => 1,
            Network::Test => 11_155_111,
        }
    }

    pub fn infura_base(&self) -> &'static str {
        match self {
            Network::Main => INFURA_MAINNET,
            Network::Test => INFURA_SEPOLIA,
        }
    }

    pub fn default_esplora_url(&self) -> &'static str {
        match self {
            Network::Main => esplora::MAINNET_URL,
            Network::Test => esplora::TESTNET_URL,
        }
    }
}

#[derive(Clone)]
pub struct ExchangeConfig {
    pub network: Network,
    pub bitcoin_xpub: String,
    pub eth_rpc_url: String,
    pub chain_id: u64,
    pub crowdsale_address: Address,
    pub owner_address: Option<Address>,
    /// Hex secp256k1 key; never printed
    pub owner_private_key: String,
    pub blockcypher_token: Option<String>,
    pub esplora_url: String,
    pub rate_url: String,
    pub db_path: String,
    pub api_port: u16,
    pub poll_interval: Duration,
    pub monitor_timeout: Duration,
    pub whitelist_enabled: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl std::fmt::Debug for ExchangeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeConfig")
            .field("network", &self.network)
            .field("eth_rpc_url", &redact_url(&self.eth_rpc_url))
            .field("chain_id", &self.chain_id)
            .field("crowdsale_address", &self.crowdsale_address)
            .field("owner_address", &self.owner_address)
            .field("db_path", &self.db_path)
            .field("api_port", &self.api_port)
            .finish_non_exhaustive()
    }
}

impl ExchangeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let network: Network = get("BTCMINT_NETWORK")
            .unwrap_or_else(|| "test".to_string())
            .parse()?;

        let bitcoin_xpub = required("BTCMINT_BITCOIN_XPUB")?;

        let eth_rpc_url = match get("BTCMINT_ETH_RPC_URL") {
            Some(url) => url,
            None => match get("BTCMINT_INFURA_TOKEN") {
                Some(token) => format!("{}{}", network.infura_base(), token),
                None => return Err(ConfigError::MissingEnvVar("BTCMINT_ETH_RPC_URL".to_string())),
            },
        };

        let chain_id = parse_or("BTCMINT_CHAIN_ID", get("BTCMINT_CHAIN_ID"), network.default_chain_id())?;

        let crowdsale_address = parse_address("BTCMINT_CROWDSALE_ADDRESS", &required("BTCMINT_CROWDSALE_ADDRESS")?)?;
        let owner_address = get("BTCMINT_OWNER_ADDRESS")
            .map(|v| parse_address("BTCMINT_OWNER_ADDRESS", &v))
            .transpose()?;
        let owner_private_key = required("BTCMINT_OWNER_PRIVATE_KEY")?;

        let poll_secs = parse_or(
            "BTCMINT_POLL_INTERVAL_SECS",
            get("BTCMINT_POLL_INTERVAL_SECS"),
            DEFAULT_POLL_INTERVAL.as_secs(),
        )?;
        let timeout_secs = parse_or(
            "BTCMINT_MONITOR_TIMEOUT_SECS",
            get("BTCMINT_MONITOR_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT.as_secs(),
        )?;
        if poll_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "BTCMINT_POLL_INTERVAL_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            network,
            bitcoin_xpub,
            eth_rpc_url,
            chain_id,
            crowdsale_address,
            owner_address,
            owner_private_key,
            blockcypher_token: get("BTCMINT_BLOCKCYPHER_TOKEN"),
            esplora_url: get("BTCMINT_ESPLORA_URL")
                .unwrap_or_else(|| network.default_esplora_url().to_string()),
            rate_url: get("BTCMINT_RATE_URL").unwrap_or_else(|| DEFAULT_RATE_URL.to_string()),
            db_path: get("BTCMINT_DB_PATH").unwrap_or_else(|| "data/exchange.db".to_string()),
            api_port: parse_or("BTCMINT_API_PORT", get("BTCMINT_API_PORT"), 4000)?,
            poll_interval: Duration::from_secs(poll_secs),
            monitor_timeout: Duration::from_secs(timeout_secs),
            whitelist_enabled: parse_flag(get("BTCMINT_WHITELIST_ENABLED"), false),
            log_level: get("BTCMINT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: parse_flag(get("BTCMINT_LOG_JSON"), network == Network::Main),
        })
    }

    /// Build the owner's signer, checking it against `owner_address` if one is set.
    pub fn signer(&self) -> Result<TransactionSigner, ConfigError> {
        let signer = TransactionSigner::from_hex(&self.owner_private_key, self.chain_id)
            .map_err(|e| ConfigError::InvalidValue("BTCMINT_OWNER_PRIVATE_KEY".to_string(), e.to_string()))?;

        if let Some(configured) = self.owner_address {
            if configured != signer.address() {
                return Err(ConfigError::OwnerMismatch {
                    configured,
                    derived: signer.address(),
                });
            }
        }

        Ok(signer)
    }

    /// Log the configuration with secrets elided
    pub fn log_summary(&self) {
        info!(
            network = ?self.network,
            chain_id = self.chain_id,
            eth_rpc = %redact_url(&self.eth_rpc_url),
            crowdsale = %self.crowdsale_address,
            esplora = %self.esplora_url,
            blockcypher_token = self.blockcypher_token.is_some(),
            rate_url = %self.rate_url,
            db_path = %self.db_path,
            api_port = self.api_port,
            poll_interval_secs = self.poll_interval.as_secs(),
            monitor_timeout_secs = self.monitor_timeout.as_secs(),
            whitelist = self.whitelist_enabled,
            "Configuration loaded"
        );
    }
}

fn parse_address(key: &str, value: &str) -> Result<Address, ConfigError> {
    parse_ethereum_address(value.trim())
        .ok_or_else(|| ConfigError::InvalidValue(key.to_string(), format!("not an address: {}", value)))
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string(), v.clone())),
        None => Ok(default),
    }
}

fn parse_flag(value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::trim) {
        Some("1") => true,
        Some(v) if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") => true,
        Some(_) => false,
        None => default,
    }
}

/// Drop the path of an RPC URL; Infura keeps its project token there
fn redact_url(url: &str) -> String {
    match url.find("://").map(|i| i + 3) {
        Some(start) => match url[start..].find('/') {
            Some(slash) => format!("{}/***", &url[..start + slash]),
            None => url.to_string(),
        },
        None => "***".to_string(),
    }
}
