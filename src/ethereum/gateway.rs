//! Crowdsale Contract Gateway
//!
//! Typed reads of crowdsale state (stage, rate, remaining supply) and the
//! minting pipeline: pack → gather gas price / gas estimate / nonce
//! concurrently → sign → `eth_sendRawTransaction`.
//!
//! Contract getters return small integers or booleans in the low bytes of a
//! 32-byte word; they are read through [`retrieve_parameter`] and
//! reinterpreted here.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use super::abi::{crowdsale_abi, ContractAbi, Token};
use super::error::{GatewayError, RpcError};
use super::rpc::{
    address_to_u256, parse_quantity, parse_quantity_u64, retrieve_parameter, EthereumRpc,
};
use super::transaction::{LegacyTransaction, TransactionSigner};
use crate::types::units::u256_to_decimal;

/// Gas limit used when estimation fails
pub const DEFAULT_GAS_LIMIT: u64 = 500_000;

/// Token sale operations the exchange flow depends on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSale: Send + Sync {
    /// Remaining supply of the active stage, zero when no stage is active
    async fn get_tokens_left(&self) -> Result<U256, GatewayError>;

    /// Tokens per wei of the active stage, zero when no stage is active
    async fn get_token_exchange_rate(&self) -> Result<Decimal, GatewayError>;

    /// Mint `amount` to `recipient`; returns the transaction hash
    async fn mint_tokens(&self, recipient: Address, amount: U256) -> Result<String, GatewayError>;
}

/// Active crowdsale stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaleStage {
    PreIco,
    Ico,
    Closed,
}

pub struct CrowdsaleGateway {
    rpc: Arc<dyn EthereumRpc>,
    abi: ContractAbi,
    contract: Address,
    signer: Arc<TransactionSigner>,
}

impl CrowdsaleGateway {
    pub fn new(rpc: Arc<dyn EthereumRpc>, contract: Address, signer: Arc<TransactionSigner>) -> Self {
        Self {
            rpc,
            abi: crowdsale_abi(),
            contract,
            signer,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Account that signs mint transactions
    pub fn owner(&self) -> Address {
        self.signer.address()
    }

    async fn parameter(&self, name: &str) -> Result<U256, GatewayError> {
        let value = retrieve_parameter(self.rpc.as_ref(), name, &self.abi, self.contract).await?;
        Ok(address_to_u256(value))
    }

    pub async fn is_pre_ico(&self) -> Result<bool, GatewayError> {
        Ok(self.parameter("isPreIco").await? == U256::from(1u8))
    }

    pub async fn tokens_remaining_pre_ico(&self) -> Result<U256, GatewayError> {
        self.parameter("tokensRemainingPreIco").await
    }

    pub async fn pre_ico_rate(&self) -> Result<U256, GatewayError> {
        self.parameter("TOKEN_RATE_PRE_ICO").await
    }

    pub async fn is_ico(&self) -> Result<bool, GatewayError> {
        Ok(self.parameter("isIco").await? == U256::from(1u8))
    }

    pub async fn tokens_remaining_ico(&self) -> Result<U256, GatewayError> {
        self.parameter("tokensRemainingIco").await
    }

    pub async fn ico_rate(&self) -> Result<U256, GatewayError> {
        self.parameter("TOKEN_RATE_ICO").await
    }

    /// Pre-ICO wins if the contract reports both stages
    pub async fn stage(&self) -> Result<SaleStage, GatewayError> {
        if self.is_pre_ico().await? {
            return Ok(SaleStage::PreIco);
        }
        if self.is_ico().await? {
            return Ok(SaleStage::Ico);
        }
        Ok(SaleStage::Closed)
    }

    async fn gas_price(&self) -> Result<U256, RpcError> {
        let result = self.rpc.call("eth_gasPrice", vec![]).await?;
        parse_quantity(&result)
    }

    async fn estimate_gas(&self, data: &[u8]) -> Result<u64, RpcError> {
        let call = json!({
            "from": self.owner().to_string(),
            "to": self.contract.to_string(),
            "data": format!("0x{}", hex::encode(data)),
        });
        let result = self.rpc.call("eth_estimateGas", vec![call]).await?;
        parse_quantity_u64(&result)
    }

    async fn pending_nonce(&self) -> Result<u64, RpcError> {
        let result = self
            .rpc
            .call(
                "eth_getTransactionCount",
                vec![json!(self.owner().to_string()), json!("pending")],
            )
            .await?;
        parse_quantity_u64(&result)
    }
}

#[async_trait]
impl TokenSale for CrowdsaleGateway {
    async fn get_tokens_left(&self) -> Result<U256, GatewayError> {
        match self.stage().await? {
            SaleStage::PreIco => self.tokens_remaining_pre_ico().await,
            SaleStage::Ico => self.tokens_remaining_ico().await,
            SaleStage::Closed => Ok(U256::ZERO),
        }
    }

    async fn get_token_exchange_rate(&self) -> Result<Decimal, GatewayError> {
        let rate = match self.stage().await? {
            SaleStage::PreIco => self.pre_ico_rate().await?,
            SaleStage::Ico => self.ico_rate().await?,
            SaleStage::Closed => return Ok(Decimal::ZERO),
        };

        u256_to_decimal(rate).map_err(|e| GatewayError::Value(e.to_string()))
    }

    async fn mint_tokens(&self, recipient: Address, amount: U256) -> Result<String, GatewayError> {
        let function = match self.stage().await? {
            SaleStage::PreIco => "sellTokensForBTCPreIco",
            SaleStage::Ico => "sellTokensForBTCIco",
            SaleStage::Closed => return Err(GatewayError::Stage),
        };

        let data = self
            .abi
            .pack(function, &[Token::Address(recipient), Token::Uint(amount)])?;

        let (gas_price, gas_limit, nonce) = tokio::join!(
            self.gas_price(),
            self.estimate_gas(&data),
            self.pending_nonce()
        );

        let gas_price = gas_price.map_err(GatewayError::GasPrice)?;
        let gas_limit = gas_limit.unwrap_or_else(|e| {
            warn!(error = %e, fallback = DEFAULT_GAS_LIMIT, "Gas estimation failed, using default limit");
            DEFAULT_GAS_LIMIT
        });
        let nonce = nonce.map_err(GatewayError::Nonce)?;

        let tx = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: self.contract,
            value: U256::ZERO,
            data,
        };
        let signed = self.signer.sign(&tx)?;

        let result = self
            .rpc
            .call("eth_sendRawTransaction", vec![json!(signed.raw_hex())])
            .await?;

        let tx_hash = match result {
            Value::String(hash) => hash,
            _ => signed.tx_hash,
        };

        info!(
            function,
            recipient = %recipient,
            amount = %amount,
            nonce,
            gas_limit,
            tx_hash = %tx_hash,
            "Mint transaction submitted"
        );

        Ok(tx_hash)
    }
}
