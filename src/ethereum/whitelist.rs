//! Crowdsale whitelist check used to gate address issuance.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;

use super::abi::{crowdsale_abi, ContractAbi, Token};
use super::error::GatewayError;
use super::rpc::{address_to_u256, eth_call, hex_to_address, EthereumRpc};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Whitelist: Send + Sync {
    async fn is_whitelisted(&self, address: Address) -> Result<bool, GatewayError>;
}

/// Reads `isWhitelisted(address)` from the crowdsale contract
pub struct ContractWhitelist {
    rpc: Arc<dyn EthereumRpc>,
    abi: ContractAbi,
    contract: Address,
}

impl ContractWhitelist {
    pub fn new(rpc: Arc<dyn EthereumRpc>, contract: Address) -> Self {
        Self {
            rpc,
            abi: crowdsale_abi(),
            contract,
        }
    }
}

#[async_trait]
impl Whitelist for ContractWhitelist {
    async fn is_whitelisted(&self, address: Address) -> Result<bool, GatewayError> {
        let data = self.abi.pack("isWhitelisted", &[Token::Address(address)])?;
        let result = eth_call(self.rpc.as_ref(), self.contract, &data).await?;

        Ok(address_to_u256(hex_to_address(&result)) == U256::from(1u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ethereum::gateway::testing::{contract, NodeScript};
    use crate::ethereum::rpc::MockEthereumRpc;
    use serde_json::{json, Value};

    fn node_returning(result: String) -> MockEthereumRpc {
        let mut rpc = MockEthereumRpc::new();
        rpc.expect_call()
            .returning(move |_: &str, _: Vec<Value>| Ok(json!(result.clone())));
        rpc
    }

    #[tokio::test]
    async fn test_whitelisted_address() {
        let (rpc, log) = NodeScript::default().into_mock();
        let whitelist = ContractWhitelist::new(Arc::new(rpc), contract());

        assert!(whitelist.is_whitelisted(Address::repeat_byte(0x11)).await.unwrap());
        assert_eq!(log.count("eth_call"), 1);
    }

    #[tokio::test]
    async fn test_unlisted_address() {
        let (rpc, _) = NodeScript {
            whitelisted: false,
            ..NodeScript::default()
        }
        .into_mock();
        let whitelist = ContractWhitelist::new(Arc::new(rpc), contract());

        assert!(!whitelist.is_whitelisted(Address::repeat_byte(0x11)).await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_result_reads_low_word() {
        // Flag word followed by a word of 0xff: the low 20 bytes decide
        let result = format!("0x{}01{}", "00".repeat(31), "ff".repeat(32));
        let whitelist = ContractWhitelist::new(Arc::new(node_returning(result)), contract());

        assert!(!whitelist.is_whitelisted(Address::repeat_byte(0x11)).await.unwrap());
    }

    #[tokio::test]
    async fn test_padded_flag_after_extra_word() {
        let result = format!("0x{}{}01", "ff".repeat(32), "00".repeat(31));
        let whitelist = ContractWhitelist::new(Arc::new(node_returning(result)), contract());

        assert!(whitelist.is_whitelisted(Address::repeat_byte(0x11)).await.unwrap());
    }
}
