//! Ethereum Integration
//!
//! JSON-RPC transport, ABI packing, EIP-155 signing and the crowdsale
//! contract gateway.

pub mod abi;
pub mod error;
pub mod gateway;
pub mod rpc;
pub mod transaction;
pub mod whitelist;

use alloy_primitives::Address;
use std::str::FromStr;

pub use abi::{crowdsale_abi, function_selector, ContractAbi, Token};
pub use error::{AbiError, GatewayError, RpcError, SigningError};
pub use gateway::{CrowdsaleGateway, SaleStage, TokenSale, DEFAULT_GAS_LIMIT};
pub use rpc::{EthereumRpc, RpcClient, INFURA_MAINNET, INFURA_SEPOLIA};
pub use transaction::{LegacyTransaction, SignedTransaction, TransactionSigner};
pub use whitelist::{ContractWhitelist, Whitelist};

/// Parse a `0x`-prefixed 40-hex-digit address (any letter case)
pub fn parse_ethereum_address(value: &str) -> Option<Address> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X"))?;
    if digits.len() != 40 {
        return None;
    }

    Address::from_str(digits).ok()
}

/// Lowercase `0x` hex, the form addresses are stored under
pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ethereum_address() {
        let parsed = parse_ethereum_address("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf").unwrap();
        assert_eq!(format_address(&parsed), "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf");

        assert!(parse_ethereum_address("7E5F4552091A69125d5DfCb7b8C2659029395Bdf").is_none());
        assert!(parse_ethereum_address("0x7E5F4552091A69125d5DfCb7b8C2659029395Bd").is_none());
        assert!(parse_ethereum_address("0xZZ5F4552091A69125d5DfCb7b8C2659029395Bdf").is_none());
        assert!(parse_ethereum_address("").is_none());
        assert!(parse_ethereum_address("0x0x7E5F4552091A69125d5DfCb7b8C2659029395B").is_none());
        assert!(parse_ethereum_address("0X7E5F4552091A69125d5DfCb7b8C2659029395Bdf").is_some());
    }
}
