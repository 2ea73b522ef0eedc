//! Minimal ABI encoding for the crowdsale contract.
//!
//! Only static `address` / `uint256` / `bool` arguments are needed, so each
//! argument is exactly one 32-byte word after the 4-byte selector.

use alloy_primitives::{Address, U256};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;

use super::error::AbiError;

/// A single ABI argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(U256),
}

impl Token {
    fn type_name(&self) -> &'static str {
        match self {
            Token::Address(_) => "address",
            Token::Uint(_) => "uint256",
        }
    }

    fn encode(&self) -> [u8; 32] {
        match self {
            Token::Address(addr) => {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(addr.as_slice());
                word
            }
            Token::Uint(value) => value.to_be_bytes::<32>(),
        }
    }
}

/// First four bytes of keccak256 over the canonical signature.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

#[derive(Debug, Clone)]
struct Function {
    selector: [u8; 4],
    inputs: Vec<String>,
}

/// Name → function table for one contract.
#[derive(Debug, Clone, Default)]
pub struct ContractAbi {
    functions: HashMap<String, Function>,
}

impl ContractAbi {
    /// Build from canonical signatures such as `"isWhitelisted(address)"`.
    pub fn from_signatures<'a>(signatures: impl IntoIterator<Item = &'a str>) -> Self {
        let functions = signatures
            .into_iter()
            .filter_map(|sig| {
                let (name, rest) = sig.split_once('(')?;
                let inputs = rest
                    .trim_end_matches(')')
                    .split(',')
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();

                Some((
                    name.to_string(),
                    Function {
                        selector: function_selector(sig),
                        inputs,
                    },
                ))
            })
            .collect();

        Self { functions }
    }

    /// Encode a call to `name` with `args`.
    pub fn pack(&self, name: &str, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| AbiError::UnknownFunction(name.to_string()))?;

        if function.inputs.len() != args.len() {
            return Err(AbiError::ArgumentCount {
                name: name.to_string(),
                expected: function.inputs.len(),
                got: args.len(),
            });
        }

        let mut data = Vec::with_capacity(4 + args.len() * 32);
        data.extend_from_slice(&function.selector);

        for (index, (expected, arg)) in function.inputs.iter().zip(args).enumerate() {
            if expected != arg.type_name() {
                return Err(AbiError::ArgumentType {
                    name: name.to_string(),
                    index,
                    expected: expected.clone(),
                });
            }
            data.extend_from_slice(&arg.encode());
        }

        Ok(data)
    }
}

/// Read and mint functions of the token crowdsale.
pub const CROWDSALE_FUNCTIONS: &[&str] = &[
    "isPreIco()",
    "isIco()",
    "tokensRemainingPreIco()",
    "tokensRemainingIco()",
    "TOKEN_RATE_PRE_ICO()",
    "TOKEN_RATE_ICO()",
    "isWhitelisted(address)",
    "sellTokensForBTCPreIco(address,uint256)",
    "sellTokensForBTCIco(address,uint256)",
];

pub fn crowdsale_abi() -> ContractAbi {
    ContractAbi::from_signatures(CROWDSALE_FUNCTIONS.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        assert_eq!(hex::encode(function_selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(function_selector("balanceOf(address)")), "70a08231");
    }

    #[test]
    fn test_pack_zero_arg_call() {
        let abi = crowdsale_abi();
        let data = abi.pack("isPreIco", &[]).unwrap();
        assert_eq!(data, function_selector("isPreIco()").to_vec());
    }

    #[test]
    fn test_pack_mint_call() {
        let abi = crowdsale_abi();
        let recipient = Address::repeat_byte(0x11);
        let amount = U256::from(7_500_000_000_000_000u64);

        let data = abi
            .pack(
                "sellTokensForBTCPreIco",
                &[Token::Address(recipient), Token::Uint(amount)],
            )
            .unwrap();

        assert_eq!(data.len(), 4 + 64);
        assert_eq!(&data[..4], &function_selector("sellTokensForBTCPreIco(address,uint256)"));
        assert_eq!(&data[4..16], &[0u8; 12]);
        assert_eq!(&data[16..36], recipient.as_slice());
        assert_eq!(U256::from_be_slice(&data[36..]), amount);
    }

    #[test]
    fn test_pack_errors() {
        let abi = crowdsale_abi();

        assert_eq!(
            abi.pack("selfDestruct", &[]),
            Err(AbiError::UnknownFunction("selfDestruct".to_string()))
        );
        assert!(matches!(
            abi.pack("isWhitelisted", &[]),
            Err(AbiError::ArgumentCount { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            abi.pack("isWhitelisted", &[Token::Uint(U256::from(1u8))]),
            Err(AbiError::ArgumentType { index: 0, .. })
        ));
    }
}
