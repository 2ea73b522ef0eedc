//! Legacy Transaction Signing
//!
//! EIP-155 signing of legacy transactions with the contract owner's key,
//! producing the RLP bytes for `eth_sendRawTransaction`.

use alloy_primitives::{Address, Bytes, U256};
use alloy_rlp::{Encodable, RlpEncodable};
use k256::ecdsa::{RecoveryId, Signature, SigningKey};
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

use super::error::SigningError;

/// An unsigned legacy Ethereum transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    /// RLP-encoded signed transaction bytes.
    pub raw_tx: Vec<u8>,
    /// Transaction hash as a 0x-prefixed hex string.
    pub tx_hash: String,
}

impl SignedTransaction {
    /// Hex form expected by `eth_sendRawTransaction`
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw_tx))
    }
}

/// EIP-155 signing payload: `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`
#[derive(RlpEncodable)]
struct UnsignedFields {
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    chain_id: u64,
    empty_r: u8,
    empty_s: u8,
}

#[derive(RlpEncodable)]
struct SignedFields {
    nonce: u64,
    gas_price: U256,
    gas_limit: u64,
    to: Address,
    value: U256,
    data: Bytes,
    v: u64,
    r: U256,
    s: U256,
}

/// Signs transactions for one account on one chain.
///
/// The key is only read after construction and can be shared across tasks.
pub struct TransactionSigner {
    key: SigningKey,
    chain_id: u64,
    address: Address,
}

impl std::fmt::Debug for TransactionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSigner")
            .field("chain_id", &self.chain_id)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

impl TransactionSigner {
    /// Build from a hex private key (with or without `0x`).
    pub fn from_hex(private_key: &str, chain_id: u64) -> Result<Self, SigningError> {
        let digits = private_key.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);

        let mut bytes = hex::decode(digits).map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        if bytes.len() != 32 {
            bytes.zeroize();
            return Err(SigningError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                digits.len() / 2
            )));
        }

        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(&bytes);
        bytes.zeroize();

        let signer = Self::from_bytes(&key_bytes, chain_id);
        key_bytes.zeroize();
        signer
    }

    pub fn from_bytes(private_key: &[u8; 32], chain_id: u64) -> Result<Self, SigningError> {
        let key = SigningKey::from_bytes(private_key.into())
            .map_err(|e| SigningError::InvalidKey(e.to_string()))?;
        let address = address_from_key(&key);

        Ok(Self {
            key,
            chain_id,
            address,
        })
    }

    /// Account address controlled by this key
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign with EIP-155 replay protection.
    pub fn sign(&self, tx: &LegacyTransaction) -> Result<SignedTransaction, SigningError> {
        let sighash = Keccak256::digest(self.signing_payload(tx));

        let (signature, recovery_id): (Signature, RecoveryId) = self
            .key
            .sign_prehash_recoverable(sighash.as_slice())
            .map_err(|e| SigningError::Signature(e.to_string()))?;

        let v = recovery_id.to_byte() as u64 + 35 + self.chain_id * 2;

        let signed = SignedFields {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: tx.to,
            value: tx.value,
            data: Bytes::from(tx.data.clone()),
            v,
            r: U256::from_be_slice(&signature.r().to_bytes()),
            s: U256::from_be_slice(&signature.s().to_bytes()),
        };

        let mut raw_tx = Vec::new();
        signed.encode(&mut raw_tx);

        let tx_hash = format!("0x{}", hex::encode(Keccak256::digest(&raw_tx)));

        Ok(SignedTransaction { raw_tx, tx_hash })
    }

    fn signing_payload(&self, tx: &LegacyTransaction) -> Vec<u8> {
        let unsigned = UnsignedFields {
            nonce: tx.nonce,
            gas_price: tx.gas_price,
            gas_limit: tx.gas_limit,
            to: tx.to,
            value: tx.value,
            data: Bytes::from(tx.data.clone()),
            chain_id: self.chain_id,
            empty_r: 0,
            empty_s: 0,
        };

        let mut buf = Vec::new();
        unsigned.encode(&mut buf);
        buf
    }
}

/// Keccak-256 of the uncompressed public key, last 20 bytes.
pub fn address_from_key(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}
