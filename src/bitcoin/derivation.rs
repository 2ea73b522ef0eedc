//! Receiving Address Derivation
//!
//! Derives watch-only P2PKH receiving addresses from a master extended
//! public key. Address `n` is the P2PKH encoding of the non-hardened child
//! `n` of the master key; the network only selects the address prefix.

use bitcoin::bip32::{ChildNumber, Xpub};
use bitcoin::secp256k1::{Secp256k1, Verification, VerifyOnly};
use bitcoin::{Address, CompressedPublicKey, Network};
use std::str::FromStr;
use thiserror::Error;

/// Derivation errors
#[derive(Debug, Error)]
pub enum DerivationError {
    #[error("invalid extended public key: {0}")]
    InvalidKey(String),

    #[error("child index {0} is outside the non-hardened range")]
    IndexOutOfRange(u32),

    #[error("child key derivation failed: {0}")]
    Derivation(String),
}

/// Derive the receiving address for `index` under `master`.
///
/// Pure: the same inputs always give the same address.
pub fn derive_address<C: Verification>(
    secp: &Secp256k1<C>,
    master: &Xpub,
    index: u32,
    network: Network,
) -> Result<Address, DerivationError> {
    let child_number =
        ChildNumber::from_normal_idx(index).map_err(|_| DerivationError::IndexOutOfRange(index))?;

    let child = master
        .ckd_pub(secp, child_number)
        .map_err(|e| DerivationError::Derivation(e.to_string()))?;

    let pubkey_hash = CompressedPublicKey(child.public_key).pubkey_hash();
    Ok(Address::p2pkh(pubkey_hash, network))
}

/// Address deriver bound to one master key and network
#[derive(Debug, Clone)]
pub struct AddressDeriver {
    secp: Secp256k1<VerifyOnly>,
    master: Xpub,
    network: Network,
}

impl AddressDeriver {
    pub fn new(master: Xpub, network: Network) -> Self {
        Self {
            secp: Secp256k1::verification_only(),
            master,
            network,
        }
    }

    /// Parse a base58 xpub/tpub and bind it to `network`
    pub fn from_encoded(master: &str, network: Network) -> Result<Self, DerivationError> {
        let master =
            Xpub::from_str(master.trim()).map_err(|e| DerivationError::InvalidKey(e.to_string()))?;
        Ok(Self::new(master, network))
    }

    /// Derive the receiving address for `index`
    pub fn derive(&self, index: u32) -> Result<Address, DerivationError> {
        derive_address(&self.secp, &self.master, index, self.network)
    }

    pub fn network(&self) -> Network {
        self.network
    }
}
