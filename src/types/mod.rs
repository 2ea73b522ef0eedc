//! Shared Types Module
//!
//! Data types shared across the exchange service.

pub mod transaction;
pub mod units;

// Re-exports for convenience
pub use transaction::{ExchangeTransaction, TransactionStatus, TransactionStatusResponse};
pub use units::{
    apply_rate, eth_to_wei, sats_to_btc, u256_to_decimal, UnitError,
    SATS_PER_BTC,
};
