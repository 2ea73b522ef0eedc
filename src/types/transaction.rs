//! Exchange Transaction Types
//!
//! One record per BTC → token exchange:
//! new → success | error

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Status of an exchange through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Address issued, waiting for payment and minting
    New,
    /// Tokens minted
    Success,
    /// Terminal failure, see `error_message`
    Error,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::New)
    }
}

impl Default for TransactionStatus {
    fn default() -> Self {
        Self::New
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "new",
            Self::Success => "success",
            Self::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown status: {}", s)),
        }
    }
}

/// A single exchange: one derived Bitcoin address bound to one token recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTransaction {
    /// Unique transaction ID
    pub id: String,
    /// Token recipient, lower-case 0x-prefixed hex
    pub ethereum_address: String,
    /// Derived receiving address
    pub bitcoin_address: String,
    /// Child index used to derive `bitcoin_address`
    pub derivation_index: u32,
    /// Confirmed BTC amount, zero until monitoring succeeds
    pub amount_transferred: Decimal,
    pub status: TransactionStatus,
    /// Set only when status is `Error`
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExchangeTransaction {
    /// Create a new transaction in the `New` state
    pub fn new(ethereum_address: String, bitcoin_address: String, derivation_index: u32) -> Self {
        let now = Utc::now();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ethereum_address,
            bitcoin_address,
            derivation_index,
            amount_transferred: Decimal::ZERO,
            status: TransactionStatus::New,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record the confirmed BTC amount
    pub fn set_amount(&mut self, amount: Decimal) {
        self.amount_transferred = amount;
        self.updated_at = Utc::now();
    }

    pub fn mark_success(&mut self) {
        self.status = TransactionStatus::Success;
        self.error_message = None;
        self.updated_at = Utc::now();
    }

    /// Mark as failed, keeping the message verbatim
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.status = TransactionStatus::Error;
        self.error_message = Some(message.into());
        self.updated_at = Utc::now();
    }

    /// Still waiting on payment with an address to pay into
    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::New && !self.bitcoin_address.is_empty()
    }
}

/// Public view of a transaction returned by the status endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionStatusResponse {
    pub id: String,
    pub ethereum_address: String,
    pub bitcoin_address: String,
    pub amount_transferred: String,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ExchangeTransaction> for TransactionStatusResponse {
    fn from(tx: &ExchangeTransaction) -> Self {
        Self {
            id: tx.id.clone(),
            ethereum_address: tx.ethereum_address.clone(),
            bitcoin_address: tx.bitcoin_address.clone(),
            amount_transferred: tx.amount_transferred.to_string(),
            status: tx.status,
            error: tx.error_message.clone(),
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExchangeTransaction {
        ExchangeTransaction::new(
            "0x00000000000000000000000000000000000000aa".to_string(),
            "mzBc4XEFSdzCDcTxAgf6EZXgsZWpztRhef".to_string(),
            7,
        )
    }

    #[test]
    fn test_new_transaction() {
        let tx = sample();
        assert_eq!(tx.status, TransactionStatus::New);
        assert_eq!(tx.amount_transferred, Decimal::ZERO);
        assert!(tx.error_message.is_none());
        assert!(tx.is_pending());
        assert_eq!(tx.id.len(), 36);
    }

    #[test]
    fn test_status_transitions() {
        let mut tx = sample();
        tx.mark_failed("monitoring timed out");
        assert_eq!(tx.status, TransactionStatus::Error);
        assert_eq!(tx.error_message.as_deref(), Some("monitoring timed out"));
        assert!(tx.status.is_terminal());
        assert!(!tx.is_pending());

        let mut tx = sample();
        tx.mark_success();
        assert_eq!(tx.status, TransactionStatus::Success);
        assert!(tx.error_message.is_none());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            TransactionStatus::New,
            TransactionStatus::Success,
            TransactionStatus::Error,
        ] {
            assert_eq!(status.to_string().parse::<TransactionStatus>().unwrap(), status);
        }
        assert!("pending".parse::<TransactionStatus>().is_err());
    }
}
