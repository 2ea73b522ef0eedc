//! Service Error Types
//!
//! Root error for the binary and the HTTP surface, with stable error codes.

use thiserror::Error;

use crate::bitcoin::DerivationError;
use crate::config::ConfigError;
use crate::ethereum::GatewayError;
use crate::exchange::ExchangeError;
use crate::logging::LoggingError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("logging error: {0}")]
    Logging(#[from] LoggingError),

    /// Caller supplied something that is not an Ethereum address
    #[error("invalid ethereum address: {0}")]
    InvalidAddress(String),

    #[error("address {0} is not whitelisted")]
    NotWhitelisted(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("derivation error: {0}")]
    Derivation(#[from] DerivationError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Contract or node failure
    #[error("ethereum error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ExchangeError> for ServiceError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Storage(e) => Self::Storage(e),
            ExchangeError::Derivation(e) => Self::Derivation(e),
            ExchangeError::Gateway(e) => Self::Gateway(e),
            ExchangeError::InvalidRecipient(addr) => Self::InvalidAddress(addr),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Config(_) => "CONFIG_ERROR",
            ServiceError::Logging(_) => "LOGGING_ERROR",
            ServiceError::InvalidAddress(_) => "INVALID_ADDRESS",
            ServiceError::NotWhitelisted(_) => "NOT_WHITELISTED",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Derivation(_) => "DERIVATION_ERROR",
            ServiceError::Storage(_) => "STORAGE_ERROR",
            ServiceError::Gateway(_) => "ETHEREUM_ERROR",
            ServiceError::Internal(_) => "INTERNAL_ERROR",
            ServiceError::Io(_) => "IO_ERROR",
        }
    }

    /// HTTP status for API responses
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::InvalidAddress(_) => 400,
            ServiceError::NotWhitelisted(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Gateway(_) => 502,
            _ => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_status() {
        let err = ServiceError::NotWhitelisted("0xabc".to_string());
        assert_eq!(err.error_code(), "NOT_WHITELISTED");
        assert_eq!(err.http_status(), 403);
        assert!(err.to_string().contains("0xabc"));

        let err = ServiceError::from(DerivationError::IndexOutOfRange(1 << 31));
        assert_eq!(err.error_code(), "DERIVATION_ERROR");
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn test_exchange_error_mapping() {
        let err = ServiceError::from(ExchangeError::InvalidRecipient("nope".to_string()));
        assert_eq!(err.error_code(), "INVALID_ADDRESS");

        let err = ServiceError::from(ExchangeError::IndexExhausted);
        assert_eq!(err.error_code(), "INTERNAL_ERROR");
    }
}
