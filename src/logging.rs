//! Structured Logging
//!
//! `tracing` subscriber setup plus JSON lifecycle events:
//! - exchange transitions under `btcmint::exchange`
//! - whitelist decisions under `btcmint::security`
//! - incoming requests under `btcmint::api`
//!
//! ```rust,ignore
//! use btcmint::logging::{init_logging, LogLevel};
//!
//! init_logging(LogLevel::Info, true)?;
//! ```

use serde::Serialize;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ExchangeConfig;
use crate::types::transaction::ExchangeTransaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Incoming HTTP requests
    Api,
    /// Exchange lifecycle transitions
    Exchange,
    /// Whitelist checks
    Security,
    /// Startup, resume, shutdown
    System,
}

/// One structured log line
#[derive(Debug, Serialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub level: String,
    pub category: EventCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

impl LogEvent {
    pub fn new(level: LogLevel, category: EventCategory, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            level: level.as_filter().to_uppercase(),
            category,
            message: message.into(),
            correlation_id: None,
            data: None,
            error: None,
        }
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.error = Some(ErrorDetails {
            code: code.into(),
            message: message.into(),
        });
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                "{{\"error\": \"failed to serialize log\", \"message\": \"{}\"}}",
                self.message
            )
        })
    }
}

/// Record an exchange lifecycle step; `error` marks a failed step
pub fn log_exchange_event(event_type: &str, tx: &ExchangeTransaction, error: Option<&str>) {
    let level = if error.is_some() {
        LogLevel::Error
    } else {
        LogLevel::Info
    };

    let mut event = LogEvent::new(level, EventCategory::Exchange, event_type)
        .with_correlation_id(&tx.id)
        .with_data(serde_json::json!({
            "ethereum_address": tx.ethereum_address,
            "bitcoin_address": tx.bitcoin_address,
            "derivation_index": tx.derivation_index,
            "amount_btc": tx.amount_transferred.to_string(),
            "status": tx.status,
        }));

    if let Some(err) = error {
        event = event.with_error("EXCHANGE_ERROR", err);
    }

    match level {
        LogLevel::Error => tracing::error!(target: "btcmint::exchange", "{}", event.to_json()),
        _ => tracing::info!(target: "btcmint::exchange", "{}", event.to_json()),
    }
}

pub fn log_security_event(
    event_type: &str,
    allowed: bool,
    details: serde_json::Value,
    correlation_id: Option<&str>,
) {
    let level = if allowed { LogLevel::Info } else { LogLevel::Warn };
    let mut event = LogEvent::new(level, EventCategory::Security, event_type).with_data(
        serde_json::json!({
            "allowed": allowed,
            "details": details
        }),
    );

    if let Some(id) = correlation_id {
        event = event.with_correlation_id(id);
    }

    if allowed {
        tracing::info!(target: "btcmint::security", "{}", event.to_json());
    } else {
        tracing::warn!(target: "btcmint::security", "{}", event.to_json());
    }
}

pub fn log_api_request(method: &str, path: &str, correlation_id: &str) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::Api, format!("{} {}", method, path))
        .with_correlation_id(correlation_id)
        .with_data(serde_json::json!({
            "method": method,
            "path": path,
        }));

    tracing::info!(target: "btcmint::api", "{}", event.to_json());
}

/// Startup and shutdown milestones
pub fn log_system_event(message: &str, data: serde_json::Value) {
    let event = LogEvent::new(LogLevel::Info, EventCategory::System, message).with_data(data);
    tracing::info!(target: "btcmint::system", "{}", event.to_json());
}

/// Install the global subscriber. `RUST_LOG` overrides `level`.
pub fn init_logging(level: LogLevel, json_format: bool) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.as_filter();
        EnvFilter::new(format!("btcmint={level},btcmint_api={level},tower_http={level},axum={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    } else {
        registry
            .with(fmt::layer().pretty().with_target(true).with_file(true).with_line_number(true))
            .try_init()
            .map_err(|e| LoggingError::InitFailed(e.to_string()))?;
    }

    Ok(())
}

pub fn init_from_config(config: &ExchangeConfig) -> Result<(), LoggingError> {
    init_logging(LogLevel::from(config.log_level.as_str()), config.log_json)
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to initialize logging: {0}")]
    InitFailed(String),
}

/// Correlation ID for one request
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
