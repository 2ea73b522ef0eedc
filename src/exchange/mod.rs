//! BTC → token exchange lifecycle.

pub mod orchestrator;

pub use orchestrator::{ExchangeError, ExchangeOrchestrator};
