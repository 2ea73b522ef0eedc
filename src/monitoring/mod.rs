//! Payment Monitoring
//!
//! Polls balance providers for a derived address until a confirmed payment
//! shows up or the monitoring window closes.
//!
//! ```text
//! Polling ──(balance > 0)──▶ Confirmed
//!    │
//!    └──(elapsed ≥ timeout)──▶ TimedOut
//! ```
//!
//! Each tick asks the primary provider first and only falls back to the
//! secondary when the primary errors. A tick on which both fail is skipped.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::providers::{BalanceProvider, ProviderError};
use crate::types::units::sats_to_btc;

/// Default polling period
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3 * 60);

/// Default monitoring ceiling
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("no confirmed payment to {address} after {elapsed_secs}s")]
    TimedOut { address: String, elapsed_secs: u64 },
}

#[derive(Clone)]
pub struct MonitoringService {
    primary: Arc<dyn BalanceProvider>,
    secondary: Arc<dyn BalanceProvider>,
    poll_interval: Duration,
    timeout: Duration,
}

impl MonitoringService {
    pub fn new(primary: Arc<dyn BalanceProvider>, secondary: Arc<dyn BalanceProvider>) -> Self {
        Self {
            primary,
            secondary,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait until `address` holds a confirmed balance, returned in BTC.
    pub async fn wait_for_transfer(&self, address: &str) -> Result<Decimal, MonitorError> {
        let started = Instant::now();
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(address, timeout_secs = self.timeout.as_secs(), "Monitoring address for payment");

        loop {
            ticker.tick().await;

            match self.confirmed_balance(address).await {
                Some(sats) if sats > 0 => {
                    let btc = sats_to_btc(sats);
                    info!(address, sats, btc = %btc, "Payment confirmed");
                    return Ok(btc);
                }
                Some(_) => debug!(address, "No confirmed balance yet"),
                None => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= self.timeout {
                warn!(address, elapsed_secs = elapsed.as_secs(), "Monitoring timed out");
                return Err(MonitorError::TimedOut {
                    address: address.to_string(),
                    elapsed_secs: elapsed.as_secs(),
                });
            }
        }
    }

    /// Primary first, secondary only on primary failure; `None` if both fail
    async fn confirmed_balance(&self, address: &str) -> Option<u64> {
        match self.primary.get_confirmed_balance(address).await {
            Ok(sats) => return Some(sats),
            Err(e) => log_provider_failure("primary", address, &e),
        }

        match self.secondary.get_confirmed_balance(address).await {
            Ok(sats) => Some(sats),
            Err(e) => {
                log_provider_failure("secondary", address, &e);
                None
            }
        }
    }
}

fn log_provider_failure(which: &str, address: &str, err: &ProviderError) {
    warn!(provider = which, address, error = %err, "Balance lookup failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::MockBalanceProvider;
    use std::str::FromStr;

    const ADDRESS: &str = "mzBc4XEFSdzCDcTxAgf6EZXgsZWpztRhef";

    fn failing() -> ProviderError {
        ProviderError::Status {
            provider: "test",
            status: 503,
        }
    }

    fn service(primary: MockBalanceProvider, secondary: MockBalanceProvider) -> MonitoringService {
        MonitoringService::new(Arc::new(primary), Arc::new(secondary))
            .with_poll_interval(Duration::from_secs(60))
            .with_timeout(Duration::from_secs(600))
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_balance_confirms() {
        let mut primary = MockBalanceProvider::new();
        primary
            .expect_get_confirmed_balance()
            .withf(|a: &str| a == ADDRESS)
            .times(1)
            .returning(|_| Ok(15_000));
        let mut secondary = MockBalanceProvider::new();
        secondary.expect_get_confirmed_balance().never();

        let btc = service(primary, secondary).wait_for_transfer(ADDRESS).await.unwrap();
        assert_eq!(btc, Decimal::from_str("0.00015").unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_falls_back_to_secondary() {
        let mut primary = MockBalanceProvider::new();
        primary
            .expect_get_confirmed_balance()
            .returning(|_| Err(failing()));
        let mut secondary = MockBalanceProvider::new();
        secondary
            .expect_get_confirmed_balance()
            .times(1)
            .returning(|_| Ok(250_000));

        let btc = service(primary, secondary).wait_for_transfer(ADDRESS).await.unwrap();
        assert_eq!(btc, Decimal::from_str("0.0025").unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keeps_polling_through_failures() {
        let mut primary = MockBalanceProvider::new();
        let mut calls = 0;
        primary.expect_get_confirmed_balance().returning(move |_| {
            calls += 1;
            if calls < 4 {
                Err(failing())
            } else {
                Ok(1)
            }
        });
        let mut secondary = MockBalanceProvider::new();
        secondary
            .expect_get_confirmed_balance()
            .times(3)
            .returning(|_| Err(failing()));

        let start = Instant::now();
        let btc = service(primary, secondary).wait_for_transfer(ADDRESS).await.unwrap();

        assert_eq!(btc, Decimal::from_str("0.00000001").unwrap());
        // First tick is immediate, the fourth lands three periods later
        assert_eq!(start.elapsed(), Duration::from_secs(180));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_after_ceiling_never_before() {
        let mut primary = MockBalanceProvider::new();
        primary.expect_get_confirmed_balance().returning(|_| Ok(0));
        let mut secondary = MockBalanceProvider::new();
        secondary.expect_get_confirmed_balance().never();

        let start = Instant::now();
        let err = service(primary, secondary)
            .wait_for_transfer(ADDRESS)
            .await
            .unwrap_err();

        assert!(start.elapsed() >= Duration::from_secs(600));
        assert!(start.elapsed() < Duration::from_secs(660));
        assert!(matches!(err, MonitorError::TimedOut { elapsed_secs: 600, .. }));
    }
}
