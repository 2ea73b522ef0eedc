//! BTC → ETH Rate Provider
//!
//! Reads a `{"rate": ...}` document from a rate oracle. The oracle may send
//! the rate either as a JSON number or as a decimal string.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{ProviderError, RateProvider};

pub const DEFAULT_RATE_URL: &str = "https://shapeshift.io/rate/btc_eth";

#[derive(Debug, Clone)]
pub struct HttpRateProvider {
    client: Client,
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RateValue {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    rate: RateValue,
}

impl HttpRateProvider {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }
}

fn parse_rate(value: RateValue) -> Result<f64, ProviderError> {
    let rate = match value {
        RateValue::Number(n) => n,
        RateValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| ProviderError::InvalidRate(s.clone()))?,
    };

    if !rate.is_finite() || rate <= 0.0 {
        return Err(ProviderError::InvalidRate(rate.to_string()));
    }

    Ok(rate)
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn get_rate(&self) -> Result<f64, ProviderError> {
        let resp = self.client.get(&self.url).send().await?;

        if !resp.status().is_success() {
            return Err(ProviderError::Status {
                provider: "rate oracle",
                status: resp.status().as_u16(),
            });
        }

        let body: RateResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parse_rate(body.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::fixture;
    use axum::{routing::get, Json, Router};

    #[test]
    fn test_parse_rate_variants() {
        assert_eq!(parse_rate(RateValue::Number(10.0)).unwrap(), 10.0);
        assert_eq!(parse_rate(RateValue::Text("31.2553".into())).unwrap(), 31.2553);
        assert!(parse_rate(RateValue::Text("abc".into())).is_err());
        assert!(parse_rate(RateValue::Number(0.0)).is_err());
        assert!(parse_rate(RateValue::Number(-2.0)).is_err());
    }

    #[tokio::test]
    async fn test_fetches_string_rate() {
        let router = Router::new().route(
            "/rate/btc_eth",
            get(|| async { Json(serde_json::json!({ "pair": "btc_eth", "rate": "10" })) }),
        );
        let base = fixture::serve(router).await;

        let provider = HttpRateProvider::new(&format!("{}/rate/btc_eth", base));
        assert_eq!(provider.get_rate().await.unwrap(), 10.0);
    }

    #[tokio::test]
    async fn test_missing_rate_field() {
        let router = Router::new().route(
            "/rate",
            get(|| async { Json(serde_json::json!({ "error": "unknown pair" })) }),
        );
        let base = fixture::serve(router).await;

        let provider = HttpRateProvider::new(&format!("{}/rate", base));
        assert!(matches!(provider.get_rate().await, Err(ProviderError::Parse(_))));
    }
}
