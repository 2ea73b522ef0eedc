//! API Server
//!
//! Application state, router and listener startup.

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::routes::{exchange, health};
use crate::ethereum::Whitelist;
use crate::exchange::ExchangeOrchestrator;

pub struct AppState {
    pub orchestrator: Arc<ExchangeOrchestrator>,
    /// Consulted before issuing an address when set
    pub whitelist: Option<Arc<dyn Whitelist>>,
}

pub type SharedAppState = Arc<AppState>;

impl AppState {
    pub fn new(
        orchestrator: Arc<ExchangeOrchestrator>,
        whitelist: Option<Arc<dyn Whitelist>>,
    ) -> SharedAppState {
        Arc::new(Self {
            orchestrator,
            whitelist,
        })
    }
}

pub fn create_router(state: SharedAppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::handle_health))
        .route("/exchange/:ethereum_address", get(exchange::handle_request_address))
        .route("/exchange/:ethereum_address/status", get(exchange::handle_status))
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(state: SharedAppState, port: u16) -> Result<(), std::io::Error> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Exchange API listening");

    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitcoin::AddressDeriver;
    use crate::ethereum::gateway::MockTokenSale;
    use crate::ethereum::whitelist::MockWhitelist;
    use crate::monitoring::MonitoringService;
    use crate::providers::{MockBalanceProvider, MockRateProvider};
    use crate::storage::{MemoryTransactionStore, TransactionStore};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::time::Duration;
    use tower::ServiceExt;

    const TEST_TPUB: &str = "tpubDB7iVAmGkzub1fkjb46T5Pqqw6RiyvhmmwT4KnDwgxPwBDAjXKv9SYLRwLcSzryP9pEbytkaVQRs51a5TvTykaAde2czxFKbeStDv1iY8qF";
    const RECIPIENT: &str = "0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf";

    /// Exchanges started here stay in monitoring for the whole test
    async fn app(whitelist: Option<MockWhitelist>) -> (Router, Arc<MemoryTransactionStore>) {
        let store = Arc::new(MemoryTransactionStore::new());

        let mut primary = MockBalanceProvider::new();
        primary.expect_get_confirmed_balance().returning(|_| Ok(0));
        let secondary = MockBalanceProvider::new();
        let monitor = MonitoringService::new(Arc::new(primary), Arc::new(secondary))
            .with_poll_interval(Duration::from_secs(3600));

        let mut rates = MockRateProvider::new();
        rates.expect_get_rate().returning(|| Ok(10.0));

        let mut sale = MockTokenSale::new();
        sale.expect_mint_tokens().never();

        let orchestrator = ExchangeOrchestrator::new(
            store.clone(),
            AddressDeriver::from_encoded(TEST_TPUB, bitcoin::Network::Testnet).unwrap(),
            monitor,
            Arc::new(rates),
            Arc::new(sale),
        )
        .await
        .unwrap();

        let whitelist = whitelist.map(|w| Arc::new(w) as Arc<dyn Whitelist>);
        (create_router(AppState::new(Arc::new(orchestrator), whitelist)), store)
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = app(None).await;
        let response = app.oneshot(get_request("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_request_returns_plain_bitcoin_address() {
        let (app, store) = app(None).await;

        let response = app
            .oneshot(get_request(&format!("/exchange/{}", RECIPIENT)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let address = body_string(response).await;
        let stored = store
            .find_latest_by_ethereum_address(&RECIPIENT.to_lowercase())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(address, stored.bitcoin_address);
        assert_eq!(stored.derivation_index, 1);
    }

    #[tokio::test]
    async fn test_repeat_request_returns_same_address() {
        let (app, store) = app(None).await;
        let uri = format!("/exchange/{}", RECIPIENT);

        let first = body_string(app.clone().oneshot(get_request(&uri)).await.unwrap()).await;
        let second = body_string(app.oneshot(get_request(&uri)).await.unwrap()).await;

        assert_eq!(first, second);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_address_rejected() {
        let (app, store) = app(None).await;
        let response = app.oneshot(get_request("/exchange/0x1234")).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("INVALID_ADDRESS"));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_whitelist_gate() {
        let mut whitelist = MockWhitelist::new();
        whitelist
            .expect_is_whitelisted()
            .times(1)
            .returning(|_| Ok(false));
        let (app, store) = app(Some(whitelist)).await;

        let response = app
            .oneshot(get_request(&format!("/exchange/{}", RECIPIENT)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_string(response).await.contains("NOT_WHITELISTED"));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_whitelisted_address_served() {
        let mut whitelist = MockWhitelist::new();
        whitelist.expect_is_whitelisted().returning(|_| Ok(true));
        let (app, _) = app(Some(whitelist)).await;

        let response = app
            .oneshot(get_request(&format!("/exchange/{}", RECIPIENT)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let (app, _) = app(None).await;
        let status_uri = format!("/exchange/{}/status", RECIPIENT);

        let missing = app.clone().oneshot(get_request(&status_uri)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let address = body_string(
            app.clone()
                .oneshot(get_request(&format!("/exchange/{}", RECIPIENT)))
                .await
                .unwrap(),
        )
        .await;

        let response = app.oneshot(get_request(&status_uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert_eq!(json["bitcoin_address"], address);
        assert_eq!(json["status"], "new");
    }
}
