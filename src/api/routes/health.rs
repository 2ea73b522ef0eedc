//! Health Route

use axum::{response::IntoResponse, Json};

/// GET /health
pub async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "btcmint-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
