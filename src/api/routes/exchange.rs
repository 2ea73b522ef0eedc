//! Exchange Routes
//!
//! Deposit address issuance and exchange status lookup.

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{error, info};

use crate::api::server::SharedAppState;
use crate::common::ServiceError;
use crate::ethereum::{format_address, parse_ethereum_address};
use crate::logging::{generate_correlation_id, log_api_request, log_security_event};
use crate::types::TransactionStatusResponse;

/// GET /exchange/:ethereum_address
///
/// Returns the Bitcoin address to pay into as plain text. A fresh address
/// starts the exchange in the background; a pending one is returned as is.
pub async fn handle_request_address(
    State(state): State<SharedAppState>,
    Path(ethereum_address): Path<String>,
) -> Result<String, ServiceError> {
    let correlation_id = generate_correlation_id();
    log_api_request("GET", &format!("/exchange/{}", ethereum_address), &correlation_id);

    let recipient = parse_ethereum_address(&ethereum_address)
        .ok_or_else(|| ServiceError::InvalidAddress(ethereum_address.clone()))?;

    if let Some(whitelist) = &state.whitelist {
        let allowed = whitelist.is_whitelisted(recipient).await?;
        log_security_event(
            "whitelist_check",
            allowed,
            serde_json::json!({ "address": format_address(&recipient) }),
            Some(&correlation_id),
        );
        if !allowed {
            return Err(ServiceError::NotWhitelisted(format_address(&recipient)));
        }
    }

    let (tx, is_new) = state
        .orchestrator
        .create_transaction_entry(recipient)
        .await
        .map_err(|e| {
            error!(correlation_id = %correlation_id, error = %e, "Failed to issue address");
            ServiceError::from(e)
        })?;

    if is_new {
        info!(tx_id = %tx.id, index = tx.derivation_index, "Starting exchange");
        state.orchestrator.spawn_exchange(tx.clone());
    }

    Ok(tx.bitcoin_address)
}

/// GET /exchange/:ethereum_address/status
pub async fn handle_status(
    State(state): State<SharedAppState>,
    Path(ethereum_address): Path<String>,
) -> Result<Json<TransactionStatusResponse>, ServiceError> {
    let recipient = parse_ethereum_address(&ethereum_address)
        .ok_or_else(|| ServiceError::InvalidAddress(ethereum_address.clone()))?;

    let tx = state
        .orchestrator
        .latest_for(recipient)
        .await?
        .ok_or_else(|| ServiceError::not_found(format!("no exchange for {}", format_address(&recipient))))?;

    Ok(Json(TransactionStatusResponse::from(&tx)))
}
