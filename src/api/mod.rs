//! HTTP API
//!
//! - `GET /exchange/:ethereum_address` - payable Bitcoin address (text/plain)
//! - `GET /exchange/:ethereum_address/status` - latest exchange as JSON
//! - `GET /health` - liveness

pub mod routes;
pub mod server;

pub use server::{create_router, start_server, AppState, SharedAppState};
