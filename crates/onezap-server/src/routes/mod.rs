//! ============================================================================
//! Routes - HTTP surface of the OneZap API
//! ============================================================================

pub mod auth;
pub mod chain;
pub mod content;
pub mod users;

use axum::Json;
use serde_json::{json, Value};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
