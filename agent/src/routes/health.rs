//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: &'static str,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler. Reports `degraded` when the store cannot be read.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.engine.pending_count().await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "health check could not read the outbox");
            "degraded"
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.config.store.kind(),
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Outbox Agent"
}
