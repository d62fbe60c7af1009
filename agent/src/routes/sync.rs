//! Sync endpoint routes.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use outbox_engine::{DrainReport, EngineStatus};

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{handle_drain, handle_websocket_connection};
use crate::AppState;

/// Create sync routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sync", post(drain_handler))
        .route("/status", get(status_handler))
        .route("/ws", get(ws_handler))
}

/// POST /sync - Drain the outbox now.
async fn drain_handler(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<DrainReport>> {
    Ok(Json(handle_drain(&state.engine).await?))
}

/// GET /status - Pending count, dead letters, and sync status.
async fn status_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<EngineStatus>> {
    let pending_count = state.engine.pending_count().await?;
    Ok(Json(EngineStatus {
        pending_count,
        ..state.engine.status()
    }))
}

/// GET /ws - Live status stream.
async fn ws_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_websocket_connection(socket, state.engine))
}
