//! Outbox routes: capture, inspect, purge.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use outbox_engine::OfflineRecord;

use crate::auth::AuthUser;
use crate::error::Result;
use crate::handlers::{
    handle_enqueue, handle_list, handle_prune, handle_revive, CountResponse, EnqueueResponse,
    PruneQuery,
};
use crate::AppState;

/// Create outbox routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/outbox", delete(purge_handler))
        .route("/outbox/dead-letters", get(dead_letters_handler))
        .route("/outbox/dead-letters/revive", post(revive_handler))
        .route("/outbox/synced", delete(prune_handler))
        .route("/outbox/{record_type}", get(list_handler).post(enqueue_handler))
}

/// POST /outbox/{type} - Capture a change while offline.
async fn enqueue_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(record_type): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<EnqueueResponse>)> {
    let response = handle_enqueue(&state.engine, &record_type, payload).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /outbox/{type} - Records of one type, synced or not.
async fn list_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(record_type): Path<String>,
) -> Result<Json<Vec<OfflineRecord>>> {
    let records = handle_list(&state.engine, &record_type).await?;
    Ok(Json(records))
}

/// GET /outbox/dead-letters - Records parked after repeated failures.
async fn dead_letters_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<Vec<OfflineRecord>>> {
    Ok(Json(state.engine.list_dead_letters().await?))
}

/// POST /outbox/dead-letters/revive - Make dead letters drainable again.
async fn revive_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<CountResponse>> {
    Ok(Json(handle_revive(&state.engine).await?))
}

/// DELETE /outbox/synced?olderThan= - Garbage-collect old synced records.
async fn prune_handler(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<PruneQuery>,
) -> Result<Json<CountResponse>> {
    Ok(Json(handle_prune(&state.engine, query).await?))
}

/// DELETE /outbox - Discard every queued change.
async fn purge_handler(State(state): State<AppState>, _auth: AuthUser) -> Result<StatusCode> {
    state.engine.purge_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
