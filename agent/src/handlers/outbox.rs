//! Outbox handlers shared by the HTTP routes and the WebSocket.

use outbox_engine::{DrainReport, Engine, EntityType, OfflineRecord, RecordId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Response to an enqueue.
#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub id: RecordId,
}

/// Response to a bulk state change.
#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: usize,
}

/// Query for pruning synced records.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneQuery {
    /// Remove synced records enqueued before this time (ms since epoch)
    pub older_than: Timestamp,
}

/// Queue a payload under a record type given as its wire name.
pub async fn handle_enqueue(
    engine: &Engine,
    record_type: &str,
    payload: serde_json::Value,
) -> Result<EnqueueResponse> {
    let entity_type: EntityType = record_type.parse()?;
    let id = engine.enqueue(entity_type, payload).await?;

    tracing::info!(record_id = %id, entity_type = %entity_type, "captured offline change");
    Ok(EnqueueResponse { id })
}

/// Every record of a type, synced or not.
pub async fn handle_list(engine: &Engine, record_type: &str) -> Result<Vec<OfflineRecord>> {
    let entity_type: EntityType = record_type.parse()?;
    Ok(engine.list_by_type(entity_type).await?)
}

/// Run one drain pass.
pub async fn handle_drain(engine: &Engine) -> Result<DrainReport> {
    Ok(engine.drain().await?)
}

pub async fn handle_revive(engine: &Engine) -> Result<CountResponse> {
    let count = engine.revive_dead_letters().await?;
    Ok(CountResponse { count })
}

pub async fn handle_prune(engine: &Engine, query: PruneQuery) -> Result<CountResponse> {
    let count = engine.prune_synced(query.older_than).await?;
    Ok(CountResponse { count })
}
