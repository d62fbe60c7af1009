//! Remote operations planned from queued records.
//!
//! Every [`OfflineRecord`] replays as exactly one create or update against the
//! remote collection of its entity type. The record id travels along as the
//! idempotency key, so replaying a record after a crash between the remote
//! acknowledgment and `mark_synced` is safe on servers that honour it.

use crate::{EntityType, OfflineRecord, RecordId, RemoteId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Payload field carrying the identifier of an existing remote entity.
pub const REMOTE_ID_FIELD: &str = "id";

/// A named collection in the remote persistence API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    WorkOrders,
    InventoryItems,
    Customers,
}

impl Collection {
    /// Remote collection name.
    pub fn name(&self) -> &'static str {
        match self {
            Collection::WorkOrders => "work_orders",
            Collection::InventoryItems => "inventory_items",
            Collection::Customers => "customers",
        }
    }

    /// The collection that stores records of an entity type.
    pub fn for_entity(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::WorkOrder => Collection::WorkOrders,
            EntityType::Inventory => Collection::InventoryItems,
            EntityType::Customer => Collection::Customers,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A create call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOp {
    /// Target collection
    pub collection: Collection,
    /// Entity fields
    pub payload: serde_json::Value,
    /// Replay guard, the originating record id
    pub idempotency_key: RecordId,
}

/// An update call against an existing remote entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOp {
    /// Target collection
    pub collection: Collection,
    /// Remote entity to update
    pub remote_id: RemoteId,
    /// Entity fields (full payload as captured)
    pub payload: serde_json::Value,
    /// Replay guard, the originating record id
    pub idempotency_key: RecordId,
}

/// The single remote call a record replays as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum RemoteOp {
    Create(CreateOp),
    Update(UpdateOp),
}

impl RemoteOp {
    /// Decide which call replays a record.
    ///
    /// A payload with a usable `id` updates that entity; anything else creates
    /// a new one.
    pub fn plan(record: &OfflineRecord) -> Self {
        let collection = Collection::for_entity(record.entity_type);
        let idempotency_key = record.id.clone();
        let payload = record.payload.clone();

        match remote_id(&record.payload) {
            Some(remote_id) => RemoteOp::Update(UpdateOp {
                collection,
                remote_id,
                payload,
                idempotency_key,
            }),
            None => RemoteOp::Create(CreateOp {
                collection,
                payload,
                idempotency_key,
            }),
        }
    }

    /// Target collection.
    pub fn collection(&self) -> Collection {
        match self {
            RemoteOp::Create(op) => op.collection,
            RemoteOp::Update(op) => op.collection,
        }
    }

    /// Idempotency key sent with the call.
    pub fn idempotency_key(&self) -> &RecordId {
        match self {
            RemoteOp::Create(op) => &op.idempotency_key,
            RemoteOp::Update(op) => &op.idempotency_key,
        }
    }

    /// Short verb for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteOp::Create(_) => "create",
            RemoteOp::Update(_) => "update",
        }
    }
}

/// Extract an existing remote identifier from a payload.
/// Empty strings and null do not count.
fn remote_id(payload: &serde_json::Value) -> Option<RemoteId> {
    match payload.get(REMOTE_ID_FIELD)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
