//! Record types for the outbox.

use crate::{Error, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of entity a queued mutation targets.
///
/// Closed set: adding an offline-capable entity means adding a variant here
/// and one arm in [`RemoteOp::plan`](crate::RemoteOp::plan).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    WorkOrder,
    Inventory,
    Customer,
}

impl EntityType {
    /// Every known entity type.
    pub const ALL: [EntityType; 3] = [
        EntityType::WorkOrder,
        EntityType::Inventory,
        EntityType::Customer,
    ];

    /// Wire name, also used as the id prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::WorkOrder => "work_order",
            EntityType::Inventory => "inventory",
            EntityType::Customer => "customer",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownRecordType(s.to_string()))
    }
}

/// A mutation captured while offline, waiting for remote confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflineRecord {
    /// Unique identifier, also sent as the idempotency key
    pub id: RecordId,
    /// Which remote collection this record belongs to
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Entity fields to create or update (write-once)
    pub payload: serde_json::Value,
    /// When the record was enqueued (milliseconds since epoch)
    pub enqueued_at: Timestamp,
    /// Whether the remote store acknowledged this record
    pub synced: bool,
    /// Failed apply attempts so far
    #[serde(default)]
    pub attempts: u32,
    /// Message of the most recent failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Parked after too many failures; skipped by drains until revived
    #[serde(default)]
    pub dead_lettered: bool,
}

impl OfflineRecord {
    /// Create a new unsynced record.
    pub fn new(
        id: impl Into<RecordId>,
        entity_type: EntityType,
        payload: serde_json::Value,
        enqueued_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            entity_type,
            payload,
            enqueued_at,
            synced: false,
            attempts: 0,
            last_error: None,
            dead_lettered: false,
        }
    }

    /// Build a fresh record id: `{type}_{enqueued_at}_{random}`.
    pub fn generate_id(entity_type: EntityType, enqueued_at: Timestamp) -> RecordId {
        let random = uuid::Uuid::new_v4().simple().to_string();
        format!("{}_{}_{}", entity_type, enqueued_at, &random[..9])
    }

    /// Whether the record still needs to reach the remote store.
    pub fn is_pending(&self) -> bool {
        !self.synced
    }

    /// Whether a drain should attempt this record.
    pub fn is_drainable(&self) -> bool {
        !self.synced && !self.dead_lettered
    }

    /// Mark as acknowledged by the remote store. Returns false if it already was.
    pub fn mark_synced(&mut self) -> bool {
        if self.synced {
            return false;
        }
        self.synced = true;
        true
    }

    /// Record a failed attempt, dead-lettering at `max_attempts`.
    pub fn record_failure(&mut self, message: impl Into<String>, max_attempts: Option<u32>) {
        self.attempts = self.attempts.saturating_add(1);
        self.last_error = Some(message.into());
        if let Some(max) = max_attempts {
            if self.attempts >= max {
                self.dead_lettered = true;
            }
        }
    }

    /// Clear failure bookkeeping so drains pick the record up again.
    pub fn revive(&mut self) {
        self.attempts = 0;
        self.last_error = None;
        self.dead_lettered = false;
    }
}
