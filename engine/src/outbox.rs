//! Outbox Repository - the only reader and writer of queued records.
//!
//! The outbox enforces the record invariants:
//! - ids are fresh and unique, `type` and `payload` never change
//! - `synced` only moves from `false` to `true`
//! - the published pending count always equals `count(synced == false)`
//!
//! The pending count is a derived query. It is recomputed from the store after
//! every mutation and published on a [`watch`] channel, so callers can render
//! it without polling and it can never drift from the store's contents.

use crate::{
    clock::EnqueueClock,
    config::EngineConfig,
    error::Result,
    store::{IndexQuery, LocalStore},
    EntityType, Error, OfflineRecord, RecordId, Timestamp,
};
use std::sync::Arc;
use tokio::sync::{watch, Mutex, OnceCell};

/// Typed operations over a [`LocalStore`].
pub struct Outbox {
    store: Arc<dyn LocalStore>,
    clock: EnqueueClock,
    config: EngineConfig,
    opened: OnceCell<()>,
    /// Serializes mutations so a count refresh always follows its own write
    write_gate: Mutex<()>,
    pending_tx: watch::Sender<usize>,
    dead_tx: watch::Sender<usize>,
}

impl Outbox {
    /// Create an outbox over a store. The store is opened lazily.
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    /// Create an outbox with explicit configuration.
    pub fn with_config(store: Arc<dyn LocalStore>, config: EngineConfig) -> Self {
        let (pending_tx, _) = watch::channel(0);
        let (dead_tx, _) = watch::channel(0);
        Self {
            store,
            clock: EnqueueClock::new(),
            config,
            opened: OnceCell::new(),
            write_gate: Mutex::new(()),
            pending_tx,
            dead_tx,
        }
    }

    /// Replace the enqueue clock (deterministic timestamps in tests).
    pub fn with_clock(mut self, clock: EnqueueClock) -> Self {
        self.clock = clock;
        self
    }

    /// Engine configuration in effect.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open the underlying store. Idempotent; a failed open is retried on the
    /// next call.
    pub async fn open(&self) -> Result<()> {
        self.opened
            .get_or_try_init(|| async {
                self.store.open().await?;

                let records = self.store.get_all().await?;
                if let Some(latest) = records.iter().map(|r| r.enqueued_at).max() {
                    self.clock.resume_after(latest);
                }
                self.refresh_counts().await?;

                tracing::info!(
                    records = records.len(),
                    pending = *self.pending_tx.borrow(),
                    "outbox opened"
                );
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }

    /// Queue a mutation and return the new record id.
    pub async fn enqueue(
        &self,
        entity_type: EntityType,
        payload: serde_json::Value,
    ) -> Result<RecordId> {
        self.open().await?;
        let _gate = self.write_gate.lock().await;

        let enqueued_at = self.clock.tick();
        let id = OfflineRecord::generate_id(entity_type, enqueued_at);
        let record = OfflineRecord::new(id.clone(), entity_type, payload, enqueued_at);

        self.store.put(&record).await?;
        self.refresh_counts().await?;

        tracing::debug!(record_id = %id, entity_type = %entity_type, "enqueued offline record");
        Ok(id)
    }

    /// All unsynced records, oldest first.
    pub async fn list_unsynced(&self) -> Result<Vec<OfflineRecord>> {
        self.open().await?;
        let records = self.store.get_by_index(IndexQuery::Synced(false)).await?;
        Ok(chronological(records))
    }

    /// All records of one type regardless of synced state, oldest first.
    pub async fn list_by_type(&self, entity_type: EntityType) -> Result<Vec<OfflineRecord>> {
        self.open().await?;
        let records = self
            .store
            .get_by_index(IndexQuery::Type(entity_type))
            .await?;
        Ok(chronological(records))
    }

    /// Unsynced records parked after too many failures, oldest first.
    pub async fn list_dead_letters(&self) -> Result<Vec<OfflineRecord>> {
        self.open().await?;
        let records = self.store.get_by_index(IndexQuery::DeadLettered).await?;
        Ok(chronological(records))
    }

    /// Fetch one record.
    pub async fn get(&self, id: &str) -> Result<Option<OfflineRecord>> {
        self.open().await?;
        self.store.get(id).await
    }

    /// Mark a record as acknowledged by the remote store.
    ///
    /// Idempotent: returns `false` if the record was already synced or no
    /// longer exists.
    pub async fn mark_synced(&self, id: &str) -> Result<bool> {
        self.open().await?;
        let _gate = self.write_gate.lock().await;

        let Some(mut record) = self.store.get(id).await? else {
            tracing::debug!(record_id = %id, "mark_synced on missing record");
            return Ok(false);
        };
        if !record.mark_synced() {
            return Ok(false);
        }

        self.store.put(&record).await?;
        self.refresh_counts().await?;
        Ok(true)
    }

    /// Note a failed apply. Returns the updated record, or `None` if it no
    /// longer exists. Synced records are returned untouched.
    pub async fn record_failure(
        &self,
        id: &str,
        message: impl Into<String>,
    ) -> Result<Option<OfflineRecord>> {
        self.open().await?;
        let _gate = self.write_gate.lock().await;

        let Some(mut record) = self.store.get(id).await? else {
            return Ok(None);
        };
        if record.synced {
            return Ok(Some(record));
        }

        record.record_failure(message, self.config.max_attempts);
        self.store.put(&record).await?;
        self.refresh_counts().await?;

        if record.dead_lettered {
            tracing::warn!(
                record_id = %record.id,
                attempts = record.attempts,
                "record dead-lettered after repeated failures"
            );
        }
        Ok(Some(record))
    }

    /// Re-arm every dead-lettered record. Returns how many were revived.
    pub async fn revive_dead_letters(&self) -> Result<usize> {
        self.open().await?;
        let _gate = self.write_gate.lock().await;

        let mut revived = 0;
        for mut record in self.store.get_by_index(IndexQuery::DeadLettered).await? {
            record.revive();
            self.store.put(&record).await?;
            revived += 1;
        }
        self.refresh_counts().await?;

        tracing::info!(revived, "revived dead-lettered records");
        Ok(revived)
    }

    /// Delete every record. Destructive, no undo.
    pub async fn purge_all(&self) -> Result<()> {
        self.open().await?;
        let _gate = self.write_gate.lock().await;

        self.store.clear().await?;
        self.publish(0, 0);

        tracing::warn!("purged all offline records");
        Ok(())
    }

    /// Garbage-collect synced records enqueued before `older_than`.
    /// Unsynced records are never touched.
    pub async fn prune_synced(&self, older_than: Timestamp) -> Result<usize> {
        self.open().await?;
        let _gate = self.write_gate.lock().await;

        let mut pruned = 0;
        for record in self.store.get_by_index(IndexQuery::Synced(true)).await? {
            if record.enqueued_at < older_than {
                self.store.delete(&record.id).await?;
                pruned += 1;
            }
        }

        tracing::debug!(pruned, older_than, "pruned synced records");
        Ok(pruned)
    }

    /// Number of unsynced records, queried from the store.
    pub async fn pending_count(&self) -> Result<usize> {
        self.open().await?;
        self.store.count_by_index(IndexQuery::Synced(false)).await
    }

    /// Number of dead-lettered records, queried from the store.
    pub async fn dead_letter_count(&self) -> Result<usize> {
        self.open().await?;
        self.store.count_by_index(IndexQuery::DeadLettered).await
    }

    /// Last published pending count.
    pub fn cached_pending_count(&self) -> usize {
        *self.pending_tx.borrow()
    }

    /// Last published dead-letter count.
    pub fn cached_dead_letter_count(&self) -> usize {
        *self.dead_tx.borrow()
    }

    /// Observe the pending count.
    pub fn subscribe_pending(&self) -> watch::Receiver<usize> {
        self.pending_tx.subscribe()
    }

    /// Observe the dead-letter count.
    pub fn subscribe_dead_letters(&self) -> watch::Receiver<usize> {
        self.dead_tx.subscribe()
    }

    async fn refresh_counts(&self) -> Result<()> {
        let pending = self.store.count_by_index(IndexQuery::Synced(false)).await?;
        let dead = self.store.count_by_index(IndexQuery::DeadLettered).await?;
        self.publish(pending, dead);
        Ok(())
    }

    fn publish(&self, pending: usize, dead: usize) {
        set_if_changed(&self.pending_tx, pending);
        set_if_changed(&self.dead_tx, dead);
    }
}

/// Only wake subscribers when the value actually moved.
fn set_if_changed(tx: &watch::Sender<usize>, value: usize) {
    tx.send_if_modified(|current| {
        if *current == value {
            return false;
        }
        *current = value;
        true
    });
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox")
            .field("config", &self.config)
            .field("pending", &self.cached_pending_count())
            .field("dead_lettered", &self.cached_dead_letter_count())
            .finish_non_exhaustive()
    }
}

fn chronological(mut records: Vec<OfflineRecord>) -> Vec<OfflineRecord> {
    records.sort_by(|a, b| {
        a.enqueued_at
            .cmp(&b.enqueued_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    records
}
