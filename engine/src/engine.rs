//! The engine facade handed to collaborators.
//!
//! Bundles the [`Outbox`] and the [`SyncDriver`] behind the surface a UI or
//! daemon needs: enqueue, drain, purge, read-through listing, and observable
//! pending count and sync status.

use crate::{
    applier::RemoteApplier,
    config::EngineConfig,
    error::Result,
    outbox::Outbox,
    store::LocalStore,
    sync::{DrainReport, SyncDriver, SyncStatus},
    EntityType, OfflineRecord, RecordId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;

/// Point-in-time view of the engine for badges and status bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub pending_count: usize,
    pub sync_status: SyncStatus,
    pub dead_lettered: usize,
}

/// Offline outbox plus its sync driver.
#[derive(Debug, Clone)]
pub struct Engine {
    outbox: Arc<Outbox>,
    driver: Arc<SyncDriver>,
}

impl Engine {
    pub fn new(store: Arc<dyn LocalStore>, applier: Arc<dyn RemoteApplier>) -> Self {
        Self::with_config(store, applier, EngineConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn LocalStore>,
        applier: Arc<dyn RemoteApplier>,
        config: EngineConfig,
    ) -> Self {
        Self::from_outbox(Arc::new(Outbox::with_config(store, config)), applier)
    }

    /// Build around an existing outbox.
    pub fn from_outbox(outbox: Arc<Outbox>, applier: Arc<dyn RemoteApplier>) -> Self {
        let driver = Arc::new(SyncDriver::new(outbox.clone(), applier));
        Self { outbox, driver }
    }

    /// Open the store eagerly, surfacing storage errors at startup.
    pub async fn open(&self) -> Result<()> {
        self.outbox.open().await
    }

    pub fn outbox(&self) -> &Arc<Outbox> {
        &self.outbox
    }

    /// Queue a mutation for later replay.
    pub async fn enqueue(
        &self,
        entity_type: EntityType,
        payload: serde_json::Value,
    ) -> Result<RecordId> {
        self.outbox.enqueue(entity_type, payload).await
    }

    /// Replay everything pending now.
    pub async fn drain(&self) -> Result<DrainReport> {
        self.driver.drain().await
    }

    /// Discard every queued change.
    pub async fn purge_all(&self) -> Result<()> {
        self.outbox.purge_all().await
    }

    /// What is queued for a type, synced or not.
    pub async fn list_by_type(&self, entity_type: EntityType) -> Result<Vec<OfflineRecord>> {
        self.outbox.list_by_type(entity_type).await
    }

    pub async fn list_unsynced(&self) -> Result<Vec<OfflineRecord>> {
        self.outbox.list_unsynced().await
    }

    pub async fn list_dead_letters(&self) -> Result<Vec<OfflineRecord>> {
        self.outbox.list_dead_letters().await
    }

    pub async fn revive_dead_letters(&self) -> Result<usize> {
        self.outbox.revive_dead_letters().await
    }

    pub async fn prune_synced(&self, older_than: Timestamp) -> Result<usize> {
        self.outbox.prune_synced(older_than).await
    }

    /// Unsynced records, queried from the store.
    pub async fn pending_count(&self) -> Result<usize> {
        self.outbox.pending_count().await
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.driver.status()
    }

    /// Latest published status.
    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            pending_count: self.outbox.cached_pending_count(),
            sync_status: self.driver.status(),
            dead_lettered: self.outbox.cached_dead_letter_count(),
        }
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> StatusWatcher {
        StatusWatcher {
            pending: self.outbox.subscribe_pending(),
            dead: self.outbox.subscribe_dead_letters(),
            sync: self.driver.subscribe_status(),
        }
    }
}

/// Receives an [`EngineStatus`] whenever any part of it changes.
#[derive(Debug, Clone)]
pub struct StatusWatcher {
    pending: watch::Receiver<usize>,
    dead: watch::Receiver<usize>,
    sync: watch::Receiver<SyncStatus>,
}

impl StatusWatcher {
    /// Current status, marking it as seen.
    pub fn current(&mut self) -> EngineStatus {
        EngineStatus {
            pending_count: *self.pending.borrow_and_update(),
            sync_status: *self.sync.borrow_and_update(),
            dead_lettered: *self.dead.borrow_and_update(),
        }
    }

    /// Wait for the next change. Returns `None` once the engine is gone.
    pub async fn changed(&mut self) -> Option<EngineStatus> {
        let result = tokio::select! {
            r = self.pending.changed() => r,
            r = self.dead.changed() => r,
            r = self.sync.changed() => r,
        };
        result.ok().map(|()| self.current())
    }
}
