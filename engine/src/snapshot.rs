//! Snapshot file store.
//!
//! [`FileStore`] keeps the whole outbox in one JSON document on disk. Every
//! write persists a complete [`OutboxSnapshot`] to a temporary file and renames
//! it over the previous one, so a crash leaves either the old or the new state.

use crate::{
    error::Result,
    store::{IndexQuery, LocalStore},
    Error, OfflineRecord, RecordId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time copy of every record in the outbox.
///
/// Uses BTreeMap instead of HashMap for deterministic serialization order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// All records keyed by id
    pub records: BTreeMap<RecordId, OfflineRecord>,
}

impl OutboxSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            records: BTreeMap::new(),
        }
    }

    /// Add or replace a record.
    pub fn add_record(&mut self, record: OfflineRecord) {
        self.records.insert(record.id.clone(), record);
    }

    /// Get a record by id.
    pub fn get_record(&self, id: &str) -> Option<&OfflineRecord> {
        self.records.get(id)
    }

    /// Total records.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Records not yet synced.
    pub fn pending_count(&self) -> usize {
        self.records.values().filter(|r| r.is_pending()).count()
    }

    /// Serialize to JSON with deterministic ordering.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        // Keys must agree with the ids they hold
        if let Some((key, _)) = snapshot.records.iter().find(|(k, r)| **k != r.id) {
            return Err(Error::InvalidSnapshot(format!(
                "record key '{}' does not match its id",
                key
            )));
        }

        Ok(snapshot)
    }
}

impl Default for OutboxSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata about a snapshot (without the full data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    pub format_version: u32,
    pub record_count: usize,
    pub pending_count: usize,
}

impl From<&OutboxSnapshot> for SnapshotMetadata {
    fn from(snapshot: &OutboxSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            record_count: snapshot.record_count(),
            pending_count: snapshot.pending_count(),
        }
    }
}

/// Durable store persisting the outbox as a single JSON snapshot file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<Option<OutboxSnapshot>>,
}

impl FileStore {
    /// Create a store for the given file. Nothing touches disk until `open`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(None),
        }
    }

    /// Location of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata of the loaded snapshot, if opened.
    pub async fn metadata(&self) -> Option<SnapshotMetadata> {
        self.state.lock().await.as_ref().map(SnapshotMetadata::from)
    }

    async fn load(&self) -> Result<OutboxSnapshot> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => OutboxSnapshot::from_json(&json),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| Error::StorageInit(format!("{}: {}", parent.display(), e)))?;
                }
                let snapshot = OutboxSnapshot::new();
                self.persist(&snapshot)
                    .await
                    .map_err(|e| Error::StorageInit(e.to_string()))?;
                Ok(snapshot)
            }
            Err(e) => Err(Error::StorageInit(format!("{}: {}", self.path.display(), e))),
        }
    }

    async fn persist(&self, snapshot: &OutboxSnapshot) -> Result<()> {
        let json = snapshot.to_json()?;
        let tmp = self.path.with_extension("tmp");
        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(json.as_bytes()).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &self.path).await
        };
        write
            .await
            .map_err(|e| Error::StorageWrite(format!("{}: {}", self.path.display(), e)))
    }

    /// Apply a change to a copy of the snapshot and persist it; memory is only
    /// updated once the file write succeeded.
    async fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut OutboxSnapshot) + Send,
    {
        let mut state = self.state.lock().await;
        let current = state
            .as_ref()
            .ok_or_else(|| Error::StorageWrite("store not opened".into()))?;
        let mut next = current.clone();
        change(&mut next);
        self.persist(&next).await?;
        *state = Some(next);
        Ok(())
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&OutboxSnapshot) -> T + Send,
    {
        let state = self.state.lock().await;
        state
            .as_ref()
            .map(f)
            .ok_or_else(|| Error::StorageRead("store not opened".into()))
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn open(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.is_none() {
            let snapshot = self.load().await?;
            tracing::debug!(
                path = %self.path.display(),
                records = snapshot.record_count(),
                "opened snapshot store"
            );
            *state = Some(snapshot);
        }
        Ok(())
    }

    async fn put(&self, record: &OfflineRecord) -> Result<()> {
        let record = record.clone();
        self.mutate(move |s| s.add_record(record)).await
    }

    async fn get(&self, id: &str) -> Result<Option<OfflineRecord>> {
        self.read(|s| s.get_record(id).cloned()).await
    }

    async fn get_all(&self) -> Result<Vec<OfflineRecord>> {
        self.read(|s| s.records.values().cloned().collect()).await
    }

    async fn get_by_index(&self, query: IndexQuery) -> Result<Vec<OfflineRecord>> {
        self.read(|s| {
            s.records
                .values()
                .filter(|r| query.matches(r))
                .cloned()
                .collect()
        })
        .await
    }

    async fn count_by_index(&self, query: IndexQuery) -> Result<usize> {
        self.read(|s| s.records.values().filter(|r| query.matches(r)).count())
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.mutate(move |s| {
            s.records.remove(&id);
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.mutate(|s| s.records.clear()).await
    }
}
