//! Durable Local Store contract and the in-memory implementation.
//!
//! A store is a keyed collection of [`OfflineRecord`]s with two secondary
//! indexes, one on `type` and one on `synced`. Reads return snapshots, never
//! live views. Only the [`Outbox`](crate::Outbox) talks to a store directly.

use crate::{error::Result, EntityType, OfflineRecord, RecordId};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// A secondary index lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexQuery {
    /// Records of one entity type
    Type(EntityType),
    /// Records by synced flag
    Synced(bool),
    /// Unsynced records parked after repeated failures
    DeadLettered,
}

impl IndexQuery {
    /// Whether a record falls under this index value.
    pub fn matches(&self, record: &OfflineRecord) -> bool {
        match self {
            IndexQuery::Type(t) => record.entity_type == *t,
            IndexQuery::Synced(s) => record.synced == *s,
            IndexQuery::DeadLettered => !record.synced && record.dead_lettered,
        }
    }
}

/// Persistent object collection keyed by record id.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Initialize the store, creating its schema on first use. Idempotent.
    async fn open(&self) -> Result<()>;

    /// Insert or overwrite a record by id.
    async fn put(&self, record: &OfflineRecord) -> Result<()>;

    /// Fetch one record.
    async fn get(&self, id: &str) -> Result<Option<OfflineRecord>>;

    /// Snapshot of every record.
    async fn get_all(&self) -> Result<Vec<OfflineRecord>>;

    /// Snapshot of the records matching an index value.
    async fn get_by_index(&self, query: IndexQuery) -> Result<Vec<OfflineRecord>>;

    /// Number of records matching an index value.
    async fn count_by_index(&self, query: IndexQuery) -> Result<usize> {
        Ok(self.get_by_index(query).await?.len())
    }

    /// Remove one record. Removing an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Remove every record.
    async fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<RecordId, OfflineRecord>,
    by_type: HashMap<EntityType, BTreeSet<RecordId>>,
    by_synced: HashMap<bool, BTreeSet<RecordId>>,
    dead_lettered: BTreeSet<RecordId>,
}

impl MemoryState {
    fn insert(&mut self, record: OfflineRecord) {
        self.unindex(&record.id);
        self.by_type
            .entry(record.entity_type)
            .or_default()
            .insert(record.id.clone());
        self.by_synced
            .entry(record.synced)
            .or_default()
            .insert(record.id.clone());
        if IndexQuery::DeadLettered.matches(&record) {
            self.dead_lettered.insert(record.id.clone());
        }
        self.records.insert(record.id.clone(), record);
    }

    fn remove(&mut self, id: &str) -> Option<OfflineRecord> {
        self.unindex(id);
        self.records.remove(id)
    }

    fn unindex(&mut self, id: &str) {
        if let Some(existing) = self.records.get(id) {
            if let Some(ids) = self.by_type.get_mut(&existing.entity_type) {
                ids.remove(id);
            }
            if let Some(ids) = self.by_synced.get_mut(&existing.synced) {
                ids.remove(id);
            }
            self.dead_lettered.remove(id);
        }
    }

    fn index(&self, query: IndexQuery) -> Option<&BTreeSet<RecordId>> {
        match query {
            IndexQuery::Type(t) => self.by_type.get(&t),
            IndexQuery::Synced(s) => self.by_synced.get(&s),
            IndexQuery::DeadLettered => Some(&self.dead_lettered),
        }
    }
}

/// Non-durable store backed by in-process maps.
///
/// Useful for tests and for embedding the engine where losing the queue on
/// restart is acceptable.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records.
    pub fn with_records(records: impl IntoIterator<Item = OfflineRecord>) -> Self {
        let mut state = MemoryState::default();
        for record in records {
            state.insert(record);
        }
        Self {
            state: RwLock::new(state),
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn put(&self, record: &OfflineRecord) -> Result<()> {
        self.state.write().await.insert(record.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<OfflineRecord>> {
        Ok(self.state.read().await.records.get(id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<OfflineRecord>> {
        Ok(self.state.read().await.records.values().cloned().collect())
    }

    async fn get_by_index(&self, query: IndexQuery) -> Result<Vec<OfflineRecord>> {
        let state = self.state.read().await;
        Ok(state
            .index(query)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.records.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count_by_index(&self, query: IndexQuery) -> Result<usize> {
        Ok(self
            .state
            .read()
            .await
            .index(query)
            .map_or(0, BTreeSet::len))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.state.write().await.remove(id);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.write().await;
        *state = MemoryState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, entity_type: EntityType, at: u64) -> OfflineRecord {
        OfflineRecord::new(id, entity_type, json!({"n": at}), at)
    }

    #[tokio::test]
    async fn put_and_get() {
        let store = MemoryStore::new();
        store.open().await.unwrap();
        store
            .put(&record("a", EntityType::WorkOrder, 1))
            .await
            .unwrap();

        let fetched = store.get("a").await.unwrap().unwrap();
        assert_eq!(fetched.payload, json!({"n": 1}));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn put_overwrites_and_reindexes() {
        let store = MemoryStore::new();
        let mut r = record("a", EntityType::Customer, 1);
        store.put(&r).await.unwrap();
        assert_eq!(store.count_by_index(IndexQuery::Synced(false)).await.unwrap(), 1);

        r.mark_synced();
        store.put(&r).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.count_by_index(IndexQuery::Synced(false)).await.unwrap(), 0);
        assert_eq!(store.count_by_index(IndexQuery::Synced(true)).await.unwrap(), 1);
        assert_eq!(
            store
                .get_by_index(IndexQuery::Type(EntityType::Customer))
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn index_by_type() {
        let store = MemoryStore::with_records([
            record("a", EntityType::WorkOrder, 1),
            record("b", EntityType::Inventory, 2),
            record("c", EntityType::WorkOrder, 3),
        ]);

        let orders = store
            .get_by_index(IndexQuery::Type(EntityType::WorkOrder))
            .await
            .unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|r| r.entity_type == EntityType::WorkOrder));

        let customers = store
            .get_by_index(IndexQuery::Type(EntityType::Customer))
            .await
            .unwrap();
        assert!(customers.is_empty());
    }

    #[tokio::test]
    async fn delete_and_clear() {
        let store = MemoryStore::with_records([
            record("a", EntityType::WorkOrder, 1),
            record("b", EntityType::Inventory, 2),
        ]);

        store.delete("a").await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.len().await, 1);
        assert_eq!(
            store
                .count_by_index(IndexQuery::Type(EntityType::WorkOrder))
                .await
                .unwrap(),
            0
        );

        store.clear().await.unwrap();
        assert!(store.is_empty().await);
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[test]
    fn index_query_matches() {
        let r = record("a", EntityType::Inventory, 1);
        assert!(IndexQuery::Type(EntityType::Inventory).matches(&r));
        assert!(!IndexQuery::Type(EntityType::Customer).matches(&r));
        assert!(IndexQuery::Synced(false).matches(&r));
        assert!(!IndexQuery::Synced(true).matches(&r));
        assert!(!IndexQuery::DeadLettered.matches(&r));
    }

    #[tokio::test]
    async fn dead_letter_index_follows_state() {
        let store = MemoryStore::new();
        let mut r = record("a", EntityType::Customer, 1);
        r.record_failure("boom", Some(1));
        store.put(&r).await.unwrap();
        store.put(&record("b", EntityType::Customer, 2)).await.unwrap();
        assert_eq!(store.count_by_index(IndexQuery::DeadLettered).await.unwrap(), 1);
        assert_eq!(
            store.get_by_index(IndexQuery::DeadLettered).await.unwrap()[0].id,
            "a"
        );

        r.revive();
        store.put(&r).await.unwrap();
        assert_eq!(store.count_by_index(IndexQuery::DeadLettered).await.unwrap(), 0);
    }
}
