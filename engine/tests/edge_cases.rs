//! Edge case tests for outbox-engine
//!
//! These tests cover persistence across restarts, unusual payloads, and the
//! boundaries of the retry and prune rules.

use async_trait::async_trait;
use outbox_engine::{
    Collection, CollectionApplier, Engine, EngineConfig, EnqueueClock, EntityType, Error,
    FileStore, LocalStore, MemoryStore, OfflineRecord, Outbox, RemoteCollections, RemoteError,
    SyncStatus,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

/// Remote that rejects every call to the collections it is told to refuse.
#[derive(Default)]
struct FlakyRemote {
    refuse: Mutex<Vec<Collection>>,
    calls: Mutex<usize>,
}

impl FlakyRemote {
    fn refusing(collections: &[Collection]) -> Arc<Self> {
        Arc::new(Self {
            refuse: Mutex::new(collections.to_vec()),
            calls: Mutex::new(0),
        })
    }

    fn heal(&self) {
        self.refuse.lock().unwrap().clear();
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn check(&self, collection: Collection) -> Result<(), RemoteError> {
        *self.calls.lock().unwrap() += 1;
        if self.refuse.lock().unwrap().contains(&collection) {
            return Err(RemoteError::Transport("connection refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCollections for FlakyRemote {
    async fn create(
        &self,
        collection: Collection,
        _payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> Result<String, RemoteError> {
        self.check(collection)?;
        Ok(format!("srv-{idempotency_key}"))
    }

    async fn update(
        &self,
        collection: Collection,
        _remote_id: &str,
        _payload: &serde_json::Value,
        _idempotency_key: &str,
    ) -> Result<(), RemoteError> {
        self.check(collection)
    }
}

fn engine_over(store: Arc<dyn LocalStore>, remote: Arc<FlakyRemote>) -> Engine {
    Engine::new(store, Arc::new(CollectionApplier::new(remote)))
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn records_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outbox.json");
    let remote = FlakyRemote::refusing(&[Collection::Customers]);

    let (wo, cus) = {
        let engine = engine_over(Arc::new(FileStore::new(&path)), remote.clone());
        let wo = engine
            .enqueue(EntityType::WorkOrder, json!({"description": "Oil change"}))
            .await
            .unwrap();
        let cus = engine
            .enqueue(EntityType::Customer, json!({"name": "Acme"}))
            .await
            .unwrap();
        engine.drain().await.unwrap();
        (wo, cus)
    };

    let engine = engine_over(Arc::new(FileStore::new(&path)), remote.clone());
    assert_eq!(engine.pending_count().await.unwrap(), 1);

    let unsynced = engine.list_unsynced().await.unwrap();
    assert_eq!(unsynced.len(), 1);
    assert_eq!(unsynced[0].id, cus);
    assert_eq!(unsynced[0].attempts, 1);
    let expected = format!("remote sync failed for {cus}: transport error: connection refused");
    assert_eq!(unsynced[0].last_error.as_deref(), Some(expected.as_str()));

    let synced = engine.list_by_type(EntityType::WorkOrder).await.unwrap();
    assert_eq!(synced[0].id, wo);
    assert!(synced[0].synced);

    remote.heal();
    let report = engine.drain().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(engine.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn clock_resumes_past_persisted_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outbox.json");

    fn far_future() -> u64 {
        4_000_000_000_000
    }

    let first = Outbox::new(Arc::new(FileStore::new(&path)))
        .with_clock(EnqueueClock::with_source(far_future));
    first.enqueue(EntityType::Inventory, json!({})).await.unwrap();
    let persisted = first.list_unsynced().await.unwrap()[0].enqueued_at;

    // A fresh process whose wall clock reads earlier than the stored records
    let second = Outbox::new(Arc::new(FileStore::new(&path)));
    second.enqueue(EntityType::Inventory, json!({})).await.unwrap();

    let records = second.list_unsynced().await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].enqueued_at, persisted);
    assert!(records[1].enqueued_at > persisted);
}

#[tokio::test]
async fn corrupt_snapshot_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outbox.json");
    std::fs::write(&path, "{ not json").unwrap();

    let engine = engine_over(Arc::new(FileStore::new(&path)), FlakyRemote::refusing(&[]));
    let err = engine.pending_count().await.unwrap_err();
    assert!(matches!(err, Error::InvalidSnapshot(_)));

    // Nothing was overwritten
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

#[tokio::test]
async fn store_opens_in_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("deeper").join("outbox.json");

    let engine = engine_over(Arc::new(FileStore::new(&path)), FlakyRemote::refusing(&[]));
    engine.enqueue(EntityType::Customer, json!({})).await.unwrap();
    assert!(path.exists());
}

// ============================================================================
// Payload Edge Cases
// ============================================================================

#[tokio::test]
async fn payloads_are_stored_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outbox.json");
    let payloads = vec![
        json!({}),
        json!(null),
        json!([1, 2, 3]),
        json!({"name": "日本語テスト"}),
        json!({"name": "🎉🚀💯", "nested": {"deep": [{"a": null}]}}),
        json!({"text": "Hello\nWorld\tTab", "nul": "Null\u{0}Test"}),
        json!({"big": u64::MAX, "neg": i64::MIN, "float": 1.5}),
    ];

    {
        let outbox = Outbox::new(Arc::new(FileStore::new(&path)));
        for payload in &payloads {
            outbox.enqueue(EntityType::WorkOrder, payload.clone()).await.unwrap();
        }
    }

    let outbox = Outbox::new(Arc::new(FileStore::new(&path)));
    let stored: Vec<_> = outbox
        .list_by_type(EntityType::WorkOrder)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.payload)
        .collect();
    assert_eq!(stored, payloads);
}

#[tokio::test]
async fn payload_id_turns_create_into_update() {
    #[derive(Default)]
    struct Tally {
        creates: Mutex<Vec<String>>,
        updates: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteCollections for Tally {
        async fn create(
            &self,
            _collection: Collection,
            _payload: &serde_json::Value,
            idempotency_key: &str,
        ) -> Result<String, RemoteError> {
            self.creates.lock().unwrap().push(idempotency_key.into());
            Ok("new".into())
        }

        async fn update(
            &self,
            _collection: Collection,
            remote_id: &str,
            _payload: &serde_json::Value,
            _idempotency_key: &str,
        ) -> Result<(), RemoteError> {
            self.updates.lock().unwrap().push(remote_id.into());
            Ok(())
        }
    }

    let tally = Arc::new(Tally::default());
    let engine = Engine::new(
        Arc::new(MemoryStore::new()),
        Arc::new(CollectionApplier::new(tally.clone())),
    );
    engine.enqueue(EntityType::Customer, json!({"name": "Acme"})).await.unwrap();
    engine
        .enqueue(EntityType::Customer, json!({"id": "cus-7", "name": "Acme Ltd"}))
        .await
        .unwrap();
    engine
        .enqueue(EntityType::Inventory, json!({"id": 42, "qty": 3}))
        .await
        .unwrap();
    engine
        .enqueue(EntityType::Inventory, json!({"id": "", "qty": 1}))
        .await
        .unwrap();

    engine.drain().await.unwrap();
    assert_eq!(tally.creates.lock().unwrap().len(), 2);
    assert_eq!(*tally.updates.lock().unwrap(), vec!["cus-7", "42"]);
}

// ============================================================================
// Retry and Dead Letters
// ============================================================================

#[tokio::test]
async fn unlimited_attempts_never_dead_letter() {
    let remote = FlakyRemote::refusing(&[Collection::WorkOrders]);
    let engine = engine_over(Arc::new(MemoryStore::new()), remote.clone());
    engine.enqueue(EntityType::WorkOrder, json!({})).await.unwrap();

    for _ in 0..20 {
        engine.drain().await.unwrap();
    }
    let record = &engine.list_unsynced().await.unwrap()[0];
    assert_eq!(record.attempts, 20);
    assert!(!record.dead_lettered);
    assert_eq!(remote.calls(), 20);
}

#[tokio::test]
async fn dead_letters_revive_and_sync() {
    let remote = FlakyRemote::refusing(&[Collection::Customers]);
    let engine = Engine::with_config(
        Arc::new(MemoryStore::new()),
        Arc::new(CollectionApplier::new(remote.clone())),
        EngineConfig::default().with_max_attempts(2),
    );
    engine.enqueue(EntityType::Customer, json!({})).await.unwrap();

    engine.drain().await.unwrap();
    engine.drain().await.unwrap();
    let report = engine.drain().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(remote.calls(), 2);

    let status = engine.status();
    assert_eq!(status.pending_count, 1);
    assert_eq!(status.dead_lettered, 1);
    assert_eq!(status.sync_status, SyncStatus::Idle);

    remote.heal();
    assert_eq!(engine.revive_dead_letters().await.unwrap(), 1);
    assert_eq!(engine.status().dead_lettered, 0);

    let report = engine.drain().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(engine.pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn zero_max_attempts_is_clamped() {
    let config = EngineConfig::default().with_max_attempts(0);
    assert_eq!(config.max_attempts, Some(1));
}

// ============================================================================
// Garbage Collection
// ============================================================================

#[tokio::test]
async fn prune_only_removes_old_synced_records() {
    let store = Arc::new(MemoryStore::with_records([
        synced("wo_old", EntityType::WorkOrder, 100),
        synced("wo_new", EntityType::WorkOrder, 900),
        OfflineRecord::new("cus_old", EntityType::Customer, json!({}), 50),
    ]));
    let outbox = Outbox::new(store.clone());

    assert_eq!(outbox.prune_synced(500).await.unwrap(), 1);
    assert!(outbox.get("wo_old").await.unwrap().is_none());
    assert!(outbox.get("wo_new").await.unwrap().is_some());
    assert!(outbox.get("cus_old").await.unwrap().is_some());
    assert_eq!(outbox.pending_count().await.unwrap(), 1);
}

#[tokio::test]
async fn purge_discards_even_unsynced_records() {
    let engine = engine_over(
        Arc::new(MemoryStore::new()),
        FlakyRemote::refusing(&[Collection::InventoryItems]),
    );
    engine.enqueue(EntityType::Inventory, json!({})).await.unwrap();
    engine.enqueue(EntityType::WorkOrder, json!({})).await.unwrap();
    engine.drain().await.unwrap();

    engine.purge_all().await.unwrap();
    assert_eq!(engine.pending_count().await.unwrap(), 0);
    assert_eq!(engine.status().pending_count, 0);
    for entity_type in EntityType::ALL {
        assert!(engine.list_by_type(entity_type).await.unwrap().is_empty());
    }
}

fn synced(id: &str, entity_type: EntityType, enqueued_at: u64) -> OfflineRecord {
    let mut record = OfflineRecord::new(id, entity_type, json!({}), enqueued_at);
    record.mark_synced();
    record
}
