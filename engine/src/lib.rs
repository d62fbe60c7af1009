//! # Outbox Engine
//!
//! Durable offline outbox and replay engine.
//!
//! While the backing data service is unreachable, every mutation a client
//! attempts is captured as an [`OfflineRecord`] in a durable local store. When
//! connectivity returns, a drain replays each record against the remote store
//! and marks it synced once the remote side acknowledges it.
//!
//! ## Design Principles
//!
//! - **Nothing is lost**: a remote failure leaves the record pending, never
//!   discards it
//! - **Failure isolation**: one bad record never blocks the rest of the queue
//! - **Chronological replay**: records replay in enqueue order within a drain
//! - **Schema-agnostic**: payloads are opaque JSON
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! Each [`OfflineRecord`] carries:
//! - Unique ID (`{type}_{timestamp}_{random}`), also the idempotency key
//! - Entity type ([`EntityType`]), which selects the remote collection
//! - Opaque JSON payload, written once
//! - Enqueue timestamp from a monotonic [`EnqueueClock`]
//! - Synced flag, which only ever goes from `false` to `true`
//!
//! ### Components
//!
//! - [`LocalStore`] - durable keyed store with `type` and `synced` indexes
//!   ([`MemoryStore`], [`FileStore`])
//! - [`Outbox`] - the only component that reads or writes records
//! - [`SyncDriver`] - drains unsynced records through a [`RemoteApplier`]
//! - [`CollectionApplier`] - maps a record to one create or update call on a
//!   [`RemoteCollections`] transport
//! - [`Engine`] - the facade collaborators use
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use outbox_engine::{
//!     Collection, CollectionApplier, Engine, EntityType, MemoryStore, RemoteCollections,
//!     RemoteError, SyncStatus,
//! };
//! use serde_json::json;
//!
//! struct AcceptAll;
//!
//! #[async_trait]
//! impl RemoteCollections for AcceptAll {
//!     async fn create(
//!         &self,
//!         _collection: Collection,
//!         _payload: &serde_json::Value,
//!         idempotency_key: &str,
//!     ) -> Result<String, RemoteError> {
//!         Ok(format!("remote-{idempotency_key}"))
//!     }
//!
//!     async fn update(
//!         &self,
//!         _collection: Collection,
//!         _remote_id: &str,
//!         _payload: &serde_json::Value,
//!         _idempotency_key: &str,
//!     ) -> Result<(), RemoteError> {
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test_block_on(async {
//! let engine = Engine::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(CollectionApplier::new(AcceptAll)),
//! );
//!
//! let id = engine
//!     .enqueue(EntityType::WorkOrder, json!({"description": "Oil change"}))
//!     .await
//!     .unwrap();
//! assert!(id.starts_with("work_order_"));
//! assert_eq!(engine.pending_count().await.unwrap(), 1);
//!
//! let report = engine.drain().await.unwrap();
//! assert_eq!(report.synced, 1);
//! assert_eq!(engine.sync_status(), SyncStatus::Idle);
//! assert_eq!(engine.pending_count().await.unwrap(), 0);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```
//!
//! ## Persistence
//!
//! [`FileStore`] keeps the outbox in an atomically rewritten JSON
//! [`OutboxSnapshot`]. Other backends (the agent ships a SQLite one) implement
//! [`LocalStore`].

pub mod applier;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod operation;
pub mod outbox;
pub mod record;
pub mod snapshot;
pub mod store;
pub mod sync;

// Re-export main types at crate root
pub use applier::{CollectionApplier, RemoteApplier, RemoteCollections};
pub use clock::EnqueueClock;
pub use config::EngineConfig;
pub use engine::{Engine, EngineStatus, StatusWatcher};
pub use error::{Error, RemoteError, Result};
pub use operation::{Collection, CreateOp, RemoteOp, UpdateOp, REMOTE_ID_FIELD};
pub use outbox::Outbox;
pub use record::{EntityType, OfflineRecord};
pub use snapshot::{FileStore, OutboxSnapshot, SnapshotMetadata, SNAPSHOT_FORMAT_VERSION};
pub use store::{IndexQuery, LocalStore, MemoryStore};
pub use sync::{DrainFailure, DrainReport, SyncDriver, SyncStatus};

/// Type aliases for clarity
pub type RecordId = String;
pub type RemoteId = String;
pub type Timestamp = u64;
