//! Remote Applier - replays one record as one remote call.

use crate::{
    error::{RemoteError, Result},
    operation::{Collection, RemoteOp},
    Error, OfflineRecord, RemoteId,
};
use async_trait::async_trait;
use std::sync::Arc;

/// The remote persistence API: named collections with create and update.
#[async_trait]
pub trait RemoteCollections: Send + Sync {
    /// Create an entity and return its remote id.
    async fn create(
        &self,
        collection: Collection,
        payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> std::result::Result<RemoteId, RemoteError>;

    /// Update an existing entity.
    async fn update(
        &self,
        collection: Collection,
        remote_id: &str,
        payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> std::result::Result<(), RemoteError>;
}

#[async_trait]
impl<T: RemoteCollections + ?Sized> RemoteCollections for Arc<T> {
    async fn create(
        &self,
        collection: Collection,
        payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> std::result::Result<RemoteId, RemoteError> {
        (**self).create(collection, payload, idempotency_key).await
    }

    async fn update(
        &self,
        collection: Collection,
        remote_id: &str,
        payload: &serde_json::Value,
        idempotency_key: &str,
    ) -> std::result::Result<(), RemoteError> {
        (**self)
            .update(collection, remote_id, payload, idempotency_key)
            .await
    }
}

/// Applies a queued record to the remote store.
///
/// Returns `Ok` only on a confirmed remote acknowledgment, otherwise
/// [`Error::RemoteSync`].
#[async_trait]
pub trait RemoteApplier: Send + Sync {
    async fn apply(&self, record: &OfflineRecord) -> Result<()>;
}

/// [`RemoteApplier`] over a [`RemoteCollections`] transport.
#[derive(Debug, Clone)]
pub struct CollectionApplier<R> {
    remote: R,
}

impl<R: RemoteCollections> CollectionApplier<R> {
    pub fn new(remote: R) -> Self {
        Self { remote }
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }
}

#[async_trait]
impl<R: RemoteCollections> RemoteApplier for CollectionApplier<R> {
    async fn apply(&self, record: &OfflineRecord) -> Result<()> {
        let op = RemoteOp::plan(record);
        let outcome = match &op {
            RemoteOp::Create(create) => self
                .remote
                .create(create.collection, &create.payload, &create.idempotency_key)
                .await
                .map(|remote_id| {
                    tracing::debug!(
                        record_id = %record.id,
                        collection = %create.collection,
                        remote_id = %remote_id,
                        "remote create acknowledged"
                    );
                }),
            RemoteOp::Update(update) => self
                .remote
                .update(
                    update.collection,
                    &update.remote_id,
                    &update.payload,
                    &update.idempotency_key,
                )
                .await
                .map(|()| {
                    tracing::debug!(
                        record_id = %record.id,
                        collection = %update.collection,
                        remote_id = %update.remote_id,
                        "remote update acknowledged"
                    );
                }),
        };
        outcome.map_err(|source| Error::remote(record.id.clone(), source))
    }
}
