//! Error types for the outbox engine.

use crate::RecordId;
use thiserror::Error;

/// Why a single remote call did not apply.
///
/// The sync driver treats every variant the same way ("leave it pending"),
/// the distinction only feeds logs and the stored `last_error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unexpected response ({status}): {message}")]
    Unexpected { status: u16, message: String },
}

/// All possible errors from the outbox engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Storage errors, surfaced to the immediate caller
    #[error("storage unavailable: {0}")]
    StorageInit(String),

    #[error("storage write failed: {0}")]
    StorageWrite(String),

    #[error("storage read failed: {0}")]
    StorageRead(String),

    // Remote errors, recovered inside a drain
    #[error("remote sync failed for {record_id}: {source}")]
    RemoteSync {
        record_id: RecordId,
        #[source]
        source: RemoteError,
    },

    // Input errors
    #[error("unknown record type: {0}")]
    UnknownRecordType(String),

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
}

impl Error {
    /// Wrap a remote failure for a given record.
    pub fn remote(record_id: impl Into<RecordId>, source: RemoteError) -> Self {
        Error::RemoteSync {
            record_id: record_id.into(),
            source,
        }
    }

    /// Whether this error came from the local store.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Error::StorageInit(_) | Error::StorageWrite(_) | Error::StorageRead(_)
        )
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
