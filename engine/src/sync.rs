//! Sync Driver - drains the outbox through a [`RemoteApplier`].
//!
//! A drain replays every unsynced record once, oldest first, awaiting each
//! remote call before starting the next. A failing record is logged and left
//! pending; it never stops the rest of the queue from making progress.

use crate::{applier::RemoteApplier, error::Result, outbox::Outbox, RecordId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Engine status exposed to collaborators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    /// The last drain left at least one record behind
    Error,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Error => "error",
        })
    }
}

/// A record that did not apply during a drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainFailure {
    pub record_id: RecordId,
    pub error: String,
    /// The failure pushed the record into the dead-letter state
    pub dead_lettered: bool,
}

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    /// Remote calls made
    pub attempted: usize,
    /// Records acknowledged and marked synced
    pub synced: usize,
    /// Records that failed and stay pending
    pub failed: usize,
    /// Dead-lettered records passed over
    pub skipped: usize,
    pub failures: Vec<DrainFailure>,
    /// Status the drain finished in
    pub status: SyncStatus,
}

/// Replays queued records against the remote store.
pub struct SyncDriver {
    outbox: Arc<Outbox>,
    applier: Arc<dyn RemoteApplier>,
    status_tx: watch::Sender<SyncStatus>,
    /// One drain at a time; a second caller waits for the first to finish
    drain_gate: Mutex<()>,
}

impl SyncDriver {
    pub fn new(outbox: Arc<Outbox>, applier: Arc<dyn RemoteApplier>) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::Idle);
        Self {
            outbox,
            applier,
            status_tx,
            drain_gate: Mutex::new(()),
        }
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        *self.status_tx.borrow()
    }

    /// Observe status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }

    /// Run one drain pass over the records unsynced right now.
    ///
    /// Remote failures are recovered here and reported in the
    /// [`DrainReport`]. Only storage errors are returned; records marked
    /// synced before such an error stay synced.
    pub async fn drain(&self) -> Result<DrainReport> {
        let _gate = self.drain_gate.lock().await;
        self.status_tx.send_replace(SyncStatus::Syncing);

        match self.drain_pass().await {
            Ok(report) => {
                self.status_tx.send_replace(report.status);
                tracing::info!(
                    attempted = report.attempted,
                    synced = report.synced,
                    failed = report.failed,
                    skipped = report.skipped,
                    status = %report.status,
                    "drain finished"
                );
                Ok(report)
            }
            Err(e) => {
                self.status_tx.send_replace(SyncStatus::Error);
                tracing::error!(error = %e, "drain aborted by storage error");
                Err(e)
            }
        }
    }

    async fn drain_pass(&self) -> Result<DrainReport> {
        let records = self.outbox.list_unsynced().await?;
        let mut report = DrainReport::default();

        tracing::debug!(records = records.len(), "drain started");

        for record in records {
            if !record.is_drainable() {
                report.skipped += 1;
                continue;
            }

            report.attempted += 1;
            match self.applier.apply(&record).await {
                Ok(()) => {
                    self.outbox.mark_synced(&record.id).await?;
                    report.synced += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        record_id = %record.id,
                        entity_type = %record.entity_type,
                        error = %e,
                        "record failed to apply, leaving it pending"
                    );
                    let updated = self.outbox.record_failure(&record.id, e.to_string()).await?;
                    report.failed += 1;
                    report.failures.push(DrainFailure {
                        record_id: record.id,
                        error: e.to_string(),
                        dead_lettered: updated.is_some_and(|r| r.dead_lettered),
                    });
                }
            }
        }

        report.status = if report.failed > 0 {
            SyncStatus::Error
        } else {
            SyncStatus::Idle
        };
        Ok(report)
    }
}

impl fmt::Debug for SyncDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncDriver")
            .field("outbox", &self.outbox)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}
