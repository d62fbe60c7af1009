//! Periodic drain trigger, with optional pruning of old synced records.

use outbox_engine::Engine;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Drain on a fixed interval while records are pending.
///
/// The first tick fires immediately, so anything left over from a previous
/// run is replayed at startup. With a `retention`, synced records older than it
/// are pruned after each tick. Errors are logged and the timer keeps going.
pub fn spawn_periodic_drain(
    engine: Engine,
    every: Duration,
    retention: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval_secs = every.as_secs_f64(), "periodic drain started");

        loop {
            interval.tick().await;
            tick(&engine).await;
            if let Some(retention) = retention {
                prune(&engine, retention).await;
            }
        }
    })
}

async fn tick(engine: &Engine) {
    match engine.pending_count().await {
        Ok(0) => {}
        Ok(pending) => {
            tracing::debug!(pending, "periodic drain");
            if let Err(e) = engine.drain().await {
                tracing::error!(error = %e, "periodic drain failed");
            }
        }
        Err(e) => tracing::error!(error = %e, "periodic drain could not read the outbox"),
    }
}

async fn prune(engine: &Engine, retention: Duration) {
    let Some(cutoff) = retention_cutoff(chrono::Utc::now(), retention) else {
        return;
    };
    match engine.prune_synced(cutoff).await {
        Ok(0) => {}
        Ok(pruned) => tracing::info!(pruned, cutoff, "pruned synced records"),
        Err(e) => tracing::error!(error = %e, "pruning synced records failed"),
    }
}

/// Enqueue timestamp (ms) before which synced records are expired.
fn retention_cutoff(now: chrono::DateTime<chrono::Utc>, retention: Duration) -> Option<u64> {
    let retention = chrono::TimeDelta::from_std(retention).ok()?;
    let cutoff = now.checked_sub_signed(retention)?.timestamp_millis();
    u64::try_from(cutoff).ok()
}
