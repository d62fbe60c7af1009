//! Monotonic clock for enqueue timestamps.
//!
//! Wall-clock time can repeat or step backwards; the outbox orders records by
//! `enqueued_at`, so every tick must be strictly greater than the last one.

use crate::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of wall-clock milliseconds.
pub type TimeSource = fn() -> Timestamp;

/// Current wall-clock time in milliseconds since epoch.
pub fn system_now() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}

/// A clock that never returns the same value twice.
///
/// Ordering rules:
/// 1. Follow the wall clock when it moves forward
/// 2. Otherwise advance one past the last value handed out
#[derive(Debug)]
pub struct EnqueueClock {
    last: AtomicU64,
    source: TimeSource,
}

impl EnqueueClock {
    /// Create a clock driven by the system time.
    pub fn new() -> Self {
        Self::with_source(system_now)
    }

    /// Create a clock driven by a custom time source.
    pub fn with_source(source: TimeSource) -> Self {
        Self {
            last: AtomicU64::new(0),
            source,
        }
    }

    /// Return the next timestamp, strictly greater than every previous one.
    pub fn tick(&self) -> Timestamp {
        let now = (self.source)();
        let mut current = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(current.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }

    /// Make sure future ticks land after `timestamp`.
    /// Used when reopening a store that already holds records.
    pub fn resume_after(&self, timestamp: Timestamp) {
        self.last.fetch_max(timestamp, Ordering::AcqRel);
    }

    /// The last value handed out (0 if none).
    pub fn last(&self) -> Timestamp {
        self.last.load(Ordering::Acquire)
    }
}

impl Default for EnqueueClock {
    fn default() -> Self {
        Self::new()
    }
}
