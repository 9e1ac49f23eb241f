//! Metrics facade for state histories.
//!
//! Provides a [`MetricsRecorder`] trait with domain-specific methods and
//! default no-op implementations. There is no global recorder: components
//! that record metrics take an `Arc<dyn MetricsRecorder>` at construction.
//!
//! # Usage
//!
//! ```ignore
//! let metrics = Arc::new(CountingRecorder::new());
//! let backend = PartialHistoryBackend::new(/* ... */, metrics.clone())?;
//! // ...
//! println!("{:?}", metrics.snapshot());
//! ```
//!
//! Pass [`noop()`] where nobody is listening.

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════
// Trait
// ═══════════════════════════════════════════════════════════════════════

/// Domain-specific metrics recording trait.
///
/// All methods have default no-op implementations so backends only need
/// to override the metrics they care about.
#[allow(unused_variables)]
pub trait MetricsRecorder: Send + Sync + 'static {
    // ── Partial history ─────────────────────────────────────────────

    /// An interval crossing a checkpoint was kept.
    fn record_interval_stored(&self) {}

    /// An interval between two checkpoints was dropped.
    fn record_interval_discarded(&self) {}

    /// Checkpoint registration finished with `count` checkpoints.
    fn record_checkpoints_registered(&self, count: usize) {}

    /// A replay from a checkpoint to a query time ran over `events` events.
    fn record_replay(&self, events: u64, latency_secs: f64) {}

    /// A full query over a partial history completed.
    fn record_full_query(&self, latency_secs: f64) {}

    // ── Infrastructure ───────────────────────────────────────────────

    /// Set request lane queue depths.
    fn set_request_queue_depths(&self, foreground: usize, background: usize) {}
}

// ═══════════════════════════════════════════════════════════════════════
// Recorders
// ═══════════════════════════════════════════════════════════════════════

/// A metrics recorder that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {}

/// Shared no-op recorder.
pub fn noop() -> Arc<dyn MetricsRecorder> {
    Arc::new(NoopRecorder)
}

/// Point-in-time copy of a [`CountingRecorder`].
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub intervals_stored: u64,
    pub intervals_discarded: u64,
    pub checkpoints: u64,
    pub replays: u64,
    pub replayed_events: u64,
    pub replay_secs_total: f64,
    pub full_queries: u64,
    pub full_query_secs_total: f64,
    pub full_query_secs_max: f64,
    pub max_foreground_depth: u64,
    pub max_background_depth: u64,
}

impl MetricsSnapshot {
    /// Share of offered intervals the partial history kept, in `[0, 1]`.
    pub fn stored_ratio(&self) -> f64 {
        let offered = self.intervals_stored + self.intervals_discarded;
        if offered == 0 {
            return 0.0;
        }
        self.intervals_stored as f64 / offered as f64
    }

    pub fn mean_full_query_secs(&self) -> f64 {
        if self.full_queries == 0 {
            return 0.0;
        }
        self.full_query_secs_total / self.full_queries as f64
    }
}

#[derive(Debug, Default)]
struct Latencies {
    replay_total: f64,
    query_total: f64,
    query_max: f64,
}

/// A recorder that keeps running totals in memory.
#[derive(Debug, Default)]
pub struct CountingRecorder {
    intervals_stored: AtomicU64,
    intervals_discarded: AtomicU64,
    checkpoints: AtomicU64,
    replays: AtomicU64,
    replayed_events: AtomicU64,
    full_queries: AtomicU64,
    max_foreground_depth: AtomicU64,
    max_background_depth: AtomicU64,
    latencies: Mutex<Latencies>,
}

impl CountingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let latencies = self.latencies.lock();
        MetricsSnapshot {
            intervals_stored: self.intervals_stored.load(Ordering::Relaxed),
            intervals_discarded: self.intervals_discarded.load(Ordering::Relaxed),
            checkpoints: self.checkpoints.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
            replayed_events: self.replayed_events.load(Ordering::Relaxed),
            replay_secs_total: latencies.replay_total,
            full_queries: self.full_queries.load(Ordering::Relaxed),
            full_query_secs_total: latencies.query_total,
            full_query_secs_max: latencies.query_max,
            max_foreground_depth: self.max_foreground_depth.load(Ordering::Relaxed),
            max_background_depth: self.max_background_depth.load(Ordering::Relaxed),
        }
    }
}

impl MetricsRecorder for CountingRecorder {
    fn record_interval_stored(&self) {
        self.intervals_stored.fetch_add(1, Ordering::Relaxed);
    }

    fn record_interval_discarded(&self) {
        self.intervals_discarded.fetch_add(1, Ordering::Relaxed);
    }

    fn record_checkpoints_registered(&self, count: usize) {
        self.checkpoints.store(count as u64, Ordering::Relaxed);
    }

    fn record_replay(&self, events: u64, latency_secs: f64) {
        self.replays.fetch_add(1, Ordering::Relaxed);
        self.replayed_events.fetch_add(events, Ordering::Relaxed);
        self.latencies.lock().replay_total += latency_secs;
    }

    fn record_full_query(&self, latency_secs: f64) {
        self.full_queries.fetch_add(1, Ordering::Relaxed);
        let mut latencies = self.latencies.lock();
        latencies.query_total += latency_secs;
        latencies.query_max = latencies.query_max.max(latency_secs);
    }

    fn set_request_queue_depths(&self, foreground: usize, background: usize) {
        self.max_foreground_depth
            .fetch_max(foreground as u64, Ordering::Relaxed);
        self.max_background_depth
            .fetch_max(background as u64, Ordering::Relaxed);
    }
}
