//! Checkpoint map and the one-shot scan that fills it.

use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use tracestate_metrics::MetricsRecorder;
use tracestate_trace::{EventRequest, ExecutionType};
use tracestate_types::{Latch, LatchState, TimeRange, TraceEvent, TraceId};

/// Timestamp to event rank, filled once and read-only afterwards.
#[derive(Debug)]
pub(crate) struct Checkpoints {
    map: RwLock<BTreeMap<i64, u64>>,
    ready: Latch,
}

impl Checkpoints {
    /// A map holding only `{start_time -> 0}`, not ready yet.
    pub(crate) fn seeded(start_time: i64) -> Self {
        Self {
            map: RwLock::new(BTreeMap::from([(start_time, 0)])),
            ready: Latch::new(),
        }
    }

    pub(crate) fn ready(&self) -> &Latch {
        &self.ready
    }

    /// Latest checkpoint at or before `t`.
    pub(crate) fn floor(&self, t: i64) -> Option<i64> {
        self.map.read().range(..=t).next_back().map(|(&time, _)| time)
    }

    pub(crate) fn len(&self) -> usize {
        self.map.read().len()
    }

    pub(crate) fn entries(&self) -> Vec<(i64, u64)> {
        self.map.read().iter().map(|(&time, &rank)| (time, rank)).collect()
    }

    pub(crate) fn clear(&self) {
        self.map.write().clear();
    }
}

#[derive(Debug, Default)]
struct Progress {
    event_count: u64,
    last_checkpoint_at: u64,
}

/// Whole-trace scan recording a checkpoint every `granularity` events.
pub(crate) struct CheckpointRequest {
    ssid: String,
    trace: TraceId,
    granularity: u64,
    checkpoints: Arc<Checkpoints>,
    progress: Mutex<Progress>,
    metrics: Arc<dyn MetricsRecorder>,
}

impl CheckpointRequest {
    pub(crate) fn new(
        ssid: String,
        trace: TraceId,
        granularity: u64,
        checkpoints: Arc<Checkpoints>,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Self {
        Self {
            ssid,
            trace,
            granularity,
            checkpoints,
            progress: Mutex::new(Progress::default()),
            metrics,
        }
    }
}

impl EventRequest for CheckpointRequest {
    fn range(&self) -> TimeRange {
        TimeRange::ETERNITY
    }

    fn execution_type(&self) -> ExecutionType {
        ExecutionType::Foreground
    }

    fn handle_data(&self, event: &TraceEvent) -> ControlFlow<()> {
        if event.trace != self.trace {
            return ControlFlow::Continue(());
        }
        let mut progress = self.progress.lock();
        progress.event_count += 1;
        if progress.event_count >= progress.last_checkpoint_at + self.granularity {
            let mut map = self.checkpoints.map.write();
            // Keys must stay strictly increasing: an event at or before the
            // last checkpoint's timestamp defers the checkpoint to a later
            // event. This covers events preceding the history start.
            let after_last = map
                .last_key_value()
                .map_or(true, |(&time, _)| event.timestamp > time);
            if after_last {
                map.insert(event.timestamp, progress.event_count);
                progress.last_checkpoint_at = progress.event_count;
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_completed(&self) {
        let count = self.checkpoints.len();
        let events = self.progress.lock().event_count;
        self.metrics.record_checkpoints_registered(count);
        if self.checkpoints.ready.release() {
            tracing::info!(
                ssid = %self.ssid,
                checkpoints = count,
                events,
                granularity = self.granularity,
                "Checkpoints registered"
            );
        }
    }

    fn handle_cancelled(&self) {
        if self.checkpoints.ready.fail() {
            tracing::error!(
                ssid = %self.ssid,
                events = self.progress.lock().event_count,
                "Checkpoint registration cancelled, partial history unusable"
            );
        }
    }
}

/// Whether the checkpoint latch ended in success.
pub(crate) fn is_usable(state: LatchState) -> bool {
    state == LatchState::Released
}
