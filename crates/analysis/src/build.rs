//! The request that reads the whole trace into a state system.

use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracestate_provider::StateProvider;
use tracestate_statesystem::{StateSystem, StateSystemBuilder};
use tracestate_trace::{EventRequest, ExecutionType};
use tracestate_types::{TimeRange, TraceEvent, TraceId};

/// Feeds every event of the trace to the analysis' provider, then closes
/// the history at the last event's timestamp.
///
/// Any failure abandons the build, which wakes everyone waiting for it.
pub(crate) struct BuildRequest {
    id: String,
    trace: TraceId,
    provider: Arc<dyn StateProvider>,
    ss: Arc<StateSystem>,
    last_timestamp: AtomicI64,
    events: AtomicU64,
    started: Instant,
    failure: Arc<Mutex<Option<String>>>,
}

impl BuildRequest {
    pub(crate) fn new(
        id: String,
        provider: Arc<dyn StateProvider>,
        ss: Arc<StateSystem>,
        failure: Arc<Mutex<Option<String>>>,
    ) -> Self {
        let trace = provider.trace();
        Self {
            id,
            trace: trace.id(),
            last_timestamp: AtomicI64::new(trace.start_time()),
            provider,
            ss,
            events: AtomicU64::new(0),
            started: Instant::now(),
            failure,
        }
    }

    fn abandon(&self, reason: String) {
        tracing::error!(analysis = %self.id, %reason, "History build failed");
        self.failure.lock().get_or_insert(reason);
        self.ss.abandon_build();
    }
}

impl EventRequest for BuildRequest {
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
        if let Err(error) = self.provider.process_event(event) {
            self.abandon(error.to_string());
            return ControlFlow::Break(());
        }
        self.last_timestamp
            .fetch_max(event.timestamp, Ordering::Relaxed);
        self.events.fetch_add(1, Ordering::Relaxed);
        ControlFlow::Continue(())
    }

    fn handle_completed(&self) {
        if let Err(error) = self.provider.wait_for_empty_queue() {
            self.abandon(error.to_string());
            return;
        }
        if let Some(error) = self.provider.failure() {
            self.abandon(error.to_string());
            return;
        }

        let end = self.last_timestamp.load(Ordering::Relaxed);
        if let Err(error) = self.ss.close_history(end) {
            self.abandon(error.to_string());
            return;
        }
        tracing::info!(
            analysis = %self.id,
            events = self.events.load(Ordering::Relaxed),
            end,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Analysis built"
        );
    }

    fn handle_cancelled(&self) {
        // A handler failure already abandoned the build.
        if self.failure.lock().is_none() {
            self.abandon("build cancelled".to_string());
        }
    }
}
