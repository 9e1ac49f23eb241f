//! Replay of a bounded window of the trace into the scratch state system.

use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracestate_provider::{ProviderError, StateProvider};
use tracestate_trace::{EventRequest, ExecutionType};
use tracestate_types::{TimeRange, TraceEvent, TraceId};

/// Feeds the events of `(checkpoint, t]` to the private provider.
///
/// Completion implies the provider's queue is drained: `handle_completed`
/// waits for it before the request reports done, so a waiter on the request
/// handle sees every state change the replay induced.
pub(crate) struct ReplayRequest {
    range: TimeRange,
    trace: TraceId,
    provider: Arc<dyn StateProvider>,
    drain_timeout: Option<Duration>,
    events: AtomicU64,
    error: Mutex<Option<ProviderError>>,
}

impl ReplayRequest {
    pub(crate) fn new(
        checkpoint: i64,
        t: i64,
        trace: TraceId,
        provider: Arc<dyn StateProvider>,
        drain_timeout: Option<Duration>,
    ) -> Self {
        Self {
            range: TimeRange::after(checkpoint, t),
            trace,
            provider,
            drain_timeout,
            events: AtomicU64::new(0),
            error: Mutex::new(None),
        }
    }

    /// Events handed to the provider.
    pub(crate) fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    /// First error hit while feeding or draining the provider.
    pub(crate) fn take_error(&self) -> Option<ProviderError> {
        self.error.lock().take()
    }

    fn record_error(&self, error: ProviderError) {
        self.error.lock().get_or_insert(error);
    }
}

impl EventRequest for ReplayRequest {
    fn range(&self) -> TimeRange {
        self.range
    }

    fn execution_type(&self) -> ExecutionType {
        ExecutionType::Background
    }

    fn handle_data(&self, event: &TraceEvent) -> ControlFlow<()> {
        if event.trace != self.trace {
            return ControlFlow::Continue(());
        }
        match self.provider.process_event(event) {
            Ok(()) => {
                self.events.fetch_add(1, Ordering::Relaxed);
                ControlFlow::Continue(())
            }
            Err(error) => {
                self.record_error(error);
                ControlFlow::Break(())
            }
        }
    }

    fn handle_completed(&self) {
        let drained = match self.drain_timeout {
            Some(timeout) => self.provider.wait_for_empty_queue_timeout(timeout),
            None => self.provider.wait_for_empty_queue(),
        };
        if let Err(error) = drained {
            self.record_error(error);
        }
    }

    fn handle_cancelled(&self) {
        // Whatever was queued must still land before the scratch system is
        // reused.
        if let Err(error) = self.provider.wait_for_empty_queue() {
            self.record_error(error);
        }
    }
}
