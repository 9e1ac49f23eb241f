//! Event requests and their handles.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracestate_types::{Latch, LatchState, TimeRange, TraceEvent};

/// Lane a request runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionType {
    /// Full scans: history builds, checkpoint registration.
    Foreground,
    /// Short scans issued on behalf of a query.
    Background,
}

/// A read of a time range of a trace.
///
/// Callbacks run on the dispatch lane, one request at a time per request, so
/// implementations only need interior mutability to share results with the
/// thread that sent them.
pub trait EventRequest: Send + Sync {
    /// Inclusive range of timestamps to deliver. An empty range completes
    /// without delivering anything.
    fn range(&self) -> TimeRange;

    fn execution_type(&self) -> ExecutionType;

    /// Called for each event in range, in order. Returning `Break` stops the
    /// request, which then counts as cancelled.
    fn handle_data(&self, event: &TraceEvent) -> ControlFlow<()>;

    /// Called once after the last event of the range was delivered.
    fn handle_completed(&self) {}

    /// Called once if the request stopped before the end of its range.
    fn handle_cancelled(&self) {}
}

/// How a request ended, as seen by a waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Completed,
    Cancelled,
    /// The wait gave up; the request may still be running.
    TimedOut,
}

#[derive(Debug, Default)]
pub(crate) struct RequestState {
    cancelled: AtomicBool,
    delivered: AtomicU64,
    done: Latch,
}

impl RequestState {
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub(crate) fn record_delivery(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn complete(&self) {
        self.done.release();
    }

    pub(crate) fn abort(&self) {
        self.done.fail();
    }
}

/// Handle on a sent request.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    state: Arc<RequestState>,
}

impl RequestHandle {
    pub(crate) fn new() -> (Self, Arc<RequestState>) {
        let state = Arc::new(RequestState::default());
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }

    /// Ask the request to stop. Takes effect before the next event.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.state.done.state() != LatchState::Pending
    }

    /// Number of events handed to the request so far.
    pub fn events_delivered(&self) -> u64 {
        self.state.delivered.load(Ordering::Relaxed)
    }

    pub fn wait_for_completion(&self) -> RequestOutcome {
        outcome(self.state.done.wait())
    }

    pub fn wait_for_completion_timeout(&self, timeout: Duration) -> RequestOutcome {
        outcome(self.state.done.wait_timeout(timeout))
    }
}

fn outcome(state: LatchState) -> RequestOutcome {
    match state {
        LatchState::Released => RequestOutcome::Completed,
        LatchState::Failed => RequestOutcome::Cancelled,
        LatchState::Pending => RequestOutcome::TimedOut,
    }
}
