//! # In-Memory Trace
//!
//! Events are held sorted by timestamp in a shared slice. A request finds the
//! first event of its range with a binary search and walks forward from
//! there, so replaying a short window of a long trace costs
//! `O(log n + window)`.

use crate::request::RequestState;
use crate::{EventRequest, ExecutionType, RequestHandle, Trace};
use std::sync::Arc;
use tracestate_dispatch::Dispatch;
use tracestate_types::{TraceEvent, TraceId};

/// A trace whose events all live in memory.
pub struct InMemoryTrace<D: Dispatch> {
    id: TraceId,
    name: String,
    start_time: i64,
    events: Arc<[TraceEvent]>,
    dispatch: D,
}

impl<D: Dispatch> std::fmt::Debug for InMemoryTrace<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTrace")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("start_time", &self.start_time)
            .field("events", &self.events.len())
            .finish()
    }
}

impl<D: Dispatch> InMemoryTrace<D> {
    /// Build a trace from `events`, in any order.
    ///
    /// Events are stably sorted by timestamp, tagged with `id` and re-ranked
    /// `0..n`. The trace starts at the first timestamp (0 when empty).
    pub fn new(id: TraceId, name: impl Into<String>, mut events: Vec<TraceEvent>, dispatch: D) -> Self {
        events.sort_by_key(|event| event.timestamp);
        for (rank, event) in events.iter_mut().enumerate() {
            event.trace = id;
            event.rank = rank as u64;
        }
        let start_time = events.first().map_or(0, |event| event.timestamp);
        Self {
            id,
            name: name.into(),
            start_time,
            events: events.into(),
            dispatch,
        }
    }

    /// Move the start of the trace earlier than its first event.
    /// Times after the first event are ignored.
    pub fn with_start_time(mut self, start_time: i64) -> Self {
        let first = self.events.first().map_or(start_time, |event| event.timestamp);
        self.start_time = start_time.min(first);
        self
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn dispatch(&self) -> &D {
        &self.dispatch
    }
}

impl<D: Dispatch> Trace for InMemoryTrace<D> {
    fn id(&self) -> TraceId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn start_time(&self) -> i64 {
        self.start_time
    }

    fn end_time(&self) -> i64 {
        self.events
            .last()
            .map_or(self.start_time, |event| event.timestamp)
    }

    fn event_count(&self) -> u64 {
        self.events.len() as u64
    }

    fn send_request(&self, request: Arc<dyn EventRequest>) -> RequestHandle {
        let (handle, state) = RequestHandle::new();
        let events = self.events.clone();
        let trace = self.id;
        let lane = request.execution_type();
        let job = move || run_request(trace, &events, request.as_ref(), &state);
        match lane {
            ExecutionType::Foreground => self.dispatch.spawn_foreground(job),
            ExecutionType::Background => self.dispatch.spawn_background(job),
        }
        handle
    }
}

fn run_request(trace: TraceId, events: &[TraceEvent], request: &dyn EventRequest, state: &RequestState) {
    let range = request.range();
    let first = events.partition_point(|event| event.timestamp < range.start);
    tracing::debug!(
        %trace,
        start = range.start,
        end = range.end,
        first_rank = first,
        lane = ?request.execution_type(),
        "Running event request"
    );

    if !range.is_empty() {
        for event in events[first..]
            .iter()
            .take_while(|event| event.timestamp <= range.end)
        {
            if state.is_cancelled() || request.handle_data(event).is_break() {
                tracing::debug!(%trace, rank = event.rank, "Event request cancelled");
                request.handle_cancelled();
                state.abort();
                return;
            }
            state.record_delivery();
        }
    }

    request.handle_completed();
    state.complete();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RequestOutcome;
    use parking_lot::Mutex;
    use std::ops::ControlFlow;
    use std::time::Duration;
    use tracestate_dispatch::SyncDispatch;
    use tracestate_dispatch_pooled::{DispatchConfig, PooledDispatch};
    use tracestate_types::TimeRange;

    /// Records the timestamps it sees; stops after `limit` events if set.
    struct Collect {
        range: TimeRange,
        lane: ExecutionType,
        limit: Option<usize>,
        seen: Mutex<Vec<i64>>,
        finished: Mutex<Option<&'static str>>,
    }

    impl Collect {
        fn new(range: TimeRange) -> Arc<Self> {
            Arc::new(Self {
                range,
                lane: ExecutionType::Foreground,
                limit: None,
                seen: Mutex::new(Vec::new()),
                finished: Mutex::new(None),
            })
        }
    }

    impl EventRequest for Collect {
        fn range(&self) -> TimeRange {
            self.range
        }

        fn execution_type(&self) -> ExecutionType {
            self.lane
        }

        fn handle_data(&self, event: &TraceEvent) -> ControlFlow<()> {
            let mut seen = self.seen.lock();
            if self.limit.is_some_and(|limit| seen.len() >= limit) {
                return ControlFlow::Break(());
            }
            seen.push(event.timestamp);
            ControlFlow::Continue(())
        }

        fn handle_completed(&self) {
            *self.finished.lock() = Some("completed");
        }

        fn handle_cancelled(&self) {
            *self.finished.lock() = Some("cancelled");
        }
    }

    fn events(timestamps: &[i64]) -> Vec<TraceEvent> {
        timestamps
            .iter()
            .map(|&t| TraceEvent::new(TraceId(0), t, 0, "tick"))
            .collect()
    }

    #[test]
    fn test_events_are_sorted_and_ranked() {
        let trace = InMemoryTrace::new(TraceId(3), "t", events(&[30, 10, 20]), SyncDispatch);
        let ranks: Vec<_> = trace
            .events()
            .iter()
            .map(|e| (e.timestamp, e.rank, e.trace))
            .collect();
        assert_eq!(
            ranks,
            vec![(10, 0, TraceId(3)), (20, 1, TraceId(3)), (30, 2, TraceId(3))]
        );
        assert_eq!(trace.start_time(), 10);
        assert_eq!(trace.end_time(), 30);
    }

    #[test]
    fn test_range_is_inclusive() {
        let trace = InMemoryTrace::new(TraceId(0), "t", events(&[1, 5, 5, 9, 12]), SyncDispatch);
        let request = Collect::new(TimeRange::new(5, 9));
        let handle = trace.send_request(request.clone());
        assert_eq!(handle.wait_for_completion(), RequestOutcome::Completed);
        assert_eq!(*request.seen.lock(), vec![5, 5, 9]);
        assert_eq!(handle.events_delivered(), 3);
        assert_eq!(*request.finished.lock(), Some("completed"));
    }

    #[test]
    fn test_empty_range_completes_immediately() {
        let trace = InMemoryTrace::new(TraceId(0), "t", events(&[1, 2, 3]), SyncDispatch);
        let request = Collect::new(TimeRange::after(2, 2));
        let handle = trace.send_request(request.clone());
        assert_eq!(handle.wait_for_completion(), RequestOutcome::Completed);
        assert!(request.seen.lock().is_empty());
    }

    #[test]
    fn test_break_cancels_request() {
        let trace = InMemoryTrace::new(TraceId(0), "t", events(&[1, 2, 3, 4]), SyncDispatch);
        let request = Arc::new(Collect {
            limit: Some(2),
            ..Arc::into_inner(Collect::new(TimeRange::ETERNITY)).unwrap()
        });
        let handle = trace.send_request(request.clone());
        assert_eq!(handle.wait_for_completion(), RequestOutcome::Cancelled);
        assert_eq!(*request.seen.lock(), vec![1, 2]);
        assert_eq!(*request.finished.lock(), Some("cancelled"));
    }

    #[test]
    fn test_with_start_time_only_moves_earlier() {
        let trace = InMemoryTrace::new(TraceId(0), "t", events(&[10]), SyncDispatch);
        assert_eq!(trace.with_start_time(0).start_time(), 0);
        let trace = InMemoryTrace::new(TraceId(0), "t", events(&[10]), SyncDispatch);
        assert_eq!(trace.with_start_time(50).start_time(), 10);
        let empty = InMemoryTrace::new(TraceId(0), "t", Vec::new(), SyncDispatch).with_start_time(7);
        assert_eq!((empty.start_time(), empty.end_time()), (7, 7));
    }

    #[test]
    fn test_pooled_background_request() {
        let dispatch = PooledDispatch::new(DispatchConfig::minimal()).unwrap();
        let timestamps: Vec<i64> = (0..1000).collect();
        let trace = InMemoryTrace::new(TraceId(0), "t", events(&timestamps), dispatch);
        let request = Arc::new(Collect {
            lane: ExecutionType::Background,
            ..Arc::into_inner(Collect::new(TimeRange::new(100, 199))).unwrap()
        });
        let handle = trace.send_request(request.clone());
        assert_eq!(
            handle.wait_for_completion_timeout(Duration::from_secs(10)),
            RequestOutcome::Completed
        );
        assert_eq!(request.seen.lock().len(), 100);
    }
}
