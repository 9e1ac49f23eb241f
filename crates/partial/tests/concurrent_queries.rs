//! Queries racing the history build and each other on pooled request lanes.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;
use tracestate_backend::{HistoryBackend, QueryError};
use tracestate_backend_memory::InMemoryBackend;
use tracestate_dispatch_pooled::{DispatchConfig, PooledDispatch};
use tracestate_metrics::CountingRecorder;
use tracestate_partial::{PartialHistoryBackend, PartialHistoryConfig, ScratchStateSystem};
use tracestate_provider::{StateProvider, ThreadedStateProvider};
use tracestate_statesystem::{StateSystem, StateSystemBuilder};
use tracestate_test_helpers::{counter_events, into_trace, CounterHandler};
use tracestate_trace::{EventRequest, ExecutionType, RequestOutcome, Trace};
use tracestate_types::{StateValue, TimeRange, TraceEvent};
use tracing_test::traced_test;

const EVENTS: usize = 5_000;
const STEP: i64 = 2;

/// Feeds the whole trace to a provider and closes the history.
struct BuildRequest {
    provider: ThreadedStateProvider,
    ss: Arc<StateSystem>,
    end: i64,
}

impl EventRequest for BuildRequest {
    fn range(&self) -> TimeRange {
        TimeRange::ETERNITY
    }

    fn execution_type(&self) -> ExecutionType {
        ExecutionType::Foreground
    }

    fn handle_data(&self, event: &TraceEvent) -> ControlFlow<()> {
        match self.provider.process_event(event) {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        }
    }

    fn handle_completed(&self) {
        self.provider.wait_for_empty_queue().unwrap();
        self.ss.close_history(self.end).unwrap();
    }
}

fn pooled() -> PooledDispatch {
    let config = DispatchConfig::builder()
        .foreground_threads(2)
        .background_threads(2)
        .build()
        .unwrap();
    PooledDispatch::new(config).unwrap()
}

#[traced_test]
#[test]
fn test_queries_serialize_on_scratch_system() {
    let trace = into_trace(counter_events(EVENTS, 3, STEP), pooled());
    let metrics = Arc::new(CountingRecorder::new());

    let replay: Arc<dyn StateProvider> = Arc::new(ThreadedStateProvider::with_default_queue(
        "replay",
        trace.clone(),
        Box::new(CounterHandler),
    ));
    let scratch = Arc::new(ScratchStateSystem::new("counter", 0));
    replay.assign_target_state_system(scratch.clone()).unwrap();
    let partial = Arc::new(
        PartialHistoryBackend::new(
            replay,
            scratch.clone(),
            Arc::new(InMemoryBackend::new("counter", 0)),
            PartialHistoryConfig::with_granularity(250),
            metrics.clone(),
        )
        .unwrap(),
    );
    let ss = Arc::new(StateSystem::new(partial.clone()));
    scratch.assign_upstream(&ss);

    let provider = ThreadedStateProvider::with_default_queue("build", trace.clone(), Box::new(CounterHandler));
    provider.assign_target_state_system(ss.clone()).unwrap();
    let end = trace.end_time();
    let build = trace.send_request(Arc::new(BuildRequest {
        provider,
        ss: ss.clone(),
        end,
    }));

    // Started before the build is done: queries wait for it.
    let queriers: Vec<_> = (0..8i64)
        .map(|i| {
            let partial = partial.clone();
            thread::spawn(move || {
                for k in 0..40i64 {
                    let t = (i * 37 + k * 1_009) % (end + 1);
                    let state = partial.full_query(t).unwrap();
                    // Attribute 1 is counters/total.
                    assert_eq!(state[1].value(), &StateValue::Int64(t / STEP + 1), "t={t}");
                    assert_eq!(state[1].end(), t);
                }
            })
        })
        .collect();
    for querier in queriers {
        querier.join().unwrap();
    }

    assert_eq!(build.wait_for_completion(), RequestOutcome::Completed);
    assert!(ss.is_built());
    assert_eq!(partial.scratch().max_concurrent_holders(), 1);
    assert_eq!(partial.checkpoints().len(), EVENTS / 250 + 1);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.full_queries, 8 * 40);
    assert_eq!(snapshot.replays, 8 * 40);
}

#[traced_test]
#[test]
fn test_query_on_abandoned_build() {
    let trace = into_trace(counter_events(100, 1, 1), pooled());
    let replay: Arc<dyn StateProvider> = Arc::new(ThreadedStateProvider::with_default_queue(
        "replay",
        trace.clone(),
        Box::new(CounterHandler),
    ));
    let scratch = Arc::new(ScratchStateSystem::new("counter", 0));
    replay.assign_target_state_system(scratch.clone()).unwrap();
    let partial = Arc::new(
        PartialHistoryBackend::new(
            replay,
            scratch.clone(),
            Arc::new(InMemoryBackend::new("counter", 0)),
            PartialHistoryConfig::with_granularity(10),
            tracestate_metrics::noop(),
        )
        .unwrap(),
    );
    let ss = Arc::new(StateSystem::new(partial.clone()));
    scratch.assign_upstream(&ss);

    let waiter = {
        let partial = partial.clone();
        thread::spawn(move || partial.full_query(50))
    };
    ss.abandon_build();
    assert!(matches!(
        waiter.join().unwrap(),
        Err(QueryError::BuildAbandoned { .. })
    ));
}
