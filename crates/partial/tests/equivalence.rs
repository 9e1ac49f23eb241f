//! A partial history answers full queries exactly like a full one, on a
//! random trace with nested call stacks and shared timestamps.

use std::sync::Arc;
use tracestate_backend_memory::InMemoryBackend;
use tracestate_dispatch::SyncDispatch;
use tracestate_partial::{PartialHistoryBackend, PartialHistoryConfig, ScratchStateSystem};
use tracestate_provider::{EventHandler, StateProvider, ThreadedStateProvider};
use tracestate_statesystem::{StateSystem, StateSystemBuilder};
use tracestate_test_helpers::{into_trace, ProcessHandler, SyntheticTrace};
use tracestate_trace::Trace;
use tracestate_types::TraceEvent;

fn build(ss: &Arc<StateSystem>, trace: &Arc<dyn Trace>, events: &[TraceEvent]) {
    let builder = ThreadedStateProvider::with_default_queue("build", trace.clone(), Box::new(ProcessHandler));
    builder.assign_target_state_system(ss.clone()).unwrap();
    for event in events {
        builder.process_event(event).unwrap();
    }
    builder.wait_for_empty_queue().unwrap();
    assert_eq!(builder.failure(), None);
    ss.close_history(trace.end_time()).unwrap();
}

fn partial_system(
    trace: &Arc<dyn Trace>,
    granularity: u64,
    inner: Arc<InMemoryBackend>,
) -> (Arc<StateSystem>, Arc<PartialHistoryBackend>) {
    let handler: Box<dyn EventHandler> = Box::new(ProcessHandler);
    let replay: Arc<dyn StateProvider> = Arc::new(ThreadedStateProvider::with_default_queue(
        "replay",
        trace.clone(),
        handler,
    ));
    let scratch = Arc::new(ScratchStateSystem::new("process", trace.start_time()));
    replay.assign_target_state_system(scratch.clone()).unwrap();
    let partial = Arc::new(
        PartialHistoryBackend::new(
            replay,
            scratch.clone(),
            inner,
            PartialHistoryConfig::with_granularity(granularity),
            tracestate_metrics::noop(),
        )
        .unwrap(),
    );
    let ss = Arc::new(StateSystem::new(partial.clone()));
    scratch.assign_upstream(&ss);
    (ss, partial)
}

#[test]
fn test_partial_matches_full_history() {
    let events = SyntheticTrace::new(42).with_events(3_000).generate();
    let trace = into_trace(events.clone(), SyncDispatch);

    let start = trace.start_time();
    let full_backend = Arc::new(InMemoryBackend::new("process", start));
    let full = Arc::new(StateSystem::new(full_backend.clone()));
    build(&full, &trace, &events);

    let inner = Arc::new(InMemoryBackend::new("process", start));
    let (partial_ss, partial) = partial_system(&trace, 100, inner.clone());
    build(&partial_ss, &trace, &events);

    assert_eq!(full.attribute_count(), partial_ss.attribute_count());
    assert!(inner.interval_count() < full_backend.interval_count());
    assert!(partial.checkpoints().len() > 20);

    for t in start..=trace.end_time() {
        let expected = full.query_full_state(t).unwrap();
        let actual = partial_ss.query_full_state(t).unwrap();
        assert_eq!(expected.len(), actual.len(), "t={t}");
        for (e, a) in expected.iter().zip(&actual) {
            let path = full.full_attribute_path(e.attribute());
            assert_eq!(e.attribute(), a.attribute(), "t={t}");
            assert_eq!(e.value(), a.value(), "t={t} attribute={path:?}");
            assert_eq!(e.start(), a.start(), "t={t} attribute={path:?}");
            assert_eq!(a.end(), t);
        }
    }
}

#[test]
fn test_granularity_one_stores_more_than_large_granularity() {
    let events = SyntheticTrace::new(7).with_events(1_000).generate();
    let trace = into_trace(events.clone(), SyncDispatch);

    let start = trace.start_time();
    let dense = Arc::new(InMemoryBackend::new("process", start));
    let (dense_ss, dense_partial) = partial_system(&trace, 1, dense.clone());
    build(&dense_ss, &trace, &events);

    let sparse = Arc::new(InMemoryBackend::new("process", start));
    let (sparse_ss, _) = partial_system(&trace, 500, sparse.clone());
    build(&sparse_ss, &trace, &events);

    assert!(dense.interval_count() > sparse.interval_count());
    // The seed plus one checkpoint per later distinct timestamp.
    let mut timestamps: Vec<i64> = events.iter().map(|event| event.timestamp).collect();
    timestamps.dedup();
    assert_eq!(dense_partial.checkpoints().len(), timestamps.len());
    assert_eq!(dense_ss.current_end_time(), sparse_ss.current_end_time());
}
