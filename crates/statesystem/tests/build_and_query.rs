//! Builds a small history through the builder trait and checks every point
//! query against the state changes that produced it.

use std::sync::Arc;
use tracestate_backend_memory::InMemoryBackend;
use tracestate_statesystem::{StateSystem, StateSystemBuilder};
use tracestate_types::StateValue;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_every_timestamp_matches_the_last_change() {
    let ss = StateSystem::new(Arc::new(InMemoryBackend::new("it", 0)));
    let builder: &dyn StateSystemBuilder = &ss;

    // Attribute i changes every (i + 2) time units.
    let quarks: Vec<_> = (0..4)
        .map(|i| {
            builder
                .get_quark_absolute_and_add(&["Counters", &i.to_string()])
                .unwrap()
        })
        .collect();
    for t in 0..=100i64 {
        for (i, quark) in quarks.iter().enumerate() {
            let period = i as i64 + 2;
            if t % period == 0 {
                builder
                    .modify_attribute(t, StateValue::Int64(t / period), *quark)
                    .unwrap();
            }
        }
    }
    builder.close_history(100).unwrap();
    assert!(ss.is_built());

    for t in 0..=100i64 {
        let state = ss.query_full_state(t).unwrap();
        assert_eq!(state.len(), 5);
        for (i, quark) in quarks.iter().enumerate() {
            let period = i as i64 + 2;
            let interval = &state[quark.index()];
            assert_eq!(interval.value(), &StateValue::Int64(t / period), "t={t} i={i}");
            assert!(interval.start() <= t && t <= interval.end());
        }
    }
}
