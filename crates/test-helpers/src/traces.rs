//! Deterministic synthetic traces.

use crate::handlers::{FUNC_ENTRY, FUNC_EXIT, SAMPLE, SCHED_SWITCH, THREAD_EXIT, TICK};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use tracestate_dispatch::Dispatch;
use tracestate_trace::{InMemoryTrace, Trace};
use tracestate_types::{TraceEvent, TraceId};

/// Trace id given to every trace built by [`into_trace`].
pub const SYNTHETIC_TRACE_ID: TraceId = TraceId(1);

const FUNCTIONS: &[&str] = &["main", "poll", "read", "write", "parse", "flush"];

/// `count` tick events, one every `step` time units from 0. Event `i`
/// carries `slot = i % slots`.
pub fn counter_events(count: usize, slots: usize, step: i64) -> Vec<TraceEvent> {
    let slots = slots.max(1);
    (0..count)
        .map(|i| {
            TraceEvent::new(SYNTHETIC_TRACE_ID, i as i64 * step, i as u64, TICK)
                .with_field("slot", (i % slots) as i64)
        })
        .collect()
}

/// Wrap `events` in an in-memory trace running its requests on `dispatch`.
pub fn into_trace<D: Dispatch>(events: Vec<TraceEvent>, dispatch: D) -> Arc<dyn Trace> {
    Arc::new(InMemoryTrace::new(
        SYNTHETIC_TRACE_ID,
        "synthetic",
        events,
        dispatch,
    ))
}

/// A random but reproducible scheduler-like trace.
///
/// Generates context switches, nested function entries and exits, load
/// samples and thread exits for [`ProcessHandler`](crate::ProcessHandler).
/// Consecutive events may share a timestamp. The same seed always yields
/// the same events.
#[derive(Debug, Clone)]
pub struct SyntheticTrace {
    seed: u64,
    events: usize,
    cpus: i64,
    threads: i64,
    max_gap: i64,
    max_depth: usize,
}

impl SyntheticTrace {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            events: 1_000,
            cpus: 4,
            threads: 16,
            max_gap: 3,
            max_depth: 8,
        }
    }

    pub fn with_events(mut self, events: usize) -> Self {
        self.events = events;
        self
    }

    pub fn with_cpus(mut self, cpus: i64) -> Self {
        self.cpus = cpus.max(1);
        self
    }

    pub fn with_threads(mut self, threads: i64) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Largest gap between two consecutive timestamps. Zero makes every
    /// event share one timestamp.
    pub fn with_max_gap(mut self, max_gap: i64) -> Self {
        self.max_gap = max_gap.max(0);
        self
    }

    pub fn generate(&self) -> Vec<TraceEvent> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut depths = vec![0usize; self.threads as usize];
        let mut t = 0i64;
        let mut events = Vec::with_capacity(self.events);

        for rank in 0..self.events as u64 {
            t += rng.gen_range(0..=self.max_gap);
            let tid = rng.gen_range(0..self.threads);
            let depth = &mut depths[tid as usize];
            let roll = rng.gen_range(0..100);

            let event = if roll < 25 {
                TraceEvent::new(SYNTHETIC_TRACE_ID, t, rank, SCHED_SWITCH)
                    .with_field("cpu", rng.gen_range(0..self.cpus))
                    .with_field("next_tid", tid)
                    .with_field("next_comm", format!("worker-{tid}"))
            } else if roll < 55 && *depth < self.max_depth {
                *depth += 1;
                let function = FUNCTIONS[rng.gen_range(0..FUNCTIONS.len())];
                TraceEvent::new(SYNTHETIC_TRACE_ID, t, rank, FUNC_ENTRY)
                    .with_field("tid", tid)
                    .with_field("func", function)
            } else if roll < 85 {
                // Exits on an empty stack are kept; handlers must cope.
                *depth = depth.saturating_sub(1);
                TraceEvent::new(SYNTHETIC_TRACE_ID, t, rank, FUNC_EXIT).with_field("tid", tid)
            } else if roll < 97 {
                TraceEvent::new(SYNTHETIC_TRACE_ID, t, rank, SAMPLE)
                    .with_field("cpu", rng.gen_range(0..self.cpus))
                    .with_field("load", rng.gen_range(0.0..1.0f64))
            } else {
                *depth = 0;
                TraceEvent::new(SYNTHETIC_TRACE_ID, t, rank, THREAD_EXIT).with_field("tid", tid)
            };
            events.push(event);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracestate_dispatch::SyncDispatch;

    #[test]
    fn test_counter_events() {
        let events = counter_events(5, 2, 10);
        let timestamps: Vec<i64> = events.iter().map(|e| e.timestamp).collect();
        assert_eq!(timestamps, vec![0, 10, 20, 30, 40]);
        assert_eq!(events[3].field("slot").and_then(|v| v.as_i64()), Some(1));
    }

    #[test]
    fn test_synthetic_trace_deterministic() {
        let a = SyntheticTrace::new(42).with_events(500).generate();
        let b = SyntheticTrace::new(42).with_events(500).generate();
        assert_eq!(a, b);

        let c = SyntheticTrace::new(43).with_events(500).generate();
        assert_ne!(a, c);
    }

    #[test]
    fn test_synthetic_trace_is_ordered() {
        let events = SyntheticTrace::new(7).with_events(2_000).generate();
        assert_eq!(events.len(), 2_000);
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        // With gaps in 0..=3, some timestamps repeat.
        assert!(events.windows(2).any(|w| w[0].timestamp == w[1].timestamp));
    }

    #[test]
    fn test_into_trace() {
        let trace = into_trace(counter_events(3, 1, 5), SyncDispatch);
        assert_eq!(trace.id(), SYNTHETIC_TRACE_ID);
        assert_eq!(trace.start_time(), 0);
        assert_eq!(trace.end_time(), 10);
        assert_eq!(trace.event_count(), 3);
    }
}
