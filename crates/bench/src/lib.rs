//! Partial versus full state history benchmark.
//!
//! Builds the same synthetic trace into a full and a partial history, then
//! runs the same random full queries against both and reports storage,
//! build time and query latency. Every partial answer is checked against the
//! full one.

use anyhow::{bail, Context};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracestate_analysis::{AnalysisConfig, StateSystemAnalysis};
use tracestate_backend_memory::InMemoryBackend;
use tracestate_dispatch::Dispatch;
use tracestate_dispatch_pooled::{DispatchConfig, PooledDispatch};
use tracestate_metrics::{CountingRecorder, MetricsSnapshot};
use tracestate_partial::PartialHistoryConfig;
use tracestate_provider::EventHandler;
use tracestate_test_helpers::{counter_events, into_trace, CounterHandler, ProcessHandler, SyntheticTrace};
use tracestate_trace::Trace;
use tracing::info;

/// Which synthetic trace to analyse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload {
    /// One counter tick per event over a few slots.
    Counter,
    /// Scheduler-like events with call stacks.
    Process,
}

#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub seed: u64,
    pub events: usize,
    pub workload: Workload,
    pub partial: PartialHistoryConfig,
    pub queries: usize,
    pub dispatch: DispatchConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            events: 200_000,
            workload: Workload::Counter,
            partial: PartialHistoryConfig::default(),
            queries: 1_000,
            dispatch: DispatchConfig::auto(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub seed: u64,
    pub events: u64,
    pub attributes: usize,
    pub granularity: u64,
    pub checkpoints: usize,
    pub full_intervals: usize,
    pub partial_intervals: usize,
    pub full_build_ms: u64,
    pub partial_build_ms: u64,
    pub queries: usize,
    pub full_query_mean_us: f64,
    pub partial_query_mean_us: f64,
    pub mismatches: usize,
    pub metrics: MetricsSnapshot,
}

impl BenchReport {
    /// Stored partial intervals as a fraction of the full history.
    pub fn storage_ratio(&self) -> f64 {
        if self.full_intervals == 0 {
            return 0.0;
        }
        self.partial_intervals as f64 / self.full_intervals as f64
    }

    pub fn print_summary(&self) {
        println!("\n=== State History Benchmark ===");
        println!("Events:             {}", self.events);
        println!("Attributes:         {}", self.attributes);
        println!(
            "Checkpoints:        {} (granularity {})",
            self.checkpoints, self.granularity
        );
        println!(
            "Intervals:          full {} / partial {} ({:.2}%)",
            self.full_intervals,
            self.partial_intervals,
            self.storage_ratio() * 100.0
        );
        println!(
            "Build:              full {} ms / partial {} ms",
            self.full_build_ms, self.partial_build_ms
        );
        println!(
            "Full query (mean):  full {:.1} us / partial {:.1} us over {} queries",
            self.full_query_mean_us, self.partial_query_mean_us, self.queries
        );
        println!("Mismatches:         {}", self.mismatches);
    }
}

struct Built {
    analysis: StateSystemAnalysis,
    inner: Arc<InMemoryBackend>,
    build_time: Duration,
}

fn handler(workload: Workload) -> Box<dyn EventHandler> {
    match workload {
        Workload::Counter => Box::new(CounterHandler),
        Workload::Process => Box::new(ProcessHandler),
    }
}

fn build(
    trace: &Arc<dyn Trace>,
    config: AnalysisConfig,
    workload: Workload,
    metrics: Arc<CountingRecorder>,
) -> anyhow::Result<Built> {
    let id = config.id.clone();
    let inner = Arc::new(InMemoryBackend::new(id.clone(), trace.start_time()));
    let started = Instant::now();
    let analysis = StateSystemAnalysis::builder()
        .config(config)
        .trace(trace.clone())
        .handler(handler(workload))
        .inner_backend(inner.clone())
        .metrics(metrics)
        .build()
        .with_context(|| format!("failed to set up analysis {id}"))?;
    analysis
        .wait_until_built()
        .with_context(|| format!("failed to build analysis {id}"))?;
    Ok(Built {
        analysis,
        inner,
        build_time: started.elapsed(),
    })
}

/// Run the benchmark described by `config`.
pub fn run(config: &BenchConfig) -> anyhow::Result<BenchReport> {
    let dispatch = PooledDispatch::new(config.dispatch.clone())?;
    let events = match config.workload {
        Workload::Counter => counter_events(config.events, 8, 10),
        Workload::Process => SyntheticTrace::new(config.seed)
            .with_events(config.events)
            .generate(),
    };
    let trace = into_trace(events, dispatch.clone());
    info!(
        events = trace.event_count(),
        start = trace.start_time(),
        end = trace.end_time(),
        workload = ?config.workload,
        "Trace generated"
    );

    let metrics = Arc::new(CountingRecorder::new());
    let full = build(&trace, AnalysisConfig::full("full"), config.workload, metrics.clone())?;
    let partial = build(
        &trace,
        AnalysisConfig::partial("partial", config.partial.clone()),
        config.workload,
        metrics.clone(),
    )?;
    let Some(partial_backend) = partial.analysis.partial_backend() else {
        bail!("partial analysis has no partial backend");
    };

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let times: Vec<i64> = (0..config.queries)
        .map(|_| rng.gen_range(trace.start_time()..=trace.end_time()))
        .collect();

    // The full history answers from storage alone, so its queries can run
    // in parallel on the background lane. Partial queries replay on that
    // lane themselves and run from this thread.
    let full_ss = full.analysis.state_system().clone();
    let started = Instant::now();
    let expected = dispatch.map_background(&times, |&t| full_ss.query_full_state(t));
    let full_elapsed = started.elapsed();

    let partial_ss = partial.analysis.state_system();
    let mut mismatches = 0;
    let started = Instant::now();
    for (&t, expected) in times.iter().zip(&expected) {
        let actual = partial_ss
            .query_full_state(t)
            .with_context(|| format!("partial query at {t} failed"))?;
        let expected = expected
            .as_ref()
            .map_err(|error| anyhow::anyhow!("full query at {t} failed: {error}"))?;
        let same = expected.len() == actual.len()
            && expected
                .iter()
                .zip(&actual)
                .all(|(e, a)| e.value() == a.value() && e.start() == a.start());
        if !same {
            tracing::warn!(t, "Partial answer differs from full history");
            mismatches += 1;
        }
    }
    let partial_elapsed = started.elapsed();

    let mean_us = |elapsed: Duration| {
        if times.is_empty() {
            0.0
        } else {
            elapsed.as_secs_f64() * 1e6 / times.len() as f64
        }
    };
    let report = BenchReport {
        seed: config.seed,
        events: trace.event_count(),
        attributes: full_ss.attribute_tree().len(),
        granularity: partial_backend.granularity(),
        checkpoints: partial_backend.checkpoints().len(),
        full_intervals: full.inner.interval_count(),
        partial_intervals: partial.inner.interval_count(),
        full_build_ms: full.build_time.as_millis() as u64,
        partial_build_ms: partial.build_time.as_millis() as u64,
        queries: times.len(),
        full_query_mean_us: mean_us(full_elapsed),
        partial_query_mean_us: mean_us(partial_elapsed),
        mismatches,
        metrics: metrics.snapshot(),
    };

    partial.analysis.dispose();
    full.analysis.dispose();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(workload: Workload) -> BenchConfig {
        BenchConfig {
            seed: 3,
            events: 2_000,
            workload,
            partial: PartialHistoryConfig::with_granularity(100),
            queries: 50,
            dispatch: DispatchConfig::minimal(),
        }
    }

    #[test]
    fn test_counter_bench() {
        let report = run(&small(Workload::Counter)).unwrap();
        assert_eq!(report.events, 2_000);
        assert_eq!(report.checkpoints, 21);
        assert_eq!(report.mismatches, 0);
        assert!(report.partial_intervals < report.full_intervals);
        assert_eq!(report.metrics.full_queries, 50);
    }

    #[test]
    fn test_process_bench() {
        let report = run(&small(Workload::Process)).unwrap();
        assert_eq!(report.mismatches, 0);
        assert!(report.storage_ratio() < 1.0);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["queries"], 50);
    }
}
