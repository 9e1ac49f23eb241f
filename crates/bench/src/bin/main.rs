//! State history benchmark CLI
//!
//! Build a synthetic trace into a full and a partial history and compare
//! them.
//!
//! # Example
//!
//! ```bash
//! # 200 000 counter events, checkpoints every 50 000 events
//! tracestate-bench --events 200000 --granularity 50000
//!
//! # Scheduler-like trace, machine-readable report
//! tracestate-bench --workload process --seed 7 --queries 5000 --json
//! ```

use clap::{Parser, ValueEnum};
use std::time::Duration;
use tracestate_bench::{run, BenchConfig, Workload};
use tracestate_dispatch_pooled::DispatchConfig;
use tracestate_partial::{PartialHistoryConfig, DEFAULT_GRANULARITY};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WorkloadArg {
    Counter,
    Process,
}

impl From<WorkloadArg> for Workload {
    fn from(arg: WorkloadArg) -> Self {
        match arg {
            WorkloadArg::Counter => Workload::Counter,
            WorkloadArg::Process => Workload::Process,
        }
    }
}

/// State history benchmark
///
/// Compares storage, build time and full query latency of a partial
/// history against a full one on the same trace.
#[derive(Parser, Debug)]
#[command(name = "tracestate-bench")]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of events in the synthetic trace
    #[arg(short = 'e', long, default_value = "200000")]
    events: usize,

    /// Kind of synthetic trace
    #[arg(short = 'w', long, value_enum, default_value = "counter")]
    workload: WorkloadArg,

    /// Events between checkpoints of the partial history
    #[arg(short = 'g', long, default_value_t = DEFAULT_GRANULARITY)]
    granularity: u64,

    /// Number of random full queries
    #[arg(short = 'q', long, default_value = "1000")]
    queries: usize,

    /// Random seed for the trace and the query times. When omitted, a random seed is used.
    #[arg(long)]
    seed: Option<u64>,

    /// Foreground (build) threads. Defaults to a split of the available cores.
    #[arg(long)]
    foreground_threads: Option<usize>,

    /// Background (replay) threads. Defaults to a split of the available cores.
    #[arg(long)]
    background_threads: Option<usize>,

    /// Give up on a single replay after this many milliseconds
    #[arg(long)]
    replay_timeout_ms: Option<u64>,

    /// Print the report as JSON instead of a summary
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,tracestate_bench=info")),
        )
        .init();

    let args = Args::parse();
    let seed = args.seed.unwrap_or_else(rand::random);

    let auto = DispatchConfig::auto();
    let dispatch = DispatchConfig::builder()
        .foreground_threads(args.foreground_threads.unwrap_or(auto.foreground_threads))
        .background_threads(args.background_threads.unwrap_or(auto.background_threads))
        .build()?;

    let config = BenchConfig {
        seed,
        events: args.events,
        workload: args.workload.into(),
        partial: PartialHistoryConfig {
            granularity: args.granularity,
            replay_timeout: args.replay_timeout_ms.map(Duration::from_millis),
            ..PartialHistoryConfig::default()
        },
        queries: args.queries,
        dispatch,
    };
    config.partial.validate()?;

    info!(
        seed,
        events = config.events,
        workload = ?config.workload,
        granularity = config.partial.granularity,
        queries = config.queries,
        foreground_threads = config.dispatch.foreground_threads,
        background_threads = config.dispatch.background_threads,
        "Starting benchmark"
    );

    let report = run(&config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report.print_summary();
    }

    if report.mismatches > 0 {
        anyhow::bail!("{} partial answers differ from the full history", report.mismatches);
    }
    Ok(())
}
