//! State system analyses.
//!
//! A [`StateSystemAnalysis`] ties together the pieces needed to turn a trace
//! into a queryable state history:
//!
//! - a [`ThreadedStateProvider`](tracestate_provider::ThreadedStateProvider)
//!   running the analysis' event handler
//! - the history backend, either a full one or a
//!   [`PartialHistoryBackend`](tracestate_partial::PartialHistoryBackend)
//!   wrapped around it, chosen by [`BackendKind`]
//! - the [`StateSystem`](tracestate_statesystem::StateSystem) clients query
//! - the build request reading the whole trace on the foreground lane
//!
//! # Example
//!
//! ```rust
//! use tracestate_analysis::{AnalysisConfig, StateSystemAnalysis};
//! use tracestate_dispatch::SyncDispatch;
//! use tracestate_partial::PartialHistoryConfig;
//! use tracestate_test_helpers::{counter_events, into_trace, CounterHandler};
//!
//! let analysis = StateSystemAnalysis::builder()
//!     .config(AnalysisConfig::partial("counters", PartialHistoryConfig::with_granularity(100)))
//!     .trace(into_trace(counter_events(1_000, 4, 10), SyncDispatch))
//!     .handler(Box::new(CounterHandler))
//!     .build()
//!     .unwrap();
//! analysis.wait_until_built().unwrap();
//!
//! let state = analysis.state_system().query_full_state(5_000).unwrap();
//! assert_eq!(state.len(), 7);
//! ```

mod analysis;
mod build;
mod config;
mod error;

pub use analysis::{StateSystemAnalysis, StateSystemAnalysisBuilder};
pub use config::{AnalysisConfig, BackendKind};
pub use error::AnalysisError;
