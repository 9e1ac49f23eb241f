//! Test helpers for the trace state crates.
//!
//! Provides deterministic synthetic traces, the event handlers that turn them
//! into state, and a dispatch whose work only runs when the test says so.
//!
//! # Example
//!
//! ```rust
//! use tracestate_dispatch::SyncDispatch;
//! use tracestate_test_helpers::{counter_events, into_trace, CounterHandler};
//! use tracestate_provider::{StateProvider, ThreadedStateProvider};
//! use tracestate_trace::Trace;
//!
//! // 100 events, one every 10 time units, spread over 4 slots
//! let trace = into_trace(counter_events(100, 4, 10), SyncDispatch);
//! assert_eq!(trace.event_count(), 100);
//!
//! let provider = ThreadedStateProvider::with_default_queue(
//!     "counter",
//!     trace,
//!     Box::new(CounterHandler),
//! );
//! assert!(provider.assigned_state_system().is_none());
//! ```

pub mod handlers;
mod manual;
pub mod traces;

pub use handlers::{CounterHandler, ProcessHandler};
pub use manual::ManualDispatch;
pub use traces::{counter_events, into_trace, SyntheticTrace, SYNTHETIC_TRACE_ID};
