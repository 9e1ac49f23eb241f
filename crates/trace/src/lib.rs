//! Event sources and the request protocol used to read them.
//!
//! Analyses never iterate a trace directly. They describe what they want as
//! an [`EventRequest`] (a time range plus callbacks) and send it to a
//! [`Trace`], which delivers the matching events in timestamp order on a
//! dispatch lane and hands back a [`RequestHandle`] to wait on or cancel.

mod memory;
mod request;

pub use memory::InMemoryTrace;
pub use request::{EventRequest, ExecutionType, RequestHandle, RequestOutcome};

use std::sync::Arc;
use tracestate_types::TraceId;

/// A source of timestamp-ordered events.
pub trait Trace: Send + Sync {
    fn id(&self) -> TraceId;

    fn name(&self) -> &str;

    /// Time the trace starts at. No event precedes it.
    fn start_time(&self) -> i64;

    /// Timestamp of the last event, or the start time for an empty trace.
    fn end_time(&self) -> i64;

    fn event_count(&self) -> u64;

    /// Start delivering the events of `request.range()` to `request`.
    ///
    /// Returns immediately (unless the trace runs requests inline); use the
    /// handle to wait for the outcome.
    fn send_request(&self, request: Arc<dyn EventRequest>) -> RequestHandle;
}
