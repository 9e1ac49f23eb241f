//! State providers.
//!
//! A state provider turns trace events into state changes. The analysis
//! specific part is an [`EventHandler`]; the [`StateProvider`] around it owns
//! the plumbing: which state system the changes go to, and the queue that
//! decouples the thread reading the trace from the thread applying changes.
//!
//! [`ThreadedStateProvider`] is the standard implementation: a bounded queue
//! drained by one worker thread, so a handler sees events strictly in the
//! order they were read.

mod error;
mod threaded;

pub use error::ProviderError;
pub use threaded::{ThreadedStateProvider, DEFAULT_QUEUE_SIZE};

use std::sync::Arc;
use std::time::Duration;
use tracestate_statesystem::{StateSystemBuilder, StateSystemError};
use tracestate_trace::Trace;
use tracestate_types::TraceEvent;

/// Analysis logic: how one event changes the state.
pub trait EventHandler: Send + 'static {
    fn handle_event(
        &mut self,
        ss: &dyn StateSystemBuilder,
        event: &TraceEvent,
    ) -> Result<(), StateSystemError>;

    /// A handler configured like this one, for another state system.
    fn boxed_clone(&self) -> Box<dyn EventHandler>;
}

/// Feeds the events of a trace into a target state system.
pub trait StateProvider: Send + Sync {
    /// Identifier used in logs and errors.
    fn id(&self) -> &str;

    fn trace(&self) -> &Arc<dyn Trace>;

    /// Time of the earliest state the provider can produce.
    fn start_time(&self) -> i64;

    /// Bind the provider to the state system it writes to. Only once.
    fn assign_target_state_system(
        &self,
        ss: Arc<dyn StateSystemBuilder>,
    ) -> Result<(), ProviderError>;

    fn assigned_state_system(&self) -> Option<Arc<dyn StateSystemBuilder>>;

    /// Queue `event` for processing. May block while the queue is full.
    fn process_event(&self, event: &TraceEvent) -> Result<(), ProviderError>;

    /// Block until every event queued so far has been processed.
    fn wait_for_empty_queue(&self) -> Result<(), ProviderError>;

    /// Like [`wait_for_empty_queue`](Self::wait_for_empty_queue), giving up
    /// with [`ProviderError::Timeout`] after `timeout`.
    fn wait_for_empty_queue_timeout(&self, timeout: Duration) -> Result<(), ProviderError>;

    /// The error that stopped event processing, if any.
    fn failure(&self) -> Option<ProviderError>;

    /// A fresh, unassigned provider running the same analysis on the same
    /// trace.
    fn new_instance(&self) -> Arc<dyn StateProvider>;

    /// Stop the worker. Events queued afterwards are rejected.
    fn dispose(&self);
}

/// Whether `provider` writes to exactly `ss`.
pub fn is_bound_to(provider: &dyn StateProvider, ss: &Arc<dyn StateSystemBuilder>) -> bool {
    provider
        .assigned_state_system()
        .is_some_and(|assigned| std::ptr::addr_eq(Arc::as_ptr(&assigned), Arc::as_ptr(ss)))
}
