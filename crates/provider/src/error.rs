use std::time::Duration;
use thiserror::Error;
use tracestate_statesystem::StateSystemError;

/// Errors raised by state providers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("provider {provider} has no target state system")]
    NotAssigned { provider: String },

    #[error("provider {provider} is already assigned to a state system")]
    AlreadyAssigned { provider: String },

    #[error("provider {provider} failed on event {rank}: {source}")]
    Handler {
        provider: String,
        rank: u64,
        #[source]
        source: StateSystemError,
    },

    #[error("provider {provider} has been disposed")]
    Disposed { provider: String },

    #[error("provider {provider} did not drain its queue within {after:?}")]
    Timeout { provider: String, after: Duration },
}
