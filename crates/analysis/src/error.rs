use std::time::Duration;
use thiserror::Error;
use tracestate_partial::PartialHistoryError;
use tracestate_provider::ProviderError;

/// Errors from setting up or building an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("invalid analysis configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Partial(#[from] PartialHistoryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{id}: history build failed: {reason}")]
    BuildFailed { id: String, reason: String },

    #[error("{id}: timed out after {after:?} waiting for the history build")]
    Timeout { id: String, after: Duration },
}
