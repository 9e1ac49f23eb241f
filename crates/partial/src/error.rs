use thiserror::Error;

/// Errors raised when building a partial history. Query-time failures are
/// [`QueryError`](tracestate_backend::QueryError)s.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartialHistoryError {
    #[error("granularity must be positive, got {granularity}")]
    InvalidGranularity { granularity: u64 },

    #[error("provider {provider} is not bound to the scratch state system")]
    ProviderNotBound { provider: String },
}
