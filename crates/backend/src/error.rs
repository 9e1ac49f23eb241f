//! Backend error types.

use std::time::Duration;
use thiserror::Error;
use tracestate_types::Quark;

/// A time falls outside the window a history covers.
///
/// Always surfaced to the caller; backends never clamp.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeRangeError {
    /// A query or insertion time lies outside `[start, end]`.
    #[error("{ssid}: time {time} is outside of [{start}, {end}]")]
    OutOfRange {
        /// State system identifier.
        ssid: String,
        /// Offending time.
        time: i64,
        /// History start time.
        start: i64,
        /// History end time when the error was raised.
        end: i64,
    },

    /// An interval whose start comes after its end.
    #[error("{ssid}: interval start {start} is after its end {end}")]
    InvertedInterval {
        /// State system identifier.
        ssid: String,
        /// Interval start.
        start: i64,
        /// Interval end.
        end: i64,
    },
}

/// Errors returned by history queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// The query time is outside the history.
    #[error(transparent)]
    TimeRange(#[from] TimeRangeError),

    /// The backend does not offer this kind of query. A design contract, not
    /// a transient failure.
    #[error("{ssid}: {operation} is not supported by this backend")]
    Unsupported {
        /// State system identifier.
        ssid: String,
        /// Name of the refused operation.
        operation: &'static str,
    },

    /// The attribute does not exist in this history.
    #[error("attribute {0} not found")]
    AttributeNotFound(Quark),

    /// The history was disposed.
    #[error("state history {0} has been disposed")]
    Disposed(String),

    /// Checkpoint registration did not complete, the partial history cannot
    /// answer anything.
    #[error("{ssid}: checkpoints are unavailable, registration did not complete")]
    CheckpointsUnavailable {
        /// State system identifier.
        ssid: String,
    },

    /// The state system owning the history stopped building before it was
    /// complete, so the history will never cover the requested time.
    #[error("{ssid}: the history build was abandoned")]
    BuildAbandoned {
        /// State system identifier.
        ssid: String,
    },

    /// Rebuilding the state between a checkpoint and the query time failed.
    #[error("{ssid}: replay up to {time} failed: {reason}")]
    ReplayFailed {
        /// State system identifier.
        ssid: String,
        /// Query time.
        time: i64,
        /// What went wrong.
        reason: String,
    },

    /// A bounded wait elapsed.
    #[error("timed out after {after:?} waiting for {waiting_for}")]
    Timeout {
        /// What the query was waiting for.
        waiting_for: &'static str,
        /// The configured bound.
        after: Duration,
    },

    /// The backend has no interval for an attribute at a time it covers.
    #[error("no interval stored for attribute {attribute} at time {time}")]
    IncompleteState {
        /// The uncovered attribute.
        attribute: Quark,
        /// Query time.
        time: i64,
    },
}
