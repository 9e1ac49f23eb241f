//! State system error types.

use thiserror::Error;
use tracestate_backend::TimeRangeError;
use tracestate_types::{Quark, ValueKind};

/// Errors raised while building or reading a state system.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateSystemError {
    #[error("attribute {path} not found")]
    AttributeNotFound { path: String },

    #[error("quark {0} is not part of the attribute tree")]
    QuarkOutOfRange(Quark),

    #[error("attribute tree is read-only here, cannot add {path}")]
    ReadOnlyAttributeTree { path: String },

    #[error("{ssid}: attribute {attribute} holds {expected:?} values, got {found:?}")]
    StateValueType {
        ssid: String,
        attribute: Quark,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("stack attribute {attribute} reached the maximum depth")]
    StackOverflow { attribute: Quark },

    #[error("stack attribute {attribute} has no sub-attribute for depth {depth}")]
    CorruptStack { attribute: Quark, depth: i32 },

    #[error(transparent)]
    TimeRange(#[from] TimeRangeError),

    #[error("state system {0} has been disposed")]
    Disposed(String),
}
