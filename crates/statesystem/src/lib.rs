//! State systems: turning punctual state changes into intervals.
//!
//! A state system tracks the value of every attribute of a traced system
//! (threads, CPUs, call stacks, counters) over time. State providers feed it
//! state changes through the [`StateSystemBuilder`] trait; it turns them into
//! closed [`StateInterval`](tracestate_types::StateInterval)s handed to a
//! [`HistoryBackend`](tracestate_backend::HistoryBackend), and answers point
//! queries by combining the backend with its still-open intervals.
//!
//! # Components
//!
//! - [`AttributeTree`]: path-indexed namespace assigning dense quarks
//! - [`TransientState`]: ongoing (open) value and start time of every attribute
//! - [`StateSystem`]: the full state system, owning both plus a backend

mod attribute_tree;
mod builder;
mod error;
mod state_system;
mod transient;

pub use attribute_tree::AttributeTree;
pub use builder::{StateSystemBuilder, MAX_STACK_DEPTH};
pub use error::StateSystemError;
pub use state_system::StateSystem;
pub use transient::TransientState;
