//! Trace events.

use crate::StateValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of the trace an event belongs to.
///
/// Requests filter delivered events on this so that an experiment mixing
/// several traces only feeds a provider the events of its own trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TraceId(pub u64);

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trace-{}", self.0)
    }
}

/// A discrete, timestamped event read from a trace.
///
/// Event parsing is out of scope: events arrive already decoded into a name
/// and a list of named scalar fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub trace: TraceId,
    pub timestamp: i64,
    /// Position of the event in its trace, starting at 0.
    pub rank: u64,
    pub name: Arc<str>,
    pub fields: Vec<(Arc<str>, StateValue)>,
}

impl TraceEvent {
    pub fn new(trace: TraceId, timestamp: i64, rank: u64, name: impl AsRef<str>) -> Self {
        Self {
            trace,
            timestamp,
            rank,
            name: Arc::from(name.as_ref()),
            fields: Vec::new(),
        }
    }

    /// Add a field to the event (builder style).
    pub fn with_field(mut self, name: impl AsRef<str>, value: impl Into<StateValue>) -> Self {
        self.fields.push((Arc::from(name.as_ref()), value.into()));
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&StateValue> {
        self.fields
            .iter()
            .find(|(field, _)| field.as_ref() == name)
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_lookup() {
        let event = TraceEvent::new(TraceId(1), 42, 0, "sched_switch")
            .with_field("cpu", 2i32)
            .with_field("next_comm", "bash");

        assert_eq!(event.field("cpu"), Some(&StateValue::Int32(2)));
        assert_eq!(event.field("next_comm").and_then(StateValue::as_str), Some("bash"));
        assert!(event.field("prev_comm").is_none());
    }
}
