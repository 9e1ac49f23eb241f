//! State intervals.

use crate::{Quark, StateValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An attribute's value over the inclusive time range `[start, end]`.
///
/// Intervals of one attribute are contiguous and never overlap once the
/// history is built. Intervals are immutable once closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateInterval {
    start: i64,
    end: i64,
    attribute: Quark,
    value: StateValue,
}

impl StateInterval {
    /// Create a new interval.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`. Callers validate times before building
    /// intervals; an inverted interval is a bug in the caller.
    pub fn new(start: i64, end: i64, attribute: Quark, value: StateValue) -> Self {
        assert!(
            start <= end,
            "interval start {start} is after its end {end} (attribute {attribute})"
        );
        Self {
            start,
            end,
            attribute,
            value,
        }
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn end(&self) -> i64 {
        self.end
    }

    pub fn attribute(&self) -> Quark {
        self.attribute
    }

    pub fn value(&self) -> &StateValue {
        &self.value
    }

    pub fn into_value(self) -> StateValue {
        self.value
    }

    /// Whether `t` falls within `[start, end]`.
    pub fn intersects(&self, t: i64) -> bool {
        self.start <= t && t <= self.end
    }
}

impl fmt::Display for StateInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] attribute={} value={}",
            self.start, self.end, self.attribute, self.value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intersects_is_inclusive() {
        let interval = StateInterval::new(10, 20, Quark(0), StateValue::Int32(1));
        assert!(interval.intersects(10));
        assert!(interval.intersects(20));
        assert!(!interval.intersects(9));
        assert!(!interval.intersects(21));
    }

    #[test]
    fn test_json_form() {
        let interval = StateInterval::new(10, 20, Quark(3), StateValue::Int64(7));
        let json = serde_json::to_value(&interval).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"start": 10, "end": 20, "attribute": 3, "value": {"Int64": 7}})
        );
    }

    #[test]
    fn test_serde_keeps_every_value_kind() {
        let intervals = vec![
            StateInterval::new(0, 4, Quark(0), StateValue::Null),
            StateInterval::new(0, 4, Quark(1), StateValue::Int32(-3)),
            StateInterval::new(5, 9, Quark(2), StateValue::Int64(1 << 40)),
            StateInterval::new(5, 9, Quark(3), StateValue::Double(0.25)),
            StateInterval::new(5, 9, Quark(4), StateValue::string("running")),
        ];
        let json = serde_json::to_string(&intervals).unwrap();
        let decoded: Vec<StateInterval> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, intervals);
        assert_eq!(decoded[4].value().kind(), crate::ValueKind::String);
    }

    #[test]
    #[should_panic]
    fn test_inverted_interval_panics() {
        let _ = StateInterval::new(5, 4, Quark(0), StateValue::Null);
    }
}
