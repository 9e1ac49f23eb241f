//! State values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Value held by an attribute during a state interval.
///
/// A closed set of scalar kinds. Comparisons and conversions go through
/// explicit matches on the variant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum StateValue {
    /// No value (the attribute is unset).
    #[default]
    Null,
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(Arc<str>),
}

/// Discriminant of a [`StateValue`], used to check that an attribute keeps a
/// single value kind over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Int32,
    Int64,
    Double,
    String,
}

impl StateValue {
    /// Build a string value.
    pub fn string(value: impl AsRef<str>) -> Self {
        Self::String(Arc::from(value.as_ref()))
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            StateValue::Null => ValueKind::Null,
            StateValue::Int32(_) => ValueKind::Int32,
            StateValue::Int64(_) => ValueKind::Int64,
            StateValue::Double(_) => ValueKind::Double,
            StateValue::String(_) => ValueKind::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            StateValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view of the value. `Int32` values are widened.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StateValue::Int32(v) => Some(i64::from(*v)),
            StateValue::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Null => write!(f, "null"),
            StateValue::Int32(v) => write!(f, "{v}"),
            StateValue::Int64(v) => write!(f, "{v}"),
            StateValue::Double(v) => write!(f, "{v}"),
            StateValue::String(v) => write!(f, "\"{v}\""),
        }
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        StateValue::Int32(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        StateValue::Int64(value)
    }
}

impl From<f64> for StateValue {
    fn from(value: f64) -> Self {
        StateValue::Double(value)
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        StateValue::string(value)
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        StateValue::String(Arc::from(value))
    }
}

impl<T: Into<StateValue>> From<Option<T>> for StateValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(StateValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(StateValue::Null.kind(), ValueKind::Null);
        assert_eq!(StateValue::from(3i32).kind(), ValueKind::Int32);
        assert_eq!(StateValue::from(3i64).kind(), ValueKind::Int64);
        assert_eq!(StateValue::from(1.5).kind(), ValueKind::Double);
        assert_eq!(StateValue::from("run").kind(), ValueKind::String);
    }

    #[test]
    fn test_integer_views() {
        assert_eq!(StateValue::Int32(7).as_i64(), Some(7));
        assert_eq!(StateValue::Int64(-2).as_i64(), Some(-2));
        assert_eq!(StateValue::Int64(-2).as_i32(), None);
        assert_eq!(StateValue::string("x").as_i64(), None);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(StateValue::from(None::<i32>), StateValue::Null);
        assert_eq!(StateValue::from(Some(4i32)), StateValue::Int32(4));
    }

    #[test]
    fn test_display() {
        assert_eq!(StateValue::string("idle").to_string(), "\"idle\"");
        assert_eq!(StateValue::Null.to_string(), "null");
    }
}
