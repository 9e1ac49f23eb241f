//! The write-side interface state providers use.

use crate::StateSystemError;
use tracestate_types::{Quark, StateValue, ValueKind};

/// Deepest a stack attribute may grow through
/// [`push_attribute`](StateSystemBuilder::push_attribute).
pub const MAX_STACK_DEPTH: i32 = 100_000;

/// Write access to a state system, as seen by a state provider.
///
/// Object safe: providers receive a `&dyn StateSystemBuilder` so the same
/// event handler can feed the full state system during the build and the
/// scratch state system of a partial history during a replay.
pub trait StateSystemBuilder: Send + Sync {
    fn ssid(&self) -> &str;

    fn start_time(&self) -> i64;

    /// Number of attributes known to the state system.
    fn attribute_count(&self) -> usize;

    fn get_quark_absolute(&self, path: &[&str]) -> Result<Quark, StateSystemError>;

    fn get_quark_relative(&self, start: Quark, path: &[&str]) -> Result<Quark, StateSystemError>;

    /// Like [`get_quark_absolute`](Self::get_quark_absolute), creating the
    /// attribute if it does not exist yet.
    fn get_quark_absolute_and_add(&self, path: &[&str]) -> Result<Quark, StateSystemError>;

    fn get_quark_relative_and_add(
        &self,
        start: Quark,
        path: &[&str],
    ) -> Result<Quark, StateSystemError>;

    /// Direct children of `quark`, or all descendants if `recursive`.
    fn sub_attributes(&self, quark: Quark, recursive: bool) -> Result<Vec<Quark>, StateSystemError>;

    /// Set `quark` to `value` from time `t` on.
    fn modify_attribute(&self, t: i64, value: StateValue, quark: Quark)
        -> Result<(), StateSystemError>;

    fn query_ongoing(&self, quark: Quark) -> Result<StateValue, StateSystemError>;

    fn ongoing_start_time(&self, quark: Quark) -> Result<i64, StateSystemError>;

    /// Overwrite the ongoing value without creating an interval boundary.
    fn update_ongoing_state(&self, value: StateValue, quark: Quark)
        -> Result<(), StateSystemError>;

    /// Close every open interval at `end_time` and mark the history built.
    fn close_history(&self, end_time: i64) -> Result<(), StateSystemError>;

    /// Push `value` on the stack rooted at `quark`.
    ///
    /// The stack attribute holds the depth as an `Int32`; element `n` lives
    /// in the sub-attribute named `n`.
    fn push_attribute(
        &self,
        t: i64,
        value: StateValue,
        quark: Quark,
    ) -> Result<(), StateSystemError> {
        let depth = match self.query_ongoing(quark)? {
            StateValue::Null => 0,
            StateValue::Int32(depth) => depth,
            other => {
                return Err(StateSystemError::StateValueType {
                    ssid: self.ssid().to_string(),
                    attribute: quark,
                    expected: ValueKind::Int32,
                    found: other.kind(),
                })
            }
        };
        if depth >= MAX_STACK_DEPTH {
            return Err(StateSystemError::StackOverflow { attribute: quark });
        }

        let depth = depth + 1;
        let name = depth.to_string();
        let element = self.get_quark_relative_and_add(quark, &[&name])?;
        self.modify_attribute(t, StateValue::Int32(depth), quark)?;
        self.modify_attribute(t, value, element)
    }

    /// Pop the top of the stack rooted at `quark`, returning it. Popping an
    /// empty stack returns `None` and changes nothing.
    fn pop_attribute(&self, t: i64, quark: Quark) -> Result<Option<StateValue>, StateSystemError> {
        let depth = match self.query_ongoing(quark)? {
            StateValue::Null => return Ok(None),
            StateValue::Int32(depth) if depth > 0 => depth,
            StateValue::Int32(depth) => {
                return Err(StateSystemError::CorruptStack {
                    attribute: quark,
                    depth,
                })
            }
            other => {
                return Err(StateSystemError::StateValueType {
                    ssid: self.ssid().to_string(),
                    attribute: quark,
                    expected: ValueKind::Int32,
                    found: other.kind(),
                })
            }
        };

        let name = depth.to_string();
        let element = self
            .get_quark_relative(quark, &[&name])
            .map_err(|_| StateSystemError::CorruptStack {
                attribute: quark,
                depth,
            })?;
        let popped = self.query_ongoing(element)?;

        let remaining = match depth - 1 {
            0 => StateValue::Null,
            depth => StateValue::Int32(depth),
        };
        self.modify_attribute(t, remaining, quark)?;
        self.remove_attribute(t, element)?;
        Ok(Some(popped))
    }

    /// Set `quark` and all of its descendants to null at `t`.
    fn remove_attribute(&self, t: i64, quark: Quark) -> Result<(), StateSystemError> {
        for child in self.sub_attributes(quark, false)? {
            self.remove_attribute(t, child)?;
        }
        self.modify_attribute(t, StateValue::Null, quark)
    }

    /// Add `delta` to the integer held by `quark`, treating null as zero.
    /// `Int32` attributes stay `Int32`, so their delta must fit in an `i32`.
    fn increment_attribute(&self, t: i64, delta: i64, quark: Quark) -> Result<(), StateSystemError> {
        let next = match self.query_ongoing(quark)? {
            StateValue::Null => StateValue::Int64(delta),
            StateValue::Int32(current) => {
                let delta = i32::try_from(delta).map_err(|_| StateSystemError::StateValueType {
                    ssid: self.ssid().to_string(),
                    attribute: quark,
                    expected: ValueKind::Int32,
                    found: ValueKind::Int64,
                })?;
                StateValue::Int32(current.wrapping_add(delta))
            }
            StateValue::Int64(current) => StateValue::Int64(current.wrapping_add(delta)),
            other => {
                return Err(StateSystemError::StateValueType {
                    ssid: self.ssid().to_string(),
                    attribute: quark,
                    expected: ValueKind::Int64,
                    found: other.kind(),
                })
            }
        };
        self.modify_attribute(t, next, quark)
    }
}
