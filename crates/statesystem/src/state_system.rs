//! # Full State System
//!
//! Owns the attribute tree and the transient state, and sits in front of a
//! [`HistoryBackend`]. During the build a state provider drives it through
//! [`StateSystemBuilder`]; queries may run concurrently and combine the
//! backend with the still-open intervals.

use crate::{AttributeTree, StateSystemBuilder, StateSystemError, TransientState};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracestate_backend::{out_of_range, HistoryBackend, QueryError};
use tracestate_types::{Latch, LatchState, Quark, StateInterval, StateValue};
use tracing::instrument;

/// A state system backed by a history backend.
pub struct StateSystem {
    tree: AttributeTree,
    transient: TransientState,
    backend: Arc<dyn HistoryBackend>,
    built: Latch,
    disposed: AtomicBool,
}

impl std::fmt::Debug for StateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSystem")
            .field("ssid", &self.backend.ssid())
            .field("attributes", &self.tree.len())
            .field("built", &self.built.state())
            .finish()
    }
}

impl StateSystem {
    pub fn new(backend: Arc<dyn HistoryBackend>) -> Self {
        Self {
            tree: AttributeTree::new(),
            transient: TransientState::new(backend.clone()),
            backend,
            built: Latch::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &Arc<dyn HistoryBackend> {
        &self.backend
    }

    pub fn attribute_tree(&self) -> &AttributeTree {
        &self.tree
    }

    pub fn full_attribute_path(&self, quark: Quark) -> Option<String> {
        self.tree.full_path(quark)
    }

    /// Latest time covered, by the backend or by processed state changes.
    pub fn current_end_time(&self) -> i64 {
        self.backend
            .current_end_time()
            .max(self.transient.latest_time())
    }

    pub fn is_built(&self) -> bool {
        self.built.state() == LatchState::Released
    }

    /// Block until the history is closed. Returns `false` if the build was
    /// abandoned (the state system got disposed first).
    pub fn wait_until_built(&self) -> bool {
        self.built.wait() == LatchState::Released
    }

    /// Like [`wait_until_built`](Self::wait_until_built), giving up after
    /// `timeout`.
    pub fn wait_until_built_timeout(&self, timeout: Duration) -> bool {
        self.built.wait_timeout(timeout) == LatchState::Released
    }

    /// Block until the build ends, at most `timeout` if given. `Pending`
    /// means the wait timed out, `Failed` that the build was abandoned.
    pub fn wait_for_build(&self, timeout: Option<Duration>) -> LatchState {
        self.built.wait_for(timeout)
    }

    /// Mark the build as abandoned without closing the history. Waiters of
    /// [`wait_until_built`](Self::wait_until_built) are released with `false`.
    pub fn abandon_build(&self) {
        if self.built.fail() {
            tracing::warn!(ssid = %self.ssid(), "State system build abandoned");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Release the backend. Queries fail with `Disposed` afterwards.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.built.fail();
        self.backend.dispose();
        tracing::debug!(ssid = %self.ssid(), "State system disposed");
    }

    fn check_query_time(&self, t: i64) -> Result<(), QueryError> {
        if self.is_disposed() {
            return Err(QueryError::Disposed(self.ssid().to_string()));
        }
        if t < self.backend.start_time() || t > self.current_end_time() {
            return Err(out_of_range(self.backend.as_ref(), t).into());
        }
        Ok(())
    }

    /// The state of every attribute at `t`, indexed by quark.
    ///
    /// Past intervals come from the backend, open ones from the transient
    /// state. Every attribute must be covered.
    #[instrument(level = "debug", skip(self), fields(ssid = %self.ssid()))]
    pub fn query_full_state(&self, t: i64) -> Result<Vec<StateInterval>, QueryError> {
        self.check_query_time(t)?;
        let attribute_count = self.tree.len();
        let mut state: Vec<Option<StateInterval>> = vec![None; attribute_count];

        if t <= self.backend.current_end_time() {
            for interval in self.backend.full_query(t)? {
                let index = interval.attribute().index();
                if index >= state.len() {
                    state.resize(index + 1, None);
                }
                state[index] = Some(interval);
            }
        }
        self.transient.fill_query(t, &mut state);

        state
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or(QueryError::IncompleteState {
                    attribute: Quark::from_index(index),
                    time: t,
                })
            })
            .collect()
    }

    /// The state of one attribute at `t`.
    pub fn query_single_state(&self, t: i64, quark: Quark) -> Result<StateInterval, QueryError> {
        self.check_query_time(t)?;
        if !self.tree.contains(quark) {
            return Err(QueryError::AttributeNotFound(quark));
        }
        if let Some(interval) = self.transient.interval_at(t, quark) {
            return Ok(interval);
        }
        self.backend.single_query(t, quark)
    }
}

impl StateSystemBuilder for StateSystem {
    fn ssid(&self) -> &str {
        self.backend.ssid()
    }

    fn start_time(&self) -> i64 {
        self.backend.start_time()
    }

    fn attribute_count(&self) -> usize {
        self.tree.len()
    }

    fn get_quark_absolute(&self, path: &[&str]) -> Result<Quark, StateSystemError> {
        self.tree
            .get_quark(None, path)
            .ok_or_else(|| StateSystemError::AttributeNotFound {
                path: path.join("/"),
            })
    }

    fn get_quark_relative(&self, start: Quark, path: &[&str]) -> Result<Quark, StateSystemError> {
        if !self.tree.contains(start) {
            return Err(StateSystemError::QuarkOutOfRange(start));
        }
        self.tree
            .get_quark(Some(start), path)
            .ok_or_else(|| StateSystemError::AttributeNotFound {
                path: format!(
                    "{}/{}",
                    self.tree.full_path(start).unwrap_or_default(),
                    path.join("/")
                ),
            })
    }

    fn get_quark_absolute_and_add(&self, path: &[&str]) -> Result<Quark, StateSystemError> {
        let quark = self
            .tree
            .get_or_add(None, path)
            .ok_or_else(|| StateSystemError::AttributeNotFound {
                path: String::new(),
            })?;
        self.transient.ensure_len(self.tree.len());
        Ok(quark)
    }

    fn get_quark_relative_and_add(
        &self,
        start: Quark,
        path: &[&str],
    ) -> Result<Quark, StateSystemError> {
        if !self.tree.contains(start) {
            return Err(StateSystemError::QuarkOutOfRange(start));
        }
        let quark = self.tree.get_or_add(Some(start), path).unwrap_or(start);
        self.transient.ensure_len(self.tree.len());
        Ok(quark)
    }

    fn sub_attributes(&self, quark: Quark, recursive: bool) -> Result<Vec<Quark>, StateSystemError> {
        if !self.tree.contains(quark) {
            return Err(StateSystemError::QuarkOutOfRange(quark));
        }
        Ok(self.tree.sub_attributes(Some(quark), recursive))
    }

    fn modify_attribute(
        &self,
        t: i64,
        value: StateValue,
        quark: Quark,
    ) -> Result<(), StateSystemError> {
        if self.is_disposed() {
            return Err(StateSystemError::Disposed(self.ssid().to_string()));
        }
        self.transient.process_state_change(t, value, quark)
    }

    fn query_ongoing(&self, quark: Quark) -> Result<StateValue, StateSystemError> {
        self.transient.ongoing_value(quark)
    }

    fn ongoing_start_time(&self, quark: Quark) -> Result<i64, StateSystemError> {
        self.transient.ongoing_start_time(quark)
    }

    fn update_ongoing_state(&self, value: StateValue, quark: Quark) -> Result<(), StateSystemError> {
        self.transient.change_ongoing_value(quark, value)
    }

    #[instrument(level = "debug", skip(self), fields(ssid = %self.ssid()))]
    fn close_history(&self, end_time: i64) -> Result<(), StateSystemError> {
        if self.is_disposed() {
            return Err(StateSystemError::Disposed(self.ssid().to_string()));
        }
        if let Err(error) = self.transient.close(end_time) {
            self.built.fail();
            return Err(error);
        }
        self.built.release();
        tracing::info!(
            ssid = %self.ssid(),
            end_time = self.current_end_time(),
            attributes = self.tree.len(),
            "State history built"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracestate_backend_memory::InMemoryBackend;
    use tracestate_types::ValueKind;

    fn state_system(start: i64) -> StateSystem {
        StateSystem::new(Arc::new(InMemoryBackend::new("test", start)))
    }

    #[test]
    fn test_query_combines_backend_and_transient() {
        let ss = state_system(0);
        let cpu = ss.get_quark_absolute_and_add(&["CPU", "0"]).unwrap();
        ss.modify_attribute(10, StateValue::Int32(1), cpu).unwrap();
        ss.modify_attribute(20, StateValue::Int32(2), cpu).unwrap();

        // [10, 19] is in the backend, [20, ...] is still open.
        let past = ss.query_single_state(15, cpu).unwrap();
        assert_eq!(past.value(), &StateValue::Int32(1));
        assert_eq!(past.end(), 19);

        let now = ss.query_full_state(20).unwrap();
        assert_eq!(now.len(), 2);
        assert_eq!(now[cpu.index()].value(), &StateValue::Int32(2));
        assert_eq!(now[cpu.index()].start(), 20);
    }

    #[test]
    fn test_query_outside_history_fails() {
        let ss = state_system(100);
        let quark = ss.get_quark_absolute_and_add(&["A"]).unwrap();
        ss.modify_attribute(150, StateValue::Int32(1), quark).unwrap();
        assert!(matches!(
            ss.query_full_state(99),
            Err(QueryError::TimeRange(_))
        ));
        assert!(matches!(
            ss.query_full_state(151),
            Err(QueryError::TimeRange(_))
        ));
    }

    #[test]
    fn test_close_history_releases_waiters() {
        let ss = state_system(0);
        let quark = ss.get_quark_absolute_and_add(&["A"]).unwrap();
        ss.modify_attribute(5, StateValue::Int64(3), quark).unwrap();
        assert!(!ss.wait_until_built_timeout(Duration::from_millis(10)));

        ss.close_history(40).unwrap();
        assert!(ss.wait_until_built());
        assert_eq!(ss.current_end_time(), 40);

        let interval = ss.query_single_state(40, quark).unwrap();
        assert_eq!((interval.start(), interval.end()), (5, 40));
    }

    #[test]
    fn test_stack_push_pop() {
        let ss = state_system(0);
        let stack = ss.get_quark_absolute_and_add(&["Threads", "1", "CallStack"]).unwrap();
        ss.push_attribute(1, StateValue::string("main"), stack).unwrap();
        ss.push_attribute(2, StateValue::string("work"), stack).unwrap();
        assert_eq!(ss.query_ongoing(stack).unwrap(), StateValue::Int32(2));

        let top = ss.get_quark_relative(stack, &["2"]).unwrap();
        assert_eq!(ss.query_ongoing(top).unwrap(), StateValue::string("work"));

        assert_eq!(
            ss.pop_attribute(3, stack).unwrap(),
            Some(StateValue::string("work"))
        );
        assert!(ss.query_ongoing(top).unwrap().is_null());
        assert_eq!(
            ss.pop_attribute(4, stack).unwrap(),
            Some(StateValue::string("main"))
        );
        assert!(ss.query_ongoing(stack).unwrap().is_null());
        assert_eq!(ss.pop_attribute(5, stack).unwrap(), None);
    }

    #[test]
    fn test_increment_attribute() {
        let ss = state_system(0);
        let counter = ss.get_quark_absolute_and_add(&["count"]).unwrap();
        ss.increment_attribute(1, 1, counter).unwrap();
        ss.increment_attribute(2, 4, counter).unwrap();
        assert_eq!(ss.query_ongoing(counter).unwrap(), StateValue::Int64(5));
    }

    #[test]
    fn test_increment_int32_rejects_wide_delta() {
        let ss = state_system(0);
        let counter = ss.get_quark_absolute_and_add(&["count"]).unwrap();
        ss.modify_attribute(1, StateValue::Int32(2), counter).unwrap();
        ss.increment_attribute(2, -5, counter).unwrap();
        assert_eq!(ss.query_ongoing(counter).unwrap(), StateValue::Int32(-3));

        let result = ss.increment_attribute(3, i64::from(i32::MAX) + 1, counter);
        assert!(matches!(
            result,
            Err(StateSystemError::StateValueType {
                expected: ValueKind::Int32,
                found: ValueKind::Int64,
                ..
            })
        ));
        assert_eq!(ss.query_ongoing(counter).unwrap(), StateValue::Int32(-3));
    }

    #[test]
    fn test_missing_attribute_lookups() {
        let ss = state_system(0);
        assert!(matches!(
            ss.get_quark_absolute(&["nope"]),
            Err(StateSystemError::AttributeNotFound { .. })
        ));
        assert!(matches!(
            ss.query_single_state(0, Quark(3)),
            Err(QueryError::AttributeNotFound(Quark(3)))
        ));
    }

    #[test]
    fn test_dispose_fails_waiters_and_queries() {
        let ss = state_system(0);
        ss.dispose();
        assert!(!ss.wait_until_built());
        assert!(matches!(
            ss.query_full_state(0),
            Err(QueryError::Disposed(_))
        ));
    }
}
