//! # In-Memory Backend
//!
//! Intervals are kept per attribute in a `BTreeMap` keyed by end time. Since
//! the intervals of one attribute never overlap, the first entry whose end is
//! `>= t` is the only candidate for containing `t`, which makes a point query
//! one `O(log n)` range lookup per attribute.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tracestate_backend::{out_of_range, HistoryBackend, QueryError, TimeRangeError};
use tracestate_condition::{QuarkCondition, TimeCondition};
use tracestate_types::{Quark, StateInterval, StateValue};

/// In-memory storage for a full state history.
///
/// # Interior Mutability
///
/// The interval table sits behind a `RwLock` so all methods take `&self`:
/// the builder thread inserts while query threads read.
pub struct InMemoryBackend {
    ssid: String,
    start_time: i64,
    end_time: AtomicI64,
    /// Closed intervals, one map per attribute, keyed by end time.
    intervals: RwLock<Vec<BTreeMap<i64, StateInterval>>>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for InMemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackend")
            .field("ssid", &self.ssid)
            .field("start_time", &self.start_time)
            .field("end_time", &self.current_end_time())
            .field("intervals", &self.interval_count())
            .finish()
    }
}

impl InMemoryBackend {
    /// Create an empty history starting at `start_time`.
    pub fn new(ssid: impl Into<String>, start_time: i64) -> Self {
        Self {
            ssid: ssid.into(),
            start_time,
            end_time: AtomicI64::new(start_time),
            intervals: RwLock::new(Vec::new()),
            disposed: AtomicBool::new(false),
        }
    }

    /// Number of intervals stored, all attributes included.
    pub fn interval_count(&self) -> usize {
        self.intervals.read().iter().map(BTreeMap::len).sum()
    }

    /// Number of attributes that have at least one slot in the table.
    pub fn attribute_count(&self) -> usize {
        self.intervals.read().len()
    }

    fn check_disposed(&self) -> Result<(), QueryError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(QueryError::Disposed(self.ssid.clone()));
        }
        Ok(())
    }

    fn check_time(&self, t: i64) -> Result<(), QueryError> {
        self.check_disposed()?;
        if !self.is_valid_time(t) {
            return Err(out_of_range(self, t).into());
        }
        Ok(())
    }
}

/// The interval of `attribute_intervals` containing `t`, if any.
fn interval_at(attribute_intervals: &BTreeMap<i64, StateInterval>, t: i64) -> Option<&StateInterval> {
    attribute_intervals
        .range(t..)
        .next()
        .map(|(_, interval)| interval)
        .filter(|interval| interval.start() <= t)
}

impl HistoryBackend for InMemoryBackend {
    fn ssid(&self) -> &str {
        &self.ssid
    }

    fn start_time(&self) -> i64 {
        self.start_time
    }

    fn current_end_time(&self) -> i64 {
        self.end_time.load(Ordering::Acquire)
    }

    fn insert_interval(
        &self,
        start: i64,
        end: i64,
        attribute: Quark,
        value: StateValue,
    ) -> Result<(), TimeRangeError> {
        if start > end {
            return Err(TimeRangeError::InvertedInterval {
                ssid: self.ssid.clone(),
                start,
                end,
            });
        }
        if start < self.start_time {
            return Err(TimeRangeError::OutOfRange {
                ssid: self.ssid.clone(),
                time: start,
                start: self.start_time,
                end: self.current_end_time(),
            });
        }

        let interval = StateInterval::new(start, end, attribute, value);
        {
            let mut intervals = self.intervals.write();
            let index = attribute.index();
            if intervals.len() <= index {
                intervals.resize_with(index + 1, BTreeMap::new);
            }
            intervals[index].insert(end, interval);
        }
        self.end_time.fetch_max(end, Ordering::AcqRel);
        Ok(())
    }

    fn finished_building(&self, end_time: i64) -> Result<(), TimeRangeError> {
        if end_time < self.start_time {
            return Err(TimeRangeError::OutOfRange {
                ssid: self.ssid.clone(),
                time: end_time,
                start: self.start_time,
                end: self.current_end_time(),
            });
        }
        self.end_time.fetch_max(end_time, Ordering::AcqRel);
        tracing::debug!(
            ssid = %self.ssid,
            end_time,
            intervals = self.interval_count(),
            "In-memory history finished building"
        );
        Ok(())
    }

    fn full_query(&self, t: i64) -> Result<Vec<StateInterval>, QueryError> {
        self.check_time(t)?;
        let intervals = self.intervals.read();
        Ok(intervals
            .iter()
            .filter_map(|attribute_intervals| interval_at(attribute_intervals, t).cloned())
            .collect())
    }

    fn single_query(&self, t: i64, attribute: Quark) -> Result<StateInterval, QueryError> {
        self.check_time(t)?;
        let intervals = self.intervals.read();
        let attribute_intervals = intervals
            .get(attribute.index())
            .ok_or(QueryError::AttributeNotFound(attribute))?;
        interval_at(attribute_intervals, t)
            .cloned()
            .ok_or(QueryError::IncompleteState { attribute, time: t })
    }

    fn query_2d(
        &self,
        quarks: &QuarkCondition,
        times: &TimeCondition,
    ) -> Result<Vec<StateInterval>, QueryError> {
        self.check_disposed()?;
        let intervals = self.intervals.read();
        let Some(last) = intervals.len().checked_sub(1).map(Quark::from_index) else {
            return Ok(Vec::new());
        };
        let Some(quarks) = quarks.sub_condition(Quark(0), last) else {
            return Ok(Vec::new());
        };

        let mut result = Vec::new();
        for index in quarks.min().index()..=quarks.max().index() {
            if !quarks.test(Quark::from_index(index)) {
                continue;
            }
            result.extend(
                intervals[index]
                    .range(times.min()..)
                    .map(|(_, interval)| interval)
                    .take_while(|interval| interval.start() <= times.max())
                    .filter(|interval| times.intersects(interval.start(), interval.end()))
                    .cloned(),
            );
        }
        Ok(result)
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.intervals.write().clear();
    }

    fn remove_files(&self) {
        // Nothing on disk; dropping the table is all there is to remove.
        self.intervals.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracestate_condition::{continuous, from_collection, singleton};

    /// Two attributes over [0, 100]:
    /// - 0: [0,9]=1, [10,49]=2, [50,100]=3
    /// - 1: [0,100]="idle"
    fn populated() -> InMemoryBackend {
        let backend = InMemoryBackend::new("test", 0);
        backend
            .insert_interval(0, 9, Quark(0), StateValue::Int32(1))
            .unwrap();
        backend
            .insert_interval(10, 49, Quark(0), StateValue::Int32(2))
            .unwrap();
        backend
            .insert_interval(50, 100, Quark(0), StateValue::Int32(3))
            .unwrap();
        backend
            .insert_interval(0, 100, Quark(1), StateValue::string("idle"))
            .unwrap();
        backend.finished_building(100).unwrap();
        backend
    }

    #[test]
    fn test_full_query_is_indexed_by_quark() {
        let backend = populated();
        let state = backend.full_query(10).unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state[0].attribute(), Quark(0));
        assert_eq!(state[0].value(), &StateValue::Int32(2));
        assert_eq!((state[0].start(), state[0].end()), (10, 49));
        assert_eq!(state[1].value(), &StateValue::string("idle"));
    }

    #[test]
    fn test_interval_boundaries() {
        let backend = populated();
        assert_eq!(
            backend.single_query(9, Quark(0)).unwrap().value(),
            &StateValue::Int32(1)
        );
        assert_eq!(
            backend.single_query(50, Quark(0)).unwrap().value(),
            &StateValue::Int32(3)
        );
        assert_eq!(
            backend.single_query(100, Quark(0)).unwrap().value(),
            &StateValue::Int32(3)
        );
    }

    #[test]
    fn test_out_of_range_queries() {
        let backend = populated();
        assert!(matches!(
            backend.full_query(101),
            Err(QueryError::TimeRange(TimeRangeError::OutOfRange { time: 101, .. }))
        ));
        assert!(matches!(
            backend.full_query(-1),
            Err(QueryError::TimeRange(_))
        ));
        assert!(matches!(
            backend.single_query(5, Quark(7)),
            Err(QueryError::AttributeNotFound(Quark(7)))
        ));
    }

    #[test]
    fn test_rejects_insertion_before_start() {
        let backend = InMemoryBackend::new("test", 100);
        assert!(backend
            .insert_interval(50, 150, Quark(0), StateValue::Null)
            .is_err());
    }

    #[test]
    fn test_query_2d_prunes_quarks_and_times() {
        let backend = populated();

        let quarks = singleton(Quark(0));
        let times = continuous(5i64, 20).unwrap();
        let found = backend.query_2d(quarks.as_ref(), times.as_ref()).unwrap();
        let values: Vec<_> = found.iter().map(|i| i.value().clone()).collect();
        assert_eq!(values, vec![StateValue::Int32(1), StateValue::Int32(2)]);

        // Sampled times skip the middle interval entirely.
        let times = from_collection([3i64, 75]).unwrap();
        let quarks = continuous(Quark(0), Quark(5)).unwrap();
        let found = backend.query_2d(quarks.as_ref(), times.as_ref()).unwrap();
        let summary: Vec<_> = found
            .iter()
            .map(|i| (i.attribute(), i.start()))
            .collect();
        assert_eq!(summary, vec![(Quark(0), 0), (Quark(0), 50), (Quark(1), 0)]);
    }

    #[test]
    fn test_dispose_rejects_queries() {
        let backend = populated();
        backend.dispose();
        assert!(matches!(
            backend.full_query(10),
            Err(QueryError::Disposed(_))
        ));
        assert_eq!(backend.interval_count(), 0);
    }
}
