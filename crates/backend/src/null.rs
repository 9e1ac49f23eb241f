use crate::{out_of_range, HistoryBackend, QueryError, TimeRangeError};
use std::sync::atomic::{AtomicI64, Ordering};
use tracestate_types::{Quark, StateInterval, StateValue};

/// A backend that stores nothing.
///
/// Sits under state systems whose ongoing state is all that matters, such as
/// the scratch state system of a partial history. Closed intervals are
/// dropped; only the latest end time is tracked.
#[derive(Debug)]
pub struct NullBackend {
    ssid: String,
    start_time: i64,
    end_time: AtomicI64,
}

impl NullBackend {
    /// Create a null backend whose history starts at `start_time`.
    pub fn new(ssid: impl Into<String>, start_time: i64) -> Self {
        Self {
            ssid: ssid.into(),
            start_time,
            end_time: AtomicI64::new(start_time),
        }
    }
}

impl HistoryBackend for NullBackend {
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
        _attribute: Quark,
        _value: StateValue,
    ) -> Result<(), TimeRangeError> {
        if start > end {
            return Err(TimeRangeError::InvertedInterval {
                ssid: self.ssid.clone(),
                start,
                end,
            });
        }
        self.end_time.fetch_max(end, Ordering::AcqRel);
        Ok(())
    }

    fn finished_building(&self, end_time: i64) -> Result<(), TimeRangeError> {
        self.end_time.fetch_max(end_time, Ordering::AcqRel);
        Ok(())
    }

    fn full_query(&self, t: i64) -> Result<Vec<StateInterval>, QueryError> {
        if !self.is_valid_time(t) {
            return Err(out_of_range(self, t).into());
        }
        Ok(Vec::new())
    }

    fn single_query(&self, t: i64, attribute: Quark) -> Result<StateInterval, QueryError> {
        if !self.is_valid_time(t) {
            return Err(out_of_range(self, t).into());
        }
        Err(QueryError::AttributeNotFound(attribute))
    }

    fn dispose(&self) {}

    fn remove_files(&self) {}
}
