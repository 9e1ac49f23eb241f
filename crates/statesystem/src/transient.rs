//! Ongoing state of a state system.
//!
//! Every attribute has exactly one open interval at any time: its current
//! value and the time that value was set. A state change closes the open
//! interval at `t - 1`, hands it to the backend and opens a new one at `t`.

use crate::StateSystemError;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use tracestate_backend::HistoryBackend;
use tracestate_types::{Quark, StateInterval, StateValue, ValueKind};

#[derive(Debug, Default)]
struct Ongoing {
    values: Vec<StateValue>,
    start_times: Vec<i64>,
    /// Kind each attribute is bound to, fixed by its first non-null value.
    kinds: Vec<Option<ValueKind>>,
}

impl Ongoing {
    fn push_empty(&mut self, start_time: i64) {
        self.values.push(StateValue::Null);
        self.start_times.push(start_time);
        self.kinds.push(None);
    }
}

/// Ongoing values and start times of every attribute, in front of a
/// [`HistoryBackend`] receiving the intervals as they close.
pub struct TransientState {
    backend: Arc<dyn HistoryBackend>,
    ongoing: RwLock<Ongoing>,
    latest_time: AtomicI64,
    active: AtomicBool,
}

impl std::fmt::Debug for TransientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientState")
            .field("ssid", &self.backend.ssid())
            .field("attributes", &self.len())
            .field("latest_time", &self.latest_time())
            .field("active", &self.is_active())
            .finish()
    }
}

impl TransientState {
    pub fn new(backend: Arc<dyn HistoryBackend>) -> Self {
        let start = backend.start_time();
        Self {
            backend,
            ongoing: RwLock::new(Ongoing::default()),
            latest_time: AtomicI64::new(start),
            active: AtomicBool::new(true),
        }
    }

    pub fn backend(&self) -> &Arc<dyn HistoryBackend> {
        &self.backend
    }

    /// Number of attributes with an ongoing slot.
    pub fn len(&self) -> usize {
        self.ongoing.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Latest time a state change was processed at.
    pub fn latest_time(&self) -> i64 {
        self.latest_time.load(Ordering::Acquire)
    }

    /// `false` once [`close`](Self::close) has flushed everything.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Grow the table to `attribute_count` slots. New attributes start out
    /// null from the history start time.
    pub fn ensure_len(&self, attribute_count: usize) {
        if self.len() >= attribute_count {
            return;
        }
        let start = self.backend.start_time();
        let mut ongoing = self.ongoing.write();
        while ongoing.values.len() < attribute_count {
            ongoing.push_empty(start);
        }
    }

    pub fn ongoing_value(&self, quark: Quark) -> Result<StateValue, StateSystemError> {
        self.ongoing
            .read()
            .values
            .get(quark.index())
            .cloned()
            .ok_or(StateSystemError::QuarkOutOfRange(quark))
    }

    pub fn ongoing_start_time(&self, quark: Quark) -> Result<i64, StateSystemError> {
        self.ongoing
            .read()
            .start_times
            .get(quark.index())
            .copied()
            .ok_or(StateSystemError::QuarkOutOfRange(quark))
    }

    /// Overwrite the ongoing value in place, without closing an interval.
    pub fn change_ongoing_value(
        &self,
        quark: Quark,
        value: StateValue,
    ) -> Result<(), StateSystemError> {
        let mut ongoing = self.ongoing.write();
        let slot = ongoing
            .values
            .get_mut(quark.index())
            .ok_or(StateSystemError::QuarkOutOfRange(quark))?;
        *slot = value;
        Ok(())
    }

    /// The open interval of `quark`, ending at the latest processed time.
    pub fn ongoing_interval(&self, quark: Quark) -> Result<StateInterval, StateSystemError> {
        let ongoing = self.ongoing.read();
        let index = quark.index();
        let (Some(value), Some(start)) = (ongoing.values.get(index), ongoing.start_times.get(index))
        else {
            return Err(StateSystemError::QuarkOutOfRange(quark));
        };
        let end = self.latest_time().max(*start);
        Ok(StateInterval::new(*start, end, quark, value.clone()))
    }

    /// The open interval of `quark` if it covers `t`.
    pub fn interval_at(&self, t: i64, quark: Quark) -> Option<StateInterval> {
        if !self.is_active() {
            return None;
        }
        let ongoing = self.ongoing.read();
        let start = *ongoing.start_times.get(quark.index())?;
        if t < start {
            return None;
        }
        let end = self.latest_time().max(t);
        Some(StateInterval::new(
            start,
            end,
            quark,
            ongoing.values[quark.index()].clone(),
        ))
    }

    /// Fill the slots of `state` whose open interval covers `t`.
    pub fn fill_query(&self, t: i64, state: &mut [Option<StateInterval>]) {
        if !self.is_active() {
            return;
        }
        let ongoing = self.ongoing.read();
        let end = self.latest_time().max(t);
        for (index, slot) in state.iter_mut().enumerate() {
            let Some(&start) = ongoing.start_times.get(index) else {
                break;
            };
            if start <= t {
                *slot = Some(StateInterval::new(
                    start,
                    end,
                    Quark::from_index(index),
                    ongoing.values[index].clone(),
                ));
            }
        }
    }

    /// Apply a state change of `quark` to `value` at time `t`.
    ///
    /// Setting the value the attribute already holds is a no-op. Otherwise
    /// the open interval is closed at `t - 1` and stored, unless it started
    /// at `t` in which case it is simply replaced.
    pub fn process_state_change(
        &self,
        t: i64,
        value: StateValue,
        quark: Quark,
    ) -> Result<(), StateSystemError> {
        let mut ongoing = self.ongoing.write();
        let index = quark.index();
        if index >= ongoing.values.len() {
            return Err(StateSystemError::QuarkOutOfRange(quark));
        }

        let found = value.kind();
        match ongoing.kinds[index] {
            Some(expected) if found != ValueKind::Null && found != expected => {
                return Err(StateSystemError::StateValueType {
                    ssid: self.backend.ssid().to_string(),
                    attribute: quark,
                    expected,
                    found,
                });
            }
            None if found != ValueKind::Null => ongoing.kinds[index] = Some(found),
            _ => {}
        }

        if ongoing.values[index] == value {
            return Ok(());
        }

        let start = ongoing.start_times[index];
        if start < t {
            let previous = ongoing.values[index].clone();
            self.backend.insert_interval(start, t - 1, quark, previous)?;
            ongoing.start_times[index] = t;
        }
        ongoing.values[index] = value;
        self.latest_time.fetch_max(t, Ordering::AcqRel);
        Ok(())
    }

    /// Replace the whole ongoing table with the given intervals.
    ///
    /// Each interval's value and start time seed the slot of its attribute.
    /// The table is sized to `attribute_count`; attributes without an
    /// interval are null from the history start. Value kinds are re-derived
    /// from the new values.
    pub fn replace_ongoing_state(&self, intervals: &[StateInterval], attribute_count: usize) {
        let start = self.backend.start_time();
        let size = intervals
            .iter()
            .map(|interval| interval.attribute().index() + 1)
            .max()
            .unwrap_or(0)
            .max(attribute_count);

        let mut fresh = Ongoing::default();
        for _ in 0..size {
            fresh.push_empty(start);
        }
        let mut latest = start;
        for interval in intervals {
            let index = interval.attribute().index();
            fresh.values[index] = interval.value().clone();
            fresh.start_times[index] = interval.start();
            fresh.kinds[index] = Some(interval.value().kind()).filter(|kind| *kind != ValueKind::Null);
            latest = latest.max(interval.start());
        }

        *self.ongoing.write() = fresh;
        self.latest_time.store(latest, Ordering::Release);
        self.active.store(true, Ordering::Release);
    }

    /// Snapshot of every open interval, ending at `end`.
    pub fn snapshot(&self, end: i64) -> Vec<StateInterval> {
        let ongoing = self.ongoing.read();
        ongoing
            .values
            .iter()
            .zip(&ongoing.start_times)
            .enumerate()
            .map(|(index, (value, &start))| {
                StateInterval::new(start, end.max(start), Quark::from_index(index), value.clone())
            })
            .collect()
    }

    /// Flush every open interval to the backend as `[start, end_time]` and
    /// mark the history finished.
    pub fn close(&self, end_time: i64) -> Result<(), StateSystemError> {
        let end_time = end_time.max(self.latest_time());
        {
            let ongoing = self.ongoing.read();
            for (index, (value, &start)) in ongoing.values.iter().zip(&ongoing.start_times).enumerate() {
                self.backend
                    .insert_interval(start, end_time, Quark::from_index(index), value.clone())?;
            }
        }
        self.backend.finished_building(end_time)?;
        self.latest_time.fetch_max(end_time, Ordering::AcqRel);
        self.active.store(false, Ordering::Release);
        Ok(())
    }
}
