//! # Scratch State System
//!
//! The state system a partial history replays events into. It keeps no
//! history (its backend is a [`NullBackend`]), only the ongoing value and
//! start time of each attribute. Attribute names resolve read-only through
//! the upstream state system, the one whose history is partial.
//!
//! # Query Lock
//!
//! The ongoing table is one shared scratchpad. A query seeds it, replays into
//! it and reads it back, and two queries doing so at once would corrupt each
//! other. [`take_query_lock`](ScratchStateSystem::take_query_lock) returns a
//! [`QueryGuard`], and the seed and read operations require a reference to
//! one, so they cannot be called outside the critical section.

use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracestate_backend::NullBackend;
use tracestate_statesystem::{StateSystem, StateSystemBuilder, StateSystemError, TransientState};
use tracestate_types::{Latch, LatchState, Quark, StateInterval, StateValue};

/// Exclusive access to a scratch state system's ongoing table.
///
/// Released on drop.
pub struct QueryGuard<'a> {
    owner: &'a ScratchStateSystem,
    _lock: MutexGuard<'a, ()>,
}

impl Drop for QueryGuard<'_> {
    fn drop(&mut self) {
        // Runs before the mutex guard field is dropped.
        self.owner.holders.fetch_sub(1, Ordering::AcqRel);
    }
}

/// In-memory state system without history, for partial history replays.
pub struct ScratchStateSystem {
    transient: TransientState,
    upstream: RwLock<Option<Weak<StateSystem>>>,
    upstream_assigned: Latch,
    query_lock: Mutex<()>,
    holders: AtomicUsize,
    max_holders: AtomicUsize,
}

impl std::fmt::Debug for ScratchStateSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchStateSystem")
            .field("ssid", &self.ssid())
            .field("attributes", &self.transient.len())
            .field("upstream", &self.upstream_assigned.state())
            .finish()
    }
}

impl ScratchStateSystem {
    pub fn new(ssid: impl Into<String>, start_time: i64) -> Self {
        Self {
            transient: TransientState::new(Arc::new(NullBackend::new(ssid, start_time))),
            upstream: RwLock::new(None),
            upstream_assigned: Latch::new(),
            query_lock: Mutex::new(()),
            holders: AtomicUsize::new(0),
            max_holders: AtomicUsize::new(0),
        }
    }

    /// Bind the upstream state system. Only the first call has an effect;
    /// returns whether this one did.
    pub fn assign_upstream(&self, upstream: &Arc<StateSystem>) -> bool {
        let mut slot = self.upstream.write();
        if slot.is_some() {
            return false;
        }
        *slot = Some(Arc::downgrade(upstream));
        drop(slot);
        self.upstream_assigned.release()
    }

    /// Block until an upstream is assigned, at most `timeout` if given.
    pub fn wait_for_upstream(&self, timeout: Option<Duration>) -> LatchState {
        self.upstream_assigned.wait_for(timeout)
    }

    /// The upstream state system, blocking until one is assigned.
    pub fn upstream(&self) -> Result<Arc<StateSystem>, StateSystemError> {
        self.upstream_assigned.wait();
        self.upstream
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or_else(|| StateSystemError::Disposed(self.ssid().to_string()))
    }

    /// Enter the critical section around seed, replay and read.
    ///
    /// The lock is not reentrant: a thread holding a [`QueryGuard`] must
    /// pass that guard along instead of calling this again.
    pub fn take_query_lock(&self) -> QueryGuard<'_> {
        let lock = self.query_lock.lock();
        let holders = self.holders.fetch_add(1, Ordering::AcqRel) + 1;
        self.max_holders.fetch_max(holders, Ordering::AcqRel);
        QueryGuard {
            owner: self,
            _lock: lock,
        }
    }

    /// Largest number of query lock holders ever seen at once. Anything but
    /// 0 or 1 means the critical section was breached.
    pub fn max_concurrent_holders(&self) -> usize {
        self.max_holders.load(Ordering::Acquire)
    }

    fn check_guard(&self, guard: &QueryGuard<'_>) {
        assert!(
            std::ptr::eq(guard.owner, self),
            "query guard belongs to another scratch state system"
        );
    }

    /// Overwrite the ongoing table with `intervals`, keyed by their
    /// attribute. The table is padded to the upstream attribute count.
    pub fn replace_ongoing_state(&self, guard: &QueryGuard<'_>, intervals: &[StateInterval]) {
        self.check_guard(guard);
        let attribute_count = self
            .upstream
            .read()
            .as_ref()
            .and_then(Weak::upgrade)
            .map_or(0, |upstream| upstream.attribute_count());
        self.transient
            .replace_ongoing_state(intervals, attribute_count);
    }

    /// The ongoing interval of every attribute, each ending at `t`.
    pub fn snapshot_ongoing(&self, guard: &QueryGuard<'_>, t: i64) -> Vec<StateInterval> {
        self.check_guard(guard);
        self.transient.snapshot(t)
    }

    /// Drop the ongoing table.
    pub fn clear(&self) {
        let guard = self.take_query_lock();
        self.transient.replace_ongoing_state(&[], 0);
        drop(guard);
    }

    fn upstream_path(&self, start: Option<Quark>, path: &[&str]) -> String {
        let prefix = start
            .and_then(|quark| {
                self.upstream()
                    .ok()
                    .and_then(|upstream| upstream.full_attribute_path(quark))
            })
            .map(|prefix| format!("{prefix}/"))
            .unwrap_or_default();
        format!("{prefix}{}", path.join("/"))
    }
}

impl StateSystemBuilder for ScratchStateSystem {
    fn ssid(&self) -> &str {
        self.transient.backend().ssid()
    }

    fn start_time(&self) -> i64 {
        self.transient.backend().start_time()
    }

    fn attribute_count(&self) -> usize {
        self.transient.len()
    }

    fn get_quark_absolute(&self, path: &[&str]) -> Result<Quark, StateSystemError> {
        self.upstream()?.get_quark_absolute(path)
    }

    fn get_quark_relative(&self, start: Quark, path: &[&str]) -> Result<Quark, StateSystemError> {
        self.upstream()?.get_quark_relative(start, path)
    }

    /// Resolves through the upstream tree; never adds anything.
    fn get_quark_absolute_and_add(&self, path: &[&str]) -> Result<Quark, StateSystemError> {
        self.get_quark_absolute(path).map_err(|error| match error {
            StateSystemError::AttributeNotFound { .. } => StateSystemError::ReadOnlyAttributeTree {
                path: self.upstream_path(None, path),
            },
            other => other,
        })
    }

    /// Resolves through the upstream tree; never adds anything.
    fn get_quark_relative_and_add(
        &self,
        start: Quark,
        path: &[&str],
    ) -> Result<Quark, StateSystemError> {
        self.get_quark_relative(start, path)
            .map_err(|error| match error {
                StateSystemError::AttributeNotFound { .. } => {
                    StateSystemError::ReadOnlyAttributeTree {
                        path: self.upstream_path(Some(start), path),
                    }
                }
                other => other,
            })
    }

    fn sub_attributes(&self, quark: Quark, recursive: bool) -> Result<Vec<Quark>, StateSystemError> {
        self.upstream()?.sub_attributes(quark, recursive)
    }

    fn modify_attribute(
        &self,
        t: i64,
        value: StateValue,
        quark: Quark,
    ) -> Result<(), StateSystemError> {
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

    fn close_history(&self, end_time: i64) -> Result<(), StateSystemError> {
        self.transient.close(end_time)
    }
}
