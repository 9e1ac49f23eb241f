//! State history backend trait and shared types.
//!
//! This crate defines the storage abstraction behind a state system: the
//! component that persists closed [`StateInterval`]s and answers point
//! queries over them.
//!
//! # Design
//!
//! A state system never keeps closed intervals itself. Its transient state
//! hands each interval to a [`HistoryBackend`] when the interval closes, and
//! queries for past times go straight to the backend. Implementations:
//!
//! - `InMemoryBackend` (`tracestate-backend-memory`): full history, every interval kept
//! - `PartialHistoryBackend` (`tracestate-partial`): keeps only checkpoint-crossing
//!   intervals in an inner backend and rebuilds the rest by replaying events
//! - [`NullBackend`]: discards everything, used under scratch state systems
//!
//! All methods take `&self`; implementations use interior mutability so a
//! backend can be shared as `Arc<dyn HistoryBackend>` between the builder
//! thread and query threads.

#![warn(missing_docs)]

mod error;
mod null;

pub use error::{QueryError, TimeRangeError};
pub use null::NullBackend;

use tracestate_condition::{QuarkCondition, TimeCondition};
use tracestate_types::{Quark, StateInterval, StateValue};

/// Storage for the closed intervals of one state system.
pub trait HistoryBackend: Send + Sync {
    /// Identifier of the state system this backend stores.
    fn ssid(&self) -> &str;

    /// Earliest time covered by the history.
    fn start_time(&self) -> i64;

    /// Latest time covered so far. Grows monotonically while the history is
    /// being built.
    fn current_end_time(&self) -> i64;

    /// Store the closed interval `[start, end]` of `attribute`.
    ///
    /// Intervals of one attribute arrive in time order. Fails if `start > end`
    /// or if `start` precedes the history start time.
    fn insert_interval(
        &self,
        start: i64,
        end: i64,
        attribute: Quark,
        value: StateValue,
    ) -> Result<(), TimeRangeError>;

    /// Signal that no more intervals will be inserted; the history ends at
    /// `end_time`.
    fn finished_building(&self, end_time: i64) -> Result<(), TimeRangeError>;

    /// The interval of every attribute at time `t`, indexed by quark.
    fn full_query(&self, t: i64) -> Result<Vec<StateInterval>, QueryError>;

    /// The interval of a single attribute at time `t`.
    fn single_query(&self, t: i64, attribute: Quark) -> Result<StateInterval, QueryError>;

    /// Every stored interval of an attribute selected by `quarks` that
    /// intersects a time selected by `times`, ordered by quark then start.
    ///
    /// Optional: the default implementation reports the operation as
    /// unsupported.
    fn query_2d(
        &self,
        quarks: &QuarkCondition,
        times: &TimeCondition,
    ) -> Result<Vec<StateInterval>, QueryError> {
        let _ = (quarks, times);
        Err(QueryError::Unsupported {
            ssid: self.ssid().to_string(),
            operation: "2D query",
        })
    }

    /// Whether `t` lies within `[start_time, current_end_time]`.
    fn is_valid_time(&self, t: i64) -> bool {
        self.start_time() <= t && t <= self.current_end_time()
    }

    /// Release the resources held by this backend. Queries fail afterwards.
    fn dispose(&self);

    /// Delete any persistent files backing this history.
    fn remove_files(&self);
}

/// Build the range error for a query at `t` against `backend`.
pub fn out_of_range(backend: &(impl HistoryBackend + ?Sized), t: i64) -> TimeRangeError {
    TimeRangeError::OutOfRange {
        ssid: backend.ssid().to_string(),
        time: t,
        start: backend.start_time(),
        end: backend.current_end_time(),
    }
}
