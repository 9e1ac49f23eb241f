//! # Partial History Backend
//!
//! Stores the checkpoint-crossing intervals in an inner backend and answers
//! full queries by seeding the scratch state system at the nearest earlier
//! checkpoint and replaying up to the query time.

use crate::checkpoints::{is_usable, CheckpointRequest, Checkpoints};
use crate::replay::ReplayRequest;
use crate::{PartialHistoryConfig, PartialHistoryError, ScratchStateSystem};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracestate_backend::{out_of_range, HistoryBackend, QueryError, TimeRangeError};
use tracestate_metrics::MetricsRecorder;
use tracestate_provider::{is_bound_to, StateProvider};
use tracestate_statesystem::StateSystemBuilder;
use tracestate_trace::{RequestHandle, RequestOutcome};
use tracestate_types::{LatchState, Quark, StateInterval, StateValue};
use tracing::instrument;

/// A history backend that keeps only checkpoint-crossing intervals.
///
/// # Threading
///
/// Construction starts checkpoint registration on the trace's foreground
/// lane. `insert_interval` blocks until registration is done, so the build
/// must not run on a lane that registration is queued behind. Queries block
/// until both registration and the build are done.
pub struct PartialHistoryBackend {
    ssid: String,
    config: PartialHistoryConfig,
    provider: Arc<dyn StateProvider>,
    scratch: Arc<ScratchStateSystem>,
    inner: Arc<dyn HistoryBackend>,
    checkpoints: Arc<Checkpoints>,
    registration: RequestHandle,
    end_time: AtomicI64,
    stored: AtomicU64,
    discarded: AtomicU64,
    unavailable_reported: AtomicBool,
    disposed: AtomicBool,
    metrics: Arc<dyn MetricsRecorder>,
}

impl std::fmt::Debug for PartialHistoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartialHistoryBackend")
            .field("ssid", &self.ssid)
            .field("granularity", &self.config.granularity)
            .field("checkpoints", &self.checkpoints.len())
            .field("end_time", &self.current_end_time())
            .field("stored", &self.stored_intervals())
            .field("discarded", &self.discarded_intervals())
            .finish()
    }
}

impl PartialHistoryBackend {
    /// Wrap `inner` in a partial history and start registering checkpoints.
    ///
    /// `provider` is the private provider used for replays; it must already
    /// be assigned to `scratch`.
    pub fn new(
        provider: Arc<dyn StateProvider>,
        scratch: Arc<ScratchStateSystem>,
        inner: Arc<dyn HistoryBackend>,
        config: PartialHistoryConfig,
        metrics: Arc<dyn MetricsRecorder>,
    ) -> Result<Self, PartialHistoryError> {
        config.validate()?;
        let target: Arc<dyn StateSystemBuilder> = scratch.clone();
        if !is_bound_to(provider.as_ref(), &target) {
            return Err(PartialHistoryError::ProviderNotBound {
                provider: provider.id().to_string(),
            });
        }

        let ssid = inner.ssid().to_string();
        let trace = provider.trace().clone();
        // Events at or before the history start fold into the state at that
        // start, so no checkpoint may precede it. Checkpoint keys only grow,
        // which keeps every later checkpoint after it too.
        let checkpoints = Arc::new(Checkpoints::seeded(inner.start_time()));
        tracing::info!(
            ssid = %ssid,
            trace = %trace.id(),
            granularity = config.granularity,
            "Registering checkpoints"
        );
        let registration = trace.send_request(Arc::new(CheckpointRequest::new(
            ssid.clone(),
            trace.id(),
            config.granularity,
            checkpoints.clone(),
            metrics.clone(),
        )));

        Ok(Self {
            end_time: AtomicI64::new(inner.start_time()),
            ssid,
            config,
            provider,
            scratch,
            inner,
            checkpoints,
            registration,
            stored: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            unavailable_reported: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            metrics,
        })
    }

    pub fn config(&self) -> &PartialHistoryConfig {
        &self.config
    }

    pub fn granularity(&self) -> u64 {
        self.config.granularity
    }

    pub fn scratch(&self) -> &Arc<ScratchStateSystem> {
        &self.scratch
    }

    pub fn inner(&self) -> &Arc<dyn HistoryBackend> {
        &self.inner
    }

    /// Checkpoints as `(timestamp, event rank)`, ascending. Final once
    /// [`wait_for_checkpoints`](Self::wait_for_checkpoints) succeeded.
    pub fn checkpoints(&self) -> Vec<(i64, u64)> {
        self.checkpoints.entries()
    }

    /// Intervals forwarded to the inner backend so far.
    pub fn stored_intervals(&self) -> u64 {
        self.stored.load(Ordering::Relaxed)
    }

    /// Intervals dropped as reconstructible so far.
    pub fn discarded_intervals(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Stop checkpoint registration. The backend becomes unusable.
    pub fn cancel_checkpoint_registration(&self) {
        self.registration.cancel();
    }

    /// Block until checkpoint registration ends, bounded by the configured
    /// checkpoint timeout.
    pub fn wait_for_checkpoints(&self) -> Result<(), QueryError> {
        self.wait_for_checkpoints_until(self.deadline())
    }

    /// Deadline shared by every wait a query makes before it replays.
    fn deadline(&self) -> Option<Instant> {
        self.config
            .checkpoint_timeout
            .map(|timeout| Instant::now() + timeout)
    }

    fn timed_out(&self, waiting_for: &'static str) -> QueryError {
        QueryError::Timeout {
            waiting_for,
            after: self.config.checkpoint_timeout.unwrap_or_default(),
        }
    }

    fn wait_for_checkpoints_until(&self, deadline: Option<Instant>) -> Result<(), QueryError> {
        match self.checkpoints.ready().wait_for(remaining(deadline)) {
            LatchState::Released => Ok(()),
            LatchState::Failed => Err(self.unavailable()),
            LatchState::Pending => Err(self.timed_out("checkpoint registration")),
        }
    }

    fn unavailable(&self) -> QueryError {
        QueryError::CheckpointsUnavailable {
            ssid: self.ssid.clone(),
        }
    }

    fn check_disposed(&self) -> Result<(), QueryError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(QueryError::Disposed(self.ssid.clone()));
        }
        Ok(())
    }

    /// Block until the state system this history belongs to is built.
    fn wait_for_build(&self, deadline: Option<Instant>) -> Result<(), QueryError> {
        match self.scratch.wait_for_upstream(remaining(deadline)) {
            LatchState::Released => {}
            LatchState::Pending => return Err(self.timed_out("upstream state system")),
            LatchState::Failed => return Err(QueryError::Disposed(self.ssid.clone())),
        }
        let upstream = self
            .scratch
            .upstream()
            .map_err(|_| QueryError::Disposed(self.ssid.clone()))?;
        match upstream.wait_for_build(remaining(deadline)) {
            LatchState::Released => Ok(()),
            LatchState::Pending => Err(self.timed_out("history build")),
            LatchState::Failed => Err(QueryError::BuildAbandoned {
                ssid: self.ssid.clone(),
            }),
        }
    }

    /// Replay `(checkpoint, t]` into the scratch system. Must run under the
    /// scratch query lock, after seeding.
    fn replay(&self, checkpoint: i64, t: i64) -> Result<u64, QueryError> {
        let started = Instant::now();
        let trace = self.provider.trace();
        let request = Arc::new(ReplayRequest::new(
            checkpoint,
            t,
            trace.id(),
            self.provider.clone(),
            self.config.replay_timeout,
        ));
        let handle = trace.send_request(request.clone());

        let outcome = match self.config.replay_timeout {
            Some(timeout) => handle.wait_for_completion_timeout(timeout),
            None => handle.wait_for_completion(),
        };
        if outcome == RequestOutcome::TimedOut {
            // The scratch system must be quiescent before the lock is released.
            handle.cancel();
            handle.wait_for_completion();
            tracing::warn!(ssid = %self.ssid, t, checkpoint, "Replay timed out");
            return Err(QueryError::Timeout {
                waiting_for: "replay",
                after: self.config.replay_timeout.unwrap_or_default(),
            });
        }

        let failure = request
            .take_error()
            .or_else(|| self.provider.failure())
            .map(|error| error.to_string())
            .or_else(|| {
                (outcome == RequestOutcome::Cancelled).then(|| "replay request cancelled".to_string())
            });
        if let Some(reason) = failure {
            tracing::error!(ssid = %self.ssid, t, checkpoint, %reason, "Replay failed");
            return Err(QueryError::ReplayFailed {
                ssid: self.ssid.clone(),
                time: t,
                reason,
            });
        }

        let events = request.events();
        self.metrics
            .record_replay(events, started.elapsed().as_secs_f64());
        Ok(events)
    }
}

/// Time left until `deadline`, zero once it has passed. `None` waits forever.
fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
}

impl HistoryBackend for PartialHistoryBackend {
    fn ssid(&self) -> &str {
        &self.ssid
    }

    fn start_time(&self) -> i64 {
        self.inner.start_time()
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
        if start < self.start_time() {
            return Err(out_of_range(self, start));
        }
        self.end_time.fetch_max(end, Ordering::AcqRel);

        if !is_usable(self.checkpoints.ready().wait()) {
            if !self.unavailable_reported.swap(true, Ordering::AcqRel) {
                tracing::error!(
                    ssid = %self.ssid,
                    "Checkpoints unavailable, dropping intervals"
                );
            }
            self.discarded.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        let crosses_checkpoint = self
            .checkpoints
            .floor(end)
            .is_some_and(|checkpoint| start <= checkpoint);
        if crosses_checkpoint {
            self.inner.insert_interval(start, end, attribute, value)?;
            self.stored.fetch_add(1, Ordering::Relaxed);
            self.metrics.record_interval_stored();
        } else {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            self.metrics.record_interval_discarded();
        }
        Ok(())
    }

    fn finished_building(&self, end_time: i64) -> Result<(), TimeRangeError> {
        self.end_time.fetch_max(end_time, Ordering::AcqRel);
        self.inner.finished_building(end_time)?;
        tracing::info!(
            ssid = %self.ssid,
            end_time,
            checkpoints = self.checkpoints.len(),
            stored = self.stored_intervals(),
            discarded = self.discarded_intervals(),
            "Partial history finished building"
        );
        Ok(())
    }

    #[instrument(level = "debug", skip(self), fields(ssid = %self.ssid))]
    fn full_query(&self, t: i64) -> Result<Vec<StateInterval>, QueryError> {
        let started = Instant::now();
        self.check_disposed()?;
        let deadline = self.deadline();
        self.wait_for_checkpoints_until(deadline)?;
        self.wait_for_build(deadline)?;
        if !self.is_valid_time(t) {
            return Err(out_of_range(self, t).into());
        }

        let checkpoint = self.checkpoints.floor(t).ok_or_else(|| self.unavailable())?;
        let seed = self.inner.full_query(checkpoint)?;

        let guard = self.scratch.take_query_lock();
        self.scratch.replace_ongoing_state(&guard, &seed);
        let replayed = self.replay(checkpoint, t)?;
        let state = self.scratch.snapshot_ongoing(&guard, t);
        drop(guard);

        self.metrics
            .record_full_query(started.elapsed().as_secs_f64());
        tracing::debug!(
            t,
            checkpoint,
            replayed,
            attributes = state.len(),
            "Rebuilt state from checkpoint"
        );
        Ok(state)
    }

    fn single_query(&self, _t: i64, _attribute: Quark) -> Result<StateInterval, QueryError> {
        Err(QueryError::Unsupported {
            ssid: self.ssid.clone(),
            operation: "single attribute query",
        })
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.registration.cancel();
        self.provider.dispose();
        self.inner.dispose();
        self.checkpoints.clear();
        self.scratch.clear();
        tracing::debug!(ssid = %self.ssid, "Partial history disposed");
    }

    fn remove_files(&self) {
        self.inner.remove_files();
    }
}
