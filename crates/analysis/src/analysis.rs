//! # State System Analysis
//!
//! Construction order matters for a partial history:
//!
//! 1. the private provider is bound to the scratch system
//! 2. the partial backend is created, which sends checkpoint registration
//! 3. the state system is created over it and assigned as the scratch
//!    system's upstream
//! 4. the build request is sent
//!
//! Registration and the build both run on the foreground lane, in that
//! order, so the build never waits on a scan queued behind it.

use crate::build::BuildRequest;
use crate::{AnalysisConfig, AnalysisError, BackendKind};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracestate_backend::HistoryBackend;
use tracestate_backend_memory::InMemoryBackend;
use tracestate_metrics::MetricsRecorder;
use tracestate_partial::{PartialHistoryBackend, ScratchStateSystem};
use tracestate_provider::{EventHandler, StateProvider, ThreadedStateProvider};
use tracestate_statesystem::StateSystem;
use tracestate_trace::{RequestHandle, Trace};
use tracestate_types::LatchState;

/// Builder for a [`StateSystemAnalysis`].
///
/// Required fields:
/// - `trace` - the events to analyse
/// - `handler` - the analysis logic
///
/// Optional fields:
/// - `config` - defaults to a full history with the default queue size
/// - `inner_backend` - where intervals are stored, defaults to an
///   [`InMemoryBackend`] starting at the trace start
/// - `metrics` - defaults to a no-op recorder
#[derive(Default)]
pub struct StateSystemAnalysisBuilder {
    config: AnalysisConfig,
    trace: Option<Arc<dyn Trace>>,
    handler: Option<Box<dyn EventHandler>>,
    inner_backend: Option<Arc<dyn HistoryBackend>>,
    metrics: Option<Arc<dyn MetricsRecorder>>,
}

impl StateSystemAnalysisBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn trace(mut self, trace: Arc<dyn Trace>) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn handler(mut self, handler: Box<dyn EventHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn inner_backend(mut self, backend: Arc<dyn HistoryBackend>) -> Self {
        self.inner_backend = Some(backend);
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsRecorder>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Wire everything together and start the build.
    ///
    /// Returns as soon as the build request is sent; use
    /// [`StateSystemAnalysis::wait_until_built`] to wait for it.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing, the configuration is
    /// invalid, or a provider cannot be bound.
    pub fn build(self) -> Result<StateSystemAnalysis, AnalysisError> {
        self.config.validate()?;
        let trace = self.trace.ok_or(AnalysisError::MissingField("trace"))?;
        let handler = self.handler.ok_or(AnalysisError::MissingField("handler"))?;
        let metrics = self.metrics.unwrap_or_else(tracestate_metrics::noop);
        let id = self.config.id.clone();
        let inner: Arc<dyn HistoryBackend> = match self.inner_backend {
            Some(backend) => backend,
            None => Arc::new(InMemoryBackend::new(id.clone(), trace.start_time())),
        };

        let provider: Arc<dyn StateProvider> = Arc::new(ThreadedStateProvider::new(
            id.clone(),
            trace.clone(),
            handler,
            self.config.queue_size,
        ));

        let (ss, partial) = match &self.config.backend {
            BackendKind::Full => (Arc::new(StateSystem::new(inner)), None),
            BackendKind::Partial(partial_config) => {
                let replay = provider.new_instance();
                let scratch = Arc::new(ScratchStateSystem::new(
                    format!("{id}-scratch"),
                    inner.start_time(),
                ));
                replay.assign_target_state_system(scratch.clone())?;
                let partial = Arc::new(PartialHistoryBackend::new(
                    replay,
                    scratch.clone(),
                    inner,
                    partial_config.clone(),
                    metrics,
                )?);
                let ss = Arc::new(StateSystem::new(partial.clone()));
                scratch.assign_upstream(&ss);
                (ss, Some(partial))
            }
        };
        provider.assign_target_state_system(ss.clone())?;

        let failure = Arc::new(Mutex::new(None));
        let build = trace.send_request(Arc::new(BuildRequest::new(
            id.clone(),
            provider.clone(),
            ss.clone(),
            failure.clone(),
        )));
        tracing::info!(
            analysis = %id,
            trace = %trace.id(),
            events = trace.event_count(),
            backend = if partial.is_some() { "partial" } else { "full" },
            "Analysis build started"
        );

        Ok(StateSystemAnalysis {
            config: self.config,
            trace,
            provider,
            ss,
            partial,
            build,
            failure,
        })
    }
}

/// A state system being built, or built, from a trace.
pub struct StateSystemAnalysis {
    config: AnalysisConfig,
    trace: Arc<dyn Trace>,
    provider: Arc<dyn StateProvider>,
    ss: Arc<StateSystem>,
    partial: Option<Arc<PartialHistoryBackend>>,
    build: RequestHandle,
    failure: Arc<Mutex<Option<String>>>,
}

impl std::fmt::Debug for StateSystemAnalysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateSystemAnalysis")
            .field("id", &self.config.id)
            .field("backend", &self.config.backend)
            .field("built", &self.ss.is_built())
            .finish()
    }
}

impl StateSystemAnalysis {
    pub fn builder() -> StateSystemAnalysisBuilder {
        StateSystemAnalysisBuilder::new()
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn trace(&self) -> &Arc<dyn Trace> {
        &self.trace
    }

    pub fn state_system(&self) -> &Arc<StateSystem> {
        &self.ss
    }

    /// The partial backend, when the analysis stores a partial history.
    pub fn partial_backend(&self) -> Option<&Arc<PartialHistoryBackend>> {
        self.partial.as_ref()
    }

    /// Events handed to the provider so far.
    pub fn events_read(&self) -> u64 {
        self.build.events_delivered()
    }

    /// Block until the history is built.
    pub fn wait_until_built(&self) -> Result<(), AnalysisError> {
        self.build_result(self.ss.wait_for_build(None), None)
    }

    /// Like [`wait_until_built`](Self::wait_until_built), giving up after
    /// `timeout`.
    pub fn wait_until_built_timeout(&self, timeout: Duration) -> Result<(), AnalysisError> {
        self.build_result(self.ss.wait_for_build(Some(timeout)), Some(timeout))
    }

    fn build_result(
        &self,
        state: LatchState,
        timeout: Option<Duration>,
    ) -> Result<(), AnalysisError> {
        match state {
            LatchState::Released => Ok(()),
            LatchState::Pending => Err(AnalysisError::Timeout {
                id: self.config.id.clone(),
                after: timeout.unwrap_or_default(),
            }),
            LatchState::Failed => Err(AnalysisError::BuildFailed {
                id: self.config.id.clone(),
                reason: self
                    .failure
                    .lock()
                    .clone()
                    .unwrap_or_else(|| "state system disposed".to_string()),
            }),
        }
    }

    /// Stop the build if it is still running. Waiters see a failed build.
    pub fn cancel(&self) {
        self.build.cancel();
    }

    /// Stop the build, the provider and the state system.
    pub fn dispose(&self) {
        self.build.cancel();
        self.provider.dispose();
        self.ss.dispose();
        tracing::debug!(analysis = %self.config.id, "Analysis disposed");
    }
}
