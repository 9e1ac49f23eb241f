//! Rayon thread pool dispatch.
//!
//! This module provides [`PooledDispatch`], which runs trace requests on two
//! isolated rayon thread pools:
//!
//! - **Foreground**: history builds and checkpoint registration
//! - **Background**: partial history replays
//!
//! Tasks are spawned with `spawn_fifo`, so requests on one lane start in the
//! order they were sent.
//!
//! # Example
//!
//! ```no_run
//! use tracestate_dispatch_pooled::{DispatchConfig, PooledDispatch};
//!
//! // Auto-detect cores and use default ratios
//! let dispatch = PooledDispatch::new(DispatchConfig::auto()).unwrap();
//!
//! // Or customize
//! let config = DispatchConfig::builder()
//!     .foreground_threads(2)
//!     .background_threads(4)
//!     .build()
//!     .unwrap();
//! let dispatch = PooledDispatch::new(config).unwrap();
//! ```

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use tracestate_dispatch::Dispatch;

/// Errors from thread pool configuration.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to build rayon thread pool: {0}")]
    PoolBuild(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for the request thread pools.
///
/// Use `DispatchConfig::auto()` to size the pools from the available cores.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Number of threads for foreground requests (history builds, checkpoint
    /// registration). Each running scan occupies one thread for the whole
    /// trace.
    pub foreground_threads: usize,

    /// Number of threads for background requests (partial history replays).
    pub background_threads: usize,

    /// Stack size for all request threads (bytes). Default: 2MB.
    pub stack_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::auto()
    }
}

impl DispatchConfig {
    /// Automatically configure based on available CPU cores.
    pub fn auto() -> Self {
        let available = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(4);

        Self::for_core_count(available)
    }

    /// Configure for a specific number of available cores.
    ///
    /// Two foreground threads (a build and a checkpoint scan run side by
    /// side), the rest split evenly. Below 4 cores every pool gets the
    /// minimum.
    pub fn for_core_count(total_cores: usize) -> Self {
        let (foreground, background) = if total_cores < 4 {
            (2, 1)
        } else {
            let foreground = (total_cores / 2).clamp(2, 8);
            let background = total_cores.saturating_sub(foreground).max(1);
            (foreground, background)
        };

        Self {
            foreground_threads: foreground,
            background_threads: background,
            stack_size: 2 * 1024 * 1024,
        }
    }

    /// Create a builder for custom configuration.
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::new()
    }

    /// Create a minimal configuration for testing (1 thread per pool).
    pub fn minimal() -> Self {
        Self {
            foreground_threads: 1,
            background_threads: 1,
            stack_size: 2 * 1024 * 1024,
        }
    }

    /// Total number of threads that will be spawned.
    pub fn total_threads(&self) -> usize {
        self.foreground_threads + self.background_threads
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.foreground_threads == 0 {
            return Err(DispatchError::InvalidConfig(
                "foreground_threads must be at least 1".to_string(),
            ));
        }
        if self.background_threads == 0 {
            return Err(DispatchError::InvalidConfig(
                "background_threads must be at least 1".to_string(),
            ));
        }
        if self.stack_size < 64 * 1024 {
            return Err(DispatchError::InvalidConfig(format!(
                "stack_size of {} bytes is below the 64KiB minimum",
                self.stack_size
            )));
        }
        Ok(())
    }
}

/// Builder for DispatchConfig.
#[derive(Debug, Clone)]
pub struct DispatchConfigBuilder {
    config: DispatchConfig,
}

impl DispatchConfigBuilder {
    /// Create a new builder with auto-detected defaults.
    pub fn new() -> Self {
        Self {
            config: DispatchConfig::auto(),
        }
    }

    pub fn foreground_threads(mut self, count: usize) -> Self {
        self.config.foreground_threads = count;
        self
    }

    pub fn background_threads(mut self, count: usize) -> Self {
        self.config.background_threads = count;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = size;
        self
    }

    /// Build the configuration, validating it first.
    pub fn build(self) -> Result<DispatchConfig, DispatchError> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build the configuration without validation.
    pub fn build_unchecked(self) -> DispatchConfig {
        self.config
    }
}

impl Default for DispatchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Rayon thread pool dispatch.
///
/// Owns one rayon pool per lane. Cloning shares the pools.
///
/// Spawned closures are wrapped in `rayon::ThreadPool::install()`, so that
/// `par_iter` inside a request runs on the request's pool.
#[derive(Clone)]
pub struct PooledDispatch {
    config: Arc<DispatchConfig>,
    foreground_pool: Arc<rayon::ThreadPool>,
    background_pool: Arc<rayon::ThreadPool>,
    foreground_pending: Arc<AtomicUsize>,
    background_pending: Arc<AtomicUsize>,
}

impl std::fmt::Debug for PooledDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledDispatch")
            .field("config", &self.config)
            .field("foreground_pending", &self.foreground_queue_depth())
            .field("background_pending", &self.background_queue_depth())
            .finish()
    }
}

impl PooledDispatch {
    /// Create a new pooled dispatch with the given configuration.
    pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
        config.validate()?;

        let foreground_pool = Arc::new(Self::build_pool(
            config.foreground_threads,
            config.stack_size,
            "trace-fg",
        )?);
        let background_pool = Arc::new(Self::build_pool(
            config.background_threads,
            config.stack_size,
            "trace-bg",
        )?);

        tracing::info!(
            foreground_threads = config.foreground_threads,
            background_threads = config.background_threads,
            stack_size = config.stack_size,
            "Request thread pools initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            foreground_pool,
            background_pool,
            foreground_pending: Arc::new(AtomicUsize::new(0)),
            background_pending: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Create with auto-detected configuration.
    pub fn auto() -> Result<Self, DispatchError> {
        Self::new(DispatchConfig::auto())
    }

    /// Get the configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn build_pool(
        threads: usize,
        stack_size: usize,
        prefix: &'static str,
    ) -> Result<rayon::ThreadPool, DispatchError> {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .stack_size(stack_size)
            .thread_name(move |i| format!("{prefix}-{i}"))
            .build()
            .map_err(|e| DispatchError::PoolBuild(e.to_string()))
    }

    fn spawn_on(
        pool: &Arc<rayon::ThreadPool>,
        pending: &Arc<AtomicUsize>,
        f: impl FnOnce() + Send + 'static,
    ) {
        pending.fetch_add(1, Ordering::Relaxed);
        let pending = pending.clone();
        let installed = Arc::clone(pool);
        pool.spawn_fifo(move || {
            installed.install(f);
            pending.fetch_sub(1, Ordering::Relaxed);
        });
    }
}

impl Dispatch for PooledDispatch {
    #[instrument(level = "debug", skip_all)]
    fn spawn_foreground(&self, f: impl FnOnce() + Send + 'static) {
        Self::spawn_on(&self.foreground_pool, &self.foreground_pending, f);
    }

    #[instrument(level = "debug", skip_all)]
    fn spawn_background(&self, f: impl FnOnce() + Send + 'static) {
        Self::spawn_on(&self.background_pool, &self.background_pending, f);
    }

    fn foreground_queue_depth(&self) -> usize {
        self.foreground_pending.load(Ordering::Relaxed)
    }

    fn background_queue_depth(&self) -> usize {
        self.background_pending.load(Ordering::Relaxed)
    }

    fn map_background<T, R>(&self, items: &[T], f: impl Fn(&T) -> R + Send + Sync) -> Vec<R>
    where
        T: Sync,
        R: Send,
    {
        self.background_pool.install(|| {
            use rayon::prelude::*;
            items.par_iter().map(f).collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_auto_config() {
        let config = DispatchConfig::auto();
        assert!(config.foreground_threads >= 2);
        assert!(config.background_threads >= 1);
        config.validate().unwrap();
    }

    #[test]
    fn test_for_core_count() {
        let config = DispatchConfig::for_core_count(2);
        assert_eq!(config.foreground_threads, 2);
        assert_eq!(config.background_threads, 1);

        let config = DispatchConfig::for_core_count(8);
        assert_eq!(config.foreground_threads, 4);
        assert_eq!(config.background_threads, 4);

        // Foreground is capped at 8.
        let config = DispatchConfig::for_core_count(32);
        assert_eq!(config.foreground_threads, 8);
        assert_eq!(config.background_threads, 24);
        assert_eq!(config.total_threads(), 32);
    }

    #[test]
    fn test_builder() {
        let config = DispatchConfig::builder()
            .foreground_threads(3)
            .background_threads(5)
            .build()
            .unwrap();
        assert_eq!(config.foreground_threads, 3);
        assert_eq!(config.background_threads, 5);
    }

    #[test]
    fn test_invalid_config() {
        let result = DispatchConfig::builder().foreground_threads(0).build();
        assert!(matches!(result, Err(DispatchError::InvalidConfig(_))));

        let result = DispatchConfig::builder().background_threads(0).build();
        assert!(result.is_err());

        let result = DispatchConfig::builder().stack_size(1024).build();
        assert!(result.is_err());

        let config = DispatchConfig::builder()
            .background_threads(0)
            .build_unchecked();
        assert!(PooledDispatch::new(config).is_err());
    }

    #[test]
    fn test_spawn_on_pools() {
        let dispatch = PooledDispatch::new(DispatchConfig::minimal()).unwrap();
        let (tx, rx) = mpsc::channel();

        let fg = tx.clone();
        dispatch.spawn_foreground(move || {
            let name = std::thread::current().name().map(str::to_string);
            fg.send(name).unwrap();
        });
        dispatch.spawn_background(move || {
            let name = std::thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        });

        let mut names: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, vec!["trace-bg-0", "trace-fg-0"]);
    }

    #[test]
    fn test_foreground_lane_is_fifo() {
        let dispatch = PooledDispatch::new(DispatchConfig::minimal()).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..20 {
            let tx = tx.clone();
            dispatch.spawn_foreground(move || tx.send(i).unwrap());
        }
        let order: Vec<_> = (0..20)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
            .collect();
        assert_eq!(order, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_map_background() {
        let dispatch = PooledDispatch::new(DispatchConfig::minimal()).unwrap();
        let doubled = dispatch.map_background(&[1u64, 2, 3, 4], |x| x * 2);
        assert_eq!(doubled, vec![2, 4, 6, 8]);
    }
}
