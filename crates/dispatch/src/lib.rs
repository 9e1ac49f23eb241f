//! Dispatch trait for running trace requests on execution lanes.
//!
//! A trace hands every event request to a [`Dispatch`] implementation, which
//! decides where the request's read loop runs:
//!
//! - [`SyncDispatch`] runs closures inline (deterministic tests)
//! - `PooledDispatch` (`tracestate-dispatch-pooled`) uses rayon thread pools
//!
//! # Lanes
//!
//! - **Foreground**: long sequential scans over the whole trace, i.e. history
//!   builds and checkpoint registration
//! - **Background**: short bounded scans issued by queries, i.e. partial
//!   history replays
//!
//! Keeping replays off the foreground lane means a query never queues behind
//! a full trace scan.

mod sync;

pub use sync::SyncDispatch;

/// Trait for dispatching request work to foreground and background lanes.
///
/// Implementations schedule fire-and-forget closures. Results are
/// communicated back through whatever the closure captures.
///
/// # Ordering Guarantee
///
/// Closures spawned on the same lane start in the order they were spawned.
/// A history build relies on this: it is sent after checkpoint registration
/// and blocks on it, so it must never run ahead of it on a single thread.
pub trait Dispatch: Send + Sync + Clone + 'static {
    /// Spawn a foreground task (full trace scans).
    fn spawn_foreground(&self, f: impl FnOnce() + Send + 'static);

    /// Spawn a background task (bounded replays).
    fn spawn_background(&self, f: impl FnOnce() + Send + 'static);

    /// Tasks spawned on the foreground lane and not finished yet.
    fn foreground_queue_depth(&self) -> usize;

    /// Tasks spawned on the background lane and not finished yet.
    fn background_queue_depth(&self) -> usize;

    /// Map a function over items on the background lane, potentially in
    /// parallel.
    ///
    /// This is a **blocking** call; it returns when all items are processed.
    /// `SyncDispatch` iterates sequentially.
    fn map_background<T, R>(&self, items: &[T], f: impl Fn(&T) -> R + Send + Sync) -> Vec<R>
    where
        T: Sync,
        R: Send;
}
