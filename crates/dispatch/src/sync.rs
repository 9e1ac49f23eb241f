//! Synchronous inline dispatch.

use crate::Dispatch;

/// Dispatch that runs closures inline on the calling thread.
///
/// Used by tests for deterministic execution: a request has completed by the
/// time `send_request` returns. Queue depths are always 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncDispatch;

impl SyncDispatch {
    pub fn new() -> Self {
        Self
    }
}

impl Dispatch for SyncDispatch {
    fn spawn_foreground(&self, f: impl FnOnce() + Send + 'static) {
        f();
    }

    fn spawn_background(&self, f: impl FnOnce() + Send + 'static) {
        f();
    }

    fn foreground_queue_depth(&self) -> usize {
        0
    }

    fn background_queue_depth(&self) -> usize {
        0
    }

    fn map_background<T, R>(&self, items: &[T], f: impl Fn(&T) -> R + Send + Sync) -> Vec<R>
    where
        T: Sync,
        R: Send,
    {
        items.iter().map(f).collect()
    }
}
