use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracestate_dispatch::Dispatch;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Dispatch that queues work until [`run_pending`](Self::run_pending).
///
/// Lets a test act on a request (cancel it, race it) before it starts.
/// Both lanes share one FIFO queue.
#[derive(Clone, Default)]
pub struct ManualDispatch {
    queue: Arc<Mutex<VecDeque<(Lane, Job)>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    Foreground,
    Background,
}

impl std::fmt::Debug for ManualDispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualDispatch")
            .field("pending", &self.queue.lock().len())
            .finish()
    }
}

impl ManualDispatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run queued work, including work queued while running, until the
    /// queue is empty. Returns how many jobs ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        // The lock is not held while a job runs: jobs may queue more work.
        while let Some((_, job)) = self.queue.lock().pop_front() {
            job();
            ran += 1;
        }
        ran
    }

    fn depth(&self, lane: Lane) -> usize {
        self.queue.lock().iter().filter(|(l, _)| *l == lane).count()
    }
}

impl Dispatch for ManualDispatch {
    fn spawn_foreground(&self, f: impl FnOnce() + Send + 'static) {
        self.queue.lock().push_back((Lane::Foreground, Box::new(f)));
    }

    fn spawn_background(&self, f: impl FnOnce() + Send + 'static) {
        self.queue.lock().push_back((Lane::Background, Box::new(f)));
    }

    fn foreground_queue_depth(&self) -> usize {
        self.depth(Lane::Foreground)
    }

    fn background_queue_depth(&self) -> usize {
        self.depth(Lane::Background)
    }

    fn map_background<T, R>(&self, items: &[T], f: impl Fn(&T) -> R + Send + Sync) -> Vec<R>
    where
        T: Sync,
        R: Send,
    {
        items.iter().map(f).collect()
    }
}
