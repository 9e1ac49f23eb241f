//! # Threaded State Provider
//!
//! Events go through a bounded crossbeam channel to a dedicated worker
//! thread that owns the [`EventHandler`]. Control messages travel on the same
//! channel, which gives them queue ordering for free:
//!
//! - a flush marker is acknowledged once every event before it has been
//!   handled, so waiting for an empty queue is a blocking `recv`
//! - a stop marker ends the worker after the events before it
//!
//! The worker starts when the provider is assigned its target state system.

use crate::{EventHandler, ProviderError, StateProvider};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracestate_statesystem::StateSystemBuilder;
use tracestate_trace::Trace;
use tracestate_types::TraceEvent;

/// Queue capacity used when none is configured.
pub const DEFAULT_QUEUE_SIZE: usize = 127;

enum Message {
    Event(TraceEvent),
    Flush(Sender<()>),
    Stop,
}

/// A state provider running its handler on a worker thread.
pub struct ThreadedStateProvider {
    id: String,
    trace: Arc<dyn Trace>,
    queue_size: usize,
    /// Configured handler; the worker runs a copy of it.
    template: Mutex<Box<dyn EventHandler>>,
    sender: Sender<Message>,
    receiver: Mutex<Option<Receiver<Message>>>,
    target: RwLock<Option<Arc<dyn StateSystemBuilder>>>,
    failure: Arc<Mutex<Option<ProviderError>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl std::fmt::Debug for ThreadedStateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadedStateProvider")
            .field("id", &self.id)
            .field("queue_size", &self.queue_size)
            .field("queued", &self.sender.len())
            .field("assigned", &self.target.read().is_some())
            .field("disposed", &self.disposed.load(Ordering::Relaxed))
            .finish()
    }
}

impl ThreadedStateProvider {
    pub fn new(
        id: impl Into<String>,
        trace: Arc<dyn Trace>,
        handler: Box<dyn EventHandler>,
        queue_size: usize,
    ) -> Self {
        let queue_size = queue_size.max(1);
        let (sender, receiver) = channel::bounded(queue_size);
        Self {
            id: id.into(),
            trace,
            queue_size,
            template: Mutex::new(handler),
            sender,
            receiver: Mutex::new(Some(receiver)),
            target: RwLock::new(None),
            failure: Arc::new(Mutex::new(None)),
            worker: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn with_default_queue(
        id: impl Into<String>,
        trace: Arc<dyn Trace>,
        handler: Box<dyn EventHandler>,
    ) -> Self {
        Self::new(id, trace, handler, DEFAULT_QUEUE_SIZE)
    }

    pub fn queue_size(&self) -> usize {
        self.queue_size
    }

    fn disposed_error(&self) -> ProviderError {
        ProviderError::Disposed {
            provider: self.id.clone(),
        }
    }

    fn timeout_error(&self, after: Duration) -> ProviderError {
        ProviderError::Timeout {
            provider: self.id.clone(),
            after,
        }
    }

    fn check_running(&self) -> Result<(), ProviderError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(self.disposed_error());
        }
        if self.target.read().is_none() {
            return Err(ProviderError::NotAssigned {
                provider: self.id.clone(),
            });
        }
        Ok(())
    }

    fn flush(&self, timeout: Option<Duration>) -> Result<(), ProviderError> {
        self.check_running()?;
        let (ack, acked) = channel::bounded(1);
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        match deadline {
            None => self
                .sender
                .send(Message::Flush(ack))
                .map_err(|_| self.disposed_error())?,
            Some(deadline) => self
                .sender
                .send_deadline(Message::Flush(ack), deadline)
                .map_err(|error| match error {
                    SendTimeoutError::Timeout(_) => self.timeout_error(timeout.unwrap_or_default()),
                    SendTimeoutError::Disconnected(_) => self.disposed_error(),
                })?,
        }

        match deadline {
            None => acked.recv().map_err(|_| self.disposed_error()),
            Some(deadline) => acked.recv_deadline(deadline).map_err(|error| match error {
                RecvTimeoutError::Timeout => self.timeout_error(timeout.unwrap_or_default()),
                RecvTimeoutError::Disconnected => self.disposed_error(),
            }),
        }
    }
}

fn run_worker(
    id: String,
    mut handler: Box<dyn EventHandler>,
    target: Arc<dyn StateSystemBuilder>,
    receiver: Receiver<Message>,
    failure: Arc<Mutex<Option<ProviderError>>>,
) {
    let mut handled: u64 = 0;
    let mut failed = false;
    for message in receiver {
        match message {
            Message::Event(event) => {
                if failed {
                    continue;
                }
                if let Err(source) = handler.handle_event(target.as_ref(), &event) {
                    tracing::error!(
                        provider = %id,
                        rank = event.rank,
                        timestamp = event.timestamp,
                        error = %source,
                        "Event handler failed, dropping further events"
                    );
                    *failure.lock() = Some(ProviderError::Handler {
                        provider: id.clone(),
                        rank: event.rank,
                        source,
                    });
                    failed = true;
                }
                handled += 1;
            }
            Message::Flush(ack) => {
                let _ = ack.send(());
            }
            Message::Stop => break,
        }
    }
    tracing::debug!(provider = %id, handled, "State provider worker stopped");
}

impl StateProvider for ThreadedStateProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn trace(&self) -> &Arc<dyn Trace> {
        &self.trace
    }

    fn start_time(&self) -> i64 {
        self.trace.start_time()
    }

    fn assign_target_state_system(
        &self,
        ss: Arc<dyn StateSystemBuilder>,
    ) -> Result<(), ProviderError> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(self.disposed_error());
        }
        let mut target = self.target.write();
        let Some(receiver) = self.receiver.lock().take() else {
            return Err(ProviderError::AlreadyAssigned {
                provider: self.id.clone(),
            });
        };

        let handler = self.template.lock().boxed_clone();
        let worker = {
            let id = self.id.clone();
            let ss = ss.clone();
            let failure = self.failure.clone();
            std::thread::Builder::new()
                .name(format!("provider-{}", self.id))
                .spawn(move || run_worker(id, handler, ss, receiver, failure))
        };
        match worker {
            Ok(handle) => *self.worker.lock() = Some(handle),
            Err(error) => {
                tracing::error!(provider = %self.id, %error, "Failed to spawn state provider worker");
                return Err(self.disposed_error());
            }
        }

        tracing::debug!(provider = %self.id, ssid = %ss.ssid(), "State provider assigned");
        *target = Some(ss);
        Ok(())
    }

    fn assigned_state_system(&self) -> Option<Arc<dyn StateSystemBuilder>> {
        self.target.read().clone()
    }

    fn process_event(&self, event: &TraceEvent) -> Result<(), ProviderError> {
        self.check_running()?;
        self.sender
            .send(Message::Event(event.clone()))
            .map_err(|_| self.disposed_error())
    }

    fn wait_for_empty_queue(&self) -> Result<(), ProviderError> {
        self.flush(None)
    }

    fn wait_for_empty_queue_timeout(&self, timeout: Duration) -> Result<(), ProviderError> {
        self.flush(Some(timeout))
    }

    fn failure(&self) -> Option<ProviderError> {
        self.failure.lock().clone()
    }

    fn new_instance(&self) -> Arc<dyn StateProvider> {
        Arc::new(Self::new(
            self.id.clone(),
            self.trace.clone(),
            self.template.lock().boxed_clone(),
            self.queue_size,
        ))
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let _ = self.sender.send(Message::Stop);
        // The last owner may be released from the worker itself.
        if worker.thread().id() == std::thread::current().id() {
            return;
        }
        if worker.join().is_err() {
            tracing::error!(provider = %self.id, "State provider worker panicked");
        }
    }
}

impl Drop for ThreadedStateProvider {
    fn drop(&mut self) {
        self.dispose();
    }
}
