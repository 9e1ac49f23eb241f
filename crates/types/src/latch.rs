//! One-shot completion signal.
//!
//! Used wherever a component must block until a one-time initialization has
//! happened elsewhere: checkpoint registration, the end of a history build,
//! the binding of a scratch state system to its upstream, request completion.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// State of a [`Latch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    /// Not signalled yet.
    Pending,
    /// Signalled, the guarded work completed.
    Released,
    /// Signalled, the guarded work was abandoned.
    Failed,
}

/// A single-fire latch. Once it leaves [`LatchState::Pending`] it never
/// changes again, and every waiter (past and future) observes the final state.
#[derive(Debug)]
pub struct Latch {
    state: Mutex<LatchState>,
    signal: Condvar,
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

impl Latch {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(LatchState::Pending),
            signal: Condvar::new(),
        }
    }

    /// Mark the guarded work as completed. Returns `false` if the latch had
    /// already fired.
    pub fn release(&self) -> bool {
        self.fire(LatchState::Released)
    }

    /// Mark the guarded work as abandoned. Returns `false` if the latch had
    /// already fired.
    pub fn fail(&self) -> bool {
        self.fire(LatchState::Failed)
    }

    fn fire(&self, outcome: LatchState) -> bool {
        let mut state = self.state.lock();
        if *state != LatchState::Pending {
            return false;
        }
        *state = outcome;
        self.signal.notify_all();
        true
    }

    /// Current state, without blocking.
    pub fn state(&self) -> LatchState {
        *self.state.lock()
    }

    /// Block until the latch fires.
    pub fn wait(&self) -> LatchState {
        let mut state = self.state.lock();
        while *state == LatchState::Pending {
            self.signal.wait(&mut state);
        }
        *state
    }

    /// Block until the latch fires or `timeout` elapses. Returns
    /// [`LatchState::Pending`] on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> LatchState {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state == LatchState::Pending {
            if self.signal.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        *state
    }

    /// Wait with an optional timeout.
    pub fn wait_for(&self, timeout: Option<Duration>) -> LatchState {
        match timeout {
            Some(timeout) => self.wait_timeout(timeout),
            None => self.wait(),
        }
    }
}
