//! Partial state history.
//!
//! A full state history stores every interval the state system produces. A
//! partial history trades query time for space: it only stores the intervals
//! that cross a *checkpoint*, and rebuilds the state at any other time by
//! replaying the trace from the nearest earlier checkpoint.
//!
//! # Design
//!
//! - Checkpoints are sampled every `granularity` events by a one-shot scan
//!   of the whole trace, started when the backend is created
//!   ([`PartialHistoryBackend::new`]). Everything that needs them waits on a
//!   latch until the scan is done.
//! - An interval `[start, end]` is kept iff `start <= floor(checkpoints, end)`.
//!   Every checkpoint is therefore covered by stored intervals for all
//!   attributes, and a point query at a checkpoint is exact.
//! - A full query at `t` queries the inner backend at `c = floor(checkpoints,
//!   t)`, seeds a [`ScratchStateSystem`] with the result, replays the events
//!   of `(c, t]` through a private state provider bound to the scratch
//!   system, and reads the scratch system's ongoing state back.
//!
//! The scratch system is a single shared scratchpad, so queries serialize on
//! its query lock. Returned intervals end at the query time: their real end
//! is not known without replaying further.

mod backend;
mod checkpoints;
mod config;
mod error;
mod replay;
mod scratch;

pub use backend::PartialHistoryBackend;
pub use config::{PartialHistoryConfig, DEFAULT_GRANULARITY};
pub use error::PartialHistoryError;
pub use scratch::{QueryGuard, ScratchStateSystem};
