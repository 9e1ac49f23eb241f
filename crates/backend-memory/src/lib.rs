//! # In-Memory History Backend
//!
//! Full (non-partial) state history kept entirely in memory. Every closed
//! interval is stored, so any point query is answered exactly from storage.
//!
//! Serves as the inner storage of a partial history (where it only receives
//! checkpoint-crossing intervals) and as the reference history that partial
//! reconstructions are checked against.

mod backend;

pub use backend::InMemoryBackend;
