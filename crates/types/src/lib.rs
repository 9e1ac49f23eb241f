//! Core types for trace state histories.
//!
//! This crate provides the foundational types used throughout the state
//! history implementation:
//!
//! - **Identifiers**: [`Quark`] (attribute handle), [`TraceId`]
//! - **State**: [`StateValue`], [`StateInterval`]
//! - **Time**: [`TimeRange`]
//! - **Events**: [`TraceEvent`]
//! - **Synchronization**: [`Latch`], a one-shot completion signal
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod event;
mod interval;
mod latch;
mod quark;
mod time;
mod value;

pub use event::{TraceEvent, TraceId};
pub use interval::StateInterval;
pub use latch::{Latch, LatchState};
pub use quark::Quark;
pub use time::TimeRange;
pub use value::{StateValue, ValueKind};
