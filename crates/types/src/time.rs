//! Time ranges.

use serde::{Deserialize, Serialize};

/// Inclusive range of timestamps `[start, end]`.
///
/// A range whose start is after its end is empty. Empty ranges are valid
/// values: requests over them complete without delivering anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    /// The range covering every representable timestamp.
    pub const ETERNITY: TimeRange = TimeRange {
        start: i64::MIN,
        end: i64::MAX,
    };

    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// The half-open range `(after, end]`.
    pub fn after(after: i64, end: i64) -> Self {
        match after.checked_add(1) {
            Some(start) => Self { start, end },
            None => Self {
                start: i64::MAX,
                end: i64::MIN,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, t: i64) -> bool {
        self.start <= t && t <= self.end
    }
}
