//! Attribute handles.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Dense, non-negative handle of an attribute in an attribute tree.
///
/// Quarks are assigned in creation order starting at 0, so they double as
/// indices into per-attribute tables (ongoing state, query results).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Quark(pub u32);

impl Quark {
    /// Build a quark from a table index.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in a `u32`. Attribute trees never get
    /// that large.
    pub fn from_index(index: usize) -> Self {
        Self(u32::try_from(index).expect("attribute index overflows u32"))
    }

    /// The index of this quark in per-attribute tables.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Quark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Quark {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
