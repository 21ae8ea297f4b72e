//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a cell (or time segment) of a tessellation.
///
/// Cells are numbered `0..cell_count` in the order the tessellation
/// defines them. `CellId(n)` indexes `cell_centers()` row `n`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct CellId(pub u32);

impl CellId {
    /// The id as a `usize` for slice indexing.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CellId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

impl From<usize> for CellId {
    fn from(v: usize) -> Self {
        debug_assert!(v <= u32::MAX as usize, "cell index {v} exceeds u32::MAX");
        Self(v as u32)
    }
}

/// Counter for unique [`TessellationInstanceId`] allocation.
static TESSELLATION_INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for a frozen tessellation.
///
/// Allocated when a tessellation finishes growing. Partitions record the
/// id their cached cell index was computed against and recompute when a
/// different tessellation instance is bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TessellationInstanceId(u64);

impl TessellationInstanceId {
    /// Allocate a fresh, unique instance ID. Thread-safe.
    pub fn next() -> Self {
        Self(TESSELLATION_INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TessellationInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_are_unique() {
        let a = TessellationInstanceId::next();
        let b = TessellationInstanceId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn cell_id_roundtrips_index() {
        assert_eq!(CellId::from(7usize).index(), 7);
        assert_eq!(CellId(3).to_string(), "3");
    }
}
