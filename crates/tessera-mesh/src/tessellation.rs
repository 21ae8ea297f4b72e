//! The core `Tessellation` trait and `dyn Tessellation` downcast support.

use crate::adjacency::Adjacency;
use crate::registry::Method;
use std::any::Any;
use std::fmt;
use tessera_core::{CellId, CellIndex, CellQuery, Points, TessellationError, TessellationInstanceId};

/// A frozen partition of space or time into cells.
///
/// Every algorithm variant implements this trait so that partition and
/// inference code never depends on which method produced the cells. A
/// value of a type implementing `Tessellation` is always fully grown: the
/// growing step lives on the method's config type (see
/// [`MethodConfig::tessellate`](crate::MethodConfig::tessellate)) and there
/// are no mutating methods, so a tessellation can be shared read-only
/// across threads and partitions.
///
/// # Object Safety
///
/// Designed for use as `dyn Tessellation`. Use `downcast_ref` to reach
/// variant-specific accessors such as nested child lookup.
pub trait Tessellation: Any + Send + Sync + fmt::Debug + 'static {
    /// The method that grew this tessellation.
    fn method(&self) -> Method;

    /// Number of coordinates a cell center has. Temporal tessellations
    /// partition the time axis and report 1.
    fn ndim(&self) -> usize;

    /// Total number of cells (or time segments).
    fn cell_count(&self) -> usize;

    /// Unique instance identifier, allocated when the tessellation was
    /// frozen.
    fn instance_id(&self) -> TessellationInstanceId;

    /// Cell centers in data units, row-major `cell_count * ndim`.
    ///
    /// For temporal tessellations these are segment midpoints.
    fn cell_centers(&self) -> &[f64];

    /// Undirected cell adjacency.
    fn cell_adjacency(&self) -> &Adjacency;

    /// Average characteristic distance between neighbouring cell centers,
    /// in data units (seconds for temporal tessellations).
    fn avg_distance(&self) -> f64;

    /// Map every row of `points` to zero, one or several cells.
    ///
    /// Deterministic for a fixed tessellation, input and input order.
    fn cell_index(
        &self,
        points: &Points,
        query: &CellQuery,
    ) -> Result<CellIndex, TessellationError>;

    /// Whether cells are time segments rather than spatial regions.
    fn is_temporal(&self) -> bool {
        false
    }

    /// Center of one cell, in data units.
    fn cell_center(&self, cell: CellId) -> Option<&[f64]> {
        let d = self.ndim();
        let i = cell.index();
        if i >= self.cell_count() {
            return None;
        }
        self.cell_centers().get(i * d..(i + 1) * d)
    }
}

impl dyn Tessellation {
    /// Attempt to downcast a trait object to a concrete tessellation type.
    pub fn downcast_ref<T: Tessellation>(&self) -> Option<&T> {
        (self as &dyn Any).downcast_ref::<T>()
    }
}

/// Check that a query table has the dimension a tessellation was grown in.
pub(crate) fn check_dim(expected: usize, points: &Points) -> Result<(), TessellationError> {
    if points.dim() != expected {
        return Err(TessellationError::DimensionMismatch {
            expected,
            found: points.dim(),
        });
    }
    Ok(())
}
