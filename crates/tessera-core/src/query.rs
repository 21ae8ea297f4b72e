//! Options controlling how locations are mapped onto cells.

use crate::error::TessellationError;
use serde::{Deserialize, Serialize};

/// Lower and upper bounds on a neighbour count. Either bound is optional.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Knn {
    /// Minimum count, if any.
    pub min: Option<usize>,
    /// Maximum count, if any.
    pub max: Option<usize>,
}

impl Knn {
    /// Both bounds.
    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Lower bound only.
    pub fn at_least(min: usize) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }

    /// Upper bound only.
    pub fn at_most(max: usize) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    /// Reject `min > max` and a zero upper bound.
    pub fn validate(&self) -> Result<(), TessellationError> {
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(TessellationError::config(format!(
                    "knn lower bound {min} exceeds upper bound {max}"
                )));
            }
        }
        if self.max == Some(0) {
            return Err(TessellationError::config("knn upper bound must be positive"));
        }
        Ok(())
    }

    /// Clamp `n` into the bounds.
    pub fn clamp(&self, n: usize) -> usize {
        let n = self.min.map_or(n, |min| n.max(min));
        self.max.map_or(n, |max| n.min(max))
    }
}

/// Options of a `cell_index` query.
///
/// With every option unset the query is a plain nearest-cell (Voronoi)
/// assignment and the result is a strict partition.
///
/// `min_location_count` is counted on the nearest-cell assignment and
/// applies first: excluded cells take no part in the `per_cell` bounds or
/// the per-location cover (`radius`, clamped by `knn`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CellQuery {
    /// Bounds on the number of cells every location is assigned to. The
    /// nearest cells are taken. Turns the partition into an overlapping
    /// cover.
    pub knn: Option<Knn>,
    /// Assign a location to every cell whose center lies within this
    /// distance (in data units), subject to the `knn` bounds.
    pub radius: Option<f64>,
    /// Bounds on the number of locations per cell. Cells holding too many
    /// locations keep only the nearest ones; cells holding too few claim
    /// their nearest locations, possibly overlapping neighbours.
    pub per_cell: Option<Knn>,
    /// Cells holding fewer locations on the nearest-cell assignment are
    /// excluded and their locations left unassigned, unless a later stage
    /// covers them with another cell. `Some(0)` explicitly disables the
    /// exclusion.
    pub min_location_count: Option<usize>,
}

impl CellQuery {
    /// A plain nearest-cell query.
    pub fn voronoi() -> Self {
        Self::default()
    }

    /// Set per-location cell bounds.
    pub fn with_knn(mut self, knn: Knn) -> Self {
        self.knn = Some(knn);
        self
    }

    /// Set the cover radius.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = Some(radius);
        self
    }

    /// Set per-cell location bounds.
    pub fn with_per_cell(mut self, bounds: Knn) -> Self {
        self.per_cell = Some(bounds);
        self
    }

    /// Set the minimum location count.
    pub fn with_min_location_count(mut self, n: usize) -> Self {
        self.min_location_count = Some(n);
        self
    }

    /// Whether the query is a plain nearest-cell assignment.
    pub fn is_voronoi(&self) -> bool {
        self.knn.is_none()
            && self.radius.is_none()
            && self.per_cell.is_none()
            && self.min_location_count.unwrap_or(0) == 0
    }

    /// Whether the query can yield an overlapping cover.
    pub fn may_overlap(&self) -> bool {
        self.radius.is_some()
            || self.knn.is_some_and(|k| k.max != Some(1))
            || self.per_cell.is_some_and(|k| k.min.is_some())
    }

    /// Check bounds and the radius.
    pub fn validate(&self) -> Result<(), TessellationError> {
        if let Some(knn) = &self.knn {
            knn.validate()?;
        }
        if let Some(bounds) = &self.per_cell {
            bounds.validate()?;
        }
        if let Some(r) = self.radius {
            if !r.is_finite() || r <= 0.0 {
                return Err(TessellationError::config(format!(
                    "radius must be finite and positive, got {r}"
                )));
            }
        }
        Ok(())
    }
}
