//! Regular hypercube lattice.

use crate::adjacency::Adjacency;
use crate::centers::CellCenters;
use crate::params::{prepare, resolve_spacing, CommonParams, SIZE_FLOOR_FACTOR};
use crate::registry::Method;
use crate::tessellation::Tessellation;
use serde::{Deserialize, Serialize};
use tessera_core::{
    BoundingBox, CellId, CellIndex, CellQuery, Points, Scaler, TessellationError,
    TessellationInstanceId,
};

/// Settings of the grid method.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Explicit number of slices per dimension. Overrides the distance and
    /// count targets; the size floor still applies.
    pub slices: Option<Vec<usize>>,
}

impl GridConfig {
    /// Explicit slice counts.
    pub fn with_slices(slices: Vec<usize>) -> Self {
        Self {
            slices: Some(slices),
        }
    }

    /// Grow a grid over the bounding box of `reference`.
    pub fn tessellate(
        &self,
        reference: &Points,
        common: &CommonParams,
    ) -> Result<GridMesh, TessellationError> {
        let prep = prepare(Method::Grid, reference, common)?;
        let dim = prep.scaled.dim();
        let (spacing, floor) = match &self.slices {
            Some(s) => {
                if s.len() != dim {
                    return Err(TessellationError::DimensionMismatch {
                        expected: s.len(),
                        found: dim,
                    });
                }
                if s.contains(&0) {
                    return Err(TessellationError::config("grid slice counts must be positive"));
                }
                let floor = prep
                    .distance
                    .filter(|_| common.size_floor_enabled())
                    .map(|d| SIZE_FLOOR_FACTOR * d);
                (None, floor)
            }
            None => {
                let s = resolve_spacing(Method::Grid, &prep, common, 1.0)?;
                (Some(s.spacing), s.floor)
            }
        };

        let mut lower = prep.bbox.lower().to_vec();
        let mut upper = prep.bbox.upper().to_vec();
        let flat_extent = spacing.or(floor).unwrap_or(prep.bbox.max_extent());
        let mut slices = Vec::with_capacity(dim);
        for k in 0..dim {
            let mut extent = upper[k] - lower[k];
            let min_extent = if extent <= 0.0 {
                flat_extent
            } else {
                floor.unwrap_or(0.0)
            };
            if extent < min_extent {
                let pad = 0.5 * (min_extent - extent);
                lower[k] -= pad;
                upper[k] += pad;
                extent = min_extent;
            }
            let mut n = match (&self.slices, spacing) {
                (Some(s), _) => s[k],
                (None, Some(sp)) => ((extent / sp).round() as usize).max(1),
                (None, None) => 1,
            };
            if let Some(f) = floor {
                if extent / n as f64 + 1e-12 * extent < f {
                    n = ((extent / f * (1.0 - 1e-12)).floor() as usize).max(1);
                }
            }
            slices.push(n);
        }
        GridMesh::build(prep.scaler, lower, upper, slices)
    }
}

/// A frozen hypercube grid.
///
/// Cells are numbered row-major with the last axis varying fastest.
/// Locations outside the grid are clamped into the border cells.
#[derive(Clone, Debug)]
pub struct GridMesh {
    lower: Vec<f64>,
    widths: Vec<f64>,
    slices: Vec<usize>,
    strides: Vec<usize>,
    centers: CellCenters,
    adjacency: Adjacency,
    avg_distance: f64,
    instance_id: TessellationInstanceId,
}

impl GridMesh {
    fn build(
        scaler: Scaler,
        lower: Vec<f64>,
        upper: Vec<f64>,
        slices: Vec<usize>,
    ) -> Result<Self, TessellationError> {
        let dim = slices.len();
        let total = slices
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .filter(|&n| n <= u32::MAX as usize)
            .ok_or_else(|| {
                TessellationError::config(format!("grid with slices {slices:?} has too many cells"))
            })?;
        let widths: Vec<f64> = (0..dim)
            .map(|k| (upper[k] - lower[k]) / slices[k] as f64)
            .collect();
        let mut strides = vec![1usize; dim];
        for k in (0..dim.saturating_sub(1)).rev() {
            strides[k] = strides[k + 1] * slices[k + 1];
        }

        let mut scaled = Vec::with_capacity(total * dim);
        let mut edges = Vec::with_capacity(total * dim);
        for cell in 0..total {
            for k in 0..dim {
                let i = (cell / strides[k]) % slices[k];
                scaled.push(lower[k] + (i as f64 + 0.5) * widths[k]);
                if i + 1 < slices[k] {
                    edges.push((cell, cell + strides[k]));
                }
            }
        }
        let centers = CellCenters::new(scaler, scaled);
        let adjacency = Adjacency::from_edges(total, edges);
        let mean_width = widths.iter().sum::<f64>() / dim as f64;
        let avg_distance = centers
            .mean_edge_length(&adjacency)
            .unwrap_or_else(|| centers.scaler().unscale_distance(mean_width));
        Ok(Self {
            lower,
            widths,
            slices,
            strides,
            centers,
            adjacency,
            avg_distance,
            instance_id: TessellationInstanceId::next(),
        })
    }

    pub(crate) fn centers(&self) -> &CellCenters {
        &self.centers
    }

    /// Number of slices per dimension.
    pub fn slices(&self) -> &[usize] {
        &self.slices
    }

    /// Cell width per dimension, in data units.
    pub fn cell_widths(&self) -> Vec<f64> {
        let scaler = self.centers.scaler();
        self.widths.iter().map(|w| scaler.unscale_distance(*w)).collect()
    }

    /// Extent of the whole grid, in data units.
    pub fn bounds(&self) -> Option<BoundingBox> {
        let scaler = self.centers.scaler();
        let upper: Vec<f64> = self
            .lower
            .iter()
            .zip(&self.widths)
            .zip(&self.slices)
            .map(|((lo, w), n)| lo + w * *n as f64)
            .collect();
        BoundingBox::new(scaler.unscale_rows(&self.lower), scaler.unscale_rows(&upper))
    }

    /// Cell containing a scaled row, clamping outside points.
    fn digitize(&self, q: &[f64]) -> CellId {
        let mut cell = 0usize;
        for (k, x) in q.iter().enumerate() {
            let i = ((x - self.lower[k]) / self.widths[k]).floor();
            let i = if i < 0.0 {
                0
            } else {
                (i as usize).min(self.slices[k] - 1)
            };
            cell += i * self.strides[k];
        }
        CellId::from(cell)
    }
}

impl Tessellation for GridMesh {
    fn method(&self) -> Method {
        Method::Grid
    }

    fn ndim(&self) -> usize {
        self.slices.len()
    }

    fn cell_count(&self) -> usize {
        self.centers.len()
    }

    fn instance_id(&self) -> TessellationInstanceId {
        self.instance_id
    }

    fn cell_centers(&self) -> &[f64] {
        self.centers.as_slice()
    }

    fn cell_adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    fn avg_distance(&self) -> f64 {
        self.avg_distance
    }

    fn cell_index(
        &self,
        points: &Points,
        query: &CellQuery,
    ) -> Result<CellIndex, TessellationError> {
        self.centers
            .query(points, query, |q| Some(self.digitize(q)))
    }
}
