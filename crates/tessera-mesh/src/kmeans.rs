//! Grid-initialized k-means.

use crate::centers::{dist2, CellCenters};
use crate::grid::GridConfig;
use crate::params::{prepare, CommonParams};
use crate::registry::Method;
use crate::search::KdIndex;
use crate::tessellation::Tessellation;
use crate::voronoi::{occupancy, retain_rows, VoronoiMesh};
use serde::{Deserialize, Serialize};
use tessera_core::{Points, TessellationError};
use tracing::{debug, trace};

/// Settings of the k-means method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KMeansConfig {
    /// Convergence threshold on the largest center move, as a fraction of
    /// the reference distance. Default: 0.01.
    pub tolerance: f64,
    /// Maximum number of Lloyd iterations. Default: 100.
    pub max_iterations: usize,
    /// Target average fraction of the reference set per cell. Overrides
    /// the count targets of [`CommonParams`].
    pub avg_probability: Option<f64>,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            max_iterations: 100,
            avg_probability: None,
        }
    }
}

impl KMeansConfig {
    /// Check the tolerance and the target probability.
    pub fn validate(&self) -> Result<(), TessellationError> {
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(TessellationError::config(format!(
                "kmeans tolerance must be finite and positive, got {}",
                self.tolerance
            )));
        }
        if let Some(p) = self.avg_probability {
            if !(p > 0.0 && p <= 1.0) {
                return Err(TessellationError::config(format!(
                    "avg_probability must be in (0, 1], got {p}"
                )));
            }
        }
        Ok(())
    }

    /// Initialize centers on a grid and refine them by Lloyd iterations.
    pub fn tessellate(
        &self,
        reference: &Points,
        common: &CommonParams,
    ) -> Result<VoronoiMesh, TessellationError> {
        self.validate()?;
        let mut common = common.clone();
        if let Some(p) = self.avg_probability {
            common.cell_count = Some(((1.0 / p).round() as usize).max(1));
            common.avg_location_count = None;
        }
        let prep = prepare(Method::KMeans, reference, &common)?;
        let grid = GridConfig::default().tessellate(reference, &common)?;
        let dim = prep.scaled.dim();
        let scale = prep
            .distance
            .unwrap_or_else(|| prep.scaler.scale_distance(grid.avg_distance()));
        let threshold = self.tolerance * scale;

        let seeds = grid.centers();
        let keep: Vec<bool> = occupancy(seeds, &prep.scaled).iter().map(|&n| n > 0).collect();
        let mut centers = retain_rows(dim, &seeds.scaled_buffer(), &keep);

        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            let (next, shift) = lloyd_step(dim, &centers, &prep.scaled);
            trace!(
                iteration = iterations,
                cells = next.len() / dim,
                shift,
                "kmeans iteration"
            );
            centers = next;
            if shift < threshold {
                break;
            }
        }
        let centers = CellCenters::new(prep.scaler.clone(), centers);
        let keep: Vec<bool> = occupancy(&centers, &prep.scaled).iter().map(|&n| n > 0).collect();
        let centers = if keep.iter().all(|k| *k) {
            centers
        } else {
            CellCenters::new(
                prep.scaler.clone(),
                retain_rows(dim, &centers.scaled_buffer(), &keep),
            )
        };
        debug!(iterations, cells = centers.len(), "kmeans converged");

        let adjacency = centers.gabriel_graph();
        let fallback = grid.avg_distance();
        Ok(VoronoiMesh::new(Method::KMeans, centers, adjacency, fallback))
    }
}

/// One Lloyd iteration: move every center to the mean of its members and
/// drop centers left without members. Returns the new centers and the
/// largest move.
fn lloyd_step(dim: usize, centers: &[f64], scaled: &Points) -> (Vec<f64>, f64) {
    let index = KdIndex::new(dim, centers.to_vec());
    let n = index.len();
    let mut sums = vec![0.0; n * dim];
    let mut counts = vec![0usize; n];
    for q in scaled.rows() {
        if let Some(nb) = index.nearest(q) {
            counts[nb.index] += 1;
            for (s, x) in sums[nb.index * dim..(nb.index + 1) * dim].iter_mut().zip(q) {
                *s += x;
            }
        }
    }
    let mut next = Vec::with_capacity(n * dim);
    let mut shift: f64 = 0.0;
    for c in 0..n {
        if counts[c] == 0 {
            continue;
        }
        let mean: Vec<f64> = sums[c * dim..(c + 1) * dim]
            .iter()
            .map(|s| s / counts[c] as f64)
            .collect();
        shift = shift.max(dist2(&mean, index.row(c)).sqrt());
        next.extend(mean);
    }
    (next, shift)
}
