//! Tessellations defined by their centers alone.

use crate::adjacency::Adjacency;
use crate::centers::CellCenters;
use crate::registry::Method;
use crate::tessellation::Tessellation;
use tessera_core::{CellIndex, CellQuery, Points, TessellationError, TessellationInstanceId};

/// A Voronoi tessellation: every location belongs to its nearest center.
///
/// Produced by the random, k-means and growing gas methods.
#[derive(Clone, Debug)]
pub struct VoronoiMesh {
    method: Method,
    centers: CellCenters,
    adjacency: Adjacency,
    avg_distance: f64,
    instance_id: TessellationInstanceId,
}

impl VoronoiMesh {
    /// Freeze `centers` with the given adjacency.
    ///
    /// `fallback_distance` (data units) is reported as `avg_distance` when
    /// the adjacency has no edges.
    pub(crate) fn new(
        method: Method,
        centers: CellCenters,
        adjacency: Adjacency,
        fallback_distance: f64,
    ) -> Self {
        let avg_distance = centers
            .mean_edge_length(&adjacency)
            .unwrap_or(fallback_distance);
        Self {
            method,
            centers,
            adjacency,
            avg_distance,
            instance_id: TessellationInstanceId::next(),
        }
    }

    /// Centers and their search index.
    pub fn centers(&self) -> &CellCenters {
        &self.centers
    }
}

impl Tessellation for VoronoiMesh {
    fn method(&self) -> Method {
        self.method
    }

    fn ndim(&self) -> usize {
        self.centers.dim()
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
        self.centers.query(points, query, |q| self.centers.nearest(q))
    }
}

/// Nearest-center counts of `scaled` rows.
pub(crate) fn occupancy(centers: &CellCenters, scaled: &Points) -> Vec<usize> {
    let mut counts = vec![0usize; centers.len()];
    for q in scaled.rows() {
        if let Some(c) = centers.nearest(q) {
            counts[c.index()] += 1;
        }
    }
    counts
}

/// Keep the scaled center rows for which `keep` is true.
pub(crate) fn retain_rows(dim: usize, scaled: &[f64], keep: &[bool]) -> Vec<f64> {
    scaled
        .chunks_exact(dim)
        .zip(keep)
        .filter(|(_, k)| **k)
        .flat_map(|(row, _)| row.iter().copied())
        .collect()
}
