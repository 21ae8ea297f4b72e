//! Uniformly random cell centers.

use crate::centers::CellCenters;
use crate::params::{prepare, CommonParams, SPACING_FACTOR};
use crate::registry::Method;
use crate::voronoi::{occupancy, retain_rows, VoronoiMesh};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tessera_core::{Points, TessellationError};
use tracing::warn;

/// Settings of the random method.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RandomConfig {
    /// Keep centers that attract no reference location.
    pub keep_empty: bool,
}

impl RandomConfig {
    /// Draw centers uniformly in the bounding box of `reference`.
    ///
    /// The number of centers is the count target, or the number of `2d`
    /// hypercubes that fit in the bounding box.
    pub fn tessellate(
        &self,
        reference: &Points,
        common: &CommonParams,
    ) -> Result<VoronoiMesh, TessellationError> {
        let prep = prepare(Method::Random, reference, common)?;
        let count = match (common.target_cell_count(reference.len()), prep.distance) {
            (Some(n), _) => n,
            (None, Some(d)) => {
                let dims = prep.bbox.spanned_dims().max(1) as i32;
                let n = prep.bbox.volume() / (SPACING_FACTOR * d).powi(dims);
                (n.round() as usize).max(1)
            }
            (None, None) => {
                return Err(TessellationError::config(
                    "random needs a cell count, an average location count or a distance",
                ))
            }
        };

        let dim = prep.scaled.dim();
        let lower = prep.bbox.lower();
        let upper = prep.bbox.upper();
        let mut rng = ChaCha8Rng::seed_from_u64(common.seed);
        let mut scaled = Vec::with_capacity(count * dim);
        for _ in 0..count {
            for k in 0..dim {
                scaled.push(lower[k] + (upper[k] - lower[k]) * rng.random::<f64>());
            }
        }

        let mut centers = CellCenters::new(prep.scaler.clone(), scaled);
        if !self.keep_empty {
            let counts = occupancy(&centers, &prep.scaled);
            let keep: Vec<bool> = counts.iter().map(|&n| n > 0).collect();
            let dropped = keep.iter().filter(|k| !**k).count();
            if dropped > 0 {
                warn!(
                    dropped,
                    kept = count - dropped,
                    "random: dropping centers without reference locations"
                );
                let kept = retain_rows(dim, &centers.scaled_buffer(), &keep);
                centers = CellCenters::new(prep.scaler.clone(), kept);
            }
        }
        let adjacency = centers.gabriel_graph();
        let fallback = prep
            .scaler
            .unscale_distance(prep.distance.map_or(prep.bbox.max_extent(), |d| SPACING_FACTOR * d));
        Ok(VoronoiMesh::new(Method::Random, centers, adjacency, fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance;
    use crate::tessellation::Tessellation;

    fn cloud() -> Points {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let coords = (0..400).map(|_| rng.random::<f64>()).collect();
        Points::new(2, coords).unwrap()
    }

    #[test]
    fn same_seed_same_centers() {
        let common = CommonParams::default().with_cell_count(20).with_seed(3);
        let a = RandomConfig::default().tessellate(&cloud(), &common).unwrap();
        let b = RandomConfig::default().tessellate(&cloud(), &common).unwrap();
        assert_eq!(a.cell_centers(), b.cell_centers());
        let c = RandomConfig::default()
            .tessellate(&cloud(), &common.clone().with_seed(4))
            .unwrap();
        assert_ne!(a.cell_centers(), c.cell_centers());
    }

    #[test]
    fn empty_centers_are_dropped_unless_kept() {
        // Two tight clusters leave most of the box empty.
        let p = Points::from_rows(2, &[[0.0, 0.0], [0.01, 0.0], [1.0, 1.0], [0.99, 1.0]]).unwrap();
        let common = CommonParams::default().with_cell_count(50);
        let dropped = RandomConfig::default().tessellate(&p, &common).unwrap();
        assert!(dropped.cell_count() <= 4);
        let counts = occupancy(dropped.centers(), &p);
        assert!(counts.iter().all(|&n| n > 0));

        let kept = RandomConfig { keep_empty: true }.tessellate(&p, &common).unwrap();
        assert_eq!(kept.cell_count(), 50);
    }

    #[test]
    fn count_from_distance() {
        let m = RandomConfig { keep_empty: true }
            .tessellate(&cloud(), &CommonParams::default().with_distance(0.1))
            .unwrap();
        // About 1 / 0.2^2 cells on the unit square.
        assert!((18..=26).contains(&m.cell_count()));
    }

    #[test]
    fn compliance_suite() {
        let p = cloud();
        let m = RandomConfig::default()
            .tessellate(&p, &CommonParams::default().with_cell_count(15))
            .unwrap();
        compliance::run_full_compliance(&m, &p);
    }
}
