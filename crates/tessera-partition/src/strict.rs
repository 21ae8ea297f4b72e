//! Partition-time enforcement of a minimum location count per cell.
//!
//! Tessellation-time size targets only steer growth. A
//! [`StrictConstraint`] is authoritative: after [`StrictConstraint::enforce`]
//! no cell holding locations holds fewer than the threshold.

use crate::error::PartitionError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tessera_core::{CellId, CellIndex};
use tessera_mesh::Tessellation;

/// What happens to a cell below the threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrictPolicy {
    /// The cell loses its locations.
    #[default]
    Discard,
    /// The cell is merged into its nearest adjacent populated cell.
    Merge,
}

/// A minimum location count enforced on a cell index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrictConstraint {
    /// Populated cells must hold at least this many locations.
    pub min_location_count: usize,
    /// How offending cells are handled.
    pub policy: StrictPolicy,
}

/// Result of enforcing a constraint.
#[derive(Clone, Debug, PartialEq)]
pub struct Enforcement {
    /// The constrained index, in the tessellation's cell id space.
    pub index: CellIndex,
    /// Cells merged away, mapped to the cell that absorbed them.
    pub merged_into: BTreeMap<CellId, CellId>,
    /// Cells whose locations were dropped, in increasing order.
    pub discarded: Vec<CellId>,
}

impl StrictConstraint {
    /// Discard cells holding fewer than `min_location_count` locations.
    pub fn discard(min_location_count: usize) -> Self {
        Self {
            min_location_count,
            policy: StrictPolicy::Discard,
        }
    }

    /// Merge cells holding fewer than `min_location_count` locations.
    pub fn merge(min_location_count: usize) -> Self {
        Self {
            min_location_count,
            policy: StrictPolicy::Merge,
        }
    }

    /// Reject a zero threshold, which would constrain nothing.
    pub fn validate(&self) -> Result<(), PartitionError> {
        if self.min_location_count == 0 {
            return Err(PartitionError::constraint(
                "strict min_location_count must be positive",
            ));
        }
        Ok(())
    }

    /// Apply the constraint to `index`, an assignment onto the cells of
    /// `tessellation`.
    pub fn enforce(&self, index: &CellIndex, tessellation: &dyn Tessellation) -> Enforcement {
        match self.policy {
            StrictPolicy::Discard => self.discard_cells(index, tessellation.cell_count()),
            StrictPolicy::Merge => self.merge_cells(index, tessellation),
        }
    }

    fn is_offending(&self, count: usize) -> bool {
        count > 0 && count < self.min_location_count
    }

    fn discard_cells(&self, index: &CellIndex, cell_count: usize) -> Enforcement {
        let counts = index.location_count(cell_count);
        let discarded: Vec<CellId> = (0..cell_count)
            .filter(|&c| self.is_offending(counts[c]))
            .map(CellId::from)
            .collect();
        let mut index = index.clone();
        index.retain_cells(|c| !self.is_offending(counts[c.index()]));
        Enforcement {
            index,
            merged_into: BTreeMap::new(),
            discarded,
        }
    }

    /// Merge offending cells one at a time, smallest first.
    ///
    /// Every group keeps the sorted set of locations it holds, so merging
    /// two cells of an overlapping cover counts shared locations once.
    fn merge_cells(&self, index: &CellIndex, t: &dyn Tessellation) -> Enforcement {
        let n = t.cell_count();
        let isolated = t.cell_adjacency().edge_count() == 0;
        let mut locations: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (i, c) in index.iter_pairs() {
            if let Some(held) = locations.get_mut(c.index()) {
                held.push(i);
            }
        }
        let mut pending: BTreeSet<(usize, usize)> = locations
            .iter()
            .enumerate()
            .filter(|(_, held)| self.is_offending(held.len()))
            .map(|(c, held)| (held.len(), c))
            .collect();
        let mut owner: Vec<usize> = (0..n).collect();
        let mut members: Vec<Vec<usize>> = (0..n).map(|c| vec![c]).collect();
        let mut dropped = vec![false; n];

        while let Some((_, cell)) = pending.pop_first() {
            let candidates: Vec<usize> = if isolated {
                (0..n)
                    .filter(|&c| c != cell && !locations[c].is_empty())
                    .collect()
            } else {
                let mut around: Vec<usize> = members[cell]
                    .iter()
                    .flat_map(|&m| t.cell_adjacency().neighbours(CellId::from(m)))
                    .map(|nb| owner[nb.index()])
                    .filter(|&c| c != cell && !locations[c].is_empty())
                    .collect();
                around.sort_unstable();
                around.dedup();
                around
            };
            match nearest(t, CellId::from(cell), &candidates) {
                Some(target) => {
                    let moved = std::mem::take(&mut locations[cell]);
                    pending.remove(&(locations[target].len(), target));
                    let held = &mut locations[target];
                    held.extend(moved);
                    held.sort_unstable();
                    held.dedup();
                    if self.is_offending(held.len()) {
                        pending.insert((held.len(), target));
                    }
                    let moved = std::mem::take(&mut members[cell]);
                    for &m in &moved {
                        owner[m] = target;
                    }
                    members[target].extend(moved);
                }
                None => {
                    locations[cell].clear();
                    for &m in &members[cell] {
                        dropped[m] = true;
                    }
                }
            }
        }

        let mut index = index.clone();
        index.relabel(|c| match c.index() {
            g if g >= n => Some(c),
            g if dropped[g] => None,
            g => Some(CellId::from(owner[g])),
        });
        let discarded = (0..n).filter(|&c| dropped[c]).map(CellId::from).collect();
        let merged_into = (0..n)
            .filter(|&c| owner[c] != c && !dropped[c])
            .map(|c| (CellId::from(c), CellId::from(owner[c])))
            .collect();
        Enforcement {
            index,
            merged_into,
            discarded,
        }
    }
}

/// Candidate whose center is nearest to the center of `from`, ties to the
/// lower id.
fn nearest(t: &dyn Tessellation, from: CellId, candidates: &[usize]) -> Option<usize> {
    let origin = t.cell_center(from)?;
    candidates
        .iter()
        .filter_map(|&c| {
            let center = t.cell_center(CellId::from(c))?;
            let d2: f64 = origin
                .iter()
                .zip(center)
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            Some((d2, c))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::{CellQuery, Points, TessellationError, TessellationInstanceId};
    use tessera_mesh::{Adjacency, CommonParams, GridConfig, GridMesh, Method};

    /// Four grid cells holding 5, `middle`, 0 and 5 locations.
    fn four_cells(middle: usize) -> (GridMesh, CellIndex) {
        let mut rows = vec![[0.05]; 5];
        rows.extend(std::iter::repeat_n([0.15], middle));
        rows.extend(std::iter::repeat_n([0.35], 5));
        let p = Points::from_rows(1, &rows).unwrap();
        let g = GridConfig::with_slices(vec![4])
            .tessellate(&p, &CommonParams::default())
            .unwrap();
        let ci = g.cell_index(&p, &CellQuery::voronoi()).unwrap();
        (g, ci)
    }

    #[test]
    fn discard_unassigns_small_cells() {
        let (g, ci) = four_cells(1);
        assert_eq!(ci.location_count(4), vec![5, 1, 0, 5]);
        let out = StrictConstraint::discard(3).enforce(&ci, &g);
        assert_eq!(out.index.location_count(4), vec![5, 0, 0, 5]);
        assert_eq!(out.discarded, vec![CellId(1)]);
        assert!(out.index.cells_of(5).is_empty());
    }

    #[test]
    fn merge_skips_empty_neighbours() {
        let (g, ci) = four_cells(1);
        let out = StrictConstraint::merge(3).enforce(&ci, &g);
        assert_eq!(out.index.location_count(4), vec![6, 0, 0, 5]);
        assert_eq!(out.merged_into.get(&CellId(1)), Some(&CellId(0)));
        assert!(out.discarded.is_empty());
    }

    #[test]
    fn merges_cascade_until_the_threshold_holds() {
        let mut rows = vec![[0.05]; 1];
        rows.push([0.15]);
        rows.extend(std::iter::repeat_n([0.25], 5));
        let p = Points::from_rows(1, &rows).unwrap();
        let g = GridConfig::with_slices(vec![3])
            .tessellate(&p, &CommonParams::default())
            .unwrap();
        let ci = g.cell_index(&p, &CellQuery::voronoi()).unwrap();
        let out = StrictConstraint::merge(3).enforce(&ci, &g);
        assert_eq!(out.index.location_count(3), vec![0, 0, 7]);
        assert_eq!(out.merged_into.get(&CellId(0)), Some(&CellId(2)));
        assert_eq!(out.merged_into.get(&CellId(1)), Some(&CellId(2)));
    }

    #[test]
    fn unmergeable_cells_are_discarded() {
        let (g, ci) = four_cells(1);
        let out = StrictConstraint::merge(100).enforce(&ci, &g);
        assert_eq!(out.index.assigned_count(), 0);
        assert_eq!(out.discarded, vec![CellId(0), CellId(1), CellId(3)]);
        assert!(out.merged_into.is_empty());
    }

    #[derive(Debug)]
    struct Scattered {
        centers: Vec<f64>,
        adjacency: Adjacency,
        id: TessellationInstanceId,
    }

    impl Tessellation for Scattered {
        fn method(&self) -> Method {
            Method::Random
        }
        fn ndim(&self) -> usize {
            1
        }
        fn cell_count(&self) -> usize {
            self.centers.len()
        }
        fn instance_id(&self) -> TessellationInstanceId {
            self.id
        }
        fn cell_centers(&self) -> &[f64] {
            &self.centers
        }
        fn cell_adjacency(&self) -> &Adjacency {
            &self.adjacency
        }
        fn avg_distance(&self) -> f64 {
            1.0
        }
        fn cell_index(
            &self,
            _points: &Points,
            _query: &CellQuery,
        ) -> Result<CellIndex, TessellationError> {
            Err(TessellationError::config("not queried"))
        }
    }

    #[test]
    fn without_adjacency_the_nearest_populated_cell_absorbs() {
        let t = Scattered {
            centers: vec![0.0, 10.0, 2.0],
            adjacency: Adjacency::empty(3),
            id: TessellationInstanceId::next(),
        };
        let ci = CellIndex::Array(vec![
            Some(CellId(0)),
            Some(CellId(1)),
            Some(CellId(1)),
            Some(CellId(2)),
            Some(CellId(2)),
        ]);
        let out = StrictConstraint::merge(2).enforce(&ci, &t);
        assert_eq!(out.merged_into.get(&CellId(0)), Some(&CellId(2)));
        assert_eq!(out.index.location_count(3), vec![0, 2, 3]);
    }

    #[test]
    fn overlapping_members_are_counted_once_when_merged() {
        let t = Scattered {
            centers: vec![0.0, 1.0, 10.0],
            adjacency: Adjacency::empty(3),
            id: TessellationInstanceId::next(),
        };
        let mut pairs = vec![
            (0, CellId(0)),
            (0, CellId(1)),
            (1, CellId(0)),
            (1, CellId(1)),
        ];
        pairs.extend((2..6).map(|i| (i, CellId(2))));
        let ci = CellIndex::from_pairs(6, pairs);
        let out = StrictConstraint::merge(3).enforce(&ci, &t);
        assert_eq!(out.merged_into.get(&CellId(0)), Some(&CellId(2)));
        assert_eq!(out.merged_into.get(&CellId(1)), Some(&CellId(2)));
        assert_eq!(out.index.location_count(3), vec![0, 0, 6]);
        assert!(out.discarded.is_empty());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        assert!(StrictConstraint::discard(0).validate().is_err());
        assert!(StrictConstraint::merge(1).validate().is_ok());
    }
}
