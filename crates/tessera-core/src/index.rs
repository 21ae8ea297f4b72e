//! Location-to-cell assignments.

use crate::error::DataError;
use crate::id::CellId;
use crate::points::Points;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Cells a single location belongs to.
///
/// Inline capacity covers the usual k-nearest cover sizes without heap
/// allocation.
pub type CellList = SmallVec<[CellId; 4]>;

/// Assignment of every location of a table to zero, one or many cells.
///
/// `Array` is a strict partition: each location is in at most one cell.
/// `Pairs` is an overlapping cover stored as `(location, cell)`
/// associations sorted by location then cell, without duplicates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCellIndex")]
pub enum CellIndex {
    /// One optional cell per location.
    Array(Vec<Option<CellId>>),
    /// Sparse location-cell associations.
    Pairs {
        /// Number of locations in the indexed table.
        len: usize,
        /// Sorted, deduplicated `(location, cell)` pairs.
        pairs: Vec<(usize, CellId)>,
    },
}

/// Wire form of [`CellIndex`]. Pairs are range-checked, then sorted and
/// deduplicated.
#[derive(Deserialize)]
enum RawCellIndex {
    Array(Vec<Option<CellId>>),
    Pairs {
        len: usize,
        pairs: Vec<(usize, CellId)>,
    },
}

impl TryFrom<RawCellIndex> for CellIndex {
    type Error = DataError;

    fn try_from(raw: RawCellIndex) -> Result<Self, DataError> {
        match raw {
            RawCellIndex::Array(v) => Ok(Self::Array(v)),
            RawCellIndex::Pairs { len, pairs } => {
                if let Some(&(row, _)) = pairs.iter().find(|(i, _)| *i >= len) {
                    return Err(DataError::RowOutOfBounds { row, len });
                }
                Ok(Self::from_pairs(len, pairs))
            }
        }
    }
}

impl CellIndex {
    /// Build a pair representation, sorting and deduplicating `pairs`.
    pub fn from_pairs(len: usize, mut pairs: Vec<(usize, CellId)>) -> Self {
        pairs.sort_unstable();
        pairs.dedup();
        debug_assert!(pairs.iter().all(|(i, _)| *i < len));
        Self::Pairs { len, pairs }
    }

    /// Number of locations indexed.
    pub fn len(&self) -> usize {
        match self {
            Self::Array(v) => v.len(),
            Self::Pairs { len, .. } => *len,
        }
    }

    /// Whether no location is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether some location belongs to more than one cell.
    pub fn is_overlapping(&self) -> bool {
        match self {
            Self::Array(_) => false,
            Self::Pairs { pairs, .. } => pairs.windows(2).any(|w| w[0].0 == w[1].0),
        }
    }

    /// Iterate over every `(location, cell)` association in location order.
    pub fn iter_pairs(&self) -> Box<dyn Iterator<Item = (usize, CellId)> + '_> {
        match self {
            Self::Array(v) => Box::new(
                v.iter()
                    .enumerate()
                    .filter_map(|(i, c)| c.map(|c| (i, c))),
            ),
            Self::Pairs { pairs, .. } => Box::new(pairs.iter().copied()),
        }
    }

    /// Cells of location `i`, in increasing id order.
    pub fn cells_of(&self, i: usize) -> CellList {
        match self {
            Self::Array(v) => v.get(i).copied().flatten().into_iter().collect(),
            Self::Pairs { pairs, .. } => {
                let start = pairs.partition_point(|(p, _)| *p < i);
                pairs[start..]
                    .iter()
                    .take_while(|(p, _)| *p == i)
                    .map(|(_, c)| *c)
                    .collect()
            }
        }
    }

    /// Locations belonging to `cell`, in increasing order.
    pub fn locations_of(&self, cell: CellId) -> Vec<usize> {
        self.iter_pairs()
            .filter(|(_, c)| *c == cell)
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of locations with at least one cell.
    pub fn assigned_count(&self) -> usize {
        match self {
            Self::Array(v) => v.iter().filter(|c| c.is_some()).count(),
            Self::Pairs { pairs, .. } => {
                let mut n = 0;
                let mut last = None;
                for (i, _) in pairs {
                    if last != Some(*i) {
                        n += 1;
                        last = Some(*i);
                    }
                }
                n
            }
        }
    }

    /// Locations per cell, for cells `0..cell_count`.
    ///
    /// In an overlapping cover a location counts once for every cell it
    /// belongs to.
    pub fn location_count(&self, cell_count: usize) -> Vec<usize> {
        let mut counts = vec![0usize; cell_count];
        for (_, c) in self.iter_pairs() {
            if let Some(n) = counts.get_mut(c.index()) {
                *n += 1;
            }
        }
        counts
    }

    /// Pair representation of the same assignment.
    pub fn to_pairs(&self) -> Self {
        match self {
            Self::Array(v) => Self::Pairs {
                len: v.len(),
                pairs: self.iter_pairs().collect(),
            },
            Self::Pairs { .. } => self.clone(),
        }
    }

    /// Array representation, calling `select` for every location that
    /// belongs to several cells.
    ///
    /// `select` receives the location index and its cells and returns the
    /// cell to keep, or `None` to leave the location unassigned.
    pub fn to_array(
        &self,
        mut select: impl FnMut(usize, &[CellId]) -> Option<CellId>,
    ) -> Self {
        match self {
            Self::Array(_) => self.clone(),
            Self::Pairs { len, pairs } => {
                let mut out = vec![None; *len];
                let mut start = 0;
                while start < pairs.len() {
                    let loc = pairs[start].0;
                    let end = start + pairs[start..].partition_point(|(p, _)| *p == loc);
                    let cells: CellList = pairs[start..end].iter().map(|(_, c)| *c).collect();
                    out[loc] = if cells.len() == 1 {
                        Some(cells[0])
                    } else {
                        select(loc, &cells)
                    };
                    start = end;
                }
                Self::Array(out)
            }
        }
    }

    /// Drop every association to a cell for which `keep` is false.
    pub fn retain_cells(&mut self, mut keep: impl FnMut(CellId) -> bool) {
        match self {
            Self::Array(v) => {
                for c in v.iter_mut() {
                    if matches!(c, Some(id) if !keep(*id)) {
                        *c = None;
                    }
                }
            }
            Self::Pairs { pairs, .. } => pairs.retain(|(_, c)| keep(*c)),
        }
    }

    /// Map every cell through `f`; associations mapped to `None` are
    /// dropped and duplicates created by the mapping are merged.
    pub fn relabel(&mut self, mut f: impl FnMut(CellId) -> Option<CellId>) {
        match self {
            Self::Array(v) => {
                for c in v.iter_mut() {
                    *c = c.and_then(&mut f);
                }
            }
            Self::Pairs { pairs, .. } => {
                let mut mapped: Vec<(usize, CellId)> = pairs
                    .iter()
                    .filter_map(|(i, c)| f(*c).map(|c| (*i, c)))
                    .collect();
                mapped.sort_unstable();
                mapped.dedup();
                *pairs = mapped;
            }
        }
    }
}

/// A selector for [`CellIndex::to_array`] keeping the cell whose center is
/// nearest to the location.
///
/// `centers` is the row-major center buffer of the tessellation, with the
/// same dimension as `points`. Ties go to the lower cell id.
pub fn nearest_cell<'a>(
    points: &'a Points,
    centers: &'a [f64],
) -> impl FnMut(usize, &[CellId]) -> Option<CellId> + 'a {
    let dim = points.dim();
    move |loc, cells| {
        let x = points.row(loc);
        let mut best: Option<(f64, CellId)> = None;
        for &c in cells {
            let center = &centers[c.index() * dim..(c.index() + 1) * dim];
            let d2: f64 = x.iter().zip(center).map(|(a, b)| (a - b) * (a - b)).sum();
            match best {
                Some((bd, bc)) if bd < d2 || (bd == d2 && bc < c) => {}
                _ => best = Some((d2, c)),
            }
        }
        best.map(|(_, c)| c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn deserialized_pairs_are_normalized_and_checked() {
        let ci: CellIndex =
            serde_json::from_str(r#"{"Pairs":{"len":3,"pairs":[[2,1],[0,4],[2,1],[0,0]]}}"#)
                .unwrap();
        assert_eq!(
            ci,
            CellIndex::from_pairs(3, vec![(0, CellId(0)), (0, CellId(4)), (2, CellId(1))])
        );
        assert_eq!(ci.cells_of(0).as_slice(), &[CellId(0), CellId(4)]);

        let out_of_range =
            serde_json::from_str::<CellIndex>(r#"{"Pairs":{"len":2,"pairs":[[5,0]]}}"#);
        assert!(out_of_range.is_err());

        let array: CellIndex = serde_json::from_str(r#"{"Array":[0,null,3]}"#).unwrap();
        assert_eq!(array, CellIndex::Array(vec![Some(CellId(0)), None, Some(CellId(3))]));
    }

    fn c(i: u32) -> CellId {
        CellId(i)
    }

    #[test]
    fn array_counts() {
        let ci = CellIndex::Array(vec![Some(c(0)), None, Some(c(2)), Some(c(0))]);
        assert_eq!(ci.location_count(3), vec![2, 0, 1]);
        assert_eq!(ci.assigned_count(), 3);
        assert!(!ci.is_overlapping());
        assert!(ci.cells_of(1).is_empty());
    }

    #[test]
    fn pairs_are_sorted_and_deduplicated() {
        let ci = CellIndex::from_pairs(3, vec![(2, c(1)), (0, c(1)), (0, c(0)), (0, c(1))]);
        assert_eq!(
            ci,
            CellIndex::Pairs {
                len: 3,
                pairs: vec![(0, c(0)), (0, c(1)), (2, c(1))]
            }
        );
        assert!(ci.is_overlapping());
        assert_eq!(ci.cells_of(0).as_slice(), &[c(0), c(1)]);
        assert_eq!(ci.assigned_count(), 2);
        assert_eq!(ci.location_count(2), vec![1, 2]);
        assert_eq!(ci.locations_of(c(1)), vec![0, 2]);
    }

    #[test]
    fn to_array_resolves_overlaps_with_selector() {
        let ci = CellIndex::from_pairs(3, vec![(0, c(0)), (0, c(1)), (2, c(1))]);
        let arr = ci.to_array(|_, cells| cells.last().copied());
        assert_eq!(arr, CellIndex::Array(vec![Some(c(1)), None, Some(c(1))]));
    }

    #[test]
    fn nearest_cell_selector_picks_closest_center() {
        let pts = Points::from_rows(1, &[[0.9]]).unwrap();
        let centers = [0.0, 1.0, 5.0];
        let mut select = nearest_cell(&pts, &centers);
        assert_eq!(select(0, &[c(0), c(1), c(2)]), Some(c(1)));
    }

    #[test]
    fn relabel_merges_duplicates() {
        let mut ci = CellIndex::from_pairs(2, vec![(0, c(0)), (0, c(1)), (1, c(2))]);
        ci.relabel(|id| if id == c(2) { None } else { Some(c(0)) });
        assert_eq!(
            ci,
            CellIndex::Pairs {
                len: 2,
                pairs: vec![(0, c(0))]
            }
        );
    }

    #[test]
    fn retain_cells_unassigns_array_entries() {
        let mut ci = CellIndex::Array(vec![Some(c(0)), Some(c(1))]);
        ci.retain_cells(|id| id != c(1));
        assert_eq!(ci, CellIndex::Array(vec![Some(c(0)), None]));
    }

    proptest! {
        #[test]
        fn counts_sum_to_pair_total(
            raw in prop::collection::vec((0usize..20, 0u32..6), 0..60),
        ) {
            let pairs = raw.iter().map(|&(i, k)| (i, CellId(k))).collect();
            let ci = CellIndex::from_pairs(20, pairs);
            let counts = ci.location_count(6);
            prop_assert_eq!(counts.iter().sum::<usize>(), ci.iter_pairs().count());
            prop_assert!(ci.assigned_count() <= 20);
            for i in 0..20 {
                let cells = ci.cells_of(i);
                prop_assert!(cells.windows(2).all(|w| w[0] < w[1]));
            }
        }
    }
}
