//! Time lattices: arbitrary, possibly overlapping, half-open time segments.

use crate::adjacency::Adjacency;
use crate::params::CommonParams;
use crate::registry::Method;
use crate::search::KdIndex;
use crate::tessellation::Tessellation;
use serde::{Deserialize, Serialize};
use tessera_core::{CellId, CellIndex, CellList, CellQuery, Points, TessellationError, TessellationInstanceId};

/// Settings of the lattice method.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LatticeConfig {
    /// `(start, end)` segments, in seconds. Cell ids follow this order.
    pub segments: Vec<(f64, f64)>,
}

impl LatticeConfig {
    /// Lattice over the given segments.
    pub fn new(segments: Vec<(f64, f64)>) -> Self {
        Self { segments }
    }

    /// Reject an empty segment list and empty or non-finite segments.
    pub fn validate(&self) -> Result<(), TessellationError> {
        if self.segments.is_empty() {
            return Err(TessellationError::config("a time lattice needs at least one segment"));
        }
        for (i, &(start, end)) in self.segments.iter().enumerate() {
            if !start.is_finite() || !end.is_finite() || start >= end {
                return Err(TessellationError::config(format!(
                    "segment {i} [{start}, {end}) is empty or not finite"
                )));
            }
        }
        Ok(())
    }

    /// Freeze the lattice. The reference set must be non-empty and carry
    /// timestamps; its spatial dimension does not matter.
    pub fn tessellate(
        &self,
        reference: &Points,
        common: &CommonParams,
    ) -> Result<TimeLattice, TessellationError> {
        self.validate()?;
        common.validate()?;
        if reference.is_empty() {
            return Err(TessellationError::EmptyReference);
        }
        if reference.times().is_none() {
            return Err(TessellationError::MissingTimestamps);
        }
        Ok(TimeLattice::new(Method::Lattice, self.segments.clone()))
    }
}

/// A frozen set of time segments.
///
/// A timestamp belongs to every segment `[start, end)` containing it. Cell
/// centers are segment midpoints and consecutive segments (by start time)
/// are adjacent.
#[derive(Clone, Debug)]
pub struct TimeLattice {
    method: Method,
    segments: Vec<(f64, f64)>,
    by_start: Vec<usize>,
    longest: f64,
    midpoints: Vec<f64>,
    index: KdIndex,
    adjacency: Adjacency,
    avg_distance: f64,
    instance_id: TessellationInstanceId,
}

impl TimeLattice {
    /// Build from validated segments.
    pub(crate) fn new(method: Method, segments: Vec<(f64, f64)>) -> Self {
        let mut by_start: Vec<usize> = (0..segments.len()).collect();
        by_start.sort_by(|&a, &b| segments[a].0.total_cmp(&segments[b].0).then(a.cmp(&b)));
        let longest = segments.iter().map(|(s, e)| e - s).fold(0.0, f64::max);
        let midpoints: Vec<f64> = segments.iter().map(|(s, e)| 0.5 * (s + e)).collect();
        let adjacency = Adjacency::from_edges(
            segments.len(),
            by_start.windows(2).map(|w| (w[0], w[1])),
        );
        let gaps: Vec<f64> = by_start
            .windows(2)
            .map(|w| (midpoints[w[1]] - midpoints[w[0]]).abs())
            .filter(|g| *g > 0.0)
            .collect();
        let avg_distance = if gaps.is_empty() {
            segments.iter().map(|(s, e)| e - s).sum::<f64>() / segments.len() as f64
        } else {
            gaps.iter().sum::<f64>() / gaps.len() as f64
        };
        Self {
            method,
            index: KdIndex::new(1, midpoints.clone()),
            segments,
            by_start,
            longest,
            midpoints,
            adjacency,
            avg_distance,
            instance_id: TessellationInstanceId::next(),
        }
    }

    /// All segments, indexed by cell id.
    pub fn segments(&self) -> &[(f64, f64)] {
        &self.segments
    }

    /// Bounds of one segment.
    pub fn segment(&self, cell: CellId) -> Option<(f64, f64)> {
        self.segments.get(cell.index()).copied()
    }

    /// Whether any two segments overlap.
    pub fn is_overlapping(&self) -> bool {
        self.by_start
            .windows(2)
            .any(|w| self.segments[w[1]].0 < self.segments[w[0]].1)
    }

    /// Segments containing `t`, in increasing id order.
    pub fn containing(&self, t: f64) -> CellList {
        let end = self
            .by_start
            .partition_point(|&i| self.segments[i].0 <= t);
        let mut cells: CellList = self.by_start[..end]
            .iter()
            .rev()
            .take_while(|&&i| self.segments[i].0 > t - self.longest)
            .filter(|&&i| t < self.segments[i].1)
            .map(|&i| CellId::from(i))
            .collect();
        cells.sort_unstable();
        cells
    }

    fn nearest_midpoints(&self, t: f64, k: usize) -> impl Iterator<Item = CellId> {
        self.index
            .k_nearest(&[t], k)
            .into_iter()
            .map(|nb| CellId::from(nb.index))
    }
}

impl Tessellation for TimeLattice {
    fn method(&self) -> Method {
        self.method
    }

    fn ndim(&self) -> usize {
        1
    }

    fn cell_count(&self) -> usize {
        self.segments.len()
    }

    fn instance_id(&self) -> TessellationInstanceId {
        self.instance_id
    }

    fn cell_centers(&self) -> &[f64] {
        &self.midpoints
    }

    fn cell_adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    fn avg_distance(&self) -> f64 {
        self.avg_distance
    }

    fn is_temporal(&self) -> bool {
        true
    }

    /// Map timestamps to segments. `knn` and `radius` act on segment
    /// midpoints; `per_cell` bounds are not supported.
    fn cell_index(
        &self,
        points: &Points,
        query: &CellQuery,
    ) -> Result<CellIndex, TessellationError> {
        let times = points.times().ok_or(TessellationError::MissingTimestamps)?;
        query.validate()?;
        if query.per_cell.is_some() {
            return Err(TessellationError::config(
                "per_cell bounds are not supported by time lattices",
            ));
        }
        let n = self.segments.len();
        let mut base: Vec<CellList> = times.iter().map(|&t| self.containing(t)).collect();

        let excluded: Vec<bool> = match query.min_location_count {
            Some(min) if min > 0 => {
                let mut counts = vec![0usize; n];
                for c in base.iter().flatten() {
                    counts[c.index()] += 1;
                }
                counts.into_iter().map(|c| c < min).collect()
            }
            _ => vec![false; n],
        };
        for cells in &mut base {
            cells.retain(|c| !excluded[c.index()]);
        }

        let covers = query.knn.is_some() || query.radius.is_some();
        if !covers {
            if base.iter().all(|c| c.len() <= 1) {
                return Ok(CellIndex::Array(
                    base.into_iter().map(|c| c.first().copied()).collect(),
                ));
            }
            let pairs = base
                .into_iter()
                .enumerate()
                .flat_map(|(i, cells)| cells.into_iter().map(move |c| (i, c)))
                .collect();
            return Ok(CellIndex::from_pairs(times.len(), pairs));
        }

        let knn = query.knn.unwrap_or_default();
        let skipped = excluded.iter().filter(|e| **e).count();
        let target = knn.max.or(knn.min).unwrap_or(1);
        let mut pairs = Vec::new();
        for (i, &t) in times.iter().enumerate() {
            let mut cells = std::mem::take(&mut base[i]);
            cells.sort_by(|a, b| {
                let da = (self.midpoints[a.index()] - t).abs();
                let db = (self.midpoints[b.index()] - t).abs();
                da.total_cmp(&db).then(a.cmp(b))
            });
            let push = |cells: &mut CellList, c: CellId| {
                if !excluded[c.index()] && !cells.contains(&c) {
                    cells.push(c);
                }
            };
            match query.radius {
                Some(r) => {
                    for nb in self.index.within(&[t], r) {
                        push(&mut cells, CellId::from(nb.index));
                    }
                }
                None => {
                    for c in self.nearest_midpoints(t, (target + skipped).min(n)) {
                        if cells.len() >= target {
                            break;
                        }
                        push(&mut cells, c);
                    }
                }
            }
            if let Some(max) = knn.max {
                cells.truncate(max);
            }
            if let Some(min) = knn.min {
                if cells.len() < min {
                    for c in self.nearest_midpoints(t, (min + skipped + 1).min(n)) {
                        if cells.len() >= min {
                            break;
                        }
                        push(&mut cells, c);
                    }
                }
            }
            pairs.extend(cells.into_iter().map(|c| (i, c)));
        }
        Ok(CellIndex::from_pairs(times.len(), pairs))
    }
}
