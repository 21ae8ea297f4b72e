//! Cell centers and the query pipeline shared by every spatial method.

use crate::adjacency::Adjacency;
use crate::search::KdIndex;
use crate::tessellation::check_dim;
use tessera_core::{CellId, CellIndex, CellList, CellQuery, Knn, Points, Scaler, TessellationError};

/// Candidate neighbours examined per center when building a Gabriel graph.
const GABRIEL_CANDIDATES: usize = 24;

/// Cell centers of a spatial tessellation, indexed for nearest-center
/// search in the scaled frame.
#[derive(Clone, Debug)]
pub struct CellCenters {
    scaler: Scaler,
    centers: Vec<f64>,
    index: KdIndex,
}

impl CellCenters {
    /// Index `scaled` centers (row-major, `scaler.dim()` columns).
    pub(crate) fn new(scaler: Scaler, scaled: Vec<f64>) -> Self {
        let dim = scaler.dim();
        let centers = scaler.unscale_rows(&scaled);
        Self {
            index: KdIndex::new(dim, scaled),
            scaler,
            centers,
        }
    }

    /// Number of centers.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether there are no centers.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Dimension of the centers.
    pub fn dim(&self) -> usize {
        self.scaler.dim()
    }

    /// Centers in data units.
    pub fn as_slice(&self) -> &[f64] {
        &self.centers
    }

    /// Centers in the scaled frame.
    pub fn scaled(&self, cell: CellId) -> &[f64] {
        self.index.row(cell.index())
    }

    /// The scaler fitted on the reference set.
    pub fn scaler(&self) -> &Scaler {
        &self.scaler
    }

    /// The search index over scaled centers.
    pub fn search(&self) -> &KdIndex {
        &self.index
    }

    /// Copy of the scaled center buffer.
    pub(crate) fn scaled_buffer(&self) -> Vec<f64> {
        (0..self.len()).flat_map(|i| self.index.row(i).to_vec()).collect()
    }

    /// Nearest center to a scaled query row. Ties go to the lower id.
    pub fn nearest(&self, q: &[f64]) -> Option<CellId> {
        self.index.nearest(q).map(|nb| CellId::from(nb.index))
    }

    /// Mean center distance over the edges of `adjacency`, in data units.
    pub fn mean_edge_length(&self, adjacency: &Adjacency) -> Option<f64> {
        let (sum, n) = adjacency
            .edges()
            .fold((0.0, 0usize), |(sum, n), (a, b)| {
                (sum + dist2(self.scaled(a), self.scaled(b)).sqrt(), n + 1)
            });
        (n > 0).then(|| self.scaler.unscale_distance(sum / n as f64))
    }

    /// Answer `query` for `points` (data units).
    ///
    /// `primary` maps a scaled row to the cell containing it. Stages run in
    /// order: primary assignment, `min_location_count` exclusion counted on
    /// that assignment, then `per_cell` bounds or the per-location
    /// `radius`/`knn` cover. Excluded cells never take part in the later
    /// stages.
    pub(crate) fn query(
        &self,
        points: &Points,
        query: &CellQuery,
        primary: impl Fn(&[f64]) -> Option<CellId>,
    ) -> Result<CellIndex, TessellationError> {
        check_dim(self.dim(), points)?;
        query.validate()?;
        let covers = query.knn.is_some() || query.radius.is_some();
        if query.per_cell.is_some() && covers {
            return Err(TessellationError::config(
                "per_cell bounds cannot be combined with a knn or radius cover",
            ));
        }
        let scaled = self.scaler.scale(points)?;
        let mut assigned: Vec<Option<CellId>> = scaled.rows().map(&primary).collect();
        if query.is_voronoi() {
            return Ok(CellIndex::Array(assigned));
        }

        let excluded = self.sparse_cells(&assigned, query.min_location_count);
        for cell in assigned.iter_mut() {
            if matches!(cell, Some(c) if excluded[c.index()]) {
                *cell = None;
            }
        }

        if let Some(bounds) = query.per_cell {
            return Ok(self.per_cell(&scaled, &assigned, bounds, &excluded));
        }
        if covers {
            return Ok(self.cover(&scaled, &assigned, query, &excluded));
        }
        Ok(CellIndex::Array(assigned))
    }

    /// Cells holding fewer than `min` locations in `assigned`.
    fn sparse_cells(&self, assigned: &[Option<CellId>], min: Option<usize>) -> Vec<bool> {
        let n = self.len();
        match min {
            Some(min) if min > 0 => {
                let mut counts = vec![0usize; n];
                for c in assigned.iter().flatten() {
                    counts[c.index()] += 1;
                }
                counts.into_iter().map(|k| k < min).collect()
            }
            _ => vec![false; n],
        }
    }

    /// Keep at most `bounds.max` nearest locations per cell and let cells
    /// with fewer than `bounds.min` claim their nearest locations.
    /// Excluded cells claim nothing.
    fn per_cell(
        &self,
        scaled: &Points,
        primary: &[Option<CellId>],
        bounds: Knn,
        excluded: &[bool],
    ) -> CellIndex {
        let mut members: Vec<Vec<(f64, usize)>> = vec![Vec::new(); self.len()];
        for (i, cell) in primary.iter().enumerate() {
            if let Some(c) = cell {
                members[c.index()].push((dist2(scaled.row(i), self.scaled(*c)), i));
            }
        }
        let mut locations: Option<KdIndex> = None;
        let mut pairs = Vec::with_capacity(primary.len());
        for (cell, m) in members.iter_mut().enumerate() {
            let id = CellId::from(cell);
            m.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            if let Some(max) = bounds.max {
                m.truncate(max);
            }
            pairs.extend(m.iter().map(|&(_, i)| (i, id)));
            if excluded[cell] {
                continue;
            }
            if let Some(min) = bounds.min {
                if m.len() < min {
                    let locs = locations
                        .get_or_insert_with(|| KdIndex::new(scaled.dim(), scaled.coords().to_vec()));
                    pairs.extend(
                        locs.k_nearest(self.scaled(id), min)
                            .into_iter()
                            .map(|nb| (nb.index, id)),
                    );
                }
            }
        }
        CellIndex::from_pairs(scaled.len(), pairs)
    }

    /// Per-location cover: the containing cell first, then the nearest
    /// centers, bounded by `knn`. With a radius, a location with no center
    /// in range stays unassigned unless `knn.min` asks for more.
    fn cover(
        &self,
        scaled: &Points,
        primary: &[Option<CellId>],
        query: &CellQuery,
        excluded: &[bool],
    ) -> CellIndex {
        let n = self.len();
        let knn = query.knn.unwrap_or_default();
        let radius = query.radius.map(|r| self.scaler.scale_distance(r));
        let skipped = excluded.iter().filter(|e| **e).count();
        let target = knn.max.or(knn.min).unwrap_or(1);
        let usable = |c: CellId| !excluded[c.index()];

        let push = |cells: &mut CellList, c: CellId| {
            if usable(c) && !cells.contains(&c) {
                cells.push(c);
            }
        };

        let mut pairs = Vec::with_capacity(scaled.len() * target.min(n));
        for (i, q) in scaled.rows().enumerate() {
            let mut cells = CellList::new();
            match radius {
                Some(r) => {
                    let hits = self.index.within(q, r);
                    if !hits.is_empty() {
                        if let Some(p) = primary[i] {
                            push(&mut cells, p);
                        }
                        for nb in hits {
                            push(&mut cells, CellId::from(nb.index));
                        }
                    }
                }
                None => {
                    if let Some(p) = primary[i] {
                        push(&mut cells, p);
                    }
                    for nb in self.index.k_nearest(q, (target + skipped).min(n)) {
                        if cells.len() >= target {
                            break;
                        }
                        push(&mut cells, CellId::from(nb.index));
                    }
                }
            }
            if let Some(max) = knn.max {
                cells.truncate(max);
            }
            if let Some(min) = knn.min {
                if cells.len() < min {
                    for nb in self.index.k_nearest(q, (min + skipped + 1).min(n)) {
                        if cells.len() >= min {
                            break;
                        }
                        push(&mut cells, CellId::from(nb.index));
                    }
                }
            }
            pairs.extend(cells.into_iter().map(|c| (i, c)));
        }
        CellIndex::from_pairs(scaled.len(), pairs)
    }

    /// Gabriel graph of the centers: `a` and `b` are adjacent when no other
    /// center lies strictly inside the ball with diameter `ab`. Candidate
    /// pairs are limited to each center's nearest neighbours.
    pub fn gabriel_graph(&self) -> Adjacency {
        let n = self.len();
        let dim = self.dim();
        let mut edges = Vec::new();
        let mut mid = vec![0.0; dim];
        for a in 0..n {
            let pa = self.index.row(a);
            for nb in self.index.k_nearest(pa, (GABRIEL_CANDIDATES + 1).min(n)) {
                let b = nb.index;
                if b <= a {
                    continue;
                }
                let pb = self.index.row(b);
                for k in 0..dim {
                    mid[k] = 0.5 * (pa[k] + pb[k]);
                }
                let r2 = 0.25 * nb.dist2;
                let blocked = self
                    .index
                    .within(&mid, r2.sqrt())
                    .iter()
                    .any(|w| w.index != a && w.index != b && w.dist2 < r2 * (1.0 - 1e-9));
                if !blocked {
                    edges.push((a, b));
                }
            }
        }
        Adjacency::from_edges(n, edges)
    }
}

/// Squared Euclidean distance.
pub(crate) fn dist2(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(centers: &[f64]) -> CellCenters {
        CellCenters::new(Scaler::identity(1), centers.to_vec())
    }

    fn pts(xs: &[f64]) -> Points {
        Points::new(1, xs.to_vec()).unwrap()
    }

    fn voronoi(c: &CellCenters) -> impl Fn(&[f64]) -> Option<CellId> + '_ {
        move |q| c.nearest(q)
    }

    #[test]
    fn plain_query_is_an_array() {
        let c = line(&[0.0, 1.0, 2.0]);
        let ci = c.query(&pts(&[0.1, 1.6]), &CellQuery::voronoi(), voronoi(&c)).unwrap();
        assert_eq!(ci, CellIndex::Array(vec![Some(CellId(0)), Some(CellId(2))]));
    }

    #[test]
    fn knn_lists_primary_first_then_nearest() {
        let c = line(&[0.0, 1.0, 2.0, 3.0]);
        let q = CellQuery::voronoi().with_knn(Knn::between(2, 3));
        let ci = c.query(&pts(&[1.1]), &q, voronoi(&c)).unwrap();
        assert_eq!(ci.cells_of(0).as_slice(), &[CellId(0), CellId(1), CellId(2)]);
    }

    #[test]
    fn radius_without_hits_leaves_location_unassigned() {
        let c = line(&[0.0, 10.0]);
        let q = CellQuery::voronoi().with_radius(1.0);
        let ci = c.query(&pts(&[5.0, 0.5]), &q, voronoi(&c)).unwrap();
        assert!(ci.cells_of(0).is_empty());
        assert_eq!(ci.cells_of(1).as_slice(), &[CellId(0)]);

        let q = q.with_knn(Knn::at_least(1));
        let ci = c.query(&pts(&[5.0]), &q, voronoi(&c)).unwrap();
        assert_eq!(ci.cells_of(0).len(), 1);
    }

    #[test]
    fn per_cell_caps_and_fills() {
        let c = line(&[0.0, 10.0]);
        let q = CellQuery::voronoi().with_per_cell(Knn::between(2, 2));
        let ci = c
            .query(&pts(&[0.1, 0.2, 0.3, 9.9]), &q, voronoi(&c))
            .unwrap();
        assert_eq!(ci.locations_of(CellId(0)), vec![0, 1]);
        // Cell 1 claims its two nearest locations.
        assert_eq!(ci.locations_of(CellId(1)), vec![2, 3]);
    }

    #[test]
    fn min_location_count_excludes_sparse_cells() {
        let c = line(&[0.0, 10.0]);
        let q = CellQuery::voronoi().with_min_location_count(2);
        let ci = c.query(&pts(&[0.1, 0.2, 9.9]), &q, voronoi(&c)).unwrap();
        assert_eq!(ci.location_count(2), vec![2, 0]);

        // The excluded cell never appears in a cover either.
        let q = q.with_knn(Knn::between(1, 2));
        let ci = c.query(&pts(&[0.1, 0.2, 9.9]), &q, voronoi(&c)).unwrap();
        assert_eq!(ci.cells_of(2).as_slice(), &[CellId(0)]);
    }

    #[test]
    fn sparse_cells_are_excluded_before_per_cell_filling() {
        let c = line(&[0.0, 10.0, 20.0]);
        let q = CellQuery::voronoi()
            .with_per_cell(Knn::at_least(3))
            .with_min_location_count(2);
        let ci = c
            .query(&pts(&[0.1, 0.2, 0.3, 9.8, 9.9, 19.9]), &q, voronoi(&c))
            .unwrap();
        // Cell 2 holds one location on the nearest-cell assignment: it is
        // excluded and never padded up to three.
        assert_eq!(ci.location_count(3), vec![3, 3, 0]);
        assert_eq!(ci.locations_of(CellId(1)), vec![2, 3, 4]);
        assert!(ci.cells_of(5).is_empty());
    }

    #[test]
    fn per_cell_with_cover_is_rejected() {
        let c = line(&[0.0]);
        let q = CellQuery::voronoi()
            .with_per_cell(Knn::at_least(1))
            .with_knn(Knn::at_most(1));
        assert!(matches!(
            c.query(&pts(&[0.0]), &q, voronoi(&c)),
            Err(TessellationError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let c = line(&[0.0]);
        let p = Points::new(2, vec![0.0, 0.0]).unwrap();
        assert_eq!(
            c.query(&p, &CellQuery::voronoi(), voronoi(&c)).err(),
            Some(TessellationError::DimensionMismatch {
                expected: 1,
                found: 2
            })
        );
    }

    #[test]
    fn gabriel_graph_skips_blocked_pairs() {
        let c = CellCenters::new(Scaler::identity(2), vec![0.0, 0.0, 1.0, 0.1, 2.0, 0.0]);
        let g = c.gabriel_graph();
        assert!(g.are_adjacent(CellId(0), CellId(1)));
        assert!(g.are_adjacent(CellId(1), CellId(2)));
        assert!(!g.are_adjacent(CellId(0), CellId(2)));
        let len = c.mean_edge_length(&g).unwrap();
        assert!((len - 1.01f64.sqrt()).abs() < 1e-12);
    }
}
