//! Nested tessellations: a parent tessellation whose cells each own an
//! independently grown child tessellation.
//!
//! Children are keyed by parent [`CellId`] and only ever see the reference
//! locations of their parent cell. Queries follow the same route: a
//! location is first resolved to its parent cell, then mapped by that
//! parent's child alone. A `knn` lower bound the child cannot meet is
//! filled from the remaining cells of the same parent first; only a parent
//! with too few cells borrows the nearest cells of other parents.
//! `min_location_count` is counted on the nearest-cell assignment.
//!
//! Global cell ids flatten the tree parent by parent. A parent with a
//! child contributes one global id per child cell; a parent without a
//! child keeps a single global id.

use crate::adjacency::Adjacency;
use crate::centers::dist2;
use crate::grid::GridConfig;
use crate::kmeans::KMeansConfig;
use crate::params::CommonParams;
use crate::registry::{Method, MethodConfig};
use crate::search::KdIndex;
use crate::tessellation::Tessellation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use tessera_core::{
    CellId, CellIndex, CellList, CellQuery, Points, TessellationError, TessellationInstanceId,
};
use tracing::debug;

/// Settings of the nested method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NestedConfig {
    /// Method growing the top-level cells.
    pub parent: Box<MethodConfig>,
    /// Method grown independently inside every parent cell.
    pub child: Box<MethodConfig>,
    /// Parent cells with fewer reference locations get no child.
    /// Default: 20.
    pub min_child_reference: usize,
    /// Parameters handed to every child. When unset, children inherit the
    /// parent parameters without the cell count target and with half the
    /// parent reference distance.
    pub child_params: Option<CommonParams>,
}

impl Default for NestedConfig {
    fn default() -> Self {
        Self {
            parent: Box::new(MethodConfig::Grid(GridConfig::default())),
            child: Box::new(MethodConfig::KMeans(KMeansConfig::default())),
            min_child_reference: 20,
            child_params: None,
        }
    }
}

impl NestedConfig {
    /// Nest `child` inside the cells of `parent`.
    pub fn new(parent: MethodConfig, child: MethodConfig) -> Self {
        Self {
            parent: Box::new(parent),
            child: Box::new(child),
            ..Self::default()
        }
    }

    /// Set the minimum number of reference locations a parent cell
    /// needs to grow a child.
    pub fn with_min_child_reference(mut self, n: usize) -> Self {
        self.min_child_reference = n;
        self
    }

    /// Set the parameters handed to every child.
    pub fn with_child_params(mut self, params: CommonParams) -> Self {
        self.child_params = Some(params);
        self
    }

    /// Check both levels and reject mixing spatial and temporal levels.
    pub fn validate(&self) -> Result<(), TessellationError> {
        self.parent.validate()?;
        self.child.validate()?;
        if let Some(p) = &self.child_params {
            p.validate()?;
        }
        if self.min_child_reference == 0 {
            return Err(TessellationError::config("min_child_reference must be positive"));
        }
        if partitions_time(&self.parent) != partitions_time(&self.child) {
            return Err(TessellationError::config(
                "nested levels must both partition space or both partition time",
            ));
        }
        Ok(())
    }

    /// Grow the parent on `reference`, then one child per populated parent
    /// cell.
    ///
    /// A child that cannot be grown because its reference locations are
    /// degenerate (for instance all coincident) is skipped and the parent
    /// cell stays whole. Any other child failure aborts.
    pub fn tessellate(
        &self,
        reference: &Points,
        common: &CommonParams,
    ) -> Result<NestedTessellation, TessellationError> {
        self.validate()?;
        let parent = self.parent.tessellate(reference, common)?;
        let members = members_by_cell(
            parent.cell_count(),
            &parent.cell_index(reference, &CellQuery::voronoi())?,
        );
        let base = self.child_params(common, parent.as_ref());

        let mut children = BTreeMap::new();
        for (p, locations) in members.iter().enumerate() {
            if locations.len() < self.min_child_reference {
                continue;
            }
            let subset = reference.select(locations)?;
            let params = CommonParams {
                seed: base.seed.wrapping_add(p as u64),
                ..base.clone()
            };
            match self.child.tessellate(&subset, &params) {
                Ok(child) => {
                    children.insert(CellId::from(p), child);
                }
                Err(e @ (TessellationError::Degenerate { .. } | TessellationError::EmptyReference)) => {
                    debug!(parent = p, locations = locations.len(), error = %e, "child skipped");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(NestedTessellation::new(parent, children))
    }

    fn child_params(&self, common: &CommonParams, parent: &dyn Tessellation) -> CommonParams {
        if let Some(p) = &self.child_params {
            return p.clone();
        }
        let mut p = common.clone();
        p.cell_count = None;
        if p.avg_location_count.is_none() {
            let parent_distance = common.distance.unwrap_or(0.5 * parent.avg_distance());
            p.distance = Some(0.5 * parent_distance);
        }
        p
    }
}

fn partitions_time(config: &MethodConfig) -> bool {
    match config {
        MethodConfig::Nested(n) => partitions_time(&n.parent),
        other => other.method().is_temporal(),
    }
}

/// Locations of every cell, in increasing order.
fn members_by_cell(cell_count: usize, index: &CellIndex) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); cell_count];
    for (i, c) in index.iter_pairs() {
        if let Some(m) = members.get_mut(c.index()) {
            m.push(i);
        }
    }
    members
}

/// A frozen parent tessellation with per-cell children.
#[derive(Debug)]
pub struct NestedTessellation {
    parent: Box<dyn Tessellation>,
    children: BTreeMap<CellId, Box<dyn Tessellation>>,
    /// First global id of every parent cell, plus the total at the end.
    offsets: Vec<usize>,
    owners: Vec<(CellId, Option<CellId>)>,
    centers: Vec<f64>,
    index: KdIndex,
    adjacency: Adjacency,
    avg_distance: f64,
    instance_id: TessellationInstanceId,
}

impl NestedTessellation {
    fn new(
        parent: Box<dyn Tessellation>,
        children: BTreeMap<CellId, Box<dyn Tessellation>>,
    ) -> Self {
        let dim = parent.ndim();
        let mut offsets = Vec::with_capacity(parent.cell_count() + 1);
        let mut owners = Vec::new();
        let mut centers = Vec::new();
        for p in 0..parent.cell_count() {
            let pid = CellId::from(p);
            offsets.push(owners.len());
            match children.get(&pid) {
                Some(child) => {
                    owners.extend((0..child.cell_count()).map(|c| (pid, Some(CellId::from(c)))));
                    centers.extend_from_slice(child.cell_centers());
                }
                None => {
                    owners.push((pid, None));
                    centers.extend_from_slice(parent.cell_center(pid).unwrap_or(&[]));
                }
            }
        }
        offsets.push(owners.len());

        let range = |p: CellId| offsets[p.index()]..offsets[p.index() + 1];
        let row = |g: usize| &centers[g * dim..(g + 1) * dim];
        let mut edges = Vec::new();
        for (p, child) in &children {
            let start = range(*p).start;
            edges.extend(
                child
                    .cell_adjacency()
                    .edges()
                    .map(|(a, b)| (start + a.index(), start + b.index())),
            );
        }
        for (a, b) in parent.cell_adjacency().edges() {
            let (ra, rb) = (range(a), range(b));
            // Every cell on one side links to its nearest cell on the other.
            for x in ra.clone() {
                if let Some(y) = nearest_in(rb.clone(), row(x), row) {
                    edges.push((x, y));
                }
            }
            for y in rb.clone() {
                if let Some(x) = nearest_in(ra.clone(), row(y), row) {
                    edges.push((x, y));
                }
            }
        }
        let adjacency = Adjacency::from_edges(owners.len(), edges);

        let lengths: Vec<f64> = adjacency
            .edges()
            .map(|(a, b)| dist2(row(a.index()), row(b.index())).sqrt())
            .collect();
        let avg_distance = if lengths.is_empty() {
            parent.avg_distance()
        } else {
            lengths.iter().sum::<f64>() / lengths.len() as f64
        };

        Self {
            index: KdIndex::new(dim, centers.clone()),
            parent,
            children,
            offsets,
            owners,
            centers,
            adjacency,
            avg_distance,
            instance_id: TessellationInstanceId::next(),
        }
    }

    /// The top-level tessellation.
    pub fn parent(&self) -> &dyn Tessellation {
        self.parent.as_ref()
    }

    /// The child grown inside `parent`, if any.
    pub fn child(&self, parent: CellId) -> Option<&dyn Tessellation> {
        self.children.get(&parent).map(|c| c.as_ref())
    }

    /// Number of parent cells that own a child.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Parent cell and child cell behind a global id.
    ///
    /// The child part is `None` when the parent cell has no child.
    pub fn resolve(&self, global: CellId) -> Option<(CellId, Option<CellId>)> {
        self.owners.get(global.index()).copied()
    }

    /// Global id of a `(parent, child)` pair.
    ///
    /// `child` must be `None` exactly when the parent cell has no child.
    pub fn global_id(&self, parent: CellId, child: Option<CellId>) -> Option<CellId> {
        let range = self.parent_range(parent)?;
        let global = match (self.children.get(&parent), child) {
            (Some(t), Some(c)) if c.index() < t.cell_count() => range.start + c.index(),
            (None, None) => range.start,
            _ => return None,
        };
        Some(CellId::from(global))
    }

    fn parent_range(&self, parent: CellId) -> Option<Range<usize>> {
        let p = parent.index();
        let end = *self.offsets.get(p + 1)?;
        Some(self.offsets[p]..end)
    }

    fn center_row(&self, g: usize) -> &[f64] {
        let d = self.parent.ndim();
        &self.centers[g * d..(g + 1) * d]
    }

    fn query_row(&self, points: &Points, i: usize) -> Vec<f64> {
        if self.parent.is_temporal() {
            points.time(i).into_iter().collect()
        } else {
            points.row(i).to_vec()
        }
    }
}

/// Cell of `range` nearest to `q`, ties to the lower id.
fn nearest_in<'a>(
    range: Range<usize>,
    q: &[f64],
    row: impl Fn(usize) -> &'a [f64],
) -> Option<usize> {
    range
        .map(|g| (dist2(q, row(g)), g))
        .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
        .map(|(_, g)| g)
}

impl Tessellation for NestedTessellation {
    fn method(&self) -> Method {
        Method::Nested
    }

    fn ndim(&self) -> usize {
        self.parent.ndim()
    }

    fn cell_count(&self) -> usize {
        self.owners.len()
    }

    fn instance_id(&self) -> TessellationInstanceId {
        self.instance_id
    }

    fn cell_centers(&self) -> &[f64] {
        &self.centers
    }

    fn cell_adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    fn avg_distance(&self) -> f64 {
        self.avg_distance
    }

    fn is_temporal(&self) -> bool {
        self.parent.is_temporal()
    }

    fn cell_index(
        &self,
        points: &Points,
        query: &CellQuery,
    ) -> Result<CellIndex, TessellationError> {
        query.validate()?;
        let parent_index = self.parent.cell_index(points, &CellQuery::voronoi())?;
        let members = members_by_cell(self.parent.cell_count(), &parent_index);
        let child_query = CellQuery {
            min_location_count: None,
            ..query.clone()
        };

        let n = self.owners.len();
        let voronoi = CellQuery::voronoi();
        let mut home: Vec<Option<usize>> = vec![None; points.len()];
        let mut nearest: Vec<Option<usize>> = vec![None; points.len()];
        let mut assigned: Vec<CellList> = vec![CellList::new(); points.len()];
        for (p, locations) in members.iter().enumerate() {
            if locations.is_empty() {
                continue;
            }
            let start = self.offsets[p];
            for &i in locations {
                home[i] = Some(p);
            }
            match self.children.get(&CellId::from(p)) {
                Some(child) => {
                    let subset = points.select(locations)?;
                    let primary = child.cell_index(&subset, &voronoi)?;
                    for (j, c) in primary.iter_pairs() {
                        nearest[locations[j]] = Some(start + c.index());
                    }
                    let answer = if child_query.is_voronoi() {
                        primary
                    } else {
                        child.cell_index(&subset, &child_query)?
                    };
                    for (j, c) in answer.iter_pairs() {
                        assigned[locations[j]].push(CellId::from(start + c.index()));
                    }
                }
                None => {
                    for &i in locations {
                        nearest[i] = Some(start);
                        assigned[i].push(CellId::from(start));
                    }
                }
            }
        }

        // Counted on the nearest-cell assignment, before any cover.
        let excluded: Vec<bool> = match query.min_location_count {
            Some(min) if min > 0 => {
                let mut counts = vec![0usize; n];
                for &g in nearest.iter().flatten() {
                    counts[g] += 1;
                }
                counts.into_iter().map(|c| c < min).collect()
            }
            _ => vec![false; n],
        };
        let skipped = excluded.iter().filter(|e| **e).count();
        for (i, cells) in assigned.iter_mut().enumerate() {
            cells.retain(|c| !excluded[c.index()]);
            let Some(min) = query.knn.and_then(|k| k.min) else {
                continue;
            };
            if cells.len() >= min {
                continue;
            }
            let q = self.query_row(points, i);
            // The own parent is exhausted first, nearest cell first.
            if let Some(p) = home[i] {
                let mut local: Vec<(f64, usize)> = (self.offsets[p]..self.offsets[p + 1])
                    .filter(|&g| !excluded[g])
                    .map(|g| (dist2(&q, self.center_row(g)), g))
                    .collect();
                local.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                for (_, g) in local {
                    if cells.len() >= min {
                        break;
                    }
                    let c = CellId::from(g);
                    if !cells.contains(&c) {
                        cells.push(c);
                    }
                }
            }
            // A parent too small for the lower bound borrows the nearest
            // cells of other parents.
            if cells.len() < min {
                let k = (min + cells.len() + skipped).min(n);
                for nb in self.index.k_nearest(&q, k) {
                    if cells.len() >= min {
                        break;
                    }
                    let c = CellId::from(nb.index);
                    if !excluded[nb.index] && !cells.contains(&c) {
                        cells.push(c);
                    }
                }
            }
            cells.sort_unstable();
        }

        if assigned.iter().all(|c| c.len() <= 1) {
            return Ok(CellIndex::Array(
                assigned.into_iter().map(|c| c.first().copied()).collect(),
            ));
        }
        let pairs = assigned
            .into_iter()
            .enumerate()
            .flat_map(|(i, cells)| cells.into_iter().map(move |c| (i, c)))
            .collect();
        Ok(CellIndex::from_pairs(points.len(), pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance;
    use crate::lattice::LatticeConfig;
    use crate::window::WindowConfig;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use tessera_core::Knn;

    fn uniform(n: usize, seed: u64) -> Points {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let rows: Vec<[f64; 2]> = (0..n).map(|_| [rng.random(), rng.random()]).collect();
        Points::from_rows(2, &rows).unwrap()
    }

    fn grid_in_grid(reference: &Points) -> NestedTessellation {
        NestedConfig::new(
            MethodConfig::Grid(GridConfig::with_slices(vec![2, 2])),
            MethodConfig::Grid(GridConfig::default()),
        )
        .tessellate(reference, &CommonParams::default().with_distance(0.1))
        .unwrap()
    }

    #[test]
    fn every_populated_parent_grows_a_child() {
        let p = uniform(400, 1);
        let t = grid_in_grid(&p);
        assert_eq!(t.parent().cell_count(), 4);
        assert_eq!(t.child_count(), 4);
        let total: usize = (0..4)
            .map(|c| t.child(CellId(c)).map_or(1, |c| c.cell_count()))
            .sum();
        assert_eq!(t.cell_count(), total);
    }

    #[test]
    fn global_ids_resolve_to_parent_and_child() {
        let p = uniform(400, 2);
        let t = grid_in_grid(&p);
        let ci = t.cell_index(&p, &CellQuery::voronoi()).unwrap();
        let parent_ci = t.parent().cell_index(&p, &CellQuery::voronoi()).unwrap();
        for i in 0..p.len() {
            let cells = ci.cells_of(i);
            assert_eq!(cells.len(), 1);
            let (parent, child) = t.resolve(cells[0]).unwrap();
            assert_eq!(parent_ci.cells_of(i).as_slice(), &[parent]);
            let child = child.unwrap();
            assert!(child.index() < t.child(parent).unwrap().cell_count());
            assert_eq!(t.global_id(parent, Some(child)), Some(cells[0]));
        }
    }

    #[test]
    fn degenerate_parent_cells_stay_whole() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut rows: Vec<[f64; 2]> = (0..30)
            .map(|_| [0.4 * rng.random::<f64>(), rng.random()])
            .collect();
        rows.extend(std::iter::repeat_n([0.9, 0.5], 30));
        let p = Points::from_rows(2, &rows).unwrap();
        let t = NestedConfig::new(
            MethodConfig::Grid(GridConfig::with_slices(vec![2, 1])),
            MethodConfig::Grid(GridConfig::default()),
        )
        .tessellate(&p, &CommonParams::default().with_distance(0.1))
        .unwrap();
        assert!(t.child(CellId(0)).is_some());
        assert!(t.child(CellId(1)).is_none());
        let last = CellId::from(t.cell_count() - 1);
        assert_eq!(t.resolve(last), Some((CellId(1), None)));
        assert_eq!(t.global_id(CellId(1), None), Some(last));
        assert_eq!(t.global_id(CellId(1), Some(CellId(0))), None);
    }

    #[test]
    fn sparse_parents_get_no_child() {
        let p = uniform(40, 4);
        let t = NestedConfig::new(
            MethodConfig::Grid(GridConfig::with_slices(vec![2, 2])),
            MethodConfig::Grid(GridConfig::default()),
        )
        .with_min_child_reference(1000)
        .tessellate(&p, &CommonParams::default().with_distance(0.1))
        .unwrap();
        assert_eq!(t.child_count(), 0);
        assert_eq!(t.cell_count(), 4);
        assert_eq!(t.cell_adjacency(), t.parent().cell_adjacency());
    }

    #[test]
    fn adjacency_crosses_parent_borders() {
        let p = uniform(400, 5);
        let t = grid_in_grid(&p);
        let adj = t.cell_adjacency();
        for (a, b) in t.parent().cell_adjacency().edges() {
            let linked = adj.edges().any(|(x, y)| {
                let (px, _) = t.resolve(x).unwrap();
                let (py, _) = t.resolve(y).unwrap();
                (px, py) == (a, b) || (px, py) == (b, a)
            });
            assert!(linked, "parents {a} and {b} are not linked");
        }
    }

    #[test]
    fn mixed_levels_are_rejected() {
        let cfg = NestedConfig::new(
            MethodConfig::Grid(GridConfig::default()),
            MethodConfig::Window(WindowConfig::seconds(1.0, 1.0)),
        );
        assert!(matches!(
            cfg.validate(),
            Err(TessellationError::InvalidConfig { .. })
        ));
        assert!(NestedConfig::default()
            .with_min_child_reference(0)
            .validate()
            .is_err());
    }

    #[test]
    fn windows_inside_lattice_segments() {
        let times: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
        let p = Points::new(1, vec![0.0; times.len()])
            .unwrap()
            .with_times(times)
            .unwrap();
        let t = NestedConfig::new(
            MethodConfig::Lattice(LatticeConfig::new(vec![(0.0, 5.0), (5.0, 10.0)])),
            MethodConfig::Window(WindowConfig::seconds(1.0, 1.0)),
        )
        .tessellate(&p, &CommonParams::default())
        .unwrap();
        assert!(t.is_temporal());
        assert_eq!(t.child_count(), 2);
        let ci = t.cell_index(&p, &CellQuery::voronoi()).unwrap();
        let time = p.time(57).unwrap();
        let (parent, child) = t.resolve(ci.cells_of(57)[0]).unwrap();
        assert_eq!(parent, CellId(1));
        let (s, e) = t
            .child(parent)
            .and_then(|c| c.downcast_ref::<crate::lattice::TimeLattice>())
            .and_then(|l| l.segment(child.unwrap()))
            .unwrap();
        assert!(s <= time && time < e);
    }

    #[test]
    fn lower_bound_exhausts_the_own_parent_first() {
        let p = uniform(400, 7);
        let t = NestedConfig::new(
            MethodConfig::Grid(GridConfig::with_slices(vec![2, 2])),
            MethodConfig::Grid(GridConfig::with_slices(vec![2, 2])),
        )
        .tessellate(&p, &CommonParams::default().with_distance(0.1))
        .unwrap();
        assert_eq!(t.child_count(), 4);
        let ci = t.cell_index(&p, &CellQuery::voronoi().with_knn(Knn::between(6, 6))).unwrap();
        let parent_ci = t.parent().cell_index(&p, &CellQuery::voronoi()).unwrap();
        for i in 0..p.len() {
            let home = parent_ci.cells_of(i)[0];
            let cells = ci.cells_of(i);
            assert_eq!(cells.len(), 6);
            let own = cells
                .iter()
                .filter(|c| t.resolve(**c).map(|(parent, _)| parent) == Some(home))
                .count();
            assert_eq!(own, t.child(home).unwrap().cell_count());
        }
    }

    #[test]
    fn childless_parents_borrow_neighbouring_cells() {
        let p = uniform(40, 8);
        let t = NestedConfig::new(
            MethodConfig::Grid(GridConfig::with_slices(vec![2, 2])),
            MethodConfig::Grid(GridConfig::default()),
        )
        .with_min_child_reference(1000)
        .tessellate(&p, &CommonParams::default().with_distance(0.1))
        .unwrap();
        let ci = t.cell_index(&p, &CellQuery::voronoi().with_knn(Knn::between(2, 2))).unwrap();
        let parent_ci = t.parent().cell_index(&p, &CellQuery::voronoi()).unwrap();
        for i in 0..p.len() {
            let home = t.global_id(parent_ci.cells_of(i)[0], None).unwrap();
            let cells = ci.cells_of(i);
            assert_eq!(cells.len(), 2);
            assert!(cells.contains(&home));
        }
    }

    #[test]
    fn sparse_cells_are_counted_before_the_cover() {
        let p = uniform(400, 9);
        let t = grid_in_grid(&p);
        let nearest = t.cell_index(&p, &CellQuery::voronoi()).unwrap();
        let counts = nearest.location_count(t.cell_count());
        let min = 8;
        let query = CellQuery::voronoi().with_knn(Knn::at_least(3)).with_min_location_count(min);
        let ci = t.cell_index(&p, &query).unwrap();
        for (c, n) in counts.iter().enumerate() {
            if *n < min {
                assert!(ci.locations_of(CellId::from(c)).is_empty());
            }
        }
    }

    #[test]
    fn compliance_suite() {
        let p = uniform(300, 6);
        let t = grid_in_grid(&p);
        compliance::run_full_compliance(&t, &p);
    }
}
