//! A tessellation bound to a concrete location table.

use crate::error::PartitionError;
use crate::strict::{Enforcement, StrictConstraint};
use indexmap::IndexMap;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tessera_core::{BoundingBox, CellId, CellIndex, CellQuery, Points, TessellationInstanceId};
use tessera_mesh::{Adjacency, CellLabels, CommonParams, Tessellation};

/// Derived state, computed on first access.
#[derive(Debug)]
struct Derived {
    instance: TessellationInstanceId,
    raw: CellIndex,
    enforced: Option<Enforcement>,
    counts: Vec<usize>,
}

impl Derived {
    fn index(&self) -> &CellIndex {
        self.enforced.as_ref().map_or(&self.raw, |e| &e.index)
    }
}

/// Two locations sitting in adjacent, distinct cells.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointPair {
    /// Row of the first location.
    pub from: usize,
    /// Row of the second location.
    pub to: usize,
    /// Distance between them, in data units (seconds for temporal
    /// tessellations).
    pub distance: f64,
}

/// Binds a shared [`Tessellation`] to a set of locations or translocation
/// origins.
///
/// The cell index, the per-cell counts and the bounding box are computed
/// lazily and cached. Replacing the tessellation, the locations or the
/// query resets the cache. A tessellation is shared through an [`Arc`]
/// and never mutated, so many partitions can read one tessellation
/// concurrently.
pub struct Partition {
    points: Points,
    tessellation: Arc<dyn Tessellation>,
    query: CellQuery,
    strict: Option<StrictConstraint>,
    common: Option<CommonParams>,
    labels: Option<CellLabels>,
    derived: OnceLock<Derived>,
    bbox: OnceLock<Option<BoundingBox>>,
}

impl Partition {
    /// Bind `tessellation` to `points` with a plain nearest-cell query.
    pub fn new(points: Points, tessellation: Arc<dyn Tessellation>) -> Self {
        Self {
            points,
            tessellation,
            query: CellQuery::voronoi(),
            strict: None,
            common: None,
            labels: None,
            derived: OnceLock::new(),
            bbox: OnceLock::new(),
        }
    }

    /// Use `query` to map locations onto cells.
    pub fn with_query(mut self, query: CellQuery) -> Self {
        self.set_query(query);
        self
    }

    /// Enforce `strict` on the cell index.
    pub fn with_strict(mut self, strict: StrictConstraint) -> Self {
        self.strict = Some(strict);
        self.derived = OnceLock::new();
        self
    }

    /// Record the parameters the tessellation was grown with, for
    /// [`params`](Self::params).
    pub fn with_common_params(mut self, common: CommonParams) -> Self {
        self.common = Some(common);
        self
    }

    /// Attach cell and edge labels made for the bound tessellation.
    pub fn with_labels(mut self, labels: CellLabels) -> Result<Self, PartitionError> {
        let expected = self.tessellation.instance_id();
        if labels.instance_id() != expected {
            return Err(PartitionError::ForeignLabels {
                expected,
                found: labels.instance_id(),
            });
        }
        self.labels = Some(labels);
        Ok(self)
    }

    /// The partitioned locations.
    pub fn points(&self) -> &Points {
        &self.points
    }

    /// The bound tessellation.
    pub fn tessellation(&self) -> &Arc<dyn Tessellation> {
        &self.tessellation
    }

    /// The query mapping locations onto cells.
    pub fn query(&self) -> &CellQuery {
        &self.query
    }

    /// Attached labels, if any.
    pub fn labels(&self) -> Option<&CellLabels> {
        self.labels.as_ref()
    }

    /// The strict constraint, if any.
    pub fn strict(&self) -> Option<&StrictConstraint> {
        self.strict.as_ref()
    }

    /// Replace the tessellation and reset the cache. Attached labels are
    /// dropped.
    pub fn set_tessellation(&mut self, tessellation: Arc<dyn Tessellation>) {
        self.tessellation = tessellation;
        self.labels = None;
        self.derived = OnceLock::new();
    }

    /// Replace the locations and reset the cache.
    pub fn set_points(&mut self, points: Points) {
        self.points = points;
        self.derived = OnceLock::new();
        self.bbox = OnceLock::new();
    }

    /// Replace the query and reset the cache.
    pub fn set_query(&mut self, query: CellQuery) {
        self.query = query;
        self.derived = OnceLock::new();
    }

    /// Instance id of the tessellation the cache was computed for, if it
    /// has been computed.
    pub fn cached_for(&self) -> Option<TessellationInstanceId> {
        self.derived.get().map(|d| d.instance)
    }

    fn derived(&self) -> Result<&Derived, PartitionError> {
        if let Some(d) = self.derived.get() {
            debug_assert_eq!(d.instance, self.tessellation.instance_id());
            return Ok(d);
        }
        if let Some(strict) = &self.strict {
            strict.validate()?;
        }
        let t = self.tessellation.as_ref();
        let raw = t.cell_index(&self.points, &self.query)?;
        let enforced = self.strict.map(|s| s.enforce(&raw, t));
        let counts = enforced
            .as_ref()
            .map_or(&raw, |e| &e.index)
            .location_count(t.cell_count());
        tracing::debug!(
            instance = %t.instance_id(),
            locations = self.points.len(),
            cells = t.cell_count(),
            populated = counts.iter().filter(|&&n| n > 0).count(),
            "cell index computed"
        );
        let derived = Derived {
            instance: t.instance_id(),
            raw,
            enforced,
            counts,
        };
        Ok(self.derived.get_or_init(|| derived))
    }

    /// The tessellation's answer, before strict enforcement.
    pub fn raw_cell_index(&self) -> Result<&CellIndex, PartitionError> {
        Ok(&self.derived()?.raw)
    }

    /// The location-to-cell assignment after strict enforcement.
    ///
    /// Cell ids are those of the tessellation; merged and discarded cells
    /// are left empty.
    pub fn cell_index(&self) -> Result<&CellIndex, PartitionError> {
        Ok(self.derived()?.index())
    }

    /// Locations per cell, for every cell of the tessellation.
    pub fn location_count(&self) -> Result<&[usize], PartitionError> {
        Ok(&self.derived()?.counts)
    }

    /// Cells merged away by a strict constraint, mapped to the cell that
    /// absorbed them.
    pub fn merged_into(&self) -> Result<Option<&BTreeMap<CellId, CellId>>, PartitionError> {
        Ok(self.derived()?.enforced.as_ref().map(|e| &e.merged_into))
    }

    /// Cells discarded by a strict constraint.
    pub fn discarded(&self) -> Result<&[CellId], PartitionError> {
        Ok(self
            .derived()?
            .enforced
            .as_ref()
            .map_or(&[][..], |e| e.discarded.as_slice()))
    }

    /// Cell adjacency without the edges labelled zero or below. The full
    /// adjacency when no labels are attached.
    pub fn simplified_adjacency(&self) -> Adjacency {
        match &self.labels {
            Some(labels) => labels.simplified_adjacency(),
            None => self.tessellation.cell_adjacency().clone(),
        }
    }

    /// Every pair of locations in adjacent, distinct cells, sorted by
    /// `(from, to)`.
    ///
    /// With `symmetric` unset only the direction from the lower cell id to
    /// the higher one is listed. Fails with
    /// [`PartitionError::OverlappingCover`] when a location sits in more
    /// than one cell.
    pub fn point_adjacency(&self, symmetric: bool) -> Result<Vec<PointPair>, PartitionError> {
        self.point_pairs(symmetric, |_, _| true)
    }

    /// [`point_adjacency`](Self::point_adjacency) following only the edges
    /// whose label passes `edge` and whose two cells both pass `cell`.
    /// Unlabelled partitions see label 1 everywhere.
    pub fn point_adjacency_by_label(
        &self,
        symmetric: bool,
        cell: impl Fn(i32) -> bool,
        edge: impl Fn(i32) -> bool,
    ) -> Result<Vec<PointPair>, PartitionError> {
        let labels = self.labels.as_ref();
        let cell_ok = |c: CellId| cell(labels.and_then(|l| l.cell_label(c)).unwrap_or(1));
        let edge_ok =
            |a: CellId, b: CellId| edge(labels.and_then(|l| l.edge_label(a, b)).unwrap_or(1));
        self.point_pairs(symmetric, |a, b| cell_ok(a) && cell_ok(b) && edge_ok(a, b))
    }

    fn point_pairs(
        &self,
        symmetric: bool,
        keep: impl Fn(CellId, CellId) -> bool,
    ) -> Result<Vec<PointPair>, PartitionError> {
        let index = self.cell_index()?;
        if index.is_overlapping() {
            return Err(PartitionError::OverlappingCover);
        }
        let t = self.tessellation.as_ref();
        let mut members: Vec<Vec<usize>> = vec![Vec::new(); t.cell_count()];
        for (i, c) in index.iter_pairs() {
            if let Some(m) = members.get_mut(c.index()) {
                m.push(i);
            }
        }
        let times = if t.is_temporal() {
            self.points.times()
        } else {
            None
        };
        let distance = |i: usize, j: usize| match times {
            Some(ts) => (ts[i] - ts[j]).abs(),
            None => self
                .points
                .row(i)
                .iter()
                .zip(self.points.row(j))
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>()
                .sqrt(),
        };

        let mut out = Vec::new();
        for (a, b) in t.cell_adjacency().edges() {
            if !keep(a, b) {
                continue;
            }
            for &i in &members[a.index()] {
                for &j in &members[b.index()] {
                    let d = distance(i, j);
                    out.push(PointPair {
                        from: i,
                        to: j,
                        distance: d,
                    });
                    if symmetric {
                        out.push(PointPair {
                            from: j,
                            to: i,
                            distance: d,
                        });
                    }
                }
            }
        }
        out.sort_by_key(|p| (p.from, p.to));
        tracing::debug!(
            instance = %t.instance_id(),
            pairs = out.len(),
            symmetric,
            "point adjacency computed"
        );
        Ok(out)
    }

    /// Bounding box of the locations. `None` for an empty table.
    pub fn bounding_box(&self) -> Option<&BoundingBox> {
        self.bbox
            .get_or_init(|| self.points.bounding_box())
            .as_ref()
    }

    /// Ordered record of the method, parameters and query behind this
    /// partition.
    pub fn params(&self) -> IndexMap<String, String> {
        let t = self.tessellation.as_ref();
        let mut out = IndexMap::new();
        let mut put = |k: &str, v: String| {
            out.insert(k.to_string(), v);
        };
        put("method", t.method().to_string());
        put("cell_count", t.cell_count().to_string());
        put("avg_distance", t.avg_distance().to_string());
        if let Some(c) = &self.common {
            if let Some(d) = c.distance {
                put("distance", d.to_string());
            }
            if let Some(n) = c.cell_count {
                put("target_cell_count", n.to_string());
            }
            if let Some(n) = c.avg_location_count {
                put("avg_location_count", n.to_string());
            }
            if let Some(n) = c.min_location_count {
                put("min_location_count", n.to_string());
            }
            put("scaler", format!("{:?}", c.scaler));
            put("seed", c.seed.to_string());
        }
        if let Some(knn) = self.query.knn {
            if let Some(n) = knn.min {
                put("knn_min", n.to_string());
            }
            if let Some(n) = knn.max {
                put("knn_max", n.to_string());
            }
        }
        if let Some(r) = self.query.radius {
            put("radius", r.to_string());
        }
        if let Some(b) = self.query.per_cell {
            if let Some(n) = b.min {
                put("per_cell_min", n.to_string());
            }
            if let Some(n) = b.max {
                put("per_cell_max", n.to_string());
            }
        }
        if let Some(n) = self.query.min_location_count {
            put("query_min_location_count", n.to_string());
        }
        if let Some(s) = &self.strict {
            put("strict_min_location_count", s.min_location_count.to_string());
            put("strict_policy", format!("{:?}", s.policy));
        }
        out
    }
}

impl fmt::Debug for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Partition")
            .field("method", &self.tessellation.method())
            .field("instance", &self.tessellation.instance_id())
            .field("locations", &self.points.len())
            .field("query", &self.query)
            .field("strict", &self.strict)
            .field("labelled", &self.labels.is_some())
            .field("cached", &self.derived.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::Knn;
    use tessera_mesh::{CellLabels, GridConfig, MethodConfig};
    use tessera_test_utils::uniform_points;

    fn grid(points: &Points, d: f64) -> Arc<dyn Tessellation> {
        Arc::from(
            MethodConfig::Grid(GridConfig::default())
                .tessellate(points, &CommonParams::default().with_distance(d))
                .unwrap(),
        )
    }

    #[test]
    fn cell_index_is_cached_until_an_input_changes() {
        let p = uniform_points(200, 2, 1);
        let t = grid(&p, 0.1);
        let mut part = Partition::new(p.clone(), t.clone());
        assert_eq!(part.cached_for(), None);
        let first = part.cell_index().unwrap().clone();
        assert_eq!(part.cached_for(), Some(t.instance_id()));
        assert_eq!(part.cell_index().unwrap(), &first);

        let other = grid(&p, 0.2);
        part.set_tessellation(other.clone());
        assert_eq!(part.cached_for(), None);
        part.cell_index().unwrap();
        assert_eq!(part.cached_for(), Some(other.instance_id()));

        part.set_query(CellQuery::voronoi().with_knn(Knn::between(2, 2)));
        assert_eq!(part.cached_for(), None);
        assert!(part.cell_index().unwrap().is_overlapping());
    }

    #[test]
    fn counts_cover_every_cell() {
        let p = uniform_points(300, 2, 2);
        let t = grid(&p, 0.1);
        let part = Partition::new(p, t.clone());
        let counts = part.location_count().unwrap();
        assert_eq!(counts.len(), t.cell_count());
        assert_eq!(counts.iter().sum::<usize>(), 300);
    }

    #[test]
    fn strict_constraint_changes_only_the_enforced_index() {
        let p = uniform_points(300, 2, 3);
        let t = grid(&p, 0.05);
        let part = Partition::new(p, t).with_strict(StrictConstraint::discard(5));
        let raw = part.raw_cell_index().unwrap().clone();
        assert_eq!(raw.assigned_count(), 300);
        let counts = part.location_count().unwrap();
        assert!(counts.iter().all(|&n| n == 0 || n >= 5), "{counts:?}");
        assert!(!part.discarded().unwrap().is_empty());
        assert!(part.merged_into().unwrap().unwrap().is_empty());
    }

    #[test]
    fn invalid_strict_constraint_surfaces_on_access() {
        let p = uniform_points(50, 2, 4);
        let t = grid(&p, 0.1);
        let part = Partition::new(p, t).with_strict(StrictConstraint::merge(0));
        assert!(matches!(
            part.cell_index(),
            Err(PartitionError::InvalidConstraint { .. })
        ));
    }

    #[test]
    fn new_points_reset_the_bounding_box() {
        let p = uniform_points(50, 2, 5);
        let t = grid(&p, 0.1);
        let mut part = Partition::new(p, t);
        let before = part.bounding_box().cloned().unwrap();
        part.set_points(Points::from_rows(2, &[[5.0, 5.0], [6.0, 7.0]]).unwrap());
        let after = part.bounding_box().unwrap();
        assert_ne!(&before, after);
        assert_eq!(after.upper(), &[6.0, 7.0]);
    }

    #[test]
    fn params_are_ordered() {
        let p = uniform_points(50, 2, 6);
        let t = grid(&p, 0.1);
        let part = Partition::new(p, t)
            .with_common_params(CommonParams::default().with_distance(0.1))
            .with_query(CellQuery::voronoi().with_knn(Knn::at_most(3)))
            .with_strict(StrictConstraint::merge(4));
        let params = part.params();
        let keys: Vec<&str> = params.keys().map(String::as_str).collect();
        assert_eq!(keys[0], "method");
        assert_eq!(params["method"], "grid");
        assert_eq!(params["distance"], "0.1");
        assert_eq!(params["knn_max"], "3");
        assert_eq!(params["strict_policy"], "Merge");
        assert!(!params.contains_key("knn_min"));
    }

    /// Four strip cells holding 5, 1, `third` and 5 locations.
    fn strip(third: usize) -> (Points, Arc<dyn Tessellation>) {
        let mut rows = vec![[0.05]; 5];
        rows.push([0.15]);
        rows.extend(std::iter::repeat_n([0.25], third));
        rows.extend(std::iter::repeat_n([0.35], 5));
        let p = Points::from_rows(1, &rows).unwrap();
        let t = GridConfig::with_slices(vec![4])
            .tessellate(&p, &CommonParams::default())
            .unwrap();
        (p, Arc::new(t))
    }

    #[test]
    fn point_adjacency_pairs_locations_of_neighbouring_cells() {
        let (p, t) = strip(0);
        let part = Partition::new(p, t);
        assert_eq!(part.location_count().unwrap(), &[5, 1, 0, 5]);
        let one_way = part.point_adjacency(false).unwrap();
        assert_eq!(one_way.len(), 5);
        for pair in &one_way {
            assert!(pair.from < 5);
            assert_eq!(pair.to, 5);
            assert!((pair.distance - 0.1).abs() < 1e-12);
        }
        let both = part.point_adjacency(true).unwrap();
        assert_eq!(both.len(), 10);
        assert_eq!(both.last().map(|q| (q.from, q.to)), Some((5, 4)));
    }

    #[test]
    fn labels_filter_cells_and_edges() {
        let (p, t) = strip(2);
        let mut labels = CellLabels::new(t.as_ref());
        labels.set_edge_label(CellId(2), CellId(3), 0).unwrap();
        let part = Partition::new(p.clone(), t.clone())
            .with_labels(labels.clone())
            .unwrap();
        assert_eq!(part.point_adjacency(false).unwrap().len(), 5 + 2 + 10);
        let positive = |l: i32| l > 0;
        let kept = part
            .point_adjacency_by_label(false, |_| true, positive)
            .unwrap();
        assert_eq!(kept.len(), 5 + 2);
        assert_eq!(part.simplified_adjacency().edge_count(), 2);

        labels.set_cell_label(CellId(0), -1).unwrap();
        let part = Partition::new(p, t).with_labels(labels).unwrap();
        let kept = part
            .point_adjacency_by_label(false, positive, positive)
            .unwrap();
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().all(|q| q.from == 5 && (6..8).contains(&q.to)));
    }

    #[test]
    fn point_adjacency_needs_a_strict_partition() {
        let (p, t) = strip(2);
        let part = Partition::new(p, t)
            .with_query(CellQuery::voronoi().with_knn(Knn::between(2, 2)));
        assert_eq!(
            part.point_adjacency(true),
            Err(PartitionError::OverlappingCover)
        );
    }

    #[test]
    fn labels_stay_with_their_tessellation() {
        let (p, t) = strip(0);
        let (_, other) = strip(0);
        let foreign = CellLabels::new(other.as_ref());
        assert!(matches!(
            Partition::new(p.clone(), t.clone()).with_labels(foreign),
            Err(PartitionError::ForeignLabels { .. })
        ));
        let mut part = Partition::new(p, t.clone())
            .with_labels(CellLabels::new(t.as_ref()))
            .unwrap();
        assert!(part.labels().is_some());
        part.set_tessellation(other);
        assert!(part.labels().is_none());
    }
}
