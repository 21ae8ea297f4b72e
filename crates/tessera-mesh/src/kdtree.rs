//! Recursive `2^D` splitting of a bounding hypercube.

use crate::adjacency::Adjacency;
use crate::centers::CellCenters;
use crate::params::{prepare, resolve_spacing, CommonParams};
use crate::registry::Method;
use crate::tessellation::Tessellation;
use serde::{Deserialize, Serialize};
use tessera_core::{CellId, CellIndex, CellQuery, Points, TessellationError, TessellationInstanceId};

/// Highest supported dimension: a node has `2^D` children.
pub const MAX_KDTREE_DIM: usize = 8;

/// Deepest tree grown, whatever the ratio of box to base size.
const MAX_DEPTH: u32 = 30;

/// Settings of the k-d tree method.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct KdTreeConfig {
    /// Cells holding at most this many reference locations are not split
    /// further. The default 0 splits every non-empty cell down to the base
    /// size.
    pub max_location_count: usize,
    /// Cells coarser than `2^max_level` base edges are always split, which
    /// bounds the ratio between the largest and the smallest cell edge.
    pub max_level: Option<u32>,
}

impl KdTreeConfig {
    /// Check the level bound.
    pub fn validate(&self) -> Result<(), TessellationError> {
        if self.max_level.is_some_and(|l| l > MAX_DEPTH) {
            return Err(TessellationError::config(format!(
                "max_level must be at most {MAX_DEPTH}"
            )));
        }
        Ok(())
    }

    /// Grow the tree from `reference`.
    ///
    /// The base cell edge is the center spacing (`2d` or derived from a
    /// count target); the root is the smallest `base * 2^L` hypercube
    /// holding the reference bounding box.
    pub fn tessellate(
        &self,
        reference: &Points,
        common: &CommonParams,
    ) -> Result<KdTreeMesh, TessellationError> {
        self.validate()?;
        let dim = reference.dim();
        if dim > MAX_KDTREE_DIM {
            return Err(TessellationError::UnsupportedDimension {
                method: Method::KdTree.name(),
                dim,
            });
        }
        let prep = prepare(Method::KdTree, reference, common)?;
        let base = resolve_spacing(Method::KdTree, &prep, common, 1.0)?.spacing;
        let side = prep.bbox.max_extent();
        let depth = ((side / base).log2().ceil().max(0.0) as u32).min(MAX_DEPTH);
        let root_edge = base * f64::powi(2.0, depth as i32);

        let mut builder = Builder {
            dim,
            cfg: self,
            scaled: &prep.scaled,
            nodes: Vec::new(),
            leaves: Vec::new(),
        };
        let rows: Vec<usize> = (0..reference.len()).collect();
        builder.nodes.push(Node::default());
        builder.grow(0, prep.bbox.lower().to_vec(), root_edge, depth, rows);
        let Builder { nodes, leaves, .. } = builder;

        let mut scaled = Vec::with_capacity(leaves.len() * dim);
        for leaf in &leaves {
            scaled.extend(leaf.lower.iter().map(|lo| lo + 0.5 * leaf.edge));
        }
        let centers = CellCenters::new(prep.scaler, scaled);
        let adjacency = face_adjacency(dim, &leaves, base * 1e-9);
        let avg_distance = centers
            .mean_edge_length(&adjacency)
            .unwrap_or_else(|| centers.scaler().unscale_distance(root_edge));
        Ok(KdTreeMesh {
            dim,
            base,
            nodes,
            leaves,
            centers,
            adjacency,
            avg_distance,
            instance_id: TessellationInstanceId::next(),
        })
    }
}

#[derive(Clone, Debug, Default)]
struct Node {
    mid: Vec<f64>,
    first_child: Option<usize>,
    leaf: Option<CellId>,
}

#[derive(Clone, Debug)]
struct Leaf {
    lower: Vec<f64>,
    edge: f64,
    level: u32,
}

struct Builder<'a> {
    dim: usize,
    cfg: &'a KdTreeConfig,
    scaled: &'a Points,
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
}

impl Builder<'_> {
    /// Fill node `id`, a cube at `level` (edge `base * 2^level`).
    fn grow(&mut self, id: usize, lower: Vec<f64>, edge: f64, level: u32, rows: Vec<usize>) {
        let crowded = rows.len() > self.cfg.max_location_count;
        let coarse = self.cfg.max_level.is_some_and(|m| level > m);
        if level == 0 || !(crowded || coarse) {
            self.nodes[id].leaf = Some(CellId::from(self.leaves.len()));
            self.leaves.push(Leaf { lower, edge, level });
            return;
        }
        let half = 0.5 * edge;
        let mid: Vec<f64> = lower.iter().map(|lo| lo + half).collect();
        let fanout = 1usize << self.dim;
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); fanout];
        for r in rows {
            buckets[child_of(&mid, self.scaled.row(r))].push(r);
        }
        let first = self.nodes.len();
        self.nodes.resize(first + fanout, Node::default());
        self.nodes[id].mid = mid;
        self.nodes[id].first_child = Some(first);
        for (c, bucket) in buckets.into_iter().enumerate() {
            let child_lower = (0..self.dim)
                .map(|k| lower[k] + if (c >> k) & 1 == 1 { half } else { 0.0 })
                .collect();
            self.grow(first + c, child_lower, half, level - 1, bucket);
        }
    }
}

/// Child slot of `p` below a node split at `mid`: bit `k` is set for the
/// upper half of axis `k`.
fn child_of(mid: &[f64], p: &[f64]) -> usize {
    mid.iter()
        .zip(p)
        .enumerate()
        .fold(0, |c, (k, (m, x))| if x >= m { c | (1 << k) } else { c })
}

/// Leaves sharing a face of positive measure.
fn face_adjacency(dim: usize, leaves: &[Leaf], eps: f64) -> Adjacency {
    let mut order: Vec<usize> = (0..leaves.len()).collect();
    order.sort_by(|&a, &b| leaves[a].lower[0].total_cmp(&leaves[b].lower[0]).then(a.cmp(&b)));
    let mut edges = Vec::new();
    for (pos, &a) in order.iter().enumerate() {
        let la = &leaves[a];
        let a_hi = la.lower[0] + la.edge;
        for &b in &order[pos + 1..] {
            let lb = &leaves[b];
            if lb.lower[0] > a_hi + eps {
                break;
            }
            if touch(dim, la, lb, eps) {
                edges.push((a, b));
            }
        }
    }
    Adjacency::from_edges(leaves.len(), edges)
}

fn touch(dim: usize, a: &Leaf, b: &Leaf, eps: f64) -> bool {
    let mut contact = 0;
    for k in 0..dim {
        let (a_lo, a_hi) = (a.lower[k], a.lower[k] + a.edge);
        let (b_lo, b_hi) = (b.lower[k], b.lower[k] + b.edge);
        let overlap = a_hi.min(b_hi) - a_lo.max(b_lo);
        if overlap > eps {
            continue;
        }
        if overlap.abs() <= eps {
            contact += 1;
        } else {
            return false;
        }
    }
    contact == 1
}

/// A frozen k-d tree: leaves of a recursive `2^D` split.
#[derive(Clone, Debug)]
pub struct KdTreeMesh {
    dim: usize,
    base: f64,
    nodes: Vec<Node>,
    leaves: Vec<Leaf>,
    centers: CellCenters,
    adjacency: Adjacency,
    avg_distance: f64,
    instance_id: TessellationInstanceId,
}

impl KdTreeMesh {
    /// Edge of the smallest possible cell, in data units.
    pub fn base_edge(&self) -> f64 {
        self.centers.scaler().unscale_distance(self.base)
    }

    /// Edge of a leaf cell, in data units.
    pub fn cell_edge(&self, cell: CellId) -> Option<f64> {
        self.leaves
            .get(cell.index())
            .map(|l| self.centers.scaler().unscale_distance(l.edge))
    }

    /// Level of a leaf: its edge is `base * 2^level`.
    pub fn cell_level(&self, cell: CellId) -> Option<u32> {
        self.leaves.get(cell.index()).map(|l| l.level)
    }

    fn locate(&self, p: &[f64]) -> Option<CellId> {
        let mut id = 0;
        loop {
            let node = self.nodes.get(id)?;
            match (node.leaf, node.first_child) {
                (Some(leaf), _) => return Some(leaf),
                (None, Some(first)) => id = first + child_of(&node.mid, p),
                (None, None) => return None,
            }
        }
    }
}

impl Tessellation for KdTreeMesh {
    fn method(&self) -> Method {
        Method::KdTree
    }

    fn ndim(&self) -> usize {
        self.dim
    }

    fn cell_count(&self) -> usize {
        self.leaves.len()
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
        self.centers.query(points, query, |p| self.locate(p))
    }
}
