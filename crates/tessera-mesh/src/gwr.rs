//! Growing-when-required gas.
//!
//! A topology graph whose nodes compete for the reference locations. The
//! two nodes nearest a sample are linked; when even the nearest one is too
//! far and has already fired often, a node is inserted between it and the
//! sample. Otherwise the winner and its neighbours move toward the sample
//! at rates damped by their habituation. Stale edges are pruned and nodes
//! left without edges disappear.
//!
//! Cell count and cell probability targets only steer insertion. The final
//! number of nodes is never guaranteed.

use crate::adjacency::Adjacency;
use crate::centers::{dist2, CellCenters};
use crate::params::{prepare, CommonParams, SPACING_FACTOR};
use crate::registry::Method;
use crate::voronoi::VoronoiMesh;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tessera_core::{Points, TessellationError};
use tracing::{trace, warn};

/// Settings of the growing gas method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GasConfig {
    /// Number of passes over the reference set. Fractional values train on
    /// a prefix of the last shuffled pass; values below 1 mean partial
    /// training. Default: 1.
    pub pass_count: f64,
    /// Distance beyond which a new node may be inserted, in data units.
    /// Defaults to the reference distance.
    pub insertion_threshold: Option<f64>,
    /// A winner must have habituated below this level before a node is
    /// inserted next to it. Default: 0.1.
    pub habituation_threshold: f64,
    /// Learning rate of the winner. Default: 0.2.
    pub winner_rate: f64,
    /// Learning rate of the winner's neighbours. Default: 0.01.
    pub neighbour_rate: f64,
    /// Habituation decay of the winner per firing. Default: 0.3.
    pub winner_habituation: f64,
    /// Habituation decay of the neighbours per firing. Default: 0.1.
    pub neighbour_habituation: f64,
    /// Edges older than this many winner firings are pruned. Default: 50.
    pub max_edge_age: usize,
    /// Upper bound on the number of nodes.
    pub max_nodes: Option<usize>,
    /// A winner must have won at least this fraction of the samples seen
    /// so far before a node is inserted next to it.
    pub min_probability: Option<f64>,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            pass_count: 1.0,
            insertion_threshold: None,
            habituation_threshold: 0.1,
            winner_rate: 0.2,
            neighbour_rate: 0.01,
            winner_habituation: 0.3,
            neighbour_habituation: 0.1,
            max_edge_age: 50,
            max_nodes: None,
            min_probability: None,
        }
    }
}

fn unit_interval(name: &str, v: f64) -> Result<(), TessellationError> {
    if v > 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(TessellationError::config(format!(
            "{name} must be in (0, 1], got {v}"
        )))
    }
}

impl GasConfig {
    /// Check every rate and bound.
    pub fn validate(&self) -> Result<(), TessellationError> {
        if !self.pass_count.is_finite() || self.pass_count <= 0.0 {
            return Err(TessellationError::config(format!(
                "pass_count must be finite and positive, got {}",
                self.pass_count
            )));
        }
        if let Some(t) = self.insertion_threshold {
            if !t.is_finite() || t <= 0.0 {
                return Err(TessellationError::config(format!(
                    "insertion_threshold must be finite and positive, got {t}"
                )));
            }
        }
        unit_interval("habituation_threshold", self.habituation_threshold)?;
        unit_interval("winner_rate", self.winner_rate)?;
        unit_interval("neighbour_rate", self.neighbour_rate)?;
        unit_interval("winner_habituation", self.winner_habituation)?;
        unit_interval("neighbour_habituation", self.neighbour_habituation)?;
        if let Some(p) = self.min_probability {
            unit_interval("min_probability", p)?;
        }
        if self.max_edge_age == 0 {
            return Err(TessellationError::config("max_edge_age must be positive"));
        }
        if self.max_nodes.is_some_and(|n| n < 2) {
            return Err(TessellationError::config("max_nodes must be at least 2"));
        }
        Ok(())
    }

    /// Train a gas on `reference`.
    pub fn tessellate(
        &self,
        reference: &Points,
        common: &CommonParams,
    ) -> Result<VoronoiMesh, TessellationError> {
        self.validate()?;
        let prep = prepare(Method::Gwr, reference, common)?;
        let n = reference.len();
        let target = common.target_cell_count(n);
        let d = match (prep.distance, target) {
            (Some(d), _) => d,
            (None, Some(cells)) => {
                let dims = prep.bbox.spanned_dims().max(1) as f64;
                (prep.bbox.volume() / cells as f64).powf(1.0 / dims) / SPACING_FACTOR
            }
            (None, None) => {
                return Err(TessellationError::config(
                    "gwr needs a distance, a cell count or an average location count",
                ))
            }
        };
        let threshold = self
            .insertion_threshold
            .map_or(d, |t| prep.scaler.scale_distance(t));

        let mut rng = ChaCha8Rng::seed_from_u64(common.seed);
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rng);
        let first = order[0];
        let second = order
            .iter()
            .copied()
            .find(|&i| prep.scaled.row(i) != prep.scaled.row(first))
            .ok_or_else(|| TessellationError::degenerate("gwr: all reference locations coincide"))?;

        let mut gas = Gas::new(prep.scaled.dim(), prep.scaled.row(first), prep.scaled.row(second));
        let total = ((self.pass_count * n as f64).ceil() as usize).max(1);
        let mut seen = 0usize;
        let mut pass = 0usize;
        while seen < total {
            if pass > 0 {
                order.shuffle(&mut rng);
            }
            for &i in order.iter().take(total - seen) {
                gas.adapt(self, prep.scaled.row(i), threshold, seen + 1);
                seen += 1;
            }
            pass += 1;
            trace!(
                pass,
                nodes = gas.alive_count(),
                edges = gas.edges.len(),
                "gwr pass"
            );
        }

        let (scaled, edges) = gas.into_graph();
        let cells = scaled.len() / prep.scaled.dim();
        if let Some(t) = target {
            if cells.abs_diff(t) * 10 > t {
                warn!(target = t, cells, "gwr: advisory cell count target missed");
            }
        }
        let centers = CellCenters::new(prep.scaler.clone(), scaled);
        let adjacency = Adjacency::from_edges(cells, edges);
        let fallback = prep.scaler.unscale_distance(SPACING_FACTOR * d);
        Ok(VoronoiMesh::new(Method::Gwr, centers, adjacency, fallback))
    }
}

/// Mutable training state. Dead nodes keep their slot until compaction.
struct Gas {
    dim: usize,
    nodes: Vec<f64>,
    habituation: Vec<f64>,
    wins: Vec<usize>,
    alive: Vec<bool>,
    edges: IndexMap<(usize, usize), usize>,
}

fn edge(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

impl Gas {
    fn new(dim: usize, a: &[f64], b: &[f64]) -> Self {
        let mut nodes = Vec::with_capacity(dim * 2);
        nodes.extend_from_slice(a);
        nodes.extend_from_slice(b);
        Self {
            dim,
            nodes,
            habituation: vec![1.0; 2],
            wins: vec![0; 2],
            alive: vec![true; 2],
            edges: IndexMap::new(),
        }
    }

    fn node(&self, i: usize) -> &[f64] {
        &self.nodes[i * self.dim..(i + 1) * self.dim]
    }

    fn alive_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    /// The two nearest alive nodes, nearest first. Ties go to the lower
    /// slot.
    fn two_nearest(&self, x: &[f64]) -> (usize, usize) {
        let mut best = (f64::INFINITY, 0usize);
        let mut second = (f64::INFINITY, 0usize);
        for i in (0..self.alive.len()).filter(|&i| self.alive[i]) {
            let d = dist2(self.node(i), x);
            if d < best.0 {
                second = best;
                best = (d, i);
            } else if d < second.0 {
                second = (d, i);
            }
        }
        (best.1, second.1)
    }

    fn push_node(&mut self, position: &[f64]) -> usize {
        self.nodes.extend_from_slice(position);
        self.habituation.push(1.0);
        self.wins.push(0);
        self.alive.push(true);
        self.alive.len() - 1
    }

    fn shift(&mut self, i: usize, x: &[f64], rate: f64) {
        let dim = self.dim;
        for (w, xi) in self.nodes[i * dim..(i + 1) * dim].iter_mut().zip(x) {
            *w += rate * (xi - *w);
        }
    }

    fn adapt(&mut self, cfg: &GasConfig, x: &[f64], threshold: f64, seen: usize) {
        let (b, s) = self.two_nearest(x);
        self.edges.insert(edge(b, s), 0);
        self.wins[b] += 1;

        let far = dist2(self.node(b), x).sqrt() > threshold;
        let habituated = self.habituation[b] < cfg.habituation_threshold;
        let room = cfg.max_nodes.is_none_or(|max| self.alive_count() < max);
        let frequent = cfg
            .min_probability
            .is_none_or(|p| self.wins[b] as f64 >= p * seen as f64);

        let neighbours: Vec<usize> = self
            .edges
            .keys()
            .filter_map(|&(u, v)| {
                if u == b {
                    Some(v)
                } else if v == b {
                    Some(u)
                } else {
                    None
                }
            })
            .collect();

        if far && habituated && room && frequent {
            let mid: Vec<f64> = self.node(b).iter().zip(x).map(|(w, xi)| 0.5 * (w + xi)).collect();
            let r = self.push_node(&mid);
            self.edges.shift_remove(&edge(b, s));
            self.edges.insert(edge(b, r), 0);
            self.edges.insert(edge(r, s), 0);
        } else {
            self.shift(b, x, cfg.winner_rate * self.habituation[b]);
            for &nb in &neighbours {
                self.shift(nb, x, cfg.neighbour_rate * self.habituation[nb]);
            }
        }

        self.habituation[b] -= cfg.winner_habituation * self.habituation[b];
        for &nb in &neighbours {
            self.habituation[nb] -= cfg.neighbour_habituation * self.habituation[nb];
        }

        for (&(u, v), age) in self.edges.iter_mut() {
            if u == b || v == b {
                *age += 1;
            }
        }
        self.edges.retain(|_, age| *age <= cfg.max_edge_age);
        self.remove_isolated();
    }

    fn remove_isolated(&mut self) {
        let mut degree = vec![0usize; self.alive.len()];
        for &(u, v) in self.edges.keys() {
            degree[u] += 1;
            degree[v] += 1;
        }
        for i in 0..self.alive.len() {
            if self.alive[i] && degree[i] == 0 && self.alive_count() > 2 {
                self.alive[i] = false;
            }
        }
    }

    /// Compact alive nodes; returns node positions and edges in the new
    /// numbering.
    fn into_graph(self) -> (Vec<f64>, Vec<(usize, usize)>) {
        let mut remap = vec![usize::MAX; self.alive.len()];
        let mut scaled = Vec::new();
        for i in 0..self.alive.len() {
            if self.alive[i] {
                remap[i] = scaled.len() / self.dim;
                scaled.extend_from_slice(self.node(i));
            }
        }
        let edges = self
            .edges
            .keys()
            .filter(|(u, v)| self.alive[*u] && self.alive[*v])
            .map(|&(u, v)| (remap[u], remap[v]))
            .collect();
        (scaled, edges)
    }
}
