//! Static k-d tree for nearest-center queries.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A neighbour found by [`KdIndex`]: row index and squared distance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbour {
    /// Row of the indexed buffer.
    pub index: usize,
    /// Squared Euclidean distance to the query.
    pub dist2: f64,
}

impl Eq for Neighbour {}

impl Ord for Neighbour {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist2
            .total_cmp(&other.dist2)
            .then(self.index.cmp(&other.index))
    }
}

impl PartialOrd for Neighbour {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Clone, Debug)]
struct Node {
    row: usize,
    axis: usize,
    left: Option<usize>,
    right: Option<usize>,
}

/// Immutable k-d tree over a row-major point buffer.
///
/// Results are ordered by `(distance, row)`, so ties always resolve to the
/// lower row and repeated queries are deterministic.
#[derive(Clone, Debug)]
pub struct KdIndex {
    dim: usize,
    coords: Vec<f64>,
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl KdIndex {
    /// Build the tree. `coords.len()` must be a multiple of `dim`.
    pub fn new(dim: usize, coords: Vec<f64>) -> Self {
        debug_assert!(dim > 0 && coords.len() % dim == 0);
        let n = coords.len() / dim;
        let mut rows: Vec<usize> = (0..n).collect();
        let mut index = Self {
            dim,
            coords,
            nodes: Vec::with_capacity(n),
            root: None,
        };
        index.root = index.build(&mut rows, 0);
        index
    }

    fn build(&mut self, rows: &mut [usize], depth: usize) -> Option<usize> {
        if rows.is_empty() {
            return None;
        }
        let axis = depth % self.dim;
        let mid = rows.len() / 2;
        {
            let coords = &self.coords;
            let dim = self.dim;
            rows.select_nth_unstable_by(mid, |&a, &b| {
                coords[a * dim + axis]
                    .total_cmp(&coords[b * dim + axis])
                    .then(a.cmp(&b))
            });
        }
        let row = rows[mid];
        let (lo, rest) = rows.split_at_mut(mid);
        let hi = &mut rest[1..];
        let left = self.build(lo, depth + 1);
        let right = self.build(hi, depth + 1);
        self.nodes.push(Node {
            row,
            axis,
            left,
            right,
        });
        Some(self.nodes.len() - 1)
    }

    /// Number of indexed rows.
    pub fn len(&self) -> usize {
        self.coords.len() / self.dim
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Dimension of the indexed rows.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Coordinates of row `i`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.coords[i * self.dim..(i + 1) * self.dim]
    }

    fn dist2(&self, row: usize, q: &[f64]) -> f64 {
        self.row(row)
            .iter()
            .zip(q)
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }

    /// Nearest row to `q`.
    pub fn nearest(&self, q: &[f64]) -> Option<Neighbour> {
        self.k_nearest(q, 1).into_iter().next()
    }

    /// The `k` nearest rows to `q`, closest first.
    pub fn k_nearest(&self, q: &[f64], k: usize) -> Vec<Neighbour> {
        if k == 0 {
            return Vec::new();
        }
        let mut heap = BinaryHeap::with_capacity(k + 1);
        if let Some(root) = self.root {
            self.search_k(root, q, k, &mut heap);
        }
        heap.into_sorted_vec()
    }

    fn search_k(&self, node: usize, q: &[f64], k: usize, heap: &mut BinaryHeap<Neighbour>) {
        let n = &self.nodes[node];
        let cand = Neighbour {
            index: n.row,
            dist2: self.dist2(n.row, q),
        };
        if heap.len() < k {
            heap.push(cand);
        } else if heap.peek().is_some_and(|worst| cand < *worst) {
            heap.pop();
            heap.push(cand);
        }

        let diff = q[n.axis] - self.coords[n.row * self.dim + n.axis];
        let (near, far) = if diff < 0.0 {
            (n.left, n.right)
        } else {
            (n.right, n.left)
        };
        if let Some(near) = near {
            self.search_k(near, q, k, heap);
        }
        if let Some(far) = far {
            let visit = heap.len() < k || heap.peek().is_some_and(|w| diff * diff <= w.dist2);
            if visit {
                self.search_k(far, q, k, heap);
            }
        }
    }

    /// Every row within `radius` of `q`, closest first.
    pub fn within(&self, q: &[f64], radius: f64) -> Vec<Neighbour> {
        let mut out = Vec::new();
        if let Some(root) = self.root {
            self.search_radius(root, q, radius * radius, &mut out);
        }
        out.sort_unstable();
        out
    }

    fn search_radius(&self, node: usize, q: &[f64], r2: f64, out: &mut Vec<Neighbour>) {
        let n = &self.nodes[node];
        let d2 = self.dist2(n.row, q);
        if d2 <= r2 {
            out.push(Neighbour {
                index: n.row,
                dist2: d2,
            });
        }
        let diff = q[n.axis] - self.coords[n.row * self.dim + n.axis];
        let (near, far) = if diff < 0.0 {
            (n.left, n.right)
        } else {
            (n.right, n.left)
        };
        if let Some(near) = near {
            self.search_radius(near, q, r2, out);
        }
        if let Some(far) = far {
            if diff * diff <= r2 {
                self.search_radius(far, q, r2, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn brute_k(coords: &[f64], dim: usize, q: &[f64], k: usize) -> Vec<usize> {
        let mut all: Vec<Neighbour> = coords
            .chunks_exact(dim)
            .enumerate()
            .map(|(i, r)| Neighbour {
                index: i,
                dist2: r.iter().zip(q).map(|(a, b)| (a - b) * (a - b)).sum(),
            })
            .collect();
        all.sort();
        all.into_iter().take(k).map(|n| n.index).collect()
    }

    #[test]
    fn nearest_on_line() {
        let idx = KdIndex::new(1, vec![0.0, 10.0, 5.0, 2.0]);
        assert_eq!(idx.nearest(&[4.0]).unwrap().index, 2);
        assert_eq!(idx.nearest(&[-3.0]).unwrap().index, 0);
    }

    #[test]
    fn ties_resolve_to_lower_row() {
        let idx = KdIndex::new(1, vec![1.0, -1.0]);
        assert_eq!(idx.nearest(&[0.0]).unwrap().index, 0);
        let idx = KdIndex::new(2, vec![1.0, 0.0, 0.0, 1.0, -1.0, 0.0, 0.0, -1.0]);
        let k: Vec<usize> = idx.k_nearest(&[0.0, 0.0], 2).iter().map(|n| n.index).collect();
        assert_eq!(k, vec![0, 1]);
    }

    #[test]
    fn within_radius_sorted() {
        let idx = KdIndex::new(2, vec![0.0, 0.0, 1.0, 0.0, 3.0, 0.0]);
        let found: Vec<usize> = idx.within(&[0.9, 0.0], 1.0).iter().map(|n| n.index).collect();
        assert_eq!(found, vec![1, 0]);
    }

    #[test]
    fn empty_index_finds_nothing() {
        let idx = KdIndex::new(2, vec![]);
        assert!(idx.nearest(&[0.0, 0.0]).is_none());
        assert!(idx.is_empty());
    }

    proptest! {
        #[test]
        fn k_nearest_matches_brute_force(
            raw in prop::collection::vec(-10i32..10, 2..80),
            qx in -12i32..12,
            qy in -12i32..12,
            k in 1usize..6,
        ) {
            let mut coords: Vec<f64> = raw.iter().map(|&v| v as f64 * 0.5).collect();
            if coords.len() % 2 == 1 {
                coords.pop();
            }
            let idx = KdIndex::new(2, coords.clone());
            let q = [qx as f64 * 0.5, qy as f64 * 0.5];
            let got: Vec<usize> = idx.k_nearest(&q, k).iter().map(|n| n.index).collect();
            prop_assert_eq!(got, brute_k(&coords, 2, &q, k));
        }
    }
}
