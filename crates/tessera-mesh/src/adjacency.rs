//! Cell adjacency graphs.

use serde::{Deserialize, Serialize};
use tessera_core::CellId;

/// Undirected cell adjacency in compressed sparse row layout.
///
/// Neighbour lists are sorted by cell id and never contain the cell
/// itself. Built once when a tessellation is frozen.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjacency {
    offsets: Vec<usize>,
    neighbours: Vec<CellId>,
}

impl Adjacency {
    /// A graph of `cell_count` isolated cells.
    pub fn empty(cell_count: usize) -> Self {
        Self {
            offsets: vec![0; cell_count + 1],
            neighbours: Vec::new(),
        }
    }

    /// Build from an undirected edge list. Edges are symmetrized,
    /// deduplicated, and self-loops dropped.
    pub fn from_edges(cell_count: usize, edges: impl IntoIterator<Item = (usize, usize)>) -> Self {
        let mut directed: Vec<(usize, usize)> = Vec::new();
        for (a, b) in edges {
            if a == b || a >= cell_count || b >= cell_count {
                continue;
            }
            directed.push((a, b));
            directed.push((b, a));
        }
        directed.sort_unstable();
        directed.dedup();

        let mut offsets = vec![0usize; cell_count + 1];
        for &(a, _) in &directed {
            offsets[a + 1] += 1;
        }
        for i in 0..cell_count {
            offsets[i + 1] += offsets[i];
        }
        let neighbours = directed.into_iter().map(|(_, b)| CellId::from(b)).collect();
        Self {
            offsets,
            neighbours,
        }
    }

    /// Number of cells.
    pub fn cell_count(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Number of undirected edges.
    pub fn edge_count(&self) -> usize {
        self.neighbours.len() / 2
    }

    /// Neighbours of `cell`, sorted by id. Empty for unknown cells.
    pub fn neighbours(&self, cell: CellId) -> &[CellId] {
        let i = cell.index();
        if i + 1 >= self.offsets.len() {
            return &[];
        }
        &self.neighbours[self.offsets[i]..self.offsets[i + 1]]
    }

    /// Whether `a` and `b` share an edge.
    pub fn are_adjacent(&self, a: CellId, b: CellId) -> bool {
        self.neighbours(a).binary_search(&b).is_ok()
    }

    /// Iterate over undirected edges `(a, b)` with `a < b`.
    pub fn edges(&self) -> impl Iterator<Item = (CellId, CellId)> + '_ {
        (0..self.cell_count()).flat_map(move |i| {
            let a = CellId::from(i);
            self.neighbours(a)
                .iter()
                .filter(move |&&b| a < b)
                .map(move |&b| (a, b))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edges_are_symmetric_and_deduplicated() {
        let adj = Adjacency::from_edges(4, vec![(0, 1), (1, 0), (2, 1), (3, 3)]);
        assert_eq!(adj.edge_count(), 2);
        assert_eq!(adj.neighbours(CellId(1)), &[CellId(0), CellId(2)]);
        assert!(adj.are_adjacent(CellId(2), CellId(1)));
        assert!(adj.neighbours(CellId(3)).is_empty());
        assert_eq!(
            adj.edges().collect::<Vec<_>>(),
            vec![(CellId(0), CellId(1)), (CellId(1), CellId(2))]
        );
    }

    #[test]
    fn unknown_cell_has_no_neighbours() {
        let adj = Adjacency::empty(2);
        assert!(adj.neighbours(CellId(9)).is_empty());
        assert_eq!(adj.cell_count(), 2);
    }
}
