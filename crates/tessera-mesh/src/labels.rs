//! Integer labels on the cells and edges of a frozen tessellation.
//!
//! Tessellations never change once grown, so labels live beside them and
//! remember the instance they were made for. Every cell and every edge
//! starts at label 1. An edge keeps its place in
//! [`CellLabels::simplified_adjacency`] only while its label is strictly
//! positive.

use crate::adjacency::Adjacency;
use crate::tessellation::Tessellation;
use tessera_core::{CellId, TessellationError, TessellationInstanceId};

/// Cell and edge labels bound to one tessellation instance.
#[derive(Clone, Debug, PartialEq)]
pub struct CellLabels {
    instance_id: TessellationInstanceId,
    cells: Vec<i32>,
    /// Undirected edges `(a, b)` with `a < b`, sorted, and their labels.
    edges: Vec<((CellId, CellId), i32)>,
}

impl CellLabels {
    /// Label every cell and edge of `tessellation` with 1.
    pub fn new(tessellation: &dyn Tessellation) -> Self {
        Self {
            instance_id: tessellation.instance_id(),
            cells: vec![1; tessellation.cell_count()],
            edges: tessellation
                .cell_adjacency()
                .edges()
                .map(|e| (e, 1))
                .collect(),
        }
    }

    /// Replace all cell labels at once.
    pub fn with_cell_labels(mut self, labels: Vec<i32>) -> Result<Self, TessellationError> {
        if labels.len() != self.cells.len() {
            return Err(TessellationError::config(format!(
                "{} cell labels for {} cells",
                labels.len(),
                self.cells.len()
            )));
        }
        self.cells = labels;
        Ok(self)
    }

    /// Tessellation these labels were made for.
    pub fn instance_id(&self) -> TessellationInstanceId {
        self.instance_id
    }

    /// Label of every cell, by cell id.
    pub fn cell_labels(&self) -> &[i32] {
        &self.cells
    }

    /// Label of `cell`, `None` for unknown cells.
    pub fn cell_label(&self, cell: CellId) -> Option<i32> {
        self.cells.get(cell.index()).copied()
    }

    /// Set the label of `cell`.
    pub fn set_cell_label(&mut self, cell: CellId, label: i32) -> Result<(), TessellationError> {
        let n = self.cells.len();
        let slot = self.cells.get_mut(cell.index()).ok_or_else(|| {
            TessellationError::config(format!("cell {cell} out of range for {n} cells"))
        })?;
        *slot = label;
        Ok(())
    }

    /// Label of the edge between `a` and `b`, in either order. `None` when
    /// the cells are not adjacent.
    pub fn edge_label(&self, a: CellId, b: CellId) -> Option<i32> {
        self.edge_slot(a, b).map(|k| self.edges[k].1)
    }

    /// Set the label of the edge between `a` and `b`, in either order.
    pub fn set_edge_label(
        &mut self,
        a: CellId,
        b: CellId,
        label: i32,
    ) -> Result<(), TessellationError> {
        let k = self
            .edge_slot(a, b)
            .ok_or_else(|| TessellationError::config(format!("cells {a} and {b} are not adjacent")))?;
        self.edges[k].1 = label;
        Ok(())
    }

    /// Iterate over edges `(a, b)` with `a < b` and their labels.
    pub fn edge_labels(&self) -> impl Iterator<Item = (CellId, CellId, i32)> + '_ {
        self.edges.iter().map(|&((a, b), label)| (a, b, label))
    }

    /// The adjacency restricted to edges with a strictly positive label.
    pub fn simplified_adjacency(&self) -> Adjacency {
        Adjacency::from_edges(
            self.cells.len(),
            self.edges
                .iter()
                .filter(|(_, label)| *label > 0)
                .map(|&((a, b), _)| (a.index(), b.index())),
        )
    }

    fn edge_slot(&self, a: CellId, b: CellId) -> Option<usize> {
        let key = if a < b { (a, b) } else { (b, a) };
        self.edges.binary_search_by(|(e, _)| e.cmp(&key)).ok()
    }
}
