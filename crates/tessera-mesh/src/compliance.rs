//! Tessellation trait compliance test helpers.
//!
//! These functions verify that a tessellation satisfies the invariants of
//! the trait contract. Reused across every method's test module.

use crate::tessellation::Tessellation;
use tessera_core::{CellId, CellQuery, Knn, Points, TessellationError};

/// Assert that the tessellation has at least one cell.
pub fn assert_non_empty(t: &dyn Tessellation) {
    assert!(t.cell_count() > 0, "{} produced no cells", t.method());
}

/// Assert that centers form a finite `cell_count * ndim` buffer.
pub fn assert_centers_shape(t: &dyn Tessellation) {
    let centers = t.cell_centers();
    assert_eq!(
        centers.len(),
        t.cell_count() * t.ndim(),
        "center buffer does not match cell_count * ndim"
    );
    assert!(centers.iter().all(|c| c.is_finite()), "non-finite center");
    assert!(
        t.avg_distance().is_finite() && t.avg_distance() > 0.0,
        "avg_distance = {}",
        t.avg_distance()
    );
}

/// Assert that adjacency spans exactly the cells and is symmetric.
pub fn assert_adjacency_consistent(t: &dyn Tessellation) {
    let adj = t.cell_adjacency();
    assert_eq!(adj.cell_count(), t.cell_count());
    for i in 0..t.cell_count() {
        let a = CellId::from(i);
        for &b in adj.neighbours(a) {
            assert_ne!(a, b, "self-loop on {a}");
            assert!(adj.are_adjacent(b, a), "{a} -> {b} is not symmetric");
        }
    }
}

/// Assert that repeated queries give identical answers.
pub fn assert_deterministic(t: &dyn Tessellation, points: &Points) {
    for query in [
        CellQuery::voronoi(),
        CellQuery::voronoi().with_knn(Knn::between(1, 3)),
    ] {
        let a = t.cell_index(points, &query).unwrap();
        let b = t.cell_index(points, &query).unwrap();
        assert_eq!(a, b, "cell_index is not deterministic for {query:?}");
    }
}

/// Assert that every assigned cell id is in range.
pub fn assert_indices_in_range(t: &dyn Tessellation, points: &Points) {
    let ci = t.cell_index(points, &CellQuery::voronoi()).unwrap();
    assert_eq!(ci.len(), points.len());
    for (i, c) in ci.iter_pairs() {
        assert!(
            c.index() < t.cell_count(),
            "location {i} mapped to {c}, only {} cells",
            t.cell_count()
        );
    }
}

/// Assert that a query table of the wrong dimension is rejected.
///
/// Temporal tessellations accept any spatial dimension and are skipped.
pub fn assert_dimension_checked(t: &dyn Tessellation) {
    if t.is_temporal() {
        return;
    }
    let dim = t.ndim() + 1;
    let wrong = Points::new(dim, vec![0.0; dim]).unwrap();
    match t.cell_index(&wrong, &CellQuery::voronoi()) {
        Err(TessellationError::DimensionMismatch { expected, found }) => {
            assert_eq!((expected, found), (t.ndim(), dim));
        }
        other => panic!("expected DimensionMismatch, got {other:?}"),
    }
}

/// Assert that a `knn` cover gives every location between `min` and
/// `max` cells, `min` being capped by the number of cells.
pub fn assert_knn_bounds(t: &dyn Tessellation, points: &Points, min: usize, max: usize) {
    let ci = t
        .cell_index(points, &CellQuery::voronoi().with_knn(Knn::between(min, max)))
        .unwrap();
    let floor = min.min(t.cell_count());
    for i in 0..points.len() {
        let n = ci.cells_of(i).len();
        assert!(
            (floor..=max).contains(&n),
            "location {i} has {n} cells, expected {floor}..={max}"
        );
    }
}

/// Run every compliance check.
pub fn run_full_compliance(t: &dyn Tessellation, points: &Points) {
    assert_non_empty(t);
    assert_centers_shape(t);
    assert_adjacency_consistent(t);
    assert_deterministic(t, points);
    assert_indices_in_range(t, points);
    assert_dimension_checked(t);
    assert_knn_bounds(t, points, 2, 4);
}
