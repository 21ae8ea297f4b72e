//! Test fixtures and shared assertions for Tessera development.
//!
//! [`fixtures`] builds seeded location tables. The assertions below check
//! the properties every cell index and strict partition must satisfy and
//! panic with a readable message otherwise.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{clustered, lattice_points, timestamps, trajectories, uniform_in, uniform_points};

use tessera_core::CellIndex;

/// Assert that no location belongs to more than one cell.
pub fn assert_strict_partition(index: &CellIndex) {
    for i in 0..index.len() {
        let n = index.cells_of(i).len();
        assert!(n <= 1, "location {i} belongs to {n} cells");
    }
}

/// Assert that every location is assigned.
pub fn assert_fully_assigned(index: &CellIndex) {
    assert_eq!(
        index.assigned_count(),
        index.len(),
        "{} of {} locations unassigned",
        index.len() - index.assigned_count(),
        index.len()
    );
}

/// Assert that every location has between `min` and `max` cells.
pub fn assert_cover_bounds(index: &CellIndex, min: usize, max: usize) {
    for i in 0..index.len() {
        let n = index.cells_of(i).len();
        assert!(
            (min..=max).contains(&n),
            "location {i} has {n} cells, expected {min}..={max}"
        );
    }
}

/// Assert that no populated cell holds fewer than `threshold` locations.
pub fn assert_no_cell_below(counts: &[usize], threshold: usize) {
    for (cell, &n) in counts.iter().enumerate() {
        assert!(
            n == 0 || n >= threshold,
            "cell {cell} holds {n} locations, threshold is {threshold}"
        );
    }
}
