//! End-to-end runs through the facade.

use std::sync::Arc;
use tessera::mesh::{GridMesh, NestedConfig, NestedTessellation, WindowConfig};
use tessera::prelude::*;
use tessera_test_utils::{trajectories, uniform_points};

#[test]
fn thousand_uniform_points_on_a_grid() {
    let p = uniform_points(1000, 2, 11);
    let part = Tesseller::new("grid".parse::<Method>().map(MethodConfig::with_defaults).unwrap())
        .with_common(CommonParams::default().with_distance(0.1))
        .run(&p)
        .unwrap();
    let grid = part.tessellation().downcast_ref::<GridMesh>().unwrap();
    assert_eq!(grid.slices().len(), 2);
    assert!(grid.cell_widths().iter().all(|w| (0.18..0.22).contains(w)));
    assert_eq!(part.location_count().unwrap().iter().sum::<usize>(), 1000);
}

#[test]
fn one_tessellation_two_partitions() {
    let reference = uniform_points(500, 2, 12);
    let t: Arc<dyn Tessellation> = Arc::from(
        MethodConfig::with_defaults(Method::KMeans)
            .tessellate(&reference, &CommonParams::default().with_distance(0.1))
            .unwrap(),
    );
    let a = Partition::new(reference, t.clone());
    let b = Partition::new(uniform_points(50, 2, 13), t.clone())
        .with_query(CellQuery::voronoi().with_knn(Knn::between(2, 3)));
    assert_eq!(a.cell_index().unwrap().len(), 500);
    let cover = b.cell_index().unwrap();
    assert!((0..50).all(|i| (2..=3).contains(&cover.cells_of(i).len())));
}

#[test]
fn sliding_windows_over_trajectories() {
    let p = trajectories(10, 40, 0.02, 0.05, 14);
    let part = Tesseller::new(MethodConfig::Window(WindowConfig::seconds(0.5, 0.25)))
        .run(&p)
        .unwrap();
    assert!(part.tessellation().is_temporal());
    let ci = part.cell_index().unwrap();
    assert!(ci.is_overlapping());
    assert_eq!(ci.assigned_count(), p.len());
}

#[test]
fn nested_partition_resolves_through_its_parent() {
    let p = uniform_points(800, 2, 15);
    let part = Tesseller::new(MethodConfig::Nested(NestedConfig::default()))
        .with_common(CommonParams::default().with_distance(0.1))
        .run(&p)
        .unwrap();
    let nested = part
        .tessellation()
        .downcast_ref::<NestedTessellation>()
        .unwrap();
    for (_, global) in part.cell_index().unwrap().iter_pairs() {
        let (parent, child) = nested.resolve(global).unwrap();
        assert!(parent.index() < nested.parent().cell_count());
        if let Some(c) = child {
            assert!(c.index() < nested.child(parent).unwrap().cell_count());
        }
    }
}

#[test]
fn unknown_methods_are_reported() {
    assert!(matches!(
        "delaunay".parse::<Method>(),
        Err(TessellationError::UnknownMethod { .. })
    ));
}
