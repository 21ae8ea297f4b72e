//! Strict constraints hold for every method and policy.

use proptest::prelude::*;
use std::sync::Arc;
use tessera_core::{CellQuery, Knn};
use tessera_mesh::{CommonParams, Method, MethodConfig, Tessellation};
use tessera_partition::{Partition, StrictConstraint, StrictPolicy};
use tessera_test_utils::{assert_no_cell_below, uniform_points};

const SPATIAL: [Method; 6] = [
    Method::Random,
    Method::Grid,
    Method::Hexagon,
    Method::KdTree,
    Method::KMeans,
    Method::Gwr,
];

fn grow(method: Method, seed: u64) -> (tessera_core::Points, Arc<dyn Tessellation>) {
    let p = uniform_points(300, 2, seed);
    let t = MethodConfig::with_defaults(method)
        .tessellate(&p, &CommonParams::default().with_distance(0.05).with_seed(seed))
        .unwrap();
    (p, Arc::from(t))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn no_surviving_cell_is_below_the_threshold(
        m in 0usize..SPATIAL.len(),
        seed in 0u64..500,
        threshold in 1usize..12,
        merge in any::<bool>(),
        cover in any::<bool>(),
    ) {
        let (p, t) = grow(SPATIAL[m], seed);
        let policy = if merge { StrictPolicy::Merge } else { StrictPolicy::Discard };
        let query = if cover {
            CellQuery::voronoi().with_knn(Knn::between(1, 2))
        } else {
            CellQuery::voronoi()
        };
        let part = Partition::new(p, t)
            .with_query(query)
            .with_strict(StrictConstraint { min_location_count: threshold, policy });
        let counts = part.location_count().unwrap();
        for &n in counts {
            prop_assert!(n == 0 || n >= threshold, "count {} below {}", n, threshold);
        }
        assert_no_cell_below(counts, threshold);
    }

    #[test]
    fn merging_keeps_every_location_of_a_strict_partition(
        m in 0usize..SPATIAL.len(),
        seed in 0u64..500,
        threshold in 1usize..6,
    ) {
        let (p, t) = grow(SPATIAL[m], seed);
        let part = Partition::new(p, t).with_strict(StrictConstraint::merge(threshold));
        let raw = part.raw_cell_index().unwrap().assigned_count();
        let kept = part.cell_index().unwrap().assigned_count();
        let discarded = part.discarded().unwrap();
        // Only isolated groups can lose their locations.
        prop_assert!(kept == raw || !discarded.is_empty());
    }
}

#[test]
fn one_tessellation_serves_many_partitions() {
    let (p, t) = grow(Method::Grid, 1);
    let other = uniform_points(120, 2, 2);
    let a = Partition::new(p, t.clone());
    let b = Partition::new(other, t.clone());
    assert_eq!(a.location_count().unwrap().len(), t.cell_count());
    assert_eq!(b.location_count().unwrap().iter().sum::<usize>(), 120);
    assert_eq!(a.cached_for(), b.cached_for());

    let handles: Vec<_> = (0..4)
        .map(|seed| {
            let t = t.clone();
            std::thread::spawn(move || {
                let part = Partition::new(uniform_points(100, 2, 10 + seed), t);
                part.location_count().unwrap().iter().sum::<usize>()
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), 100);
    }
}
