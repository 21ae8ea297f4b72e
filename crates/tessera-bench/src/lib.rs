//! Benchmark profiles for the Tessera tessellation framework.
//!
//! Provides pre-built reference sets and method configurations shared by
//! the criterion benches:
//!
//! - [`reference_profile`]: 10K uniform locations in the unit square
//! - [`stress_profile`]: 100K uniform locations in the unit square
//! - [`trajectory_profile`]: 200 timed trajectories of 50 steps
//! - [`method_configs`]: one configuration per method, sized for the profiles

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tessera_core::Points;
use tessera_mesh::{
    CommonParams, GasConfig, LatticeConfig, Method, MethodConfig, NestedConfig, WindowConfig,
};
use tessera_test_utils::{trajectories, uniform_points};

/// Reference distance used by every profile.
pub const REFERENCE_DISTANCE: f64 = 0.02;

/// 10K uniform 2D locations.
pub fn reference_profile(seed: u64) -> Points {
    uniform_points(10_000, 2, seed)
}

/// 100K uniform 2D locations.
pub fn stress_profile(seed: u64) -> Points {
    uniform_points(100_000, 2, seed)
}

/// 200 trajectories of 50 steps sampled at 20 Hz, 10K locations in all.
pub fn trajectory_profile(seed: u64) -> Points {
    trajectories(200, 50, 0.01, 0.05, seed)
}

/// Common parameters of the profiles.
pub fn common_params(seed: u64) -> CommonParams {
    CommonParams::default()
        .with_distance(REFERENCE_DISTANCE)
        .with_seed(seed)
}

/// One configuration per method.
///
/// Temporal methods are sized for [`trajectory_profile`], whose times
/// span `[0, 2.5)`. The gas trains on half a pass with a node cap so a
/// single run stays short.
pub fn method_configs() -> Vec<MethodConfig> {
    Method::ALL
        .iter()
        .map(|&m| match m {
            Method::Gwr => MethodConfig::Gwr(GasConfig {
                pass_count: 0.5,
                max_nodes: Some(2_000),
                ..GasConfig::default()
            }),
            Method::Window => MethodConfig::Window(WindowConfig::seconds(0.25, 0.125)),
            Method::Lattice => MethodConfig::Lattice(LatticeConfig::new(
                (0..10).map(|k| (k as f64 * 0.25, (k + 1) as f64 * 0.25)).collect(),
            )),
            Method::Nested => MethodConfig::Nested(NestedConfig::default()),
            other => MethodConfig::with_defaults(other),
        })
        .collect()
}
