//! Seeded location tables.
//!
//! Every fixture takes an explicit seed and draws from ChaCha8, so a test
//! sees the same table on every platform and every run.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tessera_core::Points;

/// `n` locations uniform in the unit hypercube of `dim` dimensions.
pub fn uniform_points(n: usize, dim: usize, seed: u64) -> Points {
    uniform_in(n, &vec![0.0; dim], &vec![1.0; dim], seed)
}

/// `n` locations uniform in the box `[lower, upper)`.
pub fn uniform_in(n: usize, lower: &[f64], upper: &[f64], seed: u64) -> Points {
    assert_eq!(lower.len(), upper.len(), "box bounds differ in dimension");
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let dim = lower.len();
    let mut coords = Vec::with_capacity(n * dim);
    for _ in 0..n {
        for k in 0..dim {
            coords.push(lower[k] + (upper[k] - lower[k]) * rng.random::<f64>());
        }
    }
    Points::new(dim, coords).expect("uniform fixture is finite")
}

/// A `side x side` lattice of 2D locations over `[0, 1]^2`.
pub fn lattice_points(side: usize) -> Points {
    let step = if side > 1 { 1.0 / (side - 1) as f64 } else { 0.0 };
    let rows: Vec<[f64; 2]> = (0..side * side)
        .map(|i| [(i / side) as f64 * step, (i % side) as f64 * step])
        .collect();
    Points::from_rows(2, &rows).expect("lattice fixture is finite")
}

/// 2D Gaussian blobs of `per_cluster` locations around each center.
pub fn clustered(centers: &[[f64; 2]], per_cluster: usize, sigma: f64, seed: u64) -> Points {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(centers.len() * per_cluster);
    for c in centers {
        for _ in 0..per_cluster {
            let (gx, gy) = gaussian_pair(&mut rng);
            rows.push([c[0] + sigma * gx, c[1] + sigma * gy]);
        }
    }
    Points::from_rows(2, &rows).expect("cluster fixture is finite")
}

/// Brownian trajectories in 2D.
///
/// `count` particles start uniformly in the unit square and take `steps`
/// Gaussian steps of standard deviation `sigma` per axis, one every `dt`
/// seconds. Rows are grouped by trajectory and ordered by time, with
/// trajectory ids `0..count` and times starting at 0.
pub fn trajectories(count: usize, steps: usize, sigma: f64, dt: f64, seed: u64) -> Points {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(count * (steps + 1));
    let mut times = Vec::with_capacity(rows.capacity());
    let mut ids = Vec::with_capacity(rows.capacity());
    for id in 0..count {
        let mut x = [rng.random::<f64>(), rng.random::<f64>()];
        for step in 0..=steps {
            rows.push(x);
            times.push(step as f64 * dt);
            ids.push(id as u32);
            let (gx, gy) = gaussian_pair(&mut rng);
            x = [x[0] + sigma * gx, x[1] + sigma * gy];
        }
    }
    Points::from_rows(2, &rows)
        .and_then(|p| p.with_times(times))
        .and_then(|p| p.with_trajectories(ids))
        .expect("trajectory fixture is consistent")
}

/// `n` 1D locations at the origin, stamped `0, dt, 2 dt, ...`.
pub fn timestamps(n: usize, dt: f64) -> Points {
    Points::new(1, vec![0.0; n])
        .and_then(|p| p.with_times((0..n).map(|i| i as f64 * dt).collect()))
        .expect("timestamp fixture is consistent")
}

/// Two independent standard normal draws (Box-Muller).
fn gaussian_pair(rng: &mut ChaCha8Rng) -> (f64, f64) {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    let r = (-2.0 * u1.ln()).sqrt();
    let theta = std::f64::consts::TAU * u2;
    (r * theta.cos(), r * theta.sin())
}
