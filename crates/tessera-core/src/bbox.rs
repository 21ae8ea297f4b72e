//! Axis-aligned bounding boxes.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box with inclusive bounds on every dimension.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl BoundingBox {
    /// Build a box from explicit bounds.
    ///
    /// Returns `None` if the bound vectors differ in length, are empty, or
    /// if `lower[i] > upper[i]` on some axis.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Option<Self> {
        if lower.is_empty() || lower.len() != upper.len() {
            return None;
        }
        if lower.iter().zip(&upper).any(|(lo, hi)| lo > hi) {
            return None;
        }
        Some(Self { lower, upper })
    }

    /// Smallest box containing every row of a row-major buffer.
    ///
    /// Returns `None` for an empty buffer.
    pub fn of_rows(coords: &[f64], dim: usize) -> Option<Self> {
        if dim == 0 || coords.len() < dim {
            return None;
        }
        let mut lower = coords[..dim].to_vec();
        let mut upper = lower.clone();
        for row in coords.chunks_exact(dim).skip(1) {
            for (k, &x) in row.iter().enumerate() {
                if x < lower[k] {
                    lower[k] = x;
                }
                if x > upper[k] {
                    upper[k] = x;
                }
            }
        }
        Some(Self { lower, upper })
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Lower corner.
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    /// Upper corner.
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    /// Side length along axis `k`.
    pub fn extent(&self, k: usize) -> f64 {
        self.upper[k] - self.lower[k]
    }

    /// Largest side length.
    pub fn max_extent(&self) -> f64 {
        (0..self.dim()).map(|k| self.extent(k)).fold(0.0, f64::max)
    }

    /// Product of the side lengths over the axes with non-zero extent.
    ///
    /// Flat axes are skipped so that a box degenerate along one axis still
    /// reports the measure of its remaining face. Returns 0.0 only if every
    /// axis is flat.
    pub fn volume(&self) -> f64 {
        let mut volume = 1.0;
        let mut any = false;
        for k in 0..self.dim() {
            let e = self.extent(k);
            if e > 0.0 {
                volume *= e;
                any = true;
            }
        }
        if any {
            volume
        } else {
            0.0
        }
    }

    /// Number of axes with non-zero extent.
    pub fn spanned_dims(&self) -> usize {
        (0..self.dim()).filter(|&k| self.extent(k) > 0.0).count()
    }

    /// Center point.
    pub fn center(&self) -> Vec<f64> {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| 0.5 * (lo + hi))
            .collect()
    }

    /// Whether `point` lies inside the box (bounds inclusive).
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dim()
            && point
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(x, (lo, hi))| *x >= *lo && *x <= *hi)
    }

    /// Widen every axis narrower than `min_extent` symmetrically around
    /// its midpoint.
    pub fn expand_to_min_extent(&mut self, min_extent: f64) {
        for k in 0..self.dim() {
            let e = self.extent(k);
            if e < min_extent {
                let pad = 0.5 * (min_extent - e);
                self.lower[k] -= pad;
                self.upper[k] += pad;
            }
        }
    }

    /// Grow every axis to the box's largest extent, keeping the lower corner.
    pub fn to_hypercube(&self) -> Self {
        let side = self.max_extent();
        let upper = self.lower.iter().map(|lo| lo + side).collect();
        Self {
            lower: self.lower.clone(),
            upper,
        }
    }
}
