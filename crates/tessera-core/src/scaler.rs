//! Coordinate normalization applied before growing a tessellation.

use crate::error::TessellationError;
use crate::points::Points;
use serde::{Deserialize, Serialize};

/// How coordinates are normalized.
///
/// Both non-identity kinds are isotropic: every axis shares one scale
/// factor so that Euclidean distances keep their meaning and a distance
/// given in data units converts with a single multiplication.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// Coordinates are used as given.
    #[default]
    Identity,
    /// The reference bounding box is mapped into the unit hypercube.
    UnitRange,
    /// Zero mean per axis, unit pooled standard deviation.
    Whiten,
}

/// A scaler fitted on a reference location set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    kind: ScalerKind,
    offset: Vec<f64>,
    factor: f64,
}

impl Scaler {
    /// The identity scaler for `dim` dimensions.
    pub fn identity(dim: usize) -> Self {
        Self {
            kind: ScalerKind::Identity,
            offset: vec![0.0; dim],
            factor: 1.0,
        }
    }

    /// Fit a scaler of the given kind on `reference`.
    ///
    /// Fails on an empty reference set, and on a reference set with no
    /// spread for the non-identity kinds.
    pub fn fit(kind: ScalerKind, reference: &Points) -> Result<Self, TessellationError> {
        if reference.is_empty() {
            return Err(TessellationError::EmptyReference);
        }
        let dim = reference.dim();
        match kind {
            ScalerKind::Identity => Ok(Self::identity(dim)),
            ScalerKind::UnitRange => {
                let bb = reference
                    .bounding_box()
                    .ok_or(TessellationError::EmptyReference)?;
                let factor = bb.max_extent();
                if factor <= 0.0 {
                    return Err(TessellationError::degenerate(
                        "all reference locations coincide",
                    ));
                }
                Ok(Self {
                    kind,
                    offset: bb.lower().to_vec(),
                    factor,
                })
            }
            ScalerKind::Whiten => {
                let n = reference.len() as f64;
                let mut mean = vec![0.0; dim];
                for row in reference.rows() {
                    for (m, x) in mean.iter_mut().zip(row) {
                        *m += x / n;
                    }
                }
                let mut var = 0.0;
                for row in reference.rows() {
                    for (m, x) in mean.iter().zip(row) {
                        var += (x - m) * (x - m);
                    }
                }
                let factor = (var / (n * dim as f64)).sqrt();
                if factor <= 0.0 {
                    return Err(TessellationError::degenerate(
                        "all reference locations coincide",
                    ));
                }
                Ok(Self {
                    kind,
                    offset: mean,
                    factor,
                })
            }
        }
    }

    /// The scaler kind.
    pub fn kind(&self) -> ScalerKind {
        self.kind
    }

    /// Dimension the scaler was fitted for.
    pub fn dim(&self) -> usize {
        self.offset.len()
    }

    /// Whether scaling is a no-op.
    pub fn is_identity(&self) -> bool {
        self.kind == ScalerKind::Identity
    }

    /// Scale a table into the fitted frame.
    pub fn scale(&self, points: &Points) -> Result<Points, TessellationError> {
        if points.dim() != self.dim() {
            return Err(TessellationError::DimensionMismatch {
                expected: self.dim(),
                found: points.dim(),
            });
        }
        if self.is_identity() {
            return Ok(points.clone());
        }
        Ok(points.with_coords(points.dim(), self.scale_rows(points.coords()))?)
    }

    /// Scale a row-major coordinate buffer.
    pub fn scale_rows(&self, coords: &[f64]) -> Vec<f64> {
        let dim = self.dim();
        coords
            .iter()
            .enumerate()
            .map(|(i, x)| (x - self.offset[i % dim]) / self.factor)
            .collect()
    }

    /// Map a row-major buffer in the fitted frame back to data units.
    pub fn unscale_rows(&self, coords: &[f64]) -> Vec<f64> {
        let dim = self.dim();
        coords
            .iter()
            .enumerate()
            .map(|(i, x)| x * self.factor + self.offset[i % dim])
            .collect()
    }

    /// Convert a distance in data units to the fitted frame.
    pub fn scale_distance(&self, d: f64) -> f64 {
        d / self.factor
    }

    /// Convert a distance in the fitted frame to data units.
    pub fn unscale_distance(&self, d: f64) -> f64 {
        d * self.factor
    }
}
