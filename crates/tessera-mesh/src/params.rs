//! Parameters shared by every tessellation method and the preprocessing
//! step they all start with.

use crate::registry::Method;
use serde::{Deserialize, Serialize};
use tessera_core::{BoundingBox, Points, Scaler, ScalerKind, TessellationError, Translocations};

/// Ratio between the average center spacing and the reference distance.
pub const SPACING_FACTOR: f64 = 2.0;

/// Ratio between the minimum cell size and the reference distance.
pub const SIZE_FLOOR_FACTOR: f64 = 0.8;

/// Parameters common to all methods.
///
/// `distance` is the reference distance `d`: the average center spacing
/// targeted by the spatial methods is `2d` and the minimum cell size for
/// grid-like methods is `0.8d`. When unset it defaults to the mean
/// translocation step of the reference set, if the set carries trajectory
/// and time columns.
///
/// A count target (`cell_count` or `avg_location_count`) takes precedence
/// over `distance` for the center spacing; `distance` then only sets the
/// size floor.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CommonParams {
    /// Reference distance, in data units.
    pub distance: Option<f64>,
    /// Target number of cells.
    pub cell_count: Option<usize>,
    /// Target average number of reference locations per cell.
    pub avg_location_count: Option<usize>,
    /// Minimum number of locations per cell. Advisory at tessellation time;
    /// `Some(0)` explicitly disables the grid-like size floor.
    pub min_location_count: Option<usize>,
    /// Coordinate normalization fitted on the reference set.
    pub scaler: ScalerKind,
    /// Seed of every random choice. Default: 0.
    pub seed: u64,
}

impl CommonParams {
    /// Set the reference distance.
    pub fn with_distance(mut self, d: f64) -> Self {
        self.distance = Some(d);
        self
    }

    /// Set the target cell count.
    pub fn with_cell_count(mut self, n: usize) -> Self {
        self.cell_count = Some(n);
        self
    }

    /// Set the target average location count per cell.
    pub fn with_avg_location_count(mut self, n: usize) -> Self {
        self.avg_location_count = Some(n);
        self
    }

    /// Set the advisory minimum location count.
    pub fn with_min_location_count(mut self, n: usize) -> Self {
        self.min_location_count = Some(n);
        self
    }

    /// Set the scaler kind.
    pub fn with_scaler(mut self, kind: ScalerKind) -> Self {
        self.scaler = kind;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check ranges and mutually exclusive targets.
    pub fn validate(&self) -> Result<(), TessellationError> {
        if let Some(d) = self.distance {
            if !d.is_finite() || d <= 0.0 {
                return Err(TessellationError::config(format!(
                    "distance must be finite and positive, got {d}"
                )));
            }
        }
        if self.cell_count == Some(0) {
            return Err(TessellationError::config("cell_count must be positive"));
        }
        if self.avg_location_count == Some(0) {
            return Err(TessellationError::config(
                "avg_location_count must be positive",
            ));
        }
        if self.cell_count.is_some() && self.avg_location_count.is_some() {
            return Err(TessellationError::config(
                "give either cell_count or avg_location_count, not both",
            ));
        }
        Ok(())
    }

    /// Whether the grid-like minimum cell size applies.
    pub fn size_floor_enabled(&self) -> bool {
        self.min_location_count != Some(0)
    }

    /// Target cell count for a reference set of `n` locations, if a count
    /// target is configured.
    pub fn target_cell_count(&self, n: usize) -> Option<usize> {
        self.cell_count
            .or_else(|| self.avg_location_count.map(|avg| (n / avg).max(1)))
    }

    /// Reference distance in data units: the configured one, or the mean
    /// translocation step of `reference`.
    pub fn reference_distance(&self, reference: &Points) -> Option<f64> {
        if self.distance.is_some() {
            return self.distance;
        }
        if reference.times().is_none() || reference.trajectories().is_none() {
            return None;
        }
        Translocations::from_locations(reference)
            .ok()
            .and_then(|tr| tr.mean_step_length())
            .filter(|d| *d > 0.0)
    }
}

/// A reference set normalized and checked for degeneracy.
#[derive(Clone, Debug)]
pub(crate) struct Prepared {
    pub scaler: Scaler,
    pub scaled: Points,
    pub bbox: BoundingBox,
    /// Reference distance in the scaled frame.
    pub distance: Option<f64>,
}

/// Validate parameters, fit the scaler and reject empty or degenerate
/// reference sets.
pub(crate) fn prepare(
    method: Method,
    reference: &Points,
    common: &CommonParams,
) -> Result<Prepared, TessellationError> {
    common.validate()?;
    if reference.is_empty() {
        return Err(TessellationError::EmptyReference);
    }
    let scaler = Scaler::fit(common.scaler, reference)?;
    let scaled = scaler.scale(reference)?;
    let bbox = scaled
        .bounding_box()
        .ok_or(TessellationError::EmptyReference)?;
    if bbox.max_extent() <= 0.0 {
        return Err(TessellationError::degenerate(format!(
            "{method}: all {} reference locations coincide",
            reference.len()
        )));
    }
    let distance = common
        .reference_distance(reference)
        .map(|d| scaler.scale_distance(d));
    Ok(Prepared {
        scaler,
        scaled,
        bbox,
        distance,
    })
}

/// Average center spacing and optional minimum cell size, in the scaled
/// frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Spacing {
    pub spacing: f64,
    pub floor: Option<f64>,
}

/// Resolve the center spacing of a regular lattice.
///
/// `cell_measure` is the volume of one cell divided by `spacing^D`, which
/// converts a count target into a spacing (1 for hypercubes, `sqrt(3)/2`
/// for hexagons).
pub(crate) fn resolve_spacing(
    method: Method,
    prep: &Prepared,
    common: &CommonParams,
    cell_measure: f64,
) -> Result<Spacing, TessellationError> {
    let floor = if common.size_floor_enabled() {
        prep.distance.map(|d| SIZE_FLOOR_FACTOR * d)
    } else {
        None
    };
    let spacing = if let Some(cells) = common.target_cell_count(prep.scaled.len()) {
        let dims = prep.bbox.spanned_dims().max(1) as f64;
        (prep.bbox.volume() / (cells as f64 * cell_measure)).powf(1.0 / dims)
    } else if let Some(d) = prep.distance {
        SPACING_FACTOR * d
    } else {
        return Err(TessellationError::config(format!(
            "{method} needs a distance, a cell count or an average location count \
             (or trajectories to derive a distance from)"
        )));
    };
    if !spacing.is_finite() || spacing <= 0.0 {
        return Err(TessellationError::degenerate(format!(
            "{method}: cell spacing resolved to {spacing}"
        )));
    }
    Ok(Spacing {
        spacing: floor.map_or(spacing, |f| spacing.max(f)),
        floor,
    })
}
