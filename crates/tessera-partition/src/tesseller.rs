//! End-to-end pipeline from a location table to a [`Partition`].

use crate::error::PartitionError;
use crate::partition::Partition;
use crate::strict::StrictConstraint;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessera_core::{CellQuery, Points, TessellationError, Translocations};
use tessera_mesh::{CommonParams, MethodConfig, Tessellation};
use tracing::info;

/// Tessellates a location table and binds the result to it.
///
/// Stages, each logged at `info` level:
///
/// 1. Default the reference distance to the mean translocation step when
///    the table carries trajectories and none is configured.
/// 2. Optionally append scaled time as an extra coordinate.
/// 3. Optionally subsample the reference set.
/// 4. Grow the tessellation on the reference set.
/// 5. Bind it to the whole table with the query and strict constraint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tesseller {
    /// Method and method-specific settings.
    pub method: MethodConfig,
    /// Parameters shared by every method.
    pub common: CommonParams,
    /// Fraction of the locations used as reference set, drawn with
    /// `common.seed`. All locations when unset.
    pub reference_fraction: Option<f64>,
    /// Query mapping locations onto cells.
    pub query: CellQuery,
    /// Constraint enforced on the final partition.
    pub strict: Option<StrictConstraint>,
    /// Partition space-time by appending `time * time_scale` as a
    /// coordinate. Experimental; spatial methods only.
    pub time_scale: Option<f64>,
}

impl Tesseller {
    /// A pipeline running `method` with default parameters.
    pub fn new(method: MethodConfig) -> Self {
        Self {
            method,
            common: CommonParams::default(),
            reference_fraction: None,
            query: CellQuery::voronoi(),
            strict: None,
            time_scale: None,
        }
    }

    /// Set the common parameters.
    pub fn with_common(mut self, common: CommonParams) -> Self {
        self.common = common;
        self
    }

    /// Grow the tessellation on a seeded fraction of the locations.
    pub fn with_reference_fraction(mut self, fraction: f64) -> Self {
        self.reference_fraction = Some(fraction);
        self
    }

    /// Set the query.
    pub fn with_query(mut self, query: CellQuery) -> Self {
        self.query = query;
        self
    }

    /// Enforce a strict constraint.
    pub fn with_strict(mut self, strict: StrictConstraint) -> Self {
        self.strict = Some(strict);
        self
    }

    /// Treat time as an extra spatial dimension.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = Some(time_scale);
        self
    }

    /// Check every stage's settings before any work starts.
    pub fn validate(&self) -> Result<(), PartitionError> {
        self.method.validate()?;
        self.common.validate()?;
        self.query.validate()?;
        if let Some(s) = &self.strict {
            s.validate()?;
        }
        if let Some(f) = self.reference_fraction {
            if !(f > 0.0 && f <= 1.0) {
                return Err(PartitionError::constraint(format!(
                    "reference_fraction must be in (0, 1], got {f}"
                )));
            }
        }
        if let Some(s) = self.time_scale {
            if !s.is_finite() || s <= 0.0 {
                return Err(PartitionError::constraint(format!(
                    "time_scale must be finite and positive, got {s}"
                )));
            }
            if self.method.method().is_temporal() {
                return Err(TessellationError::config(
                    "time_scale only applies to spatial methods",
                )
                .into());
            }
        }
        Ok(())
    }

    /// Partition the locations themselves.
    pub fn run(&self, locations: &Points) -> Result<Partition, PartitionError> {
        self.validate()?;
        let common = self.resolve_distance(locations);
        let points = self.space_time(locations)?;
        self.bind(points, common)
    }

    /// Partition the origins of the translocations of `locations`.
    ///
    /// Requires time and trajectory columns. Row `i` of the partition is
    /// translocation `i`.
    pub fn run_translocations(
        &self,
        locations: &Points,
    ) -> Result<(Translocations, Partition), PartitionError> {
        self.validate()?;
        let translocations = Translocations::from_locations(locations)?;
        info!(
            locations = locations.len(),
            translocations = translocations.len(),
            "translocations paired"
        );
        let common = self.resolve_distance(locations);
        let points = self.space_time(translocations.origins())?;
        let partition = self.bind(points, common)?;
        Ok((translocations, partition))
    }

    fn resolve_distance(&self, locations: &Points) -> CommonParams {
        let mut common = self.common.clone();
        if common.distance.is_none() {
            common.distance = common.reference_distance(locations);
            if let Some(d) = common.distance {
                info!(distance = d, "reference distance from mean translocation step");
            }
        }
        common
    }

    fn space_time(&self, points: &Points) -> Result<Points, PartitionError> {
        match self.time_scale {
            Some(scale) => {
                let out = points.with_time_as_space(scale)?;
                info!(time_scale = scale, dim = out.dim(), "time appended as coordinate");
                Ok(out)
            }
            None => Ok(points.clone()),
        }
    }

    fn reference(&self, points: &Points) -> Result<Points, PartitionError> {
        let Some(fraction) = self.reference_fraction.filter(|f| *f < 1.0) else {
            return Ok(points.clone());
        };
        let n = points.len();
        let k = ((n as f64 * fraction).round() as usize).clamp(1, n.max(1));
        let mut rng = ChaCha8Rng::seed_from_u64(self.common.seed);
        let mut rows = rand::seq::index::sample(&mut rng, n, k.min(n)).into_vec();
        rows.sort_unstable();
        info!(locations = n, reference = rows.len(), fraction, "reference sampled");
        Ok(points.select(&rows)?)
    }

    fn bind(&self, points: Points, common: CommonParams) -> Result<Partition, PartitionError> {
        let reference = self.reference(&points)?;
        let tessellation: Arc<dyn Tessellation> =
            Arc::from(self.method.tessellate(&reference, &common)?);
        info!(
            method = %tessellation.method(),
            cells = tessellation.cell_count(),
            avg_distance = tessellation.avg_distance(),
            "tessellation grown"
        );
        let mut partition = Partition::new(points, tessellation)
            .with_query(self.query.clone())
            .with_common_params(common);
        if let Some(strict) = self.strict {
            partition = partition.with_strict(strict);
        }
        let assigned = partition.cell_index()?.assigned_count();
        info!(
            locations = partition.points().len(),
            assigned,
            "partition ready"
        );
        Ok(partition)
    }
}
