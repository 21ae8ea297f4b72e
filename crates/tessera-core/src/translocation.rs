//! Translocations: displacements between consecutive observations of a
//! tracked particle.

use crate::error::DataError;
use crate::points::Points;

/// Translocations derived from a trajectory-annotated location table.
///
/// Row `i` of [`origins`](Self::origins) is the starting location of
/// translocation `i` and `displacement(i)` is the vector to the next
/// observation of the same trajectory. Locations are grouped by trajectory
/// and ordered by time before pairing, so the input table need not be
/// sorted.
#[derive(Clone, Debug, PartialEq)]
pub struct Translocations {
    origins: Points,
    displacements: Vec<f64>,
    durations: Vec<f64>,
    source_rows: Vec<usize>,
}

impl Translocations {
    /// Pair consecutive observations of every trajectory.
    ///
    /// Requires both the time and the trajectory column. Trajectories with a
    /// single observation contribute nothing.
    pub fn from_locations(locations: &Points) -> Result<Self, DataError> {
        let times = locations
            .times()
            .ok_or(DataError::MissingColumn { column: "time" })?;
        let ids = locations
            .trajectories()
            .ok_or(DataError::MissingColumn {
                column: "trajectory",
            })?;
        let dim = locations.dim();

        let mut order: Vec<usize> = (0..locations.len()).collect();
        order.sort_by(|&a, &b| {
            ids[a]
                .cmp(&ids[b])
                .then(times[a].total_cmp(&times[b]))
                .then(a.cmp(&b))
        });

        let mut source_rows = Vec::new();
        let mut displacements = Vec::new();
        let mut durations = Vec::new();
        for pair in order.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if ids[a] != ids[b] {
                continue;
            }
            source_rows.push(a);
            let (pa, pb) = (locations.row(a), locations.row(b));
            displacements.extend(pa.iter().zip(pb).map(|(x0, x1)| x1 - x0));
            durations.push(times[b] - times[a]);
        }

        let origins = locations.select(&source_rows)?;
        debug_assert_eq!(displacements.len(), source_rows.len() * dim);
        Ok(Self {
            origins,
            displacements,
            durations,
            source_rows,
        })
    }

    /// Number of translocations.
    pub fn len(&self) -> usize {
        self.durations.len()
    }

    /// Whether there are no translocations.
    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Origins as a location table (with time and trajectory columns).
    pub fn origins(&self) -> &Points {
        &self.origins
    }

    /// Displacement vector of translocation `i`.
    pub fn displacement(&self, i: usize) -> &[f64] {
        let dim = self.origins.dim();
        &self.displacements[i * dim..(i + 1) * dim]
    }

    /// Time elapsed over translocation `i`.
    pub fn duration(&self, i: usize) -> f64 {
        self.durations[i]
    }

    /// Row of the source location table each translocation starts from.
    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    /// Average displacement norm, `None` if there are no translocations.
    pub fn mean_step_length(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        let total: f64 = (0..self.len())
            .map(|i| {
                self.displacement(i)
                    .iter()
                    .map(|d| d * d)
                    .sum::<f64>()
                    .sqrt()
            })
            .sum();
        Some(total / self.len() as f64)
    }
}
