//! Tabular location data.

use crate::bbox::BoundingBox;
use crate::error::DataError;
use serde::{Deserialize, Serialize};

/// A table of locations: row-major coordinates plus optional timestamp
/// and trajectory columns.
///
/// Every row is one observation of a particle. The coordinate buffer is
/// validated at construction: all values are finite and the buffer length
/// is a multiple of the dimension. Auxiliary columns, when present, have
/// exactly one entry per row.
///
/// # Examples
///
/// ```
/// use tessera_core::Points;
///
/// let pts = Points::from_rows(2, &[[0.0, 0.0], [1.0, 0.5]])
///     .unwrap()
///     .with_times(vec![0.0, 0.04])
///     .unwrap();
/// assert_eq!(pts.len(), 2);
/// assert_eq!(pts.row(1), &[1.0, 0.5]);
/// assert_eq!(pts.time(1), Some(0.04));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoints")]
pub struct Points {
    dim: usize,
    coords: Vec<f64>,
    times: Option<Vec<f64>>,
    trajectories: Option<Vec<u32>>,
}

/// Wire form of [`Points`], validated through the constructors.
#[derive(Deserialize)]
struct RawPoints {
    dim: usize,
    coords: Vec<f64>,
    #[serde(default)]
    times: Option<Vec<f64>>,
    #[serde(default)]
    trajectories: Option<Vec<u32>>,
}

impl TryFrom<RawPoints> for Points {
    type Error = DataError;

    fn try_from(raw: RawPoints) -> Result<Self, DataError> {
        let mut points = Points::new(raw.dim, raw.coords)?;
        if let Some(times) = raw.times {
            points = points.with_times(times)?;
        }
        if let Some(ids) = raw.trajectories {
            points = points.with_trajectories(ids)?;
        }
        Ok(points)
    }
}

impl Points {
    /// Build a table from a row-major coordinate buffer.
    pub fn new(dim: usize, coords: Vec<f64>) -> Result<Self, DataError> {
        if dim == 0 {
            return Err(DataError::ZeroDimension);
        }
        if coords.len() % dim != 0 {
            let row = coords.len() / dim;
            return Err(DataError::RowLength {
                row,
                expected: dim,
                found: coords.len() % dim,
            });
        }
        if let Some(pos) = coords.iter().position(|x| !x.is_finite()) {
            return Err(DataError::NonFinite { row: pos / dim });
        }
        Ok(Self {
            dim,
            coords,
            times: None,
            trajectories: None,
        })
    }

    /// Build a table from individual rows.
    pub fn from_rows<R: AsRef<[f64]>>(dim: usize, rows: &[R]) -> Result<Self, DataError> {
        if dim == 0 {
            return Err(DataError::ZeroDimension);
        }
        let mut coords = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != dim {
                return Err(DataError::RowLength {
                    row: i,
                    expected: dim,
                    found: row.len(),
                });
            }
            coords.extend_from_slice(row);
        }
        Self::new(dim, coords)
    }

    /// Attach a timestamp column.
    pub fn with_times(mut self, times: Vec<f64>) -> Result<Self, DataError> {
        if times.len() != self.len() {
            return Err(DataError::ColumnLength {
                column: "time",
                expected: self.len(),
                found: times.len(),
            });
        }
        if let Some(row) = times.iter().position(|t| !t.is_finite()) {
            return Err(DataError::NonFinite { row });
        }
        self.times = Some(times);
        Ok(self)
    }

    /// Attach a trajectory identifier column.
    pub fn with_trajectories(mut self, ids: Vec<u32>) -> Result<Self, DataError> {
        if ids.len() != self.len() {
            return Err(DataError::ColumnLength {
                column: "trajectory",
                expected: self.len(),
                found: ids.len(),
            });
        }
        self.trajectories = Some(ids);
        Ok(self)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.coords.len() / self.dim
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Number of coordinate columns.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The raw row-major coordinate buffer.
    pub fn coords(&self) -> &[f64] {
        &self.coords
    }

    /// Coordinates of row `i`.
    ///
    /// # Panics
    ///
    /// Panics if `i >= self.len()`.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.coords[i * self.dim..(i + 1) * self.dim]
    }

    /// Iterate over coordinate rows.
    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[f64]> + '_ {
        self.coords.chunks_exact(self.dim)
    }

    /// Timestamp column, if any.
    pub fn times(&self) -> Option<&[f64]> {
        self.times.as_deref()
    }

    /// Timestamp of row `i`, if the table has a time column.
    pub fn time(&self, i: usize) -> Option<f64> {
        self.times.as_ref().and_then(|t| t.get(i).copied())
    }

    /// Trajectory identifier column, if any.
    pub fn trajectories(&self) -> Option<&[u32]> {
        self.trajectories.as_deref()
    }

    /// Subset of rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Result<Self, DataError> {
        let len = self.len();
        let mut coords = Vec::with_capacity(indices.len() * self.dim);
        for &i in indices {
            if i >= len {
                return Err(DataError::RowOutOfBounds { row: i, len });
            }
            coords.extend_from_slice(self.row(i));
        }
        Ok(Self {
            dim: self.dim,
            coords,
            times: self
                .times
                .as_ref()
                .map(|t| indices.iter().map(|&i| t[i]).collect()),
            trajectories: self
                .trajectories
                .as_ref()
                .map(|t| indices.iter().map(|&i| t[i]).collect()),
        })
    }

    /// Same rows with a replaced coordinate buffer of possibly different
    /// dimension. Auxiliary columns are kept.
    pub fn with_coords(&self, dim: usize, coords: Vec<f64>) -> Result<Self, DataError> {
        let mut out = Self::new(dim, coords)?;
        if out.len() != self.len() {
            return Err(DataError::ColumnLength {
                column: "coords",
                expected: self.len(),
                found: out.len(),
            });
        }
        out.times = self.times.clone();
        out.trajectories = self.trajectories.clone();
        Ok(out)
    }

    /// Bounding box of the coordinates. `None` for an empty table.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::of_rows(&self.coords, self.dim)
    }

    /// Earliest and latest timestamp, if the table has times and rows.
    pub fn time_range(&self) -> Option<(f64, f64)> {
        let times = self.times.as_ref()?;
        let first = *times.first()?;
        Some(
            times
                .iter()
                .fold((first, first), |(lo, hi), &t| (lo.min(t), hi.max(t))),
        )
    }

    /// Append the scaled timestamp as an extra coordinate.
    ///
    /// Lets a spatial method partition space-time jointly: a time
    /// difference of `1 / time_scale` weighs as much as one unit of
    /// distance. Experimental.
    pub fn with_time_as_space(&self, time_scale: f64) -> Result<Self, DataError> {
        let times = self
            .times
            .as_ref()
            .ok_or(DataError::MissingColumn { column: "time" })?;
        let dim = self.dim + 1;
        let mut coords = Vec::with_capacity(self.len() * dim);
        for (row, t) in self.rows().zip(times) {
            coords.extend_from_slice(row);
            coords.push(t * time_scale);
        }
        self.with_coords(dim, coords)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializing_runs_validation() {
        let ok: Points = serde_json::from_str(
            r#"{"dim":2,"coords":[0.0,1.0,2.0,3.0],"times":[0.0,0.1],"trajectories":null}"#,
        )
        .unwrap();
        assert_eq!(ok.len(), 2);
        assert_eq!(ok.time(1), Some(0.1));

        let roundtrip: Points = serde_json::from_str(&serde_json::to_string(&ok).unwrap()).unwrap();
        assert_eq!(roundtrip, ok);

        let zero_dim = serde_json::from_str::<Points>(r#"{"dim":0,"coords":[]}"#);
        assert!(zero_dim.is_err());
        let ragged = serde_json::from_str::<Points>(r#"{"dim":2,"coords":[0.0,1.0,2.0]}"#);
        assert!(ragged.is_err());
        let short_times =
            serde_json::from_str::<Points>(r#"{"dim":1,"coords":[0.0,1.0],"times":[0.0]}"#);
        assert!(short_times.is_err());
    }

    fn sample() -> Points {
        Points::from_rows(2, &[[0.0, 0.0], [1.0, 2.0], [3.0, -1.0]])
            .unwrap()
            .with_times(vec![0.0, 0.1, 0.2])
            .unwrap()
            .with_trajectories(vec![1, 1, 2])
            .unwrap()
    }

    #[test]
    fn rejects_ragged_buffer() {
        assert!(matches!(
            Points::new(2, vec![0.0, 1.0, 2.0]),
            Err(DataError::RowLength { row: 1, .. })
        ));
    }

    #[test]
    fn rejects_nan() {
        assert!(matches!(
            Points::new(2, vec![0.0, 1.0, f64::NAN, 0.0]),
            Err(DataError::NonFinite { row: 1 })
        ));
    }

    #[test]
    fn rejects_zero_dimension() {
        assert_eq!(Points::new(0, vec![]), Err(DataError::ZeroDimension));
    }

    #[test]
    fn time_column_must_match() {
        let p = Points::from_rows(1, &[[0.0], [1.0]]).unwrap();
        assert!(matches!(
            p.with_times(vec![0.0]),
            Err(DataError::ColumnLength { column: "time", .. })
        ));
    }

    #[test]
    fn select_keeps_columns() {
        let p = sample().select(&[2, 0]).unwrap();
        assert_eq!(p.row(0), &[3.0, -1.0]);
        assert_eq!(p.times(), Some(&[0.2, 0.0][..]));
        assert_eq!(p.trajectories(), Some(&[2, 1][..]));
        assert!(sample().select(&[3]).is_err());
    }

    #[test]
    fn time_range_and_bbox() {
        let p = sample();
        assert_eq!(p.time_range(), Some((0.0, 0.2)));
        let bb = p.bounding_box().unwrap();
        assert_eq!(bb.lower(), &[0.0, -1.0]);
    }

    #[test]
    fn time_as_space_appends_column() {
        let p = sample().with_time_as_space(10.0).unwrap();
        assert_eq!(p.dim(), 3);
        assert!((p.row(2)[2] - 2.0).abs() < 1e-12);
        let no_time = Points::from_rows(1, &[[0.0]]).unwrap();
        assert!(no_time.with_time_as_space(1.0).is_err());
    }
}
