//! Error types for Tessera.
//!
//! Organized by layer: [`DataError`] for malformed location tables and
//! [`TessellationError`] for everything that can go wrong while growing or
//! querying a tessellation.

use std::error::Error;
use std::fmt;

/// Errors from building or slicing a location table.
#[derive(Clone, Debug, PartialEq)]
pub enum DataError {
    /// A table was declared with zero coordinate columns.
    ZeroDimension,
    /// A coordinate row does not have the table's dimension.
    RowLength {
        /// Index of the offending row.
        row: usize,
        /// Dimension of the table.
        expected: usize,
        /// Length of the row.
        found: usize,
    },
    /// An auxiliary column does not have one entry per row.
    ColumnLength {
        /// Column name (`"time"`, `"trajectory"`).
        column: &'static str,
        /// Number of rows in the table.
        expected: usize,
        /// Length of the column.
        found: usize,
    },
    /// A coordinate or timestamp is NaN or infinite.
    NonFinite {
        /// Index of the offending row.
        row: usize,
    },
    /// An operation needs a column the table does not carry.
    MissingColumn {
        /// Column name.
        column: &'static str,
    },
    /// A row index is past the end of the table.
    RowOutOfBounds {
        /// The requested row.
        row: usize,
        /// Number of rows in the table.
        len: usize,
    },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDimension => write!(f, "location table must have at least one dimension"),
            Self::RowLength {
                row,
                expected,
                found,
            } => write!(f, "row {row} has {found} coordinates, expected {expected}"),
            Self::ColumnLength {
                column,
                expected,
                found,
            } => write!(f, "column '{column}' has {found} entries, expected {expected}"),
            Self::NonFinite { row } => write!(f, "row {row} contains a non-finite value"),
            Self::MissingColumn { column } => write!(f, "missing column '{column}'"),
            Self::RowOutOfBounds { row, len } => {
                write!(f, "row {row} out of bounds for table of {len} rows")
            }
        }
    }
}

impl Error for DataError {}

/// Errors from growing a tessellation or mapping locations onto it.
#[derive(Clone, Debug, PartialEq)]
pub enum TessellationError {
    /// The reference location set is empty.
    EmptyReference,
    /// Query or reference locations do not have the tessellation's dimension.
    DimensionMismatch {
        /// Dimension the tessellation was grown with.
        expected: usize,
        /// Dimension of the offending table.
        found: usize,
    },
    /// The method does not support this many dimensions.
    UnsupportedDimension {
        /// Method name.
        method: &'static str,
        /// Offending dimension.
        dim: usize,
    },
    /// The reference distribution cannot support any cell geometry.
    Degenerate {
        /// What is degenerate.
        reason: String,
    },
    /// A configuration value is out of range or inconsistent.
    InvalidConfig {
        /// Description of the problem.
        reason: String,
    },
    /// A temporal method was given locations without timestamps.
    MissingTimestamps,
    /// The registry does not know this method name.
    UnknownMethod {
        /// The name that failed to parse.
        name: String,
    },
    /// The location table itself is malformed.
    Data(DataError),
}

impl fmt::Display for TessellationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyReference => write!(f, "reference location set is empty"),
            Self::DimensionMismatch { expected, found } => {
                write!(f, "expected {expected}D locations, got {found}D")
            }
            Self::UnsupportedDimension { method, dim } => {
                write!(f, "method '{method}' does not support {dim}D locations")
            }
            Self::Degenerate { reason } => write!(f, "degenerate geometry: {reason}"),
            Self::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            Self::MissingTimestamps => write!(f, "locations carry no timestamps"),
            Self::UnknownMethod { name } => write!(f, "unknown tessellation method '{name}'"),
            Self::Data(e) => write!(f, "data: {e}"),
        }
    }
}

impl Error for TessellationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Data(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DataError> for TessellationError {
    fn from(e: DataError) -> Self {
        Self::Data(e)
    }
}

impl TessellationError {
    /// Shorthand for [`TessellationError::InvalidConfig`].
    pub fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`TessellationError::Degenerate`].
    pub fn degenerate(reason: impl Into<String>) -> Self {
        Self::Degenerate {
            reason: reason.into(),
        }
    }
}
