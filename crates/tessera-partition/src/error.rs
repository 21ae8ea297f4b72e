//! Errors of the partition layer.

use std::error::Error;
use std::fmt;
use tessera_core::{DataError, TessellationError, TessellationInstanceId};

/// Errors from building, querying or constraining a partition.
#[derive(Clone, Debug, PartialEq)]
pub enum PartitionError {
    /// The tessellation failed to grow or to map the locations.
    Tessellation(TessellationError),
    /// The location table is malformed.
    Data(DataError),
    /// A strict constraint or pipeline setting is out of range.
    InvalidConstraint {
        /// Description of the problem.
        reason: String,
    },
    /// The operation needs a strict partition but the cell index is an
    /// overlapping cover.
    OverlappingCover,
    /// Labels were made for another tessellation instance.
    ForeignLabels {
        /// Instance of the bound tessellation.
        expected: TessellationInstanceId,
        /// Instance the labels were made for.
        found: TessellationInstanceId,
    },
}

impl PartitionError {
    /// Shorthand for [`PartitionError::InvalidConstraint`].
    pub fn constraint(reason: impl Into<String>) -> Self {
        Self::InvalidConstraint {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for PartitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tessellation(e) => write!(f, "tessellation: {e}"),
            Self::Data(e) => write!(f, "data: {e}"),
            Self::InvalidConstraint { reason } => write!(f, "invalid constraint: {reason}"),
            Self::OverlappingCover => {
                write!(f, "cell index is an overlapping cover, not a strict partition")
            }
            Self::ForeignLabels { expected, found } => write!(
                f,
                "labels belong to tessellation {found}, partition is bound to {expected}"
            ),
        }
    }
}

impl Error for PartitionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Tessellation(e) => Some(e),
            Self::Data(e) => Some(e),
            Self::InvalidConstraint { .. } | Self::OverlappingCover | Self::ForeignLabels { .. } => {
                None
            }
        }
    }
}

impl From<TessellationError> for PartitionError {
    fn from(e: TessellationError) -> Self {
        Self::Tessellation(e)
    }
}

impl From<DataError> for PartitionError {
    fn from(e: DataError) -> Self {
        Self::Data(e)
    }
}
