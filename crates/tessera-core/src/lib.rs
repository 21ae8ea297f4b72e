//! Core types for the Tessera tessellation framework.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! data every tessellation consumes and produces: location tables,
//! translocations, cell identifiers, location-to-cell assignments, query
//! options, scalers and error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bbox;
pub mod error;
pub mod id;
pub mod index;
pub mod points;
pub mod query;
pub mod scaler;
pub mod translocation;

pub use bbox::BoundingBox;
pub use error::{DataError, TessellationError};
pub use id::{CellId, TessellationInstanceId};
pub use index::{nearest_cell, CellIndex, CellList};
pub use points::Points;
pub use query::{CellQuery, Knn};
pub use scaler::{Scaler, ScalerKind};
pub use translocation::Translocations;
