//! Partitions binding a tessellation to a location set.
//!
//! A [`Partition`] pairs a shared, frozen tessellation with a concrete
//! table of locations (or translocation origins) and lazily derives the
//! location-to-cell assignment and per-cell counts. A
//! [`StrictConstraint`] then enforces a minimum location count per cell,
//! independently of any size target the tessellation was grown with.
//! [`Tesseller`] runs the whole pipeline from a raw table.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod partition;
pub mod strict;
pub mod tesseller;

pub use error::PartitionError;
pub use partition::{Partition, PointPair};
pub use strict::{Enforcement, StrictConstraint, StrictPolicy};
pub use tesseller::Tesseller;
