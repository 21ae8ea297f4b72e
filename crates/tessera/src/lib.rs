//! Tessera: space and time tessellations for single-molecule trajectory
//! analysis.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Tessera sub-crates. For most users, adding `tessera` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use tessera::prelude::*;
//!
//! // A 20 x 20 lattice of locations over the unit square.
//! let rows: Vec<[f64; 2]> = (0..400)
//!     .map(|i| [(i / 20) as f64 / 19.0, (i % 20) as f64 / 19.0])
//!     .collect();
//! let locations = Points::from_rows(2, &rows).unwrap();
//!
//! // Grid cells spaced twice the reference distance apart, every cell
//! // holding at least 4 locations.
//! let partition = Tesseller::new(MethodConfig::with_defaults(Method::Grid))
//!     .with_common(CommonParams::default().with_distance(0.1))
//!     .with_strict(StrictConstraint::merge(4))
//!     .run(&locations)
//!     .unwrap();
//!
//! let counts = partition.location_count().unwrap();
//! assert!(counts.iter().all(|&n| n == 0 || n >= 4));
//! assert_eq!(counts.iter().sum::<usize>(), 400);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `tessera-core` | Location tables, cell ids, cell indices, queries, errors |
//! | [`mesh`] | `tessera-mesh` | The `Tessellation` trait and every method |
//! | [`partition`] | `tessera-partition` | Partitions, strict constraints, the pipeline |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types (`tessera-core`).
///
/// [`types::Points`], [`types::Translocations`], [`types::CellIndex`],
/// [`types::CellQuery`] and the error enums.
pub use tessera_core as types;

/// Tessellation trait and methods (`tessera-mesh`).
///
/// Grow any method through [`mesh::MethodConfig::tessellate`], or call a
/// method's config type directly to get the concrete tessellation.
pub use tessera_mesh as mesh;

/// Partitions and strict constraints (`tessera-partition`).
pub use tessera_partition as partition;

/// Common imports for typical Tessera usage.
///
/// ```rust
/// use tessera::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use tessera_core::{
        BoundingBox, CellId, CellIndex, CellQuery, Knn, Points, ScalerKind, Translocations,
    };

    // Errors
    pub use tessera_core::{DataError, TessellationError};
    pub use tessera_partition::PartitionError;

    // Tessellations
    pub use tessera_mesh::{CellLabels, CommonParams, Method, MethodConfig, Tessellation};

    // Partitions
    pub use tessera_partition::{Partition, PointPair, StrictConstraint, StrictPolicy, Tesseller};
}
