//! Tessellation trait and partitioning algorithms for Tessera.
//!
//! Provides the [`Tessellation`] trait that abstracts over how space or
//! time is cut into cells, together with every growing method:
//!
//! - [`RandomConfig`]: uniform random centers
//! - [`GridConfig`]: regular hypercube lattice
//! - [`HexagonConfig`]: regular hexagonal lattice (2D)
//! - [`KdTreeConfig`]: recursive `2^D` splitting
//! - [`KMeansConfig`]: grid-initialized k-means
//! - [`GasConfig`]: growing-when-required gas
//! - [`WindowConfig`]: sliding time windows
//! - [`LatticeConfig`]: arbitrary time segments
//! - [`NestedConfig`]: per-cell sub-tessellations
//!
//! [`MethodConfig`] selects one of them by name and freezes it against a
//! reference location set. [`CellLabels`] tags the cells and edges of a
//! frozen tessellation.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod adjacency;
pub mod centers;
pub mod grid;
pub mod gwr;
pub mod hexagon;
pub mod kdtree;
pub mod kmeans;
pub mod labels;
pub mod lattice;
pub mod nested;
pub mod params;
pub mod random;
pub mod registry;
pub mod search;
pub mod tessellation;
pub mod voronoi;
pub mod window;

#[cfg(test)]
pub(crate) mod compliance;

pub use adjacency::Adjacency;
pub use centers::CellCenters;
pub use grid::{GridConfig, GridMesh};
pub use gwr::GasConfig;
pub use hexagon::{HexagonConfig, HexagonMesh};
pub use kdtree::{KdTreeConfig, KdTreeMesh};
pub use kmeans::KMeansConfig;
pub use labels::CellLabels;
pub use lattice::{LatticeConfig, TimeLattice};
pub use nested::{NestedConfig, NestedTessellation};
pub use params::CommonParams;
pub use random::RandomConfig;
pub use registry::{Method, MethodConfig};
pub use search::{KdIndex, Neighbour};
pub use tessellation::Tessellation;
pub use voronoi::VoronoiMesh;
pub use window::WindowConfig;
