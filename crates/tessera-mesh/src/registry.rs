//! Method names and the tagged configuration selecting a method.

use crate::gwr::GasConfig;
use crate::grid::GridConfig;
use crate::hexagon::HexagonConfig;
use crate::kdtree::KdTreeConfig;
use crate::kmeans::KMeansConfig;
use crate::lattice::LatticeConfig;
use crate::nested::NestedConfig;
use crate::params::CommonParams;
use crate::random::RandomConfig;
use crate::tessellation::Tessellation;
use crate::window::WindowConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tessera_core::{Points, TessellationError};
use tracing::debug;

/// Name of a tessellation method.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Uniform random centers.
    Random,
    /// Regular hypercube lattice.
    Grid,
    /// Regular hexagonal lattice, 2D only.
    Hexagon,
    /// Recursive `2^D` splitting.
    #[serde(rename = "kdtree")]
    KdTree,
    /// Grid-initialized k-means.
    #[serde(rename = "kmeans")]
    KMeans,
    /// Growing-when-required gas.
    Gwr,
    /// Sliding time window.
    Window,
    /// Arbitrary time segments.
    Lattice,
    /// Per-cell sub-tessellations.
    Nested,
}

impl Method {
    /// Every method, in registry order.
    pub const ALL: [Method; 9] = [
        Method::Random,
        Method::Grid,
        Method::Hexagon,
        Method::KdTree,
        Method::KMeans,
        Method::Gwr,
        Method::Window,
        Method::Lattice,
        Method::Nested,
    ];

    /// Canonical name.
    pub fn name(self) -> &'static str {
        match self {
            Method::Random => "random",
            Method::Grid => "grid",
            Method::Hexagon => "hexagon",
            Method::KdTree => "kdtree",
            Method::KMeans => "kmeans",
            Method::Gwr => "gwr",
            Method::Window => "window",
            Method::Lattice => "lattice",
            Method::Nested => "nested",
        }
    }

    /// Whether the method partitions time rather than space.
    pub fn is_temporal(self) -> bool {
        matches!(self, Method::Window | Method::Lattice)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = TessellationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let method = match name.as_str() {
            "random" => Method::Random,
            "grid" => Method::Grid,
            "hexagon" | "hexagonal" => Method::Hexagon,
            "kdtree" => Method::KdTree,
            "kmeans" => Method::KMeans,
            "gwr" | "growing-gas" => Method::Gwr,
            "window" | "sliding-window" => Method::Window,
            "lattice" => Method::Lattice,
            "nested" => Method::Nested,
            _ => {
                return Err(TessellationError::UnknownMethod {
                    name: s.to_string(),
                })
            }
        };
        Ok(method)
    }
}

/// A method together with its specific settings.
///
/// This is the not-yet-grown state of a tessellation; [`tessellate`]
/// freezes it against a reference set.
///
/// [`tessellate`]: MethodConfig::tessellate
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum MethodConfig {
    /// See [`RandomConfig`].
    Random(RandomConfig),
    /// See [`GridConfig`].
    Grid(GridConfig),
    /// See [`HexagonConfig`].
    Hexagon(HexagonConfig),
    /// See [`KdTreeConfig`].
    #[serde(rename = "kdtree")]
    KdTree(KdTreeConfig),
    /// See [`KMeansConfig`].
    #[serde(rename = "kmeans")]
    KMeans(KMeansConfig),
    /// See [`GasConfig`].
    Gwr(GasConfig),
    /// See [`WindowConfig`].
    Window(WindowConfig),
    /// See [`LatticeConfig`].
    Lattice(LatticeConfig),
    /// See [`NestedConfig`].
    Nested(NestedConfig),
}

impl MethodConfig {
    /// Default settings for `method`.
    ///
    /// Temporal methods and nesting have no meaningful defaults for their
    /// boundaries or children: the returned config fails validation until
    /// those are filled in.
    pub fn with_defaults(method: Method) -> Self {
        match method {
            Method::Random => MethodConfig::Random(RandomConfig::default()),
            Method::Grid => MethodConfig::Grid(GridConfig::default()),
            Method::Hexagon => MethodConfig::Hexagon(HexagonConfig::default()),
            Method::KdTree => MethodConfig::KdTree(KdTreeConfig::default()),
            Method::KMeans => MethodConfig::KMeans(KMeansConfig::default()),
            Method::Gwr => MethodConfig::Gwr(GasConfig::default()),
            Method::Window => MethodConfig::Window(WindowConfig::default()),
            Method::Lattice => MethodConfig::Lattice(LatticeConfig::default()),
            Method::Nested => MethodConfig::Nested(NestedConfig::default()),
        }
    }

    /// The configured method.
    pub fn method(&self) -> Method {
        match self {
            MethodConfig::Random(_) => Method::Random,
            MethodConfig::Grid(_) => Method::Grid,
            MethodConfig::Hexagon(_) => Method::Hexagon,
            MethodConfig::KdTree(_) => Method::KdTree,
            MethodConfig::KMeans(_) => Method::KMeans,
            MethodConfig::Gwr(_) => Method::Gwr,
            MethodConfig::Window(_) => Method::Window,
            MethodConfig::Lattice(_) => Method::Lattice,
            MethodConfig::Nested(_) => Method::Nested,
        }
    }

    /// Check method-specific settings.
    pub fn validate(&self) -> Result<(), TessellationError> {
        match self {
            MethodConfig::Random(_) | MethodConfig::Grid(_) | MethodConfig::Hexagon(_) => Ok(()),
            MethodConfig::KdTree(c) => c.validate(),
            MethodConfig::KMeans(c) => c.validate(),
            MethodConfig::Gwr(c) => c.validate(),
            MethodConfig::Window(c) => c.validate(),
            MethodConfig::Lattice(c) => c.validate(),
            MethodConfig::Nested(c) => c.validate(),
        }
    }

    /// Grow a tessellation from `reference`.
    ///
    /// Fails without building anything on an empty or degenerate reference
    /// set, a dimension the method does not support, or invalid settings.
    pub fn tessellate(
        &self,
        reference: &Points,
        common: &CommonParams,
    ) -> Result<Box<dyn Tessellation>, TessellationError> {
        self.validate()?;
        let grown: Box<dyn Tessellation> = match self {
            MethodConfig::Random(c) => Box::new(c.tessellate(reference, common)?),
            MethodConfig::Grid(c) => Box::new(c.tessellate(reference, common)?),
            MethodConfig::Hexagon(c) => Box::new(c.tessellate(reference, common)?),
            MethodConfig::KdTree(c) => Box::new(c.tessellate(reference, common)?),
            MethodConfig::KMeans(c) => Box::new(c.tessellate(reference, common)?),
            MethodConfig::Gwr(c) => Box::new(c.tessellate(reference, common)?),
            MethodConfig::Window(c) => Box::new(c.tessellate(reference, common)?),
            MethodConfig::Lattice(c) => Box::new(c.tessellate(reference, common)?),
            MethodConfig::Nested(c) => Box::new(c.tessellate(reference, common)?),
        };
        debug!(
            method = %grown.method(),
            cells = grown.cell_count(),
            reference = reference.len(),
            instance = %grown.instance_id(),
            "tessellation frozen"
        );
        Ok(grown)
    }
}
