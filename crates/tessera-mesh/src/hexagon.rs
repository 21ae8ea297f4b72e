//! 2D hexagonal lattice with axial coordinates.

use crate::adjacency::Adjacency;
use crate::centers::CellCenters;
use crate::params::{prepare, resolve_spacing, CommonParams};
use crate::registry::Method;
use crate::tessellation::Tessellation;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tessera_core::{CellId, CellIndex, CellQuery, Points, TessellationError, TessellationInstanceId};

/// Pointy-top hex offsets in axial `(dq, dr)` order: E, NE, NW, W, SW, SE.
const HEX_OFFSETS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (-1, 1), (0, 1)];

/// Area of a hexagon divided by the square of its center spacing.
const HEX_MEASURE: f64 = 0.866_025_403_784_438_6;

/// Settings of the hexagon method.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HexagonConfig {
    /// Flat-top orientation instead of pointy-top.
    pub flat_top: bool,
}

impl HexagonConfig {
    /// Grow a hexagonal lattice covering the bounding box of `reference`.
    ///
    /// Only 2D reference sets are supported.
    pub fn tessellate(
        &self,
        reference: &Points,
        common: &CommonParams,
    ) -> Result<HexagonMesh, TessellationError> {
        if reference.dim() != 2 {
            return Err(TessellationError::UnsupportedDimension {
                method: Method::Hexagon.name(),
                dim: reference.dim(),
            });
        }
        let prep = prepare(Method::Hexagon, reference, common)?;
        let spacing = resolve_spacing(Method::Hexagon, &prep, common, HEX_MEASURE)?.spacing;
        let lower = prep.bbox.lower();
        let upper = prep.bbox.upper();
        let axis = |v: &[f64]| if self.flat_top { [v[1], v[0]] } else { [v[0], v[1]] };
        let origin = axis(lower);
        let top = axis(upper);
        let extent = [top[0] - origin[0], top[1] - origin[1]];

        let row_height = spacing * HEX_MEASURE;
        let radius = spacing / 3f64.sqrt();
        let r_max = ((extent[1] + radius) / row_height).floor() as i32;
        let mut axial = Vec::new();
        for r in 0..=r_max {
            let shift = 0.5 * r as f64;
            let q_min = (-radius / spacing - shift).ceil() as i32;
            let q_max = ((extent[0] + radius) / spacing - shift).floor() as i32;
            for q in q_min..=q_max {
                axial.push((q, r));
            }
        }

        let mesh = HexagonLayout {
            origin,
            spacing,
            flat_top: self.flat_top,
        };
        let mut scaled = Vec::with_capacity(axial.len() * 2);
        for &(q, r) in &axial {
            scaled.extend_from_slice(&mesh.center(q, r));
        }
        let lookup: HashMap<(i32, i32), CellId> = axial
            .iter()
            .enumerate()
            .map(|(i, &qr)| (qr, CellId::from(i)))
            .collect();
        let mut edges = Vec::with_capacity(axial.len() * 3);
        for (i, &(q, r)) in axial.iter().enumerate() {
            for (dq, dr) in HEX_OFFSETS {
                if let Some(j) = lookup.get(&(q + dq, r + dr)) {
                    edges.push((i, j.index()));
                }
            }
        }
        let centers = CellCenters::new(prep.scaler, scaled);
        let adjacency = Adjacency::from_edges(axial.len(), edges);
        Ok(HexagonMesh {
            avg_distance: centers.scaler().unscale_distance(spacing),
            layout: mesh,
            axial,
            lookup,
            centers,
            adjacency,
            instance_id: TessellationInstanceId::next(),
        })
    }
}

#[derive(Clone, Copy, Debug)]
struct HexagonLayout {
    origin: [f64; 2],
    spacing: f64,
    flat_top: bool,
}

impl HexagonLayout {
    fn orient(&self, a: f64, b: f64) -> [f64; 2] {
        if self.flat_top {
            [b, a]
        } else {
            [a, b]
        }
    }

    fn center(&self, q: i32, r: i32) -> [f64; 2] {
        let x = self.origin[0] + self.spacing * (q as f64 + 0.5 * r as f64);
        let y = self.origin[1] + self.spacing * HEX_MEASURE * r as f64;
        self.orient(x, y)
    }

    /// Axial coordinate of the hexagon containing a scaled point.
    fn locate(&self, p: &[f64]) -> (i32, i32) {
        let [x, y] = self.orient(p[0], p[1]);
        let rf = (y - self.origin[1]) / (self.spacing * HEX_MEASURE);
        let qf = (x - self.origin[0]) / self.spacing - 0.5 * rf;
        cube_round(qf, rf)
    }
}

/// Round fractional axial coordinates to the nearest hexagon.
fn cube_round(qf: f64, rf: f64) -> (i32, i32) {
    let sf = -qf - rf;
    let (mut q, mut r, s) = (qf.round(), rf.round(), sf.round());
    let (dq, dr, ds) = ((q - qf).abs(), (r - rf).abs(), (s - sf).abs());
    if dq > dr && dq > ds {
        q = -r - s;
    } else if dr > ds {
        r = -q - s;
    }
    (q as i32, r as i32)
}

/// A frozen hexagonal lattice.
///
/// Canonical ordering is r-then-q: outer loop over rows, inner loop over
/// columns. Locations beyond the lattice go to the nearest hexagon.
#[derive(Clone, Debug)]
pub struct HexagonMesh {
    layout: HexagonLayout,
    axial: Vec<(i32, i32)>,
    lookup: HashMap<(i32, i32), CellId>,
    centers: CellCenters,
    adjacency: Adjacency,
    avg_distance: f64,
    instance_id: TessellationInstanceId,
}

impl HexagonMesh {
    /// Distance between adjacent hexagon centers, in data units.
    pub fn spacing(&self) -> f64 {
        self.avg_distance
    }

    /// Whether the lattice is flat-topped.
    pub fn is_flat_top(&self) -> bool {
        self.layout.flat_top
    }

    /// Axial `(q, r)` coordinate of a cell.
    pub fn axial(&self, cell: CellId) -> Option<(i32, i32)> {
        self.axial.get(cell.index()).copied()
    }

    fn primary(&self, p: &[f64]) -> Option<CellId> {
        self.lookup
            .get(&self.layout.locate(p))
            .copied()
            .or_else(|| self.centers.nearest(p))
    }
}

impl Tessellation for HexagonMesh {
    fn method(&self) -> Method {
        Method::Hexagon
    }

    fn ndim(&self) -> usize {
        2
    }

    fn cell_count(&self) -> usize {
        self.centers.len()
    }

    fn instance_id(&self) -> TessellationInstanceId {
        self.instance_id
    }

    fn cell_centers(&self) -> &[f64] {
        self.centers.as_slice()
    }

    fn cell_adjacency(&self) -> &Adjacency {
        &self.adjacency
    }

    fn avg_distance(&self) -> f64 {
        self.avg_distance
    }

    fn cell_index(
        &self,
        points: &Points,
        query: &CellQuery,
    ) -> Result<CellIndex, TessellationError> {
        self.centers.query(points, query, |p| self.primary(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance;
    use proptest::prelude::*;

    fn unit_square() -> Points {
        let mut rows = Vec::new();
        for i in 0..=10 {
            for j in 0..=10 {
                rows.push([i as f64 * 0.1, j as f64 * 0.1]);
            }
        }
        Points::from_rows(2, &rows).unwrap()
    }

    fn mesh(flat_top: bool) -> HexagonMesh {
        HexagonConfig { flat_top }
            .tessellate(&unit_square(), &CommonParams::default().with_distance(0.1))
            .unwrap()
    }

    #[test]
    fn only_2d_is_supported() {
        let p = Points::new(3, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap();
        let err = HexagonConfig::default()
            .tessellate(&p, &CommonParams::default().with_distance(0.1))
            .unwrap_err();
        assert_eq!(
            err,
            TessellationError::UnsupportedDimension {
                method: "hexagon",
                dim: 3
            }
        );
    }

    #[test]
    fn spacing_respects_floor() {
        let m = mesh(false);
        assert!((m.spacing() - 0.2).abs() < 1e-12);
        let dense = HexagonConfig::default()
            .tessellate(
                &unit_square(),
                &CommonParams::default()
                    .with_distance(0.1)
                    .with_cell_count(100_000),
            )
            .unwrap();
        assert!(dense.spacing() >= 0.08 - 1e-12);
    }

    #[test]
    fn interior_cells_have_six_neighbours() {
        let m = mesh(false);
        let max = (0..m.cell_count())
            .map(|i| m.cell_adjacency().neighbours(CellId::from(i)).len())
            .max()
            .unwrap();
        assert_eq!(max, 6);
        let d = m.cell_adjacency().edges().map(|(a, b)| {
            let (ca, cb) = (m.cell_center(a).unwrap(), m.cell_center(b).unwrap());
            ((ca[0] - cb[0]).powi(2) + (ca[1] - cb[1]).powi(2)).sqrt()
        });
        for len in d {
            assert!((len - 0.2).abs() < 1e-9);
        }
    }

    #[test]
    fn cube_round_snaps_to_nearest_axial() {
        assert_eq!(cube_round(0.1, -0.1), (0, 0));
        assert_eq!(cube_round(0.9, 0.05), (1, 0));
        assert_eq!(cube_round(0.4, 0.4), (0, 1));
    }

    #[test]
    fn compliance_suite() {
        let p = unit_square();
        compliance::run_full_compliance(&mesh(false), &p);
        compliance::run_full_compliance(&mesh(true), &p);
    }

    proptest! {
        #[test]
        fn lookup_agrees_with_nearest_center(
            x in 0.0f64..1.0,
            y in 0.0f64..1.0,
            flat_top in any::<bool>(),
        ) {
            let m = mesh(flat_top);
            let p = [x, y];
            let by_lookup = m.lookup.get(&m.layout.locate(&p)).copied();
            prop_assert!(by_lookup.is_some());
            let nearest = m.centers.search().nearest(&p).unwrap();
            let found = m.centers.scaled(by_lookup.unwrap());
            let d2: f64 = found.iter().zip(&p).map(|(a, b)| (a - b) * (a - b)).sum();
            prop_assert!((d2 - nearest.dist2).abs() < 1e-9);
        }
    }
}
