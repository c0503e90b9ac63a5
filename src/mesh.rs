use std::path::Path;

use faer::{Col, Mat, MatRef};
use itertools::Itertools;
use serde::Deserialize;

use crate::error::CouplingError;
use crate::util::{cross_product, vec_norm};

//------------------------------------------------------------------------------
// Structural mesh
//------------------------------------------------------------------------------

/// Unstructured shell mesh for the structural side: node coordinates plus
/// triangle/quad connectivity. Read once at setup and immutable for the run.
pub struct StructuralMesh {
    pub coords: Mat<f64>,         // Node coordinates `[3][n_nodes]`
    pub cells: Vec<Vec<usize>>,   // Element connectivity (3 or 4 nodes per cell)
}

#[derive(Deserialize)]
struct StructuralMeshFile {
    points: Vec<[f64; 3]>,
    cells: Vec<Vec<usize>>,
}

impl StructuralMesh {
    pub fn new(points: &[[f64; 3]], cells: Vec<Vec<usize>>) -> Result<Self, CouplingError> {
        let n_nodes = points.len();
        for cell in &cells {
            if cell.len() != 3 && cell.len() != 4 {
                return Err(CouplingError::InvalidMesh(format!(
                    "cell with {} nodes, only triangles and quads are supported",
                    cell.len()
                )));
            }
            if let Some(&id) = cell.iter().find(|&&id| id >= n_nodes) {
                return Err(CouplingError::InvalidMesh(format!(
                    "cell references node {} but mesh has {} nodes",
                    id, n_nodes
                )));
            }
        }
        Ok(Self {
            coords: Mat::from_fn(3, n_nodes, |i, j| points[j][i]),
            cells,
        })
    }

    /// Read a structural mesh from a YAML file with `points` and `cells` keys.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CouplingError> {
        let text = std::fs::read_to_string(path)?;
        let file: StructuralMeshFile = serde_yaml::from_str(&text)?;
        Self::new(&file.points, file.cells)
    }

    pub fn n_nodes(&self) -> usize {
        self.coords.ncols()
    }

    pub fn n_dofs(&self) -> usize {
        3 * self.n_nodes()
    }

    pub fn node(&self, id: usize) -> [f64; 3] {
        [
            self.coords[(0, id)],
            self.coords[(1, id)],
            self.coords[(2, id)],
        ]
    }

    /// IDs of all nodes satisfying a geometric predicate. Used to select
    /// clamped-edge node sets, e.g. all nodes with y below a threshold.
    pub fn nodes_where(&self, predicate: impl Fn(&[f64; 3]) -> bool) -> Vec<usize> {
        (0..self.n_nodes())
            .filter(|&id| predicate(&self.node(id)))
            .collect_vec()
    }

    pub fn cell_area(&self, cell: &[usize]) -> f64 {
        match cell.len() {
            3 => triangle_area(self.node(cell[0]), self.node(cell[1]), self.node(cell[2])),
            4 => {
                triangle_area(self.node(cell[0]), self.node(cell[1]), self.node(cell[2]))
                    + triangle_area(self.node(cell[0]), self.node(cell[2]), self.node(cell[3]))
            }
            _ => unreachable!("validated at construction"),
        }
    }

    /// Tributary area per node: each cell contributes an equal share of its
    /// area to each of its nodes. This is the lumped integration weight used
    /// to convert between force densities and nodal forces.
    pub fn nodal_areas(&self) -> Col<f64> {
        let mut areas = Col::zeros(self.n_nodes());
        self.cells.iter().for_each(|cell| {
            let share = self.cell_area(cell) / cell.len() as f64;
            cell.iter().for_each(|&id| areas[id] += share);
        });
        areas
    }
}

fn triangle_area(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> f64 {
    let ab = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
    let ac = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
    0.5 * vec_norm(&cross_product(&ab, &ac))
}

//------------------------------------------------------------------------------
// Aerodynamic panel mesh
//------------------------------------------------------------------------------

/// Structured corner-point grid for the aerodynamic side: `n_chord` points in
/// the chordwise direction by `n_span` points in the spanwise direction.
/// Point `(i, j)` is stored at column `i + j * n_chord`; panel `(i, j)` at
/// column `i + j * (n_chord - 1)`.
#[derive(Clone)]
pub struct PanelMesh {
    pub coords: Mat<f64>, // Corner point coordinates `[3][n_chord * n_span]`
    pub n_chord: usize,
    pub n_span: usize,
}

#[derive(Deserialize)]
struct PanelMeshFile {
    shape: [usize; 2],
    points: Vec<[f64; 3]>,
}

impl PanelMesh {
    pub fn new(points: &[[f64; 3]], n_chord: usize, n_span: usize) -> Result<Self, CouplingError> {
        if points.len() != n_chord * n_span {
            return Err(CouplingError::MeshMismatch {
                what: "panel mesh corner points",
                expected: n_chord * n_span,
                found: points.len(),
            });
        }
        if n_chord < 2 || n_span < 2 {
            return Err(CouplingError::InvalidMesh(format!(
                "panel grid must be at least 2x2, got {}x{}",
                n_chord, n_span
            )));
        }
        Ok(Self {
            coords: Mat::from_fn(3, points.len(), |i, j| points[j][i]),
            n_chord,
            n_span,
        })
    }

    /// Read a panel mesh from a YAML file with `shape: [n_chord, n_span]` and
    /// a chord-major `points` list, applying a global translation `offset` to
    /// every corner point.
    pub fn from_yaml_file(
        path: impl AsRef<Path>,
        offset: [f64; 3],
    ) -> Result<Self, CouplingError> {
        let text = std::fs::read_to_string(path)?;
        let file: PanelMeshFile = serde_yaml::from_str(&text)?;
        let points = file
            .points
            .iter()
            .map(|p| [p[0] + offset[0], p[1] + offset[1], p[2] + offset[2]])
            .collect_vec();
        Self::new(&points, file.shape[0], file.shape[1])
    }

    pub fn n_points(&self) -> usize {
        self.n_chord * self.n_span
    }

    pub fn n_panels(&self) -> usize {
        (self.n_chord - 1) * (self.n_span - 1)
    }

    #[inline]
    pub fn point_index(&self, i: usize, j: usize) -> usize {
        i + j * self.n_chord
    }

    pub fn point(&self, idx: usize) -> [f64; 3] {
        [
            self.coords[(0, idx)],
            self.coords[(1, idx)],
            self.coords[(2, idx)],
        ]
    }

    /// Corner point indices of panel `(i, j)` in counterclockwise order.
    pub fn panel_corners(&self, i: usize, j: usize) -> [usize; 4] {
        [
            self.point_index(i, j),
            self.point_index(i + 1, j),
            self.point_index(i + 1, j + 1),
            self.point_index(i, j + 1),
        ]
    }

    /// Panel centers as the mean of the four corner points, `[3][n_panels]`.
    pub fn panel_centers(&self) -> Mat<f64> {
        let mut centers = Mat::zeros(3, self.n_panels());
        self.for_each_panel(|p, corners| {
            (0..3).for_each(|axis| {
                centers[(axis, p)] =
                    corners.iter().map(|&c| self.coords[(axis, c)]).sum::<f64>() / 4.;
            });
        });
        centers
    }

    /// Panel areas from the cross product of the two diagonals.
    pub fn panel_areas(&self) -> Col<f64> {
        let mut areas = Col::zeros(self.n_panels());
        self.for_each_panel(|p, corners| {
            areas[p] = vec_norm(&self.panel_area_vector(corners));
        });
        areas
    }

    /// Unit panel normals, `[3][n_panels]`.
    pub fn panel_normals(&self) -> Mat<f64> {
        let mut normals = Mat::zeros(3, self.n_panels());
        self.for_each_panel(|p, corners| {
            let av = self.panel_area_vector(corners);
            let m = vec_norm(&av);
            if m > f64::EPSILON {
                (0..3).for_each(|axis| normals[(axis, p)] = av[axis] / m);
            }
        });
        normals
    }

    fn panel_area_vector(&self, corners: [usize; 4]) -> [f64; 3] {
        let [c0, c1, c2, c3] = corners.map(|c| self.point(c));
        let d1 = [c2[0] - c0[0], c2[1] - c0[1], c2[2] - c0[2]];
        let d2 = [c3[0] - c1[0], c3[1] - c1[1], c3[2] - c1[2]];
        let cp = cross_product(&d1, &d2);
        [0.5 * cp[0], 0.5 * cp[1], 0.5 * cp[2]]
    }

    fn for_each_panel(&self, mut f: impl FnMut(usize, [usize; 4])) {
        for j in 0..self.n_span - 1 {
            for i in 0..self.n_chord - 1 {
                f(i + j * (self.n_chord - 1), self.panel_corners(i, j));
            }
        }
    }

    /// New mesh with `disp` (`[3][n_points]`) added to the baseline corner
    /// coordinates. Pure: the receiver is left untouched.
    pub fn displaced_by(&self, disp: MatRef<f64>) -> Result<PanelMesh, CouplingError> {
        if disp.nrows() != 3 || disp.ncols() != self.n_points() {
            return Err(CouplingError::MeshMismatch {
                what: "panel mesh displacement field",
                expected: self.n_points(),
                found: disp.ncols(),
            });
        }
        Ok(PanelMesh {
            coords: Mat::from_fn(3, self.n_points(), |i, j| self.coords[(i, j)] + disp[(i, j)]),
            n_chord: self.n_chord,
            n_span: self.n_span,
        })
    }

    /// Build the full-span mesh from half-span data by reflecting about the
    /// y = 0 plane. Port-side columns come first (tip to root, y negated),
    /// followed by the original starboard columns; the shared root column
    /// appears once.
    pub fn mirror_span(&self) -> PanelMesh {
        let n_span_full = 2 * self.n_span - 1;
        let mut coords = Mat::zeros(3, self.n_chord * n_span_full);
        for jf in 0..n_span_full {
            let (js, sign) = if jf < self.n_span - 1 {
                (self.n_span - 1 - jf, -1.)
            } else {
                (jf - (self.n_span - 1), 1.)
            };
            for i in 0..self.n_chord {
                let src = self.point_index(i, js);
                let dst = i + jf * self.n_chord;
                coords[(0, dst)] = self.coords[(0, src)];
                coords[(1, dst)] = sign * self.coords[(1, src)];
                coords[(2, dst)] = self.coords[(2, src)];
            }
        }
        PanelMesh {
            coords,
            n_chord: self.n_chord,
            n_span: n_span_full,
        }
    }

    /// Extract the starboard-half panel forces from a full-span result
    /// produced on `self.mirror_span()`, restoring this mesh's panel order.
    pub fn starboard_panel_forces(&self, full: MatRef<f64>) -> Result<Mat<f64>, CouplingError> {
        let n_panel_chord = self.n_chord - 1;
        let n_full_panels = n_panel_chord * 2 * (self.n_span - 1);
        if full.nrows() != 3 || full.ncols() != n_full_panels {
            return Err(CouplingError::MeshMismatch {
                what: "full-span panel forces",
                expected: n_full_panels,
                found: full.ncols(),
            });
        }
        let mut out = Mat::zeros(3, self.n_panels());
        for j in 0..self.n_span - 1 {
            let j_full = j + self.n_span - 1;
            for i in 0..n_panel_chord {
                let src = i + j_full * n_panel_chord;
                let dst = i + j * n_panel_chord;
                (0..3).for_each(|axis| out[(axis, dst)] = full[(axis, src)]);
            }
        }
        Ok(out)
    }
}

//------------------------------------------------------------------------------
// Tests
//------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn flat_panel_grid(n_chord: usize, n_span: usize, chord: f64, span: f64) -> PanelMesh {
        let points = (0..n_span)
            .flat_map(|j| {
                (0..n_chord).map(move |i| {
                    [
                        chord * i as f64 / (n_chord - 1) as f64,
                        span * j as f64 / (n_span - 1) as f64,
                        0.,
                    ]
                })
            })
            .collect_vec();
        PanelMesh::new(&points, n_chord, n_span).unwrap()
    }

    #[test]
    fn test_panel_areas_flat_grid() {
        let mesh = flat_panel_grid(3, 4, 2., 6.);
        let areas = mesh.panel_areas();
        assert_eq!(areas.nrows(), 6);
        // Each panel is 1 m chordwise by 2 m spanwise
        areas.iter().for_each(|&a| {
            assert_relative_eq!(a, 2.0, epsilon = 1e-12);
        });
    }

    #[test]
    fn test_panel_normals_flat_grid() {
        let mesh = flat_panel_grid(3, 3, 1., 1.);
        let normals = mesh.panel_normals();
        normals.col_iter().for_each(|n| {
            assert_relative_eq!(n[0], 0., epsilon = 1e-12);
            assert_relative_eq!(n[1], 0., epsilon = 1e-12);
            assert_relative_eq!(n[2].abs(), 1., epsilon = 1e-12);
        });
    }

    #[test]
    fn test_mirror_span_shares_root_column() {
        let mesh = flat_panel_grid(2, 3, 1., 4.);
        let full = mesh.mirror_span();
        assert_eq!(full.n_span, 5);
        assert_eq!(full.n_points(), 10);

        // Middle column is the root (y = 0)
        (0..full.n_chord).for_each(|i| {
            let p = full.point(full.point_index(i, 2));
            assert_relative_eq!(p[1], 0., epsilon = 1e-12);
        });

        // First column is the reflected tip
        let tip = full.point(full.point_index(0, 0));
        assert_relative_eq!(tip[1], -4., epsilon = 1e-12);
    }

    #[test]
    fn test_starboard_extraction_roundtrip() {
        let mesh = flat_panel_grid(3, 4, 1., 3.);
        let full = mesh.mirror_span();

        // Tag each full-span panel with its column index
        let forces = Mat::from_fn(3, full.n_panels(), |i, j| if i == 2 { j as f64 } else { 0. });
        let starboard = mesh.starboard_panel_forces(forces.as_ref()).unwrap();

        assert_eq!(starboard.ncols(), mesh.n_panels());
        // Starboard panels are the last n_panels columns of the full set
        let n_port = full.n_panels() - mesh.n_panels();
        (0..mesh.n_panels()).for_each(|p| {
            assert_relative_eq!(starboard[(2, p)], (n_port + p) as f64, epsilon = 1e-12);
        });
    }

    #[test]
    fn test_structural_nodal_areas() {
        // Two unit quads in a strip: interior nodes accumulate from both
        let points = [
            [0., 0., 0.],
            [1., 0., 0.],
            [0., 1., 0.],
            [1., 1., 0.],
            [0., 2., 0.],
            [1., 2., 0.],
        ];
        let cells = vec![vec![0, 1, 3, 2], vec![2, 3, 5, 4]];
        let mesh = StructuralMesh::new(&points, cells).unwrap();
        let areas = mesh.nodal_areas();
        assert_relative_eq!(areas[0], 0.25, epsilon = 1e-12);
        assert_relative_eq!(areas[2], 0.5, epsilon = 1e-12);
        assert_relative_eq!(areas.iter().sum::<f64>(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_nodes_where_predicate() {
        let points = [[0., 0.2, 0.], [0., 0.7, 0.], [0., 1.4, 0.]];
        let mesh = StructuralMesh::new(&points, vec![vec![0, 1, 2]]).unwrap();
        let clamped = mesh.nodes_where(|x| x[1] < 0.55);
        assert_eq!(clamped, vec![0]);
    }

    #[test]
    fn test_invalid_cell_rejected() {
        let points = [[0., 0., 0.], [1., 0., 0.]];
        let result = StructuralMesh::new(&points, vec![vec![0, 1]]);
        assert!(matches!(result, Err(CouplingError::InvalidMesh(_))));
    }
}
