use faer::linalg::matmul::matmul;
use faer::{Accum, Col, ColRef, Mat, MatRef, Par};
use itertools::Itertools;

use crate::error::CouplingError;
use crate::mesh::{PanelMesh, StructuralMesh};
use crate::util::col_as_mat_ref;

/// Number of structural nodes each aerodynamic point interpolates from.
const N_NEIGHBORS: usize = 4;

/// Mesh-to-mesh transfer operator pair between the aerodynamic panel mesh and
/// the structural shell mesh. Both interpolation matrices are built once from
/// the undeformed mesh geometries; the transfers themselves are pure functions
/// of their single argument and carry no iteration history.
pub struct CouplingMaps {
    force_weights: Mat<f64>, // Panel center -> structural node weights `[n_panels][n_nodes]`
    disp_weights: Mat<f64>,  // Structural node -> corner point weights `[n_points][n_nodes]`
    nodal_area: Col<f64>,    // Structural tributary areas for density conversion
    n_struct_nodes: usize,
    n_panels: usize,
    n_aero_points: usize,
}

impl CouplingMaps {
    /// Build the transfer operator for a fixed structural/aerodynamic mesh
    /// pair. Weights are inverse-square-distance over the nearest structural
    /// nodes, normalized so each row sums to one (total force is preserved by
    /// the force transfer).
    pub fn new(structural: &StructuralMesh, aero: &PanelMesh) -> Result<Self, CouplingError> {
        let n_struct_nodes = structural.n_nodes();
        if n_struct_nodes < N_NEIGHBORS {
            return Err(CouplingError::MeshMismatch {
                what: "structural nodes for interpolation",
                expected: N_NEIGHBORS,
                found: n_struct_nodes,
            });
        }

        let force_weights = idw_weights(aero.panel_centers().as_ref(), structural.coords.as_ref());
        let disp_weights = idw_weights(aero.coords.as_ref(), structural.coords.as_ref());

        Ok(Self {
            force_weights,
            disp_weights,
            nodal_area: structural.nodal_areas(),
            n_struct_nodes,
            n_panels: aero.n_panels(),
            n_aero_points: aero.n_points(),
        })
    }

    pub fn n_panels(&self) -> usize {
        self.n_panels
    }

    pub fn n_struct_nodes(&self) -> usize {
        self.n_struct_nodes
    }

    /// Map panel forces (`[3][n_panels]`, N per panel) to a distributed force
    /// field on the structural mesh (`[3][n_nodes]`, N/m^2). The lumped nodal
    /// total equals the panel total; dividing by the tributary areas turns the
    /// lumped forces into the density consumed by the structural solve.
    pub fn transfer_force(&self, panel_forces: MatRef<f64>) -> Result<Mat<f64>, CouplingError> {
        let mut field = self.transfer_nodal_force(panel_forces)?;
        field.col_iter_mut().enumerate().for_each(|(node, col)| {
            let area = self.nodal_area[node];
            if area > f64::EPSILON {
                col.iter_mut().for_each(|v| *v /= area);
            }
        });
        Ok(field)
    }

    /// Map panel forces to lumped nodal forces (`[3][n_nodes]`, N per node).
    /// Reporting variant, produced once at convergence.
    pub fn transfer_nodal_force(
        &self,
        panel_forces: MatRef<f64>,
    ) -> Result<Mat<f64>, CouplingError> {
        if panel_forces.nrows() != 3 || panel_forces.ncols() != self.n_panels {
            return Err(CouplingError::MeshMismatch {
                what: "panel force field",
                expected: self.n_panels,
                found: panel_forces.ncols(),
            });
        }
        let mut nodal = Mat::zeros(3, self.n_struct_nodes);
        matmul(
            nodal.as_mut(),
            Accum::Replace,
            &panel_forces,
            &self.force_weights,
            1.,
            Par::Seq,
        );
        Ok(nodal)
    }

    /// Map a structural displacement vector (length `3 * n_nodes`) to corner
    /// point displacements on the aerodynamic mesh (`[3][n_points]`).
    pub fn transfer_displacement(&self, u: ColRef<f64>) -> Result<Mat<f64>, CouplingError> {
        if u.nrows() != 3 * self.n_struct_nodes {
            return Err(CouplingError::MeshMismatch {
                what: "structural displacement vector",
                expected: 3 * self.n_struct_nodes,
                found: u.nrows(),
            });
        }
        let u_mat = col_as_mat_ref(u, 3, self.n_struct_nodes);
        let mut disp = Mat::zeros(3, self.n_aero_points);
        matmul(
            disp.as_mut(),
            Accum::Replace,
            &u_mat,
            self.disp_weights.transpose(),
            1.,
            Par::Seq,
        );
        Ok(disp)
    }
}

/// Inverse-square-distance weights from each target point to its nearest
/// source points. Each row sums to one; a target coincident with a source
/// takes that source's value exactly.
fn idw_weights(targets: MatRef<f64>, sources: MatRef<f64>) -> Mat<f64> {
    let n_targets = targets.ncols();
    let n_sources = sources.ncols();
    let mut weights = Mat::zeros(n_targets, n_sources);

    for t in 0..n_targets {
        // Squared distances to every source node
        let d2 = (0..n_sources)
            .map(|s| {
                (0..3)
                    .map(|axis| (targets[(axis, t)] - sources[(axis, s)]).powi(2))
                    .sum::<f64>()
            })
            .collect_vec();

        // Nearest sources by distance
        let nearest = (0..n_sources)
            .sorted_by(|&a, &b| d2[a].partial_cmp(&d2[b]).unwrap())
            .take(N_NEIGHBORS)
            .collect_vec();

        // Coincident point takes the source value exactly
        if d2[nearest[0]] < 1e-24 {
            weights[(t, nearest[0])] = 1.;
            continue;
        }

        let sum: f64 = nearest.iter().map(|&s| 1. / d2[s]).sum();
        nearest.iter().for_each(|&s| {
            weights[(t, s)] = 1. / d2[s] / sum;
        });
    }

    weights
}

//------------------------------------------------------------------------------
// Tests
//------------------------------------------------------------------------------
