use faer::{Col, ColRef, Mat, MatRef};

use crate::error::CouplingError;
use crate::flow::FlowState;
use crate::mesh::PanelMesh;

/// Implicit-midpoint step context for a dynamic structural solve: the
/// converged state of the previous time step and the step size. The solver is
/// expected to evaluate its residual at the midpoint state derived from these
/// values, not at the end-of-step displacement directly.
#[derive(Clone, Copy)]
pub struct MidpointStep<'a> {
    pub u_prev: ColRef<'a, f64>, // Previous-step displacement
    pub v_prev: ColRef<'a, f64>, // Previous-step velocity
    pub h: f64,                  // Time step size (s)
}

/// Aerodynamic solver boundary: panel forces on a (deformed) panel mesh under
/// a frozen flow sample. Returns `[3][n_panels]` force vectors.
pub trait AeroSolver {
    fn panel_forces(&self, mesh: &PanelMesh, flow: &FlowState) -> Result<Mat<f64>, CouplingError>;
}

/// Structural solver boundary: displacement response to a distributed force
/// field (`[3][n_nodes]` force density). With a `MidpointStep` the solve is
/// dynamic; without one it is a static equilibrium solve.
pub trait StructuralSolver {
    fn n_dofs(&self) -> usize;

    fn solve(
        &mut self,
        distributed_force: MatRef<f64>,
        step: Option<&MidpointStep>,
    ) -> Result<Col<f64>, CouplingError>;
}
