use faer::{Col, Mat};
use itertools::Itertools;
use log::{debug, info};

use crate::error::CouplingError;
use crate::flow::FlowState;
use crate::mesh::PanelMesh;
use crate::solvers::{AeroSolver, MidpointStep, StructuralSolver};
use crate::transfer::CouplingMaps;
use crate::util::{all_finite, max_abs_diff};

//------------------------------------------------------------------------------
// Parameters
//------------------------------------------------------------------------------

/// Fixed per-axis sign multipliers applied to aerodynamic panel forces before
/// transfer, reconciling the aerodynamic solver's reference frame with the
/// structural convention. Declared configuration, not inferred at runtime.
#[derive(Debug, Clone, Copy)]
pub struct AxisSigns(pub [f64; 3]);

impl Default for AxisSigns {
    fn default() -> Self {
        AxisSigns([1., 1., 1.])
    }
}

impl AxisSigns {
    fn apply(&self, forces: &mut Mat<f64>) {
        forces.col_iter_mut().for_each(|mut col| {
            (0..3).for_each(|axis| col[axis] *= self.0[axis]);
        });
    }
}

pub struct CouplingParameters {
    pub tolerance: f64,        // Absolute max-norm displacement-change tolerance
    pub max_iter: usize,       // Iteration safety bound
    pub force_signs: AxisSigns,
    pub mirror_span: bool,     // Mirror half-span aero mesh before each solve
}

impl Default for CouplingParameters {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iter: 50,
            force_signs: AxisSigns::default(),
            mirror_span: false,
        }
    }
}

//------------------------------------------------------------------------------
// Coupling state
//------------------------------------------------------------------------------

/// The fixed-point iteration's mutable working set. Created fresh at the
/// start of each physical instant and dropped once convergence is reached;
/// no simulation state lives outside this value.
pub struct CouplingState {
    pub displaced: PanelMesh,        // Aero mesh deformed by the latest displacement
    pub displacement: Col<f64>,      // Latest structural solve output
    pub displacement_prev: Col<f64>, // Previous iterate, for convergence comparison
    pub panel_forces: Mat<f64>,      // Latest sign-corrected panel forces
    pub distributed_force: Mat<f64>, // Latest distributed structural force field
    pub iterations: usize,
}

impl CouplingState {
    pub fn new(baseline: &PanelMesh, n_dofs: usize, n_panels: usize, n_nodes: usize) -> Self {
        Self {
            displaced: baseline.clone(),
            displacement: Col::zeros(n_dofs),
            displacement_prev: Col::zeros(n_dofs),
            panel_forces: Mat::zeros(3, n_panels),
            distributed_force: Mat::zeros(3, n_nodes),
            iterations: 0,
        }
    }
}

/// Converged output of one physical instant.
pub struct ConvergedInstant {
    pub displacement: Col<f64>,      // Structural displacement vector
    pub distributed_force: Mat<f64>, // Force density on the structural mesh (N/m^2)
    pub nodal_force: Mat<f64>,       // Lumped nodal forces for reporting (N)
    pub iterations: usize,
    pub delta: f64,                  // Final displacement change
    pub delta_history: Vec<f64>,     // Displacement change per iteration
}

//------------------------------------------------------------------------------
// Fixed-point coupler
//------------------------------------------------------------------------------

/// Drives the alternating aerodynamic/structural solve to a converged
/// displacement/force pair for a single physical instant. The aerodynamic
/// force is always computed on the mesh deformed by the previous iterate's
/// displacement; convergence is judged on the structural dofs only.
pub struct FixedPointCoupler<A, S> {
    pub aero: A,
    pub structure: S,
    maps: CouplingMaps,
    baseline: PanelMesh,
    pub params: CouplingParameters,
}

impl<A: AeroSolver, S: StructuralSolver> FixedPointCoupler<A, S> {
    pub fn new(
        aero: A,
        structure: S,
        maps: CouplingMaps,
        baseline: PanelMesh,
        params: CouplingParameters,
    ) -> Result<Self, CouplingError> {
        // The transfer operator and the structural solver must agree on the
        // dof count; later resizes are impossible by construction.
        if structure.n_dofs() != 3 * maps.n_struct_nodes() {
            return Err(CouplingError::MeshMismatch {
                what: "structural dofs vs transfer operator",
                expected: 3 * maps.n_struct_nodes(),
                found: structure.n_dofs(),
            });
        }
        if baseline.n_panels() != maps.n_panels() {
            return Err(CouplingError::MeshMismatch {
                what: "aero panels vs transfer operator",
                expected: maps.n_panels(),
                found: baseline.n_panels(),
            });
        }
        Ok(Self {
            aero,
            structure,
            maps,
            baseline,
            params,
        })
    }

    pub fn n_dofs(&self) -> usize {
        self.structure.n_dofs()
    }

    pub fn create_state(&self) -> CouplingState {
        CouplingState::new(
            &self.baseline,
            self.structure.n_dofs(),
            self.maps.n_panels(),
            self.maps.n_struct_nodes(),
        )
    }

    /// One pass of the fixed-point loop: aero solve on the current displaced
    /// mesh, sign correction, force transfer, structural solve, displacement
    /// transfer back onto the baseline aero mesh. Returns the max-norm change
    /// of the structural displacement against the previous iterate.
    pub fn iterate(
        &mut self,
        state: &mut CouplingState,
        flow: &FlowState,
        step: Option<&MidpointStep>,
    ) -> Result<f64, CouplingError> {
        // Aerodynamic solve, on the mirrored full span when configured
        let mut panel_forces = if self.params.mirror_span {
            let full_mesh = state.displaced.mirror_span();
            let full_forces = self.aero.panel_forces(&full_mesh, flow)?;
            state.displaced.starboard_panel_forces(full_forces.as_ref())?
        } else {
            self.aero.panel_forces(&state.displaced, flow)?
        };

        if panel_forces.nrows() != 3 || panel_forces.ncols() != self.maps.n_panels() {
            return Err(CouplingError::MeshMismatch {
                what: "aero solver output",
                expected: self.maps.n_panels(),
                found: panel_forces.ncols(),
            });
        }
        if !panel_forces.col_iter().all(|c| all_finite(c)) {
            return Err(CouplingError::SolverFailure {
                solver: "aero",
                reason: "non-finite panel force".into(),
            });
        }

        // Reference-frame sign correction
        self.params.force_signs.apply(&mut panel_forces);

        let total = (0..3)
            .map(|axis| panel_forces.row(axis).iter().sum::<f64>())
            .collect_vec();
        debug!(
            "total aero force [{:.4e}, {:.4e}, {:.4e}]",
            total[0], total[1], total[2]
        );

        // Force transfer and structural solve
        let distributed = self.maps.transfer_force(panel_forces.as_ref())?;
        let u = self.structure.solve(distributed.as_ref(), step)?;
        if !all_finite(u.as_ref()) {
            return Err(CouplingError::SolverFailure {
                solver: "structural",
                reason: "non-finite displacement".into(),
            });
        }

        // Displacement transfer: new displaced aero mesh from the baseline
        let aero_disp = self.maps.transfer_displacement(u.as_ref())?;
        state.displaced = self.baseline.displaced_by(aero_disp.as_ref())?;

        // Convergence is measured on the raw solver output
        let delta = max_abs_diff(u.as_ref(), state.displacement.as_ref());
        state.displacement_prev = std::mem::replace(&mut state.displacement, u);
        state.panel_forces = panel_forces;
        state.distributed_force = distributed;
        state.iterations += 1;

        Ok(delta)
    }

    /// Iterate to convergence for one physical instant. On convergence the
    /// panel forces are additionally lumped to a nodal field for reporting;
    /// exceeding the iteration bound is a reported failure, never a silent
    /// exit.
    pub fn solve_instant(
        &mut self,
        flow: &FlowState,
        step: Option<&MidpointStep>,
    ) -> Result<ConvergedInstant, CouplingError> {
        let mut state = self.create_state();
        let mut delta_history = Vec::with_capacity(self.params.max_iter);

        while state.iterations < self.params.max_iter {
            let delta = self.iterate(&mut state, flow, step)?;
            delta_history.push(delta);
            debug!("iteration {}: delta = {:.6e}", state.iterations, delta);

            if delta <= self.params.tolerance {
                let nodal_force = self
                    .maps
                    .transfer_nodal_force(state.panel_forces.as_ref())?;
                info!(
                    "converged in {} iterations (delta {:.3e})",
                    state.iterations, delta
                );
                return Ok(ConvergedInstant {
                    displacement: state.displacement,
                    distributed_force: state.distributed_force,
                    nodal_force,
                    iterations: state.iterations,
                    delta,
                    delta_history,
                });
            }
        }

        Err(CouplingError::NotConverged {
            iterations: self.params.max_iter,
            last_delta: delta_history.last().copied().unwrap_or(f64::INFINITY),
        })
    }
}

//------------------------------------------------------------------------------
// Tests
//------------------------------------------------------------------------------
