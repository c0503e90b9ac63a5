use faer::{Col, ColRef};
use log::info;

use crate::coupler::{ConvergedInstant, FixedPointCoupler};
use crate::error::CouplingError;
use crate::flow::FlowCondition;
use crate::solvers::{AeroSolver, MidpointStep, StructuralSolver};

//------------------------------------------------------------------------------
// Implicit-midpoint recurrence
//------------------------------------------------------------------------------

/// Midpoint displacement `u_mid = (u0 + u1) / 2`.
pub fn midpoint_displacement(u0: ColRef<f64>, u1: ColRef<f64>) -> Col<f64> {
    Col::from_fn(u0.nrows(), |i| 0.5 * (u0[i] + u1[i]))
}

/// End-of-step velocity `v1 = (2/h) u1 - (2/h) u0 - v0`.
pub fn end_step_velocity(u0: ColRef<f64>, u1: ColRef<f64>, v0: ColRef<f64>, h: f64) -> Col<f64> {
    Col::from_fn(u0.nrows(), |i| 2. / h * u1[i] - 2. / h * u0[i] - v0[i])
}

/// Midpoint acceleration `a_mid = (v1 - v0) / h`.
pub fn midpoint_acceleration(v0: ColRef<f64>, v1: ColRef<f64>, h: f64) -> Col<f64> {
    Col::from_fn(v0.nrows(), |i| (v1[i] - v0[i]) / h)
}

//------------------------------------------------------------------------------
// Time state
//------------------------------------------------------------------------------

/// Structural state carried between time steps: previous-step displacement
/// and velocity. Advanced exactly once per step, after the inner fixed-point
/// loop has converged for that step.
pub struct TimeState {
    pub u: Col<f64>,
    pub v: Col<f64>,
}

impl TimeState {
    pub fn zeros(n_dofs: usize) -> Self {
        Self {
            u: Col::zeros(n_dofs),
            v: Col::zeros(n_dofs),
        }
    }

    pub fn advance(&mut self, u_new: Col<f64>, v_new: Col<f64>) {
        self.u = u_new;
        self.v = v_new;
    }
}

//------------------------------------------------------------------------------
// Time integrator
//------------------------------------------------------------------------------

/// Per-step observation handed to the march sink after the state advance.
pub struct StepRecord<'a> {
    pub step: usize,
    pub time: f64,
    pub instant: &'a ConvergedInstant,
    pub state: &'a TimeState,
}

/// Uniform implicit-midpoint time march: a fixed number of equal steps over a
/// fixed duration, each step solved to convergence by the fixed-point coupler
/// with the residual evaluated at the midpoint state.
pub struct TimeIntegrator {
    pub duration: f64,
    pub n_steps: usize,
}

impl TimeIntegrator {
    pub fn new(duration: f64, n_steps: usize) -> Self {
        Self { duration, n_steps }
    }

    /// Derive the duration from the flow condition's gust schedule
    /// (lead-in + active + settling phases).
    pub fn from_gust_schedule(flow: &FlowCondition, n_steps: usize) -> Result<Self, CouplingError> {
        let gust = flow.gust.as_ref().ok_or_else(|| CouplingError::SolverFailure {
            solver: "time integrator",
            reason: "flow condition has no gust schedule to derive a duration from".into(),
        })?;
        Ok(Self::new(gust.total_duration(), n_steps))
    }

    pub fn step_size(&self) -> f64 {
        self.duration / self.n_steps as f64
    }

    /// March the coupled system through all time steps. The gust velocity is
    /// sampled once per step at the current physical time; the inner loop
    /// sees a frozen value. If any step fails to converge the march halts
    /// and reports the failing step index.
    pub fn march<A, S>(
        &self,
        coupler: &mut FixedPointCoupler<A, S>,
        flow: &FlowCondition,
        mut on_step: impl FnMut(&StepRecord),
    ) -> Result<TimeState, CouplingError>
    where
        A: AeroSolver,
        S: StructuralSolver,
    {
        let h = self.step_size();
        let mut state = TimeState::zeros(coupler.n_dofs());
        let mut t = 0.;

        for step in 0..self.n_steps {
            t += h;
            let flow_state = flow.sample(t);

            let instant = coupler
                .solve_instant(
                    &flow_state,
                    Some(&MidpointStep {
                        u_prev: state.u.as_ref(),
                        v_prev: state.v.as_ref(),
                        h,
                    }),
                )
                .map_err(|e| CouplingError::StepFailed {
                    step,
                    source: Box::new(e),
                })?;

            info!(
                "step {}/{}: t = {:.5}, {} iterations",
                step + 1,
                self.n_steps,
                t,
                instant.iterations
            );

            // Advance the state exactly once, after inner convergence
            let v_new = end_step_velocity(
                state.u.as_ref(),
                instant.displacement.as_ref(),
                state.v.as_ref(),
                h,
            );
            state.advance(instant.displacement.clone(), v_new);

            on_step(&StepRecord {
                step,
                time: t,
                instant: &instant,
                state: &state,
            });
        }

        Ok(state)
    }
}

//------------------------------------------------------------------------------
// Tests
//------------------------------------------------------------------------------
