use faer::Mat;
use itertools::izip;

use crate::error::CouplingError;
use crate::flow::FlowState;
use crate::mesh::PanelMesh;
use crate::solvers::AeroSolver;
use crate::util::{cross_product, vec_norm};

//------------------------------------------------------------------------------
// Panel force stand-ins
//------------------------------------------------------------------------------

/// Quasi-steady panel force model: dynamic pressure times panel area times
/// lift/drag coefficients from a linear lift slope. A deliberately simple
/// stand-in for a vortex-lattice solver, sharing its call contract: deformed
/// panel mesh in, per-panel force vectors out.
pub struct PanelForceModel {
    pub cl_alpha: f64, // Lift slope (1/rad)
    pub cd0: f64,      // Parasitic drag coefficient
}

impl PanelForceModel {
    pub fn new(cl_alpha: f64, cd0: f64) -> Self {
        Self { cl_alpha, cd0 }
    }
}

impl AeroSolver for PanelForceModel {
    fn panel_forces(&self, mesh: &PanelMesh, flow: &FlowState) -> Result<Mat<f64>, CouplingError> {
        let areas = mesh.panel_areas();
        let mut forces = Mat::zeros(3, mesh.n_panels());

        let v = flow.velocity;
        let speed = vec_norm(&v);
        if speed < f64::EPSILON {
            return Ok(forces);
        }

        // Flow angle in the x-z plane
        let alpha = v[2].atan2(v[0]);
        let cl = self.cl_alpha * alpha;

        // Drag along the flow, lift perpendicular to it in the x-z plane
        let drag_dir = [v[0] / speed, v[1] / speed, v[2] / speed];
        let lift_raw = cross_product(&drag_dir, &[0., 1., 0.]);
        let m = vec_norm(&lift_raw);
        let lift_dir = [lift_raw[0] / m, lift_raw[1] / m, lift_raw[2] / m];

        let q = 0.5 * flow.density * speed * speed;
        izip!(forces.col_iter_mut(), areas.iter()).for_each(|(mut f, &area)| {
            (0..3).for_each(|axis| {
                f[axis] = q * area * (cl * lift_dir[axis] + self.cd0 * drag_dir[axis]);
            });
        });

        Ok(forces)
    }
}

/// Constant surface traction applied to every panel regardless of flow:
/// per-panel force is `traction * area`. Used for analytic benchmarks.
pub struct UniformPanelLoad {
    pub traction: [f64; 3], // Surface traction (N/m^2)
}

impl AeroSolver for UniformPanelLoad {
    fn panel_forces(&self, mesh: &PanelMesh, _flow: &FlowState) -> Result<Mat<f64>, CouplingError> {
        let areas = mesh.panel_areas();
        Ok(Mat::from_fn(3, mesh.n_panels(), |axis, p| {
            self.traction[axis] * areas[p]
        }))
    }
}

/// Vertical panel load with linear feedback on the panel center deflection:
/// `f_z = (base - gain * z_center) * area`. A positive gain makes the
/// aero/structure exchange a contraction mapping; a negative gain makes it
/// divergent. Used by the fixed-point property tests.
pub struct DisplacementFeedbackLoad {
    pub base: f64, // Baseline vertical traction (N/m^2)
    pub gain: f64, // Feedback coefficient (N/m^3)
}

impl AeroSolver for DisplacementFeedbackLoad {
    fn panel_forces(&self, mesh: &PanelMesh, _flow: &FlowState) -> Result<Mat<f64>, CouplingError> {
        let centers = mesh.panel_centers();
        let areas = mesh.panel_areas();
        let mut forces = Mat::zeros(3, mesh.n_panels());
        izip!(forces.col_iter_mut(), centers.col_iter(), areas.iter()).for_each(
            |(mut f, c, &area)| {
                f[2] = (self.base - self.gain * c[2]) * area;
            },
        );
        Ok(forces)
    }
}

//------------------------------------------------------------------------------
// Tests
//------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use itertools::Itertools;

    fn flat_grid(n_chord: usize, n_span: usize, chord: f64, span: f64) -> PanelMesh {
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
    fn test_zero_flow_gives_zero_forces() {
        let mesh = flat_grid(3, 4, 1., 3.);
        let model = PanelForceModel::new(2. * std::f64::consts::PI, 0.01);
        let flow = FlowState {
            velocity: [0., 0., 0.],
            density: 1.225,
        };
        let forces = model.panel_forces(&mesh, &flow).unwrap();
        forces.col_iter().for_each(|f| {
            assert_relative_eq!(f[0], 0., epsilon = 1e-15);
            assert_relative_eq!(f[2], 0., epsilon = 1e-15);
        });
    }

    #[test]
    fn test_lift_scales_with_flow_angle() {
        let mesh = flat_grid(2, 2, 1., 1.);
        let model = PanelForceModel::new(2. * std::f64::consts::PI, 0.);
        let alpha = 0.05_f64;
        let speed = 10.;
        let flow = FlowState {
            velocity: [speed * alpha.cos(), 0., speed * alpha.sin()],
            density: 1.225,
        };

        let forces = model.panel_forces(&mesh, &flow).unwrap();
        let q = 0.5 * 1.225 * speed * speed;
        let cl = 2. * std::f64::consts::PI * alpha;
        // Lift is perpendicular to the flow, dominated by +z at small angles
        let f = forces.col(0);
        let lift = (f[0] * f[0] + f[2] * f[2]).sqrt();
        assert_relative_eq!(lift, q * cl, epsilon = 1e-9);
        assert!(f[2] > 0.);
        // Perpendicularity to the flow direction
        assert_relative_eq!(
            f[0] * flow.velocity[0] + f[2] * flow.velocity[2],
            0.,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_uniform_load_total_force() {
        let mesh = flat_grid(3, 5, 2., 4.);
        let model = UniformPanelLoad {
            traction: [0., 0., 120.],
        };
        let flow = FlowState {
            velocity: [0., 0., 0.],
            density: 1.225,
        };
        let forces = model.panel_forces(&mesh, &flow).unwrap();
        let total: f64 = (0..mesh.n_panels()).map(|p| forces[(2, p)]).sum();
        assert_relative_eq!(total, 120. * 8., epsilon = 1e-9);
    }

    #[test]
    fn test_feedback_load_restores_toward_baseline() {
        let mesh = flat_grid(2, 3, 1., 2.);
        let model = DisplacementFeedbackLoad {
            base: 100.,
            gain: 50.,
        };
        let flow = FlowState {
            velocity: [0., 0., 0.],
            density: 1.225,
        };

        // Undeflected mesh carries the baseline load
        let f0 = model.panel_forces(&mesh, &flow).unwrap();

        // Deflect all corner points up by 0.1: load must drop by gain * 0.1
        let disp = Mat::from_fn(3, mesh.n_points(), |i, _| if i == 2 { 0.1 } else { 0. });
        let deflected = mesh.displaced_by(disp.as_ref()).unwrap();
        let f1 = model.panel_forces(&deflected, &flow).unwrap();

        let areas = mesh.panel_areas();
        (0..mesh.n_panels()).for_each(|p| {
            assert_relative_eq!(
                f0[(2, p)] - f1[(2, p)],
                50. * 0.1 * areas[p],
                epsilon = 1e-10
            );
        });
    }
}
