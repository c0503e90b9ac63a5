use faer::linalg::solvers::PartialPivLu;
use faer::prelude::*;
use itertools::Itertools;

use crate::error::CouplingError;
use crate::mesh::StructuralMesh;
use crate::solvers::{MidpointStep, StructuralSolver};

//------------------------------------------------------------------------------
// Dense linear structural solver
//------------------------------------------------------------------------------

/// Linear structural stand-in over 3 translational dofs per node (dof
/// ordering `3 * node + axis`). Clamped dofs are eliminated by identity
/// rows at construction. The static solve is `K u = f`; the dynamic solve
/// evaluates the residual at the implicit-midpoint state,
/// `M a_mid + K u_mid = f`, which reduces to
/// `(2M/h^2 + K/2) u1 = f + M (2 u0 / h^2 + 2 v0 / h) - K u0 / 2`.
pub struct LinearStructure {
    k: Mat<f64>,      // Clamped stiffness `[n_dofs][n_dofs]`
    m_diag: Col<f64>, // Lumped mass diagonal (zero for static-only models)
    clamped: Vec<bool>,
    nodal_area: Col<f64>,
    static_lu: PartialPivLu<f64>,
    dynamic_lu: Option<(f64, PartialPivLu<f64>)>, // Cached per step size
}

impl LinearStructure {
    pub fn new(
        mut k: Mat<f64>,
        m_diag: Col<f64>,
        clamped: Vec<bool>,
        nodal_area: Col<f64>,
    ) -> Result<Self, CouplingError> {
        let n_dofs = 3 * nodal_area.nrows();
        if k.nrows() != n_dofs || k.ncols() != n_dofs {
            return Err(CouplingError::MeshMismatch {
                what: "stiffness matrix",
                expected: n_dofs,
                found: k.nrows(),
            });
        }
        if m_diag.nrows() != n_dofs || clamped.len() != n_dofs {
            return Err(CouplingError::MeshMismatch {
                what: "mass/clamp arrays",
                expected: n_dofs,
                found: m_diag.nrows(),
            });
        }

        apply_clamp(&mut k, &clamped);
        let static_lu = k.partial_piv_lu();

        Ok(Self {
            k,
            m_diag,
            clamped,
            nodal_area,
            static_lu,
            dynamic_lu: None,
        })
    }

    /// Convert a distributed force field (`[3][n_nodes]`, N/m^2) to the
    /// nodal load vector by lumped integration over tributary areas.
    fn nodal_load_vector(&self, distributed: MatRef<f64>) -> Result<Col<f64>, CouplingError> {
        let n_nodes = self.nodal_area.nrows();
        if distributed.nrows() != 3 || distributed.ncols() != n_nodes {
            return Err(CouplingError::MeshMismatch {
                what: "distributed force field",
                expected: n_nodes,
                found: distributed.ncols(),
            });
        }
        let mut f = Col::from_fn(3 * n_nodes, |dof| {
            distributed[(dof % 3, dof / 3)] * self.nodal_area[dof / 3]
        });
        self.clamped
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .for_each(|(dof, _)| f[dof] = 0.);
        Ok(f)
    }

    fn dynamic_matrix(&self, h: f64) -> Mat<f64> {
        let n = self.k.nrows();
        let mut a = Mat::from_fn(n, n, |i, j| {
            0.5 * self.k[(i, j)] + if i == j { 2. * self.m_diag[i] / (h * h) } else { 0. }
        });
        apply_clamp(&mut a, &self.clamped);
        a
    }

    /// Compliance `u . f` of a displacement against a nodal force field.
    pub fn compliance(&self, u: ColRef<f64>, nodal_force: MatRef<f64>) -> f64 {
        (0..u.nrows())
            .map(|dof| u[dof] * nodal_force[(dof % 3, dof / 3)])
            .sum()
    }

    /// Elastic strain energy `u . K u / 2` stored in a displacement state.
    pub fn strain_energy(&self, u: ColRef<f64>) -> f64 {
        let ku = self.k.as_ref() * u;
        0.5 * (0..u.nrows()).map(|dof| u[dof] * ku[dof]).sum::<f64>()
    }

    /// Shell volume from a per-node thickness field.
    pub fn volume(&self, thickness: ColRef<f64>) -> f64 {
        (0..self.nodal_area.nrows())
            .map(|n| thickness[n] * self.nodal_area[n])
            .sum()
    }

    /// Shell mass from a per-node thickness field and material density.
    pub fn mass(&self, thickness: ColRef<f64>, density: f64) -> f64 {
        density * self.volume(thickness)
    }
}

impl StructuralSolver for LinearStructure {
    fn n_dofs(&self) -> usize {
        self.k.nrows()
    }

    fn solve(
        &mut self,
        distributed_force: MatRef<f64>,
        step: Option<&MidpointStep>,
    ) -> Result<Col<f64>, CouplingError> {
        let f = self.nodal_load_vector(distributed_force)?;

        let Some(step) = step else {
            return Ok(self.static_lu.solve(&f));
        };

        let n_dofs = self.n_dofs();
        if step.u_prev.nrows() != n_dofs || step.v_prev.nrows() != n_dofs {
            return Err(CouplingError::MeshMismatch {
                what: "previous-step state vectors",
                expected: n_dofs,
                found: step.u_prev.nrows(),
            });
        }
        if !(step.h > 0.) {
            return Err(CouplingError::SolverFailure {
                solver: "structural",
                reason: format!("non-positive time step {}", step.h),
            });
        }

        // Factor the midpoint system once per step size
        let reuse = matches!(&self.dynamic_lu, Some((h, _)) if *h == step.h);
        if !reuse {
            self.dynamic_lu = Some((step.h, self.dynamic_matrix(step.h).partial_piv_lu()));
        }
        let (_, lu) = self.dynamic_lu.as_ref().unwrap();

        // Right-hand side: f + M (2 u0 / h^2 + 2 v0 / h) - K u0 / 2
        let ku0 = self.k.as_ref() * step.u_prev;
        let h = step.h;
        let mut rhs = Col::from_fn(n_dofs, |i| {
            f[i] + self.m_diag[i] * (2. * step.u_prev[i] / (h * h) + 2. * step.v_prev[i] / h)
                - 0.5 * ku0[i]
        });
        self.clamped
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .for_each(|(dof, _)| rhs[dof] = 0.);

        Ok(lu.solve(&rhs))
    }
}

fn apply_clamp(k: &mut Mat<f64>, clamped: &[bool]) {
    let n = k.nrows();
    clamped
        .iter()
        .enumerate()
        .filter(|(_, &c)| c)
        .for_each(|(dof, _)| {
            (0..n).for_each(|j| {
                k[(dof, j)] = 0.;
                k[(j, dof)] = 0.;
            });
            k[(dof, dof)] = 1.;
        });
}

//------------------------------------------------------------------------------
// Cantilever plate model
//------------------------------------------------------------------------------

pub struct CantileverPlate {
    pub mesh: StructuralMesh,
    pub solver: LinearStructure,
}

/// Build a cantilevered flat-plate model: a strip of quads spanning the
/// y-axis, clamped at the root (y = 0), with out-of-plane bending stiffness
/// from Euler-Bernoulli beam theory (`EI = E w t^3 / 12`, shared between the
/// two chordwise node lines). In-plane dofs are held fixed. Mass is lumped
/// from `material_density * thickness * tributary area`.
pub fn cantilever_plate(
    length: f64,
    width: f64,
    n_stations: usize,
    elastic_modulus: f64,
    thickness: f64,
    material_density: f64,
) -> Result<CantileverPlate, CouplingError> {
    if n_stations < 3 {
        return Err(CouplingError::InvalidMesh(format!(
            "cantilever plate needs at least 3 spanwise stations, got {}",
            n_stations
        )));
    }

    // Strip mesh: node (i, j) at column i + 2 * j
    let points = (0..n_stations)
        .flat_map(|j| {
            let y = length * j as f64 / (n_stations - 1) as f64;
            [[0., y, 0.], [width, y, 0.]]
        })
        .collect_vec();
    let cells = (0..n_stations - 1)
        .map(|j| vec![2 * j, 2 * j + 1, 2 * j + 3, 2 * j + 2])
        .collect_vec();
    let mesh = StructuralMesh::new(&points, cells)?;
    let nodal_area = mesh.nodal_areas();

    // Bending stiffness on the free-station z dofs, one beam per chord line
    let ei_half = elastic_modulus * (width / 2.) * thickness.powi(3) / 12.;
    let k_z = condensed_bending_stiffness(length, n_stations, ei_half);

    let n_nodes = mesh.n_nodes();
    let mut k = Mat::zeros(3 * n_nodes, 3 * n_nodes);
    for line in 0..2 {
        for a in 0..n_stations - 1 {
            for b in 0..n_stations - 1 {
                let dof_a = 3 * (line + 2 * (a + 1)) + 2;
                let dof_b = 3 * (line + 2 * (b + 1)) + 2;
                k[(dof_a, dof_b)] += k_z[(a, b)];
            }
        }
    }

    // Clamp in-plane dofs everywhere and all dofs at the root station
    let clamped = (0..3 * n_nodes)
        .map(|dof| dof % 3 != 2 || dof / 3 < 2)
        .collect_vec();

    let m_diag = Col::from_fn(3 * n_nodes, |dof| {
        if clamped[dof] {
            0.
        } else {
            material_density * thickness * nodal_area[dof / 3]
        }
    });

    let solver = LinearStructure::new(k, m_diag, clamped, nodal_area)?;
    Ok(CantileverPlate { mesh, solver })
}

/// Stiffness of a clamped-free Euler-Bernoulli beam condensed onto its free
/// deflection dofs: assemble the Hermite beam matrix, clamp the root, invert
/// the free block, and invert the deflection rows of the flexibility back
/// into a stiffness. Exact at the nodes for point loading.
fn condensed_bending_stiffness(length: f64, n_stations: usize, ei: f64) -> Mat<f64> {
    let n_elem = n_stations - 1;
    let le = length / n_elem as f64;

    // Hermite beam element stiffness on (w1, t1, w2, t2)
    let c = ei / le.powi(3);
    let ke = mat![
        [12. * c, 6. * le * c, -12. * c, 6. * le * c],
        [6. * le * c, 4. * le * le * c, -6. * le * c, 2. * le * le * c],
        [-12. * c, -6. * le * c, 12. * c, -6. * le * c],
        [6. * le * c, 2. * le * le * c, -6. * le * c, 4. * le * le * c],
    ];

    // Assemble the full (w, theta) system
    let n_beam_dofs = 2 * n_stations;
    let mut kb = Mat::<f64>::zeros(n_beam_dofs, n_beam_dofs);
    for e in 0..n_elem {
        for a in 0..4 {
            for b in 0..4 {
                kb[(2 * e + a, 2 * e + b)] += ke[(a, b)];
            }
        }
    }

    // Reduce out the clamped root dofs (w0, theta0)
    let n_free = n_beam_dofs - 2;
    let k_red = Mat::from_fn(n_free, n_free, |i, j| kb[(i + 2, j + 2)]);

    // Flexibility of the free dofs
    let flex = k_red.partial_piv_lu().solve(Mat::<f64>::identity(n_free, n_free));

    // Deflection block of the flexibility, inverted back to a stiffness
    let f_ww = Mat::from_fn(n_elem, n_elem, |a, b| flex[(2 * a, 2 * b)]);
    f_ww.partial_piv_lu()
        .solve(Mat::<f64>::identity(n_elem, n_elem))
}

//------------------------------------------------------------------------------
// Tests
//------------------------------------------------------------------------------
