//! Static aerostructural solve of a half-span wing plate: the aerodynamic
//! mesh is mirrored to the full span for each panel solve, the starboard
//! forces are transferred to the structural mesh, and the converged fields
//! are exported for visualization.

use std::fs;

use itertools::Itertools;
use wingfsi::{
    aero::PanelForceModel,
    coupler::{AxisSigns, CouplingParameters, FixedPointCoupler},
    flow::FlowCondition,
    mesh::PanelMesh,
    structural::cantilever_plate,
    transfer::CouplingMaps,
    util::col_as_mat_ref,
    vtk::{panel_mesh_as_vtk, structural_fields_as_vtk},
};

const OUT_DIR: &str = "output/static-aeroelastic";

fn main() {
    env_logger::init();
    fs::create_dir_all(OUT_DIR).unwrap();

    // Half-span wing plate: root at y = 0, tip at y = 5.2
    let span = 5.2;
    let chord = 1.2;
    let n_stations = 21;

    let plate = cantilever_plate(span, chord, n_stations, 68e9, 0.05, 2710.).unwrap();

    // Matching panel grid over the same planform
    let panel_points = (0..n_stations)
        .flat_map(|j| {
            let y = span * j as f64 / (n_stations - 1) as f64;
            [[0., y, 0.], [chord, y, 0.]]
        })
        .collect_vec();
    let panel_mesh = PanelMesh::new(&panel_points, 2, n_stations).unwrap();

    let maps = CouplingMaps::new(&plate.mesh, &panel_mesh).unwrap();

    let mut coupler = FixedPointCoupler::new(
        PanelForceModel::new(2. * std::f64::consts::PI, 0.01),
        plate.solver,
        maps,
        panel_mesh.clone(),
        CouplingParameters {
            tolerance: 1e-6,
            max_iter: 50,
            force_signs: AxisSigns([1., 1., 1.]),
            mirror_span: true,
        },
    )
    .unwrap();

    let flow = FlowCondition {
        v_inf: 50.,
        aoa_deg: 6.,
        density: 1.225,
        gust: None,
    };

    let instant = coupler.solve_instant(&flow.sample(0.), None).unwrap();

    let n_nodes = plate.mesh.n_nodes();
    let u = col_as_mat_ref(instant.displacement.as_ref(), 3, n_nodes);
    let tip = (0..n_nodes)
        .map(|n| u[(2, n)])
        .fold(f64::MIN, f64::max);
    println!("converged in {} iterations", instant.iterations);
    println!("tip deflection: {:.6} m", tip);

    // Export converged fields
    structural_fields_as_vtk(
        &plate.mesh,
        u,
        Some(instant.distributed_force.as_ref()),
        Some(instant.nodal_force.as_ref()),
    )
    .export_ascii(format!("{OUT_DIR}/wing_static.vtk"))
    .unwrap();

    panel_mesh_as_vtk(&panel_mesh, None)
        .export_ascii(format!("{OUT_DIR}/panel_mesh.vtk"))
        .unwrap();
}
