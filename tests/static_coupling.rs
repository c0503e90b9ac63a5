use itertools::Itertools;
use wingfsi::{
    aero::{DisplacementFeedbackLoad, PanelForceModel},
    coupler::{CouplingParameters, FixedPointCoupler},
    error::CouplingError,
    flow::{FlowCondition, FlowState},
    mesh::PanelMesh,
    solvers::AeroSolver,
    structural::{cantilever_plate, LinearStructure},
    transfer::CouplingMaps,
};

const LENGTH: f64 = 2.0;
const WIDTH: f64 = 1.0;
const E_MODULUS: f64 = 70e9;
const THICKNESS: f64 = 0.02;

fn plate_panel_mesh(n_stations: usize) -> PanelMesh {
    let points = (0..n_stations)
        .flat_map(|j| {
            let y = LENGTH * j as f64 / (n_stations - 1) as f64;
            [[0., y, 0.], [WIDTH, y, 0.]]
        })
        .collect_vec();
    PanelMesh::new(&points, 2, n_stations).unwrap()
}

fn build_coupler<A: AeroSolver>(
    aero: A,
    n_stations: usize,
    params: CouplingParameters,
) -> FixedPointCoupler<A, LinearStructure> {
    let plate = cantilever_plate(LENGTH, WIDTH, n_stations, E_MODULUS, THICKNESS, 0.).unwrap();
    let panel_mesh = plate_panel_mesh(n_stations);
    let maps = CouplingMaps::new(&plate.mesh, &panel_mesh).unwrap();
    FixedPointCoupler::new(aero, plate.solver, maps, panel_mesh, params).unwrap()
}

fn still_air() -> FlowState {
    FlowCondition {
        v_inf: 0.,
        aoa_deg: 0.,
        density: 1.225,
        gust: None,
    }
    .sample(0.)
}

#[test]
fn test_contraction_delta_sequence_is_non_increasing() {
    let aero = DisplacementFeedbackLoad {
        base: 500.,
        gain: 50.,
    };
    let mut coupler = build_coupler(
        aero,
        9,
        CouplingParameters {
            tolerance: 1e-10,
            max_iter: 30,
            ..Default::default()
        },
    );

    let instant = coupler.solve_instant(&still_air(), None).unwrap();

    assert!(instant.iterations >= 2);
    assert!(instant.delta <= 1e-10);
    instant.delta_history.windows(2).for_each(|w| {
        assert!(
            w[1] <= w[0],
            "delta increased from {:.3e} to {:.3e}",
            w[0],
            w[1]
        );
    });
}

#[test]
fn test_converged_state_is_idempotent() {
    let aero = DisplacementFeedbackLoad {
        base: 800.,
        gain: 20.,
    };
    let tolerance = 1e-9;
    let mut coupler = build_coupler(
        aero,
        9,
        CouplingParameters {
            tolerance,
            max_iter: 40,
            ..Default::default()
        },
    );
    let flow = still_air();

    // Run the loop to convergence by hand, keeping the state alive
    let mut state = coupler.create_state();
    let mut delta = f64::INFINITY;
    while delta > tolerance {
        delta = coupler.iterate(&mut state, &flow, None).unwrap();
    }

    // One more iteration from the converged state stays below the tolerance
    let extra = coupler.iterate(&mut state, &flow, None).unwrap();
    assert!(extra <= tolerance, "extra iteration moved by {:.3e}", extra);
}

#[test]
fn test_zero_flow_gives_zero_displacement() {
    let aero = PanelForceModel::new(2. * std::f64::consts::PI, 0.01);
    let mut coupler = build_coupler(aero, 7, CouplingParameters::default());

    let instant = coupler.solve_instant(&still_air(), None).unwrap();

    assert_eq!(instant.iterations, 1);
    instant.displacement.iter().for_each(|&u| {
        assert!(u.abs() < 1e-14, "nonzero displacement {:.3e}", u);
    });
}

#[test]
fn test_divergent_feedback_reports_non_convergence() {
    // Negative gain amplifies the deflection every pass
    let aero = DisplacementFeedbackLoad {
        base: 500.,
        gain: -5e7,
    };
    let mut coupler = build_coupler(
        aero,
        7,
        CouplingParameters {
            tolerance: 1e-8,
            max_iter: 8,
            ..Default::default()
        },
    );

    match coupler.solve_instant(&still_air(), None) {
        Err(CouplingError::NotConverged {
            iterations,
            last_delta,
        }) => {
            assert_eq!(iterations, 8);
            assert!(last_delta > 1e-8);
        }
        other => panic!("expected NotConverged, got {:?}", other.map(|i| i.iterations)),
    }
}

#[test]
fn test_operator_mismatch_detected_at_construction() {
    // Transfer operator built for a 9-station plate, solver for a 7-station
    let plate_9 = cantilever_plate(LENGTH, WIDTH, 9, E_MODULUS, THICKNESS, 0.).unwrap();
    let plate_7 = cantilever_plate(LENGTH, WIDTH, 7, E_MODULUS, THICKNESS, 0.).unwrap();
    let panel_mesh = plate_panel_mesh(9);
    let maps = CouplingMaps::new(&plate_9.mesh, &panel_mesh).unwrap();

    let result = FixedPointCoupler::new(
        DisplacementFeedbackLoad { base: 1., gain: 0. },
        plate_7.solver,
        maps,
        panel_mesh,
        CouplingParameters::default(),
    );
    assert!(matches!(result, Err(CouplingError::MeshMismatch { .. })));

    // Baseline mesh with a different panel count than the operator
    let maps_9 = CouplingMaps::new(&plate_9.mesh, &plate_panel_mesh(9)).unwrap();
    let result = FixedPointCoupler::new(
        DisplacementFeedbackLoad { base: 1., gain: 0. },
        plate_9.solver,
        maps_9,
        plate_panel_mesh(5),
        CouplingParameters::default(),
    );
    assert!(matches!(result, Err(CouplingError::MeshMismatch { .. })));
}

#[test]
fn test_nodal_force_total_matches_panel_total() {
    let traction = 300.;
    let aero = DisplacementFeedbackLoad {
        base: traction,
        gain: 0.,
    };
    let mut coupler = build_coupler(aero, 9, CouplingParameters::default());

    let instant = coupler.solve_instant(&still_air(), None).unwrap();

    // Totals match up to the small area change of the deformed panels
    let total_z: f64 = (0..instant.nodal_force.ncols())
        .map(|n| instant.nodal_force[(2, n)])
        .sum();
    let expected = traction * LENGTH * WIDTH;
    assert!(
        (total_z - expected).abs() / expected < 1e-4,
        "total nodal force {} vs panel total {}",
        total_z,
        expected
    );
}
