use faer::MatRef;
use itertools::Itertools;
use vtkio::model::*;

use crate::mesh::{PanelMesh, StructuralMesh};

/// Structural mesh with converged fields as an unstructured grid: points are
/// displaced by the displacement field, which is also attached as point data
/// together with the optional distributed and nodal force fields.
pub fn structural_fields_as_vtk(
    mesh: &StructuralMesh,
    displacement: MatRef<f64>,
    distributed_force: Option<MatRef<f64>>,
    nodal_force: Option<MatRef<f64>>,
) -> Vtk {
    let n_nodes = mesh.n_nodes();

    let mut point_data = vec![vector_attribute("Displacement", displacement)];
    if let Some(f) = distributed_force {
        point_data.push(vector_attribute("DistributedForce", f));
    }
    if let Some(f) = nodal_force {
        point_data.push(vector_attribute("NodalForce", f));
    }

    let mut offsets = Vec::with_capacity(mesh.cells.len());
    let mut offset = 0u64;
    mesh.cells.iter().for_each(|cell| {
        offset += cell.len() as u64;
        offsets.push(offset);
    });

    Vtk {
        version: Version { major: 4, minor: 2 },
        title: String::new(),
        byte_order: ByteOrder::LittleEndian,
        file_path: None,
        data: DataSet::inline(UnstructuredGridPiece {
            points: IOBuffer::F64(
                (0..n_nodes)
                    .flat_map(|j| {
                        (0..3).map(move |i| mesh.coords[(i, j)] + displacement[(i, j)])
                    })
                    .collect_vec(),
            ),
            cells: Cells {
                cell_verts: VertexNumbers::XML {
                    connectivity: mesh
                        .cells
                        .iter()
                        .flat_map(|cell| cell.iter().map(|&id| id as u64))
                        .collect_vec(),
                    offsets,
                },
                types: mesh
                    .cells
                    .iter()
                    .map(|cell| match cell.len() {
                        3 => CellType::Triangle,
                        _ => CellType::Quad,
                    })
                    .collect_vec(),
            },
            data: Attributes {
                point: point_data,
                ..Default::default()
            },
        }),
    }
}

/// Panel mesh as a quad grid with the panel forces attached as cell data.
pub fn panel_mesh_as_vtk(mesh: &PanelMesh, panel_forces: Option<MatRef<f64>>) -> Vtk {
    let n_panel_chord = mesh.n_chord - 1;
    let n_panels = mesh.n_panels();

    let connectivity = (0..mesh.n_span - 1)
        .flat_map(|j| {
            (0..n_panel_chord).flat_map(move |i| [(i, j, 0, 0), (i, j, 1, 0), (i, j, 1, 1), (i, j, 0, 1)])
        })
        .map(|(i, j, di, dj)| mesh.point_index(i + di, j + dj) as u64)
        .collect_vec();

    Vtk {
        version: Version { major: 4, minor: 2 },
        title: String::new(),
        byte_order: ByteOrder::LittleEndian,
        file_path: None,
        data: DataSet::inline(UnstructuredGridPiece {
            points: IOBuffer::F64(
                (0..mesh.n_points())
                    .flat_map(|j| (0..3).map(move |i| mesh.coords[(i, j)]))
                    .collect_vec(),
            ),
            cells: Cells {
                cell_verts: VertexNumbers::XML {
                    connectivity,
                    offsets: (1..n_panels + 1).map(|i| 4 * i as u64).collect_vec(),
                },
                types: vec![CellType::Quad; n_panels],
            },
            data: Attributes {
                cell: panel_forces
                    .map(|f| vec![vector_attribute("Force", f)])
                    .unwrap_or_default(),
                ..Default::default()
            },
        }),
    }
}

fn vector_attribute(name: &str, field: MatRef<f64>) -> Attribute {
    Attribute::DataArray(DataArrayBase {
        name: name.to_string(),
        elem: ElementType::Vectors,
        data: IOBuffer::F32(
            field
                .col_iter()
                .flat_map(|c| c.iter().map(|&v| v as f32).collect_vec())
                .collect_vec(),
        ),
    })
}
