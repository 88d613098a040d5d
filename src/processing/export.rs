//! Per-cell output of a packed result vector.

use std::io;
use std::path::Path;

use nalgebra::DVector;
use thiserror::Error;

use crate::discretization::mesh::MeshTopology;
use crate::physics::assembler::AssemblyError;
use crate::physics::quantity::QuantityId;
use crate::physics::state::{MappingIndex, SimulationState};
use crate::processing::csv_writer::write_csv;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// Per-cell values of `quantity` read from `result` through the mapping in
/// `state`. Boundary cells show their prescribed value and disabled cells `NaN`.
pub fn field_from_result(
    result: &DVector<f64>,
    state: &SimulationState,
    quantity: QuantityId,
) -> Result<Vec<f64>, AssemblyError> {
    let q = state
        .quantity(quantity)
        .ok_or(AssemblyError::UnknownQuantity(quantity))?;
    q.mapping
        .iter()
        .zip(&q.boundary)
        .map(|(m, bv)| match (m, bv) {
            (MappingIndex::Free(i), _) => result.get(*i).copied().ok_or(AssemblyError::DimensionMismatch {
                expected: i + 1,
                found: result.len(),
            }),
            (MappingIndex::DirichletBoundary, Some(v)) => Ok(*v),
            _ => Ok(f64::NAN),
        })
        .collect()
}

/// Cell centroids plus one column per quantity, headed `x,y,z,q0,q1,...`.
pub fn export_csv<P, M>(
    path: P,
    result: &DVector<f64>,
    mesh: &M,
    state: &SimulationState,
    quantity_ids: &[QuantityId],
) -> Result<(), ExportError>
where
    P: AsRef<Path>,
    M: MeshTopology + ?Sized,
{
    let names: Vec<String> = quantity_ids.iter().map(|q| q.to_string()).collect();
    let named: Vec<(QuantityId, &str)> = quantity_ids
        .iter()
        .copied()
        .zip(names.iter().map(String::as_str))
        .collect();
    export_csv_named(path, result, mesh, state, &named)
}

/// [`export_csv`] with caller-chosen column names.
pub fn export_csv_named<P, M>(
    path: P,
    result: &DVector<f64>,
    mesh: &M,
    state: &SimulationState,
    quantities: &[(QuantityId, &str)],
) -> Result<(), ExportError>
where
    P: AsRef<Path>,
    M: MeshTopology + ?Sized,
{
    if state.num_cells() != mesh.num_cells() {
        return Err(AssemblyError::DimensionMismatch {
            expected: mesh.num_cells(),
            found: state.num_cells(),
        }
        .into());
    }
    let centroids: Vec<_> = (0..mesh.num_cells()).map(|c| mesh.cell_centroid(c)).collect();
    let mut headers = vec!["x", "y", "z"];
    let mut columns = vec![
        centroids.iter().map(|c| c.x).collect::<Vec<_>>(),
        centroids.iter().map(|c| c.y).collect(),
        centroids.iter().map(|c| c.z).collect(),
    ];
    for (id, name) in quantities {
        headers.push(*name);
        columns.push(field_from_result(result, state, *id)?);
    }
    write_csv(path, &headers, &columns)?;
    Ok(())
}

/// Update norms per outer iteration, one column per PDE.
pub fn write_history<P: AsRef<Path>>(
    path: P,
    update_norms: &[Vec<f64>],
    names: &[&str],
) -> io::Result<()> {
    let mut headers = vec!["iter"];
    headers.extend_from_slice(names);
    let mut columns = vec![(1..=update_norms.len()).map(|i| i as f64).collect::<Vec<_>>()];
    for pde in 0..names.len() {
        columns.push(
            update_norms
                .iter()
                .map(|norms| norms.get(pde).copied().unwrap_or(f64::NAN))
                .collect(),
        );
    }
    write_csv(path, &headers, &columns)
}
