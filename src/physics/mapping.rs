//! Row/column numbering of free cells.
//!
//! Every call starts from scratch: all cells are first marked
//! `QuantityDisabled`, then visited in mesh order. Boundary cells become
//! `DirichletBoundary`, every other active cell takes the running counter.

use log::debug;

use crate::discretization::mesh::MeshTopology;
use crate::physics::assembler::AssemblyError;
use crate::physics::quantity::QuantityId;
use crate::physics::state::{MappingIndex, SimulationState};
use crate::physics::PdeSystem;

/// Unknowns carried per free cell.
const ARITY: usize = 1;

/// Number `quantity` starting at `offset`; returns the counter after the pass.
pub fn map_quantity<M: MeshTopology + ?Sized>(
    mesh: &M,
    state: &mut SimulationState,
    quantity: QuantityId,
    offset: usize,
) -> Result<usize, AssemblyError> {
    if state.num_cells() != mesh.num_cells() {
        return Err(AssemblyError::DimensionMismatch {
            expected: mesh.num_cells(),
            found: state.num_cells(),
        });
    }
    let q = state
        .quantity_mut(quantity)
        .ok_or(AssemblyError::UnknownQuantity(quantity))?;

    q.mapping.fill(MappingIndex::QuantityDisabled);
    let mut counter = offset;
    for cell in 0..mesh.num_cells() {
        if q.is_boundary(cell) {
            q.mapping[cell] = MappingIndex::DirichletBoundary;
        } else if q.is_active(cell) && q.mapping[cell].free().is_none() {
            q.mapping[cell] = MappingIndex::Free(counter);
            counter += ARITY;
        }
    }
    debug!("mapped {quantity}: {} free cells", counter - offset);
    Ok(counter)
}

/// Joint numbering of every PDE's unknown, the counter carrying over from one
/// PDE to the next. Returns the size of the combined system.
pub fn create_mapping<M: MeshTopology + ?Sized>(
    system: &PdeSystem,
    mesh: &M,
    state: &mut SimulationState,
) -> Result<usize, AssemblyError> {
    let mut counter = 0;
    for pde in system {
        counter = map_quantity(mesh, state, pde.unknown, counter)?;
    }
    Ok(counter)
}

/// Numbering of a single PDE's unknown from zero. Returns the system size.
pub fn map_pde<M: MeshTopology + ?Sized>(
    system: &PdeSystem,
    pde_index: usize,
    mesh: &M,
    state: &mut SimulationState,
) -> Result<usize, AssemblyError> {
    let pde = system.get(pde_index).ok_or(AssemblyError::PdeIndex {
        index: pde_index,
        len: system.len(),
    })?;
    map_quantity(mesh, state, pde.unknown, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::create_line_mesh;
    use crate::physics::QuantityOptions;
    use crate::symbolic::{div, grad, Expr};
    use proptest::prelude::*;

    fn system(ids: &[QuantityId]) -> PdeSystem {
        let mut s = PdeSystem::new();
        for &q in ids {
            s.add(div(grad(Expr::unknown(q))).equals(0.0), q, QuantityOptions::default());
        }
        s
    }

    #[test]
    fn joint_numbering_carries_counter() {
        let mesh = create_line_mesh(1.0, 5, 1.0);
        let (a, b) = (QuantityId(0), QuantityId(1));
        let mut state = SimulationState::for_mesh(&mesh);
        state.add_quantity(a, 0.0).set_boundary(0, 0.0).set_boundary(4, 1.0);
        state.add_quantity(b, 0.0).set_disabled(2, true);

        let sys = system(&[a, b]);
        let total = create_mapping(&sys, &mesh, &mut state).unwrap();
        assert_eq!(total, 3 + 4);

        let qb = state.quantity(b).unwrap();
        let raw: Vec<i64> = qb.mapping.iter().map(|m| m.as_raw()).collect();
        assert_eq!(raw, vec![3, 4, -2, 5, 6]);

        assert_eq!(map_pde(&sys, 1, &mesh, &mut state).unwrap(), 4);
        assert_eq!(state.quantity(b).unwrap().mapping[0], MappingIndex::Free(0));
    }

    #[test]
    fn clearing_a_contact_frees_the_cell_on_remap() {
        let mesh = create_line_mesh(1.0, 4, 1.0);
        let q = QuantityId(0);
        let mut state = SimulationState::for_mesh(&mesh);
        state.add_quantity(q, 0.0).set_boundary(0, 1.0).set_boundary(3, 0.0);
        let sys = system(&[q]);
        assert_eq!(create_mapping(&sys, &mesh, &mut state).unwrap(), 2);

        state.quantity_mut(q).unwrap().clear_boundary(0);
        assert_eq!(create_mapping(&sys, &mesh, &mut state).unwrap(), 3);
        let qs = state.quantity(q).unwrap();
        assert!(!qs.is_boundary(0));
        assert_eq!(qs.mapping[0], MappingIndex::Free(0));
        assert_eq!(qs.mapping[2], MappingIndex::Free(2));
        assert_eq!(qs.mapping[3], MappingIndex::DirichletBoundary);
    }

    #[test]
    fn missing_quantity_and_bad_index_are_reported() {
        let mesh = create_line_mesh(1.0, 3, 1.0);
        let mut state = SimulationState::for_mesh(&mesh);
        let sys = system(&[QuantityId(9)]);
        assert!(matches!(
            create_mapping(&sys, &mesh, &mut state),
            Err(AssemblyError::UnknownQuantity(QuantityId(9)))
        ));
        assert!(matches!(
            map_pde(&sys, 4, &mesh, &mut state),
            Err(AssemblyError::PdeIndex { index: 4, len: 1 })
        ));
    }

    proptest! {
        #[test]
        fn free_indices_are_contiguous_and_stable(
            flags in prop::collection::vec((any::<bool>(), any::<bool>()), 1..40)
        ) {
            let n = flags.len();
            let mesh = create_line_mesh(1.0, n, 1.0);
            let q = QuantityId(0);
            let mut state = SimulationState::for_mesh(&mesh);
            {
                let qs = state.add_quantity(q, 1.0);
                for (cell, &(boundary, disabled)) in flags.iter().enumerate() {
                    if boundary {
                        qs.set_boundary(cell, 0.5);
                    }
                    qs.set_disabled(cell, disabled);
                }
            }
            let sys = system(&[q]);

            let count = create_mapping(&sys, &mesh, &mut state).unwrap();
            let first = state.quantity(q).unwrap().mapping.clone();
            let mut free: Vec<usize> = first.iter().filter_map(|m| m.free()).collect();
            prop_assert_eq!(free.len(), count);
            free.sort_unstable();
            prop_assert_eq!(free, (0..count).collect::<Vec<_>>());

            for (cell, &(boundary, disabled)) in flags.iter().enumerate() {
                let expected = if boundary {
                    Some(MappingIndex::DirichletBoundary)
                } else if disabled {
                    Some(MappingIndex::QuantityDisabled)
                } else {
                    None
                };
                if let Some(e) = expected {
                    prop_assert_eq!(first[cell], e);
                }
            }

            create_mapping(&sys, &mesh, &mut state).unwrap();
            prop_assert_eq!(&state.quantity(q).unwrap().mapping, &first);
        }
    }
}
