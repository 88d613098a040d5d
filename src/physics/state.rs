use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::discretization::mesh::MeshTopology;
use crate::physics::quantity::{CellQuantity, CoefficientId, QuantityId};

/// Row/column assignment of a cell for one quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MappingIndex {
    Free(usize),
    DirichletBoundary,
    QuantityDisabled,
}

impl MappingIndex {
    pub const DIRICHLET_BOUNDARY: i64 = -1;
    pub const QUANTITY_DISABLED: i64 = -2;

    /// Signed encoding: non-negative for free cells, negative sentinels otherwise.
    pub fn as_raw(self) -> i64 {
        match self {
            MappingIndex::Free(i) => i as i64,
            MappingIndex::DirichletBoundary => Self::DIRICHLET_BOUNDARY,
            MappingIndex::QuantityDisabled => Self::QUANTITY_DISABLED,
        }
    }

    #[inline]
    pub fn free(self) -> Option<usize> {
        match self {
            MappingIndex::Free(i) => Some(i),
            _ => None,
        }
    }
}

/// Per-cell data of one unknown.
#[derive(Clone, Debug)]
pub struct QuantityState {
    pub iterate: Vec<f64>,
    pub boundary: Vec<Option<f64>>,
    pub disabled: Vec<bool>,
    pub mapping: Vec<MappingIndex>,
}

impl QuantityState {
    pub fn new(num_cells: usize, initial: f64) -> Self {
        Self {
            iterate: vec![initial; num_cells],
            boundary: vec![None; num_cells],
            disabled: vec![false; num_cells],
            mapping: vec![MappingIndex::QuantityDisabled; num_cells],
        }
    }

    pub fn num_cells(&self) -> usize {
        self.iterate.len()
    }

    /// Prescribe a Dirichlet value on `cell`.
    pub fn set_boundary(&mut self, cell: usize, value: f64) -> &mut Self {
        self.boundary[cell] = Some(value);
        self
    }

    /// Drop the Dirichlet value of `cell`; it becomes free on the next mapping.
    pub fn clear_boundary(&mut self, cell: usize) -> &mut Self {
        self.boundary[cell] = None;
        self
    }

    /// Mark `cell` as a region where this quantity does not exist.
    pub fn set_disabled(&mut self, cell: usize, disabled: bool) -> &mut Self {
        self.disabled[cell] = disabled;
        self
    }

    pub fn set_initial(&mut self, cell: usize, value: f64) -> &mut Self {
        self.iterate[cell] = value;
        self
    }

    pub fn fill_initial<F: Fn(usize) -> f64>(&mut self, f: F) -> &mut Self {
        for (cell, v) in self.iterate.iter_mut().enumerate() {
            *v = f(cell);
        }
        self
    }

    #[inline]
    pub fn is_boundary(&self, cell: usize) -> bool {
        self.boundary[cell].is_some()
    }

    /// Cells taking part in the update: everything that is not disabled.
    #[inline]
    pub fn is_active(&self, cell: usize) -> bool {
        !self.disabled[cell]
    }

    pub fn num_free(&self) -> usize {
        self.mapping.iter().filter(|m| m.free().is_some()).count()
    }
}

/// Current iterate of a quantity seen as a cell quantity.
pub struct IterateView<'a>(pub &'a QuantityState);

impl CellQuantity for IterateView<'_> {
    #[inline]
    fn eval(&self, cell: usize) -> f64 {
        self.0.iterate[cell]
    }

    fn stored_len(&self) -> Option<usize> {
        Some(self.0.iterate.len())
    }
}

/// Everything the assembler and the nonlinear driver read and write per cell.
pub struct SimulationState {
    num_cells: usize,
    quantities: HashMap<QuantityId, QuantityState>,
    coefficients: HashMap<CoefficientId, Box<dyn CellQuantity>>,
}

impl SimulationState {
    pub fn new(num_cells: usize) -> Self {
        Self {
            num_cells,
            quantities: HashMap::new(),
            coefficients: HashMap::new(),
        }
    }

    pub fn for_mesh<M: MeshTopology + ?Sized>(mesh: &M) -> Self {
        Self::new(mesh.num_cells())
    }

    pub fn num_cells(&self) -> usize {
        self.num_cells
    }

    /// Register a quantity with a uniform initial guess. An existing
    /// registration is replaced.
    pub fn add_quantity(&mut self, id: QuantityId, initial: f64) -> &mut QuantityState {
        let fresh = QuantityState::new(self.num_cells, initial);
        match self.quantities.entry(id) {
            Entry::Occupied(mut slot) => {
                slot.insert(fresh);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(fresh),
        }
    }

    pub fn quantity(&self, id: QuantityId) -> Option<&QuantityState> {
        self.quantities.get(&id)
    }

    pub fn quantity_mut(&mut self, id: QuantityId) -> Option<&mut QuantityState> {
        self.quantities.get_mut(&id)
    }

    pub fn quantity_ids(&self) -> impl Iterator<Item = QuantityId> + '_ {
        self.quantities.keys().copied()
    }

    /// Full per-cell field of a quantity.
    pub fn field(&self, id: QuantityId) -> Option<&[f64]> {
        self.quantities.get(&id).map(|q| q.iterate.as_slice())
    }

    pub fn set_coefficient<C>(&mut self, id: CoefficientId, values: C)
    where
        C: CellQuantity + 'static,
    {
        self.coefficients.insert(id, Box::new(values));
    }

    pub fn coefficient(&self, id: CoefficientId) -> Option<&dyn CellQuantity> {
        self.coefficients.get(&id).map(|c| c.as_ref())
    }
}

impl std::fmt::Debug for SimulationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.quantities.keys().collect();
        ids.sort();
        let mut coeffs: Vec<_> = self.coefficients.keys().collect();
        coeffs.sort();
        f.debug_struct("SimulationState")
            .field("num_cells", &self.num_cells)
            .field("quantities", &ids)
            .field("coefficients", &coeffs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_encoding() {
        assert_eq!(MappingIndex::Free(7).as_raw(), 7);
        assert_eq!(MappingIndex::DirichletBoundary.as_raw(), -1);
        assert_eq!(MappingIndex::QuantityDisabled.as_raw(), -2);
        assert_eq!(MappingIndex::DirichletBoundary.free(), None);
    }

    #[test]
    fn quantity_setup_chains() {
        let mut state = SimulationState::new(4);
        state
            .add_quantity(QuantityId(0), 0.5)
            .set_boundary(0, 1.0)
            .set_disabled(3, true)
            .set_initial(1, 2.0);
        let q = state.quantity(QuantityId(0)).expect("registered");
        assert!(q.is_boundary(0));
        assert!(!q.is_active(3));
        assert_eq!(state.field(QuantityId(0)), Some(&[0.5, 2.0, 0.5, 0.5][..]));
        assert_eq!(IterateView(q).eval(1), 2.0);
    }

    #[test]
    fn coefficients_are_type_erased() {
        let mut state = SimulationState::new(2);
        state.set_coefficient(CoefficientId(0), 3.0);
        state.set_coefficient(CoefficientId(1), vec![1.0, -1.0]);
        let eps = state.coefficient(CoefficientId(0)).expect("set");
        let dop = state.coefficient(CoefficientId(1)).expect("set");
        assert_eq!(eps.eval(1), 3.0);
        assert_eq!(dop.eval(1), -1.0);
        assert!(state.coefficient(CoefficientId(2)).is_none());
    }
}
