//! Residual-form linear assembly of one PDE.
//!
//! The assembled system is `J * delta = -R` where `R` is the residual of
//! `∮ F·n dA - ∫ f dV = 0` at the current iterate. Its solution is an additive
//! correction to the iterate of the free cells, never the new value itself.

use log::debug;
use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use num_dual::Dual64;
use thiserror::Error;

use crate::discretization::box_geometry::BoxGeometry;
use crate::discretization::mesh::MeshTopology;
use crate::physics::flux::{flux_coefficients, FacetContext, FluxScheme};
use crate::physics::mapping::map_pde;
use crate::physics::quantity::{CoefficientId, QuantityId};
use crate::physics::state::{MappingIndex, SimulationState};
use crate::physics::PdeSystem;
use crate::symbolic::{ExprError, Integrands, Symbol, SymbolResolver};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Expr(#[from] ExprError),
    #[error("quantity {0} is not registered in the simulation state")]
    UnknownQuantity(QuantityId),
    #[error("coefficient {0} has no values")]
    UnknownCoefficient(CoefficientId),
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("pde index {index} out of range for a system of {len} equations")]
    PdeIndex { index: usize, len: usize },
    #[error("free index {index} is numbered twice; the joint mapping is stale")]
    StaleMapping { index: usize },
}

/// Resolves volume integrands on one cell. Only the assembled unknown
/// carries a derivative seed.
struct CellResolver<'a> {
    state: &'a SimulationState,
    unknown: QuantityId,
    cell: usize,
}

impl SymbolResolver for CellResolver<'_> {
    fn symbol(&self, symbol: &Symbol) -> Result<Dual64, ExprError> {
        let unresolved = || ExprError::UnresolvedSymbol {
            symbol: symbol.to_string(),
        };
        match symbol {
            Symbol::Unknown(q) | Symbol::Iterate(q) => {
                let field = self.state.field(*q).ok_or_else(unresolved)?;
                let eps = if *symbol == Symbol::Unknown(self.unknown) { 1.0 } else { 0.0 };
                Ok(Dual64::new(field[self.cell], eps))
            }
            Symbol::Coefficient(k) => {
                let c = self.state.coefficient(*k).ok_or_else(unresolved)?;
                Ok(Dual64::new(c.eval(self.cell), 0.0))
            }
        }
    }

    fn gradient(&self, symbol: &Symbol) -> Result<Dual64, ExprError> {
        Err(ExprError::NotEvaluable {
            expr: format!("grad({symbol})"),
        })
    }
}

/// Matrix and right-hand side of one linearised PDE.
#[derive(Clone, Debug)]
pub struct LinearSystem {
    pub matrix: CsrMatrix<f64>,
    pub rhs: DVector<f64>,
}

impl LinearSystem {
    pub fn size(&self) -> usize {
        self.rhs.len()
    }
}

/// Integrands of every PDE, prepared once per system.
#[derive(Clone, Debug)]
pub struct Assembler {
    integrands: Vec<Integrands>,
    schemes: Vec<FluxScheme>,
}

impl Assembler {
    /// Derive the weak form and integrands of every PDE. Unsupported
    /// equation shapes fail here, before any state is touched.
    pub fn new(system: &PdeSystem) -> Result<Self, AssemblyError> {
        let mut integrands = Vec::with_capacity(system.len());
        let mut schemes = Vec::with_capacity(system.len());
        for pde in system {
            let mut ig = Integrands::from_equation(&pde.equation, pde.unknown)?;
            if let Some(term) = &pde.options.damping_term {
                ig = ig.with_damping(term)?;
            }
            debug!(
                "{} ({}): surface `{}`, volume `{}`",
                pde.options.name, pde.unknown, ig.surface, ig.volume
            );
            integrands.push(ig);
            schemes.push(pde.options.flux_scheme);
        }
        Ok(Self {
            integrands,
            schemes,
        })
    }

    pub fn len(&self) -> usize {
        self.integrands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.integrands.is_empty()
    }

    pub fn integrands(&self, pde_index: usize) -> Option<&Integrands> {
        self.integrands.get(pde_index)
    }

    /// Every symbol the PDE reads must have data in `state`, and stored
    /// coefficient values must cover all `num_cells` cells.
    fn check_symbols(
        ig: &Integrands,
        state: &SimulationState,
        num_cells: usize,
    ) -> Result<(), AssemblyError> {
        let mut symbols = ig.surface.symbols();
        symbols.extend(ig.volume.symbols());
        if let Some(d) = &ig.damping {
            symbols.extend(d.symbols());
        }
        for s in symbols {
            match s {
                Symbol::Unknown(q) | Symbol::Iterate(q) if state.quantity(q).is_none() => {
                    return Err(AssemblyError::UnknownQuantity(q));
                }
                Symbol::Coefficient(k) => {
                    let c = state
                        .coefficient(k)
                        .ok_or(AssemblyError::UnknownCoefficient(k))?;
                    match c.stored_len() {
                        Some(found) if found < num_cells => {
                            return Err(AssemblyError::DimensionMismatch {
                                expected: num_cells,
                                found,
                            });
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Assemble PDE `pde_index` around the current iterate. The unknown's
    /// mapping must be current.
    pub fn assemble<M: MeshTopology + ?Sized>(
        &self,
        pde_index: usize,
        mesh: &M,
        geometry: &BoxGeometry,
        state: &SimulationState,
    ) -> Result<LinearSystem, AssemblyError> {
        let ig = self.integrands.get(pde_index).ok_or(AssemblyError::PdeIndex {
            index: pde_index,
            len: self.integrands.len(),
        })?;
        let scheme = self.schemes[pde_index];
        let unknown = ig.unknown;
        let q = state
            .quantity(unknown)
            .ok_or(AssemblyError::UnknownQuantity(unknown))?;
        Self::check_symbols(ig, state, mesh.num_cells())?;

        if q.num_cells() != mesh.num_cells() {
            return Err(AssemblyError::DimensionMismatch {
                expected: mesh.num_cells(),
                found: q.num_cells(),
            });
        }
        if geometry.num_facets() != mesh.num_facets() {
            return Err(AssemblyError::DimensionMismatch {
                expected: mesh.num_facets(),
                found: geometry.num_facets(),
            });
        }

        let size = q.num_free();
        if let Some(bad) = q.mapping.iter().filter_map(|m| m.free()).find(|&i| i >= size) {
            return Err(AssemblyError::DimensionMismatch {
                expected: size,
                found: bad + 1,
            });
        }

        let mut coo = CooMatrix::new(size, size);
        let mut rhs = DVector::zeros(size);

        for cell in 0..mesh.num_cells() {
            let Some(row) = q.mapping[cell].free() else {
                continue;
            };
            let u_inner = q.iterate[cell];

            for &facet in mesh.facets_of_cell(cell) {
                let Some(outer) = mesh.neighbor_across(facet, cell) else {
                    continue;
                };
                let Some(geo) = geometry.facet(facet) else {
                    continue;
                };
                let (col, u_outer) = match q.mapping[outer] {
                    MappingIndex::QuantityDisabled => continue,
                    MappingIndex::DirichletBoundary => {
                        (None, q.boundary[outer].unwrap_or(q.iterate[outer]))
                    }
                    MappingIndex::Free(col) => (Some(col), q.iterate[outer]),
                };

                let ctx = FacetContext {
                    state,
                    unknown,
                    inner: cell,
                    outer,
                    distance: geo.distance,
                    u_inner,
                    u_outer,
                };
                let c = flux_coefficients(&ig.surface, ctx, scheme)?;
                let area = geo.effective_area;

                coo.push(row, row, c.inner * area);
                if let Some(col) = col {
                    coo.push(row, col, c.out * area);
                }
                rhs[row] -= c.flux(u_outer, u_inner) * area;
            }

            let vol = mesh.cell_volume(cell);
            let at_cell = CellResolver {
                state,
                unknown,
                cell,
            };
            let source = ig.volume.value(&at_cell)?;
            let d_source = ig.volume_jacobian.value(&at_cell)?;
            coo.push(row, row, -d_source * vol);
            rhs[row] += source * vol;

            if let Some(damping) = &ig.damping {
                coo.push(row, row, -damping.value(&at_cell)? * vol);
            }
        }

        let matrix = CsrMatrix::from(&coo);
        debug!(
            "assembled {unknown}: {size} unknowns, {} nonzeros",
            matrix.nnz()
        );
        Ok(LinearSystem { matrix, rhs })
    }
}

/// One-shot assembly: prepares the integrands, numbers the PDE's free cells
/// from zero and computes the box geometry before assembling.
pub fn assemble<M: MeshTopology + ?Sized>(
    system: &PdeSystem,
    pde_index: usize,
    mesh: &M,
    state: &mut SimulationState,
) -> Result<LinearSystem, AssemblyError> {
    let assembler = Assembler::new(system)?;
    map_pde(system, pde_index, mesh, state)?;
    let geometry = BoxGeometry::compute(mesh);
    assembler.assemble(pde_index, mesh, &geometry, state)
}

/// Residual of a PDE at the current iterate, `-rhs` of its assembled system.
pub fn residual_norm(system: &LinearSystem) -> f64 {
    system.rhs.norm()
}
