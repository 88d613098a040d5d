//! Outer nonlinear loop: the PDEs of a system are assembled and solved one
//! after another around the current iterate until the configured gate closes.

use std::io::{self, Write};
use std::time::Instant;

use log::{debug, info, warn};
use nalgebra::DVector;
use thiserror::Error;

use crate::discretization::box_geometry::BoxGeometry;
use crate::discretization::mesh::MeshTopology;
use crate::numerics::linear::{LinearSolveError, LinearSolver};
use crate::numerics::timing::{finalize_and_print, record_assembly, record_linear_solve, reset_timing};
use crate::numerics::update::{damped_update, geometric_update, max_relative_update};
use crate::numerics::{ConvergenceGate, PicardConfig, SolveMode};
use crate::physics::assembler::{Assembler, AssemblyError};
use crate::physics::mapping::{create_mapping, map_pde};
use crate::physics::quantity::QuantityId;
use crate::physics::state::{MappingIndex, SimulationState};
use crate::physics::PdeSystem;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error("linear solve for quantity {quantity} failed: {source}")]
    LinearSolve {
        quantity: QuantityId,
        #[source]
        source: LinearSolveError,
    },
    #[error("solve mode `{0}` is not supported")]
    UnsupportedMode(SolveMode),
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),
    #[error("quantity {0} is the unknown of more than one equation")]
    DuplicateUnknown(QuantityId),
}

/// Result of a driver run. A run that hits the iteration cap still carries
/// its last iterate, flagged with `converged == false`.
#[derive(Clone, Debug)]
pub struct SolveOutcome {
    /// Free-cell values of every PDE, packed by the joint mapping.
    pub result: DVector<f64>,
    pub converged: bool,
    pub iterations: usize,
    /// `update_norms[k][i]`: L2 norm of the applied update of PDE `i` in
    /// outer iteration `k`.
    pub update_norms: Vec<Vec<f64>>,
    /// Linear solver iterations summed over the run.
    pub linear_iterations: usize,
}

impl SolveOutcome {
    pub fn final_norms(&self) -> Option<&[f64]> {
        self.update_norms.last().map(|n| n.as_slice())
    }
}

/// What one PDE pass did to its unknown.
struct PassReport {
    update_norm: f64,
    linear_iterations: usize,
}

pub struct PicardDriver {
    config: PicardConfig,
    system: PdeSystem,
    assembler: Assembler,
}

impl PicardDriver {
    /// Validates the configuration against the system and prepares the
    /// integrands. Every shape error surfaces here, before any cell is touched.
    pub fn new(config: PicardConfig, system: PdeSystem) -> Result<Self, SolverError> {
        if config.mode == SolveMode::Newton {
            return Err(SolverError::UnsupportedMode(config.mode));
        }
        if system.is_empty() {
            return Err(SolverError::InvalidConfig("the PDE system is empty".into()));
        }
        if !(config.damping > 0.0 && config.damping <= 1.0) {
            return Err(SolverError::InvalidConfig(format!(
                "damping must lie in (0, 1], got {}",
                config.damping
            )));
        }
        if config.break_tolerance.is_nan() || config.break_tolerance < 0.0 {
            return Err(SolverError::InvalidConfig(format!(
                "break tolerance must be non-negative, got {}",
                config.break_tolerance
            )));
        }
        if config.mode == SolveMode::Picard && config.max_iterations == 0 {
            return Err(SolverError::InvalidConfig(
                "picard mode needs at least one iteration".into(),
            ));
        }
        if let ConvergenceGate::Observed(i) = config.gate {
            if i >= system.len() {
                return Err(SolverError::InvalidConfig(format!(
                    "observed pde {i} out of range for a system of {} equations",
                    system.len()
                )));
            }
        }
        if let Some(q) = system.duplicate_unknown() {
            return Err(SolverError::DuplicateUnknown(q));
        }
        let assembler = Assembler::new(&system)?;
        Ok(Self {
            config,
            system,
            assembler,
        })
    }

    pub fn config(&self) -> &PicardConfig {
        &self.config
    }

    pub fn system(&self) -> &PdeSystem {
        &self.system
    }

    /// Drive `state` to the solution of the system. Per-cell iterates are
    /// updated in place; the packed result is returned alongside.
    pub fn solve<M, L>(
        &self,
        mesh: &M,
        state: &mut SimulationState,
        linear: &L,
    ) -> Result<SolveOutcome, SolverError>
    where
        M: MeshTopology + ?Sized,
        L: LinearSolver + ?Sized,
    {
        reset_timing();
        let start = Instant::now();
        let geometry = BoxGeometry::compute(mesh);
        info!(
            "{} solve of {} equation(s) on {} cells",
            self.config.mode,
            self.system.len(),
            mesh.num_cells()
        );

        let mut update_norms = Vec::new();
        let mut linear_iterations = 0;
        let mut converged = false;

        match self.config.mode {
            SolveMode::Linear => {
                let mut norms = Vec::with_capacity(self.system.len());
                for pde_index in 0..self.system.len() {
                    let pass = self.pass(pde_index, mesh, &geometry, state, linear, 1.0, false)?;
                    linear_iterations += pass.linear_iterations;
                    norms.push(pass.update_norm);
                }
                debug!("linear pass, update norms {norms:?}");
                update_norms.push(norms);
                converged = true;
            }
            SolveMode::Picard => {
                if self.config.logging {
                    println!("{:>4} | {:>9} | {:>9}", "Iter", "Observed", "Max");
                }
                for iteration in 0..self.config.max_iterations {
                    let mut norms = Vec::with_capacity(self.system.len());
                    for (pde_index, pde) in self.system.iter().enumerate() {
                        let pass = self.pass(
                            pde_index,
                            mesh,
                            &geometry,
                            state,
                            linear,
                            self.config.damping,
                            pde.options.geometric_update,
                        )?;
                        linear_iterations += pass.linear_iterations;
                        norms.push(pass.update_norm);
                    }
                    debug!("picard iteration {}: update norms {norms:?}", iteration + 1);
                    log_iteration(
                        iteration,
                        self.config.max_iterations,
                        &norms,
                        self.observed_norm(&norms),
                        self.config.logging,
                    );
                    let done = self
                        .config
                        .gate
                        .is_satisfied(&norms, self.config.break_tolerance);
                    update_norms.push(norms);
                    if done {
                        converged = true;
                        break;
                    }
                }
            }
            SolveMode::Newton => return Err(SolverError::UnsupportedMode(SolveMode::Newton)),
        }

        let iterations = update_norms.len();
        if converged {
            info!("{} solve finished after {iterations} iteration(s)", self.config.mode);
        } else {
            warn!(
                "picard iteration did not converge within {} iterations (last norms {:?})",
                self.config.max_iterations,
                update_norms.last()
            );
        }

        let result = pack_result(&self.system, mesh, state)?;
        let names: Vec<&str> = self.system.iter().map(|pde| pde.options.name.as_str()).collect();
        finalize_and_print(start.elapsed(), &names);
        Ok(SolveOutcome {
            result,
            converged,
            iterations,
            update_norms,
            linear_iterations,
        })
    }

    fn observed_norm(&self, norms: &[f64]) -> f64 {
        match self.config.gate {
            ConvergenceGate::Observed(i) => norms.get(i).copied().unwrap_or(f64::NAN),
            ConvergenceGate::AllQuantities => norms.iter().copied().fold(0.0, f64::max),
        }
    }

    /// Assemble, solve and apply the update of one PDE.
    #[allow(clippy::too_many_arguments)]
    fn pass<M, L>(
        &self,
        pde_index: usize,
        mesh: &M,
        geometry: &BoxGeometry,
        state: &mut SimulationState,
        linear: &L,
        damping: f64,
        geometric: bool,
    ) -> Result<PassReport, SolverError>
    where
        M: MeshTopology + ?Sized,
        L: LinearSolver + ?Sized,
    {
        let unknown = self
            .system
            .get(pde_index)
            .map(|pde| pde.unknown)
            .ok_or(AssemblyError::PdeIndex {
                index: pde_index,
                len: self.system.len(),
            })?;
        map_pde(&self.system, pde_index, mesh, state)?;
        let system = record_assembly(pde_index, || self.assembler.assemble(pde_index, mesh, geometry, state))?;

        let (delta, linear_iterations) = if system.size() == 0 {
            (DVector::zeros(0), 0)
        } else {
            let report = record_linear_solve(pde_index, || linear.solve(&system.matrix, &system.rhs))
                .map_err(|source| SolverError::LinearSolve {
                    quantity: unknown,
                    source,
                })?;
            debug!(
                "{unknown}: {} unknowns, {} linear iterations, residual {:.3e}",
                system.size(),
                report.iterations,
                report.residual
            );
            (report.solution, report.iterations)
        };

        let q = state
            .quantity_mut(unknown)
            .ok_or(AssemblyError::UnknownQuantity(unknown))?;
        let updates: Vec<Option<f64>> = (0..q.num_cells())
            .map(|cell| match (q.mapping[cell], q.boundary[cell]) {
                (MappingIndex::Free(i), _) => Some(delta[i]),
                (MappingIndex::DirichletBoundary, Some(value)) => Some(value - q.iterate[cell]),
                _ => None,
            })
            .collect();

        let max_relative = if geometric {
            max_relative_update(
                updates
                    .iter()
                    .enumerate()
                    .filter_map(|(cell, u)| u.map(|u| (q.iterate[cell], u))),
            )
        } else {
            0.0
        };

        let mut norm_sq = 0.0;
        for (cell, update) in updates.into_iter().enumerate() {
            let Some(update) = update else { continue };
            let current = q.iterate[cell];
            let next = if geometric {
                geometric_update(current, update, damping, max_relative)
            } else {
                damped_update(current, update, damping)
            };
            norm_sq += (next - current).powi(2);
            q.iterate[cell] = next;
        }

        Ok(PassReport {
            update_norm: norm_sq.sqrt(),
            linear_iterations,
        })
    }
}

/// Pack the free-cell iterates of every PDE into one vector ordered by a
/// fresh joint mapping.
pub fn pack_result<M: MeshTopology + ?Sized>(
    system: &PdeSystem,
    mesh: &M,
    state: &mut SimulationState,
) -> Result<DVector<f64>, AssemblyError> {
    let total = create_mapping(system, mesh, state)?;
    let mut result = DVector::zeros(total);
    for pde in system {
        let q = state
            .quantity(pde.unknown)
            .ok_or(AssemblyError::UnknownQuantity(pde.unknown))?;
        for (cell, m) in q.mapping.iter().enumerate() {
            if let Some(i) = m.free() {
                result[i] = q.iterate[cell];
            }
        }
    }
    Ok(result)
}

/// Inverse of [`pack_result`]: writes a packed vector back into the per-cell
/// iterates through the joint mapping currently stored in `state`. Boundary
/// cells take their prescribed value, disabled cells are left alone.
///
/// The stored mapping must number the free cells of all PDEs jointly, as
/// [`create_mapping`] does. Per-PDE numberings from zero overlap and are
/// rejected.
pub fn unpack_result(
    result: &DVector<f64>,
    state: &mut SimulationState,
    system: &PdeSystem,
) -> Result<(), AssemblyError> {
    let mut expected = 0;
    for pde in system {
        let q = state
            .quantity(pde.unknown)
            .ok_or(AssemblyError::UnknownQuantity(pde.unknown))?;
        expected += q.num_free();
    }
    if expected != result.len() {
        return Err(AssemblyError::DimensionMismatch {
            expected,
            found: result.len(),
        });
    }
    let mut claimed = vec![false; expected];
    for pde in system {
        let q = state
            .quantity(pde.unknown)
            .ok_or(AssemblyError::UnknownQuantity(pde.unknown))?;
        for i in q.mapping.iter().filter_map(|m| m.free()) {
            match claimed.get_mut(i) {
                Some(seen) if !*seen => *seen = true,
                Some(_) => return Err(AssemblyError::StaleMapping { index: i }),
                None => {
                    return Err(AssemblyError::DimensionMismatch {
                        expected,
                        found: i + 1,
                    })
                }
            }
        }
    }
    for pde in system {
        let q = state
            .quantity_mut(pde.unknown)
            .ok_or(AssemblyError::UnknownQuantity(pde.unknown))?;
        for cell in 0..q.num_cells() {
            match (q.mapping[cell], q.boundary[cell]) {
                (MappingIndex::Free(i), _) => {
                    let value = result.get(i).copied().ok_or(AssemblyError::DimensionMismatch {
                        expected: i + 1,
                        found: result.len(),
                    })?;
                    q.iterate[cell] = value;
                }
                (MappingIndex::DirichletBoundary, Some(value)) => q.iterate[cell] = value,
                _ => {}
            }
        }
    }
    Ok(())
}

pub(crate) fn log_iteration(
    i: usize,
    max_iter: usize,
    norms: &[f64],
    observed: f64,
    logging: bool,
) {
    if !logging {
        return;
    }
    let max = norms.iter().copied().fold(0.0, f64::max);
    if i == 0 {
        println!("{:>4} | {observed:>9.3e} | {max:>9.3e}", i + 1);
    } else {
        print!("\x1B[1F\x1B[2K");
        println!("{:>4}/{max_iter} | {observed:>9.3e} | {max:>9.3e}", i + 1);
    }
    io::stdout().flush().ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::create_line_mesh;
    use crate::numerics::linear::{DirectSolver, KrylovConfig, KrylovSolver};
    use crate::physics::quantity::CoefficientId;
    use crate::physics::QuantityOptions;
    use crate::symbolic::{div, exp, grad, Expr};

    const U: QuantityId = QuantityId(0);
    const V: QuantityId = QuantityId(1);
    const EPS: CoefficientId = CoefficientId(0);

    fn poisson() -> PdeSystem {
        PdeSystem::new().with(
            div(Expr::coefficient(EPS) * grad(Expr::unknown(U))).equals(0.0),
            U,
            QuantityOptions::named("u"),
        )
    }

    fn contact_state(num_cells: usize) -> SimulationState {
        let mut state = SimulationState::new(num_cells);
        state
            .add_quantity(U, 0.0)
            .set_boundary(0, 0.0)
            .set_boundary(num_cells - 1, 1.0);
        state.set_coefficient(EPS, 1.0);
        state
    }

    #[test]
    fn linear_mode_interpolates_between_contacts() {
        let mesh = create_line_mesh(1.0, 5, 1.0);
        let mut state = contact_state(5);
        let driver = PicardDriver::new(PicardConfig::linear(), poisson()).unwrap();
        let out = driver.solve(&mesh, &mut state, &DirectSolver).unwrap();

        assert!(out.converged);
        assert_eq!(out.iterations, 1);
        assert_eq!(out.result.len(), 3);
        for (i, expected) in [0.25, 0.5, 0.75].iter().enumerate() {
            assert!((out.result[i] - expected).abs() < 1e-12);
        }
        let field = state.field(U).unwrap();
        assert_eq!(field[0], 0.0);
        assert_eq!(field[4], 1.0);
    }

    #[test]
    fn two_cells_are_both_contacts() {
        let mesh = create_line_mesh(1.0, 2, 1.0);
        let mut state = contact_state(2);
        let driver = PicardDriver::new(PicardConfig::linear(), poisson()).unwrap();
        let out = driver.solve(&mesh, &mut state, &DirectSolver).unwrap();
        assert_eq!(out.result.len(), 0);
        assert_eq!(state.field(U).unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn picard_on_a_linear_problem_stops_after_two_iterations() {
        let mesh = create_line_mesh(1.0, 8, 1.0);

        let mut linear_state = contact_state(8);
        let linear = PicardDriver::new(PicardConfig::linear(), poisson()).unwrap();
        let reference = linear.solve(&mesh, &mut linear_state, &DirectSolver).unwrap();

        let mut state = contact_state(8);
        let driver = PicardDriver::new(PicardConfig::default(), poisson()).unwrap();
        let krylov = KrylovSolver::new(KrylovConfig::default());
        let out = driver.solve(&mesh, &mut state, &krylov).unwrap();

        assert!(out.converged);
        assert!(out.iterations <= 2, "took {} iterations", out.iterations);
        assert!((out.result.clone() - reference.result).amax() < 1e-9);
        assert!(out.final_norms().unwrap()[0] <= 1e-10);
    }

    #[test]
    fn damping_slows_but_does_not_stop_convergence() {
        let mesh = create_line_mesh(1.0, 6, 1.0);
        let mut state = contact_state(6);
        let config = PicardConfig::default().with_damping(0.5).with_max_iterations(200);
        let driver = PicardDriver::new(config, poisson()).unwrap();
        let out = driver.solve(&mesh, &mut state, &DirectSolver).unwrap();
        assert!(out.converged);
        assert!(out.iterations > 2);
        // Each damped step halves the remaining error.
        let first = out.update_norms[0][0];
        let second = out.update_norms[1][0];
        assert!((second / first - 0.5).abs() < 1e-9);
    }

    #[test]
    fn nonlinear_reaction_converges() {
        // u'' = exp(u) - 1 with u = 0 at both ends has u = 0 as solution;
        // starting from a bump the iteration must find it.
        let mesh = create_line_mesh(1.0, 10, 1.0);
        let system = PdeSystem::new().with(
            div(grad(Expr::unknown(U))).equals(exp(Expr::unknown(U)) - 1.0),
            U,
            QuantityOptions::named("u"),
        );
        let mut state = SimulationState::for_mesh(&mesh);
        state
            .add_quantity(U, 0.0)
            .fill_initial(|c| if (3..7).contains(&c) { 0.5 } else { 0.0 })
            .set_boundary(0, 0.0)
            .set_boundary(9, 0.0);
        let driver = PicardDriver::new(PicardConfig::default().with_break_tolerance(1e-12), system).unwrap();
        let out = driver.solve(&mesh, &mut state, &DirectSolver).unwrap();
        assert!(out.converged);
        assert!(state.field(U).unwrap().iter().all(|u| u.abs() < 1e-10));
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let mesh = create_line_mesh(1.0, 6, 1.0);
        let mut state = contact_state(6);
        let config = PicardConfig::default()
            .with_damping(0.1)
            .with_max_iterations(3);
        let driver = PicardDriver::new(config, poisson()).unwrap();
        let out = driver.solve(&mesh, &mut state, &DirectSolver).unwrap();
        assert!(!out.converged);
        assert_eq!(out.iterations, 3);
        assert_eq!(out.result.len(), 4);
        assert!(out.result.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn gate_decides_which_norms_count() {
        // U is linear and settles after two passes; V carries a nonlinear
        // reaction and needs more.
        let mesh = create_line_mesh(1.0, 10, 1.0);
        let system = PdeSystem::new()
            .with(
                div(grad(Expr::unknown(U))).equals(0.0),
                U,
                QuantityOptions::named("u"),
            )
            .with(
                div(grad(Expr::unknown(V))).equals(exp(Expr::unknown(V)) - 1.0),
                V,
                QuantityOptions::named("v"),
            );
        let build_state = || {
            let mut state = contact_state(10);
            state
                .add_quantity(V, 0.0)
                .fill_initial(|c| if (3..7).contains(&c) { 0.5 } else { 0.0 })
                .set_boundary(0, 0.0)
                .set_boundary(9, 0.0);
            state
        };

        let mut state = build_state();
        let out = PicardDriver::new(PicardConfig::default(), system.clone())
            .unwrap()
            .solve(&mesh, &mut state, &DirectSolver)
            .unwrap();
        assert!(out.converged);
        assert_eq!(out.iterations, 2);
        assert_eq!(out.update_norms[1].len(), 2);
        assert!(out.update_norms[1][1] > 1e-10);

        let all = PicardConfig::default().with_gate(ConvergenceGate::AllQuantities);
        let mut state = build_state();
        let out = PicardDriver::new(all, system)
            .unwrap()
            .solve(&mesh, &mut state, &DirectSolver)
            .unwrap();
        assert!(out.converged);
        assert!(out.iterations > 2);
        assert!(out.final_norms().unwrap().iter().all(|n| *n <= 1e-10));
    }

    #[test]
    fn geometric_update_keeps_densities_positive() {
        // n'' = n - 1 with n = 1 at the contacts. The spike is pulled down
        // geometrically instead of in one additive step.
        let mesh = create_line_mesh(1.0, 12, 1.0);
        let system = PdeSystem::new().with(
            div(grad(Expr::unknown(U))).equals(Expr::unknown(U) - 1.0),
            U,
            QuantityOptions::named("n").with_geometric_update(true),
        );
        let mut state = SimulationState::for_mesh(&mesh);
        state
            .add_quantity(U, 1.0)
            .fill_initial(|c| if c == 6 { 1e6 } else { 1.0 })
            .set_boundary(0, 1.0)
            .set_boundary(11, 1.0);
        let driver = PicardDriver::new(PicardConfig::default().with_max_iterations(200), system).unwrap();
        let out = driver.solve(&mesh, &mut state, &DirectSolver).unwrap();
        assert!(out.converged);
        assert!(out.iterations > 2);
        assert!(state.field(U).unwrap().iter().all(|n| *n > 0.0));
        assert!(state.field(U).unwrap().iter().all(|n| (n - 1.0).abs() < 1e-8));
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        assert!(matches!(
            PicardDriver::new(PicardConfig::default().with_mode(SolveMode::Newton), poisson()),
            Err(SolverError::UnsupportedMode(SolveMode::Newton))
        ));
        assert!(matches!(
            PicardDriver::new(PicardConfig::default().with_damping(0.0), poisson()),
            Err(SolverError::InvalidConfig(_))
        ));
        assert!(matches!(
            PicardDriver::new(PicardConfig::default().with_damping(f64::NAN), poisson()),
            Err(SolverError::InvalidConfig(_))
        ));
        assert!(matches!(
            PicardDriver::new(
                PicardConfig::default().with_gate(ConvergenceGate::Observed(1)),
                poisson()
            ),
            Err(SolverError::InvalidConfig(_))
        ));
        assert!(matches!(
            PicardDriver::new(PicardConfig::default(), PdeSystem::new()),
            Err(SolverError::InvalidConfig(_))
        ));
        let twice = poisson().with(
            div(grad(Expr::unknown(U))).equals(0.0),
            U,
            QuantityOptions::default(),
        );
        assert!(matches!(
            PicardDriver::new(PicardConfig::default(), twice),
            Err(SolverError::DuplicateUnknown(U))
        ));
        let bad_shape = PdeSystem::new().with(
            (Expr::unknown(U) * div(grad(Expr::unknown(U)))).equals(0.0),
            U,
            QuantityOptions::default(),
        );
        assert!(matches!(
            PicardDriver::new(PicardConfig::default(), bad_shape),
            Err(SolverError::Assembly(AssemblyError::Expr(_)))
        ));
    }

    #[test]
    fn linear_solver_failures_name_the_quantity() {
        let mesh = create_line_mesh(1.0, 40, 1.0);
        let mut state = contact_state(40);
        let krylov = KrylovSolver::new(KrylovConfig {
            max_iterations: 1,
            preconditioner: crate::numerics::preconditioner::PreconditionerKind::None,
            ..KrylovConfig::default()
        });
        let driver = PicardDriver::new(PicardConfig::default(), poisson()).unwrap();
        let err = driver.solve(&mesh, &mut state, &krylov).unwrap_err();
        assert!(matches!(err, SolverError::LinearSolve { quantity: U, .. }));
    }

    #[test]
    fn pack_and_unpack_are_inverse() {
        let mesh = create_line_mesh(1.0, 5, 1.0);
        let system = poisson().with(
            div(grad(Expr::unknown(V))).equals(0.0),
            V,
            QuantityOptions::named("v"),
        );
        let mut state = contact_state(5);
        state
            .add_quantity(V, 2.0)
            .set_disabled(4, true)
            .set_boundary(0, 3.0);
        state.quantity_mut(U).unwrap().fill_initial(|c| c as f64);

        let packed = pack_result(&system, &mesh, &mut state).unwrap();
        // U: cells 1..=3 free; V: cells 1..=3 free, 4 disabled.
        assert_eq!(packed.as_slice(), &[1.0, 2.0, 3.0, 2.0, 2.0, 2.0]);

        let shifted = packed.map(|v| v + 10.0);
        unpack_result(&shifted, &mut state, &system).unwrap();
        assert_eq!(state.field(U).unwrap(), &[0.0, 11.0, 12.0, 13.0, 1.0]);
        assert_eq!(state.field(V).unwrap(), &[3.0, 12.0, 12.0, 12.0, 2.0]);

        let short = DVector::zeros(2);
        assert!(matches!(
            unpack_result(&short, &mut state, &system),
            Err(AssemblyError::DimensionMismatch { expected: 6, found: 2 })
        ));
        // A per-equation numbering reuses indices 0..3 for V.
        map_pde(&system, 1, &mesh, &mut state).unwrap();
        let before = state.field(U).unwrap().to_vec();
        assert!(matches!(
            unpack_result(&shifted, &mut state, &system),
            Err(AssemblyError::StaleMapping { index: 0 })
        ));
        assert_eq!(state.field(U).unwrap(), &before[..]);
    }
}
