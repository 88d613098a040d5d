//! Linear solvers for the assembled systems.

use std::sync::Arc;

use kryst::context::ksp_context::Workspace;
use kryst::error::KError;
use kryst::matrix::op::CsrOp;
use kryst::parallel::{NoComm, UniverseComm};
use kryst::preconditioner::{PcSide, Preconditioner};
use kryst::solver::{BiCgStabSolver, CgSolver, GmresSolver, LinearSolver as KrystSolver};
use kryst::utils::convergence::SolveStats;
use log::debug;
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::preconditioner::PreconditionerKind;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinearSolveError {
    #[error("matrix is {rows}x{cols} but the right-hand side has length {rhs}")]
    DimensionMismatch { rows: usize, cols: usize, rhs: usize },
    #[error("matrix is singular")]
    Singular,
    #[error("solver produced non-finite values")]
    NonFinite,
    #[error("no convergence after {iterations} iterations (residual {residual:.3e})")]
    NotConverged { iterations: usize, residual: f64 },
    #[error("preconditioner setup failed: {0}")]
    Preconditioner(String),
    #[error("krylov iteration failed: {0}")]
    Krylov(String),
}

#[derive(Clone, Debug)]
pub struct LinearSolveReport {
    pub solution: DVector<f64>,
    pub iterations: usize,
    /// `||b - A x||` of the returned solution.
    pub residual: f64,
}

pub trait LinearSolver {
    fn solve(&self, a: &CsrMatrix<f64>, b: &DVector<f64>) -> Result<LinearSolveReport, LinearSolveError>;
}

fn check_dimensions(a: &CsrMatrix<f64>, b: &DVector<f64>) -> Result<(), LinearSolveError> {
    if a.nrows() != a.ncols() || a.nrows() != b.len() {
        return Err(LinearSolveError::DimensionMismatch {
            rows: a.nrows(),
            cols: a.ncols(),
            rhs: b.len(),
        });
    }
    Ok(())
}

fn true_residual(a: &CsrMatrix<f64>, x: &DVector<f64>, b: &DVector<f64>) -> f64 {
    let ax: DVector<f64> = a * x;
    (b - ax).norm()
}

fn finish(
    a: &CsrMatrix<f64>,
    b: &DVector<f64>,
    solution: DVector<f64>,
    iterations: usize,
) -> Result<LinearSolveReport, LinearSolveError> {
    if solution.iter().any(|v| !v.is_finite()) {
        return Err(LinearSolveError::NonFinite);
    }
    let residual = true_residual(a, &solution, b);
    Ok(LinearSolveReport {
        solution,
        iterations,
        residual,
    })
}

/// Dense LU. Exact up to round-off; meant for small systems and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirectSolver;

impl LinearSolver for DirectSolver {
    fn solve(&self, a: &CsrMatrix<f64>, b: &DVector<f64>) -> Result<LinearSolveReport, LinearSolveError> {
        check_dimensions(a, b)?;
        let n = b.len();
        if n == 0 {
            return Ok(LinearSolveReport {
                solution: DVector::zeros(0),
                iterations: 0,
                residual: 0.0,
            });
        }
        let mut dense = DMatrix::zeros(n, n);
        for (i, j, v) in a.triplet_iter() {
            dense[(i, j)] += *v;
        }
        let x = dense.lu().solve(b).ok_or(LinearSolveError::Singular)?;
        finish(a, b, x, 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum KrylovMethod {
    ConjugateGradient,
    BiCgStab,
    Gmres { restart: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KrylovConfig {
    pub method: KrylovMethod,
    pub preconditioner: PreconditionerKind,
    /// Relative tolerance on the residual kryst monitors (left preconditioned).
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for KrylovConfig {
    fn default() -> Self {
        Self {
            method: KrylovMethod::BiCgStab,
            preconditioner: PreconditionerKind::Ilu0,
            tolerance: 1e-12,
            max_iterations: 1000,
        }
    }
}

/// Preconditioned Krylov solve through kryst.
#[derive(Clone, Copy, Debug, Default)]
pub struct KrylovSolver {
    pub config: KrylovConfig,
}

impl KrylovSolver {
    pub fn new(config: KrylovConfig) -> Self {
        Self { config }
    }
}

/// Whether every diagonal entry is non-positive and at least one negative.
/// Diffusion rows assemble this way.
fn negative_diagonal(a: &CsrMatrix<f64>) -> bool {
    let mut any_negative = false;
    for (i, j, v) in a.triplet_iter() {
        if i == j {
            if *v > 0.0 {
                return false;
            }
            any_negative |= *v < 0.0;
        }
    }
    any_negative
}

/// Copy of `a` in kryst's CSR layout with row `i` multiplied by `scales[i]`.
fn to_kryst_op(a: &CsrMatrix<f64>, scales: &[f64]) -> CsrOp<f64> {
    let offsets = a.row_offsets();
    let mut values = a.values().to_vec();
    for (row, scale) in scales.iter().enumerate() {
        for v in &mut values[offsets[row]..offsets[row + 1]] {
            *v *= scale;
        }
    }
    let csr = kryst::matrix::sparse::CsrMatrix::from_csr(
        a.nrows(),
        a.ncols(),
        offsets.to_vec(),
        a.col_indices().to_vec(),
        values,
    );
    CsrOp::new(Arc::new(csr))
}

fn run<S>(
    mut solver: S,
    op: &CsrOp<f64>,
    pc: Option<&mut dyn Preconditioner>,
    rhs: &[f64],
    x: &mut [f64],
) -> Result<SolveStats<f64>, KError>
where
    S: KrystSolver<Error = KError>,
{
    let mut workspace = Workspace::new(rhs.len());
    solver.setup_workspace(&mut workspace);
    solver.solve(
        op,
        pc,
        rhs,
        x,
        PcSide::Left,
        &UniverseComm::NoComm(NoComm),
        None,
        Some(&mut workspace),
    )
}

impl LinearSolver for KrylovSolver {
    fn solve(&self, a: &CsrMatrix<f64>, b: &DVector<f64>) -> Result<LinearSolveReport, LinearSolveError> {
        check_dimensions(a, b)?;
        let n = b.len();
        if b.norm() == 0.0 {
            return Ok(LinearSolveReport {
                solution: DVector::zeros(n),
                iterations: 0,
                residual: 0.0,
            });
        }
        let KrylovConfig {
            method,
            preconditioner,
            tolerance,
            max_iterations,
        } = self.config;

        // kryst's CG wants a positive definite operator: solve -A x = -b instead.
        let sign = if method == KrylovMethod::ConjugateGradient && negative_diagonal(a) {
            -1.0
        } else {
            1.0
        };
        let scales: Vec<f64> = preconditioner.row_scales(a).into_iter().map(|s| sign * s).collect();
        let op = to_kryst_op(a, &scales);
        let rhs: Vec<f64> = b.iter().zip(&scales).map(|(v, s)| v * s).collect();

        let mut pc = preconditioner.build()?;
        if let Some(pc) = pc.as_deref_mut() {
            pc.setup(&op)
                .map_err(|e| LinearSolveError::Preconditioner(e.to_string()))?;
        }

        let mut x = vec![0.0; n];
        let pc = pc.as_deref_mut().map(|p| p as &mut dyn Preconditioner);
        let stats = match method {
            KrylovMethod::ConjugateGradient => {
                run(CgSolver::new(tolerance, max_iterations), &op, pc, &rhs, &mut x)
            }
            KrylovMethod::BiCgStab => {
                run(BiCgStabSolver::new(tolerance, max_iterations), &op, pc, &rhs, &mut x)
            }
            KrylovMethod::Gmres { restart } => run(
                GmresSolver::new(restart.max(1), tolerance, max_iterations),
                &op,
                pc,
                &rhs,
                &mut x,
            ),
        }
        .map_err(|e| LinearSolveError::Krylov(e.to_string()))?;

        let report = finish(a, b, DVector::from_vec(x), stats.iterations)?;
        debug!(
            "{:?}/{}: {} iterations, residual {:.3e} ({:?})",
            method,
            preconditioner.name(),
            report.iterations,
            report.residual,
            stats.reason
        );
        if !stats.reason.is_converged() {
            return Err(LinearSolveError::NotConverged {
                iterations: report.iterations,
                residual: report.residual,
            });
        }
        Ok(report)
    }
}
