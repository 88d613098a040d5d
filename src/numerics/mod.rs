pub mod linear;
pub mod picard;
pub mod preconditioner;
pub mod timing;
pub mod update;

use std::fmt;

use serde::{Deserialize, Serialize};

/// How the PDE system is driven to its solution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveMode {
    /// Assemble and solve every PDE once, undamped.
    Linear,
    /// Damped fixed-point iteration over the PDEs in system order.
    #[default]
    Picard,
    /// Fully coupled Newton. Not available; rejected at configuration time.
    Newton,
}

impl fmt::Display for SolveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveMode::Linear => write!(f, "linear"),
            SolveMode::Picard => write!(f, "picard"),
            SolveMode::Newton => write!(f, "newton"),
        }
    }
}

/// Which update norms decide convergence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvergenceGate {
    /// Only the PDE at this index is checked.
    Observed(usize),
    /// Every PDE must be within tolerance in the same outer iteration.
    AllQuantities,
}

impl Default for ConvergenceGate {
    fn default() -> Self {
        ConvergenceGate::Observed(0)
    }
}

impl ConvergenceGate {
    /// `norms[i]` is the update norm of PDE `i` in the current iteration.
    pub fn is_satisfied(&self, norms: &[f64], tolerance: f64) -> bool {
        match *self {
            ConvergenceGate::Observed(i) => norms.get(i).is_some_and(|n| *n <= tolerance),
            ConvergenceGate::AllQuantities => {
                !norms.is_empty() && norms.iter().all(|n| *n <= tolerance)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PicardConfig {
    pub mode: SolveMode,
    pub max_iterations: usize,
    /// L2 norm of the update at or below which an iteration counts as converged.
    pub break_tolerance: f64,
    /// Fraction of the update applied per iteration, in `(0, 1]`.
    pub damping: f64,
    pub gate: ConvergenceGate,
    /// Print the per-iteration table to stdout.
    pub logging: bool,
}

impl Default for PicardConfig {
    fn default() -> Self {
        Self {
            mode: SolveMode::Picard,
            max_iterations: 100,
            break_tolerance: 1e-10,
            damping: 1.0,
            gate: ConvergenceGate::default(),
            logging: false,
        }
    }
}

impl PicardConfig {
    pub fn linear() -> Self {
        Self {
            mode: SolveMode::Linear,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: SolveMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_break_tolerance(mut self, tol: f64) -> Self {
        self.break_tolerance = tol;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_gate(mut self, gate: ConvergenceGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }
}
