//! Normalised 1D pn diode: Poisson for the potential plus electron and hole
//! continuity, solved with the Picard driver.

pub mod pn;
pub mod semiconductor;

pub use pn::{pn_problem_def, PnJunctionModel, PnJunctionParams};
pub use semiconductor::{setup_semiconductor_system, DOPING, N, P, PSI};
