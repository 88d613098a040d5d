use log::info;
use serde::{Deserialize, Serialize};

use super::semiconductor::{setup_semiconductor_system, DOPING, N, P, PSI};
use crate::discretization::generator::create_line_mesh;
use crate::discretization::mesh::{Mesh, MeshTopology};
use crate::numerics::linear::LinearSolver;
use crate::numerics::picard::{PicardDriver, SolveOutcome, SolverError};
use crate::numerics::PicardConfig;
use crate::physics::state::SimulationState;
use crate::physics::PdeSystem;

/// Normalised parameters of an abrupt pn junction. Potentials are in units
/// of the thermal voltage, lengths in extrinsic Debye lengths and densities
/// in units of the larger doping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnJunctionParams {
    pub dn: f64,
    pub dp: f64,
    pub ni: f64,
    /// Acceptor density of the p side (left half).
    pub na: f64,
    /// Donor density of the n side (right half).
    pub nd: f64,
    pub tau_n: f64,
    pub tau_p: f64,
    pub width: f64,
    /// Bias on the left contact, normalised.
    pub v_applied: f64,

    // Scales back to physical units
    pub v_scale: f64,
    pub l_scale: f64,
    pub n_scale: f64,
}

impl PnJunctionParams {
    /// Unit mobilities and lifetimes; all quantities already normalised.
    pub fn normalized(ni: f64, na: f64, nd: f64, width: f64) -> Self {
        Self {
            dn: 1.0,
            dp: 1.0,
            ni,
            na,
            nd,
            tau_n: 1.0,
            tau_p: 1.0,
            width,
            v_applied: 0.0,
            v_scale: 1.0,
            l_scale: 1.0,
            n_scale: 1.0,
        }
    }

    pub fn with_bias(mut self, v_applied: f64) -> Self {
        self.v_applied = v_applied;
        self
    }

    /// Net doping at position `x`: p type left of the junction, n type right.
    pub fn doping_at(&self, x: f64) -> f64 {
        if x < 0.5 * self.width {
            -self.na
        } else {
            self.nd
        }
    }

    /// Charge-neutral carrier densities `(n, p)` for net doping `c`.
    pub fn neutral_densities(&self, c: f64) -> (f64, f64) {
        let x = equilibrium_ratio(c, self.ni);
        (self.ni * x, self.ni / x)
    }
}

/// Physical silicon junction, 1 µm long, with doping `2e16^s` / `1e16^s`
/// cm^-3 for `power_scale = s`. `v_applied` is in volts.
pub fn pn_problem_def(power_scale: f64, num_cells: usize, v_applied: f64) -> (Mesh, PnJunctionParams) {
    let ni_val = 1e10; // [cm^-3]
    let na_val = 2.0 * 10.0_f64.powf(16.0 * power_scale); // [cm^-3]
    let nd_val = 1.0 * 10.0_f64.powf(16.0 * power_scale); // [cm^-3]
    let eps_si = 11.68 * 8.854e-14; // [F/cm]
    let q = 1.602176634e-19; // [C]
    let t = 300.0; // [K]
    let kb = 1.380649e-23; // [J/K]

    let v_scale = (kb * t) / q;
    let n_scale = na_val.max(nd_val);
    let l_scale = ((eps_si * v_scale) / (q * n_scale)).sqrt();
    let d_scale = 35.0; // [cm^2/s]
    let time_scale = l_scale.powi(2) / d_scale;

    let domain_width = 1.0e-4; // [cm]
    let params = PnJunctionParams {
        dn: 35.0 / d_scale,
        dp: 12.0 / d_scale,
        ni: ni_val / n_scale,
        na: na_val / n_scale,
        nd: nd_val / n_scale,
        tau_n: 1e-7 / time_scale,
        tau_p: 1e-7 / time_scale,
        width: domain_width / l_scale,
        v_applied: v_applied / v_scale,
        v_scale,
        l_scale,
        n_scale,
    };
    info!(
        "pn junction: V_T = {:.4} V, N = {:.2e} cm^-3, L_D = {:.4e} cm, {} cells",
        v_scale, n_scale, l_scale, num_cells
    );

    let mesh = create_line_mesh(params.width, num_cells, 1.0);
    (mesh, params)
}

/// `n / ni` in a charge-neutral region, root of `ni x^2 - c x - ni = 0`.
fn equilibrium_ratio(c: f64, ni: f64) -> f64 {
    let half = 0.5 * c / ni;
    // Cancellation-free root for either sign of the doping.
    if half >= 0.0 {
        half + (half * half + 1.0).sqrt()
    } else {
        1.0 / (-half + (half * half + 1.0).sqrt())
    }
}

pub struct PnJunctionModel {
    pub params: PnJunctionParams,
    pub system: PdeSystem,
}

impl PnJunctionModel {
    pub fn new(params: PnJunctionParams) -> Self {
        let system = setup_semiconductor_system(&params);
        Self { params, system }
    }

    /// Charge-neutral step profile with ohmic contacts in the two end cells.
    pub fn initial_state<M: MeshTopology + ?Sized>(&self, mesh: &M) -> SimulationState {
        let params = &self.params;
        let num_cells = mesh.num_cells();
        let doping: Vec<f64> = (0..num_cells)
            .map(|c| params.doping_at(mesh.cell_centroid(c).x))
            .collect();

        let mut state = SimulationState::for_mesh(mesh);
        let bias = |c: usize| if doping[c] < 0.0 { params.v_applied } else { 0.0 };
        state
            .add_quantity(PSI, 0.0)
            .fill_initial(|c| equilibrium_ratio(doping[c], params.ni).ln() + bias(c));
        state
            .add_quantity(N, 0.0)
            .fill_initial(|c| params.neutral_densities(doping[c]).0);
        state
            .add_quantity(P, 0.0)
            .fill_initial(|c| params.neutral_densities(doping[c]).1);

        if num_cells >= 2 {
            for contact in [0, num_cells - 1] {
                let (n, p) = params.neutral_densities(doping[contact]);
                let psi = equilibrium_ratio(doping[contact], params.ni).ln() + bias(contact);
                if let Some(q) = state.quantity_mut(PSI) {
                    q.set_boundary(contact, psi);
                }
                if let Some(q) = state.quantity_mut(N) {
                    q.set_boundary(contact, n);
                }
                if let Some(q) = state.quantity_mut(P) {
                    q.set_boundary(contact, p);
                }
            }
        }
        state.set_coefficient(DOPING, doping);
        state
    }

    pub fn solve<M, L>(
        &self,
        mesh: &M,
        config: PicardConfig,
        linear: &L,
    ) -> Result<(SimulationState, SolveOutcome), SolverError>
    where
        M: MeshTopology + ?Sized,
        L: LinearSolver + ?Sized,
    {
        let driver = PicardDriver::new(config, self.system.clone())?;
        let mut state = self.initial_state(mesh);
        let outcome = driver.solve(mesh, &mut state, linear)?;
        Ok((state, outcome))
    }
}
