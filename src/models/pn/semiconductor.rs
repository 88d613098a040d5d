use super::pn::PnJunctionParams;
use crate::physics::flux::FluxScheme;
use crate::physics::quantity::{CoefficientId, QuantityId};
use crate::physics::{PdeSystem, QuantityOptions};
use crate::symbolic::{div, exp, grad, Expr};

/// Electrostatic potential in units of the thermal voltage.
pub const PSI: QuantityId = QuantityId(0);
/// Electron density, normalised.
pub const N: QuantityId = QuantityId(1);
/// Hole density, normalised.
pub const P: QuantityId = QuantityId(2);
/// Net doping `N_D - N_A`, normalised.
pub const DOPING: CoefficientId = CoefficientId(0);

/// Shockley-Read-Hall recombination in the carrier densities.
pub fn srh_recombination(params: &PnJunctionParams) -> Expr {
    let n = Expr::unknown(N);
    let p = Expr::unknown(P);
    let ni = params.ni;
    (n.clone() * p.clone() - ni * ni)
        / (params.tau_p * (n + ni) + params.tau_n * (p + ni))
}

/// Drift-diffusion in density form, decoupled Gummel-style.
///
/// The Poisson equation sees the carriers through the Boltzmann relation
/// around the current potential, `n* exp(psi - psi*)`, which keeps it
/// nonlinear in `psi` while the densities are frozen.
pub fn setup_semiconductor_system(params: &PnJunctionParams) -> PdeSystem {
    let psi = Expr::unknown(PSI);
    let psi_it = Expr::iterate(PSI);
    let n = Expr::unknown(N);
    let p = Expr::unknown(P);

    let space_charge = Expr::iterate(N) * exp(psi.clone() - psi_it.clone())
        - Expr::iterate(P) * exp(psi_it - psi.clone())
        - Expr::coefficient(DOPING);
    let poisson = div(grad(psi.clone())).equals(space_charge);

    let electron_current = params.dn * grad(n.clone()) - params.dn * n.clone() * grad(psi.clone());
    let electrons = div(electron_current).equals(srh_recombination(params));

    let hole_current = params.dp * grad(p.clone()) + params.dp * p * grad(psi);
    let holes = div(hole_current).equals(srh_recombination(params));

    let carrier = |name: &str| {
        QuantityOptions::named(name)
            .with_flux_scheme(FluxScheme::ScharfetterGummel)
            .with_geometric_update(true)
    };

    PdeSystem::new()
        .with(poisson, PSI, QuantityOptions::named("psi"))
        .with(electrons, N, carrier("n"))
        .with(holes, P, carrier("p"))
}
