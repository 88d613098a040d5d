//! Two-point flux approximation across one facet.
//!
//! The surface integrand is linearised around the facet state as
//!
//! ```text
//! F = A * du/dn + B * u + C
//! ```
//!
//! with `A = dF/d(du/dn)`, `B = dF/du` taken with dual numbers. The scheme
//! turns this into `F = out * u_outer + inner * u_inner + C`, seen from the
//! inner cell with the normal pointing to the outer cell.

use num_dual::Dual64;
use serde::{Deserialize, Serialize};

use crate::physics::assembler::AssemblyError;
use crate::physics::quantity::QuantityId;
use crate::physics::state::SimulationState;
use crate::symbolic::{Expr, ExprError, Symbol, SymbolResolver};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FluxScheme {
    /// Central differences for diffusion and drift.
    #[default]
    Central,
    /// Exponential fitting for drift-dominated carrier fluxes.
    ScharfetterGummel,
}

/// `x / (exp(x) - 1)`, with the removable singularity at zero filled in.
pub fn bernoulli(x: f64) -> f64 {
    if x.abs() < 1e-4 {
        1.0 - x / 2.0 + x * x / 12.0
    } else {
        x / x.exp_m1()
    }
}

/// Linearised flux through one facet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluxCoefficients {
    /// Multiplies the outer cell value.
    pub out: f64,
    /// Multiplies the inner cell value.
    pub inner: f64,
    /// Part of the flux not proportional to the unknown.
    pub constant: f64,
}

impl FluxCoefficients {
    #[inline]
    pub fn flux(&self, u_outer: f64, u_inner: f64) -> f64 {
        self.out * u_outer + self.inner * u_inner + self.constant
    }
}

/// What a facet evaluation sees: the two cells, their distance and the
/// unknown values on either side.
#[derive(Clone, Copy, Debug)]
pub struct FacetContext<'a> {
    pub state: &'a SimulationState,
    pub unknown: QuantityId,
    pub inner: usize,
    pub outer: usize,
    pub distance: f64,
    pub u_inner: f64,
    /// Iterate of the outer cell, or its boundary value.
    pub u_outer: f64,
}

#[derive(Clone, Copy, PartialEq)]
enum Seed {
    Gradient,
    Value,
}

struct FacetResolver<'a> {
    ctx: FacetContext<'a>,
    seed: Seed,
}

impl FacetResolver<'_> {
    fn pair(&self, symbol: &Symbol) -> Result<(f64, f64), ExprError> {
        let ctx = &self.ctx;
        let unresolved = || ExprError::UnresolvedSymbol {
            symbol: symbol.to_string(),
        };
        match symbol {
            Symbol::Unknown(q) if *q == ctx.unknown => Ok((ctx.u_inner, ctx.u_outer)),
            Symbol::Unknown(q) | Symbol::Iterate(q) => {
                let field = ctx.state.field(*q).ok_or_else(unresolved)?;
                Ok((field[ctx.inner], field[ctx.outer]))
            }
            Symbol::Coefficient(k) => {
                let c = ctx.state.coefficient(*k).ok_or_else(unresolved)?;
                Ok((c.eval(ctx.inner), c.eval(ctx.outer)))
            }
        }
    }

    fn is_seeded(&self, symbol: &Symbol, seed: Seed) -> bool {
        self.seed == seed && *symbol == Symbol::Unknown(self.ctx.unknown)
    }
}

impl SymbolResolver for FacetResolver<'_> {
    fn symbol(&self, symbol: &Symbol) -> Result<Dual64, ExprError> {
        let (i, o) = self.pair(symbol)?;
        let eps = if self.is_seeded(symbol, Seed::Value) { 1.0 } else { 0.0 };
        Ok(Dual64::new(0.5 * (i + o), eps))
    }

    fn gradient(&self, symbol: &Symbol) -> Result<Dual64, ExprError> {
        let (i, o) = self.pair(symbol)?;
        let eps = if self.is_seeded(symbol, Seed::Gradient) { 1.0 } else { 0.0 };
        Ok(Dual64::new((o - i) / self.ctx.distance, eps))
    }
}

/// Flux coefficients of `integrand` on the facet described by `ctx`.
pub fn flux_coefficients(
    integrand: &Expr,
    ctx: FacetContext<'_>,
    scheme: FluxScheme,
) -> Result<FluxCoefficients, AssemblyError> {
    let by_gradient = integrand.eval(&FacetResolver {
        ctx,
        seed: Seed::Gradient,
    })?;
    let by_value = integrand.eval(&FacetResolver {
        ctx,
        seed: Seed::Value,
    })?;

    let d = ctx.distance;
    let a = by_gradient.eps;
    let b = by_value.eps;
    let gradient = (ctx.u_outer - ctx.u_inner) / d;
    let mean = 0.5 * (ctx.u_outer + ctx.u_inner);
    let constant = by_value.re - a * gradient - b * mean;

    let (out, inner) = match scheme {
        FluxScheme::ScharfetterGummel if a != 0.0 => {
            let peclet = b * d / a;
            (a / d * bernoulli(-peclet), -a / d * bernoulli(peclet))
        }
        FluxScheme::Central | FluxScheme::ScharfetterGummel => (a / d + 0.5 * b, -a / d + 0.5 * b),
    };

    Ok(FluxCoefficients {
        out,
        inner,
        constant,
    })
}
