//! Splitting a weak-form equation into the pieces the assembler evaluates.

use super::expr::{Equation, Expr, Symbol, UnaryOp};
use super::weak_form::weak_form;
use super::{BinaryOp, ExprError};
use crate::physics::quantity::QuantityId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegralKind {
    Surface,
    Volume,
}

fn has_marker(e: &Expr) -> bool {
    e.contains_op(UnaryOp::SurfaceIntegral) || e.contains_op(UnaryOp::VolumeIntegral)
}

/// Integrand of all terms of `kind` in a weak-form expression; every other
/// term is replaced by zero.
///
/// Terms carrying no integral marker and no divergence count as volume terms.
pub fn extract(e: &Expr, kind: IntegralKind) -> Result<Expr, ExprError> {
    let zero = || Expr::Constant(0.0);
    match e {
        Expr::Unary(UnaryOp::SurfaceIntegral, x) => Ok(match kind {
            IntegralKind::Surface => (**x).clone(),
            IntegralKind::Volume => zero(),
        }),
        Expr::Unary(UnaryOp::VolumeIntegral, x) => Ok(match kind {
            IntegralKind::Volume => (**x).clone(),
            IntegralKind::Surface => zero(),
        }),
        Expr::Binary(BinaryOp::Add, a, b) => Ok(Expr::s_add(extract(a, kind)?, extract(b, kind)?)),
        Expr::Binary(BinaryOp::Sub, a, b) => Ok(Expr::s_sub(extract(a, kind)?, extract(b, kind)?)),
        Expr::Unary(UnaryOp::Neg, x) => Ok(Expr::s_neg(extract(x, kind)?)),
        Expr::Binary(BinaryOp::Mul, a, b) if has_marker(e) && a.is_constant() => {
            Ok(Expr::s_mul((**a).clone(), extract(b, kind)?))
        }
        Expr::Binary(BinaryOp::Mul, a, b) if has_marker(e) && b.is_constant() => {
            Ok(Expr::s_mul(extract(a, kind)?, (**b).clone()))
        }
        Expr::Binary(BinaryOp::Div, a, b) if has_marker(e) && b.is_constant() => {
            Ok(Expr::s_div(extract(a, kind)?, (**b).clone()))
        }
        _ if !has_marker(e) && !e.contains_op(UnaryOp::Div) => Ok(match kind {
            IntegralKind::Volume => e.clone(),
            IntegralKind::Surface => zero(),
        }),
        _ => Err(ExprError::UnsupportedIntegrand {
            expr: e.to_string(),
            reason: "integral term under a non-linear operation",
        }),
    }
}

/// Replace every unknown other than `unknown` by its current iterate.
pub fn localize(e: &Expr, unknown: QuantityId) -> Expr {
    e.map_symbols(&|s| match s {
        Symbol::Unknown(q) if *q != unknown => Expr::iterate(*q),
        other => Expr::Symbol(*other),
    })
}

/// `grad` may only wrap a bare symbol; no divergence or integral nodes.
fn check_surface(e: &Expr) -> Result<(), ExprError> {
    let bad = e.any(&|n| match n {
        Expr::Unary(UnaryOp::Grad, x) => !matches!(**x, Expr::Symbol(_)),
        Expr::Unary(UnaryOp::Div | UnaryOp::SurfaceIntegral | UnaryOp::VolumeIntegral, _) => {
            true
        }
        _ => false,
    });
    if bad {
        return Err(ExprError::UnsupportedIntegrand {
            expr: e.to_string(),
            reason: "flux must be built from values and gradients of symbols",
        });
    }
    Ok(())
}

fn check_volume(e: &Expr) -> Result<(), ExprError> {
    let bad = e.any(&|n| {
        matches!(
            n,
            Expr::Unary(
                UnaryOp::Grad | UnaryOp::Div | UnaryOp::SurfaceIntegral | UnaryOp::VolumeIntegral,
                _
            )
        )
    });
    if bad {
        return Err(ExprError::UnsupportedIntegrand {
            expr: e.to_string(),
            reason: "volume terms must be pointwise cell expressions",
        });
    }
    Ok(())
}

/// Per-PDE integrands, localised to one unknown.
///
/// The residual is `∮ surface dA − ∫ volume dV`, with the volume integrand
/// collecting the right-hand side minus any volume terms on the left.
#[derive(Clone, Debug, PartialEq)]
pub struct Integrands {
    pub unknown: QuantityId,
    pub surface: Expr,
    pub volume: Expr,
    /// `∂volume/∂u`, the cell part of the Jacobian.
    pub volume_jacobian: Expr,
    pub damping: Option<Expr>,
}

impl Integrands {
    pub fn from_equation(eq: &Equation, unknown: QuantityId) -> Result<Self, ExprError> {
        let weak = weak_form(eq)?;
        let surface = Expr::s_sub(
            extract(&weak.lhs, IntegralKind::Surface)?,
            extract(&weak.rhs, IntegralKind::Surface)?,
        );
        let volume = Expr::s_sub(
            extract(&weak.rhs, IntegralKind::Volume)?,
            extract(&weak.lhs, IntegralKind::Volume)?,
        );
        let surface = localize(&surface, unknown);
        let volume = localize(&volume, unknown);
        check_surface(&surface)?;
        check_volume(&volume)?;

        let volume_jacobian = volume.derivative(&Symbol::Unknown(unknown))?;
        Ok(Self {
            unknown,
            surface,
            volume,
            volume_jacobian,
            damping: None,
        })
    }

    /// Attach a diagonal stabilisation term, evaluated per cell.
    pub fn with_damping(mut self, term: &Expr) -> Result<Self, ExprError> {
        let local = localize(term, self.unknown);
        check_volume(&local)?;
        self.damping = Some(local);
        Ok(self)
    }
}
