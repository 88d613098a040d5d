//! Gauss-theorem transformation of strong-form balance equations.
//!
//! `div(F) = f` becomes `surface(F) = volume(f)`, i.e.
//! `∮ F·n dA = ∫ f dV` on every control volume.

use super::expr::{surface_integral, volume_integral, Equation, Expr, UnaryOp};
use super::ExprError;

/// True if the equation already carries integral markers.
pub fn is_integral_form(eq: &Equation) -> bool {
    let marked = |e: &Expr| {
        e.contains_op(UnaryOp::SurfaceIntegral) || e.contains_op(UnaryOp::VolumeIntegral)
    };
    marked(&eq.lhs) || marked(&eq.rhs)
}

/// Integral form of `eq`. Equations already in integral form are returned
/// unchanged.
pub fn weak_form(eq: &Equation) -> Result<Equation, ExprError> {
    if is_integral_form(eq) {
        return Ok(eq.clone());
    }
    Ok(Equation {
        lhs: transform(&eq.lhs)?,
        rhs: transform(&eq.rhs)?,
    })
}

/// Transform one side of an equation.
///
/// A `div` node turns into a surface integral of its argument. Sums,
/// differences and negation distribute. A product or quotient with a numeric
/// constant operand keeps the constant outside. A cell coefficient is not
/// constant across a facet and cannot be pulled out of a divergence. Anything free of `div` is a volume
/// integral of itself. A `div` hidden under any other shape is rejected.
pub fn transform(e: &Expr) -> Result<Expr, ExprError> {
    match e {
        Expr::Unary(UnaryOp::Div, x) => Ok(surface_integral((**x).clone())),
        Expr::Unary(UnaryOp::SurfaceIntegral | UnaryOp::VolumeIntegral, _) => Ok(e.clone()),
        Expr::Binary(super::BinaryOp::Add, a, b) => Ok(transform(a)? + transform(b)?),
        Expr::Binary(super::BinaryOp::Sub, a, b) => Ok(transform(a)? - transform(b)?),
        Expr::Unary(UnaryOp::Neg, x) => Ok(-transform(x)?),
        Expr::Binary(super::BinaryOp::Mul, a, b) if a.is_constant() => {
            Ok((**a).clone() * transform(b)?)
        }
        Expr::Binary(super::BinaryOp::Mul, a, b) if b.is_constant() => {
            Ok(transform(a)? * (**b).clone())
        }
        Expr::Binary(super::BinaryOp::Div, a, b) if b.is_constant() => {
            Ok(transform(a)? / (**b).clone())
        }
        _ if !e.contains_op(UnaryOp::Div) => Ok(volume_integral(e.clone())),
        _ => Err(ExprError::WeakForm {
            expr: e.to_string(),
        }),
    }
}
