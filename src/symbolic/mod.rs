pub mod expr;
pub mod integrand;
pub mod weak_form;

pub use expr::{
    div, exp, grad, ln, pow, sqrt, surface_integral, volume_integral, BinaryOp, Equation, Expr,
    Symbol, SymbolResolver, UnaryOp,
};
pub use integrand::Integrands;
pub use weak_form::{is_integral_form, weak_form};

/// Failures of the symbolic layer. All of them are construction-time errors:
/// re-running with the same equation reproduces them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    #[error("cannot derive weak form of `{expr}`")]
    WeakForm { expr: String },
    #[error("unsupported integrand `{expr}`: {reason}")]
    UnsupportedIntegrand { expr: String, reason: &'static str },
    #[error("cannot differentiate `{expr}`")]
    NotDifferentiable { expr: String },
    #[error("cannot evaluate `{expr}` pointwise")]
    NotEvaluable { expr: String },
    #[error("symbol `{symbol}` has no value in this context")]
    UnresolvedSymbol { symbol: String },
}
