use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use num_dual::{Dual64, DualNum};

use super::ExprError;
use crate::physics::quantity::{CoefficientId, QuantityId};

/// Leaf references an expression can make to simulation data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// The unknown function of a quantity.
    Unknown(QuantityId),
    /// The current per-cell iterate of a quantity (a known value).
    Iterate(QuantityId),
    /// A piecewise-constant cell coefficient.
    Coefficient(CoefficientId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Exp,
    Ln,
    Sqrt,
    Div,
    Grad,
    SurfaceIntegral,
    VolumeIntegral,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Constant(f64),
    Symbol(Symbol),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// `lhs = rhs`
#[derive(Clone, Debug, PartialEq)]
pub struct Equation {
    pub lhs: Expr,
    pub rhs: Expr,
}

impl Equation {
    pub fn new(lhs: Expr, rhs: Expr) -> Self {
        Self { lhs, rhs }
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.lhs, self.rhs)
    }
}

/// Supplies values for the leaves of an expression in a fixed evaluation
/// context (a cell, or a facet between two cells).
pub trait SymbolResolver {
    fn symbol(&self, symbol: &Symbol) -> Result<Dual64, ExprError>;
    /// Normal derivative of a symbol in this context.
    fn gradient(&self, symbol: &Symbol) -> Result<Dual64, ExprError>;
}

pub fn div(e: Expr) -> Expr {
    Expr::Unary(UnaryOp::Div, Box::new(e))
}

pub fn grad(e: Expr) -> Expr {
    Expr::Unary(UnaryOp::Grad, Box::new(e))
}

pub fn exp(e: Expr) -> Expr {
    Expr::Unary(UnaryOp::Exp, Box::new(e))
}

pub fn ln(e: Expr) -> Expr {
    Expr::Unary(UnaryOp::Ln, Box::new(e))
}

pub fn sqrt(e: Expr) -> Expr {
    Expr::Unary(UnaryOp::Sqrt, Box::new(e))
}

pub fn pow(base: Expr, exponent: impl Into<Expr>) -> Expr {
    Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent.into()))
}

pub fn surface_integral(e: Expr) -> Expr {
    Expr::Unary(UnaryOp::SurfaceIntegral, Box::new(e))
}

pub fn volume_integral(e: Expr) -> Expr {
    Expr::Unary(UnaryOp::VolumeIntegral, Box::new(e))
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Constant(value)
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Expr::Symbol(symbol)
    }
}

impl Expr {
    pub fn constant(value: f64) -> Self {
        Expr::Constant(value)
    }

    pub fn unknown(id: QuantityId) -> Self {
        Expr::Symbol(Symbol::Unknown(id))
    }

    pub fn iterate(id: QuantityId) -> Self {
        Expr::Symbol(Symbol::Iterate(id))
    }

    pub fn coefficient(id: CoefficientId) -> Self {
        Expr::Symbol(Symbol::Coefficient(id))
    }

    pub fn equals(self, rhs: impl Into<Expr>) -> Equation {
        Equation::new(self, rhs.into())
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Constant(c) if *c == 0.0)
    }

    fn is_one(&self) -> bool {
        matches!(self, Expr::Constant(c) if *c == 1.0)
    }

    /// True if any node satisfies `pred`.
    pub fn any(&self, pred: &impl Fn(&Expr) -> bool) -> bool {
        if pred(self) {
            return true;
        }
        match self {
            Expr::Constant(_) | Expr::Symbol(_) => false,
            Expr::Unary(_, x) => x.any(pred),
            Expr::Binary(_, a, b) => a.any(pred) || b.any(pred),
        }
    }

    pub fn contains_op(&self, op: UnaryOp) -> bool {
        self.any(&|e| matches!(e, Expr::Unary(o, _) if *o == op))
    }

    pub fn contains_symbol(&self, symbol: &Symbol) -> bool {
        self.any(&|e| matches!(e, Expr::Symbol(s) if s == symbol))
    }

    /// Distinct symbols in first-occurrence order.
    pub fn symbols(&self) -> Vec<Symbol> {
        fn walk(e: &Expr, out: &mut Vec<Symbol>) {
            match e {
                Expr::Constant(_) => {}
                Expr::Symbol(s) => {
                    if !out.contains(s) {
                        out.push(*s);
                    }
                }
                Expr::Unary(_, x) => walk(x, out),
                Expr::Binary(_, a, b) => {
                    walk(a, out);
                    walk(b, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, &mut out);
        out
    }

    /// Built only from numeric constants. Cell coefficients vary across the
    /// mesh and do not count.
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Constant(_) => true,
            Expr::Symbol(_) => false,
            Expr::Unary(UnaryOp::Neg | UnaryOp::Exp | UnaryOp::Ln | UnaryOp::Sqrt, x) => {
                x.is_constant()
            }
            Expr::Unary(..) => false,
            Expr::Binary(_, a, b) => a.is_constant() && b.is_constant(),
        }
    }

    /// Replace every sub-expression structurally equal to `from` by `to`.
    pub fn substitute(&self, from: &Expr, to: &Expr) -> Expr {
        if self == from {
            return to.clone();
        }
        match self {
            Expr::Constant(_) | Expr::Symbol(_) => self.clone(),
            Expr::Unary(op, x) => Expr::Unary(*op, Box::new(x.substitute(from, to))),
            Expr::Binary(op, a, b) => Expr::Binary(
                *op,
                Box::new(a.substitute(from, to)),
                Box::new(b.substitute(from, to)),
            ),
        }
    }

    /// Rebuild the tree with every symbol passed through `f`.
    pub fn map_symbols(&self, f: &impl Fn(&Symbol) -> Expr) -> Expr {
        match self {
            Expr::Constant(_) => self.clone(),
            Expr::Symbol(s) => f(s),
            Expr::Unary(op, x) => Expr::Unary(*op, Box::new(x.map_symbols(f))),
            Expr::Binary(op, a, b) => {
                Expr::Binary(*op, Box::new(a.map_symbols(f)), Box::new(b.map_symbols(f)))
            }
        }
    }

    // Simplifying constructors used by differentiation

    pub(crate) fn s_add(a: Expr, b: Expr) -> Expr {
        if let (Expr::Constant(x), Expr::Constant(y)) = (&a, &b) {
            return Expr::Constant(x + y);
        }
        if a.is_zero() {
            b
        } else if b.is_zero() {
            a
        } else {
            a + b
        }
    }

    pub(crate) fn s_sub(a: Expr, b: Expr) -> Expr {
        if let (Expr::Constant(x), Expr::Constant(y)) = (&a, &b) {
            return Expr::Constant(x - y);
        }
        if b.is_zero() {
            a
        } else if a.is_zero() {
            Self::s_neg(b)
        } else {
            a - b
        }
    }

    pub(crate) fn s_mul(a: Expr, b: Expr) -> Expr {
        if let (Expr::Constant(x), Expr::Constant(y)) = (&a, &b) {
            return Expr::Constant(x * y);
        }
        if a.is_zero() || b.is_zero() {
            Expr::Constant(0.0)
        } else if a.is_one() {
            b
        } else if b.is_one() {
            a
        } else {
            a * b
        }
    }

    pub(crate) fn s_div(a: Expr, b: Expr) -> Expr {
        if let (Expr::Constant(x), Expr::Constant(y)) = (&a, &b) {
            if *y != 0.0 {
                return Expr::Constant(x / y);
            }
        }
        if a.is_zero() {
            Expr::Constant(0.0)
        } else if b.is_one() {
            a
        } else {
            a / b
        }
    }

    pub(crate) fn s_neg(a: Expr) -> Expr {
        match a {
            Expr::Constant(x) => Expr::Constant(-x),
            Expr::Unary(UnaryOp::Neg, inner) => *inner,
            other => -other,
        }
    }

    /// Symbolic derivative with respect to `var`.
    ///
    /// Sub-expressions that do not mention `var` differentiate to zero, so
    /// `grad`, `div` and integral nodes only fail when they depend on `var`.
    pub fn derivative(&self, var: &Symbol) -> Result<Expr, ExprError> {
        if !self.contains_symbol(var) {
            return Ok(Expr::Constant(0.0));
        }
        let d = match self {
            Expr::Constant(_) => Expr::Constant(0.0),
            Expr::Symbol(s) => Expr::Constant(if s == var { 1.0 } else { 0.0 }),
            Expr::Unary(op, x) => {
                let dx = x.derivative(var)?;
                match op {
                    UnaryOp::Neg => Self::s_neg(dx),
                    UnaryOp::Exp => Self::s_mul(exp((**x).clone()), dx),
                    UnaryOp::Ln => Self::s_div(dx, (**x).clone()),
                    UnaryOp::Sqrt => {
                        Self::s_div(dx, Self::s_mul(Expr::Constant(2.0), sqrt((**x).clone())))
                    }
                    UnaryOp::Div
                    | UnaryOp::Grad
                    | UnaryOp::SurfaceIntegral
                    | UnaryOp::VolumeIntegral => {
                        return Err(ExprError::NotDifferentiable {
                            expr: self.to_string(),
                        })
                    }
                }
            }
            Expr::Binary(op, a, b) => {
                let (a, b) = ((**a).clone(), (**b).clone());
                let da = a.derivative(var)?;
                let db = b.derivative(var)?;
                match op {
                    BinaryOp::Add => Self::s_add(da, db),
                    BinaryOp::Sub => Self::s_sub(da, db),
                    BinaryOp::Mul => Self::s_add(Self::s_mul(da, b.clone()), Self::s_mul(a, db)),
                    BinaryOp::Div => Self::s_div(
                        Self::s_sub(Self::s_mul(da, b.clone()), Self::s_mul(a, db)),
                        Self::s_mul(b.clone(), b),
                    ),
                    BinaryOp::Pow if db.is_zero() => {
                        // d(a^n) = n a^(n-1) a'
                        let reduced = match &b {
                            Expr::Constant(n) => Expr::Constant(n - 1.0),
                            _ => b.clone() - 1.0,
                        };
                        Self::s_mul(Self::s_mul(b, pow(a, reduced)), da)
                    }
                    BinaryOp::Pow => {
                        // d(a^b) = a^b (b' ln a + b a' / a)
                        let inner = Self::s_add(
                            Self::s_mul(db, ln(a.clone())),
                            Self::s_div(Self::s_mul(b.clone(), da), a.clone()),
                        );
                        Self::s_mul(pow(a, b), inner)
                    }
                }
            }
        };
        Ok(d)
    }

    /// Evaluate with dual numbers. Derivative seeds come from the resolver.
    pub fn eval<R: SymbolResolver + ?Sized>(&self, r: &R) -> Result<Dual64, ExprError> {
        match self {
            Expr::Constant(c) => Ok(Dual64::from_re(*c)),
            Expr::Symbol(s) => r.symbol(s),
            Expr::Unary(op, x) => match op {
                UnaryOp::Neg => Ok(-x.eval(r)?),
                UnaryOp::Exp => Ok(x.eval(r)?.exp()),
                UnaryOp::Ln => Ok(x.eval(r)?.ln()),
                UnaryOp::Sqrt => Ok(x.eval(r)?.sqrt()),
                UnaryOp::Grad => match &**x {
                    Expr::Symbol(s) => r.gradient(s),
                    _ => Err(ExprError::NotEvaluable {
                        expr: self.to_string(),
                    }),
                },
                UnaryOp::Div | UnaryOp::SurfaceIntegral | UnaryOp::VolumeIntegral => {
                    Err(ExprError::NotEvaluable {
                        expr: self.to_string(),
                    })
                }
            },
            Expr::Binary(op, a, b) => {
                let va = a.eval(r)?;
                match op {
                    BinaryOp::Add => Ok(va + b.eval(r)?),
                    BinaryOp::Sub => Ok(va - b.eval(r)?),
                    BinaryOp::Mul => Ok(va * b.eval(r)?),
                    BinaryOp::Div => Ok(va / b.eval(r)?),
                    BinaryOp::Pow => match &**b {
                        Expr::Constant(n) if n.fract() == 0.0 && n.abs() < i32::MAX as f64 => {
                            Ok(va.powi(*n as i32))
                        }
                        Expr::Constant(n) => Ok(va.powf(*n)),
                        _ => Ok((va.ln() * b.eval(r)?).exp()),
                    },
                }
            }
        }
    }

    /// Plain value, discarding any derivative part.
    pub fn value<R: SymbolResolver + ?Sized>(&self, r: &R) -> Result<f64, ExprError> {
        Ok(self.eval(r)?.re)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $op:expr) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::Binary($op, Box::new(self), Box::new(rhs))
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                Expr::Binary($op, Box::new(self), Box::new(Expr::Constant(rhs)))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::Binary($op, Box::new(Expr::Constant(self)), Box::new(rhs))
            }
        }
    };
}

impl_binary_op!(Add, add, BinaryOp::Add);
impl_binary_op!(Sub, sub, BinaryOp::Sub);
impl_binary_op!(Mul, mul, BinaryOp::Mul);
impl_binary_op!(Div, div, BinaryOp::Div);

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Unary(UnaryOp::Neg, Box::new(self))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Unknown(q) => write!(f, "u{}", q.0),
            Symbol::Iterate(q) => write!(f, "u{}*", q.0),
            Symbol::Coefficient(c) => write!(f, "k{}", c.0),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Constant(c) => write!(f, "{c}"),
            Expr::Symbol(s) => write!(f, "{s}"),
            Expr::Unary(op, x) => {
                let name = match op {
                    UnaryOp::Neg => return write!(f, "-({x})"),
                    UnaryOp::Exp => "exp",
                    UnaryOp::Ln => "ln",
                    UnaryOp::Sqrt => "sqrt",
                    UnaryOp::Div => "div",
                    UnaryOp::Grad => "grad",
                    UnaryOp::SurfaceIntegral => "surface",
                    UnaryOp::VolumeIntegral => "volume",
                };
                write!(f, "{name}({x})")
            }
            Expr::Binary(op, a, b) => {
                let sym = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Sub => "-",
                    BinaryOp::Mul => "*",
                    BinaryOp::Div => "/",
                    BinaryOp::Pow => "^",
                };
                write!(f, "({a} {sym} {b})")
            }
        }
    }
}
