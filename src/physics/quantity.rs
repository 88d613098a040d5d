use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of an unknown (potential, electron density, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuantityId(pub usize);

/// Identifier of a piecewise-constant cell coefficient (permittivity, doping, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoefficientId(pub usize);

impl fmt::Display for QuantityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "q{}", self.0)
    }
}

impl fmt::Display for CoefficientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "k{}", self.0)
    }
}

/// A scalar that is constant on every cell.
pub trait CellQuantity {
    fn eval(&self, cell: usize) -> f64;

    /// Number of stored cell values, `None` when any cell index is valid.
    fn stored_len(&self) -> Option<usize> {
        None
    }
}

/// Uniform value.
impl CellQuantity for f64 {
    #[inline]
    fn eval(&self, _cell: usize) -> f64 {
        *self
    }
}

/// Stored per-cell values.
impl CellQuantity for Vec<f64> {
    #[inline]
    fn eval(&self, cell: usize) -> f64 {
        self[cell]
    }

    fn stored_len(&self) -> Option<usize> {
        Some(self.len())
    }
}

impl CellQuantity for [f64] {
    #[inline]
    fn eval(&self, cell: usize) -> f64 {
        self[cell]
    }

    fn stored_len(&self) -> Option<usize> {
        Some(self.len())
    }
}

/// Values computed on demand from the cell index.
pub struct CellFn<F>(pub F);

impl<F> CellQuantity for CellFn<F>
where
    F: Fn(usize) -> f64,
{
    #[inline]
    fn eval(&self, cell: usize) -> f64 {
        (self.0)(cell)
    }
}

impl<T: CellQuantity + ?Sized> CellQuantity for &T {
    #[inline]
    fn eval(&self, cell: usize) -> f64 {
        (**self).eval(cell)
    }

    fn stored_len(&self) -> Option<usize> {
        (**self).stored_len()
    }
}

impl<T: CellQuantity + ?Sized> CellQuantity for Box<T> {
    #[inline]
    fn eval(&self, cell: usize) -> f64 {
        (**self).eval(cell)
    }

    fn stored_len(&self) -> Option<usize> {
        (**self).stored_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantity_sources_agree() {
        let stored = vec![1.0, 2.0, 3.0];
        let computed = CellFn(|c: usize| (c + 1) as f64);
        let boxed: Box<dyn CellQuantity> = Box::new(stored.clone());
        for cell in 0..3 {
            assert_eq!(stored.eval(cell), computed.eval(cell));
            assert_eq!(boxed.eval(cell), computed.eval(cell));
        }
        assert_eq!(4.5_f64.eval(17), 4.5);
        assert_eq!(boxed.stored_len(), Some(3));
        assert_eq!(stored[..2].stored_len(), Some(2));
        assert_eq!(computed.stored_len(), None);
        assert_eq!(4.5_f64.stored_len(), None);
    }
}
