//! Preconditioner selection for the Krylov solvers.
//!
//! Every kind except row scaling maps onto a kryst preconditioner. Row
//! scaling rescales the system itself before the solve.

use kryst::preconditioner::{builders, Preconditioner};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

use super::linear::LinearSolveError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum PreconditionerKind {
    None,
    #[default]
    Ilu0,
    /// Threshold incomplete LU: entries below `drop_tolerance` are dropped and
    /// at most `fill` entries are kept per L and U row.
    Ilut { drop_tolerance: f64, fill: usize },
    /// ILU of contiguous diagonal blocks, couplings between blocks ignored.
    BlockIlu { block_size: usize },
    Jacobi,
    RowScaling,
}

impl PreconditionerKind {
    /// The kryst preconditioner for this kind, not yet set up. `None` means
    /// the Krylov iteration runs unpreconditioned.
    pub fn build(&self) -> Result<Option<Box<dyn Preconditioner>>, LinearSolveError> {
        let built = match *self {
            PreconditionerKind::None | PreconditionerKind::RowScaling => return Ok(None),
            PreconditionerKind::Jacobi => builders::build_jacobi(),
            PreconditionerKind::Ilu0 => builders::build_ilu0(),
            PreconditionerKind::Ilut {
                drop_tolerance,
                fill,
            } => builders::build_ilut(drop_tolerance, fill, None),
            PreconditionerKind::BlockIlu { block_size } => builders::build_block_jacobi(block_size),
        };
        built
            .map(Some)
            .map_err(|e| LinearSolveError::Preconditioner(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PreconditionerKind::None => "none",
            PreconditionerKind::Ilu0 => "ilu0",
            PreconditionerKind::Ilut { .. } => "ilut",
            PreconditionerKind::BlockIlu { .. } => "block-ilu",
            PreconditionerKind::Jacobi => "jacobi",
            PreconditionerKind::RowScaling => "row-scaling",
        }
    }

    /// Factors each row of the system is multiplied by before the solve.
    pub fn row_scales(&self, a: &CsrMatrix<f64>) -> Vec<f64> {
        match self {
            PreconditionerKind::RowScaling => inverse_row_norms(a),
            _ => vec![1.0; a.nrows()],
        }
    }
}

/// `1 / ||a_i||_2` per row. Empty or zero rows keep scale 1.
pub fn inverse_row_norms(a: &CsrMatrix<f64>) -> Vec<f64> {
    a.row_iter()
        .map(|row| {
            let norm = row.values().iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                1.0 / norm
            } else {
                1.0
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    #[test]
    fn row_norms_ignore_empty_rows() {
        let mut coo = CooMatrix::new(3, 3);
        coo.push(0, 0, 3.0);
        coo.push(0, 2, 4.0);
        coo.push(2, 1, -2.0);
        let a = CsrMatrix::from(&coo);
        assert_eq!(inverse_row_norms(&a), vec![0.2, 1.0, 0.5]);
        assert_eq!(PreconditionerKind::Ilu0.row_scales(&a), vec![1.0; 3]);
        assert_eq!(PreconditionerKind::RowScaling.row_scales(&a), vec![0.2, 1.0, 0.5]);
    }

    #[test]
    fn every_kind_but_the_unpreconditioned_ones_builds_a_kryst_preconditioner() {
        let kinds = [
            (PreconditionerKind::None, false),
            (PreconditionerKind::RowScaling, false),
            (PreconditionerKind::Jacobi, true),
            (PreconditionerKind::Ilu0, true),
            (
                PreconditionerKind::Ilut {
                    drop_tolerance: 1e-4,
                    fill: 5,
                },
                true,
            ),
            (PreconditionerKind::BlockIlu { block_size: 4 }, true),
        ];
        for (kind, expected) in kinds {
            let built = kind.build().unwrap();
            assert_eq!(built.is_some(), expected, "{}", kind.name());
        }
    }

    #[test]
    fn kinds_round_trip_through_json() {
        let kind = PreconditionerKind::Ilut {
            drop_tolerance: 1e-3,
            fill: 7,
        };
        let json = serde_json::to_string(&kind).unwrap();
        assert_eq!(serde_json::from_str::<PreconditionerKind>(&json).unwrap(), kind);
    }
}
