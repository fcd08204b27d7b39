use thiserror::Error;

use crate::storage::matrix::MatrixError;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error("SOR relaxation factor must lie in (0, 1), got {omega}")]
    InvalidOmega { omega: f64 },

    #[error("optimization direction was pre-declared as {declared:?} but requested as {requested:?}")]
    DirectionMismatch {
        declared: crate::OptimizationDirection,
        requested: crate::OptimizationDirection,
    },

    #[error("no optimization direction was pre-declared or supplied")]
    MissingDirection,
}
