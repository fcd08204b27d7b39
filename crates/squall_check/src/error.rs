use thiserror::Error;

use crate::solver::{LpError, SolverError};
use crate::storage::matrix::MatrixError;

#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Matrix(#[from] MatrixError),

    #[error(transparent)]
    Solver(#[from] SolverError),

    #[error(transparent)]
    Lp(#[from] LpError),

    #[error("input invariant violation: {0}")]
    InputInvariantViolation(String),

    #[error("unknown label: {0}")]
    UnknownLabel(String),

    #[error("unknown reward model: {0}")]
    UnknownRewardModel(String),

    #[error("the property needs a reward model but the model has none")]
    MissingRewardModel,

    #[error("unsupported property: {0}")]
    UnsupportedProperty(String),
}
