use serde::Serialize;

pub mod checker;
pub mod error;
pub mod graph;
pub mod models;
pub mod numerical;
pub mod rewards;
pub mod scheduler;
pub mod solver;
pub mod storage;
pub(crate) mod vector;

pub use checker::{CheckResult, CheckValues, check};
pub use error::CheckError;
pub use models::Model;
pub use squall_parser::property::OptimizationDirection;

/// Numeric domain of a sparse matrix. Instantiated with `f64` by the
/// dispatcher; the bound keeps the matrix and graph code usable with other
/// exact domains.
pub trait Scalar: Copy + PartialOrd + std::fmt::Debug + num_traits::NumAssign {}
impl<T> Scalar for T where T: Copy + PartialOrd + std::fmt::Debug + num_traits::NumAssign {}

/// Scalars the iterative solvers can work with.
pub trait SolverScalar: Scalar + num_traits::Float + std::iter::Sum {}
impl<T> SolverScalar for T where T: Scalar + num_traits::Float + std::iter::Sum {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolutionMethod {
    Jacobi,
    GaussSeidel,
    Sor,
    ValueIteration,
    PolicyIteration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConvergenceCriterion {
    Absolute,
    Relative,
}

/// Configuration record consumed by a single property check. There is no
/// process-wide state; everything the solvers need travels through here.
#[derive(Debug, Clone, Serialize)]
pub struct CheckConfig {
    /// Convergence threshold for the iterative solvers.
    pub precision: f64,
    /// Iteration cap. Hitting it yields `IterationCapReached`, not an error.
    pub max_iterations: u64,
    pub criterion: ConvergenceCriterion,
    pub method: SolutionMethod,
    /// SOR relaxation factor, only meaningful for `SolutionMethod::Sor`.
    pub omega: f64,
    /// Record the optimizing choice per state while solving min-max systems.
    pub track_scheduler: bool,
    /// Pre-declared optimization direction for nondeterministic models.
    pub direction: Option<OptimizationDirection>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            precision: 1e-6,
            max_iterations: 20_000,
            criterion: ConvergenceCriterion::Absolute,
            method: SolutionMethod::GaussSeidel,
            omega: 0.9,
            track_scheduler: false,
            direction: None,
        }
    }
}
