pub mod error;
pub mod linear;
pub(crate) mod lp;
pub mod minmax;

pub use error::SolverError;
pub use linear::{LinearEquationSolver, LinearSolutionMethod};
pub use lp::LpError;
pub use minmax::{MinMaxEquationSolver, MinMaxSolutionMethod};

use serde::Serialize;

/// Outcome of an iterative solve. Hitting the iteration cap is reported, not
/// raised: the caller receives the last iterate and decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    Converged { iterations: u64 },
    IterationCapReached,
}

impl SolveStatus {
    pub fn converged(&self) -> bool {
        matches!(self, SolveStatus::Converged { .. })
    }

    /// The weaker of two statuses, for checks composed of several solves.
    pub fn combine(self, other: SolveStatus) -> SolveStatus {
        match (self, other) {
            (SolveStatus::Converged { iterations: a }, SolveStatus::Converged { iterations: b }) => {
                SolveStatus::Converged {
                    iterations: a.max(b),
                }
            }
            _ => SolveStatus::IterationCapReached,
        }
    }
}
