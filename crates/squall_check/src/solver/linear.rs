//! Iterative solvers for the linear fixpoint systems `x = P x + b` arising
//! from deterministic models, where `P` is the (substochastic) maybe-state
//! submatrix of a transition matrix.

use tracing::{debug, warn};

use crate::solver::{SolveStatus, SolverError};
use crate::storage::SparseMatrix;
use crate::{ConvergenceCriterion, SolverScalar};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinearSolutionMethod<T> {
    Jacobi,
    GaussSeidel,
    /// Successive over-relaxation; under-relaxation (omega < 1) is always
    /// safe for substochastic systems, omega >= 1 is rejected.
    Sor { omega: T },
    /// Plain fixpoint iteration `x <- P x + b`, the repeated-multiply engine
    /// behind step-bounded queries.
    Power,
}

/// Solver for `x = P x + b`, iterating until the per-component update drops
/// below the precision or the iteration cap is hit. The scratch vector is
/// allocated on first use and retained across calls that keep the matrix
/// dimensions.
pub struct LinearEquationSolver<'a, T> {
    matrix: &'a SparseMatrix<T>,
    method: LinearSolutionMethod<T>,
    precision: T,
    criterion: ConvergenceCriterion,
    max_iterations: u64,
    scratch: Vec<T>,
}

impl<'a, T: SolverScalar> LinearEquationSolver<'a, T> {
    pub fn new(
        matrix: &'a SparseMatrix<T>,
        method: LinearSolutionMethod<T>,
        precision: T,
        criterion: ConvergenceCriterion,
        max_iterations: u64,
    ) -> Result<Self, SolverError> {
        if let LinearSolutionMethod::Sor { omega } = method {
            if omega <= T::zero() || omega >= T::one() {
                return Err(SolverError::InvalidOmega {
                    omega: omega.to_f64().unwrap_or(f64::NAN),
                });
            }
        }
        Ok(Self {
            matrix,
            method,
            precision,
            criterion,
            max_iterations,
            scratch: Vec::new(),
        })
    }

    /// Iterate to the fixpoint. `x` carries the initial guess in and the
    /// last iterate out.
    pub fn solve(&mut self, x: &mut [T], b: &[T]) -> Result<SolveStatus, SolverError> {
        match self.method {
            LinearSolutionMethod::Jacobi => self.solve_off_diagonal(x, b, true),
            LinearSolutionMethod::GaussSeidel => self.solve_in_place(x, b, T::one()),
            LinearSolutionMethod::Sor { omega } => self.solve_in_place(x, b, omega),
            LinearSolutionMethod::Power => self.solve_off_diagonal(x, b, false),
        }
    }

    /// `n` steps of `x <- P x` (or `x <- P x + b`). Scratch is allocated
    /// once and reused across all steps.
    pub fn repeated_multiply(
        &mut self,
        x: &mut [T],
        b: Option<&[T]>,
        n: u64,
    ) -> Result<(), SolverError> {
        self.ensure_scratch(x.len())?;
        for _ in 0..n {
            self.matrix.multiply_with_vector(x, &mut self.scratch)?;
            if let Some(b) = b {
                for (value, offset) in self.scratch.iter_mut().zip(b) {
                    *value += *offset;
                }
            }
            x.copy_from_slice(&self.scratch);
        }
        Ok(())
    }

    /// Jacobi (diagonal-scaled) and power iteration share this shape: a full
    /// sweep into the scratch vector, then a swap.
    fn solve_off_diagonal(
        &mut self,
        x: &mut [T],
        b: &[T],
        scale_diagonal: bool,
    ) -> Result<SolveStatus, SolverError> {
        self.ensure_scratch(x.len())?;
        check_vector(b.len(), self.matrix.row_count())?;

        for iteration in 0..self.max_iterations {
            let mut max_change = T::zero();
            for row in 0..self.matrix.row_count() {
                let (columns, values) = self.matrix.row(row);
                let mut sum = b[row];
                let mut diagonal = T::zero();
                for (&c, &v) in columns.iter().zip(values) {
                    if scale_diagonal && c == row {
                        diagonal = v;
                    } else {
                        sum += v * x[c];
                    }
                }
                let updated = if scale_diagonal {
                    sum / (T::one() - diagonal)
                } else {
                    sum
                };
                max_change = max_change.max(self.change(x[row], updated));
                self.scratch[row] = updated;
            }
            x.copy_from_slice(&self.scratch);
            if max_change < self.precision {
                debug!(iterations = iteration + 1, "linear solver converged");
                return Ok(SolveStatus::Converged {
                    iterations: iteration + 1,
                });
            }
        }
        warn!(
            max_iterations = self.max_iterations,
            "linear solver hit the iteration cap"
        );
        Ok(SolveStatus::IterationCapReached)
    }

    /// Gauss-Seidel / SOR sweep, updating `x` in place in ascending row
    /// order.
    fn solve_in_place(
        &mut self,
        x: &mut [T],
        b: &[T],
        omega: T,
    ) -> Result<SolveStatus, SolverError> {
        check_vector(x.len(), self.matrix.column_count())?;
        check_vector(x.len(), self.matrix.row_count())?;
        check_vector(b.len(), self.matrix.row_count())?;

        for iteration in 0..self.max_iterations {
            let mut max_change = T::zero();
            for row in 0..self.matrix.row_count() {
                let (columns, values) = self.matrix.row(row);
                let mut sum = b[row];
                let mut diagonal = T::zero();
                for (&c, &v) in columns.iter().zip(values) {
                    if c == row {
                        diagonal = v;
                    } else {
                        sum += v * x[c];
                    }
                }
                let updated =
                    (T::one() - omega) * x[row] + omega * sum / (T::one() - diagonal);
                max_change = max_change.max(self.change(x[row], updated));
                x[row] = updated;
            }
            if max_change < self.precision {
                debug!(iterations = iteration + 1, "linear solver converged");
                return Ok(SolveStatus::Converged {
                    iterations: iteration + 1,
                });
            }
        }
        warn!(
            max_iterations = self.max_iterations,
            "linear solver hit the iteration cap"
        );
        Ok(SolveStatus::IterationCapReached)
    }

    fn change(&self, old: T, new: T) -> T {
        let difference = (new - old).abs();
        match self.criterion {
            ConvergenceCriterion::Absolute => difference,
            ConvergenceCriterion::Relative => {
                if new == T::zero() {
                    if difference == T::zero() {
                        T::zero()
                    } else {
                        T::infinity()
                    }
                } else {
                    difference / new.abs()
                }
            }
        }
    }

    fn ensure_scratch(&mut self, length: usize) -> Result<(), SolverError> {
        check_vector(length, self.matrix.column_count())?;
        check_vector(length, self.matrix.row_count())?;
        if self.scratch.len() != length {
            self.scratch = vec![T::zero(); length];
        }
        Ok(())
    }
}

fn check_vector(actual: usize, expected: usize) -> Result<(), SolverError> {
    if actual != expected {
        return Err(crate::storage::matrix::MatrixError::DimensionMismatch { expected, actual }.into());
    }
    Ok(())
}
