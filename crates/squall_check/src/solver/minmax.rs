//! Solvers for the min-max (Bellman) equation systems of nondeterministic
//! models: `x = opt_i (P_i x + b_i)` with the optimisation ranging over the
//! row group of each state.

use tracing::{debug, warn};

use crate::scheduler::Scheduler;
use crate::solver::linear::{LinearEquationSolver, LinearSolutionMethod};
use crate::solver::{SolveStatus, SolverError};
use crate::storage::{BitVector, SparseMatrix};
use crate::{ConvergenceCriterion, OptimizationDirection, SolverScalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MinMaxSolutionMethod {
    ValueIteration,
    PolicyIteration,
}

/// Min-max solver over a row-grouped matrix. The unknown vector has one
/// entry per row group (state); `b` has one entry per row.
pub struct MinMaxEquationSolver<'a, T> {
    matrix: &'a SparseMatrix<T>,
    method: MinMaxSolutionMethod,
    precision: T,
    criterion: ConvergenceCriterion,
    max_iterations: u64,
    /// Direction fixed at construction; a per-call direction must agree.
    direction: Option<OptimizationDirection>,
    track_scheduler: bool,
    scratch: Vec<T>,
}

impl<'a, T: SolverScalar> MinMaxEquationSolver<'a, T> {
    pub fn new(
        matrix: &'a SparseMatrix<T>,
        method: MinMaxSolutionMethod,
        precision: T,
        criterion: ConvergenceCriterion,
        max_iterations: u64,
    ) -> Self {
        Self {
            matrix,
            method,
            precision,
            criterion,
            max_iterations,
            direction: None,
            track_scheduler: false,
            scratch: Vec::new(),
        }
    }

    pub fn with_direction(mut self, direction: OptimizationDirection) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_scheduler_tracking(mut self, track: bool) -> Self {
        self.track_scheduler = track;
        self
    }

    fn resolve_direction(
        &self,
        requested: Option<OptimizationDirection>,
    ) -> Result<OptimizationDirection, SolverError> {
        match (self.direction, requested) {
            (Some(declared), Some(requested)) if declared != requested => {
                Err(SolverError::DirectionMismatch {
                    declared,
                    requested,
                })
            }
            (Some(declared), _) => Ok(declared),
            (None, Some(requested)) => Ok(requested),
            (None, None) => Err(SolverError::MissingDirection),
        }
    }

    /// Solve the equation system. Returns the status together with the
    /// optimizing scheduler when tracking was requested.
    pub fn solve(
        &mut self,
        direction: Option<OptimizationDirection>,
        x: &mut [T],
        b: &[T],
    ) -> Result<(SolveStatus, Option<Scheduler>), SolverError> {
        let direction = self.resolve_direction(direction)?;
        match self.method {
            MinMaxSolutionMethod::ValueIteration => self.value_iteration(direction, x, b),
            MinMaxSolutionMethod::PolicyIteration => self.policy_iteration(direction, x, b),
        }
    }

    /// `n` rounds of `x <- opt(P x + b)`, the step-bounded query engine.
    pub fn repeated_multiply_and_reduce(
        &mut self,
        direction: Option<OptimizationDirection>,
        x: &mut [T],
        b: Option<&[T]>,
        n: u64,
    ) -> Result<(), SolverError> {
        let direction = self.resolve_direction(direction)?;
        self.ensure_scratch();
        for _ in 0..n {
            self.matrix
                .multiply_and_reduce(direction, x, b, &mut self.scratch, None)?;
            x.copy_from_slice(&self.scratch);
        }
        Ok(())
    }

    fn value_iteration(
        &mut self,
        direction: OptimizationDirection,
        x: &mut [T],
        b: &[T],
    ) -> Result<(SolveStatus, Option<Scheduler>), SolverError> {
        self.ensure_scratch();
        let mut status = SolveStatus::IterationCapReached;
        for iteration in 0..self.max_iterations {
            self.matrix
                .multiply_and_reduce(direction, x, Some(b), &mut self.scratch, None)?;
            let mut max_change = T::zero();
            for (old, new) in x.iter().zip(&self.scratch) {
                max_change = max_change.max(change(self.criterion, *old, *new));
            }
            x.copy_from_slice(&self.scratch);
            if max_change < self.precision {
                debug!(iterations = iteration + 1, "value iteration converged");
                status = SolveStatus::Converged {
                    iterations: iteration + 1,
                };
                break;
            }
        }
        if !status.converged() {
            warn!(
                max_iterations = self.max_iterations,
                "value iteration hit the iteration cap"
            );
        }

        let scheduler = if self.track_scheduler {
            // one extra sweep records the argopt of the final iterate
            let mut choices = vec![0usize; self.matrix.row_group_count()];
            self.matrix.multiply_and_reduce(
                direction,
                x,
                Some(b),
                &mut self.scratch,
                Some(&mut choices),
            )?;
            Some(Scheduler::new(choices))
        } else {
            None
        };
        Ok((status, scheduler))
    }

    fn policy_iteration(
        &mut self,
        direction: OptimizationDirection,
        x: &mut [T],
        b: &[T],
    ) -> Result<(SolveStatus, Option<Scheduler>), SolverError> {
        self.ensure_scratch();
        let group_count = self.matrix.row_group_count();

        // derive the initial scheduler from one improvement step on the
        // initial vector
        let mut choices = vec![0usize; group_count];
        self.matrix.multiply_and_reduce(
            direction,
            x,
            Some(b),
            &mut self.scratch,
            Some(&mut choices),
        )?;

        let mut status = SolveStatus::IterationCapReached;
        for round in 0..self.max_iterations {
            // evaluate the induced deterministic system exactly
            let induced = self.matrix.select_group_rows(&choices)?;
            let induced_b: Vec<T> = choices
                .iter()
                .enumerate()
                .map(|(group, &choice)| b[self.matrix.rows_of_group(group).start + choice])
                .collect();
            let mut evaluation = LinearEquationSolver::new(
                &induced,
                LinearSolutionMethod::GaussSeidel,
                self.precision,
                self.criterion,
                self.max_iterations,
            )?;
            let inner = evaluation.solve(x, &induced_b)?;

            // improve: one reduction sweep with choice recording
            let mut improved = vec![0usize; group_count];
            self.matrix.multiply_and_reduce(
                direction,
                x,
                Some(b),
                &mut self.scratch,
                Some(&mut improved),
            )?;
            if improved == choices {
                debug!(rounds = round + 1, "policy iteration reached a fixpoint");
                status = inner;
                break;
            }
            choices = improved;
        }
        if !status.converged() {
            warn!(
                max_iterations = self.max_iterations,
                "policy iteration hit the iteration cap"
            );
        }

        let scheduler = self.track_scheduler.then(|| Scheduler::new(choices));
        Ok((status, scheduler))
    }

    /// Value iteration for a two-player reachability game: groups owned by
    /// player one optimize towards `player_one_direction`, all others
    /// towards `player_two_direction`. Starting from the zero vector this
    /// converges to the least fixpoint.
    pub fn solve_game(
        &mut self,
        player_one_states: &BitVector,
        player_one_direction: OptimizationDirection,
        player_two_direction: OptimizationDirection,
        x: &mut [T],
        b: &[T],
    ) -> Result<SolveStatus, SolverError> {
        assert_eq!(player_one_states.len(), self.matrix.row_group_count());
        self.ensure_scratch();
        for iteration in 0..self.max_iterations {
            let mut max_change = T::zero();
            for group in 0..self.matrix.row_group_count() {
                let direction = if player_one_states.get(group) {
                    player_one_direction
                } else {
                    player_two_direction
                };
                let mut best: Option<T> = None;
                for row in self.matrix.rows_of_group(group) {
                    let (columns, values) = self.matrix.row(row);
                    let mut value = b[row];
                    for (&c, &v) in columns.iter().zip(values) {
                        value += v * x[c];
                    }
                    best = Some(match best {
                        None => value,
                        Some(current) => match direction {
                            OptimizationDirection::Minimize => current.min(value),
                            OptimizationDirection::Maximize => current.max(value),
                        },
                    });
                }
                let value = best.unwrap_or_else(T::zero);
                max_change = max_change.max(change(self.criterion, x[group], value));
                self.scratch[group] = value;
            }
            x.copy_from_slice(&self.scratch);
            if max_change < self.precision {
                debug!(iterations = iteration + 1, "game value iteration converged");
                return Ok(SolveStatus::Converged {
                    iterations: iteration + 1,
                });
            }
        }
        warn!(
            max_iterations = self.max_iterations,
            "game value iteration hit the iteration cap"
        );
        Ok(SolveStatus::IterationCapReached)
    }

    fn ensure_scratch(&mut self) {
        let length = self.matrix.row_group_count();
        if self.scratch.len() != length {
            self.scratch = vec![T::zero(); length];
        }
    }
}

fn change<T: SolverScalar>(criterion: ConvergenceCriterion, old: T, new: T) -> T {
    let difference = (new - old).abs();
    match criterion {
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
