//! Reachability probabilities: unbounded and step-bounded until, next, and
//! the qualitative variants.

use squall_parser::property::{Query, TimeBound};

use crate::checker::{CheckResult, require_direction};
use crate::error::CheckError;
use crate::graph;
use crate::models::Model;
use crate::scheduler::Scheduler;
use crate::solver::linear::{LinearEquationSolver, LinearSolutionMethod};
use crate::solver::minmax::{MinMaxEquationSolver, MinMaxSolutionMethod};
use crate::solver::SolveStatus;
use crate::storage::BitVector;
use crate::vector::{set_vector_values, set_vector_values_to};
use crate::{CheckConfig, OptimizationDirection, SolutionMethod};

pub(crate) fn linear_method(config: &CheckConfig) -> LinearSolutionMethod<f64> {
    match config.method {
        SolutionMethod::Jacobi => LinearSolutionMethod::Jacobi,
        SolutionMethod::GaussSeidel => LinearSolutionMethod::GaussSeidel,
        SolutionMethod::Sor => LinearSolutionMethod::Sor {
            omega: config.omega,
        },
        // min-max methods fall back to the default linear engine
        SolutionMethod::ValueIteration | SolutionMethod::PolicyIteration => {
            LinearSolutionMethod::GaussSeidel
        }
    }
}

pub(crate) fn minmax_method(config: &CheckConfig) -> MinMaxSolutionMethod {
    match config.method {
        SolutionMethod::PolicyIteration => MinMaxSolutionMethod::PolicyIteration,
        _ => MinMaxSolutionMethod::ValueIteration,
    }
}

/// `P [ phi U psi ]` with an optional bound, dispatched on the model kind.
pub(crate) fn until_probabilities(
    model: &Model<f64>,
    phi: &BitVector,
    psi: &BitVector,
    bound: TimeBound,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    match bound {
        TimeBound::Unbounded => until_unbounded(model, phi, psi, direction, config),
        TimeBound::Steps(steps) => {
            if model.is_continuous_time() {
                // a discrete bound on continuous time reads as a time bound
                super::timed::bounded_until(model, phi, psi, 0.0, steps as f64, direction, config)
            } else {
                until_step_bounded(model, phi, psi, steps, direction, config)
            }
        }
        TimeBound::Time(upper) => {
            super::timed::bounded_until(model, phi, psi, 0.0, upper, direction, config)
        }
        TimeBound::Interval { lower, upper } => {
            super::timed::bounded_until(model, phi, psi, lower, upper, direction, config)
        }
    }
}

fn until_unbounded(
    model: &Model<f64>,
    phi: &BitVector,
    psi: &BitVector,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let state_count = model.state_count();
    let transitions = model.transitions();
    let backward = model.backward_transitions();

    if let Model::Smg { .. } = model {
        return game_until(model, phi, psi, direction, config);
    }

    if !model.is_nondeterministic() {
        let (prob0, prob1) = graph::prob01(&backward, phi, psi);
        let maybe = (&prob0 | &prob1).complement();

        let mut values = vec![0.0; state_count];
        set_vector_values_to(&mut values, &prob1, 1.0);
        let mut status = SolveStatus::Converged { iterations: 0 };
        if !maybe.none_set() {
            let submatrix = transitions.submatrix(false, &maybe, &maybe, false)?;
            let b = transitions.constrained_row_sum_vector(&maybe, &prob1);
            let mut x = vec![0.0; maybe.count_ones()];
            let mut solver = LinearEquationSolver::new(
                &submatrix,
                linear_method(config),
                config.precision,
                config.criterion,
                config.max_iterations,
            )?;
            status = solver.solve(&mut x, &b)?;
            set_vector_values(&mut values, &maybe, &x);
        }
        return Ok(CheckResult::numeric(values, status));
    }

    let direction = require_direction(model, direction)?;
    let (prob0, prob1) = match direction {
        OptimizationDirection::Maximize => graph::prob01_max(transitions, &backward, phi, psi),
        OptimizationDirection::Minimize => graph::prob01_min(transitions, &backward, phi, psi),
    };
    let maybe = (&prob0 | &prob1).complement();

    let mut values = vec![0.0; state_count];
    set_vector_values_to(&mut values, &prob1, 1.0);
    let mut status = SolveStatus::Converged { iterations: 0 };
    let mut scheduler = None;
    if !maybe.none_set() {
        let submatrix = transitions.submatrix(true, &maybe, &maybe, false)?;
        let b = transitions.constrained_group_sum_vector(&maybe, &prob1);
        let mut x = vec![0.0; maybe.count_ones()];
        let mut solver = MinMaxEquationSolver::new(
            &submatrix,
            minmax_method(config),
            config.precision,
            config.criterion,
            config.max_iterations,
        )
        .with_scheduler_tracking(config.track_scheduler);
        let (solve_status, partial) = solver.solve(Some(direction), &mut x, &b)?;
        status = solve_status;
        set_vector_values(&mut values, &maybe, &x);
        scheduler = partial.map(|partial| expand_scheduler(&maybe, &partial, state_count));
    }
    Ok(CheckResult::numeric(values, status).with_scheduler(scheduler))
}

/// Splice a maybe-state scheduler into a full-state one; states outside the
/// maybe set have no real choice to make and keep choice 0.
fn expand_scheduler(maybe: &BitVector, partial: &Scheduler, state_count: usize) -> Scheduler {
    let mut choices = vec![0usize; state_count];
    for (local, state) in maybe.iter().enumerate() {
        choices[state] = partial.choice(local);
    }
    Scheduler::new(choices)
}

fn until_step_bounded(
    model: &Model<f64>,
    phi: &BitVector,
    psi: &BitVector,
    steps: u64,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let state_count = model.state_count();
    let transitions = model.transitions();
    // states that may still move: phi without psi
    let maybe = {
        let mut m = phi.clone();
        m -= psi;
        m
    };

    let mut values = vec![0.0; state_count];
    set_vector_values_to(&mut values, psi, 1.0);
    if !maybe.none_set() {
        if model.is_nondeterministic() {
            let direction = require_direction(model, direction)?;
            let submatrix = transitions.submatrix(true, &maybe, &maybe, false)?;
            let b = transitions.constrained_group_sum_vector(&maybe, psi);
            let mut x = vec![0.0; maybe.count_ones()];
            let mut solver = MinMaxEquationSolver::new(
                &submatrix,
                MinMaxSolutionMethod::ValueIteration,
                config.precision,
                config.criterion,
                config.max_iterations,
            );
            solver.repeated_multiply_and_reduce(Some(direction), &mut x, Some(&b), steps)?;
            set_vector_values(&mut values, &maybe, &x);
        } else {
            let submatrix = transitions.submatrix(false, &maybe, &maybe, false)?;
            let b = transitions.constrained_row_sum_vector(&maybe, psi);
            let mut x = vec![0.0; maybe.count_ones()];
            let mut solver = LinearEquationSolver::new(
                &submatrix,
                LinearSolutionMethod::Power,
                config.precision,
                config.criterion,
                config.max_iterations,
            )?;
            solver.repeated_multiply(&mut x, Some(&b), steps)?;
            set_vector_values(&mut values, &maybe, &x);
        }
    }
    Ok(CheckResult::numeric(
        values,
        SolveStatus::Converged { iterations: steps },
    ))
}

/// `P [ X psi ]`: a single multiplication, no solve.
pub(crate) fn next_probabilities(
    model: &Model<f64>,
    psi: &BitVector,
    direction: Option<OptimizationDirection>,
) -> Result<CheckResult, CheckError> {
    let transitions = model.transitions();
    let state_count = model.state_count();
    let values = if model.is_nondeterministic() {
        let direction = require_direction(model, direction)?;
        let full = BitVector::full(state_count);
        let b = transitions.constrained_group_sum_vector(&full, psi);
        let x = vec![0.0; state_count];
        let mut result = vec![0.0; state_count];
        transitions.multiply_and_reduce(direction, &x, Some(&b), &mut result, None)?;
        result
    } else {
        let full = BitVector::full(state_count);
        transitions.constrained_row_sum_vector(&full, psi)
    };
    Ok(CheckResult::numeric(
        values,
        SolveStatus::Converged { iterations: 1 },
    ))
}

/// Qualitative until answered straight from the graph analysis.
pub(crate) fn qualitative_until(
    model: &Model<f64>,
    phi: &BitVector,
    psi: &BitVector,
    query: Query,
    direction: Option<OptimizationDirection>,
) -> Result<CheckResult, CheckError> {
    let transitions = model.transitions();
    let backward = model.backward_transitions();
    if matches!(model, Model::Smg { .. }) {
        return Err(CheckError::UnsupportedProperty(
            "qualitative queries are not available for games".to_string(),
        ));
    }
    let truth = if model.is_nondeterministic() {
        let direction = require_direction(model, direction)?;
        match (query, direction) {
            (Query::QualitativeGreaterZero, OptimizationDirection::Maximize) => {
                graph::prob_greater0e(&backward, phi, psi)
            }
            (Query::QualitativeGreaterZero, OptimizationDirection::Minimize) => {
                graph::prob_greater0a(transitions, &backward, phi, psi)
            }
            (Query::QualitativeOne, OptimizationDirection::Maximize) => {
                graph::prob1e(transitions, &backward, phi, psi)
            }
            (Query::QualitativeOne, OptimizationDirection::Minimize) => {
                graph::prob1a(transitions, &backward, phi, psi)
            }
            (Query::Quantitative, _) => unreachable!("dispatched as qualitative"),
        }
    } else {
        match query {
            Query::QualitativeGreaterZero => graph::prob_greater0(&backward, phi, psi),
            Query::QualitativeOne => {
                let greater0 = graph::prob_greater0(&backward, phi, psi);
                graph::prob1(&backward, phi, &greater0)
            }
            Query::Quantitative => unreachable!("dispatched as qualitative"),
        }
    };
    Ok(CheckResult::truth(truth))
}

/// Game reachability: player one follows the requested direction, the
/// opponent plays the opposite one. Value iteration from the zero vector
/// converges to the least fixpoint, which is the game value.
fn game_until(
    model: &Model<f64>,
    phi: &BitVector,
    psi: &BitVector,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let player_one = model
        .player_one_states()
        .expect("games carry a player partition");
    let direction = direction.ok_or(CheckError::Solver(
        crate::solver::SolverError::MissingDirection,
    ))?;
    let transitions = model.transitions();
    let state_count = model.state_count();

    let maybe = {
        let mut m = phi.clone();
        m -= psi;
        m
    };
    let mut values = vec![0.0; state_count];
    set_vector_values_to(&mut values, psi, 1.0);
    let mut status = SolveStatus::Converged { iterations: 0 };
    if !maybe.none_set() {
        let submatrix = transitions.submatrix(true, &maybe, &maybe, false)?;
        let b = transitions.constrained_group_sum_vector(&maybe, psi);
        let local_player_one = player_one.restrict(&maybe);
        let mut x = vec![0.0; maybe.count_ones()];
        let mut solver = MinMaxEquationSolver::new(
            &submatrix,
            MinMaxSolutionMethod::ValueIteration,
            config.precision,
            config.criterion,
            config.max_iterations,
        );
        status = solver.solve_game(
            &local_player_one,
            direction,
            super::opposite(direction),
            &mut x,
            &b,
        )?;
        set_vector_values(&mut values, &maybe, &x);
    }
    Ok(CheckResult::numeric(values, status))
}
