//! Expected-reward properties: reachability, cumulative, instantaneous and
//! expected time.

use squall_parser::property::TimeBound;

use crate::checker::reachability::{linear_method, minmax_method};
use crate::checker::{CheckResult, require_direction};
use crate::error::CheckError;
use crate::graph;
use crate::models::Model;
use crate::rewards::RewardModel;
use crate::solver::SolveStatus;
use crate::solver::linear::{LinearEquationSolver, LinearSolutionMethod};
use crate::solver::minmax::MinMaxEquationSolver;
use crate::storage::{BitVector, MecDecomposition, SccDecomposition};
use crate::vector::{select_group_row_values, set_vector_values, set_vector_values_to};
use crate::{CheckConfig, OptimizationDirection};

/// Per-row reward vector with Markovian rewards already divided by the exit
/// rates, ready to serve as a right-hand side.
fn rate_scaled_row_rewards(model: &Model<f64>, rewards: &RewardModel<f64>) -> Vec<f64> {
    let transitions = model.transitions();
    let mut per_row = rewards.total_reward_vector(transitions);
    if let Some(exit_rates) = model.exit_rates() {
        let timed = model.markovian_states();
        for state in 0..model.state_count() {
            if timed.is_none_or(|m| m.get(state)) {
                for row in transitions.rows_of_group(state) {
                    per_row[row] /= exit_rates[state];
                }
            }
        }
    }
    per_row
}

/// `R [ F psi ]`: expected accumulated reward until `psi` is reached.
pub(crate) fn reachability_rewards(
    model: &Model<f64>,
    rewards: &RewardModel<f64>,
    psi: &BitVector,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let per_row = rate_scaled_row_rewards(model, rewards);
    expected_rewards(model, per_row, psi, direction, config)
}

/// `T [ F psi ]`: expected time, i.e. reward one per unit of time spent in
/// timed states.
pub(crate) fn expected_time(
    model: &Model<f64>,
    psi: &BitVector,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let transitions = model.transitions();
    let exit_rates = match model.exit_rates() {
        Some(rates) => rates,
        None => {
            return Err(CheckError::UnsupportedProperty(format!(
                "expected time needs a continuous-time model, not a {}",
                model.kind_name()
            )));
        }
    };
    let mut per_row = vec![0.0; transitions.row_count()];
    for state in 0..model.state_count() {
        let timed = model
            .markovian_states()
            .is_none_or(|markovian| markovian.get(state));
        if timed {
            for row in transitions.rows_of_group(state) {
                per_row[row] = 1.0 / exit_rates[state];
            }
        }
    }
    expected_rewards(model, per_row, psi, direction, config)
}

/// The shared solve: infinity-state preprocessing, then the maybe-state
/// equation system with the reward vector as right-hand side.
fn expected_rewards(
    model: &Model<f64>,
    per_row_rewards: Vec<f64>,
    psi: &BitVector,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    if matches!(model, Model::Smg { .. }) {
        return Err(CheckError::UnsupportedProperty(
            "expected rewards are not available for games".to_string(),
        ));
    }
    let state_count = model.state_count();
    let transitions = model.transitions();
    let backward = model.backward_transitions();

    let infinity = if !model.is_nondeterministic() {
        // deterministic: infinite wherever psi is not reached almost surely
        let greater0 = graph::prob_greater0(&backward, &BitVector::full(state_count), psi);
        graph::prob1(&backward, &BitVector::full(state_count), &greater0).complement()
    } else {
        let direction = require_direction(model, direction)?;
        match direction {
            OptimizationDirection::Minimize => {
                // every scheduler reaches a goal-free bottom SCC with
                // positive probability
                let sccs =
                    SccDecomposition::new(transitions, Some(&psi.complement()), true, true);
                let mut union = BitVector::new(state_count);
                for block in sccs.iter() {
                    for &state in block {
                        union.set(state, true);
                    }
                }
                if union.none_set() {
                    union
                } else {
                    graph::prob_greater0a(
                        transitions,
                        &backward,
                        &BitVector::full(state_count),
                        &union,
                    )
                }
            }
            OptimizationDirection::Maximize => {
                // some scheduler reaches a goal-free end component
                let mecs = MecDecomposition::new(transitions, &backward, Some(&psi.complement()));
                let union = mecs.state_union(state_count);
                if union.none_set() {
                    union
                } else {
                    graph::prob_greater0e(&backward, &BitVector::full(state_count), &union)
                }
            }
        }
    };

    let maybe = (&infinity | psi).complement();
    let mut values = vec![0.0; state_count];
    set_vector_values_to(&mut values, &infinity, f64::INFINITY);
    let mut status = SolveStatus::Converged { iterations: 0 };
    let mut scheduler = None;

    if !maybe.none_set() {
        if model.is_nondeterministic() {
            let direction = require_direction(model, direction)?;
            let submatrix = transitions.submatrix(true, &maybe, &maybe, false)?;
            let b = select_group_row_values(
                &maybe,
                transitions.row_group_indices(),
                &per_row_rewards,
            );
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
            scheduler = partial.map(|partial| {
                let mut choices = vec![0usize; state_count];
                for (local, state) in maybe.iter().enumerate() {
                    choices[state] = partial.choice(local);
                }
                crate::scheduler::Scheduler::new(choices)
            });
        } else {
            let submatrix = transitions.submatrix(false, &maybe, &maybe, false)?;
            let b: Vec<f64> = maybe.iter().map(|state| per_row_rewards[state]).collect();
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
    }
    Ok(CheckResult::numeric(values, status).with_scheduler(scheduler))
}

/// `R [ C<=k ]`: expected reward accumulated within the bound.
pub(crate) fn cumulative_rewards(
    model: &Model<f64>,
    rewards: &RewardModel<f64>,
    bound: TimeBound,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    match (bound, model.is_continuous_time()) {
        (TimeBound::Steps(steps), false) => {
            cumulative_steps(model, rewards, steps, direction, config)
        }
        (TimeBound::Steps(steps), true) => {
            super::timed::cumulative_time(model, rewards, steps as f64, config)
        }
        (TimeBound::Time(time), true) => super::timed::cumulative_time(model, rewards, time, config),
        (bound, _) => Err(CheckError::UnsupportedProperty(format!(
            "cumulative bound {bound:?} does not fit a {}",
            model.kind_name()
        ))),
    }
}

fn cumulative_steps(
    model: &Model<f64>,
    rewards: &RewardModel<f64>,
    steps: u64,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let transitions = model.transitions();
    let state_count = model.state_count();
    let per_row = rewards.total_reward_vector(transitions);
    let mut values = vec![0.0; state_count];
    if model.is_nondeterministic() {
        let direction = require_direction(model, direction)?;
        let mut solver = MinMaxEquationSolver::new(
            transitions,
            minmax_method(config),
            config.precision,
            config.criterion,
            config.max_iterations,
        );
        solver.repeated_multiply_and_reduce(
            Some(direction),
            &mut values,
            Some(&per_row),
            steps,
        )?;
    } else {
        let mut solver = LinearEquationSolver::new(
            transitions,
            LinearSolutionMethod::Power,
            config.precision,
            config.criterion,
            config.max_iterations,
        )?;
        solver.repeated_multiply(&mut values, Some(&per_row), steps)?;
    }
    Ok(CheckResult::numeric(
        values,
        SolveStatus::Converged { iterations: steps },
    ))
}

/// `R [ I=k ]`: expected state reward after exactly `k` steps (or at time
/// `t` for continuous models).
pub(crate) fn instantaneous_rewards(
    model: &Model<f64>,
    rewards: &RewardModel<f64>,
    bound: TimeBound,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let state_rewards = rewards
        .state_rewards()
        .ok_or_else(|| {
            CheckError::UnsupportedProperty(
                "instantaneous rewards need a state reward component".to_string(),
            )
        })?
        .to_vec();
    match (bound, model.is_continuous_time()) {
        (TimeBound::Steps(steps), false) => {
            instantaneous_steps(model, state_rewards, steps, direction, config)
        }
        (TimeBound::Steps(steps), true) => {
            super::timed::instantaneous_time(model, state_rewards, steps as f64, config)
        }
        (TimeBound::Time(time), true) => {
            super::timed::instantaneous_time(model, state_rewards, time, config)
        }
        (bound, _) => Err(CheckError::UnsupportedProperty(format!(
            "instantaneous bound {bound:?} does not fit a {}",
            model.kind_name()
        ))),
    }
}

fn instantaneous_steps(
    model: &Model<f64>,
    state_rewards: Vec<f64>,
    steps: u64,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let transitions = model.transitions();
    let mut values = state_rewards;
    if model.is_nondeterministic() {
        let direction = require_direction(model, direction)?;
        let mut solver = MinMaxEquationSolver::new(
            transitions,
            minmax_method(config),
            config.precision,
            config.criterion,
            config.max_iterations,
        );
        solver.repeated_multiply_and_reduce(Some(direction), &mut values, None, steps)?;
    } else {
        let mut solver = LinearEquationSolver::new(
            transitions,
            LinearSolutionMethod::Power,
            config.precision,
            config.criterion,
            config.max_iterations,
        )?;
        solver.repeated_multiply(&mut values, None, steps)?;
    }
    Ok(CheckResult::numeric(
        values,
        SolveStatus::Converged { iterations: steps },
    ))
}
