//! Time-bounded analysis for continuous-time models: CTMC queries via
//! uniformisation and Fox-Glynn weights, Markov automata via digitisation.

use crate::checker::{CheckResult, require_direction};
use crate::error::CheckError;
use crate::models::Model;
use crate::numerical::{fox_glynn, max_exit_rate, uniformize};
use crate::rewards::RewardModel;
use crate::solver::SolveStatus;
use crate::solver::minmax::{MinMaxEquationSolver, MinMaxSolutionMethod};
use crate::storage::{BitVector, SparseMatrix, SparseMatrixBuilder};
use crate::vector::{set_vector_values, set_vector_values_to};
use crate::{CheckConfig, OptimizationDirection};

/// `P [ phi U[lower, upper] psi ]` on a continuous-time model.
pub(crate) fn bounded_until(
    model: &Model<f64>,
    phi: &BitVector,
    psi: &BitVector,
    lower: f64,
    upper: f64,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    if !(0.0 <= lower && lower <= upper && upper.is_finite()) {
        return Err(CheckError::InputInvariantViolation(format!(
            "invalid time interval [{lower}, {upper}]"
        )));
    }
    match model {
        Model::Ctmc { parts, exit_rates } => ctmc_bounded_until(
            &parts.transitions,
            exit_rates,
            phi,
            psi,
            lower,
            upper,
            config,
        ),
        Model::Ma {
            parts,
            exit_rates,
            markovian_states,
        } => {
            let direction = require_direction(model, direction)?;
            ma_bounded_until(
                &parts.transitions,
                exit_rates,
                markovian_states,
                phi,
                psi,
                lower,
                upper,
                direction,
                config,
            )
        }
        _ => Err(CheckError::UnsupportedProperty(format!(
            "time-bounded until needs a continuous-time model, not a {}",
            model.kind_name()
        ))),
    }
}

/// One transient pass: `acc = sum_k (w_k / W) * (P^k v)`.
fn transient_accumulate(
    uniformized: &SparseMatrix<f64>,
    rate_times_length: f64,
    precision: f64,
    v: &[f64],
) -> Result<Vec<f64>, CheckError> {
    let weights = fox_glynn(rate_times_length, precision)?;
    let mut current = v.to_vec();
    let mut scratch = vec![0.0; current.len()];
    let mut accumulated = vec![0.0; current.len()];
    for k in 0..=weights.right {
        if k >= weights.left {
            let weight = weights.weights[k - weights.left] / weights.total_weight;
            for (total, value) in accumulated.iter_mut().zip(&current) {
                *total += weight * value;
            }
        }
        if k < weights.right {
            uniformized.multiply_with_vector(&current, &mut scratch)?;
            std::mem::swap(&mut current, &mut scratch);
        }
    }
    Ok(accumulated)
}

fn ctmc_bounded_until(
    embedded: &SparseMatrix<f64>,
    exit_rates: &[f64],
    phi: &BitVector,
    psi: &BitVector,
    lower: f64,
    upper: f64,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let state_count = embedded.row_count();
    let lambda = max_exit_rate(exit_rates);

    // phase one: [0, upper - lower] towards psi, with psi and the states
    // outside phi absorbing
    let mut values = vec![0.0; state_count];
    set_vector_values_to(&mut values, psi, 1.0);
    if upper - lower > 0.0 {
        let absorbing = &phi.complement() | psi;
        let uniformized = uniformize(embedded, exit_rates, lambda, &absorbing)?;
        values = transient_accumulate(
            &uniformized,
            lambda * (upper - lower),
            config.precision,
            &values,
        )?;
    }

    // phase two: carry the values backwards over [0, lower]; psi is no
    // longer absorbing, leaving phi still kills the path
    if lower > 0.0 {
        let absorbing = phi.complement();
        let uniformized = uniformize(embedded, exit_rates, lambda, &absorbing)?;
        // outside phi nothing can be accumulated in the remaining time
        for state in absorbing.iter() {
            values[state] = 0.0;
        }
        values = transient_accumulate(&uniformized, lambda * lower, config.precision, &values)?;
    }
    Ok(CheckResult::numeric(
        values,
        SolveStatus::Converged { iterations: 0 },
    ))
}

/// `R [ C<=t ]` on a CTMC: state rewards accumulate at their rate per unit
/// of time, so the coefficient of `P^k r` is the expected time the
/// uniformised chain spends in its k-th step before `t`.
pub(crate) fn cumulative_time(
    model: &Model<f64>,
    rewards: &RewardModel<f64>,
    time: f64,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let (embedded, exit_rates) = match model {
        Model::Ctmc { parts, exit_rates } => (&parts.transitions, exit_rates),
        _ => {
            return Err(CheckError::UnsupportedProperty(format!(
                "time-bounded cumulative rewards are only available for CTMCs, not {}",
                model.kind_name()
            )));
        }
    };
    if time <= 0.0 {
        return Ok(CheckResult::numeric(
            vec![0.0; model.state_count()],
            SolveStatus::Converged { iterations: 0 },
        ));
    }
    let lambda = max_exit_rate(exit_rates);
    let uniformized = uniformize(embedded, exit_rates, lambda, &BitVector::new(embedded.row_count()))?;
    let reward_vector = rewards.total_reward_vector(embedded);

    let weights = fox_glynn(lambda * time, config.precision)?;
    let mut current = reward_vector;
    let mut scratch = vec![0.0; current.len()];
    let mut accumulated = vec![0.0; current.len()];
    let mut poisson_mass = 0.0;
    for k in 0..=weights.right {
        if k >= weights.left {
            poisson_mass += weights.weights[k - weights.left] / weights.total_weight;
        }
        // (1/lambda) * P(N_t > k) is the expected sojourn in step k
        let coefficient = (1.0 - poisson_mass) / lambda;
        for (total, value) in accumulated.iter_mut().zip(&current) {
            *total += coefficient * value;
        }
        if k < weights.right {
            uniformized.multiply_with_vector(&current, &mut scratch)?;
            std::mem::swap(&mut current, &mut scratch);
        }
    }
    Ok(CheckResult::numeric(
        accumulated,
        SolveStatus::Converged { iterations: 0 },
    ))
}

/// `R [ I=t ]` on a CTMC: the expected state reward at time `t`.
pub(crate) fn instantaneous_time(
    model: &Model<f64>,
    state_rewards: Vec<f64>,
    time: f64,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let (embedded, exit_rates) = match model {
        Model::Ctmc { parts, exit_rates } => (&parts.transitions, exit_rates),
        _ => {
            return Err(CheckError::UnsupportedProperty(format!(
                "time-bounded instantaneous rewards are only available for CTMCs, not {}",
                model.kind_name()
            )));
        }
    };
    if time <= 0.0 {
        return Ok(CheckResult::numeric(
            state_rewards,
            SolveStatus::Converged { iterations: 0 },
        ));
    }
    let lambda = max_exit_rate(exit_rates);
    let uniformized = uniformize(embedded, exit_rates, lambda, &BitVector::new(embedded.row_count()))?;
    let values = transient_accumulate(&uniformized, lambda * time, config.precision, &state_rewards)?;
    Ok(CheckResult::numeric(
        values,
        SolveStatus::Converged { iterations: 0 },
    ))
}

/// Scale a digitised Markovian matrix: every entry becomes
/// `(1 - e^(-E*delta)) * p`, plus `e^(-E*delta)` on the diagonal when
/// requested. `row_rates[i]` is the exit rate of the i-th row.
fn digitize(
    matrix: &SparseMatrix<f64>,
    row_rates: &[f64],
    delta: f64,
    with_diagonal: bool,
) -> Result<SparseMatrix<f64>, CheckError> {
    let mut builder = SparseMatrixBuilder::new();
    for row in 0..matrix.row_count() {
        let decay = (-row_rates[row] * delta).exp();
        let (columns, values) = matrix.row(row);
        for (&c, &v) in columns.iter().zip(values) {
            let mut value = (1.0 - decay) * v;
            if with_diagonal && c == row {
                value += decay;
            }
            builder.add_next_value(row, c, value)?;
        }
    }
    Ok(builder.build(Some(matrix.row_count()), Some(matrix.column_count()))?)
}

#[allow(clippy::too_many_arguments)]
fn ma_bounded_until(
    transitions: &SparseMatrix<f64>,
    exit_rates: &[f64],
    markovian_states: &BitVector,
    phi: &BitVector,
    psi: &BitVector,
    lower: f64,
    upper: f64,
    direction: OptimizationDirection,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let state_count = transitions.row_group_count();
    if !phi.complement().none_set() {
        // the digitisation below tracks goal states only; restricting the
        // left side needs the path constraint folded into the state space
        return Err(CheckError::UnsupportedProperty(
            "time-bounded until on Markov automata supports true as left operand".to_string(),
        ));
    }
    if upper <= 0.0 {
        let mut values = vec![0.0; state_count];
        set_vector_values_to(&mut values, psi, 1.0);
        return Ok(CheckResult::numeric(
            values,
            SolveStatus::Converged { iterations: 0 },
        ));
    }

    // digitisation step from the required accuracy
    let lambda = markovian_states
        .iter()
        .map(|s| exit_rates[s])
        .fold(0.0, f64::max);
    let delta = (2.0 * config.precision) / (upper * lambda * lambda);
    let steps = ((upper - lower) / delta).ceil() as u64;
    tracing::debug!(steps, delta, "digitising Markov automaton");

    let markovian_non_goal = markovian_states - psi;
    let probabilistic_non_goal = &markovian_states.complement() - psi;
    let mut v_markovian = vec![0.0; markovian_non_goal.count_ones()];
    let mut v_probabilistic = vec![0.0; probabilistic_non_goal.count_ones()];
    let mut status = digitized_reachability(
        transitions,
        exit_rates,
        psi,
        &markovian_non_goal,
        &probabilistic_non_goal,
        &mut v_markovian,
        &mut v_probabilistic,
        delta,
        steps,
        direction,
        config,
    )?;

    if lower > 0.0 {
        // second pass over [0, lower] with no goal, carrying the phase-one
        // values forward as initial values
        let markovian_all = markovian_states.clone();
        let probabilistic_all = markovian_states.complement();
        let mut v_all_markovian = vec![0.0; markovian_all.count_ones()];
        let mut v_all_probabilistic = vec![0.0; probabilistic_all.count_ones()];
        set_vector_values(
            &mut v_all_markovian,
            &psi.restrict(&markovian_all),
            &vec![1.0; psi.restrict(&markovian_all).count_ones()],
        );
        set_vector_values(
            &mut v_all_markovian,
            &markovian_non_goal.restrict(&markovian_all),
            &v_markovian,
        );
        set_vector_values(
            &mut v_all_probabilistic,
            &psi.restrict(&probabilistic_all),
            &vec![1.0; psi.restrict(&probabilistic_all).count_ones()],
        );
        set_vector_values(
            &mut v_all_probabilistic,
            &probabilistic_non_goal.restrict(&probabilistic_all),
            &v_probabilistic,
        );

        let steps = (lower / delta).ceil() as u64;
        let second = digitized_reachability(
            transitions,
            exit_rates,
            &BitVector::new(state_count),
            &markovian_all,
            &probabilistic_all,
            &mut v_all_markovian,
            &mut v_all_probabilistic,
            delta,
            steps,
            direction,
            config,
        )?;
        status = status.combine(second);

        let mut values = vec![0.0; state_count];
        set_vector_values(&mut values, &markovian_all, &v_all_markovian);
        set_vector_values(&mut values, &probabilistic_all, &v_all_probabilistic);
        return Ok(CheckResult::numeric(values, status));
    }

    let mut values = vec![0.0; state_count];
    set_vector_values_to(&mut values, psi, 1.0);
    set_vector_values(&mut values, &markovian_non_goal, &v_markovian);
    set_vector_values(&mut values, &probabilistic_non_goal, &v_probabilistic);
    Ok(CheckResult::numeric(values, status))
}

/// The digitised outer loop: alternate an untimed value-iteration solve on
/// the probabilistic part with one discretised timed step on the Markovian
/// part.
#[allow(clippy::too_many_arguments)]
fn digitized_reachability(
    transitions: &SparseMatrix<f64>,
    exit_rates: &[f64],
    goal: &BitVector,
    markovian_non_goal: &BitVector,
    probabilistic_non_goal: &BitVector,
    v_markovian: &mut [f64],
    v_probabilistic: &mut [f64],
    delta: f64,
    steps: u64,
    direction: OptimizationDirection,
    config: &CheckConfig,
) -> Result<SolveStatus, CheckError> {
    let markovian_rates: Vec<f64> = markovian_non_goal.iter().map(|s| exit_rates[s]).collect();

    // Markovian states have a single choice, so these two matrices have one
    // row per Markovian state and can be digitised row-wise.
    let a_markovian = digitize(
        &transitions.submatrix(true, markovian_non_goal, markovian_non_goal, true)?,
        &markovian_rates,
        delta,
        true,
    )?;
    let a_markovian_to_probabilistic = digitize(
        &transitions.submatrix(true, markovian_non_goal, probabilistic_non_goal, false)?,
        &markovian_rates,
        delta,
        false,
    )?;
    let a_probabilistic =
        transitions.submatrix(true, probabilistic_non_goal, probabilistic_non_goal, false)?;
    let a_probabilistic_to_markovian =
        transitions.submatrix(true, probabilistic_non_goal, markovian_non_goal, false)?;

    // fixed one-step goal probabilities
    let b_probabilistic_fixed = transitions.constrained_group_sum_vector(probabilistic_non_goal, goal);
    let b_markovian_fixed: Vec<f64> = markovian_non_goal
        .iter()
        .map(|state| {
            let row = transitions.rows_of_group(state).start;
            let decay = (-exit_rates[state] * delta).exp();
            (1.0 - decay) * transitions.constrained_row_sum(row, goal)
        })
        .collect();

    let mut solver = MinMaxEquationSolver::new(
        &a_probabilistic,
        MinMaxSolutionMethod::ValueIteration,
        config.precision,
        config.criterion,
        config.max_iterations,
    );
    let mut b_probabilistic = vec![0.0; a_probabilistic_to_markovian.row_count()];
    let mut b_markovian = vec![0.0; a_markovian_to_probabilistic.row_count()];
    let mut markovian_scratch = vec![0.0; v_markovian.len()];
    let mut status = SolveStatus::Converged { iterations: 0 };

    let mut solve_probabilistic = |solver: &mut MinMaxEquationSolver<'_, f64>,
                                   b_probabilistic: &mut Vec<f64>,
                                   v_markovian: &[f64],
                                   v_probabilistic: &mut [f64]|
     -> Result<SolveStatus, CheckError> {
        a_probabilistic_to_markovian.multiply_with_vector(v_markovian, b_probabilistic)?;
        for (value, fixed) in b_probabilistic.iter_mut().zip(&b_probabilistic_fixed) {
            *value += *fixed;
        }
        let (status, _) = solver.solve(Some(direction), v_probabilistic, b_probabilistic)?;
        Ok(status)
    };

    for _ in 0..steps {
        let inner = solve_probabilistic(
            &mut solver,
            &mut b_probabilistic,
            v_markovian,
            v_probabilistic,
        )?;
        status = status.combine(inner);

        // one timed step for the Markovian part
        a_markovian_to_probabilistic.multiply_with_vector(v_probabilistic, &mut b_markovian)?;
        a_markovian.multiply_with_vector(v_markovian, &mut markovian_scratch)?;
        for ((value, product), fixed) in markovian_scratch
            .iter_mut()
            .zip(&b_markovian)
            .zip(&b_markovian_fixed)
        {
            *value += *product + *fixed;
        }
        v_markovian.copy_from_slice(&markovian_scratch);
    }

    // one more untimed solve after the final timed step
    let inner = solve_probabilistic(
        &mut solver,
        &mut b_probabilistic,
        v_markovian,
        v_probabilistic,
    )?;
    Ok(status.combine(inner))
}
