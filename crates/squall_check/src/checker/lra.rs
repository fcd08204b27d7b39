//! Long-run average analysis: a linear program per maximal end component,
//! then a stochastic-shortest-path system over the collapsed components.

use tracing::debug;

use crate::checker::{CheckResult, require_direction};
use crate::error::CheckError;
use crate::models::Model;
use crate::solver::SolveStatus;
use crate::solver::lp::{LpProblem, ObjectiveSense};
use crate::solver::minmax::{MinMaxEquationSolver, MinMaxSolutionMethod};
use crate::storage::{BitVector, MaximalEndComponent, MecDecomposition, SparseMatrixBuilder};
use crate::vector::set_vector_values;
use crate::{CheckConfig, OptimizationDirection};

/// `LRA [ psi ]`: the optimal long-run fraction of time spent in `psi`.
pub(crate) fn long_run_average(
    model: &Model<f64>,
    psi: &BitVector,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    if matches!(model, Model::Smg { .. }) {
        return Err(CheckError::UnsupportedProperty(
            "long-run averages are not available for games".to_string(),
        ));
    }
    let state_count = model.state_count();
    let direction = require_direction(model, direction)?;

    if psi.none_set() {
        return Ok(CheckResult::numeric(
            vec![0.0; state_count],
            SolveStatus::Converged { iterations: 0 },
        ));
    }
    if psi.complement().none_set() {
        return Ok(CheckResult::numeric(
            vec![1.0; state_count],
            SolveStatus::Converged { iterations: 0 },
        ));
    }

    let transitions = model.transitions();
    let backward = model.backward_transitions();
    let mecs = MecDecomposition::new(transitions, &backward, None);
    debug!(count = mecs.len(), "long-run average over end components");

    // the LRA value of each end component in isolation
    let mut mec_values = Vec::with_capacity(mecs.len());
    let mut state_to_mec = vec![usize::MAX; state_count];
    for (index, mec) in mecs.iter().enumerate() {
        for (state, _) in mec.iter() {
            state_to_mec[state] = index;
        }
        mec_values.push(lra_for_mec(model, psi, mec, direction)?);
    }

    let states_in_mecs = mecs.state_union(state_count);
    let states_outside = states_in_mecs.complement();
    let outside_count = states_outside.count_ones();
    let mut outside_index = vec![usize::MAX; state_count];
    for (local, state) in states_outside.iter().enumerate() {
        outside_index[state] = local;
    }

    // stochastic shortest path over the collapsed components: regular
    // states keep their choices, each component becomes one auxiliary state
    // that may stop (collecting its LRA value) or take any exiting choice
    let group_indices = transitions.row_group_indices();
    let mut builder = SparseMatrixBuilder::with_row_groups();
    let mut b = Vec::new();
    let mut row = 0;

    let mut push_choice_row =
        |builder: &mut SparseMatrixBuilder<f64>, row: usize, choice: usize| -> Result<(), CheckError> {
            let (columns, values) = transitions.row(choice);
            let mut to_mec = vec![0.0; mec_values.len()];
            for (&target, &probability) in columns.iter().zip(values) {
                if states_outside.get(target) {
                    builder.add_next_value(row, outside_index[target], probability)?;
                } else {
                    to_mec[state_to_mec[target]] += probability;
                }
            }
            for (mec_index, &probability) in to_mec.iter().enumerate() {
                if probability != 0.0 {
                    builder.add_next_value(row, outside_count + mec_index, probability)?;
                }
            }
            Ok(())
        };

    for state in states_outside.iter() {
        builder.new_row_group(row)?;
        for choice in group_indices[state]..group_indices[state + 1] {
            push_choice_row(&mut builder, row, choice)?;
            b.push(0.0);
            row += 1;
        }
    }
    for (mec_index, mec) in mecs.iter().enumerate() {
        builder.new_row_group(row)?;
        for (state, in_mec_choices) in mec.iter() {
            for choice in group_indices[state]..group_indices[state + 1] {
                if in_mec_choices.contains(&choice) {
                    continue;
                }
                push_choice_row(&mut builder, row, choice)?;
                b.push(0.0);
                row += 1;
            }
        }
        // the stop choice realises the component's own long-run value
        b.push(mec_values[mec_index]);
        row += 1;
    }

    let ssp = builder.build(Some(row), Some(outside_count + mecs.len()))?;
    let mut x = vec![0.0; outside_count + mecs.len()];
    let mut solver = MinMaxEquationSolver::new(
        &ssp,
        MinMaxSolutionMethod::ValueIteration,
        config.precision,
        config.criterion,
        config.max_iterations,
    );
    let (status, _) = solver.solve(Some(direction), &mut x, &b)?;

    let mut values = vec![0.0; state_count];
    set_vector_values(&mut values, &states_outside, &x[..outside_count]);
    for state in states_in_mecs.iter() {
        values[state] = x[outside_count + state_to_mec[state]];
    }
    Ok(CheckResult::numeric(values, status))
}

/// Solve the long-run average of one end component as a linear program.
///
/// Variables are one value per state plus the average `k`; for a maximizing
/// query `k` is *minimized* subject to `>=` constraints (and dually for
/// minimizing queries). Timed states contribute their sojourn `k / E(s)`
/// and collect `1 / E(s)` when they satisfy `psi`; instantaneous states
/// only propagate values.
fn lra_for_mec(
    model: &Model<f64>,
    psi: &BitVector,
    mec: &MaximalEndComponent,
    direction: OptimizationDirection,
) -> Result<f64, CheckError> {
    let transitions = model.transitions();
    let exit_rates = model.exit_rates();
    let markovian_states = model.markovian_states();

    // variable 0 is k, then one variable per member state
    let sense = match direction {
        OptimizationDirection::Maximize => ObjectiveSense::Minimize,
        OptimizationDirection::Minimize => ObjectiveSense::Maximize,
    };
    let mut lp = LpProblem::new(1 + mec.len(), sense);
    lp.set_objective_coefficient(0, 1.0);
    let variable_of: std::collections::BTreeMap<usize, usize> = mec
        .states()
        .enumerate()
        .map(|(index, state)| (state, index + 1))
        .collect();

    for (state, choices) in mec.iter() {
        let timed = markovian_states.is_none_or(|markovian| markovian.get(state));
        let rate = exit_rates.map_or(1.0, |rates| rates[state]);
        for &choice in choices {
            let mut row = vec![(variable_of[&state], 1.0)];
            let (columns, values) = transitions.row(choice);
            for (&target, &probability) in columns.iter().zip(values) {
                row.push((variable_of[&target], -probability));
            }
            let mut rhs = 0.0;
            if timed {
                row.push((0, 1.0 / rate));
                if psi.get(state) {
                    rhs = 1.0 / rate;
                }
            }
            match direction {
                OptimizationDirection::Maximize => lp.add_greater_equal(row, rhs),
                OptimizationDirection::Minimize => lp.add_less_equal(row, rhs),
            }
        }
    }

    let solution = lp.solve()?;
    Ok(solution[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Labeling, Model, ModelParts};
    use crate::storage::SparseMatrix;
    use std::collections::BTreeMap;

    fn dtmc_cycle() -> Model<f64> {
        // 0 <-> 1 forever
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(0, 1, 1.0).unwrap();
        builder.add_next_value(1, 0, 1.0).unwrap();
        let transitions: SparseMatrix<f64> = builder.build(None, None).unwrap();
        let mut labeling = Labeling::new(2);
        labeling
            .add_label("up", BitVector::from_indices(2, &[0]))
            .unwrap();
        Model::new_dtmc(ModelParts {
            transitions,
            labeling,
            reward_models: BTreeMap::new(),
        })
        .unwrap()
    }

    #[test]
    fn deterministic_cycle_splits_time_evenly() {
        let model = dtmc_cycle();
        let psi = BitVector::from_indices(2, &[0]);
        let config = CheckConfig::default();
        let result = long_run_average(&model, &psi, None, &config).unwrap();
        assert!((result.value_at(0) - 0.5).abs() < 1e-6);
        assert!((result.value_at(1) - 0.5).abs() < 1e-6);
    }
}
