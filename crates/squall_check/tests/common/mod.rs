//! Shared literal models for the end-to-end tests.
#![allow(dead_code)]

use std::collections::BTreeMap;

use squall_check::models::{Labeling, Model, ModelParts};
use squall_check::rewards::RewardModel;
use squall_check::storage::{BitVector, SparseMatrixBuilder};
use squall_check::{CheckConfig, CheckResult, check};
use squall_parser::property::Property;

pub fn check_str(model: &Model<f64>, property: &str, config: &CheckConfig) -> CheckResult {
    let property: Property = property.parse().expect("property parses");
    check(model, &property, config).expect("property checks")
}

pub fn assert_close(actual: f64, expected: f64, tolerance: f64) {
    assert!(
        (actual - expected).abs() < tolerance,
        "expected {expected}, got {actual}"
    );
}

/// Two independent fair coin flips; state 0 flips both, states 1..=4 are the
/// four outcomes with state 1 carrying the `twoHeads` label.
pub fn two_coins() -> Model<f64> {
    let mut builder = SparseMatrixBuilder::new();
    for outcome in 1..=4 {
        builder.add_next_value(0, outcome, 0.25).unwrap();
    }
    for outcome in 1..=4 {
        builder.add_next_value(outcome, outcome, 1.0).unwrap();
    }
    let transitions = builder.build(None, None).unwrap();

    let mut labeling = Labeling::new(5);
    labeling
        .add_label("init", BitVector::from_indices(5, &[0]))
        .unwrap();
    labeling
        .add_label("twoHeads", BitVector::from_indices(5, &[1]))
        .unwrap();
    Model::new_dtmc(ModelParts {
        transitions,
        labeling,
        reward_models: BTreeMap::new(),
    })
    .unwrap()
}

/// The Knuth-Yao simulation of a fair die with a fair coin: internal states
/// 0..=6, face states 7..=12 labeled `faceEquals_1` .. `faceEquals_6`, all
/// faces also labeled `done`. One `coin_flips` reward per internal step.
pub fn knuth_yao_die() -> Model<f64> {
    let mut builder = SparseMatrixBuilder::new();
    let mut flip = |from: usize, to_a: usize, to_b: usize| {
        let (low, high) = if to_a < to_b { (to_a, to_b) } else { (to_b, to_a) };
        builder.add_next_value(from, low, 0.5).unwrap();
        builder.add_next_value(from, high, 0.5).unwrap();
    };
    flip(0, 1, 2);
    flip(1, 3, 4);
    flip(2, 5, 6);
    flip(3, 1, 7);
    flip(4, 8, 9);
    flip(5, 10, 11);
    flip(6, 2, 12);
    for face in 7..=12 {
        builder.add_next_value(face, face, 1.0).unwrap();
    }
    let transitions = builder.build(None, None).unwrap();

    let mut labeling = Labeling::new(13);
    labeling
        .add_label("init", BitVector::from_indices(13, &[0]))
        .unwrap();
    labeling
        .add_label("done", BitVector::from_indices(13, &[7, 8, 9, 10, 11, 12]))
        .unwrap();
    for face in 1..=6usize {
        labeling
            .add_label(
                format!("faceEquals_{face}"),
                BitVector::from_indices(13, &[6 + face]),
            )
            .unwrap();
    }

    let mut state_rewards = vec![1.0; 13];
    for face in 7..=12 {
        state_rewards[face] = 0.0;
    }
    let mut reward_models = BTreeMap::new();
    reward_models.insert(
        "coin_flips".to_string(),
        RewardModel::from_state_rewards(state_rewards).unwrap(),
    );

    Model::new_dtmc(ModelParts {
        transitions,
        labeling,
        reward_models,
    })
    .unwrap()
}

/// A 4-state MDP where the scheduler matters: from state 0, choice 0 surely
/// reaches the goal (state 2) after a detour through state 1, while choice 1
/// is a coin flip between the goal and the sink (state 3).
pub fn choice_mdp() -> Model<f64> {
    let mut builder = SparseMatrixBuilder::with_row_groups();
    builder.new_row_group(0).unwrap();
    builder.add_next_value(0, 1, 1.0).unwrap();
    builder.add_next_value(1, 2, 0.5).unwrap();
    builder.add_next_value(1, 3, 0.5).unwrap();
    builder.new_row_group(2).unwrap();
    builder.add_next_value(2, 2, 1.0).unwrap();
    builder.new_row_group(3).unwrap();
    builder.add_next_value(3, 2, 1.0).unwrap();
    builder.new_row_group(4).unwrap();
    builder.add_next_value(4, 3, 1.0).unwrap();
    let transitions = builder.build(None, None).unwrap();

    let mut labeling = Labeling::new(4);
    labeling
        .add_label("init", BitVector::from_indices(4, &[0]))
        .unwrap();
    labeling
        .add_label("goal", BitVector::from_indices(4, &[2]))
        .unwrap();

    let mut reward_models = BTreeMap::new();
    reward_models.insert(
        "steps".to_string(),
        RewardModel::from_state_rewards(vec![1.0, 1.0, 0.0, 0.0]).unwrap(),
    );

    Model::new_mdp(ModelParts {
        transitions,
        labeling,
        reward_models,
    })
    .unwrap()
}

/// Two-state CTMC: `init` moves to the absorbing `done` state at rate 2;
/// the absorbing state is modelled as a rate-1 self-loop.
pub fn two_state_ctmc() -> Model<f64> {
    let mut builder = SparseMatrixBuilder::new();
    builder.add_next_value(0, 1, 1.0).unwrap();
    builder.add_next_value(1, 1, 1.0).unwrap();
    let transitions = builder.build(None, None).unwrap();

    let mut labeling = Labeling::new(2);
    labeling
        .add_label("init", BitVector::from_indices(2, &[0]))
        .unwrap();
    labeling
        .add_label("done", BitVector::from_indices(2, &[1]))
        .unwrap();

    let mut reward_models = BTreeMap::new();
    reward_models.insert(
        "waiting".to_string(),
        RewardModel::from_state_rewards(vec![1.0, 0.0]).unwrap(),
    );

    Model::new_ctmc(
        ModelParts {
            transitions,
            labeling,
            reward_models,
        },
        vec![2.0, 1.0],
    )
    .unwrap()
}

/// A Markov automaton with one probabilistic decision: state 0 chooses
/// between a slow (rate 1) and a fast (rate 3) Markovian state, both of
/// which move to the absorbing goal.
pub fn choice_ma() -> Model<f64> {
    let mut builder = SparseMatrixBuilder::with_row_groups();
    builder.new_row_group(0).unwrap();
    builder.add_next_value(0, 1, 1.0).unwrap();
    builder.add_next_value(1, 2, 1.0).unwrap();
    builder.new_row_group(2).unwrap();
    builder.add_next_value(2, 3, 1.0).unwrap();
    builder.new_row_group(3).unwrap();
    builder.add_next_value(3, 3, 1.0).unwrap();
    builder.new_row_group(4).unwrap();
    builder.add_next_value(4, 3, 1.0).unwrap();
    let transitions = builder.build(None, None).unwrap();

    let mut labeling = Labeling::new(4);
    labeling
        .add_label("init", BitVector::from_indices(4, &[0]))
        .unwrap();
    labeling
        .add_label("goal", BitVector::from_indices(4, &[3]))
        .unwrap();

    // exit rates matter for the Markovian states 1 (slow), 2 (fast) and the
    // absorbing goal; the probabilistic state carries a placeholder
    let exit_rates = vec![1.0, 1.0, 3.0, 1.0];
    let markovian_states = BitVector::from_indices(4, &[1, 2, 3]);

    Model::new_ma(
        ModelParts {
            transitions,
            labeling,
            reward_models: BTreeMap::new(),
        },
        exit_rates,
        markovian_states,
    )
    .unwrap()
}
