mod common;

use std::collections::BTreeMap;

use common::{assert_close, check_str};
use squall_check::CheckConfig;
use squall_check::models::{Labeling, Model, ModelParts};
use squall_check::storage::{BitVector, SparseMatrixBuilder};

/// 0 <-> 1 at rates 1 and 3: the chain spends three quarters of its time in
/// state 0.
fn ctmc_cycle() -> Model<f64> {
    let mut builder = SparseMatrixBuilder::new();
    builder.add_next_value(0, 1, 1.0).unwrap();
    builder.add_next_value(1, 0, 1.0).unwrap();
    let transitions = builder.build(None, None).unwrap();
    let mut labeling = Labeling::new(2);
    labeling
        .add_label("first", BitVector::from_indices(2, &[0]))
        .unwrap();
    Model::new_ctmc(
        ModelParts {
            transitions,
            labeling,
            reward_models: BTreeMap::new(),
        },
        vec![1.0, 3.0],
    )
    .unwrap()
}

/// An MDP with a transient initial state that picks between two absorbing
/// components, only the first of which satisfies `up`.
fn two_component_mdp() -> Model<f64> {
    let mut builder = SparseMatrixBuilder::with_row_groups();
    builder.new_row_group(0).unwrap();
    builder.add_next_value(0, 1, 1.0).unwrap();
    builder.add_next_value(1, 2, 1.0).unwrap();
    builder.new_row_group(2).unwrap();
    builder.add_next_value(2, 1, 1.0).unwrap();
    builder.new_row_group(3).unwrap();
    builder.add_next_value(3, 2, 1.0).unwrap();
    let transitions = builder.build(None, None).unwrap();
    let mut labeling = Labeling::new(3);
    labeling
        .add_label("up", BitVector::from_indices(3, &[1]))
        .unwrap();
    Model::new_mdp(ModelParts {
        transitions,
        labeling,
        reward_models: BTreeMap::new(),
    })
    .unwrap()
}

#[test]
fn ctmc_cycle_weights_time_by_rates() {
    let model = ctmc_cycle();
    let config = CheckConfig::default();
    let result = check_str(&model, r#"LRA=? [ "first" ]"#, &config);
    assert_close(result.value_at(0), 0.75, 1e-5);
    assert_close(result.value_at(1), 0.75, 1e-5);
}

#[test]
fn mdp_long_run_average_follows_the_scheduler() {
    let model = two_component_mdp();
    let config = CheckConfig::default();
    let result = check_str(&model, r#"LRAmax=? [ "up" ]"#, &config);
    assert_close(result.value_at(0), 1.0, 1e-5);
    let result = check_str(&model, r#"LRAmin=? [ "up" ]"#, &config);
    assert_close(result.value_at(0), 0.0, 1e-5);
    // inside the components the value is fixed
    let max = check_str(&model, r#"LRAmax=? [ "up" ]"#, &config);
    assert_close(max.value_at(1), 1.0, 1e-5);
    assert_close(max.value_at(2), 0.0, 1e-5);
}

/// The LP minimises the objective variable for a maximizing query and vice
/// versa; getting the sense wrong yields an unbounded or trivial program,
/// so a component whose value is strictly between 0 and 1 pins it down.
#[test]
fn lra_objective_direction_regression() {
    // one end component alternating between an `up` and a down state
    let mut builder = SparseMatrixBuilder::new();
    builder.add_next_value(0, 1, 1.0).unwrap();
    builder.add_next_value(1, 0, 1.0).unwrap();
    let transitions = builder.build(None, None).unwrap();
    let mut labeling = Labeling::new(2);
    labeling
        .add_label("up", BitVector::from_indices(2, &[0]))
        .unwrap();
    let model = Model::new_dtmc(ModelParts {
        transitions,
        labeling,
        reward_models: BTreeMap::new(),
    })
    .unwrap();

    let config = CheckConfig::default();
    let max = check_str(&model, r#"LRAmax=? [ "up" ]"#, &config);
    let min = check_str(&model, r#"LRAmin=? [ "up" ]"#, &config);
    assert_close(max.value_at(0), 0.5, 1e-5);
    assert_close(min.value_at(0), 0.5, 1e-5);
}

#[test]
fn lra_edge_cases() {
    let model = two_component_mdp();
    let config = CheckConfig::default();
    // no state satisfies an unknown-free empty set
    let result = check_str(&model, r#"LRAmax=? [ "up" & !"up" ]"#, &config);
    assert_close(result.value_at(0), 0.0, 1e-9);
    let result = check_str(&model, r#"LRAmin=? [ "up" | !"up" ]"#, &config);
    assert_close(result.value_at(0), 1.0, 1e-9);
}
