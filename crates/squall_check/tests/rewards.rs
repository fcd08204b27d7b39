mod common;

use common::{assert_close, check_str, knuth_yao_die};
use squall_check::{CheckConfig, CheckValues};

#[test]
fn expected_flips_of_the_knuth_yao_die() {
    let model = knuth_yao_die();
    let config = CheckConfig {
        precision: 1e-10,
        ..CheckConfig::default()
    };
    let result = check_str(&model, r#"R{"coin_flips"}=? [ F "done" ]"#, &config);
    assert_close(result.value_at(0), 11.0 / 3.0, 1e-6);
    // the faces themselves cost nothing
    assert_close(result.value_at(7), 0.0, 1e-12);
}

#[test]
fn missing_the_target_with_positive_probability_costs_infinity() {
    let model = knuth_yao_die();
    let config = CheckConfig::default();
    // a single face is only reached with probability 1/6, so the expected
    // accumulated reward towards it diverges
    let result = check_str(&model, r#"R{"coin_flips"}=? [ F "faceEquals_1" ]"#, &config);
    assert!(result.value_at(0).is_infinite());
    assert_close(result.value_at(7), 0.0, 1e-12);
}

#[test]
fn cumulative_rewards_accumulate_per_step() {
    let model = knuth_yao_die();
    let config = CheckConfig::default();
    // one reward per flip: after two steps exactly two flips happened
    let result = check_str(&model, r#"R{"coin_flips"}=? [ C<=2 ]"#, &config);
    assert_close(result.value_at(0), 2.0, 1e-9);
    // faces accumulate nothing
    assert_close(result.value_at(8), 0.0, 1e-12);
    // in the long run the accumulation approaches the expected total
    let result = check_str(&model, r#"R{"coin_flips"}=? [ C<=200 ]"#, &config);
    assert_close(result.value_at(0), 11.0 / 3.0, 1e-6);
}

#[test]
fn instantaneous_rewards_read_the_step_distribution() {
    let model = knuth_yao_die();
    let config = CheckConfig::default();
    // at step 0 the start state itself carries reward 1
    let result = check_str(&model, r#"R{"coin_flips"}=? [ I=0 ]"#, &config);
    assert_close(result.value_at(0), 1.0, 1e-12);
    // after three steps the chain is internal with probability 1/4
    let result = check_str(&model, r#"R{"coin_flips"}=? [ I=3 ]"#, &config);
    assert_close(result.value_at(0), 0.25, 1e-9);
}

#[test]
fn reward_model_names_are_checked() {
    let model = knuth_yao_die();
    let config = CheckConfig::default();
    let property = r#"R{"missing"}=? [ F "done" ]"#.parse().unwrap();
    let error = squall_check::check(&model, &property, &config).unwrap_err();
    assert!(matches!(
        error,
        squall_check::CheckError::UnknownRewardModel(_)
    ));
}

#[test]
fn empty_target_means_infinite_reward() {
    let model = knuth_yao_die();
    let config = CheckConfig::default();
    // no state is labeled with an empty conjunction of opposite labels
    let result = check_str(
        &model,
        r#"R{"coin_flips"}=? [ F "faceEquals_1" & "faceEquals_2" ]"#,
        &config,
    );
    match &result.values {
        CheckValues::Numeric(values) => {
            assert!(values.iter().all(|v| v.is_infinite()));
        }
        other => panic!("expected numeric values, got {other:?}"),
    }
}
