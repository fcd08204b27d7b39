mod common;

use common::{assert_close, check_str, knuth_yao_die, two_coins};
use squall_check::{CheckConfig, CheckValues, SolutionMethod};

#[test]
fn two_coins_reach_two_heads_with_a_quarter() {
    let model = two_coins();
    let config = CheckConfig::default();
    let result = check_str(&model, r#"P=? [ F "twoHeads" ]"#, &config);
    assert_close(result.value_at(0), 0.25, 1e-6);
    assert!(result.status.converged());
}

#[test]
fn knuth_yao_die_is_fair() {
    let model = knuth_yao_die();
    let config = CheckConfig::default();
    for face in 1..=6 {
        let result = check_str(&model, &format!(r#"P=? [ F "faceEquals_{face}" ]"#), &config);
        assert_close(result.value_at(0), 1.0 / 6.0, 1e-6);
    }
    let result = check_str(&model, r#"P=? [ F "done" ]"#, &config);
    assert_close(result.value_at(0), 1.0, 1e-6);
}

#[test]
fn every_linear_method_agrees() {
    let model = knuth_yao_die();
    for method in [
        SolutionMethod::Jacobi,
        SolutionMethod::GaussSeidel,
        SolutionMethod::Sor,
    ] {
        let config = CheckConfig {
            method,
            precision: 1e-10,
            ..CheckConfig::default()
        };
        let result = check_str(&model, r#"P=? [ F "faceEquals_3" ]"#, &config);
        assert_close(result.value_at(0), 1.0 / 6.0, 1e-6);
    }
}

#[test]
fn step_bounded_until_counts_steps() {
    let model = knuth_yao_die();
    let config = CheckConfig::default();
    // faces 2..=5 are reachable after exactly three flips; face 1 needs the
    // loop to close, so three steps give 1/8
    let result = check_str(&model, r#"P=? [ F<=3 "faceEquals_1" ]"#, &config);
    assert_close(result.value_at(0), 0.125, 1e-9);
    let result = check_str(&model, r#"P=? [ F<=2 "faceEquals_1" ]"#, &config);
    assert_close(result.value_at(0), 0.0, 1e-9);
    // one more round of the loop adds 1/32
    let result = check_str(&model, r#"P=? [ F<=5 "faceEquals_1" ]"#, &config);
    assert_close(result.value_at(0), 0.125 + 1.0 / 32.0, 1e-9);
}

#[test]
fn next_and_globally() {
    let model = knuth_yao_die();
    let config = CheckConfig::default();
    let result = check_str(&model, r#"P=? [ X "faceEquals_1" ]"#, &config);
    assert_close(result.value_at(3), 0.5, 1e-9);
    assert_close(result.value_at(0), 0.0, 1e-9);

    // staying out of the faces forever has probability zero
    let result = check_str(&model, r#"P=? [ G !"done" ]"#, &config);
    assert_close(result.value_at(0), 0.0, 1e-6);
}

#[test]
fn qualitative_queries_return_state_sets() {
    let model = two_coins();
    let config = CheckConfig::default();

    let result = check_str(&model, r#"P>0 [ F "twoHeads" ]"#, &config);
    match &result.values {
        CheckValues::Truth(truth) => {
            assert_eq!(truth.iter().collect::<Vec<_>>(), vec![0, 1]);
        }
        other => panic!("expected a truth vector, got {other:?}"),
    }

    let result = check_str(&model, r#"P>=1 [ F "twoHeads" ]"#, &config);
    match &result.values {
        CheckValues::Truth(truth) => {
            assert_eq!(truth.iter().collect::<Vec<_>>(), vec![1]);
        }
        other => panic!("expected a truth vector, got {other:?}"),
    }
}

#[test]
fn until_with_a_left_operand() {
    let model = knuth_yao_die();
    let config = CheckConfig::default();
    // reaching face 1 without passing through state 3 is impossible
    let result = check_str(
        &model,
        r#"P=? [ !"faceEquals_1" U "faceEquals_1" ]"#,
        &config,
    );
    assert_close(result.value_at(0), 1.0 / 6.0, 1e-6);
}
