//! Assemble a [`Model`] from the explicit file formats of `squall_parser`.

use std::collections::BTreeMap;

use squall_parser::labels::LabelFile;
use squall_parser::rewards::StateRewardFile;
use squall_parser::transitions::TransitionFile;

use crate::error::CheckError;
use crate::models::{Labeling, Model, ModelParts};
use crate::rewards::RewardModel;
use crate::storage::{BitVector, SparseMatrixBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplicitModelKind {
    Dtmc,
    Ctmc,
    Mdp,
}

/// Build a model from parsed transition, label and reward files. For CTMCs
/// the transition values are rates; the exit rate of a state is its rate
/// sum and the stored matrix is the embedded (probability) chain.
pub fn build_model(
    kind: ExplicitModelKind,
    transitions: &TransitionFile,
    labels: &LabelFile,
    rewards: &[(String, StateRewardFile)],
) -> Result<Model<f64>, CheckError> {
    let state_count = transitions.state_count;
    if transitions.column_count != state_count {
        return Err(CheckError::InputInvariantViolation(format!(
            "transition file declares {} columns for {} states",
            transitions.column_count, state_count
        )));
    }
    if transitions.is_nondeterministic() && kind != ExplicitModelKind::Mdp {
        return Err(CheckError::InputInvariantViolation(
            "deterministic model kinds take 3-column transition files".to_string(),
        ));
    }

    let mut entries = transitions.entries.clone();
    entries.sort_by_key(|e| (e.source, e.choice, e.target));

    let (matrix, exit_rates) = match kind {
        ExplicitModelKind::Dtmc => {
            let mut builder = SparseMatrixBuilder::new();
            for entry in &entries {
                builder.add_next_value(entry.source, entry.target, entry.value)?;
            }
            (builder.build(Some(state_count), Some(state_count))?, None)
        }
        ExplicitModelKind::Ctmc => {
            let mut rate_sums = vec![0.0; state_count];
            for entry in &entries {
                rate_sums[entry.source] += entry.value;
            }
            let mut builder = SparseMatrixBuilder::new();
            for entry in &entries {
                let total = rate_sums[entry.source];
                if total <= 0.0 {
                    return Err(CheckError::InputInvariantViolation(format!(
                        "state {} has no positive exit rate",
                        entry.source
                    )));
                }
                builder.add_next_value(entry.source, entry.target, entry.value / total)?;
            }
            if rate_sums.iter().any(|&r| r <= 0.0) {
                return Err(CheckError::InputInvariantViolation(
                    "every CTMC state needs at least one outgoing rate".to_string(),
                ));
            }
            (
                builder.build(Some(state_count), Some(state_count))?,
                Some(rate_sums),
            )
        }
        ExplicitModelKind::Mdp => {
            let mut builder = SparseMatrixBuilder::with_row_groups();
            let mut row = 0;
            let mut position = 0;
            for state in 0..state_count {
                builder.new_row_group(row)?;
                let mut current_choice = None;
                while position < entries.len() && entries[position].source == state {
                    let entry = &entries[position];
                    let choice = entry.choice.unwrap_or(0);
                    match current_choice {
                        None => {
                            if choice != 0 {
                                return Err(CheckError::InputInvariantViolation(format!(
                                    "choices of state {state} must start at 0"
                                )));
                            }
                            current_choice = Some(0);
                        }
                        Some(current) if choice > current => {
                            if choice != current + 1 {
                                return Err(CheckError::InputInvariantViolation(format!(
                                    "choice {choice} of state {state} skips an index"
                                )));
                            }
                            row += 1;
                            current_choice = Some(choice);
                        }
                        _ => {}
                    }
                    builder.add_next_value(row, entry.target, entry.value)?;
                    position += 1;
                }
                if current_choice.is_none() {
                    return Err(CheckError::InputInvariantViolation(format!(
                        "state {state} has no choices"
                    )));
                }
                row += 1;
            }
            (builder.build(Some(row), Some(state_count))?, None)
        }
    };

    let mut labeling = Labeling::new(state_count);
    for (name, states) in &labels.labels {
        if let Some(&out_of_range) = states.iter().find(|&&s| s >= state_count) {
            return Err(CheckError::InputInvariantViolation(format!(
                "label {name:?} refers to state {out_of_range} of {state_count}"
            )));
        }
        labeling.add_label(name.clone(), BitVector::from_indices(state_count, states))?;
    }

    let mut reward_models = BTreeMap::new();
    for (name, file) in rewards {
        let dense = file.to_dense(state_count).map_err(|e| {
            CheckError::InputInvariantViolation(format!("reward model {name:?}: {e}"))
        })?;
        reward_models.insert(name.clone(), RewardModel::from_state_rewards(dense)?);
    }

    let parts = ModelParts {
        transitions: matrix,
        labeling,
        reward_models,
    };
    match kind {
        ExplicitModelKind::Dtmc => Model::new_dtmc(parts),
        ExplicitModelKind::Ctmc => {
            Model::new_ctmc(parts, exit_rates.expect("rates were computed"))
        }
        ExplicitModelKind::Mdp => Model::new_mdp(parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_a_dtmc() {
        let transitions =
            TransitionFile::from_str("2 2 3\n0 0 0.5\n0 1 0.5\n1 1 1.0\n").unwrap();
        let labels = LabelFile::from_str("init 0\ngoal 1\n").unwrap();
        let model = build_model(ExplicitModelKind::Dtmc, &transitions, &labels, &[]).unwrap();
        assert_eq!(model.state_count(), 2);
        assert!(model.labeling().contains("goal"));
        assert!(!model.is_nondeterministic());
    }

    #[test]
    fn builds_a_ctmc_with_embedded_probabilities() {
        let transitions = TransitionFile::from_str("2 2 3\n0 1 3.0\n1 0 1.0\n0 0 1.0\n").unwrap();
        let labels = LabelFile::from_str("init 0\n").unwrap();
        let model = build_model(ExplicitModelKind::Ctmc, &transitions, &labels, &[]).unwrap();
        assert_eq!(model.exit_rates(), Some(&[4.0, 1.0][..]));
        let (columns, values) = model.transitions().row(0);
        assert_eq!(columns, &[0, 1]);
        assert_eq!(values, &[0.25, 0.75]);
    }

    #[test]
    fn builds_an_mdp_with_row_groups() {
        let transitions = TransitionFile::from_str(
            "2 2 4\n0 0 1 1.0\n0 1 0 0.5\n0 1 1 0.5\n1 0 1 1.0\n",
        )
        .unwrap();
        let labels = LabelFile::from_str("goal 1\n").unwrap();
        let model = build_model(ExplicitModelKind::Mdp, &transitions, &labels, &[]).unwrap();
        assert_eq!(model.state_count(), 2);
        assert_eq!(model.transitions().row_count(), 3);
        assert_eq!(model.transitions().rows_of_group(0), 0..2);
    }

    #[test]
    fn skipped_choice_indices_are_rejected() {
        let transitions =
            TransitionFile::from_str("1 1 2\n0 0 0 1.0\n0 2 0 1.0\n").unwrap();
        let labels = LabelFile::from_str("").unwrap();
        assert!(matches!(
            build_model(ExplicitModelKind::Mdp, &transitions, &labels, &[]),
            Err(CheckError::InputInvariantViolation(_))
        ));
    }

    #[test]
    fn reward_files_become_state_rewards() {
        let transitions = TransitionFile::from_str("2 2 2\n0 1 1.0\n1 1 1.0\n").unwrap();
        let labels = LabelFile::from_str("goal 1\n").unwrap();
        let rewards = vec![(
            "steps".to_string(),
            StateRewardFile::from_str("0 1.0\n").unwrap(),
        )];
        let model =
            build_model(ExplicitModelKind::Dtmc, &transitions, &labels, &rewards).unwrap();
        let reward_model = model.reward_model(Some("steps")).unwrap();
        assert_eq!(reward_model.state_rewards(), Some(&[1.0, 0.0][..]));
    }
}
