//! Reward models: state, state-action and transition rewards over a common
//! transition matrix.

use crate::error::CheckError;
use crate::storage::SparseMatrix;
use crate::Scalar;

/// A named reward structure. At least one component is present; all refer to
/// the state/row indices of the transition matrix they accompany.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardModel<T> {
    state_rewards: Option<Vec<T>>,
    state_action_rewards: Option<Vec<T>>,
    transition_rewards: Option<SparseMatrix<T>>,
}

impl<T: Scalar> RewardModel<T> {
    pub fn new(
        state_rewards: Option<Vec<T>>,
        state_action_rewards: Option<Vec<T>>,
        transition_rewards: Option<SparseMatrix<T>>,
    ) -> Result<Self, CheckError> {
        if state_rewards.is_none() && state_action_rewards.is_none() && transition_rewards.is_none()
        {
            return Err(CheckError::InputInvariantViolation(
                "a reward model needs at least one of state, state-action or transition rewards"
                    .to_string(),
            ));
        }
        let negative = state_rewards
            .iter()
            .flatten()
            .chain(state_action_rewards.iter().flatten())
            .any(|&r| r < T::zero())
            || transition_rewards
                .as_ref()
                .is_some_and(|m| m.triples().any(|(_, _, v)| v < T::zero()));
        if negative {
            return Err(CheckError::InputInvariantViolation(
                "reward components must be non-negative".to_string(),
            ));
        }
        Ok(Self {
            state_rewards,
            state_action_rewards,
            transition_rewards,
        })
    }

    pub fn from_state_rewards(state_rewards: Vec<T>) -> Result<Self, CheckError> {
        Self::new(Some(state_rewards), None, None)
    }

    pub fn state_rewards(&self) -> Option<&[T]> {
        self.state_rewards.as_deref()
    }

    pub fn state_action_rewards(&self) -> Option<&[T]> {
        self.state_action_rewards.as_deref()
    }

    pub fn transition_rewards(&self) -> Option<&SparseMatrix<T>> {
        self.transition_rewards.as_ref()
    }

    /// Verify that the components match the dimensions of `transitions`.
    pub fn check_dimensions(&self, transitions: &SparseMatrix<T>) -> Result<(), CheckError> {
        if let Some(state_rewards) = &self.state_rewards {
            if state_rewards.len() != transitions.row_group_count() {
                return Err(CheckError::InputInvariantViolation(format!(
                    "state reward vector has length {} for {} states",
                    state_rewards.len(),
                    transitions.row_group_count()
                )));
            }
        }
        if let Some(state_action_rewards) = &self.state_action_rewards {
            if state_action_rewards.len() != transitions.row_count() {
                return Err(CheckError::InputInvariantViolation(format!(
                    "state-action reward vector has length {} for {} rows",
                    state_action_rewards.len(),
                    transitions.row_count()
                )));
            }
        }
        if let Some(transition_rewards) = &self.transition_rewards {
            if transition_rewards.row_count() != transitions.row_count()
                || transition_rewards.column_count() != transitions.column_count()
            {
                return Err(CheckError::InputInvariantViolation(
                    "transition reward matrix does not match the transition matrix".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Flatten all components into one value per row: state rewards are
    /// broadcast to every row of the state's group, transition rewards are
    /// collapsed by expectation against the transition probabilities.
    pub fn total_reward_vector(&self, transitions: &SparseMatrix<T>) -> Vec<T> {
        let mut result = vec![T::zero(); transitions.row_count()];
        if let Some(state_rewards) = &self.state_rewards {
            for group in 0..transitions.row_group_count() {
                for row in transitions.rows_of_group(group) {
                    result[row] += state_rewards[group];
                }
            }
        }
        if let Some(state_action_rewards) = &self.state_action_rewards {
            for (value, reward) in result.iter_mut().zip(state_action_rewards) {
                *value += *reward;
            }
        }
        if let Some(transition_rewards) = &self.transition_rewards {
            for row in 0..transitions.row_count() {
                let (columns, values) = transitions.row(row);
                let mut expected = T::zero();
                for (&c, &p) in columns.iter().zip(values) {
                    // entries missing from the reward matrix count as zero
                    let (reward_columns, reward_values) = transition_rewards.row(row);
                    if let Ok(position) = reward_columns.binary_search(&c) {
                        expected += p * reward_values[position];
                    }
                }
                result[row] += expected;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SparseMatrixBuilder;

    fn matrix() -> SparseMatrix<f64> {
        let mut builder = SparseMatrixBuilder::with_row_groups();
        builder.new_row_group(0).unwrap();
        builder.add_next_value(0, 1, 1.0).unwrap();
        builder.add_next_value(1, 0, 0.5).unwrap();
        builder.add_next_value(1, 1, 0.5).unwrap();
        builder.new_row_group(2).unwrap();
        builder.add_next_value(2, 1, 1.0).unwrap();
        builder.build(None, None).unwrap()
    }

    #[test]
    fn at_least_one_component_is_required() {
        assert!(matches!(
            RewardModel::<f64>::new(None, None, None),
            Err(CheckError::InputInvariantViolation(_))
        ));
    }

    #[test]
    fn negative_rewards_are_rejected() {
        assert!(matches!(
            RewardModel::new(Some(vec![1.0, -0.5]), None, None),
            Err(CheckError::InputInvariantViolation(_))
        ));
    }

    #[test]
    fn total_reward_combines_all_components() {
        let transitions = matrix();
        let mut reward_builder = SparseMatrixBuilder::new();
        // transition reward 2 on the (row 1 -> state 1) edge
        reward_builder.add_next_value(1, 1, 2.0).unwrap();
        let transition_rewards = reward_builder.build(Some(3), Some(2)).unwrap();

        let model = RewardModel::new(
            Some(vec![1.0, 10.0]),
            Some(vec![0.5, 0.0, 0.25]),
            Some(transition_rewards),
        )
        .unwrap();
        model.check_dimensions(&transitions).unwrap();
        let total = model.total_reward_vector(&transitions);
        // row 0: state 1.0 + action 0.5, row 1: state 1.0 + 0.5 * 2.0,
        // row 2: state 10.0 + action 0.25
        assert_eq!(total, vec![1.5, 2.0, 10.25]);
    }

    #[test]
    fn dimension_check_catches_mismatches() {
        let transitions = matrix();
        let model = RewardModel::from_state_rewards(vec![1.0, 2.0, 3.0]).unwrap();
        assert!(model.check_dimensions(&transitions).is_err());
    }
}
