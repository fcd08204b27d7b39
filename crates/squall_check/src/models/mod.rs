//! The model sum type and its validated constructors.

use std::collections::BTreeMap;

use num_traits::Float;

use crate::error::CheckError;
use crate::rewards::RewardModel;
use crate::storage::{BitVector, SparseMatrix};
use crate::{Scalar, SolverScalar};

pub mod explicit;

/// Row-sum tolerance for stochastic matrices.
pub const STOCHASTIC_TOLERANCE: f64 = 1e-12;

/// State labeling: a mapping from label names to state sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Labeling {
    state_count: usize,
    labels: BTreeMap<String, BitVector>,
}

impl Labeling {
    pub fn new(state_count: usize) -> Self {
        Self {
            state_count,
            labels: BTreeMap::new(),
        }
    }

    pub fn add_label(&mut self, name: impl Into<String>, states: BitVector) -> Result<(), CheckError> {
        let name = name.into();
        if states.len() != self.state_count {
            return Err(CheckError::InputInvariantViolation(format!(
                "label {name:?} covers {} states in a model of {}",
                states.len(),
                self.state_count
            )));
        }
        self.labels.insert(name, states);
        Ok(())
    }

    pub fn states_with(&self, name: &str) -> Result<&BitVector, CheckError> {
        self.labels
            .get(name)
            .ok_or_else(|| CheckError::UnknownLabel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.labels.contains_key(name)
    }

    pub fn state_count(&self) -> usize {
        self.state_count
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }
}

/// Components shared by every model kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelParts<T> {
    pub transitions: SparseMatrix<T>,
    pub labeling: Labeling,
    pub reward_models: BTreeMap<String, RewardModel<T>>,
}

/// A finite-state stochastic model. The transition matrix always stores
/// one-step probabilities; continuous time lives in the exit-rate vector.
#[derive(Debug, Clone, PartialEq)]
pub enum Model<T> {
    Dtmc(ModelParts<T>),
    Ctmc {
        parts: ModelParts<T>,
        exit_rates: Vec<T>,
    },
    Mdp(ModelParts<T>),
    Ma {
        parts: ModelParts<T>,
        exit_rates: Vec<T>,
        markovian_states: BitVector,
    },
    Smg {
        parts: ModelParts<T>,
        player_one_states: BitVector,
    },
}

impl<T: SolverScalar> Model<T> {
    pub fn new_dtmc(parts: ModelParts<T>) -> Result<Self, CheckError> {
        validate_parts(&parts, true)?;
        Ok(Model::Dtmc(parts))
    }

    pub fn new_ctmc(parts: ModelParts<T>, exit_rates: Vec<T>) -> Result<Self, CheckError> {
        validate_parts(&parts, true)?;
        validate_rates(&parts, &exit_rates)?;
        Ok(Model::Ctmc { parts, exit_rates })
    }

    pub fn new_mdp(parts: ModelParts<T>) -> Result<Self, CheckError> {
        validate_parts(&parts, false)?;
        Ok(Model::Mdp(parts))
    }

    pub fn new_ma(
        parts: ModelParts<T>,
        exit_rates: Vec<T>,
        markovian_states: BitVector,
    ) -> Result<Self, CheckError> {
        validate_parts(&parts, false)?;
        validate_rates(&parts, &exit_rates)?;
        if markovian_states.len() != parts.transitions.row_group_count() {
            return Err(CheckError::InputInvariantViolation(
                "Markovian state set does not match the state count".to_string(),
            ));
        }
        // a Markovian state has exactly its timed distribution
        for state in markovian_states.iter() {
            if parts.transitions.rows_of_group(state).len() != 1 {
                return Err(CheckError::InputInvariantViolation(format!(
                    "Markovian state {state} must have exactly one choice"
                )));
            }
        }
        Ok(Model::Ma {
            parts,
            exit_rates,
            markovian_states,
        })
    }

    pub fn new_smg(parts: ModelParts<T>, player_one_states: BitVector) -> Result<Self, CheckError> {
        validate_parts(&parts, false)?;
        if player_one_states.len() != parts.transitions.row_group_count() {
            return Err(CheckError::InputInvariantViolation(
                "player-one state set does not match the state count".to_string(),
            ));
        }
        Ok(Model::Smg {
            parts,
            player_one_states,
        })
    }

    pub fn parts(&self) -> &ModelParts<T> {
        match self {
            Model::Dtmc(parts) | Model::Mdp(parts) => parts,
            Model::Ctmc { parts, .. } | Model::Ma { parts, .. } | Model::Smg { parts, .. } => parts,
        }
    }

    pub fn transitions(&self) -> &SparseMatrix<T> {
        &self.parts().transitions
    }

    pub fn labeling(&self) -> &Labeling {
        &self.parts().labeling
    }

    pub fn state_count(&self) -> usize {
        self.transitions().row_group_count()
    }

    /// Fresh state-level backward transition relation.
    pub fn backward_transitions(&self) -> SparseMatrix<T> {
        self.transitions().transpose(false)
    }

    pub fn exit_rates(&self) -> Option<&[T]> {
        match self {
            Model::Ctmc { exit_rates, .. } | Model::Ma { exit_rates, .. } => Some(exit_rates),
            _ => None,
        }
    }

    pub fn markovian_states(&self) -> Option<&BitVector> {
        match self {
            Model::Ma {
                markovian_states, ..
            } => Some(markovian_states),
            _ => None,
        }
    }

    pub fn player_one_states(&self) -> Option<&BitVector> {
        match self {
            Model::Smg {
                player_one_states, ..
            } => Some(player_one_states),
            _ => None,
        }
    }

    pub fn is_nondeterministic(&self) -> bool {
        matches!(self, Model::Mdp(_) | Model::Ma { .. } | Model::Smg { .. })
    }

    pub fn is_continuous_time(&self) -> bool {
        matches!(self, Model::Ctmc { .. } | Model::Ma { .. })
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Model::Dtmc(_) => "DTMC",
            Model::Ctmc { .. } => "CTMC",
            Model::Mdp(_) => "MDP",
            Model::Ma { .. } => "MA",
            Model::Smg { .. } => "SMG",
        }
    }

    /// Look up a reward model; `None` picks the unique one if there is
    /// exactly one.
    pub fn reward_model(&self, name: Option<&str>) -> Result<&RewardModel<T>, CheckError> {
        let reward_models = &self.parts().reward_models;
        match name {
            Some(name) => reward_models
                .get(name)
                .ok_or_else(|| CheckError::UnknownRewardModel(name.to_string())),
            None => {
                if reward_models.len() == 1 {
                    Ok(reward_models.values().next().expect("checked length"))
                } else {
                    Err(CheckError::MissingRewardModel)
                }
            }
        }
    }
}

fn validate_parts<T: SolverScalar>(
    parts: &ModelParts<T>,
    deterministic: bool,
) -> Result<(), CheckError> {
    let transitions = &parts.transitions;
    if deterministic && !transitions.has_trivial_row_grouping() {
        return Err(CheckError::InputInvariantViolation(
            "deterministic models cannot have row groups".to_string(),
        ));
    }
    if transitions.column_count() != transitions.row_group_count() {
        return Err(CheckError::InputInvariantViolation(format!(
            "transition matrix has {} columns for {} states",
            transitions.column_count(),
            transitions.row_group_count()
        )));
    }
    transitions
        .assert_rows_stochastic(T::from(STOCHASTIC_TOLERANCE).expect("tolerance fits the domain"))?;
    if parts.labeling.state_count() != transitions.row_group_count() {
        return Err(CheckError::InputInvariantViolation(format!(
            "labeling covers {} states in a model of {}",
            parts.labeling.state_count(),
            transitions.row_group_count()
        )));
    }
    for reward_model in parts.reward_models.values() {
        reward_model.check_dimensions(transitions)?;
    }
    Ok(())
}

fn validate_rates<T: Scalar + Float>(
    parts: &ModelParts<T>,
    exit_rates: &[T],
) -> Result<(), CheckError> {
    if exit_rates.len() != parts.transitions.row_group_count() {
        return Err(CheckError::InputInvariantViolation(format!(
            "exit rate vector has length {} for {} states",
            exit_rates.len(),
            parts.transitions.row_group_count()
        )));
    }
    if exit_rates.iter().any(|&r| !(r > T::zero()) || !r.is_finite()) {
        return Err(CheckError::InputInvariantViolation(
            "exit rates must be positive and finite".to_string(),
        ));
    }
    Ok(())
}
