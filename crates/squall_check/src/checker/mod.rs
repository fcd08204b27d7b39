//! The property dispatcher: reduces a property to prob-0/prob-1 sets, a
//! maybe-state equation system and a solver call, then splices the partial
//! solution back into a full-state-indexed result.

mod expected;
mod lra;
mod reachability;
mod timed;

use squall_parser::property::{
    PathFormula, Property, PropertyKind, Query, RewardKind, StateFormula, TimeBound,
};

use crate::error::CheckError;
use crate::models::{Labeling, Model};
use crate::scheduler::Scheduler;
use crate::solver::SolveStatus;
use crate::storage::BitVector;
use crate::{CheckConfig, OptimizationDirection};

/// Quantitative or qualitative answer, indexed by state.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckValues {
    Numeric(Vec<f64>),
    Truth(BitVector),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub values: CheckValues,
    pub status: SolveStatus,
    pub scheduler: Option<Scheduler>,
}

impl CheckResult {
    fn numeric(values: Vec<f64>, status: SolveStatus) -> Self {
        Self {
            values: CheckValues::Numeric(values),
            status,
            scheduler: None,
        }
    }

    fn truth(values: BitVector) -> Self {
        Self {
            values: CheckValues::Truth(values),
            status: SolveStatus::Converged { iterations: 0 },
            scheduler: None,
        }
    }

    fn with_scheduler(mut self, scheduler: Option<Scheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// The numeric value of one state; qualitative results read as 0/1.
    pub fn value_at(&self, state: usize) -> f64 {
        match &self.values {
            CheckValues::Numeric(values) => values[state],
            CheckValues::Truth(truth) => {
                if truth.get(state) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Check a single property against a model.
pub fn check(
    model: &Model<f64>,
    property: &Property,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let labeling = model.labeling();
    // the per-property direction wins over the pre-declared one
    let direction = property.direction.or(config.direction);

    match &property.kind {
        PropertyKind::Probability(path) => {
            check_path(model, path, property.query, direction, config)
        }
        PropertyKind::Reward { reward_model, kind } => {
            require_quantitative(property.query)?;
            let rewards = model.reward_model(reward_model.as_deref())?;
            match kind {
                RewardKind::Reachability(target) => {
                    let psi = resolve_state_formula(labeling, target)?;
                    expected::reachability_rewards(model, rewards, &psi, direction, config)
                }
                RewardKind::Cumulative(bound) => {
                    expected::cumulative_rewards(model, rewards, *bound, direction, config)
                }
                RewardKind::Instantaneous(bound) => {
                    expected::instantaneous_rewards(model, rewards, *bound, direction, config)
                }
            }
        }
        PropertyKind::ExpectedTime(target) => {
            require_quantitative(property.query)?;
            let psi = resolve_state_formula(labeling, target)?;
            expected::expected_time(model, &psi, direction, config)
        }
        PropertyKind::LongRunAverage(states) => {
            require_quantitative(property.query)?;
            let psi = resolve_state_formula(labeling, states)?;
            lra::long_run_average(model, &psi, direction, config)
        }
    }
}

fn check_path(
    model: &Model<f64>,
    path: &PathFormula,
    query: Query,
    direction: Option<OptimizationDirection>,
    config: &CheckConfig,
) -> Result<CheckResult, CheckError> {
    let labeling = model.labeling();
    match path {
        PathFormula::Next(target) => {
            require_quantitative(query)?;
            let psi = resolve_state_formula(labeling, target)?;
            reachability::next_probabilities(model, &psi, direction)
        }
        PathFormula::Globally(formula) => {
            require_quantitative(query)?;
            // P[G phi] = 1 - P[F !phi], with the direction flipped
            let not_phi = resolve_state_formula(labeling, formula)?.complement();
            let phi = BitVector::full(model.state_count());
            let flipped = direction.map(opposite);
            let mut result = reachability::until_probabilities(
                model,
                &phi,
                &not_phi,
                TimeBound::Unbounded,
                flipped,
                config,
            )?;
            if let CheckValues::Numeric(values) = &mut result.values {
                for value in values.iter_mut() {
                    *value = 1.0 - *value;
                }
            }
            Ok(result)
        }
        PathFormula::Until {
            before,
            target,
            bound,
        } => {
            let phi = resolve_state_formula(labeling, before)?;
            let psi = resolve_state_formula(labeling, target)?;
            match query {
                Query::Quantitative => {
                    reachability::until_probabilities(model, &phi, &psi, *bound, direction, config)
                }
                Query::QualitativeGreaterZero | Query::QualitativeOne => {
                    if !matches!(bound, TimeBound::Unbounded) {
                        return Err(CheckError::UnsupportedProperty(
                            "qualitative queries need an unbounded until".to_string(),
                        ));
                    }
                    reachability::qualitative_until(model, &phi, &psi, query, direction)
                }
            }
        }
    }
}

fn require_quantitative(query: Query) -> Result<(), CheckError> {
    if query != Query::Quantitative {
        return Err(CheckError::UnsupportedProperty(
            "qualitative queries only apply to probability operators".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn opposite(direction: OptimizationDirection) -> OptimizationDirection {
    match direction {
        OptimizationDirection::Minimize => OptimizationDirection::Maximize,
        OptimizationDirection::Maximize => OptimizationDirection::Minimize,
    }
}

/// Direction for a nondeterministic model, defaulting to nothing for
/// deterministic ones (any value works there, the solvers never branch).
pub(crate) fn require_direction(
    model: &Model<f64>,
    direction: Option<OptimizationDirection>,
) -> Result<OptimizationDirection, CheckError> {
    if model.is_nondeterministic() {
        direction.ok_or(CheckError::Solver(
            crate::solver::SolverError::MissingDirection,
        ))
    } else {
        Ok(direction.unwrap_or(OptimizationDirection::Maximize))
    }
}

/// Resolve a state formula against the labeling into a state set.
pub(crate) fn resolve_state_formula(
    labeling: &Labeling,
    formula: &StateFormula,
) -> Result<BitVector, CheckError> {
    Ok(match formula {
        StateFormula::True => BitVector::full(labeling.state_count()),
        StateFormula::Label(name) => labeling.states_with(name)?.clone(),
        StateFormula::Not(inner) => resolve_state_formula(labeling, inner)?.complement(),
        StateFormula::And(left, right) => {
            &resolve_state_formula(labeling, left)? & &resolve_state_formula(labeling, right)?
        }
        StateFormula::Or(left, right) => {
            &resolve_state_formula(labeling, left)? | &resolve_state_formula(labeling, right)?
        }
    })
}
