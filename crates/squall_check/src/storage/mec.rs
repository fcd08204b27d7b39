//! Maximal end component decomposition for nondeterministic models.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::Scalar;
use crate::storage::{BitVector, SccDecomposition, SparseMatrix};

/// One maximal end component: for every member state the set of row indices
/// (choices) whose successor distribution stays inside the component. Every
/// member has at least one such choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaximalEndComponent {
    state_choices: BTreeMap<usize, BTreeSet<usize>>,
}

impl MaximalEndComponent {
    pub fn contains_state(&self, state: usize) -> bool {
        self.state_choices.contains_key(&state)
    }

    pub fn states(&self) -> impl Iterator<Item = usize> + '_ {
        self.state_choices.keys().copied()
    }

    /// The in-component choices of `state`, as absolute row indices.
    pub fn choices(&self, state: usize) -> Option<&BTreeSet<usize>> {
        self.state_choices.get(&state)
    }

    pub fn contains_choice(&self, state: usize, row: usize) -> bool {
        self.state_choices
            .get(&state)
            .is_some_and(|choices| choices.contains(&row))
    }

    pub fn len(&self) -> usize {
        self.state_choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_choices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &BTreeSet<usize>)> {
        self.state_choices.iter().map(|(&s, c)| (s, c))
    }
}

/// Decomposition of (a subsystem of) a nondeterministic model into its
/// maximal end components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MecDecomposition {
    blocks: Vec<MaximalEndComponent>,
}

impl MecDecomposition {
    /// Iterate SCC decomposition and choice pruning to fixpoint: inside each
    /// SCC, states whose every choice leaves the component are removed and
    /// the removal is propagated backwards; surviving components are
    /// re-decomposed until a full pass changes nothing.
    pub fn new<T: Scalar>(
        transitions: &SparseMatrix<T>,
        backward: &SparseMatrix<T>,
        subsystem: Option<&BitVector>,
    ) -> Self {
        let state_count = transitions.row_group_count();
        let initial = match subsystem {
            Some(s) => {
                assert_eq!(s.len(), state_count);
                s.clone()
            }
            None => BitVector::full(state_count),
        };

        let mut candidates: VecDeque<BitVector> = VecDeque::new();
        candidates.push_back(initial);
        let mut finished: Vec<BitVector> = Vec::new();

        while let Some(candidate) = candidates.pop_front() {
            if candidate.none_set() {
                continue;
            }
            let sccs = SccDecomposition::new(transitions, Some(&candidate), true, false);
            let mut changed =
                sccs.len() != 1 || sccs.block(0).len() < candidate.count_ones();

            let mut survivors: Vec<BitVector> = Vec::with_capacity(sccs.len());
            for block in sccs.iter() {
                let mut members = BitVector::from_indices(state_count, block);
                let mut states_to_check = members.clone();

                while !states_to_check.none_set() {
                    let mut removed = Vec::new();
                    for state in states_to_check.iter() {
                        let keeps_a_choice = transitions.rows_of_group(state).any(|row| {
                            transitions.row(row).0.iter().all(|&c| members.get(c))
                        });
                        if !keeps_a_choice {
                            removed.push(state);
                        }
                    }
                    if removed.is_empty() {
                        break;
                    }
                    changed = true;
                    for &state in &removed {
                        members.set(state, false);
                    }
                    states_to_check.clear();
                    for &state in &removed {
                        for &predecessor in backward.row(state).0 {
                            if members.get(predecessor) {
                                states_to_check.set(predecessor, true);
                            }
                        }
                    }
                }

                if !members.none_set() {
                    survivors.push(members);
                }
            }

            if changed {
                candidates.extend(survivors);
            } else {
                // exactly one SCC, nothing pruned: the candidate is maximal
                finished.push(candidate);
            }
        }

        let blocks = finished
            .into_iter()
            .map(|members| {
                let mut state_choices = BTreeMap::new();
                for state in members.iter() {
                    let choices: BTreeSet<usize> = transitions
                        .rows_of_group(state)
                        .filter(|&row| {
                            transitions.row(row).0.iter().all(|&c| members.get(c))
                        })
                        .collect();
                    debug_assert!(!choices.is_empty());
                    state_choices.insert(state, choices);
                }
                MaximalEndComponent { state_choices }
            })
            .collect();
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block(&self, index: usize) -> &MaximalEndComponent {
        &self.blocks[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &MaximalEndComponent> {
        self.blocks.iter()
    }

    /// Union of all component state sets.
    pub fn state_union(&self, state_count: usize) -> BitVector {
        let mut union = BitVector::new(state_count);
        for mec in &self.blocks {
            for state in mec.states() {
                union.set(state, true);
            }
        }
        union
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SparseMatrixBuilder;

    /// A 3-state MDP. State 0: choice 0 loops between 0 and 1, choice 1
    /// escapes towards 2 with probability one half. State 1 returns to 0.
    /// State 2 is absorbing.
    fn mdp() -> SparseMatrix<f64> {
        let mut builder = SparseMatrixBuilder::with_row_groups();
        builder.new_row_group(0).unwrap();
        builder.add_next_value(0, 1, 1.0).unwrap();
        builder.add_next_value(1, 0, 0.5).unwrap();
        builder.add_next_value(1, 2, 0.5).unwrap();
        builder.new_row_group(2).unwrap();
        builder.add_next_value(2, 0, 1.0).unwrap();
        builder.new_row_group(3).unwrap();
        builder.add_next_value(3, 2, 1.0).unwrap();
        builder.build(None, None).unwrap()
    }

    #[test]
    fn finds_both_end_components() {
        let matrix = mdp();
        let backward = matrix.transpose(false);
        let decomposition = MecDecomposition::new(&matrix, &backward, None);
        assert_eq!(decomposition.len(), 2);

        let with_zero = decomposition
            .iter()
            .find(|mec| mec.contains_state(0))
            .expect("the {0,1} component exists");
        assert_eq!(with_zero.states().collect::<Vec<_>>(), vec![0, 1]);
        // choice 1 of state 0 (row 1) may leave to state 2, so only row 0 stays
        assert_eq!(
            with_zero.choices(0).unwrap().iter().copied().collect::<Vec<_>>(),
            vec![0]
        );
        assert!(with_zero.contains_choice(1, 2));

        let absorbing = decomposition
            .iter()
            .find(|mec| mec.contains_state(2))
            .expect("the {2} component exists");
        assert_eq!(absorbing.len(), 1);
    }

    #[test]
    fn every_member_keeps_a_choice() {
        let matrix = mdp();
        let backward = matrix.transpose(false);
        let decomposition = MecDecomposition::new(&matrix, &backward, None);
        for mec in decomposition.iter() {
            for (state, choices) in mec.iter() {
                assert!(!choices.is_empty(), "state {state} lost all choices");
                for &row in choices {
                    assert!(matrix.rows_of_group(state).contains(&row));
                    for &successor in matrix.row(row).0 {
                        assert!(mec.contains_state(successor));
                    }
                }
            }
        }
    }

    #[test]
    fn transient_states_belong_to_no_component() {
        // 0 -> 1 -> 2 (absorbing), no way back
        let mut builder = SparseMatrixBuilder::with_row_groups();
        builder.new_row_group(0).unwrap();
        builder.add_next_value(0, 1, 1.0).unwrap();
        builder.new_row_group(1).unwrap();
        builder.add_next_value(1, 2, 1.0).unwrap();
        builder.new_row_group(2).unwrap();
        builder.add_next_value(2, 2, 1.0).unwrap();
        let matrix = builder.build(None, None).unwrap();
        let backward = matrix.transpose(false);
        let decomposition = MecDecomposition::new(&matrix, &backward, None);
        assert_eq!(decomposition.len(), 1);
        assert!(decomposition.block(0).contains_state(2));
        assert_eq!(decomposition.state_union(3).iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn subsystem_restriction() {
        let matrix = mdp();
        let backward = matrix.transpose(false);
        let subsystem = BitVector::from_indices(3, &[0, 1]);
        let decomposition = MecDecomposition::new(&matrix, &backward, Some(&subsystem));
        assert_eq!(decomposition.len(), 1);
        assert_eq!(
            decomposition.block(0).states().collect::<Vec<_>>(),
            vec![0, 1]
        );
    }

    #[test]
    fn decomposing_twice_is_idempotent() {
        let matrix = mdp();
        let backward = matrix.transpose(false);
        let a = MecDecomposition::new(&matrix, &backward, None);
        let b = MecDecomposition::new(&matrix, &backward, None);
        assert_eq!(a, b);
    }
}
