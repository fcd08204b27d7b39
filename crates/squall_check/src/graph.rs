//! Qualitative graph analysis: the prob-0 / prob-1 precomputations.
//!
//! Everything here works on the underlying graph only; probabilities are
//! never multiplied. `backward` is always the state-level predecessor
//! relation obtained from [`SparseMatrix::transpose`], so the same routines
//! serve deterministic and nondeterministic models. The nondeterministic
//! variants additionally quantify over the row-group choices of the forward
//! matrix.

use crate::Scalar;
use crate::storage::{BitVector, SparseMatrix};

/// States from which a `psi` state is reachable through `phi` states with
/// positive probability. Classical backward reachability: seed with `psi`,
/// pull predecessors inside `phi` to fixpoint.
pub fn prob_greater0<T: Scalar>(
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    let mut reachable = psi.clone();
    let mut stack: Vec<usize> = psi.iter().collect();
    while let Some(state) = stack.pop() {
        for &predecessor in backward.row(state).0 {
            if phi.get(predecessor) && !reachable.get(predecessor) {
                reachable.set(predecessor, true);
                stack.push(predecessor);
            }
        }
    }
    reachable
}

/// States from which `psi` is unreachable through `phi` (probability 0).
pub fn prob0<T: Scalar>(
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    prob_greater0(backward, phi, psi).complement()
}

/// States reaching `psi` through `phi` with probability 1, given the
/// previously computed `prob_greater0` set: the complement of "can reach a
/// probability-0 state while staying in `phi`".
pub fn prob1<T: Scalar>(
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    greater0: &BitVector,
) -> BitVector {
    prob_greater0(backward, phi, &greater0.complement()).complement()
}

/// Both qualitative sets for a deterministic model.
pub fn prob01<T: Scalar>(
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> (BitVector, BitVector) {
    let greater0 = prob_greater0(backward, phi, psi);
    let one = prob1(backward, phi, &greater0);
    (greater0.complement(), one)
}

/// States from which *some* scheduler reaches `psi` through `phi` with
/// positive probability. On the graph this is plain backward reachability,
/// since a single suitable choice per state suffices.
pub fn prob_greater0e<T: Scalar>(
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    prob_greater0(backward, phi, psi)
}

/// States from which *every* scheduler misses `psi` (probability 0 under all).
pub fn prob0a<T: Scalar>(
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    prob_greater0e(backward, phi, psi).complement()
}

/// States from which *every* scheduler reaches `psi` through `phi` with
/// positive probability: a predecessor joins the frontier only when each of
/// its row-group choices has at least one successor already inside.
pub fn prob_greater0a<T: Scalar>(
    transitions: &SparseMatrix<T>,
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    let mut reachable = psi.clone();
    let mut stack: Vec<usize> = psi.iter().collect();
    while let Some(state) = stack.pop() {
        for &predecessor in backward.row(state).0 {
            if phi.get(predecessor) && !reachable.get(predecessor) {
                let every_choice = transitions
                    .rows_of_group(predecessor)
                    .all(|row| transitions.row(row).0.iter().any(|&c| reachable.get(c)));
                if every_choice {
                    reachable.set(predecessor, true);
                    stack.push(predecessor);
                }
            }
        }
    }
    reachable
}

/// States from which *some* scheduler misses `psi` entirely.
pub fn prob0e<T: Scalar>(
    transitions: &SparseMatrix<T>,
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    prob_greater0a(transitions, backward, phi, psi).complement()
}

/// States for which *some* scheduler reaches `psi` with probability 1.
///
/// Nested fixpoint: the outer iteration shrinks the candidate set, the inner
/// backward search admits a predecessor if it has a choice whose successors
/// all stay inside the candidates and at least one hits the inner frontier.
pub fn prob1e<T: Scalar>(
    transitions: &SparseMatrix<T>,
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    nested_prob1(transitions, backward, phi, psi, false)
}

/// States for which *every* scheduler reaches `psi` with probability 1. As
/// [`prob1e`] with the choice quantifier flipped: every choice must stay
/// inside the candidates and every choice must be able to hit the frontier.
pub fn prob1a<T: Scalar>(
    transitions: &SparseMatrix<T>,
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> BitVector {
    nested_prob1(transitions, backward, phi, psi, true)
}

fn nested_prob1<T: Scalar>(
    transitions: &SparseMatrix<T>,
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
    universal: bool,
) -> BitVector {
    let mut current = BitVector::full(transitions.row_group_count());
    loop {
        let mut next = psi.clone();
        let mut stack: Vec<usize> = psi.iter().collect();
        while let Some(state) = stack.pop() {
            for &predecessor in backward.row(state).0 {
                if !phi.get(predecessor) || next.get(predecessor) {
                    continue;
                }
                let admissible = |row: usize| {
                    let columns = transitions.row(row).0;
                    columns.iter().all(|&c| current.get(c))
                        && columns.iter().any(|&c| next.get(c))
                };
                let ok = if universal {
                    transitions.rows_of_group(predecessor).all(admissible)
                } else {
                    transitions.rows_of_group(predecessor).any(admissible)
                };
                if ok {
                    next.set(predecessor, true);
                    stack.push(predecessor);
                }
            }
        }
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Qualitative sets for a maximizing query: (prob-0, prob-1).
pub fn prob01_max<T: Scalar>(
    transitions: &SparseMatrix<T>,
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> (BitVector, BitVector) {
    let zero = prob0a(backward, phi, psi);
    let one = prob1e(transitions, backward, phi, psi);
    (zero, one)
}

/// Qualitative sets for a minimizing query: (prob-0, prob-1).
pub fn prob01_min<T: Scalar>(
    transitions: &SparseMatrix<T>,
    backward: &SparseMatrix<T>,
    phi: &BitVector,
    psi: &BitVector,
) -> (BitVector, BitVector) {
    let zero = prob0e(transitions, backward, phi, psi);
    let one = prob1a(transitions, backward, phi, psi);
    (zero, one)
}
