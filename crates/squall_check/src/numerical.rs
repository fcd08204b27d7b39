//! Numerical helpers for continuous-time analysis: truncated Poisson
//! weights (Fox-Glynn) and the uniformised transition matrix.

use crate::error::CheckError;
use crate::storage::{BitVector, SparseMatrix, SparseMatrixBuilder};

/// Truncated Poisson distribution for rate `lambda`, in the Fox-Glynn
/// representation: unnormalised weights for `left..=right` plus their total.
/// `weights[k - left] / total_weight` approximates the Poisson probability
/// of `k`.
#[derive(Debug, Clone)]
pub struct FoxGlynnWeights {
    pub left: usize,
    pub right: usize,
    pub weights: Vec<f64>,
    pub total_weight: f64,
}

/// Compute the truncated Poisson weights for `lambda`, dropping at most
/// `epsilon` probability mass on either tail.
///
/// The recursion is anchored at the mode with a large scale factor, so the
/// intermediate terms stay far away from underflow; truncation points are
/// found by trimming tails of negligible relative mass.
pub fn fox_glynn(lambda: f64, epsilon: f64) -> Result<FoxGlynnWeights, CheckError> {
    if !(lambda > 0.0) || !lambda.is_finite() {
        return Err(CheckError::InputInvariantViolation(format!(
            "uniformisation rate must be positive and finite, got {lambda}"
        )));
    }
    let mode = lambda.floor() as usize;
    const ANCHOR: f64 = 1e+10;
    const FLOOR: f64 = 1e-250;

    // downward recursion w(k-1) = (k / lambda) * w(k)
    let mut below = Vec::new();
    let mut weight = ANCHOR;
    let mut k = mode;
    while k > 0 {
        weight *= k as f64 / lambda;
        if weight < FLOOR {
            break;
        }
        below.push(weight);
        k -= 1;
    }
    // upward recursion w(k+1) = lambda / (k+1) * w(k)
    let mut above = Vec::new();
    let mut weight = ANCHOR;
    let mut k = mode;
    loop {
        weight *= lambda / (k + 1) as f64;
        k += 1;
        if weight < FLOOR {
            break;
        }
        above.push(weight);
    }

    let mut weights = Vec::with_capacity(below.len() + 1 + above.len());
    weights.extend(below.iter().rev());
    weights.push(ANCHOR);
    weights.extend(above.iter());
    let mut left = mode - below.len();
    let mut right = mode + above.len();

    // trim tails whose accumulated mass stays below epsilon/2 each
    let total: f64 = weights.iter().sum();
    let tail_budget = total * (epsilon / 2.0);
    let mut trimmed = 0.0;
    while weights.len() > 1 && trimmed + weights[0] <= tail_budget {
        trimmed += weights[0];
        weights.remove(0);
        left += 1;
    }
    let mut trimmed = 0.0;
    while weights.len() > 1 && trimmed + *weights.last().unwrap() <= tail_budget {
        trimmed += weights.pop().unwrap();
        right -= 1;
    }

    let total_weight: f64 = weights.iter().sum();
    Ok(FoxGlynnWeights {
        left,
        right,
        weights,
        total_weight,
    })
}

/// Uniformise a CTMC at rate `lambda`: the returned DTMC takes one step per
/// exponential event of rate `lambda`, i.e.
/// `P(s, s) = 1 - E(s)/lambda * (1 - P_emb(s, s))` and
/// `P(s, s') = E(s)/lambda * P_emb(s, s')` otherwise. States in `absorbing`
/// are replaced by a self-loop of probability one.
pub fn uniformize(
    embedded: &SparseMatrix<f64>,
    exit_rates: &[f64],
    lambda: f64,
    absorbing: &BitVector,
) -> Result<SparseMatrix<f64>, CheckError> {
    let n = embedded.row_count();
    let mut builder = SparseMatrixBuilder::new();
    for state in 0..n {
        if absorbing.get(state) {
            builder.add_next_value(state, state, 1.0)?;
            continue;
        }
        let ratio = exit_rates[state] / lambda;
        let (columns, values) = embedded.row(state);
        let mut diagonal = 1.0 - ratio;
        // fold an embedded self-loop into the diagonal
        if let Ok(position) = columns.binary_search(&state) {
            diagonal += ratio * values[position];
        }
        let mut wrote_diagonal = false;
        for (&c, &v) in columns.iter().zip(values) {
            if c == state {
                continue;
            }
            if !wrote_diagonal && c > state {
                builder.add_next_value(state, state, diagonal)?;
                wrote_diagonal = true;
            }
            builder.add_next_value(state, c, ratio * v)?;
        }
        if !wrote_diagonal {
            builder.add_next_value(state, state, diagonal)?;
        }
    }
    Ok(builder.build(Some(n), Some(n))?)
}

/// The largest exit rate, the canonical uniformisation rate.
pub fn max_exit_rate(exit_rates: &[f64]) -> f64 {
    exit_rates.iter().copied().fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poisson(lambda: f64, k: usize) -> f64 {
        let mut p = (-lambda).exp();
        for i in 1..=k {
            p *= lambda / i as f64;
        }
        p
    }

    #[test]
    fn weights_normalise_to_one() {
        for lambda in [0.5, 4.0, 30.0, 250.0] {
            let fg = fox_glynn(lambda, 1e-10).unwrap();
            let sum: f64 = fg.weights.iter().map(|w| w / fg.total_weight).sum();
            assert!((sum - 1.0).abs() < 1e-12, "lambda = {lambda}");
            assert_eq!(fg.weights.len(), fg.right - fg.left + 1);
        }
    }

    #[test]
    fn weights_match_poisson_probabilities() {
        let lambda = 6.5;
        let fg = fox_glynn(lambda, 1e-12).unwrap();
        for (offset, weight) in fg.weights.iter().enumerate() {
            let k = fg.left + offset;
            let expected = poisson(lambda, k);
            assert!(
                (weight / fg.total_weight - expected).abs() < 1e-10,
                "k = {k}"
            );
        }
    }

    #[test]
    fn truncation_brackets_the_mode() {
        let lambda = 100.0;
        let fg = fox_glynn(lambda, 1e-8).unwrap();
        assert!(fg.left < 100 && 100 < fg.right);
        // the dropped tails carry at most epsilon
        let kept: f64 = (fg.left..=fg.right).map(|k| poisson(lambda, k)).sum();
        assert!(kept > 1.0 - 1e-7);
    }

    #[test]
    fn rejects_nonpositive_rates() {
        assert!(fox_glynn(0.0, 1e-6).is_err());
        assert!(fox_glynn(-1.0, 1e-6).is_err());
    }

    #[test]
    fn uniformisation_preserves_stochasticity() {
        // two-state CTMC: rate 3 from 0 to 1, rate 1 back
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(0, 1, 1.0).unwrap();
        builder.add_next_value(1, 0, 1.0).unwrap();
        let embedded = builder.build(None, None).unwrap();
        let uniformized =
            uniformize(&embedded, &[3.0, 1.0], 3.0, &BitVector::new(2)).unwrap();
        uniformized.assert_rows_stochastic(1e-12).unwrap();
        // state 0 moves with probability one, state 1 with probability 1/3
        assert_eq!(uniformized.row(0), (&[1usize][..], &[1.0][..]));
        let (columns, values) = uniformized.row(1);
        assert_eq!(columns, &[0, 1]);
        assert!((values[0] - 1.0 / 3.0).abs() < 1e-12);
        assert!((values[1] - 2.0 / 3.0).abs() < 1e-12);
    }
}
