//! Minimal LP layer over Clarabel, used by the long-run-average analysis.
//!
//! Problems are collected as `a . x <= rhs` rows over unbounded continuous
//! variables and handed to Clarabel in its standard conic form
//! (`minimize q' x  s.t.  A x + s = b, s >= 0`, with a zero quadratic term).

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettings, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LpError {
    #[error("linear program is infeasible")]
    Infeasible,

    #[error("lp solver failed: {0}")]
    Solver(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ObjectiveSense {
    Minimize,
    Maximize,
}

/// An LP under construction: unbounded variables, a linear objective and
/// upper-bound rows.
pub(crate) struct LpProblem {
    variable_count: usize,
    objective: Vec<f64>,
    sense: ObjectiveSense,
    /// (sparse row, right-hand side) with `row . x <= rhs` semantics
    rows: Vec<(Vec<(usize, f64)>, f64)>,
}

impl LpProblem {
    pub(crate) fn new(variable_count: usize, sense: ObjectiveSense) -> Self {
        Self {
            variable_count,
            objective: vec![0.0; variable_count],
            sense,
            rows: Vec::new(),
        }
    }

    pub(crate) fn set_objective_coefficient(&mut self, variable: usize, coefficient: f64) {
        self.objective[variable] = coefficient;
    }

    pub(crate) fn add_less_equal(&mut self, row: Vec<(usize, f64)>, rhs: f64) {
        self.rows.push((row, rhs));
    }

    pub(crate) fn add_greater_equal(&mut self, row: Vec<(usize, f64)>, rhs: f64) {
        let negated = row.into_iter().map(|(v, c)| (v, -c)).collect();
        self.rows.push((negated, -rhs));
    }

    /// Solve and return the variable assignment.
    pub(crate) fn solve(&self) -> Result<Vec<f64>, LpError> {
        let n = self.variable_count;
        let m = self.rows.len();

        // zero quadratic term
        let p = CscMatrix::new(n, n, vec![0; n + 1], vec![], vec![]);
        let q: Vec<f64> = match self.sense {
            ObjectiveSense::Minimize => self.objective.clone(),
            ObjectiveSense::Maximize => self.objective.iter().map(|c| -c).collect(),
        };

        // constraint matrix from row triplets, column by column
        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut b = Vec::with_capacity(m);
        for (row_index, (row, rhs)) in self.rows.iter().enumerate() {
            for &(variable, coefficient) in row {
                triplets.push((row_index, variable, coefficient));
            }
            b.push(*rhs);
        }
        triplets.sort_unstable_by_key(|&(r, c, _)| (c, r));
        let mut colptr = vec![0usize; n + 1];
        let mut rowval: Vec<usize> = Vec::with_capacity(triplets.len());
        let mut nzval: Vec<f64> = Vec::with_capacity(triplets.len());
        let mut i = 0;
        while i < triplets.len() {
            let (r, c, mut v) = triplets[i];
            i += 1;
            // combine duplicate coefficients of one variable in one row
            while i < triplets.len() && triplets[i].0 == r && triplets[i].1 == c {
                v += triplets[i].2;
                i += 1;
            }
            colptr[c + 1] += 1;
            rowval.push(r);
            nzval.push(v);
        }
        for c in 0..n {
            colptr[c + 1] += colptr[c];
        }
        let a = CscMatrix::new(m, n, colptr, rowval, nzval);

        let cones = [SupportedConeT::NonnegativeConeT(m)];
        let settings = DefaultSettings::<f64> {
            verbose: false,
            ..Default::default()
        };
        let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings);
        solver.solve();

        match solver.solution.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => Ok(solver.solution.x.clone()),
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                Err(LpError::Infeasible)
            }
            status => Err(LpError::Solver(format!("unexpected status: {status:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maximizes_under_constraints() {
        // maximize x0 subject to x0 <= 3, x0 + x1 <= 5, x1 >= 1
        let mut lp = LpProblem::new(2, ObjectiveSense::Maximize);
        lp.set_objective_coefficient(0, 1.0);
        lp.add_less_equal(vec![(0, 1.0)], 3.0);
        lp.add_less_equal(vec![(0, 1.0), (1, 1.0)], 5.0);
        lp.add_greater_equal(vec![(1, 1.0)], 1.0);
        let solution = lp.solve().unwrap();
        assert!((solution[0] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn reports_infeasibility() {
        // x0 <= 0 and x0 >= 1 cannot both hold
        let mut lp = LpProblem::new(1, ObjectiveSense::Minimize);
        lp.set_objective_coefficient(0, 1.0);
        lp.add_less_equal(vec![(0, 1.0)], 0.0);
        lp.add_greater_equal(vec![(0, 1.0)], 1.0);
        assert!(matches!(lp.solve(), Err(LpError::Infeasible)));
    }
}
