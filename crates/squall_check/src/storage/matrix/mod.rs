use std::ops::Range;

use num_traits::Float;

use crate::storage::BitVector;
use crate::{OptimizationDirection, Scalar};

pub mod builder;
pub mod error;

pub use builder::SparseMatrixBuilder;
pub use error::MatrixError;

/// Row-grouped compressed sparse row matrix.
///
/// - row pointers mark the start and end of each row
/// - columns within a row are strictly increasing
/// - an optional row grouping partitions the rows into consecutive groups,
///   one group per state of a nondeterministic model; deterministic models
///   carry the trivial grouping (group i = row i)
///
/// Built once through [`SparseMatrixBuilder`], immutable afterwards. All
/// derived matrices (submatrix, transpose, row selection) are fresh values.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix<T> {
    column_count: usize,
    /// Row pointers, len = row_count + 1
    row_pointers: Vec<usize>,
    /// Column indices, len = entry_count
    column_indices: Vec<usize>,
    /// Entry values, len = entry_count
    values: Vec<T>,
    /// Group pointers, len = row_group_count + 1
    row_group_indices: Vec<usize>,
    trivial_row_grouping: bool,
}

impl<T: Scalar> SparseMatrix<T> {
    pub fn row_count(&self) -> usize {
        self.row_pointers.len() - 1
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn entry_count(&self) -> usize {
        self.column_indices.len()
    }

    pub fn row_group_count(&self) -> usize {
        self.row_group_indices.len() - 1
    }

    pub fn has_trivial_row_grouping(&self) -> bool {
        self.trivial_row_grouping
    }

    pub fn row_group_indices(&self) -> &[usize] {
        &self.row_group_indices
    }

    /// Rows that belong to the given row group.
    pub fn rows_of_group(&self, group: usize) -> Range<usize> {
        self.row_group_indices[group]..self.row_group_indices[group + 1]
    }

    /// Return (column_indices, values) slices for row `row`.
    pub fn row(&self, row: usize) -> (&[usize], &[T]) {
        let (start, end) = (self.row_pointers[row], self.row_pointers[row + 1]);
        (&self.column_indices[start..end], &self.values[start..end])
    }

    pub fn row_sum(&self, row: usize) -> T {
        let (_, values) = self.row(row);
        let mut sum = T::zero();
        for &v in values {
            sum += v;
        }
        sum
    }

    /// Sum of the entries of `row` whose column is set in `mask`.
    pub fn constrained_row_sum(&self, row: usize, mask: &BitVector) -> T {
        let (columns, values) = self.row(row);
        let mut sum = T::zero();
        for (&c, &v) in columns.iter().zip(values) {
            if mask.get(c) {
                sum += v;
            }
        }
        sum
    }

    /// One constrained row sum per set bit of `rows`, in ascending row order.
    pub fn constrained_row_sum_vector(&self, rows: &BitVector, columns: &BitVector) -> Vec<T> {
        rows.iter()
            .map(|r| self.constrained_row_sum(r, columns))
            .collect()
    }

    /// One constrained row sum per row of every set group of `groups`, in
    /// ascending row order. This is the right-hand-side shape for grouped
    /// (nondeterministic) equation systems.
    pub fn constrained_group_sum_vector(&self, groups: &BitVector, columns: &BitVector) -> Vec<T> {
        let mut result = Vec::new();
        for group in groups.iter() {
            for row in self.rows_of_group(group) {
                result.push(self.constrained_row_sum(row, columns));
            }
        }
        result
    }

    /// Extract the submatrix selected by `row_constraint` and
    /// `column_constraint`, renumbering rows and columns by their position
    /// among the set bits.
    ///
    /// With `use_row_grouping` the row constraint ranges over row groups and
    /// every row of a selected group is kept (grouping preserved); without it
    /// the constraint selects individual rows and the result carries the
    /// trivial grouping. `insert_diagonal` materialises a zero entry at the
    /// local diagonal position of every kept row that has none, so that
    /// `I - M` has a uniform sparsity structure.
    pub fn submatrix(
        &self,
        use_row_grouping: bool,
        row_constraint: &BitVector,
        column_constraint: &BitVector,
        insert_diagonal: bool,
    ) -> Result<SparseMatrix<T>, MatrixError> {
        let expected_rows = if use_row_grouping {
            self.row_group_count()
        } else {
            self.row_count()
        };
        check_length(row_constraint.len(), expected_rows)?;
        check_length(column_constraint.len(), self.column_count)?;

        // old column -> new column, usize::MAX for dropped columns
        let mut column_map = vec![usize::MAX; self.column_count];
        for (new, old) in column_constraint.iter().enumerate() {
            column_map[old] = new;
        }
        let new_column_count = column_constraint.count_ones();

        let mut row_pointers = vec![0];
        let mut column_indices = Vec::new();
        let mut values = Vec::new();
        let mut row_group_indices = vec![0];

        if use_row_grouping {
            for (local, group) in row_constraint.iter().enumerate() {
                for row in self.rows_of_group(group) {
                    let (columns, row_values) = self.row(row);
                    copy_constrained_row(
                        columns,
                        row_values,
                        &column_map,
                        insert_diagonal.then_some(local),
                        &mut column_indices,
                        &mut values,
                    );
                    row_pointers.push(column_indices.len());
                }
                row_group_indices.push(row_pointers.len() - 1);
            }
        } else {
            for (local, row) in row_constraint.iter().enumerate() {
                let (columns, row_values) = self.row(row);
                copy_constrained_row(
                    columns,
                    row_values,
                    &column_map,
                    insert_diagonal.then_some(local),
                    &mut column_indices,
                    &mut values,
                );
                row_pointers.push(column_indices.len());
                row_group_indices.push(row_pointers.len() - 1);
            }
        }

        let trivial = !use_row_grouping || self.trivial_row_grouping;
        let result = SparseMatrix {
            column_count: new_column_count,
            row_pointers,
            column_indices,
            values,
            row_group_indices,
            trivial_row_grouping: trivial,
        };
        debug_assert!(result.check_invariants().is_ok());
        Ok(result)
    }

    /// Select one row per row group, yielding a deterministic matrix over the
    /// same column space. `choices[g]` is the local choice inside group `g`.
    pub fn select_group_rows(&self, choices: &[usize]) -> Result<SparseMatrix<T>, MatrixError> {
        check_length(choices.len(), self.row_group_count())?;
        let mut row_pointers = vec![0];
        let mut column_indices = Vec::new();
        let mut values = Vec::new();
        for (group, &choice) in choices.iter().enumerate() {
            let rows = self.rows_of_group(group);
            if choice >= rows.len() {
                return Err(MatrixError::InvalidChoice {
                    group,
                    choice,
                    size: rows.len(),
                });
            }
            let (columns, row_values) = self.row(rows.start + choice);
            column_indices.extend_from_slice(columns);
            values.extend_from_slice(row_values);
            row_pointers.push(column_indices.len());
        }
        let group_count = self.row_group_count();
        Ok(SparseMatrix {
            column_count: self.column_count,
            row_pointers,
            column_indices,
            values,
            row_group_indices: (0..=group_count).collect(),
            trivial_row_grouping: true,
        })
    }

    /// Transpose at state level: the result maps each column of `self` to its
    /// predecessor *row groups*, so for nondeterministic matrices it is the
    /// backward transition relation between states. Entries that coincide
    /// (two choices of one state reaching the same target) are combined by
    /// addition; zero-valued entries are dropped unless `keep_zeros`.
    pub fn transpose(&self, keep_zeros: bool) -> SparseMatrix<T> {
        let mut triples: Vec<(usize, usize, T)> = Vec::with_capacity(self.entry_count());
        for group in 0..self.row_group_count() {
            for row in self.rows_of_group(group) {
                let (columns, values) = self.row(row);
                for (&c, &v) in columns.iter().zip(values) {
                    triples.push((c, group, v));
                }
            }
        }
        triples.sort_unstable_by_key(|&(row, column, _)| (row, column));

        // combine duplicates, as in a canonical COO -> CSR pass
        let row_count = self.column_count;
        let mut row_pointers = vec![0usize; row_count + 1];
        let mut column_indices = Vec::with_capacity(triples.len());
        let mut values = Vec::with_capacity(triples.len());
        let mut i = 0;
        while i < triples.len() {
            let (row, column, mut value) = triples[i];
            i += 1;
            while i < triples.len() && triples[i].0 == row && triples[i].1 == column {
                value += triples[i].2;
                i += 1;
            }
            if keep_zeros || value != T::zero() {
                row_pointers[row + 1] += 1;
                column_indices.push(column);
                values.push(value);
            }
        }
        for r in 0..row_count {
            row_pointers[r + 1] += row_pointers[r];
        }

        let result = SparseMatrix {
            column_count: self.row_group_count(),
            row_pointers,
            column_indices,
            values,
            row_group_indices: (0..=row_count).collect(),
            trivial_row_grouping: true,
        };
        debug_assert!(result.check_invariants().is_ok());
        result
    }

    /// result[i] = sum_j M[i, j] * x[j]
    pub fn multiply_with_vector(&self, x: &[T], result: &mut [T]) -> Result<(), MatrixError> {
        check_length(x.len(), self.column_count)?;
        check_length(result.len(), self.row_count())?;
        for row in 0..self.row_count() {
            let (columns, values) = self.row(row);
            let mut sum = T::zero();
            for (&c, &v) in columns.iter().zip(values) {
                sum += v * x[c];
            }
            result[row] = sum;
        }
        Ok(())
    }

    /// For every row group, compute `M[row] * x + b[row]` for each of its
    /// rows and reduce across the group by min or max. When a `choices`
    /// buffer is supplied, the local index of the optimizing row is recorded;
    /// ties go to the lowest row index.
    pub fn multiply_and_reduce(
        &self,
        direction: OptimizationDirection,
        x: &[T],
        b: Option<&[T]>,
        result: &mut [T],
        mut choices: Option<&mut [usize]>,
    ) -> Result<(), MatrixError> {
        check_length(x.len(), self.column_count)?;
        if let Some(b) = b {
            check_length(b.len(), self.row_count())?;
        }
        check_length(result.len(), self.row_group_count())?;
        if let Some(choices) = choices.as_deref() {
            check_length(choices.len(), self.row_group_count())?;
        }

        for group in 0..self.row_group_count() {
            let rows = self.rows_of_group(group);
            let first_row = rows.start;
            let mut best: Option<(T, usize)> = None;
            for row in rows {
                let (columns, values) = self.row(row);
                let mut value = b.map_or_else(T::zero, |b| b[row]);
                for (&c, &v) in columns.iter().zip(values) {
                    value += v * x[c];
                }
                let better = match best {
                    None => true,
                    Some((current, _)) => match direction {
                        OptimizationDirection::Minimize => value < current,
                        OptimizationDirection::Maximize => value > current,
                    },
                };
                if better {
                    best = Some((value, row - first_row));
                }
            }
            let (value, choice) = best.unwrap_or((T::zero(), 0));
            result[group] = value;
            if let Some(choices) = choices.as_deref_mut() {
                choices[group] = choice;
            }
        }
        Ok(())
    }

    /// Entries in row-major order as (row, column, value) triples.
    pub fn triples(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        (0..self.row_count()).flat_map(move |row| {
            let (columns, values) = self.row(row);
            columns
                .iter()
                .zip(values)
                .map(move |(&c, &v)| (row, c, v))
        })
    }

    pub fn check_invariants(&self) -> Result<(), MatrixError> {
        if self.row_pointers.is_empty() {
            return Err(MatrixError::InvalidRowPointersLength {
                expected: 1,
                actual: 0,
            });
        }
        if self.row_pointers[0] != 0 {
            return Err(MatrixError::InvalidRowPointers {
                index: 0,
                expected: 0,
                actual: self.row_pointers[0],
            });
        }
        if *self.row_pointers.last().unwrap() != self.entry_count() {
            return Err(MatrixError::InvalidRowPointers {
                index: self.row_count(),
                expected: self.entry_count(),
                actual: *self.row_pointers.last().unwrap(),
            });
        }
        for row in 0..self.row_count() {
            let (start, end) = (self.row_pointers[row], self.row_pointers[row + 1]);
            if start > end {
                return Err(MatrixError::InvalidRowPointers {
                    index: row,
                    expected: start,
                    actual: end,
                });
            }
            let mut previous = None;
            for &c in &self.column_indices[start..end] {
                if c >= self.column_count {
                    return Err(MatrixError::OutOfBoundsIndex {
                        index: c,
                        max: self.column_count,
                    });
                }
                if let Some(p) = previous {
                    if c <= p {
                        return Err(MatrixError::ColumnOrderViolation {
                            row,
                            column: c,
                            current: p,
                        });
                    }
                }
                previous = Some(c);
            }
        }
        let groups = &self.row_group_indices;
        if groups.first() != Some(&0) || groups.last() != Some(&self.row_count()) {
            return Err(MatrixError::GroupStartViolation {
                start: *groups.first().unwrap_or(&0),
            });
        }
        for pair in groups.windows(2) {
            if pair[0] > pair[1] {
                return Err(MatrixError::GroupOrderViolation {
                    start: pair[1],
                    current: pair[0],
                });
            }
        }
        Ok(())
    }
}

impl<T: Scalar + Float> SparseMatrix<T> {
    /// Verify that every row sums to one within `tolerance`.
    pub fn assert_rows_stochastic(&self, tolerance: T) -> Result<(), MatrixError> {
        for row in 0..self.row_count() {
            if (self.row_sum(row) - T::one()).abs() > tolerance {
                return Err(MatrixError::NotStochastic { row });
            }
        }
        Ok(())
    }
}

/// Copy one row into the output arrays, renumbering columns through
/// `column_map` and materialising a zero at `diagonal` when requested.
fn copy_constrained_row<T: Scalar>(
    columns: &[usize],
    row_values: &[T],
    column_map: &[usize],
    mut diagonal: Option<usize>,
    column_indices: &mut Vec<usize>,
    values: &mut Vec<T>,
) {
    for (&c, &v) in columns.iter().zip(row_values) {
        let new_column = column_map[c];
        if new_column == usize::MAX {
            continue;
        }
        if let Some(d) = diagonal {
            if new_column == d {
                diagonal = None;
            } else if new_column > d {
                column_indices.push(d);
                values.push(T::zero());
                diagonal = None;
            }
        }
        column_indices.push(new_column);
        values.push(v);
    }
    if let Some(d) = diagonal {
        column_indices.push(d);
        values.push(T::zero());
    }
}

fn check_length(actual: usize, expected: usize) -> Result<(), MatrixError> {
    if actual != expected {
        return Err(MatrixError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OptimizationDirection::{Maximize, Minimize};

    fn chain() -> SparseMatrix<f64> {
        // 0 -> 1 (0.5), 0 -> 2 (0.5); 1 -> 1 (1.0); 2 -> 2 (1.0)
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(0, 1, 0.5).unwrap();
        builder.add_next_value(0, 2, 0.5).unwrap();
        builder.add_next_value(1, 1, 1.0).unwrap();
        builder.add_next_value(2, 2, 1.0).unwrap();
        builder.build(None, None).unwrap()
    }

    fn grouped() -> SparseMatrix<f64> {
        // state 0 with two choices, states 1 and 2 absorbing
        let mut builder = SparseMatrixBuilder::with_row_groups();
        builder.new_row_group(0).unwrap();
        builder.add_next_value(0, 1, 1.0).unwrap();
        builder.add_next_value(1, 1, 0.2).unwrap();
        builder.add_next_value(1, 2, 0.8).unwrap();
        builder.new_row_group(2).unwrap();
        builder.add_next_value(2, 1, 1.0).unwrap();
        builder.new_row_group(3).unwrap();
        builder.add_next_value(3, 2, 1.0).unwrap();
        builder.build(None, None).unwrap()
    }

    #[test]
    fn row_access_and_sums() {
        let m = chain();
        assert_eq!(m.row_count(), 3);
        assert_eq!(m.entry_count(), 4);
        let (columns, values) = m.row(0);
        assert_eq!(columns, &[1, 2]);
        assert_eq!(values, &[0.5, 0.5]);
        assert_eq!(m.row_sum(0), 1.0);
        let mask = BitVector::from_indices(3, &[2]);
        assert_eq!(m.constrained_row_sum(0, &mask), 0.5);
        assert!(m.assert_rows_stochastic(1e-12).is_ok());
    }

    #[test]
    fn triples_round_trip() {
        let m = chain();
        let triples: Vec<_> = m.triples().collect();
        let mut builder = SparseMatrixBuilder::new();
        for &(r, c, v) in &triples {
            builder.add_next_value(r, c, v).unwrap();
        }
        let rebuilt = builder.build(None, None).unwrap();
        assert_eq!(rebuilt.triples().collect::<Vec<_>>(), triples);
    }

    #[test]
    fn submatrix_with_diagonal_entries() {
        let m = chain();
        let keep = BitVector::from_indices(3, &[0, 1]);
        let sub = m.submatrix(false, &keep, &keep, true).unwrap();
        assert_eq!(sub.row_count(), 2);
        assert_eq!(sub.column_count(), 2);
        // row 0 keeps (0, 0) as materialised zero and (0, 1) = 0.5
        let (columns, values) = sub.row(0);
        assert_eq!(columns, &[0, 1]);
        assert_eq!(values, &[0.0, 0.5]);
        // row 1 keeps its self-loop
        assert_eq!(sub.row(1), (&[1usize][..], &[1.0][..]));
    }

    #[test]
    fn grouped_submatrix_keeps_all_rows_of_group() {
        let m = grouped();
        assert_eq!(m.row_group_count(), 3);
        let keep = BitVector::from_indices(3, &[0, 1]);
        let sub = m.submatrix(true, &keep, &keep, false).unwrap();
        assert_eq!(sub.row_count(), 3);
        assert_eq!(sub.row_group_count(), 2);
        assert_eq!(sub.rows_of_group(0), 0..2);
        // second choice of state 0: only the entry to state 1 survives
        assert_eq!(sub.row(1), (&[1usize][..], &[0.2][..]));
    }

    #[test]
    fn transpose_collapses_row_groups() {
        let m = grouped();
        let backward = m.transpose(false);
        assert_eq!(backward.row_count(), 3);
        assert_eq!(backward.column_count(), 3);
        // predecessors of state 1: state 0 (both choices combined) and itself
        let (columns, values) = backward.row(1);
        assert_eq!(columns, &[0, 1]);
        assert_eq!(values, &[1.2, 1.0]);
    }

    #[test]
    fn multiply_with_vector_matches_dense() {
        let m = chain();
        let x = vec![1.0, 2.0, 3.0];
        let mut result = vec![0.0; 3];
        m.multiply_with_vector(&x, &mut result).unwrap();
        assert_eq!(result, vec![2.5, 2.0, 3.0]);
    }

    #[test]
    fn multiply_and_reduce_picks_optimum_and_lowest_row_on_ties() {
        let m = grouped();
        let x = vec![0.0, 1.0, 0.0];
        let mut result = vec![0.0; 3];
        let mut choices = vec![usize::MAX; 3];
        m.multiply_and_reduce(Maximize, &x, None, &mut result, Some(&mut choices))
            .unwrap();
        assert_eq!(result[0], 1.0);
        assert_eq!(choices[0], 0);
        m.multiply_and_reduce(Minimize, &x, None, &mut result, Some(&mut choices))
            .unwrap();
        assert_eq!(result[0], 0.2);
        assert_eq!(choices[0], 1);

        // with equal values the lowest row index wins
        let x = vec![0.0, 1.0, 1.0];
        m.multiply_and_reduce(Maximize, &x, None, &mut result, Some(&mut choices))
            .unwrap();
        assert_eq!(result[0], 1.0);
        assert_eq!(choices[0], 0);
    }

    #[test]
    fn select_group_rows_yields_deterministic_matrix() {
        let m = grouped();
        let induced = m.select_group_rows(&[1, 0, 0]).unwrap();
        assert_eq!(induced.row_count(), 3);
        assert!(induced.has_trivial_row_grouping());
        assert_eq!(induced.row(0), (&[1usize, 2][..], &[0.2, 0.8][..]));
        assert!(matches!(
            m.select_group_rows(&[2, 0, 0]),
            Err(MatrixError::InvalidChoice { .. })
        ));
    }

    #[test]
    fn dimension_mismatch_is_reported() {
        let m = chain();
        let x = vec![0.0; 2];
        let mut result = vec![0.0; 3];
        assert!(matches!(
            m.multiply_with_vector(&x, &mut result),
            Err(MatrixError::DimensionMismatch { .. })
        ));
    }
}
