use crate::Scalar;
use crate::storage::matrix::{MatrixError, SparseMatrix};

/// Streaming builder for [`SparseMatrix`].
///
/// Usage:
///   let mut builder = SparseMatrixBuilder::new();
///   builder.add_next_value(row, column, value)?; ...
///   let matrix = builder.build(None, None)?;
///
/// Rows must arrive in non-decreasing order and columns strictly increasing
/// within a row; anything else is an `OrderViolation`. Values equal to zero
/// are dropped. Finalisation consumes the builder.
#[derive(Debug)]
pub struct SparseMatrixBuilder<T> {
    /// Row pointers under construction; always starts with 0.
    row_pointers: Vec<usize>,
    column_indices: Vec<usize>,
    values: Vec<T>,
    current_row: usize,
    last_column: Option<usize>,
    highest_column: usize,
    has_entries: bool,
    /// Group start rows declared via `new_row_group`, None for trivial grouping.
    row_group_starts: Option<Vec<usize>>,
}

impl<T: Scalar> SparseMatrixBuilder<T> {
    /// Builder for a matrix with the trivial row grouping (one row per group).
    pub fn new() -> Self {
        Self {
            row_pointers: vec![0],
            column_indices: Vec::new(),
            values: Vec::new(),
            current_row: 0,
            last_column: None,
            highest_column: 0,
            has_entries: false,
            row_group_starts: None,
        }
    }

    /// Builder for a matrix with custom row groups; every group must be
    /// declared through [`Self::new_row_group`] before its rows are added.
    pub fn with_row_groups() -> Self {
        Self {
            row_group_starts: Some(Vec::new()),
            ..Self::new()
        }
    }

    pub fn reserve(&mut self, entries: usize) {
        self.column_indices.reserve(entries);
        self.values.reserve(entries);
    }

    /// Declare that a new row group starts at `start_row`.
    pub fn new_row_group(&mut self, start_row: usize) -> Result<(), MatrixError> {
        let starts = self
            .row_group_starts
            .as_mut()
            .ok_or(MatrixError::NoCustomRowGrouping)?;
        if let Some(&last) = starts.last() {
            if start_row < last {
                return Err(MatrixError::GroupOrderViolation {
                    start: start_row,
                    current: last,
                });
            }
        } else if start_row != 0 {
            return Err(MatrixError::GroupStartViolation { start: start_row });
        }
        starts.push(start_row);
        Ok(())
    }

    /// Add the entry (row, column, value). The current row advances to `row`.
    pub fn add_next_value(
        &mut self,
        row: usize,
        column: usize,
        value: T,
    ) -> Result<(), MatrixError> {
        if row < self.current_row {
            return Err(MatrixError::OrderViolation {
                row,
                current: self.current_row,
            });
        }
        if row == self.current_row && self.has_entries {
            if let Some(last) = self.last_column {
                if column <= last {
                    return Err(MatrixError::ColumnOrderViolation {
                        row,
                        column,
                        current: last,
                    });
                }
            }
        }
        while self.current_row < row {
            self.row_pointers.push(self.values.len());
            self.current_row += 1;
            self.last_column = None;
        }
        self.has_entries = true;
        self.highest_column = self.highest_column.max(column);
        self.last_column = Some(column);
        if value != T::zero() {
            self.column_indices.push(column);
            self.values.push(value);
        }
        Ok(())
    }

    /// Finalise the matrix. `row_count` and `column_count` may pad the matrix
    /// with trailing empty rows / columns; requesting fewer than were used is
    /// a `DimensionMismatch`.
    pub fn build(
        mut self,
        row_count: Option<usize>,
        column_count: Option<usize>,
    ) -> Result<SparseMatrix<T>, MatrixError> {
        let used_rows = if self.has_entries || self.current_row > 0 {
            self.current_row + 1
        } else {
            0
        };
        let declared_rows = self
            .row_group_starts
            .as_ref()
            .and_then(|starts| starts.last().map(|&s| s + 1))
            .unwrap_or(0);
        let minimum_rows = used_rows.max(declared_rows);
        let final_rows = match row_count {
            Some(requested) if requested < minimum_rows => {
                return Err(MatrixError::DimensionMismatch {
                    expected: minimum_rows,
                    actual: requested,
                });
            }
            Some(requested) => requested,
            None => minimum_rows,
        };

        let minimum_columns = if self.has_entries {
            self.highest_column + 1
        } else {
            0
        };
        let final_columns = match column_count {
            Some(requested) if requested < minimum_columns => {
                return Err(MatrixError::DimensionMismatch {
                    expected: minimum_columns,
                    actual: requested,
                });
            }
            Some(requested) => requested,
            None => minimum_columns,
        };

        while self.row_pointers.len() < final_rows + 1 {
            self.row_pointers.push(self.values.len());
        }

        let (row_group_indices, trivial) = match self.row_group_starts.take() {
            Some(mut starts) => {
                starts.push(final_rows);
                (starts, false)
            }
            None => ((0..=final_rows).collect(), true),
        };

        let matrix = SparseMatrix {
            column_count: final_columns,
            row_pointers: self.row_pointers,
            column_indices: self.column_indices,
            values: self.values,
            row_group_indices,
            trivial_row_grouping: trivial,
        };
        matrix.check_invariants()?;
        Ok(matrix)
    }
}

impl<T: Scalar> Default for SparseMatrixBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_rows_are_rejected() {
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(1, 0, 0.5).unwrap();
        let error = builder.add_next_value(0, 0, 0.5).unwrap_err();
        assert!(matches!(
            error,
            MatrixError::OrderViolation { row: 0, current: 1 }
        ));
        insta::assert_snapshot!(
            error.to_string(),
            @"rows must be added in non-decreasing order: row 0 after row 1"
        );
    }

    #[test]
    fn non_increasing_columns_are_rejected() {
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(0, 3, 0.5).unwrap();
        assert!(matches!(
            builder.add_next_value(0, 3, 0.5),
            Err(MatrixError::ColumnOrderViolation { .. })
        ));
        assert!(matches!(
            builder.add_next_value(0, 1, 0.5),
            Err(MatrixError::ColumnOrderViolation { .. })
        ));
    }

    #[test]
    fn zero_values_are_dropped() {
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(0, 0, 0.0).unwrap();
        builder.add_next_value(0, 1, 1.0).unwrap();
        let matrix = builder.build(None, None).unwrap();
        assert_eq!(matrix.entry_count(), 1);
        // the dropped zero still fixes the column dimension
        assert_eq!(matrix.column_count(), 2);
    }

    #[test]
    fn skipped_rows_become_empty() {
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(0, 0, 1.0).unwrap();
        builder.add_next_value(3, 0, 1.0).unwrap();
        let matrix = builder.build(None, None).unwrap();
        assert_eq!(matrix.row_count(), 4);
        assert_eq!(matrix.row(1), (&[][..], &[][..]));
        assert_eq!(matrix.row(2), (&[][..], &[][..]));
    }

    #[test]
    fn build_pads_to_requested_dimensions() {
        let mut builder = SparseMatrixBuilder::new();
        builder.add_next_value(0, 0, 1.0).unwrap();
        let matrix = builder.build(Some(5), Some(7)).unwrap();
        assert_eq!(matrix.row_count(), 5);
        assert_eq!(matrix.column_count(), 7);

        let mut builder = SparseMatrixBuilder::<f64>::new();
        builder.add_next_value(2, 0, 1.0).unwrap();
        assert!(matches!(
            builder.build(Some(1), None),
            Err(MatrixError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn row_groups_are_recorded() {
        let mut builder = SparseMatrixBuilder::with_row_groups();
        builder.new_row_group(0).unwrap();
        builder.add_next_value(0, 0, 1.0).unwrap();
        builder.add_next_value(1, 1, 1.0).unwrap();
        builder.new_row_group(2).unwrap();
        builder.add_next_value(2, 0, 1.0).unwrap();
        let matrix = builder.build(None, None).unwrap();
        assert_eq!(matrix.row_group_count(), 2);
        assert_eq!(matrix.rows_of_group(0), 0..2);
        assert_eq!(matrix.rows_of_group(1), 2..3);
        assert!(!matrix.has_trivial_row_grouping());
    }

    #[test]
    fn row_groups_require_custom_mode() {
        let mut builder = SparseMatrixBuilder::<f64>::new();
        assert!(matches!(
            builder.new_row_group(0),
            Err(MatrixError::NoCustomRowGrouping)
        ));
        let mut builder = SparseMatrixBuilder::<f64>::with_row_groups();
        assert!(matches!(
            builder.new_row_group(1),
            Err(MatrixError::GroupStartViolation { start: 1 })
        ));
    }
}
