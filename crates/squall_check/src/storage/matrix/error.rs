use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error("rows must be added in non-decreasing order: row {row} after row {current}")]
    OrderViolation { row: usize, current: usize },

    #[error("columns within row {row} must be strictly increasing: column {column} after column {current}")]
    ColumnOrderViolation {
        row: usize,
        column: usize,
        current: usize,
    },

    #[error("row group starts must be non-decreasing: {start} after {current}")]
    GroupOrderViolation { start: usize, current: usize },

    #[error("row groups must start at row 0, got {start}")]
    GroupStartViolation { start: usize },

    #[error("matrix has no custom row grouping")]
    NoCustomRowGrouping,

    #[error("dimension mismatch: expected {expected}, actual {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid row pointers length: expected {expected}, actual {actual}")]
    InvalidRowPointersLength { expected: usize, actual: usize },

    #[error("invalid row pointers at index {index}: expected {expected}, actual {actual}")]
    InvalidRowPointers {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("out of bounds index: {index} (max: {max})")]
    OutOfBoundsIndex { index: usize, max: usize },

    #[error("row {row} of a stochastic matrix does not sum to one")]
    NotStochastic { row: usize },

    #[error("choice {choice} is out of range for row group {group} of size {size}")]
    InvalidChoice {
        group: usize,
        choice: usize,
        size: usize,
    },
}
