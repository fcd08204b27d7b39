//! Small scatter/gather helpers shared by the dispatcher and the solvers.

use crate::storage::BitVector;

/// Scatter: write `values[k]` to the k-th set position of `positions`.
pub(crate) fn set_vector_values<T: Copy>(target: &mut [T], positions: &BitVector, values: &[T]) {
    debug_assert_eq!(positions.count_ones(), values.len());
    for (value, position) in values.iter().zip(positions.iter()) {
        target[position] = *value;
    }
}

/// Scatter a constant to every set position of `positions`.
pub(crate) fn set_vector_values_to<T: Copy>(target: &mut [T], positions: &BitVector, value: T) {
    for position in positions.iter() {
        target[position] = value;
    }
}

/// Gather: the values of `source` at the set positions of `positions`.
pub(crate) fn select_vector_values<T: Copy>(positions: &BitVector, source: &[T]) -> Vec<T> {
    positions.iter().map(|p| source[p]).collect()
}

/// Gather a per-state value once per row of each selected group: the result
/// has one entry per row of every set group, each repeating the group's
/// state value.
pub(crate) fn repeat_group_values<T: Copy>(
    groups: &BitVector,
    group_indices: &[usize],
    per_state: &[T],
) -> Vec<T> {
    let mut result = Vec::new();
    for group in groups.iter() {
        let rows = group_indices[group + 1] - group_indices[group];
        result.extend(std::iter::repeat_n(per_state[group], rows));
    }
    result
}

/// Gather per-row values for every row of each selected group.
pub(crate) fn select_group_row_values<T: Copy>(
    groups: &BitVector,
    group_indices: &[usize],
    per_row: &[T],
) -> Vec<T> {
    let mut result = Vec::new();
    for group in groups.iter() {
        result.extend_from_slice(&per_row[group_indices[group]..group_indices[group + 1]]);
    }
    result
}
