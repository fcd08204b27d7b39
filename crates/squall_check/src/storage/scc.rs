//! Strongly connected component decomposition.
//!
//! Path-based algorithm (Gabow / Cheriyan / Mehlhorn): one depth-first walk
//! with a preorder stack S and a representative stack P, kept iterative with
//! an explicit frame stack. Successors are visited in ascending column order
//! as stored by the sparse matrix, row by row within a row group, which
//! makes the decomposition deterministic.

use crate::Scalar;
use crate::storage::{BitVector, SparseMatrix};

const UNSET: usize = usize::MAX;

/// Ordered sequence of SCCs; components appear in the order their final
/// state was popped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SccDecomposition {
    blocks: Vec<Vec<usize>>,
}

/// One depth-first frame: the current state and the scan position inside its
/// row group (row index plus entry offset into that row).
struct Frame {
    state: usize,
    row: usize,
    entry: usize,
}

impl SccDecomposition {
    /// Decompose `matrix` (or the subsystem induced by `subsystem`) into its
    /// strongly connected components. Edges leaving the subsystem are
    /// ignored for the component computation.
    ///
    /// `drop_naive_sccs` discards singletons without a self-loop;
    /// `only_bottom_sccs` keeps only components with no transition into a
    /// different component (transitions out of the subsystem count as
    /// leaving).
    pub fn new<T: Scalar>(
        matrix: &SparseMatrix<T>,
        subsystem: Option<&BitVector>,
        drop_naive_sccs: bool,
        only_bottom_sccs: bool,
    ) -> Self {
        let state_count = matrix.row_group_count();
        let full;
        let subsystem = match subsystem {
            Some(s) => {
                assert_eq!(s.len(), state_count);
                s
            }
            None => {
                full = BitVector::full(state_count);
                &full
            }
        };

        let mut preorder = vec![UNSET; state_count];
        let mut scc_mapping = vec![UNSET; state_count];
        let mut assigned = BitVector::new(state_count);
        let mut has_self_loop = BitVector::new(state_count);
        let mut s_stack: Vec<usize> = Vec::new();
        let mut p_stack: Vec<usize> = Vec::new();
        let mut frames: Vec<Frame> = Vec::new();
        let mut next_preorder = 0usize;
        let mut scc_count = 0usize;

        for root in subsystem.iter() {
            if preorder[root] != UNSET {
                continue;
            }
            push_state(
                matrix,
                root,
                &mut preorder,
                &mut next_preorder,
                &mut s_stack,
                &mut p_stack,
                &mut frames,
            );

            while !frames.is_empty() {
                let top = frames.len() - 1;
                let state = frames[top].state;
                let group_end = matrix.rows_of_group(state).end;
                let mut row = frames[top].row;
                let mut entry = frames[top].entry;
                let mut descended = false;

                'scan: while row < group_end {
                    let columns = matrix.row(row).0;
                    while entry < columns.len() {
                        let successor = columns[entry];
                        entry += 1;
                        if successor == state {
                            has_self_loop.set(state, true);
                        }
                        if !subsystem.get(successor) {
                            continue;
                        }
                        if preorder[successor] == UNSET {
                            // remember the scan position and descend
                            frames[top].row = row;
                            frames[top].entry = entry;
                            push_state(
                                matrix,
                                successor,
                                &mut preorder,
                                &mut next_preorder,
                                &mut s_stack,
                                &mut p_stack,
                                &mut frames,
                            );
                            descended = true;
                            break 'scan;
                        }
                        if !assigned.get(successor) {
                            while preorder[*p_stack.last().unwrap()] > preorder[successor] {
                                p_stack.pop();
                            }
                        }
                    }
                    row += 1;
                    entry = 0;
                }

                if descended {
                    continue;
                }

                // all successors examined: the state is finished
                if p_stack.last() == Some(&state) {
                    p_stack.pop();
                    loop {
                        let member = s_stack.pop().unwrap();
                        scc_mapping[member] = scc_count;
                        assigned.set(member, true);
                        if member == state {
                            break;
                        }
                    }
                    scc_count += 1;
                }
                frames.pop();
            }
        }

        // group states into blocks; states iterate in ascending order, so
        // every block ends up sorted
        let mut blocks: Vec<Vec<usize>> = vec![Vec::new(); scc_count];
        for state in subsystem.iter() {
            blocks[scc_mapping[state]].push(state);
        }

        let mut keep = vec![true; scc_count];
        if only_bottom_sccs {
            for state in subsystem.iter() {
                let scc = scc_mapping[state];
                'rows: for row in matrix.rows_of_group(state) {
                    for &successor in matrix.row(row).0 {
                        let leaves = !subsystem.get(successor)
                            || scc_mapping[successor] != scc;
                        if leaves {
                            keep[scc] = false;
                            break 'rows;
                        }
                    }
                }
            }
        }
        if drop_naive_sccs {
            for (scc, block) in blocks.iter().enumerate() {
                if block.len() == 1 && !has_self_loop.get(block[0]) {
                    keep[scc] = false;
                }
            }
        }

        let blocks = blocks
            .into_iter()
            .zip(keep)
            .filter_map(|(block, keep)| keep.then_some(block))
            .collect();
        Self { blocks }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The states of block `index`, ascending.
    pub fn block(&self, index: usize) -> &[usize] {
        &self.blocks[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.blocks.iter().map(|b| b.as_slice())
    }
}

fn push_state<T: Scalar>(
    matrix: &SparseMatrix<T>,
    state: usize,
    preorder: &mut [usize],
    next_preorder: &mut usize,
    s_stack: &mut Vec<usize>,
    p_stack: &mut Vec<usize>,
    frames: &mut Vec<Frame>,
) {
    preorder[state] = *next_preorder;
    *next_preorder += 1;
    s_stack.push(state);
    p_stack.push(state);
    frames.push(Frame {
        state,
        row: matrix.rows_of_group(state).start,
        entry: 0,
    });
}
