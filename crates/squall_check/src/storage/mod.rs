pub mod bitvec;
pub mod matrix;
pub mod mec;
pub mod scc;

pub use bitvec::BitVector;
pub use matrix::{SparseMatrix, SparseMatrixBuilder};
pub use mec::{MaximalEndComponent, MecDecomposition};
pub use scc::SccDecomposition;
