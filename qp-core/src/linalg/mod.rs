//! Linear algebra layer.
//!
//! Matrix storage, vector kernels, and the KKT backends.

pub mod augmented;
pub mod full;
pub mod kkt;
pub mod normal_eqns;
pub mod operator;
pub mod ordering;
pub mod qdldl;
pub mod sparse;
pub mod vector;

pub use kkt::{Direction, KktBuilder, KktError, KktSolver};
pub use operator::MatrixOperator;
pub use sparse::SparseCsc;
