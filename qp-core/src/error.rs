//! Error types for the QP solvers.

use crate::linalg::KktError;
use thiserror::Error;

/// Solver errors.
///
/// Running out of iterations is not an error; it is reported as
/// [`SolveStatus::MaxIterations`](crate::SolveStatus::MaxIterations).
#[derive(Error, Debug)]
pub enum SolverError {
    /// An operand does not match the dimensions implied by the problem.
    #[error("invalid dimension for {operand}: expected {expected:?}, found {found:?}")]
    InvalidDimension {
        /// Operand name (`Q`, `A`, `b`, `c`, `x`, `y`, `z`)
        operand: &'static str,
        /// Expected (rows, cols)
        expected: (usize, usize),
        /// Actual (rows, cols)
        found: (usize, usize),
    },

    /// A caller-supplied x or z entry is not strictly positive.
    #[error("initial {component}[{index}] = {value} is not strictly positive")]
    NonPositiveIterate {
        component: &'static str,
        index: usize,
        value: f64,
    },

    /// The KKT system could not be factored at the given iteration.
    #[error("singular KKT system at iteration {iteration}: {source}")]
    SingularSystem {
        iteration: usize,
        #[source]
        source: KktError,
    },

    /// Residuals or the duality measure became non-finite.
    #[error("numerical breakdown at iteration {iteration}: {what}")]
    NumericalBreakdown { iteration: usize, what: String },

    /// Settings are inconsistent with the problem or with each other.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// KKT error outside the iteration loop (e.g. during initialization).
    #[error("KKT error: {0}")]
    Kkt(#[from] KktError),
}

impl SolverError {
    pub(crate) fn vector(operand: &'static str, expected: usize, found: usize) -> Self {
        SolverError::InvalidDimension {
            operand,
            expected: (expected, 1),
            found: (found, 1),
        }
    }
}

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;
