//! Problem data, iterates and solve results.

use crate::error::{SolverError, SolverResult};
use crate::linalg::operator::MatrixOperator;
use crate::linalg::sparse::SparseCsc;
use crate::linalg::vector;
use std::fmt;

/// Direct-form quadratic program.
///
/// ```text
/// minimize    cᵗx + ½ xᵗQx
/// subject to  Ax = b
///             x ≥ 0
/// ```
///
/// Q is n×n symmetric positive semidefinite and stored with both triangles.
/// Q and A share one storage type `M`.
#[derive(Debug, Clone)]
#[allow(non_snake_case)] // Q and A are standard mathematical notation
pub struct QpProblem<M: MatrixOperator = SparseCsc> {
    pub Q: M,
    pub A: M,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
}

impl<M: MatrixOperator> QpProblem<M> {
    #[allow(non_snake_case)]
    pub fn new(Q: M, A: M, b: Vec<f64>, c: Vec<f64>) -> Self {
        Self { Q, A, b, c }
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.A.cols()
    }

    /// Number of equality constraints.
    pub fn num_constraints(&self) -> usize {
        self.A.rows()
    }

    /// Check that Q, A, b and c agree on (m, n).
    pub fn validate(&self) -> SolverResult<()> {
        let (m, n) = self.A.shape();
        if n == 0 {
            return Err(SolverError::InvalidDimension {
                operand: "A",
                expected: (m, 1),
                found: (m, 0),
            });
        }
        if self.Q.shape() != (n, n) {
            return Err(SolverError::InvalidDimension {
                operand: "Q",
                expected: (n, n),
                found: self.Q.shape(),
            });
        }
        if self.b.len() != m {
            return Err(SolverError::vector("b", m, self.b.len()));
        }
        if self.c.len() != n {
            return Err(SolverError::vector("c", n, self.c.len()));
        }
        Ok(())
    }

    /// Check an iterate's lengths against the problem.
    pub fn validate_iterate(&self, iterate: &Iterate) -> SolverResult<()> {
        let (m, n) = self.A.shape();
        if iterate.x.len() != n {
            return Err(SolverError::vector("x", n, iterate.x.len()));
        }
        if iterate.y.len() != m {
            return Err(SolverError::vector("y", m, iterate.y.len()));
        }
        if iterate.z.len() != n {
            return Err(SolverError::vector("z", n, iterate.z.len()));
        }
        Ok(())
    }

    /// ½ xᵗQx (local contribution).
    pub fn half_quadratic(&self, x: &[f64]) -> f64 {
        let mut qx = vec![0.0; x.len()];
        self.Q.apply(x, &mut qx, 1.0, 0.0);
        0.5 * vector::dot(x, &qx)
    }

    /// cᵗx + ½ xᵗQx
    pub fn primal_objective(&self, x: &[f64]) -> f64 {
        vector::dot(&self.c, x) + self.half_quadratic(x)
    }

    /// −bᵗy − ½ xᵗQx
    pub fn dual_objective(&self, x: &[f64], y: &[f64]) -> f64 {
        -vector::dot(&self.b, y) - self.half_quadratic(x)
    }
}

/// Primal-dual iterate (x, y, z).
///
/// x and z stay strictly positive while a driver runs.
#[derive(Debug, Clone, PartialEq)]
pub struct Iterate {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl Iterate {
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<f64>) -> Self {
        Self { x, y, z }
    }

    /// x = z = 1, y = 0.
    pub fn ones(m: usize, n: usize) -> Self {
        Self {
            x: vec![1.0; n],
            y: vec![0.0; m],
            z: vec![1.0; n],
        }
    }

    /// Fail on the first x or z entry that is not strictly positive.
    pub fn check_interior(&self) -> SolverResult<()> {
        for (component, v) in [("x", &self.x), ("z", &self.z)] {
            if let Some((index, &value)) = v.iter().enumerate().find(|&(_, &vi)| !(vi > 0.0)) {
                return Err(SolverError::NonPositiveIterate {
                    component,
                    index,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Termination status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Infeasibilities and duality measure below tolerance
    Converged,

    /// Iteration budget exhausted before convergence
    MaxIterations,
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Converged => write!(f, "Converged"),
            SolveStatus::MaxIterations => write!(f, "MaxIterations"),
        }
    }
}

/// Summary of a finished solve.
#[derive(Debug, Clone)]
pub struct SolveInfo {
    pub status: SolveStatus,

    /// Number of completed iterations
    pub iterations: usize,

    /// cᵗx + ½ xᵗQx at the final iterate
    pub primal_objective: f64,

    /// −bᵗy − ½ xᵗQx at the final iterate
    pub dual_objective: f64,

    /// ‖Ax − b‖ / (1 + ‖b‖)
    pub primal_infeasibility: f64,

    /// ‖Qx + Aᵗy − z + c‖ / (1 + ‖c‖)
    pub dual_infeasibility: f64,

    /// xᵗz / n
    pub duality_measure: f64,

    /// KKT factorizations performed
    pub factorizations: usize,

    /// Wall time split
    pub timings: SolveTimings,
}

/// Wall-clock breakdown of a solve in seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveTimings {
    pub total: f64,
    pub setup: f64,
    pub factor: f64,
    pub solve: f64,
}
