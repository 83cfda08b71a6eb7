//! KKT system builder.
//!
//! At an iterate (x, y, z) with D = diag(z/x) the Newton system
//!
//! ```text
//! Q Δx + Aᵗ Δy − Δz = −rc
//! A Δx             = −rb
//! Z Δx + X Δz      = −rmu
//! ```
//!
//! is solved by one of the [`KktSolver`] backends. The reduced backends
//! eliminate Δz = −(rmu + z∘Δx)/x first and work with
//!
//! ```text
//! [ Q + D   Aᵗ ] [Δx]   [ −rc − rmu/x ]
//! [ A       0  ] [Δy] = [ −rb         ]
//! ```
//!
//! The backend is chosen once per solve from [`KktSettings::system`]; every
//! iteration then factors once and solves one or more right-hand sides.

use super::augmented::AugmentedSolver;
use super::full::FullSolver;
use super::normal_eqns::NormalEqnsSolver;
use super::operator::MatrixOperator;
use super::qdldl::QdldlError;
use crate::problem::QpProblem;
use crate::settings::{KktSettings, KktSystem};
use std::time::Instant;
use thiserror::Error;

/// KKT factorization and solve errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KktError {
    /// Exact zero pivot during factorization.
    #[error("zero pivot in {backend} factorization")]
    ZeroPivot { backend: &'static str },

    /// Pivot below the relative threshold.
    #[error("pivot {index} is {value:e}, below threshold {threshold:e}")]
    SmallPivot {
        index: usize,
        value: f64,
        threshold: f64,
    },

    /// Pivot with the wrong sign for a quasi-definite system.
    #[error("pivot {index} has wrong sign or is not finite: {value:e}")]
    WrongInertia { index: usize, value: f64 },

    #[error("fill-reducing ordering failed: {0}")]
    OrderingFailed(String),

    /// Dense factorization could not be formed.
    #[error("{0} factorization failed")]
    FactorizationFailed(&'static str),

    /// Backend cannot represent this problem.
    #[error("unsupported problem for {backend}: {reason}")]
    Unsupported {
        backend: &'static str,
        reason: String,
    },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("solve requested before a successful factorization")]
    NotFactored,
}

impl From<QdldlError> for KktError {
    fn from(err: QdldlError) -> Self {
        match err {
            QdldlError::ZeroPivot => KktError::ZeroPivot { backend: "LDL" },
            QdldlError::SymbolicFailed => KktError::FactorizationFailed("symbolic LDL"),
            QdldlError::OrderingFailed(msg) => KktError::OrderingFailed(msg),
            QdldlError::DimensionMismatch { expected, actual } => {
                KktError::DimensionMismatch { expected, actual }
            }
            QdldlError::NotFactored => KktError::NotFactored,
        }
    }
}

/// Search direction (Δx, Δy, Δz).
#[derive(Debug, Clone, PartialEq)]
pub struct Direction {
    pub dx: Vec<f64>,
    pub dy: Vec<f64>,
    pub dz: Vec<f64>,
}

impl Direction {
    pub fn zeros(m: usize, n: usize) -> Self {
        Self {
            dx: vec![0.0; n],
            dy: vec![0.0; m],
            dz: vec![0.0; n],
        }
    }

    /// self += other
    pub fn add(&mut self, other: &Direction) {
        for (a, b) in self
            .dx
            .iter_mut()
            .chain(self.dy.iter_mut())
            .chain(self.dz.iter_mut())
            .zip(other.dx.iter().chain(&other.dy).chain(&other.dz))
        {
            *a += b;
        }
    }
}

/// Linear solver backend for the Newton system.
pub trait KktSolver {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Factor the system for the iterate (x, z).
    fn factor(&mut self, x: &[f64], z: &[f64]) -> Result<(), KktError>;

    /// Solve with the current factorization for residuals (rb, rc, rmu).
    fn solve(
        &mut self,
        rb: &[f64],
        rc: &[f64],
        rmu: &[f64],
        dir: &mut Direction,
    ) -> Result<(), KktError>;
}

/// Recover Δz = −(rmu + z∘Δx)/x.
pub(crate) fn recover_dz(x: &[f64], z: &[f64], rmu: &[f64], dx: &[f64], dz: &mut [f64]) {
    for i in 0..x.len() {
        dz[i] = -(rmu[i] + z[i] * dx[i]) / x[i];
    }
}

/// Reduced right-hand side [−rc − rmu/x; −rb].
pub(crate) fn reduced_rhs(x: &[f64], rb: &[f64], rc: &[f64], rmu: &[f64], rhs: &mut [f64]) {
    let n = x.len();
    for i in 0..n {
        rhs[i] = -rc[i] - rmu[i] / x[i];
    }
    for (r, b) in rhs[n..].iter_mut().zip(rb) {
        *r = -b;
    }
}

/// Owns the selected backend and tracks factor/solve work.
pub struct KktBuilder {
    solver: Box<dyn KktSolver>,
    m: usize,
    n: usize,
    factorizations: usize,
    solves: usize,
    factor_time: f64,
    solve_time: f64,
}

impl KktBuilder {
    /// Select and set up the backend for `problem`.
    pub fn new<M: MatrixOperator>(
        problem: &QpProblem<M>,
        settings: &KktSettings,
    ) -> Result<Self, KktError> {
        let (m, n) = problem.A.shape();
        let solver: Box<dyn KktSolver> = match settings.system {
            KktSystem::Augmented => Box::new(AugmentedSolver::new(problem, settings)?),
            KktSystem::Normal => Box::new(NormalEqnsSolver::new(problem, settings)?),
            KktSystem::Full => Box::new(FullSolver::new(problem, settings)?),
        };
        log::debug!("KKT backend: {} (m = {}, n = {})", solver.name(), m, n);
        Ok(Self {
            solver,
            m,
            n,
            factorizations: 0,
            solves: 0,
            factor_time: 0.0,
            solve_time: 0.0,
        })
    }

    pub fn backend(&self) -> &'static str {
        self.solver.name()
    }

    pub fn factor(&mut self, x: &[f64], z: &[f64]) -> Result<(), KktError> {
        if x.len() != self.n || z.len() != self.n {
            return Err(KktError::DimensionMismatch {
                expected: self.n,
                actual: x.len().min(z.len()),
            });
        }
        let start = Instant::now();
        let result = self.solver.factor(x, z);
        self.factor_time += start.elapsed().as_secs_f64();
        self.factorizations += 1;
        result
    }

    pub fn solve(
        &mut self,
        rb: &[f64],
        rc: &[f64],
        rmu: &[f64],
        dir: &mut Direction,
    ) -> Result<(), KktError> {
        if rb.len() != self.m {
            return Err(KktError::DimensionMismatch {
                expected: self.m,
                actual: rb.len(),
            });
        }
        if rc.len() != self.n || rmu.len() != self.n {
            return Err(KktError::DimensionMismatch {
                expected: self.n,
                actual: rc.len().min(rmu.len()),
            });
        }
        let start = Instant::now();
        let result = self.solver.solve(rb, rc, rmu, dir);
        self.solve_time += start.elapsed().as_secs_f64();
        self.solves += 1;
        result
    }

    /// Factor at (x, z) and solve for one right-hand side.
    pub fn build_and_solve(
        &mut self,
        x: &[f64],
        z: &[f64],
        rb: &[f64],
        rc: &[f64],
        rmu: &[f64],
    ) -> Result<Direction, KktError> {
        self.factor(x, z)?;
        let mut dir = Direction::zeros(self.m, self.n);
        self.solve(rb, rc, rmu, &mut dir)?;
        Ok(dir)
    }

    pub fn factorizations(&self) -> usize {
        self.factorizations
    }

    pub fn solves(&self) -> usize {
        self.solves
    }

    /// Accumulated (factor, solve) seconds.
    pub fn timings(&self) -> (f64, f64) {
        (self.factor_time, self.solve_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse;
    use crate::problem::QpProblem;

    /// Residual of the unreduced Newton system for a computed direction.
    fn newton_residual(
        prob: &QpProblem,
        x: &[f64],
        z: &[f64],
        rb: &[f64],
        rc: &[f64],
        rmu: &[f64],
        d: &Direction,
    ) -> f64 {
        let (m, n) = MatrixOperator::shape(&prob.A);
        let mut r1 = rc.to_vec();
        MatrixOperator::apply(&prob.Q, &d.dx, &mut r1, 1.0, 1.0);
        MatrixOperator::apply_transpose(&prob.A, &d.dy, &mut r1, 1.0, 1.0);
        for i in 0..n {
            r1[i] -= d.dz[i];
        }
        let mut r2 = rb.to_vec();
        MatrixOperator::apply(&prob.A, &d.dx, &mut r2, 1.0, 1.0);
        let mut worst: f64 = r1.iter().chain(&r2).fold(0.0_f64, |a, v| a.max(v.abs()));
        for i in 0..n {
            worst = worst.max((z[i] * d.dx[i] + x[i] * d.dz[i] + rmu[i]).abs());
        }
        assert_eq!(r2.len(), m);
        worst
    }

    fn test_problem() -> QpProblem {
        // Q = [[2, 1, 0], [1, 2, 0], [0, 0, 1]], A = [[1, 1, 1], [1, -1, 0]]
        let q = sparse::from_triplets(
            3,
            3,
            vec![(0, 0, 2.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 2.0), (2, 2, 1.0)],
        );
        let a = sparse::from_triplets(
            2,
            3,
            vec![(0, 0, 1.0), (0, 1, 1.0), (0, 2, 1.0), (1, 0, 1.0), (1, 1, -1.0)],
        );
        QpProblem::new(q, a, vec![1.0, 0.0], vec![-1.0, 0.5, 0.0])
    }

    fn diag_problem() -> QpProblem {
        let mut prob = test_problem();
        prob.Q = sparse::diagonal(&[2.0, 1.0, 0.5]);
        prob
    }

    fn check_backend(prob: &QpProblem, system: KktSystem) {
        let settings = KktSettings {
            system,
            ..KktSettings::default()
        };
        let mut kkt = KktBuilder::new(prob, &settings).unwrap();

        let x = [0.5, 2.0, 1.5];
        let z = [1.0, 0.25, 3.0];
        let rb = [0.3, -0.2];
        let rc = [0.1, -0.4, 0.7];
        let rmu = [0.5, 0.5, -1.0];
        let d = kkt.build_and_solve(&x, &z, &rb, &rc, &rmu).unwrap();
        let res = newton_residual(prob, &x, &z, &rb, &rc, &rmu, &d);
        assert!(res < 1e-9, "{} residual {}", system, res);
        assert_eq!(kkt.factorizations(), 1);
        assert_eq!(kkt.solves(), 1);
    }

    #[test]
    fn test_augmented_solves_newton_system() {
        check_backend(&test_problem(), KktSystem::Augmented);
    }

    #[test]
    fn test_full_solves_newton_system() {
        check_backend(&test_problem(), KktSystem::Full);
    }

    #[test]
    fn test_normal_solves_newton_system() {
        check_backend(&diag_problem(), KktSystem::Normal);
    }

    #[test]
    fn test_normal_rejects_coupled_q() {
        let settings = KktSettings {
            system: KktSystem::Normal,
            ..KktSettings::default()
        };
        assert!(matches!(
            KktBuilder::new(&test_problem(), &settings),
            Err(KktError::Unsupported { .. })
        ));
    }

    #[test]
    fn test_duplicate_rows_are_singular() {
        let a = sparse::from_triplets(
            3,
            3,
            vec![
                (0, 0, 1.0),
                (0, 1, 2.0),
                (1, 1, 1.0),
                (1, 2, 1.0),
                (2, 0, 1.0),
                (2, 1, 2.0),
            ],
        );
        let prob = QpProblem::new(sparse::identity(3), a, vec![1.0, 1.0, 1.0], vec![0.0; 3]);
        for system in [KktSystem::Augmented, KktSystem::Normal, KktSystem::Full] {
            let settings = KktSettings {
                system,
                ..KktSettings::default()
            };
            let mut kkt = KktBuilder::new(&prob, &settings).unwrap();
            let err = kkt.factor(&[1.0; 3], &[1.0; 3]);
            assert!(err.is_err(), "{} accepted a rank-deficient A", system);
        }
    }

    #[test]
    fn test_solve_before_factor() {
        let prob = test_problem();
        let mut kkt = KktBuilder::new(&prob, &KktSettings::default()).unwrap();
        let mut d = Direction::zeros(2, 3);
        assert_eq!(
            kkt.solve(&[0.0; 2], &[0.0; 3], &[0.0; 3], &mut d),
            Err(KktError::NotFactored)
        );
    }

    #[test]
    fn test_direction_add() {
        let mut a = Direction::zeros(1, 2);
        let b = Direction {
            dx: vec![1.0, 2.0],
            dy: vec![3.0],
            dz: vec![4.0, 5.0],
        };
        a.add(&b);
        a.add(&b);
        assert_eq!(a.dx, vec![2.0, 4.0]);
        assert_eq!(a.dy, vec![6.0]);
        assert_eq!(a.dz, vec![8.0, 10.0]);
    }
}
