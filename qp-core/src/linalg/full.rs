//! Unreduced (full) KKT backend.
//!
//! Solves the (2n+m) Newton system directly,
//!
//! ```text
//! [ Q   Aᵗ  −I ] [Δx]   [ −rc  ]
//! [ A   0    0 ] [Δy] = [ −rb  ]
//! [ Z   0    X ] [Δz]   [ −rmu ]
//! ```
//!
//! with a dense LU. No elimination and no regularization, which makes it a
//! useful reference for small problems.

use super::kkt::{Direction, KktError, KktSolver};
use super::operator::MatrixOperator;
use crate::problem::QpProblem;
use crate::settings::KktSettings;
use nalgebra::{DMatrix, DVector, Dyn, LU};

pub struct FullSolver {
    n: usize,
    m: usize,
    matrix: DMatrix<f64>,
    lu: Option<LU<f64, Dyn, Dyn>>,
    pivot_tol: f64,
    refine_iters: usize,
}

impl FullSolver {
    pub fn new<M: MatrixOperator>(
        problem: &QpProblem<M>,
        settings: &KktSettings,
    ) -> Result<Self, KktError> {
        let (m, n) = problem.A.shape();
        let dim = 2 * n + m;
        let mut matrix = DMatrix::zeros(dim, dim);

        problem.Q.for_each_entry(&mut |row, col, val| {
            matrix[(row, col)] += val;
        });
        problem.A.for_each_entry(&mut |row, col, val| {
            matrix[(n + row, col)] += val;
            matrix[(col, n + row)] += val;
        });
        for i in 0..n {
            matrix[(i, n + m + i)] = -1.0;
        }

        Ok(Self {
            n,
            m,
            matrix,
            lu: None,
            pivot_tol: settings.pivot_tol,
            refine_iters: settings.refine_iters,
        })
    }
}

impl KktSolver for FullSolver {
    fn name(&self) -> &'static str {
        "full"
    }

    fn factor(&mut self, x: &[f64], z: &[f64]) -> Result<(), KktError> {
        self.lu = None;
        let off = self.n + self.m;
        for i in 0..self.n {
            self.matrix[(off + i, i)] = z[i];
            self.matrix[(off + i, off + i)] = x[i];
        }

        let lu = self.matrix.clone().lu();
        let u = lu.u();
        let (mut min_pivot, mut max_pivot, mut min_index) = (f64::INFINITY, 0.0_f64, 0);
        for (i, &uii) in u.diagonal().iter().enumerate() {
            let a = uii.abs();
            if !a.is_finite() {
                return Err(KktError::WrongInertia { index: i, value: uii });
            }
            if a < min_pivot {
                min_pivot = a;
                min_index = i;
            }
            max_pivot = max_pivot.max(a);
        }
        if min_pivot == 0.0 {
            return Err(KktError::ZeroPivot { backend: "LU" });
        }
        let threshold = self.pivot_tol * max_pivot;
        if min_pivot <= threshold {
            return Err(KktError::SmallPivot {
                index: min_index,
                value: min_pivot,
                threshold,
            });
        }

        self.lu = Some(lu);
        Ok(())
    }

    fn solve(
        &mut self,
        rb: &[f64],
        rc: &[f64],
        rmu: &[f64],
        dir: &mut Direction,
    ) -> Result<(), KktError> {
        let lu = self.lu.as_ref().ok_or(KktError::NotFactored)?;
        let (n, m) = (self.n, self.m);

        let rhs = DVector::from_iterator(
            2 * n + m,
            rc.iter().chain(rb).chain(rmu).map(|v| -v),
        );
        let mut sol = lu
            .solve(&rhs)
            .ok_or(KktError::FactorizationFailed("full LU"))?;

        let rhs_norm = rhs.amax();
        for _ in 0..self.refine_iters {
            let res = &rhs - &self.matrix * &sol;
            let res_norm = res.amax();
            if !res_norm.is_finite() || res_norm <= 1e-15 * (1.0 + rhs_norm) {
                break;
            }
            let corr = lu
                .solve(&res)
                .ok_or(KktError::FactorizationFailed("full LU"))?;
            sol += corr;
        }

        let s = sol.as_slice();
        dir.dx.copy_from_slice(&s[..n]);
        dir.dy.copy_from_slice(&s[n..n + m]);
        dir.dz.copy_from_slice(&s[n + m..]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse;

    #[test]
    fn test_full_layout() {
        let prob = QpProblem::new(
            sparse::identity(2),
            sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 2.0)]),
            vec![1.0],
            vec![0.0, 0.0],
        );
        let mut solver = FullSolver::new(&prob, &KktSettings::default()).unwrap();
        solver.factor(&[2.0, 3.0], &[0.5, 0.25]).unwrap();

        let f = &solver.matrix;
        assert_eq!(f.nrows(), 5);
        assert_eq!(f[(0, 0)], 1.0);
        assert_eq!(f[(1, 2)], 2.0);
        assert_eq!(f[(2, 1)], 2.0);
        assert_eq!(f[(0, 3)], -1.0);
        assert_eq!(f[(3, 0)], 0.5);
        assert_eq!(f[(4, 4)], 3.0);
    }
}
