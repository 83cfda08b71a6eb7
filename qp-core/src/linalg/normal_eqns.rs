//! Normal equations backend.
//!
//! With a diagonal Q the x block of the reduced system is diagonal, so Δx can
//! be eliminated as well:
//!
//! ```text
//! W = (diag Q + D + ρₚ)⁻¹
//! S = A W Aᵗ + ρ_d I
//! S Δy = A W r₁ − r₂
//! Δx  = W (r₁ − Aᵗ Δy)
//! ```
//!
//! S is m×m and formed densely, column by column of A, then factored with a
//! dense Cholesky. Refinement runs against the reduced system without ρ.

use super::kkt::{recover_dz, Direction, KktError, KktSolver};
use super::operator::MatrixOperator;
use super::vector;
use crate::problem::QpProblem;
use crate::settings::KktSettings;
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

pub struct NormalEqnsSolver {
    n: usize,
    m: usize,

    /// Nonzeros of each column of A as (row, value)
    a_cols: Vec<Vec<(usize, f64)>>,

    q_diag: Vec<f64>,

    /// D = z/x for the current iterate
    d: Vec<f64>,

    /// Regularized W diagonal
    w: Vec<f64>,

    schur: DMatrix<f64>,
    chol: Option<Cholesky<f64, Dyn>>,

    x: Vec<f64>,
    z: Vec<f64>,

    primal_reg: f64,
    dual_reg: f64,
    pivot_tol: f64,
    refine_iters: usize,
}

impl NormalEqnsSolver {
    pub fn new<M: MatrixOperator>(
        problem: &QpProblem<M>,
        settings: &KktSettings,
    ) -> Result<Self, KktError> {
        if !problem.Q.is_diagonal() {
            return Err(KktError::Unsupported {
                backend: "normal",
                reason: "Q has off-diagonal entries".to_string(),
            });
        }
        let (m, n) = problem.A.shape();

        let mut a_cols = vec![Vec::new(); n];
        problem.A.for_each_entry(&mut |row, col, val| {
            a_cols[col].push((row, val));
        });

        log::debug!(
            "normal equations: {}x{} Schur complement, densest column has {} entries",
            m,
            m,
            a_cols.iter().map(Vec::len).max().unwrap_or(0)
        );

        Ok(Self {
            n,
            m,
            a_cols,
            q_diag: problem.Q.diagonal(),
            d: vec![0.0; n],
            w: vec![0.0; n],
            schur: DMatrix::zeros(m, m),
            chol: None,
            x: vec![0.0; n],
            z: vec![0.0; n],
            primal_reg: settings.primal_reg,
            dual_reg: settings.dual_reg,
            pivot_tol: settings.pivot_tol,
            refine_iters: settings.refine_iters,
        })
    }

    /// Solve the regularized reduced system for (r1, r2).
    fn solve_reduced(
        &self,
        r1: &[f64],
        r2: &[f64],
        dx: &mut [f64],
        dy: &mut [f64],
    ) -> Result<(), KktError> {
        let chol = self.chol.as_ref().ok_or(KktError::NotFactored)?;

        // A W r1 - r2
        let mut rhs = DVector::from_iterator(self.m, r2.iter().map(|v| -v));
        for (j, col) in self.a_cols.iter().enumerate() {
            let wr = self.w[j] * r1[j];
            for &(row, val) in col {
                rhs[row] += val * wr;
            }
        }

        let sol = chol.solve(&rhs);
        dy.copy_from_slice(sol.as_slice());

        for (j, col) in self.a_cols.iter().enumerate() {
            let at_dy: f64 = col.iter().map(|&(row, val)| val * dy[row]).sum();
            dx[j] = self.w[j] * (r1[j] - at_dy);
        }
        Ok(())
    }
}

impl KktSolver for NormalEqnsSolver {
    fn name(&self) -> &'static str {
        "normal"
    }

    fn factor(&mut self, x: &[f64], z: &[f64]) -> Result<(), KktError> {
        self.chol = None;
        self.x.copy_from_slice(x);
        self.z.copy_from_slice(z);
        vector::divide(z, x, &mut self.d);
        for j in 0..self.n {
            self.w[j] = 1.0 / (self.q_diag[j] + self.d[j] + self.primal_reg);
        }

        self.schur.fill(0.0);
        self.schur.fill_diagonal(self.dual_reg);
        for (j, col) in self.a_cols.iter().enumerate() {
            let wj = self.w[j];
            for &(r1, v1) in col {
                for &(r2, v2) in col {
                    self.schur[(r1, r2)] += wj * v1 * v2;
                }
            }
        }

        let diag = self.schur.diagonal();
        let chol = Cholesky::new(self.schur.clone())
            .ok_or(KktError::FactorizationFailed("normal-equations Cholesky"))?;

        let l = chol.l_dirty();
        for k in 0..self.m {
            let pivot = l[(k, k)] * l[(k, k)];
            let threshold = self.pivot_tol * diag[k];
            if !pivot.is_finite() || pivot <= threshold {
                return Err(KktError::SmallPivot {
                    index: self.n + k,
                    value: pivot,
                    threshold,
                });
            }
        }

        self.chol = Some(chol);
        Ok(())
    }

    fn solve(
        &mut self,
        rb: &[f64],
        rc: &[f64],
        rmu: &[f64],
        dir: &mut Direction,
    ) -> Result<(), KktError> {
        if self.chol.is_none() {
            return Err(KktError::NotFactored);
        }
        let (n, m) = (self.n, self.m);

        let r1: Vec<f64> = (0..n).map(|i| -rc[i] - rmu[i] / self.x[i]).collect();
        let r2: Vec<f64> = rb.iter().map(|v| -v).collect();
        self.solve_reduced(&r1, &r2, &mut dir.dx, &mut dir.dy)?;

        let rhs_norm = vector::inf_norm(&r1).max(vector::inf_norm(&r2));
        let mut res1 = vec![0.0; n];
        let mut res2 = vec![0.0; m];
        let mut cx = vec![0.0; n];
        let mut cy = vec![0.0; m];
        for _ in 0..self.refine_iters {
            // Residual of the unregularized reduced system
            for j in 0..n {
                res1[j] = r1[j] - (self.q_diag[j] + self.d[j]) * dir.dx[j];
            }
            res2.copy_from_slice(&r2);
            for (j, col) in self.a_cols.iter().enumerate() {
                for &(row, val) in col {
                    res1[j] -= val * dir.dy[row];
                    res2[row] -= val * dir.dx[j];
                }
            }
            let res_norm = vector::inf_norm(&res1).max(vector::inf_norm(&res2));
            if !res_norm.is_finite() || res_norm <= 1e-15 * (1.0 + rhs_norm) {
                break;
            }
            self.solve_reduced(&res1, &res2, &mut cx, &mut cy)?;
            vector::axpy(1.0, &cx, &mut dir.dx);
            vector::axpy(1.0, &cy, &mut dir.dy);
        }

        recover_dz(&self.x, &self.z, rmu, &dir.dx, &mut dir.dz);
        Ok(())
    }
}
