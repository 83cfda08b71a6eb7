//! Sparse augmented-system backend.
//!
//! Factors the (n+m) quasi-definite matrix
//!
//! ```text
//! K = [ Q + D + ρₚI    Aᵗ    ]
//!     [ A            −ρ_d I  ]
//! ```
//!
//! with LDL^T under a symmetric ordering (see [`super::ordering`]). The
//! pattern is assembled and analyzed once; each factorization rewrites only
//! the diagonal. Iterative refinement runs against K without the ρ terms, so
//! regularization does not bias the returned direction.
//!
//! With the x columns eliminated ahead of y, the y pivots are those of
//! −A W Aᵗ with W = (Q + D + ρₚ)⁻¹, restricted to the columns eliminated so
//! far. A rank-deficient A shows up as a y pivot that is zero, has the wrong
//! sign, or is tiny relative to sₖ = ρ_d + Σⱼ A²ₖⱼ Wⱼ over those columns.

use super::kkt::{recover_dz, reduced_rhs, Direction, KktError, KktSolver};
use super::operator::MatrixOperator;
use super::ordering::{dense_column_threshold, Ordering};
use super::qdldl::QdldlSolver;
use super::sparse::{symm_matvec_upper, SparseCsc};
use super::vector;
use crate::problem::QpProblem;
use crate::settings::{KktOrdering, KktSettings};
use sprs::TriMat;

pub struct AugmentedSolver {
    n: usize,
    m: usize,

    /// Upper triangle of K with the current D and no regularization
    kkt: SparseCsc,

    /// Values of K at D = 0
    base: Vec<f64>,

    /// Regularized values handed to the factorization
    factor_values: Vec<f64>,

    /// Position of each diagonal entry in `kkt.data()`
    diag_positions: Vec<usize>,

    q_diag: Vec<f64>,

    /// A entries as (row, col, value²), for pivot scales
    a_sq: Vec<(usize, usize, f64)>,

    ordering: Ordering,

    /// x columns eliminated after the y block
    deferred: Vec<bool>,

    /// Upper triangle of P K Pᵗ, values regularized
    permuted: SparseCsc,

    /// Position of each `kkt.data()` entry in `permuted.data()`
    positions: Vec<usize>,

    ldl: QdldlSolver,

    x: Vec<f64>,
    z: Vec<f64>,
    factored: bool,

    primal_reg: f64,
    dual_reg: f64,
    pivot_tol: f64,
    refine_iters: usize,

    rhs: Vec<f64>,
    kx: Vec<f64>,
    res: Vec<f64>,
    work: Vec<f64>,
    pivot_scale: Vec<f64>,
}

impl AugmentedSolver {
    pub fn new<M: MatrixOperator>(
        problem: &QpProblem<M>,
        settings: &KktSettings,
    ) -> Result<Self, KktError> {
        let (m, n) = problem.A.shape();
        let dim = n + m;
        let mut tri = TriMat::new((dim, dim));

        // Q: upper triangle of the symmetric storage
        problem.Q.for_each_entry(&mut |row, col, val| {
            if row <= col {
                tri.add_triplet(row, col, val);
            }
        });

        // Diagonal placeholders so D and ρ have a slot
        for i in 0..dim {
            tri.add_triplet(i, i, 0.0);
        }

        // A[k, j] lands at K[j, n + k]
        let mut a_sq = Vec::with_capacity(problem.A.nnz());
        let mut col_counts = vec![0usize; n];
        problem.A.for_each_entry(&mut |row, col, val| {
            tri.add_triplet(col, n + row, val);
            a_sq.push((row, col, val * val));
            col_counts[col] += 1;
        });

        let kkt: SparseCsc = tri.to_csc();
        let diag_positions = diagonal_positions(&kkt)?;
        let base = kkt.data().to_vec();

        let (ordering, deferred) = match settings.ordering {
            KktOrdering::Natural => (Ordering::natural(dim), vec![false; n]),
            KktOrdering::Camd => {
                let threshold = dense_column_threshold(m);
                let deferred: Vec<bool> = col_counts.iter().map(|&c| c > threshold).collect();
                (Ordering::camd_grouped(&kkt, n, &deferred)?, deferred)
            }
        };
        let (permuted, positions) = ordering.permute_upper(&kkt);
        let ldl = QdldlSolver::new(&permuted)?;

        log::debug!(
            "augmented KKT: dim {}, nnz(K) {}, nnz(L) {}, {} ordering, {} dense columns deferred",
            dim,
            kkt.nnz(),
            ldl.nnz_l(),
            settings.ordering,
            deferred.iter().filter(|&&d| d).count()
        );

        Ok(Self {
            n,
            m,
            factor_values: base.clone(),
            base,
            kkt,
            diag_positions,
            q_diag: problem.Q.diagonal(),
            a_sq,
            ordering,
            deferred,
            permuted,
            positions,
            ldl,
            x: vec![0.0; n],
            z: vec![0.0; n],
            factored: false,
            primal_reg: settings.primal_reg,
            dual_reg: settings.dual_reg,
            pivot_tol: settings.pivot_tol,
            refine_iters: settings.refine_iters,
            rhs: vec![0.0; dim],
            kx: vec![0.0; dim],
            res: vec![0.0; dim],
            work: vec![0.0; dim],
            pivot_scale: vec![0.0; m],
        })
    }

    /// Number of nonzeros in the strict lower factor.
    pub fn nnz_l(&self) -> usize {
        self.ldl.nnz_l()
    }

    fn has_deferred_columns(&self) -> bool {
        self.deferred.iter().any(|&d| d)
    }

    /// Re-analyze with every x column ahead of the y block.
    fn undefer_columns(&mut self) -> Result<(), KktError> {
        self.deferred.fill(false);
        self.ordering = Ordering::camd_grouped(&self.kkt, self.n, &self.deferred)?;
        let (permuted, positions) = self.ordering.permute_upper(&self.kkt);
        self.ldl = QdldlSolver::new(&permuted)?;
        self.permuted = permuted;
        self.positions = positions;
        Ok(())
    }

    fn factor_ordered(&mut self) -> Result<(), KktError> {
        let values = self.permuted.data_mut();
        for (src, &dst) in self.positions.iter().enumerate() {
            values[dst] = self.factor_values[src];
        }
        self.ldl.factor(self.permuted.data())?;
        self.check_pivots()
    }

    fn check_pivots(&mut self) -> Result<(), KktError> {
        self.pivot_scale.fill(self.dual_reg);
        for &(row, col, a2) in &self.a_sq {
            if !self.deferred[col] {
                let w = self.q_diag[col] + self.z[col] / self.x[col] + self.primal_reg;
                self.pivot_scale[row] += a2 / w;
            }
        }

        let d = self.ldl.d_values().ok_or(KktError::NotFactored)?;
        for (pos, &dk) in d.iter().enumerate() {
            let index = self.ordering.perm[pos];
            if index < self.n {
                if !(dk > 0.0 && dk.is_finite()) {
                    return Err(KktError::WrongInertia { index, value: dk });
                }
                continue;
            }
            let threshold = self.pivot_tol * self.pivot_scale[index - self.n];
            if !dk.is_finite() {
                return Err(KktError::WrongInertia { index, value: dk });
            }
            if dk.abs() <= threshold {
                return Err(KktError::SmallPivot {
                    index,
                    value: dk,
                    threshold,
                });
            }
            if dk > 0.0 {
                return Err(KktError::WrongInertia { index, value: dk });
            }
        }
        Ok(())
    }
}

fn diagonal_positions(kkt: &SparseCsc) -> Result<Vec<usize>, KktError> {
    let indptr = kkt.indptr();
    let a_p = indptr.raw_storage();
    let a_i = kkt.indices();
    (0..kkt.cols())
        .map(|col| {
            (a_p[col]..a_p[col + 1])
                .find(|&idx| a_i[idx] == col)
                .ok_or(KktError::FactorizationFailed("augmented pattern"))
        })
        .collect()
}

/// Solve K v = rhs in place through the permuted factor.
fn solve_ordered(
    ldl: &QdldlSolver,
    ordering: &Ordering,
    v: &mut [f64],
    work: &mut [f64],
) -> Result<(), KktError> {
    ordering.gather(v, work);
    ldl.solve_in_place(work)?;
    ordering.scatter(work, v);
    Ok(())
}

impl KktSolver for AugmentedSolver {
    fn name(&self) -> &'static str {
        "augmented"
    }

    fn factor(&mut self, x: &[f64], z: &[f64]) -> Result<(), KktError> {
        self.factored = false;
        self.x.copy_from_slice(x);
        self.z.copy_from_slice(z);

        let data = self.kkt.data_mut();
        data.copy_from_slice(&self.base);
        for j in 0..self.n {
            data[self.diag_positions[j]] += z[j] / x[j];
        }

        self.factor_values.copy_from_slice(self.kkt.data());
        for j in 0..self.n {
            self.factor_values[self.diag_positions[j]] += self.primal_reg;
        }
        for k in 0..self.m {
            self.factor_values[self.diag_positions[self.n + k]] -= self.dual_reg;
        }

        match self.factor_ordered() {
            Err(err) if self.has_deferred_columns() => {
                log::debug!(
                    "augmented KKT: {} with dense columns deferred, retrying with x block first",
                    err
                );
                self.undefer_columns()?;
                self.factor_ordered()?;
            }
            result => result?,
        }
        self.factored = true;
        Ok(())
    }

    fn solve(
        &mut self,
        rb: &[f64],
        rc: &[f64],
        rmu: &[f64],
        dir: &mut Direction,
    ) -> Result<(), KktError> {
        if !self.factored {
            return Err(KktError::NotFactored);
        }
        let n = self.n;

        reduced_rhs(&self.x, rb, rc, rmu, &mut self.rhs);
        let mut sol = self.rhs.clone();
        solve_ordered(&self.ldl, &self.ordering, &mut sol, &mut self.work)?;

        let rhs_norm = vector::inf_norm(&self.rhs);
        for _ in 0..self.refine_iters {
            symm_matvec_upper(&self.kkt, &sol, &mut self.kx);
            for i in 0..sol.len() {
                self.res[i] = self.rhs[i] - self.kx[i];
            }
            let res_norm = vector::inf_norm(&self.res);
            if !res_norm.is_finite() || res_norm <= 1e-15 * (1.0 + rhs_norm) {
                break;
            }
            solve_ordered(&self.ldl, &self.ordering, &mut self.res, &mut self.work)?;
            vector::axpy(1.0, &self.res, &mut sol);
        }

        dir.dx.copy_from_slice(&sol[..n]);
        dir.dy.copy_from_slice(&sol[n..]);
        recover_dz(&self.x, &self.z, rmu, &dir.dx, &mut dir.dz);
        Ok(())
    }
}
