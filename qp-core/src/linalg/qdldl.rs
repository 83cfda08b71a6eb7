//! LDL^T factorization wrapper.
//!
//! Thin layer over the `ldl` crate for quasi-definite matrices stored as the
//! upper triangle in CSC format. The symbolic phase (elimination tree) is
//! done once per sparsity pattern; numeric factorizations take a fresh value
//! array for the same pattern. Pivots are never perturbed here: callers
//! inspect [`QdldlSolver::d_values`] and decide what counts as singular.

use super::sparse::SparseCsc;
use thiserror::Error;

/// LDL solver errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QdldlError {
    /// Elimination tree could not be built (pattern not upper triangular)
    #[error("symbolic factorization failed: pattern is not upper triangular")]
    SymbolicFailed,

    /// Fill-reducing ordering could not be computed
    #[error("ordering failed: {0}")]
    OrderingFailed(String),

    /// Numeric factorization hit an exact zero pivot
    #[error("numeric factorization hit a zero pivot")]
    ZeroPivot,

    /// Dimension mismatch
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("solve called before a successful factorization")]
    NotFactored,
}

/// Sparse LDL^T factorization for a fixed pattern.
pub struct QdldlSolver {
    n: usize,

    /// CSC pattern of the upper triangle
    a_p: Vec<usize>,
    a_i: Vec<usize>,

    etree: Vec<Option<usize>>,
    l_nz: Vec<usize>,

    l_p: Vec<usize>,
    l_i: Vec<usize>,
    l_x: Vec<f64>,
    d: Vec<f64>,
    d_inv: Vec<f64>,

    factored: bool,

    /// Reusable factorization workspaces (allocated once)
    bwork: Vec<ldl::Marker>,
    iwork: Vec<usize>,
    fwork: Vec<f64>,
}

impl QdldlSolver {
    /// Symbolic factorization of `mat` (upper triangle, all diagonals present).
    pub fn new(mat: &SparseCsc) -> Result<Self, QdldlError> {
        let n = mat.rows();
        if mat.cols() != n {
            return Err(QdldlError::DimensionMismatch {
                expected: n,
                actual: mat.cols(),
            });
        }

        // Keep indptr alive
        let indptr = mat.indptr();
        let a_p = indptr.raw_storage().to_vec();
        let a_i = mat.indices().to_vec();

        let mut work = vec![0; n];
        let mut l_nz = vec![0; n];
        let mut etree = vec![None; n];
        ldl::etree(n, &a_p, &a_i, &mut work, &mut l_nz, &mut etree)
            .map_err(|_| QdldlError::SymbolicFailed)?;

        // Fill-in can make L larger than A
        let nnz_l: usize = l_nz.iter().sum();

        Ok(Self {
            n,
            a_p,
            a_i,
            etree,
            l_nz,
            l_p: vec![0; n + 1],
            l_i: vec![0; nnz_l],
            l_x: vec![0.0; nnz_l],
            d: vec![0.0; n],
            d_inv: vec![0.0; n],
            factored: false,
            bwork: vec![ldl::Marker::Unused; n],
            iwork: vec![0; 3 * n],
            fwork: vec![0.0; n],
        })
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    /// Number of nonzeros in the strict lower factor L.
    pub fn nnz_l(&self) -> usize {
        self.l_i.len()
    }

    /// Numeric factorization with `values` laid out like the symbolic pattern.
    pub fn factor(&mut self, values: &[f64]) -> Result<(), QdldlError> {
        if values.len() != self.a_i.len() {
            return Err(QdldlError::DimensionMismatch {
                expected: self.a_i.len(),
                actual: values.len(),
            });
        }
        self.factored = false;

        // ldl expects clean markers
        self.bwork.fill(ldl::Marker::Unused);
        self.iwork.fill(0);
        self.fwork.fill(0.0);

        ldl::factor(
            self.n,
            &self.a_p,
            &self.a_i,
            values,
            &mut self.l_p,
            &mut self.l_i,
            &mut self.l_x,
            &mut self.d,
            &mut self.d_inv,
            &self.l_nz,
            &self.etree,
            &mut self.bwork,
            &mut self.iwork,
            &mut self.fwork,
        )
        .map_err(|_| QdldlError::ZeroPivot)?;

        self.factored = true;
        Ok(())
    }

    /// Solve LDL^T x = b in place.
    pub fn solve_in_place(&self, x: &mut [f64]) -> Result<(), QdldlError> {
        if !self.factored {
            return Err(QdldlError::NotFactored);
        }
        if x.len() != self.n {
            return Err(QdldlError::DimensionMismatch {
                expected: self.n,
                actual: x.len(),
            });
        }
        ldl::solve(self.n, &self.l_p, &self.l_i, &self.l_x, &self.d_inv, x);
        Ok(())
    }

    /// D from the most recent successful factorization.
    pub fn d_values(&self) -> Option<&[f64]> {
        self.factored.then_some(self.d.as_slice())
    }
}
