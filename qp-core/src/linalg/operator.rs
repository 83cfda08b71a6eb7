//! Matrix storage abstraction.
//!
//! The drivers only need the action of Q and A plus an entry walk for KKT
//! assembly, so both sparse (`sprs`) and dense (`nalgebra`) storage plug in
//! through [`MatrixOperator`].

use super::sparse::{self, SparseCsc};
use nalgebra::DMatrix;

/// Linear operator with enumerable entries.
pub trait MatrixOperator {
    /// Number of rows.
    fn rows(&self) -> usize;

    /// Number of columns.
    fn cols(&self) -> usize;

    /// Number of stored (structurally nonzero) entries.
    fn nnz(&self) -> usize;

    /// y = alpha * M * x + beta * y
    fn apply(&self, x: &[f64], y: &mut [f64], alpha: f64, beta: f64);

    /// y = alpha * M^T * x + beta * y
    fn apply_transpose(&self, x: &[f64], y: &mut [f64], alpha: f64, beta: f64);

    /// Visit every stored entry as (row, col, value).
    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f64));

    fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    /// Diagonal of a square operator (summed over duplicate storage).
    fn diagonal(&self) -> Vec<f64> {
        let mut diag = vec![0.0; self.rows().min(self.cols())];
        self.for_each_entry(&mut |i, j, v| {
            if i == j {
                diag[i] += v;
            }
        });
        diag
    }

    /// True when every off-diagonal entry is zero.
    fn is_diagonal(&self) -> bool {
        let mut diagonal = true;
        self.for_each_entry(&mut |i, j, v| {
            if i != j && v != 0.0 {
                diagonal = false;
            }
        });
        diagonal
    }

    /// Largest |M_ij - M_ji|.
    fn asymmetry(&self) -> f64;
}

impl MatrixOperator for SparseCsc {
    // Inherent `CsMat` methods win over the trait ones in path resolution.
    fn rows(&self) -> usize {
        SparseCsc::rows(self)
    }

    fn cols(&self) -> usize {
        SparseCsc::cols(self)
    }

    fn nnz(&self) -> usize {
        SparseCsc::nnz(self)
    }

    fn apply(&self, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
        sparse::spmv(self, x, y, alpha, beta);
    }

    fn apply_transpose(&self, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
        sparse::spmv_transpose(self, x, y, alpha, beta);
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f64)) {
        for (val, (row, col)) in self.iter() {
            f(row, col, *val);
        }
    }

    fn asymmetry(&self) -> f64 {
        sparse::asymmetry(self)
    }
}

impl MatrixOperator for DMatrix<f64> {
    fn rows(&self) -> usize {
        self.nrows()
    }

    fn cols(&self) -> usize {
        self.ncols()
    }

    fn nnz(&self) -> usize {
        self.iter().filter(|v| **v != 0.0).count()
    }

    fn apply(&self, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
        assert_eq!(self.ncols(), x.len());
        assert_eq!(self.nrows(), y.len());
        for yi in y.iter_mut() {
            *yi = if beta == 0.0 { 0.0 } else { beta * *yi };
        }
        if alpha == 0.0 {
            return;
        }
        for (j, column) in self.column_iter().enumerate() {
            let xj = alpha * x[j];
            if xj != 0.0 {
                for (yi, aij) in y.iter_mut().zip(column.iter()) {
                    *yi += aij * xj;
                }
            }
        }
    }

    fn apply_transpose(&self, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
        assert_eq!(self.nrows(), x.len());
        assert_eq!(self.ncols(), y.len());
        for (j, column) in self.column_iter().enumerate() {
            let dot: f64 = column.iter().zip(x).map(|(aij, xi)| aij * xi).sum();
            y[j] = alpha * dot + if beta == 0.0 { 0.0 } else { beta * y[j] };
        }
    }

    fn for_each_entry(&self, f: &mut dyn FnMut(usize, usize, f64)) {
        for (j, column) in self.column_iter().enumerate() {
            for (i, &v) in column.iter().enumerate() {
                if v != 0.0 {
                    f(i, j, v);
                }
            }
        }
    }

    fn asymmetry(&self) -> f64 {
        if self.nrows() != self.ncols() {
            return f64::INFINITY;
        }
        (self - self.transpose()).amax()
    }
}
