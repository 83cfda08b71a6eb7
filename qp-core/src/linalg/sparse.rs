//! Sparse matrix types and helpers.
//!
//! Matrices are stored in CSC format through `sprs`. Q is stored with both
//! triangles; KKT assembly picks the upper triangle itself.

use sprs::{CsMat, TriMat};

/// Sparse matrix in CSC format.
pub type SparseCsc = CsMat<f64>;

/// Build a sparse CSC matrix from triplets (row, col, value).
///
/// Duplicate entries are summed.
pub fn from_triplets<I>(nrows: usize, ncols: usize, triplets: I) -> SparseCsc
where
    I: IntoIterator<Item = (usize, usize, f64)>,
{
    let mut tri = TriMat::new((nrows, ncols));
    for (i, j, v) in triplets {
        tri.add_triplet(i, j, v);
    }
    tri.to_csc()
}

/// Create a diagonal matrix in CSC format.
pub fn diagonal(diag: &[f64]) -> SparseCsc {
    let n = diag.len();
    from_triplets(n, n, diag.iter().enumerate().map(|(i, &v)| (i, i, v)))
}

/// Create an identity matrix in CSC format.
pub fn identity(n: usize) -> SparseCsc {
    diagonal(&vec![1.0; n])
}

/// y = alpha * A * x + beta * y
pub fn spmv(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.cols(), x.len());
    assert_eq!(a.rows(), y.len());

    scale(y, beta);
    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[row] += alpha * (*val) * x[col];
        }
    }
}

/// y = alpha * A^T * x + beta * y
pub fn spmv_transpose(a: &SparseCsc, x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    assert_eq!(a.rows(), x.len());
    assert_eq!(a.cols(), y.len());

    scale(y, beta);
    if alpha != 0.0 {
        for (val, (row, col)) in a.iter() {
            y[col] += alpha * (*val) * x[row];
        }
    }
}

fn scale(y: &mut [f64], beta: f64) {
    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }
}

/// y = K x for a symmetric K stored as its upper triangle.
pub fn symm_matvec_upper(k: &SparseCsc, x: &[f64], y: &mut [f64]) {
    y.fill(0.0);
    for (val, (row, col)) in k.iter() {
        y[row] += val * x[col];
        if row != col {
            y[col] += val * x[row];
        }
    }
}

/// Largest |K_ij - K_ji| over the stored entries.
pub fn asymmetry(k: &SparseCsc) -> f64 {
    let mut worst: f64 = 0.0;
    for (val, (row, col)) in k.iter() {
        if row < col {
            let mirror = k.get(col, row).copied().unwrap_or(0.0);
            worst = worst.max((val - mirror).abs());
        } else if row > col && k.get(col, row).is_none() {
            worst = worst.max(val.abs());
        }
    }
    worst
}
