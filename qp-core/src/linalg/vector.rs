//! Elementwise vector kernels.
//!
//! These are purely local; reductions that must agree across participants go
//! through [`Context`](crate::Context).

#[inline]
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(ai, bi)| ai * bi).sum()
}

#[inline]
pub fn norm2_sq(a: &[f64]) -> f64 {
    a.iter().map(|v| v * v).sum()
}

#[inline]
pub fn inf_norm(a: &[f64]) -> f64 {
    a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Smallest entry, `+inf` for an empty slice.
#[inline]
pub fn min(a: &[f64]) -> f64 {
    a.iter().copied().fold(f64::INFINITY, f64::min)
}

/// y += alpha * x
#[inline]
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// out = a ∘ b
#[inline]
pub fn hadamard(a: &[f64], b: &[f64], out: &mut [f64]) {
    for ((o, ai), bi) in out.iter_mut().zip(a).zip(b) {
        *o = ai * bi;
    }
}

/// out = a ./ b
#[inline]
pub fn divide(a: &[f64], b: &[f64], out: &mut [f64]) {
    for ((o, ai), bi) in out.iter_mut().zip(a).zip(b) {
        *o = ai / bi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernels() {
        let a = [1.0, -2.0, 3.0];
        let b = [4.0, 5.0, -6.0];
        assert_eq!(dot(&a, &b), -24.0);
        assert_eq!(norm2_sq(&a), 14.0);
        assert_eq!(inf_norm(&b), 6.0);
        assert_eq!(min(&a), -2.0);
        assert_eq!(min(&[]), f64::INFINITY);

        let mut out = [0.0; 3];
        hadamard(&a, &b, &mut out);
        assert_eq!(out, [4.0, -10.0, -18.0]);
        divide(&b, &[2.0, 5.0, -3.0], &mut out);
        assert_eq!(out, [2.0, 1.0, 2.0]);

        let mut y = [1.0, 1.0, 1.0];
        axpy(-1.0, &a, &mut y);
        assert_eq!(y, [0.0, 3.0, -2.0]);
    }
}
