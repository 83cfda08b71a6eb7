//! Symmetric orderings for the augmented system.
//!
//! The augmented matrix has n x columns and m y columns. A y pivot has a zero
//! (or −ρ_d) diagonal, so every y must be eliminated after the x variables
//! it couples to. CAMD alone does not respect that; its order is therefore
//! split into three groups, each kept in CAMD order:
//!
//! ```text
//! [ sparse x columns | y | dense x columns ]
//! ```
//!
//! A dense column of A eliminated before y turns the whole y block of L
//! dense. Deferred to the end it adds a single dense row instead.

use super::qdldl::QdldlError;
use super::sparse::SparseCsc;
use sprs::CsMat;
use sprs_suitesparse_camd::try_camd;

/// Columns of A with more nonzeros than this are eliminated after y.
pub fn dense_column_threshold(m: usize) -> usize {
    16.max((10.0 * (m as f64).sqrt()) as usize)
}

/// Symmetric permutation, `perm[new] = old` and `inv[old] = new`.
#[derive(Debug, Clone, PartialEq)]
pub struct Ordering {
    pub perm: Vec<usize>,
    pub inv: Vec<usize>,
}

impl Ordering {
    pub fn natural(dim: usize) -> Self {
        Self::from_perm((0..dim).collect())
    }

    /// CAMD order of `kkt` grouped as sparse x, y, then the x columns flagged
    /// in `deferred`.
    pub fn camd_grouped(kkt: &SparseCsc, n: usize, deferred: &[bool]) -> Result<Self, QdldlError> {
        let camd = try_camd(kkt.structure_view())
            .map_err(|e| QdldlError::OrderingFailed(e.to_string()))?;
        let order = camd.vec();

        let group = |old: usize| {
            if old >= n {
                1
            } else if deferred[old] {
                2
            } else {
                0
            }
        };
        let mut perm = Vec::with_capacity(order.len());
        for g in 0..3 {
            perm.extend(order.iter().copied().filter(|&old| group(old) == g));
        }
        Ok(Self::from_perm(perm))
    }

    fn from_perm(perm: Vec<usize>) -> Self {
        let mut inv = vec![0; perm.len()];
        for (new, &old) in perm.iter().enumerate() {
            inv[old] = new;
        }
        Self { perm, inv }
    }

    /// `out[new] = v[old]`
    pub fn gather(&self, v: &[f64], out: &mut [f64]) {
        for (o, &old) in out.iter_mut().zip(&self.perm) {
            *o = v[old];
        }
    }

    /// `v[old] = src[new]`
    pub fn scatter(&self, src: &[f64], v: &mut [f64]) {
        for (&s, &old) in src.iter().zip(&self.perm) {
            v[old] = s;
        }
    }

    /// Upper triangle of P K Pᵗ for `kkt` stored as its upper triangle.
    ///
    /// Also returns, for each entry of `kkt.data()`, its position in the
    /// permuted matrix's data, so later value updates skip the sort.
    pub fn permute_upper(&self, kkt: &SparseCsc) -> (SparseCsc, Vec<usize>) {
        let dim = kkt.rows();
        let indptr = kkt.indptr();
        let a_p = indptr.raw_storage();
        let a_i = kkt.indices();
        let values = kkt.data();

        // (new col, new row, source position)
        let mut entries = Vec::with_capacity(a_i.len());
        for col in 0..dim {
            for src in a_p[col]..a_p[col + 1] {
                let (r, c) = (self.inv[a_i[src]], self.inv[col]);
                entries.push((r.max(c), r.min(c), src));
            }
        }
        entries.sort_unstable();

        let mut p = vec![0; dim + 1];
        let mut indices = Vec::with_capacity(entries.len());
        let mut data = Vec::with_capacity(entries.len());
        let mut positions = vec![0; entries.len()];
        for (pos, &(col, row, src)) in entries.iter().enumerate() {
            p[col + 1] += 1;
            indices.push(row);
            data.push(values[src]);
            positions[src] = pos;
        }
        for col in 0..dim {
            p[col + 1] += p[col];
        }

        (CsMat::new_csc((dim, dim), p, indices, data), positions)
    }
}
