//! Synthetic problem generators for tests and benchmarks.
//!
//! All generators are deterministic in their seed so that runs on different
//! machines see identical data.

use crate::error::{SolverError, SolverResult};
use crate::linalg::sparse::{self, SparseCsc};
use crate::problem::{Iterate, QpProblem};

/// 64-bit linear congruential generator.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next sample in [0, 1].
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((self.state >> 33) as f64) / (u32::MAX as f64)
    }
}

/// `len` samples uniform on [center − radius, center + radius].
pub fn uniform(len: usize, center: f64, radius: f64, rng: &mut Lcg) -> Vec<f64> {
    (0..len)
        .map(|_| center + radius * (2.0 * rng.next_f64() - 1.0))
        .collect()
}

/// Generated problem together with a starting point and the point b was
/// generated from.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub problem: QpProblem,
    pub start: Iterate,
    /// Strictly positive x with A x = b
    pub x_gen: Vec<f64>,
}

/// m×n banded matrix with a dense last column.
///
/// Row s holds 11 on the diagonal, 1 and 2 on the sub/super-diagonals,
/// 4 at column s + m (when s < n − m) and 5/m in the last column. Entries
/// landing on the same position are summed.
pub fn banded_dense_column(m: usize, n: usize) -> SolverResult<SparseCsc> {
    if m == 0 || m > n {
        return Err(SolverError::InvalidDimension {
            operand: "A",
            expected: (m, m.max(1)),
            found: (m, n),
        });
    }
    let mut triplets = Vec::with_capacity(5 * m);
    for s in 0..m {
        triplets.push((s, s, 11.0));
        if s != 0 {
            triplets.push((s, s - 1, 1.0));
        }
        if s != n - 1 {
            triplets.push((s, s + 1, 2.0));
        }
        if s >= m {
            triplets.push((s, s - m, 3.0));
        }
        if s + m < n {
            triplets.push((s, s + m, 4.0));
        }
        triplets.push((s, n - 1, 5.0 / m as f64));
    }
    Ok(sparse::from_triplets(m, n, triplets))
}

/// Q = I with the banded dense-column constraint matrix.
///
/// b = A x_gen for x_gen uniform on (0.0001, 0.9999); c and the starting
/// point are drawn from the same distribution.
pub fn dense_column_scenario(m: usize, n: usize, seed: u64) -> SolverResult<Scenario> {
    let a = banded_dense_column(m, n)?;
    let mut rng = Lcg::new(seed);

    let x_gen = uniform(n, 0.5, 0.4999, &mut rng);
    let mut b = vec![0.0; m];
    sparse::spmv(&a, &x_gen, &mut b, 1.0, 0.0);
    let c = uniform(n, 0.5, 0.4999, &mut rng);

    let start = Iterate::new(
        uniform(n, 0.5, 0.4999, &mut rng),
        uniform(m, 0.5, 0.4999, &mut rng),
        uniform(n, 0.5, 0.4999, &mut rng),
    );

    Ok(Scenario {
        problem: QpProblem::new(sparse::identity(n), a, b, c),
        start,
        x_gen,
    })
}

/// Random sparse feasible QP with a diagonal, partly singular Q.
///
/// A carries a dominant diagonal block plus roughly `density · n` entries per
/// row in [−1, 1], so it has full row rank. c is positive, which together
/// with x ≥ 0 keeps the problem bounded.
pub fn random_feasible(m: usize, n: usize, density: f64, seed: u64) -> SolverResult<Scenario> {
    if m == 0 || m > n {
        return Err(SolverError::InvalidDimension {
            operand: "A",
            expected: (m, m.max(1)),
            found: (m, n),
        });
    }
    if !(0.0..=1.0).contains(&density) {
        return Err(SolverError::InvalidConfiguration(format!(
            "density must lie in [0, 1], got {}",
            density
        )));
    }
    let mut rng = Lcg::new(seed);

    let mut triplets = Vec::new();
    for i in 0..m {
        triplets.push((i, i, 2.0 + rng.next_f64()));
        for j in m..n {
            if rng.next_f64() < density {
                triplets.push((i, j, 2.0 * rng.next_f64() - 1.0));
            }
        }
    }
    let a = sparse::from_triplets(m, n, triplets);

    // Every third diagonal entry of Q is zero
    let q: Vec<f64> = (0..n)
        .map(|j| if j % 3 == 0 { 0.0 } else { rng.next_f64() })
        .collect();

    let x_gen = uniform(n, 1.0, 0.5, &mut rng);
    let mut b = vec![0.0; m];
    sparse::spmv(&a, &x_gen, &mut b, 1.0, 0.0);
    let c = uniform(n, 1.0, 0.9, &mut rng);

    Ok(Scenario {
        problem: QpProblem::new(sparse::diagonal(&q), a, b, c),
        start: Iterate::ones(m, n),
        x_gen,
    })
}
