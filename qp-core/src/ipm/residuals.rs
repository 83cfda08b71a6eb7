//! Residuals and per-iteration measures.

use crate::context::{Communicator, Context};
use crate::linalg::MatrixOperator;
use crate::problem::{Iterate, QpProblem};

/// Primal and dual residuals at an iterate.
///
/// `rb = Ax − b`, `rc = Qx + Aᵗy − z + c`. The complementarity residual
/// depends on the driver's target and is formed where it is used.
#[derive(Debug, Clone)]
pub struct Residuals {
    pub rb: Vec<f64>,
    pub rc: Vec<f64>,
}

impl Residuals {
    pub fn new(m: usize, n: usize) -> Self {
        Self {
            rb: vec![0.0; m],
            rc: vec![0.0; n],
        }
    }

    pub fn update<M: MatrixOperator>(&mut self, problem: &QpProblem<M>, it: &Iterate) {
        self.rb.copy_from_slice(&problem.b);
        problem.A.apply(&it.x, &mut self.rb, 1.0, -1.0);

        self.rc.copy_from_slice(&problem.c);
        problem.Q.apply(&it.x, &mut self.rc, 1.0, 1.0);
        problem.A.apply_transpose(&it.y, &mut self.rc, 1.0, 1.0);
        for (r, zi) in self.rc.iter_mut().zip(&it.z) {
            *r -= zi;
        }
    }
}

/// Norms of the problem data used to make measures relative.
#[derive(Debug, Clone, Copy)]
pub struct ProblemNorms {
    pub b_norm: f64,
    pub c_norm: f64,
    /// Global number of variables
    pub n: f64,
}

impl ProblemNorms {
    pub fn compute<M: MatrixOperator, C: Communicator>(
        ctx: &Context<C>,
        problem: &QpProblem<M>,
    ) -> Self {
        Self {
            b_norm: ctx.norm2(&problem.b),
            c_norm: ctx.norm2(&problem.c),
            n: ctx.sum_scalar(problem.c.len() as f64),
        }
    }
}

/// Scalar summary of an iterate.
#[derive(Debug, Clone, Copy)]
pub struct Measures {
    /// ‖rb‖
    pub rb_norm: f64,
    /// ‖rc‖
    pub rc_norm: f64,
    /// xᵗz
    pub complementarity: f64,
    /// xᵗz / n
    pub mu: f64,
    /// Smallest xᵢzᵢ
    pub min_xz: f64,
    pub primal_objective: f64,
    pub dual_objective: f64,
    pub min_x: f64,
    pub min_z: f64,
}

impl Measures {
    pub fn compute<M: MatrixOperator, C: Communicator>(
        ctx: &Context<C>,
        problem: &QpProblem<M>,
        norms: &ProblemNorms,
        it: &Iterate,
        res: &Residuals,
    ) -> Self {
        let local_quad = problem.half_quadratic(&it.x);
        let quad = ctx.sum_scalar(local_quad);
        let ctx_x = ctx.dot(&problem.c, &it.x);
        let bty = ctx.dot(&problem.b, &it.y);
        let xtz = ctx.dot(&it.x, &it.z);
        let local_min_xz = it
            .x
            .iter()
            .zip(&it.z)
            .map(|(xi, zi)| xi * zi)
            .fold(f64::INFINITY, f64::min);

        Self {
            rb_norm: ctx.norm2(&res.rb),
            rc_norm: ctx.norm2(&res.rc),
            complementarity: xtz,
            mu: xtz / norms.n,
            min_xz: ctx.min_scalar(local_min_xz),
            primal_objective: ctx_x + quad,
            dual_objective: -bty - quad,
            min_x: ctx.min(&it.x),
            min_z: ctx.min(&it.z),
        }
    }

    pub fn primal_infeasibility(&self, norms: &ProblemNorms) -> f64 {
        self.rb_norm / (1.0 + norms.b_norm)
    }

    pub fn dual_infeasibility(&self, norms: &ProblemNorms) -> f64 {
        self.rc_norm / (1.0 + norms.c_norm)
    }

    pub fn is_finite(&self) -> bool {
        self.rb_norm.is_finite()
            && self.rc_norm.is_finite()
            && self.mu.is_finite()
            && self.primal_objective.is_finite()
    }
}
