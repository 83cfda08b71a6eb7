//! Mehrotra predictor-corrector driver.
//!
//! One factorization per iteration, two solves against it:
//!
//! 1. predictor (affine scaling) with rmu = x∘z,
//! 2. corrector with rb = rc = 0 and rmu = Δx_aff∘Δz_aff − σμ,
//!
//! where σ = (gap_aff / μ)³ and gap_aff is the duality measure after the
//! largest feasible affine step. The sum of both directions is taken with
//! the usual fraction-to-boundary rule.

use super::progress::{NoProgress, ProgressObserver, Reporter};
use super::residuals::{Measures, ProblemNorms, Residuals};
use super::{step, DirectionStrategy, DriverConfig, StepChoice};
use crate::context::{Communicator, Context};
use crate::error::SolverResult;
use crate::linalg::{vector, Direction, KktBuilder, KktError, MatrixOperator};
use crate::problem::{Iterate, QpProblem, SolveInfo};
use crate::settings::MehrotraSettings;

/// Solve with the Mehrotra predictor-corrector driver.
///
/// `iterate` holds the starting point on entry and the last accepted
/// iterate on return, errors included.
pub fn solve_mehrotra<M, C>(
    ctx: &Context<C>,
    problem: &QpProblem<M>,
    iterate: &mut Iterate,
    settings: &MehrotraSettings,
) -> SolverResult<SolveInfo>
where
    M: MatrixOperator,
    C: Communicator,
{
    solve_mehrotra_with_observer(ctx, problem, iterate, settings, &mut NoProgress)
}

/// [`solve_mehrotra`] reporting every iterate and warning to `observer`.
pub fn solve_mehrotra_with_observer<M, C, O>(
    ctx: &Context<C>,
    problem: &QpProblem<M>,
    iterate: &mut Iterate,
    settings: &MehrotraSettings,
    observer: &mut O,
) -> SolverResult<SolveInfo>
where
    M: MatrixOperator,
    C: Communicator,
    O: ProgressObserver,
{
    settings.validate()?;
    let config = DriverConfig {
        name: "Mehrotra",
        tol: settings.tol,
        max_its: settings.max_its,
        kkt: &settings.kkt,
        init: &settings.init,
        progress: settings.progress,
        check_symmetry: settings.check_symmetry,
    };
    let mut strategy =
        MehrotraStep::new(problem.num_constraints(), problem.num_vars(), settings.max_step_ratio);
    super::run(ctx, problem, iterate, &config, &mut strategy, observer)
}

pub(crate) struct MehrotraStep {
    max_step_ratio: f64,
    rmu: Vec<f64>,
    zeros_m: Vec<f64>,
    zeros_n: Vec<f64>,
    corrector: Direction,
}

impl MehrotraStep {
    fn new(m: usize, n: usize, max_step_ratio: f64) -> Self {
        Self {
            max_step_ratio,
            rmu: vec![0.0; n],
            zeros_m: vec![0.0; m],
            zeros_n: vec![0.0; n],
            corrector: Direction::zeros(m, n),
        }
    }
}

impl DirectionStrategy for MehrotraStep {
    const EXPECTS_MONOTONE_GAP: bool = true;

    fn compute_step<C: Communicator>(
        &mut self,
        ctx: &Context<C>,
        kkt: &mut KktBuilder,
        it: &Iterate,
        res: &Residuals,
        measures: &Measures,
        norms: &ProblemNorms,
        dir: &mut Direction,
        _reporter: &mut Reporter<'_>,
        _iteration: usize,
    ) -> Result<StepChoice, KktError> {
        kkt.factor(&it.x, &it.z)?;

        // Predictor
        vector::hadamard(&it.x, &it.z, &mut self.rmu);
        kkt.solve(&res.rb, &res.rc, &self.rmu, dir)?;

        let (alpha_x, alpha_z) = step::max_step_pair(ctx, it, dir);
        let alpha_aff = alpha_x.min(alpha_z);
        let mu_aff = step::shifted_gap(ctx, it, dir, alpha_aff, norms.n);
        let sigma = step::mehrotra_sigma(mu_aff, measures.mu);
        let target = sigma * measures.mu;

        // Corrector
        vector::hadamard(&dir.dx, &dir.dz, &mut self.rmu);
        self.rmu.iter_mut().for_each(|r| *r -= target);
        kkt.solve(&self.zeros_m, &self.zeros_n, &self.rmu, &mut self.corrector)?;
        dir.add(&self.corrector);

        let alpha = step::step_length(ctx, it, dir, self.max_step_ratio);
        log::trace!(
            "affine step {:.3e}, affine gap {:.3e}, sigma {:.3e}, step {:.3e}",
            alpha_aff,
            mu_aff,
            sigma,
            alpha
        );
        Ok(StepChoice { alpha, sigma })
    }
}
