//! Backtracking line search for the IPF driver.
//!
//! Both residuals are linear in the step: with A Δx = −rb and
//! QΔx + AᵗΔy − Δz = −rc, moving by α scales them to (1 − α) rb and
//! (1 − α) rc. Only the complementarity terms need to be re-evaluated per
//! trial.

use super::residuals::{Measures, ProblemNorms};
use super::step;
use crate::context::{Communicator, Context};
use crate::linalg::Direction;
use crate::problem::Iterate;
use crate::settings::IpfLineSearchSettings;

/// Quantities fixed at the starting point.
#[derive(Debug, Clone, Copy)]
pub struct NeighborhoodBounds {
    /// Effective centrality constant, never larger than the starting point's
    pub gamma: f64,
    /// ‖(rb₀, rc₀)‖ / μ₀
    pub infeasibility_ratio: f64,
    /// Residual norm treated as zero
    pub floor: f64,
}

impl NeighborhoodBounds {
    pub fn new(
        settings: &IpfLineSearchSettings,
        start: &Measures,
        norms: &ProblemNorms,
        tol: f64,
    ) -> Self {
        let mu0 = start.mu.max(f64::MIN_POSITIVE);
        Self {
            gamma: settings.gamma.min(start.min_xz / mu0),
            infeasibility_ratio: start.rb_norm.hypot(start.rc_norm) / mu0,
            floor: tol * (1.0 + norms.b_norm + norms.c_norm),
        }
    }
}

/// Result of one line search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearchOutcome {
    pub alpha: f64,
    pub trials: usize,
    pub accepted: bool,
}

/// Backtrack from `alpha0` until the trial iterate satisfies the wide
/// neighbourhood, bounded-infeasibility and sufficient-decrease conditions.
///
/// When every trial is rejected the outcome carries `alpha0` with
/// `accepted = false`.
pub fn search<C: Communicator>(
    ctx: &Context<C>,
    it: &Iterate,
    dir: &Direction,
    current: &Measures,
    norms: &ProblemNorms,
    bounds: &NeighborhoodBounds,
    settings: &IpfLineSearchSettings,
    alpha0: f64,
) -> LineSearchOutcome {
    let residual = current.rb_norm.hypot(current.rc_norm);
    let mut alpha = alpha0;

    for trial in 1..=settings.max_backtracks {
        let mu_alpha = step::shifted_gap(ctx, it, dir, alpha, norms.n);
        let min_product = step::shifted_min_product(ctx, it, dir, alpha);
        let residual_alpha = (1.0 - alpha) * residual;

        let central = min_product >= bounds.gamma * mu_alpha;
        let bounded = residual_alpha <= bounds.floor
            || residual_alpha <= settings.beta * bounds.infeasibility_ratio * mu_alpha;
        let decrease = mu_alpha <= (1.0 - alpha / settings.psi) * current.mu;

        if central && bounded && decrease {
            return LineSearchOutcome {
                alpha,
                trials: trial,
                accepted: true,
            };
        }
        if settings.progress {
            log::debug!(
                "line search trial {}: alpha {:.3e} central {} bounded {} decrease {}",
                trial,
                alpha,
                central,
                bounded,
                decrease
            );
        }
        alpha *= settings.backtrack_factor;
    }

    LineSearchOutcome {
        alpha: alpha0,
        trials: settings.max_backtracks,
        accepted: false,
    }
}
