//! Infeasible path-following (IPF) driver.
//!
//! Each iteration solves one Newton system aimed at the perturbed
//! complementarity target τ = centering · μ and moves along it by the
//! largest step the positivity bound and the neighbourhood line search
//! allow.

use super::line_search::{self, NeighborhoodBounds};
use super::progress::{NoProgress, NumericalWarning, ProgressObserver, Reporter};
use super::residuals::{Measures, ProblemNorms, Residuals};
use super::{step, DirectionStrategy, DriverConfig, StepChoice};
use crate::context::{Communicator, Context};
use crate::error::SolverResult;
use crate::linalg::{vector, Direction, KktBuilder, KktError, MatrixOperator};
use crate::problem::{Iterate, QpProblem, SolveInfo};
use crate::settings::{IpfLineSearchSettings, IpfSettings};

/// Solve with the IPF driver.
///
/// `iterate` holds the starting point on entry (see
/// [`InitSettings`](crate::settings::InitSettings)) and the last accepted
/// iterate on return, errors included.
pub fn solve_ipf<M, C>(
    ctx: &Context<C>,
    problem: &QpProblem<M>,
    iterate: &mut Iterate,
    settings: &IpfSettings,
) -> SolverResult<SolveInfo>
where
    M: MatrixOperator,
    C: Communicator,
{
    solve_ipf_with_observer(ctx, problem, iterate, settings, &mut NoProgress)
}

/// [`solve_ipf`] reporting every iterate and warning to `observer`.
pub fn solve_ipf_with_observer<M, C, O>(
    ctx: &Context<C>,
    problem: &QpProblem<M>,
    iterate: &mut Iterate,
    settings: &IpfSettings,
    observer: &mut O,
) -> SolverResult<SolveInfo>
where
    M: MatrixOperator,
    C: Communicator,
    O: ProgressObserver,
{
    settings.validate()?;
    let config = DriverConfig {
        name: "IPF",
        tol: settings.tol,
        max_its: settings.max_its,
        kkt: &settings.kkt,
        init: &settings.init,
        progress: settings.progress,
        check_symmetry: settings.check_symmetry,
    };
    let mut strategy = IpfStep::new(settings, problem.num_vars());
    super::run(ctx, problem, iterate, &config, &mut strategy, observer)
}

pub(crate) struct IpfStep {
    tol: f64,
    centering: f64,
    max_step_ratio: f64,
    line_search: Option<IpfLineSearchSettings>,
    bounds: Option<NeighborhoodBounds>,
    rmu: Vec<f64>,
}

impl IpfStep {
    fn new(settings: &IpfSettings, n: usize) -> Self {
        Self {
            tol: settings.tol,
            centering: settings.centering,
            max_step_ratio: settings.max_step_ratio,
            line_search: settings.line_search.clone(),
            bounds: None,
            rmu: vec![0.0; n],
        }
    }
}

impl DirectionStrategy for IpfStep {
    const EXPECTS_MONOTONE_GAP: bool = false;

    fn start(&mut self, measures: &Measures, norms: &ProblemNorms) {
        self.bounds = self
            .line_search
            .as_ref()
            .map(|ls| NeighborhoodBounds::new(ls, measures, norms, self.tol));
    }

    fn compute_step<C: Communicator>(
        &mut self,
        ctx: &Context<C>,
        kkt: &mut KktBuilder,
        it: &Iterate,
        res: &Residuals,
        measures: &Measures,
        norms: &ProblemNorms,
        dir: &mut Direction,
        reporter: &mut Reporter<'_>,
        iteration: usize,
    ) -> Result<StepChoice, KktError> {
        let tau = self.centering * measures.mu;
        vector::hadamard(&it.x, &it.z, &mut self.rmu);
        self.rmu.iter_mut().for_each(|r| *r -= tau);
        *dir = kkt.build_and_solve(&it.x, &it.z, &res.rb, &res.rc, &self.rmu)?;

        let alpha0 = step::step_length(ctx, it, dir, self.max_step_ratio);
        let alpha = match (&self.line_search, &self.bounds) {
            (Some(ls), Some(bounds)) => {
                let outcome =
                    line_search::search(ctx, it, dir, measures, norms, bounds, ls, alpha0);
                if !outcome.accepted {
                    reporter.warning(NumericalWarning::StepCollapse {
                        iteration,
                        alpha: outcome.alpha,
                    });
                }
                outcome.alpha
            }
            _ => alpha0,
        };

        Ok(StepChoice {
            alpha,
            sigma: self.centering,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipm::progress::ProgressEvent;
    use crate::linalg::sparse;
    use crate::problem::SolveStatus;
    use crate::settings::InitSettings;

    /// min ½‖x‖² + cᵗx  s.t.  x₀ + x₁ + x₂ = 3
    fn simplex() -> QpProblem {
        QpProblem::new(
            sparse::identity(3),
            sparse::from_triplets(1, 3, vec![(0, 0, 1.0), (0, 1, 1.0), (0, 2, 1.0)]),
            vec![3.0],
            vec![-1.0, 0.0, 2.0],
        )
    }

    #[test]
    fn test_ipf_solves_small_qp() {
        let ctx = Context::init();
        let prob = simplex();
        let mut it = Iterate::ones(1, 3);
        let info = solve_ipf(&ctx, &prob, &mut it, &IpfSettings::default()).unwrap();
        assert_eq!(info.status, SolveStatus::Converged);

        // KKT: x = (2, 1, 0) with y = -1, z = (0, 0, 1)
        assert!((it.x[0] - 2.0).abs() < 1e-5);
        assert!((it.x[1] - 1.0).abs() < 1e-5);
        assert!(it.x[2].abs() < 1e-5);
        assert!((info.primal_objective - (2.5 - 2.0)).abs() < 1e-6);
    }

    #[test]
    fn test_ipf_without_line_search() {
        let ctx = Context::init();
        let prob = simplex();
        let mut it = Iterate::ones(1, 3);
        let settings = IpfSettings {
            line_search: None,
            init: InitSettings::automatic(),
            ..Default::default()
        };
        let info = solve_ipf(&ctx, &prob, &mut it, &settings).unwrap();
        assert_eq!(info.status, SolveStatus::Converged);
        assert!((info.primal_objective - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_ipf_budget_is_a_status() {
        let ctx = Context::init();
        let prob = simplex();
        let mut it = Iterate::ones(1, 3);
        let settings = IpfSettings {
            max_its: 2,
            ..Default::default()
        };
        let info = solve_ipf(&ctx, &prob, &mut it, &settings).unwrap();
        assert_eq!(info.status, SolveStatus::MaxIterations);
        assert_eq!(info.iterations, 2);
        assert!(it.x.iter().chain(&it.z).all(|&v| v > 0.0));
    }

    #[test]
    fn test_ipf_reports_sigma_as_centering() {
        let ctx = Context::init();
        let prob = simplex();
        let mut it = Iterate::ones(1, 3);
        let mut sigmas = Vec::new();
        let mut observer = |event: ProgressEvent<'_>| {
            if let ProgressEvent::Iteration(r) = event {
                sigmas.push(r.sigma);
            }
        };
        let settings = IpfSettings {
            max_its: 3,
            ..Default::default()
        };
        solve_ipf_with_observer(&ctx, &prob, &mut it, &settings, &mut observer).unwrap();
        assert_eq!(sigmas.len(), 4);
        assert_eq!(sigmas[0], 0.0);
        assert!(sigmas[1..].iter().all(|&s| s == 0.9));
    }
}
