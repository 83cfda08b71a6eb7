//! Interior point drivers.
//!
//! Both drivers run the same state machine
//!
//! ```text
//! Init ──▶ Iterate ──▶ Converged
//!   │         │  ▲
//!   │         └──┘ ──▶ MaxItersExceeded
//!   └─────────┴──────▶ Failed
//! ```
//!
//! and differ only in how a direction and step are chosen each iteration.

pub mod init;
pub mod ipf;
pub mod line_search;
pub mod mehrotra;
pub mod progress;
pub mod residuals;
pub mod step;
pub mod termination;

use crate::context::{Communicator, Context};
use crate::error::{SolverError, SolverResult};
use crate::linalg::{Direction, KktBuilder, KktError, MatrixOperator};
use crate::problem::{Iterate, QpProblem, SolveInfo, SolveStatus, SolveTimings};
use crate::settings::{InitSettings, KktSettings};
use progress::{IterationReport, NumericalWarning, ProgressObserver, Reporter};
use residuals::{Measures, ProblemNorms, Residuals};
use std::time::Instant;
use termination::{check_convergence, has_exceeded_budget, ConvergenceCheck};

/// Settings shared by both drivers.
pub(crate) struct DriverConfig<'a> {
    pub name: &'static str,
    pub tol: f64,
    pub max_its: usize,
    pub kkt: &'a KktSettings,
    pub init: &'a InitSettings,
    pub progress: bool,
    pub check_symmetry: bool,
}

/// Step chosen by a strategy.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StepChoice {
    pub alpha: f64,
    pub sigma: f64,
}

/// Direction-computation policy plugged into the driver loop.
pub(crate) trait DirectionStrategy {
    /// Warn when the duality measure grows across a step.
    const EXPECTS_MONOTONE_GAP: bool;

    /// Called once with the starting point's measures.
    fn start(&mut self, _measures: &Measures, _norms: &ProblemNorms) {}

    /// Factor at the current iterate, fill `dir` and choose a step.
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
    ) -> Result<StepChoice, KktError>;
}

enum DriverState<'a, M: MatrixOperator, C: Communicator> {
    Init,
    Iterate(Session<'a, M, C>),
    Converged(Session<'a, M, C>),
    MaxItersExceeded(Session<'a, M, C>),
    Failed(SolverError),
}

enum Progress {
    Continue,
    Converged,
    BudgetExhausted,
}

/// Everything a running solve owns.
struct Session<'a, M: MatrixOperator, C: Communicator> {
    ctx: &'a Context<C>,
    problem: &'a QpProblem<M>,
    config: &'a DriverConfig<'a>,
    kkt: KktBuilder,
    norms: ProblemNorms,
    res: Residuals,
    measures: Measures,
    dir: Direction,
    previous: Iterate,
    iteration: usize,
    last_alpha: f64,
    last_sigma: f64,
    started: Instant,
    setup_time: f64,
}

pub(crate) fn run<M, C, S>(
    ctx: &Context<C>,
    problem: &QpProblem<M>,
    it: &mut Iterate,
    config: &DriverConfig<'_>,
    strategy: &mut S,
    observer: &mut dyn ProgressObserver,
) -> SolverResult<SolveInfo>
where
    M: MatrixOperator,
    C: Communicator,
    S: DirectionStrategy,
{
    let started = Instant::now();
    let mut reporter = Reporter::new(observer, config.name, config.progress);
    let mut state = DriverState::Init;

    loop {
        state = match state {
            DriverState::Init => {
                match Session::setup(ctx, problem, it, config, strategy, &mut reporter, started) {
                    Ok(session) => DriverState::Iterate(session),
                    Err(err) => DriverState::Failed(err),
                }
            }
            DriverState::Iterate(mut session) => {
                match session.iterate(it, strategy, &mut reporter) {
                    Ok(Progress::Continue) => DriverState::Iterate(session),
                    Ok(Progress::Converged) => DriverState::Converged(session),
                    Ok(Progress::BudgetExhausted) => DriverState::MaxItersExceeded(session),
                    Err(err) => DriverState::Failed(err),
                }
            }
            DriverState::Converged(session) => {
                return Ok(session.finish(SolveStatus::Converged));
            }
            DriverState::MaxItersExceeded(session) => {
                log::warn!(
                    "{}: no convergence within {} iterations",
                    config.name,
                    config.max_its
                );
                return Ok(session.finish(SolveStatus::MaxIterations));
            }
            DriverState::Failed(err) => {
                log::warn!("{}: {}", config.name, err);
                return Err(err);
            }
        };
    }
}

impl<'a, M: MatrixOperator, C: Communicator> Session<'a, M, C> {
    fn setup<S: DirectionStrategy>(
        ctx: &'a Context<C>,
        problem: &'a QpProblem<M>,
        it: &mut Iterate,
        config: &'a DriverConfig<'a>,
        strategy: &mut S,
        reporter: &mut Reporter<'_>,
        started: Instant,
    ) -> SolverResult<Self> {
        problem.validate()?;
        problem.validate_iterate(it)?;
        let (m, n) = problem.A.shape();

        if config.check_symmetry {
            let deviation = problem.Q.asymmetry();
            let mut scale: f64 = 0.0;
            problem.Q.for_each_entry(&mut |_, _, v| scale = scale.max(v.abs()));
            if deviation > 1e-12 * (1.0 + scale) {
                reporter.warning(NumericalWarning::AsymmetricQ {
                    max_deviation: deviation,
                });
            }
        }

        let mut kkt = KktBuilder::new(problem, config.kkt).map_err(|err| match err {
            KktError::Unsupported { .. } => SolverError::InvalidConfiguration(err.to_string()),
            other => SolverError::Kkt(other),
        })?;

        init::initialize(ctx, &mut kkt, &problem.b, &problem.c, it, config.init)?;
        it.check_interior()?;

        let norms = ProblemNorms::compute(ctx, problem);
        let mut res = Residuals::new(m, n);
        res.update(problem, it);
        let measures = Measures::compute(ctx, problem, &norms, it, &res);
        strategy.start(&measures, &norms);

        log::debug!(
            "{}: m = {}, n = {}, nnz(A) = {}, nnz(Q) = {}, backend {}",
            config.name,
            m,
            n,
            problem.A.nnz(),
            problem.Q.nnz(),
            kkt.backend()
        );

        Ok(Self {
            ctx,
            problem,
            config,
            kkt,
            norms,
            res,
            measures,
            dir: Direction::zeros(m, n),
            previous: it.clone(),
            iteration: 0,
            last_alpha: 0.0,
            last_sigma: 0.0,
            started,
            setup_time: started.elapsed().as_secs_f64(),
        })
    }

    fn report(&self) -> IterationReport {
        IterationReport {
            iteration: self.iteration,
            primal_infeasibility: self.measures.primal_infeasibility(&self.norms),
            dual_infeasibility: self.measures.dual_infeasibility(&self.norms),
            mu: self.measures.mu,
            primal_objective: self.measures.primal_objective,
            dual_objective: self.measures.dual_objective,
            alpha: self.last_alpha,
            sigma: self.last_sigma,
            min_x: self.measures.min_x,
            min_z: self.measures.min_z,
        }
    }

    fn iterate<S: DirectionStrategy>(
        &mut self,
        it: &mut Iterate,
        strategy: &mut S,
        reporter: &mut Reporter<'_>,
    ) -> SolverResult<Progress> {
        reporter.iteration(&self.report());

        if check_convergence(&self.measures, &self.norms, self.config.tol)
            == ConvergenceCheck::Converged
        {
            return Ok(Progress::Converged);
        }
        if has_exceeded_budget(self.iteration, self.config.max_its) {
            return Ok(Progress::BudgetExhausted);
        }

        let iteration = self.iteration;
        let choice = strategy
            .compute_step(
                self.ctx,
                &mut self.kkt,
                it,
                &self.res,
                &self.measures,
                &self.norms,
                &mut self.dir,
                reporter,
                iteration,
            )
            .map_err(|source| kkt_failure(iteration, source))?;

        self.previous.clone_from(it);
        step::take_step(it, &self.dir, choice.alpha);
        self.res.update(self.problem, it);
        let next = Measures::compute(self.ctx, self.problem, &self.norms, it, &self.res);

        if !next.is_finite() {
            it.clone_from(&self.previous);
            return Err(SolverError::NumericalBreakdown {
                iteration,
                what: "non-finite residuals or duality measure".to_string(),
            });
        }
        if !(next.min_x > 0.0 && next.min_z > 0.0) {
            it.clone_from(&self.previous);
            return Err(SolverError::NumericalBreakdown {
                iteration,
                what: format!("step {:.3e} left the positive orthant", choice.alpha),
            });
        }
        if S::EXPECTS_MONOTONE_GAP && next.mu > self.measures.mu {
            reporter.warning(NumericalWarning::NonMonotoneGap {
                iteration: iteration + 1,
                previous: self.measures.mu,
                current: next.mu,
            });
        }

        self.measures = next;
        self.iteration += 1;
        self.last_alpha = choice.alpha;
        self.last_sigma = choice.sigma;
        Ok(Progress::Continue)
    }

    fn finish(self, status: SolveStatus) -> SolveInfo {
        let (factor, solve) = self.kkt.timings();
        let info = SolveInfo {
            status,
            iterations: self.iteration,
            primal_objective: self.measures.primal_objective,
            dual_objective: self.measures.dual_objective,
            primal_infeasibility: self.measures.primal_infeasibility(&self.norms),
            dual_infeasibility: self.measures.dual_infeasibility(&self.norms),
            duality_measure: self.measures.mu,
            factorizations: self.kkt.factorizations(),
            timings: SolveTimings {
                total: self.started.elapsed().as_secs_f64(),
                setup: self.setup_time,
                factor,
                solve,
            },
        };
        log::info!(
            "{}: {} after {} iterations, objective {:.8e}, {:.3}s",
            self.config.name,
            info.status,
            info.iterations,
            info.primal_objective,
            info.timings.total
        );
        info
    }
}

/// Map a KKT failure inside the loop to the driver's error.
fn kkt_failure(iteration: usize, source: KktError) -> SolverError {
    match source {
        KktError::ZeroPivot { .. }
        | KktError::SmallPivot { .. }
        | KktError::WrongInertia { .. }
        | KktError::FactorizationFailed(_) => SolverError::SingularSystem { iteration, source },
        other => SolverError::Kkt(other),
    }
}
