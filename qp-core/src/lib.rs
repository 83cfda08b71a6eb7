//! qp-core: direct-factorization interior point solvers for convex QPs
//!
//! Solves problems in standard form
//!
//! ```text
//! minimize    cᵗx + ½ xᵗQx
//! subject to  Ax = b,  x ≥ 0
//! ```
//!
//! with Q symmetric positive semidefinite, using one of two primal-dual
//! interior point drivers:
//!
//! - **IPF**: infeasible path-following with a fixed centering parameter and a
//!   wide-neighbourhood backtracking line search
//! - **Mehrotra**: predictor-corrector with adaptive centering
//!
//! Each Newton system is solved directly. The KKT backend is pluggable:
//! sparse quasi-definite LDLᵗ on the augmented system (default), dense
//! Cholesky on the normal equations, or dense LU on the full unreduced
//! system.
//!
//! # Example
//!
//! ```
//! use qp_core::linalg::sparse;
//! use qp_core::{solve, Context, Iterate, QpProblem, QpSettings, SolveStatus};
//!
//! // minimize ½‖x‖² − 2x₀  subject to  x₀ + x₁ = 1,  x ≥ 0
//! let problem = QpProblem::new(
//!     sparse::identity(2),
//!     sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
//!     vec![1.0],
//!     vec![-2.0, 0.0],
//! );
//!
//! let ctx = Context::init();
//! let mut iterate = Iterate::ones(1, 2);
//! let info = solve(&ctx, &problem, &mut iterate, &QpSettings::default())?;
//! assert_eq!(info.status, SolveStatus::Converged);
//! assert!((iterate.x[0] - 1.0).abs() < 1e-6);
//! ctx.shutdown();
//! # Ok::<(), qp_core::SolverError>(())
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)] // KKT plumbing passes the full iterate around

pub mod context;
pub mod error;
pub mod generators;
pub mod ipm;
pub mod linalg;
pub mod problem;
pub mod settings;

pub use context::{Communicator, Context, SelfCommunicator};
pub use error::{SolverError, SolverResult};
pub use ipm::ipf::{solve_ipf, solve_ipf_with_observer};
pub use ipm::mehrotra::{solve_mehrotra, solve_mehrotra_with_observer};
pub use ipm::progress::{
    IterationReport, NoProgress, NumericalWarning, ProgressEvent, ProgressObserver,
};
pub use linalg::{KktError, MatrixOperator, SparseCsc};
pub use problem::{Iterate, QpProblem, SolveInfo, SolveStatus, SolveTimings};
pub use settings::{
    Approach, InitSettings, IpfLineSearchSettings, IpfSettings, KktOrdering, KktSettings,
    KktSystem, MehrotraSettings, QpSettings,
};

/// Main solve entry point.
///
/// Runs the driver selected by `settings.approach` starting from
/// `iterate`, which receives the final iterate.
pub fn solve<M, C>(
    ctx: &Context<C>,
    problem: &QpProblem<M>,
    iterate: &mut Iterate,
    settings: &QpSettings,
) -> SolverResult<SolveInfo>
where
    M: MatrixOperator,
    C: Communicator,
{
    match settings.approach {
        Approach::Ipf => solve_ipf(ctx, problem, iterate, &settings.ipf),
        Approach::Mehrotra => solve_mehrotra(ctx, problem, iterate, &settings.mehrotra),
    }
}

/// Solve without a starting point and return x alone.
///
/// Both halves of the iterate are computed by the starting point heuristic,
/// whatever `settings.*.init` says.
pub fn solve_primal<M, C>(
    ctx: &Context<C>,
    problem: &QpProblem<M>,
    settings: &QpSettings,
) -> SolverResult<(Vec<f64>, SolveInfo)>
where
    M: MatrixOperator,
    C: Communicator,
{
    let mut settings = settings.clone();
    settings.ipf.init = InitSettings::automatic();
    settings.mehrotra.init = InitSettings::automatic();

    let mut iterate = Iterate::ones(problem.num_constraints(), problem.num_vars());
    let info = solve(ctx, problem, &mut iterate, &settings)?;
    Ok((iterate.x, info))
}
