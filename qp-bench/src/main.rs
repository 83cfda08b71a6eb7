//! Benchmark driver for the direct-form QP solvers.
//!
//! Builds the banded dense-column scenario (Q = I, b = A x_gen, random
//! positive c and start), runs the selected drivers from the same starting
//! iterate and prints wall time and primal objective for each.

mod report;
mod solver_choice;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use qp_core::generators;
use qp_core::{Context, KktSettings, ProgressEvent, SolveStatus};

use report::{BenchReport, RunReport};
use solver_choice::{solve_with_driver, ApproachChoice, KktChoice, Overrides};

#[derive(Parser, Debug)]
#[command(name = "qp-bench", about = "Direct-form QP interior point benchmark")]
struct Args {
    /// Number of equality constraints
    #[arg(long, default_value_t = 2000)]
    m: usize,

    /// Number of variables
    #[arg(long, default_value_t = 4000)]
    n: usize,

    /// Drivers to run
    #[arg(long, value_enum, default_value_t = ApproachChoice::Both)]
    approach: ApproachChoice,

    /// KKT backend (defaults to QPDIRECT_KKT or augmented)
    #[arg(long, value_enum)]
    kkt: Option<KktChoice>,

    /// Relative convergence tolerance
    #[arg(long)]
    tol: Option<f64>,

    /// Iteration budget
    #[arg(long)]
    max_its: Option<usize>,

    /// Seed for the problem data and the starting point
    #[arg(long, default_value_t = 2014)]
    seed: u64,

    /// Print one line per iteration
    #[arg(long)]
    progress: bool,

    /// Write a JSON report to this path
    #[arg(long)]
    json: Option<PathBuf>,

    /// Compare objectives against a previous JSON report
    #[arg(long)]
    baseline: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.m == 0 || args.m > args.n {
        bail!("need 0 < m <= n, got m = {}, n = {}", args.m, args.n);
    }

    let scenario = generators::dense_column_scenario(args.m, args.n, args.seed)
        .context("Failed to build scenario")?;
    let nnz_a = scenario.problem.A.nnz();
    let overrides = Overrides {
        kkt: args.kkt.map(Into::into),
        tol: args.tol,
        max_its: args.max_its,
    };
    let kkt_name = overrides
        .kkt
        .unwrap_or_else(|| KktSettings::default().system)
        .to_string();

    println!("{}", "=".repeat(60));
    println!("Direct-form QP benchmark");
    println!("{}", "=".repeat(60));
    println!("Variables (n):    {}", args.n);
    println!("Constraints (m):  {}", args.m);
    println!(
        "A nonzeros:       {} ({:.3}% dense)",
        nnz_a,
        100.0 * nnz_a as f64 / (args.m * args.n) as f64
    );
    println!("KKT backend:      {}", kkt_name);
    println!();

    let ctx = Context::init();
    let mut runs = Vec::new();

    for &driver in args.approach.drivers() {
        let mut iterate = scenario.start.clone();
        let mut observer = |event: ProgressEvent<'_>| {
            if !args.progress {
                return;
            }
            match event {
                ProgressEvent::Iteration(r) => println!(
                    "{:>8} {:>4}  pobj {:>14.6e}  dobj {:>14.6e}  pinf {:>9.2e}  dinf {:>9.2e}  mu {:>9.2e}  alpha {:.4}  sigma {:.4}",
                    driver.name(),
                    r.iteration,
                    r.primal_objective,
                    r.dual_objective,
                    r.primal_infeasibility,
                    r.dual_infeasibility,
                    r.mu,
                    r.alpha,
                    r.sigma
                ),
                ProgressEvent::Warning(w) => println!("{:>8} warning: {}", driver.name(), w),
            }
        };

        let start = Instant::now();
        let result = solve_with_driver(
            &ctx,
            &scenario.problem,
            &mut iterate,
            driver,
            &overrides,
            &mut observer,
        );
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(info) => {
                let objective = scenario.problem.primal_objective(&iterate.x);
                println!("{} time: {:.3} s", driver.name(), elapsed);
                println!("{} primal objective = {:.10e}", driver.name(), objective);
                if info.status != SolveStatus::Converged {
                    println!(
                        "{} stopped after {} iterations without converging",
                        driver.name(),
                        info.iterations
                    );
                } else {
                    println!(
                        "{} iterations: {} ({} factorizations, {:.3} s factoring)",
                        driver.name(),
                        info.iterations,
                        info.factorizations,
                        info.timings.factor
                    );
                }
                runs.push(RunReport::from_info(driver.name(), &info));
            }
            Err(err) => {
                println!("{} ERROR: {}", driver.name(), err);
                runs.push(RunReport::failed(driver.name(), elapsed, err.to_string()));
            }
        }
        println!();
    }
    ctx.shutdown();

    let report = BenchReport {
        m: args.m,
        n: args.n,
        seed: args.seed,
        kkt: kkt_name,
        nnz_a,
        runs,
    };

    if let Some(path) = &args.baseline {
        let baseline = BenchReport::load_json(path)?;
        compare_with_baseline(&report, &baseline);
    }
    if let Some(path) = &args.json {
        report.save_json(path)?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}

fn compare_with_baseline(report: &BenchReport, baseline: &BenchReport) {
    if (report.m, report.n, report.seed) != (baseline.m, baseline.n, baseline.seed) {
        println!(
            "Baseline scenario differs (m = {}, n = {}, seed = {}); objectives are not comparable",
            baseline.m, baseline.n, baseline.seed
        );
        return;
    }
    for run in &report.runs {
        let Some(old) = baseline.runs.iter().find(|r| r.driver == run.driver) else {
            continue;
        };
        match (&run.metrics, &old.metrics) {
            (Some(new), Some(old_metrics)) => println!(
                "{:>8}: objective {:.10e} (baseline {:.10e}), time {:.3} s (baseline {:.3} s)",
                run.driver,
                new.primal_objective,
                old_metrics.primal_objective,
                run.total_time,
                old.total_time
            ),
            _ => println!(
                "{:>8}: status {} (baseline {})",
                run.driver, run.status, old.status
            ),
        }
    }
}
