//! End-to-end tests for the IPF and Mehrotra drivers.

use nalgebra::DMatrix;
use qp_core::generators::{self, Scenario};
use qp_core::linalg::sparse;
use qp_core::{
    solve, solve_ipf, solve_ipf_with_observer, solve_mehrotra, solve_mehrotra_with_observer,
    Approach, Context, InitSettings, IpfSettings, Iterate, KktSettings, KktSystem,
    MehrotraSettings, NumericalWarning, ProgressEvent, QpProblem, QpSettings, SolveStatus,
    SolverError,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const TOL: f64 = 1e-8;

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// (‖Ax − b‖, ‖Qx + Aᵗy − z + c‖, xᵗz)
fn kkt_residuals(prob: &QpProblem, it: &Iterate) -> (f64, f64, f64) {
    let mut rb = prob.b.iter().map(|v| -v).collect::<Vec<_>>();
    sparse::spmv(&prob.A, &it.x, &mut rb, 1.0, 1.0);

    let mut rc: Vec<f64> = prob.c.iter().zip(&it.z).map(|(c, z)| c - z).collect();
    sparse::spmv(&prob.Q, &it.x, &mut rc, 1.0, 1.0);
    sparse::spmv_transpose(&prob.A, &it.y, &mut rc, 1.0, 1.0);

    let gap = it.x.iter().zip(&it.z).map(|(x, z)| x * z).sum();
    (norm(&rb), norm(&rc), gap)
}

fn settings_for(approach: Approach) -> QpSettings {
    QpSettings {
        approach,
        ..Default::default()
    }
}

#[test]
fn test_round_trip_both_drivers() {
    let ctx = Context::init();
    for seed in [42, 1, 7] {
        let Scenario { problem, start, .. } =
            generators::random_feasible(30, 60, 0.1, seed).unwrap();

        for approach in [Approach::Mehrotra, Approach::Ipf] {
            let mut it = start.clone();
            let info = solve(&ctx, &problem, &mut it, &settings_for(approach)).unwrap();
            assert_eq!(info.status, SolveStatus::Converged, "{} seed {}", approach, seed);

            let (rb, rc, gap) = kkt_residuals(&problem, &it);
            // Slack for the order of summation differing from the solver's
            let tol = TOL * (1.0 + 1e-9);
            assert!(rb <= tol * (1.0 + norm(&problem.b)), "{}: ‖rb‖ = {:e}", approach, rb);
            assert!(rc <= tol * (1.0 + norm(&problem.c)), "{}: ‖rc‖ = {:e}", approach, rc);
            assert!(gap <= tol, "{} seed {}: xᵗz = {:e}", approach, seed, gap);
            assert!(info.duality_measure <= tol / 60.0);
            let scale = 1.0 + info.primal_objective.abs();
            assert!((info.primal_objective - info.dual_objective).abs() <= 1e-5 * scale);
        }
    }
    assert!(ctx.collectives() > 0);
    ctx.shutdown();
}

#[test]
fn test_interior_invariant_every_iterate() {
    let ctx = Context::init();
    let sc = generators::dense_column_scenario(40, 80, 5).unwrap();

    let mut reports = Vec::new();
    let mut observer = |event: ProgressEvent<'_>| {
        if let ProgressEvent::Iteration(r) = event {
            reports.push((r.min_x, r.min_z));
        }
    };

    let mut it = sc.start.clone();
    let info = solve_mehrotra_with_observer(
        &ctx,
        &sc.problem,
        &mut it,
        &MehrotraSettings::default(),
        &mut observer,
    )
    .unwrap();
    let mehrotra_reports = info.iterations + 1;

    let mut it = sc.start.clone();
    let info =
        solve_ipf_with_observer(&ctx, &sc.problem, &mut it, &IpfSettings::default(), &mut observer)
            .unwrap();

    assert_eq!(reports.len(), mehrotra_reports + info.iterations + 1);
    assert!(reports.iter().all(|&(x, z)| x > 0.0 && z > 0.0));
    assert!(it.x.iter().chain(&it.z).all(|&v| v > 0.0));
}

#[test]
fn test_mehrotra_gap_decreases_overall() {
    let ctx = Context::init();
    let sc = generators::random_feasible(40, 80, 0.1, 11).unwrap();

    let mut mus = Vec::new();
    let mut warnings = 0;
    let mut observer = |event: ProgressEvent<'_>| match event {
        ProgressEvent::Iteration(r) => mus.push(r.mu),
        ProgressEvent::Warning(NumericalWarning::NonMonotoneGap { .. }) => warnings += 1,
        ProgressEvent::Warning(_) => {}
    };
    let mut it = sc.start.clone();
    let info = solve_mehrotra_with_observer(
        &ctx,
        &sc.problem,
        &mut it,
        &MehrotraSettings::default(),
        &mut observer,
    )
    .unwrap();

    assert_eq!(info.status, SolveStatus::Converged);
    let increases = mus.windows(2).filter(|w| w[1] > w[0]).count();
    assert_eq!(increases, warnings);
    assert!(4 * increases <= mus.len(), "μ rose {} times: {:?}", increases, mus);
    assert!(mus[mus.len() - 1] < 1e-4 * mus[0]);
}

#[test]
fn test_drivers_agree_on_dense_column_scenario() {
    let ctx = Context::init();
    let sc = generators::dense_column_scenario(100, 200, 1).unwrap();

    let mut it_m = sc.start.clone();
    let mehrotra =
        solve_mehrotra(&ctx, &sc.problem, &mut it_m, &MehrotraSettings::default()).unwrap();
    let mut it_i = sc.start.clone();
    let ipf = solve_ipf(&ctx, &sc.problem, &mut it_i, &IpfSettings::default()).unwrap();

    assert_eq!(mehrotra.status, SolveStatus::Converged);
    assert_eq!(ipf.status, SolveStatus::Converged);
    assert!(mehrotra.iterations < ipf.iterations);

    let scale = 1.0 + mehrotra.primal_objective.abs();
    assert!(
        (mehrotra.primal_objective - ipf.primal_objective).abs() <= 1e-5 * scale,
        "Mehrotra {} vs IPF {}",
        mehrotra.primal_objective,
        ipf.primal_objective
    );
}

#[test]
fn test_wrong_b_length_fails_before_iterating() {
    let ctx = Context::init();
    let mut sc = generators::random_feasible(5, 10, 0.3, 2).unwrap();
    sc.problem.b.push(1.0);

    for approach in [Approach::Mehrotra, Approach::Ipf] {
        let mut events = 0;
        let mut observer = |_: ProgressEvent<'_>| events += 1;
        let mut it = sc.start.clone();
        let err = match approach {
            Approach::Mehrotra => solve_mehrotra_with_observer(
                &ctx,
                &sc.problem,
                &mut it,
                &MehrotraSettings::default(),
                &mut observer,
            ),
            Approach::Ipf => solve_ipf_with_observer(
                &ctx,
                &sc.problem,
                &mut it,
                &IpfSettings::default(),
                &mut observer,
            ),
        }
        .unwrap_err();

        match err {
            SolverError::InvalidDimension {
                operand,
                expected,
                found,
            } => {
                assert_eq!(operand, "b");
                assert_eq!(expected, (5, 1));
                assert_eq!(found, (6, 1));
            }
            other => panic!("{}: unexpected error {:?}", approach, other),
        }
        assert_eq!(events, 0);
        assert_eq!(it, sc.start);
    }
}

#[test]
fn test_duplicate_rows_are_singular() {
    let ctx = Context::init();
    let problem = QpProblem::new(
        sparse::identity(3),
        sparse::from_triplets(
            2,
            3,
            vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)],
        ),
        vec![2.0, 2.0],
        vec![1.0, 1.0, 1.0],
    );
    let start = Iterate::ones(2, 3);

    for approach in [Approach::Mehrotra, Approach::Ipf] {
        let mut it = start.clone();
        let err = solve(&ctx, &problem, &mut it, &settings_for(approach)).unwrap_err();
        assert!(
            matches!(err, SolverError::SingularSystem { iteration: 0, .. }),
            "{}: {:?}",
            approach,
            err
        );
        assert_eq!(it, start);
    }
}

#[test]
fn test_non_positive_start_is_rejected() {
    let ctx = Context::init();
    let sc = generators::random_feasible(5, 10, 0.3, 2).unwrap();
    let mut it = sc.start.clone();
    it.z[3] = 0.0;
    let err = solve(&ctx, &sc.problem, &mut it, &QpSettings::default()).unwrap_err();
    assert!(matches!(
        err,
        SolverError::NonPositiveIterate {
            component: "z",
            index: 3,
            ..
        }
    ));

    // The same start is fine once the dual half is computed automatically
    let mut settings = QpSettings::default();
    settings.mehrotra.init = InitSettings {
        primal_initialized: true,
        dual_initialized: false,
    };
    let info = solve(&ctx, &sc.problem, &mut it, &settings).unwrap();
    assert_eq!(info.status, SolveStatus::Converged);
}

#[test]
fn test_invalid_settings() {
    let ctx = Context::init();
    let sc = generators::random_feasible(5, 10, 0.3, 2).unwrap();

    let mut it = sc.start.clone();
    let settings = MehrotraSettings {
        max_step_ratio: 1.5,
        ..Default::default()
    };
    let err = solve_mehrotra(&ctx, &sc.problem, &mut it, &settings).unwrap_err();
    assert!(matches!(err, SolverError::InvalidConfiguration(_)));

    // Normal equations need a diagonal Q
    let coupled = QpProblem::new(
        sparse::from_triplets(2, 2, vec![(0, 0, 2.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 2.0)]),
        sparse::from_triplets(1, 2, vec![(0, 0, 1.0), (0, 1, 1.0)]),
        vec![1.0],
        vec![1.0, 1.0],
    );
    let settings = MehrotraSettings {
        kkt: KktSettings {
            system: KktSystem::Normal,
            ..Default::default()
        },
        ..Default::default()
    };
    let mut it = Iterate::ones(1, 2);
    let err = solve_mehrotra(&ctx, &coupled, &mut it, &settings).unwrap_err();
    assert!(matches!(err, SolverError::InvalidConfiguration(_)));
}

#[test]
fn test_budget_exhaustion_is_a_status() {
    let ctx = Context::init();
    let sc = generators::random_feasible(20, 40, 0.1, 9).unwrap();
    let mut it = sc.start.clone();
    let settings = MehrotraSettings {
        max_its: 3,
        ..Default::default()
    };
    let info = solve_mehrotra(&ctx, &sc.problem, &mut it, &settings).unwrap();
    assert_eq!(info.status, SolveStatus::MaxIterations);
    assert_eq!(info.iterations, 3);
    assert_eq!(info.factorizations, 3);
}

#[test]
fn test_backends_agree() {
    let ctx = Context::init();
    let sc = generators::random_feasible(12, 24, 0.2, 4).unwrap();

    let objectives: Vec<f64> = [KktSystem::Augmented, KktSystem::Normal, KktSystem::Full]
        .into_iter()
        .map(|system| {
            let settings = MehrotraSettings {
                kkt: KktSettings {
                    system,
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut it = sc.start.clone();
            let info = solve_mehrotra(&ctx, &sc.problem, &mut it, &settings).unwrap();
            assert_eq!(info.status, SolveStatus::Converged, "{}", system);
            info.primal_objective
        })
        .collect();

    for obj in &objectives[1..] {
        assert!((obj - objectives[0]).abs() <= 1e-6 * (1.0 + objectives[0].abs()));
    }
}

#[test]
fn test_dense_storage_matches_sparse() {
    let ctx = Context::init();
    let sc = generators::random_feasible(8, 16, 0.3, 6).unwrap();
    let p = &sc.problem;

    let to_dense = |a: &qp_core::SparseCsc| {
        DMatrix::from_fn(a.rows(), a.cols(), |i, j| a.get(i, j).copied().unwrap_or(0.0))
    };
    let dense = QpProblem::new(to_dense(&p.Q), to_dense(&p.A), p.b.clone(), p.c.clone());

    let mut it_sparse = sc.start.clone();
    let sparse_info = solve_mehrotra(&ctx, p, &mut it_sparse, &MehrotraSettings::default()).unwrap();
    let mut it_dense = sc.start.clone();
    let dense_info =
        solve_mehrotra(&ctx, &dense, &mut it_dense, &MehrotraSettings::default()).unwrap();

    assert_eq!(dense_info.status, SolveStatus::Converged);
    let scale = 1.0 + sparse_info.primal_objective.abs();
    assert!((dense_info.primal_objective - sparse_info.primal_objective).abs() <= 1e-7 * scale);
}

#[test]
fn test_random_dense_hessians() {
    let ctx = Context::init();
    let mut rng = ChaCha8Rng::seed_from_u64(2024);

    for _ in 0..5 {
        let (m, n) = (3, 8);
        // Q = BᵗB is PSD and fully coupled
        let b_mat: Vec<Vec<f64>> = (0..4)
            .map(|_| (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect())
            .collect();
        let mut q = Vec::new();
        for i in 0..n {
            for j in 0..n {
                let v: f64 = b_mat.iter().map(|row| row[i] * row[j]).sum();
                q.push((i, j, v));
            }
        }
        let mut a = Vec::new();
        for i in 0..m {
            a.push((i, i, 3.0));
            for j in m..n {
                a.push((i, j, rng.gen_range(-1.0..1.0)));
            }
        }
        let a = sparse::from_triplets(m, n, a);
        let x_gen: Vec<f64> = (0..n).map(|_| rng.gen_range(0.5..1.5)).collect();
        let mut b = vec![0.0; m];
        sparse::spmv(&a, &x_gen, &mut b, 1.0, 0.0);
        let c: Vec<f64> = (0..n).map(|_| rng.gen_range(0.1..1.0)).collect();
        let problem = QpProblem::new(sparse::from_triplets(n, n, q), a, b, c);

        let mut objectives = Vec::new();
        for approach in [Approach::Mehrotra, Approach::Ipf] {
            let (x, info) =
                qp_core::solve_primal(&ctx, &problem, &settings_for(approach)).unwrap();
            assert_eq!(info.status, SolveStatus::Converged, "{}", approach);
            assert!(x.iter().all(|&v| v > 0.0));
            objectives.push(info.primal_objective);
        }
        assert!((objectives[0] - objectives[1]).abs() <= 1e-6 * (1.0 + objectives[0].abs()));
    }
}
