//! Starting point computation.
//!
//! Follows the usual Mehrotra heuristic, using the KKT backend at D = I:
//!
//! ```text
//! [Q + I  Aᵗ] [x̂]   [0]        [Q + I  Aᵗ] [ŵ]   [−c]
//! [A      0 ] [·] = [b]        [A      0 ] [ŷ] = [ 0]      ẑ = −ŵ
//! ```
//!
//! then shifts x̂ and ẑ into the positive orthant.

use crate::context::{Communicator, Context};
use crate::error::{SolverError, SolverResult};
use crate::linalg::{Direction, KktBuilder};
use crate::problem::Iterate;
use crate::settings::InitSettings;

/// Overwrite the halves of `it` that `settings` marks as uninitialized.
pub fn initialize<C: Communicator>(
    ctx: &Context<C>,
    kkt: &mut KktBuilder,
    b: &[f64],
    c: &[f64],
    it: &mut Iterate,
    settings: &InitSettings,
) -> SolverResult<()> {
    if settings.primal_initialized && settings.dual_initialized {
        return Ok(());
    }
    let (m, n) = (b.len(), c.len());
    let ones = vec![1.0; n];
    let zeros_n = vec![0.0; n];
    let zeros_m = vec![0.0; m];

    kkt.factor(&ones, &ones)
        .map_err(|source| SolverError::SingularSystem { iteration: 0, source })?;
    let mut dir = Direction::zeros(m, n);

    let neg_b: Vec<f64> = b.iter().map(|v| -v).collect();
    let mut x_hat = if settings.primal_initialized {
        it.x.clone()
    } else {
        kkt.solve(&neg_b, &zeros_n, &zeros_n, &mut dir)?;
        dir.dx.clone()
    };

    let (y_hat, mut z_hat) = if settings.dual_initialized {
        (it.y.clone(), it.z.clone())
    } else {
        kkt.solve(&zeros_m, c, &zeros_n, &mut dir)?;
        (dir.dy.clone(), dir.dz.clone())
    };

    if !settings.primal_initialized {
        shift_positive(ctx, &mut x_hat);
    }
    if !settings.dual_initialized {
        shift_positive(ctx, &mut z_hat);
    }

    // Balance complementarity between the two halves
    let gap = ctx.dot(&x_hat, &z_hat);
    if !settings.primal_initialized {
        let z_sum = ctx.sum_scalar(z_hat.iter().sum());
        if gap > 0.0 && z_sum > 0.0 {
            let delta = 0.5 * gap / z_sum;
            x_hat.iter_mut().for_each(|v| *v += delta);
        }
    }
    if !settings.dual_initialized {
        let x_sum = ctx.sum_scalar(x_hat.iter().sum());
        if gap > 0.0 && x_sum > 0.0 {
            let delta = 0.5 * gap / x_sum;
            z_hat.iter_mut().for_each(|v| *v += delta);
        }
    }

    if !settings.primal_initialized {
        ensure_interior(&mut x_hat);
        it.x = x_hat;
    }
    if !settings.dual_initialized {
        ensure_interior(&mut z_hat);
        it.y = y_hat;
        it.z = z_hat;
    }
    log::debug!(
        "starting point: min x {:.3e}, min z {:.3e}",
        ctx.min(&it.x),
        ctx.min(&it.z)
    );
    Ok(())
}

/// v += max(−1.5 min v, 0)
fn shift_positive<C: Communicator>(ctx: &Context<C>, v: &mut [f64]) {
    let shift = (-1.5 * ctx.min(v)).max(0.0);
    if shift > 0.0 {
        v.iter_mut().for_each(|vi| *vi += shift);
    }
}

/// Replace entries the shifts could not lift above zero.
fn ensure_interior(v: &mut [f64]) {
    for vi in v.iter_mut() {
        if !(*vi > 0.0) || !vi.is_finite() {
            *vi = 1.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linalg::sparse;
    use crate::problem::QpProblem;
    use crate::settings::KktSettings;

    fn problem() -> QpProblem {
        // A = [1 1 1], b = 3, c = (1, 2, 3), Q = 0
        QpProblem::new(
            sparse::diagonal(&[0.0; 3]),
            sparse::from_triplets(1, 3, vec![(0, 0, 1.0), (0, 1, 1.0), (0, 2, 1.0)]),
            vec![3.0],
            vec![1.0, 2.0, 3.0],
        )
    }

    #[test]
    fn test_automatic_start_is_interior() {
        let ctx = Context::init();
        let prob = problem();
        let mut kkt = KktBuilder::new(&prob, &KktSettings::default()).unwrap();
        let mut it = Iterate::new(vec![0.0; 3], vec![0.0], vec![0.0; 3]);
        initialize(&ctx, &mut kkt, &prob.b, &prob.c, &mut it, &InitSettings::automatic()).unwrap();

        assert!(it.x.iter().all(|&v| v > 0.0));
        assert!(it.z.iter().all(|&v| v > 0.0));
        // x̂ is the least-norm solution (1, 1, 1) before shifting, so A x stays close to b
        let ax: f64 = it.x.iter().sum();
        assert!(ax >= 3.0);
    }

    #[test]
    fn test_keeps_caller_halves() {
        let ctx = Context::init();
        let prob = problem();
        let mut kkt = KktBuilder::new(&prob, &KktSettings::default()).unwrap();
        let mut it = Iterate::new(vec![0.5, 0.5, 2.0], vec![7.0], vec![0.0; 3]);
        let settings = InitSettings {
            primal_initialized: true,
            dual_initialized: false,
        };
        initialize(&ctx, &mut kkt, &prob.b, &prob.c, &mut it, &settings).unwrap();
        assert_eq!(it.x, vec![0.5, 0.5, 2.0]);
        assert_ne!(it.y, vec![7.0]);
        assert!(it.z.iter().all(|&v| v > 0.0));
    }

    #[test]
    fn test_noop_when_initialized() {
        let ctx = Context::init();
        let prob = problem();
        let mut kkt = KktBuilder::new(&prob, &KktSettings::default()).unwrap();
        let mut it = Iterate::ones(1, 3);
        initialize(&ctx, &mut kkt, &prob.b, &prob.c, &mut it, &InitSettings::default()).unwrap();
        assert_eq!(it, Iterate::ones(1, 3));
        assert_eq!(kkt.factorizations(), 0);
    }
}
