//! Step lengths and centrality measures.
//!
//! The positivity bound for a vector v moving along dv is
//! `min { −vᵢ/dvᵢ : dvᵢ < 0 }`; with no negative entry the direction never
//! leaves the orthant and the bound is unconstrained.

use crate::context::{Communicator, Context};
use crate::linalg::{vector, Direction};
use crate::problem::Iterate;

/// Largest α with v + α dv ≥ 0, `+inf` when no entry of dv is negative.
pub fn max_step_length<C: Communicator>(ctx: &Context<C>, v: &[f64], dv: &[f64]) -> f64 {
    let local = v
        .iter()
        .zip(dv)
        .filter(|&(_, &dvi)| dvi < 0.0)
        .map(|(&vi, &dvi)| -vi / dvi)
        .fold(f64::INFINITY, f64::min);
    ctx.min_scalar(local)
}

/// Positivity bounds for x and z, each capped at 1.
pub fn max_step_pair<C: Communicator>(ctx: &Context<C>, it: &Iterate, dir: &Direction) -> (f64, f64) {
    (
        max_step_length(ctx, &it.x, &dir.dx).min(1.0),
        max_step_length(ctx, &it.z, &dir.dz).min(1.0),
    )
}

/// Common primal-dual step `min(αx, αz) · ratio`, clipped to [0, 1].
///
/// An unconstrained bound counts as 1.
pub fn step_length<C: Communicator>(
    ctx: &Context<C>,
    it: &Iterate,
    dir: &Direction,
    max_step_ratio: f64,
) -> f64 {
    let (ax, az) = max_step_pair(ctx, it, dir);
    clip_unit(ax.min(az) * max_step_ratio)
}

pub fn clip_unit(alpha: f64) -> f64 {
    if alpha.is_nan() {
        0.0
    } else {
        alpha.clamp(0.0, 1.0)
    }
}

/// (x + α dx)ᵗ(z + α dz) / n
pub fn shifted_gap<C: Communicator>(
    ctx: &Context<C>,
    it: &Iterate,
    dir: &Direction,
    alpha: f64,
    n: f64,
) -> f64 {
    let local: f64 = it
        .x
        .iter()
        .zip(&dir.dx)
        .zip(it.z.iter().zip(&dir.dz))
        .map(|((xi, dxi), (zi, dzi))| (xi + alpha * dxi) * (zi + alpha * dzi))
        .sum();
    ctx.sum_scalar(local) / n
}

/// Smallest (xᵢ + α dxᵢ)(zᵢ + α dzᵢ).
pub fn shifted_min_product<C: Communicator>(
    ctx: &Context<C>,
    it: &Iterate,
    dir: &Direction,
    alpha: f64,
) -> f64 {
    let local = it
        .x
        .iter()
        .zip(&dir.dx)
        .zip(it.z.iter().zip(&dir.dz))
        .map(|((xi, dxi), (zi, dzi))| (xi + alpha * dxi) * (zi + alpha * dzi))
        .fold(f64::INFINITY, f64::min);
    ctx.min_scalar(local)
}

/// Mehrotra centering σ = (gap_aff / μ)³, clamped to [0, 1].
pub fn mehrotra_sigma(mu_aff: f64, mu: f64) -> f64 {
    if mu <= 0.0 || !mu_aff.is_finite() {
        return 0.0;
    }
    (mu_aff / mu).powi(3).clamp(0.0, 1.0)
}

/// it += α dir
pub fn take_step(it: &mut Iterate, dir: &Direction, alpha: f64) {
    vector::axpy(alpha, &dir.dx, &mut it.x);
    vector::axpy(alpha, &dir.dy, &mut it.y);
    vector::axpy(alpha, &dir.dz, &mut it.z);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::init()
    }

    #[test]
    fn test_half_step_bound() {
        // x_k = 1, dx_k = −2 → bound 0.5
        let ctx = ctx();
        assert_eq!(max_step_length(&ctx, &[1.0, 3.0], &[-2.0, 1.0]), 0.5);
    }

    #[test]
    fn test_unconstrained_bound() {
        let ctx = ctx();
        assert_eq!(max_step_length(&ctx, &[1.0, 1.0], &[0.0, 5.0]), f64::INFINITY);

        let it = Iterate::new(vec![1.0], vec![], vec![1.0]);
        let dir = Direction {
            dx: vec![1.0],
            dy: vec![],
            dz: vec![0.0],
        };
        assert_eq!(step_length(&ctx, &it, &dir, 0.99), 0.99);
        assert_eq!(step_length(&ctx, &it, &dir, 1.0), 1.0);
    }

    #[test]
    fn test_step_length_takes_smaller_bound() {
        let ctx = ctx();
        let it = Iterate::new(vec![1.0, 2.0], vec![0.0], vec![1.0, 1.0]);
        let dir = Direction {
            dx: vec![-2.0, 0.0],
            dy: vec![3.0],
            dz: vec![0.0, -4.0],
        };
        // αx = 0.5, αz = 0.25
        assert_eq!(step_length(&ctx, &it, &dir, 1.0), 0.25);
        assert!((step_length(&ctx, &it, &dir, 0.9) - 0.225).abs() < 1e-15);

        let mut next = it.clone();
        take_step(&mut next, &dir, 0.25);
        assert_eq!(next.x, vec![0.5, 2.0]);
        assert_eq!(next.y, vec![0.75]);
        assert_eq!(next.z, vec![1.0, 0.0]);
    }

    #[test]
    fn test_gap_measures() {
        let ctx = ctx();
        let it = Iterate::new(vec![1.0, 2.0], vec![], vec![2.0, 1.0]);
        let dir = Direction {
            dx: vec![-1.0, 0.0],
            dy: vec![],
            dz: vec![0.0, -1.0],
        };
        assert_eq!(shifted_gap(&ctx, &it, &dir, 0.0, 2.0), 2.0);
        // (0.5)(2) + (2)(0.5) over 2
        assert_eq!(shifted_gap(&ctx, &it, &dir, 0.5, 2.0), 1.0);
        assert_eq!(shifted_min_product(&ctx, &it, &dir, 0.5), 1.0);
    }

    #[test]
    fn test_mehrotra_sigma() {
        assert_eq!(mehrotra_sigma(0.5, 1.0), 0.125);
        assert_eq!(mehrotra_sigma(2.0, 1.0), 1.0);
        assert_eq!(mehrotra_sigma(-1.0, 1.0), 0.0);
        assert_eq!(mehrotra_sigma(0.5, 0.0), 0.0);
        assert_eq!(clip_unit(f64::NAN), 0.0);
    }
}
