//! Termination criteria.
//!
//! An iterate is accepted when
//!
//! ```text
//! ‖Ax − b‖            ≤ tol (1 + ‖b‖)
//! ‖Qx + Aᵗy − z + c‖  ≤ tol (1 + ‖c‖)
//! xᵗz                 ≤ tol
//! ```
//!
//! The infeasibilities are relative to the data. Complementarity is
//! absolute, so a converged iterate always has `xᵗz ≤ tol` and a duality
//! measure `xᵗz/n ≤ tol/n`.

use super::residuals::{Measures, ProblemNorms};

/// Outcome of a convergence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceCheck {
    Continue,
    Converged,
}

/// Pure convergence test on the measures of one iterate.
pub fn check_convergence(measures: &Measures, norms: &ProblemNorms, tol: f64) -> ConvergenceCheck {
    let primal_ok = measures.rb_norm <= tol * (1.0 + norms.b_norm);
    let dual_ok = measures.rc_norm <= tol * (1.0 + norms.c_norm);
    let gap_ok = measures.complementarity <= tol;

    if primal_ok && dual_ok && gap_ok {
        ConvergenceCheck::Converged
    } else {
        ConvergenceCheck::Continue
    }
}

/// True once `iter` completed iterations use up the budget.
pub fn has_exceeded_budget(iter: usize, max_its: usize) -> bool {
    iter >= max_its
}
