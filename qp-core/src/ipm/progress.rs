//! Per-iteration progress reporting.
//!
//! Drivers send one [`IterationReport`] per iterate (the starting point
//! included) and any [`NumericalWarning`] to a [`ProgressObserver`]. Any
//! `FnMut(ProgressEvent<'_>)` closure is an observer.

use std::fmt;

/// Snapshot of one iterate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationReport {
    /// Completed iterations when this iterate was reached
    pub iteration: usize,
    /// ‖Ax − b‖ / (1 + ‖b‖)
    pub primal_infeasibility: f64,
    /// ‖Qx + Aᵗy − z + c‖ / (1 + ‖c‖)
    pub dual_infeasibility: f64,
    /// xᵗz / n
    pub mu: f64,
    pub primal_objective: f64,
    pub dual_objective: f64,
    /// Step that produced this iterate (0 for the starting point)
    pub alpha: f64,
    /// Centering used for that step
    pub sigma: f64,
    pub min_x: f64,
    pub min_z: f64,
}

/// Recoverable numerical trouble worth surfacing.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericalWarning {
    /// The line search rejected every trial step.
    StepCollapse { iteration: usize, alpha: f64 },

    /// The duality measure grew across a step.
    NonMonotoneGap {
        iteration: usize,
        previous: f64,
        current: f64,
    },

    /// Q is not symmetric to working precision.
    AsymmetricQ { max_deviation: f64 },
}

impl fmt::Display for NumericalWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumericalWarning::StepCollapse { iteration, alpha } => write!(
                f,
                "iteration {}: line search exhausted, falling back to alpha = {:.3e}",
                iteration, alpha
            ),
            NumericalWarning::NonMonotoneGap {
                iteration,
                previous,
                current,
            } => write!(
                f,
                "iteration {}: duality measure rose from {:.3e} to {:.3e}",
                iteration, previous, current
            ),
            NumericalWarning::AsymmetricQ { max_deviation } => {
                write!(f, "Q is not symmetric (max |Qij - Qji| = {:.3e})", max_deviation)
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ProgressEvent<'a> {
    Iteration(&'a IterationReport),
    Warning(&'a NumericalWarning),
}

pub trait ProgressObserver {
    fn on_event(&mut self, event: ProgressEvent<'_>);
}

impl<F> ProgressObserver for F
where
    F: FnMut(ProgressEvent<'_>),
{
    fn on_event(&mut self, event: ProgressEvent<'_>) {
        self(event)
    }
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_event(&mut self, _event: ProgressEvent<'_>) {}
}

/// Routes events to the user observer and to the `log` facade.
pub(crate) struct Reporter<'o> {
    observer: &'o mut dyn ProgressObserver,
    driver: &'static str,
    log_iterations: bool,
}

impl<'o> Reporter<'o> {
    pub(crate) fn new(
        observer: &'o mut dyn ProgressObserver,
        driver: &'static str,
        log_iterations: bool,
    ) -> Self {
        if log_iterations {
            log::info!(
                "{:>8} {:>4} {:>12} {:>12} {:>10} {:>10} {:>14} {:>14} {:>8} {:>8}",
                "driver", "iter", "pobj", "dobj", "pinf", "dinf", "mu", "min(x,z)", "alpha", "sigma"
            );
        }
        Self {
            observer,
            driver,
            log_iterations,
        }
    }

    pub(crate) fn iteration(&mut self, report: &IterationReport) {
        if self.log_iterations {
            log::info!(
                "{:>8} {:>4} {:>12.4e} {:>12.4e} {:>10.2e} {:>10.2e} {:>14.6e} {:>14.6e} {:>8.4} {:>8.4}",
                self.driver,
                report.iteration,
                report.primal_objective,
                report.dual_objective,
                report.primal_infeasibility,
                report.dual_infeasibility,
                report.mu,
                report.min_x.min(report.min_z),
                report.alpha,
                report.sigma
            );
        }
        self.observer.on_event(ProgressEvent::Iteration(report));
    }

    pub(crate) fn warning(&mut self, warning: NumericalWarning) {
        log::warn!("{}: {}", self.driver, warning);
        self.observer.on_event(ProgressEvent::Warning(&warning));
    }
}
