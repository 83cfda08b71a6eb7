//! Solver settings.
//!
//! Every driver takes an immutable settings struct. `Default` impls read a
//! few `QPDIRECT_*` environment variables so a run can be tuned without
//! recompiling:
//!
//! - `QPDIRECT_KKT` = `augmented` | `normal` | `full`
//! - `QPDIRECT_ORDERING` = `camd` | `natural` (augmented system only)
//! - `QPDIRECT_REFINE_ITERS` = iterative refinement steps per KKT solve
//! - `QPDIRECT_PROGRESS` = `1` to log one line per iteration

use crate::error::{SolverError, SolverResult};
use std::fmt;
use std::str::FromStr;

/// Which linear system is factored each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KktSystem {
    /// Sparse quasi-definite LDL^T on the (n+m) augmented system.
    #[default]
    Augmented,
    /// Dense Cholesky on the m×m normal equations. Requires diagonal Q.
    Normal,
    /// Dense LU on the unreduced (2n+m) system. Small problems only.
    Full,
}

impl FromStr for KktSystem {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "augmented" | "aug" => Ok(KktSystem::Augmented),
            "normal" => Ok(KktSystem::Normal),
            "full" => Ok(KktSystem::Full),
            other => Err(SolverError::InvalidConfiguration(format!(
                "unknown KKT system '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for KktSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KktSystem::Augmented => write!(f, "augmented"),
            KktSystem::Normal => write!(f, "normal"),
            KktSystem::Full => write!(f, "full"),
        }
    }
}

/// Symmetric ordering of the augmented system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KktOrdering {
    /// x block, then y block, in index order.
    Natural,
    /// CAMD fill-reducing order with dense columns of A eliminated after y.
    #[default]
    Camd,
}

impl FromStr for KktOrdering {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "natural" => Ok(KktOrdering::Natural),
            "camd" => Ok(KktOrdering::Camd),
            other => Err(SolverError::InvalidConfiguration(format!(
                "unknown KKT ordering '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for KktOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KktOrdering::Natural => write!(f, "natural"),
            KktOrdering::Camd => write!(f, "camd"),
        }
    }
}

/// KKT factorization settings.
#[derive(Debug, Clone)]
pub struct KktSettings {
    pub system: KktSystem,

    pub ordering: KktOrdering,

    /// Added to the (1,1) block for the factorization only.
    pub primal_reg: f64,

    /// Subtracted from the (2,2) block for the factorization only.
    pub dual_reg: f64,

    /// Relative pivot threshold below which the system is declared singular.
    pub pivot_tol: f64,

    /// Iterative refinement steps against the unregularized system.
    pub refine_iters: usize,
}

impl Default for KktSettings {
    fn default() -> Self {
        let system = std::env::var("QPDIRECT_KKT")
            .ok()
            .and_then(|s| s.parse::<KktSystem>().ok())
            .unwrap_or_default();
        let ordering = std::env::var("QPDIRECT_ORDERING")
            .ok()
            .and_then(|s| s.parse::<KktOrdering>().ok())
            .unwrap_or_default();
        let refine_iters = std::env::var("QPDIRECT_REFINE_ITERS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(3);

        Self {
            system,
            ordering,
            primal_reg: 1e-8,
            dual_reg: 0.0,
            pivot_tol: 1e-12,
            refine_iters,
        }
    }
}

impl KktSettings {
    pub fn validate(&self) -> SolverResult<()> {
        if !(self.primal_reg >= 0.0 && self.primal_reg.is_finite()) {
            return Err(config(format!("primal_reg must be >= 0, got {}", self.primal_reg)));
        }
        if !(self.dual_reg >= 0.0 && self.dual_reg.is_finite()) {
            return Err(config(format!("dual_reg must be >= 0, got {}", self.dual_reg)));
        }
        if !(self.pivot_tol >= 0.0 && self.pivot_tol < 1.0) {
            return Err(config(format!("pivot_tol must lie in [0, 1), got {}", self.pivot_tol)));
        }
        Ok(())
    }
}

/// Backtracking line search for the IPF driver.
///
/// A trial step α is accepted when the new iterate stays in the wide
/// neighbourhood `x_i z_i ≥ γ μ`, its infeasibility relative to μ grows by at
/// most a factor `beta` over the starting ratio, and μ decreases by at least
/// `α/psi`.
#[derive(Debug, Clone)]
pub struct IpfLineSearchSettings {
    pub gamma: f64,
    pub beta: f64,
    pub psi: f64,
    /// Step shrink factor per rejected trial.
    pub backtrack_factor: f64,
    pub max_backtracks: usize,
    /// Log each rejected trial at debug level.
    pub progress: bool,
}

impl Default for IpfLineSearchSettings {
    fn default() -> Self {
        Self {
            gamma: 1e-3,
            beta: 2.0,
            psi: 100.0,
            backtrack_factor: 0.5,
            max_backtracks: 60,
            progress: false,
        }
    }
}

impl IpfLineSearchSettings {
    pub fn validate(&self) -> SolverResult<()> {
        if !(self.gamma > 0.0 && self.gamma < 1.0) {
            return Err(config(format!("gamma must lie in (0, 1), got {}", self.gamma)));
        }
        if !(self.beta >= 1.0) {
            return Err(config(format!("beta must be >= 1, got {}", self.beta)));
        }
        if !(self.psi >= 1.0) {
            return Err(config(format!("psi must be >= 1, got {}", self.psi)));
        }
        if !(self.backtrack_factor > 0.0 && self.backtrack_factor < 1.0) {
            return Err(config(format!(
                "backtrack_factor must lie in (0, 1), got {}",
                self.backtrack_factor
            )));
        }
        if self.max_backtracks == 0 {
            return Err(config("max_backtracks must be positive".to_string()));
        }
        Ok(())
    }
}

/// Starting point selection.
///
/// A `true` flag means the caller's values are used as given; `false` means
/// that half of the iterate is computed from the problem data.
#[derive(Debug, Clone)]
pub struct InitSettings {
    pub primal_initialized: bool,
    pub dual_initialized: bool,
}

impl Default for InitSettings {
    fn default() -> Self {
        Self {
            primal_initialized: true,
            dual_initialized: true,
        }
    }
}

impl InitSettings {
    /// Compute both halves of the starting point.
    pub fn automatic() -> Self {
        Self {
            primal_initialized: false,
            dual_initialized: false,
        }
    }
}

fn progress_from_env() -> bool {
    std::env::var("QPDIRECT_PROGRESS")
        .ok()
        .map(|s| s == "1" || s.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Settings for the infeasible path-following (IPF) driver.
#[derive(Debug, Clone)]
pub struct IpfSettings {
    /// Relative tolerance for infeasibility and duality measure.
    pub tol: f64,
    pub max_its: usize,
    /// Target μ multiplier: τ = centering · xᵗz/n.
    pub centering: f64,
    pub max_step_ratio: f64,
    /// `None` takes the plain ratio-test step.
    pub line_search: Option<IpfLineSearchSettings>,
    pub kkt: KktSettings,
    pub init: InitSettings,
    pub progress: bool,
    /// Warn when Q is visibly asymmetric.
    pub check_symmetry: bool,
}

impl Default for IpfSettings {
    fn default() -> Self {
        Self {
            tol: 1e-8,
            max_its: 1000,
            centering: 0.9,
            max_step_ratio: 0.99,
            line_search: Some(IpfLineSearchSettings::default()),
            kkt: KktSettings::default(),
            init: InitSettings::default(),
            progress: progress_from_env(),
            check_symmetry: false,
        }
    }
}

impl IpfSettings {
    pub fn validate(&self) -> SolverResult<()> {
        validate_common(self.tol, self.max_step_ratio)?;
        if !(self.centering > 0.0 && self.centering <= 1.0) {
            return Err(config(format!(
                "centering must lie in (0, 1], got {}",
                self.centering
            )));
        }
        if let Some(ls) = &self.line_search {
            ls.validate()?;
        }
        self.kkt.validate()
    }
}

/// Settings for the Mehrotra predictor-corrector driver.
#[derive(Debug, Clone)]
pub struct MehrotraSettings {
    pub tol: f64,
    pub max_its: usize,
    pub max_step_ratio: f64,
    pub kkt: KktSettings,
    pub init: InitSettings,
    pub progress: bool,
    pub check_symmetry: bool,
}

impl Default for MehrotraSettings {
    fn default() -> Self {
        Self {
            tol: 1e-8,
            max_its: 100,
            max_step_ratio: 0.99,
            kkt: KktSettings::default(),
            init: InitSettings::default(),
            progress: progress_from_env(),
            check_symmetry: false,
        }
    }
}

impl MehrotraSettings {
    pub fn validate(&self) -> SolverResult<()> {
        validate_common(self.tol, self.max_step_ratio)?;
        self.kkt.validate()
    }
}

/// Driver selection for [`solve`](crate::solve).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Approach {
    Ipf,
    #[default]
    Mehrotra,
}

impl fmt::Display for Approach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Approach::Ipf => write!(f, "IPF"),
            Approach::Mehrotra => write!(f, "Mehrotra"),
        }
    }
}

/// Top-level settings: approach plus per-driver settings.
#[derive(Debug, Clone, Default)]
pub struct QpSettings {
    pub approach: Approach,
    pub ipf: IpfSettings,
    pub mehrotra: MehrotraSettings,
}

fn validate_common(tol: f64, max_step_ratio: f64) -> SolverResult<()> {
    if !(tol > 0.0 && tol.is_finite()) {
        return Err(config(format!("tol must be positive, got {}", tol)));
    }
    if !(max_step_ratio > 0.0 && max_step_ratio <= 1.0) {
        return Err(config(format!(
            "max_step_ratio must lie in (0, 1], got {}",
            max_step_ratio
        )));
    }
    Ok(())
}

fn config(msg: String) -> SolverError {
    SolverError::InvalidConfiguration(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        IpfSettings::default().validate().unwrap();
        MehrotraSettings::default().validate().unwrap();

        let ipf = IpfSettings::default();
        assert_eq!(ipf.centering, 0.9);
        assert_eq!(ipf.max_step_ratio, 0.99);
        let ls = ipf.line_search.unwrap();
        assert_eq!((ls.gamma, ls.beta, ls.psi), (1e-3, 2.0, 100.0));
        assert_eq!(QpSettings::default().approach, Approach::Mehrotra);
    }

    #[test]
    fn test_invalid_settings() {
        let mut s = MehrotraSettings::default();
        s.max_step_ratio = 1.5;
        assert!(matches!(s.validate(), Err(SolverError::InvalidConfiguration(_))));

        let mut s = IpfSettings::default();
        s.centering = 0.0;
        assert!(s.validate().is_err());

        let mut s = IpfSettings::default();
        s.line_search = Some(IpfLineSearchSettings {
            psi: 0.5,
            ..Default::default()
        });
        assert!(s.validate().is_err());

        let mut s = IpfSettings::default();
        s.tol = f64::NAN;
        assert!(s.validate().is_err());
    }

    #[test]
    fn test_kkt_system_parse() {
        assert_eq!("Normal".parse::<KktSystem>().unwrap(), KktSystem::Normal);
        assert_eq!("aug".parse::<KktSystem>().unwrap(), KktSystem::Augmented);
        assert_eq!(KktSystem::Full.to_string(), "full");
        assert!("schur".parse::<KktSystem>().is_err());
    }

    #[test]
    fn test_kkt_ordering_parse() {
        assert_eq!("CAMD".parse::<KktOrdering>().unwrap(), KktOrdering::Camd);
        assert_eq!(KktOrdering::Natural.to_string(), "natural");
        assert!("metis".parse::<KktOrdering>().is_err());
    }
}
