use clap::ValueEnum;
use qp_core::{
    solve_ipf_with_observer, solve_mehrotra_with_observer, Context, IpfSettings, Iterate,
    KktSettings, KktSystem, MehrotraSettings, ProgressObserver, QpProblem, SolveInfo,
    SolverResult,
};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApproachChoice {
    /// Mehrotra first, then IPF from the same start
    Both,
    Mehrotra,
    Ipf,
}

impl ApproachChoice {
    pub fn drivers(self) -> &'static [Driver] {
        match self {
            ApproachChoice::Both => &[Driver::Mehrotra, Driver::Ipf],
            ApproachChoice::Mehrotra => &[Driver::Mehrotra],
            ApproachChoice::Ipf => &[Driver::Ipf],
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum KktChoice {
    Augmented,
    Normal,
    Full,
}

impl From<KktChoice> for KktSystem {
    fn from(choice: KktChoice) -> Self {
        match choice {
            KktChoice::Augmented => KktSystem::Augmented,
            KktChoice::Normal => KktSystem::Normal,
            KktChoice::Full => KktSystem::Full,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Driver {
    Mehrotra,
    Ipf,
}

impl Driver {
    pub fn name(self) -> &'static str {
        match self {
            Driver::Mehrotra => "Mehrotra",
            Driver::Ipf => "IPF",
        }
    }
}

/// Overrides applied on top of each driver's defaults.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub kkt: Option<KktSystem>,
    pub tol: Option<f64>,
    pub max_its: Option<usize>,
}

impl Overrides {
    fn kkt(&self, base: KktSettings) -> KktSettings {
        match self.kkt {
            Some(system) => KktSettings { system, ..base },
            None => base,
        }
    }
}

pub fn solve_with_driver<O: ProgressObserver>(
    ctx: &Context,
    problem: &QpProblem,
    iterate: &mut Iterate,
    driver: Driver,
    overrides: &Overrides,
    observer: &mut O,
) -> SolverResult<SolveInfo> {
    match driver {
        Driver::Mehrotra => {
            let base = MehrotraSettings::default();
            let settings = MehrotraSettings {
                tol: overrides.tol.unwrap_or(base.tol),
                max_its: overrides.max_its.unwrap_or(base.max_its),
                kkt: overrides.kkt(base.kkt.clone()),
                ..base
            };
            solve_mehrotra_with_observer(ctx, problem, iterate, &settings, observer)
        }
        Driver::Ipf => {
            let base = IpfSettings::default();
            let settings = IpfSettings {
                tol: overrides.tol.unwrap_or(base.tol),
                max_its: overrides.max_its.unwrap_or(base.max_its),
                kkt: overrides.kkt(base.kkt.clone()),
                ..base
            };
            solve_ipf_with_observer(ctx, problem, iterate, &settings, observer)
        }
    }
}
