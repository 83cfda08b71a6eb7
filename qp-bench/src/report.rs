//! JSON benchmark reports.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use qp_core::SolveInfo;
use serde::{Deserialize, Serialize};

/// One driver run on the scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Driver name ("Mehrotra" or "IPF")
    pub driver: String,
    /// "Converged", "MaxIterations" or "Failed"
    pub status: String,
    /// Wall time in seconds
    pub total_time: f64,
    /// Present unless the run failed
    pub metrics: Option<RunMetrics>,
    /// Error message for failed runs
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub iterations: usize,
    pub primal_objective: f64,
    pub dual_objective: f64,
    pub primal_infeasibility: f64,
    pub dual_infeasibility: f64,
    pub duality_measure: f64,
    pub factorizations: usize,
    pub setup_time: f64,
    pub factor_time: f64,
    pub solve_time: f64,
}

impl RunReport {
    pub fn from_info(driver: &str, info: &SolveInfo) -> Self {
        Self {
            driver: driver.to_string(),
            status: info.status.to_string(),
            total_time: info.timings.total,
            metrics: Some(RunMetrics {
                iterations: info.iterations,
                primal_objective: info.primal_objective,
                dual_objective: info.dual_objective,
                primal_infeasibility: info.primal_infeasibility,
                dual_infeasibility: info.dual_infeasibility,
                duality_measure: info.duality_measure,
                factorizations: info.factorizations,
                setup_time: info.timings.setup,
                factor_time: info.timings.factor,
                solve_time: info.timings.solve,
            }),
            error: None,
        }
    }

    pub fn failed(driver: &str, elapsed: f64, error: String) -> Self {
        Self {
            driver: driver.to_string(),
            status: "Failed".to_string(),
            total_time: elapsed,
            metrics: None,
            error: Some(error),
        }
    }
}

/// Scenario parameters plus every run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub m: usize,
    pub n: usize,
    pub seed: u64,
    /// KKT backend name
    pub kkt: String,
    pub nnz_a: usize,
    pub runs: Vec<RunReport>,
}

impl BenchReport {
    /// Save to JSON file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create file {}", path.as_ref().display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Failed to write JSON to {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Load from JSON file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("Failed to open file {}", path.as_ref().display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse JSON from {}", path.as_ref().display()))
    }
}
