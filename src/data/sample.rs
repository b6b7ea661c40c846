//! Synthetic transfer sweeps.
//!
//! The device follows the square-law saturation model:
//!
//! ```text
//! Id = k·(Vg - Vth)^2 + leakage     for Vg > Vth
//! Id = leakage                      otherwise
//! ```
//!
//! with multiplicative Gaussian noise on the channel current; the leakage
//! floor is constant. A sweep runs from `start`
//! down to `stop` and, optionally, back up again (the return tail that
//! ingestion truncates).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepSpec {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    pub threshold_voltage: f64,
    /// Square-law prefactor `k` (A/V²).
    pub k: f64,
    pub leakage: f64,
    /// Relative standard deviation of the channel current noise.
    pub noise: f64,
    pub return_sweep: bool,
}

impl Default for SweepSpec {
    fn default() -> Self {
        Self {
            start: 30.0,
            stop: -10.0,
            step: 0.5,
            threshold_voltage: 3.0,
            k: 2e-7,
            leakage: 1e-11,
            noise: 0.01,
            return_sweep: true,
        }
    }
}

/// `(gate_voltage, drain_current)` samples in sweep order.
pub fn generate_sweep(spec: &SweepSpec, seed: u64) -> Result<Vec<(f64, f64)>, AppError> {
    if !(spec.step.is_finite() && spec.step > 0.0) {
        return Err(AppError::new(2, "Sweep step must be > 0."));
    }
    if !(spec.start.is_finite() && spec.stop.is_finite() && spec.start > spec.stop) {
        return Err(AppError::new(2, "Sweep must run from a higher to a lower gate voltage."));
    }
    if !(spec.noise.is_finite() && spec.noise >= 0.0) {
        return Err(AppError::new(2, "Noise level must be >= 0."));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;

    let steps = ((spec.start - spec.stop) / spec.step).round() as usize;
    let mut voltages: Vec<f64> = (0..=steps).map(|i| spec.start - i as f64 * spec.step).collect();
    if spec.return_sweep {
        let back: Vec<f64> = voltages.iter().rev().skip(1).copied().collect();
        voltages.extend(back);
    }

    let samples = voltages
        .into_iter()
        .map(|vg| {
            let overdrive = (vg - spec.threshold_voltage).max(0.0);
            let z: f64 = normal.sample(&mut rng);
            let channel = spec.k * overdrive * overdrive * (1.0 + spec.noise * z).max(0.0);
            (vg, channel + spec.leakage)
        })
        .collect();

    Ok(samples)
}

/// Write `runs` sheets (`Run1.csv`, `Run2.csv`, ...) into `dir`.
///
/// Each sheet has five columns, drain current first and gate voltage last,
/// the layout `io::ingest` expects by default. Threshold voltage shifts a
/// little between runs.
pub fn write_demo_workbook(dir: &Path, runs: usize, seed: u64) -> Result<Vec<PathBuf>, AppError> {
    if runs == 0 {
        return Err(AppError::new(2, "Run count must be > 0."));
    }
    fs::create_dir_all(dir)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", dir.display())))?;

    let mut paths = Vec::with_capacity(runs);
    for run in 0..runs {
        let spec = SweepSpec {
            threshold_voltage: SweepSpec::default().threshold_voltage + 0.5 * run as f64,
            ..SweepSpec::default()
        };
        let samples = generate_sweep(&spec, seed.wrapping_add(run as u64))?;

        let path = dir.join(format!("Run{}.csv", run + 1));
        write_sheet(&path, &samples)?;
        paths.push(path);
    }

    Ok(paths)
}

fn write_sheet(path: &Path, samples: &[(f64, f64)]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", path.display())))?;
    let mut writer = csv::Writer::from_writer(file);
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write '{}': {e}", path.display()));

    writer
        .write_record(["Drain Current", "Gate Current", "Drain Voltage", "Source Voltage", "Gate Voltage"])
        .map_err(write_err)?;
    for &(vg, id) in samples {
        writer
            .write_record([
                format!("{id:e}"),
                "0".to_string(),
                "-40".to_string(),
                "0".to_string(),
                format!("{vg}"),
            ])
            .map_err(write_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| AppError::new(2, format!("Failed to flush '{}': {e}", path.display())))?
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush '{}': {e}", path.display())))?;
    Ok(())
}
