//! Export run results.
//!
//! - results table CSV (`Run,Mobility,Threshold Voltage (Vth)`), one row per run
//! - optional JSON report with geometry, selections and fit details

use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::domain::{DetectorConfig, DeviceGeometry, RunSummary};
use crate::error::AppError;

/// Inserted before the extension of the results table file name.
pub const RESULTS_SUFFIX: &str = "-results";

pub const RESULTS_HEADER: [&str; 3] = ["Run", "Mobility", "Threshold Voltage (Vth)"];

/// Default results path: `-results` inserted before the extension.
///
/// `data.csv` → `data-results.csv`; a directory `runs` → `runs-results.csv`
/// next to it.
pub fn results_path(input: &Path) -> PathBuf {
    let stem = if input.is_dir() {
        input.file_name()
    } else {
        input.file_stem()
    };
    let mut name = stem.map(OsString::from).unwrap_or_else(|| OsString::from("workbook"));
    name.push(RESULTS_SUFFIX);
    name.push(".csv");

    match input.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// Write the results table.
pub fn write_results_csv(path: &Path, runs: &[RunSummary]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::new(4, format!("Failed to create results CSV '{}': {e}", path.display()))
    })?;

    writer
        .write_record(RESULTS_HEADER)
        .map_err(|e| AppError::new(4, format!("Failed to write results header: {e}")))?;

    for run in runs {
        let mobility = run.mobility().map(|v| v.to_string()).unwrap_or_default();
        let vth = run.threshold_voltage().map(|v| v.to_string()).unwrap_or_default();
        writer
            .write_record([run.run.as_str(), mobility.as_str(), vth.as_str()])
            .map_err(|e| AppError::new(4, format!("Failed to write results row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(4, format!("Failed to flush results CSV: {e}")))?;
    Ok(())
}

/// Read a results table back as `(run, mobility, vth)` rows.
pub fn read_results_csv(path: &Path) -> Result<Vec<(String, Option<f64>, Option<f64>)>, AppError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        AppError::new(2, format!("Failed to open results CSV '{}': {e}", path.display()))
    })?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| AppError::new(2, format!("Results CSV line {}: {e}", idx + 2)))?;
        let cell = |i: usize| -> Result<Option<f64>, AppError> {
            match record.get(i).map(str::trim) {
                None | Some("") => Ok(None),
                Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| {
                    AppError::new(2, format!("Results CSV line {}: invalid number '{raw}'.", idx + 2))
                }),
            }
        };
        let run = record.get(0).unwrap_or_default().to_string();
        rows.push((run, cell(1)?, cell(2)?));
    }
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport<'a> {
    pub tool: &'static str,
    pub generated_at: DateTime<Local>,
    pub workbook: &'a Path,
    pub geometry: DeviceGeometry,
    pub multiplier: f64,
    pub detector: DetectorConfig,
    pub runs: &'a [RunSummary],
}

impl<'a> AnalysisReport<'a> {
    pub fn new(
        workbook: &'a Path,
        geometry: DeviceGeometry,
        detector: DetectorConfig,
        runs: &'a [RunSummary],
    ) -> Self {
        Self {
            tool: "fetx",
            generated_at: Local::now(),
            workbook,
            geometry,
            multiplier: geometry.multiplier(),
            detector,
            runs,
        }
    }
}

/// Write a JSON report.
pub fn write_report_json(path: &Path, report: &AnalysisReport<'_>) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(4, format!("Failed to create report JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, report)
        .map_err(|e| AppError::new(4, format!("Failed to write report JSON: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitResult, Selection};

    fn summary(run: &str, fit: Option<(f64, f64)>) -> RunSummary {
        RunSummary {
            run: run.to_string(),
            points: 10,
            skipped_rows: 0,
            selection: Some(Selection { high: 0, low: 9 }),
            fit: fit.map(|(mobility, threshold_voltage)| FitResult {
                slope: 1.0,
                intercept: -threshold_voltage,
                threshold_voltage,
                mobility,
                coeff_x: 0.0,
                coeff_y: 0.0,
                const_c: 0.0,
                points: 10,
                r_squared: 1.0,
                line: [(0.0, 0.0), (1.0, 1.0)],
            }),
            fit_error: fit.is_none().then(|| "fit unavailable: slope is zero".to_string()),
            low_confidence: false,
        }
    }

    #[test]
    fn results_path_inserts_suffix() {
        assert_eq!(
            results_path(Path::new("data/sweep.csv")),
            PathBuf::from("data/sweep-results.csv")
        );
        assert_eq!(results_path(Path::new("sweep")), PathBuf::from("sweep-results.csv"));
    }

    #[test]
    fn results_path_for_directory() {
        let dir = tempfile::tempdir().unwrap();
        let runs = dir.path().join("runs");
        std::fs::create_dir(&runs).unwrap();
        assert_eq!(results_path(&runs), dir.path().join("runs-results.csv"));
    }

    #[test]
    fn results_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let runs = vec![summary("Run1", Some((0.42, 2.5))), summary("Run2", None)];
        write_results_csv(&path, &runs).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Run,Mobility,Threshold Voltage (Vth)\n"));

        let rows = read_results_csv(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ("Run1".to_string(), Some(0.42), Some(2.5)));
        assert_eq!(rows[1], ("Run2".to_string(), None, None));
    }

    #[test]
    fn report_json_contains_runs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let runs = vec![summary("Run1", Some((0.42, 2.5)))];
        let geometry = DeviceGeometry::new(1e-3, 1e-1, 1e-8).unwrap();
        let report = AnalysisReport::new(Path::new("wb"), geometry, DetectorConfig::default(), &runs);
        write_report_json(&path, &report).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["tool"], "fetx");
        assert_eq!(value["runs"][0]["run"], "Run1");
        assert_eq!(value["runs"][0]["fit"]["threshold_voltage"], 2.5);
    }
}
