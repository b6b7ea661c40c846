//! Command-line parsing for the FET parameter extractor.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the detection/fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{DetectorConfig, PickTolerance};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "fetx",
    version,
    about = "Extract field-effect mobility and threshold voltage from transfer sweeps"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze every `Run*` sheet of a workbook (interactive chart by default).
    Analyze(AnalyzeArgs),
    /// Write a synthetic workbook for trying the tool.
    Demo(DemoArgs),
}

/// Device geometry flags. Missing values fall back to `FET_*` environment
/// variables (a `.env` file is honored), then to prompts.
#[derive(Debug, Args, Clone, Default)]
pub struct GeometryArgs {
    /// Channel length.
    #[arg(long)]
    pub length: Option<f64>,

    /// Channel width.
    #[arg(long)]
    pub width: Option<f64>,

    /// Gate capacitance per unit area (F/cm²). Overrides the dielectric flags.
    #[arg(long)]
    pub capacitance: Option<f64>,

    /// Relative dielectric constant of the gate insulator.
    #[arg(long)]
    pub dielectric_constant: Option<f64>,

    /// Gate insulator thickness (cm).
    #[arg(long)]
    pub dielectric_thickness: Option<f64>,
}

#[derive(Debug, Parser, Clone)]
pub struct AnalyzeArgs {
    /// Workbook: a spreadsheet (.xls/.xlsx/.ods), a directory of CSV sheets
    /// or a single CSV file.
    /// Prompted for when omitted.
    pub workbook: Option<PathBuf>,

    #[command(flatten)]
    pub geometry: GeometryArgs,

    /// Only sheets whose name starts with this prefix are analyzed.
    #[arg(long, default_value = "Run")]
    pub prefix: String,

    /// Zero-based column holding the drain current.
    #[arg(long, default_value_t = 0)]
    pub current_column: usize,

    /// Zero-based column holding the gate voltage.
    #[arg(long, default_value_t = 4)]
    pub voltage_column: usize,

    /// Smallest window (points) scored by region detection.
    #[arg(long, default_value_t = DetectorConfig::default().min_window)]
    pub min_window: usize,

    /// Hysteresis factor for region detection (>= 1).
    #[arg(long, default_value_t = DetectorConfig::default().hysteresis)]
    pub hysteresis: f64,

    /// Pick tolerance along the gate voltage axis (V).
    #[arg(long, default_value_t = PickTolerance::default().gate_voltage)]
    pub pick_tolerance: f64,

    /// Non-interactive: accept detected boundaries and print ASCII charts.
    #[arg(long)]
    pub batch: bool,

    /// Skip the ASCII chart in batch mode.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub plot_width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub plot_height: usize,

    /// Results table path (default: `<workbook>-results.csv`).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Also write a JSON report.
    #[arg(long = "export-json")]
    pub export_json: Option<PathBuf>,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Parser, Clone)]
pub struct DemoArgs {
    /// Directory to write `Run1.csv`, `Run2.csv`, ... into.
    pub dir: PathBuf,

    /// Number of runs.
    #[arg(short = 'n', long, default_value_t = 3)]
    pub runs: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

impl AnalyzeArgs {
    pub fn detector_config(&self) -> Result<DetectorConfig, String> {
        if self.min_window < 2 {
            return Err(format!("Invalid --min-window {} (must be >= 2).", self.min_window));
        }
        if !(self.hysteresis.is_finite() && self.hysteresis >= 1.0) {
            return Err(format!("Invalid --hysteresis {} (must be >= 1).", self.hysteresis));
        }
        Ok(DetectorConfig {
            min_window: self.min_window,
            hysteresis: self.hysteresis,
        })
    }

    pub fn pick_tolerance(&self) -> Result<PickTolerance, String> {
        if !(self.pick_tolerance.is_finite() && self.pick_tolerance > 0.0) {
            return Err(format!(
                "Invalid --pick-tolerance {} (must be > 0).",
                self.pick_tolerance
            ));
        }
        Ok(PickTolerance {
            gate_voltage: self.pick_tolerance,
            ..PickTolerance::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_batch_analyze() {
        let cli = Cli::parse_from([
            "fetx",
            "analyze",
            "runs",
            "--length",
            "0.005",
            "--width",
            "0.1",
            "--capacitance",
            "1.15e-8",
            "--batch",
        ]);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.workbook, Some(PathBuf::from("runs")));
        assert_eq!(args.geometry.length, Some(0.005));
        assert!(args.batch);
        assert_eq!(args.prefix, "Run");
        assert_eq!(args.detector_config().unwrap(), DetectorConfig::default());
    }

    #[test]
    fn rejects_bad_detector_flags() {
        let cli = Cli::parse_from(["fetx", "analyze", "--hysteresis", "0.5"]);
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert!(args.detector_config().is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
