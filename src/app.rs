//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - resolves device geometry once per session
//! - walks the runs of each workbook (interactive or batch)
//! - prints summaries and writes the results table

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{AnalyzeArgs, Command, DemoArgs};
use crate::domain::RunSummary;
use crate::error::AppError;
use crate::fit::SelectionController;
use crate::io::export::{AnalysisReport, results_path, write_report_json, write_results_csv};
use crate::io::ingest::{ColumnLayout, Workbook};

pub mod geometry;
pub mod pipeline;

use pipeline::AnalysisSettings;

/// Entry point for the `fetx` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Analyze(args) => handle_analyze(args),
        Command::Demo(args) => handle_demo(args),
    }
}

fn handle_analyze(args: AnalyzeArgs) -> Result<(), AppError> {
    init_logging(args.log_file.as_deref(), !args.batch)?;

    let detector = args.detector_config().map_err(|msg| AppError::new(2, msg))?;
    let tolerance = args.pick_tolerance().map_err(|msg| AppError::new(2, msg))?;
    let geometry = geometry::resolve_geometry(&args.geometry)?;

    let settings = AnalysisSettings {
        geometry,
        detector,
        layout: ColumnLayout {
            drain_current: args.current_column,
            gate_voltage: args.voltage_column,
        },
        sheet_prefix: args.prefix.clone(),
    };
    let controller = SelectionController::new(tolerance);

    // With a path: one workbook. Without: keep asking until the user quits.
    if let Some(path) = &args.workbook {
        return analyze_workbook(path, &args, &settings, controller);
    }

    while let Some(path) = crate::cli::picker::prompt_for_workbook(&settings.sheet_prefix)? {
        if let Err(err) = analyze_workbook(&path, &args, &settings, controller) {
            eprintln!("{err}");
        }
    }
    Ok(())
}

fn analyze_workbook(
    path: &Path,
    args: &AnalyzeArgs,
    settings: &AnalysisSettings,
    controller: SelectionController,
) -> Result<(), AppError> {
    let workbook = Workbook::open(path)?;
    let run_count = workbook.runs(&settings.sheet_prefix).count();
    if run_count == 0 {
        return Err(AppError::new(
            3,
            format!(
                "No sheets starting with '{}' in '{}'.",
                settings.sheet_prefix,
                path.display()
            ),
        ));
    }
    info!(workbook = %path.display(), runs = run_count, "analyzing workbook");

    println!(
        "{}",
        crate::report::format_session_header(&path.display().to_string(), &settings.geometry, run_count)
    );

    let summaries = if args.batch {
        run_batch(&workbook, args, settings)?
    } else {
        let summaries = crate::tui::run(&workbook, settings, controller)?;
        for summary in &summaries {
            println!("{}", crate::report::format_run_summary(summary));
        }
        summaries
    };

    println!("{}", crate::report::format_results_table(&summaries));

    let output = args.output.clone().unwrap_or_else(|| results_path(path));
    write_results_csv(&output, &summaries)?;
    println!("Results saved to {}", output.display());

    if let Some(json_path) = &args.export_json {
        let report = AnalysisReport::new(path, settings.geometry, settings.detector, &summaries);
        write_report_json(json_path, &report)?;
        println!("Report saved to {}", json_path.display());
    }

    if summaries.iter().all(|s| s.fit.is_none()) {
        warn!(workbook = %path.display(), "no run produced a fit");
    }
    Ok(())
}

/// Accept the detected boundaries of every run and print them.
fn run_batch(
    workbook: &Workbook,
    args: &AnalyzeArgs,
    settings: &AnalysisSettings,
) -> Result<Vec<RunSummary>, AppError> {
    let mut summaries = Vec::new();
    for prepared in pipeline::prepare_workbook(workbook, settings)? {
        let summary = prepared.summary();
        println!("{}", crate::report::format_run_summary(&summary));

        if let Ok(session) = &prepared.session {
            if !args.no_plot {
                let plot = crate::plot::render_ascii_plot(
                    session.series(),
                    Some(session.selection()),
                    session.fit().result().map(|f| f.as_ref()),
                    args.plot_width,
                    args.plot_height,
                );
                println!("{plot}");
            }
            println!("{}\n", crate::report::format_fit_state(session.fit()));
        }

        summaries.push(summary);
    }
    Ok(summaries)
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    init_logging(None, false)?;
    let paths = crate::data::write_demo_workbook(&args.dir, args.runs, args.seed)?;
    for path in &paths {
        println!("wrote {}", path.display());
    }
    println!(
        "Try: fetx analyze {} --length 0.005 --width 0.1 --capacitance 1.15e-8",
        args.dir.display()
    );
    Ok(())
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set. Otherwise interactive sessions log nothing
/// (stderr would corrupt the alternate screen) unless a log file is given,
/// and batch runs log warnings.
fn init_logging(log_file: Option<&Path>, interactive: bool) -> Result<(), AppError> {
    let default_level = match (interactive, log_file.is_some()) {
        (_, true) => "info",
        (true, false) => "off",
        (false, false) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|e| {
                AppError::new(2, format!("Failed to create log file '{}': {e}", path.display()))
            })?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .try_init();
        }
    }
    Ok(())
}
