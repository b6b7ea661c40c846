//! Shared per-run pipeline used by both batch mode and the TUI.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! sheet -> ingest (truncating) -> detect -> fit -> session
//!
//! The front-ends then only differ in how picks arrive and how results are shown.

use std::path::PathBuf;

use tracing::{info, warn};

use crate::domain::{DetectorConfig, DeviceGeometry, RunSummary};
use crate::error::AnalysisError;
use crate::fit::Session;
use crate::io::ingest::{ColumnLayout, DEFAULT_SHEET_PREFIX, IngestedRun, Sheet, Workbook, read_sheet};

/// Everything a run needs besides its data.
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub geometry: DeviceGeometry,
    pub detector: DetectorConfig,
    pub layout: ColumnLayout,
    pub sheet_prefix: String,
}

impl AnalysisSettings {
    pub fn new(geometry: DeviceGeometry) -> Self {
        Self {
            geometry,
            detector: DetectorConfig::default(),
            layout: ColumnLayout::default(),
            sheet_prefix: DEFAULT_SHEET_PREFIX.to_string(),
        }
    }
}

/// One ingested run and its session (or the reason there is none).
#[derive(Debug)]
pub struct PreparedRun {
    pub name: String,
    pub source: Option<PathBuf>,
    pub rows_read: usize,
    pub row_errors: Vec<AnalysisError>,
    pub truncated_at: Option<usize>,
    pub session: Result<Session, AnalysisError>,
}

impl PreparedRun {
    pub fn session_mut(&mut self) -> Option<&mut Session> {
        self.session.as_mut().ok()
    }

    pub fn summary(&self) -> RunSummary {
        match &self.session {
            Ok(session) => session.summary(self.row_errors.len()),
            Err(err) => RunSummary {
                run: self.name.clone(),
                points: 0,
                skipped_rows: self.row_errors.len(),
                selection: None,
                fit: None,
                fit_error: Some(err.to_string()),
                low_confidence: false,
            },
        }
    }
}

/// Read one sheet and start its session.
///
/// Only an unreadable sheet is an error; data problems end up in
/// `PreparedRun::session`.
pub fn prepare_sheet(sheet: &Sheet, settings: &AnalysisSettings) -> Result<PreparedRun, AnalysisError> {
    let ingested = read_sheet(sheet, &settings.layout)?;
    let mut run = prepare_ingested(ingested, settings);
    run.source = Some(sheet.path.clone());
    Ok(run)
}

/// Start a session over already ingested data.
pub fn prepare_ingested(ingested: IngestedRun, settings: &AnalysisSettings) -> PreparedRun {
    let IngestedRun {
        name,
        series,
        row_errors,
        rows_read,
        truncated_at,
    } = ingested;

    for err in &row_errors {
        warn!(run = %name, "skipped row: {err}");
    }

    let points = series.len();
    let session = Session::start(name.clone(), series, settings.geometry.multiplier(), &settings.detector);
    match &session {
        Ok(s) => info!(
            run = %name,
            points,
            skipped = row_errors.len(),
            high = s.selection().high,
            low = s.selection().low,
            low_confidence = s.low_confidence(),
            "run prepared"
        ),
        Err(err) => warn!(run = %name, "no session: {err}"),
    }

    PreparedRun {
        name,
        source: None,
        rows_read,
        row_errors,
        truncated_at,
        session,
    }
}

/// Sheets of `workbook` that are measurement runs, in name order.
pub fn run_sheets<'a>(workbook: &'a Workbook, settings: &'a AnalysisSettings) -> Vec<&'a Sheet> {
    workbook.runs(&settings.sheet_prefix).collect()
}

/// Prepare every run of a workbook, one after another.
pub fn prepare_workbook(
    workbook: &Workbook,
    settings: &AnalysisSettings,
) -> Result<Vec<PreparedRun>, AnalysisError> {
    run_sheets(workbook, settings)
        .into_iter()
        .map(|sheet| prepare_sheet(sheet, settings))
        .collect()
}
