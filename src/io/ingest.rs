//! Workbook discovery and series ingestion.
//!
//! A *workbook* is one of:
//! - a spreadsheet file (`.xls`, `.xlsx`, `.xlsm`, `.ods`) with named sheets
//! - a directory of CSV files (one sheet per file, named after the file stem)
//! - a single CSV file (one sheet)
//!
//! Only sheets whose name starts with the configured prefix are treated as
//! measurement runs.
//!
//! Row handling:
//! - the first row of every sheet is a header and is skipped
//! - a row whose drain current or gate voltage is missing or not a finite
//!   number is recorded as a parse error and skipped
//! - ingestion stops at the first row whose gate voltage does not decrease
//!   (the sweep turned around); that is the normal end of useful data

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use calamine::{Data, Range, Reader, open_workbook_auto};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{MeasurementPoint, PushOutcome, Series};
use crate::error::AnalysisError;
use crate::io::export::RESULTS_SUFFIX;

/// Default prefix of measurement sheet names.
pub const DEFAULT_SHEET_PREFIX: &str = "Run";

/// Column positions (0-based) of the two values we read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub drain_current: usize,
    pub gate_voltage: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            drain_current: 0,
            gate_voltage: 4,
        }
    }
}

/// Extensions opened as spreadsheet workbooks.
pub const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xls", "xlsx", "xlsm", "ods"];

/// Where a sheet's rows live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetSource {
    /// `path` is the CSV file itself.
    Csv,
    /// `path` is the spreadsheet file; `name` selects the worksheet.
    Spreadsheet,
}

/// One sheet of a workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub path: PathBuf,
    pub source: SheetSource,
}

/// A set of sheets, sorted by name.
#[derive(Debug, Clone)]
pub struct Workbook {
    pub path: PathBuf,
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Open a spreadsheet, a directory of CSV sheets or a single CSV file.
    pub fn open(path: &Path) -> Result<Self, AnalysisError> {
        let meta = fs::metadata(path).map_err(|e| AnalysisError::source_access(path, e))?;

        let mut sheets = if meta.is_file() && is_spreadsheet(path) {
            let book = open_workbook_auto(path).map_err(|e| AnalysisError::source_access(path, e))?;
            book.sheet_names()
                .into_iter()
                .map(|name| Sheet {
                    name,
                    path: path.to_path_buf(),
                    source: SheetSource::Spreadsheet,
                })
                .collect()
        } else if meta.is_dir() {
            let entries = fs::read_dir(path).map_err(|e| AnalysisError::source_access(path, e))?;
            let mut sheets = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|e| AnalysisError::source_access(path, e))?;
                let sheet_path = entry.path();
                if sheet_path.is_file() && has_csv_extension(&sheet_path) {
                    // Our own output lands next to the sheets.
                    if let Some(name) = sheet_name(&sheet_path).filter(|n| !n.ends_with(RESULTS_SUFFIX)) {
                        sheets.push(Sheet {
                            name,
                            path: sheet_path,
                            source: SheetSource::Csv,
                        });
                    }
                }
            }
            sheets
        } else {
            let name = sheet_name(path)
                .ok_or_else(|| AnalysisError::source_access(path, "file has no usable name"))?;
            vec![Sheet {
                name,
                path: path.to_path_buf(),
                source: SheetSource::Csv,
            }]
        };

        if sheets.is_empty() {
            return Err(AnalysisError::source_access(path, "no sheets found"));
        }

        sheets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self {
            path: path.to_path_buf(),
            sheets,
        })
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// Sheets whose name starts with `prefix`.
    pub fn runs<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a Sheet> + 'a {
        self.sheets.iter().filter(move |s| s.name.starts_with(prefix))
    }
}

/// Result of ingesting one sheet.
#[derive(Debug, Clone)]
pub struct IngestedRun {
    pub name: String,
    pub series: Series,
    /// Rows skipped because a cell was not numeric (`AnalysisError::Parse`).
    pub row_errors: Vec<AnalysisError>,
    pub rows_read: usize,
    /// Line at which the sweep turned around, if it did.
    pub truncated_at: Option<usize>,
}

/// Read one sheet from disk.
pub fn read_sheet(sheet: &Sheet, layout: &ColumnLayout) -> Result<IngestedRun, AnalysisError> {
    match sheet.source {
        SheetSource::Csv => {
            let file = File::open(&sheet.path).map_err(|e| AnalysisError::source_access(&sheet.path, e))?;
            Ok(ingest_records(&sheet.name, file, layout))
        }
        SheetSource::Spreadsheet => {
            let mut book =
                open_workbook_auto(&sheet.path).map_err(|e| AnalysisError::source_access(&sheet.path, e))?;
            let range = book
                .worksheet_range(&sheet.name)
                .map_err(|e| AnalysisError::source_access(&sheet.path, format!("sheet '{}': {e}", sheet.name)))?;
            Ok(ingest_range(&sheet.name, &range, layout))
        }
    }
}

/// Ingest CSV content from any reader.
pub fn ingest_records<R: Read>(name: &str, reader: R, layout: &ColumnLayout) -> IngestedRun {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let rows = reader
        .records()
        .map(|result| result.map_err(|e| format!("CSV parse error: {e}")));
    ingest_rows(name, rows, layout)
}

/// Ingest a worksheet; its first row is the header.
pub fn ingest_range(name: &str, range: &Range<Data>, layout: &ColumnLayout) -> IngestedRun {
    let rows = range
        .rows()
        .skip(1)
        .map(|row| Ok::<_, String>(StringRecord::from(row.iter().map(cell_text).collect::<Vec<_>>())));
    ingest_rows(name, rows, layout)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::Float(v) => v.to_string(),
        Data::Int(v) => v.to_string(),
        Data::String(s) => s.clone(),
        other => format!("{other:?}"),
    }
}

/// Header-less data rows in sheet order.
fn ingest_rows<I>(name: &str, rows: I, layout: &ColumnLayout) -> IngestedRun
where
    I: Iterator<Item = Result<StringRecord, String>>,
{
    let mut series = Series::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut truncated_at = None;

    for (idx, result) in rows.enumerate() {
        // +2: one header line, and line numbers are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(message) => {
                row_errors.push(AnalysisError::Parse { line, message });
                continue;
            }
        };

        let (gate_voltage, drain_current) = match parse_row(&record, layout) {
            Ok(values) => values,
            Err(message) => {
                row_errors.push(AnalysisError::Parse { line, message });
                continue;
            }
        };

        if series.push(MeasurementPoint::new(gate_voltage, drain_current)) == PushOutcome::OrderViolated {
            debug!(sheet = name, line, gate_voltage, "gate voltage stopped decreasing; end of sweep");
            truncated_at = Some(line);
            break;
        }
    }

    IngestedRun {
        name: name.to_string(),
        series,
        row_errors,
        rows_read,
        truncated_at,
    }
}

fn parse_row(record: &StringRecord, layout: &ColumnLayout) -> Result<(f64, f64), String> {
    let drain_current = parse_cell(record, layout.drain_current, "drain current")?;
    let gate_voltage = parse_cell(record, layout.gate_voltage, "gate voltage")?;
    Ok((gate_voltage, drain_current))
}

fn parse_cell(record: &StringRecord, column: usize, label: &str) -> Result<f64, String> {
    let raw = record
        .get(column)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing {label} (column {}).", column + 1))?;
    let value = raw
        .parse::<f64>()
        .map_err(|_| format!("Invalid {label} '{raw}' (column {}).", column + 1))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("Non-finite {label} '{raw}' (column {}).", column + 1))
    }
}

pub fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

pub fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SPREADSHEET_EXTENSIONS.iter().any(|s| ext.eq_ignore_ascii_case(s)))
}

fn sheet_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim_start_matches('\u{feff}').to_string())
        .filter(|s| !s.is_empty())
}
