//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the detection/fitting code stays clean and testable
//! - the TUI and batch mode show identical text

use crate::domain::{DeviceGeometry, FitResult, RunSummary};
use crate::fit::FitState;

/// Chart annotation: general-form line equation, mobility and threshold voltage.
///
/// ```text
/// {coeff_x}x + {coeff_y}y = {const_c}
/// Mobility={mobility}
/// Vth={threshold_voltage}
/// ```
pub fn format_annotation(fit: &FitResult) -> String {
    format!(
        "{}x + {}y = {}\nMobility={}\nVth={}",
        fit.coeff_x, fit.coeff_y, fit.const_c, fit.mobility, fit.threshold_voltage
    )
}

/// Annotation for either fit state.
pub fn format_fit_state(state: &FitState) -> String {
    match state {
        FitState::Available(fit) => format_annotation(fit),
        FitState::Unavailable(err) => err.to_string(),
    }
}

/// Session header printed once before the first run.
pub fn format_session_header(workbook: &str, geometry: &DeviceGeometry, runs: usize) -> String {
    let mut out = String::new();
    out.push_str("=== fetx - FET mobility / threshold extraction ===\n");
    out.push_str(&format!("Workbook: {workbook}\n"));
    out.push_str(&format!(
        "Geometry: L={} W={} C={} | multiplier={:.6e}\n",
        geometry.length,
        geometry.width,
        geometry.capacitance,
        geometry.multiplier()
    ));
    out.push_str(&format!("Runs: {runs}\n"));
    out
}

/// Per-run block: sheet name, selection, then the two extracted values.
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("--- {} ---\n", summary.run));
    out.push_str(&format!("Points: {}", summary.points));
    if summary.skipped_rows > 0 {
        out.push_str(&format!(" ({} row(s) skipped)", summary.skipped_rows));
    }
    out.push('\n');

    if let Some(sel) = &summary.selection {
        out.push_str(&format!("Selection: high={} low={}", sel.high, sel.low));
        if summary.low_confidence {
            out.push_str(" (low confidence: first/last fallback)");
        }
        out.push('\n');
    }

    match (&summary.fit, &summary.fit_error) {
        (Some(fit), _) => {
            out.push_str(&format!("Mobility - {}\n", fit.mobility));
            out.push_str(&format!("Threshold voltage - {}\n", fit.threshold_voltage));
            out.push_str(&format!("R^2 - {:.6}\n", fit.r_squared));
        }
        (None, Some(err)) => {
            out.push_str(&format!("{err}\n"));
        }
        (None, None) => {}
    }
    out
}

/// Results table as aligned text.
pub fn format_results_table(runs: &[RunSummary]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<16} {:>14} {:>14}", "run", "mobility", "vth").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<16} {:-<14} {:-<14}", "", "", "").trim_end());
    out.push('\n');

    for run in runs {
        out.push_str(
            format!(
                "{:<16} {:>14} {:>14}",
                truncate(&run.run, 16),
                fmt_opt(run.mobility()),
                fmt_opt(run.threshold_voltage()),
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6e}")).unwrap_or_else(|| "-".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    s.chars().take(max.saturating_sub(1)).chain(std::iter::once('~')).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Selection, Series};
    use crate::error::AnalysisError;
    use crate::fit::fit_selection;

    fn fit() -> FitResult {
        let series = Series::from_pairs([5.0, 4.0, 3.0, 2.0, 1.0].map(|vg: f64| (vg, (2.0 * vg + 1.0).powi(2))));
        fit_selection(&series, &Selection { high: 0, low: 4 }, 1.0).unwrap()
    }

    #[test]
    fn annotation_has_three_lines() {
        let text = format_annotation(&fit());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("x + ") && lines[0].contains("y = "));
        assert!(lines[1].starts_with("Mobility="));
        assert!(lines[2].starts_with("Vth="));
    }

    #[test]
    fn unavailable_fit_shows_reason() {
        let state = FitState::Unavailable(AnalysisError::singular("slope is zero"));
        assert_eq!(format_fit_state(&state), "fit unavailable: slope is zero");
    }

    #[test]
    fn results_table_marks_missing_values() {
        let runs = vec![RunSummary {
            run: "Run1".to_string(),
            points: 3,
            skipped_rows: 1,
            selection: None,
            fit: None,
            fit_error: Some("fit unavailable: slope is zero".to_string()),
            low_confidence: true,
        }];
        let table = format_results_table(&runs);
        let last = table.lines().last().unwrap();
        assert!(last.starts_with("Run1"));
        assert!(last.ends_with('-'));
    }

    #[test]
    fn truncates_long_names() {
        assert_eq!(truncate("abcdef", 4), "abc~");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
