//! Automatic detection of the linear region in a `sqrt|Id|` vs `Vg` sweep.
//!
//! For every start index we walk forward, keeping a running sum of the chord
//! slopes from the start point. Once a window reaches `min_window` points it is
//! scored by how close the newest chord is to the running average:
//!
//! ```text
//! avg   = Σ slope(p1, k) / (p2 - p1)        k = p1+1 ..= p2
//! dev   = |slope(p1, p2) - avg|
//! score = (|avg| - dev) / |avg|
//! ```
//!
//! A score of 1 means the chord agrees with the average exactly. Within one
//! start index the stored best is replaced when `score * hysteresis > best`,
//! which lets a longer window take over from a near-tied shorter one. Across
//! start indices a winner must score strictly higher, so ties keep the earlier
//! start.

use crate::domain::{DetectorConfig, MeasurementPoint, Series};
use crate::error::AnalysisError;

/// A detected window `[start, end]` (indices into the series, `start < end`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub start: usize,
    pub end: usize,
    pub score: f64,
}

/// Scan `series` once and return the most linear window.
pub fn detect_region(series: &Series, config: &DetectorConfig) -> Result<Region, AnalysisError> {
    let points = series.points();
    let n = points.len();
    let min_window = config.min_window.max(2);
    if n < min_window {
        return Err(AnalysisError::DetectorUnderflow {
            points: n,
            required: min_window,
        });
    }

    let mut best: Option<Region> = None;

    for start in 0..=n - min_window {
        let Some(candidate) = best_window_from(points, start, min_window, config.hysteresis) else {
            continue;
        };
        let stored = best.map_or(0.0, |r| r.score);
        if replaces_across_starts(candidate.score, stored) {
            best = Some(candidate);
        }
    }

    best.ok_or(AnalysisError::NoLinearRegion)
}

/// Best window beginning at `start`, or `None` if nothing scored above zero.
fn best_window_from(
    points: &[MeasurementPoint],
    start: usize,
    min_window: usize,
    hysteresis: f64,
) -> Option<Region> {
    let origin = points[start];
    let mut best: Option<Region> = None;
    let mut total_slope = 0.0;

    for end in start + 1..points.len() {
        let slope = chord_slope(&origin, &points[end]);
        total_slope += slope;

        if end < start + min_window - 1 {
            continue;
        }

        let Some(score) = linearity_score(total_slope, end - start, slope) else {
            continue;
        };
        let stored = best.map_or(0.0, |r| r.score);
        if replaces_within_start(score, stored, hysteresis) {
            best = Some(Region { start, end, score });
        }
    }

    best
}

fn chord_slope(a: &MeasurementPoint, b: &MeasurementPoint) -> f64 {
    (b.sqrt_current() - a.sqrt_current()) / (b.gate_voltage() - a.gate_voltage())
}

/// Score of the newest chord against the running average of `chords` slopes.
///
/// `None` when the average is zero or the score is not finite.
pub fn linearity_score(total_slope: f64, chords: usize, newest_slope: f64) -> Option<f64> {
    let average = total_slope / chords as f64;
    let magnitude = average.abs();
    if magnitude == 0.0 {
        return None;
    }
    let deviation = (newest_slope - average).abs();
    let score = (magnitude - deviation) / magnitude;
    score.is_finite().then_some(score)
}

/// Update rule for windows sharing a start index.
pub fn replaces_within_start(score: f64, stored: f64, hysteresis: f64) -> bool {
    score * hysteresis > stored
}

/// Update rule for per-start winners.
pub fn replaces_across_starts(score: f64, stored: f64) -> bool {
    score > stored
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer_sweep() -> Series {
        // Quadratic-law device: sqrt(Id) = 1e-3 * (Vg - 2) above threshold,
        // a flat 1e-12 A floor below it.
        Series::from_pairs((0..=30).map(|i| {
            let vg = 20.0 - i as f64;
            let id = if vg > 2.0 { 1e-6 * (vg - 2.0).powi(2) } else { 1e-12 };
            (vg, id)
        }))
    }

    #[test]
    fn exact_line_keeps_first_start_and_longest_window() {
        let series = Series::from_pairs((0..8).map(|i| {
            let vg = 7.0 - i as f64;
            (vg, (2.0 * vg + 1.0).powi(2))
        }));
        let region = detect_region(&series, &DetectorConfig::default()).unwrap();
        assert_eq!((region.start, region.end), (0, 7));
        assert!((region.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn finds_the_above_threshold_region() {
        let series = transfer_sweep();
        let region = detect_region(&series, &DetectorConfig::default()).unwrap();
        assert_eq!(region.start, 0);
        let low_vg = series.points()[region.end].gate_voltage();
        assert!(
            (1.0..=4.0).contains(&low_vg),
            "region ends at Vg={low_vg}, expected near the 2V threshold"
        );
    }

    #[test]
    fn detection_is_deterministic() {
        let series = transfer_sweep();
        let config = DetectorConfig::default();
        let a = detect_region(&series, &config).unwrap();
        let b = detect_region(&series, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn underflow_below_min_window() {
        let series = Series::from_pairs([(4.0, 1.0), (3.0, 4.0), (2.0, 9.0), (1.0, 16.0)]);
        let err = detect_region(&series, &DetectorConfig::default()).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::DetectorUnderflow {
                points: 4,
                required: 5
            }
        );
    }

    #[test]
    fn flat_sweep_has_no_linear_region() {
        let series = Series::from_pairs((0..6).map(|i| (5.0 - i as f64, 4.0)));
        let err = detect_region(&series, &DetectorConfig::default()).unwrap_err();
        assert_eq!(err, AnalysisError::NoLinearRegion);
    }

    #[test]
    fn hysteresis_margin_within_one_start() {
        // A longer window scoring 4% below the stored best still takes over...
        assert!(replaces_within_start(0.96, 1.0, 1.05));
        // ...but one scoring 6% below does not.
        assert!(!replaces_within_start(0.94, 1.0, 1.05));
    }

    #[test]
    fn near_tied_later_start_does_not_switch() {
        assert!(!replaces_across_starts(0.97, 1.0));
        assert!(!replaces_across_starts(1.0, 1.0));
        assert!(replaces_across_starts(1.01, 1.0));
    }

    fn sqrt_series(top_vg: f64, sqrt_currents: &[f64]) -> Series {
        Series::from_pairs(
            sqrt_currents
                .iter()
                .enumerate()
                .map(|(i, y)| (top_vg - i as f64, y * y)),
        )
    }

    #[test]
    fn longer_window_within_margin_takes_over() {
        // Exact line on the first five points, the sixth bends slightly:
        // window 0..=4 scores 1.0, window 0..=5 scores ~0.960.
        let series = sqrt_series(7.0, &[8.0, 7.0, 6.0, 5.0, 4.0, 2.75]);
        let region = detect_region(&series, &DetectorConfig::default()).unwrap();
        assert_eq!((region.start, region.end), (0, 5));
        assert!((region.score - 0.9604).abs() < 1e-3);

        // Without the margin the shorter exact window is kept.
        let strict = DetectorConfig {
            hysteresis: 1.0,
            ..DetectorConfig::default()
        };
        let region = detect_region(&series, &strict).unwrap();
        assert_eq!((region.start, region.end), (0, 4));
    }

    #[test]
    fn near_tied_later_start_keeps_earlier_start() {
        // Start 0 peaks at ~0.977, start 1 at ~0.947 (3% lower, inside the margin).
        let series = sqrt_series(6.0, &[6.5, 5.5, 4.5, 3.5, 3.25, 2.25, 0.75]);
        let region = detect_region(&series, &DetectorConfig::default()).unwrap();
        assert_eq!((region.start, region.end), (0, 6));
        assert!((region.score - 0.9770).abs() < 1e-3);

        let later = best_window_from(series.points(), 1, 5, 1.05).unwrap();
        assert!(later.score < region.score);
        assert!(later.score * 1.05 > region.score);
    }

    #[test]
    fn score_rejects_zero_average() {
        assert_eq!(linearity_score(0.0, 4, 0.0), None);
        assert_eq!(linearity_score(4.0, 4, 1.0), Some(1.0));
    }
}
