//! Line fit over a boundary pair and the device parameters derived from it.
//!
//! The fit is stateless: every call refits the whole sub-range from scratch.

use crate::domain::{FitResult, Selection, Series};
use crate::error::AnalysisError;
use crate::math::{LineFit, fit_line};

/// Fit `sqrt|Id| = slope·Vg + intercept` over the inclusive index range
/// spanned by `selection`, then derive threshold voltage and mobility.
///
/// `multiplier` is `DeviceGeometry::multiplier()` for the session.
pub fn fit_selection(
    series: &Series,
    selection: &Selection,
    multiplier: f64,
) -> Result<FitResult, AnalysisError> {
    let range = selection.index_range();
    let len = series.len();
    if *range.end() >= len {
        return Err(AnalysisError::PointOutOfRange {
            index: *range.end(),
            len,
        });
    }

    let window = &series.points()[range];
    let xs: Vec<f64> = window.iter().map(|p| p.gate_voltage()).collect();
    let ys: Vec<f64> = window.iter().map(|p| p.sqrt_current()).collect();

    let distinct = distinct_values(&xs);
    if distinct < 2 {
        return Err(AnalysisError::singular(format!(
            "need at least 2 distinct gate voltages, selection has {distinct}"
        )));
    }

    let line = fit_line(&xs, &ys)
        .ok_or_else(|| AnalysisError::singular("least squares solve failed"))?;

    derive_parameters(line, &xs, &ys, multiplier)
}

/// Coefficients below this fraction of the data scale count as zero.
const ZERO_TOLERANCE: f64 = 1e-12;

fn derive_parameters(
    line: LineFit,
    xs: &[f64],
    ys: &[f64],
    multiplier: f64,
) -> Result<FitResult, AnalysisError> {
    let LineFit {
        slope,
        intercept,
        r_squared,
    } = line;

    if !(slope.is_finite() && intercept.is_finite()) {
        return Err(AnalysisError::singular("non-finite fit coefficients"));
    }

    // SVD round-off turns an exact zero into ~1e-16, so compare against the
    // scale of the data rather than 0.0.
    let y_scale = ys.iter().fold(0.0_f64, |acc, y| acc.max(y.abs()));
    let x_span = xs.iter().fold(f64::NEG_INFINITY, |acc, &x| acc.max(x))
        - xs.iter().fold(f64::INFINITY, |acc, &x| acc.min(x));
    if slope.abs() <= ZERO_TOLERANCE * y_scale / x_span {
        return Err(AnalysisError::singular("slope is zero"));
    }
    if intercept.abs() <= ZERO_TOLERANCE * y_scale {
        return Err(AnalysisError::singular("intercept is zero"));
    }

    let x_first = xs[0];
    let x_last = xs[xs.len() - 1];

    Ok(FitResult {
        slope,
        intercept,
        threshold_voltage: -intercept / slope,
        mobility: multiplier * slope * slope,
        coeff_x: -1.0 / intercept,
        coeff_y: 1.0 / (slope * intercept),
        const_c: 1.0 / slope,
        points: xs.len(),
        r_squared,
        line: [
            (x_first, slope * x_first + intercept),
            (x_last, slope * x_last + intercept),
        ],
    })
}

fn distinct_values(xs: &[f64]) -> usize {
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_series() -> Series {
        // sqrt|Id| = 2·Vg + 1 on Vg = 5..1
        Series::from_pairs([5.0, 4.0, 3.0, 2.0, 1.0].map(|vg: f64| (vg, (2.0 * vg + 1.0).powi(2))))
    }

    #[test]
    fn recovers_exact_line_and_parameters() {
        let series = line_series();
        let multiplier = 3.5;
        let fit = fit_selection(&series, &Selection { high: 0, low: 4 }, multiplier).unwrap();

        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 1.0).abs() < 1e-9);
        assert!((fit.threshold_voltage + 0.5).abs() < 1e-9);
        assert!((fit.mobility - multiplier * 4.0).abs() < 1e-8);
        assert_eq!(fit.points, 5);
    }

    #[test]
    fn display_coefficients() {
        let series = line_series();
        let fit = fit_selection(&series, &Selection { high: 0, low: 4 }, 1.0).unwrap();
        assert!((fit.coeff_x + 1.0).abs() < 1e-9);
        assert!((fit.coeff_y - 0.5).abs() < 1e-9);
        assert!((fit.const_c - 0.5).abs() < 1e-9);
        // Every point on the line satisfies coeff_x·x + coeff_y·y = const_c.
        let (x, y) = fit.line[0];
        assert!((fit.coeff_x * x + fit.coeff_y * y - fit.const_c).abs() < 1e-9);
    }

    #[test]
    fn single_point_is_singular() {
        let series = line_series();
        let err = fit_selection(&series, &Selection { high: 2, low: 2 }, 1.0).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::singular("need at least 2 distinct gate voltages, selection has 1")
        );
    }

    #[test]
    fn distinct_count_ignores_repeats() {
        assert_eq!(distinct_values(&[2.0, 2.0, 1.0]), 2);
        assert_eq!(distinct_values(&[3.0]), 1);
    }

    #[test]
    fn zero_slope_is_singular() {
        let series = Series::from_pairs([(3.0, 4.0), (2.0, 4.0), (1.0, 4.0)]);
        let err = fit_selection(&series, &Selection { high: 0, low: 2 }, 1.0).unwrap_err();
        assert_eq!(err, AnalysisError::singular("slope is zero"));
    }

    #[test]
    fn zero_intercept_is_singular() {
        // sqrt|Id| = Vg passes through the origin.
        let series = Series::from_pairs([(3.0, 9.0), (2.0, 4.0), (1.0, 1.0)]);
        let err = fit_selection(&series, &Selection { high: 0, low: 2 }, 1.0).unwrap_err();
        assert!(matches!(err, AnalysisError::SingularFit(_)));
    }

    #[test]
    fn sub_range_only_uses_selected_points() {
        // Line on the first three points, then a kink.
        let series = Series::from_pairs([(4.0, 81.0), (3.0, 49.0), (2.0, 25.0), (1.0, 100.0)]);
        let fit = fit_selection(&series, &Selection { high: 0, low: 2 }, 1.0).unwrap();
        assert!((fit.slope - 2.0).abs() < 1e-9);
        assert!((fit.intercept - 1.0).abs() < 1e-9);
        assert_eq!(fit.line[1].0, 2.0);
    }

    #[test]
    fn out_of_range_selection_is_rejected() {
        let series = line_series();
        let err = fit_selection(&series, &Selection { high: 0, low: 9 }, 1.0).unwrap_err();
        assert_eq!(err, AnalysisError::PointOutOfRange { index: 9, len: 5 });
    }
}
