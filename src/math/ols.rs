//! Least squares solver.
//!
//! Every fit in this project is a straight line through `(Vg, sqrt|Id|)`:
//!
//! ```text
//! minimize Σ (y_i - (b + m·x_i))^2
//! ```
//!
//! We build the `[1, x]` design matrix and solve it with SVD, which stays
//! well-behaved for tall matrices (many rows, two columns). The caller is
//! responsible for rejecting degenerate inputs (fewer than two distinct x).

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Ordinary least squares line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination; 1.0 when `y` is constant and fitted exactly.
    pub r_squared: f64,
}

/// Fit `y = slope·x + intercept`.
///
/// Returns `None` when `xs` and `ys` differ in length, hold fewer than two
/// points, or the solver fails.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Option<LineFit> {
    let n = xs.len();
    if n < 2 || ys.len() != n {
        return None;
    }

    let mut design = DMatrix::<f64>::zeros(n, 2);
    for (i, &x) in xs.iter().enumerate() {
        design[(i, 0)] = 1.0;
        design[(i, 1)] = x;
    }
    let y = DVector::from_column_slice(ys);

    let beta = solve_least_squares(&design, &y)?;
    let intercept = beta[0];
    let slope = beta[1];

    let mean = ys.iter().sum::<f64>() / n as f64;
    let (mut ss_res, mut ss_tot) = (0.0, 0.0);
    for (&x, &y) in xs.iter().zip(ys) {
        let r = y - (slope * x + intercept);
        ss_res += r * r;
        ss_tot += (y - mean) * (y - mean);
    }
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

    Some(LineFit {
        slope,
        intercept,
        r_squared,
    })
}
