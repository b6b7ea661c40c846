//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during detection and fitting
//! - exported to CSV/JSON
//! - rendered by either front-end (terminal chart or ASCII plot)

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

/// Vacuum permittivity in F/cm.
pub const VACUUM_PERMITTIVITY_F_PER_CM: f64 = 8.8541878176e-14;

/// One sample of a transfer sweep.
///
/// The square root of the absolute drain current is computed once here; every
/// later stage works in the `(Vg, sqrt|Id|)` plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementPoint {
    gate_voltage: f64,
    sqrt_current: f64,
}

impl MeasurementPoint {
    pub fn new(gate_voltage: f64, drain_current: f64) -> Self {
        Self {
            gate_voltage,
            sqrt_current: drain_current.abs().sqrt(),
        }
    }

    pub fn gate_voltage(&self) -> f64 {
        self.gate_voltage
    }

    pub fn sqrt_current(&self) -> f64 {
        self.sqrt_current
    }
}

/// Outcome of offering a point to [`Series::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    /// The gate voltage did not decrease; the sweep has turned around.
    OrderViolated,
}

/// Measurement points of one run, strictly descending in gate voltage.
///
/// `push` is the only way in, so the ordering holds by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    points: Vec<MeasurementPoint>,
    range: f64,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from `(gate_voltage, drain_current)` pairs, stopping at
    /// the first pair whose voltage is not strictly below the previous one.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut series = Self::new();
        for (gate_voltage, drain_current) in pairs {
            if series.push(MeasurementPoint::new(gate_voltage, drain_current))
                == PushOutcome::OrderViolated
            {
                break;
            }
        }
        series
    }

    pub fn push(&mut self, point: MeasurementPoint) -> PushOutcome {
        if let Some(last) = self.points.last() {
            if !(point.gate_voltage < last.gate_voltage) {
                return PushOutcome::OrderViolated;
            }
        }
        if self.range < point.sqrt_current {
            self.range = point.sqrt_current;
        }
        self.points.push(point);
        PushOutcome::Accepted
    }

    pub fn points(&self) -> &[MeasurementPoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<&MeasurementPoint> {
        self.points.get(index)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Largest `sqrt|Id|` seen; scales the pick tolerance.
    pub fn range(&self) -> f64 {
        self.range
    }

    /// Gate voltage span as `(min, max)`.
    pub fn gate_voltage_bounds(&self) -> Option<(f64, f64)> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        Some((last.gate_voltage, first.gate_voltage))
    }
}

/// Which boundary a pick replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    High,
    Low,
}

/// The pair of boundary points, stored as indices into one `Series`.
///
/// Invariant: `Vg(high) >= Vg(low)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub high: usize,
    pub low: usize,
}

impl Selection {
    /// Build a selection from two indices, swapping them if needed so that
    /// `high` refers to the larger gate voltage.
    ///
    /// # Panics
    /// Panics if either index is outside `series`.
    pub fn ordered(series: &Series, high: usize, low: usize) -> Self {
        let mut selection = Self { high, low };
        selection.restore_order(series);
        selection
    }

    /// Swap the slots if the ordering invariant is violated.
    pub fn restore_order(&mut self, series: &Series) {
        let points = series.points();
        if points[self.high].gate_voltage() < points[self.low].gate_voltage() {
            std::mem::swap(&mut self.high, &mut self.low);
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.high == index || self.low == index
    }

    pub fn slot(&self, side: Side) -> usize {
        match side {
            Side::High => self.high,
            Side::Low => self.low,
        }
    }

    pub fn set_slot(&mut self, side: Side, index: usize) {
        match side {
            Side::High => self.high = index,
            Side::Low => self.low = index,
        }
    }

    /// Inclusive index range between the two boundaries.
    pub fn index_range(&self) -> RangeInclusive<usize> {
        self.high.min(self.low)..=self.high.max(self.low)
    }
}

/// Line fit over a selection plus the device parameters derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub slope: f64,
    pub intercept: f64,
    /// Gate voltage where the extrapolated line reaches zero current.
    pub threshold_voltage: f64,
    pub mobility: f64,
    /// General-form display triple: `coeff_x·x + coeff_y·y = const_c`.
    pub coeff_x: f64,
    pub coeff_y: f64,
    pub const_c: f64,
    /// Number of points in the fitted sub-range.
    pub points: usize,
    pub r_squared: f64,
    /// Fitted line evaluated at the sub-range end points, `(Vg, sqrt|Id|)`.
    pub line: [(f64, f64); 2],
}

impl FitResult {
    pub fn predict(&self, gate_voltage: f64) -> f64 {
        self.slope * gate_voltage + self.intercept
    }
}

/// Device geometry, supplied once per session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceGeometry {
    pub length: f64,
    pub width: f64,
    /// Gate capacitance per unit area.
    pub capacitance: f64,
}

impl DeviceGeometry {
    pub fn new(length: f64, width: f64, capacitance: f64) -> Result<Self, String> {
        for (name, value) in [("length", length), ("width", width), ("capacitance", capacitance)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(format!("Invalid {name}: {value} (must be finite and > 0)."));
            }
        }
        Ok(Self {
            length,
            width,
            capacitance,
        })
    }

    /// Derive the capacitance from the dielectric constant and layer thickness (cm).
    pub fn from_dielectric(
        length: f64,
        width: f64,
        dielectric_constant: f64,
        thickness: f64,
    ) -> Result<Self, String> {
        if !(thickness.is_finite() && thickness > 0.0) {
            return Err(format!(
                "Invalid dielectric thickness: {thickness} (must be finite and > 0)."
            ));
        }
        Self::new(
            length,
            width,
            dielectric_constant * VACUUM_PERMITTIVITY_F_PER_CM / thickness,
        )
    }

    /// `2·L / (C·W)`; mobility is this times the squared slope.
    pub fn multiplier(&self) -> f64 {
        2.0 * self.length / (self.capacitance * self.width)
    }
}

/// Tuning values for automatic region detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Smallest window (in points) that is scored.
    pub min_window: usize,
    /// A candidate replaces the stored best when `score * hysteresis > best`.
    ///
    /// Keeps measurement noise from flipping between near-tied windows.
    pub hysteresis: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_window: 5,
            hysteresis: 1.05,
        }
    }
}

/// Hit-test tolerances for picks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PickTolerance {
    /// Maximum `|ΔVg|` (exclusive).
    pub gate_voltage: f64,
    /// Maximum `|Δsqrt|Id||` is `series.range() / range_divisor` (exclusive).
    pub range_divisor: f64,
}

impl Default for PickTolerance {
    fn default() -> Self {
        Self {
            gate_voltage: 0.25,
            range_divisor: 10.0,
        }
    }
}

/// Per-run outcome, one row of the results table.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run: String,
    pub points: usize,
    pub skipped_rows: usize,
    pub selection: Option<Selection>,
    pub fit: Option<FitResult>,
    pub fit_error: Option<String>,
    /// Set when the boundaries came from the first/last fallback.
    pub low_confidence: bool,
}

impl RunSummary {
    pub fn mobility(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.mobility)
    }

    pub fn threshold_voltage(&self) -> Option<f64> {
        self.fit.as_ref().map(|f| f.threshold_voltage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingestion_stops_at_first_non_decreasing_voltage() {
        let series = Series::from_pairs([(5.0, 1e-6), (4.0, 2e-6), (4.0, 3e-6), (3.0, 4e-6)]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[1].gate_voltage(), 4.0);
    }

    #[test]
    fn range_tracks_largest_sqrt_current() {
        let series = Series::from_pairs([(3.0, -4.0), (2.0, 9.0), (1.0, 1.0)]);
        assert!((series.range() - 3.0).abs() < 1e-12);
        assert!((series.points()[0].sqrt_current() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn selection_orders_by_gate_voltage() {
        let series = Series::from_pairs([(3.0, 1.0), (2.0, 1.0), (1.0, 1.0)]);
        let sel = Selection::ordered(&series, 2, 0);
        assert_eq!(sel, Selection { high: 0, low: 2 });
        assert_eq!(sel.index_range(), 0..=2);
    }

    #[test]
    fn capacitance_from_dielectric() {
        let geom = DeviceGeometry::from_dielectric(50e-4, 1000e-4, 3.9, 100e-7).unwrap();
        let expected = 3.9 * VACUUM_PERMITTIVITY_F_PER_CM / 100e-7;
        assert!((geom.capacitance - expected).abs() < 1e-20);
        assert!((geom.multiplier() - 2.0 * 50e-4 / (expected * 1000e-4)).abs() < 1e-6);
    }

    #[test]
    fn geometry_rejects_non_positive_values() {
        assert!(DeviceGeometry::new(0.0, 1.0, 1.0).is_err());
        assert!(DeviceGeometry::new(1.0, f64::NAN, 1.0).is_err());
        assert!(DeviceGeometry::from_dielectric(1.0, 1.0, 3.9, 0.0).is_err());
    }
}
