//! Per-run session state and the interactive boundary override protocol.
//!
//! A `Session` is the explicit context for one run: the series, the session
//! multiplier, the current boundary pair and the current fit. Picks are the
//! only way the selection changes; each accepted pick refits synchronously
//! and pushes the new state to a [`Renderer`].

use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::domain::{
    DetectorConfig, FitResult, PickTolerance, RunSummary, Selection, Series, Side,
};
use crate::error::AnalysisError;
use crate::fit::detector::detect_region;
use crate::fit::regression::fit_selection;

/// Current fit for a session.
///
/// A failed refit replaces the previous result; a stale fit is never kept.
#[derive(Debug, Clone)]
pub enum FitState {
    Available(Rc<FitResult>),
    Unavailable(AnalysisError),
}

impl FitState {
    fn compute(series: &Series, selection: &Selection, multiplier: f64) -> Self {
        match fit_selection(series, selection, multiplier) {
            Ok(fit) => FitState::Available(Rc::new(fit)),
            Err(err) => FitState::Unavailable(err),
        }
    }

    pub fn result(&self) -> Option<&Rc<FitResult>> {
        match self {
            FitState::Available(fit) => Some(fit),
            FitState::Unavailable(_) => None,
        }
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        match self {
            FitState::Available(_) => None,
            FitState::Unavailable(err) => Some(err),
        }
    }
}

/// Drawing side of the protocol.
///
/// Implemented by the terminal chart; tests use a recording implementation.
pub trait Renderer {
    /// Change the highlight of one point.
    fn set_point_selected(&mut self, index: usize, selected: bool);

    /// Redraw the fit line and annotation for the new state.
    fn update_fit(&mut self, selection: &Selection, fit: &FitState);
}

/// State of one run.
#[derive(Debug, Clone)]
pub struct Session {
    run: String,
    series: Series,
    multiplier: f64,
    selection: Selection,
    fit: FitState,
    low_confidence: bool,
}

impl Session {
    /// Detect the initial boundaries and fit them.
    ///
    /// When detection cannot run (too few points, no candidate) the series'
    /// first and last points are used and the session is flagged low-confidence.
    /// Fails only for an empty series.
    pub fn start(
        run: impl Into<String>,
        series: Series,
        multiplier: f64,
        config: &DetectorConfig,
    ) -> Result<Self, AnalysisError> {
        let run = run.into();
        if series.is_empty() {
            return Err(AnalysisError::DetectorUnderflow {
                points: 0,
                required: config.min_window,
            });
        }

        let (selection, low_confidence) = match detect_region(&series, config) {
            Ok(region) => {
                debug!(
                    run = %run,
                    start = region.start,
                    end = region.end,
                    score = region.score,
                    "detected linear region"
                );
                (Selection::ordered(&series, region.start, region.end), false)
            }
            Err(err) if err.is_detector_fallback() => {
                warn!(run = %run, "{err}; falling back to first/last point");
                (Selection::ordered(&series, 0, series.len() - 1), true)
            }
            Err(err) => return Err(err),
        };

        Self::with_selection(run, series, multiplier, selection, low_confidence)
    }

    /// Build a session around an explicit selection and fit it.
    ///
    /// Fails with `PointOutOfRange` if either index is outside `series`.
    pub fn with_selection(
        run: impl Into<String>,
        series: Series,
        multiplier: f64,
        selection: Selection,
        low_confidence: bool,
    ) -> Result<Self, AnalysisError> {
        let len = series.len();
        if let Some(index) = [selection.high, selection.low].into_iter().find(|&i| i >= len) {
            return Err(AnalysisError::PointOutOfRange { index, len });
        }

        let selection = Selection::ordered(&series, selection.high, selection.low);
        let fit = FitState::compute(&series, &selection, multiplier);
        Ok(Self {
            run: run.into(),
            series,
            multiplier,
            selection,
            fit,
            low_confidence,
        })
    }

    pub fn run(&self) -> &str {
        &self.run
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn fit(&self) -> &FitState {
        &self.fit
    }

    pub fn low_confidence(&self) -> bool {
        self.low_confidence
    }

    /// Results-table view of the session.
    pub fn summary(&self, skipped_rows: usize) -> RunSummary {
        RunSummary {
            run: self.run.clone(),
            points: self.series.len(),
            skipped_rows,
            selection: Some(self.selection),
            fit: self.fit.result().map(|f| f.as_ref().clone()),
            fit_error: self.fit.error().map(|e| e.to_string()),
            low_confidence: self.low_confidence,
        }
    }
}

/// Result of a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
    /// The picked point already was a boundary; nothing changed.
    Unchanged,
    /// The selection changed and the fit was recomputed.
    Updated,
}

/// Applies operator picks to a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionController {
    tolerance: PickTolerance,
}

impl SelectionController {
    pub fn new(tolerance: PickTolerance) -> Self {
        Self { tolerance }
    }

    pub fn tolerance(&self) -> &PickTolerance {
        &self.tolerance
    }

    /// Replace the `side` boundary with point `picked`, restore ordering, refit.
    pub fn apply_pick<R: Renderer + ?Sized>(
        &self,
        session: &mut Session,
        picked: usize,
        side: Side,
        renderer: &mut R,
    ) -> Result<PickOutcome, AnalysisError> {
        let len = session.series.len();
        if picked >= len {
            return Err(AnalysisError::PointOutOfRange { index: picked, len });
        }
        if session.selection.contains(picked) {
            return Ok(PickOutcome::Unchanged);
        }

        let replaced = session.selection.slot(side);
        renderer.set_point_selected(replaced, false);
        renderer.set_point_selected(picked, true);

        session.selection.set_slot(side, picked);
        session.selection.restore_order(&session.series);

        session.fit = FitState::compute(&session.series, &session.selection, session.multiplier);
        match &session.fit {
            FitState::Available(fit) => info!(
                run = %session.run,
                high = session.selection.high,
                low = session.selection.low,
                mobility = fit.mobility,
                vth = fit.threshold_voltage,
                "refit"
            ),
            FitState::Unavailable(err) => warn!(run = %session.run, "refit failed: {err}"),
        }

        renderer.update_fit(&session.selection, &session.fit);
        Ok(PickOutcome::Updated)
    }

    /// Resolve a pick at data coordinates, then apply it.
    ///
    /// Returns `Ok(None)` when no point lies within tolerance.
    pub fn pick_at<R: Renderer + ?Sized>(
        &self,
        session: &mut Session,
        gate_voltage: f64,
        sqrt_current: f64,
        side: Side,
        renderer: &mut R,
    ) -> Result<Option<PickOutcome>, AnalysisError> {
        match hit_test(&session.series, gate_voltage, sqrt_current, &self.tolerance) {
            Some(index) => self.apply_pick(session, index, side, renderer).map(Some),
            None => Ok(None),
        }
    }
}

/// Index of the point closest to `(gate_voltage, sqrt_current)` among those
/// with `|ΔVg| < tolerance.gate_voltage` and `|Δsqrt|Id|| < range / range_divisor`.
pub fn hit_test(
    series: &Series,
    gate_voltage: f64,
    sqrt_current: f64,
    tolerance: &PickTolerance,
) -> Option<usize> {
    let dx_max = tolerance.gate_voltage;
    let dy_max = series.range() / tolerance.range_divisor;
    if !(dx_max > 0.0 && dy_max > 0.0) {
        return None;
    }

    series
        .points()
        .iter()
        .enumerate()
        .filter_map(|(i, p)| {
            let dx = (p.gate_voltage() - gate_voltage).abs();
            let dy = (p.sqrt_current() - sqrt_current).abs();
            if dx < dx_max && dy < dy_max {
                let distance = (dx / dx_max).powi(2) + (dy / dy_max).powi(2);
                Some((i, distance))
            } else {
                None
            }
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        highlights: Vec<(usize, bool)>,
        updates: Vec<(Selection, bool)>,
    }

    impl Renderer for Recorder {
        fn set_point_selected(&mut self, index: usize, selected: bool) {
            self.highlights.push((index, selected));
        }

        fn update_fit(&mut self, selection: &Selection, fit: &FitState) {
            self.updates.push((*selection, fit.result().is_some()));
        }
    }

    fn line_session() -> Session {
        // sqrt|Id| = 2·Vg + 1 on Vg = 9..0
        let series = Series::from_pairs((0..10).map(|i| {
            let vg = 9.0 - i as f64;
            (vg, (2.0 * vg + 1.0).powi(2))
        }));
        Session::with_selection("Run1", series, 2.0, Selection { high: 2, low: 6 }, false).unwrap()
    }

    #[test]
    fn start_uses_detected_region() {
        let series = Series::from_pairs((0..10).map(|i| {
            let vg = 9.0 - i as f64;
            (vg, (2.0 * vg + 1.0).powi(2))
        }));
        let session = Session::start("Run1", series, 1.0, &DetectorConfig::default()).unwrap();
        assert_eq!(*session.selection(), Selection { high: 0, low: 9 });
        assert!(!session.low_confidence());
        assert!(session.fit().result().is_some());
    }

    #[test]
    fn start_falls_back_on_short_series() {
        let series = Series::from_pairs([(3.0, 49.0), (2.0, 25.0), (1.0, 9.0)]);
        let session = Session::start("Run2", series, 1.0, &DetectorConfig::default()).unwrap();
        assert_eq!(*session.selection(), Selection { high: 0, low: 2 });
        assert!(session.low_confidence());
    }

    #[test]
    fn start_rejects_empty_series() {
        let err = Session::start("Run3", Series::new(), 1.0, &DetectorConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::DetectorUnderflow { points: 0, .. }));
    }

    #[test]
    fn pick_replaces_slot_and_refits() {
        let mut session = line_session();
        let mut recorder = Recorder::default();
        let controller = SelectionController::default();

        let outcome = controller
            .apply_pick(&mut session, 8, Side::Low, &mut recorder)
            .unwrap();

        assert_eq!(outcome, PickOutcome::Updated);
        assert_eq!(*session.selection(), Selection { high: 2, low: 8 });
        assert_eq!(recorder.highlights, vec![(6, false), (8, true)]);
        assert_eq!(recorder.updates, vec![(Selection { high: 2, low: 8 }, true)]);
        let fit = session.fit().result().unwrap();
        assert_eq!(fit.points, 7);
    }

    #[test]
    fn pick_past_other_boundary_swaps_slots() {
        let mut session = line_session();
        let mut recorder = Recorder::default();
        // Replacing `high` with a point below `low` must swap the pair.
        SelectionController::default()
            .apply_pick(&mut session, 9, Side::High, &mut recorder)
            .unwrap();
        assert_eq!(*session.selection(), Selection { high: 6, low: 9 });
    }

    #[test]
    fn ordering_holds_for_any_pick_sequence() {
        let mut session = line_session();
        let mut recorder = Recorder::default();
        let controller = SelectionController::default();
        let picks = [
            (0, Side::Low),
            (9, Side::High),
            (4, Side::Low),
            (4, Side::High),
            (1, Side::High),
            (7, Side::Low),
            (3, Side::High),
            (0, Side::High),
        ];
        for (index, side) in picks {
            controller
                .apply_pick(&mut session, index, side, &mut recorder)
                .unwrap();
            let sel = session.selection();
            let points = session.series().points();
            assert!(points[sel.high].gate_voltage() >= points[sel.low].gate_voltage());
        }
    }

    #[test]
    fn picking_a_boundary_is_a_no_op() {
        let mut session = line_session();
        let mut recorder = Recorder::default();
        let controller = SelectionController::default();
        let before_selection = *session.selection();
        let before_fit = Rc::clone(session.fit().result().unwrap());

        for (index, side) in [(2, Side::Low), (6, Side::High), (2, Side::High)] {
            let outcome = controller
                .apply_pick(&mut session, index, side, &mut recorder)
                .unwrap();
            assert_eq!(outcome, PickOutcome::Unchanged);
        }

        assert_eq!(*session.selection(), before_selection);
        assert!(Rc::ptr_eq(&before_fit, session.fit().result().unwrap()));
        assert!(recorder.highlights.is_empty());
        assert!(recorder.updates.is_empty());
    }

    #[test]
    fn singular_refit_rolls_back_to_unavailable() {
        // Flat tail: sqrt|Id| = 5 for Vg <= 2.
        let series = Series::from_pairs((0..8).map(|i| {
            let vg = 7.0 - i as f64;
            let root: f64 = if vg > 2.0 { vg + 3.0 } else { 5.0 };
            (vg, root * root)
        }));
        let mut session =
            Session::with_selection("Run4", series, 1.0, Selection { high: 0, low: 5 }, false).unwrap();
        assert!(session.fit().result().is_some());

        let mut recorder = Recorder::default();
        let controller = SelectionController::default();
        controller
            .apply_pick(&mut session, 7, Side::High, &mut recorder)
            .unwrap();

        assert_eq!(*session.selection(), Selection { high: 5, low: 7 });
        assert!(matches!(session.fit(), FitState::Unavailable(AnalysisError::SingularFit(_))));
        assert_eq!(recorder.updates.last(), Some(&(Selection { high: 5, low: 7 }, false)));
        assert!(session.summary(0).fit.is_none());
    }

    #[test]
    fn explicit_selection_outside_series_is_rejected() {
        let series = Series::from_pairs([(3.0, 1.0), (2.0, 4.0), (1.0, 9.0)]);
        let err = Session::with_selection("Run5", series, 1.0, Selection { high: 0, low: 3 }, false)
            .unwrap_err();
        assert_eq!(err, AnalysisError::PointOutOfRange { index: 3, len: 3 });
    }

    #[test]
    fn out_of_range_pick_leaves_state_untouched() {
        let mut session = line_session();
        let mut recorder = Recorder::default();
        let err = SelectionController::default()
            .apply_pick(&mut session, 42, Side::Low, &mut recorder)
            .unwrap_err();
        assert_eq!(err, AnalysisError::PointOutOfRange { index: 42, len: 10 });
        assert_eq!(*session.selection(), Selection { high: 2, low: 6 });
    }

    #[test]
    fn hit_test_respects_tolerances() {
        let session = line_session();
        let series = session.series();
        let tolerance = PickTolerance::default();
        // range = 19, so |Δy| must stay below 1.9.
        assert_eq!(hit_test(series, 5.1, 11.5, &tolerance), Some(4));
        assert_eq!(hit_test(series, 5.3, 11.0, &tolerance), None);
        assert_eq!(hit_test(series, 5.0, 13.0, &tolerance), None);
    }

    #[test]
    fn pick_at_resolves_and_applies() {
        let mut session = line_session();
        let mut recorder = Recorder::default();
        let controller = SelectionController::default();
        let outcome = controller
            .pick_at(&mut session, 1.05, 3.2, Side::Low, &mut recorder)
            .unwrap();
        assert_eq!(outcome, Some(PickOutcome::Updated));
        assert_eq!(session.selection().low, 8);

        let miss = controller
            .pick_at(&mut session, 100.0, 3.0, Side::Low, &mut recorder)
            .unwrap();
        assert_eq!(miss, None);
    }
}
