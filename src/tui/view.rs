//! Render state of the chart for one session.
//!
//! `ChartView` is the terminal side of the pick protocol: the controller tells
//! it which markers to highlight and hands it every new fit. Drawing reads the
//! state back out; nothing here touches the session.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::rc::Rc;

use ratatui::layout::Rect;

use crate::domain::{FitResult, Selection, Series};
use crate::fit::{FitState, Renderer, Session};
use crate::report::format_fit_state;
use crate::tui::elements::{ElementId, ElementMap};

#[derive(Debug, Clone)]
pub struct ChartView {
    elements: ElementMap,
    highlighted: HashSet<ElementId>,
    fitted: RangeInclusive<usize>,
    fit: Option<Rc<FitResult>>,
    annotation: String,
}

impl ChartView {
    /// View reflecting the session's current selection and fit.
    pub fn new(session: &Session) -> Self {
        let selection = *session.selection();
        let mut view = Self {
            elements: ElementMap::for_points(session.series().len()),
            highlighted: HashSet::new(),
            fitted: selection.index_range(),
            fit: None,
            annotation: String::new(),
        };
        view.set_point_selected(selection.high, true);
        view.set_point_selected(selection.low, true);
        view.update_fit(&selection, session.fit());
        view
    }

    pub fn elements(&self) -> &ElementMap {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut ElementMap {
        &mut self.elements
    }

    pub fn is_highlighted(&self, index: usize) -> bool {
        self.elements
            .element(index)
            .is_some_and(|id| self.highlighted.contains(&id))
    }

    pub fn in_fitted_range(&self, index: usize) -> bool {
        self.fitted.contains(&index)
    }

    pub fn fit(&self) -> Option<&FitResult> {
        self.fit.as_deref()
    }

    pub fn annotation(&self) -> &str {
        &self.annotation
    }
}

impl Renderer for ChartView {
    fn set_point_selected(&mut self, index: usize, selected: bool) {
        let Some(id) = self.elements.element(index) else {
            return;
        };
        if selected {
            self.highlighted.insert(id);
        } else {
            self.highlighted.remove(&id);
        }
    }

    fn update_fit(&mut self, selection: &Selection, fit: &FitState) {
        self.fitted = selection.index_range();
        self.fit = fit.result().cloned();
        self.annotation = format_fit_state(fit);
    }
}

/// Plot bounds for a series: exact `Vg` extent, `sqrt|Id|` padded by 5%.
pub fn chart_bounds(series: &Series) -> ([f64; 2], [f64; 2]) {
    let (mut x0, mut x1) = series.gate_voltage_bounds().unwrap_or((0.0, 1.0));
    if x1 <= x0 {
        x0 -= 0.5;
        x1 += 0.5;
    }

    let (mut y0, mut y1) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in series.points() {
        y0 = y0.min(p.sqrt_current());
        y1 = y1.max(p.sqrt_current());
    }
    if !y0.is_finite() || !y1.is_finite() || y1 <= y0 {
        y0 = 0.0;
        y1 = if y1.is_finite() && y1 > 0.0 { 2.0 * y1 } else { 1.0 };
    }
    let pad = ((y1 - y0).abs() * 0.05).max(1e-12);

    ([x0, x1], [y0 - pad, y1 + pad])
}

/// The fitted line across the x bounds, clipped to the y bounds.
pub fn clip_line(fit: &FitResult, x_bounds: [f64; 2], y_bounds: [f64; 2]) -> Option<[(f64, f64); 2]> {
    let (mut lo, mut hi) = (x_bounds[0], x_bounds[1]);
    if fit.slope != 0.0 {
        let xa = (y_bounds[0] - fit.intercept) / fit.slope;
        let xb = (y_bounds[1] - fit.intercept) / fit.slope;
        lo = lo.max(xa.min(xb));
        hi = hi.min(xa.max(xb));
    }
    if !(lo.is_finite() && hi.is_finite()) || hi <= lo {
        return None;
    }
    Some([(lo, fit.predict(lo)), (hi, fit.predict(hi))])
}

/// Terminal cell of a data point inside `rect`.
pub fn data_to_cell(point: (f64, f64), rect: Rect, x_bounds: [f64; 2], y_bounds: [f64; 2]) -> (u16, u16) {
    let w = rect.width.saturating_sub(1) as f64;
    let h = rect.height.saturating_sub(1) as f64;
    let u = ((point.0 - x_bounds[0]) / (x_bounds[1] - x_bounds[0])).clamp(0.0, 1.0);
    let v = ((point.1 - y_bounds[0]) / (y_bounds[1] - y_bounds[0])).clamp(0.0, 1.0);
    let col = rect.x + (u * w).round() as u16;
    // Row 0 is the top of the chart.
    let row = rect.y + (h - v * h).round() as u16;
    (col, row)
}

/// Data coordinates at the centre of a terminal cell, if it lies inside `rect`.
pub fn cell_to_data(cell: (u16, u16), rect: Rect, x_bounds: [f64; 2], y_bounds: [f64; 2]) -> Option<(f64, f64)> {
    let (col, row) = cell;
    if col < rect.x || row < rect.y || col >= rect.x + rect.width || row >= rect.y + rect.height {
        return None;
    }
    let w = rect.width.saturating_sub(1).max(1) as f64;
    let h = rect.height.saturating_sub(1).max(1) as f64;
    let u = (col - rect.x) as f64 / w;
    let v = 1.0 - (row - rect.y) as f64 / h;
    Some((
        x_bounds[0] + u * (x_bounds[1] - x_bounds[0]),
        y_bounds[0] + v * (y_bounds[1] - y_bounds[0]),
    ))
}

/// Columns reserved left of the plot for `sqrt|Id|` labels.
const Y_LABEL_COLUMNS: u16 = 10;
/// Rows reserved below the plot: tick labels, then the axis title.
const X_LABEL_ROWS: u16 = 2;

/// Plot area inside `inner`, leaving room for axis labels.
///
/// `None` when the panel is too small for labels; the plot then fills `inner`.
pub fn plot_area(inner: Rect) -> Option<Rect> {
    let width = inner.width.checked_sub(Y_LABEL_COLUMNS + 2)?;
    let height = inner.height.checked_sub(X_LABEL_ROWS + 1)?;
    if width < 10 || height < 5 {
        return None;
    }
    Some(Rect {
        x: inner.x + Y_LABEL_COLUMNS,
        y: inner.y + 1,
        width,
        height,
    })
}

/// A tick label anchored at its first cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisLabel {
    pub col: u16,
    pub row: u16,
    pub text: String,
}

/// Tick labels around a plot drawn in `rect`.
///
/// `Vg` is labelled at the boundary voltages first, then at both ends where
/// there is room. `sqrt|Id|` gets `y_ticks` evenly spaced labels.
pub fn axis_labels(
    rect: Rect,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
    boundaries: &[f64],
    y_ticks: usize,
) -> Vec<AxisLabel> {
    let row = rect.y + rect.height;
    let mut x_labels: Vec<AxisLabel> = Vec::new();
    for &vg in boundaries.iter().chain(&x_bounds) {
        let text = format!("{vg:.1}");
        let (center, _) = data_to_cell((vg, y_bounds[0]), rect, x_bounds, y_bounds);
        let col = center.saturating_sub(text.len() as u16 / 2);
        let end = col + text.len() as u16;
        let overlaps = x_labels
            .iter()
            .any(|l| col <= l.col + l.text.len() as u16 && l.col <= end);
        if !overlaps {
            x_labels.push(AxisLabel { col, row, text });
        }
    }
    x_labels.sort_by_key(|l| l.col);

    let mut labels = x_labels;
    for i in 0..y_ticks {
        let u = if y_ticks > 1 { i as f64 / (y_ticks - 1) as f64 } else { 0.0 };
        let value = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let text = format!("{value:.2e}");
        let Some(col) = rect.x.checked_sub(text.len() as u16 + 1) else {
            continue;
        };
        let (_, row) = data_to_cell((x_bounds[0], value), rect, x_bounds, y_bounds);
        labels.push(AxisLabel { col, row, text });
    }
    labels
}
