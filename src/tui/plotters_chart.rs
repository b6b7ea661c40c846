//! Plotters-powered transfer-curve widget for Ratatui.
//!
//! We render Plotters output into the Ratatui buffer using `plotters-ratatui-backend`.
//! The chart fills its whole area (no margin, no label areas) so a terminal
//! cell maps linearly onto data coordinates; tick labels are drawn around it
//! by the caller.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// A lightweight, render-only chart description.
///
/// All series and bounds are computed outside the render call.
pub struct FetPlottersChart<'a> {
    /// Every point of the series, `(Vg, sqrt|Id|)`.
    pub points: &'a [(f64, f64)],
    /// Points inside the fitted sub-range (a subset of `points`).
    pub fitted: &'a [(f64, f64)],
    /// The high/low boundary points.
    pub boundaries: &'a [(f64, f64)],
    /// Keyboard cursor.
    pub cursor: Option<(f64, f64)>,
    /// Fitted line, already clipped to the bounds.
    pub line: Option<[(f64, f64); 2]>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
}

impl<'a> Widget for FetPlottersChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // When the available area is too small, Plotters may fail to build a chart.
        // In that case, we render a small hint rather than panicking.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let x0 = self.x_bounds[0];
        let x1 = self.x_bounds[1];
        let y0 = self.y_bounds[0];
        let y1 = self.y_bounds[1];

        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(0)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            let line_color = RGBColor(255, 0, 0); // red
            let points_color = RGBColor(128, 128, 128);
            let fitted_color = WHITE;
            let boundary_color = RGBColor(255, 255, 0); // yellow
            let cursor_color = RGBColor(255, 0, 255); // magenta

            // 1) Fitted line.
            if let Some([a, b]) = self.line {
                chart.draw_series(LineSeries::new([a, b], &line_color))?;
            }

            // 2) All points, then the fitted sub-range on top.
            //
            // `Circle` markers come out far too large through the ratatui
            // backend; colored pixels read well in a terminal.
            chart.draw_series(self.points.iter().map(|&(x, y)| Pixel::new((x, y), points_color)))?;
            chart.draw_series(self.fitted.iter().map(|&(x, y)| Pixel::new((x, y), fitted_color)))?;

            // 3) Boundaries and cursor last so they are never hidden.
            chart.draw_series(
                self.boundaries
                    .iter()
                    .map(|&(x, y)| Pixel::new((x, y), boundary_color)),
            )?;
            if let Some(c) = self.cursor {
                chart.draw_series(std::iter::once(Pixel::new(c, cursor_color)))?;
            }

            Ok(())
        });

        widget.render(area, buf);
    }
}
