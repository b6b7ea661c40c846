//! Ratatui-based terminal UI.
//!
//! Runs are shown one at a time. For each run the chart plots `sqrt|Id|`
//! against `Vg` with the detected boundaries highlighted, the fitted line, and
//! an annotation with the line equation, mobility and threshold voltage.
//! The operator moves the boundaries with the mouse (right button = high,
//! left button = low) or with the keyboard cursor.

use std::io;
use std::time::Duration;

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
    Terminal,
};
use tracing::info;

use crate::app::pipeline::{AnalysisSettings, prepare_sheet, run_sheets};
use crate::domain::{RunSummary, Side};
use crate::error::AppError;
use crate::fit::{PickOutcome, SelectionController, Session};
use crate::io::ingest::Workbook;

mod elements;
mod plotters_chart;
mod view;

pub use elements::{ElementId, ElementMap};
pub use view::{AxisLabel, ChartView, axis_labels, cell_to_data, chart_bounds, clip_line, data_to_cell, plot_area};

use plotters_chart::FetPlottersChart;

/// Walk every run of the workbook interactively and return their summaries.
///
/// Quitting early (`Q` / Ctrl-C) returns the runs seen so far.
pub fn run(
    workbook: &Workbook,
    settings: &AnalysisSettings,
    controller: SelectionController,
) -> Result<Vec<RunSummary>, AppError> {
    let sheets = run_sheets(workbook, settings);
    let total = sheets.len();

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut summaries = Vec::with_capacity(total);
    for (position, sheet) in sheets.into_iter().enumerate() {
        let prepared = prepare_sheet(sheet, settings)?;
        let skipped = prepared.row_errors.len();
        let session = match prepared.session {
            Ok(session) => session,
            Err(_) => {
                summaries.push(prepared.summary());
                continue;
            }
        };

        let mut app = App::new(session, controller, skipped, (position + 1, total));
        let flow = app.event_loop(&mut terminal)?;
        summaries.push(app.session.summary(app.skipped_rows));

        if flow == Flow::Quit {
            info!(processed = summaries.len(), total, "interactive session ended early");
            break;
        }
    }

    Ok(summaries)
}

/// Raw mode, alternate screen and mouse capture for the lifetime of the value.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        // From here on, dropping the guard undoes whatever was switched on.
        let guard = Self;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)
            .map_err(|e| AppError::new(4, format!("Failed to enter alternate screen: {e}")))?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Next,
    Quit,
}

/// Where the chart was last drawn, for mapping clicks back to data.
#[derive(Debug, Clone, Copy)]
struct ChartGeometry {
    rect: Rect,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

struct App {
    session: Session,
    controller: SelectionController,
    view: ChartView,
    skipped_rows: usize,
    position: (usize, usize),
    cursor: usize,
    status: String,
    geometry: Option<ChartGeometry>,
}

impl App {
    fn new(session: Session, controller: SelectionController, skipped_rows: usize, position: (usize, usize)) -> Self {
        let view = ChartView::new(&session);
        let cursor = session.selection().high;
        let status = if session.low_confidence() {
            "No linear region detected; using first/last point.".to_string()
        } else {
            "Detected linear region.".to_string()
        };
        Self {
            session,
            controller,
            view,
            skipped_rows,
            position,
            cursor,
            status,
            geometry: None,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<Flow, AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))? {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                        return Ok(Flow::Quit);
                    }
                    if let Some(flow) = self.handle_key(key.code) {
                        return Ok(flow);
                    }
                    needs_redraw = true;
                }
                Event::Mouse(mouse) => {
                    if self.handle_mouse(mouse) {
                        needs_redraw = true;
                    }
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> Option<Flow> {
        let last = self.session.series().len().saturating_sub(1);
        match code {
            KeyCode::Char('Q') => return Some(Flow::Quit),
            KeyCode::Char('q') | KeyCode::Char('n') | KeyCode::Esc | KeyCode::Enter => {
                return Some(Flow::Next);
            }
            // Index 0 is the highest gate voltage, drawn on the right.
            KeyCode::Left => self.cursor = (self.cursor + 1).min(last),
            KeyCode::Right => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Home => self.cursor = last,
            KeyCode::End => self.cursor = 0,
            KeyCode::Char('h') => self.pick_index(self.cursor, Side::High),
            KeyCode::Char('l') => self.pick_index(self.cursor, Side::Low),
            _ => {}
        }
        None
    }

    /// Returns true when the screen needs a redraw.
    fn handle_mouse(&mut self, mouse: MouseEvent) -> bool {
        let side = match mouse.kind {
            MouseEventKind::Down(MouseButton::Right) => Side::High,
            MouseEventKind::Down(_) => Side::Low,
            _ => return false,
        };
        let Some(geometry) = self.geometry else {
            return false;
        };
        let cell = (mouse.column, mouse.row);

        // A click right on a marker picks that point.
        if let Some(index) = self.view.elements().point_at(cell) {
            self.cursor = index;
            self.pick_index(index, side);
            return true;
        }

        let Some((vg, sqrt_i)) = cell_to_data(cell, geometry.rect, geometry.x_bounds, geometry.y_bounds) else {
            return false;
        };
        match self.controller.pick_at(&mut self.session, vg, sqrt_i, side, &mut self.view) {
            Ok(Some(outcome)) => {
                self.cursor = self.session.selection().slot(side);
                self.status = self.pick_status(outcome);
            }
            Ok(None) => {
                self.status = format!("No point near Vg={vg:.2}.");
            }
            Err(err) => {
                self.status = err.to_string();
            }
        }
        true
    }

    fn pick_index(&mut self, index: usize, side: Side) {
        self.status = match self.controller.apply_pick(&mut self.session, index, side, &mut self.view) {
            Ok(outcome) => self.pick_status(outcome),
            Err(err) => err.to_string(),
        };
    }

    fn pick_status(&self, outcome: PickOutcome) -> String {
        match outcome {
            PickOutcome::Unchanged => "Point is already a boundary.".to_string(),
            PickOutcome::Updated => {
                let sel = self.session.selection();
                let series = self.session.series();
                let vg = |i: usize| series.get(i).map(|p| p.gate_voltage()).unwrap_or(f64::NAN);
                format!("high: Vg={:.2} | low: Vg={:.2}", vg(sel.high), vg(sel.low))
            }
        }
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(4), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_chart(frame, chunks[1]);
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("fetx", Style::default().fg(Color::Cyan)),
            Span::raw(format!(
                " | {} ({}/{})",
                self.session.run(),
                self.position.0,
                self.position.1
            )),
        ]));

        let sel = self.session.selection();
        let mut info = format!(
            "points: {} | skipped rows: {} | selection: {}..={}",
            self.session.series().len(),
            self.skipped_rows,
            sel.high,
            sel.low,
        );
        if self.session.low_confidence() {
            info.push_str(" | low confidence");
        }
        lines.push(Line::from(Span::styled(info, Style::default().fg(Color::Gray))));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_chart(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("sqrt|Id| vs Vg").borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let series = self.session.series();
        let (x_bounds, y_bounds) = chart_bounds(series);
        let points: Vec<(f64, f64)> = series
            .points()
            .iter()
            .map(|p| (p.gate_voltage(), p.sqrt_current()))
            .collect();
        let fitted: Vec<(f64, f64)> = points
            .iter()
            .enumerate()
            .filter(|(i, _)| self.view.in_fitted_range(*i))
            .map(|(_, &p)| p)
            .collect();
        let boundaries: Vec<(f64, f64)> = points
            .iter()
            .enumerate()
            .filter(|(i, _)| self.view.is_highlighted(*i))
            .map(|(_, &p)| p)
            .collect();
        let line = self.view.fit().and_then(|fit| clip_line(fit, x_bounds, y_bounds));

        let framed = plot_area(inner);
        let chart_rect = framed.unwrap_or(inner);
        let widget = FetPlottersChart {
            points: &points,
            fitted: &fitted,
            boundaries: &boundaries,
            cursor: points.get(self.cursor).copied(),
            line,
            x_bounds,
            y_bounds,
        };
        frame.render_widget(widget, chart_rect);

        let elements = self.view.elements_mut();
        elements.clear_cells();
        for (index, &p) in points.iter().enumerate() {
            elements.place(index, data_to_cell(p, chart_rect, x_bounds, y_bounds));
        }
        self.geometry = Some(ChartGeometry {
            rect: chart_rect,
            x_bounds,
            y_bounds,
        });

        if framed.is_some() {
            let sel = self.session.selection();
            let boundary_vg: Vec<f64> = [sel.high, sel.low]
                .iter()
                .filter_map(|&i| series.get(i).map(|p| p.gate_voltage()))
                .collect();
            let labels = axis_labels(chart_rect, x_bounds, y_bounds, &boundary_vg, 5);
            draw_axes(frame, inner, chart_rect, labels);
        }
        draw_annotation(frame, chart_rect, self.view.annotation());
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "mouse: right=high left=low  ←/→ cursor  h/l set high/low  n next run  Q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Annotation box in the top-right corner of the chart.
fn draw_annotation(frame: &mut ratatui::Frame<'_>, chart: Rect, text: &str) {
    let lines: Vec<&str> = text.lines().collect();
    let widest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u16;
    let width = widest.min(chart.width);
    let height = (lines.len() as u16).min(chart.height);
    if width == 0 || height == 0 {
        return;
    }
    let rect = Rect {
        x: chart.x + chart.width - width,
        y: chart.y,
        width,
        height,
    };
    let p = Paragraph::new(text.to_string())
        .alignment(Alignment::Right)
        .style(Style::default().fg(Color::White).add_modifier(Modifier::BOLD));
    frame.render_widget(Clear, rect);
    frame.render_widget(p, rect);
}

/// Tick labels plus the two axis titles, clipped to `inner`.
fn draw_axes(frame: &mut ratatui::Frame<'_>, inner: Rect, chart: Rect, labels: Vec<AxisLabel>) {
    let style = Style::default().fg(Color::Gray);
    let inside = |col: u16, row: u16, width: u16| {
        col >= inner.x && row >= inner.y && row < inner.y + inner.height && col + width <= inner.x + inner.width
    };

    for label in labels {
        let width = label.text.len() as u16;
        if inside(label.col, label.row, width) {
            frame.render_widget(
                Paragraph::new(label.text).style(style),
                Rect::new(label.col, label.row, width, 1),
            );
        }
    }

    let title_row = chart.y + chart.height + 1;
    if title_row < inner.y + inner.height {
        frame.render_widget(
            Paragraph::new("Vg (V)").alignment(Alignment::Center).style(style),
            Rect::new(chart.x, title_row, chart.width, 1),
        );
    }
    frame.render_widget(
        Paragraph::new("sqrt|Id|").style(style.add_modifier(Modifier::BOLD)),
        Rect::new(inner.x, inner.y, chart.x.saturating_sub(inner.x + 1).max(1), 1),
    );
}
