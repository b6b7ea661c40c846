//! ASCII plotting for batch mode.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal or a log file
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - measured points: `o`
//! - selected boundaries: `H` (high) and `L` (low)
//! - fitted line: `-`, clipped to the data range

use crate::domain::{FitResult, Selection, Series};

/// Render `sqrt|Id|` against `Vg` for one run.
pub fn render_ascii_plot(
    series: &Series,
    selection: Option<&Selection>,
    fit: Option<&FitResult>,
    width: usize,
    height: usize,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let Some((x_min, x_max)) = series.gate_voltage_bounds() else {
        return "Plot: no data\n".to_string();
    };
    let (x_min, x_max) = if x_max > x_min {
        (x_min, x_max)
    } else {
        (x_min - 0.5, x_max + 0.5)
    };

    let (y_min, y_max) = y_range(series).unwrap_or((0.0, 1.0));
    let (y_min, y_max) = pad_range(y_min, y_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    // Line first so points overlay it.
    if let Some(fit) = fit {
        let line = sample_line(fit, x_min, x_max, width);
        draw_clipped(&mut grid, &line, (x_min, x_max), (y_min, y_max));
    }

    for p in series.points() {
        let x = map_x(p.gate_voltage(), x_min, x_max, width);
        let y = map_y(p.sqrt_current(), y_min, y_max, height);
        grid[y][x] = 'o';
    }

    if let Some(sel) = selection {
        for (index, ch) in [(sel.high, 'H'), (sel.low, 'L')] {
            if let Some(p) = series.get(index) {
                let x = map_x(p.gate_voltage(), x_min, x_max, width);
                let y = map_y(p.sqrt_current(), y_min, y_max, height);
                grid[y][x] = ch;
            }
        }
    }

    let mut out = String::new();
    out.push_str(&format!(
        "Plot: Vg=[{x_min:.3}, {x_max:.3}] V | sqrt|Id|=[{y_min:.3e}, {y_max:.3e}]\n"
    ));

    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }

    out
}

fn y_range(series: &Series) -> Option<(f64, f64)> {
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for p in series.points() {
        min_y = min_y.min(p.sqrt_current());
        max_y = max_y.max(p.sqrt_current());
    }

    if min_y.is_finite() && max_y.is_finite() && max_y > min_y {
        Some((min_y, max_y))
    } else {
        None
    }
}

fn sample_line(fit: &FitResult, x_min: f64, x_max: f64, n: usize) -> Vec<(f64, f64)> {
    let n = n.max(2);
    (0..n)
        .map(|i| {
            let u = i as f64 / (n as f64 - 1.0);
            let x = x_min + u * (x_max - x_min);
            (x, fit.predict(x))
        })
        .collect()
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(x: f64, x_min: f64, x_max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((x - x_min) / (x_max - x_min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(y: f64, y_min: f64, y_max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((y - y_min) / (y_max - y_min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Draw the polyline, skipping samples that fall outside the y range.
fn draw_clipped(grid: &mut [Vec<char>], line: &[(f64, f64)], x: (f64, f64), y: (f64, f64)) {
    let height = grid.len();
    let width = grid[0].len();

    let mut prev = None;
    for &(lx, ly) in line {
        if !(ly.is_finite() && ly >= y.0 && ly <= y.1) {
            prev = None;
            continue;
        }
        let cx = map_x(lx, x.0, x.1, width);
        let cy = map_y(ly, y.0, y.1, height);
        if let Some((x0, y0)) = prev {
            draw_line(grid, x0, y0, cx, cy, '-');
        } else {
            grid[cy][cx] = '-';
        }
        prev = Some((cx, cy));
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0
            && (y0 as usize) < grid.len()
            && x0 >= 0
            && (x0 as usize) < grid[0].len()
            && grid[y0 as usize][x0 as usize] == ' '
        {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}
