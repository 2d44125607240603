//! # Tide Prediction Text Rendering
//!
//! Renders a predicted timeline as an ASCII chart and extremes as a table for
//! terminal output. Both return `String`s so callers decide where they go.

use crate::prediction::{Extreme, TimelinePoint};
use std::fmt::Write;

/// Chart height in text rows
const ROWS: usize = 24;
/// Space for Y-axis labels
const Y_AXIS_WIDTH: usize = 6;
/// Widest plot area; longer timelines are thinned to fit
const MAX_COLUMNS: usize = 144;

/// Format a tide height for display with appropriate precision and sign
fn format_tide_height(level: f64) -> String {
    if level == 0.0 {
        " 0 ".to_string()
    } else if level > 0.0 {
        if level.fract() == 0.0 {
            format!("+{:.0}", level)
        } else {
            format!("+{:.1}", level)
        }
    } else if level.fract() == 0.0 {
        format!("{:.0}", level)
    } else {
        format!("{:.1}", level)
    }
}

/// Calculate the level range of a timeline, widened when it is flat
fn calculate_display_bounds(points: &[TimelinePoint]) -> (f64, f64) {
    let (min, max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| {
            (min.min(p.level), max.max(p.level))
        });
    if max - min < 1e-9 {
        (min - 0.5, max + 0.5)
    } else {
        (min, max)
    }
}

/// Every n-th point so the chart fits in `MAX_COLUMNS`
fn thin(points: &[TimelinePoint]) -> Vec<TimelinePoint> {
    let stride = points.len().div_ceil(MAX_COLUMNS).max(1);
    points.iter().step_by(stride).copied().collect()
}

/// Render a timeline as an ASCII chart. Columns nearest an extreme are
/// marked `H` or `L`.
pub fn draw_ascii(points: &[TimelinePoint], extremes: &[Extreme]) -> String {
    let mut out = String::new();
    if points.is_empty() {
        return out;
    }
    let columns = thin(points);
    let (min_level, max_level) = calculate_display_bounds(&columns);

    let level_to_row = |level: f64| {
        let normalized = (level - min_level) / (max_level - min_level);
        ((1.0 - normalized) * (ROWS as f64 - 1.0))
            .round()
            .clamp(0.0, ROWS as f64 - 1.0) as usize
    };

    let mut grid = vec![vec![' '; columns.len() + Y_AXIS_WIDTH]; ROWS];

    let range = max_level - min_level;
    let step = if range > 4.0 { 1.0 } else { 0.5 };
    let mut label_level = (min_level / step).ceil() * step;
    while label_level <= max_level {
        let row = level_to_row(label_level);
        let label = format!("{:<width$}", format_tide_height(label_level), width = Y_AXIS_WIDTH - 1);
        for (i, ch) in label.chars().take(Y_AXIS_WIDTH - 1).enumerate() {
            grid[row][i] = ch;
        }
        grid[row][Y_AXIS_WIDTH - 1] = '│';
        label_level += step;
    }

    for (column, point) in columns.iter().enumerate() {
        grid[level_to_row(point.level)][column + Y_AXIS_WIDTH] = '•';
    }

    for extreme in extremes {
        let nearest = columns
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| (p.time - extreme.time).num_seconds().abs())
            .map(|(i, _)| i);
        if let Some(column) = nearest {
            let marker = if extreme.high { 'H' } else { 'L' };
            grid[level_to_row(extreme.level)][column + Y_AXIS_WIDTH] = marker;
        }
    }

    for row in grid {
        let _ = writeln!(out, "{}", row.into_iter().collect::<String>().trim_end());
    }

    // Time markers below the chart, one per hour of samples where possible
    let padding = " ".repeat(Y_AXIS_WIDTH);
    let markers: String = columns
        .iter()
        .map(|p| if p.time.format("%M").to_string() == "00" { '|' } else { ' ' })
        .collect();
    let _ = writeln!(out, "{}{}", padding, markers.trim_end());

    let first = columns[0].time.format("%m-%d %H:%M").to_string();
    let last = columns[columns.len() - 1].time.format("%m-%d %H:%M").to_string();
    let gap = columns.len().saturating_sub(first.len() + last.len()).max(1);
    let _ = writeln!(out, "{}{}{}{}", padding, first, " ".repeat(gap), last);
    out
}

/// Render extremes as a table, one per line.
pub fn format_extremes(extremes: &[Extreme]) -> String {
    let mut out = String::new();
    if extremes.is_empty() {
        out.push_str("No high or low water in range\n");
        return out;
    }
    let width = extremes.iter().map(|e| e.label.len()).max().unwrap_or(0);
    for extreme in extremes {
        let _ = writeln!(
            out,
            "{:<width$}  {}  {:>7.3}",
            extreme.label,
            extreme.time.format("%Y-%m-%d %H:%M UTC"),
            extreme.level,
            width = width
        );
    }
    out
}
