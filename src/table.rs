//! Plain-text table rendering for terminal output.

use std::fmt::Write as _;

use itertools::Itertools;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Renders `rows` under `headers` with two-space gutters and a dashed rule.
/// Cells beyond the header count are dropped; `aligns` defaults to left.
pub fn render_table(headers: &[&str], aligns: &[Align], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(flatten(cell).chars().count());
        }
    }

    let mut output = String::new();
    let header = headers.iter().map(|h| h.to_string());
    let _ = writeln!(output, "{}", format_line(header, &widths, aligns));
    let rule = widths.iter().map(|w| "-".repeat(*w));
    let _ = writeln!(output, "{}", format_line(rule, &widths, aligns));
    for row in rows {
        let cells = row.iter().map(|c| flatten(c));
        let _ = writeln!(output, "{}", format_line(cells, &widths, aligns));
    }
    output
}

pub fn print_table(headers: &[&str], aligns: &[Align], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, aligns, rows));
}

fn format_line(cells: impl Iterator<Item = String>, widths: &[usize], aligns: &[Align]) -> String {
    let line = cells
        .zip(widths)
        .enumerate()
        .map(|(idx, (cell, width))| match aligns.get(idx).copied().unwrap_or(Align::Left) {
            Align::Left => format!("{cell:<width$}"),
            Align::Right => format!("{cell:>width$}"),
        })
        .join("  ");
    line.trim_end().to_string()
}

fn flatten(value: &str) -> String {
    value.replace(['\n', '\r', '\t'], " ")
}
