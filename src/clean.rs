//! Cell-level content cleaning.

use rayon::prelude::*;

use crate::{
    data::Cell,
    dataset::Table,
    diagnostics::{Diagnostics, Notice},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Text cells turned into null because they were blank.
    pub blanked: usize,
    /// Text cells that lost at least one non-ASCII character.
    pub stripped: usize,
}

/// Normalizes one cell: non-ASCII characters are dropped from text, and text
/// that is then empty or whitespace-only becomes null.
pub fn clean_cell(cell: &mut Cell, report: &mut CleanReport) {
    let Cell::Text(value) = cell else {
        return;
    };
    if !value.is_ascii() {
        value.retain(|ch| ch.is_ascii());
        report.stripped += 1;
    }
    if value.trim().is_empty() {
        *cell = Cell::Null;
        report.blanked += 1;
    }
}

/// Cleans every cell of the table in place. Column names, column count and
/// row order are untouched.
pub fn clean_table(table: &mut Table, diagnostics: &dyn Diagnostics) -> CleanReport {
    let report = table
        .columns_mut()
        .par_iter_mut()
        .map(|column| {
            let mut report = CleanReport::default();
            for cell in column.cells.iter_mut() {
                clean_cell(cell, &mut report);
            }
            column.refresh_kind();
            report
        })
        .reduce(CleanReport::default, |a, b| CleanReport {
            blanked: a.blanked + b.blanked,
            stripped: a.stripped + b.stripped,
        });
    diagnostics.notice(Notice::CellsCleaned {
        blanked: report.blanked,
        stripped: report.stripped,
    });
    report
}
