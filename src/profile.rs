//! String-width profiling.
//!
//! Many relational backends store untyped text as unbounded large objects,
//! which are slow and often unindexable. The profile gives every text column
//! an explicit width equal to its longest value, except columns longer than
//! [`CLOB_THRESHOLD`], which are left to the destination's large-text type.

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    data::Cell,
    dataset::{ColumnKind, Table},
    diagnostics::{Diagnostics, Notice},
};

pub const CLOB_THRESHOLD: usize = 4000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidthEntry {
    pub column: String,
    pub width: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidthProfile {
    /// Fixed-width columns, in table order.
    pub widths: Vec<WidthEntry>,
    /// Columns too long for a fixed width, with their longest length.
    pub clob_columns: Vec<WidthEntry>,
}

impl WidthProfile {
    pub fn width(&self, column: &str) -> Option<usize> {
        self.widths
            .iter()
            .find(|entry| entry.column == column)
            .map(|entry| entry.width)
    }

    pub fn is_clob(&self, column: &str) -> bool {
        self.clob_columns.iter().any(|entry| entry.column == column)
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating profile file {path:?}"))?;
        serde_json::to_writer_pretty(file, self).context("Writing width profile JSON")
    }
}

/// Coerces every non-date column to text and measures it.
///
/// Date columns and all-null columns are left out of the profile. After this
/// call the table's schema must be treated as frozen.
pub fn profile_widths(table: &mut Table, diagnostics: &dyn Diagnostics) -> WidthProfile {
    let mut profile = WidthProfile::default();
    for column in table.columns_mut() {
        if column.kind == ColumnKind::Date {
            continue;
        }
        for cell in column.cells.iter_mut() {
            if let Cell::DateTime(_) = cell {
                *cell = std::mem::take(cell).into_text();
            }
        }
        column.refresh_kind();
        if column.kind == ColumnKind::NullAll {
            continue;
        }
        let width = column.cells.iter().map(Cell::text_len).max().unwrap_or(0);
        let entry = WidthEntry {
            column: column.name.clone(),
            width,
        };
        if width > CLOB_THRESHOLD {
            diagnostics.notice(Notice::ClobFallback {
                column: column.name.clone(),
                width,
            });
            profile.clob_columns.push(entry);
        } else {
            diagnostics.notice(Notice::WidthProfiled {
                column: column.name.clone(),
                width,
            });
            profile.widths.push(entry);
        }
    }
    profile
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Column;
    use crate::diagnostics::CapturingDiagnostics;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn stamp() -> Cell {
        Cell::DateTime(
            NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        )
    }

    #[test]
    fn width_is_longest_value() {
        let mut table = Table::from_columns(vec![Column::new(
            "name",
            vec![Cell::text("a".repeat(37)), Cell::text("short"), Cell::Null],
        )])
        .unwrap();
        let profile = profile_widths(&mut table, &CapturingDiagnostics::new());
        assert_eq!(profile.width("name"), Some(37));
        assert!(profile.clob_columns.is_empty());
    }

    #[test]
    fn long_columns_fall_back_to_clob_and_are_reported() {
        let mut table = Table::from_columns(vec![
            Column::new("body", vec![Cell::text("x".repeat(5000))]),
            Column::new("edge", vec![Cell::text("y".repeat(CLOB_THRESHOLD))]),
        ])
        .unwrap();
        let sink = CapturingDiagnostics::new();
        let profile = profile_widths(&mut table, &sink);
        assert_eq!(profile.width("body"), None);
        assert!(profile.is_clob("body"));
        assert_eq!(profile.width("edge"), Some(CLOB_THRESHOLD));
        assert!(sink.notices().contains(&Notice::ClobFallback {
            column: "body".to_string(),
            width: 5000,
        }));
    }

    #[test]
    fn date_and_null_columns_are_not_profiled() {
        let mut date = Column::new("dt", vec![stamp()]);
        date.kind = ColumnKind::Date;
        let mut table = Table::from_columns(vec![
            date,
            Column::new("empty", vec![Cell::Null]),
        ])
        .unwrap();
        let profile = profile_widths(&mut table, &CapturingDiagnostics::new());
        assert!(profile.is_empty());
        assert_eq!(table.columns()[0].cells[0], stamp());
    }

    #[test]
    fn mixed_columns_are_coerced_to_text() {
        let mut table = Table::from_columns(vec![Column::new(
            "dt",
            vec![stamp(), Cell::text("soon"), Cell::Null],
        )])
        .unwrap();
        let profile = profile_widths(&mut table, &CapturingDiagnostics::new());
        let cells = &table.columns()[0].cells;
        assert_eq!(cells[0], Cell::text("2024-01-05 09:30:00"));
        assert_eq!(cells[2], Cell::Null);
        assert_eq!(profile.width("dt"), Some(19));
    }

    #[test]
    fn save_writes_pretty_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("profile.json");
        let profile = WidthProfile {
            widths: vec![WidthEntry {
                column: "name".to_string(),
                width: 12,
            }],
            clob_columns: Vec::new(),
        };
        profile.save(&path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"column\": \"name\""));
        assert!(written.contains("\"width\": 12"));
    }
}
