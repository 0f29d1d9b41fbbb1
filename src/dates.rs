//! Date-column detection and conversion.
//!
//! A column is treated as date-bearing when its name starts or ends with
//! `dt`/`date`, or when its first row looks like a three-part numeric date
//! that the general parser accepts. Only row 0 is inspected for the content
//! rule, so a column whose first value is atypical is missed; that is a
//! known limitation of the heuristic and the `ignore`/`coerce` policies are
//! how misclassified values surface.

use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    data::{self, Cell, DateFormat},
    dataset::{Column, ColumnKind, Table},
    diagnostics::{Diagnostics, Notice},
    error::DateConversionError,
};

static DATE_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d{1}|\d{2}|\d{4})[^0-9a-zA-Z]\d{1,4}[^0-9a-zA-Z](?:\d{1}|\d{2}|\d{4})")
        .expect("date shape pattern compiles")
});

/// What to do with a cell in a date column that cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// Replace the cell with null.
    #[default]
    Coerce,
    /// Keep the original text; the column stays mixed.
    Ignore,
    /// Stop and report the cell.
    Raise,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateColumnReport {
    pub column: String,
    pub format: Option<&'static str>,
    pub converted: usize,
    pub failed: usize,
    /// Whether the column ended up date-typed.
    pub is_date: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateReport {
    pub columns: Vec<DateColumnReport>,
}

impl DateReport {
    pub fn date_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| c.is_date)
            .map(|c| c.column.as_str())
    }
}

pub fn is_date_name(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    ["dt", "date"]
        .iter()
        .any(|piece| lowered.starts_with(piece) || lowered.ends_with(piece))
}

/// Content rule: a `d{1,2,4} sep d{1-4} sep d{1,2,4}` prefix that the
/// general parser can also read.
pub fn looks_like_date(value: &str) -> bool {
    let value = value.trim();
    DATE_SHAPE.is_match(value) && data::parse_datetime(value).is_some()
}

pub fn qualifies(column: &Column) -> bool {
    if is_date_name(&column.name) {
        return true;
    }
    match column.cells.first() {
        Some(Cell::Text(value)) => looks_like_date(value),
        Some(Cell::DateTime(_)) => true,
        _ => false,
    }
}

struct Conversion {
    position: usize,
    cells: Vec<Cell>,
    kind: ColumnKind,
    report: DateColumnReport,
}

/// Converts every qualifying column to date-times.
///
/// All conversions are computed before any column is replaced, so under
/// [`DatePolicy::Raise`] an error leaves the table exactly as it was and the
/// caller may retry with another policy.
pub fn infer_dates(
    table: &mut Table,
    policy: DatePolicy,
    diagnostics: &dyn Diagnostics,
) -> Result<DateReport, DateConversionError> {
    let mut conversions = Vec::new();
    for (position, column) in table.columns().iter().enumerate() {
        if qualifies(column) {
            conversions.push(convert_column(position, column, policy)?);
        }
    }

    let mut report = DateReport::default();
    let columns = table.columns_mut();
    for conversion in conversions {
        let column = &mut columns[conversion.position];
        column.cells = conversion.cells;
        column.kind = conversion.kind;
        diagnostics.notice(Notice::DateColumnConverted {
            column: conversion.report.column.clone(),
            converted: conversion.report.converted,
            failed: conversion.report.failed,
            is_date: conversion.report.is_date,
        });
        report.columns.push(conversion.report);
    }
    Ok(report)
}

fn convert_column(
    position: usize,
    column: &Column,
    policy: DatePolicy,
) -> Result<Conversion, DateConversionError> {
    // The column's format is whatever reads its first value; other layouts
    // are still tried cell by cell.
    let format = column
        .cells
        .iter()
        .find_map(Cell::as_text)
        .and_then(data::detect_date_format);

    let mut cells = Vec::with_capacity(column.cells.len());
    let mut converted = 0usize;
    let mut failed = 0usize;
    for (row, cell) in column.cells.iter().enumerate() {
        let text = match cell {
            Cell::Null => {
                cells.push(Cell::Null);
                continue;
            }
            Cell::DateTime(value) => {
                converted += 1;
                cells.push(Cell::DateTime(*value));
                continue;
            }
            Cell::Text(text) => text,
        };
        match parse_with(format, text) {
            Some(parsed) => {
                converted += 1;
                cells.push(Cell::DateTime(parsed));
            }
            None => {
                failed += 1;
                match policy {
                    DatePolicy::Coerce => cells.push(Cell::Null),
                    DatePolicy::Ignore => cells.push(cell.clone()),
                    DatePolicy::Raise => {
                        return Err(DateConversionError {
                            column: column.name.clone(),
                            row: row + 1,
                            value: text.clone(),
                        });
                    }
                }
            }
        }
    }

    let is_date = policy != DatePolicy::Ignore || failed == 0;
    Ok(Conversion {
        position,
        cells,
        kind: if is_date {
            ColumnKind::Date
        } else {
            ColumnKind::Text
        },
        report: DateColumnReport {
            column: column.name.clone(),
            format: format.map(|f| f.pattern()),
            converted,
            failed,
            is_date,
        },
    })
}

fn parse_with(format: Option<DateFormat>, text: &str) -> Option<chrono::NaiveDateTime> {
    let trimmed = text.trim();
    format
        .and_then(|f| f.parse(trimmed))
        .or_else(|| data::parse_datetime(trimmed))
}
