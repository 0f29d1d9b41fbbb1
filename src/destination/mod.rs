//! Relational destinations for the batch loader.
//!
//! A [`Destination`] receives one [`ChunkWrite`] at a time and either commits
//! all of its rows or none of them, reporting failures as a classified
//! [`DestinationError`].

pub mod memory;
pub mod sqlite;

use std::{fmt, ops::Range};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    data::Cell,
    dataset::{ColumnKind, Table},
    error::DestinationError,
    profile::WidthProfile,
};

pub use memory::MemoryDestination;
pub use sqlite::SqliteDestination;

/// How the first chunk treats an existing table of the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[value(rename_all = "kebab-case")]
#[serde(rename_all = "snake_case")]
pub enum ConflictMode {
    /// Refuse to write if the table already exists.
    #[default]
    Fail,
    /// Create the table when missing, otherwise add rows to it.
    Append,
    /// Drop any existing table and create it anew.
    Replace,
}

impl fmt::Display for ConflictMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConflictMode::Fail => "fail",
            ConflictMode::Append => "append",
            ConflictMode::Replace => "replace",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "width", rename_all = "snake_case")]
pub enum SqlType {
    Varchar(usize),
    Timestamp,
    /// Unbounded text, used for clob fallbacks and all-null columns.
    Text,
}

impl SqlType {
    pub fn width(&self) -> Option<usize> {
        match self {
            SqlType::Varchar(width) => Some(*width),
            _ => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Varchar(width) => write!(f, "varchar({width})"),
            SqlType::Timestamp => f.write_str("timestamp"),
            SqlType::Text => f.write_str("text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: SqlType,
}

/// Derives the destination type of every column from its kind and the width
/// profile.
pub fn plan_columns(table: &Table, profile: &WidthProfile) -> Vec<ColumnSpec> {
    table
        .columns()
        .iter()
        .map(|column| {
            let sql_type = match column.kind {
                ColumnKind::Date => SqlType::Timestamp,
                _ => match profile.width(&column.name) {
                    // A zero width is not a legal varchar; those columns only
                    // hold empty strings, which cleaning already nulled.
                    Some(width) if width > 0 => SqlType::Varchar(width),
                    _ => SqlType::Text,
                },
            };
            ColumnSpec {
                name: column.name.clone(),
                sql_type,
            }
        })
        .collect()
}

/// One chunk of rows to be written atomically.
#[derive(Debug, Clone)]
pub struct ChunkWrite<'a> {
    pub table_name: &'a str,
    pub columns: &'a [ColumnSpec],
    pub mode: ConflictMode,
    /// 1-based chunk number.
    pub index: usize,
    pub table: &'a Table,
    pub rows: Range<usize>,
}

impl<'a> ChunkWrite<'a> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&'a Cell>> + 'a {
        self.table.rows(self.rows.clone())
    }
}

pub trait Destination {
    /// Writes every row of `chunk` or none of them.
    fn write_chunk(&mut self, chunk: &ChunkWrite<'_>) -> Result<(), DestinationError>;
}

impl<D: Destination + ?Sized> Destination for &mut D {
    fn write_chunk(&mut self, chunk: &ChunkWrite<'_>) -> Result<(), DestinationError> {
        (**self).write_chunk(chunk)
    }
}

impl<D: Destination + ?Sized> Destination for Box<D> {
    fn write_chunk(&mut self, chunk: &ChunkWrite<'_>) -> Result<(), DestinationError> {
        (**self).write_chunk(chunk)
    }
}

/// Checks a row against the column plan the way a strict relational store
/// would, returning the first violation.
pub(crate) fn check_row(columns: &[ColumnSpec], row: &[&Cell]) -> Result<(), DestinationError> {
    for (spec, cell) in columns.iter().zip(row) {
        match (spec.sql_type, cell) {
            (_, Cell::Null) => {}
            (SqlType::Timestamp, Cell::Text(value)) => {
                return Err(DestinationError::TypeMismatch {
                    column: Some(spec.name.clone()),
                    expected: Some(spec.sql_type.to_string()),
                    message: format!("'{value}' is not a timestamp"),
                });
            }
            (SqlType::Varchar(width), cell) if cell.text_len() > width => {
                return Err(DestinationError::ValueTooLong {
                    column: Some(spec.name.clone()),
                    width: Some(width),
                    message: format!(
                        "value of {} character(s) exceeds varchar({width})",
                        cell.text_len()
                    ),
                });
            }
            _ => {}
        }
    }
    Ok(())
}
