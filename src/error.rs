//! Typed errors for each pipeline stage.
//!
//! Computational stages (ingestion, normalization) fail fatally. Date
//! conversion under the `raise` policy fails in a resumable way, and the
//! loader is the only stage with a per-chunk resume path. Every error names
//! the file, column, row or chunk it concerns when that is known.

use std::{io, ops::Range, path::PathBuf};

use thiserror::Error;

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("no input files were provided")]
    NoInputs,

    #[error("input directory {path:?} could not be scanned: {message}")]
    Discovery { path: PathBuf, message: String },

    #[error("cannot open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path:?} has no header row")]
    MissingHeader { path: PathBuf },

    #[error("malformed row in {path:?}{}: {source}", line_suffix(.line))]
    Malformed {
        path: PathBuf,
        line: Option<u64>,
        #[source]
        source: csv::Error,
    },

    #[error("{path:?} line {line} is not valid {encoding}")]
    Decode {
        path: PathBuf,
        line: u64,
        encoding: &'static str,
    },

    #[error(
        "{path:?} already contains the unit separator (0x1F); it cannot be read with a multi-character separator"
    )]
    SeparatorConflict { path: PathBuf },

    #[error("{path:?}: {source}")]
    RowShape {
        path: PathBuf,
        #[source]
        source: RowShapeError,
    },
}

fn line_suffix(line: &Option<u64>) -> String {
    line.map(|line| format!(" at line {line}")).unwrap_or_default()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("column {position} ('{original}') normalizes to an empty identifier")]
    EmptyIdentifier { original: String, position: usize },

    #[error("column '{original}' normalizes to '{identifier}', which is already taken")]
    Collision { original: String, identifier: String },
}

/// Raised by the `raise` date policy on the first cell that cannot be read
/// as a date. The table is left untouched, so the caller can retry the
/// stage with `coerce` or `ignore`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error(
    "column '{column}' row {row}: '{value}' is not a recognizable date; re-run with date policy `coerce` to null it or `ignore` to keep it as text"
)]
pub struct DateConversionError {
    pub column: String,
    /// 1-based data row (the header is not counted).
    pub row: usize,
    pub value: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("column '{column}' has {found} row(s) but the table has {expected}")]
pub struct ShapeError {
    pub column: String,
    pub expected: usize,
    pub found: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("row {row} has {found} cell(s) but the header has {expected}")]
pub struct RowShapeError {
    /// 1-based row within the batch.
    pub row: usize,
    pub expected: usize,
    pub found: usize,
}

/// Structured failure reported by a destination for a single chunk write.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DestinationError {
    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("value too long{}: {message}", column_suffix(.column))]
    ValueTooLong {
        column: Option<String>,
        width: Option<usize>,
        message: String,
    },

    #[error("value type mismatch{}: {message}", column_suffix(.column))]
    TypeMismatch {
        column: Option<String>,
        expected: Option<String>,
        message: String,
    },

    #[error("{message}")]
    Other { message: String },
}

fn column_suffix(column: &Option<String>) -> String {
    column
        .as_ref()
        .map(|column| format!(" in column '{column}'"))
        .unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,

    #[error(
        "load aborted at chunk {chunk} (rows {rows:?}) after {committed_rows} committed row(s): {cause}"
    )]
    Aborted {
        chunk: usize,
        rows: Range<usize>,
        committed_rows: usize,
        #[source]
        cause: DestinationError,
    },

    #[error("load cancelled before chunk {next_chunk} after {committed_rows} committed row(s)")]
    Cancelled {
        next_chunk: usize,
        committed_rows: usize,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    DateConversion(#[from] DateConversionError),

    #[error(transparent)]
    Load(#[from] LoadError),
}
