//! File ingestion and schema union.
//!
//! Files are parsed independently (in parallel) into [`FileBatch`]es, then
//! merged into one [`Table`] strictly in input order, so the row order is
//! always file order, then source order within the file.

use std::{
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use encoding_rs::{Encoding, UTF_8};
use rayon::prelude::*;

use crate::{
    data::Cell,
    dataset::Table,
    diagnostics::{Diagnostics, Notice},
    error::{IngestError, IngestResult},
    io_utils::{self, DEFAULT_QUOTE, Separator, UNIT_SEPARATOR},
};

/// Tokens read as source-null in addition to empty fields.
pub const DEFAULT_NULL_VALUES: &[&str] = &[
    "NA", "N/A", "n/a", "NULL", "null", "NaN", "nan", "#N/A", "<NA>", "None",
];

#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// `None` picks a separator from each file's extension.
    pub separator: Option<Separator>,
    pub encoding: &'static Encoding,
    /// `None` disables quote handling entirely.
    pub quote: Option<u8>,
    pub null_values: Vec<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            separator: None,
            encoding: UTF_8,
            quote: Some(DEFAULT_QUOTE),
            null_values: DEFAULT_NULL_VALUES.iter().map(|v| v.to_string()).collect(),
        }
    }
}

impl ReadOptions {
    pub fn with_separator(mut self, separator: Separator) -> Self {
        self.separator = Some(separator);
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_quote(mut self, quote: Option<u8>) -> Self {
        self.quote = quote;
        self
    }

    pub fn with_null_values(mut self, values: Vec<String>) -> Self {
        self.null_values = values;
        self
    }

    fn to_cell(&self, value: String) -> Cell {
        if value.is_empty() || self.null_values.iter().any(|token| *token == value) {
            Cell::Null
        } else {
            Cell::Text(value)
        }
    }
}

/// The parsed content of one source file.
#[derive(Debug, Clone)]
pub struct FileBatch {
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub added_columns: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub files: Vec<FileSummary>,
}

impl IngestReport {
    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }
}

/// Reads every file and unions them into one table.
///
/// Any unreadable or malformed file fails the whole call; no partial table
/// is returned.
pub fn ingest_files(
    paths: &[PathBuf],
    options: &ReadOptions,
    diagnostics: &dyn Diagnostics,
) -> IngestResult<(Table, IngestReport)> {
    if paths.is_empty() {
        return Err(IngestError::NoInputs);
    }
    let batches = paths
        .par_iter()
        .map(|path| read_file(path, options))
        .collect::<IngestResult<Vec<_>>>()?;

    let mut table = Table::new();
    let mut report = IngestReport::default();
    for (position, batch) in batches.into_iter().enumerate() {
        let FileBatch {
            path,
            headers,
            rows,
        } = batch;
        let row_count = rows.len();
        diagnostics.notice(Notice::FileRead {
            path: path.clone(),
            rows: row_count,
            columns: headers.len(),
        });
        let added = table
            .append_batch(&headers, rows)
            .map_err(|source| IngestError::RowShape {
                path: path.clone(),
                source,
            })?;
        if position > 0 {
            for column in &added {
                diagnostics.notice(Notice::ColumnAdded {
                    column: column.clone(),
                    path: path.clone(),
                });
            }
        }
        report.files.push(FileSummary {
            path,
            rows: row_count,
            added_columns: added,
        });
    }
    Ok((table, report))
}

pub fn read_file(path: &Path, options: &ReadOptions) -> IngestResult<FileBatch> {
    let separator = options
        .separator
        .clone()
        .unwrap_or_else(|| Separator::for_path(path));
    match separator {
        Separator::Byte(delimiter) => {
            let file = File::open(path).map_err(|source| IngestError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            let reader = io_utils::open_csv_reader(BufReader::new(file), delimiter, options.quote);
            read_records(path, reader, options.encoding, options)
        }
        Separator::Sequence(sequence) => {
            let bytes = fs::read(path).map_err(|source| IngestError::Open {
                path: path.to_path_buf(),
                source,
            })?;
            let text = io_utils::decode_bytes(&bytes, options.encoding).ok_or_else(|| {
                IngestError::Decode {
                    path: path.to_path_buf(),
                    line: first_bad_line(&bytes, options.encoding),
                    encoding: options.encoding.name(),
                }
            })?;
            if text.contains(UNIT_SEPARATOR as char) {
                return Err(IngestError::SeparatorConflict {
                    path: path.to_path_buf(),
                });
            }
            let rewritten = io_utils::rewrite_separator(&text, &sequence, options.quote);
            let reader =
                io_utils::open_csv_reader(rewritten.as_bytes(), UNIT_SEPARATOR, options.quote);
            read_records(path, reader, UTF_8, options)
        }
    }
}

fn read_records<R: std::io::Read>(
    path: &Path,
    mut reader: csv::Reader<R>,
    encoding: &'static Encoding,
    options: &ReadOptions,
) -> IngestResult<FileBatch> {
    let malformed = |source: csv::Error| IngestError::Malformed {
        path: path.to_path_buf(),
        line: source.position().map(|p| p.line()),
        source,
    };
    let header_record = reader.byte_headers().map_err(malformed)?.clone();
    if header_record.is_empty() {
        return Err(IngestError::MissingHeader {
            path: path.to_path_buf(),
        });
    }
    let headers =
        io_utils::decode_record(&header_record, encoding).ok_or_else(|| IngestError::Decode {
            path: path.to_path_buf(),
            line: 1,
            encoding: encoding.name(),
        })?;

    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record).map_err(malformed)? {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let decoded =
            io_utils::decode_record(&record, encoding).ok_or_else(|| IngestError::Decode {
                path: path.to_path_buf(),
                line,
                encoding: encoding.name(),
            })?;
        rows.push(
            decoded
                .into_iter()
                .map(|value| options.to_cell(value))
                .collect(),
        );
    }
    Ok(FileBatch {
        path: path.to_path_buf(),
        headers,
        rows,
    })
}

fn first_bad_line(bytes: &[u8], encoding: &'static Encoding) -> u64 {
    bytes
        .split(|b| *b == b'\n')
        .position(|line| io_utils::decode_bytes(line, encoding).is_none())
        .map(|idx| idx as u64 + 1)
        .unwrap_or(1)
}
