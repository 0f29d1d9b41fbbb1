//! SQLite destination.
//!
//! Every chunk runs in its own transaction. Fixed-width and timestamp
//! columns carry named `CHECK` constraints (`ck_width_<column>`,
//! `ck_type_<column>`) so that a rejected row can be traced back to the
//! column that caused it.

use std::path::Path;

use rusqlite::{Connection, ErrorCode, params_from_iter, types::Value};

use crate::{
    data::{Cell, DATETIME_TEXT_FORMAT},
    error::DestinationError,
};

use super::{ChunkWrite, ColumnSpec, ConflictMode, Destination, SqlType};

const WIDTH_CHECK_PREFIX: &str = "ck_width_";
const TYPE_CHECK_PREFIX: &str = "ck_type_";

pub struct SqliteDestination {
    conn: Connection,
}

impl SqliteDestination {
    pub fn open(path: &Path) -> Result<Self, DestinationError> {
        let conn = Connection::open(path).map_err(|err| DestinationError::Transport {
            message: format!("cannot open {path:?}: {err}"),
        })?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self, DestinationError> {
        let conn = Connection::open_in_memory().map_err(|err| DestinationError::Transport {
            message: err.to_string(),
        })?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn write(&mut self, chunk: &ChunkWrite<'_>) -> rusqlite::Result<()> {
        let tx = self.conn.transaction()?;
        match chunk.mode {
            ConflictMode::Fail => {
                tx.execute_batch(&create_table_sql(chunk.table_name, chunk.columns, false))?
            }
            ConflictMode::Append => {
                tx.execute_batch(&create_table_sql(chunk.table_name, chunk.columns, true))?
            }
            ConflictMode::Replace => {
                tx.execute_batch(&format!(
                    "DROP TABLE IF EXISTS {};",
                    quote_identifier(chunk.table_name)
                ))?;
                tx.execute_batch(&create_table_sql(chunk.table_name, chunk.columns, false))?;
            }
        }
        {
            let mut stmt = tx.prepare(&insert_sql(chunk.table_name, chunk.columns))?;
            for row in chunk.rows() {
                stmt.execute(params_from_iter(row.into_iter().map(to_value)))?;
            }
        }
        tx.commit()
    }

    fn classify(&self, chunk: &ChunkWrite<'_>, err: rusqlite::Error) -> DestinationError {
        let message = err.to_string();
        let rusqlite::Error::SqliteFailure(failure, detail) = &err else {
            return DestinationError::Other { message };
        };
        match failure.code {
            ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::DiskFull => DestinationError::Transport { message },
            ErrorCode::TooBig => DestinationError::ValueTooLong {
                column: None,
                width: None,
                message,
            },
            ErrorCode::TypeMismatch => DestinationError::TypeMismatch {
                column: None,
                expected: None,
                message,
            },
            ErrorCode::ConstraintViolation => {
                let detail = detail.as_deref().unwrap_or_default();
                if let Some(column) = constraint_column(detail, WIDTH_CHECK_PREFIX) {
                    let width = self
                        .column_type(chunk, &column)
                        .and_then(|sql_type| sql_type.width());
                    DestinationError::ValueTooLong {
                        column: Some(column),
                        width,
                        message,
                    }
                } else if let Some(column) = constraint_column(detail, TYPE_CHECK_PREFIX) {
                    let expected = self
                        .column_type(chunk, &column)
                        .map(|sql_type| sql_type.to_string());
                    DestinationError::TypeMismatch {
                        column: Some(column),
                        expected,
                        message,
                    }
                } else {
                    DestinationError::Other { message }
                }
            }
            _ => DestinationError::Other { message },
        }
    }
}

impl SqliteDestination {
    /// Type of `column` as the destination table declares it, falling back to
    /// this run's plan when the table did not exist before the chunk.
    fn column_type(&self, chunk: &ChunkWrite<'_>, column: &str) -> Option<SqlType> {
        let declared: Option<String> = self
            .conn
            .query_row(
                "SELECT type FROM pragma_table_info(?1) WHERE name = ?2",
                [chunk.table_name, column],
                |row| row.get(0),
            )
            .ok();
        declared
            .as_deref()
            .and_then(parse_declared_type)
            .or_else(|| find_spec(chunk.columns, column).map(|spec| spec.sql_type))
    }
}

impl Destination for SqliteDestination {
    fn write_chunk(&mut self, chunk: &ChunkWrite<'_>) -> Result<(), DestinationError> {
        self.write(chunk).map_err(|err| self.classify(chunk, err))
    }
}

fn find_spec<'a>(columns: &'a [ColumnSpec], name: &str) -> Option<&'a ColumnSpec> {
    columns.iter().find(|spec| spec.name == name)
}

fn parse_declared_type(declared: &str) -> Option<SqlType> {
    let lowered = declared.trim().to_ascii_lowercase();
    if lowered == "timestamp" {
        return Some(SqlType::Timestamp);
    }
    if lowered == "text" {
        return Some(SqlType::Text);
    }
    let width = lowered.strip_prefix("varchar(")?.strip_suffix(')')?;
    width.trim().parse().ok().map(SqlType::Varchar)
}

/// Pulls the column name out of a `CHECK constraint failed: ck_width_<col>`
/// message.
fn constraint_column(detail: &str, prefix: &str) -> Option<String> {
    let start = detail.find(prefix)? + prefix.len();
    let column: String = detail[start..]
        .chars()
        .take_while(|ch| !ch.is_whitespace() && *ch != '"')
        .collect();
    (!column.is_empty()).then_some(column)
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(table: &str, columns: &[ColumnSpec], if_not_exists: bool) -> String {
    let mut definitions = Vec::with_capacity(columns.len());
    for spec in columns {
        let column = quote_identifier(&spec.name);
        let definition = match spec.sql_type {
            SqlType::Varchar(width) => format!(
                "{column} VARCHAR({width}) CONSTRAINT {} CHECK ({column} IS NULL OR length({column}) <= {width})",
                quote_identifier(&format!("{WIDTH_CHECK_PREFIX}{}", spec.name))
            ),
            SqlType::Timestamp => format!(
                "{column} TIMESTAMP CONSTRAINT {} CHECK ({column} IS NULL OR datetime({column}) IS NOT NULL)",
                quote_identifier(&format!("{TYPE_CHECK_PREFIX}{}", spec.name))
            ),
            SqlType::Text => format!("{column} TEXT"),
        };
        definitions.push(definition);
    }
    format!(
        "CREATE TABLE {}{} ({});",
        if if_not_exists { "IF NOT EXISTS " } else { "" },
        quote_identifier(table),
        definitions.join(", ")
    )
}

fn insert_sql(table: &str, columns: &[ColumnSpec]) -> String {
    let names = columns
        .iter()
        .map(|spec| quote_identifier(&spec.name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "INSERT INTO {} ({names}) VALUES ({placeholders})",
        quote_identifier(table)
    )
}

fn to_value(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Text(value) => Value::Text(value.clone()),
        Cell::DateTime(value) => Value::Text(value.format(DATETIME_TEXT_FORMAT).to_string()),
    }
}
