use std::{
    collections::{HashMap, VecDeque},
    ops::Range,
};

use crate::{data::Cell, error::DestinationError};

use super::{ChunkWrite, ColumnSpec, ConflictMode, Destination, check_row};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTable {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<Cell>>,
}

impl StoredTable {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub chunk: usize,
    pub rows: Range<usize>,
    pub committed: bool,
}

/// In-memory destination that enforces column widths and timestamp types.
///
/// Failures can be scripted per chunk with [`MemoryDestination::fail_chunk`];
/// each scripted error is consumed by one attempt.
#[derive(Debug, Default)]
pub struct MemoryDestination {
    tables: HashMap<String, StoredTable>,
    scripted: HashMap<usize, VecDeque<DestinationError>>,
    attempts: Vec<Attempt>,
}

impl MemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next attempt at chunk `index` fail with `error`. Calling it
    /// repeatedly queues further failures for the same chunk.
    pub fn fail_chunk(&mut self, index: usize, error: DestinationError) -> &mut Self {
        self.scripted.entry(index).or_default().push_back(error);
        self
    }

    pub fn table(&self, name: &str) -> Option<&StoredTable> {
        self.tables.get(name)
    }

    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Chunk numbers in the order they were attempted.
    pub fn attempted_chunks(&self) -> Vec<usize> {
        self.attempts.iter().map(|a| a.chunk).collect()
    }

    fn apply(&mut self, chunk: &ChunkWrite<'_>) -> Result<(), DestinationError> {
        if let Some(error) = self
            .scripted
            .get_mut(&chunk.index)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }

        let rows: Vec<Vec<&Cell>> = chunk.rows().collect();
        for row in &rows {
            check_row(chunk.columns, row)?;
        }
        let owned = rows
            .into_iter()
            .map(|row| row.into_iter().cloned().collect::<Vec<_>>());

        let exists = self.tables.contains_key(chunk.table_name);
        match chunk.mode {
            ConflictMode::Fail if exists => {
                return Err(DestinationError::Other {
                    message: format!("table '{}' already exists", chunk.table_name),
                });
            }
            ConflictMode::Replace => {
                self.tables.remove(chunk.table_name);
            }
            _ => {}
        }
        let stored = self
            .tables
            .entry(chunk.table_name.to_string())
            .or_insert_with(|| StoredTable {
                columns: chunk.columns.to_vec(),
                rows: Vec::new(),
            });
        if stored.columns != chunk.columns {
            return Err(DestinationError::Other {
                message: format!(
                    "table '{}' exists with a different column layout",
                    chunk.table_name
                ),
            });
        }
        stored.rows.extend(owned);
        Ok(())
    }
}

impl Destination for MemoryDestination {
    fn write_chunk(&mut self, chunk: &ChunkWrite<'_>) -> Result<(), DestinationError> {
        let result = self.apply(chunk);
        self.attempts.push(Attempt {
            chunk: chunk.index,
            rows: chunk.rows.clone(),
            committed: result.is_ok(),
        });
        result
    }
}
