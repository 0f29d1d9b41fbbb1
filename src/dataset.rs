//! The in-memory unified table.
//!
//! A [`Table`] is an arena of [`Column`]s addressed by position, plus a
//! lookup map from `(name, occurrence)` to position. The map is rebuilt
//! explicitly whenever the column set changes (a merged file batch or a
//! rename), never patched in place. Keying on the occurrence lets a header
//! that repeats a name inside one file line up with the same repeated
//! column in later files.

use std::{collections::HashMap, fmt, ops::Range};

use serde::{Deserialize, Serialize};

use crate::{
    data::Cell,
    error::{RowShapeError, ShapeError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Date,
    NullAll,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnKind::Text => "text",
            ColumnKind::Date => "date",
            ColumnKind::NullAll => "null",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub cells: Vec<Cell>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Cell>) -> Self {
        let mut column = Self {
            name: name.into(),
            kind: ColumnKind::Text,
            cells,
        };
        column.refresh_kind();
        column
    }

    fn nulls(name: &str, len: usize) -> Self {
        Self {
            name: name.to_string(),
            kind: ColumnKind::NullAll,
            cells: vec![Cell::Null; len],
        }
    }

    pub fn is_all_null(&self) -> bool {
        self.cells.iter().all(Cell::is_null)
    }

    pub fn non_null_count(&self) -> usize {
        self.cells.iter().filter(|cell| !cell.is_null()).count()
    }

    /// Recomputes the kind of a text/null column from its content. Date
    /// columns keep their kind even when every cell was coerced to null.
    pub fn refresh_kind(&mut self) {
        if self.kind == ColumnKind::Date {
            return;
        }
        self.kind = if self.is_all_null() {
            ColumnKind::NullAll
        } else {
            ColumnKind::Text
        };
    }
}

type ColumnKey = (String, usize);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    index: HashMap<ColumnKey, usize>,
    row_count: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self, ShapeError> {
        let row_count = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        if let Some(bad) = columns.iter().find(|c| c.cells.len() != row_count) {
            return Err(ShapeError {
                column: bad.name.clone(),
                expected: row_count,
                found: bad.cells.len(),
            });
        }
        let mut table = Self {
            columns,
            index: HashMap::new(),
            row_count,
        };
        table.rebuild_index();
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Mutable access to the columns. The slice cannot change the column
    /// count; callers must keep every column at `row_count` cells.
    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|idx| &self.columns[idx])
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&(name.to_string(), 0)).copied()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.columns.get(column).and_then(|c| c.cells.get(row))
    }

    /// Cells of one row, in column order.
    pub fn row(&self, row: usize) -> Option<Vec<&Cell>> {
        if row >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.cells[row]).collect())
    }

    pub fn rows(&self, range: Range<usize>) -> impl Iterator<Item = Vec<&Cell>> + '_ {
        let end = range.end.min(self.row_count);
        (range.start..end).filter_map(move |row| self.row(row))
    }

    /// Merges one file's rows into the table.
    ///
    /// Headers not yet present are appended to the column set (back-filled
    /// with nulls for earlier rows); columns the batch lacks receive nulls
    /// for its rows. Returns the names of the columns the batch introduced,
    /// in header order. A row whose length differs from the header is
    /// rejected before the table is touched.
    pub fn append_batch(
        &mut self,
        headers: &[String],
        rows: Vec<Vec<Cell>>,
    ) -> Result<Vec<String>, RowShapeError> {
        if let Some((row, cells)) = rows
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != headers.len())
        {
            return Err(RowShapeError {
                row: row + 1,
                expected: headers.len(),
                found: cells.len(),
            });
        }

        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut targets = Vec::with_capacity(headers.len());
        let mut added = Vec::new();
        for header in headers {
            let occurrence = occurrences
                .entry(header.as_str())
                .and_modify(|count| *count += 1)
                .or_insert(0);
            let key = (header.clone(), *occurrence);
            let position = match self.index.get(&key) {
                Some(&position) => position,
                None => {
                    self.columns.push(Column::nulls(header, self.row_count));
                    added.push(header.clone());
                    self.columns.len() - 1
                }
            };
            targets.push(position);
        }
        self.rebuild_index();

        let appended = rows.len();
        let mut incoming: Vec<Vec<Cell>> = (0..headers.len())
            .map(|_| Vec::with_capacity(appended))
            .collect();
        for row in rows {
            for (column, cell) in incoming.iter_mut().zip(row) {
                column.push(cell);
            }
        }

        let mut sources: Vec<Option<Vec<Cell>>> = vec![None; self.columns.len()];
        for (cells, target) in incoming.into_iter().zip(targets) {
            sources[target] = Some(cells);
        }
        for (column, source) in self.columns.iter_mut().zip(sources) {
            match source {
                Some(cells) => column.cells.extend(cells),
                None => column
                    .cells
                    .extend(std::iter::repeat_n(Cell::Null, appended)),
            }
            column.refresh_kind();
        }
        self.row_count += appended;
        Ok(added)
    }

    /// Replaces every column name at once. `names` must have one entry per
    /// column.
    pub fn rename_columns(&mut self, names: Vec<String>) {
        debug_assert_eq!(names.len(), self.columns.len());
        for (column, name) in self.columns.iter_mut().zip(names) {
            column.name = name;
        }
        self.rebuild_index();
    }

    fn rebuild_index(&mut self) {
        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut index = HashMap::with_capacity(self.columns.len());
        for (position, column) in self.columns.iter().enumerate() {
            let occurrence = occurrences
                .entry(column.name.as_str())
                .and_modify(|count| *count += 1)
                .or_insert(0);
            index.insert((column.name.clone(), *occurrence), position);
        }
        self.index = index;
    }
}
