#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tabular_load::data::Cell;
use tabular_load::destination::memory::StoredTable;
use tempfile::{TempDir, tempdir};

/// Scratch directory that is removed when the test ends.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` under the workspace, creating parent directories.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write temp file contents");
        path
    }
}

/// Single-column CSV with `rows` sequential ids.
pub fn id_csv(rows: usize) -> String {
    let mut contents = String::with_capacity(rows * 7 + 3);
    contents.push_str("id\n");
    for id in 0..rows {
        contents.push_str(&id.to_string());
        contents.push('\n');
    }
    contents
}

/// Column `name` of a stored table as display strings (`None` for null).
pub fn stored_column(table: &StoredTable, name: &str) -> Vec<Option<String>> {
    let position = table
        .columns
        .iter()
        .position(|c| c.name == name)
        .unwrap_or_else(|| panic!("column {name} not stored"));
    table
        .rows
        .iter()
        .map(|row| match &row[position] {
            Cell::Null => None,
            other => Some(other.to_string()),
        })
        .collect()
}
