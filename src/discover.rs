//! Input file discovery.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::error::{IngestError, IngestResult};

pub const TABULAR_EXTENSIONS: &[&str] = &["csv", "txt", "tsv"];

pub fn is_tabular(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TABULAR_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}

/// Builds the ordered input list: explicit files first, as given, then the
/// tabular files found under each directory (recursively, sorted per
/// directory). Paths already listed are not repeated.
pub fn discover_inputs(files: &[PathBuf], dirs: &[PathBuf]) -> IngestResult<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut inputs = Vec::new();
    for file in files {
        if seen.insert(file.clone()) {
            inputs.push(file.clone());
        }
    }
    for dir in dirs {
        if !dir.is_dir() {
            return Err(IngestError::Discovery {
                path: dir.clone(),
                message: "not a directory".to_string(),
            });
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.map_err(|err| IngestError::Discovery {
                path: dir.clone(),
                message: err.to_string(),
            })?;
            if entry.file_type().is_file() && is_tabular(entry.path()) {
                found.push(entry.into_path());
            }
        }
        found.sort();
        for path in found {
            if seen.insert(path.clone()) {
                inputs.push(path);
            }
        }
    }
    if inputs.is_empty() {
        return Err(IngestError::NoInputs);
    }
    Ok(inputs)
}
