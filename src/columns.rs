//! Column-name canonicalization.
//!
//! Raw headers are turned into identifiers made only of `[a-z0-9_]` in a
//! fixed order of steps: trim, whitespace runs to `_`, lowercase, drop
//! anything outside `[0-9A-Za-z_]`, suffix duplicates (`_1`, `_2`, ... in
//! first-seen order), then append `_` to reserved words.

use std::{
    collections::{HashMap, HashSet},
    sync::LazyLock,
};

use regex::Regex;

use crate::{
    dataset::Table,
    diagnostics::{Diagnostics, Notice},
    error::NormalizeError,
};

pub const RESERVED_WORDS: &[&str] = &[
    "type", "group", "date", "resource", "start", "end", "sysdate",
];

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern compiles"));
static WHITESPACE_OR_UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s_]+").expect("separator pattern compiles"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Also fold runs of underscores (mixed with whitespace or not) into one.
    pub collapse_underscores: bool,
}

/// Steps 1 to 4: the per-name part of normalization.
pub fn canonical_name(raw: &str, options: NormalizeOptions) -> String {
    let trimmed = raw.trim();
    let runs = if options.collapse_underscores {
        &*WHITESPACE_OR_UNDERSCORE_RUN
    } else {
        &*WHITESPACE_RUN
    };
    runs.replace_all(trimmed, "_")
        .to_lowercase()
        .chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .collect()
}

pub fn is_reserved(identifier: &str) -> bool {
    RESERVED_WORDS.contains(&identifier)
}

/// Normalizes a full header, returning one identifier per raw name.
pub fn normalize_names(
    raw: &[String],
    options: NormalizeOptions,
) -> Result<Vec<String>, NormalizeError> {
    let canonical = raw
        .iter()
        .enumerate()
        .map(|(position, original)| {
            let name = canonical_name(original, options);
            if name.is_empty() {
                Err(NormalizeError::EmptyIdentifier {
                    original: original.clone(),
                    position,
                })
            } else {
                Ok(name)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    // Bare names are reserved up front so a suffixed duplicate never takes
    // a name that a later column carries verbatim.
    let mut taken: HashSet<String> = canonical.iter().cloned().collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut next_suffix: HashMap<&str, usize> = HashMap::new();
    let mut deduped = Vec::with_capacity(canonical.len());
    for name in &canonical {
        if seen.insert(name.as_str()) {
            deduped.push(name.clone());
            continue;
        }
        let counter = next_suffix.entry(name.as_str()).or_insert(1);
        let candidate = loop {
            let candidate = format!("{name}_{counter}");
            *counter += 1;
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(candidate.clone());
        deduped.push(candidate);
    }

    let mut unique = HashSet::with_capacity(deduped.len());
    let mut output = Vec::with_capacity(deduped.len());
    for (original, name) in raw.iter().zip(deduped) {
        let identifier = if is_reserved(&name) {
            format!("{name}_")
        } else {
            name
        };
        if !unique.insert(identifier.clone()) {
            return Err(NormalizeError::Collision {
                original: original.clone(),
                identifier,
            });
        }
        output.push(identifier);
    }
    Ok(output)
}

/// Replaces the table header with its canonical form. On error the table
/// keeps its original names.
pub fn normalize_headers(
    table: &mut Table,
    options: NormalizeOptions,
    diagnostics: &dyn Diagnostics,
) -> Result<(), NormalizeError> {
    let raw: Vec<String> = table.column_names().into_iter().map(String::from).collect();
    let names = normalize_names(&raw, options)?;
    for (from, to) in raw.iter().zip(&names) {
        if from != to {
            diagnostics.notice(Notice::ColumnRenamed {
                from: from.clone(),
                to: to.clone(),
            });
        }
    }
    table.rename_columns(names);
    Ok(())
}
