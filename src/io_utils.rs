//! I/O utilities for delimited-file reading, encoding, and separator handling.
//!
//! All source-file reading flows through this module. It provides:
//!
//! - **Separator resolution**: named aliases (`comma`, `tab`, `pipe`,
//!   `semicolon`), single bytes, and multi-character sequences, with
//!   extension-based defaults (`.tsv` → tab, everything else → comma).
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Reader construction**: `open_csv_reader` with configurable quoting.
//! - **Multi-character separators**: rewritten to the ASCII unit separator
//!   outside quoted fields so the `csv` reader can handle them.

use std::{fmt, io::Read, path::Path};

use anyhow::{Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';
pub const DEFAULT_QUOTE: u8 = b'"';
pub const UNIT_SEPARATOR: u8 = 0x1f;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Separator {
    Byte(u8),
    Sequence(String),
}

impl Separator {
    pub fn parse(value: &str) -> Result<Self, String> {
        match value {
            "tab" | "\t" | "\\t" => Ok(Separator::Byte(b'\t')),
            "comma" | "," => Ok(Separator::Byte(b',')),
            "|" | "pipe" => Ok(Separator::Byte(b'|')),
            ";" | "semicolon" => Ok(Separator::Byte(b';')),
            "" => Err("Separator cannot be empty".to_string()),
            other if other.len() == 1 => Ok(Separator::Byte(other.as_bytes()[0])),
            other => Ok(Separator::Sequence(other.to_string())),
        }
    }

    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => Separator::Byte(DEFAULT_TSV_DELIMITER),
            _ => Separator::Byte(DEFAULT_CSV_DELIMITER),
        }
    }
}

impl fmt::Display for Separator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Separator::Byte(b',') => f.write_str(","),
            Separator::Byte(b'\t') => f.write_str("\\t"),
            Separator::Byte(b'\n') => f.write_str("\\n"),
            Separator::Byte(other) => write!(f, "{}", *other as char),
            Separator::Sequence(sequence) => f.write_str(sequence),
        }
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8, quote: Option<u8>) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .quoting(quote.is_some())
        .quote(quote.unwrap_or(DEFAULT_QUOTE))
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

/// Decodes one field, returning `None` when the bytes are not valid in
/// `encoding`.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> Option<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Rewrites every occurrence of `separator` that sits outside a quoted field
/// to [`UNIT_SEPARATOR`]. Doubled quotes toggle twice and so stay inside the
/// field.
pub fn rewrite_separator(text: &str, separator: &str, quote: Option<u8>) -> String {
    let mut output = String::with_capacity(text.len());
    let mut in_quotes = false;
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        if quote.is_some_and(|q| ch == q as char) {
            in_quotes = !in_quotes;
        } else if !in_quotes && rest.starts_with(separator) {
            output.push(UNIT_SEPARATOR as char);
            rest = &rest[separator.len()..];
            continue;
        }
        output.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    output
}
