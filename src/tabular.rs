//! Encoding-tolerant tabular file reading.
//!
//! Catalogue CSVs arrive from spreadsheet tools with unpredictable
//! encodings and artefact columns. This module is the single I/O boundary:
//! it reads a file with a fixed encoding priority list and parses it into
//! [`Record`]s, degrading to "no data" on every failure mode. Resolution
//! logic never touches the filesystem directly.

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::record::{strip_bom_key, Record};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// Read a text file with fallback encodings.
///
/// Priority order: UTF-8, UTF-8 with BOM, Latin-1. Latin-1 maps every byte
/// to a char, so once the bytes are read decoding cannot fail; a file the
/// other encodings reject is still recovered rather than dropped. Returns
/// `None` only when the file cannot be read at all.
pub fn read_text_with_fallback(path: &Path) -> Option<String> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unable to read tabular file");
            return None;
        }
    };
    Some(decode_with_fallback(&bytes))
}

fn decode_with_fallback(bytes: &[u8]) -> String {
    let body = bytes.strip_prefix(&UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(body) {
        Ok(s) => s.to_string(),
        Err(_) => body.iter().map(|&b| b as char).collect(),
    }
}

/// Parse CSV text into records.
///
/// Column names are BOM-stripped and trimmed. Spreadsheet artefact columns
/// (`Unnamed:` prefix) and columns that are empty on every row are dropped.
/// Missing cells on ragged rows become `""`. A structurally unreadable file
/// yields an empty table, never an error.
pub fn parse_table(text: &str) -> Vec<Record> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(|c| strip_bom_key(c).to_string()).collect(),
        Err(e) => {
            warn!(error = %e, "unreadable CSV headers; degrading to empty table");
            return Vec::new();
        }
    };
    if headers.is_empty() {
        return Vec::new();
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    for row in reader.records() {
        match row {
            Ok(r) => rows.push(r.iter().map(|c| c.to_string()).collect()),
            Err(e) => {
                warn!(error = %e, "malformed CSV row; degrading to empty table");
                return Vec::new();
            }
        }
    }

    // Keep a column only if it is not a spreadsheet artefact and carries at
    // least one non-empty value.
    let keep: Vec<usize> = headers
        .iter()
        .enumerate()
        .filter(|(i, name)| {
            !name.starts_with("Unnamed:")
                && !name.is_empty()
                && rows
                    .iter()
                    .any(|r| r.get(*i).map(|v| !v.trim().is_empty()).unwrap_or(false))
        })
        .map(|(i, _)| i)
        .collect();

    rows.iter()
        .map(|row| {
            Record::from_pairs(keep.iter().map(|&i| {
                (
                    headers[i].as_str(),
                    row.get(i).cloned().unwrap_or_default(),
                )
            }))
        })
        .collect()
}

/// Read and parse a tabular file; every failure mode yields an empty table.
pub fn load_table(path: &Path) -> Vec<Record> {
    match read_text_with_fallback(path) {
        Some(text) => parse_table(&text),
        None => Vec::new(),
    }
}
