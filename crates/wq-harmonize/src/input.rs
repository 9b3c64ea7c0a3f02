//! CSV ingestion for WQP result exports.
//!
//! Reads a delimited export into a [`WqTable`], normalizing null tokens to
//! empty cells and recording source metadata (content hash, shape, load
//! time). Everything else stays text; numeric coercion is a pipeline step,
//! not an ingestion step.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{HarmonizeError, Result};
use crate::table::{Cell, WqTable};

/// Delimiters tried during auto-detection, in preference order.
const DELIMITERS: &[u8] = &[b',', b'\t', b';', b'|'];

/// Tokens normalized to missing at ingestion. "*Not Reported" style values
/// are deliberately not in this list; they must reach the measure coercion
/// step so the row gets an unusable-result flag. "None" is also excluded:
/// pH rows carry it as a literal unit code that the bad-unit substitutions
/// rewrite to "dimensionless".
const NULL_TOKENS: &[&str] = &["na", "n/a", "nan", "null"];

/// Read options for [`read_table`].
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Delimiter override (auto-detected when `None`).
    pub delimiter: Option<char>,
    /// Stop after this many data rows.
    pub max_rows: Option<usize>,
}

/// Metadata about an ingested source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// File name without path.
    pub file: String,
    /// Full path to the file.
    pub path: PathBuf,
    /// SHA-256 of the file contents, as `sha256:<hex>`.
    pub hash: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Detected format (csv, tsv, ...).
    pub format: String,
    /// Number of data rows (excluding header).
    pub row_count: usize,
    /// Number of columns.
    pub column_count: usize,
    /// When the file was loaded.
    pub loaded_at: DateTime<Utc>,
}

/// Reads a WQP result export into a working table plus source metadata.
pub fn read_table(path: impl AsRef<Path>, options: &ReadOptions) -> Result<(WqTable, SourceMetadata)> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| HarmonizeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).map_err(|e| HarmonizeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    let hash = format!("sha256:{:x}", hasher.finalize());

    let delimiter = match options.delimiter {
        Some(c) if c.is_ascii() => c as u8,
        Some(c) => return Err(HarmonizeError::InvalidDelimiter(c.to_string())),
        None => detect_delimiter(&contents)?,
    };

    let table = parse_bytes(&contents, delimiter, options.max_rows)?;

    let format = match delimiter {
        b',' => "csv",
        b'\t' => "tsv",
        b';' => "csv-semicolon",
        b'|' => "psv",
        _ => "delimited",
    }
    .to_string();

    let metadata = SourceMetadata {
        file: path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.to_path_buf(),
        hash,
        size_bytes: contents.len() as u64,
        format,
        row_count: table.n_rows(),
        column_count: table.n_cols(),
        loaded_at: Utc::now(),
    };

    Ok((table, metadata))
}

/// Writes a table back out as CSV. Quantity cells render as
/// `<magnitude> <unit>`.
pub fn write_table(table: &WqTable, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| HarmonizeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(table.headers())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush().map_err(|e| HarmonizeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn parse_bytes(bytes: &[u8], delimiter: u8, max_rows: Option<usize>) -> Result<WqTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader.headers()?.iter().map(|s| s.to_string()).collect();
    if headers.is_empty() {
        return Err(HarmonizeError::EmptyData("no columns found".to_string()));
    }

    let mut table = WqTable::new(headers);
    for (row_idx, record) in reader.records().enumerate() {
        if let Some(max) = max_rows {
            if row_idx >= max {
                break;
            }
        }
        let record = record?;
        // Short rows are padded and long rows truncated by push_row.
        table.push_row(record.iter().map(cell_from_field).collect());
    }

    if table.n_rows() == 0 {
        return Err(HarmonizeError::EmptyData("no data rows found".to_string()));
    }
    Ok(table)
}

/// Maps one CSV field to a cell, normalizing null tokens to `Empty`.
fn cell_from_field(field: &str) -> Cell {
    if is_null_token(field) {
        Cell::Empty
    } else {
        Cell::Text(field.to_string())
    }
}

/// Whether a field spells a missing value.
pub fn is_null_token(field: &str) -> bool {
    let trimmed = field.trim();
    trimmed.is_empty()
        || NULL_TOKENS
            .iter()
            .any(|token| trimmed.eq_ignore_ascii_case(token))
}

/// Picks the delimiter whose per-line counts are most consistent over the
/// first lines of the file.
fn detect_delimiter(bytes: &[u8]) -> Result<u8> {
    let lines: Vec<String> = BufReader::new(bytes)
        .lines()
        .take(10)
        .filter_map(|l| l.ok())
        .filter(|l| !l.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return Err(HarmonizeError::EmptyData("no lines to analyze".to_string()));
    }

    let mut best = (DELIMITERS[0], 0usize);
    for &delim in DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_outside_quotes(line, delim))
            .collect();
        let first = counts[0];
        if first == 0 {
            continue;
        }
        let score = if counts.iter().all(|&c| c == first) {
            first * 100
        } else {
            counts.iter().sum::<usize>() / counts.len()
        };
        if score > best.1 {
            best = (delim, score);
        }
    }
    Ok(best.0)
}

/// Counts delimiter occurrences in a line, skipping quoted sections.
fn count_outside_quotes(line: &str, delimiter: u8) -> usize {
    let delim = delimiter as char;
    let mut count = 0;
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == delim && !in_quotes => count += 1,
            _ => {}
        }
    }
    count
}
