//! In-memory working table for WQP result records.
//!
//! One row per reported result, columns addressed by the fixed external
//! schema names below. Raw input columns are never mutated by the pipeline;
//! every derived value lands in a new column so the before/after audit holds.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HarmonizeError, Result};
use crate::units::Quantity;

/// Append-only audit trail column.
pub const QA_FLAG_COL: &str = "QA_flag";
/// Raw reported measure value (string or numeric, never mutated).
pub const MEASURE_COL: &str = "ResultMeasureValue";
/// Raw reported unit code (never mutated).
pub const UNITS_RAW_COL: &str = "ResultMeasure/MeasureUnitCode";
/// Mutable working copy of the unit code, dropped unless intermediates are kept.
pub const UNITS_COL: &str = "Units";
/// Join key selecting per-characteristic logic.
pub const CHARACTERISTIC_COL: &str = "CharacteristicName";
/// Sample fraction text driving the fraction split.
pub const FRACTION_COL: &str = "ResultSampleFractionText";
/// Speciation hint consumed and cleared by the basis resolver.
pub const METHOD_SPEC_COL: &str = "MethodSpecificationName";
/// Resolved basis column, created on demand.
pub const SPECIATION_COL: &str = "Speciation";
/// Activity media (Water, Sediment, ...).
pub const MEDIA_COL: &str = "ActivityMediaName";
/// Activity start date (YYYY-MM-DD).
pub const DATE_COL: &str = "ActivityStartDate";
/// Activity start clock time.
pub const TIME_COL: &str = "ActivityStartTime/Time";
/// Activity start time-zone code.
pub const TZ_COL: &str = "ActivityStartTime/TimeZoneCode";
/// Combined RFC 3339 activity datetime, created by the datetime step.
pub const DATETIME_COL: &str = "Activity_datetime";
/// Harmonized sample depth in meters, created by depth harmonization.
pub const DEPTH_COL: &str = "Depth";
/// Raw result depth measure value.
pub const DEPTH_MEASURE_COL: &str = "ResultDepthHeightMeasure/MeasureValue";
/// Raw result depth unit code.
pub const DEPTH_UNITS_COL: &str = "ResultDepthHeightMeasure/MeasureUnitCode";
/// Temperature-reference basis text (salinity).
pub const TEMPERATURE_BASIS_COL: &str = "ResultTemperatureBasisText";
/// Particle-size basis text (sediment).
pub const PARTICLE_SIZE_BASIS_COL: &str = "ResultParticleSizeBasisText";
/// Weight basis text (wet/dry checks).
pub const WEIGHT_BASIS_COL: &str = "ResultWeightBasisText";
/// Time basis text (passthrough).
pub const TIME_BASIS_COL: &str = "ResultTimeBasisText";

/// One table cell. Raw columns hold `Text`; coerced measures hold `Number`;
/// converted outputs hold `Quantity`. Missing is explicit, not a sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Quantity(Quantity),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Text content, if this cell holds text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric magnitude of a `Number` or `Quantity` cell.
    pub fn magnitude(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Quantity(q) => Some(q.magnitude),
            _ => None,
        }
    }

    /// Unit of a `Quantity` cell.
    pub fn unit(&self) -> Option<&str> {
        match self {
            Cell::Quantity(q) => Some(&q.unit),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Quantity(q) => write!(f, "{q}"),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

// Finite decimal numbers only. Textual "inf"/"nan" spellings would parse as
// f64 but must stay text so they cannot masquerade as usable measures.
static NUMERIC_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?$").unwrap());

/// Coerces free text to a finite number, or `None` when the text does not
/// spell one.
pub fn coerce_numeric(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if !NUMERIC_TEXT.is_match(trimmed) {
        return None;
    }
    trimmed.parse().ok()
}

/// Row-major working table. Rows are kept rectangular: adding a column pads
/// every existing row, and pushed rows are padded or truncated to the header
/// width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WqTable {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl WqTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Builds a table from headers and rows; rows are padded/truncated to the
    /// header width.
    pub fn with_rows(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let mut table = Self::new(headers);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.headers.len()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Column index or a missing-column error, for fail-fast input checks.
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| HarmonizeError::MissingColumn(name.to_string()))
    }

    /// Index of `name`, appending an empty column if absent.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            row.push(Cell::Empty);
        }
        self.headers.len() - 1
    }

    /// Removes a column if present. Returns whether anything was dropped.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else {
            return false;
        };
        self.headers.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.headers.len(), Cell::Empty);
        self.rows.push(row);
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.rows[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, cell: Cell) {
        self.rows[row][col] = cell;
    }

    /// Text content of a cell, `None` for anything else.
    pub fn text(&self, row: usize, col: usize) -> Option<&str> {
        self.rows[row][col].as_text()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// Mask selecting every row.
    pub fn full_mask(&self) -> Vec<bool> {
        vec![true; self.rows.len()]
    }

    /// Mask of rows whose text in `col` equals `value`.
    pub fn mask_eq_text(&self, col: usize, value: &str) -> Vec<bool> {
        self.rows
            .iter()
            .map(|row| row[col].as_text() == Some(value))
            .collect()
    }

    /// Distinct text values of `col` over masked rows, in first-appearance
    /// order. Empty cells are skipped.
    pub fn distinct_text(&self, col: usize, mask: &[bool]) -> Vec<String> {
        let mut seen = indexmap::IndexSet::new();
        for (row, selected) in mask.iter().enumerate() {
            if !*selected {
                continue;
            }
            if let Some(text) = self.rows[row][col].as_text() {
                seen.insert(text.to_string());
            }
        }
        seen.into_iter().collect()
    }

    /// Copies cells from `src` to `dst` for masked rows.
    pub fn copy_masked(&mut self, src: usize, dst: usize, mask: &[bool]) {
        for (row, selected) in mask.iter().enumerate() {
            if *selected {
                self.rows[row][dst] = self.rows[row][src].clone();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> WqTable {
        WqTable::with_rows(
            vec![CHARACTERISTIC_COL.to_string(), UNITS_RAW_COL.to_string()],
            vec![
                vec![Cell::from("Phosphorus"), Cell::from("mg/l")],
                vec![Cell::from("Phosphorus"), Cell::from("ug/l")],
                vec![Cell::from("Salinity"), Cell::from("mg/l")],
                vec![Cell::from("Phosphorus"), Cell::Empty],
            ],
        )
    }

    #[test]
    fn test_ensure_column_pads_existing_rows() {
        let mut table = sample_table();
        let idx = table.ensure_column(QA_FLAG_COL);
        assert_eq!(idx, 2);
        assert_eq!(table.n_cols(), 3);
        for row in 0..table.n_rows() {
            assert!(table.cell(row, idx).is_empty());
        }
        // Second call returns the same index without growing the table.
        assert_eq!(table.ensure_column(QA_FLAG_COL), 2);
        assert_eq!(table.n_cols(), 3);
    }

    #[test]
    fn test_push_row_pads_and_truncates() {
        let mut table = WqTable::new(vec!["A".to_string(), "B".to_string()]);
        table.push_row(vec![Cell::from("x")]);
        table.push_row(vec![Cell::from("1"), Cell::from("2"), Cell::from("3")]);
        assert_eq!(table.cell(0, 1), &Cell::Empty);
        assert_eq!(table.rows().nth(1).unwrap().len(), 2);
    }

    #[test]
    fn test_mask_and_distinct_first_appearance_order() {
        let table = sample_table();
        let char_col = table.column_index(CHARACTERISTIC_COL).unwrap();
        let unit_col = table.column_index(UNITS_RAW_COL).unwrap();
        let mask = table.mask_eq_text(char_col, "Phosphorus");
        assert_eq!(mask, vec![true, true, false, true]);
        // Missing unit on the last masked row is skipped, order is by first
        // appearance.
        assert_eq!(table.distinct_text(unit_col, &mask), vec!["mg/l", "ug/l"]);
    }

    #[test]
    fn test_require_column_fails_fast() {
        let table = sample_table();
        assert!(table.require_column(CHARACTERISTIC_COL).is_ok());
        let err = table.require_column(MEASURE_COL).unwrap_err();
        assert!(err.to_string().contains("ResultMeasureValue"));
    }

    #[test]
    fn test_drop_column_keeps_rows_rectangular() {
        let mut table = sample_table();
        assert!(table.drop_column(UNITS_RAW_COL));
        assert!(!table.drop_column(UNITS_RAW_COL));
        assert_eq!(table.n_cols(), 1);
        for row in table.rows() {
            assert_eq!(row.len(), 1);
        }
    }

    #[test]
    fn test_coerce_numeric_text() {
        assert_eq!(coerce_numeric("1.5"), Some(1.5));
        assert_eq!(coerce_numeric("  -2e3 "), Some(-2000.0));
        assert_eq!(coerce_numeric(".5"), Some(0.5));
        assert_eq!(coerce_numeric("+4"), Some(4.0));
        assert_eq!(coerce_numeric("Not Reported"), None);
        assert_eq!(coerce_numeric("1.5 mg/l"), None);
        // Float sentinels stay text.
        assert_eq!(coerce_numeric("inf"), None);
        assert_eq!(coerce_numeric("NaN"), None);
    }
}
