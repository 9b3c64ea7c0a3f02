//! Structured QA flags and the per-row ledger.
//!
//! Every automatic repair the pipeline makes is recorded as a [`QaFlag`]
//! against the affected rows. Flags stay structured (column + kind + detail)
//! while a pass runs and are only joined into the `QA_flag` column text, with
//! `"; "` between entries, when the ledger is applied to the table.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::table::{Cell, WqTable, QA_FLAG_COL};

/// Category of repair or anomaly a flag records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    /// Raw measure value was missing.
    MissingResult,
    /// Raw measure value was present but not numeric.
    UnusableResult,
    /// Unit code was missing and the canonical default was assumed.
    MissingUnits,
    /// Unit code was not defined in the registry and was replaced.
    UndefinedUnits,
    /// Basis column held a different value than the unit string implied.
    BasisChanged,
    /// Activity media was corrected from one domain value to another.
    MediaCorrected,
    /// Value carries fewer decimal digits than the precision limit.
    Imprecise,
}

impl FlagKind {
    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingResult => "missing_result",
            Self::UnusableResult => "unusable_result",
            Self::MissingUnits => "missing_units",
            Self::UndefinedUnits => "undefined_units",
            Self::BasisChanged => "basis_changed",
            Self::MediaCorrected => "media_corrected",
            Self::Imprecise => "imprecise",
        }
    }
}

/// One QA flag: which column it concerns, what kind of repair, and the
/// human-readable detail. `text()` reproduces the flag strings consumers
/// of the `QA_flag` column already key on, so the wording is fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaFlag {
    pub column: String,
    pub kind: FlagKind,
    pub detail: String,
}

impl QaFlag {
    pub fn new(column: &str, kind: FlagKind, detail: impl Into<String>) -> Self {
        Self {
            column: column.to_string(),
            kind,
            detail: detail.into(),
        }
    }

    /// Raw measure value missing entirely.
    pub fn missing_result(column: &str) -> Self {
        Self::new(column, FlagKind::MissingResult, "missing (NaN) result")
    }

    /// Raw measure value present but unusable (non-numeric).
    pub fn unusable_result(column: &str, raw: &str) -> Self {
        Self::new(
            column,
            FlagKind::UnusableResult,
            format!("\"{raw}\" result cannot be used"),
        )
    }

    /// Missing unit replaced with the canonical default.
    pub fn missing_units(column: &str, default: &str) -> Self {
        Self::new(
            column,
            FlagKind::MissingUnits,
            format!("MISSING UNITS, {default} assumed"),
        )
    }

    /// Undefined unit label replaced with the canonical default.
    pub fn undefined_units(column: &str, unit: &str, out_col: &str, default: &str) -> Self {
        Self::new(
            column,
            FlagKind::UndefinedUnits,
            format!("'{unit}' UNDEFINED UNIT for {out_col} UNITS, {default} assumed"),
        )
    }

    /// Basis overwritten because the unit string implied a different one.
    pub fn basis_changed(column: &str, old: &str, new: &str) -> Self {
        Self::new(
            column,
            FlagKind::BasisChanged,
            format!("updated from {old} to {new} (units)"),
        )
    }

    /// Media value corrected (e.g. Water recorded for a sediment sample).
    pub fn media_corrected(column: &str, old: &str, new: &str) -> Self {
        Self::new(
            column,
            FlagKind::MediaCorrected,
            format!("{old} changed to {new}"),
        )
    }

    /// Fewer decimal digits than the configured limit.
    pub fn imprecise(column: &str, limit: usize) -> Self {
        Self::new(
            column,
            FlagKind::Imprecise,
            format!("Imprecise: lessthan{limit}decimaldigits"),
        )
    }

    /// The flag text as it appears in the `QA_flag` column.
    pub fn text(&self) -> String {
        format!("{}: {}", self.column, self.detail)
    }
}

impl fmt::Display for QaFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.column, self.detail)
    }
}

/// Append-only collection of flags for one harmonization pass, indexed by
/// table row. Flags keep their insertion order per row and are never
/// deduplicated.
#[derive(Debug, Clone, Default)]
pub struct FlagLedger {
    rows: Vec<Vec<QaFlag>>,
}

impl FlagLedger {
    pub fn new(n_rows: usize) -> Self {
        Self {
            rows: vec![Vec::new(); n_rows],
        }
    }

    /// Appends a flag to one row.
    pub fn add(&mut self, row: usize, flag: QaFlag) {
        if row >= self.rows.len() {
            self.rows.resize_with(row + 1, Vec::new);
        }
        self.rows[row].push(flag);
    }

    /// Appends the same flag to every masked row.
    pub fn add_masked(&mut self, mask: &[bool], flag: &QaFlag) {
        for (row, selected) in mask.iter().enumerate() {
            if *selected {
                self.add(row, flag.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    /// Total number of flags across all rows.
    pub fn len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    pub fn row_flags(&self, row: usize) -> &[QaFlag] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Writes the ledger into the table's `QA_flag` column, appending to any
    /// text already present from earlier passes. The "; " join happens here
    /// and nowhere else.
    pub fn apply_to(&self, table: &mut WqTable) {
        if self.is_empty() && table.column_index(QA_FLAG_COL).is_some() {
            return;
        }
        let col = table.ensure_column(QA_FLAG_COL);
        for (row, flags) in self.rows.iter().enumerate() {
            if flags.is_empty() || row >= table.n_rows() {
                continue;
            }
            let joined = flags
                .iter()
                .map(QaFlag::text)
                .collect::<Vec<_>>()
                .join("; ");
            let merged = match table.cell(row, col) {
                Cell::Text(existing) if !existing.is_empty() => {
                    format!("{existing}; {joined}")
                }
                _ => joined,
            };
            table.set(row, col, Cell::Text(merged));
        }
    }
}
