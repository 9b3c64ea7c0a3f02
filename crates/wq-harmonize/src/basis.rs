//! Basis (speciation) resolution.
//!
//! WQP results encode the reporting basis in several places: the
//! `MethodSpecificationName` column, suffixes inside the unit code
//! ("mg/l as P"), and characteristic-specific basis text columns. These
//! functions consolidate that information into one basis column and strip
//! it back out of the unit strings so the units parse cleanly.

use log::warn;

use crate::error::{HarmonizeError, Result};
use crate::flags::{FlagLedger, QaFlag};
use crate::table::{self, Cell, WqTable};

/// One basis-from-unit rule: unit spellings that carry a basis suffix,
/// the basis they imply, and the clean unit that replaces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasisRule {
    pub basis: &'static str,
    pub new_unit: &'static str,
    pub old_units: &'static [&'static str],
}

/// Basis-from-unit rules for phosphorus. Applied in order; later rules can
/// overwrite earlier resolutions, so spellings are kept disjoint.
pub static PHOSPHORUS_BASIS_RULES: &[BasisRule] = &[
    BasisRule {
        basis: "as P",
        new_unit: "mg/l",
        old_units: &["mg/l as P", "mg/l P"],
    },
    BasisRule {
        basis: "as P",
        new_unit: "mg/kg",
        old_units: &["mg/kg as P", "mg/kg P"],
    },
    BasisRule {
        basis: "as PO4",
        new_unit: "mg/l",
        old_units: &["mg/l as PO4", "mg/l PO4"],
    },
    BasisRule {
        basis: "as PO4",
        new_unit: "mg/kg",
        old_units: &["mg/kg as PO4", "mg/kg PO4"],
    },
];

/// Basis-from-unit rules for nitrogen.
pub static NITROGEN_BASIS_RULES: &[BasisRule] = &[BasisRule {
    basis: "as N",
    new_unit: "mg/l",
    old_units: &["mg/l as N", "mg/l N"],
}];

/// Standard-temperature rules: units annotated with a reference
/// temperature move it into `ResultTemperatureBasisText`.
pub static TEMPERATURE_BASIS_RULES: &[BasisRule] = &[BasisRule {
    basis: "@25C",
    new_unit: "mg/mL",
    old_units: &["mg/mL @25C"],
}];

/// Basis-from-unit rules for an output column, where speciation is known.
/// `None` means the characteristic has no unit-encoded basis; carbon has
/// an entry with no rules since its basis comes from the method
/// specification alone.
pub fn unit_basis_rules(out_col: &str) -> Option<&'static [BasisRule]> {
    match out_col {
        "Phosphorus" => Some(PHOSPHORUS_BASIS_RULES),
        "Nitrogen" => Some(NITROGEN_BASIS_RULES),
        "Carbon" => Some(&[]),
        _ => None,
    }
}

/// Strip the literal "as " prefix from a basis label ("as P" -> "P").
pub fn strip_basis_prefix(value: &str) -> &str {
    value.strip_prefix("as ").unwrap_or(value)
}

/// Move each distinct `MethodSpecificationName` value into the basis
/// column and blank the source cell, for rows under `mask`.
pub fn basis_from_method_spec(table: &mut WqTable, mask: &[bool], basis_col: &str) -> Result<()> {
    let spec_idx = table.require_column(table::METHOD_SPEC_COL)?;
    let basis_idx = table.ensure_column(basis_col);

    for spec in table.distinct_text(spec_idx, mask) {
        for row in 0..table.n_rows() {
            if !mask[row] {
                continue;
            }
            if table.text(row, spec_idx) == Some(spec.as_str()) {
                table.set(row, basis_idx, Cell::from(spec.as_str()));
                table.set(row, spec_idx, Cell::Empty);
            }
        }
    }
    Ok(())
}

/// Derive basis labels from unit spellings and rewrite the unit column to
/// the clean spelling. Rows whose basis column already holds a different
/// value are flagged (one flag phrase per distinct prior value) before
/// being overwritten.
pub fn basis_from_unit(
    table: &mut WqTable,
    mask: &[bool],
    rules: &[BasisRule],
    unit_col: &str,
    basis_col: &str,
    ledger: &mut FlagLedger,
) -> Result<()> {
    let unit_idx = table.require_column(unit_col)?;
    let basis_idx = table.ensure_column(basis_col);

    for rule in rules {
        for old_unit in rule.old_units {
            let rule_mask: Vec<bool> = (0..table.n_rows())
                .map(|row| mask[row] && table.text(row, unit_idx) == Some(*old_unit))
                .collect();

            for old_basis in table.distinct_text(basis_idx, &rule_mask) {
                if old_basis == rule.basis {
                    continue;
                }
                let flag = QaFlag::basis_changed(basis_col, &old_basis, rule.basis);
                warn!("Mismatched {}", flag.text());
                let conflict_mask: Vec<bool> = (0..table.n_rows())
                    .map(|row| {
                        rule_mask[row] && table.text(row, basis_idx) == Some(old_basis.as_str())
                    })
                    .collect();
                ledger.add_masked(&conflict_mask, &flag);
            }

            for row in 0..table.n_rows() {
                if rule_mask[row] {
                    table.set(row, basis_idx, Cell::from(rule.basis));
                    table.set(row, unit_idx, Cell::from(rule.new_unit));
                }
            }
        }
    }
    Ok(())
}

/// Resolve a characteristic-specific basis text column.
///
/// The temperature basis column gets the standard-temperature unit rules;
/// particle size, weight, and time basis values are descriptive text and
/// pass through unchanged. Any other column name is an error.
pub fn resolve_text_basis(
    table: &mut WqTable,
    mask: &[bool],
    basis_col: &str,
    unit_col: &str,
    ledger: &mut FlagLedger,
) -> Result<()> {
    match basis_col {
        table::TEMPERATURE_BASIS_COL => basis_from_unit(
            table,
            mask,
            TEMPERATURE_BASIS_RULES,
            unit_col,
            basis_col,
            ledger,
        ),
        table::PARTICLE_SIZE_BASIS_COL | table::WEIGHT_BASIS_COL | table::TIME_BASIS_COL => Ok(()),
        other => Err(HarmonizeError::UnknownBasisColumn(other.to_string())),
    }
}
