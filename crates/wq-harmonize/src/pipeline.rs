//! Per-characteristic harmonization passes and the drivers that run them.
//!
//! [`harmonize_characteristic`] runs one full pass over the rows of a single
//! characteristic: coerce measures, resolve basis, repair units, reconcile
//! dimensions, and batch-convert into the target unit. [`harmonize_all`]
//! repeats that for every characteristic present in the table.
//! [`HarmonizePass`] exposes the individual steps for callers that want to
//! inspect or adjust state between them.

use log::{debug, warn};
use serde::Serialize;

use crate::basis;
use crate::convert::{self, EmpiricalConversion};
use crate::domains::Characteristic;
use crate::error::{HarmonizeError, Result};
use crate::flags::{FlagLedger, QaFlag};
use crate::fraction;
use crate::table::{self, Cell, WqTable};
use crate::units::{
    convert_series, mismatched_dimensions, Dimension, DimensionErrorPolicy, Quantity, Unit,
    UnitRegistry,
};

/// Knobs for one harmonization pass.
#[derive(Debug, Clone, Default)]
pub struct HarmonizeOptions {
    /// Override for the characteristic's default target unit.
    pub target_unit: Option<String>,
    /// What to do when a unit cannot be converted into the target dimension.
    pub on_dimension_error: DimensionErrorPolicy,
    /// Keep the working `Units` column instead of dropping it at the end.
    pub keep_intermediate_columns: bool,
}

/// Counts from one completed pass, for callers that audit runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// WQP characteristic name the pass selected on.
    pub characteristic: String,
    /// Rows selected.
    pub rows: usize,
    /// Measures coerced to usable numbers.
    pub measures_coerced: usize,
    /// Missing units filled with the target unit.
    pub units_inferred: usize,
    /// Units rewritten by the bad-unit substitutions or the undefined-unit
    /// repair.
    pub units_replaced: usize,
    /// QA flags appended.
    pub flags_appended: usize,
}

impl PassSummary {
    /// Pretty-printed JSON, for run logs.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Which rows a [`DimensionFix`] applies to, by their basis cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasisMatch {
    /// Any row, whatever its basis says.
    Any,
    /// Rows whose basis cell is empty, or tables without a basis column.
    Empty,
    /// Rows carrying exactly this basis text.
    Equals(String),
}

impl BasisMatch {
    fn matches(&self, row_basis: Option<&str>) -> bool {
        match self {
            BasisMatch::Any => true,
            BasisMatch::Empty => row_basis.is_none(),
            BasisMatch::Equals(basis) => row_basis == Some(basis.as_str()),
        }
    }
}

/// One planned unit rewrite from the dimension reconciliation step.
///
/// Mole rewrites are keyed by unit and basis together so two speciations
/// of the same substance unit cannot clobber each other; the plain
/// `H2O` rewrites match any basis.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionFix {
    pub unit: String,
    pub basis: BasisMatch,
    pub replacement: String,
}

/// A pending mole-to-mass multiplication.
///
/// `interim_unit` is the literal unit text a [`DimensionFix`] left behind,
/// e.g. `"0.00018015999999999998 gram / l"`. Rows carrying it have their
/// measure multiplied by `factor` and their unit replaced with `final_unit`.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleFix {
    pub interim_unit: String,
    pub factor: f64,
    pub final_unit: &'static str,
}

/// Working state for harmonizing one characteristic's rows in place.
///
/// Construction selects the rows, copies their raw unit codes into a
/// working `Units` column, and coerces their measures into the output
/// column. The step methods then mutate table and ledger; [`finish`]
/// applies the accumulated flags and drops the working column.
///
/// [`finish`]: HarmonizePass::finish
pub struct HarmonizePass<'a> {
    table: &'a mut WqTable,
    characteristic: Characteristic,
    out_col: &'static str,
    target: String,
    c_mask: Vec<bool>,
    registry: UnitRegistry,
    ledger: FlagLedger,
    coerced: usize,
    inferred: usize,
    replaced: usize,
}

impl<'a> HarmonizePass<'a> {
    /// Start a pass for `characteristic`, selecting its rows and coercing
    /// their measures. `target_override` replaces the default target unit.
    pub fn new(
        table: &'a mut WqTable,
        characteristic: Characteristic,
        target_override: Option<&str>,
    ) -> Result<Self> {
        let char_idx = table.require_column(table::CHARACTERISTIC_COL)?;
        let raw_unit_idx = table.require_column(table::UNITS_RAW_COL)?;
        table.require_column(table::MEASURE_COL)?;

        let c_mask = table.mask_eq_text(char_idx, characteristic.name());
        let units_idx = table.ensure_column(table::UNITS_COL);
        table.copy_masked(raw_unit_idx, units_idx, &c_mask);

        let mut registry = UnitRegistry::standard();
        registry.apply_definitions(characteristic.registry_extensions());

        let target = target_override
            .unwrap_or_else(|| characteristic.target_unit())
            .to_string();
        let n_rows = table.n_rows();

        let mut pass = Self {
            table,
            characteristic,
            out_col: characteristic.column(),
            target,
            c_mask,
            registry,
            ledger: FlagLedger::new(n_rows),
            coerced: 0,
            inferred: 0,
            replaced: 0,
        };
        pass.coerce_measure()?;
        Ok(pass)
    }

    /// The characteristic this pass harmonizes.
    pub fn characteristic(&self) -> Characteristic {
        self.characteristic
    }

    /// Name of the output column the coerced measures land in.
    pub fn out_col(&self) -> &'static str {
        self.out_col
    }

    /// Unit every surviving measure is converted into.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Replace the target unit mid-pass.
    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = target.into();
    }

    /// Read access to the table being harmonized.
    pub fn table(&self) -> &WqTable {
        self.table
    }

    /// Rows selected for this characteristic.
    pub fn rows_mask(&self) -> &[bool] {
        &self.c_mask
    }

    /// Copy each selected row's measure into the output column as a number.
    /// Rows whose measure is missing or non-numeric are flagged and left
    /// empty so later steps skip them.
    fn coerce_measure(&mut self) -> Result<()> {
        let meas_idx = self.table.require_column(table::MEASURE_COL)?;
        let out_idx = self.table.ensure_column(self.out_col);
        let n_rows = self.table.n_rows();

        let mut any_missing = false;
        let mut bad_texts: Vec<String> = Vec::new();
        for row in 0..n_rows {
            if !self.c_mask[row] {
                continue;
            }
            let cell = self.table.cell(row, meas_idx).clone();
            let value = cell
                .magnitude()
                .or_else(|| cell.as_text().and_then(table::coerce_numeric));
            match value {
                Some(v) => {
                    self.table.set(row, out_idx, Cell::Number(v));
                    self.coerced += 1;
                }
                None if cell.is_empty() => any_missing = true,
                None => {
                    if let Some(text) = cell.as_text() {
                        if !bad_texts.iter().any(|t| t == text) {
                            bad_texts.push(text.to_string());
                        }
                    }
                }
            }
        }

        if any_missing {
            let mask: Vec<bool> = (0..n_rows)
                .map(|row| self.c_mask[row] && self.table.cell(row, meas_idx).is_empty())
                .collect();
            self.ledger
                .add_masked(&mask, &QaFlag::missing_result(table::MEASURE_COL));
        }
        for bad in &bad_texts {
            let mask: Vec<bool> = (0..n_rows)
                .map(|row| {
                    self.c_mask[row] && self.table.text(row, meas_idx) == Some(bad.as_str())
                })
                .collect();
            self.ledger
                .add_masked(&mask, &QaFlag::unusable_result(table::MEASURE_COL, bad));
        }
        Ok(())
    }

    /// Selected rows that still carry a usable measure.
    pub fn measure_mask(&self) -> Vec<bool> {
        let n_rows = self.table.n_rows();
        let Some(out_idx) = self.table.column_index(self.out_col) else {
            return vec![false; n_rows];
        };
        (0..n_rows)
            .map(|row| self.c_mask[row] && self.table.cell(row, out_idx).magnitude().is_some())
            .collect()
    }

    /// Measured rows whose working unit equals `unit` exactly.
    pub fn unit_mask(&self, unit: &str) -> Vec<bool> {
        let measured = self.measure_mask();
        let Some(units_idx) = self.table.column_index(table::UNITS_COL) else {
            return vec![false; self.table.n_rows()];
        };
        (0..self.table.n_rows())
            .map(|row| measured[row] && self.table.text(row, units_idx) == Some(unit))
            .collect()
    }

    /// Rewrite whole unit strings under `mask` from a replacement list.
    /// Each cell is matched against the list once, so chained entries like
    /// `("% by wt", "%")` and `("%", "percent")` do not cascade.
    pub fn replace_units<'p, I>(&mut self, pairs: I, mask: &[bool])
    where
        I: IntoIterator<Item = (&'p str, &'p str)>,
    {
        let Some(units_idx) = self.table.column_index(table::UNITS_COL) else {
            return;
        };
        let pairs: Vec<(&str, &str)> = pairs.into_iter().collect();
        if pairs.is_empty() {
            return;
        }
        for row in 0..self.table.n_rows() {
            if !mask[row] {
                continue;
            }
            let replacement = self
                .table
                .text(row, units_idx)
                .and_then(|text| pairs.iter().find(|(old, _)| *old == text))
                .map(|(_, new)| new.to_string());
            if let Some(new) = replacement {
                self.table.set(row, units_idx, Cell::Text(new));
                self.replaced += 1;
            }
        }
    }

    /// Substring rewrite over the working units of the selected rows.
    pub fn replace_unit_substring(&mut self, old: &str, new: &str) {
        let Some(units_idx) = self.table.column_index(table::UNITS_COL) else {
            return;
        };
        for row in 0..self.table.n_rows() {
            if !self.c_mask[row] {
                continue;
            }
            let replaced = match self.table.text(row, units_idx) {
                Some(text) if text.contains(old) => Some(text.replace(old, new)),
                _ => None,
            };
            if let Some(text) = replaced {
                self.table.set(row, units_idx, Cell::Text(text));
            }
        }
    }

    /// Fill empty working units with the target unit, flagging each row.
    /// Applies to every selected row, measured or not, so inferred units
    /// survive even where the measure was unusable.
    pub fn infer_units(&mut self) {
        let n_rows = self.table.n_rows();
        let Some(units_idx) = self.table.column_index(table::UNITS_COL) else {
            return;
        };
        let mask: Vec<bool> = (0..n_rows)
            .map(|row| self.c_mask[row] && self.table.cell(row, units_idx).is_empty())
            .collect();
        if !mask.iter().any(|&hit| hit) {
            return;
        }
        self.ledger.add_masked(
            &mask,
            &QaFlag::missing_units(table::UNITS_RAW_COL, &self.target),
        );
        let target = self.target.clone();
        for row in 0..n_rows {
            if mask[row] {
                self.table.set(row, units_idx, Cell::Text(target.clone()));
                self.inferred += 1;
            }
        }
    }

    /// Unit hygiene for the selected rows: apply the characteristic's
    /// bad-unit replacements, fill missing units with the target, then
    /// force any unit the registry cannot parse to the target unit,
    /// flagging the measured rows it touched.
    pub fn check_units(&mut self) -> Result<()> {
        let mask = self.c_mask.clone();
        let fixes = self.characteristic.bad_unit_fixes();
        self.replace_units(fixes.iter().copied(), &mask);
        self.infer_units();

        let units_idx = self.table.require_column(table::UNITS_COL)?;
        for unit in self.table.distinct_text(units_idx, &self.c_mask) {
            if Unit::parse(&self.registry, &unit).is_ok() {
                continue;
            }
            warn!("'{}' UNDEFINED UNIT for {}", unit, self.out_col);
            let u_mask = self.unit_mask(&unit);
            self.ledger.add_masked(
                &u_mask,
                &QaFlag::undefined_units(table::UNITS_RAW_COL, &unit, self.out_col, &self.target),
            );
            let target = self.target.clone();
            for row in 0..self.table.n_rows() {
                if u_mask[row] {
                    self.table.set(row, units_idx, Cell::Text(target.clone()));
                    self.replaced += 1;
                }
            }
        }
        Ok(())
    }

    /// Resolve the basis recorded in `basis_col` for the selected rows.
    ///
    /// For the method speciation column this moves speciations into the
    /// `Speciation` column, extracts basis notes like `"mg/l as P"` out of
    /// the working units, falls back to the characteristic name where no
    /// basis was recorded, and strips any `"as "` prefix. Other basis
    /// columns are resolved per [`basis::resolve_text_basis`].
    pub fn check_basis(&mut self, basis_col: &str) -> Result<()> {
        self.table.require_column(basis_col)?;
        let mask = self.c_mask.clone();

        if basis_col == table::METHOD_SPEC_COL {
            self.table.ensure_column(table::SPECIATION_COL);
            basis::basis_from_method_spec(self.table, &mask, table::SPECIATION_COL)?;
            if let Some(rules) = basis::unit_basis_rules(self.out_col) {
                basis::basis_from_unit(
                    self.table,
                    &mask,
                    rules,
                    table::UNITS_COL,
                    table::SPECIATION_COL,
                    &mut self.ledger,
                )?;
            }
            let spec_idx = self.table.require_column(table::SPECIATION_COL)?;
            let name = self.characteristic.name();
            for row in 0..self.table.n_rows() {
                if !mask[row] {
                    continue;
                }
                let updated = match self.table.text(row, spec_idx) {
                    None => Some(name.to_string()),
                    Some(text) => {
                        let stripped = basis::strip_basis_prefix(text);
                        (stripped != text).then(|| stripped.to_string())
                    }
                };
                if let Some(value) = updated {
                    self.table.set(row, spec_idx, Cell::Text(value));
                }
            }
        } else {
            basis::resolve_text_basis(
                self.table,
                &mask,
                basis_col,
                table::UNITS_COL,
                &mut self.ledger,
            )?;
        }
        Ok(())
    }

    /// Distinct working units among measured rows whose dimension differs
    /// from the target's, in first-appearance order.
    pub fn dimensions_list(&self) -> Result<Vec<String>> {
        let measured = self.measure_mask();
        let Some(units_idx) = self.table.column_index(table::UNITS_COL) else {
            return Ok(Vec::new());
        };
        let units: Vec<Option<String>> = (0..self.table.n_rows())
            .map(|row| {
                if measured[row] {
                    self.table.text(row, units_idx).map(str::to_string)
                } else {
                    None
                }
            })
            .collect();
        mismatched_dimensions(&units, &self.target, &self.registry)
    }

    /// Distinct basis values on the selected rows. An entry of `None`
    /// stands for rows with an empty basis cell, or for the whole
    /// selection when the table has no basis column.
    fn speciation_bases(&self) -> Vec<Option<String>> {
        let mut bases: Vec<Option<String>> = Vec::new();
        if let Some(idx) = self.table.column_index(table::SPECIATION_COL) {
            for row in 0..self.table.n_rows() {
                if !self.c_mask[row] {
                    continue;
                }
                let value = self.table.text(row, idx).map(str::to_string);
                if !bases.contains(&value) {
                    bases.push(value);
                }
            }
        }
        if bases.is_empty() {
            bases.push(None);
        }
        bases
    }

    /// Plan unit rewrites that reconcile mismatched dimensions with the
    /// target before conversion.
    ///
    /// Density targets gain `* H2O` on dimensionless units and ratio
    /// targets gain `/ H2O` on density units. Substance (mole) units are
    /// expanded per basis through the molecular weight table into an
    /// interim mass-per-volume unit, with a matching [`MoleFix`] to finish
    /// the job in [`moles_convert`]. Units that fit none of those paths
    /// are logged and left for the conversion step's error policy.
    ///
    /// [`moles_convert`]: HarmonizePass::moles_convert
    pub fn dimension_fixes(&self) -> Result<(Vec<DimensionFix>, Vec<MoleFix>)> {
        let mut fixes = Vec::new();
        let mut moles: Vec<MoleFix> = Vec::new();

        let target_unit = Unit::parse(&self.registry, &self.target)?;
        if target_unit.dimension() == Dimension::AMOUNT {
            warn!("This feature is not available yet");
            return Ok((fixes, moles));
        }
        let to_density = target_unit.dimension() == Dimension::DENSITY;
        let to_ratio = target_unit.dimension().is_dimensionless();

        for unit in self.dimensions_list()? {
            let parsed = Unit::parse(&self.registry, &unit)?;
            if parsed.dimension() == Dimension::AMOUNT {
                if !to_density && !to_ratio {
                    warn!("Unexpected dimensionality: '{}' -> '{}'", unit, self.target);
                    continue;
                }
                let (suffix, final_unit) = if to_density {
                    (" / l", "gram / liter")
                } else {
                    (" / l / H2O", "gram / liter / H2O")
                };
                for basis_value in self.speciation_bases() {
                    let one = Quantity::new(1.0, &unit);
                    let mass = convert::moles_to_mass(
                        &self.registry,
                        &one,
                        basis_value.as_deref(),
                        Some(self.characteristic.name()),
                    )?;
                    let interim = format!("{} {}{}", mass.magnitude, mass.unit, suffix);
                    fixes.push(DimensionFix {
                        unit: unit.clone(),
                        basis: match basis_value {
                            Some(value) => BasisMatch::Equals(value),
                            None => BasisMatch::Empty,
                        },
                        replacement: interim.clone(),
                    });
                    if !moles.iter().any(|m| m.interim_unit == interim) {
                        moles.push(MoleFix {
                            interim_unit: interim,
                            factor: mass.magnitude,
                            final_unit,
                        });
                    }
                }
            } else if to_density {
                fixes.push(DimensionFix {
                    unit: unit.clone(),
                    basis: BasisMatch::Any,
                    replacement: format!("{unit} * H2O"),
                });
            } else if to_ratio {
                fixes.push(DimensionFix {
                    unit: unit.clone(),
                    basis: BasisMatch::Any,
                    replacement: format!("{unit} / H2O"),
                });
            } else {
                warn!("Unexpected dimensionality: '{}' -> '{}'", unit, self.target);
            }
        }
        Ok((fixes, moles))
    }

    /// Rewrite working units per the planned fixes, on measured rows whose
    /// unit and basis both match.
    pub fn apply_dimension_fixes(&mut self, fixes: &[DimensionFix]) {
        if fixes.is_empty() {
            return;
        }
        let measured = self.measure_mask();
        let Some(units_idx) = self.table.column_index(table::UNITS_COL) else {
            return;
        };
        let spec_idx = self.table.column_index(table::SPECIATION_COL);
        for fix in fixes {
            for row in 0..self.table.n_rows() {
                if !measured[row]
                    || self.table.text(row, units_idx) != Some(fix.unit.as_str())
                {
                    continue;
                }
                let row_basis = spec_idx.and_then(|idx| self.table.text(row, idx));
                if !fix.basis.matches(row_basis) {
                    continue;
                }
                self.table
                    .set(row, units_idx, Cell::Text(fix.replacement.clone()));
            }
        }
    }

    /// Finish mole expansion: multiply measures carrying an interim unit
    /// by its molecular-weight factor and stamp the final mass unit.
    pub fn moles_convert(&mut self, moles: &[MoleFix]) -> Result<()> {
        if moles.is_empty() {
            return Ok(());
        }
        let out_idx = self.table.require_column(self.out_col)?;
        let units_idx = self.table.require_column(table::UNITS_COL)?;
        for fix in moles {
            let mask = self.unit_mask(&fix.interim_unit);
            for row in 0..self.table.n_rows() {
                if !mask[row] {
                    continue;
                }
                if let Some(value) = self.table.cell(row, out_idx).magnitude() {
                    self.table
                        .set(row, out_idx, Cell::Number(value * fix.factor));
                }
                self.table
                    .set(row, units_idx, Cell::Text(fix.final_unit.to_string()));
            }
        }
        Ok(())
    }

    /// Run an empirical conversion over every measured row whose working
    /// unit equals `unit`, writing the formula's output unit back.
    pub fn apply_conversion(
        &mut self,
        conversion: &EmpiricalConversion,
        unit: &str,
    ) -> Result<()> {
        let u_mask = self.unit_mask(unit);
        if !u_mask.iter().any(|&hit| hit) {
            return Ok(());
        }
        debug!("applying {} to '{}' rows", conversion.name, unit);
        let out_idx = self.table.require_column(self.out_col)?;
        let units_idx = self.table.require_column(table::UNITS_COL)?;
        for row in 0..self.table.n_rows() {
            if !u_mask[row] {
                continue;
            }
            if let Some(value) = self.table.cell(row, out_idx).magnitude() {
                let quantity = Quantity::new(value, unit);
                let converted = conversion.convert_quantity(&self.registry, &quantity)?;
                self.table
                    .set(row, out_idx, Cell::Number(converted.magnitude));
            }
            self.table.set(
                row,
                units_idx,
                Cell::Text(conversion.output_unit.to_string()),
            );
        }
        Ok(())
    }

    /// Convert every measured row into the target unit, writing quantity
    /// cells into the output column. Rows whose unit cannot reach the
    /// target dimension follow `policy`.
    pub fn convert_units(&mut self, policy: DimensionErrorPolicy) -> Result<()> {
        let measured = self.measure_mask();
        let out_idx = self.table.require_column(self.out_col)?;
        let units_idx = self.table.require_column(table::UNITS_COL)?;
        let n_rows = self.table.n_rows();

        let mut values: Vec<Option<f64>> = vec![None; n_rows];
        let mut units: Vec<Option<String>> = vec![None; n_rows];
        for row in 0..n_rows {
            if measured[row] {
                values[row] = self.table.cell(row, out_idx).magnitude();
                units[row] = self.table.text(row, units_idx).map(str::to_string);
            }
        }

        let converted = convert_series(&values, &units, &self.target, &self.registry, policy)?;
        for (row, quantity) in converted.into_iter().enumerate() {
            if !measured[row] {
                continue;
            }
            let cell = match quantity {
                Some(q) => Cell::Quantity(q),
                None => Cell::Empty,
            };
            self.table.set(row, out_idx, cell);
        }
        Ok(())
    }

    /// Apply the accumulated QA flags, drop the working `Units` column
    /// unless the caller wants to keep intermediate columns, and report
    /// what the pass did.
    pub fn finish(self, keep_intermediate_columns: bool) -> PassSummary {
        let summary = PassSummary {
            characteristic: self.characteristic.name().to_string(),
            rows: self.c_mask.iter().filter(|&&hit| hit).count(),
            measures_coerced: self.coerced,
            units_inferred: self.inferred,
            units_replaced: self.replaced,
            flags_appended: self.ledger.len(),
        };
        self.ledger.apply_to(self.table);
        if !keep_intermediate_columns {
            self.table.drop_column(table::UNITS_COL);
        }
        summary
    }
}

fn bacteria(pass: &mut HarmonizePass) -> Result<()> {
    // The replacement dict has to run before the substring rewrites so
    // parenthesized counts like '#/100ml' are not double-wrapped.
    let fixes = pass.characteristic().bad_unit_fixes();
    let mask = pass.rows_mask().to_vec();
    pass.replace_units(fixes.iter().copied(), &mask);
    pass.replace_unit_substring("/100ml", "/(100ml)");
    pass.replace_unit_substring("/100 ml", "/(100ml)");
    pass.check_units()
}

fn nutrient(pass: &mut HarmonizePass) -> Result<()> {
    pass.check_basis(table::METHOD_SPEC_COL)?;
    pass.check_units()?;
    let (fixes, moles) = pass.dimension_fixes()?;
    pass.apply_dimension_fixes(&fixes);
    pass.moles_convert(&moles)
}

fn temperature(pass: &mut HarmonizePass) -> Result<()> {
    let target = pass.target().replace(' ', "");
    pass.set_target(target);
    pass.replace_unit_substring(" ", "");
    pass.check_units()
}

fn dissolved_oxygen(pass: &mut HarmonizePass) -> Result<()> {
    pass.check_units()?;
    let target_unit = Unit::parse(&pass.registry, pass.target())?;
    for unit in pass.dimensions_list()? {
        if target_unit.dimension() == Dimension::DENSITY {
            pass.apply_conversion(&convert::DO_SATURATION, &unit)?;
        } else if target_unit.dimension().is_dimensionless() {
            pass.apply_conversion(&convert::DO_CONCENTRATION, &unit)?;
            warn!("Need % saturation equation for {unit}");
        }
    }
    Ok(())
}

fn salinity(pass: &mut HarmonizePass) -> Result<()> {
    pass.check_basis(table::TEMPERATURE_BASIS_COL)?;
    pass.check_units()?;
    let target_unit = Unit::parse(&pass.registry, pass.target())?;
    for unit in pass.dimensions_list()? {
        if target_unit.dimension().is_dimensionless() {
            let parsed = Unit::parse(&pass.registry, &unit)?;
            if parsed.dimension() == Dimension::DENSITY {
                pass.apply_conversion(&convert::DENSITY_TO_PSU, &unit)?;
            }
        } else if target_unit.dimension() == Dimension::DENSITY {
            pass.apply_conversion(&convert::PSU_TO_DENSITY, &unit)?;
        }
    }
    Ok(())
}

fn turbidity(pass: &mut HarmonizePass) -> Result<()> {
    pass.check_units()?;
    let target_unit = Unit::parse(&pass.registry, pass.target())?;
    for unit in pass.dimensions_list()? {
        if target_unit.dimension() == Dimension::TURBIDITY {
            let parsed = Unit::parse(&pass.registry, &unit)?;
            if parsed.dimension().is_dimensionless() {
                match unit.as_str() {
                    "JTU" => pass.apply_conversion(&convert::JTU_TO_NTU, &unit)?,
                    "SiO2" => pass.apply_conversion(&convert::SIO2_TO_NTU, &unit)?,
                    _ => warn!("Bad Turbidity unit: {unit}"),
                }
            } else if parsed.dimension() == Dimension::LENGTH {
                pass.apply_conversion(&convert::CM_TO_NTU, &unit)?;
            } else {
                warn!("Bad Turbidity unit: {unit}");
            }
        } else if target_unit.dimension() == Dimension::LENGTH {
            pass.apply_conversion(&convert::NTU_TO_CM, &unit)?;
        } else {
            warn!("Bad Turbidity unit: {unit}");
        }
    }
    Ok(())
}

fn sediment(pass: &mut HarmonizePass) -> Result<()> {
    pass.check_basis(table::PARTICLE_SIZE_BASIS_COL)?;
    pass.check_units()?;
    let (fixes, _moles) = pass.dimension_fixes()?;
    pass.apply_dimension_fixes(&fixes);
    Ok(())
}

/// Harmonize every row of `name` in place: measures coerced into the
/// characteristic's output column as quantities in the target unit, QA
/// flags appended, and sample fractions split into their own columns for
/// the nutrient characteristics.
pub fn harmonize_characteristic(
    table: &mut WqTable,
    name: &str,
    options: &HarmonizeOptions,
) -> Result<PassSummary> {
    let characteristic = Characteristic::from_name(name)
        .ok_or_else(|| HarmonizeError::UnknownCharacteristic(name.to_string()))?;
    debug!("harmonizing '{}'", characteristic.name());

    let mut pass = HarmonizePass::new(table, characteristic, options.target_unit.as_deref())?;
    match characteristic {
        Characteristic::Ph
        | Characteristic::Secchi
        | Characteristic::Conductivity
        | Characteristic::Chlorophyll => pass.check_units()?,
        Characteristic::FecalColiform | Characteristic::EColi => bacteria(&mut pass)?,
        Characteristic::Carbon | Characteristic::Phosphorus | Characteristic::Nitrogen => {
            nutrient(&mut pass)?
        }
        Characteristic::Temperature => temperature(&mut pass)?,
        Characteristic::DissolvedOxygen => dissolved_oxygen(&mut pass)?,
        Characteristic::Salinity => salinity(&mut pass)?,
        Characteristic::Turbidity => turbidity(&mut pass)?,
        Characteristic::Sediment => sediment(&mut pass)?,
    }
    pass.convert_units(options.on_dimension_error)?;

    if let Some(mappings) = fraction::default_fractions(pass.out_col()) {
        let mask = pass.rows_mask().to_vec();
        let out_col = pass.out_col();
        fraction::split_fractions(pass.table, &mask, out_col, mappings)?;
    }
    Ok(pass.finish(options.keep_intermediate_columns))
}

/// Harmonize every characteristic present in the table, in sorted name
/// order so repeated runs touch rows in the same sequence. Returns one
/// summary per characteristic, or an error on the first name with no
/// harmonization support.
pub fn harmonize_all(
    table: &mut WqTable,
    on_dimension_error: DimensionErrorPolicy,
) -> Result<Vec<PassSummary>> {
    let char_idx = table.require_column(table::CHARACTERISTIC_COL)?;
    let mut names = table.distinct_text(char_idx, &table.full_mask());
    names.sort();

    let options = HarmonizeOptions {
        on_dimension_error,
        ..HarmonizeOptions::default()
    };
    names
        .into_iter()
        .map(|name| harmonize_characteristic(table, &name, &options))
        .collect()
}
