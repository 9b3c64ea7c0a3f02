//! Batch conversion of a value column grouped by distinct unit.
//!
//! Work scales with the number of distinct unit strings, not the number of
//! rows: each distinct unit is parsed and checked once, then its rows are
//! converted with plain arithmetic. Distinct units are visited in
//! first-appearance order.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{HarmonizeError, Result};
use crate::units::quantity::{Quantity, Unit};
use crate::units::registry::UnitRegistry;

/// What to do when a distinct unit cannot be converted to the target
/// dimension. Undefined units are not policy-gated; they always raise,
/// because the unit-normalization step is supposed to have repaired them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionErrorPolicy {
    /// Fail the whole conversion.
    #[default]
    Raise,
    /// Leave the group's values in their original unit.
    Skip,
    /// Replace the group's values with missing.
    Ignore,
}

impl DimensionErrorPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Raise => "raise",
            Self::Skip => "skip",
            Self::Ignore => "ignore",
        }
    }
}

/// Converts `values` (per-row magnitudes) from their per-row `units` to
/// `target`. Rows with a missing value or missing unit come back `None`.
/// A unit string spelled exactly like the target converts by construction.
pub fn convert_series(
    values: &[Option<f64>],
    units: &[Option<String>],
    target: &str,
    registry: &UnitRegistry,
    policy: DimensionErrorPolicy,
) -> Result<Vec<Option<Quantity>>> {
    debug_assert_eq!(values.len(), units.len());
    let target_unit = Unit::parse(registry, target)?;
    let mut out: Vec<Option<Quantity>> = vec![None; values.len()];

    let mut groups: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (row, unit) in units.iter().enumerate() {
        if let (Some(unit), Some(_)) = (unit, values[row]) {
            groups.entry(unit.as_str()).or_default().push(row);
        }
    }

    for (unit_str, rows) in groups {
        if unit_str == target {
            for row in rows {
                out[row] = values[row].map(|v| Quantity::new(v, target));
            }
            continue;
        }
        let unit = Unit::parse(registry, unit_str)?;
        if !unit.is_compatible(&target_unit) {
            match policy {
                DimensionErrorPolicy::Raise => {
                    return Err(HarmonizeError::IncompatibleDimensions {
                        from_unit: unit.as_str().to_string(),
                        to_unit: target_unit.as_str().to_string(),
                        from_dim: unit.dimension().to_string(),
                        to_dim: target_unit.dimension().to_string(),
                    });
                }
                DimensionErrorPolicy::Skip => {
                    log::warn!("'{unit_str}' not converted");
                    for row in rows {
                        out[row] = values[row].map(|v| Quantity::new(v, unit_str));
                    }
                }
                DimensionErrorPolicy::Ignore => {
                    log::warn!("'{unit_str}' not converted, values dropped");
                }
            }
            continue;
        }
        for row in rows {
            if let Some(v) = values[row] {
                out[row] = Some(Quantity::new(unit.convert_value(v, &target_unit)?, target));
            }
        }
    }
    Ok(out)
}

/// Distinct unit strings whose dimensionality differs from the target's,
/// in first-appearance order. Units that no longer parse are skipped; the
/// normalization step already replaced what it could not define.
pub fn mismatched_dimensions(
    units: &[Option<String>],
    target: &str,
    registry: &UnitRegistry,
) -> Result<Vec<String>> {
    let target_unit = Unit::parse(registry, target)?;
    let mut seen = indexmap::IndexSet::new();
    let mut mismatched = Vec::new();
    for unit_str in units.iter().flatten() {
        if !seen.insert(unit_str.as_str()) {
            continue;
        }
        match Unit::parse(registry, unit_str) {
            Ok(unit) => {
                if !unit.is_compatible(&target_unit) {
                    mismatched.push(unit_str.clone());
                }
            }
            Err(err) => {
                log::debug!("'{unit_str}' left out of dimension check: {err}");
            }
        }
    }
    Ok(mismatched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_groups_convert_in_row_order() {
        let reg = UnitRegistry::standard();
        let values = vec![Some(1.0), Some(2000.0), Some(3.0), None];
        let units = vec![some("mg/l"), some("ug/l"), some("mg/l"), some("mg/l")];
        let out = convert_series(&values, &units, "mg/l", &reg, DimensionErrorPolicy::Raise)
            .unwrap();
        assert_eq!(out[0], Some(Quantity::new(1.0, "mg/l")));
        assert!((out[1].as_ref().unwrap().magnitude - 2.0).abs() < 1e-9);
        assert_eq!(out[1].as_ref().unwrap().unit, "mg/l");
        assert_eq!(out[2], Some(Quantity::new(3.0, "mg/l")));
        // Missing value stays missing.
        assert_eq!(out[3], None);
    }

    #[test]
    fn test_missing_unit_rows_left_alone() {
        let reg = UnitRegistry::standard();
        let values = vec![Some(1.0)];
        let units = vec![None];
        let out = convert_series(&values, &units, "mg/l", &reg, DimensionErrorPolicy::Raise)
            .unwrap();
        assert_eq!(out, vec![None]);
    }

    #[test]
    fn test_offset_units_convert_in_batch() {
        let reg = UnitRegistry::standard();
        let values = vec![Some(87.0), Some(20.0)];
        let units = vec![some("degF"), some("degC")];
        let out = convert_series(&values, &units, "degC", &reg, DimensionErrorPolicy::Raise)
            .unwrap();
        assert!((out[0].as_ref().unwrap().magnitude - 30.555555555555557).abs() < 1e-9);
        // Spelled exactly like the target: converted by construction.
        assert_eq!(out[1], Some(Quantity::new(20.0, "degC")));
    }

    #[test]
    fn test_policy_on_dimension_mismatch() {
        let reg = UnitRegistry::standard();
        let values = vec![Some(5.0)];
        let units = vec![some("m")];

        let raise = convert_series(&values, &units, "mg/l", &reg, DimensionErrorPolicy::Raise);
        assert!(matches!(
            raise,
            Err(HarmonizeError::IncompatibleDimensions { .. })
        ));

        let skip = convert_series(&values, &units, "mg/l", &reg, DimensionErrorPolicy::Skip)
            .unwrap();
        assert_eq!(skip[0], Some(Quantity::new(5.0, "m")));

        let ignore = convert_series(&values, &units, "mg/l", &reg, DimensionErrorPolicy::Ignore)
            .unwrap();
        assert_eq!(ignore[0], None);
    }

    #[test]
    fn test_undefined_unit_always_raises() {
        let reg = UnitRegistry::standard();
        let values = vec![Some(5.0)];
        let units = vec![some("florp")];
        let result = convert_series(&values, &units, "mg/l", &reg, DimensionErrorPolicy::Skip);
        assert!(matches!(result, Err(HarmonizeError::UndefinedUnit(_))));
    }

    #[test]
    fn test_mismatched_dimensions_first_appearance_order() {
        let mut reg = UnitRegistry::standard();
        reg.apply_definitions([
            "Nephelometric_Turbidity_Units = [turbidity] = NTU",
            "Jackson_Turbidity_Units = [] = JTU",
            "SiO2 = []",
        ]);
        let units = vec![some("cm"), some("NTU"), some("JTU"), some("cm"), some("SiO2")];
        let mismatched = mismatched_dimensions(&units, "NTU", &reg).unwrap();
        assert_eq!(mismatched, vec!["cm", "JTU", "SiO2"]);
    }
}
