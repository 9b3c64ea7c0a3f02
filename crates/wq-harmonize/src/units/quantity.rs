//! Quantities and unit-to-unit conversion.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HarmonizeError, Result};
use crate::units::dimension::Dimension;
use crate::units::parser::ParsedUnit;
use crate::units::registry::UnitRegistry;

/// A magnitude with the unit string it is expressed in. This is what lands
/// in harmonized output columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub magnitude: f64,
    pub unit: String,
}

impl Quantity {
    pub fn new(magnitude: f64, unit: impl Into<String>) -> Self {
        Self {
            magnitude,
            unit: unit.into(),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.magnitude, self.unit)
    }
}

/// A unit expression paired with its parse, keeping the original spelling
/// for messages and output.
#[derive(Debug, Clone, PartialEq)]
pub struct Unit {
    original: String,
    parsed: ParsedUnit,
}

impl Unit {
    pub fn parse(registry: &UnitRegistry, input: &str) -> Result<Self> {
        let trimmed = input.trim();
        Ok(Self {
            original: trimmed.to_string(),
            parsed: registry.parse_unit(trimmed)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.original
    }

    pub fn dimension(&self) -> Dimension {
        self.parsed.dimension
    }

    pub fn factor(&self) -> f64 {
        self.parsed.factor
    }

    /// Units convert linearly iff their dimensions match.
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.parsed.dimension == other.parsed.dimension
    }

    /// Converts a magnitude in this unit to `target`. Handles temperature
    /// offsets; fails on a dimension mismatch.
    pub fn convert_value(&self, value: f64, target: &Unit) -> Result<f64> {
        if !self.is_compatible(target) {
            return Err(HarmonizeError::IncompatibleDimensions {
                from_unit: self.original.clone(),
                to_unit: target.original.clone(),
                from_dim: self.parsed.dimension.to_string(),
                to_dim: target.parsed.dimension.to_string(),
            });
        }
        let internal = value * self.parsed.factor + self.parsed.offset;
        Ok((internal - target.parsed.offset) / target.parsed.factor)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// One-off conversion of a single value between unit strings.
pub fn convert(registry: &UnitRegistry, value: f64, from: &str, to: &str) -> Result<f64> {
    let from = Unit::parse(registry, from)?;
    let to = Unit::parse(registry, to)?;
    from.convert_value(value, &to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_conversion() {
        let reg = UnitRegistry::standard();
        assert!((convert(&reg, 1.0, "mg/l", "ug/l").unwrap() - 1000.0).abs() < 1e-9);
        assert!((convert(&reg, 2.5, "m", "ft").unwrap() - 8.202099737532808).abs() < 1e-9);
    }

    #[test]
    fn test_temperature_offsets() {
        let reg = UnitRegistry::standard();
        let celsius = convert(&reg, 87.0, "degF", "degC").unwrap();
        assert!((celsius - 30.555555555555557).abs() < 1e-9);
        assert!((convert(&reg, 0.0, "degC", "K").unwrap() - 273.15).abs() < 1e-9);
        assert!((convert(&reg, 32.0, "degF", "degC").unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_incompatible_dimensions_error_names_both_units() {
        let reg = UnitRegistry::standard();
        let err = convert(&reg, 1.0, "mg/l", "m").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("mg/l"));
        assert!(msg.contains("'m'"));
        assert!(msg.contains("[mass] [length]^-3"));
    }

    #[test]
    fn test_quantity_display() {
        let q = Quantity::new(1.5, "mg/l");
        assert_eq!(q.to_string(), "1.5 mg/l");
    }

    #[test]
    fn test_dimensionless_family_scaling() {
        let mut reg = UnitRegistry::standard();
        reg.apply_definitions([
            "fraction = [] = frac",
            "percent = 1e-2 frac",
            "parts_per_thousand = 1e-3 = ppth",
            "Practical_Salinity_Units = ppth = PSU = PSS",
        ]);
        assert!((convert(&reg, 35.0, "ppth", "PSU").unwrap() - 35.0).abs() < 1e-12);
        assert!((convert(&reg, 3.5, "percent", "PSU").unwrap() - 35.0).abs() < 1e-9);
        // g/kg is dimensionless with a 1e-3 factor, same scale as PSU.
        assert!((convert(&reg, 35.0, "g/kg", "PSU").unwrap() - 35.0).abs() < 1e-9);
    }
}
