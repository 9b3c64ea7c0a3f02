//! Unit registry: named units, aliases, metric prefixes, and pint-style
//! definition strings.
//!
//! Each harmonization pass builds a fresh registry from [`UnitRegistry::standard`]
//! plus the characteristic's extension definitions, so pseudo-units like NTU
//! or CFU never leak into another characteristic's pass.

use indexmap::IndexMap;

use crate::error::{HarmonizeError, Result};
use crate::units::dimension::Dimension;
use crate::units::parser::UnitParser;

/// Metric prefixes, longest symbol first so "da" wins over "d".
const PREFIXES: &[(&str, f64)] = &[
    ("da", 1e1),
    ("Y", 1e24),
    ("Z", 1e21),
    ("E", 1e18),
    ("P", 1e15),
    ("T", 1e12),
    ("G", 1e9),
    ("M", 1e6),
    ("k", 1e3),
    ("h", 1e2),
    ("d", 1e-1),
    ("c", 1e-2),
    ("m", 1e-3),
    ("u", 1e-6),
    ("n", 1e-9),
    ("p", 1e-12),
    ("f", 1e-15),
    ("a", 1e-18),
    ("z", 1e-21),
    ("y", 1e-24),
];

/// One registered unit. `factor` converts a magnitude in this unit to the
/// registry's internal scale for its dimension; `offset` is nonzero only for
/// temperature scales (value_internal = value * factor + offset).
#[derive(Debug, Clone, PartialEq)]
pub struct UnitInfo {
    pub name: String,
    pub dimension: Dimension,
    pub factor: f64,
    pub offset: f64,
}

impl UnitInfo {
    pub fn has_offset(&self) -> bool {
        self.offset != 0.0
    }
}

/// Registry of unit definitions with alias and prefix resolution.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: IndexMap<String, UnitInfo>,
    aliases: IndexMap<String, String>,
}

impl UnitRegistry {
    /// Standard registry: SI base units with metric prefixes, the customary
    /// units WQP data actually uses, offset temperature scales, the
    /// dimensionless family, and the water density unit.
    pub fn standard() -> Self {
        let mut reg = Self::default();

        reg.add_base("meter", Dimension::LENGTH, &["m", "metre", "meters"]);
        reg.add_derived("liter", 1e-3, Dimension::LENGTH.pow(3), &["l", "L", "litre", "liters"]);
        reg.add_derived("foot", 0.3048, Dimension::LENGTH, &["ft", "feet"]);
        reg.add_derived("inch", 0.0254, Dimension::LENGTH, &["in", "inches"]);

        reg.add_base("kilogram", Dimension::MASS, &["kg"]);
        reg.add_derived("gram", 1e-3, Dimension::MASS, &["g", "grams"]);

        reg.add_base("second", Dimension::TIME, &["s", "sec"]);
        reg.add_derived("minute", 60.0, Dimension::TIME, &["min"]);
        reg.add_derived("hour", 3600.0, Dimension::TIME, &["h", "hr"]);
        reg.add_derived("day", 86400.0, Dimension::TIME, &["d"]);

        reg.add_base("kelvin", Dimension::TEMPERATURE, &["K", "degK"]);
        reg.add_offset("degree_Celsius", 1.0, 273.15, &["degC", "celsius"]);
        reg.add_offset(
            "degree_Fahrenheit",
            5.0 / 9.0,
            459.67 * 5.0 / 9.0,
            &["degF", "fahrenheit"],
        );

        reg.add_base("ampere", Dimension::CURRENT, &["A", "amp"]);
        reg.add_base("mole", Dimension::AMOUNT, &["mol", "moles"]);

        // Conductance, for uS/cm and umho/cm.
        let conductance = Dimension {
            mass: -1,
            length: -2,
            time: 3,
            current: 2,
            ..Dimension::NONE
        };
        reg.add_derived("siemens", 1.0, conductance, &["S", "mho"]);

        reg.add_derived("dimensionless", 1.0, Dimension::NONE, &[]);
        reg.add_derived("percent", 1e-2, Dimension::NONE, &["%"]);
        reg.add_derived("ppm", 1e-6, Dimension::NONE, &[]);
        reg.add_derived("ppb", 1e-9, Dimension::NONE, &[]);

        // 1 liter of water weighs 1 kg; the named unit lets density rewrites
        // stay inside the registry instead of hard-coding 1000 g/l.
        reg.add_derived("water", 1000.0, Dimension::DENSITY, &["H2O"]);

        reg
    }

    /// Applies definition strings in order, warning and skipping any that
    /// fail to resolve. Later definitions shadow earlier ones.
    pub fn apply_definitions<'a>(&mut self, definitions: impl IntoIterator<Item = &'a str>) {
        for definition in definitions {
            if let Err(err) = self.define(definition) {
                log::warn!("skipping unit definition '{definition}': {err}");
            }
        }
    }

    /// Adds one pint-style definition:
    /// `name = []` (new dimensionless unit), `name = [dim]` (base unit of a
    /// dimension), or `name = <expression>` (derived), each with optional
    /// `= alias` tails.
    pub fn define(&mut self, definition: &str) -> Result<()> {
        let segments: Vec<&str> = definition.split('=').map(str::trim).collect();
        if segments.len() < 2 || segments[0].is_empty() || segments[1].is_empty() {
            return Err(HarmonizeError::UnitDefinition {
                definition: definition.to_string(),
                reason: "expected 'name = value'".to_string(),
            });
        }
        let name = segments[0];
        let value = segments[1];
        let aliases = &segments[2..];

        let info = if let Some(dim_name) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']'))
        {
            let dimension = if dim_name.is_empty() {
                Dimension::NONE
            } else {
                Dimension::from_name(dim_name).ok_or_else(|| HarmonizeError::UnitDefinition {
                    definition: definition.to_string(),
                    reason: format!("unknown dimension '[{dim_name}]'"),
                })?
            };
            UnitInfo {
                name: name.to_string(),
                dimension,
                factor: 1.0,
                offset: 0.0,
            }
        } else {
            let parsed = UnitParser::new(self).parse(value).map_err(|err| {
                HarmonizeError::UnitDefinition {
                    definition: definition.to_string(),
                    reason: err.to_string(),
                }
            })?;
            if parsed.offset != 0.0 {
                return Err(HarmonizeError::UnitDefinition {
                    definition: definition.to_string(),
                    reason: "offset units cannot appear in derived definitions".to_string(),
                });
            }
            UnitInfo {
                name: name.to_string(),
                dimension: parsed.dimension,
                factor: parsed.factor,
                offset: 0.0,
            }
        };

        self.insert(info, aliases);
        Ok(())
    }

    fn insert(&mut self, info: UnitInfo, aliases: &[&str]) {
        // A redefined name stops being an alias of anything else.
        self.aliases.shift_remove(&info.name);
        let canonical = info.name.clone();
        self.units.insert(canonical.clone(), info);
        for alias in aliases {
            if alias.is_empty() {
                continue;
            }
            // An alias shadows a same-named canonical unit from an earlier
            // definition.
            self.units.shift_remove(*alias);
            self.aliases.insert((*alias).to_string(), canonical.clone());
        }
    }

    fn add_base(&mut self, name: &str, dimension: Dimension, aliases: &[&str]) {
        self.insert(
            UnitInfo {
                name: name.to_string(),
                dimension,
                factor: 1.0,
                offset: 0.0,
            },
            aliases,
        );
    }

    fn add_derived(&mut self, name: &str, factor: f64, dimension: Dimension, aliases: &[&str]) {
        self.insert(
            UnitInfo {
                name: name.to_string(),
                dimension,
                factor,
                offset: 0.0,
            },
            aliases,
        );
    }

    fn add_offset(&mut self, name: &str, factor: f64, offset: f64, aliases: &[&str]) {
        self.insert(
            UnitInfo {
                name: name.to_string(),
                dimension: Dimension::TEMPERATURE,
                factor,
                offset,
            },
            aliases,
        );
    }

    /// Resolves one unit symbol: exact name, then alias, then metric prefix
    /// plus known unit. Micro signs normalize to `u` first. The returned
    /// factor folds in any prefix.
    pub fn resolve(&self, symbol: &str) -> Option<UnitInfo> {
        let symbol = normalize_micro(symbol);
        if let Some(info) = self.lookup(&symbol) {
            return Some(info.clone());
        }
        for (prefix, scale) in PREFIXES {
            if let Some(rest) = symbol.strip_prefix(prefix) {
                if let Some(info) = self.lookup(rest) {
                    // Offset scales take no prefixes.
                    if info.has_offset() {
                        continue;
                    }
                    let mut scaled = info.clone();
                    scaled.factor *= scale;
                    return Some(scaled);
                }
            }
        }
        None
    }

    pub fn is_defined(&self, symbol: &str) -> bool {
        self.resolve(symbol).is_some()
    }

    fn lookup(&self, symbol: &str) -> Option<&UnitInfo> {
        if let Some(info) = self.units.get(symbol) {
            return Some(info);
        }
        let canonical = self.aliases.get(symbol)?;
        self.units.get(canonical)
    }
}

/// Replaces both micro signs (U+00B5, U+03BC) with `u`.
fn normalize_micro(symbol: &str) -> String {
    symbol.replace(['\u{00b5}', '\u{03bc}'], "u")
}
