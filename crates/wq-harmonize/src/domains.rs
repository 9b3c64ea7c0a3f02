//! Characteristic domain knowledge: recognized characteristics, their
//! output columns, canonical units, known-bad unit fixes, and unit
//! registry extensions.
//!
//! These tables mirror the Water Quality Portal (WQX) domain vocabularies.
//! Everything here is a pure lookup; nothing mutates at runtime.

use serde::{Deserialize, Serialize};

/// A water-quality characteristic this crate knows how to harmonize.
///
/// Each variant corresponds to one WQP `CharacteristicName` and owns the
/// static knowledge needed to harmonize it: output column, canonical unit,
/// known-bad unit substitutions, and custom unit definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Characteristic {
    /// Depth, Secchi disk depth
    Secchi,
    /// Dissolved oxygen (DO)
    DissolvedOxygen,
    /// Temperature, water
    Temperature,
    /// Salinity
    Salinity,
    /// pH
    Ph,
    /// Nitrogen
    Nitrogen,
    /// Conductivity
    Conductivity,
    /// Organic carbon
    Carbon,
    /// Chlorophyll a
    Chlorophyll,
    /// Turbidity
    Turbidity,
    /// Sediment
    Sediment,
    /// Fecal Coliform
    FecalColiform,
    /// Escherichia coli
    EColi,
    /// Phosphorus
    Phosphorus,
}

/// Dimensionless percent/fraction definitions shared by several
/// characteristics. `fraction` is a distinct base so ratios stay
/// distinguishable from plain counts.
pub static PCT_DEFINITIONS: &[&str] = &[
    "fraction = [] = frac",
    "percent = 1e-2 frac",
    "parts_per_thousand = 1e-3 = ppth",
    "parts_per_million = 1e-6 fraction = ppm",
];

/// Dimensionless colony-count definitions for bacteria characteristics.
pub static BACTERIA_DEFINITIONS: &[&str] = &[
    "Colony_Forming_Units = [] = CFU = cfu",
    "Most_Probable_Number = CFU = MPN = mpn",
];

/// Turbidity unit definitions. NTU anchors a `[turbidity]` pseudo-dimension
/// so optical units cannot silently convert to lengths or ratios. The FNRU
/// line references a symbol never defined; the registry skips it with a
/// warning and the following line re-aliases FNU, so the end state is the
/// same as upstream behavior.
pub static TURBIDITY_DEFINITIONS: &[&str] = &[
    "Nephelometric_Turbidity_Units = [turbidity] = NTU",
    "Nephelometric_Turbidity_Ratio_Units = NTU = NTRU",
    "Nephelometric_Turbidity_Multibeam_Units = NTU = NTMU",
    "Formazin_Nephelometric_Units = NTU = FNU",
    "Formazin_Nephelometric_Ratio_Units = FNRU = FNU",
    "Formazin_Turbidity_Units = NTU = FNU = FTU = FAU",
    "Jackson_Turbidity_Units = [] = JTU",
    "SiO2 = []",
];

impl Characteristic {
    /// Look up a characteristic by its WQP `CharacteristicName` value.
    /// Returns `None` for names with no harmonization support yet.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Depth, Secchi disk depth" => Some(Characteristic::Secchi),
            "Dissolved oxygen (DO)" => Some(Characteristic::DissolvedOxygen),
            "Temperature, water" => Some(Characteristic::Temperature),
            "Salinity" => Some(Characteristic::Salinity),
            "pH" => Some(Characteristic::Ph),
            "Nitrogen" => Some(Characteristic::Nitrogen),
            "Conductivity" => Some(Characteristic::Conductivity),
            "Organic carbon" => Some(Characteristic::Carbon),
            "Chlorophyll a" => Some(Characteristic::Chlorophyll),
            "Turbidity" => Some(Characteristic::Turbidity),
            "Sediment" => Some(Characteristic::Sediment),
            "Fecal Coliform" => Some(Characteristic::FecalColiform),
            "Escherichia coli" => Some(Characteristic::EColi),
            "Phosphorus" => Some(Characteristic::Phosphorus),
            _ => None,
        }
    }

    /// Look up a characteristic by its output column name.
    pub fn from_column(column: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.column() == column)
    }

    /// The WQP `CharacteristicName` this variant harmonizes.
    pub fn name(&self) -> &'static str {
        match self {
            Characteristic::Secchi => "Depth, Secchi disk depth",
            Characteristic::DissolvedOxygen => "Dissolved oxygen (DO)",
            Characteristic::Temperature => "Temperature, water",
            Characteristic::Salinity => "Salinity",
            Characteristic::Ph => "pH",
            Characteristic::Nitrogen => "Nitrogen",
            Characteristic::Conductivity => "Conductivity",
            Characteristic::Carbon => "Organic carbon",
            Characteristic::Chlorophyll => "Chlorophyll a",
            Characteristic::Turbidity => "Turbidity",
            Characteristic::Sediment => "Sediment",
            Characteristic::FecalColiform => "Fecal Coliform",
            Characteristic::EColi => "Escherichia coli",
            Characteristic::Phosphorus => "Phosphorus",
        }
    }

    /// Name of the output column harmonized results are written to.
    pub fn column(&self) -> &'static str {
        match self {
            Characteristic::Secchi => "Secchi",
            Characteristic::DissolvedOxygen => "DO",
            Characteristic::Temperature => "Temperature",
            Characteristic::Salinity => "Salinity",
            Characteristic::Ph => "pH",
            Characteristic::Nitrogen => "Nitrogen",
            Characteristic::Conductivity => "Conductivity",
            Characteristic::Carbon => "Carbon",
            Characteristic::Chlorophyll => "Chlorophyll",
            Characteristic::Turbidity => "Turbidity",
            Characteristic::Sediment => "Sediment",
            Characteristic::FecalColiform => "Fecal_Coliform",
            Characteristic::EColi => "E_coli",
            Characteristic::Phosphorus => "Phosphorus",
        }
    }

    /// Canonical unit every result for this characteristic is converted to.
    pub fn target_unit(&self) -> &'static str {
        match self {
            Characteristic::Secchi => "m",
            Characteristic::DissolvedOxygen => "mg/l",
            Characteristic::Temperature => "degC",
            Characteristic::Salinity => "PSU",
            Characteristic::Ph => "dimensionless",
            Characteristic::Nitrogen => "mg/l",
            Characteristic::Conductivity => "uS/cm",
            Characteristic::Carbon => "mg/l",
            Characteristic::Chlorophyll => "mg/l",
            Characteristic::Turbidity => "NTU",
            Characteristic::Sediment => "g/kg",
            Characteristic::FecalColiform => "CFU/(100ml)",
            Characteristic::EColi => "CFU/(100ml)",
            Characteristic::Phosphorus => "mg/l",
        }
    }

    /// Known-bad unit codes and their replacements, applied by exact cell
    /// match before anything is parsed. Each cell takes the first matching
    /// entry only, so carbon's `"% by wt"` does not fall through to the
    /// `"%"` fix; the registry resolves the remaining `%` spelling.
    pub fn bad_unit_fixes(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Characteristic::Secchi => &[],
            Characteristic::DissolvedOxygen => &[("%", "percent")],
            Characteristic::Temperature => &[],
            Characteristic::Salinity => &[("ppt", "ppth"), ("0/00", "ppth")],
            Characteristic::Ph => {
                &[("None", "dimensionless"), ("std units", "dimensionless")]
            }
            Characteristic::Nitrogen => &[
                ("cm3/g @STP", "cm3/g"),
                ("cm3/g STP", "cm3/g"),
                ("%", "percent"),
            ],
            Characteristic::Conductivity => {
                &[("uS", "uS/cm"), ("umho", "umho/cm")]
            }
            Characteristic::Carbon => &[("% by wt", "%"), ("%", "percent")],
            Characteristic::Chlorophyll => &[
                ("mg/cm3", "mg/cm**3"),
                ("mg/m3", "mg/m**3"),
                ("mg/m2", "mg/m**3"),
                ("ug/cm3", "ug/cm**3"),
            ],
            Characteristic::Turbidity => {
                &[("mg/l SiO2", "SiO2"), ("ppm SiO2", "SiO2")]
            }
            Characteristic::Sediment => &[("%", "percent")],
            Characteristic::FecalColiform | Characteristic::EColi => &[
                ("#/100ml", "CFU/(100ml)"),
                ("CFU", "CFU/(100ml)"),
                ("MPN", "MPN/(100ml)"),
            ],
            Characteristic::Phosphorus => &[("%", "percent")],
        }
    }

    /// Unit definitions added to a fresh registry before this
    /// characteristic's units are parsed.
    pub fn registry_extensions(&self) -> Vec<&'static str> {
        match self {
            Characteristic::Secchi
            | Characteristic::Temperature
            | Characteristic::Ph
            | Characteristic::Nitrogen
            | Characteristic::Conductivity
            | Characteristic::Chlorophyll
            | Characteristic::Phosphorus => Vec::new(),
            Characteristic::DissolvedOxygen
            | Characteristic::Carbon
            | Characteristic::Sediment => PCT_DEFINITIONS.to_vec(),
            Characteristic::Salinity => {
                let mut defs = PCT_DEFINITIONS.to_vec();
                defs.push("Practical_Salinity_Units = ppth = PSU = PSS");
                defs
            }
            Characteristic::Turbidity => TURBIDITY_DEFINITIONS.to_vec(),
            Characteristic::FecalColiform | Characteristic::EColi => {
                BACTERIA_DEFINITIONS.to_vec()
            }
        }
    }

    /// All supported characteristics, in harmonization display order.
    pub fn all() -> &'static [Characteristic] {
        &[
            Characteristic::Secchi,
            Characteristic::DissolvedOxygen,
            Characteristic::Temperature,
            Characteristic::Salinity,
            Characteristic::Ph,
            Characteristic::Nitrogen,
            Characteristic::Conductivity,
            Characteristic::Carbon,
            Characteristic::Chlorophyll,
            Characteristic::Turbidity,
            Characteristic::Sediment,
            Characteristic::FecalColiform,
            Characteristic::EColi,
            Characteristic::Phosphorus,
        ]
    }
}

/// WQX `ResultSampleFraction` domain values. Used to distinguish unexpected
/// sample fraction text from recognized-but-unmapped fractions when
/// splitting results into fraction columns. Descriptions in the source
/// vocabulary are sparse, so only names are carried.
pub static SAMPLE_FRACTION_DOMAIN: &[&str] = &[
    "Acid Soluble",
    "Bed Sediment",
    "Bedload",
    "Bioavailable",
    "Comb Available",
    "Dissolved",
    "Extractable",
    "Field",
    "Filterable",
    "Filtered field and/or lab",
    "Filtered, field",
    "Filtered, lab",
    "Fixed",
    "Free Available",
    "Inorganic",
    "Leachable",
    "Non-Filterable (Particle)",
    "Non-settleable",
    "Non-volatile",
    "None",
    "Organic",
    "Pot. Dissolved",
    "Semivolatile",
    "Settleable",
    "Sieved",
    "Strong Acid Diss",
    "Supernate",
    "Suspended",
    "Total",
    "Total Recoverable",
    "Total Residual",
    "Total Soluble",
    "Unfiltered",
    "Unfiltered, field",
    "Vapor",
    "Volatile",
    "Weak Acid Diss",
];

/// WQX `ActivityMedia` domain values with descriptions.
pub static ACTIVITY_MEDIA_DOMAIN: &[(&str, &str)] = &[
    ("Air", "Ambient air"),
    ("Biological", "Biological material"),
    ("Habitat", "Habitat assessment"),
    ("Other", "Other media"),
    ("Sediment", "Bed or suspended sediment"),
    ("Soil", "Soil"),
    ("Tissue", "Plant or animal tissue"),
    ("Water", "Surface or ground water"),
];

/// Horizontal coordinate datum codes with EPSG identifiers, for location
/// collaborators that consume this crate's output.
pub static XY_DATUM: &[(&str, &str, u32)] = &[
    ("NAD27", "North American Datum 1927", 4267),
    ("NAD83", "North American Datum 1983", 4269),
    ("WGS84", "World Geodetic System 1984", 4326),
];

/// Built-in fallback for a named WQX domain vocabulary, as `name` values.
/// Returns `None` for tables without a built-in copy.
pub fn domain_values(table: &str) -> Option<Vec<&'static str>> {
    match table.trim_end_matches("_CSV") {
        "ResultSampleFraction" | "SampleFraction" => {
            Some(SAMPLE_FRACTION_DOMAIN.to_vec())
        }
        "ActivityMedia" => {
            Some(ACTIVITY_MEDIA_DOMAIN.iter().map(|(n, _)| *n).collect())
        }
        _ => None,
    }
}
