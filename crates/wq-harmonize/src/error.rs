//! Error types for the wq-harmonize library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for harmonization operations.
#[derive(Debug, Error)]
pub enum HarmonizeError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid delimiter detected or specified.
    #[error("Invalid delimiter: {0}")]
    InvalidDelimiter(String),

    /// Empty file or no data to harmonize.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Characteristic name has no harmonization support.
    #[error("unrecognized characteristic: '{0}'")]
    UnknownCharacteristic(String),

    /// Input table lacks a column the pipeline requires.
    #[error("missing required column: '{0}'")]
    MissingColumn(String),

    /// Basis column name outside the recognized set.
    #[error("'{0}' not recognized basis column")]
    UnknownBasisColumn(String),

    /// Unit symbol not present in the active registry.
    #[error("undefined unit: '{0}'")]
    UndefinedUnit(String),

    /// Unit expression could not be parsed.
    #[error("cannot parse unit '{input}': {reason}")]
    UnitParse { input: String, reason: String },

    /// Malformed registry definition string.
    #[error("bad unit definition '{definition}': {reason}")]
    UnitDefinition { definition: String, reason: String },

    /// Offset units (temperatures) are only valid standalone.
    #[error("offset unit '{0}' cannot be used inside a compound expression")]
    OffsetUnit(String),

    /// Conversion attempted between incompatible dimensions.
    #[error("cannot convert from '{from_unit}' to '{to_unit}': incompatible dimensions ({from_dim} vs {to_dim})")]
    IncompatibleDimensions {
        from_unit: String,
        to_unit: String,
        from_dim: String,
        to_dim: String,
    },

    /// Molecular weight lookup failed for a basis/characteristic label.
    #[error("no known molecular weight for '{0}'")]
    UnknownMolecularWeight(String),

    /// Mole conversion attempted without basis or characteristic name.
    #[error("Characteristic Name or basis (Speciation) required")]
    MoleBasisRequired,

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Regex compilation error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

/// Result type alias for harmonization operations.
pub type Result<T> = std::result::Result<T, HarmonizeError>;
