//! Dimensional-analysis engine: dimensions, scoped registries, unit
//! expression parsing, and batch conversion.

mod dimension;
mod parser;
mod quantity;
mod registry;
mod series;

pub use dimension::Dimension;
pub use parser::{ParsedUnit, UnitParser};
pub use quantity::{convert, Quantity, Unit};
pub use registry::{UnitInfo, UnitRegistry};
pub use series::{convert_series, mismatched_dimensions, DimensionErrorPolicy};
