//! wq-harmonize: harmonize Water Quality Portal results to consistent units.
//!
//! Water quality data federated through the WQP/WQX schema reports the same
//! characteristic in wildly mixed units, spellings, and chemical bases. This
//! crate normalizes one characteristic at a time: coerce raw measures,
//! resolve speciation, repair unit codes, reconcile dimensions, and convert
//! everything into a canonical unit, leaving an audit trail behind.
//!
//! # Core Principles
//!
//! - **Non-destructive**: raw measure and unit columns are never mutated;
//!   every derived value lands in a new column
//! - **Audited**: every repair appends a QA flag to the row it touched
//! - **Domain-scoped**: harmonization logic is hard-coded per characteristic
//!   (phosphorus, turbidity, salinity, dissolved oxygen, ...), not a general
//!   unit-conversion service
//!
//! # Example
//!
//! ```no_run
//! use wq_harmonize::{harmonize_all, input, DimensionErrorPolicy, ReadOptions};
//!
//! let (mut table, meta) = input::read_table("narrow_result.csv", &ReadOptions::default()).unwrap();
//! println!("loaded {} rows from {}", meta.row_count, meta.file);
//!
//! let summaries = harmonize_all(&mut table, DimensionErrorPolicy::Raise).unwrap();
//! for summary in &summaries {
//!     println!(
//!         "{}: {} rows, {} flags",
//!         summary.characteristic, summary.rows, summary.flags_appended
//!     );
//! }
//! ```

pub mod basis;
pub mod clean;
pub mod convert;
pub mod domains;
pub mod error;
pub mod flags;
pub mod fraction;
pub mod input;
pub mod pipeline;
pub mod table;
pub mod units;

pub use domains::Characteristic;
pub use error::{HarmonizeError, Result};
pub use flags::{FlagKind, FlagLedger, QaFlag};
pub use input::{read_table, write_table, ReadOptions, SourceMetadata};
pub use pipeline::{
    harmonize_all, harmonize_characteristic, HarmonizeOptions, HarmonizePass, PassSummary,
};
pub use table::{Cell, WqTable};
pub use units::{DimensionErrorPolicy, Quantity, Unit, UnitRegistry};
