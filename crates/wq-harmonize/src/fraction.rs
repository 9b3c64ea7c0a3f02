//! Sample-fraction splitting.
//!
//! After unit harmonization a characteristic's results may still mix
//! sample fractions that are not comparable (total vs dissolved). These
//! routines split the harmonized column into one column per fraction
//! group, with a catch-all column for fractions that map nowhere else.

use log::{info, warn};

use crate::domains::SAMPLE_FRACTION_DOMAIN;
use crate::error::Result;
use crate::table::{self, Cell, WqTable};

/// One fraction group: the output column it feeds and the
/// `ResultSampleFractionText` labels that land in it. `include_missing`
/// routes rows with no fraction text here as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FractionMapping {
    pub column: String,
    pub labels: Vec<String>,
    pub include_missing: bool,
}

impl FractionMapping {
    pub fn new(column: &str, labels: &[&str]) -> Self {
        FractionMapping {
            column: column.to_string(),
            labels: labels.iter().map(|label| label.to_string()).collect(),
            include_missing: false,
        }
    }

    /// Catch-all group: blank labels and rows with no fraction text.
    pub fn catch_all(column: &str) -> Self {
        FractionMapping {
            column: column.to_string(),
            labels: vec![String::new()],
            include_missing: true,
        }
    }

    fn matches(&self, cell: &Cell) -> bool {
        if cell.is_empty() {
            return self.include_missing;
        }
        match cell.as_text() {
            Some(text) => self.labels.iter().any(|label| label == text),
            None => false,
        }
    }
}

/// Default phosphorus split: total, dissolved, and everything else.
pub fn phosphorus_fractions() -> Vec<FractionMapping> {
    vec![
        FractionMapping::new("TP_Phosphorus", &["Total"]),
        FractionMapping::new("TDP_Phosphorus", &["Dissolved"]),
        FractionMapping::catch_all("Other_Phosphorus"),
    ]
}

/// Default nitrogen split, parallel to the phosphorus one.
pub fn nitrogen_fractions() -> Vec<FractionMapping> {
    vec![
        FractionMapping::new("TN_Nitrogen", &["Total"]),
        FractionMapping::new("TDN_Nitrogen", &["Dissolved"]),
        FractionMapping::catch_all("Other_Nitrogen"),
    ]
}

/// Default fraction groups for an output column, where one is defined.
pub fn default_fractions(out_col: &str) -> Option<Vec<FractionMapping>> {
    match out_col {
        "Phosphorus" => Some(phosphorus_fractions()),
        "Nitrogen" => Some(nitrogen_fractions()),
        _ => None,
    }
}

/// Split the harmonized `out_col` into per-fraction columns.
///
/// Rows are routed to the first group whose labels match their fraction
/// text, so the output columns are mutually exclusive. Fraction values
/// that no group names are appended to the catch-all group: quietly when
/// they are legitimate WQX domain values, with a warning otherwise. A
/// lone-space fraction is treated as missing. Columns are only created
/// for groups that match at least one row.
pub fn split_fractions(
    table: &mut WqTable,
    mask: &[bool],
    out_col: &str,
    mut mappings: Vec<FractionMapping>,
) -> Result<()> {
    let fract_idx = table.require_column(table::FRACTION_COL)?;
    let out_idx = table.require_column(out_col)?;
    let char_idx = table.require_column(table::CHARACTERISTIC_COL)?;

    for row in 0..table.n_rows() {
        if mask[row] && table.text(row, fract_idx) == Some(" ") {
            table.set(row, fract_idx, Cell::Empty);
        }
    }

    let char_name = table
        .distinct_text(char_idx, mask)
        .into_iter()
        .next()
        .unwrap_or_else(|| out_col.to_string());

    let catch_all = format!("Other_{out_col}");
    let catch_idx = match mappings.iter().position(|m| m.column == catch_all) {
        Some(idx) => idx,
        None => {
            mappings.push(FractionMapping::catch_all(&catch_all));
            mappings.len() - 1
        }
    };

    // Commas break downstream column selection; a group named after the
    // harmonized column would overwrite it.
    for mapping in &mut mappings {
        if mapping.column.contains(',') {
            mapping.column = mapping.column.replace(',', "_");
        }
        if mapping.column == out_col {
            mapping.column.push_str("_1");
        }
    }
    let catch_name = mappings[catch_idx].column.clone();

    let unmapped: Vec<String> = table
        .distinct_text(fract_idx, mask)
        .into_iter()
        .filter(|frac| !mappings.iter().any(|m| m.labels.iter().any(|l| l == frac)))
        .collect();
    let missing_unmapped = !mappings.iter().any(|m| m.include_missing)
        && (0..table.n_rows()).any(|row| mask[row] && table.cell(row, fract_idx).is_empty());

    if !unmapped.is_empty() || missing_unmapped {
        let total = unmapped.len() + usize::from(missing_unmapped);
        info!("{total} {char_name} sample fractions not mapped");

        let (known, unknown): (Vec<String>, Vec<String>) = unmapped
            .into_iter()
            .partition(|frac| SAMPLE_FRACTION_DOMAIN.contains(&frac.as_str()));
        if !known.is_empty() {
            info!(
                "{} {char_name} sample fractions found in expected domains, mapped to '{catch_name}'",
                known.len()
            );
            mappings[catch_idx].labels.extend(known);
        }
        if !unknown.is_empty() || missing_unmapped {
            warn!(
                "{} {char_name} sample fractions not in expected domains, mapped to '{catch_name}'",
                unknown.len() + usize::from(missing_unmapped)
            );
            mappings[catch_idx].labels.extend(unknown);
            if missing_unmapped {
                mappings[catch_idx].include_missing = true;
            }
        }
    }

    // Route each row to its first matching group.
    let mut group_rows: Vec<Vec<usize>> = vec![Vec::new(); mappings.len()];
    for row in 0..table.n_rows() {
        if !mask[row] {
            continue;
        }
        let cell = table.cell(row, fract_idx).clone();
        if let Some(idx) = mappings.iter().position(|m| m.matches(&cell)) {
            group_rows[idx].push(row);
        }
    }

    for (mapping, rows) in mappings.iter().zip(&group_rows) {
        if rows.is_empty() {
            continue;
        }
        let dst = table.ensure_column(&mapping.column);
        for &row in rows {
            let value = table.cell(row, out_idx).clone();
            table.set(row, dst, value);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{CHARACTERISTIC_COL, FRACTION_COL};
    use crate::units::Quantity;

    fn phosphorus_table(fracs: &[Option<&str>]) -> WqTable {
        let headers = vec![
            CHARACTERISTIC_COL.to_string(),
            FRACTION_COL.to_string(),
            "Phosphorus".to_string(),
        ];
        let rows = fracs
            .iter()
            .enumerate()
            .map(|(i, frac)| {
                vec![
                    Cell::from("Phosphorus"),
                    frac.map(Cell::from).unwrap_or(Cell::Empty),
                    Cell::Quantity(Quantity::new(i as f64 + 1.0, "milligram / liter")),
                ]
            })
            .collect();
        WqTable::with_rows(headers, rows)
    }

    #[test]
    fn test_split_routes_by_fraction() {
        let mut table = phosphorus_table(&[Some("Total"), Some("Dissolved"), None]);
        let mask = table.full_mask();
        split_fractions(&mut table, &mask, "Phosphorus", phosphorus_fractions()).unwrap();

        let tp = table.column_index("TP_Phosphorus").unwrap();
        let tdp = table.column_index("TDP_Phosphorus").unwrap();
        let other = table.column_index("Other_Phosphorus").unwrap();
        assert_eq!(table.cell(0, tp).magnitude(), Some(1.0));
        assert!(table.cell(0, tdp).is_empty());
        assert_eq!(table.cell(1, tdp).magnitude(), Some(2.0));
        assert_eq!(table.cell(2, other).magnitude(), Some(3.0));
    }

    #[test]
    fn test_split_skips_empty_groups() {
        let mut table = phosphorus_table(&[Some("Dissolved")]);
        let mask = table.full_mask();
        split_fractions(&mut table, &mask, "Phosphorus", phosphorus_fractions()).unwrap();

        assert!(table.column_index("TP_Phosphorus").is_none());
        assert!(table.column_index("TDP_Phosphorus").is_some());
    }

    #[test]
    fn test_split_lone_space_is_missing() {
        let mut table = phosphorus_table(&[Some(" ")]);
        let mask = table.full_mask();
        split_fractions(&mut table, &mask, "Phosphorus", phosphorus_fractions()).unwrap();

        let fract_idx = table.column_index(FRACTION_COL).unwrap();
        assert!(table.cell(0, fract_idx).is_empty());
        let other = table.column_index("Other_Phosphorus").unwrap();
        assert_eq!(table.cell(0, other).magnitude(), Some(1.0));
    }

    #[test]
    fn test_split_domain_value_lands_in_catch_all() {
        let mut table = phosphorus_table(&[Some("Bed Sediment")]);
        let mask = table.full_mask();
        split_fractions(&mut table, &mask, "Phosphorus", phosphorus_fractions()).unwrap();

        let other = table.column_index("Other_Phosphorus").unwrap();
        assert_eq!(table.cell(0, other).magnitude(), Some(1.0));
    }

    #[test]
    fn test_split_unknown_value_lands_in_catch_all() {
        let mut table = phosphorus_table(&[Some("Mystery Fraction")]);
        let mask = table.full_mask();
        split_fractions(&mut table, &mask, "Phosphorus", phosphorus_fractions()).unwrap();

        let other = table.column_index("Other_Phosphorus").unwrap();
        assert_eq!(table.cell(0, other).magnitude(), Some(1.0));
    }

    #[test]
    fn test_split_first_group_wins_on_overlap() {
        let mut table = phosphorus_table(&[Some("Total")]);
        let mask = table.full_mask();
        let mappings = vec![
            FractionMapping::new("First_Phosphorus", &["Total"]),
            FractionMapping::new("Second_Phosphorus", &["Total"]),
        ];
        split_fractions(&mut table, &mask, "Phosphorus", mappings).unwrap();

        let first = table.column_index("First_Phosphorus").unwrap();
        assert_eq!(table.cell(0, first).magnitude(), Some(1.0));
        assert!(table.column_index("Second_Phosphorus").is_none());
    }

    #[test]
    fn test_split_renames_colliding_group() {
        let mut table = phosphorus_table(&[Some("Total")]);
        let mask = table.full_mask();
        let mappings = vec![FractionMapping::new("Phosphorus", &["Total"])];
        split_fractions(&mut table, &mask, "Phosphorus", mappings).unwrap();

        assert!(table.column_index("Phosphorus_1").is_some());
        let renamed = table.column_index("Phosphorus_1").unwrap();
        assert_eq!(table.cell(0, renamed).magnitude(), Some(1.0));
    }

    #[test]
    fn test_split_respects_mask() {
        let mut table = phosphorus_table(&[Some("Total"), Some("Total")]);
        let mask = vec![true, false];
        split_fractions(&mut table, &mask, "Phosphorus", phosphorus_fractions()).unwrap();

        let tp = table.column_index("TP_Phosphorus").unwrap();
        assert_eq!(table.cell(0, tp).magnitude(), Some(1.0));
        assert!(table.cell(1, tp).is_empty());
    }

    #[test]
    fn test_nitrogen_defaults() {
        let mappings = default_fractions("Nitrogen").unwrap();
        assert_eq!(mappings[0].column, "TN_Nitrogen");
        assert_eq!(mappings[1].column, "TDN_Nitrogen");
        assert!(mappings[2].include_missing);
        assert!(default_fractions("Secchi").is_none());
    }
}
