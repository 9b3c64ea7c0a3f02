//! Dataset-level cleaning of activity columns.
//!
//! These routines run on the whole table rather than one characteristic:
//! activity datetime assembly, depth harmonization, result precision
//! checks, and media corrections driven by the weight-basis columns.

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};

use crate::error::Result;
use crate::flags::{FlagLedger, QaFlag};
use crate::table::{self, Cell, WqTable};
use crate::units::{convert_series, DimensionErrorPolicy, UnitRegistry};

/// WQP time zone codes and their UTC offsets in seconds.
static TIMEZONE_OFFSETS: &[(&str, i32)] = &[
    ("UTC", 0),
    ("GMT", 0),
    ("AST", -4 * 3600),
    ("ADT", -3 * 3600),
    ("EST", -5 * 3600),
    ("EDT", -4 * 3600),
    ("CST", -6 * 3600),
    ("CDT", -5 * 3600),
    ("MST", -7 * 3600),
    ("MDT", -6 * 3600),
    ("PST", -8 * 3600),
    ("PDT", -7 * 3600),
    ("AKST", -9 * 3600),
    ("AKDT", -8 * 3600),
    ("HST", -10 * 3600),
    ("HAST", -10 * 3600),
    ("HADT", -9 * 3600),
];

/// Offset for a WQP time zone code. Unknown or missing codes fall back
/// to UTC.
fn timezone_offset(code: Option<&str>) -> FixedOffset {
    let seconds = code
        .and_then(|c| TIMEZONE_OFFSETS.iter().find(|(name, _)| *name == c))
        .map(|(_, seconds)| *seconds)
        .unwrap_or(0);
    match FixedOffset::east_opt(seconds) {
        Some(offset) => offset,
        None => Utc.fix(),
    }
}

fn parse_activity_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()
}

fn parse_activity_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

/// Assemble `Activity_datetime` from the activity date, time, and time
/// zone columns, as a UTC timestamp in RFC 3339 form.
///
/// A row missing its time is left without a datetime even when the date
/// is present.
pub fn datetime(table: &mut WqTable) -> Result<()> {
    let date_idx = table.require_column(table::DATE_COL)?;
    let time_idx = table.require_column(table::TIME_COL)?;
    let tz_idx = table.require_column(table::TZ_COL)?;
    let out_idx = table.ensure_column(table::DATETIME_COL);

    for row in 0..table.n_rows() {
        let date = table.text(row, date_idx).and_then(parse_activity_date);
        let time = table.text(row, time_idx).and_then(parse_activity_time);
        let stamp = match (date, time) {
            (Some(date), Some(time)) => {
                let offset = timezone_offset(table.text(row, tz_idx));
                offset
                    .from_local_datetime(&NaiveDateTime::new(date, time))
                    .single()
                    .map(|local| local.with_timezone(&Utc).to_rfc3339())
            }
            _ => None,
        };
        let cell = match stamp {
            Some(stamp) => Cell::Text(stamp),
            None => Cell::Empty,
        };
        table.set(row, out_idx, cell);
    }
    Ok(())
}

/// Convert the result depth columns into a `Depth` column in `units`.
///
/// Rows without a depth measure are left empty. Rows with a measure but
/// no unit are also left empty rather than failing the whole table.
pub fn harmonize_depth(table: &mut WqTable, units: &str) -> Result<()> {
    let meas_idx = table.require_column(table::DEPTH_MEASURE_COL)?;
    let unit_idx = table.require_column(table::DEPTH_UNITS_COL)?;

    let registry = UnitRegistry::standard();
    let mut values: Vec<Option<f64>> = Vec::with_capacity(table.n_rows());
    let mut unit_strs: Vec<Option<String>> = Vec::with_capacity(table.n_rows());
    for row in 0..table.n_rows() {
        let cell = table.cell(row, meas_idx);
        let value = cell
            .magnitude()
            .or_else(|| cell.as_text().and_then(table::coerce_numeric));
        values.push(value);
        unit_strs.push(table.text(row, unit_idx).map(str::to_string));
    }

    let converted = convert_series(
        &values,
        &unit_strs,
        units,
        &registry,
        DimensionErrorPolicy::Raise,
    )?;
    let out_idx = table.ensure_column(table::DEPTH_COL);
    for (row, quantity) in converted.into_iter().enumerate() {
        if let Some(quantity) = quantity {
            table.set(row, out_idx, Cell::Quantity(quantity));
        }
    }
    Ok(())
}

/// Decimal digits in the shortest display form of `value`.
fn decimal_digits(value: f64) -> usize {
    let text = format!("{value}");
    match text.split_once('.') {
        Some((_, frac)) => frac.len(),
        None => 0,
    }
}

/// Flag rows of `col` reported with fewer than `limit` decimal digits.
///
/// Digits are counted on the displayed value, so trailing zeros lost in
/// float round-trips count as missing precision.
pub fn check_precision(table: &mut WqTable, col: &str, limit: usize) -> Result<()> {
    let idx = table.require_column(col)?;
    let mask: Vec<bool> = (0..table.n_rows())
        .map(|row| match table.cell(row, idx).magnitude() {
            Some(value) => decimal_digits(value) < limit,
            None => false,
        })
        .collect();

    let mut ledger = FlagLedger::new(table.n_rows());
    ledger.add_masked(&mask, &QaFlag::imprecise(col, limit));
    ledger.apply_to(table);
    Ok(())
}

/// Correct `ActivityMediaName` for dry bed-sediment samples mislabeled
/// as water, flagging every changed row.
pub fn wet_dry_checks(table: &mut WqTable, mask: Option<&[bool]>) -> Result<()> {
    let media_idx = table.require_column(table::MEDIA_COL)?;
    let fract_idx = table.require_column(table::FRACTION_COL)?;
    let weight_idx = table.require_column(table::WEIGHT_BASIS_COL)?;

    let media_mask: Vec<bool> = (0..table.n_rows())
        .map(|row| {
            mask.map_or(true, |m| m[row])
                && table.text(row, fract_idx) == Some("Bed Sediment")
                && table.text(row, weight_idx) == Some("Dry")
                && table.text(row, media_idx) == Some("Water")
        })
        .collect();

    let mut ledger = FlagLedger::new(table.n_rows());
    ledger.add_masked(
        &media_mask,
        &QaFlag::media_corrected(table::MEDIA_COL, "Water", "Sediment"),
    );
    ledger.apply_to(table);

    for (row, selected) in media_mask.iter().enumerate() {
        if *selected {
            table.set(row, media_idx, Cell::from("Sediment"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{
        DATETIME_COL, DATE_COL, DEPTH_COL, DEPTH_MEASURE_COL, DEPTH_UNITS_COL, FRACTION_COL,
        MEDIA_COL, QA_FLAG_COL, TIME_COL, TZ_COL, WEIGHT_BASIS_COL,
    };

    fn datetime_table(rows: Vec<Vec<Cell>>) -> WqTable {
        let headers = vec![
            DATE_COL.to_string(),
            TIME_COL.to_string(),
            TZ_COL.to_string(),
        ];
        WqTable::with_rows(headers, rows)
    }

    #[test]
    fn test_datetime_applies_offset() {
        let mut table = datetime_table(vec![vec![
            Cell::from("2003-08-01"),
            Cell::from("14:30:00"),
            Cell::from("EST"),
        ]]);
        datetime(&mut table).unwrap();

        let idx = table.column_index(DATETIME_COL).unwrap();
        assert_eq!(table.text(0, idx), Some("2003-08-01T19:30:00+00:00"));
    }

    #[test]
    fn test_datetime_missing_time_is_missing() {
        let mut table = datetime_table(vec![vec![
            Cell::from("2003-08-01"),
            Cell::Empty,
            Cell::from("EST"),
        ]]);
        datetime(&mut table).unwrap();

        let idx = table.column_index(DATETIME_COL).unwrap();
        assert!(table.cell(0, idx).is_empty());
    }

    #[test]
    fn test_datetime_unknown_zone_is_utc() {
        let mut table = datetime_table(vec![vec![
            Cell::from("2003-08-01"),
            Cell::from("14:30:00"),
            Cell::from("XYZ"),
        ]]);
        datetime(&mut table).unwrap();

        let idx = table.column_index(DATETIME_COL).unwrap();
        assert_eq!(table.text(0, idx), Some("2003-08-01T14:30:00+00:00"));
    }

    #[test]
    fn test_harmonize_depth_converts_to_meters() {
        let headers = vec![DEPTH_MEASURE_COL.to_string(), DEPTH_UNITS_COL.to_string()];
        let rows = vec![
            vec![Cell::from(3.0), Cell::from("ft")],
            vec![Cell::from("2.5"), Cell::from("m")],
            vec![Cell::Empty, Cell::from("ft")],
        ];
        let mut table = WqTable::with_rows(headers, rows);
        harmonize_depth(&mut table, "meter").unwrap();

        let idx = table.column_index(DEPTH_COL).unwrap();
        let first = table.cell(0, idx).magnitude().unwrap();
        assert!((first - 0.9144).abs() < 1e-12);
        assert_eq!(table.cell(1, idx).magnitude(), Some(2.5));
        assert!(table.cell(2, idx).is_empty());
    }

    #[test]
    fn test_check_precision_flags_short_values() {
        let headers = vec!["Depth".to_string()];
        let rows = vec![vec![Cell::from(51.5)], vec![Cell::from(51.058)]];
        let mut table = WqTable::with_rows(headers, rows);
        check_precision(&mut table, "Depth", 3).unwrap();

        let qa = table.column_index(QA_FLAG_COL).unwrap();
        assert_eq!(
            table.text(0, qa),
            Some("Depth: Imprecise: lessthan3decimaldigits")
        );
        assert!(table.cell(1, qa).is_empty());
    }

    #[test]
    fn test_wet_dry_checks_corrects_media() {
        let headers = vec![
            MEDIA_COL.to_string(),
            FRACTION_COL.to_string(),
            WEIGHT_BASIS_COL.to_string(),
        ];
        let rows = vec![
            vec![
                Cell::from("Water"),
                Cell::from("Bed Sediment"),
                Cell::from("Dry"),
            ],
            vec![
                Cell::from("Water"),
                Cell::from("Dissolved"),
                Cell::from("Wet"),
            ],
        ];
        let mut table = WqTable::with_rows(headers, rows);
        wet_dry_checks(&mut table, None).unwrap();

        let media = table.column_index(MEDIA_COL).unwrap();
        let qa = table.column_index(QA_FLAG_COL).unwrap();
        assert_eq!(table.text(0, media), Some("Sediment"));
        assert_eq!(
            table.text(0, qa),
            Some("ActivityMediaName: Water changed to Sediment")
        );
        assert_eq!(table.text(1, media), Some("Water"));
        assert!(table.cell(1, qa).is_empty());
    }
}
