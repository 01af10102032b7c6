//! Turns a raw sheet into typed [`RecruiterWeekRecord`]s.
//!
//! Value errors abort the whole load. The first bad cell is reported with its
//! sheet row and column header.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};

use crate::config::{ColumnNames, Config};
use crate::error::{KpiError, Result};
use crate::models::RecruiterWeekRecord;
use crate::source::{RawCell, RawSheet};

static EMPTY_CELL: RawCell = RawCell::Empty;

/// Positions of the required columns within a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnIndex {
    name: usize,
    period_start: usize,
    period_end: usize,
    cold_calls: usize,
    qualification: usize,
    introductions: usize,
    inmails: usize,
    response_rate: usize,
}

/// Lower-cases and collapses whitespace so "Cold call " matches "cold  call".
pub fn normalize_header(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn resolve_columns(headers: &[String], names: &ColumnNames) -> Result<ColumnIndex> {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut missing = Vec::new();
    let mut find = |wanted: &str| {
        let key = normalize_header(wanted);
        match normalized.iter().position(|h| *h == key) {
            Some(index) => index,
            None => {
                missing.push(wanted.trim().to_string());
                usize::MAX
            }
        }
    };

    let index = ColumnIndex {
        name: find(&names.name),
        period_start: find(&names.period_start),
        period_end: find(&names.period_end),
        cold_calls: find(&names.cold_calls),
        qualification: find(&names.qualification),
        introductions: find(&names.introductions),
        inmails: find(&names.inmails),
        response_rate: find(&names.response_rate),
    };

    if missing.is_empty() {
        Ok(index)
    } else {
        Err(KpiError::Schema { missing })
    }
}

/// True when `name` is the aggregate row, compared case-insensitively.
pub fn is_sentinel(name: &str, sentinel_label: &str) -> bool {
    name.trim().to_lowercase() == sentinel_label.trim().to_lowercase()
}

/// Parses a response rate. Text ending in `%` is divided by 100, anything else is
/// read as a plain fraction. A decimal comma is accepted. The result must lie in [0, 1].
pub fn parse_rate(text: &str) -> std::result::Result<f64, String> {
    let cleaned = text.trim().replace(',', ".");
    let (number, is_percent) = match cleaned.strip_suffix('%') {
        Some(rest) => (rest.trim(), true),
        None => (cleaned.as_str(), false),
    };

    let value: f64 = number
        .parse()
        .map_err(|_| format!("'{number}' is not a number"))?;
    if !value.is_finite() {
        return Err("rate must be finite".to_string());
    }

    let rate = if is_percent { value / 100.0 } else { value };
    if !(0.0..=1.0).contains(&rate) {
        return Err(format!("rate {rate} is outside [0, 1]"));
    }
    Ok(rate)
}

fn is_no_activity(text: &str, marker: &str) -> bool {
    !marker.is_empty() && text.trim().eq_ignore_ascii_case(marker.trim())
}

fn count_from_number(value: f64) -> std::result::Result<u32, String> {
    if !value.is_finite() {
        return Err("count must be finite".to_string());
    }
    if value < 0.0 {
        return Err("count must not be negative".to_string());
    }
    if value.fract() != 0.0 {
        return Err("count must be a whole number".to_string());
    }
    if value > u32::MAX as f64 {
        return Err("count is too large".to_string());
    }
    Ok(value as u32)
}

fn parse_count(cell: &RawCell, marker: &str) -> std::result::Result<u32, String> {
    match cell {
        RawCell::Empty => Ok(0),
        RawCell::Number(value) => count_from_number(*value),
        RawCell::Text(text) if is_no_activity(text, marker) => Ok(0),
        RawCell::Text(text) => {
            let trimmed = text.trim();
            match trimmed.parse::<u32>() {
                Ok(count) => Ok(count),
                Err(_) => {
                    let value: f64 = trimmed
                        .parse()
                        .map_err(|_| format!("'{trimmed}' is not a number"))?;
                    count_from_number(value)
                }
            }
        }
        RawCell::Date(_) => Err("expected a count, found a date".to_string()),
    }
}

fn parse_rate_cell(cell: &RawCell, marker: &str) -> std::result::Result<f64, String> {
    match cell {
        RawCell::Empty => Ok(0.0),
        RawCell::Number(value) => parse_rate(&value.to_string()),
        RawCell::Text(text) if is_no_activity(text, marker) => Ok(0.0),
        RawCell::Text(text) => parse_rate(text),
        RawCell::Date(_) => Err("expected a rate, found a date".to_string()),
    }
}

/// Reads a period date. Anything unparseable becomes `None`.
fn parse_date(cell: &RawCell, format: &str, marker: &str) -> Option<NaiveDate> {
    match cell {
        RawCell::Date(date) => Some(*date),
        RawCell::Empty => None,
        RawCell::Text(text) if is_no_activity(text, marker) => None,
        RawCell::Text(text) => {
            let parsed = NaiveDate::parse_from_str(text.trim(), format).ok();
            if parsed.is_none() {
                warn!(value = %text, format, "unparseable date, treating as missing");
            }
            parsed
        }
        RawCell::Number(value) => {
            warn!(value, "numeric cell in a date column, treating as missing");
            None
        }
    }
}

/// ISO week of the period start; 0 when the start date is unknown.
pub fn iso_week(start: Option<NaiveDate>) -> u32 {
    start.map(|date| date.iso_week().week()).unwrap_or(0)
}

/// Cleans every data row of `raw` into a record.
///
/// Deny-listed row indices are dropped first (indices past the end are ignored),
/// then rows without a name and the sentinel aggregate row, then the remaining
/// cells are coerced.
pub fn normalize(raw: &RawSheet, config: &Config) -> Result<Vec<RecruiterWeekRecord>> {
    let columns = resolve_columns(&raw.headers, &config.columns)?;
    let deny: BTreeSet<usize> = config.deny_rows.iter().copied().collect();
    let marker = config.no_activity_marker.as_str();

    for index in deny.range(raw.rows.len()..) {
        warn!(index, rows = raw.rows.len(), "deny-listed row index not present, ignoring");
    }

    let mut records = Vec::new();
    let mut denied = 0usize;
    let mut sentinels = 0usize;

    for (index, row) in raw.rows.iter().enumerate() {
        if deny.contains(&index) {
            denied += 1;
            continue;
        }

        let cell = |column: usize| row.get(column).unwrap_or(&EMPTY_CELL);
        let sheet_row = raw.sheet_row(index);

        let name = cell(columns.name).display().trim().to_string();
        if name.is_empty() {
            if row.iter().any(|c| !c.is_empty()) {
                debug!(row = sheet_row, "skipping row without a name");
            }
            continue;
        }
        if is_sentinel(&name, &config.sentinel_label) {
            sentinels += 1;
            continue;
        }

        let value_error = |column: &str, cell: &RawCell, reason: String| KpiError::Value {
            row: sheet_row,
            column: column.trim().to_string(),
            value: cell.display(),
            reason,
        };
        let count = |column: usize, header: &str| {
            let raw_cell = cell(column);
            parse_count(raw_cell, marker).map_err(|reason| value_error(header, raw_cell, reason))
        };

        let names = &config.columns;
        let period_start = parse_date(cell(columns.period_start), &config.date_format, marker);
        let period_end = parse_date(cell(columns.period_end), &config.date_format, marker);
        let rate_cell = cell(columns.response_rate);

        records.push(RecruiterWeekRecord {
            name,
            period_start,
            period_end,
            week: iso_week(period_start),
            cold_calls: count(columns.cold_calls, &names.cold_calls)?,
            inmails: count(columns.inmails, &names.inmails)?,
            qualification_calls: count(columns.qualification, &names.qualification)?,
            introductions: count(columns.introductions, &names.introductions)?,
            response_rate: parse_rate_cell(rate_cell, marker)
                .map_err(|reason| value_error(&names.response_rate, rate_cell, reason))?,
        });
    }

    info!(
        records = records.len(),
        denied,
        sentinels,
        "normalized recruiter rows"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> RawSheet {
        RawSheet {
            headers: [
                "Name",
                "Begin datum",
                "Eind datum",
                "Cold call ",
                "Qualification",
                "Introductions",
                "InMails",
                "Response rate",
            ]
            .iter()
            .map(|h| h.to_string())
            .collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|v| RawCell::text(*v)).collect())
                .collect(),
            first_data_row: 2,
        }
    }

    fn config() -> Config {
        Config {
            deny_rows: Vec::new(),
            ..Config::default()
        }
    }

    fn row<'a>(name: &'a str) -> [&'a str; 8] {
        [name, "06/01/2025", "10/01/2025", "10", "2", "1", "100", "20%"]
    }

    #[test]
    fn percent_text_is_divided_by_100() {
        assert_eq!(parse_rate("37%"), Ok(0.37));
        assert_eq!(parse_rate(" 25 %"), Ok(0.25));
        assert_eq!(parse_rate("12,5%"), Ok(0.125));
    }

    #[test]
    fn plain_fraction_is_kept() {
        assert_eq!(parse_rate("0.4"), Ok(0.4));
        assert_eq!(parse_rate("1"), Ok(1.0));
    }

    #[test]
    fn bad_rate_text_is_rejected() {
        assert!(parse_rate("n/a").is_err());
        assert!(parse_rate("%").is_err());
        assert!(parse_rate("140%").is_err());
        assert!(parse_rate("-0.1").is_err());
    }

    #[test]
    fn counts_reject_fractions_and_negatives() {
        assert_eq!(parse_count(&RawCell::text("12"), "holiday"), Ok(12));
        assert_eq!(parse_count(&RawCell::text("12.0"), "holiday"), Ok(12));
        assert_eq!(parse_count(&RawCell::Number(7.0), "holiday"), Ok(7));
        assert_eq!(parse_count(&RawCell::Empty, "holiday"), Ok(0));
        assert_eq!(parse_count(&RawCell::text("Holiday"), "holiday"), Ok(0));
        assert!(parse_count(&RawCell::Number(2.5), "holiday").is_err());
        assert!(parse_count(&RawCell::text("-3"), "holiday").is_err());
        assert!(parse_count(&RawCell::text("lots"), "holiday").is_err());
    }

    #[test]
    fn headers_match_loosely() {
        assert_eq!(normalize_header("  Cold   call "), "cold call");
        let raw = sheet(&[&row("Avery")]);
        assert!(resolve_columns(&raw.headers, &ColumnNames::default()).is_ok());
    }

    #[test]
    fn missing_columns_are_all_reported() {
        let headers = vec!["Name".to_string(), "InMails".to_string()];
        match resolve_columns(&headers, &ColumnNames::default()) {
            Err(KpiError::Schema { missing }) => {
                assert_eq!(missing.len(), 6);
                assert!(missing.contains(&"Response rate".to_string()));
                assert!(!missing.contains(&"InMails".to_string()));
            }
            other => panic!("expected schema error, got {other:?}"),
        }
    }

    #[test]
    fn sentinel_rows_are_dropped_case_insensitively() {
        let raw = sheet(&[
            &row("Avery"),
            &row("Eindtotaal"),
            &row("EINDTOTAAL"),
            &row("eindtotaal"),
            &row("Eindtotaal2"),
        ]);
        let records = normalize(&raw, &config()).unwrap();
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Avery", "Eindtotaal2"]);
    }

    #[test]
    fn deny_list_beyond_end_is_a_no_op() {
        let raw = sheet(&[&row("Avery"), &row("Jules")]);
        let config = Config {
            deny_rows: vec![1, 37, 38, 39, 40],
            ..Config::default()
        };
        let records = normalize(&raw, &config).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Avery");
    }

    #[test]
    fn dates_week_and_fill() {
        let raw = sheet(&[
            &row("Avery"),
            &["Jules", "not a date", "", "holiday", "", "", "", ""],
        ]);
        let records = normalize(&raw, &config()).unwrap();

        let avery = &records[0];
        assert_eq!(avery.period_start, NaiveDate::from_ymd_opt(2025, 1, 6));
        assert_eq!(avery.week, 2);
        assert_eq!(avery.response_rate, 0.2);

        let jules = &records[1];
        assert_eq!(jules.period_start, None);
        assert_eq!(jules.period_end, None);
        assert_eq!(jules.week, 0);
        assert_eq!(jules.cold_calls, 0);
        assert_eq!(jules.inmails, 0);
        assert_eq!(jules.response_rate, 0.0);
    }

    #[test]
    fn unnamed_rows_are_skipped() {
        let raw = sheet(&[&row("Avery"), &["", "", "", "", "", "", "", ""], &row("  ")]);
        assert_eq!(normalize(&raw, &config()).unwrap().len(), 1);
    }

    #[test]
    fn bad_count_aborts_with_location() {
        let raw = sheet(&[
            &row("Avery"),
            &["Jules", "06/01/2025", "10/01/2025", "ten", "2", "1", "100", "20%"],
        ]);
        match normalize(&raw, &config()) {
            Err(KpiError::Value { row, column, value, .. }) => {
                assert_eq!(row, 4);
                assert_eq!(column, "Cold call");
                assert_eq!(value, "ten");
            }
            other => panic!("expected value error, got {other:?}"),
        }
    }

    #[test]
    fn sentinel_totals_never_need_to_parse() {
        let raw = sheet(&[
            &row("Avery"),
            &["Eindtotaal", "", "", "10.5", "", "", "", "21,7 avg"],
        ]);
        assert_eq!(normalize(&raw, &config()).unwrap().len(), 1);
    }
}
