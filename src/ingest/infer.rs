//! Sample-based type inference for text formats.
//!
//! Each column gets the narrowest type shared by the values in its sample:
//! integer < float < text, with boolean and timestamp recognised on their
//! own. Any other mix falls back to text.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::cell::Cell;
use crate::types::ColumnType;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

/// Infer the type of a column from its first `sample_rows` cells.
///
/// Null cells carry no evidence. A column with no non-null sample is text.
pub(crate) fn infer_column_type(cells: &[Cell], sample_rows: usize) -> ColumnType {
    let mut inferred: Option<ColumnType> = None;
    for cell in cells.iter().take(sample_rows) {
        let Some(observed) = classify(cell) else {
            continue;
        };
        let next = match inferred {
            Some(current) => current.widen(observed),
            None => observed,
        };
        if next == ColumnType::Text {
            return ColumnType::Text;
        }
        inferred = Some(next);
    }
    inferred.unwrap_or(ColumnType::Text)
}

/// Type evidenced by a single cell, `None` for null.
pub(crate) fn classify(cell: &Cell) -> Option<ColumnType> {
    match cell {
        Cell::Null => None,
        Cell::Bool(_) => Some(ColumnType::Boolean),
        Cell::Int(_) => Some(ColumnType::Integer),
        Cell::Float(_) => Some(ColumnType::Float),
        Cell::Text(_) => Some(ColumnType::Text),
        Cell::Timestamp(_) => Some(ColumnType::Timestamp),
        Cell::Json(_) => Some(ColumnType::Variant),
        Cell::Raw(s) => Some(classify_text(s)),
    }
}

fn classify_text(s: &str) -> ColumnType {
    if parse_int(s).is_some() {
        ColumnType::Integer
    } else if parse_float(s).is_some() {
        ColumnType::Float
    } else if parse_bool(s).is_some() {
        ColumnType::Boolean
    } else if parse_timestamp(s).is_some() {
        ColumnType::Timestamp
    } else {
        ColumnType::Text
    }
}

pub(crate) fn parse_int(s: &str) -> Option<i64> {
    s.trim().parse().ok()
}

/// Finite floats only; `inf` and `NaN` spellings stay text.
pub(crate) fn parse_float(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        Some(true)
    } else if s.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parse a timestamp into microseconds since the epoch.
///
/// RFC 3339 values are converted to UTC; naive values are taken as-is.
pub(crate) fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_micros());
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.and_utc().timestamp_micros());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_micros());
        }
    }
    None
}
