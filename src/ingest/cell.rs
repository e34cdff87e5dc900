//! Row-oriented cells and their conversion into Arrow columns.
//!
//! Readers for text and record formats collect values as [`Cell`]s, one
//! vector per column, and hand them to [`build_array`] once the column's type
//! is known.

use std::sync::Arc;

use arrow::array::{
    ArrayRef, BooleanBuilder, Float64Builder, Int64Builder, StringBuilder,
    TimestampMicrosecondBuilder,
};
use chrono::DateTime;

use super::infer::{parse_bool, parse_float, parse_int, parse_timestamp};
use crate::types::ColumnType;

/// A single value read from a row-oriented source.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// A value the source already typed as text.
    Text(String),
    /// An untyped field from a delimited file.
    Raw(String),
    /// Microseconds since the Unix epoch.
    Timestamp(i64),
    /// Nested object or array.
    Json(serde_json::Value),
}

impl Cell {
    /// Render the value as text; `None` for null.
    fn to_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Int(i) => Some(i.to_string()),
            Cell::Float(f) => Some(f.to_string()),
            Cell::Text(s) | Cell::Raw(s) => Some(s.clone()),
            Cell::Timestamp(us) => Some(
                DateTime::from_timestamp_micros(*us)
                    .map(|dt| dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string())
                    .unwrap_or_else(|| us.to_string()),
            ),
            Cell::Json(v) => Some(v.to_string()),
        }
    }

    /// Render the value as JSON text; `None` for null.
    fn to_json_text(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Json(v) => Some(v.to_string()),
            Cell::Bool(b) => Some(serde_json::Value::Bool(*b).to_string()),
            Cell::Int(i) => Some(serde_json::Value::from(*i).to_string()),
            other => other
                .to_text()
                .map(|s| serde_json::Value::String(s).to_string()),
        }
    }
}

/// Build an Arrow array of the given type.
///
/// Returns `None` when a value does not fit the type; the caller widens.
pub(crate) fn build_array(cells: &[Cell], column_type: ColumnType) -> Option<ArrayRef> {
    let array: ArrayRef = match column_type {
        ColumnType::Integer => {
            let mut builder = Int64Builder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Cell::Null => builder.append_null(),
                    Cell::Int(i) => builder.append_value(*i),
                    Cell::Raw(s) => builder.append_value(parse_int(s)?),
                    _ => return None,
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Float => {
            let mut builder = Float64Builder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Cell::Null => builder.append_null(),
                    Cell::Float(f) => builder.append_value(*f),
                    Cell::Int(i) => builder.append_value(*i as f64),
                    Cell::Raw(s) => builder.append_value(parse_float(s)?),
                    _ => return None,
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Cell::Null => builder.append_null(),
                    Cell::Bool(b) => builder.append_value(*b),
                    Cell::Raw(s) => builder.append_value(parse_bool(s)?),
                    _ => return None,
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Timestamp => {
            let mut builder = TimestampMicrosecondBuilder::with_capacity(cells.len());
            for cell in cells {
                match cell {
                    Cell::Null => builder.append_null(),
                    Cell::Timestamp(us) => builder.append_value(*us),
                    Cell::Raw(s) => builder.append_value(parse_timestamp(s)?),
                    _ => return None,
                }
            }
            Arc::new(builder.finish())
        }
        ColumnType::Variant => {
            let mut builder = StringBuilder::new();
            for cell in cells {
                builder.append_option(cell.to_json_text());
            }
            Arc::new(builder.finish())
        }
        ColumnType::Text => {
            let mut builder = StringBuilder::new();
            for cell in cells {
                builder.append_option(cell.to_text());
            }
            Arc::new(builder.finish())
        }
    };
    Some(array)
}
