//! JSON documents and JSON Lines.
//!
//! Records are objects; the column set is the union of their keys in
//! first-seen order and a key missing from a record is null for that row.
//! Nested objects and arrays are kept as variant (JSON text) values.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::FormatReader;
use crate::error::{QuarryError, Result};
use crate::ingest::batch::CanonicalBatch;
use crate::ingest::cell::Cell;
use crate::ingest::format::FileUpload;

type Record = Map<String, Value>;

/// A `.json` file: an array of objects, a single object, or JSON Lines
/// content saved under the wrong extension.
pub(super) struct JsonReader;

/// A `.jsonl` file: one object per line, blank lines ignored.
pub(super) struct JsonLinesReader;

impl FormatReader for JsonReader {
    fn read(&self, upload: &FileUpload) -> Result<CanonicalBatch> {
        let text = utf8(&upload.bytes)?;
        let trimmed = text.trim_start();

        let records = if trimmed.starts_with('[') {
            let values: Vec<Value> = serde_json::from_str(text)
                .map_err(|e| QuarryError::malformed(e.line(), e))?;
            values
                .into_iter()
                .enumerate()
                .map(|(i, value)| into_record(value, i + 1))
                .collect::<Result<Vec<_>>>()?
        } else if trimmed.starts_with('{') {
            match serde_json::from_str::<Record>(text) {
                Ok(record) => vec![record],
                Err(_) => parse_lines(text)?,
            }
        } else {
            parse_lines(text)?
        };

        into_batch(records, upload.options.sample_rows)
    }
}

impl FormatReader for JsonLinesReader {
    fn read(&self, upload: &FileUpload) -> Result<CanonicalBatch> {
        let text = utf8(&upload.bytes)?;
        into_batch(parse_lines(text)?, upload.options.sample_rows)
    }
}

fn utf8(bytes: &[u8]) -> Result<&str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes).map_err(|e| {
        let line = bytes[..e.valid_up_to()].iter().filter(|&&b| b == b'\n').count() + 1;
        QuarryError::malformed(line, e)
    })
}

/// One object per line. `row` in errors is the 1-based line number.
fn parse_lines(text: &str) -> Result<Vec<Record>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            let value: Value =
                serde_json::from_str(line).map_err(|e| QuarryError::malformed(i + 1, e))?;
            into_record(value, i + 1)
        })
        .collect()
}

fn into_record(value: Value, row: usize) -> Result<Record> {
    match value {
        Value::Object(record) => Ok(record),
        other => Err(QuarryError::malformed(
            row,
            format!("expected a JSON object, found {}", kind(&other)),
        )),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn into_batch(records: Vec<Record>, sample_rows: usize) -> Result<CanonicalBatch> {
    if records.is_empty() {
        return Err(QuarryError::EmptyInput);
    }

    let mut names: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for record in &records {
        for key in record.keys() {
            if !positions.contains_key(key) {
                positions.insert(key.clone(), names.len());
                names.push(key.clone());
            }
        }
    }

    let num_rows = records.len();
    let mut columns: Vec<Vec<Cell>> = vec![vec![Cell::Null; num_rows]; names.len()];
    for (row, record) in records.into_iter().enumerate() {
        for (key, value) in record {
            if let Some(&column) = positions.get(&key) {
                columns[column][row] = to_cell(value);
            }
        }
    }

    CanonicalBatch::from_cells(names, columns, num_rows, sample_rows)
}

fn to_cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Bool(b) => Cell::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Cell::Int(i),
            None => n.as_f64().map(Cell::Float).unwrap_or(Cell::Text(n.to_string())),
        },
        Value::String(s) => Cell::Text(s),
        nested @ (Value::Array(_) | Value::Object(_)) => Cell::Json(nested),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::format::FileFormat;
    use crate::types::ColumnType;
    use arrow::array::{Array, StringArray};

    fn json(text: &str) -> Result<CanonicalBatch> {
        JsonReader.read(&FileUpload::new("t.json", text.to_string(), FileFormat::Json))
    }

    fn jsonl(text: &str) -> Result<CanonicalBatch> {
        JsonLinesReader.read(&FileUpload::new("t.jsonl", text.to_string(), FileFormat::Jsonl))
    }

    #[test]
    fn array_of_objects_unions_keys() {
        let batch = json(r#"[{"id": 1, "name": "ann"}, {"id": 2, "email": "b@x"}]"#).unwrap();
        assert_eq!(batch.column_names(), vec!["id", "name", "email"]);
        assert_eq!(batch.num_rows(), 2);

        let email = batch.record_batch().column(2);
        assert!(email.is_null(0));
        assert!(!email.is_null(1));
    }

    #[test]
    fn mixed_numbers_widen_to_float() {
        let batch = jsonl("{\"x\": 1}\n{\"x\": 2.5}\n").unwrap();
        assert_eq!(batch.columns()[0].column_type, ColumnType::Float);
    }

    #[test]
    fn nested_values_are_variant() {
        let batch = json(r#"[{"tags": ["a", "b"]}, {"tags": {"k": 1}}]"#).unwrap();
        assert_eq!(batch.columns()[0].column_type, ColumnType::Variant);
        let tags = batch
            .record_batch()
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(tags.value(0), r#"["a","b"]"#);
    }

    #[test]
    fn single_object_is_one_row() {
        let batch = json(r#"{"id": 7, "ok": true}"#).unwrap();
        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.columns()[1].column_type, ColumnType::Boolean);
    }

    #[test]
    fn json_extension_with_lines_content() {
        let batch = json("{\"id\": 1}\n{\"id\": 2}\n").unwrap();
        assert_eq!(batch.num_rows(), 2);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let batch = jsonl("{\"id\": 1}\n\n   \n{\"id\": 2}\n").unwrap();
        assert_eq!(batch.num_rows(), 2);
    }

    #[test]
    fn bad_line_reports_its_number() {
        match jsonl("{\"id\": 1}\n{\"id\": \n").unwrap_err() {
            QuarryError::MalformedInput { row, .. } => assert_eq!(row, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_object_element_is_rejected() {
        match json(r#"[{"id": 1}, 5]"#).unwrap_err() {
            QuarryError::MalformedInput { row, reason } => {
                assert_eq!(row, 2);
                assert_eq!(reason, "expected a JSON object, found a number");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_array_is_empty_input() {
        assert!(matches!(json("[]"), Err(QuarryError::EmptyInput)));
    }
}
