//! Avro object container files. Column types come from the writer schema.

use apache_avro::schema::Schema;
use apache_avro::types::Value;
use apache_avro::Reader;

use super::FormatReader;
use crate::error::{QuarryError, Result};
use crate::ingest::batch::CanonicalBatch;
use crate::ingest::cell::Cell;
use crate::ingest::format::FileUpload;
use crate::types::ColumnType;

const MICROS_PER_DAY: i64 = 86_400_000_000;

pub(super) struct AvroReader;

impl FormatReader for AvroReader {
    fn read(&self, upload: &FileUpload) -> Result<CanonicalBatch> {
        let reader = Reader::new(&upload.bytes[..]).map_err(|e| QuarryError::malformed(0, e))?;

        let columns: Vec<(String, ColumnType)> = match reader.writer_schema() {
            Schema::Record(record) => record
                .fields
                .iter()
                .map(|field| (field.name.clone(), column_type(&field.schema)))
                .collect(),
            other => {
                return Err(QuarryError::malformed(
                    0,
                    format!("top-level schema must be a record, found {other:?}"),
                ))
            }
        };

        let mut cells: Vec<Vec<Cell>> = vec![Vec::new(); columns.len()];
        let mut num_rows = 0usize;
        for value in reader {
            let row = num_rows + 1;
            let value = value.map_err(|e| QuarryError::malformed(row, e))?;
            let Value::Record(fields) = value else {
                return Err(QuarryError::malformed(row, "expected a record"));
            };
            if fields.len() != columns.len() {
                return Err(QuarryError::malformed(
                    row,
                    format!("expected {} fields, found {}", columns.len(), fields.len()),
                ));
            }
            for (column, (_, field)) in cells.iter_mut().zip(fields) {
                column.push(to_cell(field));
            }
            num_rows += 1;
        }

        CanonicalBatch::from_typed_cells(columns, cells, num_rows)
    }
}

fn column_type(schema: &Schema) -> ColumnType {
    match schema {
        Schema::Boolean => ColumnType::Boolean,
        Schema::Int | Schema::Long => ColumnType::Integer,
        Schema::Float | Schema::Double => ColumnType::Float,
        Schema::Date
        | Schema::TimestampMillis
        | Schema::TimestampMicros
        | Schema::LocalTimestampMillis
        | Schema::LocalTimestampMicros => ColumnType::Timestamp,
        Schema::Record(_) | Schema::Array(_) | Schema::Map(_) => ColumnType::Variant,
        // ["null", T] is how Avro spells a nullable T
        Schema::Union(union) => union
            .variants()
            .iter()
            .find(|variant| !matches!(variant, Schema::Null))
            .map(column_type)
            .unwrap_or(ColumnType::Text),
        _ => ColumnType::Text,
    }
}

fn to_cell(value: Value) -> Cell {
    match value {
        Value::Null => Cell::Null,
        Value::Boolean(b) => Cell::Bool(b),
        Value::Int(i) => Cell::Int(i64::from(i)),
        Value::Long(i) => Cell::Int(i),
        Value::Float(f) => Cell::Float(f64::from(f)),
        Value::Double(f) => Cell::Float(f),
        Value::String(s) | Value::Enum(_, s) => Cell::Text(s),
        Value::Uuid(u) => Cell::Text(u.to_string()),
        Value::Date(days) => Cell::Timestamp(i64::from(days) * MICROS_PER_DAY),
        Value::TimestampMillis(ms) | Value::LocalTimestampMillis(ms) => {
            Cell::Timestamp(ms.saturating_mul(1000))
        }
        Value::TimestampMicros(us) | Value::LocalTimestampMicros(us) => Cell::Timestamp(us),
        Value::Union(_, inner) => to_cell(*inner),
        other => match serde_json::Value::try_from(other) {
            Ok(json @ (serde_json::Value::Array(_) | serde_json::Value::Object(_))) => {
                Cell::Json(json)
            }
            Ok(serde_json::Value::Null) => Cell::Null,
            Ok(json) => Cell::Text(json.to_string()),
            Err(e) => Cell::Text(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::format::FileFormat;
    use apache_avro::types::Record;
    use apache_avro::Writer;

    const SCHEMA: &str = r#"{
        "type": "record",
        "name": "user",
        "fields": [
            {"name": "id", "type": "long"},
            {"name": "name", "type": ["null", "string"]},
            {"name": "score", "type": "double"},
            {"name": "tags", "type": {"type": "array", "items": "string"}}
        ]
    }"#;

    fn encode(rows: &[(i64, Option<&str>, f64)]) -> Vec<u8> {
        let schema = Schema::parse_str(SCHEMA).unwrap();
        let mut writer = Writer::new(&schema, Vec::new());
        for (id, name, score) in rows {
            let mut record = Record::new(writer.schema()).unwrap();
            record.put("id", *id);
            record.put("name", name.map(str::to_string));
            record.put("score", *score);
            record.put("tags", Value::Array(vec![Value::String("a".into())]));
            writer.append(record).unwrap();
        }
        writer.into_inner().unwrap()
    }

    #[test]
    fn writer_schema_drives_types() {
        let bytes = encode(&[(1, Some("ann"), 1.5), (2, None, 2.0)]);
        let upload = FileUpload::new("t.avro", bytes, FileFormat::Avro);
        let batch = AvroReader.read(&upload).unwrap();

        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.column_names(), vec!["id", "name", "score", "tags"]);
        let types: Vec<ColumnType> = batch.columns().iter().map(|c| c.column_type).collect();
        assert_eq!(
            types,
            vec![
                ColumnType::Integer,
                ColumnType::Text,
                ColumnType::Float,
                ColumnType::Variant
            ]
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let upload = FileUpload::new("t.avro", "definitely not avro", FileFormat::Avro);
        assert!(matches!(
            AvroReader.read(&upload),
            Err(QuarryError::MalformedInput { row: 0, .. })
        ));
    }
}
