//! Result export: CSV, TSV, or JSON records.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{QuarryError, Result};
use crate::warehouse::ResultTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Tsv,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Tsv => "text/tab-separated-values",
            ExportFormat::Json => "application/json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = QuarryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "tsv" => Ok(ExportFormat::Tsv),
            "json" => Ok(ExportFormat::Json),
            other => Err(QuarryError::unsupported_format(other, "expected csv, tsv or json")),
        }
    }
}

/// Write `result` to `writer` in `format`.
pub fn export<W: Write>(result: &ResultTable, format: ExportFormat, writer: W) -> Result<()> {
    match format {
        ExportFormat::Csv => write_delimited(result, b',', writer),
        ExportFormat::Tsv => write_delimited(result, b'\t', writer),
        ExportFormat::Json => write_json(result, writer),
    }
}

/// Export into an in-memory buffer.
pub fn export_to_vec(result: &ResultTable, format: ExportFormat) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    export(result, format, &mut buf)?;
    Ok(buf)
}

fn write_delimited<W: Write>(result: &ResultTable, delimiter: u8, writer: W) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);
    wtr.write_record(&result.columns).map_err(io::Error::from)?;
    for row in &result.rows {
        wtr.write_record(row.iter().map(field)).map_err(io::Error::from)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Text of one delimited field. Null is empty; nested values are JSON.
fn field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_json<W: Write>(result: &ResultTable, mut writer: W) -> Result<()> {
    let records: Vec<Map<String, Value>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
        .collect();
    serde_json::to_writer_pretty(&mut writer, &records).map_err(io::Error::from)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result() -> ResultTable {
        ResultTable::new(
            vec!["id".into(), "name".into(), "tags".into()],
            vec![
                vec![json!(1), json!("Zoë, Jr."), json!(["a"])],
                vec![json!(2), Value::Null, Value::Null],
            ],
        )
    }

    fn text(format: ExportFormat) -> String {
        String::from_utf8(export_to_vec(&result(), format).unwrap()).unwrap()
    }

    #[test]
    fn csv_quotes_fields_with_delimiters() {
        assert_eq!(
            text(ExportFormat::Csv),
            "id,name,tags\n1,\"Zoë, Jr.\",\"[\"\"a\"\"]\"\n2,,\n"
        );
    }

    #[test]
    fn tsv_uses_tabs() {
        assert_eq!(text(ExportFormat::Tsv), "id\tname\ttags\n1\tZoë, Jr.\t\"[\"\"a\"\"]\"\n2\t\t\n");
    }

    #[test]
    fn json_records_keep_column_order_and_unicode() {
        insta::assert_snapshot!(text(ExportFormat::Json), @r#"
        [
          {
            "id": 1,
            "name": "Zoë, Jr.",
            "tags": [
              "a"
            ]
          },
          {
            "id": 2,
            "name": null,
            "tags": null
          }
        ]
        "#);
    }

    #[test]
    fn format_names() {
        assert_eq!("TSV".parse::<ExportFormat>().unwrap(), ExportFormat::Tsv);
        assert!("xlsx".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Json.mime_type(), "application/json");
    }
}
