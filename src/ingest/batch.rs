//! The canonical in-memory batch every reader converges on.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef};
use arrow::datatypes::{Field, Schema, SchemaRef};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use arrow::util::display::{ArrayFormatter, FormatOptions as DisplayOptions};
use serde::Serialize;
use tracing::debug;

use super::cell::{build_array, Cell};
use super::infer::infer_column_type;
use crate::error::{QuarryError, Result};
use crate::types::ColumnType;

/// Name and semantic type of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Columns of equal length with unique, identifier-safe names and a
/// semantic type each.
#[derive(Debug, Clone)]
pub struct CanonicalBatch {
    batch: RecordBatch,
    columns: Vec<ColumnSchema>,
}

impl CanonicalBatch {
    /// Wrap a batch read from a self-describing file.
    ///
    /// The embedded types are trusted; column names are still made unique and
    /// identifier-safe.
    pub fn from_record_batch(batch: RecordBatch) -> Result<Self> {
        let schema = batch.schema();
        let names = unique_identifiers(schema.fields().iter().map(|f| f.name().as_str()));

        let fields: Vec<Field> = schema
            .fields()
            .iter()
            .zip(&names)
            .map(|(field, name)| field.as_ref().clone().with_name(name.clone()))
            .collect();
        let columns = fields
            .iter()
            .map(|f| ColumnSchema::new(f.name().clone(), ColumnType::from_field(f)))
            .collect();

        let batch = rebuild(
            Arc::new(Schema::new(fields)),
            batch.columns().to_vec(),
            batch.num_rows(),
        )?;
        Ok(Self { batch, columns })
    }

    /// Build from row-oriented cells, inferring each column's type from a sample.
    pub(crate) fn from_cells(
        names: Vec<String>,
        cells: Vec<Vec<Cell>>,
        num_rows: usize,
        sample_rows: usize,
    ) -> Result<Self> {
        let names = unique_identifiers(names.iter().map(String::as_str));
        let mut fields = Vec::with_capacity(names.len());
        let mut arrays = Vec::with_capacity(names.len());
        let mut columns = Vec::with_capacity(names.len());

        for (name, column) in names.into_iter().zip(cells) {
            let sampled = infer_column_type(&column, sample_rows);
            let (column_type, array) = match build_array(&column, sampled) {
                Some(array) => (sampled, array),
                None => {
                    // A value past the sample did not fit; re-infer over the whole column
                    let widened = infer_column_type(&column, usize::MAX);
                    debug!(column = %name, from = %sampled, to = %widened, "widening column type");
                    match build_array(&column, widened) {
                        Some(array) => (widened, array),
                        None => (ColumnType::Text, text_array(&column)?),
                    }
                }
            };
            fields.push(column_type.to_field(&name));
            arrays.push(array);
            columns.push(ColumnSchema::new(name, column_type));
        }

        let batch = rebuild(Arc::new(Schema::new(fields)), arrays, num_rows)?;
        Ok(Self { batch, columns })
    }

    /// Build from cells whose column types come from an embedded schema.
    ///
    /// A value that does not fit its declared type turns the column into text.
    pub(crate) fn from_typed_cells(
        columns: Vec<(String, ColumnType)>,
        cells: Vec<Vec<Cell>>,
        num_rows: usize,
    ) -> Result<Self> {
        let names = unique_identifiers(columns.iter().map(|(name, _)| name.as_str()));
        let mut fields = Vec::with_capacity(names.len());
        let mut arrays = Vec::with_capacity(names.len());
        let mut schema = Vec::with_capacity(names.len());

        for ((name, (_, declared)), column) in names.into_iter().zip(columns).zip(cells) {
            let (column_type, array) = match build_array(&column, declared) {
                Some(array) => (declared, array),
                None => {
                    debug!(column = %name, from = %declared, "declared type does not fit, using text");
                    (ColumnType::Text, text_array(&column)?)
                }
            };
            fields.push(column_type.to_field(&name));
            arrays.push(array);
            schema.push(ColumnSchema::new(name, column_type));
        }

        let batch = rebuild(Arc::new(Schema::new(fields)), arrays, num_rows)?;
        Ok(Self {
            batch,
            columns: schema,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Column names and semantic types, in order.
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// The first `n` rows rendered for display, with per-column summaries.
    pub fn preview(&self, n: usize) -> Result<BatchPreview> {
        let options = DisplayOptions::default().with_null("");
        let shown = n.min(self.num_rows());

        let formatters = self
            .batch
            .columns()
            .iter()
            .map(|array| ArrayFormatter::try_new(array.as_ref(), &options))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| QuarryError::malformed(0, e))?;

        let rows = (0..shown)
            .map(|row| {
                formatters
                    .iter()
                    .map(|f| f.value(row).to_string())
                    .collect()
            })
            .collect();

        let columns = self
            .columns
            .iter()
            .zip(self.batch.columns())
            .map(|(schema, array)| ColumnSummary {
                name: schema.name.clone(),
                column_type: schema.column_type,
                null_count: array.null_count(),
            })
            .collect();

        Ok(BatchPreview {
            columns,
            rows,
            total_rows: self.num_rows(),
        })
    }
}

fn text_array(cells: &[Cell]) -> Result<ArrayRef> {
    build_array(cells, ColumnType::Text)
        .ok_or_else(|| QuarryError::malformed(0, "cannot build text column"))
}

fn rebuild(schema: SchemaRef, arrays: Vec<ArrayRef>, num_rows: usize) -> Result<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    RecordBatch::try_new_with_options(schema, arrays, &options)
        .map_err(|e| QuarryError::malformed(0, e))
}

/// Sample rows plus inferred schema, shown before a load is committed.
#[derive(Debug, Clone, Serialize)]
pub struct BatchPreview {
    pub columns: Vec<ColumnSummary>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

/// Inferred schema of one column with its null count.
#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub column_type: ColumnType,
    pub null_count: usize,
}

impl fmt::Display for BatchPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} rows, {} columns", self.total_rows, self.columns.len())?;
        for column in &self.columns {
            writeln!(
                f,
                "  {:<24} {:<10} nulls={}",
                column.name, column.column_type, column.null_count
            )?;
        }
        if !self.rows.is_empty() {
            writeln!(f)?;
            let header: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
            writeln!(f, "{}", header.join("\t"))?;
            for row in &self.rows {
                writeln!(f, "{}", row.join("\t"))?;
            }
        }
        Ok(())
    }
}

/// Make a raw column name identifier-safe.
///
/// Double quotes and control characters are dropped, whitespace runs become
/// a single `_`. An empty result is named after its 1-based position.
pub fn normalize_identifier(raw: &str, position: usize) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for ch in raw.trim().chars() {
        if ch.is_whitespace() {
            pending_space = true;
        } else if ch == '"' || ch.is_control() {
            continue;
        } else {
            if pending_space && !out.is_empty() {
                out.push('_');
            }
            pending_space = false;
            out.push(ch);
        }
    }
    if out.is_empty() {
        format!("column_{}", position + 1)
    } else {
        out
    }
}

/// Normalize every name and de-duplicate with `_2`, `_3`, ... suffixes.
pub fn unique_identifiers<'a>(raw: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let normalized: Vec<String> = raw
        .into_iter()
        .enumerate()
        .map(|(i, name)| normalize_identifier(name, i))
        .collect();

    let mut seen: HashSet<String> = HashSet::with_capacity(normalized.len());
    normalized
        .into_iter()
        .map(|name| {
            let mut candidate = name.clone();
            let mut suffix = 2;
            while seen.contains(&candidate) {
                candidate = format!("{name}_{suffix}");
                suffix += 1;
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}
