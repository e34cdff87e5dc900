//! CSV and TSV.

use csv::{ErrorKind, ReaderBuilder, StringRecord};

use super::FormatReader;
use crate::error::{QuarryError, Result};
use crate::ingest::batch::CanonicalBatch;
use crate::ingest::cell::Cell;
use crate::ingest::format::FileUpload;

pub(super) struct DelimitedReader;

impl FormatReader for DelimitedReader {
    fn read(&self, upload: &FileUpload) -> Result<CanonicalBatch> {
        let text = decode(upload)?;
        if text.trim().is_empty() {
            return Err(QuarryError::EmptyInput);
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(upload.delimiter())
            .has_headers(false)
            .flexible(false)
            .from_reader(text.as_bytes());

        let mut names: Option<Vec<String>> = None;
        let mut columns: Vec<Vec<Cell>> = Vec::new();
        let mut num_rows = 0usize;

        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| record_error(e, index))?;

            if names.is_none() {
                columns = (0..record.len()).map(|_| Vec::new()).collect();
                if upload.options.has_header {
                    names = Some(record.iter().map(str::to_string).collect());
                    continue;
                }
                names = Some((1..=record.len()).map(|i| format!("column_{i}")).collect());
            }

            push_record(&mut columns, &record);
            num_rows += 1;
        }

        let names = names.ok_or(QuarryError::EmptyInput)?;
        CanonicalBatch::from_cells(names, columns, num_rows, upload.options.sample_rows)
    }
}

/// Decode to UTF-8 with the upload's encoding. A leading BOM is dropped.
fn decode(upload: &FileUpload) -> Result<String> {
    let encoding = upload.options.encoding.encoding();
    let (text, had_errors) = encoding.decode_with_bom_removal(&upload.bytes);
    if had_errors {
        let line = text
            .find('\u{FFFD}')
            .map(|at| text[..at].matches('\n').count() + 1)
            .unwrap_or(0);
        return Err(QuarryError::malformed(
            line,
            format!("bytes are not valid {}", encoding.name()),
        ));
    }
    Ok(text.into_owned())
}

fn push_record(columns: &mut [Vec<Cell>], record: &StringRecord) {
    for (column, field) in columns.iter_mut().zip(record.iter()) {
        column.push(if field.is_empty() {
            Cell::Null
        } else {
            Cell::Raw(field.to_string())
        });
    }
}

/// Map a csv error onto the 1-based line it occurred on.
fn record_error(err: csv::Error, index: usize) -> QuarryError {
    let line = err
        .position()
        .map(|p| usize::try_from(p.line()).unwrap_or(usize::MAX))
        .unwrap_or(index + 1);
    match err.kind() {
        ErrorKind::UnequalLengths {
            expected_len, len, ..
        } => QuarryError::malformed(line, format!("expected {expected_len} fields, found {len}")),
        _ => QuarryError::malformed(line, err.to_string()),
    }
}
