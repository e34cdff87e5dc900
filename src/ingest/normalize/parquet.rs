//! Parquet. The embedded schema is authoritative.

use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use super::FormatReader;
use crate::error::{QuarryError, Result};
use crate::ingest::batch::CanonicalBatch;
use crate::ingest::format::FileUpload;

pub(super) struct ParquetReader;

impl FormatReader for ParquetReader {
    fn read(&self, upload: &FileUpload) -> Result<CanonicalBatch> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(upload.bytes.clone())
            .map_err(|e| QuarryError::malformed(0, e))?;
        let schema = builder.schema().clone();
        let reader = builder.build().map_err(|e| QuarryError::malformed(0, e))?;

        let mut batches = Vec::new();
        let mut rows_read = 0usize;
        for batch in reader {
            let batch = batch.map_err(|e| QuarryError::malformed(rows_read + 1, e))?;
            rows_read += batch.num_rows();
            batches.push(batch);
        }

        let combined = if batches.is_empty() {
            RecordBatch::new_empty(schema)
        } else {
            concat_batches(&schema, &batches).map_err(|e| QuarryError::malformed(0, e))?
        };
        CanonicalBatch::from_record_batch(combined)
    }
}
