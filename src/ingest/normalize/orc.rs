//! ORC. Only available with the `orc` feature.

use super::FormatReader;
use crate::error::Result;
use crate::ingest::batch::CanonicalBatch;
use crate::ingest::format::FileUpload;

pub(super) struct OrcReader;

#[cfg(feature = "orc")]
impl FormatReader for OrcReader {
    fn read(&self, upload: &FileUpload) -> Result<CanonicalBatch> {
        use arrow::compute::concat_batches;
        use arrow::record_batch::{RecordBatch, RecordBatchReader};
        use orc_rust::ArrowReaderBuilder;

        use crate::error::QuarryError;

        let reader = ArrowReaderBuilder::try_new(upload.bytes.clone())
            .map_err(|e| QuarryError::malformed(0, e))?
            .build();
        let schema = reader.schema();

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

#[cfg(not(feature = "orc"))]
impl FormatReader for OrcReader {
    fn read(&self, _upload: &FileUpload) -> Result<CanonicalBatch> {
        Err(crate::error::QuarryError::unsupported_format(
            "orc",
            "built without the `orc` feature",
        ))
    }
}

#[cfg(all(test, not(feature = "orc")))]
mod tests {
    use super::*;
    use crate::error::QuarryError;
    use crate::ingest::format::FileFormat;

    #[test]
    fn orc_needs_the_feature() {
        let upload = FileUpload::new("t.orc", "ORC", FileFormat::Orc);
        assert!(matches!(
            OrcReader.read(&upload),
            Err(QuarryError::UnsupportedFormat { .. })
        ));
    }
}
