//! Format Normalizer - turns an upload of any supported format into a
//! [`CanonicalBatch`].
//!
//! Each format tag has exactly one reader behind the [`FormatReader`]
//! capability. The reader is picked by an exhaustive match on the tag, so
//! adding a format means adding a variant and the compiler points at every
//! place that needs it.

mod avro;
mod delimited;
mod json;
mod orc;
mod parquet;

use tracing::{debug, info};

use super::batch::CanonicalBatch;
use super::format::{FileFormat, FileUpload};
use crate::error::{QuarryError, Result};

/// One parser per format tag, all converging on [`CanonicalBatch`].
pub(crate) trait FormatReader {
    fn read(&self, upload: &FileUpload) -> Result<CanonicalBatch>;
}

fn reader_for(format: FileFormat) -> &'static dyn FormatReader {
    match format {
        FileFormat::Csv | FileFormat::Tsv => &delimited::DelimitedReader,
        FileFormat::Json => &json::JsonReader,
        FileFormat::Jsonl => &json::JsonLinesReader,
        FileFormat::Parquet => &parquet::ParquetReader,
        FileFormat::Avro => &avro::AvroReader,
        FileFormat::Orc => &orc::OrcReader,
    }
}

/// Parse an upload into a canonical batch.
///
/// Fails with [`QuarryError::EmptyInput`] for an empty file, and with
/// [`QuarryError::MalformedInput`] at the first row that cannot be parsed.
/// Nothing is ingested partially.
pub fn normalize(upload: &FileUpload) -> Result<CanonicalBatch> {
    if upload.bytes.is_empty() {
        return Err(QuarryError::EmptyInput);
    }
    // A text file holding only whitespace counts as empty
    if !upload.format.is_self_describing() && upload.bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(QuarryError::EmptyInput);
    }

    debug!(file = %upload.name, format = %upload.format, bytes = upload.bytes.len(), "normalizing upload");
    let batch = reader_for(upload.format).read(upload)?;
    info!(
        file = %upload.name,
        format = %upload.format,
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "normalized upload"
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    #[test]
    fn three_row_csv() {
        let upload = FileUpload::new("users.csv", "id,name\n1,ann\n2,bob\n3,cy\n", FileFormat::Csv);
        let batch = normalize(&upload).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.column_names(), vec!["id", "name"]);
        assert_eq!(batch.columns()[0].column_type, ColumnType::Integer);
        assert_eq!(batch.columns()[1].column_type, ColumnType::Text);
    }

    #[test]
    fn empty_inputs() {
        let upload = FileUpload::new("e.csv", "", FileFormat::Csv);
        assert!(matches!(normalize(&upload), Err(QuarryError::EmptyInput)));

        let upload = FileUpload::new("e.jsonl", "\n  \n", FileFormat::Jsonl);
        assert!(matches!(normalize(&upload), Err(QuarryError::EmptyInput)));

        let upload = FileUpload::new("e.parquet", Vec::<u8>::new(), FileFormat::Parquet);
        assert!(matches!(normalize(&upload), Err(QuarryError::EmptyInput)));
    }
}
