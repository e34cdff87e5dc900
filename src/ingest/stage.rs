//! Stage Transport - moves a canonical batch into the warehouse stage as a
//! single Parquet file, whatever format it was read from.
//!
//! Artifact names carry a per-operation UUID so that two loads of the same
//! table can never collide in the stage.

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::batch::CanonicalBatch;
use super::target::TableTarget;
use crate::error::{QuarryError, Result};
use crate::types::TableName;
use crate::warehouse::Warehouse;

/// A Parquet file sitting in the stage, waiting to be loaded into `target`.
///
/// Owned by exactly one load operation, which must [`unstage`] it.
#[derive(Debug, Clone)]
pub struct StagedArtifact {
    /// File name within the stage.
    pub name: String,
    /// Location the warehouse loads from.
    pub location: String,
    pub target: TableName,
    /// Arrow schema embedded in the file.
    pub schema: SchemaRef,
    pub row_count: usize,
    pub operation_id: Uuid,
}

/// Serialize a batch as an in-memory Parquet file.
pub fn encode_parquet(batch: &RecordBatch) -> Result<Vec<u8>> {
    let mut writer = ArrowWriter::try_new(Vec::new(), batch.schema(), None)
        .map_err(|e| QuarryError::stage_upload("<encode>", e))?;
    writer
        .write(batch)
        .map_err(|e| QuarryError::stage_upload("<encode>", e))?;
    writer
        .into_inner()
        .map_err(|e| QuarryError::stage_upload("<encode>", e))
}

/// Operation-scoped artifact name, e.g. `quarry_daily_sales_3f2a...parquet`.
fn artifact_name(table: &str, operation_id: Uuid) -> String {
    let slug: String = table
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("quarry_{slug}_{}.parquet", operation_id.simple())
}

/// Upload `batch` to the stage.
///
/// Either a complete artifact is returned, or the call fails with
/// [`QuarryError::StageUploadFailed`] and nothing is left in the stage.
pub fn stage(
    warehouse: &dyn Warehouse,
    batch: &CanonicalBatch,
    target: &TableTarget,
) -> Result<StagedArtifact> {
    let operation_id = Uuid::new_v4();
    let name = artifact_name(&target.name.table, operation_id);

    let bytes = encode_parquet(batch.record_batch()).map_err(|e| match e {
        QuarryError::StageUploadFailed { reason, .. } => QuarryError::stage_upload(&name, reason),
        other => other,
    })?;

    let location = match warehouse.put_stage_file(&name, &bytes) {
        Ok(location) => location,
        Err(e) => {
            // A failed upload may still have left a partial file
            if let Err(cleanup) = warehouse.remove_stage_file(&name) {
                warn!(artifact = %name, error = %cleanup, "failed to remove partial upload");
            }
            return Err(QuarryError::stage_upload(&name, e));
        }
    };

    info!(
        artifact = %name,
        target = %target.name,
        rows = batch.num_rows(),
        bytes = bytes.len(),
        "staged artifact"
    );
    Ok(StagedArtifact {
        name,
        location,
        target: target.name.clone(),
        schema: batch.schema(),
        row_count: batch.num_rows(),
        operation_id,
    })
}

/// Remove an artifact from the stage. Removing one that is already gone is not an error.
pub fn unstage(warehouse: &dyn Warehouse, artifact: &StagedArtifact) -> Result<()> {
    match warehouse.remove_stage_file(&artifact.name) {
        Ok(true) => {
            debug!(artifact = %artifact.name, "removed staged artifact");
            Ok(())
        }
        Ok(false) => {
            debug!(artifact = %artifact.name, "staged artifact already removed");
            Ok(())
        }
        Err(e) => Err(QuarryError::stage_cleanup(&artifact.name, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::format::{FileFormat, FileUpload};
    use crate::ingest::normalize::normalize;
    use crate::ingest::target::WriteMode;
    use crate::warehouse::MemoryWarehouse;

    fn batch() -> CanonicalBatch {
        normalize(&FileUpload::new("t.csv", "id,name\n1,a\n2,b\n", FileFormat::Csv)).unwrap()
    }

    fn target() -> TableTarget {
        TableTarget::new(TableName::new("DB", "RAW", "Daily Sales"), WriteMode::CreateNew)
    }

    #[test]
    fn names_are_operation_scoped() {
        let a = artifact_name("Daily Sales", Uuid::new_v4());
        let b = artifact_name("Daily Sales", Uuid::new_v4());
        assert!(a.starts_with("quarry_daily_sales_"));
        assert!(a.ends_with(".parquet"));
        assert_ne!(a, b);
    }

    #[test]
    fn stage_then_unstage_leaves_nothing() {
        let warehouse = MemoryWarehouse::new();
        let before = warehouse.list_stage_files().unwrap();

        let artifact = stage(&warehouse, &batch(), &target()).unwrap();
        assert_eq!(artifact.row_count, 2);
        assert!(warehouse.list_stage_files().unwrap().contains(&artifact.name));

        unstage(&warehouse, &artifact).unwrap();
        assert_eq!(warehouse.list_stage_files().unwrap(), before);

        // Idempotent
        unstage(&warehouse, &artifact).unwrap();
    }

    #[test]
    fn failed_upload_leaves_nothing() {
        let warehouse = MemoryWarehouse::new();
        warehouse.fail_next_upload("disk quota exceeded");

        let err = stage(&warehouse, &batch(), &target()).unwrap_err();
        assert!(matches!(err, QuarryError::StageUploadFailed { .. }));
        assert!(err.to_string().contains("disk quota exceeded"));
        assert!(warehouse.list_stage_files().unwrap().is_empty());
    }
}
