//! Ingestion Pipeline.
//!
//! ```text
//! FileUpload ─► normalize ─► CanonicalBatch ─► stage ─► StagedArtifact ─► materialize ─► table
//! ```
//!
//! [`ingest`] runs all three steps; the steps are public on their own so a
//! caller can show a [`CanonicalBatch::preview`] before committing.

pub mod batch;
mod cell;
pub mod format;
mod infer;
pub mod materialize;
pub mod normalize;
pub mod stage;
pub mod target;

pub use batch::{
    normalize_identifier, unique_identifiers, BatchPreview, CanonicalBatch, ColumnSchema,
    ColumnSummary,
};
pub use format::{FileFormat, FileUpload, FormatOptions, TextEncoding};
pub use materialize::{materialize, LoadState};
pub use normalize::normalize;
pub use stage::{encode_parquet, stage, unstage, StagedArtifact};
pub use target::{default_table_name, TableTarget, WriteMode};

use tracing::info;

use crate::error::Result;
use crate::types::TableName;
use crate::warehouse::Warehouse;

/// Normalize, stage and materialize one upload.
///
/// Returns the fully qualified name of the loaded table.
pub fn ingest(
    upload: &FileUpload,
    target: &TableTarget,
    warehouse: &dyn Warehouse,
) -> Result<TableName> {
    let batch = normalize(upload)?;
    let artifact = stage(warehouse, &batch, target)?;
    let table = materialize(warehouse, artifact, target)?;
    info!(file = %upload.name, table = %table, mode = %target.mode, rows = batch.num_rows(), "ingested upload");
    Ok(table)
}
