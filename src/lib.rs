//! # Quarry
//!
//! Load files into a SQL warehouse, then query them through a structured
//! single-table query builder.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │     FileUpload (csv, tsv, json, jsonl, parquet, ...)     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [ingest::normalize]
//! ┌─────────────────────────────────────────────────────────┐
//! │          CanonicalBatch (Arrow + inferred types)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [ingest::stage]
//! ┌─────────────────────────────────────────────────────────┐
//! │            StagedArtifact (Parquet in the stage)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [ingest::materialize]
//! ┌─────────────────────────────────────────────────────────┐
//! │              DATABASE.SCHEMA.TABLE in the warehouse      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [query: spec → render → editor]
//! ┌─────────────────────────────────────────────────────────┐
//! │             ResultTable → export (csv, tsv, json)        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! All SQL is produced by the [`sql`] builder, which quotes identifiers and
//! escapes literals for the target [`Dialect`].

pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod query;
pub mod sql;
pub mod types;
pub mod warehouse;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::error::{QuarryError, Result};
    pub use crate::ingest::{
        ingest, normalize, CanonicalBatch, FileFormat, FileUpload, FormatOptions, TableTarget,
        TextEncoding, WriteMode,
    };
    pub use crate::query::{
        render, Combine, Operator, OrderBy, QuerySpec, RenderedQuery, SqlEditor,
    };
    pub use crate::sql::{Dialect, SortDir};
    pub use crate::types::{ColumnType, TableName};
    pub use crate::warehouse::{MemoryWarehouse, ResultTable, TableSchema, Warehouse};
}

// Also export at crate root for convenience
pub use config::Settings;
pub use error::{QuarryError, Result};
pub use sql::Dialect;
pub use types::{ColumnType, TableName};
