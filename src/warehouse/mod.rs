//! Warehouse collaborator.
//!
//! The [`Warehouse`] trait is everything the ingestion pipeline and query
//! editor need from a SQL warehouse: a stage area for columnar files,
//! statement execution, and table metadata. Every call is blocking and
//! every table it is given is fully qualified; implementations never rely
//! on a session's current database or schema.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryWarehouse`]: in-process tables and stage, used by tests and
//!   dry runs.
//! - `DuckDbWarehouse` (feature `duckdb-backend`): an embedded DuckDB
//!   database with a directory as its stage.

#[cfg(feature = "duckdb-backend")]
pub mod duckdb;
pub mod memory;

use std::fmt;

use serde::Serialize;

#[cfg(feature = "duckdb-backend")]
pub use self::duckdb::DuckDbWarehouse;
pub use memory::MemoryWarehouse;

use crate::error::Result;
use crate::ingest::ColumnSchema;
use crate::sql::{Dialect, Statement};
use crate::types::{ColumnType, TableName};

/// Prefixes of tables created by tooling rather than users.
const TEMP_TABLE_PREFIXES: &[&str] = &["SNOWPARK_TEMP", "TEMP_", "_TEMP", "TMP_"];

/// A SQL warehouse with a stage area.
///
/// Errors reported by the warehouse itself surface as
/// [`QuarryError::ExecutionFailed`](crate::QuarryError::ExecutionFailed)
/// carrying the warehouse's message verbatim.
pub trait Warehouse {
    /// SQL dialect statements must be rendered in.
    fn dialect(&self) -> Dialect;

    // =========================================================================
    // Stage area
    // =========================================================================

    /// Upload a file to the stage. Returns the location to load it from.
    fn put_stage_file(&self, name: &str, bytes: &[u8]) -> Result<String>;

    /// Names of all files currently in the stage.
    fn list_stage_files(&self) -> Result<Vec<String>>;

    /// Remove a staged file. Returns `false` if it was already gone.
    fn remove_stage_file(&self, name: &str) -> Result<bool>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Columns of an existing table, or `None` if it does not exist.
    fn describe_table(&self, table: &TableName) -> Result<Option<TableSchema>>;

    /// Names of the tables in `database.schema`.
    fn list_tables(&self, database: &str, schema: &str) -> Result<Vec<String>>;

    /// Tables in `database.schema` without the temporary ones tooling leaves behind.
    fn list_user_tables(&self, database: &str, schema: &str) -> Result<Vec<String>> {
        Ok(user_tables(self.list_tables(database, schema)?))
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Execute SQL text and collect its result.
    fn execute(&self, sql: &str) -> Result<ResultTable>;

    /// Execute a structured statement.
    ///
    /// The default renders it in [`Warehouse::dialect`] and calls [`Warehouse::execute`].
    fn execute_statement(&self, statement: &Statement) -> Result<ResultTable> {
        self.execute(&statement.to_sql(self.dialect()))
    }
}

/// Column layout of an existing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub table: TableName,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(table: TableName, columns: Vec<ColumnSchema>) -> Self {
        Self { table, columns }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Rows returned by a statement, as JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl ResultTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The single value of a one-row, one-column result (e.g. `COUNT(*)`).
    pub fn scalar(&self) -> Option<&serde_json::Value> {
        self.rows.first().and_then(|row| row.first())
    }
}

impl fmt::Display for ResultTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.columns.join("\t"))?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(display_value).collect();
            writeln!(f, "{}", cells.join("\t"))?;
        }
        write!(f, "({} rows)", self.rows.len())
    }
}

/// Plain-text rendering of a result value: strings unquoted, null empty.
pub(crate) fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Check whether a table name looks like a temporary table (case-insensitive).
pub fn is_temp_table(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    TEMP_TABLE_PREFIXES
        .iter()
        .any(|prefix| upper.starts_with(prefix))
}

/// Drop temporary tables from a listing, keeping order.
pub fn user_tables(tables: Vec<String>) -> Vec<String> {
    tables.into_iter().filter(|t| !is_temp_table(t)).collect()
}
