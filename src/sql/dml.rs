//! DML support: bulk loading a staged Parquet file into a table.
//!
//! How the load is spelled is entirely up to the dialect (see
//! [`SqlDialect::emit_copy_into`]); this type only carries the pieces.

use super::dialect::{Dialect, SqlDialect};
use super::query::TableRef;
use super::token::TokenStream;

/// Load a staged columnar file into an existing table.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DML statements have no effect until converted to SQL with to_sql()"]
pub struct CopyInto {
    pub table: TableRef,
    /// Column names of the staged file, in file order.
    pub columns: Vec<String>,
    /// Warehouse-side location of the staged file.
    pub location: String,
}

impl CopyInto {
    pub fn new(table: TableRef, location: impl Into<String>) -> Self {
        Self {
            table,
            columns: vec![],
            location: location.into(),
        }
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = String>) -> Self {
        self.columns = columns.into_iter().collect();
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        dialect.emit_copy_into(&self.table.to_tokens(), &self.columns, &self.location)
    }
}
