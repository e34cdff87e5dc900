//! DuckDB SQL dialect.
//!
//! DuckDB is PostgreSQL-compatible with extensions:
//! - ANSI identifier quoting (`"`)
//! - JSON type for semi-structured data
//! - `read_parquet()` table function for staged files

use super::helpers;
use super::SqlDialect;
use crate::sql::token::TokenStream;
use crate::types::ColumnType;

/// DuckDB SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct DuckDb;

impl SqlDialect for DuckDb {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn emit_column_type(&self, ty: ColumnType) -> String {
        helpers::emit_column_type_duckdb(ty)
    }

    fn emit_copy_into(
        &self,
        table: &TokenStream,
        columns: &[String],
        location: &str,
    ) -> TokenStream {
        helpers::emit_copy_into_read_parquet(table, columns, location)
    }
}
