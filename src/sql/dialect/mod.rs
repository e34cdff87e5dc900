//! SQL Dialect definitions and formatting rules.
//!
//! This module provides a trait-based abstraction for SQL dialect differences.
//! Each dialect implements `SqlDialect` to handle its specific syntax:
//!
//! - Identifier quoting and string literal escaping
//! - Boolean literals
//! - Column type names for the semantic column types
//! - Bulk load from a staged Parquet file
//!
//! # Usage
//!
//! ```
//! use quarry::sql::{Dialect, SqlDialect};
//!
//! let dialect = Dialect::Snowflake;
//! assert_eq!(dialect.quote_identifier("order"), "\"order\"");
//! ```
//!
//! | Feature | Snowflake | DuckDB |
//! |---------|-----------|--------|
//! | Semi-structured type | VARIANT | JSON |
//! | Bulk load | `COPY INTO ... FROM @stage` | `INSERT ... SELECT ... FROM read_parquet()` |
//! | CREATE OR REPLACE TABLE | ✓ | ✓ |

mod duckdb;
pub mod helpers;
mod snowflake;

pub use duckdb::DuckDb;
pub use snowflake::Snowflake;

use serde::{Deserialize, Serialize};

use super::token::{Token, TokenStream};
use crate::types::ColumnType;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow ANSI SQL where possible.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    /// Quote an identifier (database, schema, table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    ///
    /// Single quotes with `''` for escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit the LIMIT clause.
    fn emit_limit(&self, limit: u64) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Limit)
            .space()
            .push(Token::LitInt(i64::try_from(limit).unwrap_or(i64::MAX)));
        ts
    }

    // =========================================================================
    // DDL / Load Support
    // =========================================================================

    /// Emit the column type name for a semantic column type.
    fn emit_column_type(&self, ty: ColumnType) -> String;

    /// Whether `CREATE OR REPLACE TABLE` is available.
    fn supports_create_or_replace(&self) -> bool {
        true
    }

    /// Emit the statement that loads a staged Parquet file into `table`.
    ///
    /// `columns` are the staged file's column names, in file order.
    fn emit_copy_into(&self, table: &TokenStream, columns: &[String], location: &str)
        -> TokenStream;
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Snowflake,
    DuckDb,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Snowflake => &Snowflake,
            Dialect::DuckDb => &DuckDb,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn emit_limit(&self, limit: u64) -> TokenStream {
        self.dialect().emit_limit(limit)
    }

    fn emit_column_type(&self, ty: ColumnType) -> String {
        self.dialect().emit_column_type(ty)
    }

    fn supports_create_or_replace(&self) -> bool {
        self.dialect().supports_create_or_replace()
    }

    fn emit_copy_into(
        &self,
        table: &TokenStream,
        columns: &[String],
        location: &str,
    ) -> TokenStream {
        self.dialect().emit_copy_into(table, columns, location)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "snowflake" => Ok(Dialect::Snowflake),
            "duckdb" => Ok(Dialect::DuckDb),
            other => Err(format!("unknown dialect: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::test_utils::single_string_comparison;

    #[test]
    fn test_dialect_display() {
        assert_eq!(Dialect::Snowflake.to_string(), "snowflake");
        assert_eq!(Dialect::DuckDb.to_string(), "duckdb");
    }

    #[test]
    fn test_dialect_from_str() {
        assert_eq!("DuckDB".parse::<Dialect>().unwrap(), Dialect::DuckDb);
        assert!("oracle".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(Dialect::Snowflake.quote_identifier("users"), "\"users\"");
        assert_eq!(Dialect::DuckDb.quote_identifier("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(Dialect::Snowflake.quote_string("it's"), "'it''s'");
        assert_eq!(Dialect::DuckDb.quote_string("'; DROP TABLE x; --"), "'''; DROP TABLE x; --'");
    }

    #[test]
    fn test_snowflake_escapes_backslashes() {
        assert_eq!(Dialect::Snowflake.quote_string(r"x\' OR 1=1 --"), r"'x\\'' OR 1=1 --'");
        assert_eq!(Dialect::Snowflake.quote_string(r"C:\temp\"), r"'C:\\temp\\'");
        assert_eq!(Dialect::DuckDb.quote_string(r"C:\temp\"), r"'C:\temp\'");
    }

    #[test]
    fn test_backslash_values_stay_one_literal() {
        for value in [r"x\' OR 1=1 --", r"trailing\", r"\\'; DROP TABLE t; --", r"a\b'c"] {
            let sql = format!(
                "SELECT * FROM t WHERE \"name\" = {}",
                Dialect::Snowflake.quote_string(value)
            );
            assert_eq!(
                single_string_comparison(&sql, Dialect::Snowflake).unwrap(),
                ("name".to_string(), value.to_string()),
                "{sql}"
            );
        }
    }

    #[test]
    fn test_column_types() {
        assert_eq!(Dialect::Snowflake.emit_column_type(ColumnType::Variant), "VARIANT");
        assert_eq!(Dialect::DuckDb.emit_column_type(ColumnType::Variant), "JSON");
        assert_eq!(Dialect::Snowflake.emit_column_type(ColumnType::Timestamp), "TIMESTAMP_NTZ");
        assert_eq!(Dialect::DuckDb.emit_column_type(ColumnType::Integer), "BIGINT");
    }
}
