//! Snowflake SQL dialect.
//!
//! Snowflake features used here:
//! - ANSI identifier quoting (`"`)
//! - Backslash escapes inside single-quoted strings
//! - VARIANT type for semi-structured data
//! - `COPY INTO` from a named stage

use super::helpers;
use super::SqlDialect;
use crate::sql::token::TokenStream;
use crate::types::ColumnType;

/// Snowflake SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Snowflake;

impl SqlDialect for Snowflake {
    fn name(&self) -> &'static str {
        "snowflake"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_backslash(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn emit_column_type(&self, ty: ColumnType) -> String {
        helpers::emit_column_type_snowflake(ty)
    }

    fn emit_copy_into(
        &self,
        table: &TokenStream,
        _columns: &[String],
        location: &str,
    ) -> TokenStream {
        helpers::emit_copy_into_snowflake(table, location)
    }
}
