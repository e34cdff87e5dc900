//! Shared helper functions for SQL dialect implementations.
//!
//! Reusable building blocks that dialects compose to implement the
//! `SqlDialect` trait with minimal duplication.

use super::super::token::{Token, TokenStream};
use crate::types::ColumnType;

// =============================================================================
// Identifier and Literal Quoting
// =============================================================================

/// Quote identifier with double quotes (ANSI style), doubling embedded quotes.
/// Used by: Snowflake, DuckDB
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Quote string with single quotes where `\` is also an escape character.
/// Backslashes are doubled before quotes so neither can end the literal.
/// Used by: Snowflake
pub fn quote_string_backslash(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "''"))
}

/// Format boolean as literal true/false.
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

// =============================================================================
// Data Types
// =============================================================================

/// Emit column type for Snowflake.
pub fn emit_column_type_snowflake(ty: ColumnType) -> String {
    match ty {
        ColumnType::Text => "VARCHAR".into(),
        ColumnType::Integer => "BIGINT".into(),
        ColumnType::Float => "DOUBLE".into(),
        ColumnType::Boolean => "BOOLEAN".into(),
        ColumnType::Timestamp => "TIMESTAMP_NTZ".into(),
        ColumnType::Variant => "VARIANT".into(),
    }
}

/// Emit column type for DuckDB.
pub fn emit_column_type_duckdb(ty: ColumnType) -> String {
    match ty {
        ColumnType::Text => "VARCHAR".into(),
        ColumnType::Integer => "BIGINT".into(),
        ColumnType::Float => "DOUBLE".into(),
        ColumnType::Boolean => "BOOLEAN".into(),
        ColumnType::Timestamp => "TIMESTAMP".into(),
        ColumnType::Variant => "JSON".into(),
    }
}

// =============================================================================
// Bulk Load
// =============================================================================

/// `COPY INTO <table> FROM <stage location>` reading Parquet, matching
/// columns by name.
pub fn emit_copy_into_snowflake(table: &TokenStream, location: &str) -> TokenStream {
    let mut ts = TokenStream::new();
    ts.push(Token::Copy)
        .space()
        .push(Token::Into)
        .space()
        .append(table)
        .space()
        .push(Token::From)
        .space()
        .push(Token::Raw(location.to_string()))
        .space()
        .push(Token::Raw(
            "FILE_FORMAT = (TYPE = PARQUET) MATCH_BY_COLUMN_NAME = CASE_SENSITIVE".into(),
        ));
    ts
}

/// `INSERT INTO <table> (cols) SELECT cols FROM read_parquet('<path>')`.
pub fn emit_copy_into_read_parquet(
    table: &TokenStream,
    columns: &[String],
    location: &str,
) -> TokenStream {
    let mut column_list = TokenStream::new();
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            column_list.comma().space();
        }
        column_list.push(Token::Ident(column.clone()));
    }

    let mut ts = TokenStream::new();
    ts.push(Token::Insert)
        .space()
        .push(Token::Into)
        .space()
        .append(table);
    if !columns.is_empty() {
        ts.space().lparen().append(&column_list).rparen();
    }
    ts.space().push(Token::Select).space();
    if columns.is_empty() {
        ts.push(Token::Star);
    } else {
        ts.append(&column_list);
    }
    ts.space()
        .push(Token::From)
        .space()
        .push(Token::FunctionName("read_parquet".into()))
        .lparen()
        .push(Token::LitString(location.to_string()))
        .rparen();
    ts
}
