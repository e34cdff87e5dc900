//! DDL (Data Definition Language) support.
//!
//! Builders for the CREATE and DROP TABLE statements the loader issues. Table names
//! are always carried as a [`TableRef`] so the emitted statement is fully
//! qualified.
//!
//! # Examples
//!
//! ```
//! use quarry::sql::{ColumnDef, CreateTable, Dialect, TableRef};
//! use quarry::types::ColumnType;
//!
//! let table = CreateTable::new(TableRef::qualified("DB", "RAW", "USERS"))
//!     .or_replace()
//!     .column(ColumnDef::new("id", ColumnType::Integer))
//!     .column(ColumnDef::new("name", ColumnType::Text));
//!
//! assert_eq!(
//!     table.to_sql(Dialect::Snowflake),
//!     r#"CREATE OR REPLACE TABLE "DB"."RAW"."USERS" ("id" BIGINT, "name" VARCHAR)"#
//! );
//! ```

use super::dialect::{Dialect, SqlDialect};
use super::query::{Query, TableRef};
use super::token::{Token, TokenStream};
use crate::types::ColumnType;

// ============================================================================
// CREATE TABLE
// ============================================================================

/// CREATE TABLE statement.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct CreateTable {
    pub or_replace: bool,
    pub table: TableRef,
    pub columns: Vec<ColumnDef>,
    pub as_query: Option<Box<Query>>,
}

impl CreateTable {
    /// Create a new CREATE TABLE statement.
    pub fn new(table: TableRef) -> Self {
        Self {
            or_replace: false,
            table,
            columns: vec![],
            as_query: None,
        }
    }

    /// Emit `CREATE OR REPLACE TABLE`.
    pub fn or_replace(mut self) -> Self {
        self.or_replace = true;
        self
    }

    /// Add a column definition.
    pub fn column(mut self, col: ColumnDef) -> Self {
        self.columns.push(col);
        self
    }

    /// Add multiple column definitions.
    pub fn columns(mut self, cols: impl IntoIterator<Item = ColumnDef>) -> Self {
        self.columns.extend(cols);
        self
    }

    /// Create table from a SELECT query (CREATE TABLE AS SELECT).
    pub fn as_select(mut self, query: Query) -> Self {
        self.as_query = Some(Box::new(query));
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();

        ts.push(Token::Create);
        if self.or_replace && dialect.supports_create_or_replace() {
            ts.space().push(Token::Or).space().push(Token::Replace);
        }
        ts.space().push(Token::Table).space();
        ts.append(&self.table.to_tokens());

        // AS SELECT or column definitions
        if let Some(query) = &self.as_query {
            ts.space().push(Token::As).space();
            ts.append(&query.to_tokens(dialect));
        } else {
            ts.space().lparen();
            for (i, col) in self.columns.iter().enumerate() {
                if i > 0 {
                    ts.comma().space();
                }
                ts.append(&col.to_tokens(dialect));
            }
            ts.rparen();
        }

        ts
    }
}

// ============================================================================
// DROP TABLE
// ============================================================================

/// DROP TABLE statement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "DDL statements have no effect until converted to SQL with to_sql()"]
pub struct DropTable {
    pub if_exists: bool,
    pub table: TableRef,
}

impl DropTable {
    /// Create a new DROP TABLE statement.
    pub fn new(table: TableRef) -> Self {
        Self {
            if_exists: false,
            table,
        }
    }

    /// Add IF EXISTS clause.
    pub fn if_exists(mut self) -> Self {
        self.if_exists = true;
        self
    }

    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, _dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Drop).space().push(Token::Table);
        if self.if_exists {
            ts.space().push(Token::If).space().push(Token::Exists);
        }
        ts.space();
        ts.append(&self.table.to_tokens());
        ts
    }
}

/// Column definition for CREATE TABLE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDef {
    /// Create a new column definition.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Ident(self.name.clone()))
            .space()
            .push(Token::Raw(dialect.emit_column_type(self.column_type)));
        ts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::test_utils::validate_sql;
    use insta::assert_snapshot;

    fn users() -> CreateTable {
        CreateTable::new(TableRef::qualified("DB", "RAW", "USERS")).columns([
            ColumnDef::new("id", ColumnType::Integer),
            ColumnDef::new("name", ColumnType::Text),
            ColumnDef::new("score", ColumnType::Float),
            ColumnDef::new("active", ColumnType::Boolean),
            ColumnDef::new("seen_at", ColumnType::Timestamp),
            ColumnDef::new("payload", ColumnType::Variant),
        ])
    }

    #[test]
    fn create_table_snowflake() {
        let sql = users().to_sql(Dialect::Snowflake);
        assert_snapshot!(sql, @r#"CREATE TABLE "DB"."RAW"."USERS" ("id" BIGINT, "name" VARCHAR, "score" DOUBLE, "active" BOOLEAN, "seen_at" TIMESTAMP_NTZ, "payload" VARIANT)"#);
        validate_sql(&sql, Dialect::Snowflake).unwrap();
    }

    #[test]
    fn create_or_replace_duckdb() {
        let sql = users().or_replace().to_sql(Dialect::DuckDb);
        assert_snapshot!(sql, @r#"CREATE OR REPLACE TABLE "DB"."RAW"."USERS" ("id" BIGINT, "name" VARCHAR, "score" DOUBLE, "active" BOOLEAN, "seen_at" TIMESTAMP, "payload" JSON)"#);
        validate_sql(&sql, Dialect::DuckDb).unwrap();
    }

    #[test]
    fn create_table_as_select() {
        let scratch = TableRef::qualified("DB", "RAW", "TMP_QUARRY_1");
        let sql = CreateTable::new(TableRef::qualified("DB", "RAW", "USERS"))
            .or_replace()
            .as_select(Query::new().from(scratch))
            .to_sql(Dialect::Snowflake);
        assert_snapshot!(sql, @r#"CREATE OR REPLACE TABLE "DB"."RAW"."USERS" AS SELECT * FROM "DB"."RAW"."TMP_QUARRY_1""#);
        validate_sql(&sql, Dialect::Snowflake).unwrap();
    }

    #[test]
    fn drop_table_if_exists() {
        let sql = DropTable::new(TableRef::qualified("DB", "RAW", "TMP_QUARRY_1"))
            .if_exists()
            .to_sql(Dialect::DuckDb);
        assert_eq!(sql, r#"DROP TABLE IF EXISTS "DB"."RAW"."TMP_QUARRY_1""#);
        validate_sql(&sql, Dialect::DuckDb).unwrap();
    }

    #[test]
    fn column_name_with_quote_is_escaped() {
        let sql = CreateTable::new(TableRef::new("t"))
            .column(ColumnDef::new("we\"ird", ColumnType::Text))
            .to_sql(Dialect::DuckDb);
        assert_eq!(sql, "CREATE TABLE \"t\" (\"we\"\"ird\" VARCHAR)");
    }
}
