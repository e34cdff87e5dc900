//! SQL generation module.
//!
//! A type-safe SQL builder that renders to Snowflake or DuckDB:
//!
//! - [`query`] - single-table SELECT builder
//! - [`expr`] - expression AST and builder DSL
//! - [`ddl`] - CREATE TABLE, DROP TABLE
//! - [`dml`] - bulk load from a staged file
//! - [`token`] - token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod ddl;
pub mod dialect;
pub mod dml;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types at the sql module level
pub use ddl::{ColumnDef, CreateTable, DropTable};
pub use dialect::{Dialect, SqlDialect};
pub use dml::CopyInto;
pub use expr::{
    col, count_star, func, lit_int, lit_str, named_arg, star, BinaryOperator, Expr, ExprExt, Literal,
};
pub use query::{OrderByExpr, Query, SelectExpr, SortDir, TableRef};
pub use token::{Token, TokenStream};

/// A statement the loader or the query builder hands to a warehouse.
///
/// Warehouses that understand structure (the in-memory one) can interpret
/// the variant directly; the rest execute [`Statement::to_sql`].
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    DropTable(DropTable),
    CopyInto(CopyInto),
    Query(Query),
}

impl Statement {
    /// Convert to SQL for the given dialect.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        self.to_tokens(dialect).serialize(dialect)
    }

    /// Convert to token stream.
    pub fn to_tokens(&self, dialect: Dialect) -> TokenStream {
        match self {
            Statement::CreateTable(ct) => ct.to_tokens(dialect),
            Statement::DropTable(dt) => dt.to_tokens(dialect),
            Statement::CopyInto(ci) => ci.to_tokens(dialect),
            Statement::Query(q) => q.to_tokens(dialect),
        }
    }
}

impl From<CreateTable> for Statement {
    fn from(ct: CreateTable) -> Self {
        Statement::CreateTable(ct)
    }
}

impl From<DropTable> for Statement {
    fn from(dt: DropTable) -> Self {
        Statement::DropTable(dt)
    }
}

impl From<CopyInto> for Statement {
    fn from(ci: CopyInto) -> Self {
        Statement::CopyInto(ci)
    }
}

impl From<Query> for Statement {
    fn from(q: Query) -> Self {
        Statement::Query(q)
    }
}
