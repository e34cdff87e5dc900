//! Test utilities for SQL emission validation.
//!
//! Validates that emitted SQL is syntactically correct by parsing it back
//! with sqlparser-rs.

use sqlparser::ast::{self, Expr, SetExpr, Statement};
use sqlparser::dialect::{DuckDbDialect, SnowflakeDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

fn parse(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Snowflake => Box::new(SnowflakeDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
    };

    Parser::parse_sql(&*parser_dialect, sql)
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}

/// Validates that a SQL string is syntactically valid for the given dialect.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    parse(sql, dialect).map(|_| ())
}

/// The WHERE expression of a single SELECT, as the dialect's parser sees it.
pub fn where_expr(sql: &str, dialect: Dialect) -> Result<Expr, String> {
    let statements = parse(sql, dialect)?;
    let [Statement::Query(query)] = statements.as_slice() else {
        return Err(format!("expected a single query: {sql}"));
    };
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(format!("expected a plain SELECT: {sql}"));
    };
    select
        .selection
        .clone()
        .ok_or_else(|| format!("no WHERE clause: {sql}"))
}

/// Column and literal of a WHERE clause that is exactly one
/// `"column" = '<string>'` comparison.
pub fn single_string_comparison(sql: &str, dialect: Dialect) -> Result<(String, String), String> {
    match where_expr(sql, dialect)? {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => match (*left, *right) {
            (Expr::Identifier(column), Expr::Value(ast::Value::SingleQuotedString(value))) => {
                Ok((column.value, value))
            }
            (left, right) => Err(format!("not a column/string comparison: {left} = {right}")),
        },
        other => Err(format!("WHERE is not a single comparison: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM users", Dialect::Snowflake).unwrap();
        validate_sql("SELECT * FROM users", Dialect::DuckDb).unwrap();
    }

    #[test]
    fn test_single_string_comparison() {
        let sql = "SELECT * FROM t WHERE \"name\" = 'it''s'";
        assert_eq!(
            single_string_comparison(sql, Dialect::DuckDb).unwrap(),
            ("name".to_string(), "it's".to_string())
        );
        assert!(single_string_comparison("SELECT * FROM t WHERE a = 'x' OR 1 = 1", Dialect::DuckDb).is_err());
    }

    #[test]
    fn test_validate_invalid_sql() {
        let result = validate_sql("SELEC * FORM users", Dialect::DuckDb);
        assert!(result.is_err());
    }
}
