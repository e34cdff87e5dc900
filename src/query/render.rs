//! QuerySpec to SQL.
//!
//! Rendering is deterministic: the same spec always yields byte-identical
//! SQL. Clauses are emitted in a fixed order and omitted entirely when
//! empty (no `WHERE 1=1`, `*` for an empty selection). Predicates still
//! waiting for a value are left out.

use super::spec::{Combine, Operator, Predicate, QuerySpec};
use crate::error::Result;
use crate::sql::{col, BinaryOperator, Dialect, Expr, ExprExt, OrderByExpr, Query, SortDir};
use crate::warehouse::TableSchema;

/// SQL text rendered from a spec snapshot, together with the statement it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub query: Query,
    pub dialect: Dialect,
}

impl std::fmt::Display for RenderedQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Render `spec` as SQL for `dialect`.
///
/// Column references are not checked here; see [`render_checked`].
pub fn render(spec: &QuerySpec, dialect: Dialect) -> RenderedQuery {
    let query = to_query(spec);
    RenderedQuery {
        sql: query.to_sql(dialect),
        query,
        dialect,
    }
}

/// Validate `spec` against `schema`, then render it.
pub fn render_checked(spec: &QuerySpec, schema: &TableSchema, dialect: Dialect) -> Result<RenderedQuery> {
    spec.validate(schema)?;
    Ok(render(spec, dialect))
}

/// Build the SELECT statement for `spec`.
pub fn to_query(spec: &QuerySpec) -> Query {
    let mut query = Query::new()
        .select(spec.columns.iter().map(|c| col(c)).collect::<Vec<_>>())
        .from(spec.table.to_table_ref());

    if spec.distinct {
        query = query.distinct();
    }

    query.where_clause = where_clause(spec);

    query = query.order_by(
        spec.order_by
            .iter()
            .map(|o| match o.direction {
                SortDir::Asc => OrderByExpr::asc(col(&o.column)),
                SortDir::Desc => OrderByExpr::desc(col(&o.column)),
            })
            .collect(),
    );

    if let Some(limit) = spec.limit {
        query = query.limit(limit);
    }
    query
}

fn where_clause(spec: &QuerySpec) -> Option<Expr> {
    let op = match spec.combine {
        Combine::And => BinaryOperator::And,
        Combine::Or => BinaryOperator::Or,
    };
    let builder = Expr::join_all(
        spec.predicates
            .iter()
            .filter(|p| p.is_complete())
            .map(predicate_expr)
            .collect(),
        op,
    );
    let custom = spec
        .custom_filter
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(|f| Expr::Raw(f.to_string()));

    match (builder, custom) {
        (Some(builder), Some(custom)) => Some(builder.paren().and(custom.paren())),
        (builder, custom) => builder.or(custom),
    }
}

fn predicate_expr(predicate: &Predicate) -> Expr {
    let column = col(&predicate.column);
    let value = || predicate.value.to_expr();
    match predicate.operator {
        Operator::Eq => column.binary(BinaryOperator::Eq, value()),
        Operator::NotEq => column.binary(BinaryOperator::Ne, value()),
        Operator::Gt => column.binary(BinaryOperator::Gt, value()),
        Operator::Lt => column.binary(BinaryOperator::Lt, value()),
        Operator::GtEq => column.binary(BinaryOperator::Gte, value()),
        Operator::LtEq => column.binary(BinaryOperator::Lte, value()),
        Operator::Like => column.like(value()),
        Operator::IsNull => column.is_null(),
        Operator::IsNotNull => column.is_not_null(),
        Operator::In => column.in_list(predicate.value.to_exprs()),
    }
}
