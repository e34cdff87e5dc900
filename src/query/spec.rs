//! Query spec model.
//!
//! A [`QuerySpec`] is a plain, serializable description of a single-table
//! query. Every mutation that names a column checks it against a
//! [`TableSchema`] snapshot first and fails with
//! [`QuarryError::UnknownColumn`] instead of producing a spec that cannot
//! be rendered.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::value::PredicateValue;
use crate::error::{QuarryError, Result};
use crate::sql::SortDir;
use crate::types::TableName;
use crate::warehouse::TableSchema;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=", alias = "<>")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = "LIKE", alias = "like")]
    Like,
    #[serde(rename = "IS NULL", alias = "is null")]
    IsNull,
    #[serde(rename = "IS NOT NULL", alias = "is not null")]
    IsNotNull,
    #[serde(rename = "IN", alias = "in")]
    In,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Operator::Eq,
        Operator::NotEq,
        Operator::Gt,
        Operator::Lt,
        Operator::GtEq,
        Operator::LtEq,
        Operator::Like,
        Operator::IsNull,
        Operator::IsNotNull,
        Operator::In,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::GtEq => ">=",
            Operator::LtEq => "<=",
            Operator::Like => "LIKE",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
            Operator::In => "IN",
        }
    }

    /// Whether the operator compares against a value.
    pub fn takes_value(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized == "<>" {
            return Ok(Operator::NotEq);
        }
        Operator::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| format!("unknown operator: {s}"))
    }
}

/// Logical operator joining all predicates of a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combine {
    #[default]
    #[serde(alias = "and")]
    And,
    #[serde(alias = "or")]
    Or,
}

impl FromStr for Combine {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AND" => Ok(Combine::And),
            "OR" => Ok(Combine::Or),
            _ => Err(format!("expected AND or OR, got '{s}'")),
        }
    }
}

/// `column operator value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "PredicateValue::is_none")]
    pub value: PredicateValue,
}

impl Predicate {
    pub fn new(column: impl Into<String>, operator: Operator, value: PredicateValue) -> Self {
        Self {
            column: column.into(),
            operator,
            value,
        }
    }

    /// Whether the predicate can be rendered. A value-taking operator with
    /// no value entered yet is skipped when rendering.
    pub fn is_complete(&self) -> bool {
        !self.operator.takes_value() || !self.value.is_none()
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: SortDir,
}

impl OrderBy {
    pub fn new(column: impl Into<String>, direction: SortDir) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// Structured single-table query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Fully qualified source table.
    pub table: TableName,

    /// Selected columns in order; empty selects every column.
    #[serde(default)]
    pub columns: Vec<String>,

    #[serde(default)]
    pub predicates: Vec<Predicate>,

    /// How `predicates` are joined.
    #[serde(default)]
    pub combine: Combine,

    #[serde(default)]
    pub order_by: Vec<OrderBy>,

    #[serde(default)]
    pub limit: Option<u64>,

    #[serde(default)]
    pub distinct: bool,

    /// Free-form SQL condition ANDed after the builder predicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_filter: Option<String>,
}

impl QuerySpec {
    /// `SELECT * FROM table` with nothing else set.
    pub fn new(table: TableName) -> Self {
        Self {
            table,
            columns: vec![],
            predicates: vec![],
            combine: Combine::default(),
            order_by: vec![],
            limit: None,
            distinct: false,
            custom_filter: None,
        }
    }

    fn require(&self, schema: &TableSchema, column: &str) -> Result<()> {
        if schema.has_column(column) {
            Ok(())
        } else {
            Err(QuarryError::unknown_column(column, &self.table))
        }
    }

    /// Check every column the spec references against `schema`.
    pub fn validate(&self, schema: &TableSchema) -> Result<()> {
        let referenced = self
            .columns
            .iter()
            .chain(self.predicates.iter().map(|p| &p.column))
            .chain(self.order_by.iter().map(|o| &o.column));
        for column in referenced {
            self.require(schema, column)?;
        }
        Ok(())
    }

    // =========================================================================
    // Columns
    // =========================================================================

    /// Add `column` to the selection, or remove it if already selected.
    ///
    /// Returns whether the column is selected afterwards.
    pub fn toggle_column(&mut self, schema: &TableSchema, column: &str) -> Result<bool> {
        self.require(schema, column)?;
        if let Some(pos) = self.columns.iter().position(|c| c == column) {
            self.columns.remove(pos);
            Ok(false)
        } else {
            self.columns.push(column.to_string());
            Ok(true)
        }
    }

    /// Replace the selection, in the given order.
    pub fn set_columns<I, S>(&mut self, schema: &TableSchema, columns: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut selected: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            self.require(schema, &column)?;
            if !selected.contains(&column) {
                selected.push(column);
            }
        }
        self.columns = selected;
        Ok(())
    }

    /// Select every column of the table, in table order.
    pub fn select_all(&mut self, schema: &TableSchema) -> Result<()> {
        self.set_columns(schema, schema.column_names())
    }

    /// Clear the selection. An empty selection renders as `*`.
    pub fn select_none(&mut self) {
        self.columns.clear();
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    /// Add a predicate, parsing `value` according to the column's type.
    ///
    /// Blank `value` text leaves the predicate incomplete: it is kept so it
    /// can be edited, but it does not render. Returns the index of the new
    /// predicate.
    pub fn add_predicate(
        &mut self,
        schema: &TableSchema,
        column: &str,
        operator: Operator,
        value: &str,
    ) -> Result<usize> {
        let column_type = schema
            .column_type(column)
            .ok_or_else(|| QuarryError::unknown_column(column, &self.table))?;
        let value = PredicateValue::parse(value, column_type, operator);
        self.predicates.push(Predicate::new(column, operator, value));
        Ok(self.predicates.len() - 1)
    }

    /// Remove the predicate at `index`, if there is one.
    pub fn remove_predicate(&mut self, index: usize) -> Option<Predicate> {
        (index < self.predicates.len()).then(|| self.predicates.remove(index))
    }

    pub fn clear_predicates(&mut self) {
        self.predicates.clear();
    }

    pub fn set_combine(&mut self, combine: Combine) {
        self.combine = combine;
    }

    /// Set or clear the free-form filter. Blank text clears it.
    pub fn set_custom_filter(&mut self, filter: Option<&str>) {
        self.custom_filter = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);
    }

    // =========================================================================
    // Ordering, limit, distinct
    // =========================================================================

    /// Append a sort key. Sorting by an already sorted column replaces its direction.
    pub fn add_order(&mut self, schema: &TableSchema, column: &str, direction: SortDir) -> Result<()> {
        self.require(schema, column)?;
        match self.order_by.iter_mut().find(|o| o.column == column) {
            Some(existing) => existing.direction = direction,
            None => self.order_by.push(OrderBy::new(column, direction)),
        }
        Ok(())
    }

    /// Replace the sort keys.
    pub fn set_order(&mut self, schema: &TableSchema, order_by: Vec<OrderBy>) -> Result<()> {
        for order in &order_by {
            self.require(schema, &order.column)?;
        }
        self.order_by = order_by;
        Ok(())
    }

    pub fn clear_order(&mut self) {
        self.order_by.clear();
    }

    pub fn set_limit(&mut self, limit: Option<u64>) {
        self.limit = limit;
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ColumnSchema;
    use crate::types::ColumnType;

    fn schema() -> TableSchema {
        TableSchema::new(
            TableName::new("DB", "SCH", "T"),
            vec![
                ColumnSchema::new("id", ColumnType::Integer),
                ColumnSchema::new("name", ColumnType::Text),
                ColumnSchema::new("active", ColumnType::Boolean),
            ],
        )
    }

    fn spec() -> QuerySpec {
        QuerySpec::new(TableName::new("DB", "SCH", "T"))
    }

    #[test]
    fn toggle_adds_then_removes() {
        let schema = schema();
        let mut spec = spec();
        assert!(spec.toggle_column(&schema, "name").unwrap());
        assert!(spec.toggle_column(&schema, "id").unwrap());
        assert_eq!(spec.columns, vec!["name", "id"]);
        assert!(!spec.toggle_column(&schema, "name").unwrap());
        assert_eq!(spec.columns, vec!["id"]);
    }

    #[test]
    fn unknown_columns_are_rejected_without_changes() {
        let schema = schema();
        let mut spec = spec();

        let err = spec.toggle_column(&schema, "emial").unwrap_err();
        assert_eq!(err.to_string(), "unknown column 'emial' on DB.SCH.T");

        assert!(spec
            .add_predicate(&schema, "ID", Operator::Eq, "1")
            .is_err());
        assert!(spec.add_order(&schema, "nope", SortDir::Asc).is_err());
        assert!(spec.set_columns(&schema, ["id", "nope"]).is_err());
        assert_eq!(spec, QuerySpec::new(TableName::new("DB", "SCH", "T")));
    }

    #[test]
    fn select_all_and_none() {
        let schema = schema();
        let mut spec = spec();
        spec.select_all(&schema).unwrap();
        assert_eq!(spec.columns, vec!["id", "name", "active"]);
        spec.select_none();
        assert!(spec.columns.is_empty());
    }

    #[test]
    fn predicates_are_typed_by_column() {
        let schema = schema();
        let mut spec = spec();
        let first = spec.add_predicate(&schema, "id", Operator::Gt, "5").unwrap();
        let second = spec.add_predicate(&schema, "name", Operator::Eq, "5").unwrap();
        assert_eq!((first, second), (0, 1));
        assert_eq!(spec.predicates[0].value, PredicateValue::Int(5));
        assert_eq!(spec.predicates[1].value, PredicateValue::Text("5".into()));

        let removed = spec.remove_predicate(0).unwrap();
        assert_eq!(removed.column, "id");
        assert!(spec.remove_predicate(5).is_none());
        assert_eq!(spec.predicates.len(), 1);
    }

    #[test]
    fn blank_values_leave_the_predicate_incomplete() {
        let schema = schema();
        let mut spec = spec();
        spec.add_predicate(&schema, "id", Operator::Eq, " ").unwrap();
        spec.add_predicate(&schema, "id", Operator::IsNull, "").unwrap();
        spec.add_predicate(&schema, "name", Operator::Eq, "''").unwrap();

        assert!(spec.predicates[0].value.is_none());
        assert!(!spec.predicates[0].is_complete());
        assert!(spec.predicates[1].is_complete());
        assert!(spec.predicates[2].is_complete());
    }

    #[test]
    fn reordering_a_column_replaces_its_direction() {
        let schema = schema();
        let mut spec = spec();
        spec.add_order(&schema, "id", SortDir::Asc).unwrap();
        spec.add_order(&schema, "name", SortDir::Asc).unwrap();
        spec.add_order(&schema, "id", SortDir::Desc).unwrap();
        assert_eq!(
            spec.order_by,
            vec![OrderBy::new("id", SortDir::Desc), OrderBy::new("name", SortDir::Asc)]
        );
    }

    #[test]
    fn validate_checks_deserialized_specs() {
        let spec: QuerySpec = serde_json::from_str(
            r#"{
                "table": {"database": "DB", "schema": "SCH", "table": "T"},
                "predicates": [{"column": "missing", "operator": "IS NULL"}]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            spec.validate(&schema()),
            Err(QuarryError::UnknownColumn { .. })
        ));
    }

    #[test]
    fn blank_custom_filter_clears() {
        let mut spec = spec();
        spec.set_custom_filter(Some("  amount > 10 "));
        assert_eq!(spec.custom_filter.as_deref(), Some("amount > 10"));
        spec.set_custom_filter(Some("   "));
        assert!(spec.custom_filter.is_none());
    }

    #[test]
    fn operators_parse_loosely() {
        assert_eq!("is  not null".parse::<Operator>().unwrap(), Operator::IsNotNull);
        assert_eq!("<>".parse::<Operator>().unwrap(), Operator::NotEq);
        assert_eq!("like".parse::<Operator>().unwrap(), Operator::Like);
        assert!("~".parse::<Operator>().is_err());
        assert!(!Operator::IsNull.takes_value());
    }
}
