//! Helper queries for browsing a table before building a spec.
//!
//! Row counts and distinct samples are plain SELECTs. Table and column
//! descriptions come from the warehouse's generative functions and are
//! best effort: when the warehouse cannot produce them they are empty.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{QuarryError, Result};
use crate::sql::{
    col, count_star, func, lit_str, named_arg, Dialect, ExprExt, Query, SelectExpr, Statement,
};
use crate::types::{ColumnType, TableName};
use crate::warehouse::{TableSchema, Warehouse};

/// Alias of the row count column.
pub const ROW_COUNT_ALIAS: &str = "ROW_COUNT";

/// `SELECT COUNT(*) AS "ROW_COUNT" FROM <table>`
pub fn count_rows_query(table: &TableName) -> Query {
    Query::new()
        .select(vec![SelectExpr::new(count_star()).with_alias(ROW_COUNT_ALIAS)])
        .from(table.to_table_ref())
}

pub fn count_rows_sql(table: &TableName, dialect: Dialect) -> String {
    count_rows_query(table).to_sql(dialect)
}

/// Up to `limit` distinct non-null values of `column`.
pub fn distinct_sample_query(schema: &TableSchema, column: &str, limit: u64) -> Result<Query> {
    if !schema.has_column(column) {
        return Err(QuarryError::unknown_column(column, &schema.table));
    }
    Ok(Query::new()
        .distinct()
        .select(vec![col(column)])
        .from(schema.table.to_table_ref())
        .filter(col(column).is_not_null())
        .limit(limit))
}

pub fn distinct_sample_sql(
    schema: &TableSchema,
    column: &str,
    limit: u64,
    dialect: Dialect,
) -> Result<String> {
    Ok(distinct_sample_query(schema, column, limit)?.to_sql(dialect))
}

/// Number of rows in `table`.
pub fn row_count(warehouse: &dyn Warehouse, table: &TableName) -> Result<u64> {
    let result = warehouse.execute_statement(&Statement::Query(count_rows_query(table)))?;
    result
        .scalar()
        .and_then(Value::as_u64)
        .ok_or_else(|| QuarryError::execution(format!("row count of {table} was not a number")))
}

/// Distinct non-null values of `column`, for filling in predicate values.
pub fn distinct_values(
    warehouse: &dyn Warehouse,
    schema: &TableSchema,
    column: &str,
    limit: u64,
) -> Result<Vec<Value>> {
    let query = distinct_sample_query(schema, column, limit)?;
    let result = warehouse.execute_statement(&Statement::Query(query))?;
    Ok(result
        .rows
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .collect())
}

// =============================================================================
// Descriptions
// =============================================================================

const TABLE_DESC_FUNCTION: &str = "SNOWFLAKE.CORTEX.AI_GENERATE_TABLE_DESC";
const COMPLETE_FUNCTION: &str = "SNOWFLAKE.CORTEX.COMPLETE";
const COMPLETE_MODEL: &str = "claude-3-5-sonnet";

/// Distinct sample values shown per column.
pub const SAMPLE_VALUES: u64 = 3;
/// Sample values longer than this many characters are cut.
pub const SAMPLE_MAX_CHARS: usize = 30;

/// Generated description of a table and its columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescription {
    #[serde(rename = "table_description", default)]
    pub table: String,
    #[serde(rename = "column_descriptions", default)]
    pub columns: BTreeMap<String, String>,
}

impl TableDescription {
    /// Parse the JSON object embedded in `text`. Prose around the object,
    /// as text completion tends to add, is ignored.
    pub fn parse(text: &str) -> Option<Self> {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if end < start {
            return None;
        }
        serde_json::from_str(&text[start..=end]).ok()
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Self::parse(text),
            Value::Object(_) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }

    /// Description of `column`, or `""`.
    pub fn column(&self, column: &str) -> &str {
        self.columns.get(column).map(String::as_str).unwrap_or_default()
    }
}

/// `SELECT SNOWFLAKE.CORTEX.AI_GENERATE_TABLE_DESC(TABLE_NAME => '<fqn>')`
///
/// The name is passed as a string literal holding the quoted three-part name.
pub fn table_description_query(table: &TableName, dialect: Dialect) -> Query {
    let name = table.to_table_ref().to_tokens().serialize(dialect);
    Query::new().select(vec![func(
        TABLE_DESC_FUNCTION,
        vec![named_arg("table_name", lit_str(&name))],
    )])
}

pub fn table_description_sql(table: &TableName, dialect: Dialect) -> String {
    table_description_query(table, dialect).to_sql(dialect)
}

/// Text completion asking for the same JSON shape as the table description function.
pub fn complete_description_query(schema: &TableSchema) -> Query {
    Query::new().select(vec![func(
        COMPLETE_FUNCTION,
        vec![lit_str(COMPLETE_MODEL), lit_str(&description_prompt(schema))],
    )])
}

pub fn complete_description_sql(schema: &TableSchema, dialect: Dialect) -> String {
    complete_description_query(schema).to_sql(dialect)
}

fn description_prompt(schema: &TableSchema) -> String {
    let columns = schema
        .columns
        .iter()
        .map(|c| format!("{} ({})", c.name, c.column_type))
        .collect::<Vec<_>>()
        .join(", ");
    let names = Value::from(schema.column_names()).to_string();
    format!(
        "You are a database expert. Describe the table below.\n\n\
         Table: {table}\n\
         Columns: {columns}\n\n\
         Answer with a single JSON object covering every column:\n\
         {{\"table_description\": \"what the table is for, in one or two sentences\", \
         \"column_descriptions\": {{\"<column>\": \"what the column holds\"}}}}\n\n\
         Column names: {names}",
        table = schema.table.table,
    )
}

/// Generated description of `schema`'s table, or `None` when the warehouse
/// cannot produce one. The table description function is tried first, then
/// text completion.
pub fn table_description(warehouse: &dyn Warehouse, schema: &TableSchema) -> Option<TableDescription> {
    let dialect = warehouse.dialect();
    [
        table_description_sql(&schema.table, dialect),
        complete_description_sql(schema, dialect),
    ]
    .iter()
    .find_map(|sql| match warehouse.execute(sql) {
        Ok(result) => {
            let parsed = result.scalar().and_then(TableDescription::from_value);
            if parsed.is_none() {
                debug!(table = %schema.table, "description response held no JSON object");
            }
            parsed
        }
        Err(e) => {
            debug!(table = %schema.table, error = %e, "description unavailable");
            None
        }
    })
}

/// One column of a [`TableOverview`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnOverview {
    pub name: String,
    pub column_type: ColumnType,
    /// Generated description, empty when none is available.
    pub description: String,
    /// Up to [`SAMPLE_VALUES`] distinct non-null values, each cut to
    /// [`SAMPLE_MAX_CHARS`] characters.
    pub samples: Vec<String>,
}

/// A table's description with its columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableOverview {
    pub table: TableName,
    pub description: String,
    pub columns: Vec<ColumnOverview>,
}

/// Name, type, description and sample values of every column of `schema`.
///
/// Never fails: descriptions are empty when they cannot be generated, and a
/// column whose samples cannot be read has none.
pub fn describe_columns(warehouse: &dyn Warehouse, schema: &TableSchema) -> TableOverview {
    let description = table_description(warehouse, schema).unwrap_or_default();

    let columns = schema
        .columns
        .iter()
        .map(|column| {
            let samples = match distinct_values(warehouse, schema, &column.name, SAMPLE_VALUES) {
                Ok(values) => values.iter().map(sample_text).collect(),
                Err(e) => {
                    warn!(table = %schema.table, column = %column.name, error = %e, "could not sample column");
                    vec![]
                }
            };
            ColumnOverview {
                name: column.name.clone(),
                column_type: column.column_type,
                description: description.column(&column.name).to_string(),
                samples,
            }
        })
        .collect();

    TableOverview {
        table: schema.table.clone(),
        description: description.table,
        columns,
    }
}

fn sample_text(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    text.chars().take(SAMPLE_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{ingest, FileFormat, FileUpload, TableTarget, WriteMode};
    use crate::sql::test_utils::validate_sql;
    use crate::warehouse::{MemoryWarehouse, ResultTable};
    use insta::assert_snapshot;
    use serde_json::json;

    fn loaded() -> (MemoryWarehouse, TableSchema) {
        let warehouse = MemoryWarehouse::new();
        let upload = FileUpload::new(
            "cities.csv",
            "city,pop\nOslo,1\nLima,2\nOslo,3\n,4\n",
            FileFormat::Csv,
        );
        let target = TableTarget::from_file_name("DB", "RAW", &upload.name, WriteMode::CreateNew);
        let table = ingest(&upload, &target, &warehouse).unwrap();
        let schema = warehouse.describe_table(&table).unwrap().unwrap();
        (warehouse, schema)
    }

    #[test]
    fn count_rows_sql_is_qualified() {
        let sql = count_rows_sql(&TableName::new("DB", "RAW", "CITIES"), Dialect::Snowflake);
        assert_snapshot!(sql, @r#"SELECT COUNT(*) AS "ROW_COUNT" FROM "DB"."RAW"."CITIES""#);
        validate_sql(&sql, Dialect::Snowflake).unwrap();
    }

    #[test]
    fn distinct_sample_sql_skips_nulls() {
        let (_, schema) = loaded();
        let sql = distinct_sample_sql(&schema, "city", 20, Dialect::DuckDb).unwrap();
        assert_snapshot!(sql, @r#"SELECT DISTINCT "city" FROM "DB"."RAW"."CITIES" WHERE "city" IS NOT NULL LIMIT 20"#);
        validate_sql(&sql, Dialect::DuckDb).unwrap();
        assert!(distinct_sample_sql(&schema, "country", 20, Dialect::DuckDb).is_err());
    }

    fn description_response(text: &str) -> ResultTable {
        ResultTable::new(vec!["DESCRIPTION".into()], vec![vec![json!(text)]])
    }

    #[test]
    fn table_description_sql_passes_the_name_as_a_literal() {
        let sql = table_description_sql(&TableName::new("DB", "RAW", "O'Brien"), Dialect::Snowflake);
        assert_snapshot!(sql, @r#"SELECT SNOWFLAKE.CORTEX.AI_GENERATE_TABLE_DESC(TABLE_NAME => '"DB"."RAW"."O''Brien"')"#);
        validate_sql(&sql, Dialect::Snowflake).unwrap();
    }

    #[test]
    fn completion_prompt_is_one_literal() {
        let (_, schema) = loaded();
        let sql = complete_description_sql(&schema, Dialect::Snowflake);
        assert!(sql.starts_with("SELECT SNOWFLAKE.CORTEX.COMPLETE('claude-3-5-sonnet', 'You are"));
        assert!(sql.contains(r#"Columns: city (text), pop (integer)"#), "{sql}");
        validate_sql(&sql, Dialect::Snowflake).unwrap();
    }

    #[test]
    fn description_json_is_found_inside_prose() {
        let parsed = TableDescription::parse(
            "Sure:\n{\"table_description\": \"Cities\", \"column_descriptions\": {\"city\": \"Name\"}}\nDone.",
        )
        .unwrap();
        assert_eq!(parsed.table, "Cities");
        assert_eq!(parsed.column("city"), "Name");
        assert_eq!(parsed.column("pop"), "");
        assert!(TableDescription::parse("no json here").is_none());
        assert!(TableDescription::parse("} {").is_none());
    }

    #[test]
    fn describe_columns_merges_descriptions_and_samples() {
        let (warehouse, schema) = loaded();
        warehouse.respond_to(
            table_description_sql(&schema.table, warehouse.dialect()),
            description_response(
                r#"{"table_description": "City populations", "column_descriptions": {"city": "City name", "pop": "Population"}}"#,
            ),
        );

        let overview = describe_columns(&warehouse, &schema);
        assert_eq!(overview.description, "City populations");
        assert_eq!(overview.columns[0].name, "city");
        assert_eq!(overview.columns[0].description, "City name");
        assert_eq!(overview.columns[0].samples, vec!["Oslo", "Lima"]);
        assert_eq!(overview.columns[1].column_type, ColumnType::Integer);
        assert_eq!(overview.columns[1].samples, vec!["1", "2", "3"]);
    }

    #[test]
    fn completion_is_the_fallback() {
        let (warehouse, schema) = loaded();
        warehouse.respond_to(
            complete_description_sql(&schema, warehouse.dialect()),
            description_response(
                "Here you go: {\"table_description\": \"Cities\", \"column_descriptions\": {\"pop\": \"People\"}}",
            ),
        );

        let overview = describe_columns(&warehouse, &schema);
        assert_eq!(overview.description, "Cities");
        assert_eq!(overview.columns[0].description, "");
        assert_eq!(overview.columns[1].description, "People");
    }

    #[test]
    fn descriptions_degrade_to_empty() {
        let (warehouse, schema) = loaded();
        warehouse.respond_to(
            table_description_sql(&schema.table, warehouse.dialect()),
            description_response("the model is busy"),
        );

        assert!(table_description(&warehouse, &schema).is_none());
        let overview = describe_columns(&warehouse, &schema);
        assert_eq!(overview.description, "");
        assert!(overview.columns.iter().all(|c| c.description.is_empty()));
        assert_eq!(overview.columns[0].samples, vec!["Oslo", "Lima"]);
    }

    #[test]
    fn long_samples_are_cut() {
        let warehouse = MemoryWarehouse::new();
        let long = "ä".repeat(40);
        let upload = FileUpload::new("notes.csv", format!("note\n{long}\n"), FileFormat::Csv);
        let target = TableTarget::from_file_name("DB", "RAW", &upload.name, WriteMode::CreateNew);
        let table = ingest(&upload, &target, &warehouse).unwrap();
        let schema = warehouse.describe_table(&table).unwrap().unwrap();

        let overview = describe_columns(&warehouse, &schema);
        assert_eq!(overview.columns[0].samples, vec!["ä".repeat(SAMPLE_MAX_CHARS)]);
    }

    #[test]
    fn helpers_run_against_the_warehouse() {
        let (warehouse, schema) = loaded();
        assert_eq!(row_count(&warehouse, &schema.table).unwrap(), 4);
        assert_eq!(
            distinct_values(&warehouse, &schema, "city", 10).unwrap(),
            vec![json!("Oslo"), json!("Lima")]
        );
    }
}
