//! Integration tests for building, rendering, editing, running and
//! exporting single-table queries.

use quarry::export::{export_to_vec, ExportFormat};
use quarry::ingest::{ingest, FileFormat, FileUpload, TableTarget, WriteMode};
use quarry::query::{
    render, render_checked, Combine, Operator, QuerySpec, SqlEditor,
};
use quarry::sql::{Dialect, SortDir};
use quarry::warehouse::{MemoryWarehouse, TableSchema, Warehouse};
use quarry::{QuarryError, TableName};
use serde_json::json;

const PEOPLE: &str = "id,name,city\n1,Ann,Oslo\n2,O'Neil,Lima\n3,Bob,\n4,Cy,Oslo\n";

fn loaded() -> (MemoryWarehouse, TableSchema) {
    let warehouse = MemoryWarehouse::new();
    let upload = FileUpload::new("people.csv", PEOPLE, FileFormat::Csv);
    let target = TableTarget::new(TableName::new("DB", "SCH", "PEOPLE"), WriteMode::CreateNew);
    let table = ingest(&upload, &target, &warehouse).unwrap();
    let schema = warehouse.describe_table(&table).unwrap().unwrap();
    (warehouse, schema)
}

// ============================================================================
// Rendering
// ============================================================================

#[test]
fn test_spec_from_json_renders_expected_sql() {
    let spec: QuerySpec = serde_json::from_str(
        r#"{
            "table": {"database": "DB", "schema": "SCH", "table": "T"},
            "columns": [],
            "predicates": [{"column": "id", "operator": ">", "value": 5}],
            "order_by": [{"column": "id", "direction": "ASC"}],
            "limit": 10,
            "distinct": false
        }"#,
    )
    .unwrap();

    assert_eq!(
        render(&spec, Dialect::Snowflake).sql,
        r#"SELECT * FROM "DB"."SCH"."T" WHERE "id" > 5 ORDER BY "id" ASC LIMIT 10"#
    );
}

#[test]
fn test_spec_survives_a_json_round_trip() {
    let (_, schema) = loaded();
    let mut spec = QuerySpec::new(schema.table.clone());
    spec.add_predicate(&schema, "city", Operator::In, "Oslo, Lima").unwrap();
    spec.add_predicate(&schema, "name", Operator::IsNotNull, "").unwrap();
    spec.add_order(&schema, "name", SortDir::Desc).unwrap();
    spec.set_custom_filter(Some("LENGTH(name) > 1"));

    let json = serde_json::to_string(&spec).unwrap();
    let back: QuerySpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spec);
    assert_eq!(
        render(&back, Dialect::DuckDb).sql,
        render(&spec, Dialect::DuckDb).sql
    );
}

#[test]
fn test_where_clause_presence() {
    let (_, schema) = loaded();
    let mut spec = QuerySpec::new(schema.table.clone());
    assert!(!render(&spec, Dialect::Snowflake).sql.contains("WHERE"));

    spec.add_predicate(&schema, "id", Operator::Gt, "1").unwrap();
    spec.add_predicate(&schema, "city", Operator::Eq, "Oslo").unwrap();
    let sql = render(&spec, Dialect::Snowflake).sql;
    assert!(sql.contains(r#"WHERE "id" > 1 AND "city" = 'Oslo'"#), "{sql}");

    spec.remove_predicate(0);
    spec.remove_predicate(0);
    assert!(!render(&spec, Dialect::Snowflake).sql.contains("WHERE"));
}

#[test]
fn test_unknown_column_never_reaches_render() {
    let (_, schema) = loaded();
    let mut spec = QuerySpec::new(schema.table.clone());
    let err = spec
        .add_predicate(&schema, "country", Operator::Eq, "NO")
        .unwrap_err();
    assert!(matches!(err, QuarryError::UnknownColumn { ref column, .. } if column == "country"));
    assert!(spec.predicates.is_empty());

    spec.columns.push("country".into());
    assert!(render_checked(&spec, &schema, Dialect::Snowflake).is_err());
}

// ============================================================================
// Execution
// ============================================================================

#[test]
fn test_quoted_value_is_matched_literally() {
    let (warehouse, schema) = loaded();
    let mut spec = QuerySpec::new(schema.table.clone());
    spec.add_predicate(&schema, "name", Operator::Eq, "O'Neil").unwrap();

    let result = SqlEditor::new(&spec, warehouse.dialect())
        .execute(&warehouse)
        .unwrap();
    assert_eq!(result.num_rows(), 1);
    assert_eq!(result.rows[0][0], json!(2));

    spec.clear_predicates();
    spec.add_predicate(&schema, "name", Operator::Eq, "x' OR '1'='1").unwrap();
    let result = SqlEditor::new(&spec, warehouse.dialect())
        .execute(&warehouse)
        .unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_or_distinct_order_limit() {
    let (warehouse, schema) = loaded();
    let mut spec = QuerySpec::new(schema.table.clone());
    spec.toggle_column(&schema, "city").unwrap();
    spec.add_predicate(&schema, "city", Operator::Eq, "Oslo").unwrap();
    spec.add_predicate(&schema, "city", Operator::IsNull, "").unwrap();
    spec.set_combine(Combine::Or);
    spec.set_distinct(true);
    spec.add_order(&schema, "city", SortDir::Asc).unwrap();
    spec.set_limit(Some(5));

    let result = SqlEditor::new(&spec, warehouse.dialect())
        .execute(&warehouse)
        .unwrap();
    assert_eq!(result.columns, vec!["city"]);
    assert_eq!(result.rows, vec![vec![json!("Oslo")], vec![json!(null)]]);
}

#[test]
fn test_manual_edit_then_regenerate() {
    let (warehouse, schema) = loaded();
    let mut spec = QuerySpec::new(schema.table.clone());
    let mut editor = SqlEditor::new(&spec, warehouse.dialect());

    editor.edit("SELECT nonsense");
    spec.set_limit(Some(2));
    editor.spec_changed(&spec);
    assert_eq!(editor.sql(), "SELECT nonsense");
    assert!(matches!(
        editor.execute(&warehouse),
        Err(QuarryError::ExecutionFailed { .. })
    ));

    editor.regenerate(&spec);
    assert_eq!(editor.execute(&warehouse).unwrap().num_rows(), 2);
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_export_query_result() {
    let (warehouse, schema) = loaded();
    let mut spec = QuerySpec::new(schema.table.clone());
    spec.set_columns(&schema, ["name", "city"]).unwrap();
    spec.add_order(&schema, "id", SortDir::Asc).unwrap();
    spec.set_limit(Some(3));
    let result = SqlEditor::new(&spec, warehouse.dialect())
        .execute(&warehouse)
        .unwrap();

    let csv = String::from_utf8(export_to_vec(&result, ExportFormat::Csv).unwrap()).unwrap();
    assert_eq!(csv, "name,city\nAnn,Oslo\nO'Neil,Lima\nBob,\n");

    let json: serde_json::Value =
        serde_json::from_slice(&export_to_vec(&result, ExportFormat::Json).unwrap()).unwrap();
    assert_eq!(json[2], json!({"name": "Bob", "city": null}));
}
