//! In-process warehouse.
//!
//! Tables live as Arrow batches and the stage as a map of file names to
//! bytes. Statements are interpreted structurally rather than parsed, so
//! only what the loader and the query builder emit is understood; raw SQL
//! text is answered from responses registered with
//! [`MemoryWarehouse::respond_to`]. Failure injection hooks let tests break
//! an upload, a load or a cleanup on purpose.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use arrow::array::{new_null_array, Array, ArrayRef, AsArray};
use arrow::compute::{cast, concat_batches};
use arrow::datatypes::{
    Float64Type, Int64Type, Schema, SchemaRef, TimestampMicrosecondType,
};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{ResultTable, TableSchema, Warehouse};
use crate::error::{QuarryError, Result};
use crate::ingest::ColumnSchema;
use crate::sql::{
    BinaryOperator, CopyInto, CreateTable, Dialect, DropTable, Expr, Literal, Query, SortDir,
    Statement, TableRef,
};
use crate::types::{ColumnType, TableName};

const DEFAULT_STAGE: &str = "QUARRY_STAGE";

/// A warehouse held entirely in memory.
#[derive(Debug)]
pub struct MemoryWarehouse {
    dialect: Dialect,
    stage_name: String,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    stage: BTreeMap<String, Bytes>,
    tables: BTreeMap<TableName, MemoryTable>,
    executed: Vec<String>,
    responses: HashMap<String, ResultTable>,
    fail_next_upload: Option<String>,
    fail_next_load: Option<String>,
    fail_next_remove: Option<String>,
}

#[derive(Debug, Clone)]
struct MemoryTable {
    schema: SchemaRef,
    columns: Vec<ColumnSchema>,
    batches: Vec<RecordBatch>,
}

impl MemoryTable {
    fn num_rows(&self) -> usize {
        self.batches.iter().map(RecordBatch::num_rows).sum()
    }
}

impl Default for MemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWarehouse {
    /// An empty warehouse speaking the Snowflake dialect.
    pub fn new() -> Self {
        Self {
            dialect: Dialect::Snowflake,
            stage_name: DEFAULT_STAGE.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    pub fn with_stage_name(mut self, name: impl Into<String>) -> Self {
        self.stage_name = name.into();
        self
    }

    /// Answer `sql` with `result` when it is executed as text.
    pub fn respond_to(&self, sql: impl Into<String>, result: ResultTable) {
        if let Ok(mut state) = self.state() {
            state.responses.insert(sql.into(), result);
        }
    }

    /// Make the next stage upload fail after writing part of the file.
    pub fn fail_next_upload(&self, message: impl Into<String>) {
        if let Ok(mut state) = self.state() {
            state.fail_next_upload = Some(message.into());
        }
    }

    /// Make the next bulk load fail.
    pub fn fail_next_load(&self, message: impl Into<String>) {
        if let Ok(mut state) = self.state() {
            state.fail_next_load = Some(message.into());
        }
    }

    /// Make the next stage removal fail.
    pub fn fail_next_remove(&self, message: impl Into<String>) {
        if let Ok(mut state) = self.state() {
            state.fail_next_remove = Some(message.into());
        }
    }

    /// Rows in a table, or `None` if it does not exist.
    pub fn row_count(&self, table: &TableName) -> Option<usize> {
        let state = self.state().ok()?;
        state.tables.get(table).map(MemoryTable::num_rows)
    }

    /// SQL text of every statement executed so far, in order.
    pub fn executed_sql(&self) -> Vec<String> {
        self.state()
            .map(|state| state.executed.clone())
            .unwrap_or_default()
    }

    fn state(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| QuarryError::execution("memory warehouse state is poisoned"))
    }

    fn location(&self, name: &str) -> String {
        format!("@{}/{}", self.stage_name, name)
    }

    fn staged_name<'a>(&self, location: &'a str) -> &'a str {
        location
            .strip_prefix('@')
            .and_then(|rest| rest.strip_prefix(self.stage_name.as_str()))
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(location)
    }

    fn create_table(&self, state: &mut State, create: &CreateTable) -> Result<()> {
        let name = table_name(&create.table)?;
        if state.tables.contains_key(&name) && !create.or_replace {
            return Err(QuarryError::execution(format!(
                "Object '{name}' already exists."
            )));
        }

        let table = match &create.as_query {
            Some(query) => {
                let source = query_source(state, query)?;
                if query.where_clause.is_some() || !query.select.is_empty() {
                    return Err(QuarryError::execution(
                        "memory warehouse only supports CREATE TABLE .. AS SELECT * FROM <table>",
                    ));
                }
                source.clone()
            }
            None => {
                let columns: Vec<ColumnSchema> = create
                    .columns
                    .iter()
                    .map(|c| ColumnSchema::new(c.name.clone(), c.column_type))
                    .collect();
                let fields: Vec<_> = columns
                    .iter()
                    .map(|c| c.column_type.to_field(&c.name))
                    .collect();
                MemoryTable {
                    schema: Arc::new(Schema::new(fields)),
                    columns,
                    batches: Vec::new(),
                }
            }
        };
        state.tables.insert(name, table);
        Ok(())
    }

    fn drop_table(&self, state: &mut State, drop: &DropTable) -> Result<()> {
        let name = table_name(&drop.table)?;
        if state.tables.remove(&name).is_none() && !drop.if_exists {
            return Err(QuarryError::execution(format!(
                "Table '{name}' does not exist or not authorized."
            )));
        }
        Ok(())
    }

    fn copy_into(&self, state: &mut State, copy: &CopyInto) -> Result<()> {
        if let Some(message) = state.fail_next_load.take() {
            return Err(QuarryError::execution(message));
        }

        let name = table_name(&copy.table)?;
        let file = self.staged_name(&copy.location);
        let bytes = state.stage.get(file).cloned().ok_or_else(|| {
            QuarryError::execution(format!("Remote file '{}' was not found.", copy.location))
        })?;
        let table = state.tables.get_mut(&name).ok_or_else(|| {
            QuarryError::execution(format!("Table '{name}' does not exist or not authorized."))
        })?;

        let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
            .and_then(|builder| builder.build())
            .map_err(QuarryError::execution)?;
        let mut loaded = Vec::new();
        for batch in reader {
            let batch = batch.map_err(QuarryError::execution)?;
            loaded.push(conform(&batch, &table.schema)?);
        }
        debug!(table = %name, rows = loaded.iter().map(RecordBatch::num_rows).sum::<usize>(), "loaded staged file");
        table.batches.extend(loaded);
        Ok(())
    }

    fn query(&self, state: &State, query: &Query) -> Result<ResultTable> {
        let table = query_source(state, query)?;
        let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        let rows = table_rows(table)?;

        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            let keep = match &query.where_clause {
                Some(predicate) => truthy(&eval(predicate, &row, &columns)?),
                None => true,
            };
            if keep {
                kept.push(row);
            }
        }

        // COUNT(*) alone in the select list
        if let [only] = query.select.as_slice() {
            if is_count_star(&only.expr) {
                let header = only.alias.clone().unwrap_or_else(|| "COUNT(*)".to_string());
                return Ok(ResultTable::new(
                    vec![header],
                    vec![vec![Value::from(kept.len())]],
                ));
            }
        }

        let mut header = Vec::new();
        let mut projections = Vec::new();
        if query.select.is_empty() {
            header = columns.clone();
            projections = (0..columns.len()).collect();
        }
        for item in &query.select {
            match &item.expr {
                Expr::Star => {
                    header.extend(columns.iter().cloned());
                    projections.extend(0..columns.len());
                }
                Expr::Column(name) => {
                    let index = column_index(&columns, name)?;
                    header.push(item.alias.clone().unwrap_or_else(|| name.clone()));
                    projections.push(index);
                }
                other => {
                    return Err(QuarryError::execution(format!(
                        "memory warehouse cannot project {other:?}"
                    )))
                }
            }
        }

        if !query.order_by.is_empty() {
            let mut keys = Vec::with_capacity(query.order_by.len());
            for order in &query.order_by {
                let Expr::Column(name) = &order.expr else {
                    return Err(QuarryError::execution("ORDER BY supports columns only"));
                };
                keys.push((column_index(&columns, name)?, order.dir.unwrap_or_default()));
            }
            kept.sort_by(|a, b| {
                keys.iter()
                    .map(|(i, dir)| {
                        let ord = compare_values(&a[*i], &b[*i]);
                        match dir {
                            SortDir::Asc => ord,
                            SortDir::Desc => ord.reverse(),
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        let mut projected: Vec<Vec<Value>> = kept
            .into_iter()
            .map(|row| projections.iter().map(|&i| row[i].clone()).collect())
            .collect();

        if query.distinct {
            let mut seen = HashSet::new();
            projected.retain(|row| seen.insert(Value::Array(row.clone()).to_string()));
        }
        if let Some(limit) = query.limit {
            projected.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        }

        Ok(ResultTable::new(header, projected))
    }
}

impl Warehouse for MemoryWarehouse {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn put_stage_file(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let mut state = self.state()?;
        if let Some(message) = state.fail_next_upload.take() {
            let partial = Bytes::copy_from_slice(&bytes[..bytes.len() / 2]);
            state.stage.insert(name.to_string(), partial);
            return Err(QuarryError::execution(message));
        }
        state
            .stage
            .insert(name.to_string(), Bytes::copy_from_slice(bytes));
        Ok(self.location(name))
    }

    fn list_stage_files(&self) -> Result<Vec<String>> {
        Ok(self.state()?.stage.keys().cloned().collect())
    }

    fn remove_stage_file(&self, name: &str) -> Result<bool> {
        let mut state = self.state()?;
        if let Some(message) = state.fail_next_remove.take() {
            return Err(QuarryError::execution(message));
        }
        Ok(state.stage.remove(name).is_some())
    }

    fn describe_table(&self, table: &TableName) -> Result<Option<TableSchema>> {
        let state = self.state()?;
        Ok(state
            .tables
            .get(table)
            .map(|t| TableSchema::new(table.clone(), t.columns.clone())))
    }

    fn list_tables(&self, database: &str, schema: &str) -> Result<Vec<String>> {
        let state = self.state()?;
        Ok(state
            .tables
            .keys()
            .filter(|name| name.database == database && name.schema == schema)
            .map(|name| name.table.clone())
            .collect())
    }

    fn execute(&self, sql: &str) -> Result<ResultTable> {
        let mut state = self.state()?;
        state.executed.push(sql.to_string());
        state.responses.get(sql).cloned().ok_or_else(|| {
            QuarryError::execution(format!("memory warehouse has no response for: {sql}"))
        })
    }

    fn execute_statement(&self, statement: &Statement) -> Result<ResultTable> {
        let mut state = self.state()?;
        state.executed.push(statement.to_sql(self.dialect));
        match statement {
            Statement::CreateTable(create) => {
                self.create_table(&mut state, create)?;
                Ok(ResultTable::empty())
            }
            Statement::DropTable(drop) => {
                self.drop_table(&mut state, drop)?;
                Ok(ResultTable::empty())
            }
            Statement::CopyInto(copy) => {
                self.copy_into(&mut state, copy)?;
                Ok(ResultTable::empty())
            }
            Statement::Query(query) => self.query(&state, query),
        }
    }
}

fn table_name(table: &TableRef) -> Result<TableName> {
    match (&table.database, &table.schema) {
        (Some(database), Some(schema)) => Ok(TableName::new(database, schema, &table.table)),
        _ => Err(QuarryError::execution(format!(
            "table '{}' must be fully qualified",
            table.table
        ))),
    }
}

fn query_source<'a>(state: &'a State, query: &Query) -> Result<&'a MemoryTable> {
    let from = query
        .from
        .as_ref()
        .ok_or_else(|| QuarryError::execution("query has no FROM clause"))?;
    let name = table_name(from)?;
    state.tables.get(&name).ok_or_else(|| {
        QuarryError::execution(format!("Object '{name}' does not exist or not authorized."))
    })
}

fn column_index(columns: &[String], name: &str) -> Result<usize> {
    columns
        .iter()
        .position(|c| c == name)
        .ok_or_else(|| QuarryError::execution(format!("invalid identifier '\"{name}\"'")))
}

fn is_count_star(expr: &Expr) -> bool {
    matches!(expr, Expr::Function { name, args } if name.eq_ignore_ascii_case("COUNT") && args == &[Expr::Star])
}

/// Reorder and cast a loaded batch into the table's layout, matching columns by name.
fn conform(batch: &RecordBatch, schema: &SchemaRef) -> Result<RecordBatch> {
    let arrays = schema
        .fields()
        .iter()
        .map(|field| match batch.column_by_name(field.name()) {
            Some(array) => cast(array, field.data_type()).map_err(QuarryError::execution),
            None => Ok(new_null_array(field.data_type(), batch.num_rows())),
        })
        .collect::<Result<Vec<ArrayRef>>>()?;
    RecordBatch::try_new(schema.clone(), arrays).map_err(QuarryError::execution)
}

fn table_rows(table: &MemoryTable) -> Result<Vec<Vec<Value>>> {
    let batch = concat_batches(&table.schema, &table.batches).map_err(QuarryError::execution)?;
    let rows = (0..batch.num_rows())
        .map(|row| {
            table
                .columns
                .iter()
                .zip(batch.columns())
                .map(|(column, array)| cell_value(array, row, column.column_type))
                .collect()
        })
        .collect();
    Ok(rows)
}

fn cell_value(array: &ArrayRef, row: usize, column_type: ColumnType) -> Value {
    if array.is_null(row) {
        return Value::Null;
    }
    match column_type {
        ColumnType::Integer => Value::from(array.as_primitive::<Int64Type>().value(row)),
        ColumnType::Float => Value::from(array.as_primitive::<Float64Type>().value(row)),
        ColumnType::Boolean => Value::Bool(array.as_boolean().value(row)),
        ColumnType::Timestamp => {
            let micros = array.as_primitive::<TimestampMicrosecondType>().value(row);
            DateTime::from_timestamp_micros(micros)
                .map(|dt| Value::String(dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()))
                .unwrap_or(Value::from(micros))
        }
        ColumnType::Variant => {
            let text = array.as_string::<i32>().value(row);
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
        }
        ColumnType::Text => Value::String(array.as_string::<i32>().value(row).to_string()),
    }
}

// =============================================================================
// Predicate evaluation
// =============================================================================

fn eval(expr: &Expr, row: &[Value], columns: &[String]) -> Result<Value> {
    match expr {
        Expr::Column(name) => Ok(row[column_index(columns, name)?].clone()),
        Expr::Literal(lit) => Ok(match lit {
            Literal::Int(i) => Value::from(*i),
            Literal::Float(f) => Value::from(*f),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }),
        Expr::Paren(inner) => eval(inner, row, columns),
        Expr::IsNull { expr, negated } => {
            let is_null = eval(expr, row, columns)?.is_null();
            Ok(Value::Bool(is_null != *negated))
        }
        Expr::In { expr, values } => {
            let value = eval(expr, row, columns)?;
            if value.is_null() {
                return Ok(Value::Null);
            }
            let mut found = false;
            for candidate in values {
                let candidate = eval(candidate, row, columns)?;
                if !candidate.is_null() && compare_values(&value, &candidate) == Ordering::Equal {
                    found = true;
                    break;
                }
            }
            Ok(Value::Bool(found))
        }
        Expr::BinaryOp { left, op, right } => {
            let left = eval(left, row, columns)?;
            let right = eval(right, row, columns)?;
            Ok(match op {
                BinaryOperator::And => Value::Bool(truthy(&left) && truthy(&right)),
                BinaryOperator::Or => Value::Bool(truthy(&left) || truthy(&right)),
                _ if left.is_null() || right.is_null() => Value::Null,
                BinaryOperator::Like => Value::Bool(like(&left, &right)?),
                comparison => {
                    let ord = compare_values(&left, &right);
                    Value::Bool(match comparison {
                        BinaryOperator::Eq => ord == Ordering::Equal,
                        BinaryOperator::Ne => ord != Ordering::Equal,
                        BinaryOperator::Lt => ord == Ordering::Less,
                        BinaryOperator::Gt => ord == Ordering::Greater,
                        BinaryOperator::Lte => ord != Ordering::Greater,
                        BinaryOperator::Gte => ord != Ordering::Less,
                        _ => false,
                    })
                }
            })
        }
        Expr::Function { .. } | Expr::NamedArg { .. } | Expr::Star | Expr::Raw(_) => Err(QuarryError::execution(format!(
            "memory warehouse cannot evaluate {expr:?}"
        ))),
    }
}

fn truthy(value: &Value) -> bool {
    matches!(value, Value::Bool(true))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Total order over result values; nulls sort last.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

fn like(value: &Value, pattern: &Value) -> Result<bool> {
    let text = super::display_value(value);
    let pattern = super::display_value(pattern);
    let mut regex = String::from("(?s)^");
    for ch in pattern.chars() {
        match ch {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    let regex = Regex::new(&regex).map_err(QuarryError::execution)?;
    Ok(regex.is_match(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{col, count_star, lit_int, lit_str, ExprExt, OrderByExpr, SelectExpr};
    use crate::ingest::{ingest, FileFormat, FileUpload, TableTarget, WriteMode};
    use serde_json::json;

    fn users() -> (MemoryWarehouse, TableName) {
        let warehouse = MemoryWarehouse::new();
        let upload = FileUpload::new(
            "users.csv",
            "id,name,score\n1,ann,2.5\n2,bob,\n3,o'neil,1.0\n",
            FileFormat::Csv,
        );
        let target = TableTarget::from_file_name("DB", "RAW", &upload.name, WriteMode::CreateNew);
        let table = ingest(&upload, &target, &warehouse).unwrap();
        (warehouse, table)
    }

    fn run(warehouse: &MemoryWarehouse, query: Query) -> ResultTable {
        warehouse.execute_statement(&query.into()).unwrap()
    }

    #[test]
    fn select_star_returns_typed_values() {
        let (warehouse, table) = users();
        let result = run(&warehouse, Query::new().from(table.to_table_ref()));
        assert_eq!(result.columns, vec!["id", "name", "score"]);
        assert_eq!(result.rows[0], vec![json!(1), json!("ann"), json!(2.5)]);
        assert_eq!(result.rows[1][2], Value::Null);
    }

    #[test]
    fn where_order_limit() {
        let (warehouse, table) = users();
        let query = Query::new()
            .select(vec![col("name")])
            .from(table.to_table_ref())
            .filter(col("id").binary(BinaryOperator::Gte, lit_int(2)))
            .order_by(vec![OrderByExpr::desc(col("id"))])
            .limit(1);
        let result = run(&warehouse, query);
        assert_eq!(result.rows, vec![vec![json!("o'neil")]]);
    }

    #[test]
    fn quoted_literal_matches_as_a_value() {
        let (warehouse, table) = users();
        let query = Query::new()
            .from(table.to_table_ref())
            .filter(col("name").eq(lit_str("o'neil")));
        assert_eq!(run(&warehouse, query).num_rows(), 1);

        let query = Query::new()
            .from(table.to_table_ref())
            .filter(col("name").like("%'%"));
        assert_eq!(run(&warehouse, query).num_rows(), 1);
    }

    #[test]
    fn count_star_with_alias() {
        let (warehouse, table) = users();
        let query = Query::new()
            .select(vec![SelectExpr::new(count_star()).with_alias("ROW_COUNT")])
            .from(table.to_table_ref())
            .filter(col("score").is_not_null());
        let result = run(&warehouse, query);
        assert_eq!(result.columns, vec!["ROW_COUNT"]);
        assert_eq!(result.scalar(), Some(&json!(2)));
    }

    #[test]
    fn unknown_column_is_an_execution_error() {
        let (warehouse, table) = users();
        let query = Query::new().select(vec![col("emial")]).from(table.to_table_ref());
        let err = warehouse.execute_statement(&query.into()).unwrap_err();
        assert!(matches!(err, QuarryError::ExecutionFailed { .. }));
    }

    #[test]
    fn raw_sql_uses_registered_responses() {
        let warehouse = MemoryWarehouse::new();
        let result = ResultTable::new(vec!["X".into()], vec![vec![json!(1)]]);
        warehouse.respond_to("SELECT 1 AS X", result.clone());
        assert_eq!(warehouse.execute("SELECT 1 AS X").unwrap(), result);
        assert!(warehouse.execute("SELECT 2").is_err());
        assert_eq!(warehouse.executed_sql(), vec!["SELECT 1 AS X", "SELECT 2"]);
    }

    #[test]
    fn stage_locations_resolve_back_to_files() {
        let warehouse = MemoryWarehouse::new().with_stage_name("LANDING");
        let location = warehouse.put_stage_file("a.parquet", b"x").unwrap();
        assert_eq!(location, "@LANDING/a.parquet");
        assert_eq!(warehouse.staged_name(&location), "a.parquet");
        assert!(warehouse.remove_stage_file("a.parquet").unwrap());
        assert!(!warehouse.remove_stage_file("a.parquet").unwrap());
    }
}
