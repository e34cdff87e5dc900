//! Embedded DuckDB warehouse.
//!
//! The stage is a local directory; staged Parquet files are loaded with
//! `read_parquet`. The database part of a three-part name is a DuckDB
//! catalog: `memory` for an in-memory database, the file stem for a
//! database file, or anything attached with [`DuckDbWarehouse::attach`].

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::{params, Connection};
use serde_json::Value;
use tracing::debug;

use super::{ResultTable, TableSchema, Warehouse};
use crate::error::{QuarryError, Result};
use crate::ingest::ColumnSchema;
use crate::sql::{Dialect, SqlDialect, Statement};
use crate::types::{ColumnType, TableName};

/// DuckDB database plus a directory acting as its stage.
pub struct DuckDbWarehouse {
    /// Path to the database file (None for in-memory)
    db_path: Option<PathBuf>,
    stage_dir: PathBuf,
    connection: Mutex<Connection>,
}

impl DuckDbWarehouse {
    /// Open (or create) a database file.
    pub fn open(db_path: impl AsRef<Path>, stage_dir: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let connection = Connection::open(&path)
            .map_err(|e| QuarryError::execution(format!("failed to open DuckDB: {e}")))?;
        Self::with_connection(Some(path), stage_dir.as_ref(), connection)
    }

    /// An in-memory database; its catalog is named `memory`.
    pub fn in_memory(stage_dir: impl AsRef<Path>) -> Result<Self> {
        let connection = Connection::open_in_memory()
            .map_err(|e| QuarryError::execution(format!("failed to open DuckDB: {e}")))?;
        Self::with_connection(None, stage_dir.as_ref(), connection)
    }

    fn with_connection(db_path: Option<PathBuf>, stage_dir: &Path, connection: Connection) -> Result<Self> {
        fs::create_dir_all(stage_dir)?;
        Ok(Self {
            db_path,
            stage_dir: stage_dir.to_path_buf(),
            connection: Mutex::new(connection),
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub fn stage_dir(&self) -> &Path {
        &self.stage_dir
    }

    /// Attach another database file under catalog `name`.
    pub fn attach(&self, name: &str, path: impl AsRef<Path>) -> Result<()> {
        let dialect = self.dialect().dialect();
        let sql = format!(
            "ATTACH {} AS {}",
            dialect.quote_string(&path.as_ref().to_string_lossy()),
            dialect.quote_identifier(name)
        );
        self.execute_batch(&sql)
    }

    /// Catalog statements land in when they are not qualified.
    pub fn default_database(&self) -> Result<String> {
        let result = self.execute("SELECT current_database()")?;
        Ok(result
            .scalar()
            .and_then(Value::as_str)
            .unwrap_or("memory")
            .to_string())
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|e| QuarryError::execution(format!("lock error: {e}")))
    }

    fn execute_batch(&self, sql: &str) -> Result<()> {
        debug!(sql, "duckdb execute");
        self.connection()?
            .execute_batch(sql)
            .map_err(QuarryError::execution)
    }

    fn stage_path(&self, name: &str) -> PathBuf {
        self.stage_dir.join(name)
    }
}

impl Warehouse for DuckDbWarehouse {
    fn dialect(&self) -> Dialect {
        Dialect::DuckDb
    }

    fn put_stage_file(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let path = self.stage_path(name);
        fs::write(&path, bytes)?;
        Ok(path.to_string_lossy().into_owned())
    }

    fn list_stage_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.stage_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    fn remove_stage_file(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.stage_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn describe_table(&self, table: &TableName) -> Result<Option<TableSchema>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT column_name, data_type FROM information_schema.columns \
                 WHERE table_catalog = ? AND table_schema = ? AND table_name = ? \
                 ORDER BY ordinal_position",
            )
            .map_err(QuarryError::execution)?;
        let mut rows = stmt
            .query(params![table.database, table.schema, table.table])
            .map_err(QuarryError::execution)?;

        let mut columns = Vec::new();
        while let Some(row) = rows.next().map_err(QuarryError::execution)? {
            let name: String = row.get(0).map_err(QuarryError::execution)?;
            let data_type: String = row.get(1).map_err(QuarryError::execution)?;
            columns.push(ColumnSchema::new(name, ColumnType::from_sql_type(&data_type)));
        }

        Ok((!columns.is_empty()).then(|| TableSchema::new(table.clone(), columns)))
    }

    fn list_tables(&self, database: &str, schema: &str) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn
            .prepare(
                "SELECT table_name FROM information_schema.tables \
                 WHERE table_catalog = ? AND table_schema = ? ORDER BY table_name",
            )
            .map_err(QuarryError::execution)?;
        let mut rows = stmt
            .query(params![database, schema])
            .map_err(QuarryError::execution)?;

        let mut tables = Vec::new();
        while let Some(row) = rows.next().map_err(QuarryError::execution)? {
            tables.push(row.get::<_, String>(0).map_err(QuarryError::execution)?);
        }
        Ok(tables)
    }

    fn execute(&self, sql: &str) -> Result<ResultTable> {
        debug!(sql, "duckdb query");
        let conn = self.connection()?;
        let mut stmt = conn.prepare(sql).map_err(QuarryError::execution)?;

        // Columns are only known once the statement has run
        let mut result_rows = stmt.query([]).map_err(QuarryError::execution)?;
        let column_count = result_rows.as_ref().map(|r| r.column_count()).unwrap_or(0);
        let columns: Vec<String> = (0..column_count)
            .map(|i| {
                result_rows
                    .as_ref()
                    .and_then(|r| r.column_name(i).ok())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| format!("col{i}"))
            })
            .collect();

        let mut rows = Vec::new();
        while let Some(row) = result_rows.next().map_err(QuarryError::execution)? {
            let values = (0..column_count)
                .map(|i| row.get_ref(i).map(value_ref_to_json).unwrap_or(Value::Null))
                .collect();
            rows.push(values);
        }

        Ok(ResultTable::new(columns, rows))
    }

    fn execute_statement(&self, statement: &Statement) -> Result<ResultTable> {
        let sql = statement.to_sql(self.dialect());
        match statement {
            Statement::Query(_) => self.execute(&sql),
            Statement::CreateTable(create) => {
                if let (Some(database), Some(schema)) = (&create.table.database, &create.table.schema)
                {
                    let dialect = self.dialect().dialect();
                    self.execute_batch(&format!(
                        "CREATE SCHEMA IF NOT EXISTS {}.{}",
                        dialect.quote_identifier(database),
                        dialect.quote_identifier(schema)
                    ))?;
                }
                self.execute_batch(&sql)?;
                Ok(ResultTable::empty())
            }
            Statement::DropTable(_) | Statement::CopyInto(_) => {
                self.execute_batch(&sql)?;
                Ok(ResultTable::empty())
            }
        }
    }
}

/// Convert a DuckDB value to JSON. Timestamps and dates become strings.
fn value_ref_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::from(i),
        ValueRef::SmallInt(i) => Value::from(i),
        ValueRef::Int(i) => Value::from(i),
        ValueRef::BigInt(i) => Value::from(i),
        ValueRef::HugeInt(i) => i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        ValueRef::UTinyInt(i) => Value::from(i),
        ValueRef::USmallInt(i) => Value::from(i),
        ValueRef::UInt(i) => Value::from(i),
        ValueRef::UBigInt(i) => Value::from(i),
        ValueRef::Float(f) => Value::from(f64::from(f)),
        ValueRef::Double(f) => Value::from(f),
        ValueRef::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(d.to_string())),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Timestamp(unit, raw) => {
            let micros = match unit {
                TimeUnit::Second => raw.saturating_mul(1_000_000),
                TimeUnit::Millisecond => raw.saturating_mul(1_000),
                TimeUnit::Microsecond => raw,
                TimeUnit::Nanosecond => raw / 1_000,
            };
            DateTime::from_timestamp_micros(micros)
                .map(|dt| Value::String(dt.naive_utc().format("%Y-%m-%d %H:%M:%S%.f").to_string()))
                .unwrap_or(Value::from(raw))
        }
        ValueRef::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(i64::from(days))))
            .map(|date| Value::String(date.to_string()))
            .unwrap_or(Value::from(days)),
        other => Value::String(format!("{other:?}")),
    }
}
