//! Where an upload lands and how it is written.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::TableName;

/// How the materialized table relates to any existing table of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteMode {
    /// Create the table; fail if it already exists.
    #[default]
    CreateNew,
    /// Drop and recreate the table.
    Replace,
    /// Insert into the existing table after checking column compatibility.
    Append,
}

impl WriteMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::CreateNew => "create-new",
            WriteMode::Replace => "replace",
            WriteMode::Append => "append",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WriteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "create-new" | "create" | "fail" => Ok(WriteMode::CreateNew),
            "replace" | "overwrite" => Ok(WriteMode::Replace),
            "append" => Ok(WriteMode::Append),
            other => Err(format!(
                "unknown write mode '{other}' (expected create-new, replace or append)"
            )),
        }
    }
}

/// Fully qualified destination of one ingestion, plus its write mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTarget {
    pub name: TableName,
    #[serde(default)]
    pub mode: WriteMode,
}

impl TableTarget {
    pub fn new(name: TableName, mode: WriteMode) -> Self {
        Self { name, mode }
    }

    /// Target named after an uploaded file, e.g. `daily sales-2024.csv` → `DAILY_SALES_2024`.
    pub fn from_file_name(
        database: &str,
        schema: &str,
        file_name: &str,
        mode: WriteMode,
    ) -> Self {
        Self::new(
            TableName::new(database, schema, default_table_name(file_name)),
            mode,
        )
    }
}

impl fmt::Display for TableTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.mode)
    }
}

/// Upper-cased file stem with spaces and hyphens turned into underscores.
pub fn default_table_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    stem.trim().replace([' ', '-'], "_").to_uppercase()
}
