//! Types shared by ingestion, warehouse access and the query builder.

use std::fmt;
use std::str::FromStr;

use arrow::datatypes::{DataType, Field, TimeUnit};
use serde::{Deserialize, Serialize};

use crate::sql::TableRef;

/// Field metadata key marking an Arrow UTF-8 column as semi-structured JSON.
pub const VARIANT_METADATA_KEY: &str = "quarry.variant";

/// Semantic type of a column, independent of any warehouse's type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Timestamp,
    Variant,
}

impl ColumnType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::Float)
    }

    /// Narrowest type able to hold values of both `self` and `other`.
    ///
    /// Integer and float widen to float; every other mix falls back to text.
    pub fn widen(self, other: ColumnType) -> ColumnType {
        match (self, other) {
            (a, b) if a == b => a,
            (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                ColumnType::Float
            }
            _ => ColumnType::Text,
        }
    }

    /// Whether values of type `self` can be appended into a column of type `existing`.
    pub fn fits_into(self, existing: ColumnType) -> bool {
        self == existing
            || existing == ColumnType::Text
            || (self == ColumnType::Integer && existing == ColumnType::Float)
    }

    /// Arrow storage type for this column type.
    pub fn to_arrow(&self) -> DataType {
        match self {
            ColumnType::Text | ColumnType::Variant => DataType::Utf8,
            ColumnType::Integer => DataType::Int64,
            ColumnType::Float => DataType::Float64,
            ColumnType::Boolean => DataType::Boolean,
            ColumnType::Timestamp => DataType::Timestamp(TimeUnit::Microsecond, None),
        }
    }

    /// Arrow field for a column of this type. Variant columns carry a metadata marker.
    pub fn to_field(&self, name: &str) -> Field {
        let field = Field::new(name, self.to_arrow(), true);
        if *self == ColumnType::Variant {
            field.with_metadata([(VARIANT_METADATA_KEY.to_string(), "true".to_string())].into())
        } else {
            field
        }
    }

    /// Semantic type of an Arrow field, honouring the variant marker.
    pub fn from_field(field: &Field) -> ColumnType {
        if field.metadata().contains_key(VARIANT_METADATA_KEY) {
            return ColumnType::Variant;
        }
        Self::from_arrow(field.data_type())
    }

    /// Semantic type of an Arrow data type as found in self-describing files.
    pub fn from_arrow(data_type: &DataType) -> ColumnType {
        match data_type {
            DataType::Boolean => ColumnType::Boolean,
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => ColumnType::Integer,
            DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Decimal128(_, _)
            | DataType::Decimal256(_, _) => ColumnType::Float,
            DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => {
                ColumnType::Timestamp
            }
            DataType::List(_)
            | DataType::LargeList(_)
            | DataType::FixedSizeList(_, _)
            | DataType::Struct(_)
            | DataType::Map(_, _) => ColumnType::Variant,
            _ => ColumnType::Text,
        }
    }

    /// Semantic type of a warehouse column type name (as reported by DESCRIBE).
    pub fn from_sql_type(name: &str) -> ColumnType {
        let upper = name.trim().to_ascii_uppercase();
        let base = upper.split('(').next().unwrap_or_default().trim();
        match base {
            "BIGINT" | "INT" | "INTEGER" | "SMALLINT" | "TINYINT" | "HUGEINT" | "BYTEINT"
            | "UBIGINT" | "UINTEGER" | "USMALLINT" | "UTINYINT" => ColumnType::Integer,
            // Snowflake reports integers as NUMBER(38,0)
            "NUMBER" | "NUMERIC" | "DECIMAL" => {
                if upper.ends_with(",0)") || upper.ends_with(", 0)") {
                    ColumnType::Integer
                } else {
                    ColumnType::Float
                }
            }
            "DOUBLE" | "FLOAT" | "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE PRECISION" => {
                ColumnType::Float
            }
            "BOOLEAN" | "BOOL" => ColumnType::Boolean,
            "VARIANT" | "OBJECT" | "ARRAY" | "JSON" | "STRUCT" | "MAP" | "LIST" => {
                ColumnType::Variant
            }
            b if b.starts_with("TIMESTAMP") || b == "DATE" || b == "DATETIME" => {
                ColumnType::Timestamp
            }
            _ => ColumnType::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Variant => "variant",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A fully qualified `database.schema.table` name.
///
/// There is deliberately no way to build one from a bare table name: every
/// statement the crate emits names all three parts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableName {
    pub database: String,
    pub schema: String,
    pub table: String,
}

impl TableName {
    pub fn new(
        database: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// SQL table reference with all three parts.
    pub fn to_table_ref(&self) -> TableRef {
        TableRef::qualified(&self.database, &self.schema, &self.table)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.schema, self.table)
    }
}

impl FromStr for TableName {
    type Err = String;

    /// Parse `DB.SCHEMA.TABLE`. Anything other than three non-empty parts is rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').map(str::trim).collect();
        match parts.as_slice() {
            [db, schema, table] if !db.is_empty() && !schema.is_empty() && !table.is_empty() => {
                Ok(TableName::new(*db, *schema, *table))
            }
            _ => Err(format!(
                "expected a fully qualified DATABASE.SCHEMA.TABLE name, got '{s}'"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen_follows_numeric_tower() {
        assert_eq!(ColumnType::Integer.widen(ColumnType::Float), ColumnType::Float);
        assert_eq!(ColumnType::Float.widen(ColumnType::Integer), ColumnType::Float);
        assert_eq!(ColumnType::Integer.widen(ColumnType::Boolean), ColumnType::Text);
        assert_eq!(ColumnType::Timestamp.widen(ColumnType::Timestamp), ColumnType::Timestamp);
        assert_eq!(ColumnType::Variant.widen(ColumnType::Integer), ColumnType::Text);
    }

    #[test]
    fn fits_into_allows_safe_appends() {
        assert!(ColumnType::Integer.fits_into(ColumnType::Integer));
        assert!(ColumnType::Integer.fits_into(ColumnType::Float));
        assert!(ColumnType::Boolean.fits_into(ColumnType::Text));
        assert!(!ColumnType::Float.fits_into(ColumnType::Integer));
        assert!(!ColumnType::Text.fits_into(ColumnType::Timestamp));
    }

    #[test]
    fn sql_type_names() {
        assert_eq!(ColumnType::from_sql_type("NUMBER(38,0)"), ColumnType::Integer);
        assert_eq!(ColumnType::from_sql_type("NUMBER(10,2)"), ColumnType::Float);
        assert_eq!(ColumnType::from_sql_type("varchar(16777216)"), ColumnType::Text);
        assert_eq!(ColumnType::from_sql_type("TIMESTAMP_NTZ(9)"), ColumnType::Timestamp);
        assert_eq!(ColumnType::from_sql_type("VARIANT"), ColumnType::Variant);
        assert_eq!(ColumnType::from_sql_type("JSON"), ColumnType::Variant);
        assert_eq!(ColumnType::from_sql_type("DOUBLE"), ColumnType::Float);
        assert_eq!(ColumnType::from_sql_type("BOOLEAN"), ColumnType::Boolean);
    }

    #[test]
    fn variant_marker_round_trips_through_field() {
        let field = ColumnType::Variant.to_field("payload");
        assert_eq!(field.data_type(), &DataType::Utf8);
        assert_eq!(ColumnType::from_field(&field), ColumnType::Variant);
        assert_eq!(ColumnType::from_field(&ColumnType::Text.to_field("x")), ColumnType::Text);
    }

    #[test]
    fn table_name_parse_and_display() {
        let name: TableName = "DB.SCH.T".parse().unwrap();
        assert_eq!(name, TableName::new("DB", "SCH", "T"));
        assert_eq!(name.to_string(), "DB.SCH.T");
        assert!("SCH.T".parse::<TableName>().is_err());
        assert!("DB..T".parse::<TableName>().is_err());
    }
}
