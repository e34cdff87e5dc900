//! Editable SQL text.
//!
//! The editor holds either SQL derived from the live [`QuerySpec`] or text
//! the user typed over it. Once overridden, builder changes no longer
//! touch the text; [`SqlEditor::regenerate`] discards the edit and derives
//! the text again.

use tracing::debug;

use super::render::{render, RenderedQuery};
use super::spec::QuerySpec;
use crate::error::Result;
use crate::sql::{Dialect, Statement};
use crate::warehouse::{ResultTable, Warehouse};

/// Which text is authoritative for execution.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlText {
    /// Rendered from the spec.
    Derived(RenderedQuery),
    /// Typed by the user.
    Overridden(String),
}

/// SQL editor bound to a query builder.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlEditor {
    dialect: Dialect,
    text: SqlText,
}

impl SqlEditor {
    /// Start with SQL derived from `spec`.
    pub fn new(spec: &QuerySpec, dialect: Dialect) -> Self {
        Self {
            dialect,
            text: SqlText::Derived(render(spec, dialect)),
        }
    }

    /// The SQL that [`SqlEditor::execute`] will run.
    pub fn sql(&self) -> &str {
        match &self.text {
            SqlText::Derived(rendered) => &rendered.sql,
            SqlText::Overridden(sql) => sql,
        }
    }

    pub fn text(&self) -> &SqlText {
        &self.text
    }

    pub fn is_overridden(&self) -> bool {
        matches!(self.text, SqlText::Overridden(_))
    }

    /// Replace the text with a manual edit, detaching it from the builder.
    pub fn edit(&mut self, sql: impl Into<String>) {
        self.text = SqlText::Overridden(sql.into());
    }

    /// Builder state changed. Derived text follows it; an override is kept.
    pub fn spec_changed(&mut self, spec: &QuerySpec) {
        if !self.is_overridden() {
            self.text = SqlText::Derived(render(spec, self.dialect));
        }
    }

    /// Drop any manual edit and derive the text from `spec` again.
    pub fn regenerate(&mut self, spec: &QuerySpec) {
        if self.is_overridden() {
            debug!("discarding manual SQL edit");
        }
        self.text = SqlText::Derived(render(spec, self.dialect));
    }

    /// Run the current text.
    ///
    /// Derived text is executed as the statement it was rendered from;
    /// an override is passed to the warehouse as typed.
    pub fn execute(&self, warehouse: &dyn Warehouse) -> Result<ResultTable> {
        match &self.text {
            SqlText::Derived(rendered) => {
                warehouse.execute_statement(&Statement::Query(rendered.query.clone()))
            }
            SqlText::Overridden(sql) => warehouse.execute(sql),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuarryError;
    use crate::ingest::{ingest, FileFormat, FileUpload, TableTarget, WriteMode};
    use crate::query::Operator;
    use crate::types::TableName;
    use crate::warehouse::MemoryWarehouse;
    use serde_json::json;

    fn loaded() -> (MemoryWarehouse, QuerySpec) {
        let warehouse = MemoryWarehouse::new();
        let upload = FileUpload::new("t.csv", "id,name\n1,ann\n2,bob\n3,cy\n", FileFormat::Csv);
        let target = TableTarget::new(TableName::new("DB", "SCH", "T"), WriteMode::CreateNew);
        let table = ingest(&upload, &target, &warehouse).unwrap();
        (warehouse, QuerySpec::new(table))
    }

    #[test]
    fn derived_text_follows_the_builder() {
        let (warehouse, mut spec) = loaded();
        let schema = warehouse.describe_table(&spec.table).unwrap().unwrap();
        let mut editor = SqlEditor::new(&spec, Dialect::Snowflake);

        spec.add_predicate(&schema, "id", Operator::GtEq, "2").unwrap();
        editor.spec_changed(&spec);
        assert_eq!(editor.sql(), r#"SELECT * FROM "DB"."SCH"."T" WHERE "id" >= 2"#);

        let result = editor.execute(&warehouse).unwrap();
        assert_eq!(result.num_rows(), 2);
        assert_eq!(result.rows[0], vec![json!(2), json!("bob")]);
    }

    #[test]
    fn manual_edit_wins_until_regenerated() {
        let (warehouse, mut spec) = loaded();
        let schema = warehouse.describe_table(&spec.table).unwrap().unwrap();
        let mut editor = SqlEditor::new(&spec, Dialect::Snowflake);

        editor.edit("SELECT 42");
        spec.add_predicate(&schema, "id", Operator::Eq, "1").unwrap();
        editor.spec_changed(&spec);
        assert!(editor.is_overridden());
        assert_eq!(editor.sql(), "SELECT 42");

        // The override is sent as typed
        warehouse.respond_to("SELECT 42", ResultTable::new(vec!["42".into()], vec![vec![json!(42)]]));
        assert_eq!(editor.execute(&warehouse).unwrap().scalar(), Some(&json!(42)));

        editor.regenerate(&spec);
        assert!(!editor.is_overridden());
        assert_eq!(editor.sql(), r#"SELECT * FROM "DB"."SCH"."T" WHERE "id" = 1"#);
        assert_eq!(editor.execute(&warehouse).unwrap().num_rows(), 1);
    }

    #[test]
    fn warehouse_errors_pass_through() {
        let (warehouse, spec) = loaded();
        let mut editor = SqlEditor::new(&spec, Dialect::Snowflake);
        editor.edit("SELEC oops");
        let err = editor.execute(&warehouse).unwrap_err();
        assert!(matches!(err, QuarryError::ExecutionFailed { .. }));
    }
}
