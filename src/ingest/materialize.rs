//! Table Materializer - loads a staged artifact into its target table and
//! removes the artifact afterwards, whatever happened in between.
//!
//! ```text
//! STAGED ──► LOADING ──► LOADED ─────┐
//!                 │                  ├──► CLEANED
//!                 └────► LOAD_FAILED ┘
//! ```
//!
//! Create-new and replace loads go through a scratch table in the target's
//! schema, which is only copied into place once the bulk load succeeded, so
//! a failed load never leaves a half-filled target behind. Appends are
//! checked against the existing table before anything is written.

use std::fmt;

use tracing::{debug, info, warn};

use super::batch::ColumnSchema;
use super::stage::{unstage, StagedArtifact};
use super::target::{TableTarget, WriteMode};
use crate::error::{QuarryError, Result};
use crate::sql::{ColumnDef, CopyInto, CreateTable, DropTable, Query, Statement, TableRef};
use crate::types::{ColumnType, TableName};
use crate::warehouse::{TableSchema, Warehouse};

/// Where a load is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Staged,
    Loading,
    Loaded,
    LoadFailed,
    Cleaned,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoadState::Staged => "staged",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::LoadFailed => "load-failed",
            LoadState::Cleaned => "cleaned",
        })
    }
}

/// Load `artifact` into `target` and remove it from the stage.
///
/// The artifact is removed on every exit path. If the load succeeded but
/// cleanup failed the result is [`QuarryError::StageCleanupFailed`]; if the
/// load failed, its error wins and the cleanup failure is logged.
pub fn materialize(
    warehouse: &dyn Warehouse,
    artifact: StagedArtifact,
    target: &TableTarget,
) -> Result<TableName> {
    let mut run = LoadRun::new(&artifact);
    run.materialize(warehouse, target)
}

/// One pass through the load state machine.
struct LoadRun<'a> {
    artifact: &'a StagedArtifact,
    state: LoadState,
    history: Vec<LoadState>,
}

impl<'a> LoadRun<'a> {
    fn new(artifact: &'a StagedArtifact) -> Self {
        Self {
            artifact,
            state: LoadState::Staged,
            history: vec![LoadState::Staged],
        }
    }

    fn transition(&mut self, next: LoadState) {
        info!(artifact = %self.artifact.name, from = %self.state, to = %next, "load state");
        self.state = next;
        self.history.push(next);
    }

    fn materialize(&mut self, warehouse: &dyn Warehouse, target: &TableTarget) -> Result<TableName> {
        let guard = CleanupGuard::new(warehouse, self.artifact);

        self.transition(LoadState::Loading);
        let outcome = load(warehouse, self.artifact, target);
        self.transition(match outcome {
            Ok(_) => LoadState::Loaded,
            Err(_) => LoadState::LoadFailed,
        });

        let cleanup = guard.finish();
        self.transition(LoadState::Cleaned);

        match (outcome, cleanup) {
            (Ok(table), Ok(())) => Ok(table),
            (Ok(_), Err(cleanup)) => Err(cleanup),
            (Err(load), Ok(())) => Err(load),
            (Err(load), Err(cleanup)) => {
                warn!(artifact = %self.artifact.name, error = %cleanup, "cleanup after failed load also failed");
                Err(load)
            }
        }
    }
}

/// Removes the artifact when dropped, unless [`CleanupGuard::finish`] already did.
///
/// Covers panics inside the load; the normal path calls `finish` to see the error.
struct CleanupGuard<'a> {
    warehouse: &'a dyn Warehouse,
    artifact: &'a StagedArtifact,
    done: bool,
}

impl<'a> CleanupGuard<'a> {
    fn new(warehouse: &'a dyn Warehouse, artifact: &'a StagedArtifact) -> Self {
        Self {
            warehouse,
            artifact,
            done: false,
        }
    }

    fn finish(mut self) -> Result<()> {
        self.done = true;
        unstage(self.warehouse, self.artifact)
    }
}

impl Drop for CleanupGuard<'_> {
    fn drop(&mut self) {
        if !self.done {
            if let Err(e) = unstage(self.warehouse, self.artifact) {
                warn!(artifact = %self.artifact.name, error = %e, "failed to remove staged artifact");
            }
        }
    }
}

fn load(
    warehouse: &dyn Warehouse,
    artifact: &StagedArtifact,
    target: &TableTarget,
) -> Result<TableName> {
    let columns = staged_columns(artifact);

    match target.mode {
        WriteMode::Append => match warehouse.describe_table(&target.name)? {
            Some(existing) => {
                check_append(&existing, &columns)?;
                copy_into(warehouse, target.name.to_table_ref(), artifact, &columns)?;
            }
            // Appending to a table that does not exist yet creates it
            None => load_via_scratch(warehouse, artifact, target, &columns, false)?,
        },
        WriteMode::CreateNew => {
            if warehouse.describe_table(&target.name)?.is_some() {
                return Err(QuarryError::execution(format!(
                    "table {} already exists",
                    target.name
                )));
            }
            load_via_scratch(warehouse, artifact, target, &columns, false)?;
        }
        WriteMode::Replace => load_via_scratch(warehouse, artifact, target, &columns, true)?,
    }

    Ok(target.name.clone())
}

/// Column layout of the staged file.
fn staged_columns(artifact: &StagedArtifact) -> Vec<ColumnSchema> {
    artifact
        .schema
        .fields()
        .iter()
        .map(|f| ColumnSchema::new(f.name().clone(), ColumnType::from_field(f)))
        .collect()
}

/// Appended columns must match the table's by name, and each type must fit.
fn check_append(existing: &TableSchema, staged: &[ColumnSchema]) -> Result<()> {
    let existing_names = existing.column_names();
    let staged_names: Vec<String> = staged.iter().map(|c| c.name.clone()).collect();

    let mut missing: Vec<&str> = existing_names
        .iter()
        .filter(|name| !staged_names.contains(name))
        .map(String::as_str)
        .collect();
    let mut extra: Vec<&str> = staged_names
        .iter()
        .filter(|name| !existing_names.contains(name))
        .map(String::as_str)
        .collect();
    missing.sort_unstable();
    extra.sort_unstable();

    let mut problems = Vec::new();
    if !missing.is_empty() {
        problems.push(format!("missing columns: {}", missing.join(", ")));
    }
    if !extra.is_empty() {
        problems.push(format!("unexpected columns: {}", extra.join(", ")));
    }
    for column in staged {
        if let Some(table_type) = existing.column_type(&column.name) {
            if !column.column_type.fits_into(table_type) {
                problems.push(format!(
                    "column '{}' is {} but the table has {}",
                    column.name, column.column_type, table_type
                ));
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(QuarryError::schema_mismatch(&existing.table, problems.join("; ")))
    }
}

/// Bulk-load into a fresh scratch table, then copy it into place.
fn load_via_scratch(
    warehouse: &dyn Warehouse,
    artifact: &StagedArtifact,
    target: &TableTarget,
    columns: &[ColumnSchema],
    replace: bool,
) -> Result<()> {
    let scratch = TableRef::qualified(
        &target.name.database,
        &target.name.schema,
        &format!("TMP_QUARRY_{}", artifact.operation_id.simple()).to_uppercase(),
    );

    let definitions = columns
        .iter()
        .map(|c| ColumnDef::new(c.name.clone(), c.column_type));
    let create_scratch = CreateTable::new(scratch.clone()).columns(definitions);
    let result = execute(warehouse, create_scratch.into()).and_then(|()| {
        copy_into(warehouse, scratch.clone(), artifact, columns)?;
        let mut create_target =
            CreateTable::new(target.name.to_table_ref()).as_select(Query::new().from(scratch.clone()));
        if replace {
            create_target = create_target.or_replace();
        }
        execute(warehouse, create_target.into())
    });

    if let Err(e) = execute(warehouse, DropTable::new(scratch.clone()).if_exists().into()) {
        warn!(table = %scratch.table, error = %e, "failed to drop scratch table");
    }
    result
}

fn copy_into(
    warehouse: &dyn Warehouse,
    table: TableRef,
    artifact: &StagedArtifact,
    columns: &[ColumnSchema],
) -> Result<()> {
    let copy = CopyInto::new(table, artifact.location.clone())
        .columns(columns.iter().map(|c| c.name.clone()));
    execute(warehouse, copy.into())
}

fn execute(warehouse: &dyn Warehouse, statement: Statement) -> Result<()> {
    debug!(sql = %statement.to_sql(warehouse.dialect()), "executing");
    warehouse.execute_statement(&statement).map(|_| ())
}
