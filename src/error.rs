//! Error taxonomy shared by ingestion and querying.

use std::io;
use thiserror::Error;

use crate::config::SettingsError;

/// Result type for quarry operations.
pub type Result<T> = std::result::Result<T, QuarryError>;

/// Errors surfaced to the caller.
///
/// Every variant carries enough context (row, column, artifact or warehouse
/// message) to be shown to a user as-is.
#[derive(Error, Debug)]
pub enum QuarryError {
    /// The format tag is unknown or not compiled into this build.
    #[error("unsupported format '{format}': {reason}")]
    UnsupportedFormat { format: String, reason: String },

    /// The upload contained no data.
    #[error("input is empty")]
    EmptyInput,

    /// A row could not be parsed. `row` is 1-based; 0 means the file as a whole.
    #[error("malformed input at row {row}: {reason}")]
    MalformedInput { row: usize, reason: String },

    /// The staged artifact could not be written; nothing was left behind.
    #[error("failed to stage '{artifact}': {reason}")]
    StageUploadFailed { artifact: String, reason: String },

    /// The staged artifact could not be removed after loading.
    #[error("failed to remove staged artifact '{artifact}': {reason}")]
    StageCleanupFailed { artifact: String, reason: String },

    /// Appended data does not match the existing table.
    #[error("schema mismatch for {table}: {details}")]
    SchemaMismatch { table: String, details: String },

    /// A query referenced a column the source table does not have.
    #[error("unknown column '{column}' on {table}")]
    UnknownColumn { column: String, table: String },

    /// The warehouse rejected a statement. The message is passed through verbatim.
    #[error("execution failed: {message}")]
    ExecutionFailed { message: String },

    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] SettingsError),

    /// Local file I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

impl QuarryError {
    pub fn unsupported_format(format: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed(row: usize, reason: impl ToString) -> Self {
        Self::MalformedInput {
            row,
            reason: reason.to_string(),
        }
    }

    pub fn stage_upload(artifact: impl Into<String>, reason: impl ToString) -> Self {
        Self::StageUploadFailed {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }

    pub fn stage_cleanup(artifact: impl Into<String>, reason: impl ToString) -> Self {
        Self::StageCleanupFailed {
            artifact: artifact.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema_mismatch(table: impl ToString, details: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            table: table.to_string(),
            details: details.into(),
        }
    }

    pub fn unknown_column(column: impl Into<String>, table: impl ToString) -> Self {
        Self::UnknownColumn {
            column: column.into(),
            table: table.to_string(),
        }
    }

    pub fn execution(message: impl ToString) -> Self {
        Self::ExecutionFailed {
            message: message.to_string(),
        }
    }

    /// Check if this error happened while reading the upload.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat { .. } | Self::EmptyInput | Self::MalformedInput { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = QuarryError::malformed(4, "expected 2 fields, found 3");
        assert_eq!(
            err.to_string(),
            "malformed input at row 4: expected 2 fields, found 3"
        );

        let err = QuarryError::unknown_column("emial", "DB.SCH.USERS");
        assert_eq!(err.to_string(), "unknown column 'emial' on DB.SCH.USERS");

        let err = QuarryError::execution("SQL compilation error: syntax error line 1");
        assert!(err.to_string().ends_with("syntax error line 1"));
    }

    #[test]
    fn input_errors() {
        assert!(QuarryError::EmptyInput.is_input_error());
        assert!(!QuarryError::execution("boom").is_input_error());
    }
}
