//! Error types for DBO Core
//!
//! Every error is terminal for the call that raised it. The classification
//! helpers tell a caller whether the store was touched:
//! - validation errors are raised before any store mutation
//! - a reconciliation failure is raised after the insert already succeeded

use crate::automation::AutomationError;
use crate::storage::StorageError;
use dbo_schema::{MatchError, SchemaError, Value};

/// Main DBO error type
#[derive(Debug, thiserror::Error)]
pub enum DboError {
    /// Input field is not a column of the target table
    #[error("schema mismatch: fields {unknown:?} are not columns of table '{table}'")]
    SchemaMismatch { table: String, unknown: Vec<String> },

    /// Malformed request (bad control flag, non-scalar value)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Table/formula/catalog definition problem
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Read matched nothing
    #[error("no records found in '{target}'")]
    NoRecordsFound { target: String },

    /// Read matched more than one record
    #[error("{count} records found in '{target}', expected exactly one")]
    MultipleRecords { target: String, count: usize },

    /// Operation not supported for this table shape
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Key column already populated on the record
    #[error("primary key '{column}' of table '{table}' is already set to '{existing}'")]
    DuplicateKeyAssignment {
        table: String,
        column: String,
        existing: Value,
    },

    /// Generated key differs from the captured one
    #[error(
        "captured primary key value for table '{table}': '{captured}' differs from generated value: '{generated}'"
    )]
    KeyReconciliation {
        table: String,
        captured: Value,
        generated: Value,
    },

    /// Passthrough from the store
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Key capture against the automation context failed
    #[error("automation error: {0}")]
    Automation(#[from] AutomationError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Deferred operation panicked or was aborted
    #[error("deferred operation failed: {0}")]
    TaskFailed(String),
}

impl DboError {
    /// Raised from caller input before the store was touched
    #[inline]
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::SchemaMismatch { .. }
                | Self::InvalidRequest(_)
                | Self::Schema(_)
                | Self::UnsupportedOperation(_)
                | Self::DuplicateKeyAssignment { .. }
        )
    }

    /// Raised after a successful write; trust the store's generated key
    #[inline]
    #[must_use]
    pub fn is_post_write(&self) -> bool {
        matches!(self, Self::KeyReconciliation { .. })
    }

    /// Read matched zero or several records
    #[inline]
    #[must_use]
    pub fn is_cardinality(&self) -> bool {
        matches!(
            self,
            Self::NoRecordsFound { .. } | Self::MultipleRecords { .. }
        )
    }
}

impl From<MatchError> for DboError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::SchemaMismatch { table, unknown } => Self::SchemaMismatch { table, unknown },
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}
