//! Record inserter
//!
//! Inserts a record and, when the table's key is a single column the caller
//! left out, copies the store-generated value back into the record and into
//! the inserted-key slot.

use crate::error::DboError;
use crate::settings::NarrowingPolicy;
use crate::storage::{Storage, StorageError};
use crate::variables::StoredVariables;
use dbo_schema::{Record, RecordError, Table, Value};
use std::sync::Arc;

/// Result of an insert
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOutcome {
    /// The caller's record, with the generated key back-filled if any
    pub record: Record,
    /// Key generated by the store; `None` for caller-supplied or composite keys
    pub generated_key: Option<Value>,
}

/// Inserts records and back-fills generated keys
#[derive(Clone)]
pub struct RecordInserter {
    storage: Arc<dyn Storage>,
    variables: Arc<StoredVariables>,
    inserted_key_variable: String,
}

impl RecordInserter {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        variables: Arc<StoredVariables>,
        inserted_key_variable: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            variables,
            inserted_key_variable: inserted_key_variable.into(),
        }
    }

    /// Insert `record` into `table`
    ///
    /// # Errors
    /// - `DboError::SchemaMismatch` if the record has undeclared columns
    /// - `DboError::Storage` passed through unchanged, no retry
    pub async fn insert(
        &self,
        mut record: Record,
        table: &Table,
        policy: &NarrowingPolicy,
    ) -> Result<InsertOutcome, DboError> {
        let unknown: Vec<String> = record
            .columns()
            .filter(|c| !table.has_column(c))
            .map(str::to_string)
            .collect();
        if !unknown.is_empty() {
            return Err(DboError::SchemaMismatch {
                table: table.name().to_string(),
                unknown,
            });
        }

        if let (Some(column), Some(value)) = (table.narrow_column(), policy.narrow_value()) {
            if !record.contains(column) {
                tracing::debug!(table = table.name(), column, %value, "narrowing insert");
                record.set(column, value);
            }
        }

        let generated_column = table
            .primary()
            .single()
            .filter(|column| !record.contains(column));

        let stored = self.storage.insert(table, &record).await?;

        let Some(column) = generated_column else {
            tracing::debug!(table = table.name(), "inserted record with caller-supplied key");
            return Ok(InsertOutcome {
                record,
                generated_key: None,
            });
        };

        let generated = stored
            .get(column)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| StorageError::MissingGeneratedKey {
                table: table.name().to_string(),
                column: column.to_string(),
            })?;

        record
            .assign_key(column, generated.clone())
            .map_err(|RecordError::KeyAlreadySet { column, existing }| {
                DboError::DuplicateKeyAssignment {
                    table: table.name().to_string(),
                    column,
                    existing,
                }
            })?;
        self.variables
            .store_value(self.inserted_key_variable.clone(), generated.clone());
        tracing::info!(table = table.name(), key = %generated, "inserted record, key generated");

        Ok(InsertOutcome {
            record,
            generated_key: Some(generated),
        })
    }
}

impl std::fmt::Debug for RecordInserter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordInserter")
            .field("inserted_key_variable", &self.inserted_key_variable)
            .finish_non_exhaustive()
    }
}
