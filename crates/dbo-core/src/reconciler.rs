//! Capture-key insert
//!
//! When one application database is shared by several test-database
//! instances, generated keys differ between instances. The key is then
//! captured from the rendered UI instead. Depending on the policy at the
//! current scope the captured key is either stored verbatim, or the store
//! generates a key that must agree with the captured one.

use crate::automation::{AutomationContext, KeySource};
use crate::error::DboError;
use crate::inserter::{InsertOutcome, RecordInserter};
use crate::settings::{NarrowingPolicy, Scope, SettingsResolver};
use dbo_schema::{Record, Table, Value};
use std::sync::Arc;

/// Record, table and execution mode bundled as one argument
#[derive(Debug, Clone)]
pub struct Compound {
    pub record: Record,
    pub table: Arc<Table>,
    pub sync: bool,
}

impl Compound {
    #[must_use]
    pub fn new(record: Record, table: Arc<Table>) -> Self {
        Self {
            record,
            table,
            sync: false,
        }
    }

    /// Blocking mode
    #[inline]
    #[must_use]
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }
}

/// Coordinates a captured key with the store's key generation
#[derive(Clone)]
pub struct KeyReconciler {
    inserter: RecordInserter,
    settings: Arc<dyn SettingsResolver>,
    scope: Scope,
}

impl KeyReconciler {
    #[must_use]
    pub fn new(inserter: RecordInserter, settings: Arc<dyn SettingsResolver>, scope: Scope) -> Self {
        Self {
            inserter,
            settings,
            scope,
        }
    }

    /// Reject requests this protocol cannot serve, before anything is
    /// captured. Returns the primary-key column.
    ///
    /// # Errors
    /// - `DboError::UnsupportedOperation` without a narrow column or with a
    ///   composite primary key
    /// - `DboError::DuplicateKeyAssignment` if the record already has its key
    pub fn check(&self, compound: &Compound) -> Result<String, DboError> {
        let table = &compound.table;
        if table.narrow_column().is_none() {
            return Err(DboError::UnsupportedOperation(format!(
                "table {} doesn't use a narrow column",
                table.name()
            )));
        }
        let Some(column) = table.primary().single() else {
            return Err(DboError::UnsupportedOperation(format!(
                "capturing a composite primary key ({}) of table {}",
                table.primary(),
                table.name()
            )));
        };
        if let Some(existing) = compound.record.get(column) {
            return Err(DboError::DuplicateKeyAssignment {
                table: table.name().to_string(),
                column: column.to_string(),
                existing: existing.clone(),
            });
        }
        Ok(column.to_string())
    }

    /// Capture a key and insert the record under the scope's policy
    ///
    /// # Errors
    /// - any error of [`KeyReconciler::check`], with no store call
    /// - `DboError::Automation` if the key cannot be captured
    /// - errors of [`RecordInserter::insert`]
    /// - `DboError::KeyReconciliation` after a successful insert whose
    ///   generated key differs from the captured one
    pub async fn insert_capture_key(
        &self,
        source: &KeySource,
        compound: Compound,
        context: &dyn AutomationContext,
    ) -> Result<InsertOutcome, DboError> {
        let column = self.check(&compound)?;
        let Compound {
            mut record, table, ..
        } = compound;

        let captured = source.capture(context)?;
        let policy = NarrowingPolicy::resolve(self.settings.as_ref(), &self.scope);

        if policy.store_captured_key() {
            tracing::debug!(table = table.name(), key = %captured, "storing captured key");
            record.set(column.as_str(), captured);
            return self.inserter.insert(record, &table, &policy).await;
        }

        let outcome = self.inserter.insert(record, &table, &policy).await?;
        let generated = outcome
            .record
            .get(&column)
            .cloned()
            .unwrap_or(Value::Null);
        if !captured.loosely_equals(&generated) {
            tracing::warn!(
                table = table.name(),
                %captured,
                %generated,
                "captured key differs from generated key"
            );
            return Err(DboError::KeyReconciliation {
                table: table.name().to_string(),
                captured,
                generated,
            });
        }
        tracing::debug!(table = table.name(), key = %generated, "captured key confirmed");
        Ok(outcome)
    }
}

impl std::fmt::Debug for KeyReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyReconciler")
            .field("inserter", &self.inserter)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::{AttributeLocator, AutomationError};
    use crate::settings::{HierarchicalSettings, ALWAYS_TEST_GENERATING_KEYS, NARROW_BY};
    use crate::storage::{MemoryStorage, Storage};
    use crate::variables::{StoredVariables, INSERTED_RECORD_KEY};

    struct Screen(&'static str);

    impl AutomationContext for Screen {
        fn get_attribute(&self, _locator: &AttributeLocator) -> Result<String, AutomationError> {
            Ok(self.0.to_string())
        }
    }

    fn person() -> Arc<Table> {
        Arc::new(
            Table::builder("person")
                .columns(["id", "name", "instance"])
                .primary("id")
                .narrow_column("instance")
                .build()
                .unwrap(),
        )
    }

    fn build(
        settings: HierarchicalSettings,
        table: &Arc<Table>,
    ) -> (KeyReconciler, Arc<MemoryStorage>, Arc<StoredVariables>) {
        let store = Arc::new(MemoryStorage::new());
        store.register(Arc::clone(table));
        let variables = Arc::new(StoredVariables::new());
        let inserter = RecordInserter::new(
            Arc::clone(&store) as Arc<dyn Storage>,
            Arc::clone(&variables),
            INSERTED_RECORD_KEY,
        );
        (
            KeyReconciler::new(inserter, Arc::new(settings), Scope::root()),
            store,
            variables,
        )
    }

    fn source() -> KeySource {
        KeySource::locator("id=row@data-key").unwrap()
    }

    #[tokio::test]
    async fn narrowing_stores_captured_key() {
        let table = person();
        let settings = HierarchicalSettings::new().with(&Scope::root(), NARROW_BY, "alpha");
        let (reconciler, store, variables) = build(settings, &table);

        let outcome = reconciler
            .insert_capture_key(
                &source(),
                Compound::new(Record::new().with("name", "Ann"), Arc::clone(&table)),
                &Screen("42"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.record.get("id"), Some(&Value::from("42")));
        assert_eq!(outcome.generated_key, None);
        assert_eq!(store.rows("person")[0].get("id"), Some(&Value::from("42")));
        assert_eq!(
            store.rows("person")[0].get("instance"),
            Some(&Value::from("alpha"))
        );
        assert!(variables.is_empty());
    }

    #[tokio::test]
    async fn generated_key_matching_capture_succeeds() {
        let table = person();
        let (reconciler, _store, variables) = build(HierarchicalSettings::new(), &table);

        let outcome = reconciler
            .insert_capture_key(
                &source(),
                Compound::new(Record::new(), Arc::clone(&table)),
                &Screen("1"),
            )
            .await
            .unwrap();
        assert_eq!(outcome.generated_key, Some(Value::Integer(1)));
        assert_eq!(variables.value(INSERTED_RECORD_KEY), Some(Value::Integer(1)));
    }

    #[tokio::test]
    async fn mismatch_is_post_write_failure() {
        let table = person();
        let settings = HierarchicalSettings::new()
            .with(&Scope::root(), NARROW_BY, "alpha")
            .with(&Scope::root(), ALWAYS_TEST_GENERATING_KEYS, true);
        let (reconciler, store, _variables) = build(settings, &table);

        let err = reconciler
            .insert_capture_key(
                &source(),
                Compound::new(Record::new(), Arc::clone(&table)),
                &Screen("42"),
            )
            .await
            .unwrap_err();

        match &err {
            DboError::KeyReconciliation {
                captured,
                generated,
                ..
            } => {
                assert_eq!(captured, &Value::from("42"));
                assert_eq!(generated, &Value::Integer(1));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.is_post_write());
        assert_eq!(store.rows("person").len(), 1);
    }

    #[tokio::test]
    async fn table_without_narrow_column_is_unsupported() {
        let table = Arc::new(
            Table::builder("plain")
                .columns(["id"])
                .primary("id")
                .build()
                .unwrap(),
        );
        for settings in [
            HierarchicalSettings::new(),
            HierarchicalSettings::new().with(&Scope::root(), NARROW_BY, "alpha"),
        ] {
            let (reconciler, store, _) = build(settings, &table);
            let err = reconciler
                .insert_capture_key(
                    &source(),
                    Compound::new(Record::new(), Arc::clone(&table)),
                    &Screen("1"),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, DboError::UnsupportedOperation(_)));
            assert_eq!(store.calls(), 0);
        }
    }

    #[tokio::test]
    async fn composite_key_is_unsupported() {
        let table = Arc::new(
            Table::builder("membership")
                .columns(["person_id", "club_id", "instance"])
                .composite_primary(["person_id", "club_id"])
                .narrow_column("instance")
                .build()
                .unwrap(),
        );
        let (reconciler, _, _) = build(HierarchicalSettings::new(), &table);
        let err = reconciler
            .check(&Compound::new(Record::new(), table))
            .unwrap_err();
        assert!(matches!(err, DboError::UnsupportedOperation(_)));
    }

    #[tokio::test]
    async fn preset_key_is_duplicate_assignment() {
        let table = person();
        let (reconciler, store, _) = build(HierarchicalSettings::new(), &table);
        let err = reconciler
            .insert_capture_key(
                &source(),
                Compound::new(Record::new().with("id", 7), Arc::clone(&table)),
                &Screen("7"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DboError::DuplicateKeyAssignment { ref column, .. } if column == "id"
        ));
        assert!(err.is_validation());
        assert_eq!(store.calls(), 0);
    }
}
