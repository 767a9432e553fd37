//! Record-access façade
//!
//! The entry point the automation engine calls. Each operation validates its
//! input, runs against the store and applies its side effects (slot writes,
//! key back-fill) inside one future, which is either awaited before the call
//! returns or spawned, depending on the request's `sync` flag.

use crate::automation::{AutomationContext, KeySource};
use crate::completion::Completion;
use crate::config::DboConfig;
use crate::error::DboError;
use crate::inserter::{InsertOutcome, RecordInserter};
use crate::reconciler::{Compound, KeyReconciler};
use crate::selector::{MatchRequest, RecordSelector};
use crate::settings::{NarrowingPolicy, SettingsResolver};
use crate::storage::{Bindings, ResultSet, Storage};
use crate::variables::StoredVariables;
use dbo_schema::{Record, Table};
use std::sync::Arc;

struct Inner {
    storage: Arc<dyn Storage>,
    settings: Arc<dyn SettingsResolver>,
    variables: Arc<StoredVariables>,
    selector: RecordSelector,
    inserter: RecordInserter,
    reconciler: KeyReconciler,
    config: DboConfig,
}

impl Inner {
    fn policy(&self) -> NarrowingPolicy {
        NarrowingPolicy::resolve(self.settings.as_ref(), &self.config.scope)
    }
}

/// Record-access façade
///
/// Cheap to clone; clones share the store, settings and stored variables.
#[derive(Clone)]
pub struct RecordFacade {
    inner: Arc<Inner>,
}

impl RecordFacade {
    /// Create a façade over `storage`, resolving policy from `settings`
    ///
    /// # Errors
    /// `DboError::Config` if `config` is invalid.
    pub fn new(
        storage: Arc<dyn Storage>,
        settings: Arc<dyn SettingsResolver>,
        config: DboConfig,
    ) -> Result<Self, DboError> {
        config.validate()?;
        let variables = Arc::new(StoredVariables::new());
        let selector = RecordSelector::new(Arc::clone(&storage));
        let inserter = RecordInserter::new(
            Arc::clone(&storage),
            Arc::clone(&variables),
            config.inserted_key_variable.clone(),
        );
        let reconciler =
            KeyReconciler::new(inserter.clone(), Arc::clone(&settings), config.scope.clone());

        tracing::info!(scope = %config.scope, "record facade ready");
        Ok(Self {
            inner: Arc::new(Inner {
                storage,
                settings,
                variables,
                selector,
                inserter,
                reconciler,
                config,
            }),
        })
    }

    /// Slots shared with the automation engine
    #[inline]
    #[must_use]
    pub fn variables(&self) -> &Arc<StoredVariables> {
        &self.inner.variables
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &DboConfig {
        &self.inner.config
    }

    /// Narrowing policy at the configured scope, resolved now
    #[must_use]
    pub fn policy(&self) -> NarrowingPolicy {
        self.inner.policy()
    }

    /// Read exactly one record and store it into the slot `name`
    ///
    /// The slot is only written on success.
    pub async fn read_record_into(
        &self,
        request: MatchRequest,
        name: impl Into<String>,
    ) -> Completion<Record> {
        let inner = Arc::clone(&self.inner);
        let name = name.into();
        Completion::drive(request.sync, async move {
            let policy = inner.policy();
            let record = inner.selector.select_one(&request, &policy).await?;
            tracing::debug!(slot = %name, target_name = request.source.name(), "record read");
            inner.variables.store_record(name, record.clone());
            Ok(record)
        })
        .await
    }

    /// Insert a record, back-filling a generated single-column key
    pub async fn insert_record(
        &self,
        record: Record,
        table: Arc<Table>,
        sync: bool,
    ) -> Completion<InsertOutcome> {
        let inner = Arc::clone(&self.inner);
        Completion::drive(sync, async move {
            let policy = inner.policy();
            inner.inserter.insert(record, &table, &policy).await
        })
        .await
    }

    /// Insert a record whose key was captured from the automation context
    pub async fn insert_record_capture_key(
        &self,
        source: KeySource,
        compound: Compound,
        context: Arc<dyn AutomationContext>,
    ) -> Completion<InsertOutcome> {
        let inner = Arc::clone(&self.inner);
        Completion::drive(compound.sync, async move {
            inner
                .reconciler
                .insert_capture_key(&source, compound, context.as_ref())
                .await
        })
        .await
    }

    /// Run raw SQL; no validation, the store's result is returned as is
    ///
    /// # Errors
    /// `DboError::Storage` from the store.
    pub async fn execute_sql(&self, sql: &str, bindings: &Bindings) -> Result<ResultSet, DboError> {
        tracing::debug!(bindings = bindings.len(), "executing raw SQL");
        Ok(self.inner.storage.execute(sql, bindings).await?)
    }
}

impl std::fmt::Debug for RecordFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordFacade")
            .field("config", &self.inner.config)
            .field("variables", &self.inner.variables.len())
            .finish_non_exhaustive()
    }
}
