//! Record selector
//!
//! Reads exactly one record from a table or formula. The pattern is checked
//! against the source's table before the store is asked anything; the
//! result set must then hold exactly one row.

use crate::error::DboError;
use crate::settings::NarrowingPolicy;
use crate::storage::{ResultSet, SelectQuery, Storage};
use dbo_schema::{
    Condition, Formula, MatchPattern, PatternMatcher, Record, Table, Value, FORMULA_KEY, TABLE_KEY,
};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// What a read runs against
#[derive(Debug, Clone)]
pub enum MatchSource {
    /// Plain table
    Table(Arc<Table>),
    /// Formula, validated against its table but queried with its own logic
    Formula(Arc<Formula>),
}

impl MatchSource {
    /// The underlying table
    #[inline]
    #[must_use]
    pub fn table(&self) -> &Arc<Table> {
        match self {
            MatchSource::Table(table) => table,
            MatchSource::Formula(formula) => formula.table(),
        }
    }

    /// Table or formula name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            MatchSource::Table(table) => table.name(),
            MatchSource::Formula(formula) => formula.name(),
        }
    }

    fn query(&self) -> SelectQuery {
        match self {
            MatchSource::Table(table) => SelectQuery::table(Arc::clone(table)),
            MatchSource::Formula(formula) => SelectQuery::formula(formula),
        }
    }

    /// Control key naming this kind of source, and the one naming the other
    fn keys(&self) -> (&'static str, &'static str) {
        match self {
            MatchSource::Table(_) => (TABLE_KEY, FORMULA_KEY),
            MatchSource::Formula(_) => (FORMULA_KEY, TABLE_KEY),
        }
    }
}

impl From<Arc<Table>> for MatchSource {
    fn from(table: Arc<Table>) -> Self {
        MatchSource::Table(table)
    }
}

impl From<Arc<Formula>> for MatchSource {
    fn from(formula: Arc<Formula>) -> Self {
        MatchSource::Formula(formula)
    }
}

/// A read request
#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub source: MatchSource,
    pub pattern: MatchPattern,
    /// Skip narrowing-column injection
    pub dont_narrow: bool,
    /// Await the read before the façade call returns
    pub sync: bool,
}

impl MatchRequest {
    /// Empty-pattern request against `source`
    #[must_use]
    pub fn new(source: impl Into<MatchSource>) -> Self {
        Self {
            source: source.into(),
            pattern: MatchPattern::new(),
            dont_narrow: false,
            sync: false,
        }
    }

    /// Build from a loosely-typed object, as sent by the automation engine
    ///
    /// # Errors
    /// `DboError::SchemaMismatch` for keys that are neither columns nor
    /// control keys; `DboError::InvalidRequest` for malformed flags/values,
    /// or when the input names a different source than `source`.
    pub fn from_json(
        source: impl Into<MatchSource>,
        input: &Map<String, JsonValue>,
    ) -> Result<Self, DboError> {
        let source = source.into();
        let derived = PatternMatcher::new().derive(source.table(), input)?;

        let (own, other) = source.keys();
        if input.contains_key(other) {
            return Err(DboError::InvalidRequest(format!(
                "'{other}' given for a read from {own} {}",
                source.name()
            )));
        }
        if let Some(named) = input.get(own) {
            if named.as_str() != Some(source.name()) {
                return Err(DboError::InvalidRequest(format!(
                    "'{own}' is {named}, but the read is from {}",
                    source.name()
                )));
            }
        }

        Ok(Self {
            source,
            pattern: derived.pattern,
            dont_narrow: derived.flags.dont_narrow,
            sync: derived.flags.sync,
        })
    }

    /// Build the query this request runs, without touching the store
    ///
    /// # Errors
    /// `DboError::SchemaMismatch` if the pattern names undeclared columns.
    pub fn plan(&self, policy: &NarrowingPolicy) -> Result<SelectQuery, DboError> {
        let table = self.source.table();
        PatternMatcher::new().validate(table, &self.pattern)?;

        let mut query = self.source.query();
        for condition in self.pattern.to_conditions() {
            query = query.and(condition);
        }

        if !self.dont_narrow {
            if let (Some(column), Some(value)) = (table.narrow_column(), policy.narrow_value()) {
                if self.pattern.get(column).is_none() {
                    tracing::debug!(table = table.name(), column, %value, "narrowing read");
                    query = query.and(Condition::equals(column, value));
                }
            }
        }

        Ok(query)
    }

    /// Add a column/value pair
    #[inline]
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pattern = self.pattern.with(column, value);
        self
    }

    /// Bypass narrowing
    #[inline]
    #[must_use]
    pub fn dont_narrow(mut self) -> Self {
        self.dont_narrow = true;
        self
    }

    /// Blocking mode
    #[inline]
    #[must_use]
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }
}

/// Exactly-one-record reader
#[derive(Clone)]
pub struct RecordSelector {
    storage: Arc<dyn Storage>,
}

impl RecordSelector {
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Select the single record matching `request`
    ///
    /// # Errors
    /// - `DboError::SchemaMismatch` before any store call
    /// - `DboError::Storage` passed through from the store
    /// - `DboError::NoRecordsFound` / `DboError::MultipleRecords`
    pub async fn select_one(
        &self,
        request: &MatchRequest,
        policy: &NarrowingPolicy,
    ) -> Result<Record, DboError> {
        let query = request.plan(policy)?;
        tracing::debug!(
            target_name = query.target(),
            conditions = query.conditions().len(),
            "selecting one record"
        );
        let result = self.storage.select(&query).await?;
        exactly_one(query.target(), result)
    }
}

impl std::fmt::Debug for RecordSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSelector").finish_non_exhaustive()
    }
}

/// The single row of `result`, or a cardinality error
fn exactly_one(target: &str, result: ResultSet) -> Result<Record, DboError> {
    let mut rows = result.rows.into_iter();
    let Some(record) = rows.next() else {
        return Err(DboError::NoRecordsFound {
            target: target.to_string(),
        });
    };
    let extra = rows.count();
    if extra > 0 {
        return Err(DboError::MultipleRecords {
            target: target.to_string(),
            count: extra + 1,
        });
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingValue;
    use crate::storage::{Bindings, StorageError};
    use async_trait::async_trait;
    use dbo_schema::CompareOp;
    use mockall::mock;
    use serde_json::json;

    mock! {
        pub Store {}

        #[async_trait]
        impl Storage for Store {
            async fn execute(&self, sql: &str, bindings: &Bindings) -> Result<ResultSet, StorageError>;
            async fn select(&self, query: &SelectQuery) -> Result<ResultSet, StorageError>;
            async fn insert(&self, table: &Table, record: &Record) -> Result<Record, StorageError>;
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

    fn narrowing(value: &str) -> NarrowingPolicy {
        NarrowingPolicy {
            narrow_by: Some(SettingValue::from(value)),
            always_test_generating_keys: false,
        }
    }

    fn rows(n: usize) -> ResultSet {
        ResultSet::from_rows(
            (0..n)
                .map(|i| Record::new().with("id", i as i64).with("name", "x"))
                .collect(),
        )
    }

    #[tokio::test]
    async fn unknown_column_never_reaches_store() {
        let mut store = MockStore::new();
        store.expect_select().never();
        let selector = RecordSelector::new(Arc::new(store));

        let request = MatchRequest::new(person()).with("nmae", "x");
        let err = selector
            .select_one(&request, &NarrowingPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DboError::SchemaMismatch { unknown, .. } if unknown == vec!["nmae".to_string()]));
    }

    #[tokio::test]
    async fn cardinality_is_enforced() {
        for (count, expect_ok) in [(0, false), (1, true), (2, false), (5, false)] {
            let mut store = MockStore::new();
            store
                .expect_select()
                .times(1)
                .returning(move |_| Ok(rows(count)));
            let selector = RecordSelector::new(Arc::new(store));
            let result = selector
                .select_one(&MatchRequest::new(person()), &NarrowingPolicy::default())
                .await;

            match (count, result) {
                (1, Ok(record)) => assert_eq!(record.get("id"), Some(&Value::Integer(0))),
                (0, Err(DboError::NoRecordsFound { target })) => assert_eq!(target, "person"),
                (n, Err(DboError::MultipleRecords { count, .. })) => assert_eq!(count, n),
                (n, other) => panic!("count {n}, expect_ok {expect_ok}: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn storage_errors_pass_through() {
        let mut store = MockStore::new();
        store
            .expect_select()
            .returning(|_| Err(StorageError::Connection("down".into())));
        let selector = RecordSelector::new(Arc::new(store));
        let err = selector
            .select_one(&MatchRequest::new(person()), &NarrowingPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DboError::Storage(StorageError::Connection(_))));
    }

    #[test]
    fn plan_injects_narrow_condition() {
        let request = MatchRequest::new(person()).with("name", "Ann");

        let query = request.plan(&narrowing("alpha")).unwrap();
        assert_eq!(
            query.conditions(),
            &[
                Condition::equals("name", "Ann"),
                Condition::equals("instance", "alpha")
            ]
        );

        let query = request.clone().dont_narrow().plan(&narrowing("alpha")).unwrap();
        assert_eq!(query.conditions(), &[Condition::equals("name", "Ann")]);

        let query = request.plan(&NarrowingPolicy::default()).unwrap();
        assert_eq!(query.conditions().len(), 1);
    }

    #[test]
    fn explicit_narrow_value_is_kept() {
        let request = MatchRequest::new(person()).with("instance", "beta");
        let query = request.plan(&narrowing("alpha")).unwrap();
        assert_eq!(query.conditions(), &[Condition::equals("instance", "beta")]);
    }

    #[test]
    fn formula_conditions_come_first() {
        let formula = Formula::builder("named", person())
            .condition(Condition::new("name", CompareOp::IsNotNull, Value::Null))
            .build()
            .unwrap();
        let request = MatchRequest::new(Arc::new(formula)).with("id", 3);
        let query = request.plan(&NarrowingPolicy::default()).unwrap();
        assert_eq!(query.target(), "named");
        assert_eq!(query.conditions()[0].op, CompareOp::IsNotNull);
        assert_eq!(query.conditions()[1], Condition::equals("id", 3));
    }

    #[test]
    fn null_pattern_value_plans_is_null() {
        let input = json!({"name": null});
        let request = MatchRequest::from_json(person(), input.as_object().unwrap()).unwrap();
        let query = request.plan(&NarrowingPolicy::default()).unwrap();
        assert_eq!(query.conditions(), &[Condition::is_null("name")]);
        let (sql, bindings) = query.to_sql();
        assert!(sql.ends_with(r#"WHERE "name" IS NULL"#), "{sql}");
        assert!(bindings.is_empty());
    }

    #[test]
    fn from_json_reads_flags() {
        let input = json!({"table": "person", "name": "Ann", "dontNarrow": true, "sync": true});
        let request = MatchRequest::from_json(person(), input.as_object().unwrap()).unwrap();
        assert!(request.dont_narrow);
        assert!(request.sync);
        assert_eq!(request.pattern.get("name"), Some(&Value::from("Ann")));
    }

    #[test]
    fn from_json_rejects_other_source() {
        let formula = Arc::new(Formula::builder("named", person()).build().unwrap());
        for (source, input) in [
            (MatchSource::from(person()), json!({"formula": "named", "name": "Ann"})),
            (MatchSource::from(person()), json!({"table": "people"})),
            (MatchSource::from(Arc::clone(&formula)), json!({"table": "person"})),
            (
                MatchSource::from(Arc::clone(&formula)),
                json!({"table": "person", "formula": "named"}),
            ),
        ] {
            let err = MatchRequest::from_json(source, input.as_object().unwrap()).unwrap_err();
            assert!(matches!(err, DboError::InvalidRequest(_)), "{input}: {err:?}");
        }

        let input = json!({"formula": "named"});
        assert!(MatchRequest::from_json(formula, input.as_object().unwrap()).is_ok());
    }
}
