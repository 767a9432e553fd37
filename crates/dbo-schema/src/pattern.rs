//! Pattern matcher
//!
//! Turns a loosely-typed input object into a [`MatchPattern`] checked against
//! a table's declared columns. Keys that are neither columns nor one of the
//! recognised control keys are reported rather than silently dropped, so a
//! typo in a column name fails the read instead of widening it.

use crate::condition::Condition;
use crate::error::MatchError;
use crate::table::Table;
use crate::value::Value;
use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

/// Control keys accepted alongside column names
pub const CONTROL_KEYS: [&str; 4] = [TABLE_KEY, FORMULA_KEY, SYNC_KEY, DONT_NARROW_KEY];

/// Control key naming the table read from
pub const TABLE_KEY: &str = "table";

/// Control key naming the formula read from
pub const FORMULA_KEY: &str = "formula";

/// Control key selecting blocking execution
pub const SYNC_KEY: &str = "sync";

/// Control key bypassing narrowing-column injection
pub const DONT_NARROW_KEY: &str = "dontNarrow";

/// Validated column equality pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchPattern {
    pairs: IndexMap<String, Value>,
}

impl MatchPattern {
    /// Empty pattern (matches every row)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style pair
    #[inline]
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.pairs.insert(column.into(), value.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.pairs.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// One condition per pair: `IS NULL` for null values, equality otherwise
    #[must_use]
    pub fn to_conditions(&self) -> Vec<Condition> {
        self.pairs
            .iter()
            .map(|(column, value)| match value {
                Value::Null => Condition::is_null(column.clone()),
                _ => Condition::equals(column.clone(), value.clone()),
            })
            .collect()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for MatchPattern {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Control flags carried by a match input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchFlags {
    /// Skip narrowing-column injection
    pub dont_narrow: bool,
    /// Await the read before returning
    pub sync: bool,
}

/// Result of deriving a pattern from loose input
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMatch {
    pub pattern: MatchPattern,
    pub flags: MatchFlags,
}

/// Schema-aware pattern validation
///
/// Pure and synchronous: never touches a store.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternMatcher;

impl PatternMatcher {
    /// Create matcher
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Split `input` into column pairs and control flags
    ///
    /// # Errors
    /// - `MatchError::SchemaMismatch` listing every key that is neither a
    ///   column of `table` nor a control key
    /// - `MatchError::ConflictingSource` when both `table` and `formula` are
    ///   given
    /// - `MatchError::InvalidFlag` when `sync`/`dontNarrow` is not a boolean
    /// - `MatchError::NonScalarValue` when a column value is an array/object
    pub fn derive(
        &self,
        table: &Table,
        input: &Map<String, JsonValue>,
    ) -> Result<DerivedMatch, MatchError> {
        let unknown: Vec<String> = input
            .keys()
            .filter(|key| !table.has_column(key) && !CONTROL_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(MatchError::SchemaMismatch {
                table: table.name().to_string(),
                unknown,
            });
        }

        if input.contains_key(TABLE_KEY) && input.contains_key(FORMULA_KEY) {
            return Err(MatchError::ConflictingSource);
        }

        let flags = MatchFlags {
            dont_narrow: Self::flag(input, DONT_NARROW_KEY)?,
            sync: Self::flag(input, SYNC_KEY)?,
        };

        let mut pattern = MatchPattern::new();
        for (key, json) in input {
            if !table.has_column(key) {
                continue;
            }
            let value = Value::from_json(json).ok_or_else(|| MatchError::NonScalarValue {
                column: key.clone(),
            })?;
            pattern.pairs.insert(key.clone(), value);
        }

        Ok(DerivedMatch { pattern, flags })
    }

    /// Check an already-typed pattern against `table`
    ///
    /// # Errors
    /// `MatchError::SchemaMismatch` listing the undeclared columns.
    pub fn validate(&self, table: &Table, pattern: &MatchPattern) -> Result<(), MatchError> {
        let unknown: Vec<String> = pattern
            .pairs
            .keys()
            .filter(|column| !table.has_column(column))
            .cloned()
            .collect();
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(MatchError::SchemaMismatch {
                table: table.name().to_string(),
                unknown,
            })
        }
    }

    fn flag(input: &Map<String, JsonValue>, key: &str) -> Result<bool, MatchError> {
        match input.get(key) {
            None => Ok(false),
            Some(JsonValue::Bool(b)) => Ok(*b),
            Some(_) => Err(MatchError::InvalidFlag {
                key: key.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn table() -> Table {
        Table::builder("person")
            .columns(["id", "name", "age"])
            .primary("id")
            .build()
            .unwrap()
    }

    fn object(value: JsonValue) -> Map<String, JsonValue> {
        match value {
            JsonValue::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn derives_columns_and_flags() {
        let input = object(json!({"table": "person", "name": "Bob", "sync": true}));
        let derived = PatternMatcher::new().derive(&table(), &input).unwrap();
        assert_eq!(derived.pattern, MatchPattern::new().with("name", "Bob"));
        assert!(derived.flags.sync);
        assert!(!derived.flags.dont_narrow);
    }

    #[test]
    fn reports_every_unknown_key() {
        let input = object(json!({"nmae": "Bob", "agee": 3, "formula": "f"}));
        let err = PatternMatcher::new().derive(&table(), &input).unwrap_err();
        assert_eq!(
            err,
            MatchError::SchemaMismatch {
                table: "person".into(),
                unknown: vec!["agee".into(), "nmae".into()],
            }
        );
    }

    #[test]
    fn flags_must_be_boolean() {
        let input = object(json!({"name": "Bob", "dontNarrow": "yes"}));
        assert_eq!(
            PatternMatcher::new().derive(&table(), &input).unwrap_err(),
            MatchError::InvalidFlag {
                key: "dontNarrow".into()
            }
        );
    }

    #[test]
    fn table_and_formula_together_conflict() {
        let input = object(json!({"table": "person", "formula": "adults", "name": "Bob"}));
        assert_eq!(
            PatternMatcher::new().derive(&table(), &input).unwrap_err(),
            MatchError::ConflictingSource
        );
    }

    #[test]
    fn null_value_becomes_is_null() {
        let input = object(json!({"name": "Bob", "age": null}));
        let derived = PatternMatcher::new().derive(&table(), &input).unwrap();
        assert_eq!(
            derived.pattern.to_conditions(),
            vec![Condition::equals("name", "Bob"), Condition::is_null("age")]
        );
    }

    #[test]
    fn rejects_nested_values() {
        let input = object(json!({"name": ["a"]}));
        assert!(matches!(
            PatternMatcher::new().derive(&table(), &input),
            Err(MatchError::NonScalarValue { .. })
        ));
    }

    #[test]
    fn validate_typed_pattern() {
        let matcher = PatternMatcher::new();
        assert!(matcher
            .validate(&table(), &MatchPattern::new().with("age", 3))
            .is_ok());
        assert!(matcher
            .validate(&table(), &MatchPattern::new().with("height", 3))
            .is_err());
    }

    proptest! {
        #[test]
        fn prop_pattern_is_column_subset(keys in proptest::collection::vec("[a-z]{1,6}", 0..8)) {
            let mut input = Map::new();
            for key in &keys {
                input.insert(key.clone(), json!(1));
            }
            let table = table();
            match PatternMatcher::new().derive(&table, &input) {
                Ok(derived) => {
                    for (column, _) in derived.pattern.iter() {
                        prop_assert!(table.has_column(column));
                    }
                    let control = keys.iter().filter(|k| CONTROL_KEYS.contains(&k.as_str())).count();
                    prop_assert!(derived.pattern.len() + control >= input.len());
                }
                Err(MatchError::SchemaMismatch { unknown, .. }) => {
                    prop_assert!(!unknown.is_empty());
                    for key in unknown {
                        prop_assert!(!table.has_column(&key));
                    }
                }
                Err(MatchError::ConflictingSource) => {
                    prop_assert!(input.contains_key(TABLE_KEY) && input.contains_key(FORMULA_KEY));
                }
                Err(MatchError::InvalidFlag { key }) => prop_assert_eq!(key, SYNC_KEY),
                Err(other) => prop_assert!(false, "unexpected error {other:?}"),
            }
        }
    }
}
