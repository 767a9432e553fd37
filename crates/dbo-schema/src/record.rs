//! Records: column name to scalar value
//!
//! A [`Record`] keeps insertion order so result rows print in the column order
//! the store returned them.

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single row, keyed by column name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Create empty record
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field setter
    #[inline]
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(column.into(), value.into());
        self
    }

    /// Set a field, returning the previous value
    #[inline]
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(column.into(), value.into())
    }

    /// Set a key column that must not already be present
    ///
    /// # Errors
    /// `RecordError::KeyAlreadySet` if the column is already populated; the
    /// existing value is left untouched.
    pub fn assign_key(&mut self, column: &str, value: Value) -> Result<(), RecordError> {
        if let Some(existing) = self.fields.get(column) {
            return Err(RecordError::KeyAlreadySet {
                column: column.to_string(),
                existing: existing.clone(),
            });
        }
        self.fields.insert(column.to_string(), value);
        Ok(())
    }

    /// Get a field value
    #[inline]
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Whether the column is present (NULL counts as present)
    #[inline]
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    /// Column names in order
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Iterate `(column, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keep only the given columns, in the given order
    #[must_use]
    pub fn project(&self, columns: &[String]) -> Self {
        let fields = columns
            .iter()
            .filter_map(|c| self.fields.get(c).map(|v| (c.clone(), v.clone())))
            .collect();
        Self { fields }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for Record {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

/// Record mutation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    /// Key column already holds a value
    #[error("column '{column}' already set to '{existing}'")]
    KeyAlreadySet { column: String, existing: Value },
}
