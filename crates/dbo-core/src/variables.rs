//! Stored variables shared with the automation engine
//!
//! Named slots the engine reads back in later steps: the record produced by
//! a read, or the key generated by the last insert.

use dashmap::DashMap;
use dbo_schema::{Record, Value};

/// Well-known slot holding the last generated primary key
pub const INSERTED_RECORD_KEY: &str = "insertedRecordKey";

/// Content of a slot
#[derive(Debug, Clone, PartialEq)]
pub enum StoredValue {
    Record(Record),
    Value(Value),
}

/// Concurrent map of named slots
#[derive(Debug, Default)]
pub struct StoredVariables {
    slots: DashMap<String, StoredValue>,
}

impl StoredVariables {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a record into `name`, replacing any previous content
    pub fn store_record(&self, name: impl Into<String>, record: Record) {
        self.slots.insert(name.into(), StoredValue::Record(record));
    }

    /// Write a scalar into `name`, replacing any previous content
    pub fn store_value(&self, name: impl Into<String>, value: Value) {
        self.slots.insert(name.into(), StoredValue::Value(value));
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<StoredValue> {
        self.slots.get(name).map(|slot| slot.value().clone())
    }

    /// Slot content if it holds a record
    #[must_use]
    pub fn record(&self, name: &str) -> Option<Record> {
        match self.get(name)? {
            StoredValue::Record(record) => Some(record),
            StoredValue::Value(_) => None,
        }
    }

    /// Slot content if it holds a scalar
    #[must_use]
    pub fn value(&self, name: &str) -> Option<Value> {
        match self.get(name)? {
            StoredValue::Value(value) => Some(value),
            StoredValue::Record(_) => None,
        }
    }

    pub fn remove(&self, name: &str) -> Option<StoredValue> {
        self.slots.remove(name).map(|(_, value)| value)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
