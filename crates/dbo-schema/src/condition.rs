//! Column conditions used by formulas and rendered select queries

use crate::record::Record;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl CompareOp {
    /// Whether the operator takes a right-hand value
    #[inline]
    #[must_use]
    pub fn takes_value(self) -> bool {
        !matches!(self, CompareOp::IsNull | CompareOp::IsNotNull)
    }

    /// SQL spelling
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "<>",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
            CompareOp::Like => "LIKE",
            CompareOp::IsNull => "IS NULL",
            CompareOp::IsNotNull => "IS NOT NULL",
        }
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// `column op value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    #[serde(default = "null_value")]
    pub value: Value,
}

fn null_value() -> Value {
    Value::Null
}

impl Condition {
    /// Create condition
    #[inline]
    #[must_use]
    pub fn new(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Equality condition
    #[inline]
    #[must_use]
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, CompareOp::Eq, value)
    }

    /// `IS NULL` condition
    #[inline]
    #[must_use]
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, CompareOp::IsNull, Value::Null)
    }

    /// Evaluate against a record with SQL three-valued logic collapsed to `false`
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.column).unwrap_or(&Value::Null);
        match self.op {
            CompareOp::IsNull => actual.is_null(),
            CompareOp::IsNotNull => !actual.is_null(),
            _ if actual.is_null() || self.value.is_null() => false,
            CompareOp::Eq => compare_eq(actual, &self.value),
            CompareOp::NotEq => !compare_eq(actual, &self.value),
            CompareOp::Lt => actual.compare(&self.value) == Some(Ordering::Less),
            CompareOp::LtEq => matches!(
                actual.compare(&self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            CompareOp::Gt => actual.compare(&self.value) == Some(Ordering::Greater),
            CompareOp::GtEq => matches!(
                actual.compare(&self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            CompareOp::Like => like(&actual.normalized(), &self.value.normalized()),
        }
    }
}

fn compare_eq(actual: &Value, expected: &Value) -> bool {
    match actual.compare(expected) {
        Some(ordering) => ordering == Ordering::Equal,
        None => actual == expected,
    }
}

/// SQL `LIKE` with `%` and `_` wildcards, case-insensitive as in SQLite
fn like(text: &str, pattern: &str) -> bool {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push_str("(?is)^");
    for ch in pattern.chars() {
        match ch {
            '%' => expr.push_str(".*"),
            '_' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');
    regex::Regex::new(&expr).is_ok_and(|re| re.is_match(text))
}
