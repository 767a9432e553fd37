//! Table definitions
//!
//! A [`Table`] exposes its declared column set as data so patterns can be
//! checked against it without touching the store.

use crate::error::SchemaError;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Primary key shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    /// One column; the only shape eligible for key back-fill and capture
    Single(String),
    /// Several columns
    Composite(Vec<String>),
}

impl PrimaryKey {
    /// The column name when the key is a single column
    #[inline]
    #[must_use]
    pub fn single(&self) -> Option<&str> {
        match self {
            PrimaryKey::Single(column) => Some(column),
            PrimaryKey::Composite(_) => None,
        }
    }

    /// All key columns
    #[must_use]
    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKey::Single(column) => vec![column.as_str()],
            PrimaryKey::Composite(columns) => columns.iter().map(String::as_str).collect(),
        }
    }
}

impl Display for PrimaryKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PrimaryKey::Single(column) => f.write_str(column),
            PrimaryKey::Composite(columns) => write!(f, "({})", columns.join(", ")),
        }
    }
}

/// Serialized shape of a table, validated on conversion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<String>,
    pub primary: PrimaryKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrow_column: Option<String>,
}

/// A table in the relational store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableDef", into = "TableDef")]
pub struct Table {
    name: String,
    columns: IndexSet<String>,
    primary: PrimaryKey,
    narrow_column: Option<String>,
}

impl Table {
    /// Start building a table
    #[inline]
    #[must_use]
    pub fn builder(name: impl Into<String>) -> TableBuilder {
        TableBuilder::new(name)
    }

    /// Table name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared columns, in declaration order
    #[inline]
    #[must_use]
    pub fn columns(&self) -> &IndexSet<String> {
        &self.columns
    }

    /// Whether `column` is declared
    #[inline]
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains(column)
    }

    /// Primary key
    #[inline]
    #[must_use]
    pub fn primary(&self) -> &PrimaryKey {
        &self.primary
    }

    /// Column used to partition the table across test-database instances
    #[inline]
    #[must_use]
    pub fn narrow_column(&self) -> Option<&str> {
        self.narrow_column.as_deref()
    }

    /// Check that `column` is declared
    ///
    /// # Errors
    /// `SchemaError::UnknownColumn` otherwise.
    pub fn require_column(&self, column: &str) -> Result<(), SchemaError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(SchemaError::UnknownColumn {
                table: self.name.clone(),
                column: column.to_string(),
            })
        }
    }
}

impl TryFrom<TableDef> for Table {
    type Error = SchemaError;

    fn try_from(def: TableDef) -> Result<Self, Self::Error> {
        let mut builder = TableBuilder::new(def.name).columns(def.columns);
        builder.primary = Some(def.primary);
        builder.narrow_column = def.narrow_column;
        builder.build()
    }
}

impl From<Table> for TableDef {
    fn from(table: Table) -> Self {
        Self {
            name: table.name,
            columns: table.columns.into_iter().collect(),
            primary: table.primary,
            narrow_column: table.narrow_column,
        }
    }
}

/// Builder for [`Table`]
#[derive(Debug, Clone)]
pub struct TableBuilder {
    name: String,
    columns: Vec<String>,
    primary: Option<PrimaryKey>,
    narrow_column: Option<String>,
}

impl TableBuilder {
    /// Create builder
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary: None,
            narrow_column: None,
        }
    }

    /// Add one column
    #[inline]
    #[must_use]
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.columns.push(column.into());
        self
    }

    /// Add several columns
    #[must_use]
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Single-column primary key
    #[inline]
    #[must_use]
    pub fn primary(mut self, column: impl Into<String>) -> Self {
        self.primary = Some(PrimaryKey::Single(column.into()));
        self
    }

    /// Composite primary key
    #[must_use]
    pub fn composite_primary<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary = Some(PrimaryKey::Composite(
            columns.into_iter().map(Into::into).collect(),
        ));
        self
    }

    /// Mark the table as narrowed by `column`
    #[inline]
    #[must_use]
    pub fn narrow_column(mut self, column: impl Into<String>) -> Self {
        self.narrow_column = Some(column.into());
        self
    }

    /// Validate and build
    ///
    /// # Errors
    /// - `SchemaError::NoColumns` when no column was declared
    /// - `SchemaError::DuplicateColumn` on a repeated column name
    /// - `SchemaError::MissingPrimaryKey` / `EmptyPrimaryKey`
    /// - `SchemaError::UnknownColumn` when the key or narrow column is undeclared
    pub fn build(self) -> Result<Table, SchemaError> {
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns { table: self.name });
        }

        let mut columns = IndexSet::with_capacity(self.columns.len());
        for column in self.columns {
            if columns.contains(&column) {
                return Err(SchemaError::DuplicateColumn {
                    table: self.name,
                    column,
                });
            }
            columns.insert(column);
        }

        let primary = self.primary.ok_or_else(|| SchemaError::MissingPrimaryKey {
            table: self.name.clone(),
        })?;
        if let PrimaryKey::Composite(parts) = &primary {
            if parts.is_empty() {
                return Err(SchemaError::EmptyPrimaryKey { table: self.name });
            }
        }

        let table = Table {
            name: self.name,
            columns,
            primary,
            narrow_column: self.narrow_column,
        };

        for column in table.primary.columns() {
            table.require_column(column)?;
        }
        if let Some(column) = table.narrow_column() {
            table.require_column(column)?;
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> TableBuilder {
        Table::builder("person").columns(["id", "name", "instance"])
    }

    #[test]
    fn build_valid_table() {
        let table = person().primary("id").narrow_column("instance").build().unwrap();
        assert_eq!(table.primary().single(), Some("id"));
        assert_eq!(table.narrow_column(), Some("instance"));
        assert!(table.has_column("name"));
    }

    #[test]
    fn rejects_undeclared_primary() {
        let err = person().primary("uuid").build().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownColumn { column, .. } if column == "uuid"));
    }

    #[test]
    fn rejects_undeclared_narrow_column() {
        let err = person().primary("id").narrow_column("tenant").build().unwrap_err();
        assert!(matches!(err, SchemaError::UnknownColumn { column, .. } if column == "tenant"));
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = person().column("name").primary("id").build().unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateColumn { .. }));
    }

    #[test]
    fn rejects_missing_and_empty_keys() {
        assert!(matches!(
            person().build().unwrap_err(),
            SchemaError::MissingPrimaryKey { .. }
        ));
        assert!(matches!(
            person().composite_primary(Vec::<String>::new()).build().unwrap_err(),
            SchemaError::EmptyPrimaryKey { .. }
        ));
    }

    #[test]
    fn deserialize_validates() {
        let json = r#"{"name":"t","columns":["a","b"],"primary":["a","b"]}"#;
        let table: Table = serde_json::from_str(json).unwrap();
        assert_eq!(table.primary().columns(), vec!["a", "b"]);

        let bad = r#"{"name":"t","columns":["a"],"primary":"z"}"#;
        assert!(serde_json::from_str::<Table>(bad).is_err());
    }
}
